#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! EVM chain support for the deposit signature authorization engine.
//!
//! This crate binds the chain-agnostic core from `depauth` to EVM networks:
//! contract read bindings for the payment-gateway and pro-rata contract
//! families, a throttled/fallback RPC provider, the packed-encoding
//! signature codec, and the [`SignatureEngine`] that ties them together
//! behind per-network signing contexts.
//!
//! # Architecture
//!
//! - [`contract`] - Minimal Solidity interfaces for on-chain reads
//! - [`provider`] - RPC client construction with throttling and fallback
//! - [`reader`] - The [`ChainSource`] trait and its alloy-backed implementation
//! - [`resolver`] - Cached resolution of volatile chain parameters
//! - [`codec`] - Deposit message encoding and signing
//! - [`context`] - Per-network signer + chain parameter bundles
//! - [`engine`] - The request-level signing engine

pub mod codec;
pub mod context;
pub mod contract;
pub mod engine;
pub mod error;
pub mod provider;
pub mod reader;
pub mod resolver;

pub use codec::SignerLike;
pub use context::NetworkContext;
pub use engine::SignatureEngine;
pub use error::ChainReadError;
pub use reader::{AlloyChainSource, BlockInfo, ChainSource};
