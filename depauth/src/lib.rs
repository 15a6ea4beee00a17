#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Core types for the deposit signature authorization engine.
//!
//! This crate provides the chain-agnostic building blocks used to issue
//! replay-protected deposit authorization signatures: a memoizing cache for
//! volatile on-chain parameters, fixed-point amount conversion, the signature
//! timing policy, per-network operational statistics, and the wire types of
//! the HTTP surface. Chain-specific contract bindings and the signing engine
//! itself live in the `depauth-evm` crate.
//!
//! # Modules
//!
//! - [`amount`] - Human-amount to base-unit conversion with fixed-point rounding
//! - [`cache`] - TTL-optional memoization of asynchronous lookups
//! - [`error`] - The signing error taxonomy
//! - [`policy`] - Instant vs. window timing policy for signature validity
//! - [`proto`] - JSON wire format for requests and responses
//! - [`stats`] - Per-network signature/error counters

pub mod amount;
pub mod cache;
pub mod error;
pub mod policy;
pub mod proto;
pub mod stats;

pub use error::{EncodingError, SigningError};
pub use policy::{SigningMode, SigningWindow};
