#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Library surface of the deposit signature authorization server.
//!
//! The binary entry point lives in `main.rs`; this crate root exposes the
//! configuration, routing, and error-mapping modules so they can be reused
//! and tested directly.

pub mod config;
pub mod error;
pub mod handlers;
