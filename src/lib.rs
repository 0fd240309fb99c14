#![doc = include_str!("../README.md")]
//! ## Feature flags
#![doc = document_features::document_features!()]
//!

// Public modules
mod common;

#[cfg(feature = "async")]
pub mod async_crawler;
mod crawler;
pub mod engine;
mod error;

pub use crate::common::{
    decode_compact_address, decode_nodes, encode_compact_address, encode_nodes, messages, Id,
    Node, ID_SIZE, NODE_RECORD_SIZE,
};
pub use crawler::Crawler;
pub use engine::{config::Config, CrawlReport, Info};
pub use error::{CrawlError, Error};

/// Alias Result to be the crate Result.
pub type Result<T, E = Error> = core::result::Result<T, E>;
