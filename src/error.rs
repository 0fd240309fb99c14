//! Main Crate Error

use crate::common::Id;

#[derive(thiserror::Error, Debug)]
/// Mainline crawl crate error enum.
pub enum Error {
    #[error(transparent)]
    /// Transparent [std::io::Error]
    IO(#[from] std::io::Error),

    #[error("Failed to parse packet bytes: {0}")]
    /// Errors related to parsing DHT messages.
    BencodeError(#[from] serde_bencode::Error),

    /// Id is expected to by 20 bytes.
    #[error("Invalid Id size, expected 20, got {0}")]
    InvalidIdSize(usize),

    /// Id string is not 40 hex characters.
    #[error("Invalid Id encoding: {0}")]
    InvalidIdEncoding(String),

    /// Indicates that the message transaction_id is not two bytes.
    #[error("Invalid transaction_id: {0:?}")]
    InvalidTransactionId(Vec<u8>),

    /// A well formed bencode dictionary that is not a valid Krpc message.
    #[error("Invalid Krpc message: {0}")]
    InvalidMessage(&'static str),

    /// Compact addresses are either 6 (IPv4) or 18 (IPv6) bytes.
    #[error("Wrong number of bytes for compact address: {0}")]
    InvalidCompactAddress(usize),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
/// Errors surfaced to whoever starts a crawl job.
pub enum CrawlError {
    /// A crawl job for this info hash is still running.
    #[error("Crawl job already in progress for {0}")]
    AlreadyInProgress(Id),

    /// The crawler actor thread is no longer running.
    #[error("The crawler was shutdown")]
    CrawlerWasShutdown,
}
