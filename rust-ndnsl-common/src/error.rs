//! Error types for the self-learning NDN forwarder.

use thiserror::Error;

/// All possible errors that can occur within the packet model.
#[derive(Error, Debug)]
pub enum Error {
    /// Error related to TLV encoding/decoding.
    #[error("TLV error: {0}")]
    Tlv(String),

    /// Error related to NDN packet processing.
    #[error("NDN packet error: {0}")]
    Packet(String),

    /// Error related to a Prefix Announcement.
    #[error("Prefix Announcement error: {0}")]
    Announcement(String),

    /// Error related to an NDN name.
    #[error("Name error: {0}")]
    Name(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("Other error: {0}")]
    Other(String),
}
