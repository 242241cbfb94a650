//! Error types for the RFCOMM sender.
//!
//! Every failure is fatal to the run and handled the same way, but the
//! variants keep their origin so callers can tell discovery, connection and
//! transmission problems apart.

use bluer::Address;
use thiserror::Error;

/// Main error type for the sender.
#[derive(Error, Debug)]
pub enum SenderError {
   #[error("Bluetooth error: {0}")]
   Bluetooth(#[from] bluer::Error),

   #[error("I/O error: {0}")]
   Io(#[from] std::io::Error),

   #[error("No device named {0:?} found")]
   DeviceNotFound(String),

   #[error("Adapter not found: {0}")]
   AdapterNotFound(String),

   #[error("Invalid device address: {0}")]
   InvalidAddress(Address),

   #[error("Could not connect to {address} on channel {channel}: {source}")]
   Connect {
      address: Address,
      channel: u8,
      #[source]
      source: std::io::Error,
   },

   #[error("Socket I/O failed: {0}")]
   Transmission(#[source] std::io::Error),

   #[error("Short write: {written} of {expected} bytes")]
   ShortWrite { written: usize, expected: usize },

   #[error("Connection closed")]
   ConnectionClosed,

   #[error("Received data is not valid UTF-8: {0}")]
   Decode(#[from] std::str::Utf8Error),

   #[error("Payload of {0} bytes does not fit a length prefix")]
   PayloadTooLarge(usize),

   #[error("Could not determine config directory")]
   ConfigDirNotFound,

   #[error("TOML parsing error: {0}")]
   TomlParse(#[from] toml::de::Error),

   #[error("Interrupted")]
   Interrupted,
}

/// Where a failure originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::IntoStaticStr)]
pub enum FailureKind {
   #[strum(serialize = "discovery")]
   Discovery,
   #[strum(serialize = "connection")]
   Connection,
   #[strum(serialize = "transmission")]
   Transmission,
   #[strum(serialize = "configuration")]
   Configuration,
   #[strum(serialize = "interrupted")]
   Interrupted,
}

impl SenderError {
   pub fn kind(&self) -> FailureKind {
      match self {
         Self::Bluetooth(_) | Self::DeviceNotFound(_) | Self::AdapterNotFound(_) => {
            FailureKind::Discovery
         },
         Self::InvalidAddress(_) | Self::Connect { .. } => FailureKind::Connection,
         Self::Transmission(_) | Self::ShortWrite { .. } | Self::ConnectionClosed | Self::Decode(_) => {
            FailureKind::Transmission
         },
         Self::Io(_)
         | Self::PayloadTooLarge(_)
         | Self::ConfigDirNotFound
         | Self::TomlParse(_) => FailureKind::Configuration,
         Self::Interrupted => FailureKind::Interrupted,
      }
   }
}

/// Convenience type alias for Results with `SenderError`.
pub type Result<T> = std::result::Result<T, SenderError>;
