//! Configuration management for the sender.
//!
//! This module handles loading configuration from disk: the
//! device name to look for, the RFCOMM channel, buffer and scan sizes, and
//! the wire framing.

use std::{
   env, fs,
   path::{Path, PathBuf},
   time::Duration,
};

use log::debug;
use serde::Deserialize;

use crate::{
   error::{Result, SenderError},
   protocol::Framing,
};

/// Main configuration structure for the sender.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct Config {
   /// Exact name the peer advertises.
   #[serde(default = "default_target_name")]
   pub target_name: String,

   #[serde(default = "default_channel")]
   pub channel: u8,

   #[serde(default = "default_recv_buffer_size")]
   pub recv_buffer_size: usize,

   #[serde(default = "default_scan_timeout")]
   pub scan_timeout_sec: u64,

   /// Adapter to scan with, e.g. `hci0`. The session default when unset.
   #[serde(default)]
   pub adapter: Option<String>,

   #[serde(default)]
   pub framing: Framing,

   /// Read and print whatever the peer sent before each write.
   #[serde(default)]
   pub echo: bool,
}

fn default_target_name() -> String {
   "ESP32test".to_string()
}

const fn default_channel() -> u8 {
   1
}

const fn default_recv_buffer_size() -> usize {
   2048
}

const fn default_scan_timeout() -> u64 {
   10
}

impl Default for Config {
   fn default() -> Self {
      Self {
         target_name: default_target_name(),
         channel: default_channel(),
         recv_buffer_size: default_recv_buffer_size(),
         scan_timeout_sec: default_scan_timeout(),
         adapter: None,
         framing: Framing::default(),
         echo: false,
      }
   }
}

impl Config {
   /// Loads configuration from the default location.
   ///
   /// Falls back to the defaults when there is no config directory.
   pub fn load() -> Result<Self> {
      match Self::config_path() {
         Ok(path) => Self::load_from(&path),
         Err(e) => {
            debug!("{e}, using defaults");
            Ok(Self::default())
         },
      }
   }

   /// Loads configuration from `path`, or the defaults if it does not exist.
   ///
   /// Nothing is ever written back.
   pub fn load_from(path: &Path) -> Result<Self> {
      if !path.exists() {
         debug!("No config at {}, using defaults", path.display());
         return Ok(Self::default());
      }
      let contents = fs::read_to_string(path)?;
      Ok(toml::from_str(&contents)?)
   }

   pub fn config_path() -> Result<PathBuf> {
      let config_dir = if let Ok(home) = env::var("RFCOMM_SENDER_HOME") {
         PathBuf::from(home)
      } else if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
         PathBuf::from(config_home)
      } else if let Some(dir) = dirs::config_dir() {
         dir
      } else if let Ok(home) = env::var("HOME") {
         PathBuf::from(home).join(".config")
      } else {
         return Err(SenderError::ConfigDirNotFound);
      };

      Ok(config_dir.join("rfcomm-sender").join("config.toml"))
   }

   pub const fn scan_timeout(&self) -> Duration {
      Duration::from_secs(self.scan_timeout_sec)
   }
}
