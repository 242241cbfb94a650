//! RFCOMM payload sender
//!
//! Finds a Bluetooth device by name, connects to it over RFCOMM and writes
//! the same payload to it until the connection fails. Used as a smoke test
//! for peer firmware that listens on an RFCOMM channel.

use std::{path::PathBuf, process};

use clap::Parser;
use log::{error, info};
use tokio::{select, signal};

use bluetooth::{discovery::BluezScanner, rfcomm::RfcommConnector};
use config::Config;
use error::SenderError;
use protocol::{Framing, Payload};
use sender::{RunReport, Sender};

mod bluetooth;
mod config;
mod error;
mod protocol;
mod sender;

/// Command-line arguments. Flags override the config file.
#[derive(Debug, Parser)]
#[command(
   name = "rfcomm-sender",
   version,
   about = "Stream a payload to a named Bluetooth device over RFCOMM"
)]
struct Cli {
   /// Value to send; its text form is written over and over.
   value: String,

   /// Config file to use instead of the default location.
   #[arg(long, env = "RFCOMM_SENDER_CONFIG")]
   config: Option<PathBuf>,

   /// Name the peer advertises.
   #[arg(long)]
   target_name: Option<String>,

   /// RFCOMM channel on the peer.
   #[arg(long)]
   channel: Option<u8>,

   /// Adapter to scan with, e.g. hci0.
   #[arg(long, env = "RFCOMM_SENDER_ADAPTER")]
   adapter: Option<String>,

   /// Wire framing: raw, line or length-prefixed.
   #[arg(long)]
   framing: Option<Framing>,

   /// Print whatever the peer sends before each write.
   #[arg(long)]
   echo: bool,
}

impl Cli {
   fn load_config(&self) -> error::Result<Config> {
      let mut config = match &self.config {
         Some(path) => Config::load_from(path)?,
         None => Config::load()?,
      };
      if let Some(name) = &self.target_name {
         config.target_name.clone_from(name);
      }
      if let Some(channel) = self.channel {
         config.channel = channel;
      }
      if let Some(adapter) = &self.adapter {
         config.adapter = Some(adapter.clone());
      }
      if let Some(framing) = self.framing {
         config.framing = framing;
      }
      config.echo |= self.echo;
      Ok(config)
   }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
   env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

   let cli = Cli::parse();
   let report = run(&cli).await;
   terminate(&report);
}

async fn run(cli: &Cli) -> RunReport {
   let setup = cli.load_config().and_then(|config| {
      let payload = Payload::new(&cli.value, config.framing)?;
      Ok((config, payload))
   });
   let (config, payload) = match setup {
      Ok(setup) => setup,
      Err(e) => return unstarted(e),
   };
   info!(
      "Sending {:?} to {} on channel {} ({} framing)",
      payload.text(),
      config.target_name,
      config.channel,
      config.framing.to_str()
   );

   let scanner = match BluezScanner::new(&config).await {
      Ok(scanner) => scanner,
      Err(e) => return unstarted(e),
   };
   let mut sender = Sender::new(config, scanner, RfcommConnector);

   let error = select! {
      e = sender.run(&payload) => e,
      r = signal::ctrl_c() => r.map_or_else(SenderError::Io, |()| SenderError::Interrupted),
   };
   sender.shutdown(error).await
}

/// Report for a failure before any socket could exist.
fn unstarted(error: SenderError) -> RunReport {
   error!("ERROR: {} failure: {error}", error.kind());
   RunReport {
      failed_in: sender::State::Discovering,
      sends: 0,
      error,
   }
}

/// Ends the process. The socket has already been closed by `Sender::shutdown`.
fn terminate(report: &RunReport) -> ! {
   info!("{}", summary(report));
   process::exit(report.exit_code())
}

fn summary(report: &RunReport) -> String {
   format!(
      "Exiting after {} sends ({} failure while {})",
      report.sends,
      report.kind(),
      report.failed_in
   )
}

#[cfg(test)]
mod tests {
   use std::fs;

   use super::*;

   const FILE: &str = "target_name = \"from-file\"\n\
                       channel = 2\n\
                       adapter = \"hci1\"\n\
                       framing = \"line\"\n";

   fn config_file(contents: &str) -> tempfile::NamedTempFile {
      let file = tempfile::NamedTempFile::new().unwrap();
      fs::write(file.path(), contents).unwrap();
      file
   }

   fn parse(args: &[&str]) -> Cli {
      Cli::try_parse_from(["rfcomm-sender"].iter().chain(args)).unwrap()
   }

   #[test]
   fn test_file_values_used_without_flags() {
      let file = config_file(FILE);
      let path = file.path().to_str().unwrap();
      let config = parse(&["42", "--config", path]).load_config().unwrap();

      assert_eq!(config.target_name, "from-file");
      assert_eq!(config.channel, 2);
      assert_eq!(config.adapter.as_deref(), Some("hci1"));
      assert_eq!(config.framing, Framing::Line);
      assert!(!config.echo);
   }

   #[test]
   fn test_flags_override_file_values() {
      let file = config_file(FILE);
      let path = file.path().to_str().unwrap();
      let cli = parse(&[
         "42",
         "--config",
         path,
         "--target-name",
         "ESP32bench",
         "--channel",
         "5",
         "--adapter",
         "hci0",
         "--framing",
         "length-prefixed",
      ]);
      assert_eq!(cli.value, "42");

      let config = cli.load_config().unwrap();
      assert_eq!(config.target_name, "ESP32bench");
      assert_eq!(config.channel, 5);
      assert_eq!(config.adapter.as_deref(), Some("hci0"));
      assert_eq!(config.framing, Framing::LengthPrefixed);
      // Untouched keys keep their defaults.
      assert_eq!(config.recv_buffer_size, 2048);
   }

   #[test]
   fn test_echo_flag_or_file_enables_echo() {
      let off = config_file("echo = false\n");
      let path = off.path().to_str().unwrap();
      assert!(!parse(&["1", "--config", path]).load_config().unwrap().echo);
      assert!(parse(&["1", "--config", path, "--echo"]).load_config().unwrap().echo);

      // The flag can only switch echo on, never off.
      let on = config_file("echo = true\n");
      let path = on.path().to_str().unwrap();
      assert!(parse(&["1", "--config", path]).load_config().unwrap().echo);
   }

   #[test]
   fn test_missing_config_path_uses_defaults() {
      let dir = tempfile::tempdir().unwrap();
      let path = dir.path().join("absent.toml");
      let config = parse(&["hello", "--config", path.to_str().unwrap(), "--channel", "3"])
         .load_config()
         .unwrap();

      assert_eq!(config.target_name, "ESP32test");
      assert_eq!(config.channel, 3);
      assert!(!path.exists());
   }

   #[test]
   fn test_summary_names_the_failing_state() {
      let report = RunReport {
         failed_in: sender::State::Streaming,
         sends: 41,
         error: SenderError::ConnectionClosed,
      };
      assert_eq!(
         summary(&report),
         "Exiting after 41 sends (transmission failure while streaming)"
      );

      let report = unstarted(SenderError::DeviceNotFound("ESP32test".into()));
      assert_eq!(
         summary(&report),
         "Exiting after 0 sends (discovery failure while discovering)"
      );
   }

   #[test]
   fn test_bad_flag_values_are_rejected() {
      assert!(Cli::try_parse_from(["rfcomm-sender", "1", "--framing", "json"]).is_err());
      assert!(Cli::try_parse_from(["rfcomm-sender", "1", "--channel", "300"]).is_err());
      assert!(Cli::try_parse_from(["rfcomm-sender"]).is_err());
   }
}
