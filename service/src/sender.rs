//! Connect-and-stream loop.
//!
//! The sender walks `Discovering → Connecting → Streaming` and stays in
//! `Streaming` until something fails. Any failure ends the run; `shutdown`
//! then closes the socket and reports how far the run got.

use std::convert::Infallible;

use log::{debug, error, info, warn};
use tokio::io::AsyncWriteExt;

use crate::{
   bluetooth::{
      discovery::{self, Scanner},
      rfcomm::{self, Connector, Receiver},
   },
   config::Config,
   error::{FailureKind, Result, SenderError},
   protocol::Payload,
};

/// Exit status used for every terminated run.
pub const EXIT_CODE: i32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum State {
   #[strum(serialize = "discovering")]
   Discovering,
   #[strum(serialize = "connecting")]
   Connecting,
   #[strum(serialize = "streaming")]
   Streaming,
   #[strum(serialize = "closed")]
   Closed,
}

/// Outcome of a finished run.
#[derive(Debug)]
pub struct RunReport {
   pub failed_in: State,
   pub sends: u64,
   pub error: SenderError,
}

impl RunReport {
   pub fn kind(&self) -> FailureKind {
      self.error.kind()
   }

   pub const fn exit_code(&self) -> i32 {
      EXIT_CODE
   }
}

/// Discovers the target, connects and streams a payload to it.
pub struct Sender<S: Scanner, C: Connector> {
   config: Config,
   scanner: S,
   connector: C,
   state: State,
   stream: Option<C::Stream>,
   receiver: Option<Receiver>,
   sends: u64,
}

impl<S: Scanner, C: Connector> Sender<S, C> {
   pub fn new(config: Config, scanner: S, connector: C) -> Self {
      let receiver = config
         .echo
         .then(|| Receiver::new(config.recv_buffer_size, config.framing));
      Self {
         config,
         scanner,
         connector,
         state: State::Discovering,
         stream: None,
         receiver,
         sends: 0,
      }
   }

   pub const fn state(&self) -> State {
      self.state
   }

   pub const fn sends(&self) -> u64 {
      self.sends
   }

   /// Runs until the first failure and returns it.
   ///
   /// The socket, if one was opened, stays open until `shutdown`.
   pub async fn run(&mut self, payload: &Payload) -> SenderError {
      let Err(e) = self.try_run(payload).await;
      e
   }

   async fn try_run(&mut self, payload: &Payload) -> Result<Infallible> {
      self.establish().await?;
      loop {
         self.step(payload).await?;
      }
   }

   /// Finds the target and opens the stream to it.
   pub async fn establish(&mut self) -> Result<()> {
      self.state = State::Discovering;
      let target = &self.config.target_name;
      let address = discovery::discover(&self.scanner, target).await?;

      self.state = State::Connecting;
      let stream = rfcomm::connect(&self.connector, address, self.config.channel).await?;
      self.stream = Some(stream);
      info!("We are now connected to {target}");

      self.state = State::Streaming;
      Ok(())
   }

   /// One streaming iteration: an optional read, then the payload write.
   pub async fn step(&mut self, payload: &Payload) -> Result<()> {
      let stream = self.stream.as_mut().ok_or(SenderError::ConnectionClosed)?;
      if let Some(receiver) = &mut self.receiver {
         receiver.receive(stream).await?;
      }
      rfcomm::send(stream, payload).await?;
      self.sends += 1;
      Ok(())
   }

   /// Logs `error`, closes the socket if it is open and reports the run.
   pub async fn shutdown(&mut self, error: SenderError) -> RunReport {
      let failed_in = self.state();
      error!("ERROR: {} failure while {failed_in}: {error}", error.kind());

      if let Some(mut stream) = self.stream.take() {
         if let Err(e) = stream.shutdown().await {
            warn!("Failed to close socket: {e}");
         }
         debug!("Socket closed");
      }
      self.state = State::Closed;

      RunReport {
         failed_in,
         sends: self.sends(),
         error,
      }
   }
}
