//! RFCOMM stream handling.
//!
//! Opens the stream to the peer and moves payload bytes over it. There is
//! no acknowledgement: a write that returns is considered sent.

use bluer::{
   Address,
   rfcomm::{SocketAddr, Stream},
};
use log::{debug, info, trace};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{
   error::{Result, SenderError},
   protocol::{FrameDecoder, Framing, Payload},
};

/// Opens stream connections to a peer.
pub trait Connector {
   type Stream: AsyncRead + AsyncWrite + Unpin;

   async fn open(&self, address: Address, channel: u8) -> Result<Self::Stream>;
}

/// Connector for real RFCOMM sockets.
#[derive(Debug, Default, Clone, Copy)]
pub struct RfcommConnector;

impl Connector for RfcommConnector {
   type Stream = Stream;

   async fn open(&self, address: Address, channel: u8) -> Result<Stream> {
      Stream::connect(SocketAddr::new(address, channel))
         .await
         .map_err(|source| SenderError::Connect {
            address,
            channel,
            source,
         })
   }
}

/// Connects to `address` on `channel`, rejecting the empty address.
pub async fn connect<C: Connector>(connector: &C, address: Address, channel: u8) -> Result<C::Stream> {
   if address == Address::any() {
      return Err(SenderError::InvalidAddress(address));
   }
   debug!("Connecting to {address}:{channel}");
   connector.open(address, channel).await
}

/// Writes the payload with a single write call.
pub async fn send<W: AsyncWrite + Unpin>(stream: &mut W, payload: &Payload) -> Result<()> {
   let bytes = payload.as_bytes();
   let written = stream.write(bytes).await.map_err(SenderError::Transmission)?;
   if written < bytes.len() {
      return Err(SenderError::ShortWrite {
         written,
         expected: bytes.len(),
      });
   }
   trace!("→ {}", hex::encode(bytes));
   Ok(())
}

/// Read side of the stream.
#[derive(Debug)]
pub struct Receiver {
   buf: Box<[u8]>,
   decoder: FrameDecoder,
}

impl Receiver {
   pub fn new(buffer_size: usize, framing: Framing) -> Self {
      Self {
         buf: vec![0; buffer_size].into_boxed_slice(),
         decoder: FrameDecoder::new(framing),
      }
   }

   /// Performs one read and returns the messages it completed.
   ///
   /// With raw framing the read itself is the message, so a short read comes
   /// back as truncated text.
   pub async fn receive<R: AsyncRead + Unpin>(&mut self, stream: &mut R) -> Result<Vec<String>> {
      let n = stream
         .read(&mut self.buf)
         .await
         .map_err(SenderError::Transmission)?;
      if n == 0 {
         return Err(SenderError::ConnectionClosed);
      }
      let recvd = &self.buf[..n];
      self.decoder.push(recvd);
      trace!("← {} ({} bytes buffered)", hex::encode(recvd), self.decoder.pending());

      let mut messages = Vec::new();
      while let Some(text) = self.decoder.next_text()? {
         if !text.is_empty() {
            info!("{text}");
         }
         messages.push(text);
      }
      Ok(messages)
   }
}
