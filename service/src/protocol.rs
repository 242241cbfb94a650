//! Wire format for payloads sent to the peer.
//!
//! The peer firmware reads raw UTF-8 text with no delimiter, so `Raw` is the
//! default. `Line` and `LengthPrefixed` are opt-in framings for firmware that
//! wants message boundaries.

use std::{fmt, str};

use serde::Deserialize;

use crate::error::{Result, SenderError};

/// Size of the `LengthPrefixed` header.
const LENGTH_PREFIX_LEN: usize = 2;

/// How payload text is laid out on the wire.
#[derive(
   Debug,
   Default,
   Clone,
   Copy,
   PartialEq,
   Eq,
   Deserialize,
   strum::Display,
   strum::EnumString,
   strum::IntoStaticStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Framing {
   /// UTF-8 text, nothing else.
   #[default]
   Raw,
   /// UTF-8 text terminated by `\n`.
   Line,
   /// Big-endian `u16` byte count followed by UTF-8 text.
   LengthPrefixed,
}

impl Framing {
   pub fn to_str(self) -> &'static str {
      self.into()
   }

   /// Encodes `text` as a single frame.
   pub fn encode(self, text: &str) -> Result<Vec<u8>> {
      let body = text.as_bytes();
      let frame = match self {
         Self::Raw => body.to_vec(),
         Self::Line => {
            let mut frame = Vec::with_capacity(body.len() + 1);
            frame.extend_from_slice(body);
            frame.push(b'\n');
            frame
         },
         Self::LengthPrefixed => {
            let len = u16::try_from(body.len())
               .map_err(|_| SenderError::PayloadTooLarge(body.len()))?;
            let mut frame = Vec::with_capacity(LENGTH_PREFIX_LEN + body.len());
            frame.extend_from_slice(&len.to_be_bytes());
            frame.extend_from_slice(body);
            frame
         },
      };
      Ok(frame)
   }
}

/// The value being streamed, in its text form and its encoded wire form.
///
/// Encoding happens once; every send writes the same bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
   text: String,
   frame: Vec<u8>,
}

impl Payload {
   pub fn new(value: impl fmt::Display, framing: Framing) -> Result<Self> {
      let text = value.to_string();
      let frame = framing.encode(&text)?;
      Ok(Self { text, frame })
   }

   pub fn text(&self) -> &str {
      &self.text
   }

   pub fn as_bytes(&self) -> &[u8] {
      &self.frame
   }
}

/// Accumulates received bytes and splits them into frames.
///
/// With `Raw` framing there are no boundaries: whatever has been pushed is
/// handed back as one frame, truncated or concatenated as the reads were.
#[derive(Debug)]
pub struct FrameDecoder {
   framing: Framing,
   buffer: Vec<u8>,
}

impl FrameDecoder {
   pub fn new(framing: Framing) -> Self {
      Self {
         framing,
         buffer: Vec::new(),
      }
   }

   pub fn push(&mut self, bytes: &[u8]) {
      self.buffer.extend_from_slice(bytes);
   }

   /// Number of buffered bytes not yet returned as a frame.
   pub fn pending(&self) -> usize {
      self.buffer.len()
   }

   /// Pops the next complete frame body, if one is buffered.
   pub fn next_frame(&mut self) -> Option<Vec<u8>> {
      match self.framing {
         Framing::Raw => {
            if self.buffer.is_empty() {
               None
            } else {
               Some(std::mem::take(&mut self.buffer))
            }
         },
         Framing::Line => {
            let end = self.buffer.iter().position(|&b| b == b'\n')?;
            let mut line: Vec<u8> = self.buffer.drain(..=end).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
               line.pop();
            }
            Some(line)
         },
         Framing::LengthPrefixed => {
            let header: [u8; LENGTH_PREFIX_LEN] =
               self.buffer.get(..LENGTH_PREFIX_LEN)?.try_into().ok()?;
            let len = u16::from_be_bytes(header) as usize;
            if self.buffer.len() < LENGTH_PREFIX_LEN + len {
               return None;
            }
            let frame = self.buffer[LENGTH_PREFIX_LEN..LENGTH_PREFIX_LEN + len].to_vec();
            self.buffer.drain(..LENGTH_PREFIX_LEN + len);
            Some(frame)
         },
      }
   }

   /// Pops the next frame and decodes it as UTF-8.
   pub fn next_text(&mut self) -> Result<Option<String>> {
      match self.next_frame() {
         Some(frame) => Ok(Some(str::from_utf8(&frame)?.to_owned())),
         None => Ok(None),
      }
   }
}
