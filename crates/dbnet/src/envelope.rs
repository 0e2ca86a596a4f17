// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! UDP transport envelope around DBNet frames.
//!
//! # Wire Format
//!
//! ```text
//! +----------------+--------+-------------+-----------+--------+-----------------+
//! | transaction_id | mode   | station_key | signature | length | encrypted frame |
//! | (u32 le)       | (u16)  | (u32 le)    | (u32 le)  | (u8)   | (length+6 bytes)|
//! +----------------+--------+-------------+-----------+--------+-----------------+
//! ```
//!
//! The length byte and encrypted frame are absent in handshake envelopes
//! (`mode::INVALID_STATION_KEY`); the length byte stores the encrypted
//! frame's size minus 6.
//!
//! # Keystream
//!
//! Two blocks are derived from the station key and transaction id:
//!
//! ```text
//! key1 = transform(station_key, !transaction_id)
//! key2 = transform(station_key, transaction_id)
//! keystream = key1 key1 key2 key2 key2 ...   (little-endian u32 blocks)
//! ```
//!
//! key1 covers exactly the first eight bytes, key2 cycles afterwards.
//! Encryption and decryption are the same XOR, so both sides derive the
//! stream from header fields alone.
//!
//! # Signature
//!
//! `transform(password, transaction_id + station_key + 256 + frame_checksum)`
//! with wrapping additions, computed over the inner frame's link-layer
//! checksum. Envelopes without an inner frame (and envelopes built without
//! a configured password) carry signature 0; captured handshake traffic
//! does the same.

use crate::cipher::transform;
use crate::frame::{Frame, FrameError};

/// Envelope modes.
pub mod mode {
    /// Regular data envelope.
    pub const NORMAL: u16 = 0x0000;
    /// Station-key handshake: the peer rejected our key and sent the
    /// current one back in the header.
    pub const INVALID_STATION_KEY: u16 = 0x1111;
}

/// Fixed header size in bytes.
pub const HEADER_SIZE: usize = 14;

/// Error during envelope encoding or decoding.
#[derive(Debug)]
pub enum EnvelopeError {
    /// Input ends inside the header.
    Truncated,
    /// Declared and actual encrypted-frame sizes disagree.
    LengthMismatch,
    /// A handshake envelope must not carry an inner frame.
    PayloadNotAllowed,
    /// Header signature does not match the decoded frame.
    SignatureMismatch,
    /// The decrypted bytes are not a valid DBNet frame.
    Frame(FrameError),
}

impl std::fmt::Display for EnvelopeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Truncated => write!(f, "truncated envelope"),
            Self::LengthMismatch => write!(f, "envelope length mismatch"),
            Self::PayloadNotAllowed => {
                write!(f, "no inner frame is allowed in a handshake envelope")
            }
            Self::SignatureMismatch => write!(f, "envelope signature mismatch"),
            Self::Frame(err) => write!(f, "inner frame: {err}"),
        }
    }
}

impl std::error::Error for EnvelopeError {}

impl From<FrameError> for EnvelopeError {
    fn from(err: FrameError) -> Self {
        Self::Frame(err)
    }
}

/// A transport envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Transaction identifier, echoed by replies.
    pub transaction_id: u32,
    /// Envelope mode, see [`mode`].
    pub mode: u16,
    /// Station key the sender believes is current.
    pub station_key: u32,
    /// Signature as received (decode) or 0 (locally constructed).
    pub signature: u32,
    /// Inner frame; `None` only in handshake envelopes and in
    /// handshake-style header-only replies.
    pub frame: Option<Frame>,
}

impl Envelope {
    /// Create a normal-mode envelope around `frame`.
    #[must_use]
    pub fn new(transaction_id: u32, station_key: u32, frame: Frame) -> Self {
        Self {
            transaction_id,
            mode: mode::NORMAL,
            station_key,
            signature: 0,
            frame: Some(frame),
        }
    }

    /// Create a handshake envelope carrying only header fields.
    #[must_use]
    pub fn handshake(transaction_id: u32, station_key: u32) -> Self {
        Self {
            transaction_id,
            mode: mode::INVALID_STATION_KEY,
            station_key,
            signature: 0,
            frame: None,
        }
    }

    /// Serialize to a datagram, encrypting the inner frame.
    ///
    /// The signature is computed here when `password` is configured and an
    /// inner frame is present; otherwise 0 is written.
    pub fn encode(&self, password: Option<u32>) -> Result<Vec<u8>, EnvelopeError> {
        if self.mode == mode::INVALID_STATION_KEY && self.frame.is_some() {
            return Err(EnvelopeError::PayloadNotAllowed);
        }

        let signature = match (password, &self.frame) {
            (Some(password), Some(frame)) => {
                self.signature_for(password, frame.checksum())
            }
            _ => 0,
        };

        let mut out = Vec::with_capacity(HEADER_SIZE);
        out.extend_from_slice(&self.transaction_id.to_le_bytes());
        out.extend_from_slice(&self.mode.to_le_bytes());
        out.extend_from_slice(&self.station_key.to_le_bytes());
        out.extend_from_slice(&signature.to_le_bytes());

        if let Some(frame) = &self.frame {
            let mut body = frame.to_vec()?;
            self.crypt(&mut body);
            out.push((body.len() - 6) as u8);
            out.extend_from_slice(&body);
        }

        Ok(out)
    }

    /// Parse a datagram, decrypting and validating the inner frame.
    ///
    /// Signature verification runs only when `password` is configured and
    /// the envelope carries a frame.
    pub fn decode(data: &[u8], password: Option<u32>) -> Result<Self, EnvelopeError> {
        if data.len() < HEADER_SIZE {
            return Err(EnvelopeError::Truncated);
        }

        let transaction_id = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
        let env_mode = u16::from_le_bytes([data[4], data[5]]);
        let station_key = u32::from_le_bytes([data[6], data[7], data[8], data[9]]);
        let signature = u32::from_le_bytes([data[10], data[11], data[12], data[13]]);

        let mut envelope = Self {
            transaction_id,
            mode: env_mode,
            station_key,
            signature,
            frame: None,
        };

        if data.len() == HEADER_SIZE {
            return Ok(envelope);
        }

        let marker = usize::from(data[HEADER_SIZE]);
        let encrypted = &data[HEADER_SIZE + 1..];
        if encrypted.len() != marker + 6 {
            return Err(EnvelopeError::LengthMismatch);
        }

        let mut body = encrypted.to_vec();
        envelope.crypt(&mut body);
        let frame = Frame::decode(&body)?;

        if let Some(password) = password {
            if envelope.signature_for(password, frame.checksum()) != signature {
                return Err(EnvelopeError::SignatureMismatch);
            }
        }

        envelope.frame = Some(frame);
        Ok(envelope)
    }

    fn signature_for(&self, password: u32, frame_checksum: u8) -> u32 {
        transform(
            password,
            self.transaction_id
                .wrapping_add(self.station_key)
                .wrapping_add(256)
                .wrapping_add(u32::from(frame_checksum)),
        )
    }

    /// XOR `body` against the envelope's keystream. Encryption and
    /// decryption are the same operation.
    fn crypt(&self, body: &mut [u8]) {
        let key1 = transform(self.station_key, !self.transaction_id).to_le_bytes();
        let key2 = transform(self.station_key, self.transaction_id).to_le_bytes();
        for (i, byte) in body.iter_mut().enumerate() {
            let key = if i < 8 { key1 } else { key2 };
            *byte ^= key[i % 4];
        }
    }
}
