// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Transport client: transaction sequencing, station-key discovery, and
//! the retry loop.
//!
//! # Transfer Flow
//!
//! ```text
//! transfer(msg_id, payload)
//!     |
//!     v
//! +-> send envelope (fresh transaction id, cached station key)
//! |       |
//! |       v
//! |   wait for reply -- timeout/decode error --> count attempt, resend
//! |       |
//! |       v
//! |   refresh cached station key from reply header
//! |       |
//! |       +-- transaction id mismatch --> count attempt, resend
//! |       |
//! +------ +-- INVALID_STATION_KEY ------> resend, NOT counted
//!         |
//!         v
//!     return (msg_id, payload) of the inner frame
//! ```
//!
//! The handshake branch is how peers hand out the current station key: a
//! fresh client sends key 0, the peer answers `INVALID_STATION_KEY` with
//! the real key in the header, and the next send uses it.

use std::collections::HashMap;
use std::io;
use std::time::Duration;

use crate::config::ClientConfig;
use crate::envelope::{mode, Envelope, EnvelopeError};
use crate::frame::Frame;
use crate::link::{Link, UdpLink};

/// Error from a [`Client::transfer`] call.
#[derive(Debug)]
pub enum TransferError {
    /// The local socket failed to send.
    Io(io::Error),
    /// The outgoing envelope could not be built.
    Envelope(EnvelopeError),
    /// Try budget exhausted; carries one description per failed attempt.
    Failed(Vec<String>),
}

impl std::fmt::Display for TransferError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "send failed: {err}"),
            Self::Envelope(err) => write!(f, "request envelope: {err}"),
            Self::Failed(attempts) => write!(
                f,
                "failed to receive a valid reply ({})",
                attempts.join(", ")
            ),
        }
    }
}

impl std::error::Error for TransferError {}

impl From<EnvelopeError> for TransferError {
    fn from(err: EnvelopeError) -> Self {
        Self::Envelope(err)
    }
}

/// DBNet/UDP transport client.
///
/// One request is in flight at a time; callers sharing a client across
/// register handles must serialize `transfer` calls.
pub struct Client {
    link: Box<dyn Link>,
    source_addr: u8,
    dest_addr: u8,
    password: Option<u32>,
    timeout: Duration,
    max_tries: u32,
    buffer_size: usize,
    transaction_id: u32,
    station_keys: HashMap<u8, u32>,
}

impl Client {
    /// Create a client over a UDP socket with an OS-assigned local port.
    pub fn connect(config: ClientConfig) -> io::Result<Self> {
        let link = UdpLink::connect(config.peer)?;
        Ok(Self::with_link(config, Box::new(link)))
    }

    /// Create a client over an arbitrary link.
    #[must_use]
    pub fn with_link(config: ClientConfig, link: Box<dyn Link>) -> Self {
        Self {
            link,
            source_addr: config.source_addr,
            dest_addr: config.dest_addr,
            password: config.password,
            timeout: config.timeout,
            max_tries: config.max_tries,
            buffer_size: config.buffer_size,
            transaction_id: 0,
            station_keys: HashMap::new(),
        }
    }

    /// Station key currently cached for the destination (0 when unseen).
    #[must_use]
    pub fn station_key(&self) -> u32 {
        self.station_keys.get(&self.dest_addr).copied().unwrap_or(0)
    }

    /// Perform one transfer: send `msg_id`/`payload`, return the reply
    /// frame's message id and payload.
    ///
    /// Retries on timeouts, undecodable datagrams, and stale transaction
    /// ids up to the configured try budget. Station-key handshakes resend
    /// immediately without consuming the budget.
    pub fn transfer(
        &mut self,
        msg_id: u8,
        payload: Option<&[u8]>,
    ) -> Result<(u8, Option<Vec<u8>>), TransferError> {
        let mut attempts: Vec<String> = Vec::new();

        while (attempts.len() as u32) < self.max_tries {
            self.transaction_id = self.transaction_id.wrapping_add(1);
            let transaction_id = self.transaction_id;
            let station_key = self.station_key();

            let frame = Frame {
                source: self.source_addr,
                dest: self.dest_addr,
                msg_id,
                payload: payload.map(<[u8]>::to_vec),
            };
            let datagram = Envelope::new(transaction_id, station_key, frame)
                .encode(self.password)?;

            self.link.send(&datagram).map_err(TransferError::Io)?;
            log::debug!(
                "transfer {transaction_id}: sent msg_id={msg_id:#04x} to station {} (key {station_key:#010x})",
                self.dest_addr
            );

            let reply = match self.receive() {
                Ok(reply) => reply,
                Err(description) => {
                    log::debug!("transfer {transaction_id}: {description}");
                    attempts.push(description);
                    continue;
                }
            };

            // The reply's station key is authoritative even when the rest
            // of the datagram is stale.
            self.station_keys.insert(self.dest_addr, reply.station_key);

            if reply.transaction_id != transaction_id {
                attempts.push("transaction identifier mismatch".to_string());
                continue;
            }

            if reply.mode == mode::INVALID_STATION_KEY {
                log::debug!(
                    "transfer {transaction_id}: station key refreshed to {:#010x}, resending",
                    reply.station_key
                );
                continue;
            }

            match reply.frame {
                Some(frame) => {
                    log::debug!(
                        "transfer {transaction_id}: reply msg_id={:#04x}, {} payload bytes",
                        frame.msg_id,
                        frame.payload.as_ref().map_or(0, Vec::len)
                    );
                    return Ok((frame.msg_id, frame.payload));
                }
                None => {
                    attempts.push("reply carried no frame".to_string());
                }
            }
        }

        Err(TransferError::Failed(attempts))
    }

    fn receive(&mut self) -> Result<Envelope, String> {
        let mut buf = vec![0u8; self.buffer_size];
        match self.link.recv_timeout(&mut buf, self.timeout) {
            Ok(n) => Envelope::decode(&buf[..n], self.password).map_err(|err| err.to_string()),
            Err(err)
                if matches!(err.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) =>
            {
                Err("receive timed out".to_string())
            }
            Err(err) => Err(format!("receive failed: {err}")),
        }
    }
}
