// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Transport server: receive envelopes, dispatch to a handler, reply.
//!
//! The server answers each decodable request with an envelope echoing the
//! request's transaction id, carrying a fixed sentinel station key and a
//! frame with swapped source/destination addresses. Malformed datagrams
//! are logged and dropped; receive timeouts just loop.
//!
//! The handler receives `(msg_id, payload)` and returns an optional
//! `(reply_msg_id, reply_payload)`. Declining produces an empty reply
//! with message id 0.

use std::io;
use std::net::UdpSocket;

use socket2::{Domain, Protocol, Socket, Type};

use crate::config::ServerConfig;
use crate::envelope::Envelope;
use crate::frame::Frame;

/// Station key stamped into every reply instead of a per-client key.
pub const SERVER_STATION_KEY: u32 = 0x0BAD_F00D;

/// Handler result: a reply message id and optional payload, or `None` to
/// send the empty default reply.
pub type HandlerReply = Option<(u8, Option<Vec<u8>>)>;

/// DBNet/UDP transport server.
pub struct Server {
    socket: UdpSocket,
    password: Option<u32>,
    verify_requests: bool,
    buffer_size: usize,
}

impl Server {
    /// Bind the server socket.
    pub fn bind(config: ServerConfig) -> io::Result<Self> {
        let domain = if config.bind.is_ipv4() {
            Domain::IPV4
        } else {
            Domain::IPV6
        };
        let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        socket.bind(&config.bind.into())?;

        let socket: UdpSocket = socket.into();
        socket.set_read_timeout(Some(config.timeout))?;
        log::info!("server listening on {}", socket.local_addr()?);

        Ok(Self {
            socket,
            password: config.password,
            verify_requests: config.verify_requests,
            buffer_size: config.buffer_size,
        })
    }

    /// Local address of the bound socket.
    pub fn local_addr(&self) -> io::Result<std::net::SocketAddr> {
        self.socket.local_addr()
    }

    /// Receive and answer one datagram.
    ///
    /// # Returns
    ///
    /// `Ok(true)` when a datagram was received (answered or dropped),
    /// `Ok(false)` when the receive timed out.
    pub fn serve_once<F>(&mut self, handler: &mut F) -> io::Result<bool>
    where
        F: FnMut(u8, Option<&[u8]>) -> HandlerReply,
    {
        let mut buf = vec![0u8; self.buffer_size];
        let (len, peer) = match self.socket.recv_from(&mut buf) {
            Ok(received) => received,
            Err(err)
                if matches!(err.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) =>
            {
                return Ok(false);
            }
            Err(err) => return Err(err),
        };

        let verify_with = if self.verify_requests {
            self.password
        } else {
            None
        };
        let request = match Envelope::decode(&buf[..len], verify_with) {
            Ok(request) => request,
            Err(err) => {
                log::warn!("dropping malformed datagram from {peer}: {err}");
                return Ok(true);
            }
        };

        let Some(frame) = request.frame else {
            log::debug!("dropping frameless envelope from {peer}");
            return Ok(true);
        };

        let (reply_msg_id, reply_payload) =
            handler(frame.msg_id, frame.payload.as_deref()).unwrap_or((0, None));

        let reply_frame = Frame {
            source: frame.dest,
            dest: frame.source,
            msg_id: reply_msg_id,
            payload: reply_payload,
        };
        let reply = Envelope::new(request.transaction_id, SERVER_STATION_KEY, reply_frame);
        match reply.encode(self.password) {
            Ok(datagram) => {
                self.socket.send_to(&datagram, peer)?;
                log::debug!(
                    "answered transaction {} from {peer} with msg_id={reply_msg_id:#04x}",
                    request.transaction_id
                );
            }
            Err(err) => log::warn!("could not encode reply for {peer}: {err}"),
        }

        Ok(true)
    }

    /// Serve forever on the current thread.
    pub fn run<F>(&mut self, mut handler: F) -> io::Result<()>
    where
        F: FnMut(u8, Option<&[u8]>) -> HandlerReply,
    {
        loop {
            self.serve_once(&mut handler)?;
        }
    }
}
