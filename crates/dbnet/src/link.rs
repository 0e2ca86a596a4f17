// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Datagram link abstraction for the transport client.
//!
//! Envelope boundaries equal datagram boundaries, so the client only needs
//! two operations: send one datagram to the peer and receive one with a
//! bounded wait. `UdpLink` is the production implementation;
//! `LoopbackLink` pairs two in-memory endpoints for tests.

use std::collections::VecDeque;
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// A bidirectional datagram link to a single peer.
pub trait Link: Send + Sync {
    /// Send one datagram.
    fn send(&self, datagram: &[u8]) -> io::Result<()>;

    /// Receive one datagram into `buf`, waiting at most `timeout`.
    ///
    /// # Returns
    ///
    /// Number of bytes received; `ErrorKind::TimedOut` or
    /// `ErrorKind::WouldBlock` when the wait expires.
    fn recv_timeout(&self, buf: &mut [u8], timeout: Duration) -> io::Result<usize>;
}

/// UDP link to a fixed peer address.
pub struct UdpLink {
    socket: UdpSocket,
    peer: SocketAddr,
}

impl UdpLink {
    /// Create a link with an OS-assigned local port.
    pub fn connect(peer: SocketAddr) -> io::Result<Self> {
        let bind = if peer.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16, 0, 0, 0, 0, 0, 0, 0], 0))
        };
        let socket = UdpSocket::bind(bind)?;
        Ok(Self { socket, peer })
    }

    /// Wrap an existing socket.
    #[must_use]
    pub fn from_socket(socket: UdpSocket, peer: SocketAddr) -> Self {
        Self { socket, peer }
    }

    /// Local address of the underlying socket.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Peer address datagrams are sent to.
    #[must_use]
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

impl Link for UdpLink {
    fn send(&self, datagram: &[u8]) -> io::Result<()> {
        self.socket.send_to(datagram, self.peer)?;
        Ok(())
    }

    fn recv_timeout(&self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        self.socket.set_read_timeout(Some(timeout))?;
        self.socket.recv(buf)
    }
}

/// One endpoint of an in-memory link pair.
///
/// Datagrams sent on one endpoint become receivable on the other, in
/// order. Useful for exercising the client against a scripted peer
/// without sockets.
pub struct LoopbackLink {
    tx: Arc<Mutex<VecDeque<Vec<u8>>>>,
    rx: Arc<Mutex<VecDeque<Vec<u8>>>>,
}

impl LoopbackLink {
    /// Create two connected endpoints.
    #[must_use]
    pub fn pair() -> (Self, Self) {
        let a = Arc::new(Mutex::new(VecDeque::new()));
        let b = Arc::new(Mutex::new(VecDeque::new()));
        (
            Self {
                tx: Arc::clone(&a),
                rx: Arc::clone(&b),
            },
            Self { tx: b, rx: a },
        )
    }
}

impl Link for LoopbackLink {
    fn send(&self, datagram: &[u8]) -> io::Result<()> {
        self.tx.lock().push_back(datagram.to_vec());
        Ok(())
    }

    fn recv_timeout(&self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(datagram) = self.rx.lock().pop_front() {
                let len = datagram.len().min(buf.len());
                buf[..len].copy_from_slice(&datagram[..len]);
                return Ok(len);
            }
            if Instant::now() >= deadline {
                return Err(io::Error::new(io::ErrorKind::TimedOut, "receive timed out"));
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }
}
