// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Client and server configuration.
//!
//! Plain structs with `Default` impls; defaults match the field
//! deployment this stack was written against (3 s receive timeout, 3
//! tries, 1 KiB receive buffer, client station 0x1F).

use std::net::SocketAddr;
use std::time::Duration;

/// Default receive timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// Default transfer try budget.
pub const DEFAULT_TRY_COUNT: u32 = 3;

/// Default receive buffer size in bytes.
pub const DEFAULT_BUFFER_SIZE: usize = 1024;

/// Default client station address on the field bus.
pub const DEFAULT_SOURCE_ADDR: u8 = 0x1F;

/// Transport client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// UDP address of the remote gateway.
    pub peer: SocketAddr,
    /// Our station address on the field bus.
    pub source_addr: u8,
    /// Remote station address to read from.
    pub dest_addr: u8,
    /// Shared password; `None` disables signature verification.
    pub password: Option<u32>,
    /// Bounded wait for each reply.
    pub timeout: Duration,
    /// Transfer attempts before giving up.
    pub max_tries: u32,
    /// Receive buffer size.
    pub buffer_size: usize,
}

impl ClientConfig {
    /// Configuration for `peer`/`dest_addr` with default everything else.
    #[must_use]
    pub fn new(peer: SocketAddr, dest_addr: u8) -> Self {
        Self {
            peer,
            dest_addr,
            ..Self::default()
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            peer: SocketAddr::from(([127, 0, 0, 1], 0)),
            source_addr: DEFAULT_SOURCE_ADDR,
            dest_addr: 0,
            password: None,
            timeout: DEFAULT_TIMEOUT,
            max_tries: DEFAULT_TRY_COUNT,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

/// Transport server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// UDP address to bind.
    pub bind: SocketAddr,
    /// Password used to sign replies.
    pub password: Option<u32>,
    /// Verify request signatures against the password. Off by default;
    /// the station-key scheme is obfuscation, not authentication, and
    /// legacy peers send unverifiable traffic.
    pub verify_requests: bool,
    /// Bounded wait per receive; expiry just loops the server.
    pub timeout: Duration,
    /// Receive buffer size.
    pub buffer_size: usize,
}

impl ServerConfig {
    /// Configuration for `bind` with default everything else.
    #[must_use]
    pub fn new(bind: SocketAddr) -> Self {
        Self {
            bind,
            ..Self::default()
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 0)),
            password: None,
            verify_requests: false,
            timeout: DEFAULT_TIMEOUT,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}
