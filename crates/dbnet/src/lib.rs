// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # DBNet over UDP
//!
//! Client and server for the DBNet industrial field-bus protocol tunneled
//! over UDP: typed register reads (scalars and matrices) from remote
//! controller stations.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use parking_lot::Mutex;
//! use dbnet::{Client, ClientConfig, Register};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = ClientConfig::new("10.0.0.202:59".parse()?, 4);
//!     config.password = Some(48414);
//!
//!     let client = Arc::new(Mutex::new(Client::connect(config)?));
//!     let mut temperatures = Register::new(client, 4112, "MF[25,1]")?;
//!
//!     let matrix = temperatures.update()?;
//!     println!("{:?}", matrix.values);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +--------------------------------------------------------------+
//! |                     Register / BatchPlan                     |
//! |    typed handles, batch splitting, matrix reassembly         |
//! +--------------------------------------------------------------+
//! |                  ReadRequest / ReadResponse                  |
//! |        typed request and response wire formats               |
//! +--------------------------------------------------------------+
//! |                      Client / Server                         |
//! |   transaction ids, station-key cache, retries, handshake     |
//! +--------------------------------------------------------------+
//! |                         Envelope                             |
//! |     UDP header, keystream cipher, signature                  |
//! +--------------------------------------------------------------+
//! |                          Frame                               |
//! |        DBNet link-layer framing and checksum                 |
//! +--------------------------------------------------------------+
//! ```
//!
//! One datagram carries one envelope; one envelope carries at most one
//! frame. The cipher is the controller's legacy obfuscation scheme
//! reproduced bit-exactly, not a security boundary.

/// Batch planning for oversized matrix reads.
pub mod batch;
/// End-around-carry frame checksum.
pub mod checksum;
/// 32-bit block transform for keystreams and signatures.
pub mod cipher;
/// Transport client.
pub mod client;
/// Client and server configuration.
pub mod config;
/// UDP transport envelope.
pub mod envelope;
/// DBNet link-layer framing.
pub mod frame;
/// Datagram link abstraction.
pub mod link;
/// Long-lived register handles.
pub mod register;
/// Typed values and request/response codecs.
pub mod registers;
/// Transport server.
pub mod server;

pub use batch::{BatchPlan, Span};
pub use client::{Client, TransferError};
pub use config::{ClientConfig, ServerConfig};
pub use envelope::{Envelope, EnvelopeError};
pub use frame::{Frame, FrameError, PAYLOAD_SIZE_LIMIT};
pub use link::{Link, LoopbackLink, UdpLink};
pub use register::{Register, UpdateError};
pub use registers::{
    ElementKind, Matrix, ReadRequest, ReadResponse, RegisterError, RegisterType, Values,
};
pub use server::{Server, SERVER_STATION_KEY};

#[cfg(test)]
mod fuzz_tests {
    //! Fuzz-lite tests: decoders must never panic on malformed input.

    use crate::envelope::Envelope;
    use crate::frame::Frame;
    use crate::registers::{ReadRequest, ReadResponse, RegisterType};

    fn random_buf(rng: &mut fastrand::Rng, max_len: usize) -> Vec<u8> {
        let len = rng.usize(0..=max_len);
        (0..len).map(|_| rng.u8(..)).collect()
    }

    #[test]
    fn test_frame_decode_no_panic() {
        let mut rng = fastrand::Rng::with_seed(12345);
        for _ in 0..10_000 {
            let mut buf = random_buf(&mut rng, 300);
            let _ = Frame::decode(&buf);

            // Bias towards plausible preambles to reach deeper paths.
            if !buf.is_empty() {
                buf[0] = if rng.bool() { 0x10 } else { 0x68 };
                let _ = Frame::decode(&buf);
            }
        }
    }

    #[test]
    fn test_envelope_decode_no_panic() {
        let mut rng = fastrand::Rng::with_seed(67890);
        for _ in 0..10_000 {
            let buf = random_buf(&mut rng, 300);
            let _ = Envelope::decode(&buf, None);
            let _ = Envelope::decode(&buf, Some(48414));
        }
    }

    #[test]
    fn test_register_codecs_no_panic() {
        let mut rng = fastrand::Rng::with_seed(11111);
        let ty = RegisterType::parse("MF[4,4]").expect("type");
        let request = ReadRequest::new(1, ty, 0, 0, 4, 4).expect("request");

        for _ in 0..10_000 {
            let buf = random_buf(&mut rng, 80);
            let _ = ReadRequest::decode(&buf);
            let _ = ReadResponse::decode(&buf, &request);
        }
    }

    #[test]
    fn test_descriptor_parse_no_panic() {
        let mut rng = fastrand::Rng::with_seed(22222);
        let alphabet = b"MIF L[],0129x";
        for _ in 0..10_000 {
            let len = rng.usize(0..16);
            let descriptor: String = (0..len)
                .map(|_| alphabet[rng.usize(0..alphabet.len())] as char)
                .collect();
            let _ = RegisterType::parse(&descriptor);
        }
    }

    #[test]
    fn test_edge_cases_no_panic() {
        let _ = Frame::decode(&[]);
        let _ = Frame::decode(&[0x10]);
        let _ = Frame::decode(&[0x68]);
        let _ = Frame::decode(&[0x68, 0x00, 0x00, 0x68, 0, 0, 0, 0, 0x16]);
        let _ = Envelope::decode(&[], None);
        let _ = Envelope::decode(&[0u8; 14], None);
        let _ = Envelope::decode(&[0u8; 15], None);
        let _ = Envelope::decode(&[0xFF; 300], Some(0));
        let _ = ReadRequest::decode(&[]);
        let _ = RegisterType::parse("");
    }
}
