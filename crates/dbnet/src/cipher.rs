// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! 32-bit block transform shared by keystream derivation and signatures.
//!
//! This is the controller's legacy obfuscation primitive, not a modern
//! cipher. It composes only additions and multiplications, so reducing
//! modulo 2^32 at every step (wrapping arithmetic) gives the same result
//! as reducing once at the end.
//!
//! A zero input block is substituted with 1 before the internal rounds,
//! but the original zero is still the value added into the final sum.
//! Peer devices depend on that asymmetry; `transform(k, 0)` is exactly
//! `transform(k, 1) - 1`.
//!
//! # Test Vector
//!
//! ```
//! use dbnet::cipher::transform;
//!
//! assert_eq!(transform(48414, 1), 0x8876_AA92);
//! assert_eq!(transform(48414, 0), 0x8876_AA91);
//! ```

/// Transform a single 32-bit block under `key`.
#[must_use]
pub fn transform(key: u32, data: u32) -> u32 {
    let mut a = if data == 0 { 1 } else { data };
    let mut b = key.wrapping_mul(a);

    for _ in 0..4 {
        a = a.wrapping_mul(2).wrapping_add(13);
        b = key.wrapping_mul(a.wrapping_add(b));
    }

    a.wrapping_add(data).wrapping_add(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Pinned vectors; the 48414 key is the station password used by the
    /// captured-traffic fixtures.
    #[test]
    fn test_known_vectors() {
        assert_eq!(transform(48414, 1), 0x8876_AA92);
        assert_eq!(transform(48414, 2), 0xFA2B_6083);
        assert_eq!(transform(48414, 0xDEAD_BEEF), 0x4F5D_AEA0);
        assert_eq!(transform(0, 12345), 0x0003_348C);
        assert_eq!(transform(0xFFFF_FFFF, 0xFFFF_FFFF), 0x0000_003B);
        assert_eq!(transform(0x0BAD_F00D, 0x1234_5678), 0xD835_B5ED);
        assert_eq!(transform(1, 1), 0x0000_0245);
        assert_eq!(transform(0xEB2B_9487, 0xE129_B521), 0x83B1_38BF);
    }

    #[test]
    fn test_zero_block_asymmetry() {
        // Internal rounds run as if the block were 1, yet the final sum
        // adds back the original zero.
        assert_eq!(transform(48414, 0), transform(48414, 1).wrapping_sub(1));
        assert_eq!(transform(48414, 0), 0x8876_AA91);
        assert_eq!(transform(0, 0), 0x0000_00D3);
    }

    #[test]
    fn test_zero_key() {
        // A zero key collapses b to 0; only the a-chain and data survive.
        // a: 12345 -> 24703 -> 49419 -> 98851 -> 197715, + 12345 = 210060.
        assert_eq!(transform(0, 12345), 210_060);
    }

    #[test]
    fn test_deterministic() {
        for key in [0u32, 1, 48414, 0xFFFF_FFFF] {
            for data in [0u32, 1, 2, 0x8000_0000, 0xFFFF_FFFF] {
                assert_eq!(transform(key, data), transform(key, data));
            }
        }
    }
}
