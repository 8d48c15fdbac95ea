//! BlowFish32 cipher engine.
//!
//! A reduced-block variant of Bruce Schneier's 1993 Blowfish cipher: the
//! block is shrunk from 64 to 32 bits and the S-box index from 8 to 4 bits
//! so the subkey tables fit alongside everything else in a small
//! microcontroller's RAM. The 16-round Feistel structure is unchanged.
//!
//! Every call takes an explicit [`Subkeys`] context. Tables are fully
//! populated by the key schedule before the first encrypt/decrypt call and
//! never mutated afterwards; every device of a deployment group carries an
//! identical copy.

use serde::{Deserialize, Serialize};

/// The cipher subkey tables: 18 P words and four 16-entry S-boxes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subkeys {
    pub p: [u16; 18],
    pub s1: [u16; 16],
    pub s2: [u16; 16],
    pub s3: [u16; 16],
    pub s4: [u16; 16],
}

/// Encrypt a single 32-bit block.
pub fn encrypt(keys: &Subkeys, block: u32) -> u32 {
    let mut hi = (block >> 16) as u16;
    let mut lo = block as u16;

    for i in 0..16 {
        hi ^= keys.p[i];
        lo ^= feistel(keys, hi);
        std::mem::swap(&mut hi, &mut lo);
    }
    std::mem::swap(&mut hi, &mut lo);
    hi ^= keys.p[16];
    lo ^= keys.p[17];

    ((hi as u32) << 16) | lo as u32
}

/// Decrypt a single 32-bit block. Exact algebraic inverse of [`encrypt`]:
/// the same P-indexed XORs and swaps, applied in reverse order.
pub fn decrypt(keys: &Subkeys, block: u32) -> u32 {
    let mut hi = (block >> 16) as u16;
    let mut lo = block as u16;

    hi ^= keys.p[16];
    lo ^= keys.p[17];
    std::mem::swap(&mut hi, &mut lo);
    for i in (0..16).rev() {
        std::mem::swap(&mut hi, &mut lo);
        lo ^= feistel(keys, hi);
        hi ^= keys.p[i];
    }

    ((hi as u32) << 16) | lo as u32
}

/// The Feistel round function: the half-block is split into four 4-bit
/// nibbles (d1 = bits 0-3 .. d4 = bits 12-15) and mixed through the S-boxes
/// with wrapping 16-bit adds and an XOR.
pub fn feistel(keys: &Subkeys, half: u16) -> u16 {
    let d1 = (half & 0x0F) as usize;
    let d2 = ((half >> 4) & 0x0F) as usize;
    let d3 = ((half >> 8) & 0x0F) as usize;
    let d4 = ((half >> 12) & 0x0F) as usize;
    (keys.s1[d1].wrapping_add(keys.s2[d2]) ^ keys.s3[d3]).wrapping_add(keys.s4[d4])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keygen;
    use rand::Rng;

    fn test_keys() -> Subkeys {
        keygen::derive("573BE15A").unwrap()
    }

    #[test]
    fn roundtrip_boundary_values() {
        let keys = test_keys();
        for x in [
            0x0000_0000,
            0x0000_0001,
            0x0000_FFFF,
            0xFFFF_0000,
            0x8000_0000,
            0x7FFF_FFFF,
            0xFFFF_FFFF,
        ] {
            assert_eq!(decrypt(&keys, encrypt(&keys, x)), x, "x = {x:#010x}");
            assert_eq!(encrypt(&keys, decrypt(&keys, x)), x, "x = {x:#010x}");
        }
    }

    #[test]
    fn roundtrip_random_values() {
        let keys = test_keys();
        let mut rng = rand::thread_rng();
        for _ in 0..10_000 {
            let x: u32 = rng.gen();
            assert_eq!(decrypt(&keys, encrypt(&keys, x)), x, "x = {x:#010x}");
        }
    }

    #[test]
    fn encryption_is_not_identity() {
        let keys = test_keys();
        // A cipher that passes the roundtrip tests by doing nothing would
        // also pass every protocol test, so rule that out explicitly.
        let mut moved = 0;
        for x in 0..64u32 {
            if encrypt(&keys, x) != x {
                moved += 1;
            }
        }
        assert!(moved >= 63);
    }

    #[test]
    fn different_keys_disagree() {
        let a = keygen::derive("573BE15A").unwrap();
        let b = keygen::derive("573BE15B").unwrap();
        assert_ne!(encrypt(&a, 0xDEAD_BEEF), encrypt(&b, 0xDEAD_BEEF));
    }
}
