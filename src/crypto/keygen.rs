//! BlowFish32 key schedule: derives the production subkey tables from an
//! operator-entered hexadecimal seed.
//!
//! This runs once, offline, per deployment group (see `rks keygen`); it is
//! never invoked while messages are being processed. The derivation is
//! deterministic, so re-running it with the same seed reproduces the same
//! tables on any host.

use thiserror::Error;

use super::blowfish32::{self, Subkeys};

/// Normalized seed length in bytes (18 words, the size of the P array).
pub const SEED_BYTES: usize = 36;

/// Initial subkey tables, preloaded with the hexadecimal digits of pi.
/// The seed is folded over P before the schedule rewrites every word.
const INIT: Subkeys = Subkeys {
    p: [
        0x243F, 0x6A88, 0x85A3, 0x08D3, 0x1319, 0x8A2E, 0x0370, 0x7344, 0xA409,
        0x3822, 0x299F, 0x31D0, 0x082E, 0xFA98, 0xEC4E, 0x6C89, 0x4528, 0x21E6,
    ],
    s1: [
        0x38D0, 0x1377, 0xBE54, 0x66CF, 0x34E9, 0x0C6C, 0xC0AC, 0x29B7,
        0xC97C, 0x50DD, 0x3F84, 0xD5B5, 0xB547, 0x0917, 0x9216, 0xD5D9,
    ],
    s2: [
        0x8979, 0xD131, 0x0BA6, 0x98DF, 0xB5AC, 0x2FFD, 0x72DB, 0xD01A,
        0xDFB7, 0xB8E1, 0xAFED, 0x6A26, 0x7E96, 0xBA7C, 0x9045, 0xF12C,
    ],
    s3: [
        0x7F99, 0x24A1, 0x9947, 0xB391, 0x6CF7, 0x0801, 0xF2E2, 0x858E,
        0xFC16, 0x6369, 0x20D8, 0x7157, 0x4E69, 0xA458, 0xFEA3, 0xF493,
    ],
    s4: [
        0x3D7E, 0x0D95, 0x748F, 0x728E, 0xB658, 0x718B, 0xCD58, 0x8215,
        0x4AEE, 0x7B54, 0xA41D, 0xC25A, 0x59B5, 0x9C30, 0xD539, 0x2AF2,
    ],
};

/// Seed validation errors. A partial or invalid seed is never accepted;
/// the caller re-prompts or aborts.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SeedError {
    #[error("seed is empty")]
    Empty,
    #[error("seed contains a non-hexadecimal character {0:?}")]
    NotHex(char),
}

/// Normalize an operator-entered hex string to the fixed 36-byte seed
/// buffer.
///
/// Hex digits are consumed high-nibble first, two per byte, filling the
/// buffer round-robin. Iteration always covers `max(len, 72)` digits, so a
/// short input is extended cyclically and a long input folds back onto the
/// buffer with XOR; every output byte is touched at least once either way.
pub fn normalize_seed(input: &str) -> Result<[u8; SEED_BYTES], SeedError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(SeedError::Empty);
    }

    let mut digits = Vec::with_capacity(input.len());
    for c in input.chars() {
        match c.to_digit(16) {
            Some(d) => digits.push(d as u8),
            None => return Err(SeedError::NotHex(c)),
        }
    }

    let mut buf = [0u8; SEED_BYTES];
    for idx in 0..digits.len().max(SEED_BYTES * 2) {
        let shift = if idx % 2 == 0 { 4 } else { 0 };
        buf[(idx / 2) % SEED_BYTES] ^= digits[idx % digits.len()] << shift;
    }
    Ok(buf)
}

/// Derive the production subkey tables from an operator seed.
///
/// The normalized seed words are XORed over the pi-seeded P array, then a
/// running 32-bit accumulator is repeatedly encrypted and spliced into the
/// next unfilled pair of words, first through all of P, then S1..S4 in
/// order. Each encryption uses the latest partially-updated table, so every
/// word depends on all the words generated before it.
pub fn derive(seed: &str) -> Result<Subkeys, SeedError> {
    let norm = normalize_seed(seed)?;
    let mut keys = INIT;

    // Seed words are read little-endian; the word width here is a fixed
    // property of the schedule, not a host assumption.
    for i in 0..18 {
        keys.p[i] ^= u16::from_le_bytes([norm[2 * i], norm[2 * i + 1]]);
    }

    let mut block: u32 = 0;
    for i in (0..18).step_by(2) {
        block = blowfish32::encrypt(&keys, block);
        keys.p[i] = (block >> 16) as u16;
        keys.p[i + 1] = block as u16;
    }

    for sbox_idx in 0..4 {
        for i in (0..16).step_by(2) {
            block = blowfish32::encrypt(&keys, block);
            let hi = (block >> 16) as u16;
            let lo = block as u16;
            let sbox = match sbox_idx {
                0 => &mut keys.s1,
                1 => &mut keys.s2,
                2 => &mut keys.s3,
                _ => &mut keys.s4,
            };
            sbox[i] = hi;
            sbox[i + 1] = lo;
        }
    }

    Ok(keys)
}
