//! Cryptographic primitives shared by the remote and the receiver.
//!
//! Everything here is deterministic and allocation-free: the BlowFish32
//! cipher engine, its offline key schedule, and the CRC-8 used to gate frame
//! acceptance. The cipher is an intentionally narrowed 32-bit-block variant
//! built for parts with a few hundred bytes of RAM. It makes no
//! general-purpose strength claims and is only meant to keep a captured
//! rolling code from being forged or replayed within its window.

pub mod blowfish32;
pub mod crc8;
pub mod keygen;
