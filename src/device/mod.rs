//! Collaborator interfaces for everything outside the protocol core.
//!
//! The physical world (radio line coding, EEPROM cells, the character
//! panel, front-panel buttons, the bolt motor) sits behind the traits in
//! these modules. The protocol layer only ever talks to the traits, so the
//! same state machine runs against the loopback/in-memory implementations
//! in tests and `rks simulate` as would run against hardware bindings.

pub mod controls;
pub mod panel;
pub mod storage;
pub mod transport;
