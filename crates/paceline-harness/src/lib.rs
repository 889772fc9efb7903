//! Deterministic test harness for the Paceline messaging stack.
//!
//! In-memory implementations of the transport boundary for reproducible
//! testing: transport-assigned ids, a logical clock for timestamps, full-list
//! pushes on every mutation, and deterministic failure injection for send and
//! subscribe paths.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod memory_transport;
pub mod wait;

pub use memory_transport::MemoryTransport;
pub use wait::wait_for;
