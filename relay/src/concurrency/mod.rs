//! Concurrency primitives used by the relay.

pub mod shutdown;
