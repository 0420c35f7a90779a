//! Test doubles for exercising the processor without a database.

pub mod handler;
pub mod source;
