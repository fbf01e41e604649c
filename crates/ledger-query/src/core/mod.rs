//! Core types, errors and the upstream RPC port

pub mod error;
pub mod traits;
pub mod types;
