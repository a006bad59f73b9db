//! Remote API transport.

pub mod client;

pub use client::{ApiClient, GraphQlError};
