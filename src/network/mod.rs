//! Network layer - request execution
//!
//! The executor resolves a request, sends it, and turns whatever happens
//! into an [`Outcome`](crate::models::Outcome).

pub mod client;

pub use client::{classify_error, Executor};
