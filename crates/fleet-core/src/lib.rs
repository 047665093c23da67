//! Core types and trait definitions for the fleet management backend.
//!
//! This crate is deliberately free of HTTP and database dependencies. It owns
//! the domain model, the state machines guarding it, and the
//! [`assign::AutoAssigner`].

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod assign;
pub mod assignment;
pub mod driver;
pub mod error;
pub mod stats;
pub mod store;
pub mod vehicle;

pub use error::{Error, OpError, Result, StoreError};
