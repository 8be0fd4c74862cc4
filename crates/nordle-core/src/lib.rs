//! Nordle core: shared domain abstractions.
//!
//! This crate defines the traits and value types that the word-token
//! registry, the event stores and the oracle boundary all depend on. It
//! contains no infrastructure code.

pub mod aggregate;
pub mod clock;
pub mod command;
pub mod error;
pub mod event;
pub mod ids;
pub mod oracle;
pub mod repository;
pub mod rng;
