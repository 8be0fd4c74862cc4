//! Nordle word-token registry: collections, their requests and tokens.
//!
//! Responsible for the asynchronous oracle request lifecycle: recording
//! pending create/combine requests, locking their input tokens, and applying
//! each fulfillment as one atomic batch of mint/burn events against the
//! word registry.

pub mod application;
pub mod domain;
