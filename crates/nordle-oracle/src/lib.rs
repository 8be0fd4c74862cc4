//! Nordle oracle boundary.
//!
//! Everything between the registry and an off-chain oracle: issuing request
//! ids, decoding answers, queueing callbacks for the fulfillment worker, and
//! sweeping requests whose callback never came.

pub mod codec;
pub mod dispatcher;
pub mod gateway;
pub mod sweeper;
