//! Domain model for the word-token registry.

pub mod aggregates;
pub mod combine;
pub mod commands;
pub mod creation;
pub mod events;
pub mod fulfillment;
pub mod ledger;
pub mod registry;
pub mod word;
pub mod word_bank;
