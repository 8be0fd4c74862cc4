//! Route modules.

pub mod collections;
pub mod health;
pub mod oracle;
pub mod word_bank;
