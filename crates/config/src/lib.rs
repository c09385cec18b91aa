//! Configuration for acc.
//!
//! The [`ini`] module holds a small streaming INI reader; [`AccountConfig`]
//! collects the keys the client understands from its entries.

pub mod account;
pub mod error;
pub mod ini;

pub use {
    account::AccountConfig,
    error::ConfigError,
    ini::{ConfigEntry, ConfigSource, OwnedEntry},
};
