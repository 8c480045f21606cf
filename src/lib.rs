//! mail-rules: fetch mail, store it locally, and apply user-defined rules.

pub mod cli;
pub mod config;
pub mod error;
pub mod message;
pub mod pipeline;
pub mod provider;
pub mod rules;
pub mod store;
