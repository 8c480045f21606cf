//! Batch runs over the mailbox.
//!
//! 1. `fetch::fetch_and_store()`: provider → local store
//! 2. `processor::RuleProcessor::run()`: every stored message × every rule,
//!    firing rules dispatched through the action executor

pub mod fetch;
pub mod processor;

pub use fetch::{FetchSummary, fetch_and_store};
pub use processor::{RuleProcessor, RunSummary};
