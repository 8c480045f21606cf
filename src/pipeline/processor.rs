//! Rule processing run.
//!
//! Every stored message is matched against every rule independently, in
//! rule-set order. Each rule that fires has its actions dispatched. Evaluation
//! and action failures are counted and logged; only store read failures abort
//! the run. Under a dry-run executor actions are counted as simulated and the
//! store is left as it was.

use std::fmt;
use std::ops::AddAssign;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::error::Result;
use crate::message::Message;
use crate::rules::dispatcher::ActionDispatcher;
use crate::rules::matcher::match_rule;
use crate::rules::model::RuleSet;
use crate::store::MailStore;

/// Counts reported at the end of a processing run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub messages_processed: usize,
    pub rules_fired: usize,
    pub actions_applied: usize,
    pub actions_simulated: usize,
    pub actions_failed: usize,
    pub evaluation_errors: usize,
}

impl AddAssign for RunSummary {
    fn add_assign(&mut self, other: Self) {
        self.messages_processed += other.messages_processed;
        self.rules_fired += other.rules_fired;
        self.actions_applied += other.actions_applied;
        self.actions_simulated += other.actions_simulated;
        self.actions_failed += other.actions_failed;
        self.evaluation_errors += other.evaluation_errors;
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "processed {} message(s): {} rule(s) fired, {} action(s) applied, {} simulated, {} failed, {} evaluation error(s)",
            self.messages_processed,
            self.rules_fired,
            self.actions_applied,
            self.actions_simulated,
            self.actions_failed,
            self.evaluation_errors
        )
    }
}

/// Applies a rule set to the messages in a [`MailStore`].
pub struct RuleProcessor {
    store: Arc<dyn MailStore>,
    dispatcher: ActionDispatcher,
    limit: usize,
}

impl RuleProcessor {
    /// `limit` caps how many stored messages (newest first) one run evaluates.
    pub fn new(store: Arc<dyn MailStore>, dispatcher: ActionDispatcher, limit: usize) -> Self {
        Self {
            store,
            dispatcher,
            limit,
        }
    }

    /// Process stored messages against `rules` as of `now`.
    pub async fn run(&self, rules: &RuleSet, now: DateTime<Utc>) -> Result<RunSummary> {
        let messages = self.store.list_messages(self.limit).await?;
        info!(
            messages = messages.len(),
            rules = rules.len(),
            "Processing stored messages"
        );

        let mut summary = RunSummary::default();
        for mut message in messages {
            summary += self.process_message(&mut message, rules, now).await;
        }

        info!(
            processed = summary.messages_processed,
            fired = summary.rules_fired,
            applied = summary.actions_applied,
            simulated = summary.actions_simulated,
            failed = summary.actions_failed,
            evaluation_errors = summary.evaluation_errors,
            "Processing run complete"
        );
        Ok(summary)
    }

    /// Match one message against every rule and dispatch the rules that fire.
    pub async fn process_message(
        &self,
        message: &mut Message,
        rules: &RuleSet,
        now: DateTime<Utc>,
    ) -> RunSummary {
        let mut summary = RunSummary {
            messages_processed: 1,
            ..Default::default()
        };

        for rule in rules.iter() {
            let outcome = match_rule(message, rule, now);
            summary.evaluation_errors += outcome.errors.len();
            if !outcome.fired {
                continue;
            }

            debug!(
                message_id = %message.id,
                subject = %message.subject_preview(),
                rule = %rule.id,
                "Rule fired"
            );
            summary.rules_fired += 1;

            let dispatched = self.dispatcher.apply(message, rule).await;
            summary.actions_applied += dispatched.applied.len();
            summary.actions_simulated += dispatched.simulated.len();
            summary.actions_failed += dispatched.failed.len();
        }

        summary
    }
}
