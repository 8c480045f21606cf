//! Action dispatcher: applies a fired rule's actions in declared order.
//!
//! For each action the external executor performs the effect first; only when
//! the provider reports the change as applied is the local message updated,
//! persisted and an audit record written. A simulated (dry-run) action leaves
//! local state and the audit log untouched. A failed action is logged and
//! skipped. Earlier actions of the same rule are not rolled back.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::error::ActionExecutionError;
use crate::message::{AppliedActionRecord, Message};
use crate::provider::gmail_types::UNREAD_LABEL;
use crate::provider::{ActionEffect, ActionExecutor};
use crate::rules::model::{ActionOp, Rule};
use crate::store::MailStore;

/// What happened when a rule's actions were dispatched.
#[derive(Debug, Default)]
pub struct DispatchOutcome {
    /// One record per action that took effect, in declared order.
    pub applied: Vec<AppliedActionRecord>,
    /// Actions that failed.
    pub failed: Vec<ActionExecutionError>,
    /// Actions the executor only simulated.
    pub simulated: Vec<ActionOp>,
}

/// Applies rule actions through an [`ActionExecutor`] and logs them to a [`MailStore`].
pub struct ActionDispatcher {
    executor: Arc<dyn ActionExecutor>,
    store: Arc<dyn MailStore>,
}

impl ActionDispatcher {
    pub fn new(executor: Arc<dyn ActionExecutor>, store: Arc<dyn MailStore>) -> Self {
        Self { executor, store }
    }

    /// Apply every action of `rule` to `message`, in order.
    pub async fn apply(&self, message: &mut Message, rule: &Rule) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();

        for action in &rule.actions {
            let op = match action.operation() {
                Ok(op) => op,
                Err(reason) => {
                    let err = ActionExecutionError::InvalidAction {
                        action: action.kind.to_string(),
                        reason,
                    };
                    warn!(message_id = %message.id, rule = %rule.id, error = %err, "Skipping action");
                    outcome.failed.push(err);
                    continue;
                }
            };

            let effect = self.executor.apply_action(&message.id, &op).await;
            match effect {
                Ok(ActionEffect::Applied) => {}
                Ok(ActionEffect::Simulated) => {
                    debug!(message_id = %message.id, rule = %rule.id, op = ?op, "Action simulated");
                    outcome.simulated.push(op);
                    continue;
                }
                Err(source) => {
                    let err = ActionExecutionError::Provider {
                        message_id: message.id.clone(),
                        action: action.kind.to_string(),
                        source,
                    };
                    warn!(rule = %rule.id, error = %err, "Action failed; continuing with next action");
                    outcome.failed.push(err);
                    continue;
                }
            }

            let changed = apply_to_message(message, &op);
            if changed {
                if let Err(e) = self.store.update_message_state(message).await {
                    warn!(message_id = %message.id, error = %e, "Failed to persist message state");
                }
            } else {
                debug!(message_id = %message.id, op = ?op, "Action had no local effect");
            }

            let record = AppliedActionRecord {
                message_id: message.id.clone(),
                rule_id: rule.id.clone(),
                action_type: action.kind,
                action_value: action.value.to_string(),
                applied_at: Utc::now(),
            };
            if let Err(e) = self.store.record_applied_action(&record).await {
                warn!(message_id = %message.id, error = %e, "Failed to record applied action");
            }

            info!(
                message_id = %message.id,
                rule = %rule.id,
                action = %action.kind,
                value = %action.value,
                "Action applied"
            );
            outcome.applied.push(record);
        }

        outcome
    }
}

/// Mirror an action's effect on the local copy. Returns whether anything changed.
///
/// `SetRead` keeps the `UNREAD` label in step with the flag, as the provider
/// does. `AddLabel` keeps existing labels.
pub fn apply_to_message(message: &mut Message, op: &ActionOp) -> bool {
    match op {
        ActionOp::SetRead(read) => {
            let mut changed = message.is_read != *read;
            message.is_read = *read;
            if *read {
                changed |= message.labels.remove(UNREAD_LABEL);
            } else {
                changed |= message.labels.insert(UNREAD_LABEL.to_string());
            }
            changed
        }
        ActionOp::AddLabel(label) => message.labels.insert(label.clone()),
    }
}
