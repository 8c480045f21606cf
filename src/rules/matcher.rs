//! Rule matcher: combines condition results with the rule's ALL/ANY predicate.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::error::EvaluationError;
use crate::message::Message;
use crate::rules::evaluator::evaluate;
use crate::rules::model::{Rule, RulePredicate};

/// Result of matching one rule against one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchOutcome {
    /// Whether the rule fires.
    pub fired: bool,
    /// Conditions that could not be evaluated (each counted as false).
    pub errors: Vec<EvaluationError>,
}

/// Whether `rule` fires for `message` as of `now`.
pub fn matches(message: &Message, rule: &Rule, now: DateTime<Utc>) -> bool {
    match_rule(message, rule, now).fired
}

/// Evaluate every condition of `rule` and combine the results.
///
/// All conditions are evaluated (no short-circuit) so that every malformed
/// condition is reported. Evaluation errors are logged and the condition is
/// treated as non-matching.
pub fn match_rule(message: &Message, rule: &Rule, now: DateTime<Utc>) -> MatchOutcome {
    let mut errors = Vec::new();
    let results: Vec<bool> = rule
        .conditions
        .iter()
        .map(|condition| match evaluate(message, condition, now) {
            Ok(hit) => {
                debug!(
                    message_id = %message.id,
                    rule = %rule.id,
                    field = %condition.field,
                    predicate = %condition.predicate,
                    hit,
                    "Condition evaluated"
                );
                hit
            }
            Err(e) => {
                warn!(
                    message_id = %message.id,
                    rule = %rule.id,
                    error = %e,
                    "Condition could not be evaluated; treating as false"
                );
                errors.push(e);
                false
            }
        })
        .collect();

    let fired = match rule.predicate {
        RulePredicate::All => results.iter().all(|hit| *hit),
        RulePredicate::Any => results.iter().any(|hit| *hit),
    };

    MatchOutcome { fired, errors }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::model::{Action, Condition, ConditionField as F, ConditionPredicate as P};
    use chrono::{TimeDelta, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn rule(predicate: RulePredicate, conditions: Vec<Condition>) -> Rule {
        Rule {
            id: "r".into(),
            name: "test".into(),
            predicate,
            conditions,
            actions: vec![Action::mark_as_read()],
        }
    }

    fn yes() -> Condition {
        Condition::new(F::Subject, P::Contains, "hello")
    }

    fn no() -> Condition {
        Condition::new(F::Subject, P::Contains, "absent")
    }

    fn broken() -> Condition {
        Condition::new(F::Received, P::GreaterThan, "soon")
    }

    fn msg() -> Message {
        Message::new("m").with_subject("Hello there").with_received_at(now())
    }

    #[test]
    fn all_requires_every_condition() {
        assert!(matches(&msg(), &rule(RulePredicate::All, vec![yes(), yes()]), now()));
        assert!(!matches(&msg(), &rule(RulePredicate::All, vec![yes(), no()]), now()));
        assert!(!matches(&msg(), &rule(RulePredicate::All, vec![no(), no()]), now()));
    }

    #[test]
    fn any_requires_one_condition() {
        assert!(matches(&msg(), &rule(RulePredicate::Any, vec![no(), yes()]), now()));
        assert!(!matches(&msg(), &rule(RulePredicate::Any, vec![no(), no()]), now()));
    }

    #[test]
    fn empty_condition_lists() {
        assert!(matches(&msg(), &rule(RulePredicate::All, vec![]), now()));
        assert!(!matches(&msg(), &rule(RulePredicate::Any, vec![]), now()));
    }

    #[test]
    fn evaluation_errors_count_as_false_and_are_collected() {
        let outcome = match_rule(&msg(), &rule(RulePredicate::Any, vec![broken(), yes()]), now());
        assert!(outcome.fired);
        assert_eq!(outcome.errors.len(), 1);

        let outcome = match_rule(&msg(), &rule(RulePredicate::All, vec![yes(), broken()]), now());
        assert!(!outcome.fired);
        assert_eq!(outcome.errors.len(), 1);
    }

    #[test]
    fn every_condition_is_evaluated() {
        let outcome = match_rule(
            &msg(),
            &rule(RulePredicate::All, vec![no(), broken(), broken()]),
            now(),
        );
        assert!(!outcome.fired);
        assert_eq!(outcome.errors.len(), 2);
    }

    #[test]
    fn date_and_text_conditions_combine() {
        let old = Message::new("m")
            .with_subject("Big promotion sale")
            .with_received_at(now() - TimeDelta::days(10));
        let r = rule(
            RulePredicate::All,
            vec![
                Condition::new(F::Subject, P::Contains, "promotion"),
                Condition::new(F::Received, P::GreaterThan, "7 days"),
            ],
        );
        assert!(matches(&old, &r, now()));

        let fresh = old.clone().with_received_at(now() - TimeDelta::days(2));
        assert!(!matches(&fresh, &r, now()));
    }
}
