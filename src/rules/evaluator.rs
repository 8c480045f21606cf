//! Condition evaluator: decides whether one condition holds for one message.
//!
//! Text fields compare case-insensitively. `received` compares the message age
//! (`now - received_at`) against a relative duration such as `"7 days"`. The
//! reference time is always passed in; nothing here reads the clock.

use chrono::{DateTime, TimeDelta, Utc};

use crate::error::EvaluationError;
use crate::message::Message;
use crate::rules::model::{Condition, ConditionField, ConditionPredicate};

/// Days counted per month in relative durations.
const DAYS_PER_MONTH: i64 = 30;

/// Evaluate `condition` against `message` as of `now`.
pub fn evaluate(
    message: &Message,
    condition: &Condition,
    now: DateTime<Utc>,
) -> Result<bool, EvaluationError> {
    match condition.field {
        ConditionField::From => evaluate_text(&message.sender, condition),
        ConditionField::To => evaluate_text(&message.recipient, condition),
        ConditionField::Subject => evaluate_text(&message.subject, condition),
        ConditionField::Body => evaluate_text(&message.body, condition),
        ConditionField::Received => evaluate_received(message, condition, now),
    }
}

/// Whether the field/predicate pair has a defined meaning.
pub fn supports(field: ConditionField, predicate: ConditionPredicate) -> bool {
    use ConditionPredicate as P;
    match field {
        ConditionField::Received => matches!(predicate, P::LessThan | P::GreaterThan),
        ConditionField::From | ConditionField::To | ConditionField::Subject | ConditionField::Body => {
            matches!(predicate, P::Contains | P::NotContains | P::Equals | P::NotEquals)
        }
    }
}

fn evaluate_text(text: &str, condition: &Condition) -> Result<bool, EvaluationError> {
    let haystack = text.to_lowercase();
    let needle = condition.value.to_lowercase();
    match condition.predicate {
        ConditionPredicate::Contains => Ok(haystack.contains(&needle)),
        ConditionPredicate::NotContains => Ok(!haystack.contains(&needle)),
        ConditionPredicate::Equals => Ok(haystack == needle),
        ConditionPredicate::NotEquals => Ok(haystack != needle),
        ConditionPredicate::LessThan | ConditionPredicate::GreaterThan => Err(unsupported(condition)),
    }
}

fn evaluate_received(
    message: &Message,
    condition: &Condition,
    now: DateTime<Utc>,
) -> Result<bool, EvaluationError> {
    let compare: fn(TimeDelta, TimeDelta) -> bool = match condition.predicate {
        // Newer than the threshold.
        ConditionPredicate::LessThan => |age, limit| age < limit,
        // Older than the threshold.
        ConditionPredicate::GreaterThan => |age, limit| age > limit,
        ConditionPredicate::Contains
        | ConditionPredicate::NotContains
        | ConditionPredicate::Equals
        | ConditionPredicate::NotEquals => return Err(unsupported(condition)),
    };

    let limit = parse_relative_duration(&condition.value)?;
    let received_at = message
        .received_at
        .ok_or_else(|| EvaluationError::MissingTimestamp {
            message_id: message.id.clone(),
        })?;

    Ok(compare(now.signed_duration_since(received_at), limit))
}

fn unsupported(condition: &Condition) -> EvaluationError {
    EvaluationError::UnsupportedPredicate {
        field: condition.field.to_string(),
        predicate: condition.predicate.to_string(),
    }
}

/// Parse `"<N> <unit>"` where unit is `day(s)` or `month(s)`.
///
/// A month counts as 30 days.
pub fn parse_relative_duration(value: &str) -> Result<TimeDelta, EvaluationError> {
    let invalid = |reason: String| EvaluationError::InvalidDuration {
        value: value.to_string(),
        reason,
    };

    let parts: Vec<&str> = value.split_whitespace().collect();
    let [amount, unit] = parts.as_slice() else {
        return Err(invalid("expected \"<number> <days|months>\"".into()));
    };

    let amount: i64 = amount
        .parse::<u32>()
        .map_err(|e| invalid(format!("bad number {amount:?}: {e}")))?
        .into();

    let days = match unit.to_lowercase().as_str() {
        "day" | "days" => amount,
        "month" | "months" => amount * DAYS_PER_MONTH,
        other => return Err(invalid(format!("unknown unit {other:?}"))),
    };

    TimeDelta::try_days(days).ok_or_else(|| invalid("duration out of range".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    use ConditionField as F;
    use ConditionPredicate as P;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn cond(field: F, predicate: P, value: &str) -> Condition {
        Condition::new(field, predicate, value)
    }

    fn sample() -> Message {
        Message::new("m1")
            .with_sender("News <news@Newsletter.com>")
            .with_recipient("me@example.com")
            .with_subject("Newsletter Weekly")
            .with_body("Hello, here is this week's digest.")
    }

    #[test]
    fn contains_is_case_insensitive() {
        let msg = sample();
        assert!(evaluate(&msg, &cond(F::Subject, P::Contains, "newsletter"), now()).unwrap());
        assert!(evaluate(&msg, &cond(F::From, P::Contains, "NEWSLETTER.COM"), now()).unwrap());
        assert!(!evaluate(&msg, &cond(F::Body, P::Contains, "invoice"), now()).unwrap());
    }

    #[test]
    fn equals_is_exact_but_case_insensitive() {
        let msg = sample();
        assert!(evaluate(&msg, &cond(F::To, P::Equals, "ME@example.com"), now()).unwrap());
        assert!(!evaluate(&msg, &cond(F::To, P::Equals, "me@example"), now()).unwrap());
    }

    #[test]
    fn negations_mirror_their_positive_forms() {
        let msg = sample();
        for field in [F::From, F::To, F::Subject, F::Body] {
            for value in ["newsletter", "me@example.com", "nothing-here", ""] {
                let contains = evaluate(&msg, &cond(field, P::Contains, value), now()).unwrap();
                let not_contains = evaluate(&msg, &cond(field, P::NotContains, value), now()).unwrap();
                assert_eq!(contains, !not_contains, "{field} {value:?}");

                let equals = evaluate(&msg, &cond(field, P::Equals, value), now()).unwrap();
                let not_equals = evaluate(&msg, &cond(field, P::NotEquals, value), now()).unwrap();
                assert_eq!(equals, !not_equals, "{field} {value:?}");
            }
        }
    }

    #[test]
    fn received_boundary_is_strict() {
        let exactly_seven = sample().with_received_at(now() - TimeDelta::days(7));
        let eight = sample().with_received_at(now() - TimeDelta::days(8));
        let older = cond(F::Received, P::GreaterThan, "7 days");
        let newer = cond(F::Received, P::LessThan, "7 days");

        assert!(!evaluate(&exactly_seven, &older, now()).unwrap());
        assert!(!evaluate(&exactly_seven, &newer, now()).unwrap());
        assert!(evaluate(&eight, &older, now()).unwrap());
        assert!(!evaluate(&eight, &newer, now()).unwrap());
    }

    #[test]
    fn received_less_than_matches_recent_messages() {
        let msg = sample().with_received_at(now() - TimeDelta::hours(3));
        assert!(evaluate(&msg, &cond(F::Received, P::LessThan, "1 day"), now()).unwrap());
        assert!(!evaluate(&msg, &cond(F::Received, P::GreaterThan, "1 day"), now()).unwrap());
    }

    #[test]
    fn months_count_as_thirty_days() {
        let msg = sample().with_received_at(now() - TimeDelta::days(45));
        assert!(evaluate(&msg, &cond(F::Received, P::GreaterThan, "1 month"), now()).unwrap());
        assert!(evaluate(&msg, &cond(F::Received, P::LessThan, "2 Months"), now()).unwrap());
    }

    #[test]
    fn bad_durations_are_evaluation_errors() {
        let msg = sample().with_received_at(now());
        for value in ["7", "seven days", "7 weeks", "-1 days", "7 days ago", ""] {
            let err = evaluate(&msg, &cond(F::Received, P::LessThan, value), now()).unwrap_err();
            assert!(
                matches!(err, EvaluationError::InvalidDuration { .. }),
                "{value:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn missing_timestamp_is_an_evaluation_error() {
        let err = evaluate(&sample(), &cond(F::Received, P::GreaterThan, "7 days"), now()).unwrap_err();
        assert_eq!(
            err,
            EvaluationError::MissingTimestamp {
                message_id: "m1".into()
            }
        );
    }

    #[test]
    fn unsupported_pairs_are_rejected() {
        let msg = sample().with_received_at(now());
        let err = evaluate(&msg, &cond(F::Subject, P::GreaterThan, "x"), now()).unwrap_err();
        assert!(matches!(err, EvaluationError::UnsupportedPredicate { .. }));

        let err = evaluate(&msg, &cond(F::Received, P::Contains, "7 days"), now()).unwrap_err();
        assert!(matches!(err, EvaluationError::UnsupportedPredicate { .. }));
    }

    #[test]
    fn supports_agrees_with_evaluate() {
        let msg = sample().with_received_at(now());
        let fields = [F::From, F::To, F::Subject, F::Body, F::Received];
        let predicates = [
            P::Contains,
            P::NotContains,
            P::Equals,
            P::NotEquals,
            P::LessThan,
            P::GreaterThan,
        ];
        for field in fields {
            for predicate in predicates {
                let result = evaluate(&msg, &cond(field, predicate, "3 days"), now());
                let unsupported = matches!(result, Err(EvaluationError::UnsupportedPredicate { .. }));
                assert_eq!(supports(field, predicate), !unsupported, "{field} {predicate}");
            }
        }
    }

    #[test]
    fn parse_relative_duration_accepts_singular_and_plural() {
        assert_eq!(parse_relative_duration("1 day").unwrap(), TimeDelta::days(1));
        assert_eq!(parse_relative_duration("7 DAYS").unwrap(), TimeDelta::days(7));
        assert_eq!(parse_relative_duration("2 months").unwrap(), TimeDelta::days(60));
        assert_eq!(parse_relative_duration("  3   month ").unwrap(), TimeDelta::days(90));
    }
}
