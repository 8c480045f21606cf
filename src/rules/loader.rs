//! Rule definition loader: turns a rule-set document into a typed [`RuleSet`].
//!
//! The document is walked as untyped JSON so that every problem in the file is
//! collected and reported at once. Any violation aborts the whole load; a
//! partially valid rule set is never returned.

use std::collections::HashSet;
use std::path::Path;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::error::ConfigError;
use crate::rules::evaluator::{parse_relative_duration, supports};
use crate::rules::model::{
    Action, ActionKind, ActionValue, Condition, ConditionField, ConditionPredicate, Rule,
    RulePredicate, RuleSet,
};

/// Read and parse a rule-set document from disk.
pub fn load_rules_from_path(path: &Path) -> Result<RuleSet, ConfigError> {
    let text = std::fs::read_to_string(path)?;
    let rules = load_rules_from_str(&text)?;
    info!(path = %path.display(), rules = rules.len(), "Rule set loaded");
    Ok(rules)
}

/// Parse a rule-set document from a JSON string.
pub fn load_rules_from_str(document: &str) -> Result<RuleSet, ConfigError> {
    let value: Value = serde_json::from_str(document)
        .map_err(|e| ConfigError::ParseError(format!("rule set is not valid JSON: {e}")))?;
    load_rules_from_value(&value)
}

/// Validate an already-parsed document.
pub fn load_rules_from_value(document: &Value) -> Result<RuleSet, ConfigError> {
    let mut violations = Vec::new();

    let Some(entries) = document.get("rules") else {
        return Err(ConfigError::InvalidRuleSet {
            violations: vec!["top-level key \"rules\" is missing".into()],
        });
    };
    let Some(entries) = entries.as_array() else {
        return Err(ConfigError::InvalidRuleSet {
            violations: vec!["\"rules\" must be an array".into()],
        });
    };

    let mut rules = Vec::with_capacity(entries.len());
    let mut seen_ids = HashSet::new();

    for (index, entry) in entries.iter().enumerate() {
        let Some(obj) = entry.as_object() else {
            violations.push(format!("rules[{index}]: must be an object"));
            continue;
        };
        // Ids are claimed before the rest of the entry is checked, so a reused
        // id is reported even when the rule that first used it is invalid.
        let mut duplicate = false;
        if let Some(id) = obj.get("id").and_then(Value::as_str).filter(|id| !id.trim().is_empty()) {
            if !seen_ids.insert(id.to_string()) {
                violations.push(format!("rules[{index}]: duplicate rule id {id:?}"));
                duplicate = true;
            }
        }
        if let Some(rule) = parse_rule(index, obj, &mut violations) {
            if !duplicate {
                rules.push(rule);
            }
        }
    }

    if !violations.is_empty() {
        return Err(ConfigError::InvalidRuleSet { violations });
    }

    for rule in &rules {
        lint_rule(rule);
    }

    Ok(RuleSet::new(rules))
}

/// Parse one rule entry, pushing every problem found onto `violations`.
fn parse_rule(index: usize, obj: &Map<String, Value>, violations: &mut Vec<String>) -> Option<Rule> {
    let before = violations.len();

    let id = required_str(obj, "id", &format!("rules[{index}]"), violations);
    let ctx = match &id {
        Some(id) => format!("rules[{index}] ({id})"),
        None => format!("rules[{index}]"),
    };

    let name = match obj.get("name") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            violations.push(format!("{ctx}: \"name\" must be a string"));
            None
        }
    };

    let predicate = required_str(obj, "predicate", &ctx, violations).and_then(|raw| {
        raw.parse::<RulePredicate>()
            .map_err(|e| violations.push(format!("{ctx}: {e}")))
            .ok()
    });

    let conditions = match obj.get("conditions") {
        None => {
            violations.push(format!("{ctx}: missing required key \"conditions\""));
            Vec::new()
        }
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| parse_condition(&format!("{ctx}.conditions[{i}]"), item, violations))
            .collect(),
        Some(_) => {
            violations.push(format!("{ctx}: \"conditions\" must be an array"));
            Vec::new()
        }
    };

    let actions: Vec<Action> = match obj.get("actions") {
        None => {
            violations.push(format!("{ctx}: missing required key \"actions\""));
            Vec::new()
        }
        Some(Value::Array(items)) => {
            if items.is_empty() {
                violations.push(format!("{ctx}: a rule needs at least one action"));
            }
            items
                .iter()
                .enumerate()
                .filter_map(|(i, item)| parse_action(&format!("{ctx}.actions[{i}]"), item, violations))
                .collect()
        }
        Some(_) => {
            violations.push(format!("{ctx}: \"actions\" must be an array"));
            Vec::new()
        }
    };

    if violations.len() > before {
        return None;
    }

    let id = id?;
    Some(Rule {
        name: name.unwrap_or_else(|| format!("Rule {id}")),
        id,
        predicate: predicate?,
        conditions,
        actions,
    })
}

fn parse_condition(ctx: &str, item: &Value, violations: &mut Vec<String>) -> Option<Condition> {
    let Some(obj) = item.as_object() else {
        violations.push(format!("{ctx}: must be an object"));
        return None;
    };

    let field = required_str(obj, "field", ctx, violations).and_then(|raw| {
        raw.parse::<ConditionField>()
            .map_err(|e| violations.push(format!("{ctx}: {e}")))
            .ok()
    });
    let predicate = required_str(obj, "predicate", ctx, violations).and_then(|raw| {
        raw.parse::<ConditionPredicate>()
            .map_err(|e| violations.push(format!("{ctx}: {e}")))
            .ok()
    });
    let value = match obj.get("value") {
        Some(Value::String(s)) => Some(s.clone()),
        // Bare numbers are accepted as their text form.
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(_) => {
            violations.push(format!("{ctx}: \"value\" must be a string"));
            None
        }
        None => {
            violations.push(format!("{ctx}: missing required key \"value\""));
            None
        }
    };

    Some(Condition::new(field?, predicate?, value?))
}

fn parse_action(ctx: &str, item: &Value, violations: &mut Vec<String>) -> Option<Action> {
    let Some(obj) = item.as_object() else {
        violations.push(format!("{ctx}: must be an object"));
        return None;
    };

    let kind = required_str(obj, "type", ctx, violations).and_then(|raw| {
        raw.parse::<ActionKind>()
            .map_err(|e| violations.push(format!("{ctx}: {e}")))
            .ok()
    })?;

    let value = match obj.get("value") {
        None | Some(Value::Null) => ActionValue::Flag(true),
        Some(Value::Bool(b)) => ActionValue::Flag(*b),
        Some(Value::String(s)) => ActionValue::Text(s.clone()),
        Some(_) => {
            violations.push(format!("{ctx}: \"value\" must be a boolean or a string"));
            return None;
        }
    };

    let action = Action::new(kind, value);
    if let Err(reason) = action.operation() {
        violations.push(format!("{ctx}: {reason}"));
        return None;
    }
    Some(action)
}

fn required_str(
    obj: &Map<String, Value>,
    key: &str,
    ctx: &str,
    violations: &mut Vec<String>,
) -> Option<String> {
    match obj.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        Some(Value::String(_)) => {
            violations.push(format!("{ctx}: \"{key}\" must not be empty"));
            None
        }
        Some(_) => {
            violations.push(format!("{ctx}: \"{key}\" must be a string"));
            None
        }
        None => {
            violations.push(format!("{ctx}: missing required key \"{key}\""));
            None
        }
    }
}

/// Warn about rules that load but will behave surprisingly at evaluation time.
fn lint_rule(rule: &Rule) {
    if rule.conditions.is_empty() {
        match rule.predicate {
            RulePredicate::All => warn!(
                rule = %rule.id,
                "Rule has no conditions and predicate ALL; it will fire for every message"
            ),
            RulePredicate::Any => warn!(
                rule = %rule.id,
                "Rule has no conditions and predicate ANY; it will never fire"
            ),
        }
    }

    for condition in &rule.conditions {
        if !supports(condition.field, condition.predicate) {
            warn!(
                rule = %rule.id,
                field = %condition.field,
                predicate = %condition.predicate,
                "Condition uses an unsupported field/predicate pair and will never match"
            );
        } else if condition.field == ConditionField::Received {
            if let Err(e) = parse_relative_duration(&condition.value) {
                warn!(rule = %rule.id, error = %e, "Condition will never match");
            }
        }
    }

    debug!(
        rule = %rule.id,
        conditions = rule.conditions.len(),
        actions = rule.actions.len(),
        "Rule validated"
    );
}
