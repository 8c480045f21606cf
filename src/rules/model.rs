//! Typed rule model: rules, conditions, actions.
//!
//! Values here are only ever built by the loader (or by tests) and are
//! immutable once loaded.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lowercase, trim, and fold spaces/hyphens to underscores so that
/// `"Does not contain"`, `"does-not-contain"` and `"does_not_contain"` compare equal.
fn normalize(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect()
}

// ── Rule-level predicate ────────────────────────────────────────────

/// How a rule combines its conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RulePredicate {
    /// Every condition must hold.
    All,
    /// At least one condition must hold.
    Any,
}

impl FromStr for RulePredicate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "all" => Ok(Self::All),
            "any" => Ok(Self::Any),
            _ => Err(format!("unknown rule predicate {s:?} (expected all or any)")),
        }
    }
}

impl fmt::Display for RulePredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Any => write!(f, "any"),
        }
    }
}

// ── Condition ───────────────────────────────────────────────────────

/// Which message field a condition tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionField {
    From,
    To,
    Subject,
    Body,
    Received,
}

impl ConditionField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::From => "from",
            Self::To => "to",
            Self::Subject => "subject",
            Self::Body => "body",
            Self::Received => "received",
        }
    }
}

impl FromStr for ConditionField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "from" => Ok(Self::From),
            "to" => Ok(Self::To),
            "subject" => Ok(Self::Subject),
            "body" | "message" => Ok(Self::Body),
            "received" => Ok(Self::Received),
            _ => Err(format!(
                "unknown condition field {s:?} (expected from, to, subject, body or received)"
            )),
        }
    }
}

impl fmt::Display for ConditionField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Comparison operator of a single condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionPredicate {
    Contains,
    NotContains,
    Equals,
    NotEquals,
    LessThan,
    GreaterThan,
}

impl ConditionPredicate {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contains => "contains",
            Self::NotContains => "not_contains",
            Self::Equals => "equals",
            Self::NotEquals => "not_equals",
            Self::LessThan => "less_than",
            Self::GreaterThan => "greater_than",
        }
    }
}

impl FromStr for ConditionPredicate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "contains" => Ok(Self::Contains),
            "not_contains" | "does_not_contain" => Ok(Self::NotContains),
            "equals" => Ok(Self::Equals),
            "not_equals" | "does_not_equal" => Ok(Self::NotEquals),
            "less_than" => Ok(Self::LessThan),
            "greater_than" => Ok(Self::GreaterThan),
            _ => Err(format!("unknown condition predicate {s:?}")),
        }
    }
}

impl fmt::Display for ConditionPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single field/predicate/value test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Condition {
    pub field: ConditionField,
    pub predicate: ConditionPredicate,
    /// Literal text, or a relative duration such as `"7 days"` for `received`.
    pub value: String,
}

impl Condition {
    pub fn new(field: ConditionField, predicate: ConditionPredicate, value: impl Into<String>) -> Self {
        Self {
            field,
            predicate,
            value: value.into(),
        }
    }
}

// ── Action ──────────────────────────────────────────────────────────

/// Kind of side effect an action requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    MarkAsRead,
    MarkAsUnread,
    MoveMessage,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MarkAsRead => "mark_as_read",
            Self::MarkAsUnread => "mark_as_unread",
            Self::MoveMessage => "move_message",
        }
    }
}

impl FromStr for ActionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "mark_as_read" => Ok(Self::MarkAsRead),
            "mark_as_unread" => Ok(Self::MarkAsUnread),
            "move_message" => Ok(Self::MoveMessage),
            _ => Err(format!(
                "unknown action type {s:?} (expected mark_as_read, mark_as_unread or move_message)"
            )),
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw action value from the rule document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionValue {
    Flag(bool),
    Text(String),
}

impl fmt::Display for ActionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flag(b) => write!(f, "{b}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// The concrete effect an action has on a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOp {
    /// Set the read flag to the given value.
    SetRead(bool),
    /// Add the label to the message. Existing labels are kept.
    AddLabel(String),
}

/// A side effect to apply to a matching message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub kind: ActionKind,
    pub value: ActionValue,
}

impl Action {
    pub fn new(kind: ActionKind, value: ActionValue) -> Self {
        Self { kind, value }
    }

    pub fn mark_as_read() -> Self {
        Self::new(ActionKind::MarkAsRead, ActionValue::Flag(true))
    }

    pub fn mark_as_unread() -> Self {
        Self::new(ActionKind::MarkAsUnread, ActionValue::Flag(true))
    }

    pub fn move_to(label: impl Into<String>) -> Self {
        Self::new(ActionKind::MoveMessage, ActionValue::Text(label.into()))
    }

    /// Resolve the kind/value pair into the effect it requests.
    ///
    /// `mark_as_read: false` means "mark unread" and `mark_as_unread: false`
    /// means "mark read". Flags may also be spelled as the strings `"true"`/`"false"`.
    pub fn operation(&self) -> Result<ActionOp, String> {
        match self.kind {
            ActionKind::MarkAsRead => self.flag().map(ActionOp::SetRead),
            ActionKind::MarkAsUnread => self.flag().map(|unread| ActionOp::SetRead(!unread)),
            ActionKind::MoveMessage => match &self.value {
                ActionValue::Text(label) if !label.trim().is_empty() => {
                    Ok(ActionOp::AddLabel(label.trim().to_string()))
                }
                ActionValue::Text(_) => Err("move_message needs a non-empty label".into()),
                ActionValue::Flag(_) => Err("move_message needs a label name, not a boolean".into()),
            },
        }
    }

    fn flag(&self) -> Result<bool, String> {
        match &self.value {
            ActionValue::Flag(b) => Ok(*b),
            ActionValue::Text(s) => match normalize(s).as_str() {
                "true" => Ok(true),
                "false" => Ok(false),
                _ => Err(format!("{} needs a boolean value, got {s:?}", self.kind)),
            },
        }
    }
}

// ── Rule ────────────────────────────────────────────────────────────

/// A named unit of conditions and actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rule {
    pub id: String,
    pub name: String,
    pub predicate: RulePredicate,
    pub conditions: Vec<Condition>,
    pub actions: Vec<Action>,
}

/// An ordered, validated collection of rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RuleSet {
    pub rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Rule> {
        self.rules.iter()
    }

    pub fn get(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id == id)
    }

    /// The rule set written when no rule file exists yet.
    pub fn starter() -> Self {
        Self::new(vec![Rule {
            id: "rule1".into(),
            name: "Mark newsletters as read".into(),
            predicate: RulePredicate::Any,
            conditions: vec![
                Condition::new(ConditionField::From, ConditionPredicate::Contains, "newsletter"),
                Condition::new(ConditionField::Subject, ConditionPredicate::Contains, "newsletter"),
            ],
            actions: vec![Action::mark_as_read()],
        }])
    }
}
