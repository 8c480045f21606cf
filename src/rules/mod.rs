//! Rule engine: load rule sets, evaluate conditions, match rules, dispatch actions.
//!
//! Per stored message, every rule is matched independently
//! (`matcher::match_rule` → `evaluator::evaluate` per condition); each rule that
//! fires has its actions applied in order by `dispatcher::ActionDispatcher`.

pub mod dispatcher;
pub mod evaluator;
pub mod loader;
pub mod matcher;
pub mod model;

pub use dispatcher::{ActionDispatcher, DispatchOutcome};
pub use evaluator::evaluate;
pub use loader::{load_rules_from_path, load_rules_from_str};
pub use matcher::{MatchOutcome, match_rule, matches};
pub use model::{
    Action, ActionKind, ActionOp, ActionValue, Condition, ConditionField, ConditionPredicate, Rule,
    RulePredicate, RuleSet,
};
