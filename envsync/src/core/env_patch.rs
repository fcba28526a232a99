//! Literal substitution over env-style text.
//!
//! Pure functions: callers own reading and persisting the text.

use super::rules::EnvRule;
use super::types::RuleOutcome;

/// Result of applying a rule set to one text blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvPatch {
    pub content: String,
    /// One outcome per rule, in rule order.
    pub outcomes: Vec<RuleOutcome>,
}

impl EnvPatch {
    pub fn changed(&self) -> bool {
        self.outcomes
            .iter()
            .any(|outcome| matches!(outcome, RuleOutcome::Replaced { .. }))
    }
}

/// Apply rules in order, each against the text left by the previous one.
///
/// A rule whose replacement is already present is left alone, so a search
/// literal that prefixes its own replacement is never substituted twice.
pub fn apply_rules(content: &str, rules: &[EnvRule]) -> EnvPatch {
    let mut current = content.to_string();
    let mut outcomes = Vec::with_capacity(rules.len());
    for rule in rules {
        let outcome = if current.contains(&rule.replace) {
            RuleOutcome::AlreadySatisfied
        } else if current.contains(&rule.search) {
            let count = current.matches(rule.search.as_str()).count();
            current = current.replace(&rule.search, &rule.replace);
            RuleOutcome::Replaced { count }
        } else {
            RuleOutcome::SearchAbsent
        };
        outcomes.push(outcome);
    }
    EnvPatch {
        content: current,
        outcomes,
    }
}

/// True when every rule's replacement literal is present.
pub fn is_satisfied(content: &str, rules: &[EnvRule]) -> bool {
    rules.iter().all(|rule| content.contains(&rule.replace))
}

/// Rules whose replacement literal is not present in `content`.
pub fn missing_replacements<'a>(content: &str, rules: &'a [EnvRule]) -> Vec<&'a EnvRule> {
    rules
        .iter()
        .filter(|rule| !content.contains(&rule.replace))
        .collect()
}
