// ─── Rules ───
// Evaluates descriptor rules against the host platform and enabled features.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::core::platform::{os_arch, os_name};

use super::descriptor::{Argument, SingleOrVec};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Rule {
    pub action: RuleAction,
    #[serde(default)]
    pub os: RuleOs,
    #[serde(default)]
    pub features: HashMap<String, bool>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Allow,
    Disallow,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RuleOs {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arch: Option<String>,
    /// Never evaluated, no OS version probe is done.
    #[serde(default)]
    pub version: Option<String>,
}

/// Evaluate a rule list.
///
/// Starts disallowed, every matching rule sets the state, the last match wins.
pub fn rules_allow(rules: &[Rule], features: &BTreeSet<String>) -> bool {
    let mut allowed = false;
    for rule in rules {
        if let Some(action) = rule_action(rule, features) {
            allowed = action == RuleAction::Allow;
        }
    }
    allowed
}

fn rule_action(rule: &Rule, features: &BTreeSet<String>) -> Option<RuleAction> {
    if let (Some(name), Some(host)) = (&rule.os.name, os_name()) {
        if name != host {
            return None;
        }
    }

    if let (Some(arch), Some(host)) = (&rule.os.arch, os_arch()) {
        if arch != host {
            return None;
        }
    }

    for (feature, expected) in &rule.features {
        if features.contains(feature) != *expected {
            return None;
        }
    }

    Some(rule.action)
}

/// Append the values of every applicable argument to `dest`.
pub fn resolve_arguments(dest: &mut Vec<String>, args: &[Argument], features: &BTreeSet<String>) {
    for arg in args {
        match arg {
            Argument::Raw(value) => dest.push(value.clone()),
            Argument::Conditional(cond) => {
                if let Some(rules) = &cond.rules {
                    if !rules_allow(rules, features) {
                        continue;
                    }
                }
                match &cond.value {
                    SingleOrVec::Single(value) => dest.push(value.clone()),
                    SingleOrVec::Vec(values) => dest.extend_from_slice(values),
                }
            }
        }
    }
}
