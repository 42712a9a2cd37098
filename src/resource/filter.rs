//! Resource filters
//!
//! Decide, without touching the remote side, whether a resource must be kept.
//! A matching rule means "keep this one".

use super::registry::ResourceDef;
use anyhow::Result;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;

/// How a filter value is compared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    #[default]
    Exact,
    Prefix,
    Contains,
    Glob,
}

fn default_property() -> String {
    "name".to_string()
}

/// Full filter form: `{ "property": "label:team", "type": "glob", "value": "data-*" }`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FilterMatch {
    /// `name`, or `label:<key>`
    #[serde(default = "default_property")]
    pub property: String,
    #[serde(rename = "type", default)]
    pub kind: MatchKind,
    pub value: String,
}

/// One configured filter. A bare string matches the resource name exactly.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum FilterRule {
    Name(String),
    Match(FilterMatch),
}

impl FilterRule {
    /// Check the rule is usable before any resource is looked at
    pub fn validate(&self) -> Result<()> {
        let FilterRule::Match(rule) = self else {
            return Ok(());
        };

        if rule.property != "name" && !rule.property.starts_with("label:") {
            return Err(anyhow::anyhow!(
                "Unknown filter property '{}', expected 'name' or 'label:<key>'",
                rule.property
            ));
        }
        if rule.kind == MatchKind::Glob {
            glob::Pattern::new(&rule.value)
                .map_err(|e| anyhow::anyhow!("Invalid glob '{}': {}", rule.value, e))?;
        }

        Ok(())
    }

    /// Whether the resource matches this rule
    pub fn matches(&self, name: &str, labels: &BTreeMap<String, String>) -> bool {
        match self {
            FilterRule::Name(value) => name == value,
            FilterRule::Match(rule) => {
                let subject = match rule.property.strip_prefix("label:") {
                    Some(key) => match labels.get(key) {
                        Some(value) => value.as_str(),
                        None => return false,
                    },
                    None => name,
                };

                match rule.kind {
                    MatchKind::Exact => subject == rule.value,
                    MatchKind::Prefix => subject.starts_with(&rule.value),
                    MatchKind::Contains => subject.contains(&rule.value),
                    MatchKind::Glob => glob::Pattern::new(&rule.value)
                        .map(|pattern| pattern.matches(subject))
                        .unwrap_or(false),
                }
            },
        }
    }
}

impl fmt::Display for FilterRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterRule::Name(value) => write!(f, "name = {}", value),
            FilterRule::Match(rule) => {
                let op = match rule.kind {
                    MatchKind::Exact => "=",
                    MatchKind::Prefix => "starts with",
                    MatchKind::Contains => "contains",
                    MatchKind::Glob => "matches",
                };
                write!(f, "{} {} {}", rule.property, op, rule.value)
            },
        }
    }
}

/// Eligibility of one resource: protected labels first, then configured rules
pub fn check(
    def: &ResourceDef,
    name: &str,
    labels: &BTreeMap<String, String>,
    rules: &[FilterRule],
) -> Result<()> {
    if let Some(label) = def.protected_labels.iter().find(|l| labels.contains_key(*l)) {
        return Err(anyhow::anyhow!("managed by another system (label {})", label));
    }

    if let Some(rule) = rules.iter().find(|rule| rule.matches(name, labels)) {
        return Err(anyhow::anyhow!("filtered by config ({})", rule));
    }

    Ok(())
}
