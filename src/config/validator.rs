//! Walks a document against a schema rule-tree, collecting every problem
//! rather than stopping at the first.

use super::schema::{is_cidr, is_domain, is_ipv4, Kind, Rule};
use serde_json::Value;

/// All problems found in one document. Empty means valid.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validate a document against a rule-tree.
pub fn validate(document: &Value, schema: &Rule) -> ValidationReport {
    let mut report = ValidationReport::default();
    check(document, schema, "$", &mut report.errors);
    report
}

fn check(value: &Value, rule: &Rule, path: &str, errors: &mut Vec<String>) {
    match rule.kind {
        Kind::Any => {}
        Kind::String => {
            if !value.is_string() {
                errors.push(type_error(path, rule.kind, value));
            }
        }
        Kind::Integer => {
            if value.as_i64().is_none() && value.as_u64().is_none() {
                errors.push(type_error(path, rule.kind, value));
            }
        }
        Kind::Number => {
            if !value.is_number() {
                errors.push(type_error(path, rule.kind, value));
            }
        }
        Kind::Boolean => {
            if !value.is_boolean() {
                errors.push(type_error(path, rule.kind, value));
            }
        }
        Kind::Ipv4 => check_format(value, path, rule.kind, is_ipv4, errors),
        Kind::Cidr => check_format(value, path, rule.kind, is_cidr, errors),
        Kind::Domain => check_format(value, path, rule.kind, is_domain, errors),
        Kind::Mapping => match value.as_object() {
            None => errors.push(type_error(path, rule.kind, value)),
            Some(object) => {
                for (name, child) in &rule.children {
                    let child_path = format!("{path}.{name}");
                    match object.get(name) {
                        Some(child_value) => check(child_value, child, &child_path, errors),
                        None if child.required => {
                            errors.push(format!("{child_path}: required field missing"))
                        }
                        None => {}
                    }
                }
            }
        },
        Kind::Sequence => match value.as_array() {
            None => errors.push(type_error(path, rule.kind, value)),
            Some(items) => {
                if let Some(item_rule) = &rule.item {
                    for (index, item) in items.iter().enumerate() {
                        check(item, item_rule, &format!("{path}[{index}]"), errors);
                    }
                }
            }
        },
    }
}

fn check_format(
    value: &Value,
    path: &str,
    kind: Kind,
    valid: fn(&str) -> bool,
    errors: &mut Vec<String>,
) {
    match value.as_str() {
        Some(s) if valid(s) => {}
        Some(s) => errors.push(format!("{path}: {s:?} is not {}", kind.describe())),
        None => errors.push(type_error(path, kind, value)),
    }
}

fn type_error(path: &str, kind: Kind, value: &Value) -> String {
    format!("{path}: expected {}, got {value}", kind.describe())
}
