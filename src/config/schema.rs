//! Schema rule-trees and the named-schema registry.
//!
//! A schema is a nested tree of [`Rule`]s: each rule names the kind of value
//! it accepts, whether the field is required, and (for mappings and
//! sequences) the rules for its children. Field-format kinds carry their own
//! validators (IPv4 address, CIDR subnet, domain name).

use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Any,
    String,
    Integer,
    Number,
    Boolean,
    Mapping,
    Sequence,
    Ipv4,
    Cidr,
    Domain,
}

impl Kind {
    pub fn describe(self) -> &'static str {
        match self {
            Kind::Any => "any value",
            Kind::String => "a string",
            Kind::Integer => "an integer",
            Kind::Number => "a number",
            Kind::Boolean => "a boolean",
            Kind::Mapping => "a mapping",
            Kind::Sequence => "a sequence",
            Kind::Ipv4 => "an IPv4 address",
            Kind::Cidr => "a CIDR subnet",
            Kind::Domain => "a domain name",
        }
    }
}

/// One node of a schema rule-tree.
#[derive(Debug, Clone)]
pub struct Rule {
    pub kind: Kind,
    pub required: bool,
    /// Child rules, meaningful when `kind` is `Mapping`.
    pub children: BTreeMap<String, Rule>,
    /// Element rule, meaningful when `kind` is `Sequence`.
    pub item: Option<Box<Rule>>,
}

impl Rule {
    pub fn of(kind: Kind) -> Self {
        Self {
            kind,
            required: false,
            children: BTreeMap::new(),
            item: None,
        }
    }

    pub fn string() -> Self {
        Self::of(Kind::String)
    }

    pub fn integer() -> Self {
        Self::of(Kind::Integer)
    }

    pub fn mapping() -> Self {
        Self::of(Kind::Mapping)
    }

    pub fn sequence(item: Rule) -> Self {
        let mut rule = Self::of(Kind::Sequence);
        rule.item = Some(Box::new(item));
        rule
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_child(mut self, name: impl Into<String>, rule: Rule) -> Self {
        self.children.insert(name.into(), rule);
        self
    }
}

/// Look up a registered schema by name.
pub fn named(name: &str) -> Option<Rule> {
    match name {
        "provision" => Some(provision_schema()),
        _ => None,
    }
}

fn category_rule() -> Rule {
    Rule::mapping()
        .with_child("name", Rule::string().required())
        .with_child("description", Rule::string())
        .with_child("values", Rule::sequence(Rule::string()))
}

fn subnet_rule() -> Rule {
    Rule::mapping()
        .with_child("name", Rule::string().required())
        .with_child("vlan_id", Rule::integer().required())
        .with_child("cidr", Rule::of(Kind::Cidr).required())
        .with_child("domain", Rule::of(Kind::Domain))
}

fn provision_schema() -> Rule {
    Rule::mapping()
        .with_child("pc_ip", Rule::of(Kind::Ipv4).required())
        .with_child("pc_credential", Rule::string().required())
        .with_child("credential_vault", Rule::string())
        .with_child("categories", Rule::sequence(category_rule()))
        .with_child("subnets", Rule::sequence(subnet_rule()))
}

pub fn is_ipv4(value: &str) -> bool {
    value.parse::<std::net::Ipv4Addr>().is_ok()
}

pub fn is_cidr(value: &str) -> bool {
    match value.split_once('/') {
        Some((addr, prefix)) => {
            is_ipv4(addr) && prefix.parse::<u8>().map(|p| p <= 32).unwrap_or(false)
        }
        None => false,
    }
}

pub fn is_domain(value: &str) -> bool {
    if value.is_empty() || value.len() > 253 || !value.contains('.') {
        return false;
    }
    value.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}
