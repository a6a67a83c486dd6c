// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Resource Identity and Deferred Values
//!
//! Every declared resource is addressed by a [`ResourceId`] (owning stack +
//! logical id). Anything that is only known once the provisioning engine has
//! created a resource (an ARN, a private IP, a DNS address list) is modelled
//! as a [`Value`] that *refers* to that resource instead of carrying a literal.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Identity value objects and the deferred-value algebra threaded
//!   between components by the orchestrator

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Identity
// ============================================================================

/// Name of a deployable stack (e.g. `SetupStack`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StackName(pub String);

impl StackName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StackName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Template-unique logical identifier of a resource
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogicalId(pub String);

impl LogicalId {
    /// Derive a stable logical id from a construct path such as `perforce/instance`.
    ///
    /// Segments are reduced to alphanumerics and upper-camel-cased, then an
    /// 8-hex-digit digest of the stack-qualified path is appended so that two
    /// paths which collapse to the same prefix stay distinct.
    pub fn from_path(stack: &StackName, path: &str) -> Self {
        let mut human = String::new();
        for segment in path.split('/') {
            let mut chars = segment.chars().filter(|c| c.is_ascii_alphanumeric());
            if let Some(first) = chars.next() {
                human.push(first.to_ascii_uppercase());
                human.extend(chars);
            }
        }

        let digest = Sha256::digest(format!("{}/{}", stack, path).as_bytes());
        let suffix = hex::encode_upper(&digest[..4]);
        Self(format!("{}{}", human, suffix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LogicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fully-qualified resource address
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceId {
    pub stack: StackName,
    pub logical: LogicalId,
}

impl ResourceId {
    pub fn new(stack: StackName, logical: LogicalId) -> Self {
        Self { stack, logical }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.stack, self.logical)
    }
}

// ============================================================================
// Deferred Values
// ============================================================================

/// A value that may only be resolvable at provisioning time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Value {
    Literal(String),
    Number(i64),
    /// Primary identifier of a resource (`Ref`)
    Ref(ResourceId),
    /// Named attribute of a resource (`Fn::GetAtt`)
    Attr { target: ResourceId, attribute: String },
    /// Concatenation without separator
    Join(Vec<Value>),
    /// Element `index` of a list-valued attribute
    Select { index: usize, list: Box<Value> },
    Base64(Box<Value>),
    /// Dynamic reference to a generated secret field; the plaintext never
    /// appears in the model or in the rendered template.
    SecretField { secret: ResourceId, field: String },
    /// Region of the deploying stack
    Region,
    List(Vec<Value>),
}

impl Value {
    pub fn literal(s: impl Into<String>) -> Self {
        Self::Literal(s.into())
    }

    pub fn reference(id: &ResourceId) -> Self {
        Self::Ref(id.clone())
    }

    pub fn attr(id: &ResourceId, attribute: impl Into<String>) -> Self {
        Self::Attr {
            target: id.clone(),
            attribute: attribute.into(),
        }
    }

    pub fn select(index: usize, list: Value) -> Self {
        Self::Select {
            index,
            list: Box::new(list),
        }
    }

    pub fn base64(inner: Value) -> Self {
        Self::Base64(Box::new(inner))
    }

    pub fn secret_field(secret: &ResourceId, field: impl Into<String>) -> Self {
        Self::SecretField {
            secret: secret.clone(),
            field: field.into(),
        }
    }

    /// Build a normalized join: nested joins are flattened, adjacent literals
    /// merged and empty literals dropped. A join that collapses to a single
    /// part is returned as that part.
    pub fn join(parts: impl IntoIterator<Item = Value>) -> Self {
        fn push_part(out: &mut Vec<Value>, part: Value) {
            match part {
                Value::Literal(s) if s.is_empty() => {}
                Value::Literal(s) => {
                    if let Some(Value::Literal(prev)) = out.last_mut() {
                        prev.push_str(&s);
                    } else {
                        out.push(Value::Literal(s));
                    }
                }
                other => out.push(other),
            }
        }

        let mut out: Vec<Value> = Vec::new();
        for part in parts {
            match part {
                Value::Join(inner) => {
                    for p in inner {
                        push_part(&mut out, p);
                    }
                }
                other => push_part(&mut out, other),
            }
        }

        match out.len() {
            0 => Value::Literal(String::new()),
            1 => out.remove(0),
            _ => Value::Join(out),
        }
    }

    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Self::Literal(s) => Some(s),
            _ => None,
        }
    }

    /// Every resource this value depends on, in first-seen order.
    pub fn references(&self) -> Vec<&ResourceId> {
        let mut acc = Vec::new();
        self.collect_references(&mut acc);
        acc
    }

    fn collect_references<'a>(&'a self, acc: &mut Vec<&'a ResourceId>) {
        match self {
            Self::Ref(id) | Self::Attr { target: id, .. } | Self::SecretField { secret: id, .. } => {
                if !acc.contains(&id) {
                    acc.push(id);
                }
            }
            Self::Join(parts) | Self::List(parts) => {
                for p in parts {
                    p.collect_references(acc);
                }
            }
            Self::Select { list, .. } => list.collect_references(acc),
            Self::Base64(inner) => inner.collect_references(acc),
            Self::Literal(_) | Self::Number(_) | Self::Region => {}
        }
    }

    /// Human-readable rendering with `${...}` markers in place of deferred parts.
    pub fn preview(&self) -> String {
        match self {
            Self::Literal(s) => s.clone(),
            Self::Number(n) => n.to_string(),
            Self::Ref(id) => format!("${{{}}}", id),
            Self::Attr { target, attribute } => format!("${{{}.{}}}", target, attribute),
            Self::Join(parts) => parts.iter().map(Value::preview).collect(),
            Self::Select { index, list } => format!("${{select {} of {}}}", index, list.preview()),
            Self::Base64(inner) => inner.preview(),
            Self::SecretField { secret, field } => format!("${{secret {}:{}}}", secret, field),
            Self::Region => "${region}".to_string(),
            Self::List(items) => items.iter().map(Value::preview).collect::<Vec<_>>().join(","),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Literal(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Literal(s)
    }
}

// ============================================================================
// Tags
// ============================================================================

/// Ordered key/value tag set. Tags are the cross-component protocol: backup
/// selection, domain-join targeting and CI lifecycle conditions all match on them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tags(pub BTreeMap<String, String>);

impl Tags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains_pair(&self, key: &str, value: &str) -> bool {
        self.get(key) == Some(value)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(logical: &str) -> ResourceId {
        ResourceId::new(StackName::new("SetupStack"), LogicalId(logical.to_string()))
    }

    #[test]
    fn test_logical_id_is_stable_and_camel_cased() {
        let stack = StackName::new("VCSStack");
        let a = LogicalId::from_path(&stack, "perforce/instance-role");
        let b = LogicalId::from_path(&stack, "perforce/instance-role");
        assert_eq!(a, b);
        assert!(a.as_str().starts_with("PerforceInstancerole"));
        assert_eq!(a.as_str().len(), "PerforceInstancerole".len() + 8);
    }

    #[test]
    fn test_logical_id_differs_per_stack() {
        let a = LogicalId::from_path(&StackName::new("A"), "bucket");
        let b = LogicalId::from_path(&StackName::new("B"), "bucket");
        assert_ne!(a, b);
    }

    #[test]
    fn test_join_normalizes() {
        let v = Value::join(vec![
            Value::literal("a"),
            Value::literal(""),
            Value::join(vec![Value::literal("b"), Value::Region]),
            Value::literal("c"),
        ]);
        assert_eq!(
            v,
            Value::Join(vec![Value::literal("ab"), Value::Region, Value::literal("c")])
        );

        assert_eq!(Value::join(vec![Value::literal("x"), Value::literal("y")]), Value::literal("xy"));
    }

    #[test]
    fn test_references_are_deduplicated() {
        let bucket = id("Bucket1");
        let v = Value::join(vec![
            Value::reference(&bucket),
            Value::literal("/"),
            Value::attr(&bucket, "Arn"),
            Value::base64(Value::secret_field(&id("Secret1"), "password")),
        ]);
        let refs = v.references();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0], &bucket);
    }

    #[test]
    fn test_preview_never_contains_secret_plaintext() {
        let v = Value::secret_field(&id("AdminSecret"), "password");
        assert_eq!(v.preview(), "${secret SetupStack/AdminSecret:password}");
    }

    #[test]
    fn test_tags_contains_pair() {
        let tags = Tags::new().with("aws-backup", "true");
        assert!(tags.contains_pair("aws-backup", "true"));
        assert!(!tags.contains_pair("aws-backup", "True"));
        assert!(!tags.contains_pair("Name", "true"));
    }
}
