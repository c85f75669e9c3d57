//! # Core Data Types
//!
//! The reconciler knows nothing about a table's schema. A [`Record`] is a plain
//! field → JSON value map, and everything else is derived from the field names the
//! caller hands in:
//!
//! - [`MatchSpec`]: the ordered, non-empty list of fields that form the match key
//! - [`RowId`]: the value of a row's identity field (`Id` unless configured otherwise)
//! - [`UpsertMode`] / [`FailurePolicy`]: the caller's mode flags
//!
//! ## Canonical Values
//!
//! Remote stores are loosely typed: the same cell can come back as `1` from one
//! endpoint and `"1"` from another. All comparisons (match keys and identities) go
//! through [`canonical_value`], which renders a JSON value as a string so that those
//! representations compare equal.

use crate::error::{NocoError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

pub const DEFAULT_ID_FIELD: &str = "Id";

/// Render a JSON value in the form used for equality checks.
///
/// Values compare by their string rendering, so `1`, `1.0` and `"1"` are equal.
/// The same holds for `null` and the string `"null"`, and for `true` and `"true"`.
pub fn canonical_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(u) = n.as_u64() {
                u.to_string()
            } else {
                match n.as_f64() {
                    Some(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 => {
                        format!("{}", f as i64)
                    }
                    Some(f) => f.to_string(),
                    None => n.to_string(),
                }
            }
        }
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// One row: field name → value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(field.into(), value)
    }

    pub fn with(mut self, field: impl Into<String>, value: Value) -> Self {
        self.insert(field, value);
        self
    }

    /// The row identity, if the record carries a non-null identity field.
    pub fn identity(&self, id_field: &str) -> Option<RowId> {
        match self.0.get(id_field) {
            None | Some(Value::Null) => None,
            Some(v) => Some(RowId::new(v.clone())),
        }
    }

    /// Write `id` into the identity field, replacing whatever the record had.
    pub fn with_identity(mut self, id_field: &str, id: &RowId) -> Self {
        self.0.insert(id_field.to_string(), id.as_value().clone());
        self
    }

    pub fn fields(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for Record {
    type Error = NocoError;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(NocoError::Api(format!(
                "Expected a JSON object for a record, got {}",
                json_type_name(&other)
            ))),
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Identity of a remote row. Equality and hashing use the canonical form, so
/// `1` and `"1"` name the same row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowId(Value);

impl RowId {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn canonical(&self) -> String {
        canonical_value(&self.0)
    }
}

impl PartialEq for RowId {
    fn eq(&self, other: &Self) -> bool {
        self.canonical() == other.canonical()
    }
}

impl Eq for RowId {}

impl Hash for RowId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical().hash(state);
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

impl From<i64> for RowId {
    fn from(id: i64) -> Self {
        Self(Value::from(id))
    }
}

impl From<&str> for RowId {
    fn from(id: &str) -> Self {
        Self(Value::from(id))
    }
}

/// Ordered, non-empty set of field names forming the composite match key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSpec(Vec<String>);

impl MatchSpec {
    pub fn new<I, S>(fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for field in fields {
            let field = field.into().trim().to_string();
            if field.is_empty() {
                return Err(NocoError::InvalidMatchSpec(
                    "match field names cannot be empty".to_string(),
                ));
            }
            if out.contains(&field) {
                return Err(NocoError::InvalidMatchSpec(format!(
                    "match field '{}' is listed more than once",
                    field
                )));
            }
            out.push(field);
        }

        if out.is_empty() {
            return Err(NocoError::InvalidMatchSpec(
                "at least one match field is required".to_string(),
            ));
        }
        Ok(Self(out))
    }

    pub fn fields(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromStr for MatchSpec {
    type Err = NocoError;

    /// Parses a comma-separated field list, e.g. `Email,Name`.
    fn from_str(s: &str) -> Result<Self> {
        Self::new(s.split(','))
    }
}

impl fmt::Display for MatchSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(","))
    }
}

/// Mode flag for single-record upsert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UpsertMode {
    #[default]
    Normal,
    CreateOnly,
    UpdateOnly,
}

/// What a bulk operation does when a record fails.
///
/// The default is [`FailurePolicy::ContinueOnError`]: every record is attempted and
/// failures are reported inline. `FailFast` is opt-in (`--fail-fast`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    FailFast,
    #[default]
    ContinueOnError,
}

impl FailurePolicy {
    pub fn from_flag(fail_fast: bool) -> Self {
        if fail_fast {
            FailurePolicy::FailFast
        } else {
            FailurePolicy::ContinueOnError
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        Record::try_from(value).unwrap()
    }

    #[test]
    fn canonical_value_normalizes_numbers() {
        assert_eq!(canonical_value(&json!(1)), "1");
        assert_eq!(canonical_value(&json!(1.0)), "1");
        assert_eq!(canonical_value(&json!(2.5)), "2.5");
        assert_eq!(canonical_value(&json!("1")), "1");
        assert_eq!(canonical_value(&json!(true)), "true");
        assert_eq!(canonical_value(&json!(null)), "null");
        assert_eq!(canonical_value(&json!(["a", 1])), r#"["a",1]"#);
    }

    #[test]
    fn scalars_and_their_string_forms_collide() {
        assert_eq!(canonical_value(&json!(null)), canonical_value(&json!("null")));
        assert_eq!(canonical_value(&json!(false)), canonical_value(&json!("false")));
        assert_ne!(canonical_value(&json!(null)), canonical_value(&json!("")));
    }

    #[test]
    fn row_ids_compare_by_canonical_form() {
        assert_eq!(RowId::from(7), RowId::from("7"));
        assert_ne!(RowId::from(7), RowId::from(8));
    }

    #[test]
    fn identity_ignores_null() {
        let rec = record(json!({"Id": null, "Name": "x"}));
        assert!(rec.identity("Id").is_none());

        let rec = record(json!({"Id": 3}));
        assert_eq!(rec.identity("Id"), Some(RowId::from(3)));
    }

    #[test]
    fn with_identity_overrides_caller_value() {
        let rec = record(json!({"Email": "a@x.com", "Id": 99}));
        let merged = rec.with_identity("Id", &RowId::from(1));
        assert_eq!(merged.get("Id"), Some(&json!(1)));
        assert_eq!(merged.get("Email"), Some(&json!("a@x.com")));
    }

    #[test]
    fn record_requires_object() {
        let err = Record::try_from(json!([1, 2])).unwrap_err();
        assert!(err.to_string().contains("an array"));
    }

    #[test]
    fn match_spec_parses_comma_list() {
        let spec: MatchSpec = "Email, Name".parse().unwrap();
        assert_eq!(spec.fields(), &["Email".to_string(), "Name".to_string()]);
        assert_eq!(spec.to_string(), "Email,Name");
    }

    #[test]
    fn match_spec_rejects_empty_and_duplicates() {
        assert!(matches!(
            MatchSpec::new(Vec::<String>::new()),
            Err(NocoError::InvalidMatchSpec(_))
        ));
        assert!(matches!(
            "Email,".parse::<MatchSpec>(),
            Err(NocoError::InvalidMatchSpec(_))
        ));
        assert!(matches!(
            "Email,Email".parse::<MatchSpec>(),
            Err(NocoError::InvalidMatchSpec(_))
        ));
    }

    #[test]
    fn failure_policy_defaults_to_continue() {
        assert_eq!(FailurePolicy::default(), FailurePolicy::ContinueOnError);
        assert_eq!(FailurePolicy::from_flag(true), FailurePolicy::FailFast);
    }
}
