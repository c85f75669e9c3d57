//! # Matching
//!
//! Decides which remote rows correspond to an incoming record.
//!
//! A [`MatchKey`] is the tuple of canonical values of the [`MatchSpec`] fields, in
//! spec order. Two records match when their keys are equal, i.e. when *all* listed
//! fields are equal after [`canonical_value`].
//!
//! Two entry points cover the two reconciliation shapes:
//!
//! - [`Matcher`] scans one page of rows for one record (single-record upsert, where
//!   the fetch is filtered down to candidate rows).
//! - [`ExistingRowIndex`] indexes a whole table once, page by page, so that many
//!   records can be resolved against it (bulk upsert).
//!
//! A key that maps to two or more distinct row identities is ambiguous. That is a
//! data-integrity condition: it is reported, never resolved by picking one.

use crate::error::{AmbiguityOrigin, NocoError, RecordError, Result};
use crate::model::{canonical_value, MatchSpec, Record, RowId};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// Canonical match-key tuple, paired with field names for display.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MatchKey(Vec<(String, String)>);

impl MatchKey {
    /// Key of an incoming record. Every match field must be present.
    pub fn for_record(spec: &MatchSpec, record: &Record) -> Result<Self> {
        spec.fields()
            .iter()
            .map(|field| {
                record
                    .get(field)
                    .map(|v| (field.clone(), canonical_value(v)))
                    .ok_or_else(|| {
                        NocoError::InvalidMatchSpec(format!(
                            "match field '{}' is missing from the record",
                            field
                        ))
                    })
            })
            .collect::<Result<Vec<_>>>()
            .map(Self)
    }

    /// Key of a remote row, or `None` when the row lacks one of the fields.
    pub fn for_row(spec: &MatchSpec, row: &Record) -> Option<Self> {
        spec.fields()
            .iter()
            .map(|field| row.get(field).map(|v| (field.clone(), canonical_value(v))))
            .collect::<Option<Vec<_>>>()
            .map(Self)
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for MatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(field, value)| format!("{}={}", field, value))
            .collect();
        write!(f, "({})", parts.join(", "))
    }
}

/// Result of matching one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Match {
    None,
    Unique(RowId),
}

/// Matches a record against rows under a spec.
#[derive(Debug, Clone)]
pub struct Matcher<'a> {
    spec: &'a MatchSpec,
    id_field: &'a str,
}

impl<'a> Matcher<'a> {
    pub fn new(spec: &'a MatchSpec, id_field: &'a str) -> Self {
        Self { spec, id_field }
    }

    /// Identities of every row in `rows` whose key equals the record's key.
    ///
    /// Fails with `InvalidMatchSpec` if the record lacks a match field, and with
    /// `MissingIdentity` if a matching row has no identity to update by.
    pub fn matching_ids(&self, record: &Record, rows: &[Record]) -> Result<Vec<RowId>> {
        let key = MatchKey::for_record(self.spec, record)?;
        let mut ids = Vec::new();
        for row in rows {
            if MatchKey::for_row(self.spec, row).as_ref() != Some(&key) {
                continue;
            }
            let id = row
                .identity(self.id_field)
                .ok_or_else(|| RecordError::MissingIdentity {
                    field: self.id_field.to_string(),
                })?;
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    /// Classify a record against a complete candidate set.
    pub fn classify(&self, record: &Record, rows: &[Record]) -> Result<Match> {
        let key = MatchKey::for_record(self.spec, record)?;
        let ids = self.matching_ids(record, rows)?;
        resolve(&key, ids)
    }
}

/// Turn a set of distinct matched identities into a match decision.
pub fn resolve(key: &MatchKey, mut ids: Vec<RowId>) -> Result<Match> {
    match ids.len() {
        0 => Ok(Match::None),
        1 => Ok(Match::Unique(ids.remove(0))),
        count => Err(RecordError::AmbiguousMatch {
            key: key.to_string(),
            count,
            origin: AmbiguityOrigin::Remote,
        }
        .into()),
    }
}

/// Lookup result against the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<'i> {
    None,
    Unique(&'i RowId),
    Ambiguous(usize),
    /// A row shares the key but has no identity to update it by.
    MissingIdentity,
}

#[derive(Debug, Default)]
struct KeyEntry {
    ids: Vec<RowId>,
    without_identity: usize,
}

/// Match key → distinct row identities, built incrementally as pages arrive.
///
/// Once a key has two distinct identities it stays ambiguous: later pages can only
/// add identities, never remove them. Rows that carry the key but no identity are
/// kept too, so the key is never mistaken for an unmatched one.
#[derive(Debug)]
pub struct ExistingRowIndex<'a> {
    spec: &'a MatchSpec,
    id_field: &'a str,
    entries: HashMap<MatchKey, KeyEntry>,
    rows_seen: usize,
    rows_skipped: usize,
}

impl<'a> ExistingRowIndex<'a> {
    pub fn new(spec: &'a MatchSpec, id_field: &'a str) -> Self {
        Self {
            spec,
            id_field,
            entries: HashMap::new(),
            rows_seen: 0,
            rows_skipped: 0,
        }
    }

    pub fn add_page(&mut self, rows: &[Record]) {
        for row in rows {
            self.rows_seen += 1;
            let Some(key) = MatchKey::for_row(self.spec, row) else {
                self.rows_skipped += 1;
                continue;
            };
            let entry = self.entries.entry(key).or_default();
            match row.identity(self.id_field) {
                Some(id) if !entry.ids.contains(&id) => entry.ids.push(id),
                Some(_) => {}
                None => entry.without_identity += 1,
            }
        }
        debug!(
            rows = rows.len(),
            total_seen = self.rows_seen,
            keys = self.entries.len(),
            "indexed page"
        );
    }

    pub fn lookup(&self, key: &MatchKey) -> Lookup<'_> {
        let Some(entry) = self.entries.get(key) else {
            return Lookup::None;
        };
        if entry.without_identity > 0 {
            return Lookup::MissingIdentity;
        }
        match entry.ids.as_slice() {
            [] => Lookup::None,
            [id] => Lookup::Unique(id),
            ids => Lookup::Ambiguous(ids.len()),
        }
    }

    pub fn is_ambiguous(&self, key: &MatchKey) -> bool {
        matches!(self.lookup(key), Lookup::Ambiguous(_))
    }

    pub fn rows_seen(&self) -> usize {
        self.rows_seen
    }

    /// Rows that could not be keyed because a match field is missing.
    pub fn rows_skipped(&self) -> usize {
        self.rows_skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn rec(value: Value) -> Record {
        Record::try_from(value).unwrap()
    }

    fn email_spec() -> MatchSpec {
        "Email".parse().unwrap()
    }

    #[test]
    fn finds_unique_match() {
        let spec = email_spec();
        let rows = vec![
            rec(json!({"Id": 1, "Email": "a@x.com"})),
            rec(json!({"Id": 2, "Email": "b@x.com"})),
        ];
        let matcher = Matcher::new(&spec, "Id");
        let result = matcher
            .classify(&rec(json!({"Email": "b@x.com"})), &rows)
            .unwrap();
        assert_eq!(result, Match::Unique(RowId::from(2)));
    }

    #[test]
    fn no_match_when_key_absent_remotely() {
        let spec = email_spec();
        let rows = vec![rec(json!({"Id": 1, "Email": "a@x.com"}))];
        let matcher = Matcher::new(&spec, "Id");
        let result = matcher
            .classify(&rec(json!({"Email": "z@x.com"})), &rows)
            .unwrap();
        assert_eq!(result, Match::None);
    }

    #[test]
    fn two_rows_sharing_key_is_ambiguous() {
        let spec = email_spec();
        let rows = vec![
            rec(json!({"Id": 1, "Email": "dup@x.com"})),
            rec(json!({"Id": 2, "Email": "dup@x.com"})),
        ];
        let matcher = Matcher::new(&spec, "Id");
        let err = matcher
            .classify(&rec(json!({"Email": "dup@x.com"})), &rows)
            .unwrap_err();
        match err {
            NocoError::Record(RecordError::AmbiguousMatch { key, count, origin }) => {
                assert_eq!(key, "(Email=dup@x.com)");
                assert_eq!(count, 2);
                assert_eq!(origin, AmbiguityOrigin::Remote);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn composite_key_requires_all_fields() {
        let spec: MatchSpec = "First,Last".parse().unwrap();
        let rows = vec![
            rec(json!({"Id": 1, "First": "Ada", "Last": "Lovelace"})),
            rec(json!({"Id": 2, "First": "Ada", "Last": "Byron"})),
        ];
        let matcher = Matcher::new(&spec, "Id");
        let result = matcher
            .classify(&rec(json!({"First": "Ada", "Last": "Byron"})), &rows)
            .unwrap();
        assert_eq!(result, Match::Unique(RowId::from(2)));
    }

    #[test]
    fn numbers_and_strings_compare_canonically() {
        let spec: MatchSpec = "Code".parse().unwrap();
        let rows = vec![rec(json!({"Id": "r1", "Code": 42}))];
        let matcher = Matcher::new(&spec, "Id");
        let result = matcher
            .classify(&rec(json!({"Code": "42"})), &rows)
            .unwrap();
        assert_eq!(result, Match::Unique(RowId::from("r1")));
    }

    #[test]
    fn missing_match_field_is_invalid_spec() {
        let spec = email_spec();
        let matcher = Matcher::new(&spec, "Id");
        let err = matcher
            .classify(&rec(json!({"Name": "no email"})), &[])
            .unwrap_err();
        assert!(matches!(err, NocoError::InvalidMatchSpec(_)));
    }

    #[test]
    fn matching_row_without_identity_is_reported() {
        let spec = email_spec();
        let rows = vec![rec(json!({"Email": "a@x.com"}))];
        let matcher = Matcher::new(&spec, "Id");
        let err = matcher
            .classify(&rec(json!({"Email": "a@x.com"})), &rows)
            .unwrap_err();
        assert!(matches!(
            err,
            NocoError::Record(RecordError::MissingIdentity { .. })
        ));
    }

    #[test]
    fn same_row_seen_twice_is_not_ambiguous() {
        let spec = email_spec();
        let rows = vec![
            rec(json!({"Id": 1, "Email": "a@x.com"})),
            rec(json!({"Id": "1", "Email": "a@x.com"})),
        ];
        let matcher = Matcher::new(&spec, "Id");
        let result = matcher
            .classify(&rec(json!({"Email": "a@x.com"})), &rows)
            .unwrap();
        assert_eq!(result, Match::Unique(RowId::from(1)));
    }

    #[test]
    fn index_marks_key_ambiguous_across_pages() {
        let spec = email_spec();
        let mut index = ExistingRowIndex::new(&spec, "Id");
        index.add_page(&[rec(json!({"Id": 1, "Email": "dup@x.com"}))]);

        let key = MatchKey::for_record(&spec, &rec(json!({"Email": "dup@x.com"}))).unwrap();
        assert_eq!(index.lookup(&key), Lookup::Unique(&RowId::from(1)));

        index.add_page(&[
            rec(json!({"Id": 2, "Email": "dup@x.com"})),
            rec(json!({"Id": 3, "Email": "other@x.com"})),
        ]);
        assert_eq!(index.lookup(&key), Lookup::Ambiguous(2));

        index.add_page(&[rec(json!({"Id": 4, "Email": "later@x.com"}))]);
        assert!(index.is_ambiguous(&key));
        assert_eq!(index.rows_seen(), 4);
    }

    #[test]
    fn index_skips_rows_without_match_fields() {
        let spec = email_spec();
        let mut index = ExistingRowIndex::new(&spec, "Id");
        index.add_page(&[
            rec(json!({"Id": 1})),
            rec(json!({"Email": "no-id@x.com"})),
            rec(json!({"Id": 3, "Email": "ok@x.com"})),
        ]);
        assert_eq!(index.rows_seen(), 3);
        assert_eq!(index.rows_skipped(), 1);
    }

    #[test]
    fn index_keeps_keyed_rows_without_identity() {
        let spec = email_spec();
        let mut index = ExistingRowIndex::new(&spec, "Id");
        index.add_page(&[
            rec(json!({"Email": "no-id@x.com"})),
            rec(json!({"Id": 2, "Email": "both@x.com"})),
        ]);
        index.add_page(&[rec(json!({"Email": "both@x.com"}))]);

        let key = |email: &str| {
            MatchKey::for_record(&spec, &rec(json!({ "Email": email }))).unwrap()
        };
        assert_eq!(index.lookup(&key("no-id@x.com")), Lookup::MissingIdentity);
        assert_eq!(index.lookup(&key("both@x.com")), Lookup::MissingIdentity);
        assert_eq!(index.lookup(&key("other@x.com")), Lookup::None);
        assert_eq!(index.rows_skipped(), 0);
    }

    #[test]
    fn key_display_lists_fields_in_order() {
        let spec: MatchSpec = "First,Last".parse().unwrap();
        let key =
            MatchKey::for_record(&spec, &rec(json!({"Last": "Hopper", "First": "Grace"})))
                .unwrap();
        assert_eq!(key.to_string(), "(First=Grace, Last=Hopper)");
        assert_eq!(key.values().collect::<Vec<_>>(), vec!["Grace", "Hopper"]);
    }
}
