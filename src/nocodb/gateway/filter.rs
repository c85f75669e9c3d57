//! NocoDB `where` expressions for match lookups.
//!
//! Only the conjunctive `eq` subset is produced: `(Email,eq,a@x.com)~and(Name,eq,Ada)`.
//! The expression syntax has no escaping, so values containing any of `( ) , ~`
//! cannot be expressed. In that case no filter is built and the caller scans the
//! table unfiltered; local matching keeps the result correct either way.

use crate::model::{canonical_value, MatchSpec, Record};
use serde_json::Value;

const RESERVED: [char; 4] = ['(', ')', ',', '~'];

/// One `(field,eq,value)` condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub field: String,
    pub value: String,
}

fn expressible(text: &str) -> bool {
    !text.is_empty() && !text.contains(RESERVED)
}

/// Build a `where` clause selecting rows whose match fields equal the record's.
pub fn match_filter(spec: &MatchSpec, record: &Record) -> Option<String> {
    let mut parts = Vec::with_capacity(spec.len());
    for field in spec.fields() {
        let value = match record.get(field)? {
            v @ (Value::String(_) | Value::Number(_) | Value::Bool(_)) => canonical_value(v),
            _ => return None,
        };
        if !expressible(field) || !expressible(&value) {
            return None;
        }
        parts.push(format!("({},eq,{})", field, value));
    }
    Some(parts.join("~and"))
}

/// Parse a clause produced by [`match_filter`]. Returns `None` for anything else.
pub fn parse_eq_clause(clause: &str) -> Option<Vec<Condition>> {
    clause
        .split("~and")
        .map(|part| {
            let inner = part.trim().strip_prefix('(')?.strip_suffix(')')?;
            let mut pieces = inner.splitn(3, ',');
            let field = pieces.next()?;
            let op = pieces.next()?;
            let value = pieces.next()?;
            (op == "eq").then(|| Condition {
                field: field.to_string(),
                value: value.to_string(),
            })
        })
        .collect()
}
