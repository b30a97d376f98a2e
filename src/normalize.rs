//! Field normalization for loosely-typed film documents
//!
//! Source documents carry no schema: a field may be missing, null, a number
//! stored as text (`"1,234"`), or a list stored as a comma-joined string.
//! Everything here is total. Malformed input maps to a documented default
//! and never to an error.

use crate::graph::{PropertyMap, PropertyValue};
use crate::source::SourceRecord;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fallback used for a missing title
pub const UNKNOWN: &str = "Unknown";

/// A logical attribute and the source keys it may be read from, in priority order
#[derive(Debug, Clone, Copy)]
pub struct FieldAlias {
    pub name: &'static str,
    pub keys: &'static [&'static str],
}

pub const TITLE: FieldAlias = FieldAlias { name: "title", keys: &["title", "Title"] };
pub const YEAR: FieldAlias = FieldAlias { name: "year", keys: &["year", "Year"] };
pub const VOTES: FieldAlias = FieldAlias { name: "votes", keys: &["Votes", "votes"] };
pub const REVENUE: FieldAlias = FieldAlias { name: "revenue", keys: &["revenue", "Revenue (Millions)"] };
pub const RATING: FieldAlias = FieldAlias { name: "rating", keys: &["rating", "Rating"] };
pub const METASCORE: FieldAlias = FieldAlias { name: "metascore", keys: &["Metascore", "metascore"] };
pub const RUNTIME: FieldAlias = FieldAlias { name: "runtime", keys: &["runtime_minutes", "Runtime (Minutes)"] };
pub const DIRECTOR: FieldAlias = FieldAlias { name: "director", keys: &["director", "Director"] };
pub const ACTORS: FieldAlias = FieldAlias { name: "actors", keys: &["actors", "Actors"] };
pub const GENRES: FieldAlias = FieldAlias { name: "genres", keys: &["genre", "Genre"] };

/// Typed film rating
///
/// Source ratings are either numeric scores or certificate labels such as
/// `"PG-13"`. Numeric text becomes a score; `"unrated"`, `"N/A"` and blanks
/// collapse to `Unrated`; any other text is kept verbatim as a label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Rating {
    Unrated,
    Score(f64),
    Label(String),
}

impl Rating {
    pub fn from_value(value: Option<&Value>) -> Self {
        match value {
            Some(Value::Number(n)) => match n.as_f64() {
                Some(f) if f.is_finite() && f >= 0.0 => Rating::Score(f),
                _ => Rating::Unrated,
            },
            Some(Value::String(s)) => Self::parse(s),
            _ => Rating::Unrated,
        }
    }

    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.is_empty()
            || trimmed.eq_ignore_ascii_case("unrated")
            || trimmed.eq_ignore_ascii_case("n/a")
        {
            return Rating::Unrated;
        }
        match trimmed.parse::<f64>() {
            Ok(f) if f.is_finite() && f >= 0.0 => Rating::Score(f),
            _ => Rating::Label(trimmed.to_string()),
        }
    }

    /// Graph representation: float score, label text, or `""` when unrated
    pub fn to_property(&self) -> PropertyValue {
        match self {
            Rating::Unrated => PropertyValue::String(String::new()),
            Rating::Score(f) => PropertyValue::Float(*f),
            Rating::Label(s) => PropertyValue::String(s.clone()),
        }
    }
}

/// Normalized attributes of one film, built per record and consumed once
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilmAttributes {
    pub id: String,
    pub title: String,
    pub year: i64,
    pub votes: i64,
    pub revenue: f64,
    pub rating: Rating,
    pub metascore: i64,
    pub runtime: i64,
    /// `None` when the source has no usable director
    pub director: Option<String>,
    pub actors: Vec<String>,
    pub genres: Vec<String>,
}

impl FilmAttributes {
    /// Scalar properties written onto the `Film` node (everything but the merge key)
    pub fn film_properties(&self) -> PropertyMap {
        let mut props = PropertyMap::new();
        props.insert("title".to_string(), self.title.as_str().into());
        props.insert("year".to_string(), self.year.into());
        props.insert("votes".to_string(), self.votes.into());
        props.insert("revenue".to_string(), self.revenue.into());
        props.insert("rating".to_string(), self.rating.to_property());
        props.insert("metascore".to_string(), self.metascore.into());
        props.insert("runtime".to_string(), self.runtime.into());
        props
    }
}

/// Python-style truthiness: null, false, zero, and empty strings, lists
/// and objects are all falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Resolve a logical attribute: the first candidate key holding a truthy value wins
pub fn resolve<'a>(record: &'a SourceRecord, field: &FieldAlias) -> Option<&'a Value> {
    field
        .keys
        .iter()
        .filter_map(|key| record.get(key))
        .find(|value| is_truthy(value))
}

/// Coerce to a non-negative integer.
///
/// Strings lose their thousands separators and surrounding whitespace, are
/// parsed as floats and truncated toward zero. Falsy, `"N/A"`, unparsable,
/// non-finite, negative and out-of-range input all yield `default`.
pub fn safe_int(value: Option<&Value>, default: i64) -> i64 {
    let Some(value) = value.filter(|v| is_truthy(v)) else {
        return default;
    };

    let parsed = match value {
        Value::Number(n) => n.as_i64().map(|i| i as f64).or_else(|| n.as_f64()),
        Value::String(s) => {
            let cleaned = s.replace(',', "");
            let cleaned = cleaned.trim();
            if cleaned.is_empty() || cleaned == "N/A" {
                None
            } else {
                cleaned.parse::<f64>().ok()
            }
        }
        Value::Bool(true) => Some(1.0),
        _ => None,
    };

    match parsed {
        Some(f) if f.is_finite() && f >= 0.0 && f < i64::MAX as f64 => f.trunc() as i64,
        _ => default,
    }
}

/// Coerce to a non-negative float.
///
/// Unlike [`safe_int`], separators are not stripped: `"1,5"` is unparsable
/// and yields `default`, as do falsy, non-finite and negative input.
pub fn safe_float(value: Option<&Value>, default: f64) -> f64 {
    let Some(value) = value.filter(|v| is_truthy(v)) else {
        return default;
    };

    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(true) => Some(1.0),
        _ => None,
    };

    match parsed {
        Some(f) if f.is_finite() && f >= 0.0 => f,
        _ => default,
    }
}

/// Explode a multi-valued field into trimmed, non-empty, de-duplicated tokens.
///
/// Accepts a comma-joined string or an array of strings (array elements are
/// themselves split on commas).
pub fn split_list(value: Option<&Value>) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    let mut push = |text: &str| {
        for token in text.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            if !tokens.iter().any(|t| t == token) {
                tokens.push(token.to_string());
            }
        }
    };

    match value {
        Some(Value::String(s)) => push(s),
        Some(Value::Array(items)) => {
            for item in items {
                if let Some(text) = scalar_text(item) {
                    push(&text);
                }
            }
        }
        _ => {}
    }
    tokens
}

/// Render a document identifier the way the document store prints it
pub fn record_id(record: &SourceRecord) -> String {
    match record.get("_id") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Object(map)) => match map.get("$oid") {
            Some(Value::String(hex)) => hex.clone(),
            _ => Value::Object(map.clone()).to_string(),
        },
        Some(other) => scalar_text(other).unwrap_or_else(|| other.to_string()),
    }
}

/// Build the normalized attributes for one source record. Never fails.
pub fn normalize(record: &SourceRecord) -> FilmAttributes {
    let title = resolve(record, &TITLE)
        .and_then(scalar_text)
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| UNKNOWN.to_string());

    let director = resolve(record, &DIRECTOR)
        .and_then(scalar_text)
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty() && d != UNKNOWN);

    FilmAttributes {
        id: record_id(record),
        title,
        year: safe_int(resolve(record, &YEAR), 0),
        votes: safe_int(resolve(record, &VOTES), 0),
        revenue: safe_float(resolve(record, &REVENUE), 0.0),
        rating: Rating::from_value(resolve(record, &RATING)),
        metascore: safe_int(resolve(record, &METASCORE), 0),
        runtime: safe_int(resolve(record, &RUNTIME), 0),
        director,
        actors: split_list(resolve(record, &ACTORS)),
        genres: split_list(resolve(record, &GENRES)),
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
