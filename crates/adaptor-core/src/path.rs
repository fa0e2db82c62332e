//! JSON path lookups into the job state
//!
//! Supports the subset of JSONPath job scripts use in practice:
//! `$`, `.key`, `['key']`, `[index]` and `[*]`.

use adaptor_common::{AdaptorError, Result};
use serde_json::Value;
use std::str::FromStr;

use crate::param::Param;
use crate::state::State;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
    Wildcard,
}

/// A parsed JSON path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPath {
    segments: Vec<Segment>,
}

impl JsonPath {
    /// All values the path selects, in document order
    pub fn select<'a>(&self, root: &'a Value) -> Vec<&'a Value> {
        let mut current = vec![root];

        for segment in &self.segments {
            let mut next = Vec::new();
            for value in current {
                match (segment, value) {
                    (Segment::Key(key), Value::Object(map)) => next.extend(map.get(key)),
                    (Segment::Index(i), Value::Array(items)) => next.extend(items.get(*i)),
                    (Segment::Wildcard, Value::Array(items)) => next.extend(items.iter()),
                    (Segment::Wildcard, Value::Object(map)) => next.extend(map.values()),
                    _ => {},
                }
            }
            current = next;
        }

        current
    }

    /// Single-valued lookup: `null` when nothing matches. Paths containing a
    /// wildcard always yield an array of the matches.
    pub fn query(&self, root: &Value) -> Value {
        let matches = self.select(root);
        if self.segments.contains(&Segment::Wildcard) {
            Value::Array(matches.into_iter().cloned().collect())
        } else {
            matches.first().map(|v| (*v).clone()).unwrap_or(Value::Null)
        }
    }
}

impl FromStr for JsonPath {
    type Err = AdaptorError;

    fn from_str(path: &str) -> Result<Self> {
        let invalid = |reason: &str| AdaptorError::parse(format!("invalid path '{}': {}", path, reason));

        let trimmed = path.trim();
        let mut rest = trimmed.strip_prefix('$').unwrap_or(trimmed);

        let mut segments = Vec::new();
        // a bare leading key ("data.items") is only allowed without '$'
        let mut first = rest.len() == trimmed.len();

        while !rest.is_empty() {
            if let Some(after) = rest.strip_prefix('[') {
                let close = after.find(']').ok_or_else(|| invalid("unclosed '['"))?;
                let inner = after[..close].trim();
                rest = &after[close + 1..];

                let segment = if inner == "*" {
                    Segment::Wildcard
                } else if let Some(quoted) = strip_quotes(inner) {
                    Segment::Key(quoted.to_string())
                } else {
                    Segment::Index(inner.parse().map_err(|_| invalid("bad index"))?)
                };
                segments.push(segment);
            } else {
                let body = match rest.strip_prefix('.') {
                    Some(after) => after,
                    None if first => rest,
                    None => return Err(invalid("expected '.' or '['")),
                };
                let end = body.find(['.', '[']).unwrap_or(body.len());
                let key = &body[..end];
                if key.is_empty() {
                    return Err(invalid("empty key"));
                }
                segments.push(if key == "*" {
                    Segment::Wildcard
                } else {
                    Segment::Key(key.to_string())
                });
                rest = &body[end..];
            }
            first = false;
        }

        Ok(Self { segments })
    }
}

fn strip_quotes(s: &str) -> Option<&str> {
    s.strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .or_else(|| s.strip_prefix('"').and_then(|s| s.strip_suffix('"')))
}

/// Value at `path`, looked up against the whole state
pub fn source_value(path: &str) -> Param<Value> {
    let parsed = path.parse::<JsonPath>();
    Param::try_derived(move |state: &State| match &parsed {
        Ok(path) => Ok(path.query(&state.to_value())),
        Err(err) => Err(AdaptorError::parse(err.to_string())),
    })
}

/// Rewrite a path relative to `data` into a path from the state root,
/// e.g. `$.items[0]` becomes `$.data.items[0]`
pub fn data_path(path: &str) -> String {
    let trimmed = path.trim();
    let relative = trimmed
        .strip_prefix("$.")
        .or_else(|| trimmed.strip_prefix('$'))
        .unwrap_or(trimmed);

    if relative.is_empty() {
        "$.data".to_string()
    } else if relative.starts_with('[') {
        format!("$.data{}", relative)
    } else {
        format!("$.data.{}", relative)
    }
}

/// Value at `path` inside `state.data`
pub fn data_value(path: &str) -> Param<Value> {
    source_value(&data_path(path))
}

/// Value at `path` inside the most recent entry of `references`
pub fn last_reference_value(path: &str) -> Param<Value> {
    let parsed = path.parse::<JsonPath>();
    Param::try_derived(move |state: &State| {
        let path = parsed.as_ref().map_err(|e| AdaptorError::parse(e.to_string()))?;
        Ok(state
            .last_reference()
            .map(|reference| path.query(reference))
            .unwrap_or(Value::Null))
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> Value {
        json!({
            "data": {
                "items": [
                    {"id": 1, "name": "a"},
                    {"id": 2, "name": "b"}
                ],
                "odd key": true
            }
        })
    }

    #[test]
    fn test_parse_and_query() {
        let root = doc();

        let path: JsonPath = "$.data.items[1].name".parse().unwrap();
        assert_eq!(path.query(&root), json!("b"));

        let path: JsonPath = "data['odd key']".parse().unwrap();
        assert_eq!(path.query(&root), json!(true));

        let path: JsonPath = "$.data.items[*].id".parse().unwrap();
        assert_eq!(path.query(&root), json!([1, 2]));

        let path: JsonPath = "$".parse().unwrap();
        assert_eq!(path.query(&root), root);

        let path: JsonPath = "$.data.missing.deeper".parse().unwrap();
        assert_eq!(path.query(&root), Value::Null);
    }

    #[test]
    fn test_invalid_paths() {
        assert!("$.data[".parse::<JsonPath>().is_err());
        assert!("$.data[x]".parse::<JsonPath>().is_err());
        assert!("$..data".parse::<JsonPath>().is_err());
        assert!("$data".parse::<JsonPath>().is_err());
    }

    #[test]
    fn test_data_path() {
        assert_eq!(data_path("$.items[0]"), "$.data.items[0]");
        assert_eq!(data_path("items"), "$.data.items");
        assert_eq!(data_path("$[0]"), "$.data[0]");
        assert_eq!(data_path("$"), "$.data");
    }

    #[test]
    fn test_state_lookups() {
        let state = State::from_initial(json!({"configuration": {"project": "p1"}}))
            .unwrap()
            .advance(json!({"rows": [10, 20]}))
            .advance(json!({"rows": [30]}));

        assert_eq!(
            source_value("$.configuration.project").resolve(&state).unwrap(),
            json!("p1")
        );
        assert_eq!(data_value("$.rows[0]").resolve(&state).unwrap(), json!(30));
        assert_eq!(
            last_reference_value("$.rows[1]").resolve(&state).unwrap(),
            json!(20)
        );
        assert!(source_value("$.[").resolve(&state).is_err());
    }
}
