// src/extract.rs

use anyhow::{anyhow, Result};
use serde_json::{Map, Value as Json};
use std::{fmt, str::FromStr};

/// Location of a value inside a ping, e.g. `payload/payload/sentiment`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    /// Build a path from already split segments.
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a `/`-separated path. Empty paths and empty segments are rejected.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(anyhow!("field path is empty"));
        }
        let segments: Vec<String> = trimmed.split('/').map(str::to_string).collect();
        if let Some(idx) = segments.iter().position(|s| s.is_empty()) {
            return Err(anyhow!(
                "field path `{}` has an empty segment at position {}",
                raw,
                idx
            ));
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Walk the path through nested objects.
    ///
    /// Returns `None` as soon as a segment is missing or an intermediate value
    /// is not an object. The value found is returned untouched, JSON `null`
    /// included.
    pub fn get<'a>(&self, ping: &'a Json) -> Option<&'a Json> {
        self.segments
            .iter()
            .try_fold(ping, |node, segment| node.as_object()?.get(segment))
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

impl FromStr for FieldPath {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Reduce a ping to the values reachable through `paths`.
///
/// Extracting any of `paths` from the projection gives the same result as
/// extracting it from the full ping.
pub fn project(ping: &Json, paths: &[&FieldPath]) -> Json {
    let mut out = Json::Object(Map::new());
    for path in paths {
        if let Some(value) = path.get(ping) {
            insert_at(&mut out, path.segments(), value.clone());
        }
    }
    out
}

fn insert_at(root: &mut Json, segments: &[String], value: Json) {
    let Some((last, parents)) = segments.split_last() else {
        return;
    };

    let mut node = root;
    for segment in parents {
        let obj = match node {
            Json::Object(obj) => obj,
            _ => return,
        };
        node = obj
            .entry(segment.clone())
            .or_insert_with(|| Json::Object(Map::new()));
    }

    if let Json::Object(obj) = node {
        obj.insert(last.clone(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_ping() -> Json {
        json!({
            "creationDate": "2017-02-23T15:06:12.503Z",
            "payload": {
                "test": "pulse@mozilla.com",
                "payload": {
                    "sentiment": 5,
                    "reason": null,
                    "addons": ["a", "b"]
                }
            }
        })
    }

    #[test]
    fn parse_splits_on_slash() -> Result<()> {
        let path = FieldPath::parse("payload/payload/sentiment")?;
        assert_eq!(path.segments(), ["payload", "payload", "sentiment"]);
        assert_eq!(path.to_string(), "payload/payload/sentiment");
        Ok(())
    }

    #[test]
    fn parse_rejects_empty_segments() {
        assert!(FieldPath::parse("").is_err());
        assert!(FieldPath::parse("payload//id").is_err());
        assert!(FieldPath::parse("/payload").is_err());
    }

    #[test]
    fn get_walks_nested_objects() -> Result<()> {
        let ping = sample_ping();
        let path: FieldPath = "payload/payload/sentiment".parse()?;
        assert_eq!(path.get(&ping), Some(&json!(5)));
        Ok(())
    }

    #[test]
    fn get_returns_none_for_missing_segment() -> Result<()> {
        let ping = sample_ping();
        assert_eq!(FieldPath::parse("payload/payload/method")?.get(&ping), None);
        assert_eq!(FieldPath::parse("meta/docType")?.get(&ping), None);
        Ok(())
    }

    #[test]
    fn get_stops_at_non_object_intermediate() -> Result<()> {
        let ping = sample_ping();
        // "sentiment" is a number and "addons" an array, neither can be walked into
        assert_eq!(FieldPath::parse("payload/payload/sentiment/x")?.get(&ping), None);
        assert_eq!(FieldPath::parse("payload/payload/addons/0")?.get(&ping), None);
        Ok(())
    }

    #[test]
    fn get_keeps_explicit_null() -> Result<()> {
        let ping = sample_ping();
        assert_eq!(
            FieldPath::parse("payload/payload/reason")?.get(&ping),
            Some(&Json::Null)
        );
        Ok(())
    }

    #[test]
    fn projection_keeps_only_declared_paths() -> Result<()> {
        let ping = sample_ping();
        let sentiment = FieldPath::parse("payload/payload/sentiment")?;
        let test = FieldPath::parse("payload/test")?;
        let missing = FieldPath::parse("payload/payload/method")?;
        let paths = vec![&sentiment, &test, &missing];

        let projected = project(&ping, &paths);
        assert_eq!(
            projected,
            json!({"payload": {"test": "pulse@mozilla.com", "payload": {"sentiment": 5}}})
        );
        for path in &paths {
            assert_eq!(path.get(&projected), path.get(&ping));
        }
        Ok(())
    }

    #[test]
    fn projection_handles_overlapping_paths() -> Result<()> {
        let ping = sample_ping();
        let inner = FieldPath::parse("payload/payload")?;
        let leaf = FieldPath::parse("payload/payload/sentiment")?;

        let projected = project(&ping, &[&leaf, &inner]);
        assert_eq!(inner.get(&projected), inner.get(&ping));
        assert_eq!(leaf.get(&projected), Some(&json!(5)));
        Ok(())
    }
}
