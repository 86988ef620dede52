// src/source.rs
use anyhow::{bail, Context, Result};
use glob::glob;
use rayon::prelude::*;
use serde_json::Value as Json;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument};

use crate::extract::{project, FieldPath};

/// Selects pings by document type, application and submission day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingQuery {
    pub doc_type: String,
    pub app_name: String,
    /// `YYYYMMDD`
    pub submission_date: String,
}

impl PingQuery {
    pub fn new(
        doc_type: impl Into<String>,
        app_name: impl Into<String>,
        submission_date: impl Into<String>,
    ) -> Self {
        Self {
            doc_type: doc_type.into(),
            app_name: app_name.into(),
            submission_date: submission_date.into(),
        }
    }

    /// True when the ping's `meta` block matches every criterion.
    pub fn matches(&self, ping: &Json) -> bool {
        [
            ("docType", &self.doc_type),
            ("appName", &self.app_name),
            ("submissionDate", &self.submission_date),
        ]
        .iter()
        .all(|(key, expected)| {
            FieldPath::new(["meta", *key])
                .get(ping)
                .and_then(Json::as_str)
                == Some(expected.as_str())
        })
    }
}

/// Anything that can hand out the pings selected by a query.
pub trait PingSource: Send + Sync {
    fn records(&self, query: &PingQuery) -> Result<Vec<Json>>;

    /// Records reduced to the values reachable through `paths`.
    fn projected(&self, query: &PingQuery, paths: &[&FieldPath]) -> Result<Vec<Json>> {
        Ok(self
            .records(query)?
            .into_par_iter()
            .map(|ping| project(&ping, paths))
            .collect())
    }
}

/// Pings held in memory. Useful for tests and for callers that already have
/// the records.
#[derive(Debug, Clone, Default)]
pub struct MemorySource(pub Vec<Json>);

impl PingSource for MemorySource {
    fn records(&self, query: &PingQuery) -> Result<Vec<Json>> {
        Ok(self.0.iter().filter(|p| query.matches(p)).cloned().collect())
    }
}

/// Pings stored as JSON files below a directory.
///
/// `*.json` files hold one ping or an array of pings; `*.jsonl` files hold one
/// ping per non-empty line. Any unreadable file or malformed record fails the
/// whole read.
#[derive(Debug, Clone)]
pub struct LocalDataset {
    root: PathBuf,
}

impl LocalDataset {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn files(&self) -> Result<Vec<PathBuf>> {
        if !self.root.is_dir() {
            bail!("input directory {} does not exist", self.root.display());
        }
        let pattern = format!("{}/**/*.json*", self.root.display());
        let mut files = glob(&pattern)?
            .filter_map(Result::ok)
            .filter(|p| {
                matches!(
                    p.extension().and_then(|e| e.to_str()),
                    Some("json") | Some("jsonl")
                )
            })
            .collect::<Vec<_>>();
        files.sort();
        Ok(files)
    }
}

fn read_file(path: &Path) -> Result<Vec<Json>> {
    let text =
        fs::read_to_string(path).with_context(|| format!("failed to read `{}`", path.display()))?;

    if path.extension().and_then(|e| e.to_str()) == Some("jsonl") {
        return text
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(n, line)| {
                serde_json::from_str(line)
                    .with_context(|| format!("malformed ping at {}:{}", path.display(), n + 1))
            })
            .collect();
    }

    let doc: Json = serde_json::from_str(&text)
        .with_context(|| format!("malformed JSON in `{}`", path.display()))?;
    Ok(match doc {
        Json::Array(pings) => pings,
        ping => vec![ping],
    })
}

impl PingSource for LocalDataset {
    #[instrument(level = "info", skip(self), fields(root = %self.root.display()))]
    fn records(&self, query: &PingQuery) -> Result<Vec<Json>> {
        let files = self.files()?;
        debug!(files = files.len(), "discovered ping files");

        let per_file = files
            .par_iter()
            .map(|path| read_file(path))
            .collect::<Result<Vec<_>>>()?;

        let mut read = 0usize;
        let mut kept = Vec::new();
        for pings in per_file {
            read += pings.len();
            kept.extend(pings.into_iter().filter(|p| query.matches(p)));
        }
        info!(read, kept = kept.len(), "loaded pings");
        Ok(kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn ping(doc_type: &str, date: &str, id: u32) -> Json {
        json!({
            "meta": {"docType": doc_type, "appName": "Firefox", "submissionDate": date},
            "payload": {"payload": {"id": id}}
        })
    }

    fn query() -> PingQuery {
        PingQuery::new("testpilottest", "Firefox", "20170223")
    }

    #[test]
    fn query_checks_every_meta_field() {
        let q = query();
        assert!(q.matches(&ping("testpilottest", "20170223", 1)));
        assert!(!q.matches(&ping("main", "20170223", 1)));
        assert!(!q.matches(&ping("testpilottest", "20170222", 1)));
        assert!(!q.matches(&json!({"payload": {}})));
    }

    #[test]
    fn local_dataset_reads_json_and_jsonl() -> Result<()> {
        let dir = tempdir()?;
        let nested = dir.path().join("2017/02");
        fs::create_dir_all(&nested)?;

        let lines = [
            ping("testpilottest", "20170223", 1).to_string(),
            String::new(),
            ping("main", "20170223", 2).to_string(),
        ]
        .join("\n");
        fs::write(nested.join("a.jsonl"), lines)?;
        fs::write(
            dir.path().join("b.json"),
            json!([ping("testpilottest", "20170223", 3), ping("testpilottest", "20170101", 4)])
                .to_string(),
        )?;
        fs::write(dir.path().join("c.json"), ping("testpilottest", "20170223", 5).to_string())?;
        fs::write(dir.path().join("notes.txt"), "not a ping")?;

        let mut ids: Vec<u64> = LocalDataset::new(dir.path())
            .records(&query())?
            .iter()
            .filter_map(|p| p["payload"]["payload"]["id"].as_u64())
            .collect();
        ids.sort();
        assert_eq!(ids, vec![1, 3, 5]);
        Ok(())
    }

    #[test]
    fn malformed_line_is_fatal() -> Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join("bad.jsonl"), "{\"meta\": \n")?;
        let err = LocalDataset::new(dir.path()).records(&query()).unwrap_err();
        assert!(format!("{:#}", err).contains("bad.jsonl:1"));
        Ok(())
    }

    #[test]
    fn missing_root_is_fatal() {
        assert!(LocalDataset::new("/no/such/pings").records(&query()).is_err());
    }

    #[test]
    fn projected_keeps_only_requested_paths() -> Result<()> {
        let source = MemorySource(vec![ping("testpilottest", "20170223", 9)]);
        let path = FieldPath::parse("payload/payload/id")?;
        let out = source.projected(&query(), &[&path])?;
        assert_eq!(out, vec![json!({"payload": {"payload": {"id": 9}}})]);
        Ok(())
    }
}
