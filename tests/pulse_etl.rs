use anyhow::Result;
use arrow::array::{Array, AsArray};
use pulse_etl::{
    job::{self, JobConfig},
    sink::read_artifact,
    source::LocalDataset,
    Value,
};
use serde_json::Value as Json;
use std::{collections::BTreeMap, fs};
use tempfile::tempdir;

fn example_ping() -> Result<Json> {
    let text = fs::read_to_string(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/example_ping.json"))?;
    Ok(serde_json::from_str(&text)?)
}

fn request(num: i64, cached: f64, cdn: Option<f64>, time: i64) -> Value {
    Value::Struct(vec![
        ("num".into(), Some(Value::Int64(num))),
        ("cached".into(), Some(Value::Float64(cached))),
        ("cdn".into(), cdn.map(Value::Float64)),
        ("time".into(), Some(Value::Int64(time))),
    ])
}

#[test]
fn example_ping_transforms_like_the_pulse_table() -> Result<()> {
    let table = job::transform_pings(vec![example_ping()?])?;
    assert_eq!(table.num_rows(), 1);

    let s = |v: &str| Some(Value::from(v));
    let expected: Vec<(&str, Option<Value>)> = vec![
        ("method", None),
        ("id", s("19e0cf07-8145-4666-938d-811397db85dc")),
        ("type", None),
        ("object", None),
        ("category", None),
        ("variant", None),
        ("details", s("test")),
        ("sentiment", Some(Value::Int32(5))),
        ("reason", s("like")),
        ("adBlocker", Some(Value::Boolean(true))),
        (
            "addons",
            Some(Value::List(vec![
                s("pulse@mozilla.com"),
                s("inspector@mozilla.org"),
                s("DevPrefs@jetpack"),
                s("@min-vid"),
            ])),
        ),
        ("channel", s("developer")),
        ("hostname", s("github.com")),
        ("language", s("en-US")),
        ("openTabs", Some(Value::Int32(7))),
        ("openWindows", Some(Value::Int32(2))),
        ("platform", s("darwin")),
        ("protocol", s("https:")),
        ("telemetryId", s("549a6456-32c2-e048-8310-d22ccfa9fee1")),
        ("timerContentLoaded", Some(Value::Int64(589))),
        ("timerFirstInteraction", None),
        ("timerFirstPaint", Some(Value::Int64(41))),
        ("timerWindowLoad", Some(Value::Int64(1005))),
        ("inner_timestamp", Some(Value::Int64(1487862372503))),
        ("fx_version", None),
        ("creation_date", None),
        ("test", s("pulse@mozilla.com")),
        ("variants", None),
        ("timestamp", Some(Value::Int64(76543))),
        ("version", s("1.0.2")),
    ];
    for (column, value) in &expected {
        assert_eq!(table.value(0, column), value.as_ref(), "column {}", column);
    }

    let mut requests = BTreeMap::new();
    requests.insert(
        "https://github.com/".to_string(),
        Some(request(1, 0.0, Some(0.5), 312)),
    );
    requests.insert(
        "https://assets-cdn.github.com/".to_string(),
        Some(request(4, 1.0, None, 88)),
    );
    assert_eq!(table.value(0, "requests"), Some(&Value::Map(requests)));
    Ok(())
}

#[test]
fn local_run_writes_one_partition() -> Result<()> {
    let input = tempdir()?;
    let output = tempdir()?;

    let ping = example_ping()?;
    let mut foreign = ping.clone();
    foreign["payload"]["test"] = Json::from("@testpilot-addon");
    let lines = [ping.to_string(), foreign.to_string()].join("\n");
    fs::write(input.path().join("pings.jsonl"), lines)?;

    let config = JobConfig {
        submission_date: Some(job::parse_submission_date("20170223")?),
        save: true,
        output_dir: output.path().to_path_buf(),
        columns: None,
    };
    let source = LocalDataset::new(input.path());
    let first = job::etl_job(&source, &config)?;
    assert_eq!(first.num_rows(), 1);
    job::etl_job(&source, &config)?;

    let part = output.path().join("submission_date=20170223");
    assert_eq!(fs::read_dir(&part)?.count(), 1);

    let batches = read_artifact(part.join("part-00000.snappy.parquet"))?;
    assert_eq!(batches.len(), 1);
    let batch = &batches[0];
    assert_eq!(batch.num_rows(), 1);
    assert_eq!(batch.num_columns(), 31);

    let requests = batch
        .column_by_name("requests")
        .ok_or_else(|| anyhow::anyhow!("requests column missing"))?
        .as_map();
    assert_eq!(requests.value_length(0), 2);
    assert_eq!(batch.column_by_name("creation_date").map(|c| c.null_count()), Some(1));
    Ok(())
}
