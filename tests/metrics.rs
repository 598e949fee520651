//! Run metrics and memory bounds on larger synthetic streams.

use anyhow::Result;
use compgraph::metrics::GaugeMetric;
use compgraph::operations::joiners::MergeJoiner;
use compgraph::operations::reducers::Count;
use compgraph::testing::*;
use compgraph::*;

fn runner_with(limit: usize, spill: &TempDirPath, metrics: &MetricsCollector) -> Runner {
    Runner::new()
        .with_sort_config(
            SortConfig::default()
                .with_memory_limit(limit)
                .with_spill_dir(spill.path()),
        )
        .with_metrics(metrics.clone())
}

#[test]
fn sort_buffer_never_exceeds_the_memory_limit() -> Result<()> {
    let spill = TempDirPath::new()?;
    let metrics = MetricsCollector::new();
    let runner = runner_with(100, &spill, &metrics);

    let mut sources = Sources::new();
    sources.bind_vec("input", grouped_records(20_000, 50));
    let graph = Graph::from_source("input").sort(&["group", "seq"]);
    let out = runner.run_collect(&graph, &sources)?;

    assert_eq!(out.len(), 20_000);
    assert_sorted_by(&out, &["group", "seq"]);
    assert_eq!(metrics.gauge("sort.peak_buffered"), Some(100));
    assert_eq!(metrics.counter("sort.records_spilled"), Some(19_900));
    assert_eq!(metrics.counter("records.emitted"), Some(20_000));
    assert_eq!(spill.entry_count()?, 0);
    Ok(())
}

#[test]
fn spill_storage_is_released_when_a_run_is_abandoned() -> Result<()> {
    let spill = TempDirPath::new()?;
    let metrics = MetricsCollector::new();
    let runner = runner_with(16, &spill, &metrics);

    let mut sources = Sources::new();
    sources.bind_vec("input", grouped_records(2_000, 9));
    let graph = Graph::from_source("input").sort(&["group"]);

    let mut stream = runner.run(&graph, &sources)?;
    let head: Vec<Record> = stream.by_ref().take(5).collect::<compgraph::Result<_>>()?;
    assert_eq!(head.len(), 5);
    assert_eq!(spill.entry_count()?, 1);
    drop(stream);
    assert_eq!(spill.entry_count()?, 0);
    Ok(())
}

#[test]
fn spill_storage_is_released_after_a_failed_run() -> Result<()> {
    let spill = TempDirPath::new()?;
    let metrics = MetricsCollector::new();
    let runner = runner_with(4, &spill, &metrics);

    let mut input = grouped_records(100, 3);
    input.push(record! { "seq" => 100 });
    let mut sources = Sources::new();
    sources.bind_vec("input", input);

    let err = runner
        .run(&Graph::from_source("input").sort(&["group"]), &sources)?
        .collect_records()
        .unwrap_err();
    assert!(matches!(err, Error::MissingKey { .. }));
    assert_eq!(spill.entry_count()?, 0);
    Ok(())
}

#[test]
fn join_buffers_at_most_the_largest_right_group() -> Result<()> {
    let metrics = MetricsCollector::new();
    let runner = Runner::new().with_metrics(metrics.clone());

    let right = grouped_records(3_000, 10);
    let largest = (0..10)
        .map(|g| right.iter().filter(|r| r.i64_field("group").unwrap() == g).count())
        .max()
        .unwrap_or(0);

    let mut sources = Sources::new();
    sources
        .bind_vec("left", (0..10).map(|g| record! { "group" => g }).collect())
        .bind_vec("right", right);
    let graph = Graph::from_source("left").sort(&["group"]).join(
        MergeJoiner::inner(),
        &Graph::from_source("right").sort(&["group"]),
        &["group"],
    );
    let out = runner.run_collect(&graph, &sources)?;

    assert_eq!(out.len(), 3_000);
    let peak = metrics.gauge("join.peak_group").unwrap_or(0);
    assert_eq!(usize::try_from(peak)?, largest);
    Ok(())
}

#[test]
fn metrics_snapshot_serializes_to_json() -> Result<()> {
    let spill = TempDirPath::new()?;
    let metrics = MetricsCollector::new();
    metrics.register(Box::new(
        GaugeMetric::new("input.label", "words").with_description("dataset"),
    ));
    let runner = runner_with(1_000, &spill, &metrics);

    let mut sources = Sources::new();
    sources.bind_vec("input", grouped_records(50, 5));
    let graph = Graph::from_source("input")
        .sort(&["group"])
        .reduce(Count::new("n"), &["group"]);
    runner.run_collect(&graph, &sources)?;

    let json = metrics.to_json();
    assert_eq!(json["reduce.groups"], 5);
    assert_eq!(json["records.emitted"], 5);
    assert_eq!(json["input.label"], "words");
    assert_eq!(json["input.label.description"], "dataset");
    assert!(json["execution_time_ms"].is_number());

    let out = spill.file_path("metrics.json");
    metrics.save_to_file(&out)?;
    let saved: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&out)?)?;
    assert_eq!(saved["reduce.groups"], 5);
    Ok(())
}
