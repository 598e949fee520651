//! Grouped reduction over sorted streams.

use anyhow::Result;
use compgraph::grouping::Group;
use compgraph::operations::reducers::{Count, Sum, TopN};
use compgraph::testing::*;
use compgraph::*;
use proptest::prelude::*;
use std::collections::BTreeSet;

/// Emits every record of its group, tagged with the group's size.
struct TagWithSize;

impl Reducer for TagWithSize {
    fn reduce(&self, _keys: &[String], rows: &mut Group<'_>) -> Result<Vec<Record>> {
        let rows: Vec<Record> = rows.collect();
        let size = rows.len();
        Ok(rows.into_iter().map(|r| r.with("size", size)).collect())
    }
}

fn run(graph: &Graph, input: Vec<Record>) -> compgraph::Result<Vec<Record>> {
    let mut sources = Sources::new();
    sources.bind_vec("input", input);
    graph.run(&sources)?.collect_records()
}

proptest! {
    #[test]
    fn one_output_per_distinct_key(groups in prop::collection::vec(0i64..12, 0..120)) {
        let input: Vec<Record> = groups.iter().map(|g| record! { "g" => *g }).collect();
        let graph = Graph::from_source("input").sort(&["g"]).reduce(Count::new("n"), &["g"]);
        let out = run(&graph, input).unwrap();

        let distinct: BTreeSet<i64> = groups.iter().copied().collect();
        prop_assert_eq!(out.len(), distinct.len());
        let total: i64 = out.iter().map(|r| r.i64_field("n").unwrap()).sum();
        prop_assert_eq!(total, i64::try_from(groups.len()).unwrap());
    }

    #[test]
    fn groups_are_key_homogeneous(groups in prop::collection::vec(0i64..5, 1..80)) {
        let input: Vec<Record> = groups.iter().map(|g| record! { "g" => *g }).collect();
        let graph = Graph::from_source("input").sort(&["g"]).reduce(TagWithSize, &["g"]);
        let out = run(&graph, input).unwrap();

        assert_sorted_by(&out, &["g"]);
        for record in &out {
            let g = record.i64_field("g").unwrap();
            let expected = groups.iter().filter(|x| **x == g).count();
            prop_assert_eq!(record.i64_field("size").unwrap(), i64::try_from(expected).unwrap());
        }
    }
}

#[test]
fn unsorted_input_is_an_ordering_violation() {
    let input = vec![
        record! { "g" => "b" },
        record! { "g" => "a" },
    ];
    let graph = Graph::from_source("input").reduce(Count::new("n"), &["g"]);
    let err = run(&graph, input).unwrap_err();
    match err {
        Error::OrderingViolation { node, keys, .. } => {
            assert_eq!(node.id, graph.node_id());
            assert_eq!(keys, vec!["g".to_string()]);
        }
        other => panic!("expected an ordering violation, got {other}"),
    }
}

#[test]
fn violation_surfaces_after_earlier_groups() -> Result<()> {
    let input = vec![
        record! { "g" => 1 },
        record! { "g" => 3 },
        record! { "g" => 2 },
    ];
    let mut sources = Sources::new();
    sources.bind_vec("input", input);
    let graph = Graph::from_source("input").reduce(Count::new("n"), &["g"]);
    let mut out = graph.run(&sources)?;

    assert_eq!(out.next().unwrap()?, record! { "g" => 1, "n" => 1 });
    assert!(matches!(out.next(), Some(Err(Error::OrderingViolation { .. }))));
    assert!(out.next().is_none());
    Ok(())
}

#[test]
fn composite_keys_group_on_all_fields() -> Result<()> {
    let input = vec![
        record! { "a" => 1, "b" => "x", "v" => 1 },
        record! { "a" => 1, "b" => "x", "v" => 2 },
        record! { "a" => 1, "b" => "y", "v" => 3 },
        record! { "a" => 2, "b" => "x", "v" => 4 },
    ];
    let graph = Graph::from_source("input").reduce(Sum::new("v"), &["a", "b"]);
    let out = run(&graph, input)?;
    assert_records_equal(
        &out,
        &[
            record! { "a" => 1, "b" => "x", "v" => 3 },
            record! { "a" => 1, "b" => "y", "v" => 3 },
            record! { "a" => 2, "b" => "x", "v" => 4 },
        ],
    );
    Ok(())
}

#[test]
fn empty_key_list_reduces_the_whole_stream() -> Result<()> {
    let input: Vec<Record> = (1..=5).map(|i| record! { "v" => i }).collect();
    let graph = Graph::from_source("input").reduce(TopN::new("v", 2), &[] as &[&str]);
    let out = run(&graph, input)?;
    assert_records_equal(&out, &[record! { "v" => 5 }, record! { "v" => 4 }]);
    Ok(())
}

#[test]
fn empty_input_produces_no_groups() -> Result<()> {
    let graph = Graph::from_source("input").sort(&["g"]).reduce(Count::new("n"), &["g"]);
    assert!(run(&graph, Vec::new())?.is_empty());
    Ok(())
}

#[test]
fn reducer_errors_are_tagged_with_the_reduce_node() {
    let input = vec![record! { "g" => 1, "v" => "not a number" }];
    let graph = Graph::from_source("input").reduce(Sum::new("v"), &["g"]);
    let err = run(&graph, input).unwrap_err();
    assert!(matches!(err, Error::Operation { ref node, .. } if node.kind == "reduce"));
}

#[test]
fn large_grouped_stream_with_spilling_sort() -> Result<()> {
    let metrics = MetricsCollector::new();
    let runner = Runner::new()
        .with_sort_config(SortConfig::default().with_memory_limit(64))
        .with_metrics(metrics.clone());
    let mut sources = Sources::new();
    sources.bind_vec("input", grouped_records(5_000, 13));

    let graph = Graph::from_source("input")
        .sort(&["group"])
        .reduce(Count::new("n"), &["group"]);
    let out = runner.run_collect(&graph, &sources)?;

    assert_eq!(out.len(), 13);
    assert_sorted_by(&out, &["group"]);
    assert_eq!(out.iter().map(|r| r.i64_field("n").unwrap()).sum::<i64>(), 5_000);
    assert!(metrics.counter("sort.chunks_spilled").unwrap_or(0) > 0);
    assert!(metrics.gauge("sort.peak_buffered").unwrap_or(0) <= 64);
    assert_eq!(metrics.counter("reduce.groups"), Some(13));
    Ok(())
}

#[test]
fn sorted_keys_beyond_float_precision_reduce_cleanly() -> Result<()> {
    let big = 1_i64 << 53;
    let input = vec![
        record! { "k" => big + 1 },
        record! { "k" => big as f64 },
        record! { "k" => big },
    ];
    let graph = Graph::from_source("input").sort(&["k"]).reduce(Count::new("n"), &["k"]);
    let out = run(&graph, input)?;
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].i64_field("n")?, 2);
    assert_eq!(out[1], record! { "k" => big + 1, "n" => 1 });
    Ok(())
}
