//! Graph construction, binding, laziness and error attribution.

use anyhow::{Result, bail};
use compgraph::operations::mappers::{LowerCase, Split};
use compgraph::operations::reducers::{Count, First};
use compgraph::testing::*;
use compgraph::*;

fn numbers(n: i64) -> Vec<Record> {
    (0..n).map(|i| record! { "n" => i }).collect()
}

#[test]
fn missing_binding_is_reported_before_any_pull() {
    let mut sources = Sources::new();
    let counter = bind_counting(&mut sources, "left", numbers(3));
    let g = Graph::from_source("left").join(
        operations::joiners::MergeJoiner::inner(),
        &Graph::from_source("right"),
        &["n"],
    );

    let err = g.run(&sources).err().unwrap();
    assert!(matches!(err, Error::Binding { ref name } if name == "right"));
    assert_eq!(counter.opened(), 0);
    assert_eq!(counter.pulled(), 0);
}

#[test]
fn nothing_is_pulled_until_the_stream_is() -> Result<()> {
    let mut sources = Sources::new();
    let counter = bind_counting(&mut sources, "nums", numbers(1000));
    let g = Graph::from_source("nums")
        .map(|r: Record| -> Result<Record> { Ok(r.with("seen", true)) });

    let mut out = g.run(&sources)?;
    assert_eq!((counter.opened(), counter.pulled()), (0, 0));

    let first = out.next().unwrap()?;
    assert_eq!(first, record! { "n" => 0, "seen" => true });
    assert_eq!(counter.pulled(), 1);
    Ok(())
}

#[test]
fn filter_pulls_only_until_a_match() -> Result<()> {
    let mut sources = Sources::new();
    let counter = bind_counting(&mut sources, "nums", numbers(1000));
    let g = Graph::from_source("nums")
        .filter(|r: &Record| -> Result<bool> { Ok(r.i64_field("n")? >= 9) });

    let first = g.run(&sources)?.next().unwrap()?;
    assert_eq!(first.i64_field("n")?, 9);
    assert_eq!(counter.pulled(), 10);
    Ok(())
}

#[test]
fn sort_is_a_barrier() -> Result<()> {
    let mut sources = Sources::new();
    let counter = bind_counting(&mut sources, "nums", numbers(50));
    let g = Graph::from_source("nums").sort(&["n"]);

    let first = g.run(&sources)?.next().unwrap()?;
    assert_eq!(first.i64_field("n")?, 0);
    assert_eq!(counter.pulled(), 50);
    Ok(())
}

#[test]
fn graphs_are_reusable_values() -> Result<()> {
    let words = Graph::from_source("docs")
        .map(LowerCase::new("text"))
        .flat_map(Split::new("text"));
    let counted = words.sort(&["text"]).reduce(Count::new("count"), &["text"]);
    let distinct = words.sort(&["text"]).reduce(First, &["text"]);

    let mut sources = Sources::new();
    sources.bind_vec("docs", vec![record! { "text" => "B a b" }]);

    let first_run = counted.run(&sources)?.collect_records()?;
    let second_run = counted.run(&sources)?.collect_records()?;
    assert_eq!(first_run, second_run);
    assert_records_equal(
        &first_run,
        &[
            record! { "text" => "a", "count" => 1 },
            record! { "text" => "b", "count" => 2 },
        ],
    );
    assert_eq!(distinct.run(&sources)?.count(), 2);
    Ok(())
}

#[test]
fn each_branch_reads_its_own_source_iterator() -> Result<()> {
    let mut sources = Sources::new();
    let counter = bind_counting(&mut sources, "nums", numbers(4));
    let sorted = Graph::from_source("nums").sort(&["n"]);
    let joined = sorted.join(operations::joiners::MergeJoiner::inner(), &sorted, &["n"]);

    let out = joined.run(&sources)?.collect_records()?;
    assert_eq!(out, numbers(4));
    assert_eq!(counter.opened(), 2);
    assert_eq!(counter.pulled(), 8);
    Ok(())
}

#[test]
fn operation_errors_name_the_failing_node() -> Result<()> {
    let g = Graph::from_source("nums")
        .map(|r: Record| -> Result<Record> { Ok(r) })
        .map(|r: Record| -> Result<Record> {
            if r.i64_field("n")? == 2 {
                bail!("two is not allowed");
            }
            Ok(r)
        });
    let failing = g.node_id();

    let mut sources = Sources::new();
    sources.bind_vec("nums", numbers(5));
    let err = g.run(&sources)?.collect_records().unwrap_err();

    let node = err.node().unwrap();
    assert_eq!(node.id, failing);
    assert_eq!(node.kind, "map");
    assert!(err.to_string().contains("two is not allowed"));
    Ok(())
}

#[test]
fn stream_stops_after_the_first_error() -> Result<()> {
    let g = Graph::from_source("nums").map(|r: Record| -> Result<Record> {
        if r.i64_field("n")? % 2 == 1 {
            bail!("odd");
        }
        Ok(r)
    });
    let mut sources = Sources::new();
    sources.bind_vec("nums", numbers(6));

    let items: Vec<_> = g.run(&sources)?.collect();
    assert_eq!(items.len(), 2);
    assert!(items[0].is_ok());
    assert!(matches!(items[1], Err(Error::Operation { .. })));
    Ok(())
}

#[test]
fn source_failures_are_wrapped_with_the_input_name() -> Result<()> {
    let mut sources = Sources::new();
    sources.bind_fallible("flaky", || -> Result<std::vec::IntoIter<Result<Record>>> {
        Ok(vec![Ok(record! { "n" => 1 }), Err(anyhow::anyhow!("disk on fire"))].into_iter())
    });
    let err = Graph::from_source("flaky")
        .run(&sources)?
        .collect_records()
        .unwrap_err();
    assert!(matches!(err, Error::Source { ref name, .. } if name == "flaky"));
    assert!(err.node().is_none());
    Ok(())
}

#[test]
fn sorting_by_a_missing_field_is_a_missing_key_error() -> Result<()> {
    let mut sources = Sources::new();
    sources.bind_vec("nums", vec![record! { "n" => 1 }, record! { "m" => 2 }]);
    let err = Graph::from_source("nums")
        .sort(&["n"])
        .run(&sources)?
        .collect_records()
        .unwrap_err();
    assert!(matches!(
        err,
        Error::MissingKey { ref field, ref node } if field == "n" && node.kind == "sort"
    ));
    Ok(())
}

#[test]
fn explain_lists_steps_parents_first() {
    let left = Graph::from_source("a").sort(&["k"]);
    let right = Graph::from_source("b").sort(&["k"]);
    let g = left
        .join(operations::joiners::MergeJoiner::left(), &right, &["k"])
        .reduce(Count::new("n"), &["k"]);

    let plan = g.explain();
    assert_eq!(plan.steps.len(), 6);
    assert_eq!(plan.barriers(), 2);
    assert_eq!(plan.required_sources(), ["a".to_string(), "b".to_string()]);

    let last = plan.steps.last().unwrap();
    assert_eq!(last.id, g.node_id());
    assert_eq!(last.label.detail, "Count by [k]");
    let join = &plan.steps[plan.steps.len() - 2];
    assert_eq!(join.label.detail, "LeftJoin on [k]");
    assert_eq!(join.parents, vec![left.node_id(), right.node_id()]);

    let text = plan.to_string();
    assert!(text.contains("GRAPH PLAN"));
    assert!(text.contains("[BARRIER]"));
}

#[test]
fn shared_nodes_appear_once_in_the_plan() {
    let sorted = Graph::from_source("nums").sort(&["n"]);
    let g = sorted.join(operations::joiners::MergeJoiner::inner(), &sorted, &["n"]);
    assert_eq!(g.explain().steps.len(), 3);
}

#[test]
fn runner_reports_emitted_records() -> Result<()> {
    let metrics = MetricsCollector::new();
    let runner = Runner::new().with_metrics(metrics.clone());
    let mut sources = Sources::new();
    sources.bind_vec("nums", numbers(7));

    let out = runner.run_collect(&Graph::from_source("nums"), &sources)?;
    assert_eq!(out.len(), 7);
    assert_eq!(metrics.counter("records.emitted"), Some(7));
    assert!(metrics.elapsed().is_some());
    Ok(())
}
