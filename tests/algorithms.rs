//! The bundled analytics graphs on small hand-checked datasets.

use anyhow::Result;
use compgraph::algorithms::*;
use compgraph::testing::*;
use compgraph::*;

fn run_single(graph: &Graph, input: Vec<Record>) -> Result<Vec<Record>> {
    let mut sources = Sources::new();
    sources.bind_vec("docs", input);
    Ok(graph.run(&sources)?.collect_records()?)
}

fn scored(records: &[Record], score: &str) -> Vec<(i64, String, f64)> {
    records
        .iter()
        .map(|r| {
            (
                r.i64_field("doc_id").unwrap(),
                r.str_field("text").unwrap().to_string(),
                r.f64_field(score).unwrap(),
            )
        })
        .collect()
}

fn assert_scores(actual: &[(i64, String, f64)], expected: &[(i64, &str, f64)]) {
    assert_eq!(actual.len(), expected.len(), "got {actual:?}");
    for ((doc, word, score), (e_doc, e_word, e_score)) in actual.iter().zip(expected) {
        assert_eq!((doc, word.as_str()), (e_doc, *e_word), "got {actual:?}");
        assert_approx_eq!(*score, *e_score);
    }
}

#[test]
fn word_count_orders_by_count_then_word() -> Result<()> {
    let out = run_single(&word_count_graph("docs", "text", "count"), word_count_docs())?;
    assert_records_equal(
        &out,
        &[
            record! { "text" => "hello", "count" => 1 },
            record! { "text" => "of", "count" => 1 },
            record! { "text" => "programming", "count" => 1 },
            record! { "text" => "world", "count" => 2 },
        ],
    );
    Ok(())
}

#[test]
fn word_count_survives_a_tiny_sort_budget() -> Result<()> {
    let docs: Vec<Record> = (0..200)
        .map(|i| record! { "text" => format!("alpha beta{} gamma", i % 7) })
        .collect();
    let graph = word_count_graph("docs", "text", "count");
    let mut sources = Sources::new();
    sources.bind_vec("docs", docs);

    let unbounded = graph.run(&sources)?.collect_records()?;
    let spilled = Runner::new()
        .with_sort_config(SortConfig::default().with_memory_limit(3))
        .run_collect(&graph, &sources)?;
    assert_eq!(spilled, unbounded);
    assert_eq!(unbounded.last(), Some(&record! { "text" => "gamma", "count" => 200 }));
    Ok(())
}

#[test]
fn inverted_index_matches_hand_computed_tf_idf() -> Result<()> {
    let graph = inverted_index_graph("docs", "doc_id", "text", "tf_idf");
    let out = run_single(&graph, tf_idf_corpus())?;
    assert_all_have_fields(&out, &["doc_id", "text", "tf_idf"]);

    let half_ln = 0.5 * 1.5_f64.ln();
    assert_scores(
        &scored(&out, "tf_idf"),
        &[
            (1, "hello", half_ln),
            (2, "hello", half_ln),
            (3, "rust", 1.5_f64.ln()),
            (2, "rust", half_ln),
            (1, "world", 0.5 * 3.0_f64.ln()),
        ],
    );
    Ok(())
}

#[test]
fn inverted_index_keeps_three_documents_per_word() -> Result<()> {
    let docs: Vec<Record> = (1..=6usize)
        .map(|i| record! { "doc_id" => i, "text" => format!("common {}", "rare ".repeat(i)) })
        .collect();
    let out = run_single(&inverted_index_graph("docs", "doc_id", "text", "tf_idf"), docs)?;
    for word in ["common", "rare"] {
        let hits: Vec<&Record> = out
            .iter()
            .filter(|r| r.str_field("text").unwrap() == word)
            .collect();
        assert_eq!(hits.len(), 3, "{word}: {out:?}");
        assert!(hits.iter().all(|r| r.f64_field("tf_idf").unwrap() == 0.0));
    }
    Ok(())
}

#[test]
fn pmi_matches_hand_computed_values() -> Result<()> {
    let out = run_single(&pmi_graph("docs", "doc_id", "text", "pmi"), pmi_corpus())?;
    assert_scores(
        &scored(&out, "pmi"),
        &[
            (1, "banana", 1.75_f64.ln()),
            (1, "apple", 0.7_f64.ln()),
            (2, "apple", 1.4_f64.ln()),
        ],
    );
    Ok(())
}

#[test]
fn road_speed_averages_per_weekday_and_hour() -> Result<()> {
    let graph = road_speed_graph("times", "lengths", &RoadSpeedColumns::default());
    let mut sources = Sources::new();
    sources
        .bind_vec("times", road_travel_times())
        .bind_vec("lengths", road_lengths());
    let out = graph.run(&sources)?.collect_records()?;

    assert_eq!(out.len(), 1);
    assert_eq!(out[0].str_field("weekday")?, "Fri");
    assert_eq!(out[0].i64_field("hour")?, 11);
    assert_approx_eq!(out[0].f64_field("speed")?, 76.049_931_673, 1e-6);
    Ok(())
}

#[test]
fn road_speed_rejects_zero_length_intervals() {
    let times = vec![record! {
        "edge_id" => 1,
        "enter_time" => "20171020T112238.723000",
        "leave_time" => "20171020T112238.723000",
    }];
    let graph = road_speed_graph("times", "lengths", &RoadSpeedColumns::default());
    let mut sources = Sources::new();
    sources.bind_vec("times", times).bind_vec("lengths", road_lengths());
    let err = graph.run(&sources).unwrap().collect_records().unwrap_err();
    assert!(matches!(err, Error::Operation { .. }));
    assert!(err.to_string().contains("speed is undefined"));
}
