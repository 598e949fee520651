//! Pre-built datasets with hand-checked results.
//!
//! Each corpus pairs with one of the graphs in [`crate::algorithms`]; the
//! expected outputs are documented next to the data.

use crate::record::Record;
use crate::value::Value;

fn docs(texts: &[(i64, &str)]) -> Vec<Record> {
    texts
        .iter()
        .map(|&(doc_id, text)| Record::new().with("doc_id", doc_id).with("text", text))
        .collect()
}

/// Sentences for word counting.
///
/// Counting words gives `hello: 1, of: 1, programming: 1, world: 2`.
///
/// ```
/// use compgraph::testing::word_count_docs;
///
/// assert_eq!(word_count_docs().len(), 2);
/// ```
#[must_use]
pub fn word_count_docs() -> Vec<Record> {
    docs(&[(1, "Hello, world!"), (2, "World of programming.")])
}

/// Three small documents for TF-IDF.
///
/// With `ln(3 / docs_with_word)` as IDF:
///
/// | word  | top documents                                 |
/// |-------|-----------------------------------------------|
/// | hello | doc 1 `0.5·ln 1.5`, doc 2 `0.5·ln 1.5`        |
/// | rust  | doc 3 `ln 1.5`, doc 2 `0.5·ln 1.5`            |
/// | world | doc 1 `0.5·ln 3`                              |
#[must_use]
pub fn tf_idf_corpus() -> Vec<Record> {
    docs(&[(1, "hello world"), (2, "hello rust"), (3, "rust rust rust")])
}

/// Two documents for PMI.
///
/// Words of at most four characters never qualify, nor do words seen once in
/// a document, so `cherry` in doc 1 and `banana` in doc 2 drop out. Expected:
/// doc 1 `banana ln 1.75`, `apple ln 0.7`; doc 2 `apple ln 1.4`.
#[must_use]
pub fn pmi_corpus() -> Vec<Record> {
    docs(&[
        (1, "apple apple banana banana cherry"),
        (2, "apple apple apple banana"),
    ])
}

/// Travel-time records for the road speed graph, with `edge_id`,
/// `enter_time` and `leave_time`.
///
/// Both traversals fall on Friday 2017-10-20 at 11h; they take 1.296 s and
/// 2.592 s over [`road_lengths`] edges 1 and 2.
#[must_use]
pub fn road_travel_times() -> Vec<Record> {
    vec![
        Record::new()
            .with("edge_id", 1)
            .with("enter_time", "20171020T112238.723000")
            .with("leave_time", "20171020T112240.019000"),
        Record::new()
            .with("edge_id", 2)
            .with("enter_time", "20171020T112238.723000")
            .with("leave_time", "20171020T112241.315000"),
    ]
}

/// Edge geometry for [`road_travel_times`]: `edge_id`, `start` and `end` as
/// `[lon, lat]` points.
#[must_use]
pub fn road_lengths() -> Vec<Record> {
    let point = |lon: f64, lat: f64| Value::List(vec![Value::Float(lon), Value::Float(lat)]);
    vec![
        Record::new()
            .with("edge_id", 1)
            .with("start", point(37.84870228730142, 55.73853974696249))
            .with("end", point(37.8490418381989, 55.73832445777953)),
        Record::new()
            .with("edge_id", 2)
            .with("start", point(37.524768467992544, 55.88785375468433))
            .with("end", point(37.52415172755718, 55.88807155843824)),
    ]
}

/// `count` records `{group, seq}` where `group` cycles through
/// `num_groups` values and `seq` is the record's position.
///
/// Handy for sorting and grouping tests that need many records and known
/// group sizes; values come from a fixed-seed LCG, so runs are reproducible.
///
/// ```
/// use compgraph::testing::grouped_records;
///
/// let data = grouped_records(100, 7);
/// assert_eq!(data.len(), 100);
/// assert!(data.iter().all(|r| r.i64_field("group").unwrap() < 7));
/// ```
#[must_use]
pub fn grouped_records(count: usize, num_groups: u32) -> Vec<Record> {
    let range = num_groups.max(1);
    let mut seed: u32 = 12345;
    (0..count)
        .map(|seq| {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            let group = (seed / 65536) % range;
            Record::new().with("group", group).with("seq", seq)
        })
        .collect()
}
