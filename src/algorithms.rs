//! Example analytics assembled from the operation library.
//!
//! Each function only builds a [`Graph`]; bind its inputs with
//! [`Sources`](crate::Sources) and run it like any other graph.
//!
//! | Graph                    | Inputs              | Output records                          |
//! |--------------------------|---------------------|-----------------------------------------|
//! | [`word_count_graph`]     | `{text}`            | `{text, count}` by count, text          |
//! | [`inverted_index_graph`] | `{doc_id, text}`    | top 3 `{doc_id, text, tf_idf}` per word |
//! | [`pmi_graph`]            | `{doc_id, text}`    | top 10 `{doc_id, text, pmi}` per doc    |
//! | [`road_speed_graph`]     | times, edge lengths | `{weekday, hour, speed}`                |

use crate::graph::Graph;
use crate::operations::joiners::MergeJoiner;
use crate::operations::mappers::{
    FilterPunctuation, HaversineDistance, LowerCase, Pmi, Project, Speed, Split, TfIdf, TravelTime,
};
use crate::operations::reducers::{Count, CountRows, First, Mean, TermFrequency, TopN};
use crate::record::Record;

const NO_KEYS: [&str; 0] = [];

/// Punctuation-free, lowercased words, one record per word occurrence.
fn words(input: &str, text_column: &str) -> Graph {
    Graph::from_source(input)
        .map(FilterPunctuation::new(text_column))
        .map(LowerCase::new(text_column))
        .flat_map(Split::new(text_column))
}

/// Counts word occurrences across all records, ordered by count then word.
#[must_use]
pub fn word_count_graph(input: &str, text_column: &str, count_column: &str) -> Graph {
    words(input, text_column)
        .sort(&[text_column])
        .reduce(Count::new(count_column), &[text_column])
        .sort(&[count_column, text_column])
}

/// For every word, the three documents where it has the highest TF-IDF.
///
/// Expects one input record per document.
#[must_use]
pub fn inverted_index_graph(
    input: &str,
    doc_column: &str,
    text_column: &str,
    result_column: &str,
) -> Graph {
    const DOC_COUNT: &str = "doc_count";
    const DOCS_WITH_WORD: &str = "docs_with_word";
    const TF: &str = "tf";

    let words = words(input, text_column);

    let doc_count = Graph::from_source(input).reduce(CountRows::new(DOC_COUNT), &NO_KEYS);

    let docs_with_word = words
        .sort(&[text_column, doc_column])
        .reduce(First, &[text_column, doc_column])
        .reduce(Count::new(DOCS_WITH_WORD), &[text_column]);

    words
        .sort(&[doc_column, text_column])
        .reduce(
            TermFrequency::new(text_column).with_result_column(TF),
            &[doc_column],
        )
        .sort(&[text_column])
        .join(MergeJoiner::inner(), &docs_with_word, &[text_column])
        .join(MergeJoiner::inner(), &doc_count, &NO_KEYS)
        .map(TfIdf::new(TF, DOC_COUNT, DOCS_WITH_WORD, result_column))
        .map(Project::new(&[doc_column, text_column, result_column]))
        .reduce(TopN::new(result_column, 3), &[text_column])
}

/// For every document, the ten words with the highest pointwise mutual
/// information. Only words longer than four characters that occur at least
/// twice in a document are considered.
#[must_use]
pub fn pmi_graph(input: &str, doc_column: &str, text_column: &str, result_column: &str) -> Graph {
    const COUNT_IN_DOC: &str = "count_in_doc";
    const FREQ_IN_DOC: &str = "freq_in_doc";
    const FREQ_IN_CORPUS: &str = "freq_in_corpus";

    let words = words(input, text_column).sort(&[text_column, doc_column]);
    let counts = words.reduce(Count::new(COUNT_IN_DOC), &[text_column, doc_column]);

    let text = text_column.to_string();
    let frequent = words
        .join(MergeJoiner::inner(), &counts, &[text_column, doc_column])
        .filter(move |r: &Record| -> anyhow::Result<bool> {
            Ok(r.str_field(&text)?.chars().count() > 4 && r.i64_field(COUNT_IN_DOC)? >= 2)
        });

    let corpus_freq = frequent.reduce(
        TermFrequency::new(text_column).with_result_column(FREQ_IN_CORPUS),
        &NO_KEYS,
    );

    frequent
        .sort(&[doc_column, text_column])
        .reduce(
            TermFrequency::new(text_column).with_result_column(FREQ_IN_DOC),
            &[doc_column],
        )
        .sort(&[text_column])
        .join(MergeJoiner::inner(), &corpus_freq, &[text_column])
        .map(Pmi::new(FREQ_IN_DOC, FREQ_IN_CORPUS, result_column))
        .map(Project::new(&[doc_column, text_column, result_column]))
        .sort(&[doc_column])
        .reduce(TopN::new(result_column, 10), &[doc_column])
}

/// Column names used by [`road_speed_graph`].
#[derive(Clone, Debug)]
pub struct RoadSpeedColumns {
    pub edge_id: String,
    pub enter_time: String,
    pub leave_time: String,
    pub start: String,
    pub end: String,
    pub weekday: String,
    pub hour: String,
    pub speed: String,
}

impl Default for RoadSpeedColumns {
    fn default() -> Self {
        Self {
            edge_id: "edge_id".to_string(),
            enter_time: "enter_time".to_string(),
            leave_time: "leave_time".to_string(),
            start: "start".to_string(),
            end: "end".to_string(),
            weekday: "weekday".to_string(),
            hour: "hour".to_string(),
            speed: "speed".to_string(),
        }
    }
}

/// Mean travel speed in km/h per weekday and hour of day.
///
/// `times_input` holds one record per traversal of an edge (`edge_id`, enter
/// and leave timestamps); `lengths_input` holds one record per edge with its
/// `[lon, lat]` endpoints.
#[must_use]
pub fn road_speed_graph(
    times_input: &str,
    lengths_input: &str,
    columns: &RoadSpeedColumns,
) -> Graph {
    const DISTANCE: &str = "distance";
    const SECONDS: &str = "seconds";
    let c = columns;

    let lengths = Graph::from_source(lengths_input)
        .sort(&[&c.edge_id])
        .map(HaversineDistance::new(&c.start, &c.end, DISTANCE));

    Graph::from_source(times_input)
        .sort(&[&c.edge_id])
        .map(TravelTime::new(&c.enter_time, &c.leave_time, &c.weekday, &c.hour, SECONDS))
        .join(MergeJoiner::inner(), &lengths, &[&c.edge_id])
        .map(Speed::new(DISTANCE, SECONDS, &c.speed))
        .sort(&[&c.weekday, &c.hour])
        .reduce(Mean::new(&c.speed), &[&c.weekday, &c.hour])
}
