//! External sort: ordering, stability and spill-storage lifecycle.

use compgraph::external_sort::{ExternalSorter, MAX_FAN_IN};
use compgraph::testing::TempDirPath;
use compgraph::{Error, MetricsCollector, SortConfig, external_sort};
use proptest::prelude::*;

fn sort_with_limit(input: &[(i32, u32)], limit: usize) -> Vec<(i32, u32)> {
    let config = SortConfig::default().with_memory_limit(limit);
    external_sort(input.iter().copied().map(Ok), |p: &(i32, u32)| Ok(p.0), &config)
        .unwrap()
        .collect::<compgraph::Result<Vec<_>>>()
        .unwrap()
}

fn tagged(keys: &[i32]) -> Vec<(i32, u32)> {
    keys.iter()
        .enumerate()
        .map(|(i, k)| (*k, u32::try_from(i).unwrap()))
        .collect()
}

proptest! {
    #[test]
    fn output_is_a_stable_sorted_permutation(
        keys in prop::collection::vec(-20i32..20, 0..200),
        limit in 0usize..16,
    ) {
        let input = tagged(&keys);
        let mut expected = input.clone();
        expected.sort_by_key(|p| p.0);
        prop_assert_eq!(sort_with_limit(&input, limit), expected);
    }

    #[test]
    fn memory_limit_does_not_change_output(keys in prop::collection::vec(any::<i32>(), 0..150)) {
        let input = tagged(&keys);
        let in_memory = sort_with_limit(&input, usize::MAX);
        for limit in [1, 2, 7, 64] {
            prop_assert_eq!(&sort_with_limit(&input, limit), &in_memory);
        }
    }

    #[test]
    fn sorting_is_idempotent(keys in prop::collection::vec(-5i32..5, 0..100)) {
        let once = sort_with_limit(&tagged(&keys), 3);
        let twice = sort_with_limit(&once, 3);
        prop_assert_eq!(once, twice);
    }
}

#[test]
fn spill_dir_is_empty_after_completion() -> anyhow::Result<()> {
    let dir = TempDirPath::new()?;
    let config = SortConfig::default()
        .with_memory_limit(10)
        .with_spill_dir(dir.path());
    let stream = external_sort((0..1000u32).rev().map(Ok), |x: &u32| Ok(*x), &config)?;
    assert!(stream.spilled());
    assert_eq!(dir.entry_count()?, 1);

    let out: Vec<u32> = stream.collect::<compgraph::Result<_>>()?;
    assert_eq!(out, (0..1000).collect::<Vec<_>>());
    assert_eq!(dir.entry_count()?, 0);
    Ok(())
}

#[test]
fn spill_dir_is_empty_after_abandoning_the_stream() -> anyhow::Result<()> {
    let dir = TempDirPath::new()?;
    let config = SortConfig::default()
        .with_memory_limit(8)
        .with_spill_dir(dir.path());
    let mut stream = external_sort((0..500u32).rev().map(Ok), |x: &u32| Ok(*x), &config)?;
    let first: Vec<u32> = stream.by_ref().take(5).collect::<compgraph::Result<_>>()?;
    assert_eq!(first, vec![0, 1, 2, 3, 4]);
    drop(stream);
    assert_eq!(dir.entry_count()?, 0);
    Ok(())
}

#[test]
fn unusable_spill_dir_is_a_resource_error() -> anyhow::Result<()> {
    let dir = TempDirPath::new()?;
    let not_a_dir = dir.file_path("plain-file");
    std::fs::write(&not_a_dir, b"x")?;
    let config = SortConfig::default()
        .with_memory_limit(2)
        .with_spill_dir(&not_a_dir);
    let result = external_sort((0..10u32).map(Ok), |x: &u32| Ok(*x), &config);
    assert!(matches!(result, Err(Error::Resource { .. })));
    Ok(())
}

#[test]
fn upstream_errors_pass_through_unchanged() {
    let input = vec![
        Ok(1u32),
        Err(Error::Binding {
            name: "broken".to_string(),
        }),
    ];
    let result = external_sort(input, |x: &u32| Ok(*x), &SortConfig::default());
    assert!(matches!(result, Err(Error::Binding { name }) if name == "broken"));
}

#[test]
fn metrics_report_spills_and_peak_buffer() -> anyhow::Result<()> {
    let metrics = MetricsCollector::new();
    let config = SortConfig::default().with_memory_limit(25);
    let stream = ExternalSorter::new(config)
        .with_metrics(metrics.clone())
        .sort((0..100u32).map(Ok), |x: &u32| Ok(*x))?;
    assert_eq!(stream.count(), 100);
    assert_eq!(metrics.counter("sort.chunks_spilled"), Some(3));
    assert_eq!(metrics.counter("sort.records_spilled"), Some(75));
    assert_eq!(metrics.gauge("sort.peak_buffered"), Some(25));
    Ok(())
}

#[test]
fn thousands_of_runs_merge_with_bounded_fan_in() -> anyhow::Result<()> {
    let dir = TempDirPath::new()?;
    let metrics = MetricsCollector::new();
    let config = SortConfig::default()
        .with_memory_limit(1)
        .with_spill_dir(dir.path());
    let stream = ExternalSorter::new(config)
        .with_metrics(metrics.clone())
        .sort((0..5_000u32).rev().map(Ok), |x: &u32| Ok(*x))?;

    let out: Vec<u32> = stream.collect::<compgraph::Result<_>>()?;
    assert_eq!(out, (0..5_000).collect::<Vec<_>>());
    assert_eq!(metrics.counter("sort.chunks_spilled"), Some(4_999));
    assert_eq!(metrics.counter("sort.merge_passes"), Some(2));
    let open = metrics.gauge("sort.peak_open_runs").unwrap_or(u64::MAX);
    assert!(open <= MAX_FAN_IN as u64, "{open} runs open at once");
    assert_eq!(dir.entry_count()?, 0);
    Ok(())
}
