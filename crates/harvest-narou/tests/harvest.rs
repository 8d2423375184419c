//! End-to-end harvest runs against a scripted in-memory catalog.
//!
//! The live test is marked #[ignore]; run it with:
//! cargo test -p harvest-narou --test harvest -- --ignored

use std::collections::HashSet;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use flate2::Compression;
use flate2::write::GzEncoder;
use harvest_core::StreamError;
use harvest_narou::{
    Config, FetchFailurePolicy, Harvester, PageQuery, PageSource, Record, Termination,
};
use serde_json::{Value, json};
use tempfile::TempDir;

/// Serves call `n` with whatever `respond(n, query)` returns
struct ScriptedSource<F> {
    respond: F,
    queries: Vec<PageQuery>,
}

impl<F> ScriptedSource<F>
where
    F: FnMut(usize, &PageQuery) -> Result<Vec<u8>, StreamError>,
{
    fn new(respond: F) -> Self {
        Self {
            respond,
            queries: Vec::new(),
        }
    }
}

impl<F> PageSource for ScriptedSource<F>
where
    F: FnMut(usize, &PageQuery) -> Result<Vec<u8>, StreamError>,
{
    fn fetch(&mut self, query: &PageQuery) -> Result<Vec<u8>, StreamError> {
        let n = self.queries.len();
        self.queries.push(query.clone());
        (self.respond)(n, query)
    }
}

fn api_time(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn record(id: &str, lastup: DateTime<Utc>) -> Value {
    json!({
        "ncode": id,
        "userid": 7,
        "genre": 201,
        "general_firstup": api_time(lastup - TimeDelta::days(30)),
        "general_lastup": api_time(lastup),
        "noveltype": 1,
        "end": 0,
        "general_all_no": 12,
        "length": 48000,
        "istensei": 0,
        "istenni": 1,
        "global_point": 100,
        "fav_novel_cnt": 20,
        "impression_cnt": 3,
        "review_cnt": 0,
        "all_point": 60,
        "all_hyoka_cnt": 6
    })
}

/// Gzipped JSON page: header element followed by `records`
fn page(records: Vec<Value>) -> Vec<u8> {
    let mut items = vec![json!({ "allcount": 99_999 })];
    items.extend(records);
    let mut enc = GzEncoder::new(Vec::new(), Compression::fast());
    enc.write_all(serde_json::to_string(&items).unwrap().as_bytes())
        .unwrap();
    enc.finish().unwrap()
}

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()
}

/// `count` records unique to call `n`, all newer than anything before it
fn full_page(n: usize, count: usize) -> Vec<u8> {
    let start = base_time() + TimeDelta::hours(n as i64);
    page(
        (0..count)
            .map(|j| record(&format!("N{n:03}{j:04}"), start + TimeDelta::seconds(j as i64)))
            .collect(),
    )
}

fn test_config(dir: &Path) -> Config {
    Config {
        output_dir: dir.to_path_buf(),
        interval: Duration::ZERO,
        ..Default::default()
    }
}

fn dataset_rows(dir: &Path) -> Vec<String> {
    std::fs::read_to_string(dir.join("0000-0199").join("all.tsv"))
        .unwrap()
        .lines()
        .map(String::from)
        .collect()
}

fn unavailable() -> StreamError {
    StreamError::Http {
        status: Some(503),
        message: "service unavailable".to_string(),
    }
}

#[test]
fn short_page_ends_run() {
    let dir = TempDir::new().unwrap();
    let mut source = ScriptedSource::new(|n, _q: &PageQuery| {
        Ok(full_page(n, if n == 3 { 320 } else { 500 }))
    });

    let summary = Harvester::new(test_config(dir.path()), &mut source)
        .run()
        .unwrap();

    assert_eq!(summary.termination, Termination::TailReached);
    assert_eq!(summary.iterations, 1);
    assert_eq!(summary.pages_fetched, 4);
    assert_eq!(summary.records_written, 1820);
    let offsets: Vec<usize> = source.queries.iter().map(|q| q.offset).collect();
    assert_eq!(offsets, vec![0, 501, 1001, 1501]);

    assert_eq!(dataset_rows(dir.path()).len(), 1820);
    for i in 0..4 {
        assert!(dir.path().join(format!("0000-0199/result-{i}.gz")).exists());
    }
}

#[test]
fn short_first_page_skips_remaining_offsets() {
    let dir = TempDir::new().unwrap();
    let mut source = ScriptedSource::new(|n, _q: &PageQuery| Ok(full_page(n, 10)));

    let summary = Harvester::new(test_config(dir.path()), &mut source)
        .run()
        .unwrap();

    assert_eq!(summary.termination, Termination::TailReached);
    assert_eq!(source.queries.len(), 1);
    assert_eq!(dataset_rows(dir.path()).len(), 10);
}

#[test]
fn cursor_advances_between_iterations() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let floor = config.epoch_floor;
    let mut source = ScriptedSource::new(|n, _q: &PageQuery| {
        Ok(full_page(n, if n == 5 { 0 } else { 500 }))
    });

    let summary = Harvester::new(config, &mut source).run().unwrap();

    assert_eq!(summary.termination, Termination::TailReached);
    assert_eq!(summary.iterations, 2);
    assert_eq!(source.queries.len(), 6);

    // iteration 0 queries all use the floor
    assert!(source.queries[..4].iter().all(|q| q.lower == floor));
    // iteration 1 uses newest lastup of iteration 0 minus nine hours
    let newest = base_time() + TimeDelta::hours(3) + TimeDelta::seconds(499);
    let expected = newest - TimeDelta::seconds(32_400);
    assert!(source.queries[4..].iter().all(|q| q.lower == expected));
    assert_eq!(summary.final_cursor, expected);
    // upper bound never moves
    let upper = source.queries[0].upper;
    assert!(source.queries.iter().all(|q| q.upper == upper));
}

#[test]
fn non_increasing_cursor_stops_with_order_error() {
    let dir = TempDir::new().unwrap();
    // Newest lastup is five hours after the floor, so the corrected cursor
    // would fall before it.
    let stale = Utc.with_ymd_and_hms(2000, 1, 1, 5, 0, 0).unwrap();
    let mut source = ScriptedSource::new(move |n, _q: &PageQuery| {
        Ok(page(
            (0..500)
                .map(|j| record(&format!("S{n}-{j}"), stale))
                .collect(),
        ))
    });

    let summary = Harvester::new(test_config(dir.path()), &mut source)
        .run()
        .unwrap();

    match &summary.termination {
        Termination::OrderError(v) => {
            assert_eq!(v.candidate, Some(stale));
            assert_eq!(v.proposed, Some(stale - TimeDelta::hours(9)));
        }
        other => panic!("expected order error, got {other}"),
    }
    assert_eq!(summary.termination.exit_code(), 3);
    assert_eq!(summary.iterations, 1);
    // no second iteration was started
    assert_eq!(source.queries.len(), 4);
    // rows already written stay on disk
    assert_eq!(dataset_rows(dir.path()).len(), 2000);
}

#[test]
fn iteration_cap_stops_endless_feed() {
    let dir = TempDir::new().unwrap();
    let config = Config {
        max_iterations: 2,
        ..test_config(dir.path())
    };
    let mut source = ScriptedSource::new(|n, _q: &PageQuery| Ok(full_page(n, 500)));

    let summary = Harvester::new(config, &mut source).run().unwrap();

    assert_eq!(summary.termination, Termination::CapReached);
    assert_eq!(summary.termination.exit_code(), 2);
    assert_eq!(summary.iterations, 2);
    assert_eq!(source.queries.len(), 8);
    assert_eq!(dataset_rows(dir.path()).len(), 4000);
    // page index keeps counting across iterations
    assert!(dir.path().join("0000-0199/result-7.gz").exists());
}

#[test]
fn duplicates_are_written_once_per_run() {
    let dir = TempDir::new().unwrap();
    let config = Config {
        page_size: 4,
        pages_per_iteration: 2,
        ..test_config(dir.path())
    };
    let t = |h: i64| base_time() + TimeDelta::hours(h);
    let mut source = ScriptedSource::new(move |n, _q: &PageQuery| {
        let ids: &[&str] = match n {
            0 => &["A", "B", "C", "D"],
            1 => &["C", "D", "E", "E"],
            2 => &["A", "F", "G", "H"],
            _ => &["H", "I"],
        };
        Ok(page(
            ids.iter()
                .map(|id| record(id, t(12 * (n as i64 + 1))))
                .collect(),
        ))
    });

    let summary = Harvester::new(config, &mut source).run().unwrap();

    assert_eq!(summary.termination, Termination::TailReached);
    assert_eq!(source.queries.len(), 4);
    assert_eq!(summary.records_received, 14);
    assert_eq!(summary.records_written, 9);
    assert_eq!(summary.duplicates_skipped, 5);

    let rows = dataset_rows(dir.path());
    let ids: Vec<&str> = rows.iter().map(|r| r.split('\t').next().unwrap()).collect();
    assert_eq!(ids, vec!["A", "B", "C", "D", "E", "F", "G", "H", "I"]);
    let unique: HashSet<&str> = ids.iter().copied().collect();
    assert_eq!(unique.len(), ids.len());
}

#[test]
fn header_element_is_never_written() {
    let dir = TempDir::new().unwrap();
    let config = Config {
        page_size: 3,
        ..test_config(dir.path())
    };
    let mut source = ScriptedSource::new(|_n, _q: &PageQuery| {
        Ok(page(vec![
            record("N1", base_time()),
            record("N2", base_time()),
        ]))
    });

    let summary = Harvester::new(config, &mut source).run().unwrap();

    assert_eq!(summary.records_received, 2);
    let rows = dataset_rows(dir.path());
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| !r.contains("allcount")));
    assert!(rows.iter().all(|r| r.split('\t').count() == 17));
    assert_eq!(
        rows[0],
        "N1\t7\t201\t2019-12-02 00:00\t2020-01-01 00:00\t1\t0\t12\t48000\t0\t1\t100\t20\t3\t0\t60\t6"
    );
}

#[test]
fn fetch_failure_is_treated_as_tail() {
    let dir = TempDir::new().unwrap();
    let mut source = ScriptedSource::new(|n, _q: &PageQuery| {
        if n == 1 { Err(unavailable()) } else { Ok(full_page(n, 500)) }
    });

    let summary = Harvester::new(test_config(dir.path()), &mut source)
        .run()
        .unwrap();

    assert_eq!(summary.termination, Termination::TailReached);
    assert_eq!(summary.failed_pages, 1);
    assert_eq!(source.queries.len(), 2);
    assert_eq!(dataset_rows(dir.path()).len(), 500);
}

#[test]
fn garbage_body_is_treated_as_tail() {
    let dir = TempDir::new().unwrap();
    let mut source =
        ScriptedSource::new(|_n, _q: &PageQuery| Ok(b"upstream maintenance".to_vec()));

    let summary = Harvester::new(test_config(dir.path()), &mut source)
        .run()
        .unwrap();

    assert_eq!(summary.failed_pages, 1);
    assert_eq!(summary.records_written, 0);
    assert_eq!(summary.final_cursor, test_config(dir.path()).epoch_floor);
}

#[test]
fn retry_policy_recovers_transient_failure() {
    let dir = TempDir::new().unwrap();
    let config = Config {
        on_fetch_error: FetchFailurePolicy::Retry,
        max_retries: 1,
        page_size: 2,
        pages_per_iteration: 1,
        ..test_config(dir.path())
    };
    let mut source = ScriptedSource::new(|n, _q: &PageQuery| match n {
        0 => Err(unavailable()),
        1 => Ok(page(vec![record("R1", base_time())])),
        _ => panic!("unexpected call {n}"),
    });

    let summary = Harvester::new(config, &mut source).run().unwrap();

    assert_eq!(summary.failed_pages, 0);
    assert_eq!(summary.records_written, 1);
    assert_eq!(source.queries.len(), 2);
    assert_eq!(source.queries[0], source.queries[1]);
}

#[test]
fn rerun_truncates_dataset() {
    let dir = TempDir::new().unwrap();
    for _ in 0..2 {
        let mut source = ScriptedSource::new(|n, _q: &PageQuery| Ok(full_page(n, 5)));
        Harvester::new(test_config(dir.path()), &mut source)
            .run()
            .unwrap();
    }
    assert_eq!(dataset_rows(dir.path()).len(), 5);
}

#[test]
fn dataset_rows_parse_back_to_ids_in_order() {
    let dir = TempDir::new().unwrap();
    let config = Config {
        page_size: 2,
        pages_per_iteration: 1,
        ..test_config(dir.path())
    };
    let mut source = ScriptedSource::new(|_n, _q: &PageQuery| {
        Ok(page(vec![record("Z9", base_time())]))
    });
    let summary = Harvester::new(config, &mut source).run().unwrap();
    assert_eq!(summary.records_written, 1);

    let body = std::fs::read(dir.path().join("0000-0199/result-0.gz")).unwrap();
    let decoded = harvest_narou::decode::decode_page(&body).unwrap();
    let ids: Vec<&str> = decoded.records.iter().map(|r: &Record| r.id.as_str()).collect();
    assert_eq!(ids, vec!["Z9"]);
}

/// Fetch two small windows from the real API.
/// Run with: cargo test -p harvest-narou --test harvest -- --ignored live_api
#[test]
#[ignore]
fn live_api() {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = TempDir::new().unwrap();
    let config = Config {
        output_dir: dir.path().to_path_buf(),
        max_iterations: 1,
        pages_per_iteration: 1,
        ..Default::default()
    };

    let summary = harvest_narou::run(&config).expect("harvest should succeed");

    assert_eq!(summary.failed_pages, 0);
    assert_eq!(summary.records_written, 500);
    assert_eq!(summary.termination, Termination::CapReached);
}
