use reqbench::http::{RequestData, ResponseData, ResponseTiming};
use reqbench::HistoryStore;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

fn dummy_exchange(tag: &str) -> (RequestData, ResponseData) {
    let request = RequestData::new("GET", &format!("https://example.com/{}", tag));
    let response = ResponseData::received(
        200,
        BTreeMap::new(),
        "ok".to_string(),
        ResponseTiming::default(),
    );
    (request, response)
}

#[test]
fn test_concurrent_writes() {
    let temp_dir = TempDir::new().unwrap();

    // each thread opens its own store on the same directory, like separate processes would
    let dir = Arc::new(PathBuf::from(temp_dir.path()));

    let mut handles = vec![];
    let thread_count = 8;
    let entries_per_thread = 25;

    for i in 0..thread_count {
        let dir = dir.clone();
        handles.push(thread::spawn(move || {
            let store = HistoryStore::new((*dir).clone());
            let mut ids = Vec::new();
            for j in 0..entries_per_thread {
                let (request, response) = dummy_exchange(&format!("{}-{}", i, j));
                ids.push(store.record(&request, &response).unwrap().id);
            }
            ids
        }));
    }

    let mut all_ids = Vec::new();
    for handle in handles {
        let ids = handle.join().unwrap();
        // ids one writer sees keep increasing
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
        all_ids.extend(ids);
    }

    let unique: HashSet<u64> = all_ids.iter().copied().collect();
    assert_eq!(unique.len(), thread_count * entries_per_thread);

    let store = HistoryStore::new(temp_dir.path());
    assert_eq!(store.len().unwrap(), thread_count * entries_per_thread);

    // every line is a whole record, in id order
    let content = fs::read_to_string(temp_dir.path().join("history.jsonl")).unwrap();
    let file_ids: Vec<u64> = content
        .lines()
        .map(|line| {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            value["id"].as_u64().unwrap()
        })
        .collect();
    assert_eq!(file_ids.len(), thread_count * entries_per_thread);
    assert!(file_ids.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_concurrent_reads_during_writes() {
    let temp_dir = TempDir::new().unwrap();
    let dir = PathBuf::from(temp_dir.path());

    let writer_dir = dir.clone();
    let writer = thread::spawn(move || {
        let store = HistoryStore::new(writer_dir);
        for j in 0..50 {
            let (request, response) = dummy_exchange(&j.to_string());
            store.record(&request, &response).unwrap();
        }
    });

    let reader = thread::spawn(move || {
        let store = HistoryStore::new(dir);
        let mut last = 0;
        for _ in 0..50 {
            let len = store.len().unwrap();
            // readers never see a partially applied write
            assert!(len >= last);
            last = len;
        }
    });

    writer.join().unwrap();
    reader.join().unwrap();
    assert_eq!(HistoryStore::new(temp_dir.path()).len().unwrap(), 50);
}

#[test]
fn test_shared_store_across_threads() {
    let temp_dir = TempDir::new().unwrap();

    // one store, so writers race on its in-process mutex before the file lock
    let store = Arc::new(HistoryStore::new(temp_dir.path()).with_capacity(1_000));

    let thread_count = 8;
    let entries_per_thread = 25;
    let handles: Vec<_> = (0..thread_count)
        .map(|i| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                (0..entries_per_thread)
                    .map(|j| {
                        let (request, response) = dummy_exchange(&format!("{}-{}", i, j));
                        store.record(&request, &response).unwrap().id
                    })
                    .collect::<Vec<u64>>()
            })
        })
        .collect();

    let mut all_ids: Vec<u64> = handles
        .into_iter()
        .flat_map(|handle| handle.join().unwrap())
        .collect();
    all_ids.sort_unstable();

    let expected: Vec<u64> = (1..=(thread_count * entries_per_thread) as u64).collect();
    assert_eq!(all_ids, expected);
    assert_eq!(store.len().unwrap(), thread_count * entries_per_thread);

    let listed = store.list(usize::MAX, 0).unwrap();
    assert!(listed.windows(2).all(|w| w[0].id > w[1].id));
}

#[test]
fn test_shared_store_eviction_under_contention() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(HistoryStore::new(temp_dir.path()).with_capacity(10));

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for j in 0..20 {
                    let (request, response) = dummy_exchange(&format!("{}-{}", i, j));
                    store.record(&request, &response).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // only the newest ten survive
    let ids: Vec<u64> = store.list(100, 0).unwrap().iter().map(|i| i.id).collect();
    assert_eq!(ids, (71..=80).rev().collect::<Vec<u64>>());
}
