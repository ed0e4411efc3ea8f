//! Concurrent read access to a shared dictionary.

use std::sync::{Arc, Barrier};
use std::thread;

use statedict::prelude::*;

fn assert_send_sync<T: Send + Sync>() {}

#[test]
fn test_dictionary_is_send_and_sync() {
    assert_send_sync::<StateDictionary<String>>();
    assert_send_sync::<SimpleDictionary<String>>();
}

#[test]
fn test_parallel_matchers() {
    let pairs: Vec<(String, usize)> = (0..1000).map(|i| (format!("term{i}"), i)).collect();
    let dict = StateDictionary::from_pairs(pairs).unwrap();

    const NUM_READERS: usize = 8;
    let barrier = Arc::new(Barrier::new(NUM_READERS));

    let handles: Vec<_> = (0..NUM_READERS)
        .map(|reader| {
            let dict = dict.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let mut found = 0;
                for j in 0..250 {
                    let id = (reader * 250 + j) % 1000;
                    let text = format!("see term{id} here");
                    let mut matcher = dict.matcher(&text);
                    if matcher.find(MatchFilter::LongestMatch) == MatchStatus::Match {
                        assert_eq!(matcher.match_value(), Some(&id));
                        found += 1;
                    }
                    assert_eq!(dict.get(&format!("term{id}")), Some(&id));
                }
                found
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), 250);
    }
}

#[test]
fn test_clones_share_storage() {
    let dict = StateDictionary::from_pairs([("alpha", 1u8), ("beta", 2)]).unwrap();
    let copy = dict.clone();
    assert!(std::ptr::eq(dict.automaton(), copy.automaton()));
    assert!(std::ptr::eq(dict.results(), copy.results()));

    let worker = thread::spawn(move || copy.get("beta").copied());
    assert_eq!(worker.join().unwrap(), Some(2));
    assert_eq!(dict.get("alpha"), Some(&1));
}
