use std::thread;
use std::time::Duration;

use memberstore::{Member, MemberRepository};
use memberstore_test_helper::{sqlite_setup, CountingProvider};
use pretty_assertions::assert_eq;

fn seed(repository: &MemberRepository<CountingProvider<memberstore::db::PooledProvider>>, n: usize) {
    for i in 0..n {
        repository
            .create(Member::new(format!("member{i}"), i as i64 * 1000))
            .unwrap();
    }
}

#[test]
fn concurrent_reads_share_the_pool() {
    let data = sqlite_setup();
    let repository = MemberRepository::new(
        CountingProvider::new(data.pooled(10)).holding(Duration::from_millis(50)),
    );
    seed(&repository, 10);

    let results: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..10)
            .map(|i| {
                let repository = &repository;
                s.spawn(move || repository.find_by_id(&format!("member{i}")))
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for (i, result) in results.into_iter().enumerate() {
        let member = result.unwrap();
        assert_eq!(member, Member::new(format!("member{i}"), i as i64 * 1000));
    }
    let counts = repository.provider();
    assert_eq!(counts.acquire_failures(), 0);
    assert_eq!(counts.acquired(), 20);
    assert_eq!(counts.released(), 20);
    assert_eq!(counts.outstanding(), 0);
    assert!(counts.peak() <= 10);
    assert_eq!(counts.inner().state().idle_connections, 10);
}

#[test]
fn callers_beyond_max_size_wait_their_turn() {
    let data = sqlite_setup();
    let repository = MemberRepository::new(
        CountingProvider::new(data.pooled(5)).holding(Duration::from_millis(20)),
    );
    seed(&repository, 1);

    thread::scope(|s| {
        for _ in 0..20 {
            let repository = &repository;
            s.spawn(move || {
                assert_eq!(repository.find_by_id("member0").unwrap().balance, 0);
            });
        }
    });

    let counts = repository.provider();
    assert_eq!(counts.acquire_failures(), 0);
    assert_eq!(counts.acquired(), 21);
    assert_eq!(counts.released(), 21);
    assert!(counts.peak() <= 5);
    assert_eq!(counts.inner().state().connections, 5);
}
