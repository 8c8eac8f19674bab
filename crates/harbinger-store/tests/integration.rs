//! Integration tests for harbinger-store against an on-disk SQLite file.

use harbinger_store::PresenceStore;

fn ips(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[test]
fn presence_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("harbinger.db");

    {
        let store = PresenceStore::open(&path).unwrap();
        store.ensure_tables(&[6379, 9200]).unwrap();
        let new = store.upsert(6379, &ips(&["10.1.0.1", "10.1.0.2"])).unwrap();
        assert_eq!(new.len(), 2);
    }

    let store = PresenceStore::open(&path).unwrap();
    store.ensure_tables(&[6379, 9200]).unwrap();

    let new = store
        .upsert(6379, &ips(&["10.1.0.2", "10.1.0.3"]))
        .unwrap();
    assert_eq!(new, ips(&["10.1.0.3"]));
    assert_eq!(store.count(6379).unwrap(), 3);
    assert_eq!(store.count(9200).unwrap(), 0);
    assert_eq!(store.tracked_ports().unwrap(), vec![6379, 9200]);
}

#[test]
fn at_most_one_record_per_ip() {
    let dir = tempfile::tempdir().unwrap();
    let store = PresenceStore::open(dir.path().join("state.db")).unwrap();

    for _ in 0..3 {
        store
            .upsert(27017, &ips(&["10.2.0.1", "10.2.0.1", "10.2.0.2"]))
            .unwrap();
    }

    let records = store.list(27017).unwrap();
    assert_eq!(records.len(), 2);
    let mut addresses: Vec<_> = records.iter().map(|r| r.ip_address.as_str()).collect();
    addresses.dedup();
    assert_eq!(addresses.len(), 2);
}

#[test]
fn record_timestamps_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = PresenceStore::open(dir.path().join("state.db")).unwrap();

    let before = chrono::Utc::now();
    store.upsert(11211, &ips(&["10.3.0.1"])).unwrap();
    let record = store.find(11211, "10.3.0.1").unwrap().unwrap();

    assert_eq!(record.ip_address, "10.3.0.1");
    assert!(record.first_seen.timestamp() >= before.timestamp());
    assert_eq!(record.first_seen, record.last_seen);
}
