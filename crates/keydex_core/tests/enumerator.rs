//! End-to-end tests over a real storage directory.

use keydex_codec::Utf8Codec;
use keydex_core::{CoreError, DurableEnumerator, EnumeratorConfig, KeyId, MapKind};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn open(path: &Path) -> DurableEnumerator<String, Utf8Codec> {
    open_with(path, EnumeratorConfig::default())
}

fn open_with(path: &Path, config: EnumeratorConfig) -> DurableEnumerator<String, Utf8Codec> {
    DurableEnumerator::open(path, Utf8Codec, config).unwrap()
}

#[test]
fn ids_survive_reopen() {
    let temp = tempdir().unwrap();

    let (id_a, id_b) = {
        let enumerator = open(temp.path());
        let a = enumerator.enumerate(&"alpha".to_string()).unwrap();
        let b = enumerator.enumerate(&"beta".to_string()).unwrap();
        enumerator.close().unwrap();
        (a, b)
    };

    let enumerator = open(temp.path());
    assert_eq!(enumerator.len(), 2);
    assert_eq!(enumerator.enumerate(&"alpha".to_string()).unwrap(), id_a);
    assert_eq!(enumerator.enumerate(&"beta".to_string()).unwrap(), id_b);
    assert_eq!(enumerator.value_of(id_a).unwrap(), "alpha");
    assert_eq!(enumerator.value_of(id_b).unwrap(), "beta");
}

#[test]
fn ids_are_monotonic_in_insertion_order() {
    let temp = tempdir().unwrap();
    let enumerator = open(temp.path());

    let ids: Vec<KeyId> = (0..100)
        .map(|i| enumerator.enumerate(&format!("key-{i}")).unwrap())
        .collect();

    for (index, id) in ids.iter().enumerate() {
        assert_eq!(*id, KeyId::new(index as u32 + 1));
    }
}

#[test]
fn try_enumerate_leaves_log_untouched() {
    let temp = tempdir().unwrap();

    {
        let enumerator = open(temp.path());
        enumerator.enumerate(&"present".to_string()).unwrap();
        enumerator.close().unwrap();
    }
    let log_size_before = fs::metadata(temp.path().join("keys.log")).unwrap().len();

    {
        let enumerator = open(temp.path());
        assert_eq!(enumerator.try_enumerate(&"absent".to_string()).unwrap(), None);
        assert!(enumerator
            .try_enumerate(&"present".to_string())
            .unwrap()
            .is_some());
        enumerator.close().unwrap();
    }

    let log_size_after = fs::metadata(temp.path().join("keys.log")).unwrap().len();
    assert_eq!(log_size_before, log_size_after);
}

#[test]
fn large_keys_near_and_past_buffer_size() {
    let temp = tempdir().unwrap();
    let config = EnumeratorConfig::new().append_buffer_size(512);
    let enumerator = open_with(temp.path(), config.clone());

    // Within 10 bytes of the staged buffer size, and twice it.
    let near = "n".repeat(512 - 10);
    let big = "b".repeat(512 * 2);
    let near_id = enumerator.enumerate(&near).unwrap();
    let big_id = enumerator.enumerate(&big).unwrap();
    let small_id = enumerator.enumerate(&"small".to_string()).unwrap();

    assert_eq!(enumerator.value_of(near_id).unwrap(), near);
    assert_eq!(enumerator.value_of(big_id).unwrap(), big);
    enumerator.close().unwrap();

    let enumerator = open_with(temp.path(), config);
    assert_eq!(enumerator.value_of(near_id).unwrap(), near);
    assert_eq!(enumerator.value_of(big_id).unwrap(), big);
    assert_eq!(enumerator.value_of(small_id).unwrap(), "small");
}

#[test]
fn map_rebuilt_after_deletion() {
    let temp = tempdir().unwrap();
    let count = 10_000u32;

    let ids: Vec<KeyId> = {
        let enumerator = open(temp.path());
        let ids = (0..count)
            .map(|i| enumerator.enumerate(&format!("rebuild-{i}")).unwrap())
            .collect();
        enumerator.close().unwrap();
        ids
    };

    fs::remove_file(temp.path().join("keys.map")).unwrap();

    let enumerator = open(temp.path());
    assert_eq!(enumerator.len(), count as usize);
    for (i, id) in ids.iter().enumerate() {
        assert_eq!(
            enumerator.try_enumerate(&format!("rebuild-{i}")).unwrap(),
            Some(*id)
        );
        assert_eq!(enumerator.value_of(*id).unwrap(), format!("rebuild-{i}"));
    }
}

#[test]
fn corruption_marker_forces_rebuild_and_clears() {
    let temp = tempdir().unwrap();

    {
        let enumerator = open(temp.path());
        enumerator.enumerate(&"key".to_string()).unwrap();
        enumerator.mark_corrupted();
        assert!(enumerator.is_corrupted());
        enumerator.close().unwrap();
    }
    assert!(temp.path().join("CORRUPTED").exists());

    let enumerator = open(temp.path());
    assert!(!enumerator.is_corrupted());
    assert_eq!(enumerator.len(), 1);
    assert_eq!(enumerator.value_of(KeyId::new(1)).unwrap(), "key");
    drop(enumerator);

    assert!(!temp.path().join("CORRUPTED").exists());
}

#[test]
fn rebuild_disabled_fails_open_on_missing_map() {
    let temp = tempdir().unwrap();

    {
        let enumerator = open(temp.path());
        enumerator.enumerate(&"key".to_string()).unwrap();
        enumerator.close().unwrap();
    }
    fs::remove_file(temp.path().join("keys.map")).unwrap();

    let result = DurableEnumerator::<String, _>::open(
        temp.path(),
        Utf8Codec,
        EnumeratorConfig::new().rebuild_if_inconsistent(false),
    );
    assert!(matches!(result, Err(CoreError::Open { .. })));
}

#[test]
fn stale_map_detected_without_marker() {
    let temp = tempdir().unwrap();

    {
        let enumerator = open(temp.path());
        enumerator.enumerate(&"one".to_string()).unwrap();
        enumerator.close().unwrap();
    }

    // Keep the old map, append more keys through a fresh session, then
    // put the old (now short) map back.
    let old_map = fs::read(temp.path().join("keys.map")).unwrap();
    {
        let enumerator = open(temp.path());
        enumerator.enumerate(&"two".to_string()).unwrap();
        enumerator.enumerate(&"three".to_string()).unwrap();
        enumerator.close().unwrap();
    }
    fs::write(temp.path().join("keys.map"), old_map).unwrap();

    let enumerator = open(temp.path());
    assert_eq!(enumerator.len(), 3);
    assert!(enumerator
        .try_enumerate(&"three".to_string())
        .unwrap()
        .is_some());
}

#[test]
fn in_memory_map_rebuilds_every_open() {
    let temp = tempdir().unwrap();
    let config = EnumeratorConfig::new().map_kind(MapKind::InMemory);

    let id = {
        let enumerator = open_with(temp.path(), config.clone());
        let id = enumerator.enumerate(&"volatile index".to_string()).unwrap();
        enumerator.close().unwrap();
        id
    };
    assert!(!temp.path().join("keys.map").exists());

    let enumerator = open_with(temp.path(), config);
    assert_eq!(
        enumerator.try_enumerate(&"volatile index".to_string()).unwrap(),
        Some(id)
    );
}

#[test]
fn foreign_log_recreated_empty() {
    let temp = tempdir().unwrap();
    fs::create_dir_all(temp.path()).unwrap();
    fs::write(
        temp.path().join("keys.log"),
        b"some other application's data, definitely not ours",
    )
    .unwrap();

    let enumerator = open(temp.path());
    assert!(enumerator.is_empty());
    let id = enumerator.enumerate(&"fresh".to_string()).unwrap();
    assert_eq!(id, KeyId::new(1));
}

#[test]
fn second_open_of_locked_directory_fails() {
    let temp = tempdir().unwrap();
    let _first = open(temp.path());

    let result =
        DurableEnumerator::<String, _>::open(temp.path(), Utf8Codec, EnumeratorConfig::default());
    assert!(matches!(result, Err(CoreError::Locked)));
}

#[test]
fn concurrent_enumerate_of_same_key_yields_one_id() {
    let temp = tempdir().unwrap();
    let enumerator = open(temp.path());
    let key = "contended".to_string();

    let ids: Vec<KeyId> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| enumerator.enumerate(&key).unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let first = ids[0];
    assert!(ids.iter().all(|id| *id == first));

    // Exactly one record made it into the log.
    let mut stored = Vec::new();
    enumerator
        .for_each(|id, key| {
            stored.push((id, key.clone()));
            true
        })
        .unwrap();
    assert_eq!(stored, vec![(first, key.clone())]);
}

#[test]
fn for_each_matches_enumeration_order_after_reopen() {
    let temp = tempdir().unwrap();
    let words = ["west", "north", "east", "south"];

    {
        let enumerator = open(temp.path());
        for word in words {
            enumerator.enumerate(&word.to_string()).unwrap();
        }
        enumerator.close().unwrap();
    }

    let enumerator = open(temp.path());
    let mut seen = Vec::new();
    enumerator
        .for_each(|id, key| {
            seen.push((id.as_u32(), key.clone()));
            true
        })
        .unwrap();

    let expected: Vec<(u32, String)> = words
        .iter()
        .enumerate()
        .map(|(i, w)| (i as u32 + 1, (*w).to_string()))
        .collect();
    assert_eq!(seen, expected);
}

#[test]
fn close_releases_lock_for_reopen() {
    let temp = tempdir().unwrap();

    let first = open(temp.path());
    first.enumerate(&"held".to_string()).unwrap();
    first.close().unwrap();

    // The closed instance is still alive; its lock must already be free.
    let second = open(temp.path());
    assert_eq!(
        second.try_enumerate(&"held".to_string()).unwrap(),
        Some(KeyId::new(1))
    );
    drop(first);
}

#[test]
fn drop_without_close_still_persists() {
    let temp = tempdir().unwrap();

    {
        let enumerator = open(temp.path());
        enumerator.enumerate(&"dropped".to_string()).unwrap();
        // No close(); Drop syncs.
    }

    let enumerator = open(temp.path());
    assert_eq!(
        enumerator.try_enumerate(&"dropped".to_string()).unwrap(),
        Some(KeyId::new(1))
    );
}
