//! Leader produces, followers receive

use std::sync::Arc;

use parking_lot::Mutex;

use crate::common::*;

#[tokio::test]
async fn follower_rebuilds_leader_snapshot() {
    let leader = Node::new(1);
    let follower = Node::new(1);

    let snapshot = leader
        .snapshot(1, &[("file1", "file1 contents"), ("file2", "file2 contents")])
        .await;
    let replica = replicate(&snapshot, &follower).await;

    assert_eq!(replica.id(), snapshot.id());
    assert_eq!(replica.checksum(), snapshot.checksum());
    assert_eq!(contents(&replica), contents(&snapshot));
    assert_eq!(follower.store.current_snapshot_index(), 1);
    assert_eq!(follower.pending_entries(), 0);
}

#[tokio::test]
async fn follower_keeps_only_newest_snapshot() {
    let leader = Node::new(1);
    let follower = Node::new(1);

    let first = leader.snapshot(1, &[("state", "v1")]).await;
    let first_replica = replicate(&first, &follower).await;
    let second = leader.snapshot(2, &[("state", "v2"), ("extra", "x")]).await;
    let second_replica = replicate(&second, &follower).await;

    assert!(!first.exists());
    assert!(!first_replica.exists());
    assert_eq!(follower.store.latest_snapshot(), Some(second_replica.clone()));
    assert_eq!(contents(&second_replica), contents(&second));
    assert_eq!(follower.store.available_snapshots().len(), 1);
}

#[tokio::test]
async fn stale_transfer_does_not_regress_follower() {
    let leader = Node::new(1);
    let follower = Node::new(1);

    let old = leader.snapshot(1, &[("state", "v1")]).await;
    let old_chunks: Vec<SnapshotChunk> = old
        .new_chunk_reader()
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    let new = leader.snapshot(2, &[("state", "v2")]).await;

    let mut stale = follower.store.new_received_snapshot(&old.id()).await.unwrap();
    for chunk in old_chunks {
        assert!(stale.apply(chunk).await.unwrap());
    }
    let fresh = replicate(&new, &follower).await;

    // The stale transfer's directory was dropped by the newer commit
    assert!(!stale.path().exists());
    assert_eq!(stale.persist().await.unwrap(), fresh);
    assert_eq!(follower.store.current_snapshot_index(), 2);
}

#[tokio::test]
async fn follower_listener_sees_replicated_snapshot() {
    let leader = Node::new(1);
    let follower = Node::new(1);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = seen.clone();
    follower
        .store
        .add_snapshot_listener(Arc::new(move |s: &PersistedSnapshot| {
            log.lock().push(s.index())
        }));

    for index in 1..=3 {
        let snapshot = leader.snapshot(index, &[("state", "data")]).await;
        replicate(&snapshot, &follower).await;
    }

    assert_eq!(*seen.lock(), vec![1, 2, 3]);
}
