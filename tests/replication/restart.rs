//! Node restarts around transfers

use crate::common::*;

#[tokio::test]
async fn restart_mid_transfer_discards_partial_snapshot() {
    let leader = Node::new(1);
    let mut follower = Node::new(1);
    let snapshot = leader.snapshot(1, &[("a", "1"), ("b", "2")]).await;

    let mut received = follower
        .store
        .new_received_snapshot(&snapshot.id())
        .await
        .unwrap();
    let first = snapshot.new_chunk_reader().unwrap().next_chunk().unwrap();
    assert!(received.apply(first).await.unwrap());
    // The process dies without running any cleanup
    std::mem::forget(received);

    follower.restart();

    assert_eq!(follower.pending_entries(), 0);
    assert!(follower.store.latest_snapshot().is_none());

    let replica = replicate(&snapshot, &follower).await;
    assert_eq!(replica.checksum(), snapshot.checksum());
}

#[tokio::test]
async fn restarted_follower_serves_snapshot_to_next_follower() {
    let leader = Node::new(1);
    let mut follower = Node::new(1);
    let next = Node::new(1);
    let snapshot = leader.snapshot(4, &[("state", "data")]).await;
    replicate(&snapshot, &follower).await;

    follower.restart();

    let recovered = follower.store.latest_snapshot().unwrap();
    assert_eq!(recovered.id(), snapshot.id());
    let replica = replicate(&recovered, &next).await;
    assert_eq!(replica.checksum(), snapshot.checksum());
    assert_eq!(contents(&replica), contents(&snapshot));
}
