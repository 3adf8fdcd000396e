//! Damaged, interrupted and resumed chunk transfers

use crate::common::*;

#[tokio::test]
async fn corrupted_chunk_is_rejected_then_resent() {
    let leader = Node::new(1);
    let follower = Node::new(1);
    let snapshot = leader
        .snapshot(1, &[("file1", "file1 contents"), ("file2", "file2 contents")])
        .await;

    let mut reader = snapshot.new_chunk_reader().unwrap();
    let mut received = follower
        .store
        .new_received_snapshot(&snapshot.id())
        .await
        .unwrap();

    let file1 = reader.next_chunk().unwrap();
    let file2 = reader.next_chunk().unwrap();
    assert!(received.apply(file1).await.unwrap());
    let damaged = file2.to_builder().checksum(0xCAFEBABE).build();
    assert!(!received.apply(damaged).await.unwrap());
    assert!(!received.is_complete());

    assert!(received.apply(file2).await.unwrap());
    let replica = received.persist().await.unwrap();
    assert_eq!(replica.checksum(), snapshot.checksum());
}

#[tokio::test]
async fn partial_transfer_aborted_then_retried() {
    let leader = Node::new(1);
    let follower = Node::new(1);
    let snapshot = leader
        .snapshot(1, &[("a", "1"), ("b", "2"), ("c", "3")])
        .await;

    let mut partial = follower
        .store
        .new_received_snapshot(&snapshot.id())
        .await
        .unwrap();
    let first = snapshot.new_chunk_reader().unwrap().next_chunk().unwrap();
    assert!(partial.apply(first).await.unwrap());
    assert!(matches!(
        partial.persist().await,
        Err(SnapshotError::IllegalState(_))
    ));
    partial.abort().await;
    assert_eq!(follower.pending_entries(), 0);

    let replica = replicate(&snapshot, &follower).await;
    assert_eq!(contents(&replica), contents(&snapshot));
}

#[tokio::test]
async fn transfer_resumes_from_next_chunk() {
    let leader = Node::new(1);
    let follower = Node::new(1);
    let snapshot = leader
        .snapshot(1, &[("a", "1"), ("b", "2"), ("c", "3")])
        .await;
    let mut received = follower
        .store
        .new_received_snapshot(&snapshot.id())
        .await
        .unwrap();

    // First connection delivers one chunk and remembers where to resume
    let mut reader = snapshot.new_chunk_reader().unwrap();
    assert!(received.apply(reader.next_chunk().unwrap()).await.unwrap());
    let resume_at = reader.next_id().unwrap().to_string();
    drop(reader);

    // Second connection seeks to the remembered chunk
    let mut reader = snapshot.new_chunk_reader().unwrap();
    reader.seek(Some(resume_at.as_str()));
    while reader.has_next() {
        assert!(received.apply(reader.next_chunk().unwrap()).await.unwrap());
    }

    assert_eq!(received.applied_count(), 3);
    let replica = received.persist().await.unwrap();
    assert_eq!(replica.checksum(), snapshot.checksum());
}

#[tokio::test]
async fn chunks_of_another_snapshot_are_ignored() {
    let leader = Node::new(1);
    let follower = Node::new(1);
    let wanted = leader.snapshot(1, &[("state", "v1")]).await;
    let wanted_chunks: Vec<SnapshotChunk> = wanted
        .new_chunk_reader()
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    let other = leader.snapshot(2, &[("state", "v2")]).await;

    let mut received = follower
        .store
        .new_received_snapshot(&wanted.id())
        .await
        .unwrap();
    for chunk in other.new_chunk_reader().unwrap() {
        assert!(!received.apply(chunk.unwrap()).await.unwrap());
    }
    assert_eq!(received.applied_count(), 0);

    for chunk in wanted_chunks {
        assert!(received.apply(chunk).await.unwrap());
    }
    assert_eq!(received.persist().await.unwrap().id(), wanted.id());
}
