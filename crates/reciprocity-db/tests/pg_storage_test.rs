//! Integration tests for the PostgreSQL storage layer.
//!
//! These tests need a PostgreSQL server with the pgvector extension
//! available. Each test runs in its own schema via `TestDatabase`.
//! Run with: `cargo test -p reciprocity-db -- --ignored`

use chrono::{Duration, Utc};

use reciprocity_db::test_fixtures::TestDatabase;
use reciprocity_db::{
    Dimension, Direction, MatchList, MatchStore, MatchType, NotificationLedger, PendingReason,
    Profile, ProfileRepository, StoredMatchEntry, UpsertMode, VectorIndex, VectorKind,
};

fn entry(id: &str, score: f32) -> StoredMatchEntry {
    StoredMatchEntry {
        matched_user_id: id.to_string(),
        similarity_score: score,
        match_type: MatchType::Enhanced,
        explanation: "Two-way match".to_string(),
        created_at: Utc::now(),
    }
}

#[tokio::test]
#[ignore]
async fn test_profile_roundtrip_and_flags() {
    let _ = dotenvy::dotenv();
    let test_db = TestDatabase::new().await.unwrap();
    let profiles = &test_db.db.profiles;

    let created = Utc::now() - Duration::days(3);
    let profile = Profile::new("alice", "seeking seed funding", "fintech product")
        .with_designation("Founder")
        .with_dimension(Direction::Requirements, Dimension::Industry, "fintech")
        .with_dealbreakers("crypto; gambling")
        .with_timestamps(created, Utc::now());
    profiles.upsert(&profile).await.unwrap();
    profiles
        .upsert(&Profile::new("bob", "founders", "capital"))
        .await
        .unwrap();

    let loaded = profiles.get("alice").await.unwrap().unwrap();
    assert_eq!(loaded.designation.as_deref(), Some("Founder"));
    assert_eq!(
        loaded.requirement_dimensions.get(&Dimension::Industry).map(String::as_str),
        Some("fintech")
    );
    assert!(loaded.dealbreakers.contains("crypto"));
    assert!(profiles.get("nobody").await.unwrap().is_none());

    profiles
        .flag_needs_matching("alice", PendingReason::ProfileChanged)
        .await
        .unwrap();
    profiles
        .flag_needs_matching("bob", PendingReason::Pending)
        .await
        .unwrap();
    // Does not downgrade
    profiles
        .flag_needs_matching("alice", PendingReason::Pending)
        .await
        .unwrap();

    let pending = profiles.list_pending(10).await.unwrap();
    assert_eq!(pending.len(), 2);
    let alice = pending.iter().find(|p| p.user_id == "alice").unwrap();
    assert_eq!(alice.reason, PendingReason::ProfileChanged);

    // bob is edited after the listing; only alice's flag is cleared.
    profiles
        .flag_needs_matching("bob", PendingReason::ProfileChanged)
        .await
        .unwrap();
    let cleared = profiles.clear_needs_matching(&pending).await.unwrap();
    assert_eq!(cleared, 1);
    let still = profiles.list_pending(10).await.unwrap();
    assert_eq!(still.len(), 1);
    assert_eq!(still[0].user_id, "bob");
    assert_eq!(still[0].reason, PendingReason::ProfileChanged);

    assert_eq!(profiles.clear_needs_matching(&still).await.unwrap(), 1);
    assert!(profiles.list_pending(10).await.unwrap().is_empty());

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn test_vector_nearest_respects_threshold_and_exclusion() {
    let _ = dotenvy::dotenv();
    let test_db = TestDatabase::new().await.unwrap();
    let vectors = &test_db.db.vectors;
    let kind = VectorKind::plain(Direction::Offerings);

    vectors.store_vector("me", kind, vec![1.0, 0.0, 0.0]).await.unwrap();
    vectors.store_vector("near", kind, vec![0.9, 0.1, 0.0]).await.unwrap();
    vectors.store_vector("far", kind, vec![0.0, 0.0, 1.0]).await.unwrap();
    // Overwrite keeps one row per (user, kind)
    vectors.store_vector("far", kind, vec![0.0, 1.0, 0.0]).await.unwrap();

    let hits = vectors
        .nearest(&[1.0, 0.0, 0.0], kind, 0.5, "me")
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].user_id, "near");
    assert!(hits[0].score > 0.9);

    let all = vectors.get_vectors("far").await.unwrap();
    assert_eq!(all.get(&kind), Some(&vec![0.0, 1.0, 0.0]));

    let other = VectorKind::plain(Direction::Requirements);
    vectors.store_vector("far", other, vec![1.0, 0.0, 0.0]).await.unwrap();
    assert_eq!(vectors.retain_kinds("far", &[other]).await.unwrap(), 1);
    let left = vectors.get_vectors("far").await.unwrap();
    assert_eq!(left.len(), 1);
    assert!(left.contains_key(&other));

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn test_match_store_modes() {
    let _ = dotenvy::dotenv();
    let test_db = TestDatabase::new().await.unwrap();
    let store = &test_db.db.matches;

    store
        .upsert(
            "alice",
            MatchList::Requirements,
            vec![entry("bob", 0.8), entry("carol", 0.7)],
            UpsertMode::Replace,
        )
        .await
        .unwrap();
    let written = store
        .upsert(
            "alice",
            MatchList::Requirements,
            vec![entry("bob", 0.9), entry("dave", 0.6)],
            UpsertMode::AppendIfAbsent,
        )
        .await
        .unwrap();
    assert_eq!(written, 1);

    let doc = store.get("alice").await.unwrap();
    let ids: Vec<_> = doc
        .requirements_matches
        .iter()
        .map(|e| e.matched_user_id.as_str())
        .collect();
    assert_eq!(ids, vec!["bob", "carol", "dave"]);
    assert!((doc.requirements_matches[0].similarity_score - 0.8).abs() < 1e-6);
    assert!(doc.updated_at.is_some());

    store
        .upsert("alice", MatchList::Requirements, vec![entry("erin", 0.5)], UpsertMode::Replace)
        .await
        .unwrap();
    let doc = store.get("alice").await.unwrap();
    assert_eq!(doc.len(), 1);

    store.clear("alice").await.unwrap();
    assert!(store.get("alice").await.unwrap().is_empty());

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn test_ledger_upsert_counts() {
    let _ = dotenvy::dotenv();
    let test_db = TestDatabase::new().await.unwrap();
    let ledger = &test_db.db.ledger;

    let first = ledger.mark_notified("zoe", "adam", 0.7).await.unwrap();
    assert_eq!(first.pair_key, "adam|zoe");
    assert_eq!(first.user_a_id, "adam");
    assert_eq!(first.notification_count, 1);

    let second = ledger.mark_notified("adam", "zoe", 0.9).await.unwrap();
    assert_eq!(second.notification_count, 2);
    assert!((second.last_similarity_score - 0.9).abs() < 1e-6);

    assert!(ledger.is_notified("zoe", "adam").await.unwrap());
    assert_eq!(ledger.clear("zoe").await.unwrap(), 1);
    assert!(ledger.get("adam", "zoe").await.unwrap().is_none());

    test_db.cleanup().await;
}
