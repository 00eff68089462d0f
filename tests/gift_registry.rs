//! Integration tests for the gift registry view-model

mod common;

#[cfg(test)]
mod gift_registry_tests {
    use super::common::{create_test_state, seeded_backend};
    use serde_json::json;
    use std::sync::Arc;
    use wedding_sync::BackendError;
    use wedding_sync::ErrorKind;
    use wedding_sync::backend::{Backend, Operation};
    use wedding_sync::dtos::SelectQuery;
    use wedding_sync::entities::{GiftStats, Table};
    use wedding_sync::viewmodels::gift_registry::EMPTY_GIFT_NAME;
    use wedding_sync::viewmodels::{AddOutcome, GiftRegistry, LoadPhase, ReserveOutcome};

    // ============================================================
    // fetch_all
    // ============================================================

    #[tokio::test]
    async fn test_fetch_all_loads_registry_in_id_order() {
        let state = create_test_state(seeded_backend().await);

        state.gifts.fetch_all().await;

        let snapshot = state.gifts.snapshot();
        assert_eq!(snapshot.phase, LoadPhase::Loaded);
        assert_eq!(snapshot.error, None);
        let names: Vec<_> = snapshot.gifts.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["Blender", "Towels"]);
        assert!(snapshot.gifts[0].created_at.is_some());
    }

    #[tokio::test]
    async fn test_stats_count_available_and_reserved() {
        let state = create_test_state(seeded_backend().await);
        state.gifts.fetch_all().await;

        assert_eq!(
            state.gifts.stats(),
            GiftStats {
                available: 1,
                reserved: 1
            }
        );
    }

    #[tokio::test]
    async fn test_failed_fetch_is_cleared_by_next_success() {
        let backend = seeded_backend().await;
        let state = create_test_state(backend.clone());

        backend.fail_next(
            Operation::Select,
            BackendError::new("relation \"gifts\" does not exist").with_code("42P01").with_status(404),
        );
        state.gifts.fetch_all().await;
        let failed = state.gifts.snapshot();
        assert_eq!(failed.phase, LoadPhase::Failed);
        assert_eq!(
            failed.error.as_deref(),
            Some("Database error: relation \"gifts\" does not exist")
        );

        state.gifts.fetch_all().await;
        let loaded = state.gifts.snapshot();
        assert_eq!(loaded.phase, LoadPhase::Loaded);
        assert_eq!(loaded.error, None);
        assert_eq!(loaded.gifts.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_registry() {
        let state = create_test_state(Arc::new(wedding_sync::MemoryBackend::new()));
        assert!(!state.gifts.snapshot().is_empty(), "Not loaded yet");

        state.gifts.fetch_all().await;
        assert!(state.gifts.snapshot().is_empty());
    }

    // ============================================================
    // reserve
    // ============================================================

    #[tokio::test]
    async fn test_reserve_marks_gift_taken() {
        let backend = seeded_backend().await;
        let state = create_test_state(backend.clone());
        state.gifts.fetch_all().await;

        let outcome = state.gifts.reserve(1).await;

        assert_eq!(outcome, ReserveOutcome::Reserved);
        let snapshot = state.gifts.snapshot();
        assert!(snapshot.gift(1).unwrap().is_taken);
        assert_eq!(snapshot.error, None);

        let rows = backend.rows(Table::Gifts).await;
        assert_eq!(rows[0]["is_taken"], true);
        assert_eq!(rows[0]["reserved_by"], serde_json::Value::Null);
    }

    #[tokio::test]
    async fn test_failed_reserve_reverts_optimistic_update() {
        let backend = seeded_backend().await;
        let state = create_test_state(backend.clone());
        state.gifts.fetch_all().await;

        backend.fail_next(
            Operation::Update,
            BackendError::new("permission denied for table gifts")
                .with_code("42501")
                .with_status(403),
        );
        let outcome = state.gifts.reserve(1).await;

        assert_eq!(outcome, ReserveOutcome::Failed(ErrorKind::Unauthorized));
        let snapshot = state.gifts.snapshot();
        assert!(!snapshot.gift(1).unwrap().is_taken, "Reservation must be reverted");
        assert_eq!(
            snapshot.error.as_deref(),
            Some("Failed to reserve Blender: permission denied for table gifts")
        );
        assert_eq!(snapshot.stats(), GiftStats { available: 1, reserved: 1 });
    }

    #[tokio::test]
    async fn test_reserve_offline_reverts() {
        let backend = seeded_backend().await;
        let state = create_test_state(backend.clone());
        state.gifts.fetch_all().await;

        backend.set_offline(true);
        let outcome = state.gifts.reserve(1).await;

        assert_eq!(outcome, ReserveOutcome::Failed(ErrorKind::Network));
        assert!(!state.gifts.snapshot().gift(1).unwrap().is_taken);
    }

    #[tokio::test]
    async fn test_reserve_taken_gift_is_noop() {
        let backend = seeded_backend().await;
        let state = create_test_state(backend.clone());
        state.gifts.fetch_all().await;

        let outcome = state.gifts.reserve(2).await;

        assert_eq!(outcome, ReserveOutcome::AlreadyTaken);
        assert_eq!(backend.calls(Operation::Update), 0);
        assert!(state.gifts.snapshot().gift(2).unwrap().is_taken);
    }

    #[tokio::test]
    async fn test_concurrent_reservation_converges_on_refetch() {
        let backend = seeded_backend().await;
        let alice = GiftRegistry::new(backend.clone());
        let bob = GiftRegistry::new(backend.clone());
        alice.fetch_all().await;
        bob.fetch_all().await;

        assert_eq!(alice.reserve(1).await, ReserveOutcome::Reserved);
        // bob still sees the gift as available and reserves it too
        assert!(!bob.snapshot().gift(1).unwrap().is_taken);
        assert_eq!(bob.reserve(1).await, ReserveOutcome::Reserved);

        alice.fetch_all().await;
        bob.fetch_all().await;
        assert_eq!(alice.snapshot().gifts, bob.snapshot().gifts);
        assert_eq!(bob.stats(), GiftStats { available: 0, reserved: 2 });
    }

    // ============================================================
    // add_custom
    // ============================================================

    #[tokio::test]
    async fn test_add_custom_inserts_and_refetches() {
        let backend = seeded_backend().await;
        let state = create_test_state(backend.clone());
        state.gifts.fetch_all().await;

        let outcome = state.gifts.add_custom("  Picnic basket ").await;

        let AddOutcome::Added(gift) = outcome else {
            panic!("Expected the gift to be added, got {outcome:?}");
        };
        assert_eq!(gift.name, "Picnic basket");
        assert!(!gift.is_taken);

        let snapshot = state.gifts.snapshot();
        assert!(!snapshot.adding);
        assert_eq!(snapshot.gifts.len(), 3);
        assert_eq!(snapshot.gifts[2].name, "Picnic basket");
        assert_eq!(backend.calls(Operation::Select), 2);
    }

    #[tokio::test]
    async fn test_add_custom_rejects_blank_name() {
        let backend = seeded_backend().await;
        let state = create_test_state(backend.clone());

        let outcome = state.gifts.add_custom("   ").await;

        assert_eq!(outcome, AddOutcome::Rejected);
        assert_eq!(state.gifts.snapshot().error.as_deref(), Some(EMPTY_GIFT_NAME));
        assert_eq!(backend.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_add_custom_failure_keeps_list() {
        let backend = seeded_backend().await;
        let state = create_test_state(backend.clone());
        state.gifts.fetch_all().await;

        backend.fail_next(
            Operation::Insert,
            BackendError::new("new row violates row-level security policy").with_code("42501").with_status(401),
        );
        let outcome = state.gifts.add_custom("Vase").await;

        assert_eq!(outcome, AddOutcome::Failed(ErrorKind::Unauthorized));
        let snapshot = state.gifts.snapshot();
        assert!(!snapshot.adding);
        assert_eq!(snapshot.gifts.len(), 2);
        assert_eq!(
            snapshot.error.as_deref(),
            Some("Failed to add \"Vase\": new row violates row-level security policy")
        );

        let rows = backend
            .select(Table::Gifts, &SelectQuery::all().eq("name", "Vase"))
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_inserted_row_from_other_client_shows_after_refetch() {
        let backend = seeded_backend().await;
        let state = create_test_state(backend.clone());
        state.gifts.fetch_all().await;

        backend
            .insert(Table::Gifts, json!({ "name": "Candles" }))
            .await
            .unwrap();
        assert_eq!(state.gifts.snapshot().gifts.len(), 2);

        state.gifts.fetch_all().await;
        assert_eq!(state.gifts.snapshot().gifts.len(), 3);
    }
}
