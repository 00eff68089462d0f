//! Integration tests for responses that arrive late: overlapping fetches,
//! reservations racing a refetch and teardown while a call is awaiting

mod common;

#[cfg(test)]
mod in_flight_tests {
    use super::common::{HoldingBackend, seeded_backend};
    use serde_json::json;
    use std::sync::Arc;
    use wedding_sync::backend::{Backend, Operation};
    use wedding_sync::entities::Table;
    use wedding_sync::viewmodels::{
        GiftRegistry, LoadPhase, ReserveOutcome, Rsvp, SubmitOutcome,
    };
    use wedding_sync::{AppState, BackendError, ErrorKind};

    // ============================================================
    // Fetch generations
    // ============================================================

    #[tokio::test]
    async fn test_older_fetch_resolving_last_is_discarded() {
        let backend = seeded_backend().await;
        let holding = HoldingBackend::new(backend.clone());
        let registry = Arc::new(GiftRegistry::new(holding.clone()));

        let mut held = holding.hold(Operation::Select);
        let first = tokio::spawn({
            let registry = registry.clone();
            async move { registry.fetch_all().await }
        });
        // the first fetch has read the two seeded gifts
        held.reached().await;

        backend
            .insert(Table::Gifts, json!({ "name": "Candles" }))
            .await
            .unwrap();
        registry.fetch_all().await;
        assert_eq!(registry.snapshot().gifts.len(), 3);

        held.release();
        first.await.unwrap();

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.gifts.len(), 3, "The older response must not win");
        assert_eq!(snapshot.phase, LoadPhase::Loaded);
    }

    #[tokio::test]
    async fn test_older_confirmation_fetch_is_discarded() {
        let backend = seeded_backend().await;
        let holding = HoldingBackend::new(backend.clone());
        let rsvp = Arc::new(Rsvp::new(holding.clone()));

        let mut held = holding.hold(Operation::Select);
        let first = tokio::spawn({
            let rsvp = rsvp.clone();
            async move { rsvp.fetch_all().await }
        });
        held.reached().await;

        backend
            .insert(Table::Confirmations, json!({ "name": "Ann", "attendance": "maybe" }))
            .await
            .unwrap();
        rsvp.fetch_all().await;

        held.release();
        first.await.unwrap();

        assert_eq!(rsvp.snapshot().confirmations.len(), 1);
        assert_eq!(rsvp.summary().maybe, 1);
    }

    // ============================================================
    // Reservation racing a refetch
    // ============================================================

    #[tokio::test]
    async fn test_failed_reservation_keeps_newer_fetched_value() {
        let backend = seeded_backend().await;
        let holding = HoldingBackend::new(backend.clone());
        let registry = Arc::new(GiftRegistry::new(holding.clone()));
        registry.fetch_all().await;

        backend.fail_next(
            Operation::Update,
            BackendError::new("permission denied for table gifts")
                .with_code("42501")
                .with_status(403),
        );
        let mut held = holding.hold(Operation::Update);
        let reserve = tokio::spawn({
            let registry = registry.clone();
            async move { registry.reserve(1).await }
        });
        held.reached().await;

        // another guest reserves the same gift and the refetch sees it
        backend
            .update(Table::Gifts, 1, json!({ "is_taken": true }))
            .await
            .unwrap();
        registry.fetch_all().await;

        held.release();
        let outcome = reserve.await.unwrap();

        assert_eq!(outcome, ReserveOutcome::Failed(ErrorKind::Unauthorized));
        let snapshot = registry.snapshot();
        assert!(snapshot.gift(1).unwrap().is_taken, "Backend value must survive the revert");
        assert_eq!(
            snapshot.error.as_deref(),
            Some("Failed to reserve Blender: permission denied for table gifts")
        );
    }

    #[tokio::test]
    async fn test_failed_reservation_without_refetch_is_reverted() {
        let backend = seeded_backend().await;
        let holding = HoldingBackend::new(backend.clone());
        let registry = Arc::new(GiftRegistry::new(holding.clone()));
        registry.fetch_all().await;

        backend.fail_next(Operation::Update, BackendError::network("connection reset"));
        let mut held = holding.hold(Operation::Update);
        let reserve = tokio::spawn({
            let registry = registry.clone();
            async move { registry.reserve(1).await }
        });
        held.reached().await;
        assert!(registry.snapshot().gift(1).unwrap().is_taken);

        held.release();
        assert_eq!(
            reserve.await.unwrap(),
            ReserveOutcome::Failed(ErrorKind::Network)
        );
        assert!(!registry.snapshot().gift(1).unwrap().is_taken);
    }

    // ============================================================
    // Teardown while a call is awaiting
    // ============================================================

    #[tokio::test]
    async fn test_teardown_during_reserve_leaves_state_alone() {
        let backend = seeded_backend().await;
        let holding = HoldingBackend::new(backend.clone());
        let state = AppState::new(holding.clone());
        let mut listener = state.mount().await;

        backend.fail_next(Operation::Update, BackendError::network("connection reset"));
        let mut held = holding.hold(Operation::Update);
        let reserve = tokio::spawn({
            let gifts = state.gifts.clone();
            async move { gifts.reserve(1).await }
        });
        held.reached().await;

        listener.teardown().await;
        let before = state.gifts.snapshot();
        held.release();

        assert_eq!(reserve.await.unwrap(), ReserveOutcome::Detached);
        assert_eq!(state.gifts.snapshot(), before, "No revert after teardown");
        assert_eq!(before.error, None);
    }

    #[tokio::test]
    async fn test_teardown_during_submit_leaves_state_alone() {
        let backend = seeded_backend().await;
        let holding = HoldingBackend::new(backend.clone());
        let state = AppState::new(holding.clone());
        let mut listener = state.mount().await;

        let mut held = holding.hold(Operation::Insert);
        let submit = tokio::spawn({
            let rsvp = state.rsvp.clone();
            async move { rsvp.submit("Jane", "attending", None).await }
        });
        held.reached().await;
        assert!(state.rsvp.snapshot().submitting);

        listener.teardown().await;
        let before = state.rsvp.snapshot();
        let selects = backend.calls(Operation::Select);
        held.release();

        assert_eq!(submit.await.unwrap(), SubmitOutcome::Detached);
        let after = state.rsvp.snapshot();
        assert_eq!(after, before);
        assert_eq!(after.notice, None);
        assert!(after.submitting, "The success path never ran");
        assert_eq!(backend.calls(Operation::Select), selects, "No refetch after teardown");
        // the insert itself did reach the backend
        assert_eq!(backend.rows(Table::Confirmations).await.len(), 1);
    }
}
