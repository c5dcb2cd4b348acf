use std::sync::Arc;

use tracing::{instrument, warn};
use uuid::Uuid;

use crate::error::{AttendanceError, Result, StoreError};
use crate::models::{AssignmentDraft, NewSignup, SignupPatch};
use crate::realtime::Notifier;
use crate::store::AttendanceStore;

/// What to do when the counter call fails after its row mutation committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterPolicy {
    /// Report `RpcFailure` to the caller. Used by the manual check-in toggle.
    Surface,
    /// Log and report success. Used by the assignment editing paths.
    LogAndContinue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Adjustment {
    Increment,
    Decrement,
}

#[derive(Debug, PartialEq)]
pub(crate) enum ArrivalWrite {
    Synced,
    CounterFailed(StoreError),
}

/// Keeps `Position.filled` following assignment and arrival changes.
///
/// Each operation writes the signup row first and then issues one counter
/// call per affected position. The two steps are not atomic: a counter
/// failure is logged and never rolled back or retried.
pub struct AttendanceEngine<S: ?Sized> {
    store: Arc<S>,
    notifier: Notifier,
}

impl<S: ?Sized> Clone for AttendanceEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            notifier: self.notifier.clone(),
        }
    }
}

impl<S> AttendanceEngine<S>
where
    S: AttendanceStore + ?Sized,
{
    pub fn new(store: Arc<S>, notifier: Notifier) -> Self {
        Self { store, notifier }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Manual check-in/out. A failed counter call is reported as `RpcFailure`,
    /// though the row keeps its new value.
    pub async fn set_arrival(&self, signup_id: Uuid, arrived: bool, position_id: Uuid) -> Result<()> {
        self.set_arrival_with(signup_id, arrived, position_id, CounterPolicy::Surface)
            .await
    }

    #[instrument(skip(self))]
    pub async fn set_arrival_with(
        &self,
        signup_id: Uuid,
        arrived: bool,
        position_id: Uuid,
        policy: CounterPolicy,
    ) -> Result<()> {
        let write = self.write_arrival(signup_id, arrived, position_id).await?;
        self.notifier.position_changed(position_id);

        match (write, policy) {
            (ArrivalWrite::CounterFailed(source), CounterPolicy::Surface) => {
                Err(AttendanceError::RpcFailure {
                    position_id,
                    source,
                })
            }
            _ => Ok(()),
        }
    }

    /// Row write then counter call, without publishing anything. The counter
    /// direction follows the requested value, not the row's previous value.
    pub(crate) async fn write_arrival(
        &self,
        signup_id: Uuid,
        arrived: bool,
        position_id: Uuid,
    ) -> std::result::Result<ArrivalWrite, StoreError> {
        self.store.update_signup_arrival(signup_id, arrived).await?;

        let adjustment = if arrived {
            Adjustment::Increment
        } else {
            Adjustment::Decrement
        };
        Ok(match self.adjust(position_id, adjustment).await {
            Some(err) => ArrivalWrite::CounterFailed(err),
            None => ArrivalWrite::Synced,
        })
    }

    /// Inserts a signup with `arrived=false` and counts it as filled right away.
    #[instrument(skip(self, draft), fields(position_id = ?draft.position_id))]
    pub async fn create_assignment(&self, draft: &AssignmentDraft) -> Result<Uuid> {
        let signup = validate_assignment(draft)?;
        let signup_id = self.store.insert_signup(&signup).await?;
        self.adjust(signup.position_id, Adjustment::Increment).await;
        self.notifier.position_changed(signup.position_id);
        Ok(signup_id)
    }

    /// Moves counts from the old position to the new one when they differ,
    /// then updates the row. Counter failures never block the row update.
    #[instrument(skip(self, patch))]
    pub async fn move_assignment(
        &self,
        signup_id: Uuid,
        old_position_id: Uuid,
        new_position_id: Uuid,
        patch: &SignupPatch,
    ) -> Result<()> {
        let mut patch = patch.clone();
        // The row always lands on `new_position_id`, the position the counters follow.
        patch.position_id = Some(new_position_id);
        let moved = old_position_id != new_position_id;
        if moved {
            self.adjust(old_position_id, Adjustment::Decrement).await;
            self.adjust(new_position_id, Adjustment::Increment).await;
        }

        self.store.update_signup(signup_id, &patch).await?;

        self.notifier.position_changed(new_position_id);
        if moved {
            self.notifier.position_changed(old_position_id);
        }
        Ok(())
    }

    /// Deletes the signup and decrements whether or not it had arrived.
    #[instrument(skip(self))]
    pub async fn delete_assignment(&self, signup_id: Uuid, position_id: Uuid) -> Result<()> {
        self.store.delete_signup(signup_id).await?;
        self.adjust(position_id, Adjustment::Decrement).await;
        self.notifier.position_changed(position_id);
        Ok(())
    }

    async fn adjust(&self, position_id: Uuid, adjustment: Adjustment) -> Option<StoreError> {
        let result = match adjustment {
            Adjustment::Increment => self.store.increment_filled_count(position_id).await,
            Adjustment::Decrement => self.store.decrement_filled_count(position_id).await,
        };
        match result {
            Ok(()) => None,
            Err(err) => {
                warn!(%position_id, ?adjustment, error = %err, "filled counter update failed");
                Some(err)
            }
        }
    }
}

fn required(value: &Option<String>, field: &'static str) -> Result<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or(AttendanceError::Validation { field })
}

fn optional(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Checks required assignment fields in form order.
pub fn validate_assignment(draft: &AssignmentDraft) -> Result<NewSignup> {
    let position_id = draft
        .position_id
        .ok_or(AttendanceError::Validation { field: "position_id" })?;
    let volunteer_name = required(&draft.volunteer_name, "volunteer_name")?;
    let phone_number = required(&draft.phone_number, "phone_number")?;
    let start_time = draft
        .start_time
        .ok_or(AttendanceError::Validation { field: "start_time" })?;
    let end_time = draft
        .end_time
        .ok_or(AttendanceError::Validation { field: "end_time" })?;

    Ok(NewSignup {
        position_id,
        volunteer_name,
        phone_number,
        start_time,
        end_time,
        organization: optional(&draft.organization),
        other_notes: optional(&draft.other_notes),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::realtime::DashboardEvent;
    use chrono::{NaiveDate, NaiveDateTime};
    use proptest::prelude::*;

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 19)
            .and_then(|date| date.and_hms_opt(hour, minute, 0))
            .unwrap()
    }

    fn draft(position_id: Uuid, name: &str) -> AssignmentDraft {
        AssignmentDraft {
            position_id: Some(position_id),
            volunteer_name: Some(name.to_string()),
            phone_number: Some("555-0100".to_string()),
            start_time: Some(at(9, 0)),
            end_time: Some(at(12, 0)),
            organization: Some("  ".to_string()),
            other_notes: None,
        }
    }

    fn engine() -> (AttendanceEngine<MemoryStore>, MemoryStore) {
        let store = MemoryStore::new();
        let engine = AttendanceEngine::new(Arc::new(store.clone()), Notifier::default());
        (engine, store)
    }

    #[tokio::test]
    async fn filled_follows_counter_calls_through_a_shift() {
        let (engine, store) = engine();
        let position = store.add_position(Uuid::new_v4(), "Registration", 2).unwrap();

        let a = engine.create_assignment(&draft(position.id, "Avery Lee")).await.unwrap();
        assert_eq!(store.filled(position.id).unwrap(), 1);

        let b = engine.create_assignment(&draft(position.id, "Jules Moreno")).await.unwrap();
        assert_eq!(store.filled(position.id).unwrap(), 2);

        engine.set_arrival(a, true, position.id).await.unwrap();
        assert_eq!(store.filled(position.id).unwrap(), 3);

        engine.set_arrival(a, false, position.id).await.unwrap();
        assert_eq!(store.filled(position.id).unwrap(), 2);

        engine.delete_assignment(b, position.id).await.unwrap();
        assert_eq!(store.filled(position.id).unwrap(), 1);
        assert!(store.fetch_signup(b).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn concurrent_check_ins_double_count() {
        let (engine, store) = engine();
        let position = store.add_position(Uuid::new_v4(), "Gate", 1).unwrap();
        let signup = engine.create_assignment(&draft(position.id, "Kiara Patel")).await.unwrap();

        let first = engine.clone();
        let second = engine.clone();
        let (left, right) = tokio::join!(
            first.set_arrival(signup, true, position.id),
            second.set_arrival(signup, true, position.id),
        );
        left.unwrap();
        right.unwrap();

        assert!(store.fetch_signup(signup).await.unwrap().unwrap().arrived);
        assert_eq!(store.filled(position.id).unwrap(), 3);
    }

    #[tokio::test]
    async fn manual_toggle_surfaces_counter_failure_without_rollback() {
        let (engine, store) = engine();
        let position = store.add_position(Uuid::new_v4(), "Gate", 1).unwrap();
        let signup = engine.create_assignment(&draft(position.id, "Avery Lee")).await.unwrap();
        store.fail_counter_calls(position.id, true).unwrap();

        let err = engine.set_arrival(signup, true, position.id).await.unwrap_err();
        assert!(matches!(err, AttendanceError::RpcFailure { position_id, .. } if position_id == position.id));
        assert!(store.fetch_signup(signup).await.unwrap().unwrap().arrived);
        assert_eq!(store.filled(position.id).unwrap(), 1);

        engine
            .set_arrival_with(signup, false, position.id, CounterPolicy::LogAndContinue)
            .await
            .unwrap();
        assert!(!store.fetch_signup(signup).await.unwrap().unwrap().arrived);
    }

    #[tokio::test]
    async fn row_failure_aborts_before_counter() {
        let (engine, store) = engine();
        let position = store.add_position(Uuid::new_v4(), "Gate", 1).unwrap();
        let signup = engine.create_assignment(&draft(position.id, "Avery Lee")).await.unwrap();
        store.fail_arrival_updates(signup, true).unwrap();

        let err = engine.set_arrival(signup, true, position.id).await.unwrap_err();
        assert!(matches!(err, AttendanceError::Store(_)));
        assert_eq!(store.filled(position.id).unwrap(), 1);
    }

    #[tokio::test]
    async fn unknown_signup_is_not_found() {
        let (engine, store) = engine();
        let position = store.add_position(Uuid::new_v4(), "Gate", 1).unwrap();
        let missing = Uuid::new_v4();

        let err = engine.set_arrival(missing, true, position.id).await.unwrap_err();
        assert_eq!(
            err,
            AttendanceError::NotFound {
                entity: "signup",
                id: missing
            }
        );
    }

    #[tokio::test]
    async fn create_swallows_counter_failure() {
        let (engine, store) = engine();
        let position = store.add_position(Uuid::new_v4(), "Gate", 1).unwrap();
        store.fail_counter_calls(position.id, true).unwrap();

        let signup = engine.create_assignment(&draft(position.id, "Avery Lee")).await.unwrap();
        let row = store.fetch_signup(signup).await.unwrap().unwrap();
        assert!(!row.arrived);
        assert_eq!(row.organization, None);
        assert_eq!(store.filled(position.id).unwrap(), 0);
    }

    #[tokio::test]
    async fn validation_fails_before_any_mutation() {
        let (engine, store) = engine();
        let position = store.add_position(Uuid::new_v4(), "Gate", 1).unwrap();

        let mut missing_phone = draft(position.id, "Avery Lee");
        missing_phone.phone_number = Some("   ".to_string());
        let err = engine.create_assignment(&missing_phone).await.unwrap_err();
        assert_eq!(err, AttendanceError::Validation { field: "phone_number" });

        let mut missing_end = draft(position.id, "Avery Lee");
        missing_end.end_time = None;
        let err = engine.create_assignment(&missing_end).await.unwrap_err();
        assert_eq!(err, AttendanceError::Validation { field: "end_time" });

        let err = engine
            .create_assignment(&AssignmentDraft::default())
            .await
            .unwrap_err();
        assert_eq!(err, AttendanceError::Validation { field: "position_id" });

        assert_eq!(store.filled(position.id).unwrap(), 0);
        assert!(store.fetch_position_signups(position.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_decrements_even_when_not_arrived() {
        let (engine, store) = engine();
        let position = store.add_position(Uuid::new_v4(), "Gate", 3).unwrap();
        let a = engine.create_assignment(&draft(position.id, "Avery Lee")).await.unwrap();
        engine.create_assignment(&draft(position.id, "Jules Moreno")).await.unwrap();

        engine.delete_assignment(a, position.id).await.unwrap();
        assert_eq!(store.filled(position.id).unwrap(), 1);
    }

    #[tokio::test]
    async fn move_shifts_count_and_row() {
        let (engine, store) = engine();
        let event_id = Uuid::new_v4();
        let from = store.add_position(event_id, "Registration", 2).unwrap();
        let to = store.add_position(event_id, "Water Station", 2).unwrap();
        let signup = engine.create_assignment(&draft(from.id, "Avery Lee")).await.unwrap();

        let patch = SignupPatch {
            phone_number: Some("555-0199".to_string()),
            ..SignupPatch::default()
        };
        engine.move_assignment(signup, from.id, to.id, &patch).await.unwrap();

        let row = store.fetch_signup(signup).await.unwrap().unwrap();
        assert_eq!(row.position_id, to.id);
        assert_eq!(row.phone_number, "555-0199");
        assert_eq!(store.filled(from.id).unwrap(), 0);
        assert_eq!(store.filled(to.id).unwrap(), 1);
    }

    #[tokio::test]
    async fn move_updates_row_despite_counter_failure() {
        let (engine, store) = engine();
        let event_id = Uuid::new_v4();
        let from = store.add_position(event_id, "Registration", 2).unwrap();
        let to = store.add_position(event_id, "Water Station", 2).unwrap();
        let signup = engine.create_assignment(&draft(from.id, "Avery Lee")).await.unwrap();
        store.fail_counter_calls(from.id, true).unwrap();

        engine
            .move_assignment(signup, from.id, to.id, &SignupPatch::default())
            .await
            .unwrap();

        assert_eq!(store.fetch_signup(signup).await.unwrap().unwrap().position_id, to.id);
        assert_eq!(store.filled(from.id).unwrap(), 1);
        assert_eq!(store.filled(to.id).unwrap(), 1);
    }

    #[tokio::test]
    async fn edit_in_place_leaves_counts_alone() {
        let (engine, store) = engine();
        let position = store.add_position(Uuid::new_v4(), "Gate", 2).unwrap();
        let signup = engine.create_assignment(&draft(position.id, "Avery Lee")).await.unwrap();

        let patch = SignupPatch {
            volunteer_name: Some("Avery Lee-Ortiz".to_string()),
            ..SignupPatch::default()
        };
        engine
            .move_assignment(signup, position.id, position.id, &patch)
            .await
            .unwrap();

        assert_eq!(store.filled(position.id).unwrap(), 1);
        assert_eq!(
            store.fetch_signup(signup).await.unwrap().unwrap().volunteer_name,
            "Avery Lee-Ortiz"
        );
    }

    #[tokio::test]
    async fn edit_in_place_ignores_a_stray_patch_position() {
        let (engine, store) = engine();
        let event_id = Uuid::new_v4();
        let position = store.add_position(event_id, "Gate", 2).unwrap();
        let other = store.add_position(event_id, "Parking", 2).unwrap();
        let signup = engine.create_assignment(&draft(position.id, "Avery Lee")).await.unwrap();

        let patch = SignupPatch {
            position_id: Some(other.id),
            ..SignupPatch::default()
        };
        engine
            .move_assignment(signup, position.id, position.id, &patch)
            .await
            .unwrap();

        let row = store.fetch_signup(signup).await.unwrap().unwrap();
        assert_eq!(row.position_id, position.id);
        assert_eq!(store.filled(position.id).unwrap(), 1);
        assert_eq!(store.filled(other.id).unwrap(), 0);
    }

    #[tokio::test]
    async fn arrival_change_invalidates_position_views() {
        let (engine, store) = engine();
        let position = store.add_position(Uuid::new_v4(), "Gate", 1).unwrap();
        let signup = engine.create_assignment(&draft(position.id, "Avery Lee")).await.unwrap();

        let mut events = engine.notifier().subscribe();
        engine.set_arrival(signup, true, position.id).await.unwrap();

        assert_eq!(
            events.recv().await.unwrap(),
            DashboardEvent::PositionChanged { position_id: position.id }
        );
        assert_eq!(
            events.recv().await.unwrap(),
            DashboardEvent::VolunteersChanged { position_id: position.id }
        );
    }

    #[derive(Debug, Clone)]
    enum Op {
        Assign,
        Unassign(usize),
        Toggle(usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            Just(Op::Assign),
            (0usize..8).prop_map(Op::Unassign),
            (0usize..8).prop_map(Op::Toggle),
        ]
    }

    proptest! {
        #[test]
        fn filled_tracks_counter_calls(ops in proptest::collection::vec(op(), 0..40)) {
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let (engine, store) = engine();
            let position = store.add_position(Uuid::new_v4(), "Parking", 2).unwrap();
            let mut signups: Vec<(Uuid, bool)> = Vec::new();
            let mut expected: i32 = 0;

            for op in ops {
                runtime.block_on(async {
                    match op {
                        Op::Assign => {
                            let id = engine.create_assignment(&draft(position.id, "Avery Lee")).await.unwrap();
                            signups.push((id, false));
                            expected += 1;
                        }
                        Op::Unassign(index) if !signups.is_empty() => {
                            let (id, _) = signups.remove(index % signups.len());
                            engine.delete_assignment(id, position.id).await.unwrap();
                            expected = (expected - 1).max(0);
                        }
                        Op::Toggle(index) if !signups.is_empty() => {
                            let slot = index % signups.len();
                            let (id, arrived) = signups[slot];
                            engine.set_arrival(id, !arrived, position.id).await.unwrap();
                            signups[slot].1 = !arrived;
                            expected = if arrived { (expected - 1).max(0) } else { expected + 1 };
                        }
                        _ => {}
                    }
                });
                prop_assert_eq!(store.filled(position.id).unwrap(), expected);
            }
        }
    }
}
