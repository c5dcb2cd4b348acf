use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{NewSignup, Position, Signup, SignupPatch};
use crate::store::{AttendanceStore, StoreResult};

#[derive(Debug, Default)]
struct Tables {
    positions: HashMap<Uuid, Position>,
    signups: HashMap<Uuid, Signup>,
}

#[derive(Debug, Default)]
struct Failures {
    counter_positions: HashSet<Uuid>,
    arrival_updates: HashSet<Uuid>,
    position_reads: HashSet<Uuid>,
}

/// Map-backed store with the same counter semantics as the Postgres functions.
///
/// Failures can be injected per position (counter calls, reads) or per signup
/// (arrival writes) to exercise partial-failure paths.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    failures: Arc<Mutex<Failures>>,
}

fn lock<T>(mutex: &Mutex<T>) -> StoreResult<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_position(&self, event_id: Uuid, name: &str, needed: i32) -> StoreResult<Position> {
        if needed < 1 {
            return Err(StoreError::Backend(format!(
                "position {name} needs at least one volunteer, got {needed}"
            )));
        }
        let position = Position {
            id: Uuid::new_v4(),
            event_id,
            name: name.to_string(),
            needed,
            filled: 0,
            latitude: 0.0,
            longitude: 0.0,
        };
        lock(&self.tables)?
            .positions
            .insert(position.id, position.clone());
        Ok(position)
    }

    pub fn filled(&self, position_id: Uuid) -> StoreResult<i32> {
        lock(&self.tables)?
            .positions
            .get(&position_id)
            .map(|position| position.filled)
            .ok_or(StoreError::NotFound {
                entity: "position",
                id: position_id,
            })
    }

    pub fn fail_counter_calls(&self, position_id: Uuid, fail: bool) -> StoreResult<()> {
        let mut failures = lock(&self.failures)?;
        if fail {
            failures.counter_positions.insert(position_id);
        } else {
            failures.counter_positions.remove(&position_id);
        }
        Ok(())
    }

    pub fn fail_arrival_updates(&self, signup_id: Uuid, fail: bool) -> StoreResult<()> {
        let mut failures = lock(&self.failures)?;
        if fail {
            failures.arrival_updates.insert(signup_id);
        } else {
            failures.arrival_updates.remove(&signup_id);
        }
        Ok(())
    }

    pub fn fail_position_reads(&self, position_id: Uuid, fail: bool) -> StoreResult<()> {
        let mut failures = lock(&self.failures)?;
        if fail {
            failures.position_reads.insert(position_id);
        } else {
            failures.position_reads.remove(&position_id);
        }
        Ok(())
    }

    fn check_read(&self, position_id: Uuid) -> StoreResult<()> {
        if lock(&self.failures)?.position_reads.contains(&position_id) {
            return Err(StoreError::Backend(format!(
                "read rejected for position {position_id}"
            )));
        }
        Ok(())
    }

    fn check_counter(&self, position_id: Uuid) -> StoreResult<()> {
        if lock(&self.failures)?.counter_positions.contains(&position_id) {
            return Err(StoreError::Backend(format!(
                "counter call rejected for position {position_id}"
            )));
        }
        Ok(())
    }

    fn adjust(&self, position_id: Uuid, delta: i32) -> StoreResult<()> {
        self.check_counter(position_id)?;
        let mut tables = lock(&self.tables)?;
        let position = tables
            .positions
            .get_mut(&position_id)
            .ok_or(StoreError::NotFound {
                entity: "position",
                id: position_id,
            })?;
        position.filled = (position.filled + delta).max(0);
        Ok(())
    }
}

#[async_trait]
impl AttendanceStore for MemoryStore {
    async fn update_signup_arrival(&self, signup_id: Uuid, arrived: bool) -> StoreResult<()> {
        if lock(&self.failures)?.arrival_updates.contains(&signup_id) {
            return Err(StoreError::Backend(format!(
                "arrival write rejected for signup {signup_id}"
            )));
        }
        let mut tables = lock(&self.tables)?;
        let signup = tables.signups.get_mut(&signup_id).ok_or(StoreError::NotFound {
            entity: "signup",
            id: signup_id,
        })?;
        signup.arrived = arrived;
        Ok(())
    }

    async fn increment_filled_count(&self, position_id: Uuid) -> StoreResult<()> {
        self.adjust(position_id, 1)
    }

    async fn decrement_filled_count(&self, position_id: Uuid) -> StoreResult<()> {
        self.adjust(position_id, -1)
    }

    async fn insert_signup(&self, signup: &NewSignup) -> StoreResult<Uuid> {
        let mut tables = lock(&self.tables)?;
        if !tables.positions.contains_key(&signup.position_id) {
            return Err(StoreError::NotFound {
                entity: "position",
                id: signup.position_id,
            });
        }
        let id = Uuid::new_v4();
        tables.signups.insert(
            id,
            Signup {
                id,
                position_id: signup.position_id,
                volunteer_name: signup.volunteer_name.clone(),
                phone_number: signup.phone_number.clone(),
                start_time: signup.start_time,
                end_time: signup.end_time,
                arrived: false,
                organization: signup.organization.clone(),
                other_notes: signup.other_notes.clone(),
            },
        );
        Ok(id)
    }

    async fn delete_signup(&self, signup_id: Uuid) -> StoreResult<()> {
        lock(&self.tables)?
            .signups
            .remove(&signup_id)
            .map(|_| ())
            .ok_or(StoreError::NotFound {
                entity: "signup",
                id: signup_id,
            })
    }

    async fn update_signup(&self, signup_id: Uuid, patch: &SignupPatch) -> StoreResult<()> {
        let mut tables = lock(&self.tables)?;
        if let Some(position_id) = patch.position_id {
            if !tables.positions.contains_key(&position_id) {
                return Err(StoreError::NotFound {
                    entity: "position",
                    id: position_id,
                });
            }
        }
        let signup = tables.signups.get_mut(&signup_id).ok_or(StoreError::NotFound {
            entity: "signup",
            id: signup_id,
        })?;
        patch.apply(signup);
        Ok(())
    }

    async fn fetch_position(&self, position_id: Uuid) -> StoreResult<Option<Position>> {
        self.check_read(position_id)?;
        Ok(lock(&self.tables)?.positions.get(&position_id).cloned())
    }

    async fn fetch_positions(&self, event_id: Uuid) -> StoreResult<Vec<Position>> {
        let mut positions: Vec<Position> = lock(&self.tables)?
            .positions
            .values()
            .filter(|position| position.event_id == event_id)
            .cloned()
            .collect();
        positions.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(positions)
    }

    async fn fetch_signup(&self, signup_id: Uuid) -> StoreResult<Option<Signup>> {
        Ok(lock(&self.tables)?.signups.get(&signup_id).cloned())
    }

    async fn fetch_position_signups(&self, position_id: Uuid) -> StoreResult<Vec<Signup>> {
        self.check_read(position_id)?;
        let mut signups: Vec<Signup> = lock(&self.tables)?
            .signups
            .values()
            .filter(|signup| signup.position_id == position_id)
            .cloned()
            .collect();
        signups.sort_by(|a, b| a.start_time.cmp(&b.start_time));
        Ok(signups)
    }

    async fn fetch_event_signups(&self, event_id: Uuid) -> StoreResult<Vec<Signup>> {
        let tables = lock(&self.tables)?;
        let mut signups: Vec<Signup> = tables
            .signups
            .values()
            .filter(|signup| {
                tables
                    .positions
                    .get(&signup.position_id)
                    .is_some_and(|position| position.event_id == event_id)
            })
            .cloned()
            .collect();
        signups.sort_by(|a, b| a.start_time.cmp(&b.start_time));
        Ok(signups)
    }
}
