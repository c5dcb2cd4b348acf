use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{NewSignup, Position, Signup, SignupPatch};

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Backend contract the attendance engine runs against.
///
/// Row mutations and counter calls are separate round trips. The two counter
/// calls are the only atomic primitives: an increment is unbounded, a
/// decrement is floored at zero.
#[async_trait]
pub trait AttendanceStore: Send + Sync {
    async fn update_signup_arrival(&self, signup_id: Uuid, arrived: bool) -> StoreResult<()>;

    async fn increment_filled_count(&self, position_id: Uuid) -> StoreResult<()>;

    async fn decrement_filled_count(&self, position_id: Uuid) -> StoreResult<()>;

    async fn insert_signup(&self, signup: &NewSignup) -> StoreResult<Uuid>;

    async fn delete_signup(&self, signup_id: Uuid) -> StoreResult<()>;

    async fn update_signup(&self, signup_id: Uuid, patch: &SignupPatch) -> StoreResult<()>;

    async fn fetch_position(&self, position_id: Uuid) -> StoreResult<Option<Position>>;

    async fn fetch_positions(&self, event_id: Uuid) -> StoreResult<Vec<Position>>;

    async fn fetch_signup(&self, signup_id: Uuid) -> StoreResult<Option<Signup>>;

    async fn fetch_position_signups(&self, position_id: Uuid) -> StoreResult<Vec<Signup>>;

    async fn fetch_event_signups(&self, event_id: Uuid) -> StoreResult<Vec<Signup>>;
}
