use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::engine::AttendanceEngine;
use crate::error::{AttendanceError, Result};
use crate::models::{Position, Signup};
use crate::store::AttendanceStore;

pub const CHECK_IN_PATH: &str = "/check-in";

#[derive(Debug, Serialize, Deserialize)]
struct CheckInQuery {
    position: Option<String>,
}

/// Link encoded into a position's QR code. The id is a bare identifier with
/// no signature or expiry.
pub fn check_in_url(base_url: &str, position_id: Uuid) -> String {
    let query = serde_urlencoded::to_string(CheckInQuery {
        position: Some(position_id.to_string()),
    })
    .unwrap_or_else(|_| format!("position={position_id}"));
    format!("{}{CHECK_IN_PATH}?{query}", base_url.trim_end_matches('/'))
}

/// Extracts the position id from a scanned check-in link.
pub fn parse_check_in_url(url: &str) -> Result<Uuid> {
    let query = url
        .split_once('?')
        .map(|(_, query)| query)
        .unwrap_or_default();
    let query = query.split('#').next().unwrap_or_default();

    let parsed: CheckInQuery = serde_urlencoded::from_str(query)
        .map_err(|_| AttendanceError::Validation { field: "position" })?;
    parsed
        .position
        .as_deref()
        .map(str::trim)
        .and_then(|value| Uuid::parse_str(value).ok())
        .ok_or(AttendanceError::Validation { field: "position" })
}

/// Check-in page state for a single position.
#[derive(Debug, Clone)]
pub struct CheckInView {
    pub position: Position,
    pub volunteers: Vec<Signup>,
}

impl CheckInView {
    pub async fn load<S>(store: &S, position_id: Uuid) -> Result<Self>
    where
        S: AttendanceStore + ?Sized,
    {
        let position = store
            .fetch_position(position_id)
            .await?
            .ok_or(AttendanceError::NotFound {
                entity: "position",
                id: position_id,
            })?;
        let volunteers = store.fetch_position_signups(position_id).await?;
        Ok(Self {
            position,
            volunteers,
        })
    }

    pub fn arrived_count(&self) -> usize {
        self.volunteers.iter().filter(|signup| signup.arrived).count()
    }

    fn find(&self, signup_id: Uuid) -> Result<&Signup> {
        self.volunteers
            .iter()
            .find(|signup| signup.id == signup_id)
            .ok_or(AttendanceError::NotFound {
                entity: "signup",
                id: signup_id,
            })
    }

    /// Flips the volunteer's arrival from what this view last loaded, then
    /// reloads. Counter failures are reported to the caller.
    pub async fn toggle<S>(&mut self, engine: &AttendanceEngine<S>, signup_id: Uuid) -> Result<bool>
    where
        S: AttendanceStore + ?Sized,
    {
        let arrived = !self.find(signup_id)?.arrived;
        self.set(engine, signup_id, arrived).await?;
        Ok(arrived)
    }

    pub async fn set<S>(
        &mut self,
        engine: &AttendanceEngine<S>,
        signup_id: Uuid,
        arrived: bool,
    ) -> Result<()>
    where
        S: AttendanceStore + ?Sized,
    {
        self.find(signup_id)?;
        let result = engine
            .set_arrival(signup_id, arrived, self.position.id)
            .await;
        match Self::load(engine.store().as_ref(), self.position.id).await {
            Ok(view) => *self = view,
            Err(err) => {
                warn!(position_id = %self.position.id, error = %err, "check-in view reload failed");
            }
        }
        result
    }
}

/// Checks a volunteer in from a scanned link. The volunteer must be assigned
/// to the position the link names.
pub async fn qr_check_in<S>(
    engine: &AttendanceEngine<S>,
    url: &str,
    signup_id: Uuid,
) -> Result<CheckInView>
where
    S: AttendanceStore + ?Sized,
{
    let position_id = parse_check_in_url(url)?;
    let mut view = CheckInView::load(engine.store().as_ref(), position_id).await?;
    view.set(engine, signup_id, true).await?;
    Ok(view)
}
