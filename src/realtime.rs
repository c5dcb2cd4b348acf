use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::Signup;
use crate::store::{AttendanceStore, StoreResult};

pub const SIGNUP_INSERTED_CHANNEL: &str = "signup_inserted";

#[derive(Debug, Clone, PartialEq)]
pub enum DashboardEvent {
    SignupInserted {
        signup: Signup,
        event_id: Option<Uuid>,
    },
    /// Cached position rows for this id are stale.
    PositionChanged { position_id: Uuid },
    /// Cached volunteer list for this position is stale.
    VolunteersChanged { position_id: Uuid },
    Understaffed {
        position_id: Uuid,
        position_name: String,
        needed: i32,
        filled: i32,
    },
}

/// Fan-out channel for dashboard subscribers.
#[derive(Debug, Clone)]
pub struct Notifier {
    sender: broadcast::Sender<DashboardEvent>,
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DashboardEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: DashboardEvent) {
        if self.sender.send(event).is_err() {
            debug!("no dashboard subscribers, event dropped");
        }
    }

    pub fn position_changed(&self, position_id: Uuid) {
        self.publish(DashboardEvent::PositionChanged { position_id });
        self.publish(DashboardEvent::VolunteersChanged { position_id });
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Handle for a background task with explicit teardown.
#[derive(Debug)]
pub struct TaskHandle {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl TaskHandle {
    fn spawn<F, Fut>(body: F) -> Self
    where
        F: FnOnce(watch::Receiver<bool>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (shutdown, receiver) = watch::channel(false);
        let handle = tokio::spawn(body(receiver));
        Self { shutdown, handle }
    }

    /// Runs `tick` every `every`, starting immediately, until shut down.
    pub fn spawn_interval<F, Fut>(every: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::spawn(move |mut shutdown| async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = interval.tick() => tick().await,
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
        })
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(err) = self.handle.await {
            warn!(error = %err, "background task ended abnormally");
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignupFilter {
    All,
    Position(Uuid),
    Event(Uuid),
}

impl SignupFilter {
    pub fn matches(&self, signup: &Signup, event_id: Option<Uuid>) -> bool {
        match self {
            SignupFilter::All => true,
            SignupFilter::Position(id) => signup.position_id == *id,
            SignupFilter::Event(id) => event_id == Some(*id),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SignupInsertPayload {
    signup: Signup,
    event_id: Option<Uuid>,
}

fn parse_insert_payload(payload: &str) -> serde_json::Result<(Signup, Option<Uuid>)> {
    let parsed: SignupInsertPayload = serde_json::from_str(payload)?;
    Ok((parsed.signup, parsed.event_id))
}

/// Bridges the database's signup insert notifications onto the notifier.
pub async fn listen_signup_inserts(
    pool: &PgPool,
    notifier: Notifier,
    filter: SignupFilter,
) -> anyhow::Result<TaskHandle> {
    let mut listener = PgListener::connect_with(pool).await?;
    listener.listen(SIGNUP_INSERTED_CHANNEL).await?;
    info!(channel = SIGNUP_INSERTED_CHANNEL, "listening for signup inserts");

    Ok(TaskHandle::spawn(move |mut shutdown| async move {
        loop {
            tokio::select! {
                received = listener.recv() => match received {
                    Ok(notification) => match parse_insert_payload(notification.payload()) {
                        Ok((signup, event_id)) if filter.matches(&signup, event_id) => {
                            notifier.publish(DashboardEvent::SignupInserted { signup, event_id });
                        }
                        Ok(_) => {}
                        Err(err) => warn!(error = %err, "malformed signup insert payload"),
                    },
                    Err(err) => {
                        warn!(error = %err, "signup insert listener failed");
                        break;
                    }
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }))
}

/// Publishes an `Understaffed` event for every position of the event below its
/// needed count. Returns how many were flagged.
pub async fn check_staffing<S>(store: &S, event_id: Uuid, notifier: &Notifier) -> StoreResult<usize>
where
    S: AttendanceStore + ?Sized,
{
    let positions = store.fetch_positions(event_id).await?;
    let mut flagged = 0;
    for position in positions.into_iter().filter(|position| position.is_understaffed()) {
        flagged += 1;
        notifier.publish(DashboardEvent::Understaffed {
            position_id: position.id,
            position_name: position.name,
            needed: position.needed,
            filled: position.filled,
        });
    }
    Ok(flagged)
}

pub fn spawn_staffing_monitor<S>(
    store: Arc<S>,
    event_id: Uuid,
    notifier: Notifier,
    every: Duration,
) -> TaskHandle
where
    S: AttendanceStore + ?Sized + 'static,
{
    TaskHandle::spawn_interval(every, move || {
        let store = Arc::clone(&store);
        let notifier = notifier.clone();
        async move {
            match check_staffing(store.as_ref(), event_id, &notifier).await {
                Ok(0) => debug!(%event_id, "all positions staffed"),
                Ok(flagged) => info!(%event_id, flagged, "understaffed positions"),
                Err(err) => warn!(%event_id, error = %err, "staffing check failed"),
            }
        }
    })
}
