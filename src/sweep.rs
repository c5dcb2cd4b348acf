use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use futures::future::join_all;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::engine::{ArrivalWrite, AttendanceEngine};
use crate::models::{minutes_of_day, CheckoutOutcome, CheckoutResult, Signup, SweepSummary};
use crate::realtime::TaskHandle;
use crate::store::{AttendanceStore, StoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepSettings {
    pub buffer_minutes: i64,
    pub max_late_window_minutes: i64,
    pub interval: Duration,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            buffer_minutes: 1,
            max_late_window_minutes: 30,
            interval: Duration::from_secs(60),
        }
    }
}

/// True when `now` falls inside `[end + buffer, end + buffer + max_late]`,
/// compared as minutes of day.
pub fn in_checkout_window(signup: &Signup, now: &NaiveDateTime, settings: &SweepSettings) -> bool {
    let elapsed = minutes_of_day(now) - (signup.end_minutes() + settings.buffer_minutes);
    (0..=settings.max_late_window_minutes).contains(&elapsed)
}

/// One auto checkout session.
///
/// Remembers which signups it already handled so a signup is checked out at
/// most once while it stays in the input. Ids that drop out of the input are
/// forgotten on the next pass.
#[derive(Debug)]
pub struct CheckoutSweeper {
    settings: SweepSettings,
    processed: HashSet<Uuid>,
}

impl CheckoutSweeper {
    pub fn new(settings: SweepSettings) -> Self {
        Self {
            settings,
            processed: HashSet::new(),
        }
    }

    pub fn is_processed(&self, signup_id: &Uuid) -> bool {
        self.processed.contains(signup_id)
    }

    /// Picks the signups due for checkout and marks them processed.
    pub fn select(&mut self, volunteers: &[Signup], now: &NaiveDateTime) -> Vec<Signup> {
        let present: HashSet<Uuid> = volunteers.iter().map(|signup| signup.id).collect();
        self.processed.retain(|id| present.contains(id));

        let mut selected = Vec::new();
        for signup in volunteers {
            if signup.arrived
                && !self.processed.contains(&signup.id)
                && in_checkout_window(signup, now, &self.settings)
            {
                self.processed.insert(signup.id);
                selected.push(signup.clone());
            }
        }
        selected
    }

    /// Checks out every due signup concurrently. Failed checkouts stay marked
    /// processed and are not retried in this session.
    pub async fn run<S>(
        &mut self,
        engine: &AttendanceEngine<S>,
        volunteers: &[Signup],
        now: &NaiveDateTime,
    ) -> SweepSummary
    where
        S: AttendanceStore + ?Sized,
    {
        let selected = self.select(volunteers, now);
        if selected.is_empty() {
            return SweepSummary::default();
        }

        let results = join_all(selected.iter().map(|signup| async move {
            let outcome = match engine
                .write_arrival(signup.id, false, signup.position_id)
                .await
            {
                Ok(ArrivalWrite::Synced) => CheckoutOutcome::CheckedOut,
                Ok(ArrivalWrite::CounterFailed(err)) => CheckoutOutcome::CounterFailed(err.to_string()),
                Err(err) => {
                    warn!(signup_id = %signup.id, error = %err, "auto checkout failed");
                    CheckoutOutcome::UpdateFailed(err.to_string())
                }
            };
            CheckoutResult {
                signup_id: signup.id,
                position_id: signup.position_id,
                outcome,
            }
        }))
        .await;

        let summary = SweepSummary::from_results(results);
        if summary.any_row_updated() {
            let touched: BTreeSet<Uuid> = summary
                .results
                .iter()
                .filter(|result| result.outcome.row_updated())
                .map(|result| result.position_id)
                .collect();
            for position_id in touched {
                engine.notifier().position_changed(position_id);
            }
        }

        info!(
            checked_out = summary.checked_out,
            counter_failures = summary.counter_failures,
            update_failures = summary.update_failures,
            "auto checkout sweep finished"
        );
        summary
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepScope {
    Event(Uuid),
    Position(Uuid),
}

impl SweepScope {
    pub async fn load<S>(&self, store: &S) -> StoreResult<Vec<Signup>>
    where
        S: AttendanceStore + ?Sized,
    {
        match self {
            SweepScope::Event(event_id) => store.fetch_event_signups(*event_id).await,
            SweepScope::Position(position_id) => store.fetch_position_signups(*position_id).await,
        }
    }
}

/// Runs the sweep on `settings.interval` against the scope, reloading its
/// signups every tick.
pub fn spawn_sweep_loop<S>(
    engine: AttendanceEngine<S>,
    scope: SweepScope,
    settings: SweepSettings,
) -> TaskHandle
where
    S: AttendanceStore + ?Sized + 'static,
{
    spawn_sweep_loop_with_clock(engine, scope, settings, || Local::now().naive_local())
}

pub fn spawn_sweep_loop_with_clock<S, C>(
    engine: AttendanceEngine<S>,
    scope: SweepScope,
    settings: SweepSettings,
    clock: C,
) -> TaskHandle
where
    S: AttendanceStore + ?Sized + 'static,
    C: Fn() -> NaiveDateTime + Send + Sync + 'static,
{
    let sweeper = Arc::new(Mutex::new(CheckoutSweeper::new(settings)));
    let clock = Arc::new(clock);

    TaskHandle::spawn_interval(settings.interval, move || {
        let engine = engine.clone();
        let sweeper = Arc::clone(&sweeper);
        let clock = Arc::clone(&clock);
        async move {
            let volunteers = match scope.load(engine.store().as_ref()).await {
                Ok(volunteers) => volunteers,
                Err(err) => {
                    warn!(?scope, error = %err, "could not load volunteers for auto checkout");
                    return;
                }
            };
            let now = clock();
            let summary = sweeper.lock().await.run(&engine, &volunteers, &now).await;
            if summary.is_empty() {
                debug!(?scope, "no volunteers due for auto checkout");
            }
        }
    })
}
