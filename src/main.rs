use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use clap::{ArgGroup, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use volunteer_checkin::checkin::{self, CheckInView};
use volunteer_checkin::config::Config;
use volunteer_checkin::db::{self, PgStore, ReconcileMode};
use volunteer_checkin::engine::AttendanceEngine;
use volunteer_checkin::memory::MemoryStore;
use volunteer_checkin::models::{
    parse_shift_time, AssignmentDraft, MessageStatus, Signup, SignupPatch,
};
use volunteer_checkin::realtime::{self, DashboardEvent, Notifier, SignupFilter};
use volunteer_checkin::report;
use volunteer_checkin::store::AttendanceStore;
use volunteer_checkin::sweep::{self, CheckoutSweeper, SweepScope};

#[derive(Parser)]
#[command(name = "volunteer-checkin")]
#[command(about = "Volunteer event staffing and check-in tracker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load a sample event with positions and volunteers
    Seed,
    /// List events
    Events,
    /// Create an event
    CreateEvent {
        #[arg(long)]
        name: String,
        #[arg(long)]
        date: NaiveDate,
        #[arg(long, value_parser = parse_clock)]
        time: NaiveTime,
        #[arg(long)]
        location: String,
        #[arg(long)]
        map_url: Option<String>,
    },
    /// Add a staffing position to an event
    CreatePosition {
        #[arg(long)]
        event: Uuid,
        #[arg(long)]
        name: String,
        #[arg(long, default_value_t = 1)]
        needed: i32,
        #[arg(long, default_value_t = 0.0)]
        latitude: f64,
        #[arg(long, default_value_t = 0.0)]
        longitude: f64,
    },
    /// Import assignments from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Assign a volunteer to a position
    Assign {
        #[arg(long)]
        position: Option<Uuid>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long, value_parser = parse_shift_time)]
        start: Option<NaiveDateTime>,
        #[arg(long, value_parser = parse_shift_time)]
        end: Option<NaiveDateTime>,
        #[arg(long)]
        organization: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Edit an assignment, optionally moving it to another position
    Reassign {
        #[arg(long)]
        signup: Uuid,
        #[arg(long)]
        to: Option<Uuid>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long, value_parser = parse_shift_time)]
        start: Option<NaiveDateTime>,
        #[arg(long, value_parser = parse_shift_time)]
        end: Option<NaiveDateTime>,
    },
    /// Remove an assignment
    Unassign {
        #[arg(long)]
        signup: Uuid,
    },
    /// Mark a volunteer as arrived
    CheckIn {
        #[arg(long)]
        signup: Uuid,
    },
    /// Mark a volunteer as gone
    CheckOut {
        #[arg(long)]
        signup: Uuid,
    },
    /// Print the check-in link to encode in a position's QR code
    QrLink {
        #[arg(long)]
        position: Uuid,
    },
    /// Check a volunteer in from a scanned check-in link
    QrCheckIn {
        #[arg(long)]
        url: String,
        #[arg(long)]
        signup: Uuid,
    },
    /// Check out volunteers whose shift has ended
    #[command(group(
        ArgGroup::new("scope")
            .args(["event", "position"])
            .required(true)
            .multiple(false)
    ))]
    Sweep {
        #[arg(long)]
        event: Option<Uuid>,
        #[arg(long)]
        position: Option<Uuid>,
        /// Run a single pass instead of sweeping on an interval
        #[arg(long)]
        once: bool,
    },
    /// Stream dashboard notifications for an event
    Watch {
        #[arg(long)]
        event: Uuid,
    },
    /// Generate a markdown staffing report
    Report {
        #[arg(long)]
        event: Uuid,
        #[arg(long, default_value = "staffing-report.md")]
        out: PathBuf,
    },
    /// Repair filled counters
    Reconcile {
        #[arg(long)]
        event: Option<Uuid>,
        #[arg(long, value_enum, default_value_t = ReconcileMode::Arrived)]
        mode: ReconcileMode,
    },
    /// Post a message to the operator dashboard
    PostMessage {
        #[arg(long)]
        event: Uuid,
        #[arg(long)]
        position: Uuid,
        #[arg(long)]
        title: String,
        #[arg(long)]
        content: String,
        #[arg(long)]
        volunteer: Option<Uuid>,
        #[arg(long)]
        phone: Option<String>,
    },
    /// List messages for an event
    Messages {
        #[arg(long)]
        event: Uuid,
        #[arg(long)]
        status: Option<MessageStatus>,
    },
    /// Change a message's status
    SetMessageStatus {
        #[arg(long)]
        id: Uuid,
        #[arg(long)]
        status: MessageStatus,
    },
    /// Walk through a shift against an in-memory store
    Demo,
}

fn parse_clock(value: &str) -> Result<NaiveTime, chrono::ParseError> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "volunteer_checkin=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

async fn connect(config: &Config) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(config.database_url()?)
        .await
        .context("failed to connect to Postgres")
}

async fn load_signup(engine: &AttendanceEngine<PgStore>, signup_id: Uuid) -> anyhow::Result<Signup> {
    engine
        .store()
        .fetch_signup(signup_id)
        .await?
        .with_context(|| format!("signup {signup_id} not found"))
}

async fn set_arrival(
    engine: &AttendanceEngine<PgStore>,
    signup_id: Uuid,
    arrived: bool,
) -> anyhow::Result<()> {
    let current = load_signup(engine, signup_id).await?;
    let mut view = CheckInView::load(engine.store().as_ref(), current.position_id).await?;
    view.set(engine, signup_id, arrived).await?;
    println!(
        "{} is now {}. {}: {} arrived, filled {} of {}.",
        current.volunteer_name,
        if arrived { "checked in" } else { "checked out" },
        view.position.name,
        view.arrived_count(),
        view.position.filled,
        view.position.needed
    );
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    if let Commands::Demo = cli.command {
        return run_demo().await;
    }

    let pool = connect(&config).await?;
    let notifier = Notifier::default();
    let engine = AttendanceEngine::new(Arc::new(PgStore::new(pool.clone())), notifier.clone());

    match cli.command {
        Commands::Demo => {}
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let event_id = db::seed(&pool).await?;
            println!("Seed data inserted for event {event_id}.");
        }
        Commands::Events => {
            let events = db::fetch_events(&pool).await?;
            if events.is_empty() {
                println!("No events yet.");
            }
            for event in events {
                println!(
                    "- {} {} {} at {} ({})",
                    event.id,
                    event.date,
                    event.time.format("%H:%M"),
                    event.location,
                    event.name
                );
            }
        }
        Commands::CreateEvent {
            name,
            date,
            time,
            location,
            map_url,
        } => {
            let id = db::insert_event(&pool, &name, date, time, &location, map_url.as_deref()).await?;
            println!("Created event {id}.");
        }
        Commands::CreatePosition {
            event,
            name,
            needed,
            latitude,
            longitude,
        } => {
            let id = db::insert_position(&pool, event, &name, needed, latitude, longitude).await?;
            println!("Created position {id}.");
        }
        Commands::Import { csv } => {
            let summary = db::import_csv(&engine, &csv).await?;
            println!(
                "Imported {} assignments from {} ({} rejected).",
                summary.inserted,
                csv.display(),
                summary.rejected
            );
        }
        Commands::Assign {
            position,
            name,
            phone,
            start,
            end,
            organization,
            notes,
        } => {
            let draft = AssignmentDraft {
                position_id: position,
                volunteer_name: name,
                phone_number: phone,
                start_time: start,
                end_time: end,
                organization,
                other_notes: notes,
            };
            let id = engine.create_assignment(&draft).await?;
            println!("Assigned volunteer as signup {id}.");
        }
        Commands::Reassign {
            signup,
            to,
            name,
            phone,
            start,
            end,
        } => {
            let current = load_signup(&engine, signup).await?;
            let patch = SignupPatch {
                volunteer_name: name,
                phone_number: phone,
                start_time: start,
                end_time: end,
                ..SignupPatch::default()
            };
            let target = to.unwrap_or(current.position_id);
            engine
                .move_assignment(signup, current.position_id, target, &patch)
                .await?;
            println!("Updated signup {signup}.");
        }
        Commands::Unassign { signup } => {
            let current = load_signup(&engine, signup).await?;
            engine.delete_assignment(signup, current.position_id).await?;
            println!("Removed {} from the position.", current.volunteer_name);
        }
        Commands::CheckIn { signup } => set_arrival(&engine, signup, true).await?,
        Commands::CheckOut { signup } => set_arrival(&engine, signup, false).await?,
        Commands::QrLink { position } => {
            println!("{}", checkin::check_in_url(&config.check_in_base_url, position));
        }
        Commands::QrCheckIn { url, signup } => {
            let view = checkin::qr_check_in(&engine, &url, signup).await?;
            println!(
                "Checked in at {}: {} arrived, filled {} of {}.",
                view.position.name,
                view.arrived_count(),
                view.position.filled,
                view.position.needed
            );
        }
        Commands::Sweep {
            event,
            position,
            once,
        } => {
            let scope = match (event, position) {
                (Some(event_id), _) => SweepScope::Event(event_id),
                (None, Some(position_id)) => SweepScope::Position(position_id),
                (None, None) => anyhow::bail!("pass --event or --position"),
            };

            if once {
                let volunteers = scope.load(engine.store().as_ref()).await?;
                let mut sweeper = CheckoutSweeper::new(config.sweep);
                let summary = sweeper
                    .run(&engine, &volunteers, &Local::now().naive_local())
                    .await;
                println!(
                    "Checked out {} volunteers ({} counter failures, {} update failures).",
                    summary.checked_out, summary.counter_failures, summary.update_failures
                );
            } else {
                let task = sweep::spawn_sweep_loop(engine.clone(), scope, config.sweep);
                info!(?scope, interval = ?config.sweep.interval, "auto checkout running");
                tokio::signal::ctrl_c().await?;
                task.shutdown().await;
            }
        }
        Commands::Watch { event } => {
            let mut events = notifier.subscribe();
            let listener =
                realtime::listen_signup_inserts(&pool, notifier.clone(), SignupFilter::Event(event))
                    .await?;
            let monitor = realtime::spawn_staffing_monitor(
                Arc::clone(engine.store()),
                event,
                notifier.clone(),
                config.staffing_check_interval,
            );

            loop {
                tokio::select! {
                    received = events.recv() => match received {
                        Ok(event) => print_dashboard_event(&event),
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                            println!("(skipped {skipped} notifications)");
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    },
                    _ = tokio::signal::ctrl_c() => break,
                }
            }

            monitor.shutdown().await;
            listener.shutdown().await;
        }
        Commands::Report { event, out } => {
            let details = db::fetch_event(&pool, event)
                .await?
                .with_context(|| format!("event {event} not found"))?;
            let staffing = db::fetch_staffing(&pool, event).await?;
            let messages = db::fetch_messages(&pool, event, None).await?;
            let report = report::build_report(&details, &staffing, &messages);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Reconcile { event, mode } => {
            let touched = db::reconcile(&pool, event, mode).await?;
            println!("Reconciled {touched} positions.");
        }
        Commands::PostMessage {
            event,
            position,
            title,
            content,
            volunteer,
            phone,
        } => {
            let id = db::insert_message(
                &pool,
                event,
                position,
                &title,
                &content,
                volunteer,
                phone.as_deref(),
            )
            .await?;
            println!("Posted message {id}.");
        }
        Commands::Messages { event, status } => {
            let messages = db::fetch_messages(&pool, event, status).await?;
            if messages.is_empty() {
                println!("No messages found.");
            }
            for message in messages {
                println!(
                    "- {} [{}] {}: {}",
                    message.id, message.status, message.title, message.content
                );
            }
        }
        Commands::SetMessageStatus { id, status } => {
            if db::update_message_status(&pool, id, status).await? {
                println!("Message {id} is now {status}.");
            } else {
                anyhow::bail!("message {id} not found");
            }
        }
    }

    Ok(())
}

fn print_dashboard_event(event: &DashboardEvent) {
    match event {
        DashboardEvent::SignupInserted { signup, .. } => println!(
            "New signup: {} ({}) for position {}",
            signup.volunteer_name, signup.phone_number, signup.position_id
        ),
        DashboardEvent::Understaffed {
            position_name,
            needed,
            filled,
            ..
        } => println!("Understaffed: {position_name} has {filled} of {needed}"),
        DashboardEvent::PositionChanged { .. } | DashboardEvent::VolunteersChanged { .. } => {}
    }
}

async fn run_demo() -> anyhow::Result<()> {
    let store = MemoryStore::new();
    let engine = AttendanceEngine::new(Arc::new(store.clone()), Notifier::default());
    let position = store.add_position(Uuid::new_v4(), "Registration", 2)?;
    let start = parse_shift_time("2026-10-24 07:30")?;
    let end = parse_shift_time("2026-10-24 10:30")?;

    let draft = |name: &str, phone: &str| AssignmentDraft {
        position_id: Some(position.id),
        volunteer_name: Some(name.to_string()),
        phone_number: Some(phone.to_string()),
        start_time: Some(start),
        end_time: Some(end),
        ..AssignmentDraft::default()
    };

    println!("{} needs {}, filled {}.", position.name, position.needed, store.filled(position.id)?);
    let avery = engine.create_assignment(&draft("Avery Lee", "555-0100")).await?;
    println!("Assigned Avery: filled {}.", store.filled(position.id)?);
    let jules = engine.create_assignment(&draft("Jules Moreno", "555-0101")).await?;
    println!("Assigned Jules: filled {}.", store.filled(position.id)?);
    engine.set_arrival(avery, true, position.id).await?;
    println!("Avery checked in: filled {}.", store.filled(position.id)?);

    let mut sweeper = CheckoutSweeper::new(Default::default());
    let volunteers = store.fetch_position_signups(position.id).await?;
    let summary = sweeper
        .run(&engine, &volunteers, &parse_shift_time("2026-10-24 10:40")?)
        .await;
    println!(
        "Auto checkout at 10:40 checked out {}: filled {}.",
        summary.checked_out,
        store.filled(position.id)?
    );

    engine.delete_assignment(jules, position.id).await?;
    println!("Removed Jules: filled {}.", store.filled(position.id)?);
    Ok(())
}
