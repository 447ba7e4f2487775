use crate::components::document_store::{DocumentStoreActor, DocumentStoreHandle, RedisBackend};
use crate::components::events::import::{import_events, HttpCalendarSource};
use crate::components::events::models::{calendar_id_for, User};
use crate::components::events::time::resolve_timezone;
use crate::components::events::Events;
use crate::components::scheduler::{
    ChangeDirective, ChangeRequest, PlacementRequest, ReconcileOutcome, Scheduler,
};
use crate::components::ComponentManager;
use crate::config::Config;
use crate::error::{AppResult, Error};
use crate::shutdown;
use crate::utils::time::parse_time;
use chrono::{Duration, NaiveDate, Utc};
use std::sync::Arc;
use tokio::sync::{oneshot, RwLock};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Initialize logging with environment-based configuration
pub fn init_logging() -> miette::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| Error::Config(format!("Failed to set up logging: {}", e)))?;

    Ok(())
}

/// Load and initialize the application config
pub async fn load_config() -> miette::Result<Arc<RwLock<Config>>> {
    match Config::load() {
        Ok(config) => Ok(Arc::new(RwLock::new(config))),
        Err(e) => {
            error!("Failed to load configuration: {:?}", e);
            Err(e.into())
        }
    }
}

/// One invocation's worth of work
#[derive(Debug, Clone)]
pub enum CliCommand {
    /// Place new microtasks into a day
    Add {
        tasks: Vec<String>,
        date: Option<NaiveDate>,
        use_history: bool,
    },
    /// Move an event and reflow the day around it
    Move {
        title: String,
        new_start: String,
        new_end: String,
        date: Option<NaiveDate>,
    },
    /// Delete an event and reflow the day around the gap
    Delete {
        title: String,
        date: Option<NaiveDate>,
    },
    /// Import upcoming events from the configured calendar feed
    Import,
    /// Record how long a task actually took, in minutes
    Record { task: String, minutes: u32 },
}

/// Parse command-line arguments into a command
pub fn parse_args<I: Iterator<Item = String>>(mut args: I) -> miette::Result<CliCommand> {
    let usage = || {
        Error::Config(
            "Usage: microplan add [--history] [--date YYYY-MM-DD] <task>... | \
             move <title> <HH:MM> <HH:MM> [--date YYYY-MM-DD] | \
             delete <title> [--date YYYY-MM-DD] | import | record <task> <minutes>"
                .to_string(),
        )
    };

    let command = args.next().ok_or_else(usage)?;
    let rest: Vec<String> = args.collect();

    let parse_date = |rest: &[String]| -> miette::Result<Option<NaiveDate>> {
        if let Some(pos) = rest.iter().position(|arg| arg == "--date") {
            let value = rest
                .get(pos + 1)
                .ok_or_else(|| Error::Config("--date requires a value".to_string()))?;
            let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .map_err(|_| Error::Config(format!("Invalid date: {}", value)))?;
            Ok(Some(date))
        } else {
            Ok(None)
        }
    };

    match command.as_str() {
        "add" => {
            let date = parse_date(&rest)?;
            let use_history = rest.iter().any(|arg| arg == "--history");
            let mut tasks = Vec::new();
            let mut skip_next = false;
            for arg in &rest {
                if skip_next {
                    skip_next = false;
                    continue;
                }
                if arg == "--date" {
                    skip_next = true;
                    continue;
                }
                if arg == "--history" {
                    continue;
                }
                tasks.push(arg.clone());
            }
            if tasks.is_empty() {
                return Err(usage().into());
            }
            Ok(CliCommand::Add {
                tasks,
                date,
                use_history,
            })
        }
        "move" => {
            let date = parse_date(&rest)?;
            let positional: Vec<&String> = rest
                .iter()
                .take_while(|arg| !arg.starts_with("--"))
                .collect();
            let [title, new_start, new_end] = positional.as_slice() else {
                return Err(usage().into());
            };
            for time_str in [new_start, new_end] {
                if parse_time(time_str).is_none() {
                    return Err(Error::InvalidFormat(format!(
                        "Invalid time: {}",
                        time_str
                    ))
                    .into());
                }
            }
            Ok(CliCommand::Move {
                title: (*title).clone(),
                new_start: (*new_start).clone(),
                new_end: (*new_end).clone(),
                date,
            })
        }
        "delete" => {
            let date = parse_date(&rest)?;
            let title = rest
                .iter()
                .find(|arg| !arg.starts_with("--"))
                .ok_or_else(usage)?;
            Ok(CliCommand::Delete {
                title: title.clone(),
                date,
            })
        }
        "import" => Ok(CliCommand::Import),
        "record" => {
            let [task, minutes] = rest.as_slice() else {
                return Err(usage().into());
            };
            let minutes = minutes
                .parse::<u32>()
                .map_err(|_| Error::Config(format!("Invalid minute count: {}", minutes)))?;
            Ok(CliCommand::Record {
                task: task.clone(),
                minutes,
            })
        }
        _ => Err(usage().into()),
    }
}

/// Wire the actors and components, run the requested command, and shut
/// everything down again
pub async fn run(config: Arc<RwLock<Config>>, command: CliCommand) -> miette::Result<()> {
    let redis_url = {
        let config_read = config.read().await;
        config_read.redis_url.clone()
    };

    // Start the document store actor over Redis
    let backend = RedisBackend::connect(&redis_url).await?;
    let store_handle = DocumentStoreActor::spawn(Box::new(backend));

    // Register components
    let mut component_manager = ComponentManager::new(Arc::clone(&config));
    component_manager.register(Events::new());
    component_manager.register(Scheduler::new());
    let component_manager = Arc::new(component_manager);

    component_manager
        .init_all(Arc::clone(&config), store_handle.clone())
        .await?;

    ensure_user(&component_manager, &config).await?;

    // Create shutdown channel and spawn the signal handler task
    let (shutdown_send, shutdown_recv) = oneshot::channel();
    let signal_components = Arc::clone(&component_manager);
    let signal_store = store_handle.clone();
    tokio::spawn(async move {
        shutdown::handle_signals(shutdown_send, signal_components, signal_store).await;
    });

    // Run the command, bailing out early on a termination signal
    tokio::select! {
        result = execute(command, &component_manager, &config) => {
            component_manager.shutdown_all().await?;
            store_handle.shutdown().await?;
            result
        }
        _ = shutdown_recv => {
            info!("Received shutdown signal, exiting");
            Ok(())
        }
    }
}

/// Create the configured user record on first run so event creation can
/// resolve its owner
async fn ensure_user(
    component_manager: &ComponentManager,
    config: &Arc<RwLock<Config>>,
) -> AppResult<()> {
    let events = events_component(component_manager).await?;
    let config_read = config.read().await;

    if events.get_user(&config_read.user_id).await.is_ok() {
        return Ok(());
    }

    info!("Creating user record for {}", config_read.user_id);
    events
        .put_user(&User {
            id: config_read.user_id.clone(),
            name: config_read.user_id.clone(),
            wake_time: config_read.wake_time.clone(),
            sleep_time: config_read.sleep_time.clone(),
        })
        .await
}

async fn events_component(
    component_manager: &ComponentManager,
) -> AppResult<crate::components::EventStore> {
    component_manager
        .get_component_by_name("events")
        .and_then(|c| c.as_any().downcast_ref::<Events>())
        .ok_or_else(|| Error::Config("Events component not registered".to_string()))?
        .get_store()
        .await
        .ok_or_else(|| Error::Config("Events component not initialized".to_string()))
}

async fn execute(
    command: CliCommand,
    component_manager: &Arc<ComponentManager>,
    config: &Arc<RwLock<Config>>,
) -> miette::Result<()> {
    let today = {
        let config_read = config.read().await;
        let timezone = resolve_timezone(&config_read.timezone)?;
        Utc::now().with_timezone(&timezone).date_naive()
    };

    match command {
        CliCommand::Add {
            tasks,
            date,
            use_history,
        } => {
            let scheduler = scheduler_handle(component_manager).await?;
            let outcome = scheduler
                .place_tasks(PlacementRequest {
                    date: date.unwrap_or(today),
                    additions: tasks,
                    use_history,
                })
                .await?;
            report_outcome(&outcome);
        }
        CliCommand::Move {
            title,
            new_start,
            new_end,
            date,
        } => {
            let scheduler = scheduler_handle(component_manager).await?;
            let outcome = scheduler
                .apply_change(ChangeRequest {
                    date: date.unwrap_or(today),
                    change: ChangeDirective::Moved {
                        title,
                        new_start,
                        new_end,
                    },
                })
                .await?;
            report_outcome(&outcome);
        }
        CliCommand::Delete { title, date } => {
            let scheduler = scheduler_handle(component_manager).await?;
            let outcome = scheduler
                .apply_change(ChangeRequest {
                    date: date.unwrap_or(today),
                    change: ChangeDirective::Deleted { title },
                })
                .await?;
            report_outcome(&outcome);
        }
        CliCommand::Import => {
            let events = events_component(component_manager).await?;
            let (user_id, feed_url, feed_token) = {
                let config_read = config.read().await;
                (
                    config_read.user_id.clone(),
                    config_read.calendar_feed_url.clone().ok_or_else(|| {
                        Error::Config("CALENDAR_FEED_URL is not configured".to_string())
                    })?,
                    config_read.calendar_feed_token.clone(),
                )
            };

            let source = HttpCalendarSource::new(feed_url, feed_token);
            let window_start = Utc::now();
            let window_end = window_start + Duration::days(28);
            let imported = import_events(
                &events,
                &calendar_id_for(&user_id),
                &source,
                window_start,
                window_end,
            )
            .await?;
            info!("Import complete: {} event(s)", imported);
        }
        CliCommand::Record { task, minutes } => {
            let scheduler = scheduler_handle(component_manager).await?;
            let window = scheduler.record_duration(task.clone(), minutes).await?;
            info!(
                "Recorded {} min for '{}'; recent durations: {:?}",
                minutes, task, window
            );
        }
    }

    Ok(())
}

async fn scheduler_handle(
    component_manager: &Arc<ComponentManager>,
) -> AppResult<crate::components::SchedulerHandle> {
    component_manager
        .get_component_by_name("scheduler")
        .and_then(|c| c.as_any().downcast_ref::<Scheduler>())
        .ok_or_else(|| Error::Config("Scheduler component not registered".to_string()))?
        .get_handle()
        .await
        .ok_or_else(|| Error::Config("Scheduler component not initialized".to_string()))
}

fn report_outcome(outcome: &ReconcileOutcome) {
    if !outcome.created.is_empty() {
        info!("Created: {}", outcome.created.join(", "));
    }
    if !outcome.updated.is_empty() {
        info!("Updated: {}", outcome.updated.join(", "));
    }
    if !outcome.already_present.is_empty() {
        info!("Already on the day: {}", outcome.already_present.join(", "));
    }
    if !outcome.discarded.is_empty() {
        info!("Discarded unrequested titles: {}", outcome.discarded.join(", "));
    }
    for entry in &outcome.dropped {
        info!("Dropped response entry {}: {}", entry.index, entry.reason);
    }
}
