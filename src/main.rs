//! Homewatch Binary Entry Point
//!
//! Runs the button, climate, and weather pollers plus the optional retention
//! cleanup. Core functionality is provided by the `homewatch` library crate.

use std::collections::HashMap;
use std::sync::Arc;

use clap::Parser;
use homewatch::{
    CleanupCoordinator, EventStore, SqliteStore, StorageBuilder, WeatherStore,
    button::{ButtonAction, ButtonRecorder, EdgeDetector},
    config::AppConfig,
    poller::{BackoffPolicy, PeriodicTask, Poller, PollerRegistry},
    sampler::{
        ContinuousSampler, DiscreteSampler, JsonFileSampler, RandomSignal, SimulatedClimate,
        ValueFileSampler,
    },
    sensor::SensorAction,
    weather::{OpenWeatherClient, WeatherAction},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const BUTTON_POLLER: &str = "button";
const SENSORS_POLLER: &str = "sensors";
const WEATHER_POLLER: &str = "weather";

/// Homewatch - Home Telemetry Poller
#[derive(Parser, Debug)]
#[command(name = "homewatch", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        default_value = "configs/config.yaml",
        env = "HOMEWATCH_CONFIG"
    )]
    config: String,

    /// Database file path (overrides config file)
    #[arg(long, env = "HOMEWATCH_DB_PATH")]
    db_path: Option<String>,

    /// Enable the retention cleanup regardless of the config file
    #[arg(long)]
    cleanup: bool,

    /// Use simulated button and sensor samplers instead of hardware files
    #[arg(long, env = "HOMEWATCH_DEV")]
    dev: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,homewatch=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Homewatch - Home Telemetry Poller");

    let cli = Cli::parse();

    tracing::info!("Loading configuration from: {}", cli.config);
    let mut config = AppConfig::load(&cli.config)?;

    // CLI > ENV > config file
    if let Some(path) = cli.db_path {
        config.database.path = path;
    }
    if cli.cleanup {
        config.cleanup.enabled = true;
    }
    config.validate()?;

    tracing::info!("Initializing storage at: {}", config.database.path);
    let store = Arc::new(
        StorageBuilder::new(&config.database.path)
            .pool_size(config.database.pool_size)
            .build()
            .await?,
    );
    log_storage_summary(&store).await?;

    let registry = PollerRegistry::new();
    register_pollers(&config, cli.dev, &store, &registry).await?;

    let started = registry.start_all().await?;
    tracing::info!("Started {} pollers", started);

    let cleanup = if config.cleanup.enabled {
        let coordinator = build_cleanup(&config, &store, &registry)?;
        coordinator.start(config.cleanup.interval, config.cleanup.run_immediately)?;
        tracing::info!(
            "Retention cleanup every {}",
            humantime::format_duration(config.cleanup.interval)
        );
        Some(coordinator)
    } else {
        None
    };

    tracing::info!("Press Ctrl+C to shutdown");
    shutdown_signal().await;

    if let Some(coordinator) = cleanup {
        tracing::info!("Stopping retention cleanup...");
        if let Err(e) = coordinator.stop().await {
            tracing::debug!("Cleanup was not running: {}", e);
        }
    }

    tracing::info!("Shutting down pollers...");
    registry.shutdown().await;

    tracing::info!("Shutting down storage...");
    store.close().await;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Log what the database already holds.
async fn log_storage_summary(store: &SqliteStore) -> Result<(), Box<dyn std::error::Error>> {
    let readings = store.count_readings().await?;
    match store.latest_weather().await? {
        Some(weather) => tracing::info!(
            readings,
            weather_at = %weather.time,
            location = %weather.name,
            "Storage initialized"
        ),
        None => tracing::info!(readings, "Storage initialized"),
    }
    Ok(())
}

/// Register every enabled poller with the registry.
async fn register_pollers(
    config: &AppConfig,
    dev: bool,
    store: &Arc<SqliteStore>,
    registry: &PollerRegistry,
) -> Result<(), Box<dyn std::error::Error>> {
    let events: Arc<dyn EventStore> = store.clone();

    if config.button.enabled {
        let sampler: Arc<dyn DiscreteSampler> = if dev {
            Arc::new(RandomSignal::default())
        } else {
            Arc::new(ValueFileSampler::new(&config.button.value_file))
        };
        let detector = Arc::new(EdgeDetector::new(BUTTON_POLLER));
        let recorder = Arc::new(
            ButtonRecorder::new(config.button.id, events.clone())
                .with_min_press(config.button.min_press),
        );
        recorder.attach(&detector);

        let action = Arc::new(ButtonAction::new(sampler, detector));
        registry
            .register(Poller::new(
                BUTTON_POLLER,
                action,
                config.button.interval,
                false,
            ))
            .await?;
        tracing::info!("Registered poller: {}", BUTTON_POLLER);
    }

    if config.sensors.enabled {
        let sampler: Arc<dyn ContinuousSampler> = if dev {
            Arc::new(SimulatedClimate::new(&config.sensors.ids))
        } else {
            Arc::new(JsonFileSampler::new(
                &config.sensors.dir,
                config.sensors.ids.clone(),
            ))
        };

        // Seed deduplication so a restart does not store the same file twice
        let mut last_seen = HashMap::new();
        for id in &config.sensors.ids {
            if let Some(ts) = store.last_reading_at(*id).await? {
                last_seen.insert(*id, ts);
            }
        }

        let action = Arc::new(SensorAction::new(sampler, events.clone()).with_last_seen(last_seen));
        registry
            .register(Poller::new(
                SENSORS_POLLER,
                action,
                config.sensors.interval,
                config.sensors.immediate,
            ))
            .await?;
        tracing::info!("Registered poller: {}", SENSORS_POLLER);
    }

    if config.weather.enabled {
        let weather = &config.weather;
        let client = OpenWeatherClient::new(&weather.api_key, weather.lat, weather.lon, weather.timeout)?
            .with_lang(&weather.lang);
        let sink: Arc<dyn WeatherStore> = store.clone();
        let action = WeatherAction::new(Arc::new(client), sink, &weather.location);

        let task = PeriodicTask::new(WEATHER_POLLER);
        let policy = BackoffPolicy::new(
            WEATHER_POLLER,
            action,
            weather.interval,
            weather.backoff,
            task.interval_handle(),
        )?;
        registry
            .register(Poller::with_task(
                task,
                Arc::new(policy),
                weather.interval,
                true,
            ))
            .await?;
        tracing::info!("Registered poller: {}", WEATHER_POLLER);
    }

    Ok(())
}

/// Build the cleanup coordinator, pausing the local pollers around each sweep.
fn build_cleanup(
    config: &AppConfig,
    store: &Arc<SqliteStore>,
    registry: &PollerRegistry,
) -> Result<CleanupCoordinator, Box<dyn std::error::Error>> {
    let mut paused = Vec::new();
    if config.sensors.enabled {
        paused.push(SENSORS_POLLER);
    }
    if config.button.enabled {
        paused.push(BUTTON_POLLER);
    }

    let events: Arc<dyn EventStore> = store.clone();
    let coordinator = CleanupCoordinator::builder(events)
        .before_cleanup(registry.pause_hook(paused.clone()))
        .after_cleanup(registry.resume_hook(paused))
        .page_size(config.cleanup.page_size)
        .grace_period(config.cleanup.grace_period)
        .build()?;
    Ok(coordinator)
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal");
        }
    }
}
