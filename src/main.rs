//! Ski-dashboard: resort conditions and recommendation engine.
//!
//! Single-binary Tokio application that:
//! 1. Refreshes current weather per resort on a short period
//! 2. Refreshes the batch snow-conditions snapshot on a long period
//! 3. Re-ranks resorts against the preference weights on every refresh
//! 4. Logs cache health on a heartbeat

mod config;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use serde_json::json;
use tracing::{error, info, warn};

use common::{Error, Metric, ResortRegistry, WeightVector};
use engine::{CacheStatus, DashboardController, StaleCache};
use snow_client::SnowClient;
use weather_client::WeatherClient;

/// Ski resort conditions dashboard engine
#[derive(Parser)]
#[command(name = "ski-dashboard", about = "Ski resort conditions and recommendation engine")]
struct Cli {
    /// Path to a TOML config file (defaults to ./config.toml when present).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Refresh both sources once, print the recommendation as JSON, and exit.
    #[arg(long)]
    once: bool,

    /// Weight for warmth ("feels like" temperature), 0..1.
    #[arg(long)]
    warmth: Option<f64>,

    /// Weight for fresh snow (last 48h), 0..1.
    #[arg(long)]
    fresh: Option<f64>,

    /// Weight for base depth, 0..1.
    #[arg(long)]
    base: Option<f64>,

    /// Weight for open runs, 0..1.
    #[arg(long)]
    runs: Option<f64>,
}

impl Cli {
    fn weights(&self, defaults: &WeightVector) -> WeightVector {
        let mut weights = defaults.clone();
        for (metric, value) in [
            (Metric::Warmth, self.warmth),
            (Metric::FreshSnow, self.fresh),
            (Metric::BaseDepth, self.base),
            (Metric::OpenRuns, self.runs),
        ] {
            if let Some(v) = value {
                weights.set(metric, v);
            }
        }
        weights
    }
}

type Dashboard = DashboardController<WeatherClient, SnowClient>;

#[tokio::main]
async fn main() {
    // Initialize logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "ski_dashboard=info,engine=info,snow_client=info,weather_client=info".into()
            }),
        )
        .with_target(true)
        .init();

    let cli = Cli::parse();

    info!("Ski dashboard starting up...");

    // Load configuration.
    let cfg = match config::load_config(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };
    let weights = cli.weights(&cfg.weights);

    info!(
        "Resorts: {:?}",
        cfg.resorts.iter().map(|r| &r.name).collect::<Vec<_>>()
    );
    info!(
        "Timing: weather every {}s (timeout {}s), snow every {}s (timeout {}s)",
        cfg.timing.weather_refresh_secs,
        cfg.timing.weather_fetch_timeout_secs,
        cfg.timing.snow_refresh_secs,
        cfg.timing.snow_fetch_timeout_secs,
    );
    info!(
        "Weights: {}",
        weights
            .iter()
            .map(|(m, w)| format!("{m}={w:.2}"))
            .collect::<Vec<_>>()
            .join(", ")
    );

    let dashboard = match build_dashboard(&cfg) {
        Ok(d) => Arc::new(d),
        Err(e) => {
            error!("Startup failed: {}", e);
            std::process::exit(1);
        }
    };

    // ── One-shot mode ────────────────────────────────────────────────
    if cli.once {
        info!("Running single refresh...");
        tokio::join!(
            dashboard.weather_cache().refresh(),
            dashboard.snow_cache().refresh()
        );
        match serde_json::to_string_pretty(&once_report(&dashboard, &weights)) {
            Ok(out) => println!("{out}"),
            Err(e) => {
                error!("Failed to render report: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    // ── Spawn tasks ──────────────────────────────────────────────────
    info!("Spawning tasks...");

    // Subscribe before the loops start so their first commits are not missed.
    let mut weather_rx = dashboard.weather_cache().subscribe();
    let mut snow_rx = dashboard.snow_cache().subscribe();

    // Task 1 & 2: per-source refresh loops.
    let weather_handle = dashboard.weather_cache().spawn();
    let snow_handle = dashboard.snow_cache().spawn();

    // Task 3: re-rank whenever either cache commits a new snapshot.
    let rec_dashboard = dashboard.clone();
    let rec_weights = weights.clone();
    let recommendation_handle = tokio::spawn(async move {
        loop {
            let changed = tokio::select! {
                r = weather_rx.changed() => r,
                r = snow_rx.changed() => r,
            };
            if changed.is_err() {
                warn!("Cache closed, stopping recommendation task");
                break;
            }
            log_recommendation(&rec_dashboard, &rec_weights);
        }
    });

    // Task 4: Heartbeat
    let hb_dashboard = dashboard.clone();
    let hb_secs = cfg.timing.heartbeat_secs;
    let heartbeat_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(hb_secs));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            log_cache_status(&hb_dashboard.weather_cache().status());
            log_cache_status(&hb_dashboard.snow_cache().status());
        }
    });

    // ── Wait for shutdown ────────────────────────────────────────────
    info!("Ski dashboard is running. Press Ctrl+C to stop.");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
        r = weather_handle => {
            error!("Weather refresh task exited: {:?}", r);
        }
        r = snow_handle => {
            error!("Snow refresh task exited: {:?}", r);
        }
        r = recommendation_handle => {
            error!("Recommendation task exited: {:?}", r);
        }
        r = heartbeat_handle => {
            error!("Heartbeat task exited: {:?}", r);
        }
    }

    info!("Ski dashboard shut down.");
}

fn build_dashboard(cfg: &common::DashboardConfig) -> Result<Dashboard, Error> {
    let registry = Arc::new(ResortRegistry::new(cfg.resorts.clone())?);

    let weather = StaleCache::new(
        WeatherClient::new(registry.clone(), &cfg.weather)?,
        Duration::from_secs(cfg.timing.weather_refresh_secs),
        Duration::from_secs(cfg.timing.weather_fetch_timeout_secs),
    );
    let snow = StaleCache::new(
        SnowClient::new(registry.clone(), &cfg.snow)?,
        Duration::from_secs(cfg.timing.snow_refresh_secs),
        Duration::from_secs(cfg.timing.snow_fetch_timeout_secs),
    );

    Ok(DashboardController::new(
        registry,
        Arc::new(weather),
        Arc::new(snow),
    ))
}

// ── Task implementations ────────────────────────────────────────────

fn resort_name(dashboard: &Dashboard, id: &common::ResortId) -> String {
    dashboard
        .registry()
        .get(id)
        .map(|r| r.name.clone())
        .unwrap_or_else(|| id.to_string())
}

fn log_recommendation(dashboard: &Dashboard, weights: &WeightVector) {
    match dashboard.recommend(weights) {
        Ok(result) => {
            let Some(winner) = &result.winner else {
                return;
            };
            let standings = result
                .ranking
                .iter()
                .take(3)
                .map(|r| format!("{}={:.2}", r.resort, r.score))
                .collect::<Vec<_>>()
                .join(", ");
            info!(
                "RECOMMENDATION: {} (top: {})",
                resort_name(dashboard, winner),
                standings
            );
        }
        Err(Error::NoDataYet(source)) => {
            info!("Waiting for first data from {}", source);
        }
        Err(e) => {
            warn!("Ranking failed: {}", e);
        }
    }

    if let Ok(forecast) = dashboard.forecast() {
        if let Some(top) = &forecast.top_resort {
            info!(
                "Most snow in next {}h: {} ({:.1} in)",
                forecast.max_hour(),
                resort_name(dashboard, top),
                forecast.final_value(top).unwrap_or(0.0)
            );
        }
    }
}

fn log_cache_status(status: &CacheStatus) {
    let now = chrono::Utc::now();
    let age = status
        .data_age(now)
        .map(|a| format!("{}s", a.num_seconds()))
        .unwrap_or_else(|| "n/a".into());

    if status.is_overdue(now) {
        warn!(
            "HEARTBEAT: {} populated={} age={} failures={} (stale beyond {}s period)",
            status.source,
            status.populated,
            age,
            status.consecutive_failures,
            status.period.as_secs()
        );
    } else {
        info!(
            "HEARTBEAT: {} populated={} age={} failures={}",
            status.source, status.populated, age, status.consecutive_failures
        );
    }
}

fn once_report(dashboard: &Dashboard, weights: &WeightVector) -> serde_json::Value {
    let recommendation = match dashboard.recommend(weights) {
        Ok(r) => serde_json::to_value(&r).unwrap_or_default(),
        Err(e) => json!({ "error": e.to_string() }),
    };

    let forecast = match dashboard.forecast() {
        Ok(f) => {
            let totals: serde_json::Map<String, serde_json::Value> = f
                .resorts
                .iter()
                .map(|id| (id.to_string(), json!(f.final_value(id))))
                .collect();
            json!({
                "max_hour": f.max_hour(),
                "top_resort": f.top_resort,
                "final_totals": totals,
            })
        }
        Err(e) => json!({ "error": e.to_string() }),
    };

    let winner_detail = dashboard
        .recommend(weights)
        .ok()
        .and_then(|r| r.winner)
        .and_then(|id| dashboard.resort_detail(&id).ok())
        .and_then(|d| serde_json::to_value(&d).ok());

    json!({
        "weights": weights,
        "recommendation": recommendation,
        "forecast": forecast,
        "winner_detail": winner_detail,
        "sources": {
            "weather": status_json(&dashboard.weather_cache().status()),
            "snow": status_json(&dashboard.snow_cache().status()),
        },
    })
}

fn status_json(status: &CacheStatus) -> serde_json::Value {
    json!({
        "populated": status.populated,
        "refreshed_at": status.refreshed_at,
        "last_attempt_at": status.last_attempt_at,
        "consecutive_failures": status.consecutive_failures,
    })
}
