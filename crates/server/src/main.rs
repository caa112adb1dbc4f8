//! Wartime Markets - how equities, gold and oil behaved after conflicts began
//!
//! Usage:
//!   wartime-markets serve --port 3002       - Launch the JSON API
//!   wartime-markets analyze --export out.json - Run the analysis from CLI
//!   wartime-markets history --limit 20      - Show the live-event snapshot history
//!   wartime-markets events                  - List the active event table

mod error;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};
use clap::{Parser, Subcommand};
use engine::{
    AnalysisResult, AnalyzerConfig, Asset, ConflictWindowAnalyzer, CurrentEventSnapshot,
    EventStatistics, EventTable, SeriesCache, YahooClient,
};
use persistence::repository::{SnapshotRecord, SnapshotRepository};
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::error::ApiError;

const APP_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "-", env!("GIT_HASH"));
const REQUEST_TIMEOUT_SECS: u64 = 60;
const DEFAULT_HISTORY_LIMIT: i64 = 100;

#[derive(Parser)]
#[command(name = "wartime-markets")]
#[command(about = "Market drawdown and recovery around historical conflicts", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON event table replacing the built-in conflicts
    #[arg(long, global = true)]
    events: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch the analysis web server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        /// Port to listen on
        #[arg(short, long, default_value_t = 3002)]
        port: u16,
    },
    /// Fetch data and run the analysis once (no web server)
    Analyze {
        /// Optional JSON export path for the full response body
        #[arg(long)]
        export: Option<String>,
    },
    /// Show stored snapshots of the live conflict
    History {
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    /// Print the active event table
    Events,
}

#[derive(Clone)]
struct AppState {
    cache: Arc<SeriesCache<YahooClient>>,
    analyzer: ConflictWindowAnalyzer,
    events: Arc<EventTable>,
    db: Arc<persistence::Database>,
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug,engine=debug,wartime_markets=debug,tower_http=debug")
    } else {
        EnvFilter::new("info,engine=info,wartime_markets=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).compact())
        .with(filter)
        .init();
}

fn db_path() -> String {
    std::env::var("WARTIME_DB_PATH").unwrap_or_else(|_| "data/wartime.db".to_string())
}

fn load_events(path: Option<&str>) -> anyhow::Result<EventTable> {
    match path {
        Some(path) => {
            let table = EventTable::from_json_file(path)
                .map_err(|e| anyhow::anyhow!("Failed to load event table {}: {}", path, e))?;
            info!(path, events = table.len(), "Loaded event table");
            Ok(table)
        }
        None => Ok(EventTable::builtin()),
    }
}

async fn build_state(events: EventTable) -> anyhow::Result<AppState> {
    let config = AnalyzerConfig::from_env();
    info!(
        window = config.window,
        ttl_secs = config.cache_ttl.as_secs(),
        history_start = %config.history_start,
        "Analyzer configuration"
    );

    let path = db_path();
    let db = persistence::Database::new(&path).await.map_err(|e| {
        error!("Failed to initialize database: {}", e);
        anyhow::anyhow!("Database initialization failed: {}", e)
    })?;
    info!("Database initialized: {}", path);

    let provider = YahooClient::new(config.history_start);
    Ok(AppState {
        cache: Arc::new(SeriesCache::new(
            provider,
            config.symbols.clone(),
            config.cache_ttl,
        )),
        analyzer: ConflictWindowAnalyzer::new(config.window),
        events: Arc::new(events),
        db: Arc::new(db),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    dotenvy::dotenv().ok();

    let events = load_events(cli.events.as_deref())?;

    match cli.command {
        Commands::Serve { host, port } => {
            cmd_serve(&host, port, events).await?;
        }
        Commands::Analyze { export } => {
            cmd_analyze(events, export).await?;
        }
        Commands::History { limit } => {
            cmd_history(&events, limit).await?;
        }
        Commands::Events => {
            print_events(&events);
        }
    }

    Ok(())
}

// ============================================================================
// Shared analysis path
// ============================================================================

/// Fetch (or reuse) the series, analyze, and record a snapshot on refresh
async fn run_analysis(state: &AppState) -> Result<AnalysisResult, ApiError> {
    let lookup = state.cache.get_or_fetch().await?;
    let series = &lookup.series;

    let result = state.analyzer.analyze(
        series.get(Asset::Spx),
        series.get(Asset::Gold),
        series.get(Asset::Oil),
        &state.events,
    );

    if lookup.refreshed {
        if let Some(current) = &result.current {
            let repo = SnapshotRepository::new(state.db.pool());
            if let Err(e) = repo.save_snapshot(&snapshot_record(current)).await {
                warn!("Failed to store live-event snapshot: {}", e);
            }
        }
    }

    Ok(result)
}

fn snapshot_record(snapshot: &CurrentEventSnapshot) -> SnapshotRecord {
    SnapshotRecord {
        id: None,
        event_name: snapshot.name.clone(),
        spx_days_elapsed: snapshot.spx_days_elapsed as i64,
        spx_return: snapshot.spx_return,
        spx_low: snapshot.spx_low,
        gold_return: snapshot.gold_return,
        oil_return: snapshot.oil_return,
        captured_at: None,
    }
}

// ============================================================================
// Serve command - Axum web server
// ============================================================================

fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/health", get(api_health))
        .route("/conflicts", get(api_conflicts))
        .route("/conflicts/events", get(api_events))
        .route("/conflicts/current/history", get(api_current_history))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(TimeoutLayer::new(Duration::from_secs(REQUEST_TIMEOUT_SECS)))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

async fn cmd_serve(host: &str, port: u16, events: EventTable) -> anyhow::Result<()> {
    info!("Wartime Markets v{} starting...", APP_VERSION);

    let state = build_state(events).await?;
    let event_count = state.events.len();
    let window = state.analyzer.window();
    let app = build_router(state);

    let addr: std::net::SocketAddr = format!("{}:{}", host, port).parse()?;
    println!("\n=== Wartime Markets v{} ===", APP_VERSION);
    println!("Conflict Drawdown Server");
    println!("Listening on http://{}", addr);
    println!("\nEndpoints:");
    println!("  GET  /api/health                    - Health check");
    println!("  GET  /api/conflicts                 - Full conflict analysis");
    println!("  GET  /api/conflicts/events          - Active event table");
    println!("  GET  /api/conflicts/current/history - Live-event snapshot history");
    println!(
        "\n  Events: {} | Window: {} days | Database: {}",
        event_count,
        window,
        db_path()
    );
    println!("\nPress Ctrl+C to stop\n");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Ctrl+C received, shutting down");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Analyze command - CLI mode (no web server)
// ============================================================================

async fn cmd_analyze(events: EventTable, export: Option<String>) -> anyhow::Result<()> {
    println!("\n=== Wartime Markets v{} ===", APP_VERSION);

    let state = build_state(events).await?;
    println!("Fetching market data...");
    let result = run_analysis(&state).await?;

    for asset in Asset::ALL {
        print_asset_stats(asset, &result);
    }
    print_summary(&result);

    if let Some(export_path) = export {
        let json = serde_json::to_string_pretty(&result)?;
        std::fs::write(&export_path, &json)?;
        println!("\nResults exported to {}", export_path);
    }

    Ok(())
}

fn fmt_pct(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:+.2}%", v * 100.0))
        .unwrap_or_else(|| "n/a".to_string())
}

fn fmt_days(value: Option<usize>) -> String {
    value
        .map(|d| d.to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn print_asset_stats(asset: Asset, result: &AnalysisResult) {
    let analysis = result.asset(asset);
    println!("\n{} ({} events with data):", asset.key().to_uppercase(), analysis.stats.len());
    if analysis.stats.is_empty() {
        println!("  statistics unavailable");
        return;
    }

    for stat in &analysis.stats {
        match stat {
            EventStatistics::Index(s) => println!(
                "  {:<28} MDD {:>8}  bottom d{:<4} recovery {:>5}  final {:>8}  ({} days)",
                s.conflict,
                fmt_pct(Some(s.mdd)),
                s.days_to_bottom,
                fmt_days(s.recovery_days),
                fmt_pct(Some(s.final_return)),
                s.days_avail,
            ),
            EventStatistics::Commodity(s) => println!(
                "  {:<28} peak {:>8} @d{:<4} MDD {:>8}  final {:>8}  ({} days)",
                s.conflict,
                fmt_pct(Some(s.peak_gain)),
                s.days_to_peak,
                fmt_pct(Some(s.mdd)),
                fmt_pct(Some(s.final_return)),
                s.days_avail,
            ),
        }
    }
}

fn print_summary(result: &AnalysisResult) {
    let s = &result.summary;
    println!("\nHistorical summary (S&P 500):");
    println!("  Average drawdown:      {}", fmt_pct(s.avg_mdd));
    println!(
        "  Average days to bottom: {}",
        s.avg_bottom_days.map(|d| format!("{:.1}", d)).unwrap_or_else(|| "n/a".into())
    );
    println!(
        "  Average recovery days:  {}",
        s.avg_recovery_days.map(|d| format!("{:.1}", d)).unwrap_or_else(|| "n/a".into())
    );
    println!("  Recovery rate:          {}", fmt_pct(s.recovery_rate));

    if let Some(c) = &result.current {
        println!("\nLive: {} (day {})", c.name, c.spx_days_elapsed);
        println!(
            "  S&P {}  (low {})  Gold {}  Oil {}",
            fmt_pct(c.spx_return),
            fmt_pct(c.spx_low),
            fmt_pct(c.gold_return),
            fmt_pct(c.oil_return)
        );
    }
}

// ============================================================================
// History / events commands
// ============================================================================

async fn cmd_history(events: &EventTable, limit: i64) -> anyhow::Result<()> {
    let Some(current) = events.current() else {
        println!("No live event in the event table.");
        return Ok(());
    };

    let path = db_path();
    let db = persistence::Database::new(&path)
        .await
        .map_err(|e| anyhow::anyhow!("Database initialization failed: {}", e))?;
    let repo = SnapshotRepository::new(db.pool());
    let history = repo
        .get_history(&current.name, limit)
        .await
        .map_err(|e| anyhow::anyhow!("History query failed: {}", e))?;

    println!("\nSnapshots for {} ({} shown):", current.name, history.len());
    println!(
        "  {:>12} {:>5} {:>9} {:>9} {:>9} {:>9}",
        "Captured", "Day", "S&P", "Low", "Gold", "Oil"
    );
    println!("  {}", "-".repeat(60));
    for r in &history {
        let captured = r
            .captured_at
            .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0))
            .map(|dt| dt.format("%Y-%m-%d").to_string())
            .unwrap_or_default();
        println!(
            "  {:>12} {:>5} {:>9} {:>9} {:>9} {:>9}",
            captured,
            r.spx_days_elapsed,
            fmt_pct(r.spx_return),
            fmt_pct(r.spx_low),
            fmt_pct(r.gold_return),
            fmt_pct(r.oil_return),
        );
    }
    Ok(())
}

fn print_events(events: &EventTable) {
    println!("\n{} events:", events.len());
    for e in events.iter() {
        println!(
            "  {} {:<28} {}{}",
            e.start_date,
            e.name,
            if e.current { "[live] " } else { "" },
            e.note.as_deref().unwrap_or("")
        );
    }
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health
async fn api_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "wartime-markets",
        "version": APP_VERSION,
    }))
}

/// GET /api/conflicts - full analysis body
async fn api_conflicts(State(state): State<AppState>) -> Result<Json<AnalysisResult>, ApiError> {
    let result = run_analysis(&state).await?;
    Ok(Json(result))
}

/// GET /api/conflicts/events - the active event table
async fn api_events(State(state): State<AppState>) -> Json<EventTable> {
    Json(state.events.as_ref().clone())
}

/// GET /api/conflicts/current/history - stored snapshots of the live event
async fn api_current_history(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let limit: i64 = params
        .get("limit")
        .and_then(|s| s.parse().ok())
        .filter(|l| *l > 0)
        .unwrap_or(DEFAULT_HISTORY_LIMIT);

    let Some(current) = state.events.current() else {
        return Ok(Json(serde_json::json!({
            "event": null,
            "data": [],
            "total": 0,
        })));
    };

    let repo = SnapshotRepository::new(state.db.pool());
    let records = repo.get_history(&current.name, limit).await?;

    Ok(Json(serde_json::json!({
        "event": current.name,
        "data": records,
        "total": records.len(),
        "limit": limit,
    })))
}
