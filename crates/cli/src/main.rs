use anyhow::Context;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stayrate_core::api::{HttpApiClient, PricingApi};
use stayrate_core::domain::DateRange;
use stayrate_core::time::calendar;
use stayrate_core::view::compare::{CompareController, CompareStatus};
use stayrate_core::view::range::{FetchStatus, RangeController};
use stayrate_core::view::summary::{filter_listings, DirectorySummary, SeriesSummary};

mod render;

#[derive(Debug, Parser)]
#[command(name = "stayrate")]
struct Args {
    /// Backend base URL. Overrides API_BASE_URL.
    #[arg(long)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the rental directory, optionally filtered by name or city.
    Listings {
        #[arg(long)]
        query: Option<String>,
    },

    /// Show the recommended price window for one listing.
    Show {
        listing_id: String,

        /// Window start (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        from: Option<String>,

        /// Window end (YYYY-MM-DD). Defaults to start + 13 days.
        #[arg(long)]
        to: Option<String>,
    },

    /// Overlay up to five listings' recommended prices for the next two weeks.
    Compare {
        #[arg(required = true)]
        listing_ids: Vec<String>,
    },

    /// Ask the backend to compute fresh recommendations for a listing.
    Quote {
        listing_id: String,

        /// Days ahead to quote, starting today.
        #[arg(long, default_value_t = 14)]
        days: i64,
    },

    /// Probe backend liveness.
    Health,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = stayrate_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let client = match &args.base_url {
        Some(base) => HttpApiClient::new(base.clone()),
        None => HttpApiClient::from_settings(&settings),
    }
    .context("failed to build API client")?;
    let api: Arc<dyn PricingApi> = Arc::new(client);

    // Ctrl-C flips the token; in-flight requests resolve as cancelled.
    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            let _ = tokio::signal::ctrl_c().await;
            cancel.cancel();
        }
    });

    let result = match args.command {
        Command::Listings { query } => {
            run_listings(api, query.as_deref().unwrap_or(""), &cancel).await
        }
        Command::Show {
            listing_id,
            from,
            to,
        } => run_show(api, &listing_id, from.as_deref(), to.as_deref(), &cancel).await,
        Command::Compare { listing_ids } => run_compare(api, &listing_ids, &cancel).await,
        Command::Quote { listing_id, days } => run_quote(api, &listing_id, days, &cancel).await,
        Command::Health => run_health(api, &cancel).await,
    };

    if let Err(err) = &result {
        sentry_anyhow::capture_anyhow(err);
    }
    result
}

async fn run_listings(
    api: Arc<dyn PricingApi>,
    query: &str,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let listings = api.listings(cancel).await.context("listing fetch failed")?;
    let filtered = filter_listings(&listings, query);

    print!("{}", render::listings_table(&filtered));
    println!();
    println!(
        "{}",
        render::directory_summary_line(&DirectorySummary::from_listings(&listings))
    );
    Ok(())
}

async fn run_show(
    api: Arc<dyn PricingApi>,
    listing_id: &str,
    from: Option<&str>,
    to: Option<&str>,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let listing = api
        .listing(listing_id, cancel)
        .await
        .with_context(|| format!("listing {listing_id} fetch failed"))?;

    let from = match from {
        Some(s) => calendar::from_iso(s)?,
        None => calendar::today(),
    };
    let range = match to {
        Some(s) => DateRange::new(from, calendar::from_iso(s)?),
        None => DateRange::default_window(from),
    };

    let controller = RangeController::with_range(api, listing_id, range);
    tokio::spawn({
        let controller = controller.clone();
        let cancel = cancel.clone();
        async move {
            cancel.cancelled().await;
            controller.close().await;
        }
    });
    controller.initial_load().await;
    anyhow::ensure!(!cancel.is_cancelled(), "interrupted");

    let snapshot = controller.snapshot().await;
    if let FetchStatus::Error(msg) = &snapshot.status {
        anyhow::bail!("recommendation fetch failed: {msg}");
    }

    println!("{}", listing.label());
    println!("window {}", snapshot.committed);
    println!();
    print!("{}", render::series_table(&snapshot.series));
    match SeriesSummary::from_series(&snapshot.series) {
        Some(summary) => {
            println!();
            println!("{}", render::series_summary_line(&summary));
        }
        None => println!("no recommendations in this window"),
    }
    Ok(())
}

async fn run_compare(
    api: Arc<dyn PricingApi>,
    listing_ids: &[String],
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let range = DateRange::default_window(calendar::today());
    let controller = CompareController::new(api, range);
    tokio::spawn({
        let controller = controller.clone();
        let cancel = cancel.clone();
        async move {
            cancel.cancelled().await;
            controller.close().await;
        }
    });

    controller.load_listings().await;
    for id in listing_ids {
        if !controller.add(id).await {
            tracing::warn!(listing_id = %id, "listing skipped: duplicate or selection full");
        }
    }
    controller.refresh().await;
    anyhow::ensure!(!cancel.is_cancelled(), "interrupted");

    let snapshot = controller.snapshot().await;
    if let CompareStatus::Error(msg) = &snapshot.status {
        anyhow::bail!("comparison failed: {msg}");
    }

    println!("overlay {}", range);
    for id in snapshot.selection.ids() {
        println!("  {id}: {}", controller.label_for(id).await);
    }
    println!();

    let rows = controller.rows().await;
    if rows.is_empty() {
        println!("no data in this window for the current selection");
    } else {
        print!(
            "{}",
            render::overlay_table(snapshot.selection.ids(), &rows)
        );
    }
    Ok(())
}

async fn run_quote(
    api: Arc<dyn PricingApi>,
    listing_id: &str,
    days: i64,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    anyhow::ensure!((1..=90).contains(&days), "days must be 1..=90 (got {days})");

    let from = calendar::today();
    let to = calendar::add_days(from, days);
    let payload = serde_json::json!({
        "listing_id": listing_id,
        "start": calendar::to_iso(from),
        "end": calendar::to_iso(to),
    });

    let ack = api
        .trigger_quote(&payload, cancel)
        .await
        .context("quote trigger failed")?;

    match ack.message {
        Some(msg) => println!("{msg}"),
        None if ack.ok => println!("quote queued for {listing_id} ({} .. {})", from, to),
        None => println!("quote request accepted"),
    }
    Ok(())
}

async fn run_health(api: Arc<dyn PricingApi>, cancel: &CancellationToken) -> anyhow::Result<()> {
    let health = api.health(cancel).await.context("health probe failed")?;
    println!(
        "status={} service={} version={}",
        health.status, health.service, health.version
    );
    anyhow::ensure!(health.is_ok(), "backend reported status {}", health.status);
    Ok(())
}

fn init_sentry(settings: &stayrate_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
