//! BnBot — news-driven equity paper trading bot

use anyhow::Context;
use bnbot::{
    backtest::{BacktestParams, Backtester, SimResult},
    client::{AlpacaClient, BenzingaClient},
    config::Config,
    engine::{DecisionPipeline, ExitEngine, Overrides, SessionClock},
    ingest::NewsIngestor,
    notify::Notifier,
    sentiment::SentimentEngine,
    storage::Database,
    types::fmt_usd,
};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "bnbot")]
#[command(about = "News-driven equity paper trading bot")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the news, pipeline, and exit polling loops
    Run,
    /// Run a single news ingestion cycle
    Ingest,
    /// Run a single decision pipeline cycle
    Pipeline,
    /// Run a single exit engine cycle
    Exits,
    /// Replay the entry rules over a historical news range
    Backtest {
        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        start: String,
        /// End date (YYYY-MM-DD)
        #[arg(long)]
        end: String,
        /// Comma-separated ticker filter
        #[arg(long)]
        tickers: Option<String>,
    },
    /// Show open positions, today's activity, and provider health
    Status,
    /// Adjust the trailing stop of an open trade
    SetTsl {
        trade_id: i64,
        /// New trailing stop percentage
        pct: f64,
    },
    /// Enable or disable the market-close exit of an open trade
    MarketCloseExit {
        trade_id: i64,
        #[arg(long)]
        disable: bool,
    },
    /// Manually close an open trade
    Close {
        trade_id: i64,
        /// Exit price; defaults to the entry price
        #[arg(long)]
        price: Option<f64>,
    },
    /// Update an operator setting (capital_mode, capital_value,
    /// account_size, paper_trading)
    SetSetting { key: String, value: String },
    /// Send a test notification
    TestNotify,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Run => run_bot(config).await,
        Commands::Ingest => ingest_once(config).await,
        Commands::Pipeline => pipeline_once(config).await,
        Commands::Exits => exits_once(config).await,
        Commands::Backtest {
            start,
            end,
            tickers,
        } => run_backtest(config, &start, &end, tickers).await,
        Commands::Status => show_status(config).await,
        Commands::SetTsl { trade_id, pct } => set_tsl(config, trade_id, pct).await,
        Commands::MarketCloseExit { trade_id, disable } => {
            set_market_close_exit(config, trade_id, !disable).await
        }
        Commands::Close { trade_id, price } => manual_exit(config, trade_id, price).await,
        Commands::SetSetting { key, value } => set_setting(config, &key, &value).await,
        Commands::TestNotify => test_notify(config).await,
    }
}

fn build_notifier(config: &Config) -> Notifier {
    match &config.telegram {
        Some(tg) => Notifier::new(tg.clone()),
        None => {
            tracing::warn!("Telegram not configured, notifications disabled");
            Notifier::disabled()
        }
    }
}

async fn run_bot(config: Config) -> anyhow::Result<()> {
    tracing::info!("Starting BnBot");

    let notifier = build_notifier(&config);
    if let Err(e) = notifier.startup().await {
        tracing::warn!("Failed to send startup notification: {}", e);
    }

    let db = Database::connect(&config.database.path).await?;
    let alpaca = Arc::new(AlpacaClient::new(config.alpaca.clone())?);
    let benzinga = Arc::new(BenzingaClient::new(config.benzinga.clone())?);
    let session = SessionClock::from_config(&config.session)?;

    let settings = db.load_settings().await?;
    tracing::info!(
        "Settings: {} {} on account {} (paper: {})",
        settings.capital_mode.as_str(),
        settings.capital_value,
        fmt_usd(settings.account_size),
        settings.paper_trading
    );

    // News ingestion loop
    let ingestor = NewsIngestor::new(db.clone(), benzinga.clone());
    let news_interval = config.engine.news_interval_secs;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(news_interval));
        loop {
            interval.tick().await;
            if let Err(e) = ingestor.run_once().await {
                tracing::error!("News cycle failed: {}", e);
            }
        }
    });

    // Decision pipeline loop
    let pipeline = DecisionPipeline::new(
        db.clone(),
        alpaca.clone(),
        alpaca.clone(),
        SentimentEngine::default(),
        notifier.clone(),
        config.engine.clone(),
    );
    let pipeline_interval = config.engine.pipeline_interval_secs;
    let pipeline_notifier = notifier.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(pipeline_interval));
        loop {
            interval.tick().await;
            if let Err(e) = pipeline.run_once().await {
                tracing::error!("Pipeline cycle failed: {}", e);
                let _ = pipeline_notifier.error("Pipeline cycle", &e.to_string()).await;
            }
        }
    });

    // Exit engine loop
    let exits = ExitEngine::new(
        db.clone(),
        alpaca.clone(),
        notifier.clone(),
        session,
        config.engine.clone(),
    );
    let exit_interval = config.engine.exit_interval_secs;
    let exit_notifier = notifier.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(exit_interval));
        loop {
            interval.tick().await;
            if let Err(e) = exits.run_once().await {
                tracing::error!("Exit cycle failed: {}", e);
                let _ = exit_notifier.error("Exit cycle", &e.to_string()).await;
            }
        }
    });

    tracing::info!(
        "Loops running (news {}s, pipeline {}s, exits {}s); Ctrl-C to stop",
        news_interval,
        pipeline_interval,
        exit_interval
    );
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    Ok(())
}

async fn ingest_once(config: Config) -> anyhow::Result<()> {
    let db = Database::connect(&config.database.path).await?;
    let benzinga = Arc::new(BenzingaClient::new(config.benzinga.clone())?);
    let inserted = NewsIngestor::new(db, benzinga).run_once().await?;
    println!("Inserted {} news rows", inserted);
    Ok(())
}

async fn pipeline_once(config: Config) -> anyhow::Result<()> {
    let db = Database::connect(&config.database.path).await?;
    let alpaca = Arc::new(AlpacaClient::new(config.alpaca.clone())?);
    let pipeline = DecisionPipeline::new(
        db,
        alpaca.clone(),
        alpaca,
        SentimentEngine::default(),
        build_notifier(&config),
        config.engine.clone(),
    );
    let summary = pipeline.run_once().await?;
    println!(
        "Processed {} headlines: {} opened, {} skipped",
        summary.processed, summary.opened, summary.skipped
    );
    Ok(())
}

async fn exits_once(config: Config) -> anyhow::Result<()> {
    let db = Database::connect(&config.database.path).await?;
    let alpaca = Arc::new(AlpacaClient::new(config.alpaca.clone())?);
    let session = SessionClock::from_config(&config.session)?;
    let exits = ExitEngine::new(
        db,
        alpaca,
        build_notifier(&config),
        session,
        config.engine.clone(),
    );
    let summary = exits.run_once().await?;
    println!(
        "Polled {} open positions, closed {}",
        summary.polled, summary.closed
    );
    Ok(())
}

async fn run_backtest(
    config: Config,
    start: &str,
    end: &str,
    tickers: Option<String>,
) -> anyhow::Result<()> {
    let start = NaiveDate::parse_from_str(start, "%Y-%m-%d")
        .context("start date must be YYYY-MM-DD")?
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc();
    let end = NaiveDate::parse_from_str(end, "%Y-%m-%d")
        .context("end date must be YYYY-MM-DD")?
        .and_hms_opt(23, 59, 59)
        .unwrap()
        .and_utc();
    let tickers: Vec<String> = tickers
        .map(|t| {
            t.split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let benzinga = Arc::new(BenzingaClient::new(config.benzinga.clone())?);
    let alpaca = Arc::new(AlpacaClient::new(config.alpaca.clone())?);
    let params = BacktestParams {
        rvol_threshold: config.engine.rvol_threshold,
        timeframe: config.engine.timeframe.clone(),
        ..BacktestParams::default()
    };
    let backtester = Backtester::new(benzinga, alpaca, SentimentEngine::default(), params);

    let (trades, report) = backtester.run(start, end, &tickers).await?;

    println!("\nSimulated trades:\n");
    for trade in trades.iter().filter(|t| t.result == SimResult::Closed) {
        println!(
            "  {:<6} entry {:>8.2}  exit {:>8.2}  roi {:>6.2}%  {}  [{}]",
            trade.ticker,
            trade.entry_price.unwrap_or(0.0),
            trade.exit_price.unwrap_or(0.0),
            trade.roi_pct.unwrap_or(0.0),
            trade.reason,
            trade.headline.chars().take(60).collect::<String>(),
        );
    }

    println!("\nBacktest {} -> {}", start.date_naive(), end.date_naive());
    println!("  Evaluated:    {}", report.evaluated);
    println!("  Trades:       {}", report.trades);
    println!("  Wins:         {}", report.wins);
    println!("  Win rate:     {:.2}%", report.win_rate);
    println!("  Avg ROI:      {:.2}%", report.avg_roi);
    println!("  Total PnL:    {}", fmt_usd(report.total_pnl));
    println!("  Max drawdown: {}", fmt_usd(report.max_drawdown));
    Ok(())
}

async fn show_status(config: Config) -> anyhow::Result<()> {
    let db = Database::connect(&config.database.path).await?;

    let open = db.open_trades().await?;
    println!("\nOpen positions: {}\n", open.len());
    for trade in &open {
        println!(
            "  #{:<4} {:<6} entry {:>8.2}  peak {:>8.2}  tsl {:>4}%  moc {}  {}",
            trade.id,
            trade.ticker,
            trade.entry_price.unwrap_or(0.0),
            trade.peak_price.unwrap_or(0.0),
            trade.trailing_stop_loss,
            if trade.market_close_exit { "on" } else { "off" },
            trade.headline.chars().take(50).collect::<String>(),
        );
    }

    let stats = db.daily_stats().await?;
    println!("\nToday:");
    println!("  Opened:       {}", stats.opened);
    println!("  Skipped:      {}", stats.skipped);
    println!("  Closed:       {}", stats.closed);
    println!("  Realized PnL: {}", fmt_usd(stats.realized_pnl));
    println!("  Capital used: {}", fmt_usd(db.capital_used_today().await?));

    match db.last_provider_response("benzinga").await? {
        Some(ts) => {
            let age = Utc::now().signed_duration_since(ts);
            println!("\nNews provider: last response {}s ago", age.num_seconds());
        }
        None => println!("\nNews provider: no responses recorded"),
    }
    Ok(())
}

async fn set_tsl(config: Config, trade_id: i64, pct: f64) -> anyhow::Result<()> {
    let db = Database::connect(&config.database.path).await?;
    let overrides = Overrides::new(db, build_notifier(&config));
    let old = overrides.set_trailing_stop(trade_id, pct).await?;
    println!("Trade {}: trailing stop {}% -> {}%", trade_id, old, pct);
    Ok(())
}

async fn set_market_close_exit(
    config: Config,
    trade_id: i64,
    enabled: bool,
) -> anyhow::Result<()> {
    let db = Database::connect(&config.database.path).await?;
    let overrides = Overrides::new(db, build_notifier(&config));
    let old = overrides.set_market_close_exit(trade_id, enabled).await?;
    println!(
        "Trade {}: market-close exit {} -> {}",
        trade_id,
        if old { "enabled" } else { "disabled" },
        if enabled { "enabled" } else { "disabled" },
    );
    Ok(())
}

async fn manual_exit(config: Config, trade_id: i64, price: Option<f64>) -> anyhow::Result<()> {
    let db = Database::connect(&config.database.path).await?;
    let overrides = Overrides::new(db, build_notifier(&config));
    let closed = overrides.manual_exit(trade_id, price).await?;
    println!(
        "Trade {} ({}) closed at {:.2}",
        trade_id,
        closed.ticker,
        closed.exit_price.unwrap_or(0.0)
    );
    Ok(())
}

async fn set_setting(config: Config, key: &str, value: &str) -> anyhow::Result<()> {
    const KNOWN: &[&str] = &["capital_mode", "capital_value", "account_size", "paper_trading"];
    if !KNOWN.contains(&key) {
        anyhow::bail!("unknown setting {:?}; expected one of {:?}", key, KNOWN);
    }
    let db = Database::connect(&config.database.path).await?;
    db.set_setting(key, value).await?;
    let settings = db.load_settings().await?;
    println!(
        "Settings: mode={} value={} account={} paper={}",
        settings.capital_mode.as_str(),
        settings.capital_value,
        fmt_usd(settings.account_size),
        settings.paper_trading
    );
    Ok(())
}

async fn test_notify(config: Config) -> anyhow::Result<()> {
    let notifier = match &config.telegram {
        Some(tg) => Notifier::new(tg.clone()),
        None => anyhow::bail!("Telegram not configured in config.toml"),
    };
    notifier
        .send("BnBot Test", "If you can read this, notifications work")
        .await?;
    println!("Test notification sent");
    Ok(())
}
