//! The ordersieve binary: a thin CLI over the library crates.

use anyhow::Context;
use clap::{Parser, Subcommand};
use ordersieve::{
    ChatRegistry, DEFAULT_REGISTRY_PATH, DetectionPipeline, Period, PeriodSummary, PipelineConfig,
    Settings, StdinSource, export, logging,
};
use ordersieve_client::RemoteClassifier;
use ordersieve_core::budget::BudgetGovernor;
use ordersieve_core::monitor::ErrorMonitor;
use ordersieve_matcher::PatternMatcher;
use ordersieve_protocol::OrderCategory;
use ordersieve_store::{
    FallbackStore, PgStore, PgStoreConfig, RestStore, RestStoreConfig, Store,
};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "ordersieve", version, about = "Two-tier order detection over a chat-message stream")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the detection pipeline, reading NDJSON updates from stdin.
    Start {
        /// Process every chat, ignoring the registry allow-list.
        #[arg(long)]
        all: bool,

        /// Read updates as NDJSON from stdin. This is the default and
        /// currently the only built-in source; the flag exists so other
        /// sources can be added without changing invocations.
        #[arg(long)]
        stdin: bool,
    },

    /// Manage the monitored-chat registry.
    Chat {
        #[command(subcommand)]
        action: ChatCommand,
    },

    /// Reporting over the accumulated daily stats.
    Stats {
        #[command(subcommand)]
        action: StatsCommand,
    },

    /// Export stored orders.
    Export {
        #[command(subcommand)]
        action: ExportCommand,
    },

    /// Administrative operations.
    Admin {
        #[command(subcommand)]
        action: AdminCommand,
    },
}

#[derive(Subcommand)]
enum ChatCommand {
    /// List every registered chat.
    List,
    /// Add a chat to monitoring (or reactivate it).
    Add {
        chat_id: String,
        name: String,
        #[arg(long, default_value = "group")]
        kind: String,
        #[arg(long, default_value_t = 1)]
        priority: u8,
    },
    /// Deactivate a chat.
    Remove {
        chat_id: String,
        #[arg(long, default_value = "removed by operator")]
        reason: String,
    },
    /// Re-enable a deactivated chat.
    Enable { chat_id: String },
    /// Disable a chat without forgetting it.
    Disable {
        chat_id: String,
        #[arg(long, default_value = "")]
        reason: String,
    },
    /// Set a chat's priority (1..=5).
    Priority { chat_id: String, priority: u8 },
    /// Forget every registered chat.
    Clear {
        /// Required confirmation flag.
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum StatsCommand {
    /// Aggregate counters over a period.
    Summary {
        #[arg(long, default_value = "today")]
        period: String,
    },
}

#[derive(Subcommand)]
enum ExportCommand {
    /// Write orders as CSV. Without --period, exports orders not yet
    /// exported and marks them.
    Csv {
        #[arg(long)]
        period: Option<String>,
        #[arg(long)]
        category: Option<String>,
        /// Output path; stdout when omitted.
        #[arg(long)]
        output: Option<std::path::PathBuf>,
    },
}

#[derive(Subcommand)]
enum AdminCommand {
    /// Apply the schema to the database.
    InitDb,
    /// Probe both persistence paths.
    TestConnection,
    /// Attach operator feedback to an order.
    Feedback {
        order_id: i64,
        feedback_type: String,
        #[arg(long)]
        reason: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::from_env()?;
    logging::init(&settings.log_level);

    match cli.command {
        Command::Start { all, stdin } => start(settings, all, stdin).await,
        Command::Chat { action } => chat(action),
        Command::Stats { action } => stats(settings, action).await,
        Command::Export { action } => export_cmd(settings, action).await,
        Command::Admin { action } => admin(settings, action).await,
    }
}

/// Compose the configured persistence paths.
async fn build_store(
    settings: &Settings,
    monitor: Arc<ErrorMonitor>,
) -> anyhow::Result<FallbackStore> {
    let primary = match settings.database.url() {
        Some(url) => {
            let config = PgStoreConfig { url, ..PgStoreConfig::default() };
            match PgStore::connect(&config).await {
                Ok(pg) => Some(pg),
                Err(err) => {
                    tracing::warn!(%err, "direct database path unavailable, relying on fallback");
                    None
                }
            }
        }
        None => None,
    };

    let fallback = match settings.tabular_endpoint() {
        Some((base_url, api_key)) => Some(RestStore::new(RestStoreConfig {
            base_url,
            api_key,
            timeout: Duration::from_secs(30),
        })?),
        None => None,
    };

    Ok(FallbackStore::new(primary, fallback, monitor)?)
}

fn require_primary(store: &FallbackStore) -> anyhow::Result<&PgStore> {
    store.primary().context(
        "this command needs the direct database path; set DATABASE_URL or SUPABASE_HOST/SUPABASE_PASSWORD",
    )
}

async fn start(settings: Settings, all: bool, stdin: bool) -> anyhow::Result<()> {
    if !stdin {
        tracing::info!("no source flag given, defaulting to the NDJSON stdin bridge");
    }
    let monitor = Arc::new(ErrorMonitor::default());
    let store = Arc::new(build_store(&settings, Arc::clone(&monitor)).await?);
    let registry = Arc::new(ChatRegistry::load(DEFAULT_REGISTRY_PATH)?);
    let budget = Arc::new(BudgetGovernor::new(settings.llm_daily_budget_usd, settings.tariff()));
    let classifier = Arc::new(RemoteClassifier::new(
        settings.classifier_config()?,
        Arc::clone(&budget),
    )?);

    let pipeline = Arc::new(DetectionPipeline::new(
        PatternMatcher::new(),
        classifier,
        Arc::clone(&store) as Arc<dyn Store>,
        Arc::clone(&registry),
        budget,
        monitor,
        PipelineConfig {
            relevance_threshold: settings.llm_analysis_threshold,
            max_concurrent_remote: settings.llm_max_concurrency,
            monitor_all: all,
            ..PipelineConfig::default()
        },
    ));
    pipeline.start();

    let interrupt_target = Arc::clone(&pipeline);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, shutting down");
            interrupt_target.shutdown().await;
        }
    });

    if settings.telegram.api_id.is_some() {
        tracing::debug!("messaging credentials configured; session management stays with the external bridge");
    }
    tracing::info!(
        monitored_chats = registry.list_active().len(),
        monitor_all = all,
        environment = %settings.environment,
        "ordersieve started, reading NDJSON updates from stdin"
    );

    pipeline.run(StdinSource::new()).await;
    pipeline.shutdown().await;
    store.close().await;
    Ok(())
}

fn chat(action: ChatCommand) -> anyhow::Result<()> {
    let registry = ChatRegistry::load(DEFAULT_REGISTRY_PATH)?;
    match action {
        ChatCommand::List => {
            let all = registry.list_all();
            if all.is_empty() {
                println!("no chats registered");
            }
            for entry in all {
                let mark = if entry.is_active { "+" } else { "-" };
                println!(
                    "{mark} {} ({}) [{} priority {}]",
                    entry.chat_name, entry.chat_id, entry.chat_type, entry.priority
                );
            }
        }
        ChatCommand::Add { chat_id, name, kind, priority } => {
            registry.add(&chat_id, &name, &kind, priority)?;
            println!("added {chat_id}");
        }
        ChatCommand::Remove { chat_id, reason } => {
            if registry.remove(&chat_id, &reason)? {
                println!("removed {chat_id}");
            } else {
                println!("chat {chat_id} is not registered");
            }
        }
        ChatCommand::Enable { chat_id } => {
            if registry.enable(&chat_id)? {
                println!("enabled {chat_id}");
            } else {
                println!("chat {chat_id} is not registered");
            }
        }
        ChatCommand::Disable { chat_id, reason } => {
            if registry.disable(&chat_id, &reason)? {
                println!("disabled {chat_id}");
            } else {
                println!("chat {chat_id} is not registered");
            }
        }
        ChatCommand::Priority { chat_id, priority } => {
            if registry.set_priority(&chat_id, priority)? {
                println!("priority {priority} set for {chat_id}");
            } else {
                println!("chat {chat_id} is not registered");
            }
        }
        ChatCommand::Clear { yes } => {
            if !yes {
                anyhow::bail!("chat clear forgets every registered chat; re-run with --yes");
            }
            let removed = registry.clear()?;
            println!("cleared {removed} chats");
        }
    }
    Ok(())
}

async fn stats(settings: Settings, action: StatsCommand) -> anyhow::Result<()> {
    let store = build_store(&settings, Arc::new(ErrorMonitor::default())).await?;
    let pg = require_primary(&store)?;
    match action {
        StatsCommand::Summary { period } => {
            let period = Period::parse(&period)
                .with_context(|| format!("unknown period {period:?}; use today|week|month|all"))?;
            let (from, to) = period.date_bounds();
            let rows = pg.stats_between(&from, &to).await?;
            println!("{}", PeriodSummary::from_rows(period, &rows).render());

            let by_category = pg.orders_by_category(period.days()).await?;
            if !by_category.is_empty() {
                println!("\nBy category:");
                for group in by_category {
                    println!("  {:<10} {}", group.label, group.count);
                }
            }
            let by_method = pg.orders_by_method(period.days()).await?;
            if !by_method.is_empty() {
                println!("By method:");
                for group in by_method {
                    println!("  {:<10} {}", group.label, group.count);
                }
            }
        }
    }
    store.close().await;
    Ok(())
}

async fn export_cmd(settings: Settings, action: ExportCommand) -> anyhow::Result<()> {
    let store = build_store(&settings, Arc::new(ErrorMonitor::default())).await?;
    let pg = require_primary(&store)?;
    match action {
        ExportCommand::Csv { period, category, output } => {
            let category = match category.as_deref() {
                Some(raw) => Some(
                    OrderCategory::parse(raw)
                        .with_context(|| format!("unknown category {raw:?}"))?,
                ),
                None => None,
            };

            let (orders, mark) = match period.as_deref() {
                Some(raw) => {
                    let period = Period::parse(raw)
                        .with_context(|| format!("unknown period {raw:?}; use today|week|month|all"))?;
                    let to = chrono::Utc::now();
                    let from = to - chrono::Duration::days(period.days());
                    let orders = pg
                        .orders_between(from, to, category.map(|c| c.as_str()))
                        .await?;
                    (orders, false)
                }
                None => {
                    let mut orders = pg.unexported_orders(1000).await?;
                    if let Some(category) = category {
                        orders.retain(|o| o.category == category.as_str());
                    }
                    (orders, true)
                }
            };

            let csv = export::orders_to_csv(&orders);
            match &output {
                Some(path) => {
                    std::fs::write(path, &csv)?;
                    println!("wrote {} orders to {}", orders.len(), path.display());
                }
                None => print!("{csv}"),
            }

            if mark {
                for order in &orders {
                    pg.mark_exported(order.id).await?;
                }
            }
        }
    }
    store.close().await;
    Ok(())
}

async fn admin(settings: Settings, action: AdminCommand) -> anyhow::Result<()> {
    let store = build_store(&settings, Arc::new(ErrorMonitor::default())).await?;
    match action {
        AdminCommand::InitDb => {
            require_primary(&store)?.init_schema().await?;
            println!("schema applied");
        }
        AdminCommand::TestConnection => {
            if store.health_check().await {
                println!("persistence backend reachable");
            } else {
                anyhow::bail!("no persistence path answered the probe");
            }
        }
        AdminCommand::Feedback { order_id, feedback_type, reason } => {
            require_primary(&store)?
                .add_feedback(order_id, &feedback_type, reason.as_deref())
                .await?;
            println!("feedback recorded for order {order_id}");
        }
    }
    store.close().await;
    Ok(())
}
