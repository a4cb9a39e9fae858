//! # MaaDesk — Multi-Account Automation Manager
//!
//! Headless engine: loads the config registry, migrates on-disk data,
//! and runs the timer core that dispatches proxy queues on schedule.
//!
//! Usage:
//!   maadesk                          # Run the scheduler loops
//!   maadesk --data-dir /srv/maadesk  # Custom data directory
//!   maadesk --config Queue_1         # Launch the named queues once and exit
//!   maadesk --verbose                # Debug logging

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Local;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use maadesk_core::documents::MEMBER_DISABLED;
use maadesk_core::{
    AppContext, AutoConfirm, NullPlatform, OfflineFetcher, TaskLauncher, migrate,
};
use maadesk_scheduler::{
    DispatchEngine, HourlyRefresh, PowerGuard, RemoteStageFetcher, SilenceGuard, run_hourly,
    run_timer,
};

#[derive(Parser)]
#[command(
    name = "maadesk",
    version,
    about = "Multi-account automation manager: scheduled proxy queues and run statistics"
)]
struct Cli {
    /// Data directory (holds config/, data/, history/); defaults to ~/.maadesk
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Launch the named queues immediately instead of scheduling
    #[arg(long, num_args = 1..)]
    config: Vec<String>,

    /// Print a merged statistics report for the last N days and exit
    #[arg(long, value_name = "DAYS")]
    report: Option<u32>,

    /// Disable the remote stage-metadata fetch
    #[arg(long)]
    offline: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Stand-in execution collaborator: accepts the launch, stamps the
/// queue's history, and releases the running claim. The real engine
/// reports back the same way once a run completes.
struct EchoLauncher {
    ctx: Arc<AppContext>,
}

#[async_trait]
impl TaskLauncher for EchoLauncher {
    async fn launch(&self, queue_name: &str, snapshot: serde_json::Value) -> maadesk_core::Result<()> {
        let members = snapshot["Queue"]
            .as_object()
            .map(|slots| {
                slots
                    .values()
                    .filter(|slot| slot.as_str().is_some_and(|s| s != MEMBER_DISABLED))
                    .count()
            })
            .unwrap_or(0);
        tracing::info!("task accepted: {queue_name} ({members} member slot(s))");

        let now = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        self.ctx.registry.lock().await.save_history(
            queue_name,
            &now,
            &format!("accepted {members} member slot(s), no engine attached"),
        );
        self.ctx.release_running(queue_name).await;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "maadesk=debug,maadesk_core=debug,maadesk_scheduler=debug,maadesk_stats=debug"
    } else {
        "maadesk=info,maadesk_core=info,maadesk_scheduler=info,maadesk_stats=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let data_dir = cli
        .data_dir
        .clone()
        .unwrap_or_else(maadesk_core::default_data_dir);
    let platform = Arc::new(NullPlatform);

    // normalize the on-disk layout before anything reads it
    migrate::check_data(&data_dir, platform.as_ref())?;

    let ctx = AppContext::new(&data_dir)?;
    {
        let mut registry = ctx.registry.lock().await;
        registry.search_member();
        registry.search_queue();
        registry.search_plan();
        let member_names: Vec<(String, maadesk_core::MemberKind)> = registry
            .members
            .iter()
            .map(|member| (member.name.clone(), member.kind))
            .collect();
        for (name, kind) in member_names {
            match kind {
                maadesk_core::MemberKind::Maa => registry.search_maa_user(&name),
                maadesk_core::MemberKind::General => registry.search_general_sub(&name),
            }
        }
        tracing::info!(
            "registry loaded: {} member(s), {} queue(s), {} plan(s)",
            registry.members.len(),
            registry.queues.len(),
            registry.plans.len()
        );
    }

    if let Some(days) = cli.report {
        print_report(&ctx, days);
        return Ok(());
    }

    let launcher = Arc::new(EchoLauncher { ctx: ctx.clone() });
    let engine = Arc::new(DispatchEngine::new(ctx.clone(), launcher.clone()));

    if !cli.config.is_empty() {
        run_named_queues(&ctx, launcher.as_ref(), &cli.config).await;
        return Ok(());
    }

    let silence = Arc::new(SilenceGuard::new(ctx.clone(), platform.clone()));
    let power = Arc::new(PowerGuard::new(
        ctx.clone(),
        platform.clone(),
        Arc::new(AutoConfirm),
    ));
    let refresh = Arc::new(if cli.offline {
        HourlyRefresh::new(ctx.clone(), Arc::new(OfflineFetcher), Arc::new(OfflineFetcher))
    } else {
        HourlyRefresh::new(
            ctx.clone(),
            Arc::new(RemoteStageFetcher::new()),
            Arc::new(OfflineFetcher),
        )
    });

    tokio::select! {
        _ = run_timer(engine, silence, power) => {}
        _ = run_hourly(refresh) => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
        }
    }
    Ok(())
}

/// `--report` mode: merge the last `days` of history and print a summary.
fn print_report(ctx: &Arc<AppContext>, days: u32) {
    let end = Local::now().date_naive();
    let start = end - chrono::TimeDelta::days(i64::from(days));
    let buckets = maadesk_stats::search_history(
        &ctx.history_dir(),
        maadesk_stats::MergeMode::Daily,
        start,
        end,
    );
    if buckets.is_empty() {
        println!("no run history between {start} and {end}");
        return;
    }
    for (label, entities) in buckets {
        let paths: Vec<PathBuf> = entities.values().flatten().cloned().collect();
        let report = maadesk_stats::merge_statistics(&paths);
        println!(
            "{label}: {} run(s), {} failed",
            report.index.len(),
            report.error_info.len()
        );
        for (rarity, count) in &report.recruit_statistics {
            println!("  recruited {rarity}: {count}");
        }
        for (stage, drops) in &report.drop_statistics {
            let total: u64 = drops.values().sum();
            println!("  {stage}: {} item type(s), {total} dropped", drops.len());
        }
    }
}

/// `--config` mode: launch the named queues once, regardless of their
/// time slots, and exit.
async fn run_named_queues(ctx: &Arc<AppContext>, launcher: &EchoLauncher, names: &[String]) {
    for name in names {
        let snapshot = {
            let registry = ctx.registry.lock().await;
            registry
                .queue(name)
                .map(|queue| serde_json::Value::Object(queue.config.to_map()))
        };
        let Some(snapshot) = snapshot else {
            tracing::warn!("no such queue: {name}");
            continue;
        };
        if !ctx.try_claim_running(name).await {
            tracing::warn!("queue already running: {name}");
            continue;
        }
        if let Err(e) = launcher.launch(name, snapshot).await {
            tracing::warn!("launch failed for {name}: {e}");
            ctx.release_running(name).await;
        }
    }
}
