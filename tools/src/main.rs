//! churnwatch: dashboard service and terminal watcher.
//!
//! Usage:
//!   churnwatch serve    [--config watch.json] [--bind 127.0.0.1:3000]
//!   churnwatch watch    --view stats|partners|alerts|roi|agent-summary
//!                       [--service http://127.0.0.1:3000] [--refreshes N]
//!   churnwatch snapshot [--config watch.json]
//!
//! The analytics API base URL comes from the config file or
//! CHURNWATCH_API_URL (default http://127.0.0.1:8001).

use anyhow::Result;
use churnwatch_core::{
    clock::SystemClock,
    config::WatchConfig,
    fallback::FallbackDataset,
    poller::{ActiveView, RefreshSchedule},
    reconciliation::Reconciler,
    remote::{HttpRemote, ServiceClient},
    server::{self, AppState},
    summary_store::AgentSummaryStore,
};
use serde_json::Value;
use std::env;
use std::sync::Arc;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let mode = args
        .get(1)
        .filter(|a| !a.starts_with("--"))
        .map(String::as_str)
        .unwrap_or("serve");

    let mut config = match flag_value(&args, "--config") {
        Some(path) => WatchConfig::load(path)?,
        None => WatchConfig::from_env()?,
    };
    if let Some(bind) = flag_value(&args, "--bind") {
        config.bind_addr = bind.to_string();
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    match mode {
        "serve" => runtime.block_on(run_serve(config)),
        "watch" => {
            let view = flag_value(&args, "--view").unwrap_or("stats").to_string();
            let service = flag_value(&args, "--service")
                .map(str::to_string)
                .unwrap_or_else(|| format!("http://{}", config.bind_addr));
            let refreshes = parse_arg(&args, "--refreshes", 0u64);
            runtime.block_on(run_watch(config, &view, &service, refreshes))
        }
        "snapshot" => runtime.block_on(run_snapshot(config)),
        other => anyhow::bail!("unknown mode '{other}' (expected serve, watch or snapshot)"),
    }
}

fn build_reconciler(config: &WatchConfig) -> Result<Arc<Reconciler>> {
    let remote = HttpRemote::from_config(config)?;
    Ok(Arc::new(Reconciler::new(
        Arc::new(remote),
        FallbackDataset::curated(),
        config.clone(),
        Arc::new(SystemClock),
    )))
}

async fn run_serve(config: WatchConfig) -> Result<()> {
    println!("churnwatch: dashboard service");
    println!("  analytics api: {}", config.api_base_url);
    println!("  bind:          {}", config.bind_addr);
    println!("  merge policy:  {:?}", config.merge_policy);
    println!();

    let reconciler = build_reconciler(&config)?;
    let state = AppState::new(Arc::new(AgentSummaryStore::with_system_clock()), reconciler);
    let listener = server::bind(&config.bind_addr).await?;

    server::serve(listener, state, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("cannot listen for ctrl-c: {e}");
        }
    })
    .await?;
    Ok(())
}

async fn run_watch(config: WatchConfig, view: &str, service: &str, refreshes: u64) -> Result<()> {
    let schedule = RefreshSchedule::Every(config.poll_interval());
    let active: ActiveView<Value> = match view {
        "agent-summary" => {
            let client = ServiceClient::new(service, config.request_timeout())?;
            ActiveView::activate(view, schedule, move || {
                let client = client.clone();
                async move {
                    match client.latest_agent_summary().await {
                        Ok(Some(summary)) => serde_json::to_value(summary).unwrap_or(Value::Null),
                        Ok(None) => Value::Null,
                        Err(e) => {
                            log::warn!("agent summary feed unavailable: {e}");
                            Value::Null
                        }
                    }
                }
            })
        }
        "stats" | "partners" | "alerts" | "roi" => {
            let reconciler = build_reconciler(&config)?;
            let which = view.to_string();
            ActiveView::activate(view, schedule, move || {
                let reconciler = Arc::clone(&reconciler);
                let which = which.clone();
                async move { fetch_view(&reconciler, &which).await }
            })
        }
        other => anyhow::bail!("unknown view '{other}'"),
    };

    println!("watching {view} every {}s (ctrl-c to stop)", config.poll_interval_secs);
    let mut rx = active.subscribe();
    let mut seen = 0u64;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let refresh = rx.borrow_and_update().clone();
                if let Some(refresh) = refresh {
                    print_refresh(view, refresh.seq, &refresh.value)?;
                    seen += 1;
                }
                if refreshes > 0 && seen >= refreshes {
                    break;
                }
            }
        }
    }
    active.deactivate().await;
    Ok(())
}

async fn run_snapshot(config: WatchConfig) -> Result<()> {
    let reconciler = build_reconciler(&config)?;
    for view in ["stats", "partners", "alerts", "roi"] {
        let value = fetch_view(&reconciler, view).await;
        println!("=== {} ===", view.to_uppercase());
        println!("{}", serde_json::to_string_pretty(&value)?);
        println!();
    }
    Ok(())
}

async fn fetch_view(reconciler: &Reconciler, view: &str) -> Value {
    let value = match view {
        "stats" => serde_json::to_value(reconciler.fetch_stats().await),
        "partners" => {
            let limit = reconciler.config().partner_fetch_limit;
            serde_json::to_value(reconciler.fetch_high_risk_partners(limit).await)
        }
        "alerts" => serde_json::to_value(reconciler.fetch_alert_board().await),
        "roi" => serde_json::to_value(reconciler.fetch_roi().await),
        _ => Ok(Value::Null),
    };
    value.unwrap_or(Value::Null)
}

fn print_refresh(view: &str, seq: u64, value: &Value) -> Result<()> {
    if view == "agent-summary" && value.is_null() {
        println!("[{seq}] waiting for agent data...");
        return Ok(());
    }
    println!("[{seq}] {}", serde_json::to_string(value)?);
    Ok(())
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
