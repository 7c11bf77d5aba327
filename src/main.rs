//! Meal-planning bot — entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Load config
//!   3. Resolve effective log level (CLI `-v` flags > env > config)
//!   4. Init logger once
//!   5. Open the recipe store, build the LLM provider and planner
//!   6. Spawn Ctrl-C → shutdown signal watcher
//!   7. Run cron + the chat channel until shutdown

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use mealplan_bot::config::{self, Config};
use mealplan_bot::error::AppError;
use mealplan_bot::llm::providers;
use mealplan_bot::logger;
use mealplan_bot::planner::Planner;
use mealplan_bot::store::RecipeStore;
use mealplan_bot::subsystems::comms::console::ConsoleChannel;
use mealplan_bot::subsystems::comms::telegram::TelegramChannel;
use mealplan_bot::subsystems::cron::{CronService, Job};
use mealplan_bot::subsystems::runtime::{Component, spawn_components};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    // Load .env if present — ignore errors (file is optional).
    let _ = dotenvy::dotenv();

    let args = parse_cli_args();

    let config = config::load(args.config_path.as_deref())?;

    let effective_log_level = args.log_level.unwrap_or(config.log_level.as_str());
    logger::init(effective_log_level, args.log_level.is_some())?;

    info!(
        bot_name = %config.bot_name,
        work_dir = %config.work_dir.display(),
        configured_log_level = %config.log_level,
        effective_log_level = %effective_log_level,
        "config loaded"
    );

    let store = RecipeStore::open(&config.db_path())?;
    let llm = providers::build(&config.llm, config.llm_api_key.clone())?;
    info!(
        db = %store.path().display(),
        provider = llm.name(),
        model = %config.llm.openai.model,
        "planner ready"
    );
    let planner = Planner::new(&config.planner, store, llm);

    let shutdown = CancellationToken::new();

    // Ctrl-C handler — cancels the token so all tasks shut down.
    let ctrlc_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received — initiating shutdown");
            ctrlc_token.cancel();
        }
    });

    let (job_tx, job_rx) = mpsc::channel::<Job>(8);
    let mut components: Vec<Box<dyn Component>> = Vec::new();

    if config.schedule.enabled {
        info!(
            weekly_plan = ?config.schedule.weekly_plan,
            daily_reminder = ?config.schedule.daily_reminder,
            "schedule enabled"
        );
        components.push(Box::new(CronService::new(
            vec![
                (Job::WeeklyPlan, config.schedule.weekly_plan.clone()),
                (Job::DailyReminder, config.schedule.daily_reminder.clone()),
            ],
            job_tx,
        )));
    } else {
        info!("schedule disabled — jobs run only on command");
        drop(job_tx);
    }

    if config.telegram.enabled && !args.interactive {
        let (token, chat_id) = telegram_credentials(&config)?;
        components.push(Box::new(TelegramChannel::new(token, chat_id, planner, job_rx)));
    } else {
        components.push(Box::new(ConsoleChannel::new(config.bot_name.clone(), planner, job_rx)));
    }

    let handle = spawn_components(components, shutdown.clone());
    let result = handle.join().await;

    // If a channel exited on its own (stdin EOF), stop everything else too.
    shutdown.cancel();

    if args.interactive {
        println!("\nBye :) ...");
    }

    result
}

/// Token and admin chat id, both required when Telegram is enabled.
fn telegram_credentials(config: &Config) -> Result<(String, i64), AppError> {
    let token = config
        .telegram_token
        .clone()
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| AppError::Config("TELEGRAM_BOT_TOKEN is not set".into()))?;
    let chat_id = config.telegram.chat_id.ok_or_else(|| {
        AppError::Config("telegram.chat_id (or MEALPLAN_CHAT_ID) is not set".into())
    })?;
    Ok((token, chat_id))
}

struct CliArgs {
    log_level: Option<&'static str>,
    interactive: bool,
    config_path: Option<String>,
}

fn parse_cli_args() -> CliArgs {
    let mut verbosity = 0u8;
    let mut interactive = false;
    let mut config_path = None;

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        if arg == "--" {
            break;
        }

        match arg.as_str() {
            "-h" | "--help" => {
                println!("Usage: mealplan-bot [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -h, --help                 Print help");
                println!("  -i, --interactive          Use the console instead of Telegram");
                println!("  -f, --config <PATH>        Path to configuration file (default: config/default.toml)");
                println!("  -v, -vv, -vvv, -vvvv       Set logging verbosity (warn, info, debug, trace)");
                std::process::exit(0);
            }
            "-i" | "--interactive" => interactive = true,
            "-f" | "--config" => {
                if let Some(path) = iter.next() {
                    config_path = Some(path);
                } else {
                    eprintln!("error: -f/--config requires a path argument");
                    std::process::exit(1);
                }
            }
            "--verbose" => verbosity = verbosity.saturating_add(1),
            a if a.starts_with('-') && a.len() > 1 && a.chars().skip(1).all(|c| c == 'v') => {
                verbosity = verbosity.saturating_add((a.len() - 1) as u8);
            }
            _ => {}
        }
    }

    let log_level = match verbosity {
        0 => None,
        1 => Some("warn"),
        2 => Some("info"),
        3 => Some("debug"),
        _ => Some("trace"),
    };

    CliArgs { log_level, interactive, config_path }
}
