//! Telegram comms channel — command dispatcher plus scheduled-job delivery.
//!
//! Admin commands are only honoured in the configured chat. Scheduled jobs
//! from the cron service are delivered to the same chat.

use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::ParseMode;
use teloxide::utils::command::BotCommands;
use teloxide::utils::html::{bold, escape};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::planner::Planner;
use crate::subsystems::cron::Job;
use crate::subsystems::runtime::{Component, ComponentFuture};

use super::{
    ADMIN_ONLY_MSG, BUSY_MSG, CLEARING_MSG, Command, GENERATED_MSG, GENERATING_MSG, LOOKING_UP_MSG,
    Outgoing, clear_history, run_job, today,
};

/// Shared state injected into every handler.
struct TelegramState {
    planner: Planner,
    admin_chat: ChatId,
}

/// The Telegram channel component.
pub struct TelegramChannel {
    token: String,
    state: Arc<TelegramState>,
    jobs: mpsc::Receiver<Job>,
}

impl TelegramChannel {
    pub fn new(token: String, admin_chat: i64, planner: Planner, jobs: mpsc::Receiver<Job>) -> Self {
        Self {
            token,
            state: Arc::new(TelegramState { planner, admin_chat: ChatId(admin_chat) }),
            jobs,
        }
    }
}

impl Component for TelegramChannel {
    fn id(&self) -> &str {
        "telegram"
    }

    fn run(self: Box<Self>, shutdown: CancellationToken) -> ComponentFuture {
        Box::pin(run_telegram(self.token, self.state, self.jobs, shutdown))
    }
}

/// Only the configured chat may run admin commands.
pub fn is_authorized(chat: ChatId, admin_chat: ChatId) -> bool {
    chat == admin_chat
}

async fn run_telegram(
    token: String,
    state: Arc<TelegramState>,
    mut jobs: mpsc::Receiver<Job>,
    shutdown: CancellationToken,
) -> Result<(), AppError> {
    info!(admin_chat = %state.admin_chat, "telegram channel starting");

    let bot = Bot::new(token);

    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        warn!("failed to register bot commands: {e}");
    }

    let handler = Update::filter_message()
        .filter_command::<Command>()
        .endpoint(handle_command);

    let mut dispatcher = Dispatcher::builder(bot.clone(), handler)
        .dependencies(dptree::deps![state.clone()])
        .default_handler(|upd| async move {
            debug!(update_id = ?upd.id, "ignoring non-command update");
        })
        .build();

    let job_state = state.clone();
    let job_bot = bot.clone();
    let job_shutdown = shutdown.clone();
    let job_loop = async move {
        loop {
            tokio::select! {
                biased;
                _ = job_shutdown.cancelled() => break,
                job = jobs.recv() => match job {
                    Some(job) => {
                        let out = run_job(&job_state.planner, job, today()).await;
                        deliver(&job_bot, job_state.admin_chat, out).await;
                    }
                    None => {
                        debug!("job channel closed");
                        job_shutdown.cancelled().await;
                        break;
                    }
                },
            }
        }
    };

    tokio::select! {
        biased;

        _ = shutdown.cancelled() => {
            info!("shutdown signal received — closing telegram channel");
        }
        _ = dispatcher.dispatch() => {
            warn!("telegram dispatcher exited unexpectedly");
        }
        _ = job_loop => {}
    }

    Ok(())
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    state: Arc<TelegramState>,
) -> ResponseResult<()> {
    let chat = msg.chat.id;
    debug!(%chat, ?cmd, from = ?msg.from.as_ref().and_then(|u| u.username.as_ref()), "telegram command");

    if cmd.is_admin_only() && !is_authorized(chat, state.admin_chat) {
        warn!(%chat, ?cmd, "admin command from unauthorized chat");
        bot.send_message(chat, ADMIN_ONLY_MSG).await?;
        return Ok(());
    }

    match cmd {
        Command::Start => {
            let name = msg.from.as_ref().map(|u| u.first_name.as_str()).unwrap_or("there");
            let text = format!(
                "Hi, {}! I'm the meal-planning bot.\nNotification chat ID: {}.\nAvailable commands: /generate, /today, /clear_history.",
                bold(&escape(name)),
                bold(&state.admin_chat.to_string()),
            );
            bot.send_message(chat, text).parse_mode(ParseMode::Html).await?;
        }
        Command::Help => {
            bot.send_message(chat, Command::descriptions().to_string()).await?;
        }
        Command::Generate | Command::GenerateTest => {
            if state.planner.is_generating() {
                bot.send_message(chat, BUSY_MSG).await?;
            }
            bot.send_message(chat, GENERATING_MSG).await?;
            let out = run_job(&state.planner, Job::WeeklyPlan, today()).await;
            deliver(&bot, state.admin_chat, out).await;
            bot.send_message(chat, GENERATED_MSG).await?;
        }
        Command::Today => {
            bot.send_message(chat, LOOKING_UP_MSG).await?;
            let out = run_job(&state.planner, Job::DailyReminder, today()).await;
            deliver(&bot, state.admin_chat, out).await;
        }
        Command::ClearHistory => {
            bot.send_message(chat, CLEARING_MSG).await?;
            let out = clear_history(&state.planner).await;
            deliver(&bot, chat, out).await;
        }
    }

    Ok(())
}

/// Send `out` to `chat`. Delivery errors are logged, not propagated.
async fn deliver(bot: &Bot, chat: ChatId, out: Outgoing) {
    match out {
        Outgoing::Html(chunks) => {
            for chunk in chunks {
                if let Err(e) = bot.send_message(chat, chunk).parse_mode(ParseMode::Html).await {
                    warn!(%chat, "failed to send telegram message: {e}");
                }
            }
        }
        Outgoing::Plain(text) => {
            if let Err(e) = bot.send_message(chat, text).await {
                warn!(%chat, "failed to send telegram message: {e}");
            }
        }
    }
}
