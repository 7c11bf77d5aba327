//! Comms subsystem — the chat surfaces of the bot.
//!
//! Two channels share one command set and one job runner:
//!
//! - [`telegram::TelegramChannel`] — the production surface. Commands come
//!   from Telegram; scheduled jobs are delivered to the admin chat.
//! - [`console::ConsoleChannel`] — stdin/stdout, used when Telegram is
//!   disabled (offline runs with the dummy provider, local testing).
//!
//! Channels never touch the store or the model directly; everything goes
//! through [`run_job`] and [`clear_history`], which return an [`Outgoing`]
//! message for the channel to deliver.

pub mod console;
pub mod telegram;

use chrono::{Local, NaiveDate};
use teloxide::utils::command::BotCommands;
use tracing::{error, info};

use crate::planner::{self, Planner, Reminder};
use crate::subsystems::cron::Job;

/// Chat commands understood by every channel.
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "snake_case", description = "Available commands:")]
pub enum Command {
    #[command(description = "greeting and notification chat id")]
    Start,
    #[command(description = "show this help")]
    Help,
    #[command(description = "generate next week's meal plan now")]
    Generate,
    #[command(description = "same as /generate")]
    GenerateTest,
    #[command(description = "send today's menu")]
    Today,
    #[command(description = "delete the recipe history and reset exclusions")]
    ClearHistory,
}

impl Command {
    /// Scheduled job equivalent, for commands that map onto one.
    pub fn job(&self) -> Option<Job> {
        match self {
            Command::Generate | Command::GenerateTest => Some(Job::WeeklyPlan),
            Command::Today => Some(Job::DailyReminder),
            _ => None,
        }
    }

    /// Whether the command is restricted to the admin chat.
    pub fn is_admin_only(&self) -> bool {
        !matches!(self, Command::Start | Command::Help)
    }
}

/// A message ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    /// HTML parse mode, pre-split into chat-sized chunks.
    Html(Vec<String>),
    /// Plain text, no markup.
    Plain(String),
}

pub const ADMIN_ONLY_MSG: &str = "This command is only available to the administrator in their chat.";
pub const BUSY_MSG: &str = "⏳ A plan is already being generated; yours starts when it finishes.";
pub const GENERATING_MSG: &str = "🚀 Starting meal plan generation (this can take up to a minute)...";
pub const GENERATED_MSG: &str = "✅ Generation finished. Check your messages.";
pub const LOOKING_UP_MSG: &str = "🔎 Looking up today's menu...";
pub const CLEARING_MSG: &str = "🗑️ Clearing the recipe history...";

/// Today's date in local time.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Run a scheduled (or command-triggered) job and render its result.
///
/// Failures are reported as plain-text messages; nothing is retried.
pub async fn run_job(planner: &Planner, job: Job, today: NaiveDate) -> Outgoing {
    info!(%job, %today, "running job");
    match job {
        Job::WeeklyPlan => match planner.generate_weekly(today).await {
            Ok(outcome) => {
                info!(days = outcome.plan.days.len(), saved = outcome.saved, "weekly plan ready");
                Outgoing::Html(outcome.messages)
            }
            Err(e) => {
                error!(error = %e, "weekly plan generation failed");
                Outgoing::Plain(planner::generation_failed_message(&e))
            }
        },
        Job::DailyReminder => match planner.daily_reminder(today).await {
            Ok(Reminder::Menu(chunks)) => Outgoing::Html(chunks),
            Ok(Reminder::Empty(text)) => Outgoing::Plain(text),
            Err(e) => {
                error!(error = %e, "daily reminder lookup failed");
                Outgoing::Plain(format!("❌ Failed to read today's menu: {e}"))
            }
        },
    }
}

/// Clear the history and render the result.
pub async fn clear_history(planner: &Planner) -> Outgoing {
    let result = planner.clear_history().await;
    if let Err(e) = &result {
        error!(error = %e, "clearing history failed");
    }
    Outgoing::Plain(planner::clear_history_message(&result))
}
