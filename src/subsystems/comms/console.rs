//! Console comms channel — reads commands from stdin, prints results to
//! stdout. Also prints scheduled jobs as they fire.
//!
//! Used when Telegram is disabled. Runs until the `shutdown` token is
//! cancelled (Ctrl-C) or stdin is closed.

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use teloxide::utils::command::BotCommands;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::planner::Planner;
use crate::subsystems::cron::Job;
use crate::subsystems::runtime::{Component, ComponentFuture};

use super::{Command, Outgoing, clear_history, run_job, today};

pub struct ConsoleChannel {
    bot_name: String,
    planner: Planner,
    jobs: mpsc::Receiver<Job>,
}

impl ConsoleChannel {
    pub fn new(bot_name: impl Into<String>, planner: Planner, jobs: mpsc::Receiver<Job>) -> Self {
        Self { bot_name: bot_name.into(), planner, jobs }
    }
}

impl Component for ConsoleChannel {
    fn id(&self) -> &str {
        "console"
    }

    fn run(self: Box<Self>, shutdown: CancellationToken) -> ComponentFuture {
        Box::pin(run_console(self.bot_name, self.planner, self.jobs, shutdown))
    }
}

async fn run_console(
    bot_name: String,
    planner: Planner,
    mut jobs: mpsc::Receiver<Job>,
    shutdown: CancellationToken,
) -> Result<(), AppError> {
    info!("console channel started — type a command (e.g. /generate) and press Enter. Ctrl-C to quit.");
    println!("─────────────────────────────────");
    println!(" {bot_name} console  (Ctrl-C to quit)");
    println!("─────────────────────────────────");

    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();
    let mut jobs_open = true;

    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                info!("console channel shutting down");
                break;
            }

            job = jobs.recv(), if jobs_open => match job {
                Some(job) => print_outgoing(run_job(&planner, job, today()).await),
                None => jobs_open = false,
            },

            line = lines.next_line() => match line {
                Err(e) => {
                    warn!("console read error: {e}");
                    break;
                }
                Ok(None) => {
                    info!("console stdin closed");
                    break;
                }
                Ok(Some(input)) => {
                    let input = input.trim();
                    if input.is_empty() {
                        continue;
                    }
                    debug!(%input, "console received line");
                    match Command::parse(input, &bot_name) {
                        Ok(cmd) => print_outgoing(handle(&planner, cmd).await),
                        Err(_) => println!("{}", Command::descriptions()),
                    }
                }
            },
        }
    }

    Ok(())
}

/// The console is the local operator, so every command is allowed.
async fn handle(planner: &Planner, cmd: Command) -> Outgoing {
    if let Some(job) = cmd.job() {
        return run_job(planner, job, today()).await;
    }
    match cmd {
        Command::ClearHistory => clear_history(planner).await,
        _ => Outgoing::Plain(Command::descriptions().to_string()),
    }
}

fn print_outgoing(out: Outgoing) {
    match out {
        Outgoing::Html(chunks) => {
            for chunk in chunks {
                println!("{}\n", html_to_text(&chunk));
            }
        }
        Outgoing::Plain(text) => println!("{text}"),
    }
}

/// Drop tags and undo entity escaping so HTML messages read cleanly in a
/// terminal.
pub fn html_to_text(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tags_and_entities() {
        assert_eq!(html_to_text("<b>Mon</b> &lt;salad&gt; &amp; <i>soup</i>"), "Mon <salad> & soup");
        assert_eq!(html_to_text("a &amp;lt; b"), "a &lt; b");
        assert_eq!(html_to_text("plain"), "plain");
    }
}
