//! Planner — the generation, reminder and history flows.
//!
//! Each flow is a short scripted sequence: read the store, call the model,
//! normalize, write the store, render messages. Store calls are blocking and
//! run on the blocking pool; nothing is retried.

pub mod format;
pub mod normalize;
pub mod prompt;

use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::config::PlannerConfig;
use crate::error::AppError;
use crate::llm::LlmProvider;
use crate::store::{Recipe, RecipeStore};

use normalize::{NormalizedPlan, normalize_plan};
use prompt::{NutritionTargets, SYSTEM_PROMPT, build_prompt, load_template, plan_dates};

/// Result of a successful generation.
#[derive(Debug, Clone)]
pub struct WeeklyOutcome {
    pub plan: NormalizedPlan,
    /// Rendered chat messages (HTML), already split to fit the chat limit.
    pub messages: Vec<String>,
    /// Rows written to the store; `0` if saving failed.
    pub saved: usize,
}

/// Result of a reminder lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reminder {
    /// Rendered menu (HTML chunks).
    Menu(Vec<String>),
    /// Plain-text notice that nothing is planned for the day.
    Empty(String),
}

struct PlannerInner {
    store: RecipeStore,
    llm: LlmProvider,
    targets: NutritionTargets,
    template: String,
    plan_days: u32,
    exclusion_days: u32,
    generate_lock: Mutex<()>,
}

/// Shared planner handle — clone freely.
#[derive(Clone)]
pub struct Planner {
    inner: Arc<PlannerInner>,
}

impl Planner {
    pub fn new(config: &PlannerConfig, store: RecipeStore, llm: LlmProvider) -> Self {
        let targets = NutritionTargets {
            people: config.people.clone(),
            meals: config.meals.clone(),
            max_deviation_kcal: config.max_deviation_kcal,
            max_cook_minutes: config.max_cook_minutes,
        };
        let template = load_template(config.prompt_file.as_deref());
        Self {
            inner: Arc::new(PlannerInner {
                store,
                llm,
                targets,
                template,
                plan_days: config.plan_days,
                exclusion_days: config.exclusion_days,
                generate_lock: Mutex::new(()),
            }),
        }
    }

    pub fn store(&self) -> &RecipeStore {
        &self.inner.store
    }

    /// Whether a generation is in progress right now.
    pub fn is_generating(&self) -> bool {
        self.inner.generate_lock.try_lock().is_err()
    }

    /// Generate next week's plan, persist its recipes and render it.
    ///
    /// Runs one at a time. The history is best-effort: a failed exclusion
    /// read or save is logged and the plan is still returned.
    pub async fn generate_weekly(&self, today: NaiveDate) -> Result<WeeklyOutcome, AppError> {
        let inner = &self.inner;
        let since = today - Duration::days(i64::from(inner.exclusion_days));

        let _generating = inner.generate_lock.lock().await;

        let exclusions = match self.blocking(move |store| store.exclusion_list(since)).await {
            Ok(names) => names,
            Err(e) => {
                error!(error = %e, "failed to read the exclusion list — generating without it");
                Vec::new()
            }
        };
        if !exclusions.is_empty() {
            info!(
                count = exclusions.len(),
                days = inner.exclusion_days,
                "excluding recently planned dishes"
            );
        }

        let dates = plan_dates(today, inner.plan_days);
        let prompt = build_prompt(&inner.template, &inner.targets, &dates, &exclusions, inner.exclusion_days);

        info!(provider = inner.llm.name(), first_day = ?dates.first(), "requesting weekly plan");
        let reply = inner.llm.complete(&prompt, Some(SYSTEM_PROMPT)).await?;
        info!(reply_len = reply.text.len(), "model reply received");

        let plan = normalize_plan(&reply.text)?;
        let records = plan.records();

        let saved = match self.blocking(move |store| store.save_recipes(&records)).await {
            Ok(n) => {
                info!(days = plan.days.len(), recipes = n, "weekly plan saved");
                n
            }
            Err(e) => {
                error!(error = %e, "failed to save generated recipes — delivering plan anyway");
                0
            }
        };

        let messages = format::weekly_plan_message(&plan);
        Ok(WeeklyOutcome { plan, messages, saved })
    }

    /// Look up the stored menu for `today`.
    pub async fn daily_reminder(&self, today: NaiveDate) -> Result<Reminder, AppError> {
        let recipes: Vec<Recipe> = self.blocking(move |store| store.recipes_for_date(today)).await?;
        if recipes.is_empty() {
            info!(%today, "no menu stored for today");
            return Ok(Reminder::Empty(format::no_menu_message(today)));
        }
        info!(%today, recipes = recipes.len(), "menu found for today");
        Ok(Reminder::Menu(format::daily_reminder_message(today, &recipes)))
    }

    /// Wipe the recipe history (and with it the exclusion list).
    pub async fn clear_history(&self) -> Result<usize, AppError> {
        self.blocking(|store| store.clear()).await
    }

    /// Run a store operation on the blocking pool.
    async fn blocking<T, F>(&self, f: F) -> Result<T, AppError>
    where
        T: Send + 'static,
        F: FnOnce(&RecipeStore) -> Result<T, AppError> + Send + 'static,
    {
        let store = self.inner.store.clone();
        tokio::task::spawn_blocking(move || f(&store))
            .await
            .map_err(|e| {
                warn!(error = %e, "store task failed");
                AppError::Store(format!("store task failed: {e}"))
            })?
    }
}

/// User-facing text for a failed generation. Plain text, no markup.
pub fn generation_failed_message(err: &AppError) -> String {
    match err {
        AppError::Plan(e) => format!("❌ The model returned an unusable plan: {e}. Check the logs."),
        AppError::Llm(e) => format!("❌ Plan generation failed: {e}. Check the logs."),
        other => format!("❌ Plan generation or saving failed: {other}. Check the logs."),
    }
}

/// User-facing result of clearing the history.
pub fn clear_history_message(result: &Result<usize, AppError>) -> String {
    match result {
        Ok(n) => format!("✅ Deleted {n} records from the recipe history. The exclusion list has been reset!"),
        Err(e) => format!("❌ Failed to clear the database: {e}"),
    }
}
