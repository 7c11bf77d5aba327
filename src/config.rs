//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` relative to the current working directory
//! (or the path in `MEALPLAN_CONFIG`), then applies `MEALPLAN_WORK_DIR`,
//! `MEALPLAN_LOG_LEVEL` and `MEALPLAN_CHAT_ID` overrides. Secrets
//! (`TELEGRAM_BOT_TOKEN`, `LLM_API_KEY`) are only ever read from the
//! environment.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use chrono::{NaiveTime, Weekday};
use serde::Deserialize;

use crate::error::AppError;
use crate::planner::prompt::{MealSlot, Person};
use crate::subsystems::cron::WeeklySchedule;

/// Telegram channel configuration.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub enabled: bool,
    /// The only chat allowed to run admin commands; also the delivery target
    /// for scheduled messages.
    pub chat_id: Option<i64>,
}

/// OpenAI / OpenAI-compatible provider configuration (`[llm.openai]`).
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Full chat completions endpoint URL.
    pub api_base_url: String,
    pub model: String,
    /// Sampling temperature (ignored for models that forbid it).
    pub temperature: f32,
    /// Per-request HTTP timeout in seconds.
    pub timeout_seconds: u64,
    /// Ask the endpoint for a JSON object response.
    pub json_mode: bool,
}

/// LLM configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Active provider: `"dummy"`, `"openai"` or `"openai-compatible"`.
    pub provider: String,
    pub openai: OpenAiConfig,
}

/// Meal-plan generation settings (`[planner]`).
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    pub plan_days: u32,
    /// How far back stored dishes are excluded from new plans.
    pub exclusion_days: u32,
    pub max_deviation_kcal: u32,
    pub max_cook_minutes: u32,
    /// Optional prompt template override; the built-in template is used when
    /// unset.
    pub prompt_file: Option<PathBuf>,
    pub people: Vec<Person>,
    pub meals: Vec<MealSlot>,
}

/// Timer configuration (`[schedule]`).
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    pub enabled: bool,
    pub weekly_plan: WeeklySchedule,
    pub daily_reminder: WeeklySchedule,
}

/// Fully-resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub bot_name: String,
    /// Working directory for persistent data (already expanded, no `~`).
    pub work_dir: PathBuf,
    pub log_level: String,
    pub telegram: TelegramConfig,
    pub llm: LlmConfig,
    /// `LLM_API_KEY` (or `OPENAI_API_KEY`) — `None` for keyless local models.
    /// Never sourced from TOML.
    pub llm_api_key: Option<String>,
    /// `TELEGRAM_BOT_TOKEN`. Never sourced from TOML.
    pub telegram_token: Option<String>,
    /// Database file name or path; relative paths resolve against `work_dir`.
    pub db_file: PathBuf,
    pub planner: PlannerConfig,
    pub schedule: ScheduleConfig,
}

impl Config {
    /// Absolute location of the recipe database.
    pub fn db_path(&self) -> PathBuf {
        if self.db_file.is_absolute() {
            self.db_file.clone()
        } else {
            self.work_dir.join(&self.db_file)
        }
    }
}

/// Values that take precedence over the TOML file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub work_dir: Option<String>,
    pub log_level: Option<String>,
    pub chat_id: Option<String>,
}

impl Overrides {
    /// Collect overrides from `MEALPLAN_*` environment variables.
    pub fn from_env() -> Self {
        Self {
            work_dir: env::var("MEALPLAN_WORK_DIR").ok(),
            log_level: env::var("MEALPLAN_LOG_LEVEL").ok(),
            chat_id: env::var("MEALPLAN_CHAT_ID").ok().filter(|s| !s.trim().is_empty()),
        }
    }
}

// ── Raw TOML shape ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct RawConfig {
    bot: RawBot,
    #[serde(default)]
    telegram: RawTelegram,
    #[serde(default)]
    llm: RawLlm,
    #[serde(default)]
    store: RawStore,
    #[serde(default)]
    planner: RawPlanner,
    #[serde(default)]
    schedule: RawSchedule,
}

#[derive(Deserialize)]
struct RawBot {
    name: String,
    work_dir: String,
    #[serde(default = "default_log_level")]
    log_level: String,
}

#[derive(Deserialize)]
struct RawTelegram {
    #[serde(default = "default_true")]
    enabled: bool,
    #[serde(default)]
    chat_id: Option<i64>,
}

impl Default for RawTelegram {
    fn default() -> Self {
        Self { enabled: true, chat_id: None }
    }
}

#[derive(Deserialize)]
struct RawLlm {
    #[serde(rename = "default", default = "default_llm_provider")]
    provider: String,
    #[serde(default)]
    openai: RawOpenAiConfig,
}

impl Default for RawLlm {
    fn default() -> Self {
        Self { provider: default_llm_provider(), openai: RawOpenAiConfig::default() }
    }
}

#[derive(Deserialize)]
struct RawOpenAiConfig {
    #[serde(default = "default_openai_api_base_url")]
    api_base_url: String,
    #[serde(default = "default_openai_model")]
    model: String,
    #[serde(default = "default_openai_temperature")]
    temperature: f32,
    #[serde(default = "default_openai_timeout_seconds")]
    timeout_seconds: u64,
    #[serde(default = "default_true")]
    json_mode: bool,
}

impl Default for RawOpenAiConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_openai_api_base_url(),
            model: default_openai_model(),
            temperature: default_openai_temperature(),
            timeout_seconds: default_openai_timeout_seconds(),
            json_mode: true,
        }
    }
}

#[derive(Deserialize)]
struct RawStore {
    #[serde(default = "default_db_file")]
    db_file: String,
}

impl Default for RawStore {
    fn default() -> Self {
        Self { db_file: default_db_file() }
    }
}

#[derive(Deserialize)]
struct RawPlanner {
    #[serde(default = "default_plan_days")]
    plan_days: u32,
    #[serde(default = "default_exclusion_days")]
    exclusion_days: u32,
    #[serde(default = "default_max_deviation_kcal")]
    max_deviation_kcal: u32,
    #[serde(default = "default_max_cook_minutes")]
    max_cook_minutes: u32,
    #[serde(default)]
    prompt_file: Option<String>,
    #[serde(default = "default_people")]
    people: Vec<Person>,
    #[serde(default = "default_meals")]
    meals: Vec<MealSlot>,
}

impl Default for RawPlanner {
    fn default() -> Self {
        Self {
            plan_days: default_plan_days(),
            exclusion_days: default_exclusion_days(),
            max_deviation_kcal: default_max_deviation_kcal(),
            max_cook_minutes: default_max_cook_minutes(),
            prompt_file: None,
            people: default_people(),
            meals: default_meals(),
        }
    }
}

#[derive(Deserialize)]
struct RawSchedule {
    #[serde(default = "default_true")]
    enabled: bool,
    #[serde(default = "default_weekly_plan")]
    weekly_plan: RawWeekly,
    #[serde(default = "default_daily_reminder")]
    daily_reminder: RawWeekly,
}

impl Default for RawSchedule {
    fn default() -> Self {
        Self {
            enabled: true,
            weekly_plan: default_weekly_plan(),
            daily_reminder: default_daily_reminder(),
        }
    }
}

#[derive(Deserialize)]
struct RawWeekly {
    days: Vec<String>,
    at: String,
}

fn default_true() -> bool { true }
fn default_log_level() -> String { "info".to_string() }
fn default_llm_provider() -> String { "openai".to_string() }
fn default_openai_api_base_url() -> String { "https://api.openai.com/v1/chat/completions".to_string() }
fn default_openai_model() -> String { "gpt-4o-mini".to_string() }
fn default_openai_temperature() -> f32 { 0.7 }
fn default_openai_timeout_seconds() -> u64 { 120 }
fn default_db_file() -> String { "recipes.db".to_string() }
fn default_plan_days() -> u32 { 5 }
fn default_exclusion_days() -> u32 { 21 }
fn default_max_deviation_kcal() -> u32 { 100 }
fn default_max_cook_minutes() -> u32 { 60 }

fn default_people() -> Vec<Person> {
    vec![
        Person { label: "Man".into(), kcal: 2204, protein_g: 165, fat_g: 61, carbs_g: 248 },
        Person { label: "Woman".into(), kcal: 1703, protein_g: 128, fat_g: 47, carbs_g: 192 },
    ]
}

fn default_meals() -> Vec<MealSlot> {
    vec![
        MealSlot { name: "Breakfast".into(), kcal_min: 900, kcal_max: 1100 },
        MealSlot { name: "Lunch".into(), kcal_min: 1200, kcal_max: 1400 },
        MealSlot { name: "Snack".into(), kcal_min: 400, kcal_max: 500 },
        MealSlot { name: "Dinner".into(), kcal_min: 1200, kcal_max: 1400 },
    ]
}

fn default_weekly_plan() -> RawWeekly {
    RawWeekly { days: vec!["sun".into()], at: "10:00".into() }
}

fn default_daily_reminder() -> RawWeekly {
    RawWeekly {
        days: ["mon", "tue", "wed", "thu", "fri"].iter().map(|d| d.to_string()).collect(),
        at: "07:00".into(),
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Load config from `path`, falling back to `MEALPLAN_CONFIG` and then
/// `config/default.toml`, then apply env-var overrides.
pub fn load(path: Option<&str>) -> Result<Config, AppError> {
    let path = path
        .map(str::to_string)
        .or_else(|| env::var("MEALPLAN_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());
    load_from(Path::new(&path), &Overrides::from_env())
}

/// Internal loader — accepts an explicit path and overrides.
/// Tests pass overrides directly instead of mutating env vars.
pub fn load_from(path: &Path, overrides: &Overrides) -> Result<Config, AppError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    let parsed: RawConfig = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    let work_dir = expand_home(overrides.work_dir.as_deref().unwrap_or(&parsed.bot.work_dir));
    let log_level = overrides.log_level.clone().unwrap_or(parsed.bot.log_level);

    let chat_id = match overrides.chat_id.as_deref() {
        Some(s) => Some(s.trim().parse::<i64>().map_err(|_| {
            AppError::Config(format!("MEALPLAN_CHAT_ID must be an integer, got '{s}'"))
        })?),
        None => parsed.telegram.chat_id,
    };

    let planner = parsed.planner;
    if planner.plan_days == 0 {
        return Err(AppError::Config("planner.plan_days must be > 0".into()));
    }
    if planner.people.is_empty() {
        return Err(AppError::Config("planner.people must not be empty".into()));
    }
    if planner.meals.is_empty() {
        return Err(AppError::Config("planner.meals must not be empty".into()));
    }
    if let Some(m) = planner.meals.iter().find(|m| m.kcal_min > m.kcal_max) {
        return Err(AppError::Config(format!(
            "planner.meals '{}': kcal_min {} exceeds kcal_max {}",
            m.name, m.kcal_min, m.kcal_max
        )));
    }

    Ok(Config {
        bot_name: parsed.bot.name,
        work_dir,
        log_level,
        telegram: TelegramConfig { enabled: parsed.telegram.enabled, chat_id },
        llm: LlmConfig {
            provider: parsed.llm.provider,
            openai: OpenAiConfig {
                api_base_url: parsed.llm.openai.api_base_url,
                model: parsed.llm.openai.model,
                temperature: parsed.llm.openai.temperature,
                timeout_seconds: parsed.llm.openai.timeout_seconds,
                json_mode: parsed.llm.openai.json_mode,
            },
        },
        llm_api_key: env::var("LLM_API_KEY").or_else(|_| env::var("OPENAI_API_KEY")).ok(),
        telegram_token: env::var("TELEGRAM_BOT_TOKEN").ok(),
        db_file: PathBuf::from(parsed.store.db_file),
        planner: PlannerConfig {
            plan_days: planner.plan_days,
            exclusion_days: planner.exclusion_days,
            max_deviation_kcal: planner.max_deviation_kcal,
            max_cook_minutes: planner.max_cook_minutes,
            prompt_file: planner.prompt_file.map(|p| expand_home(&p)),
            people: planner.people,
            meals: planner.meals,
        },
        schedule: ScheduleConfig {
            enabled: parsed.schedule.enabled,
            weekly_plan: resolve_weekly("schedule.weekly_plan", parsed.schedule.weekly_plan)?,
            daily_reminder: resolve_weekly("schedule.daily_reminder", parsed.schedule.daily_reminder)?,
        },
    })
}

fn resolve_weekly(section: &str, raw: RawWeekly) -> Result<WeeklySchedule, AppError> {
    if raw.days.is_empty() {
        return Err(AppError::Config(format!("{section}.days must not be empty")));
    }
    let days = raw
        .days
        .iter()
        .map(|d| {
            d.trim()
                .parse::<Weekday>()
                .map_err(|_| AppError::Config(format!("{section}: invalid weekday '{d}'")))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let at = NaiveTime::parse_from_str(raw.at.trim(), "%H:%M")
        .map_err(|e| AppError::Config(format!("{section}: invalid time '{}': {e}", raw.at)))?;
    Ok(WeeklySchedule::new(days, at))
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

// ── test helpers ──────────────────────────────────────────────────────────────

/// Safe `Config` for tests — dummy LLM, no tokens, no external calls.
impl Config {
    pub fn test_default(work_dir: &Path) -> Self {
        Self {
            bot_name: "test".into(),
            work_dir: work_dir.to_path_buf(),
            log_level: "info".into(),
            telegram: TelegramConfig { enabled: false, chat_id: Some(42) },
            llm: LlmConfig {
                provider: "dummy".into(),
                openai: OpenAiConfig {
                    api_base_url: "http://localhost:0/v1/chat/completions".into(),
                    model: "test-model".into(),
                    temperature: 0.0,
                    timeout_seconds: 1,
                    json_mode: true,
                },
            },
            llm_api_key: None,
            telegram_token: None,
            db_file: PathBuf::from(default_db_file()),
            planner: PlannerConfig {
                plan_days: default_plan_days(),
                exclusion_days: default_exclusion_days(),
                max_deviation_kcal: default_max_deviation_kcal(),
                max_cook_minutes: default_max_cook_minutes(),
                prompt_file: None,
                people: default_people(),
                meals: default_meals(),
            },
            schedule: ScheduleConfig {
                enabled: false,
                weekly_plan: WeeklySchedule::new(vec![Weekday::Sun], NaiveTime::MIN),
                daily_reminder: WeeklySchedule::new(vec![Weekday::Mon], NaiveTime::MIN),
            },
        }
    }
}
