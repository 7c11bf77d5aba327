//! Prompt construction for weekly plan generation.
//!
//! The template lives in `config/prompts/weekly_plan.txt` and is embedded at
//! compile time; `[planner] prompt_file` can point at a replacement. Template
//! variables use `{{name}}` placeholders.

use std::fs;
use std::path::Path;

use chrono::{Datelike, Duration, NaiveDate};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

/// Built-in weekly plan template.
pub const DEFAULT_TEMPLATE: &str = include_str!("../../config/prompts/weekly_plan.txt");

/// System message sent alongside every generation request.
pub const SYSTEM_PROMPT: &str = "You are a system that generates JSON objects containing a list of \
recipes. Your answer must be JSON only, without comments. Use the SCHEMA provided in the request.";

/// One person's daily nutrition target.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Person {
    pub label: String,
    pub kcal: u32,
    pub protein_g: u32,
    pub fat_g: u32,
    pub carbs_g: u32,
}

impl Person {
    fn describe(&self) -> String {
        format!(
            "{} kcal, {}g protein, {}g fat, {}g carbohydrates",
            self.kcal, self.protein_g, self.fat_g, self.carbs_g
        )
    }
}

/// A meal slot and its combined (for everyone) calorie range.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MealSlot {
    pub name: String,
    pub kcal_min: u32,
    pub kcal_max: u32,
}

/// Everything the prompt needs to know about the household's goals.
#[derive(Debug, Clone)]
pub struct NutritionTargets {
    pub people: Vec<Person>,
    pub meals: Vec<MealSlot>,
    pub max_deviation_kcal: u32,
    pub max_cook_minutes: u32,
}

impl NutritionTargets {
    /// Sum of every person's daily target.
    pub fn combined(&self) -> Person {
        self.people.iter().fold(
            Person { label: "Combined".into(), kcal: 0, protein_g: 0, fat_g: 0, carbs_g: 0 },
            |acc, p| Person {
                label: acc.label,
                kcal: acc.kcal + p.kcal,
                protein_g: acc.protein_g + p.protein_g,
                fat_g: acc.fat_g + p.fat_g,
                carbs_g: acc.carbs_g + p.carbs_g,
            },
        )
    }
}

/// Dates for the next plan: `count` consecutive days starting from the next
/// Monday strictly after `today` (a Monday yields the following Monday).
pub fn plan_dates(today: NaiveDate, count: u32) -> Vec<NaiveDate> {
    let offset = 7 - i64::from(today.weekday().num_days_from_monday());
    let start = today + Duration::days(offset);
    (0..count).map(|i| start + Duration::days(i64::from(i))).collect()
}

/// JSON Schema describing the expected model response.
pub fn response_schema(meals: &[MealSlot]) -> Value {
    let names: Vec<&str> = meals.iter().map(|m| m.name.as_str()).collect();
    json!({
        "type": "array",
        "items": {
            "type": "object",
            "properties": {
                "day": { "type": "string", "description": "Day of the week (e.g. Monday)" },
                "date": { "type": "string", "description": "Date in YYYY-MM-DD format" },
                "meals": {
                    "type": "array",
                    "description": format!("List of {} meals: {}.", names.len(), names.join(", ")),
                    "items": {
                        "type": "object",
                        "properties": {
                            "type": { "type": "string", "description": format!("Meal type (strictly one of: {})", names.join(", ")) },
                            "meal_name": { "type": "string", "description": "Short dish name" },
                            "total_macros_for_two": { "type": "string", "description": "Combined macros of the dish for both portions. Format: 'Kcal: X, P: Yg, F: Zg, C: Wg'." },
                            "weight_m": { "type": "integer", "description": "Recommended portion weight for the man in grams (integer)." },
                            "weight_w": { "type": "integer", "description": "Recommended portion weight for the woman in grams (integer)." },
                            "recipe_full": { "type": "string", "description": "Full recipe: ingredients with quantities, cooking steps." }
                        },
                        "required": ["type", "meal_name", "total_macros_for_two", "weight_m", "weight_w", "recipe_full"]
                    }
                }
            },
            "required": ["day", "date", "meals"]
        }
    })
}

/// Load the prompt template, falling back to [`DEFAULT_TEMPLATE`] when the
/// override file is unset or unreadable.
pub fn load_template(path: Option<&Path>) -> String {
    let Some(path) = path else {
        return DEFAULT_TEMPLATE.to_string();
    };
    match fs::read_to_string(path) {
        Ok(text) => {
            debug!(path = %path.display(), "loaded prompt template override");
            text
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cannot read prompt template — using built-in");
            DEFAULT_TEMPLATE.to_string()
        }
    }
}

/// Render the generation prompt.
///
/// `exclusion_days` only names the window in the exclusion clause; the
/// clause is omitted entirely when `exclusions` is empty.
pub fn build_prompt(
    template: &str,
    targets: &NutritionTargets,
    dates: &[NaiveDate],
    exclusions: &[String],
    exclusion_days: u32,
) -> String {
    let dates_str = dates
        .iter()
        .map(|d| format!("\"{}\"", d.format("%Y-%m-%d")))
        .collect::<Vec<_>>()
        .join(", ");

    let people = targets
        .people
        .iter()
        .map(|p| format!("- {}: {}", p.label, p.describe()))
        .collect::<Vec<_>>()
        .join("\n");

    let meals = targets
        .meals
        .iter()
        .map(|m| format!("   - {}: **{}-{} kcal**", m.name, m.kcal_min, m.kcal_max))
        .collect::<Vec<_>>()
        .join("\n");

    let meal_names = targets.meals.iter().map(|m| m.name.as_str()).collect::<Vec<_>>().join(", ");

    let exclusions_str = if exclusions.is_empty() {
        String::new()
    } else {
        format!(
            "\nEXTREMELY IMPORTANT: The following dishes from the history (last {exclusion_days} days) must NOT be used: {}",
            exclusions.join(", ")
        )
    };

    let schema = serde_json::to_string_pretty(&response_schema(&targets.meals))
        .unwrap_or_else(|_| "[]".to_string());

    let total = targets.combined();

    render(
        template,
        &[
            ("day_count", dates.len().to_string()),
            ("meal_count", targets.meals.len().to_string()),
            ("meal_names", meal_names),
            ("dates", format!("[{dates_str}]")),
            ("people", people),
            ("total", total.describe()),
            ("total_kcal", total.kcal.to_string()),
            ("meals", meals),
            ("max_deviation", targets.max_deviation_kcal.to_string()),
            ("max_minutes", targets.max_cook_minutes.to_string()),
            ("exclusions", exclusions_str),
            ("schema", schema),
        ],
    )
}

/// Substitute `{{name}}` placeholders in one pass. Substituted values are
/// never scanned again; unknown placeholders are left as they are.
fn render(template: &str, vars: &[(&str, String)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            rest = &rest[start..];
            break;
        };
        let name = &after[..end];
        match vars.iter().find(|(key, _)| *key == name) {
            Some((_, value)) => out.push_str(value),
            None => out.push_str(&rest[start..start + 2 + end + 2]),
        }
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn targets() -> NutritionTargets {
        NutritionTargets {
            people: vec![
                Person { label: "Man".into(), kcal: 2204, protein_g: 165, fat_g: 61, carbs_g: 248 },
                Person { label: "Woman".into(), kcal: 1703, protein_g: 128, fat_g: 47, carbs_g: 192 },
            ],
            meals: vec![
                MealSlot { name: "Breakfast".into(), kcal_min: 900, kcal_max: 1100 },
                MealSlot { name: "Dinner".into(), kcal_min: 1200, kcal_max: 1400 },
            ],
            max_deviation_kcal: 100,
            max_cook_minutes: 60,
        }
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn combined_sums_people() {
        let c = targets().combined();
        assert_eq!((c.kcal, c.protein_g, c.fat_g, c.carbs_g), (3907, 293, 108, 440));
    }

    #[test]
    fn plan_starts_next_monday() {
        // 2026-10-18 is a Sunday.
        let dates = plan_dates(ymd(2026, 10, 18), 5);
        assert_eq!(dates.first(), Some(&ymd(2026, 10, 19)));
        assert_eq!(dates.last(), Some(&ymd(2026, 10, 23)));
        assert_eq!(dates.len(), 5);
    }

    #[test]
    fn plan_from_monday_skips_a_week() {
        let dates = plan_dates(ymd(2026, 10, 19), 1);
        assert_eq!(dates, vec![ymd(2026, 10, 26)]);
    }

    #[test]
    fn plan_mid_week() {
        // Wednesday → following Monday.
        let dates = plan_dates(ymd(2026, 10, 21), 2);
        assert_eq!(dates, vec![ymd(2026, 10, 26), ymd(2026, 10, 27)]);
    }

    #[test]
    fn prompt_without_exclusions_has_no_clause() {
        let p = build_prompt(DEFAULT_TEMPLATE, &targets(), &plan_dates(ymd(2026, 10, 18), 5), &[], 21);
        assert!(!p.contains("must NOT be used"));
        assert!(p.contains("\"2026-10-19\""));
        assert!(p.contains("3907"));
        assert!(p.contains("Breakfast: **900-1100 kcal**"));
        assert!(!p.contains("{{"), "unrendered placeholder left in prompt");
    }

    #[test]
    fn prompt_lists_exclusions() {
        let excl = vec!["Omelette".to_string(), "Pilaf".to_string()];
        let p = build_prompt(DEFAULT_TEMPLATE, &targets(), &plan_dates(ymd(2026, 10, 18), 5), &excl, 21);
        assert!(p.contains("last 21 days"));
        assert!(p.contains("Omelette, Pilaf"));
    }

    #[test]
    fn placeholders_inside_dish_names_stay_literal() {
        let excl = vec!["Pie {{schema}}".to_string(), "Stew {{people}}".to_string()];
        let p = build_prompt(DEFAULT_TEMPLATE, &targets(), &[ymd(2026, 10, 19)], &excl, 21);
        assert!(p.contains("Pie {{schema}}, Stew {{people}}"));
        assert_eq!(p.matches("\"required\"").count(), 2);
    }

    #[test]
    fn render_leaves_unknown_and_unclosed_placeholders() {
        let vars = [("a", "1".to_string())];
        assert_eq!(render("{{a}}-{{b}}-{{a", &vars), "1-{{b}}-{{a");
        assert_eq!(render("no vars", &vars), "no vars");
    }

    #[test]
    fn prompt_embeds_schema() {
        let p = build_prompt(DEFAULT_TEMPLATE, &targets(), &[ymd(2026, 10, 19)], &[], 21);
        assert!(p.contains("\"total_macros_for_two\""));
        assert!(p.contains("Breakfast, Dinner"));
    }

    #[test]
    fn schema_requires_day_fields() {
        let s = response_schema(&targets().meals);
        assert_eq!(s["type"], "array");
        assert_eq!(s["items"]["required"], json!(["day", "date", "meals"]));
    }

    #[test]
    fn missing_template_file_falls_back() {
        let t = load_template(Some(Path::new("/nonexistent/prompt.txt")));
        assert_eq!(t, DEFAULT_TEMPLATE);
    }
}
