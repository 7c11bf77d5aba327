//! Validation and normalization of the model's plan JSON.
//!
//! Models asked for "a JSON array" in JSON mode usually wrap it in an object
//! (`{"plan": [...]}`, `{"menu": [...]}` …). The day list is located first,
//! then each day and meal is checked individually: malformed entries are
//! logged and skipped, missing optional fields get placeholder values.

use chrono::NaiveDate;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

/// Wrapper keys tried, in order, before falling back to the first array field.
const WRAPPER_KEYS: [&str; 5] = ["plan", "plans", "weekly_plan", "menu", "recipes"];

pub const MISSING_MACROS: &str = "Macros: not calculated ❌";
const DEFAULT_MEAL_TYPE: &str = "Meal";
const DEFAULT_MEAL_NAME: &str = "Unknown dish";
const DEFAULT_RECIPE: &str = "No full recipe";
const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("model did not return valid JSON: {0}")]
    InvalidJson(String),
    #[error("model returned an object without a list of days")]
    NoDayList,
    #[error("expected a list of days, got {0}")]
    NotAList(&'static str),
    #[error("no valid days in the model response")]
    NoValidDays,
}

/// One meal, with every display field resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanMeal {
    pub meal_type: String,
    pub name: String,
    pub macros: String,
    pub weight_m: String,
    pub weight_w: String,
    pub recipe: String,
}

impl PlanMeal {
    /// Text persisted as the record's full recipe.
    pub fn stored_recipe(&self) -> String {
        format!("Total macros (for two): {}\n\n--- RECIPE ---\n{}", self.macros, self.recipe)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanDay {
    pub day: String,
    pub date: NaiveDate,
    pub meals: Vec<PlanMeal>,
}

/// A validated plan: at least one day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedPlan {
    pub days: Vec<PlanDay>,
}

/// A recipe row ready for insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecipe {
    pub meal_date: NaiveDate,
    pub meal_name: String,
    pub recipe_full: String,
}

impl NormalizedPlan {
    /// One record per meal, in plan order.
    pub fn records(&self) -> Vec<NewRecipe> {
        self.days
            .iter()
            .flat_map(|day| {
                day.meals.iter().map(move |meal| NewRecipe {
                    meal_date: day.date,
                    meal_name: meal.name.clone(),
                    recipe_full: meal.stored_recipe(),
                })
            })
            .collect()
    }

    pub fn meal_count(&self) -> usize {
        self.days.iter().map(|d| d.meals.len()).sum()
    }
}

/// Parse and normalize a raw model reply.
pub fn normalize_plan(raw: &str) -> Result<NormalizedPlan, PlanError> {
    let value: Value = serde_json::from_str(raw).map_err(|e| PlanError::InvalidJson(e.to_string()))?;
    let items = extract_day_list(value)?;

    let days: Vec<PlanDay> = items
        .into_iter()
        .enumerate()
        .filter_map(|(i, item)| normalize_day(i, item))
        .collect();

    if days.is_empty() {
        return Err(PlanError::NoValidDays);
    }
    Ok(NormalizedPlan { days })
}

/// Locate the list of days in the top-level value.
pub fn extract_day_list(value: Value) -> Result<Vec<Value>, PlanError> {
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(mut obj) => {
            for key in WRAPPER_KEYS {
                if matches!(obj.get(key), Some(Value::Array(_))) {
                    debug!(key, "day list found under known wrapper key");
                    if let Some(Value::Array(items)) = obj.remove(key) {
                        return Ok(items);
                    }
                }
            }
            // Map preserves document order (serde_json `preserve_order`).
            match obj.into_iter().find_map(|(key, v)| match v {
                Value::Array(items) => Some((key, items)),
                _ => None,
            }) {
                Some((key, items)) => {
                    debug!(%key, "day list found under first array-valued key");
                    Ok(items)
                }
                None => Err(PlanError::NoDayList),
            }
        }
        other => Err(PlanError::NotAList(type_name(&other))),
    }
}

fn normalize_day(index: usize, item: Value) -> Option<PlanDay> {
    let obj = match item {
        Value::Object(obj) => obj,
        other => {
            warn!(index, kind = type_name(&other), "plan entry is not an object — skipping");
            return None;
        }
    };

    let Some(day) = obj.get("day").and_then(scalar_text) else {
        warn!(index, "plan entry has no 'day' — skipping");
        return None;
    };
    let Some(date_str) = obj.get("date").and_then(Value::as_str) else {
        warn!(index, %day, "plan entry has no 'date' — skipping");
        return None;
    };
    let date = match NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d") {
        Ok(d) => d,
        Err(e) => {
            warn!(index, %day, date = date_str, error = %e, "plan entry has an invalid date — skipping");
            return None;
        }
    };
    let Some(Value::Array(raw_meals)) = obj.get("meals") else {
        warn!(index, %day, "plan entry has no 'meals' list — skipping");
        return None;
    };

    let meals = raw_meals
        .iter()
        .enumerate()
        .filter_map(|(m, meal)| match meal {
            Value::Object(fields) => Some(normalize_meal(fields)),
            other => {
                warn!(index, meal = m, kind = type_name(other), "meal is not an object — skipping");
                None
            }
        })
        .collect();

    Some(PlanDay { day, date, meals })
}

fn normalize_meal(fields: &Map<String, Value>) -> PlanMeal {
    let text = |key: &str| fields.get(key).and_then(scalar_text);

    let macros = text("total_macros_for_two")
        .or_else(|| text("total_kzhbu_for_two"))
        .filter(|s| s != NOT_AVAILABLE)
        .unwrap_or_else(|| MISSING_MACROS.to_string());

    PlanMeal {
        meal_type: text("type").unwrap_or_else(|| DEFAULT_MEAL_TYPE.to_string()),
        name: text("meal_name").unwrap_or_else(|| DEFAULT_MEAL_NAME.to_string()),
        macros,
        weight_m: text("weight_m").unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        weight_w: text("weight_w").unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        recipe: text("recipe_full").unwrap_or_else(|| DEFAULT_RECIPE.to_string()),
    }
}

/// Trimmed, non-empty text of a string or number value.
fn scalar_text(v: &Value) -> Option<String> {
    let s = match v {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEAL: &str = r#"{"type":"Breakfast","meal_name":"Omelette","total_macros_for_two":"Kcal: 1000",
        "weight_m":350,"weight_w":250,"recipe_full":"Beat eggs."}"#;

    fn day(date: &str) -> String {
        format!(r#"{{"day":"Monday","date":"{date}","meals":[{MEAL}]}}"#)
    }

    #[test]
    fn bare_array_is_accepted() {
        let plan = normalize_plan(&format!("[{}]", day("2026-10-19"))).unwrap();
        assert_eq!(plan.days.len(), 1);
        let meal = &plan.days[0].meals[0];
        assert_eq!(meal.name, "Omelette");
        assert_eq!(meal.weight_m, "350");
        assert_eq!(meal.macros, "Kcal: 1000");
    }

    #[test]
    fn known_wrapper_keys_are_unwrapped() {
        for key in WRAPPER_KEYS {
            let raw = format!(r#"{{"{key}":[{}]}}"#, day("2026-10-19"));
            assert_eq!(normalize_plan(&raw).unwrap().days.len(), 1, "key {key}");
        }
    }

    #[test]
    fn known_key_wins_over_earlier_unknown_array() {
        let raw = format!(r#"{{"notes":[1,2],"menu":[{}]}}"#, day("2026-10-19"));
        assert_eq!(normalize_plan(&raw).unwrap().days.len(), 1);
    }

    #[test]
    fn unknown_wrapper_uses_first_array_in_document_order() {
        let raw = format!(
            r#"{{"title":"week","zdays":[{}],"adays":[]}}"#,
            day("2026-10-20")
        );
        let plan = normalize_plan(&raw).unwrap();
        assert_eq!(plan.days[0].date, NaiveDate::from_ymd_opt(2026, 10, 20).unwrap());
    }

    #[test]
    fn object_without_array_errors() {
        assert_eq!(normalize_plan(r#"{"plan":"soon"}"#), Err(PlanError::NoDayList));
    }

    #[test]
    fn scalar_top_level_errors() {
        assert_eq!(normalize_plan("42"), Err(PlanError::NotAList("number")));
        assert!(matches!(normalize_plan("not json"), Err(PlanError::InvalidJson(_))));
    }

    #[test]
    fn malformed_days_are_skipped() {
        let raw = format!(
            r#"[ "junk", {{"day":"Tue","meals":[]}}, {{"day":"Wed","date":"20-10-2026","meals":[]}},
                {{"day":"Thu","date":"2026-10-22"}}, {}]"#,
            day("2026-10-23")
        );
        let plan = normalize_plan(&raw).unwrap();
        assert_eq!(plan.days.len(), 1);
        assert_eq!(plan.days[0].date, NaiveDate::from_ymd_opt(2026, 10, 23).unwrap());
    }

    #[test]
    fn all_days_invalid_is_an_error() {
        assert_eq!(normalize_plan(r#"[1, {"day":"Mon"}]"#), Err(PlanError::NoValidDays));
        assert_eq!(normalize_plan("[]"), Err(PlanError::NoValidDays));
    }

    #[test]
    fn missing_meal_fields_get_placeholders() {
        let raw = r#"[{"day":"Mon","date":"2026-10-19","meals":[{"total_macros_for_two":"  "}, "bad"]}]"#;
        let plan = normalize_plan(raw).unwrap();
        let meals = &plan.days[0].meals;
        assert_eq!(meals.len(), 1);
        assert_eq!(meals[0].macros, MISSING_MACROS);
        assert_eq!(meals[0].name, "Unknown dish");
        assert_eq!(meals[0].meal_type, "Meal");
        assert_eq!(meals[0].weight_w, "N/A");
        assert_eq!(meals[0].recipe, "No full recipe");
    }

    #[test]
    fn na_macros_and_legacy_key() {
        let raw = r#"[{"day":"Mon","date":"2026-10-19","meals":[
            {"meal_name":"A","total_macros_for_two":"N/A"},
            {"meal_name":"B","total_kzhbu_for_two":"Kcal: 500"}]}]"#;
        let plan = normalize_plan(raw).unwrap();
        assert_eq!(plan.days[0].meals[0].macros, MISSING_MACROS);
        assert_eq!(plan.days[0].meals[1].macros, "Kcal: 500");
    }

    #[test]
    fn records_carry_date_and_stored_text() {
        let plan = normalize_plan(&format!("[{},{}]", day("2026-10-19"), day("2026-10-20"))).unwrap();
        let records = plan.records();
        assert_eq!(records.len(), 2);
        assert_eq!(plan.meal_count(), 2);
        assert_eq!(records[1].meal_date, NaiveDate::from_ymd_opt(2026, 10, 20).unwrap());
        assert!(records[0].recipe_full.starts_with("Total macros (for two): Kcal: 1000"));
        assert!(records[0].recipe_full.ends_with("--- RECIPE ---\nBeat eggs."));
    }
}
