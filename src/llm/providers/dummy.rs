//! Dummy LLM provider — answers every request with a canned meal plan.
//!
//! Used for offline runs and for exercising the whole generation flow
//! without an API key. Plan dates are lifted from the prompt so the stored
//! records line up with the requested week.

use chrono::NaiveDate;
use serde_json::json;

use crate::llm::{LlmResponse, ProviderError};

const MENU: [(&str, &str, &str, u32, u32); 4] = [
    ("Breakfast", "Oatmeal with berries and cottage cheese", "Kcal: 1000, P: 70g, F: 25g, C: 120g", 450, 350),
    ("Lunch", "Chicken breast with buckwheat", "Kcal: 1300, P: 100g, F: 35g, C: 140g", 500, 400),
    ("Snack", "Greek yogurt with walnuts", "Kcal: 450, P: 30g, F: 18g, C: 40g", 250, 200),
    ("Dinner", "Baked salmon with rice and vegetables", "Kcal: 1250, P: 90g, F: 30g, C: 140g", 480, 380),
];

#[derive(Debug, Clone)]
pub struct DummyProvider;

impl DummyProvider {
    pub async fn complete(
        &self,
        content: &str,
        _system: Option<&str>,
    ) -> Result<LlmResponse, ProviderError> {
        let mut dates = dates_in(content);
        if dates.is_empty() {
            dates.push(NaiveDate::from_ymd_opt(2030, 1, 7).unwrap_or_default());
        }

        let days: Vec<_> = dates
            .iter()
            .enumerate()
            .map(|(i, date)| {
                let meals: Vec<_> = MENU
                    .iter()
                    .map(|(kind, name, macros, weight_m, weight_w)| {
                        json!({
                            "type": kind,
                            "meal_name": format!("{name} #{}", i + 1),
                            "total_macros_for_two": macros,
                            "weight_m": weight_m,
                            "weight_w": weight_w,
                            "recipe_full": format!("Ingredients and steps for {name}."),
                        })
                    })
                    .collect();
                json!({
                    "day": date.format("%A").to_string(),
                    "date": date.format("%Y-%m-%d").to_string(),
                    "meals": meals,
                })
            })
            .collect();

        Ok(LlmResponse { text: json!({ "plan": days }).to_string(), usage: None })
    }
}

/// Distinct `YYYY-MM-DD` dates in `text`, in order of first appearance.
fn dates_in(text: &str) -> Vec<NaiveDate> {
    let bytes = text.as_bytes();
    let mut out: Vec<NaiveDate> = Vec::new();
    for start in 0..bytes.len().saturating_sub(9) {
        if !text.is_char_boundary(start) || !text.is_char_boundary(start + 10) {
            continue;
        }
        if let Ok(d) = NaiveDate::parse_from_str(&text[start..start + 10], "%Y-%m-%d") {
            if !out.contains(&d) {
                out.push(d);
            }
        }
    }
    out
}
