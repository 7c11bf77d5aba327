//! Tests for the weekly-plan prompt template in config/prompts

use std::fs;

const TEMPLATE: &str = "config/prompts/weekly_plan.txt";

#[test]
fn test_weekly_plan_prompt_file_exists() {
    assert!(fs::metadata(TEMPLATE).is_ok(), "weekly_plan.txt prompt file missing");
}

#[test]
fn test_weekly_plan_prompt_template_vars() {
    let text = fs::read_to_string(TEMPLATE).unwrap();
    for var in ["{{dates}}", "{{people}}", "{{meals}}", "{{exclusions}}", "{{schema}}"] {
        assert!(text.contains(var), "weekly_plan.txt should contain {var} variable");
    }
}

#[test]
fn test_weekly_plan_prompt_matches_embedded_default() {
    let text = fs::read_to_string(TEMPLATE).unwrap();
    assert_eq!(text, mealplan_bot::planner::prompt::DEFAULT_TEMPLATE);
}
