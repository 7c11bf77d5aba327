//! Meal-planning bot — weekly LLM meal plans with a recipe history, delivered
//! over Telegram.

pub mod config;
pub mod error;
pub mod llm;
pub mod logger;
pub mod planner;
pub mod store;
pub mod subsystems;
