//! Application-wide error types.

use thiserror::Error;

use crate::llm::ProviderError;
use crate::planner::normalize::PlanError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("logger error: {0}")]
    Logger(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("llm error: {0}")]
    Llm(#[from] ProviderError),

    #[error("plan error: {0}")]
    Plan(#[from] PlanError),

    #[error("comms error: {0}")]
    Comms(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
