//! Long-running parts of the bot: chat channels, the scheduler and the
//! runtime that drives them.

pub mod comms;
pub mod cron;
pub mod runtime;
