//! Repository implementations for database operations

pub mod backtest_run;
pub mod strategy;

pub use backtest_run::*;
pub use strategy::*;
