pub mod alerts;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod db;
pub mod market;
pub mod metrics;
pub mod pool;
pub mod scanner;
pub mod signal;

pub mod error;
pub mod logger;
pub mod time;
