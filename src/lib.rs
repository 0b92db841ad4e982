pub mod config;
pub mod engine;
pub mod pipeline;
pub mod report;
pub mod scheduler;
pub mod store;
pub mod tui;
pub mod twitter;
