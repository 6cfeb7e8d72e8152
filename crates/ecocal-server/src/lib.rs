pub mod api;
pub mod app;
pub mod config;
pub mod event_seed;
pub mod logging;
pub mod retention;
pub mod rule_seed;
pub mod scheduler;
pub mod state;
pub mod summary;
