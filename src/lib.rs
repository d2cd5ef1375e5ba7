pub mod config;
pub mod errors;
pub mod formatter;
pub mod guard;
pub mod inspector;
pub mod notify;
pub mod runner;
pub mod ui;
