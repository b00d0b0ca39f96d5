pub mod auth;
pub mod config;
pub mod error;
pub mod formatter;
pub mod models;
pub mod notifier;
pub mod pace;
pub mod poller;
pub mod source;
pub mod state;
pub mod tracker;
