pub mod api_connection;
pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod persistence;
pub mod plan_store;
pub mod planner;
pub mod profile;
pub mod recipe;
pub mod reminders;
pub mod search;
pub mod service;
