pub mod config;
pub mod extract;
pub mod fetcher;
pub mod metrics;
pub mod scheduler;
pub mod tables;
pub mod types;
pub mod web;
