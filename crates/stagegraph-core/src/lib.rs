pub mod config;
pub mod graph;
pub mod models;
pub mod orchestration;
pub mod persistence;
pub mod providers;
pub mod sqlite;
pub mod tasks;
pub mod telemetry;
