// Public API - the runner plus the collaborator contracts it drives
pub mod catalog;
pub mod exec;
pub mod failover;
pub mod report;
pub mod runner;
pub mod settings;
pub mod telemetry;

// Internal modules
mod capture;
mod config;

pub use capture::RunLog;
