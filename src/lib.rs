pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use services::analysis_run::{run_offline, run_online, AnalysisRun, RunOutcome};
