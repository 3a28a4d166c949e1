pub mod config;
pub mod context;
pub mod device;
pub mod errors;
pub mod perception;
pub mod storage;
pub mod tools;

pub use config::Settings;
pub use context::{StepRecord, StepStatus, TaskContext};
pub use errors::{TapFlowError, TapFlowResult};
pub use tools::{TaskRuntime, ToolResult};

/// Initializes tracing from RUST_LOG (default "info") and loads .env if
/// present. Call once at process start; embedding applications that manage
/// their own subscriber should skip this.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Load .env file if present (ignore error if not found)
    let _ = dotenvy::dotenv();
}
