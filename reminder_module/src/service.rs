mod chat;
mod config;
mod scheduler;
mod server;
mod state;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub use chat::{ChatRelay, DEFAULT_GENERATIVE_MODEL};
pub use config::{
    ConfigError, ServiceConfig, StoreBackend, DEFAULT_MAX_BODY_BYTES, DEFAULT_TIMEZONE,
};
pub use scheduler::{start_scheduler_thread, wait_for_store, SchedulerControl};
pub use server::{build_router, build_store, run_server};
pub use state::AppState;
