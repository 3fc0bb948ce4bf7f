pub mod config;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod operations;
pub mod pipeline;
pub mod server;

pub use config::{ApiConfig, AttributionConfig, GatewayConfig, LoggingConfig, ServerConfig};
pub use observability::init_tracing;
pub use pipeline::{Pipeline, RequestContext, Stage, StageInput, StageOutcome};
pub use server::{AppState, FhirGateServer, ServerBuilder, build_app};
