pub mod config;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod routes;
pub mod storage;
pub mod telemetry;
pub mod test_type;

use std::sync::Arc;

pub use config::Config;
pub use pipeline::Pipeline;
pub use test_type::TestType;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub pipeline: Arc<Pipeline>,
}
