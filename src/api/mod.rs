pub mod chart;
pub mod handlers;
pub mod server;

pub use chart::{ChartData, Dataset};
pub use handlers::{ApiError, AppState};
pub use server::{build_router, run_server, ServerConfig};
