pub mod config;
pub mod error;
pub mod formatter;
pub mod history;
pub mod http;
pub mod logger;
pub mod workbench;

mod utils;

// Re-export commonly used types
pub use config::{Config, ConfigLoader};
pub use error::{ReqbenchError, Result};
pub use formatter::ResponseType;
pub use history::{HistoryItem, HistoryStore};
pub use http::{CancelToken, Dispatcher, RequestData, ResponseData, ResponseTiming};
pub use workbench::Workbench;
