pub mod cancel;
pub mod curl;
pub mod dispatcher;
pub mod request;
pub mod response;
pub mod timing;
pub mod types;

// Re-export commonly used types for convenient access
pub use cancel::{CancelHandle, CancelToken};
pub use dispatcher::Dispatcher;
pub use request::RequestData;
pub use response::{FailureKind, ResponseData};
pub use timing::{PhaseTimer, ResponseTiming};
pub use types::Method;
