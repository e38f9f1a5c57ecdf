pub mod model;
pub mod printer;
pub mod recorder;
pub mod serialization;
pub mod storage;

pub use model::HistoryItem;
pub use storage::HistoryStore;
