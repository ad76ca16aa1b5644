pub mod db;
pub mod history;
pub mod medium;
pub mod session;

pub use db::SqliteMedium;
pub use history::{HistoryStore, STORAGE_KEY};
pub use medium::{MemoryMedium, StorageMedium};
pub use session::{RunInputs, SessionContext, SessionState, SharedSession};
