//! Hostel core types and collaborator seams

pub mod credential;
pub mod error;
pub mod navigation;
pub mod storage;

pub use credential::Credential;
pub use error::{CoreError, CoreResult};
pub use navigation::{CallbackNavigator, Navigator, NoopNavigator};
pub use storage::{DurableStorage, FileStorage, MemoryStorage};
