//! Project files: the store, the navigator over it, and its collaborators.

pub mod editor;
pub mod file;
pub mod navigator;
pub mod storage;
pub mod store;

pub use editor::EditorBinding;
pub use file::{FileId, Language, SourceFile};
pub use navigator::FileNavigator;
pub use storage::{JsonFileStorage, MemoryStorage, ProjectStorage};
pub use store::FileStore;
