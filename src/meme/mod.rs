pub mod capture;
pub mod composite;
pub mod compress;
pub mod history;
pub mod input;
pub mod loader;
pub mod messages;
pub mod model;
pub mod render;
pub mod save;
pub mod service;
pub mod storage;

pub use capture::{Surface, SurfaceCapture, TemplateSlot};
pub use composite::{Bitmap, RasterCompositor};
pub use history::{HistoryEntry, HistoryStore, SaveOutcome};
pub use messages::{DownloadReport, Notice, NoticeLevel};
pub use model::{Alignment, Color, TextBox, TextBoxField};
pub use service::{MemeSession, SessionConfig};
pub use storage::{FileStorage, MemoryStorage, StoragePort};
