use crate::meme::history::SaveOutcome;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_NOTICE_DURATION: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

/// Transient user-facing message produced at an operation boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    pub duration: Duration,
}

impl Notice {
    pub fn success(message: impl Into<String>, duration: Duration) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
            duration,
        }
    }

    pub fn error(message: impl Into<String>, duration: Duration) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
            duration,
        }
    }

    pub fn is_success(&self) -> bool {
        self.level == NoticeLevel::Success
    }
}

/// What a download action achieved.
#[derive(Debug)]
pub struct DownloadReport {
    pub notice: Notice,
    /// Where the full-resolution PNG was delivered.
    pub saved_to: Option<PathBuf>,
    /// `None` when the pipeline failed before the history write.
    pub history: Option<SaveOutcome>,
}
