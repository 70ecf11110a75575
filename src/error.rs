//! Error types for the composition and persistence pipeline.

use thiserror::Error;

/// The template list could not be obtained.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("template request failed: {0}")]
    Transport(String),

    #[error("template endpoint answered with status {0}")]
    Status(u16),

    #[error("template payload could not be decoded: {0}")]
    Decode(String),

    #[error("template endpoint reported an unsuccessful response")]
    Unsuccessful,
}

/// Rasterization failed outright. No history entry may be written after this.
#[derive(Error, Debug)]
pub enum CompositionError {
    #[error("surface has invalid dimensions {width}x{height}")]
    InvalidSurface { width: u32, height: u32 },

    #[error("image `{0}` has not settled; call settle() before capturing")]
    Unsettled(String),

    #[error("pixel read-back blocked: canvas is tainted by cross-origin image `{0}`")]
    ReadbackBlocked(String),

    #[error("failed to encode bitmap: {0}")]
    Encode(String),
}

/// Persistence failed (quota, serialization or I/O).
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage quota exceeded: {needed} bytes requested, {quota} allowed")]
    QuotaExceeded { needed: usize, quota: usize },

    #[error("failed to serialize history: {0}")]
    Serialize(String),

    #[error("storage I/O error: {0}")]
    Io(String),
}

/// A persisted history entry was malformed. Never surfaced to the user.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("history blob is not a list")]
    NotAList,

    #[error("entry is not an object")]
    NotAnObject,

    #[error("entry field `{0}` is missing or invalid")]
    Field(&'static str),

    #[error("text box {index} is missing or has invalid `{field}`")]
    TextBox { index: usize, field: &'static str },
}

/// A template image could not be loaded. The image slot settles as errored.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to fetch image `{url}`: {reason}")]
    Fetch { url: String, reason: String },

    #[error("failed to read image file `{path}`: {reason}")]
    Read { path: String, reason: String },

    #[error("failed to decode image `{url}`: {reason}")]
    Decode { url: String, reason: String },
}
