pub mod error;
pub mod logging;
pub mod meme;
pub mod settings;
pub mod templates;
