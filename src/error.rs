/// Error types shared across the application
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The SQLite catalog rejected a query or could not be opened
    #[error("catalog error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Decoding, resizing or encoding an image failed
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// The file holds nothing this app can turn into a bitmap (videos, RAW
    /// files without an embedded preview)
    #[error("no decodable image in {0}")]
    NoImage(std::path::PathBuf),

    #[error("invalid config: {0}")]
    Config(#[from] toml::de::Error),

    /// No platform directory (data, cache, config) could be resolved
    #[error("could not determine the {0} directory")]
    NoDirectory(&'static str),

    /// A blocking task panicked or was aborted
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, Error>;
