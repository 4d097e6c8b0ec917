//! Error types for Tubecast

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TubecastError>;

#[derive(Error, Debug)]
pub enum TubecastError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    #[error("Metadata generation error: {0}")]
    Metadata(#[from] MetadataError),

    #[error("Invalid status transition for post {id}: {from} -> {to}")]
    InvalidTransition { id: i64, from: String, to: String },

    #[error("Scheduled post not found: {0}")]
    NotFound(i64),
}

impl TubecastError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            TubecastError::Validation(_) => 3,
            TubecastError::Metadata(MetadataError::Validation(_)) => 3,
            TubecastError::NotFound(_) => 3,
            TubecastError::Auth(_) => 2,
            TubecastError::Upload(UploadError::Auth(_)) => 2,
            TubecastError::Metadata(MetadataError::MissingApiKey) => 2,
            TubecastError::Config(_) => 2,
            TubecastError::Database(_) => 1,
            TubecastError::Upload(_) => 1,
            TubecastError::Metadata(_) => 1,
            TubecastError::InvalidTransition { .. } => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database operation failed: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Corrupt record {id}: {message}")]
    CorruptRecord { id: i64, message: String },
}

/// Failure to obtain a usable platform credential
#[derive(Error, Debug, Clone)]
pub enum AuthError {
    #[error("Token file not found: {0}. Complete the OAuth consent flow first.")]
    MissingToken(String),

    #[error("Token file is invalid: {0}")]
    InvalidToken(String),

    #[error("Token expired and cannot be refreshed: {0}")]
    RefreshUnavailable(String),

    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),
}

/// Classified outcome of a failed upload attempt
///
/// Every variant is terminal for the current attempt. The adapter never
/// retries on its own.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    /// The remote API answered with a non-success HTTP status
    #[error("Platform API error: {status} - {body}")]
    Platform { status: u16, body: String },

    /// File, network or serialization failure before a usable answer arrived
    #[error("Transport error: {0}")]
    Transport(String),

    /// No valid credential was available for the attempt
    #[error("Authentication failed: {0}")]
    Auth(String),
}

impl From<AuthError> for UploadError {
    fn from(e: AuthError) -> Self {
        UploadError::Auth(e.to_string())
    }
}

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("GEMINI_API_KEY is not configured")]
    MissingApiKey,

    #[error("{0}")]
    Validation(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Could not parse model response: {0}")]
    Parse(String),
}
