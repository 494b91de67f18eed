use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Failed to load config: {0}")]
    ConfigError(String),
    #[error("Failed to load page layout: {0}")]
    LayoutError(String),
    #[error("Failed to determine source: {0}")]
    SourceError(String),
    #[error("42 API request failed: {0}")]
    ApiError(String),
    #[error("Unexpected status {status}: {body}")]
    ApiStatus { status: u16, body: String },
    #[error("Invalid time value: {0}")]
    TimeError(String),
    #[error("Failed to fetch attendees: {0}")]
    AttendeeError(String),
    #[error("Failed to draw background: {0}")]
    BackgroundError(String),
    #[error("Failed to create PDF: {0}")]
    PdfError(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<lopdf::Error> for AppError {
    fn from(e: lopdf::Error) -> Self {
        AppError::PdfError(e.to_string())
    }
}
