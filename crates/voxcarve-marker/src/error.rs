/// An error type for the marker module.
#[derive(thiserror::Error, Debug)]
pub enum MarkerError {
    /// Failed to read the recorded observations.
    #[error("Failed to read marker observations")]
    Io(#[from] std::io::Error),

    /// The recorded observations are not valid JSON.
    #[error("Failed to parse marker observations")]
    Json(#[from] serde_json::Error),

    /// The marker side length must be finite and positive.
    #[error("Invalid marker length {0}")]
    InvalidMarkerLength(f64),
}
