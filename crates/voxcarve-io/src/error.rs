/// An error type for the io module.
#[derive(thiserror::Error, Debug)]
pub enum IoError {
    /// Error when the file does not exist.
    #[error("File does not exist: {0}")]
    FileDoesNotExist(std::path::PathBuf),

    /// Invalid file extension.
    #[error("File does not have a valid extension: {0}")]
    InvalidFileExtension(std::path::PathBuf),

    /// Error to open the file.
    #[error("Failed to manipulate the file. {0}")]
    FileError(#[from] std::io::Error),

    /// Error to create the image.
    #[error("Failed to create image. {0}")]
    ImageCreationError(#[from] voxcarve_image::ImageError),

    /// Error to decode or encode the image.
    #[error("Failed to decode the image. {0}")]
    ImageDecodeError(#[from] image::ImageError),

    /// Error to parse the calibration file.
    #[error("Failed to parse the calibration file. {0}")]
    CalibrationParseError(#[from] serde_json::Error),

    /// The calibration values do not describe a valid camera.
    #[error("Invalid calibration. {0}")]
    InvalidCalibration(#[from] voxcarve_3d::camera::CameraError),

    /// No frames were found for a frame sequence.
    #[error("No frames found at {0}")]
    EmptySequence(std::path::PathBuf),
}
