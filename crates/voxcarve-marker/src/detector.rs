use std::{collections::HashMap, path::Path};

use serde::Deserialize;
use voxcarve_image::ColorImage;

use crate::{error::MarkerError, observation::MarkerObservation};

/// Detects fiducial markers in a frame and estimates their poses.
pub trait MarkerDetector {
    /// Detect the markers visible in `frame`.
    ///
    /// # Arguments
    ///
    /// * `frame` - The color frame.
    /// * `marker_length` - The printed side length of the markers in meters.
    ///
    /// # Returns
    ///
    /// One observation per detected marker, in detection order.
    fn detect(
        &mut self,
        frame: &ColorImage,
        marker_length: f64,
    ) -> Result<Vec<MarkerObservation>, MarkerError>;
}

#[derive(Debug, Deserialize)]
struct RecordedFrame {
    frame: usize,
    #[serde(default)]
    markers: Vec<MarkerObservation>,
}

#[derive(Debug, Deserialize)]
struct Recording {
    marker_length: Option<f64>,
    frames: Vec<RecordedFrame>,
}

/// Replays marker observations produced offline by an external detector.
///
/// The recording is a JSON document of the form
///
/// ```json
/// {
///   "marker_length": 0.05,
///   "frames": [
///     { "frame": 0, "markers": [ { "id": 3, "translation": [0.0, 0.0, 0.4], "rotation": [0.0, 0.0, 0.0] } ] }
///   ]
/// }
/// ```
///
/// Each call to [`MarkerDetector::detect`] returns the observations of the next frame index,
/// or nothing when the frame has no entry. Translations scale linearly with the marker side
/// length, so they are rescaled when the requested length differs from the recorded one.
#[derive(Debug, Clone, Default)]
pub struct RecordedMarkerDetector {
    frames: HashMap<usize, Vec<MarkerObservation>>,
    marker_length: Option<f64>,
    next_frame: usize,
}

impl RecordedMarkerDetector {
    /// Create a detector from already parsed observations.
    pub fn new(frames: HashMap<usize, Vec<MarkerObservation>>, marker_length: Option<f64>) -> Self {
        Self {
            frames,
            marker_length,
            next_frame: 0,
        }
    }

    /// Parse a recording from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, MarkerError> {
        let recording: Recording = serde_json::from_str(json)?;
        if let Some(length) = recording.marker_length {
            if !(length.is_finite() && length > 0.0) {
                return Err(MarkerError::InvalidMarkerLength(length));
            }
        }

        let mut frames: HashMap<usize, Vec<MarkerObservation>> = HashMap::new();
        for entry in recording.frames {
            frames.entry(entry.frame).or_default().extend(entry.markers);
        }

        Ok(Self::new(frames, recording.marker_length))
    }

    /// Read a recording from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, MarkerError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// The index of the frame the next call to `detect` replays.
    pub fn next_frame(&self) -> usize {
        self.next_frame
    }

    /// Number of frames with at least one recorded entry.
    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }
}

impl MarkerDetector for RecordedMarkerDetector {
    fn detect(
        &mut self,
        _frame: &ColorImage,
        marker_length: f64,
    ) -> Result<Vec<MarkerObservation>, MarkerError> {
        if !(marker_length.is_finite() && marker_length > 0.0) {
            return Err(MarkerError::InvalidMarkerLength(marker_length));
        }

        let index = self.next_frame;
        self.next_frame += 1;

        let scale = self
            .marker_length
            .map_or(1.0, |recorded| marker_length / recorded);

        let observations = self
            .frames
            .get(&index)
            .map(|markers| {
                markers
                    .iter()
                    .map(|obs| MarkerObservation {
                        translation: obs.translation * scale,
                        ..*obs
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(observations)
    }
}
