use std::fmt;

use thiserror::Error;

/// Why a capture was turned away before any dimensions were estimated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RejectionReason {
    /// The detector found no tree candidate in the image.
    NoDetection,
    /// The tree does not leave the required margin on every side.
    NotCentered,
    /// The tree touches or crosses the image border.
    OutOfFrame,
}

impl RejectionReason {
    /// Prompt suitable for asking the user to recapture.
    pub fn user_message(self) -> &'static str {
        match self {
            RejectionReason::NoDetection => {
                "No tree was found in the photo. Please recapture with the tree in view."
            }
            RejectionReason::NotCentered => {
                "Tree is not centered or lacks space on all sides. Please recapture."
            }
            RejectionReason::OutOfFrame => {
                "Tree extends beyond the edge of the photo. Please step back and recapture."
            }
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RejectionReason::NoDetection => "no tree detected",
            RejectionReason::NotCentered => "tree is not centered",
            RejectionReason::OutOfFrame => "tree is out of frame",
        };
        f.write_str(name)
    }
}

/// Failure of a measurement run: a rejected capture, invalid configuration,
/// or unreadable input.
#[derive(Debug, Error)]
pub enum MeasureError {
    /// The capture was turned away; ask the user to retake it.
    #[error("capture rejected: {0}")]
    Rejected(RejectionReason),

    /// Sensor width is not finite and positive.
    #[error("sensor width must be finite and > 0, got {0}")]
    InvalidSensorWidth(f64),

    /// Assumed camera-to-tree distance is not finite and positive.
    #[error("assumed subject distance must be finite and > 0, got {0}")]
    InvalidDistance(f64),

    /// Focal length is unusable for estimation.
    #[error("focal length must be finite and >= 0, got {0}")]
    InvalidFocalLength(f64),

    /// Margin policy threshold outside `[0, 0.5)`.
    #[error("margin threshold must be in [0, 0.5), got {0}")]
    InvalidMarginThreshold(f64),

    /// Input bytes are not a decodable image.
    #[error("failed to decode image: {0}")]
    DecodeError(String),

    /// The image has no pixels.
    #[error("image dimensions are zero")]
    ZeroDimensions,
}

impl MeasureError {
    /// The rejection reason, if this error is a detection or framing failure.
    pub fn rejection(&self) -> Option<RejectionReason> {
        match self {
            MeasureError::Rejected(reason) => Some(*reason),
            _ => None,
        }
    }

    /// Whether the error stems from invalid camera or policy configuration.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            MeasureError::InvalidSensorWidth(_)
                | MeasureError::InvalidDistance(_)
                | MeasureError::InvalidFocalLength(_)
                | MeasureError::InvalidMarginThreshold(_)
        )
    }
}

impl From<RejectionReason> for MeasureError {
    fn from(reason: RejectionReason) -> Self {
        MeasureError::Rejected(reason)
    }
}
