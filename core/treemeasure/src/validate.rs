use crate::detector::BoundingBox;
use crate::error::{MeasureError, RejectionReason};

/// Minimum margin, as a fraction of the image dimension, required on every
/// side by [`ValidationPolicy::Margin`] unless configured otherwise.
pub const DEFAULT_MIN_MARGIN: f64 = 0.10;

/// Rule deciding whether a capture is well composed.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ValidationPolicy {
    /// Tree must leave at least `min_margin` (fraction of width/height) of
    /// free space on all four sides.
    Margin {
        /// Required fraction per side, in `[0, 0.5)`.
        min_margin: f64,
    },
    /// Tree must lie strictly inside the image, not touching any edge.
    Containment,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        ValidationPolicy::margin()
    }
}

impl ValidationPolicy {
    /// Margin policy with the default 10% threshold.
    pub fn margin() -> Self {
        ValidationPolicy::Margin {
            min_margin: DEFAULT_MIN_MARGIN,
        }
    }

    /// Check the policy parameters.
    pub fn check(&self) -> Result<(), MeasureError> {
        match *self {
            ValidationPolicy::Margin { min_margin }
                if !(min_margin.is_finite() && (0.0..0.5).contains(&min_margin)) =>
            {
                Err(MeasureError::InvalidMarginThreshold(min_margin))
            }
            _ => Ok(()),
        }
    }
}

/// Outcome of frame validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationVerdict {
    /// The capture may be measured.
    Accepted,
    /// The capture must be retaken.
    Rejected {
        /// Why the capture was refused.
        reason: RejectionReason,
    },
}

impl ValidationVerdict {
    /// `Ok(())` when accepted, the rejection reason otherwise.
    pub fn into_result(self) -> Result<(), RejectionReason> {
        match self {
            ValidationVerdict::Accepted => Ok(()),
            ValidationVerdict::Rejected { reason } => Err(reason),
        }
    }

    fn rejected(reason: RejectionReason) -> Self {
        ValidationVerdict::Rejected { reason }
    }
}

/// Free space on each side of a box, normalized by the image dimension.
/// Negative when the box extends past that edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameMargins {
    /// `x_min / width`
    pub left: f64,
    /// `(width - x_max) / width`
    pub right: f64,
    /// `y_min / height`
    pub top: f64,
    /// `(height - y_max) / height`
    pub bottom: f64,
}

impl FrameMargins {
    /// Margins of `bbox` inside a `width` × `height` image.
    pub fn of(bbox: &BoundingBox, width: u32, height: u32) -> Self {
        let (w, h) = (width as f64, height as f64);
        Self {
            left: bbox.x_min() / w,
            right: (w - bbox.x_max()) / w,
            top: bbox.y_min() / h,
            bottom: (h - bbox.y_max()) / h,
        }
    }

    /// The tightest of the four margins.
    pub fn min(&self) -> f64 {
        self.left.min(self.right).min(self.top).min(self.bottom)
    }
}

/// Apply `policy` to a detection in a `width` × `height` image.
///
/// A missing detection is always rejected with [`RejectionReason::NoDetection`].
pub fn validate_frame(
    policy: &ValidationPolicy,
    bbox: Option<&BoundingBox>,
    width: u32,
    height: u32,
) -> ValidationVerdict {
    let Some(bbox) = bbox else {
        return ValidationVerdict::rejected(RejectionReason::NoDetection);
    };

    match *policy {
        ValidationPolicy::Margin { min_margin } => {
            let margins = FrameMargins::of(bbox, width, height);
            tracing::debug!(?margins, min_margin, "checking frame margins");
            if [margins.left, margins.right, margins.top, margins.bottom]
                .iter()
                .all(|&m| m >= min_margin)
            {
                ValidationVerdict::Accepted
            } else {
                ValidationVerdict::rejected(RejectionReason::NotCentered)
            }
        }
        ValidationPolicy::Containment => {
            let (w, h) = (width as f64, height as f64);
            let inside = bbox.x_min() > 0.0
                && bbox.y_min() > 0.0
                && bbox.x_max() < w
                && bbox.y_max() < h;
            if inside {
                ValidationVerdict::Accepted
            } else {
                ValidationVerdict::rejected(RejectionReason::OutOfFrame)
            }
        }
    }
}
