use std::fmt;

use image::RgbImage;

use crate::detector::{BoundingBox, Detector};
use crate::error::{MeasureError, RejectionReason};
use crate::estimate::{
    estimate, CameraParameters, MeasurementResult, DEFAULT_ASSUMED_DISTANCE_MM,
    DEFAULT_SENSOR_WIDTH_MM,
};
use crate::focal::{FocalLengthRaw, FocalLengthResolver, FocalOrigin};
use crate::validate::{validate_frame, ValidationPolicy, ValidationVerdict};

/// Every assumption one measurement run depends on.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MeasurePolicy {
    /// Framing rule applied before estimation.
    pub validation: ValidationPolicy,
    /// Physical sensor width in millimetres.
    pub sensor_width_mm: f64,
    /// Assumed camera-to-tree distance in millimetres.
    pub assumed_distance_mm: f64,
    /// Focal-length normalization, including its fallback value.
    pub focal: FocalLengthResolver,
}

impl Default for MeasurePolicy {
    fn default() -> Self {
        Self {
            validation: ValidationPolicy::default(),
            sensor_width_mm: DEFAULT_SENSOR_WIDTH_MM,
            assumed_distance_mm: DEFAULT_ASSUMED_DISTANCE_MM,
            focal: FocalLengthResolver::default(),
        }
    }
}

impl MeasurePolicy {
    /// Check every configurable value before any work is done.
    pub fn check(&self) -> Result<(), MeasureError> {
        self.validation.check()?;
        let default_mm = self.focal.default_mm;
        if !(default_mm.is_finite() && default_mm > 0.0) {
            return Err(MeasureError::InvalidFocalLength(default_mm));
        }
        CameraParameters {
            focal_length_mm: default_mm,
            sensor_width_mm: self.sensor_width_mm,
            assumed_distance_mm: self.assumed_distance_mm,
        }
        .validate()
    }
}

/// Progress of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    /// Nothing done yet.
    Start,
    /// Focal length normalized.
    FocalResolved,
    /// Detector has run (with or without a result).
    Detected,
    /// Frame accepted by the validation policy.
    Validated,
    /// Dimensions computed.
    Estimated,
    /// Capture refused.
    Rejected,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Start => "start",
            PipelineStage::FocalResolved => "focal-resolved",
            PipelineStage::Detected => "detected",
            PipelineStage::Validated => "validated",
            PipelineStage::Estimated => "estimated",
            PipelineStage::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

/// Full report of a successful measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Measurement {
    /// Estimated dimensions.
    pub result: MeasurementResult,
    /// Box the estimate was computed from.
    pub bounding_box: BoundingBox,
    /// Focal length the estimate used, in millimetres.
    pub focal_length_mm: f64,
    /// Whether the focal length came from metadata or the fallback.
    pub focal_origin: FocalOrigin,
    /// Source image width in pixels.
    pub image_width: u32,
    /// Source image height in pixels.
    pub image_height: u32,
    /// Fraction of the image width covered by the tree.
    pub width_fraction: f64,
    /// Fraction of the image height covered by the tree.
    pub height_fraction: f64,
}

fn advance(stage: &mut PipelineStage, next: PipelineStage) {
    tracing::debug!(from = %stage, to = %next, "pipeline stage");
    *stage = next;
}

fn reject(stage: &mut PipelineStage, reason: RejectionReason) -> MeasureError {
    advance(stage, PipelineStage::Rejected);
    tracing::info!(%reason, "capture rejected");
    MeasureError::Rejected(reason)
}

/// Measure the tree in `image`.
///
/// Resolves the focal length, runs `detector`, validates the framing under
/// `policy.validation`, and only then estimates dimensions. Rejected captures
/// never reach the estimator.
pub fn measure(
    image: &RgbImage,
    focal_length_raw: Option<&FocalLengthRaw>,
    policy: &MeasurePolicy,
    detector: &dyn Detector,
) -> Result<Measurement, MeasureError> {
    policy.check()?;
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(MeasureError::ZeroDimensions);
    }

    let mut stage = PipelineStage::Start;

    let (focal_length_mm, focal_origin) = policy.focal.resolve_with_origin(focal_length_raw);
    advance(&mut stage, PipelineStage::FocalResolved);

    let bbox = detector.locate(image);
    advance(&mut stage, PipelineStage::Detected);
    tracing::debug!(?bbox, width, height, "detector finished");

    let verdict = validate_frame(&policy.validation, bbox.as_ref(), width, height);
    let bbox = match (verdict, bbox) {
        (ValidationVerdict::Accepted, Some(bbox)) => bbox,
        (ValidationVerdict::Rejected { reason }, _) => return Err(reject(&mut stage, reason)),
        (ValidationVerdict::Accepted, None) => {
            return Err(reject(&mut stage, RejectionReason::NoDetection))
        }
    };
    advance(&mut stage, PipelineStage::Validated);

    let camera = CameraParameters {
        focal_length_mm,
        sensor_width_mm: policy.sensor_width_mm,
        assumed_distance_mm: policy.assumed_distance_mm,
    };
    let result = estimate(&bbox, &camera, width, height);
    advance(&mut stage, PipelineStage::Estimated);

    tracing::info!(
        height_m = result.height_m,
        width_m = result.width_m,
        crown_size_m = result.crown_size_m,
        focal_length_mm,
        "tree measured"
    );

    Ok(Measurement {
        result,
        bounding_box: bbox,
        focal_length_mm,
        focal_origin,
        image_width: width,
        image_height: height,
        width_fraction: bbox.width() / width as f64,
        height_fraction: bbox.height() / height as f64,
    })
}
