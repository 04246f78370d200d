//! Tree measurement: locate a tree in a photo, check the framing, and estimate
//! its height, width and crown size with a pinhole camera model.
//!
//! # Example
//!
//! ```no_run
//! use treemeasure::{FocalLengthRaw, TreeMeasurer, ValidationPolicy};
//!
//! let raw_bytes = std::fs::read("tree.jpg").unwrap();
//! let measurement = TreeMeasurer::new(raw_bytes)
//!     .unwrap()
//!     .focal_length(FocalLengthRaw::Rational { numerator: 26, denominator: 1 })
//!     .validation(ValidationPolicy::margin())
//!     .measure()
//!     .unwrap();
//! println!(
//!     "height {} m, width {} m, crown {} m",
//!     measurement.result.height_m, measurement.result.width_m, measurement.result.crown_size_m
//! );
//! ```
#![warn(missing_docs)]

pub mod color_segmentation;
mod decode;
/// Detector trait, bounding boxes and the fixed, placeholder and model-backed detectors.
pub mod detector;
mod error;
/// Pinhole-camera dimension estimation.
pub mod estimate;
/// Focal-length normalization.
pub mod focal;
/// Orchestration of resolve → detect → validate → estimate.
pub mod pipeline;
/// Frame validation policies.
pub mod validate;

pub use color_segmentation::{ColorSegmentationConfig, ColorSegmentationDetector, HueBand};
/// Image decoding helpers used by [`TreeMeasurer::new`].
pub use decode::{decode_image, detect_format, flatten_alpha};
pub use detector::{
    BoundingBox, Candidate, Detector, FixedDetector, ModelDetector, ObjectDetector,
    PlaceholderDetector,
};
/// Error type and rejection reasons returned by measurement operations.
pub use error::{MeasureError, RejectionReason};
pub use estimate::{estimate, CameraParameters, MeasurementResult};
pub use focal::{FocalLengthRaw, FocalLengthResolver, FocalOrigin};
pub use pipeline::{measure, MeasurePolicy, Measurement, PipelineStage};
pub use validate::{validate_frame, FrameMargins, ValidationPolicy, ValidationVerdict};

use image::{DynamicImage, RgbImage};

/// Builder for measuring a tree in one photo.
///
/// Decodes the input image on construction, then runs the measurement
/// pipeline with configurable camera assumptions, framing policy and detector.
pub struct TreeMeasurer {
    image: RgbImage,
    focal_length: Option<FocalLengthRaw>,
    policy: MeasurePolicy,
    /// User-provided detector. When `None`, a [`ColorSegmentationDetector`]
    /// with foliage-green defaults is used.
    detector: Option<Box<dyn Detector>>,
}

impl TreeMeasurer {
    /// Create a new measurer from raw image bytes (JPEG, PNG, or WebP).
    pub fn new(input: Vec<u8>) -> Result<Self, MeasureError> {
        // Validate the format before paying for a full decode.
        detect_format(&input)?;
        let decoded = decode_image(&input)?;
        Ok(Self::from_image(&decoded))
    }

    /// Create a new measurer from an already decoded image.
    pub fn from_image(image: &DynamicImage) -> Self {
        Self {
            image: flatten_alpha(image),
            focal_length: None,
            policy: MeasurePolicy::default(),
            detector: None,
        }
    }

    /// Set the focal length extracted from the capture metadata.
    ///
    /// When unset (or unusable), the default focal length applies and the
    /// returned [`Measurement::focal_origin`] reports [`FocalOrigin::Default`].
    pub fn focal_length(mut self, raw: impl Into<FocalLengthRaw>) -> Self {
        self.focal_length = Some(raw.into());
        self
    }

    /// Set the framing policy (default: 10% margin on every side).
    pub fn validation(mut self, policy: ValidationPolicy) -> Self {
        self.policy.validation = policy;
        self
    }

    /// Set the physical sensor width in millimetres (default: 36.0).
    pub fn sensor_width_mm(mut self, sensor_width_mm: f64) -> Self {
        self.policy.sensor_width_mm = sensor_width_mm;
        self
    }

    /// Set the assumed camera-to-tree distance in millimetres (default: 5000.0).
    pub fn assumed_distance_mm(mut self, distance_mm: f64) -> Self {
        self.policy.assumed_distance_mm = distance_mm;
        self
    }

    /// Set the focal length used when metadata is missing (default: 50.0).
    pub fn default_focal_length_mm(mut self, focal_length_mm: f64) -> Self {
        self.policy.focal = FocalLengthResolver::with_default(focal_length_mm);
        self
    }

    /// Replace the whole policy at once.
    pub fn policy(mut self, policy: MeasurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Provide a custom detector implementation.
    ///
    /// ```no_run
    /// use image::RgbImage;
    /// use treemeasure::{BoundingBox, Detector, TreeMeasurer};
    ///
    /// struct MyDetector;
    /// impl Detector for MyDetector {
    ///     fn locate(&self, image: &RgbImage) -> Option<BoundingBox> {
    ///         // Your detection logic here
    ///         None
    ///     }
    /// }
    ///
    /// let bytes = std::fs::read("tree.jpg").unwrap();
    /// let result = TreeMeasurer::new(bytes).unwrap()
    ///     .detector(Box::new(MyDetector))
    ///     .measure();
    /// ```
    pub fn detector(mut self, detector: Box<dyn Detector>) -> Self {
        self.detector = Some(detector);
        self
    }

    /// Width and height of the decoded image.
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Run the measurement pipeline with the configured settings.
    pub fn measure(&self) -> Result<Measurement, MeasureError> {
        let fallback;
        let detector: &dyn Detector = match &self.detector {
            Some(detector) => detector.as_ref(),
            None => {
                fallback = ColorSegmentationDetector::default();
                &fallback
            }
        };
        measure(
            &self.image,
            self.focal_length.as_ref(),
            &self.policy,
            detector,
        )
    }
}
