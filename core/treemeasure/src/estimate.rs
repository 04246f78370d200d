use crate::detector::BoundingBox;
use crate::error::MeasureError;
use crate::focal::DEFAULT_FOCAL_LENGTH_MM;

/// Width of a full-frame (35mm-equivalent) sensor.
pub const DEFAULT_SENSOR_WIDTH_MM: f64 = 36.0;

/// Camera-to-tree distance assumed when none is known (5 m).
pub const DEFAULT_ASSUMED_DISTANCE_MM: f64 = 5000.0;

/// Crown size as a fraction of the estimated tree width.
pub const CROWN_TO_WIDTH_RATIO: f64 = 0.6;

/// Substituted for a zero focal length so the projection stays finite.
/// The resulting dimensions are not meaningful, only bounded.
const ZERO_FOCAL_FALLBACK_MM: f64 = 1.0;

/// Camera geometry for one measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CameraParameters {
    /// Lens focal length in millimetres.
    pub focal_length_mm: f64,
    /// Physical sensor width in millimetres.
    pub sensor_width_mm: f64,
    /// Assumed camera-to-subject distance in millimetres.
    pub assumed_distance_mm: f64,
}

impl Default for CameraParameters {
    fn default() -> Self {
        Self {
            focal_length_mm: DEFAULT_FOCAL_LENGTH_MM,
            sensor_width_mm: DEFAULT_SENSOR_WIDTH_MM,
            assumed_distance_mm: DEFAULT_ASSUMED_DISTANCE_MM,
        }
    }
}

impl CameraParameters {
    /// Default sensor and distance with the given focal length.
    pub fn with_focal_length(focal_length_mm: f64) -> Self {
        Self {
            focal_length_mm,
            ..Self::default()
        }
    }

    /// Reject geometry that cannot produce a measurement.
    ///
    /// A focal length of exactly zero is allowed; [`estimate`] substitutes 1 mm.
    pub fn validate(&self) -> Result<(), MeasureError> {
        if !(self.sensor_width_mm.is_finite() && self.sensor_width_mm > 0.0) {
            return Err(MeasureError::InvalidSensorWidth(self.sensor_width_mm));
        }
        if !(self.assumed_distance_mm.is_finite() && self.assumed_distance_mm > 0.0) {
            return Err(MeasureError::InvalidDistance(self.assumed_distance_mm));
        }
        if !(self.focal_length_mm.is_finite() && self.focal_length_mm >= 0.0) {
            return Err(MeasureError::InvalidFocalLength(self.focal_length_mm));
        }
        Ok(())
    }
}

/// Estimated real-world tree dimensions, in metres rounded to centimetres.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MeasurementResult {
    /// Tree height.
    pub height_m: f64,
    /// Tree width.
    pub width_m: f64,
    /// Crown (foliage) lateral extent.
    pub crown_size_m: f64,
}

/// Pinhole-camera estimate of tree dimensions.
///
/// Each axis scales its pixel fraction of the frame by
/// `sensor_width / focal_length * distance`. Both axes use the sensor width,
/// so the vertical estimate assumes square pixels and a sensor the width of
/// the frame's long side. Image dimensions must be non-zero.
pub fn estimate(
    bbox: &BoundingBox,
    camera: &CameraParameters,
    img_width: u32,
    img_height: u32,
) -> MeasurementResult {
    debug_assert!(img_width > 0 && img_height > 0, "image dimensions must be > 0");

    let focal_length_mm = if camera.focal_length_mm == 0.0 {
        tracing::warn!(
            fallback_mm = ZERO_FOCAL_FALLBACK_MM,
            "zero focal length, substituting fallback"
        );
        ZERO_FOCAL_FALLBACK_MM
    } else {
        camera.focal_length_mm
    };

    let scale = camera.sensor_width_mm / focal_length_mm * camera.assumed_distance_mm;
    let width_mm = bbox.width() / img_width as f64 * scale;
    let height_mm = bbox.height() / img_height as f64 * scale;
    let crown_mm = width_mm * CROWN_TO_WIDTH_RATIO;

    MeasurementResult {
        height_m: mm_to_rounded_m(height_mm),
        width_m: mm_to_rounded_m(width_mm),
        crown_size_m: mm_to_rounded_m(crown_mm),
    }
}

fn mm_to_rounded_m(mm: f64) -> f64 {
    (mm / 1000.0 * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    fn bbox(x0: f64, y0: f64, x1: f64, y1: f64) -> BoundingBox {
        BoundingBox::new(x0, y0, x1, y1).unwrap()
    }

    #[test]
    fn reference_scenario() {
        let result = estimate(
            &bbox(50.0, 50.0, 450.0, 800.0),
            &CameraParameters::with_focal_length(50.0),
            500,
            900,
        );
        assert_eq!(result.width_m, 2.88);
        assert_eq!(result.height_m, 3.0);
        assert_eq!(result.crown_size_m, 1.73);
    }

    #[test]
    fn zero_focal_length_matches_one_millimetre() {
        let b = bbox(10.0, 20.0, 110.0, 220.0);
        let zero = estimate(&b, &CameraParameters::with_focal_length(0.0), 400, 300);
        let one = estimate(&b, &CameraParameters::with_focal_length(1.0), 400, 300);
        assert_eq!(zero, one);
        assert!(zero.height_m.is_finite());
    }

    #[test]
    fn longer_lens_gives_smaller_estimate() {
        let b = bbox(100.0, 100.0, 300.0, 700.0);
        let wide = estimate(&b, &CameraParameters::with_focal_length(24.0), 400, 800);
        let tele = estimate(&b, &CameraParameters::with_focal_length(85.0), 400, 800);
        assert!(tele.height_m < wide.height_m);
        assert!(tele.width_m < wide.width_m);
    }

    #[test]
    fn distance_scales_linearly() {
        let b = bbox(0.0, 0.0, 250.0, 500.0);
        let near = CameraParameters::default();
        let far = CameraParameters {
            assumed_distance_mm: 10_000.0,
            ..near
        };
        let n = estimate(&b, &near, 500, 1000);
        let f = estimate(&b, &far, 500, 1000);
        assert_abs_diff_eq!(f.height_m, n.height_m * 2.0, epsilon = 0.011);
        assert_abs_diff_eq!(f.width_m, n.width_m * 2.0, epsilon = 0.011);
    }

    #[test]
    fn validate_rejects_bad_geometry() {
        let ok = CameraParameters::default();
        assert!(ok.validate().is_ok());
        assert!(CameraParameters::with_focal_length(0.0).validate().is_ok());

        let bad_sensor = CameraParameters {
            sensor_width_mm: 0.0,
            ..ok
        };
        assert!(matches!(
            bad_sensor.validate(),
            Err(MeasureError::InvalidSensorWidth(_))
        ));

        let bad_distance = CameraParameters {
            assumed_distance_mm: -1.0,
            ..ok
        };
        assert!(matches!(
            bad_distance.validate(),
            Err(MeasureError::InvalidDistance(_))
        ));

        let bad_focal = CameraParameters::with_focal_length(f64::NAN);
        assert!(matches!(
            bad_focal.validate(),
            Err(MeasureError::InvalidFocalLength(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_scale_covariant(
            x in 0u32..200,
            y in 0u32..200,
            bw in 1u32..200,
            bh in 1u32..200,
            k in 2u32..6,
            focal in 4.0f64..200.0,
        ) {
            let (w, h) = (x + bw + 10, y + bh + 10);
            let camera = CameraParameters::with_focal_length(focal);
            let base = estimate(
                &bbox(x as f64, y as f64, (x + bw) as f64, (y + bh) as f64),
                &camera,
                w,
                h,
            );
            let kf = k as f64;
            let scaled = estimate(
                &bbox(x as f64 * kf, y as f64 * kf, (x + bw) as f64 * kf, (y + bh) as f64 * kf),
                &camera,
                w * k,
                h * k,
            );
            prop_assert!((base.height_m - scaled.height_m).abs() < 0.0101);
            prop_assert!((base.width_m - scaled.width_m).abs() < 0.0101);
        }

        #[test]
        fn prop_crown_is_sixty_percent_of_width(
            bw in 1.0f64..2000.0,
            bh in 1.0f64..2000.0,
            focal in 1.0f64..300.0,
        ) {
            let result = estimate(
                &bbox(0.0, 0.0, bw, bh),
                &CameraParameters::with_focal_length(focal),
                2000,
                2000,
            );
            let expected = (result.width_m * 0.6 * 100.0).round() / 100.0;
            // Width is rounded before the ratio is applied here, so allow one
            // centimetre of drift.
            prop_assert!((result.crown_size_m - expected).abs() <= 0.0101);
        }

        #[test]
        fn prop_outputs_non_negative(
            bw in 0.5f64..5000.0,
            bh in 0.5f64..5000.0,
            focal in 0.0f64..500.0,
        ) {
            let result = estimate(
                &bbox(0.0, 0.0, bw, bh),
                &CameraParameters::with_focal_length(focal),
                5000,
                5000,
            );
            prop_assert!(result.height_m >= 0.0);
            prop_assert!(result.width_m >= 0.0);
            prop_assert!(result.crown_size_m >= 0.0);
        }
    }
}
