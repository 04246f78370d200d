use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyDict;
use treemeasure_core::{
    BoundingBox, FixedDetector, FocalLengthRaw, FocalOrigin, MeasureError, TreeMeasurer,
    ValidationPolicy,
};

fn to_py_err(e: MeasureError) -> PyErr {
    match e.rejection() {
        Some(reason) => PyValueError::new_err(format!("{e}: {}", reason.user_message())),
        None => PyValueError::new_err(e.to_string()),
    }
}

fn string_to_policy(policy: &str) -> PyResult<ValidationPolicy> {
    match policy {
        "margin" => Ok(ValidationPolicy::margin()),
        "containment" => Ok(ValidationPolicy::Containment),
        _ => Err(PyValueError::new_err(format!("unknown policy: {policy}"))),
    }
}

fn focal_from_args(
    focal_length: Option<f64>,
    focal_length_ratio: Option<(u32, u32)>,
) -> PyResult<Option<FocalLengthRaw>> {
    match (focal_length, focal_length_ratio) {
        (Some(_), Some(_)) => Err(PyValueError::new_err(
            "pass either focal_length or focal_length_ratio, not both",
        )),
        (Some(mm), None) => Ok(Some(FocalLengthRaw::Millimetres(mm))),
        (None, Some((numerator, denominator))) => Ok(Some(FocalLengthRaw::Rational {
            numerator,
            denominator,
        })),
        (None, None) => Ok(None),
    }
}

/// Measure the tree in a photo.
///
/// Args:
///     input: Raw image bytes (JPEG, PNG, or WebP)
///     focal_length: Focal length in millimetres from EXIF (optional, default 50.0)
///     focal_length_ratio: EXIF rational focal length as (numerator, denominator)
///     policy: "margin" (10% space on every side) or "containment" (default: "margin")
///     sensor_width_mm: Physical sensor width (default: 36.0)
///     distance_mm: Assumed camera-to-tree distance (default: 5000.0)
///     bbox: (x_min, y_min, x_max, y_max) to skip detection and use this box
///
/// Returns:
///     dict with keys: height_m, width_m, crown_size_m (float), bbox (tuple),
///                     focal_length_mm (float), focal_length_defaulted (bool),
///                     width_fraction, height_fraction (float)
///
/// Raises:
///     ValueError: if the image cannot be decoded, the configuration is invalid,
///                 or the capture is rejected (no tree, not centered, out of frame)
#[pyfunction]
#[pyo3(signature = (input, *, focal_length=None, focal_length_ratio=None, policy="margin", sensor_width_mm=None, distance_mm=None, bbox=None))]
#[allow(clippy::too_many_arguments)]
fn measure(
    py: Python<'_>,
    input: Vec<u8>,
    focal_length: Option<f64>,
    focal_length_ratio: Option<(u32, u32)>,
    policy: &str,
    sensor_width_mm: Option<f64>,
    distance_mm: Option<f64>,
    bbox: Option<(f64, f64, f64, f64)>,
) -> PyResult<Py<PyDict>> {
    let mut measurer = TreeMeasurer::new(input)
        .map_err(to_py_err)?
        .validation(string_to_policy(policy)?);

    if let Some(raw) = focal_from_args(focal_length, focal_length_ratio)? {
        measurer = measurer.focal_length(raw);
    }
    if let Some(width) = sensor_width_mm {
        measurer = measurer.sensor_width_mm(width);
    }
    if let Some(distance) = distance_mm {
        measurer = measurer.assumed_distance_mm(distance);
    }
    if let Some((x_min, y_min, x_max, y_max)) = bbox {
        let fixed = BoundingBox::new(x_min, y_min, x_max, y_max).ok_or_else(|| {
            PyValueError::new_err("bbox must satisfy x_min < x_max and y_min < y_max")
        })?;
        measurer = measurer.detector(Box::new(FixedDetector::new(fixed)));
    }

    let m = measurer.measure().map_err(to_py_err)?;

    let dict = PyDict::new(py);
    dict.set_item("height_m", m.result.height_m)?;
    dict.set_item("width_m", m.result.width_m)?;
    dict.set_item("crown_size_m", m.result.crown_size_m)?;
    dict.set_item("bbox", m.bounding_box.corners())?;
    dict.set_item("focal_length_mm", m.focal_length_mm)?;
    dict.set_item(
        "focal_length_defaulted",
        m.focal_origin == FocalOrigin::Default,
    )?;
    dict.set_item("width_fraction", m.width_fraction)?;
    dict.set_item("height_fraction", m.height_fraction)?;
    Ok(dict.into())
}

#[pymodule]
fn treemeasure(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(measure, m)?)?;
    Ok(())
}

