use image::RgbImage;

/// Axis-aligned box delimiting a detected tree, in pixel coordinates of the
/// image it was computed from.
///
/// Always satisfies `x_min < x_max` and `y_min < y_max` with finite
/// coordinates; the constructors refuse anything else.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct BoundingBox {
    x_min: f64,
    y_min: f64,
    x_max: f64,
    y_max: f64,
}

impl BoundingBox {
    /// Build a box from its corners, or `None` if it is empty or non-finite.
    pub fn new(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Option<Self> {
        let finite = [x_min, y_min, x_max, y_max].iter().all(|v| v.is_finite());
        (finite && x_min < x_max && y_min < y_max).then_some(Self {
            x_min,
            y_min,
            x_max,
            y_max,
        })
    }

    /// Build a box from its top-left corner and size.
    pub fn from_xywh(x: f64, y: f64, width: f64, height: f64) -> Option<Self> {
        Self::new(x, y, x + width, y + height)
    }

    /// Left edge.
    pub fn x_min(&self) -> f64 {
        self.x_min
    }

    /// Top edge.
    pub fn y_min(&self) -> f64 {
        self.y_min
    }

    /// Right edge.
    pub fn x_max(&self) -> f64 {
        self.x_max
    }

    /// Bottom edge.
    pub fn y_max(&self) -> f64 {
        self.y_max
    }

    /// Horizontal extent in pixels.
    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    /// Vertical extent in pixels.
    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }

    /// Area in square pixels.
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Corners as `(x_min, y_min, x_max, y_max)`.
    pub fn corners(&self) -> (f64, f64, f64, f64) {
        (self.x_min, self.y_min, self.x_max, self.y_max)
    }
}

/// Pluggable tree locator.
///
/// Implementations return `None` rather than an invalid box when nothing
/// plausible is found. The measurement pipeline does not care which
/// implementation it is given.
pub trait Detector: Send + Sync {
    /// Locate the tree in `image`.
    fn locate(&self, image: &RgbImage) -> Option<BoundingBox>;
}

/// Detector that always reports the same box, regardless of the image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedDetector {
    bbox: BoundingBox,
}

impl FixedDetector {
    /// Detector returning `bbox` on every call.
    pub fn new(bbox: BoundingBox) -> Self {
        Self { bbox }
    }
}

impl Detector for FixedDetector {
    fn locate(&self, _image: &RgbImage) -> Option<BoundingBox> {
        Some(self.bbox)
    }
}

/// Stand-in detector that frames the central 60% × 80% of whatever image it
/// is given: `(0.2, 0.1)` to `(0.8, 0.9)` of the frame, truncated to whole
/// pixels.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderDetector;

impl Detector for PlaceholderDetector {
    fn locate(&self, image: &RgbImage) -> Option<BoundingBox> {
        let (w, h) = (image.width(), image.height());
        let scale = |extent: u32, fraction: f64| (extent as f64 * fraction).trunc();
        BoundingBox::new(
            scale(w, 0.2),
            scale(h, 0.1),
            scale(w, 0.8),
            scale(h, 0.9),
        )
    }
}

/// Single box proposed by an object-detection model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    /// Proposed box in image pixel coordinates.
    pub bbox: BoundingBox,
    /// Model confidence score.
    pub confidence: f64,
}

/// External object-detection capability (ONNX session, remote model, ...).
///
/// Implement this trait to plug a model into [`ModelDetector`].
pub trait ObjectDetector: Send + Sync {
    /// Return zero or more tree candidates for `image`.
    fn detect(&self, image: &RgbImage) -> Vec<Candidate>;
}

/// Detector backed by an injected object-detection model.
///
/// Picks the candidate with the largest box area; on equal areas the
/// candidate listed first by the model wins.
pub struct ModelDetector {
    model: Box<dyn ObjectDetector>,
    min_confidence: Option<f64>,
}

impl ModelDetector {
    /// Wrap `model`, keeping every candidate it returns.
    pub fn new(model: Box<dyn ObjectDetector>) -> Self {
        Self {
            model,
            min_confidence: None,
        }
    }

    /// Drop candidates scoring below `min_confidence` before selection.
    ///
    /// Without a floor, scores are ignored entirely, so raw logits and NaN
    /// scores still compete on area.
    pub fn min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = Some(min_confidence);
        self
    }
}

impl Detector for ModelDetector {
    fn locate(&self, image: &RgbImage) -> Option<BoundingBox> {
        let candidates = self.model.detect(image);
        tracing::debug!(count = candidates.len(), "model returned candidates");

        let mut best: Option<&Candidate> = None;
        for candidate in candidates
            .iter()
            .filter(|c| self.min_confidence.map_or(true, |floor| c.confidence >= floor))
        {
            // Strict comparison keeps the earliest candidate on ties.
            if best.map_or(true, |b| candidate.bbox.area() > b.bbox.area()) {
                best = Some(candidate);
            }
        }
        best.map(|c| c.bbox)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(x0: f64, y0: f64, x1: f64, y1: f64) -> BoundingBox {
        BoundingBox::new(x0, y0, x1, y1).unwrap()
    }

    struct ListModel(Vec<Candidate>);

    impl ObjectDetector for ListModel {
        fn detect(&self, _image: &RgbImage) -> Vec<Candidate> {
            self.0.clone()
        }
    }

    fn candidate(b: BoundingBox, confidence: f64) -> Candidate {
        Candidate {
            bbox: b,
            confidence,
        }
    }

    #[test]
    fn bounding_box_rejects_empty_and_inverted() {
        assert!(BoundingBox::new(10.0, 10.0, 10.0, 20.0).is_none());
        assert!(BoundingBox::new(10.0, 10.0, 20.0, 10.0).is_none());
        assert!(BoundingBox::new(20.0, 10.0, 10.0, 30.0).is_none());
        assert!(BoundingBox::new(f64::NAN, 0.0, 1.0, 1.0).is_none());
        assert!(BoundingBox::new(0.0, 0.0, f64::INFINITY, 1.0).is_none());
    }

    #[test]
    fn bounding_box_extent() {
        let b = bbox(50.0, 50.0, 450.0, 800.0);
        assert_eq!(b.width(), 400.0);
        assert_eq!(b.height(), 750.0);
        assert_eq!(b.area(), 300_000.0);
        assert_eq!(b.corners(), (50.0, 50.0, 450.0, 800.0));
    }

    #[test]
    fn from_xywh_matches_corners() {
        let b = BoundingBox::from_xywh(5.0, 6.0, 10.0, 20.0).unwrap();
        assert_eq!(b, bbox(5.0, 6.0, 15.0, 26.0));
        assert!(BoundingBox::from_xywh(5.0, 6.0, 0.0, 20.0).is_none());
    }

    #[test]
    fn fixed_detector_ignores_image() {
        let b = bbox(1.0, 2.0, 3.0, 4.0);
        let detector = FixedDetector::new(b);
        assert_eq!(detector.locate(&RgbImage::new(1, 1)), Some(b));
        assert_eq!(detector.locate(&RgbImage::new(640, 480)), Some(b));
    }

    #[test]
    fn placeholder_scales_with_image() {
        let detector = PlaceholderDetector;
        let b = detector.locate(&RgbImage::new(500, 900)).unwrap();
        assert_eq!(b.corners(), (100.0, 90.0, 400.0, 810.0));
    }

    #[test]
    fn model_detector_empty_returns_none() {
        let detector = ModelDetector::new(Box::new(ListModel(vec![])));
        assert_eq!(detector.locate(&RgbImage::new(10, 10)), None);
    }

    #[test]
    fn model_detector_picks_largest_area() {
        let small = bbox(0.0, 0.0, 10.0, 10.0);
        let large = bbox(5.0, 5.0, 55.0, 45.0);
        let detector = ModelDetector::new(Box::new(ListModel(vec![
            candidate(small, 0.99),
            candidate(large, 0.40),
        ])));
        assert_eq!(detector.locate(&RgbImage::new(100, 100)), Some(large));
    }

    #[test]
    fn model_detector_tie_keeps_first() {
        let first = bbox(0.0, 0.0, 20.0, 10.0);
        let second = bbox(30.0, 30.0, 40.0, 50.0);
        let detector = ModelDetector::new(Box::new(ListModel(vec![
            candidate(first, 0.5),
            candidate(second, 0.9),
        ])));
        assert_eq!(detector.locate(&RgbImage::new(100, 100)), Some(first));
    }

    #[test]
    fn model_detector_confidence_floor() {
        let weak = bbox(0.0, 0.0, 80.0, 80.0);
        let strong = bbox(10.0, 10.0, 20.0, 20.0);
        let detector = ModelDetector::new(Box::new(ListModel(vec![
            candidate(weak, 0.2),
            candidate(strong, 0.8),
        ])))
        .min_confidence(0.5);
        assert_eq!(detector.locate(&RgbImage::new(100, 100)), Some(strong));

        let none_pass = ModelDetector::new(Box::new(ListModel(vec![candidate(weak, 0.2)])))
            .min_confidence(0.5);
        assert_eq!(none_pass.locate(&RgbImage::new(100, 100)), None);
    }

    #[test]
    fn model_detector_keeps_logit_and_nan_scores_by_default() {
        let logit = bbox(10.0, 10.0, 60.0, 60.0);
        let detector = ModelDetector::new(Box::new(ListModel(vec![candidate(logit, -0.7)])));
        assert_eq!(detector.locate(&RgbImage::new(100, 100)), Some(logit));

        let unscored = bbox(0.0, 0.0, 90.0, 90.0);
        let detector = ModelDetector::new(Box::new(ListModel(vec![
            candidate(logit, -0.7),
            candidate(unscored, f64::NAN),
        ])));
        assert_eq!(detector.locate(&RgbImage::new(100, 100)), Some(unscored));
    }
}
