/// Focal length assumed when the capture metadata has none (a standard 50mm lens).
pub const DEFAULT_FOCAL_LENGTH_MM: f64 = 50.0;

/// Focal length as extracted from capture metadata, before normalization.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FocalLengthRaw {
    /// Plain millimetre value.
    Millimetres(f64),
    /// EXIF RATIONAL value (`numerator / denominator` millimetres).
    Rational {
        /// Numerator of the rational.
        numerator: u32,
        /// Denominator of the rational.
        denominator: u32,
    },
    /// Textual value such as `"4.25"`, `"4.25 mm"` or `"17/4"`.
    Text(String),
}

impl From<f64> for FocalLengthRaw {
    fn from(mm: f64) -> Self {
        FocalLengthRaw::Millimetres(mm)
    }
}

impl From<(u32, u32)> for FocalLengthRaw {
    fn from((numerator, denominator): (u32, u32)) -> Self {
        FocalLengthRaw::Rational {
            numerator,
            denominator,
        }
    }
}

/// Where the focal length used for a measurement came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FocalOrigin {
    /// Parsed from the supplied capture metadata.
    Metadata,
    /// Metadata was absent or unusable; the resolver default was substituted.
    Default,
}

/// Normalizes raw focal-length metadata into a positive millimetre value.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FocalLengthResolver {
    /// Value returned whenever the raw input cannot be used.
    pub default_mm: f64,
}

impl Default for FocalLengthResolver {
    fn default() -> Self {
        Self {
            default_mm: DEFAULT_FOCAL_LENGTH_MM,
        }
    }
}

impl FocalLengthResolver {
    /// Resolver with a custom fallback value.
    pub fn with_default(default_mm: f64) -> Self {
        Self { default_mm }
    }

    /// Resolve to millimetres, never failing; the result is always finite and > 0.
    pub fn resolve(&self, raw: Option<&FocalLengthRaw>) -> f64 {
        self.resolve_with_origin(raw).0
    }

    /// Resolve to millimetres and report whether the default was substituted.
    pub fn resolve_with_origin(&self, raw: Option<&FocalLengthRaw>) -> (f64, FocalOrigin) {
        match raw.and_then(interpret) {
            Some(mm) => (mm, FocalOrigin::Metadata),
            None => {
                let default_mm = self.fallback_mm();
                tracing::warn!(
                    raw = ?raw,
                    default_mm,
                    "focal length unavailable, using default"
                );
                (default_mm, FocalOrigin::Default)
            }
        }
    }

    /// The configured default, or [`DEFAULT_FOCAL_LENGTH_MM`] if it is unusable.
    fn fallback_mm(&self) -> f64 {
        if self.default_mm.is_finite() && self.default_mm > 0.0 {
            return self.default_mm;
        }
        tracing::warn!(
            configured = self.default_mm,
            fallback = DEFAULT_FOCAL_LENGTH_MM,
            "configured default focal length is unusable"
        );
        DEFAULT_FOCAL_LENGTH_MM
    }
}

/// Usable millimetre value for `raw`, or `None` if the default should apply.
fn interpret(raw: &FocalLengthRaw) -> Option<f64> {
    let mm = match raw {
        FocalLengthRaw::Millimetres(mm) => *mm,
        FocalLengthRaw::Rational {
            numerator,
            denominator,
        } => {
            if *denominator == 0 {
                return None;
            }
            *numerator as f64 / *denominator as f64
        }
        FocalLengthRaw::Text(text) => parse_text(text)?,
    };
    (mm.is_finite() && mm > 0.0).then_some(mm)
}

fn parse_text(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    let number = trimmed
        .strip_suffix("mm")
        .map(str::trim_end)
        .unwrap_or(trimmed);

    match number.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            Some(num / den)
        }
        None => number.parse().ok(),
    }
}
