//! Target regions in canvas-normalized coordinates.
//!
//! Producers hand regions over either as a keyed record (`{"x":..,"y":..,"width":..,"height":..}`)
//! or as a flat tuple (`[x, y, width, height]`). Both are accepted and normalized into the
//! canonical [`Region`] as soon as they cross the planner boundary; any other shape is rejected.

use serde::{Deserialize, Serialize};

use super::errors::AtelierError;

const EPSILON: f64 = 1e-9;

/// Canonical rectangle `(x, y, width, height)` with all values in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Region {
    /// Build a validated region.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Result<Self, AtelierError> {
        let values = [x, y, width, height];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(AtelierError::validation(format!(
                "region values must be finite: {values:?}"
            )));
        }
        if !(0.0..=1.0).contains(&x) || !(0.0..=1.0).contains(&y) {
            return Err(AtelierError::validation(format!(
                "region origin ({x}, {y}) is outside the normalized canvas"
            )));
        }
        if width < 0.0 || height < 0.0 {
            return Err(AtelierError::validation(format!(
                "region size must be non-negative (width={width}, height={height})"
            )));
        }
        if x + width > 1.0 + EPSILON || y + height > 1.0 + EPSILON {
            return Err(AtelierError::validation(format!(
                "region ({x}, {y}, {width}, {height}) extends past the canvas edge"
            )));
        }
        Ok(Self {
            x,
            y,
            width,
            height,
        })
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn diagonal(&self) -> f64 {
        self.width.hypot(self.height)
    }

    /// Smallest region covering both `self` and `other`.
    pub fn union(&self, other: &Region) -> Region {
        let x0 = self.x.min(other.x);
        let y0 = self.y.min(other.y);
        let x1 = (self.x + self.width).max(other.x + other.width);
        let y1 = (self.y + self.height).max(other.y + other.height);
        Region {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        }
    }

    /// `samples` points walking the rectangle boundary clockwise from the top-left corner,
    /// plus a closing point back at the start.
    pub fn boundary(&self, samples: usize) -> Vec<(f64, f64)> {
        let samples = samples.max(4);
        let perimeter = 2.0 * (self.width + self.height);
        let mut points = Vec::with_capacity(samples + 1);
        for i in 0..samples {
            let d = perimeter * i as f64 / samples as f64;
            points.push(self.point_on_boundary(d));
        }
        points.push((self.x, self.y));
        points
    }

    /// `samples` points sweeping left to right through the center, with a slight slope
    /// so the stroke is not degenerate for zero-height regions.
    pub fn sweep(&self, samples: usize) -> Vec<(f64, f64)> {
        let samples = samples.max(2);
        let (_, cy) = self.center();
        (0..samples)
            .map(|i| {
                let t = i as f64 / (samples - 1) as f64;
                let x = self.x + self.width * t;
                let y = cy + (t - 0.5) * self.height * 0.2;
                (x, y)
            })
            .collect()
    }

    fn point_on_boundary(&self, d: f64) -> (f64, f64) {
        let (w, h) = (self.width, self.height);
        if d <= w {
            (self.x + d, self.y)
        } else if d <= w + h {
            (self.x + w, self.y + (d - w))
        } else if d <= 2.0 * w + h {
            (self.x + w - (d - w - h), self.y + h)
        } else {
            (self.x, self.y + h - (d - 2.0 * w - h))
        }
    }
}

/// Region as received from a producer, before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RegionInput {
    Record {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
    Tuple(f64, f64, f64, f64),
    /// Anything else. Kept so the planner can reject it with a validation error
    /// instead of failing the whole feedback document at decode time.
    Other(serde_json::Value),
}

impl RegionInput {
    pub fn normalize(&self) -> Result<Region, AtelierError> {
        match *self {
            RegionInput::Record {
                x,
                y,
                width,
                height,
            } => Region::new(x, y, width, height),
            RegionInput::Tuple(x, y, width, height) => Region::new(x, y, width, height),
            RegionInput::Other(ref value) => Err(AtelierError::validation(format!(
                "malformed region: expected {{x, y, width, height}} or [x, y, width, height], got {value}"
            ))),
        }
    }
}

impl From<Region> for RegionInput {
    fn from(region: Region) -> Self {
        RegionInput::Record {
            x: region.x,
            y: region.y,
            width: region.width,
            height: region.height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(json!({"x": 0.1, "y": 0.2, "width": 0.3, "height": 0.4}))]
    #[case(json!([0.1, 0.2, 0.3, 0.4]))]
    fn record_and_tuple_normalize_to_the_same_region(#[case] raw: serde_json::Value) {
        let input: RegionInput = serde_json::from_value(raw).unwrap();
        let region = input.normalize().unwrap();
        assert_eq!(region, Region::new(0.1, 0.2, 0.3, 0.4).unwrap());
    }

    #[rstest]
    #[case(json!("top-left"))]
    #[case(json!([0.1, 0.2, 0.3]))]
    #[case(json!({"left": 0.1, "top": 0.2}))]
    fn other_shapes_are_rejected(#[case] raw: serde_json::Value) {
        let input: RegionInput = serde_json::from_value(raw).unwrap();
        assert!(matches!(input, RegionInput::Other(_)));
        let err = input.normalize().unwrap_err();
        assert!(err.to_string().contains("malformed region"));
    }

    #[test]
    fn out_of_canvas_regions_are_rejected() {
        assert!(Region::new(0.8, 0.0, 0.5, 0.1).is_err());
        assert!(Region::new(-0.1, 0.0, 0.1, 0.1).is_err());
        assert!(Region::new(0.0, 0.0, f64::NAN, 0.1).is_err());
    }

    #[test]
    fn union_covers_both_regions() {
        let a = Region::new(0.1, 0.1, 0.2, 0.2).unwrap();
        let b = Region::new(0.5, 0.4, 0.1, 0.3).unwrap();
        let u = a.union(&b);
        assert!((u.x - 0.1).abs() < 1e-12);
        assert!((u.y - 0.1).abs() < 1e-12);
        assert!((u.width - 0.5).abs() < 1e-12);
        assert!((u.height - 0.6).abs() < 1e-12);
    }

    #[test]
    fn boundary_starts_and_ends_at_origin() {
        let r = Region::new(0.2, 0.2, 0.4, 0.2).unwrap();
        let pts = r.boundary(8);
        assert_eq!(pts.len(), 9);
        assert_eq!(pts[0], (0.2, 0.2));
        assert_eq!(*pts.last().unwrap(), (0.2, 0.2));
        for (x, y) in pts {
            assert!((0.2 - 1e-12..=0.6 + 1e-12).contains(&x));
            assert!((0.2 - 1e-12..=0.4 + 1e-12).contains(&y));
        }
    }
}
