//! # Constraint Solver
//!
//! Turns explicit, minimum and maximum sizes plus a natural size into the
//! final size of a box. Intrinsically sized content (images) keeps its
//! aspect ratio whenever only one dimension is pinned, and shrinks to fit
//! the available space down to a floor of `min_scale_reduction` times its
//! natural size. Past that floor the content is reported as overflowing and
//! the caller decides between a page break and clipping.
//!
//! The solver never fails: every input combination produces a definite size.

use super::tree::Size;

/// Everything the solver knows about one box. All values in points.
#[derive(Debug, Clone, Default)]
pub struct SizeRequest {
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub min_width: Option<f64>,
    pub min_height: Option<f64>,
    pub max_width: Option<f64>,
    pub max_height: Option<f64>,
    /// Natural size of intrinsically sized content.
    pub natural: Option<Size>,
    /// Space offered by the container. Use `f64::INFINITY` for unbounded.
    pub available: Size,
    pub min_scale_reduction: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizeOutcome {
    pub width: f64,
    pub height: f64,
    /// The content could not be shrunk enough to fit the available space.
    pub overflowed: bool,
}

const EPSILON: f64 = 1e-9;

/// Resolve the final size of a box.
pub fn solve(req: &SizeRequest) -> SizeOutcome {
    let natural = req
        .natural
        .filter(|n| n.width > 0.0 && n.height > 0.0);
    let aspect = natural.map(|n| n.width / n.height);

    // Steps 1-3: starting size.
    let (mut width, mut height) = match (req.width, req.height, natural) {
        (Some(w), Some(h), _) => (w, h),
        (Some(w), None, Some(_)) => (w, w / aspect.unwrap_or(1.0)),
        (None, Some(h), Some(_)) => (h * aspect.unwrap_or(1.0), h),
        (None, None, Some(n)) => (n.width, n.height),
        (w, h, None) => (
            w.unwrap_or_else(|| finite_or_zero(req.available.width)),
            h.unwrap_or(0.0),
        ),
    };

    let proportional = natural.is_some() && !(req.width.is_some() && req.height.is_some());

    // Step 4: maximums.
    if proportional {
        let scale = [
            req.max_width.map(|m| m / width),
            req.max_height.map(|m| m / height),
        ]
        .into_iter()
        .flatten()
        .fold(1.0_f64, f64::min);
        if scale < 1.0 {
            width *= scale;
            height *= scale;
        }
    } else {
        width = req.max_width.map_or(width, |m| width.min(m));
        height = req.max_height.map_or(height, |m| height.min(m));
    }

    // Step 5: minimums. The one asking for the bigger size wins.
    if proportional {
        let scale = [
            req.min_width.map(|m| m / width),
            req.min_height.map(|m| m / height),
        ]
        .into_iter()
        .flatten()
        .fold(1.0_f64, f64::max);
        if scale > 1.0 {
            width *= scale;
            height *= scale;
        }
    } else {
        width = req.min_width.map_or(width, |m| width.max(m));
        height = req.min_height.map_or(height, |m| height.max(m));
    }

    // Step 6: shrink to fit, never below the floor.
    let mut overflowed = false;
    let explicit = req.width.is_some() || req.height.is_some();
    if let (false, Some(n)) = (explicit, natural) {
        let fit = (req.available.width / width)
            .min(req.available.height / height)
            .min(1.0);
        if fit < 1.0 {
            let fitted = (width * fit, height * fit);
            let floor = req.min_scale_reduction;
            let below_floor = fitted.0 + EPSILON < n.width * floor
                || fitted.1 + EPSILON < n.height * floor;
            let below_min = req.min_width.is_some_and(|m| fitted.0 + EPSILON < m)
                || req.min_height.is_some_and(|m| fitted.1 + EPSILON < m);
            if below_floor || below_min {
                overflowed = true;
            } else {
                (width, height) = fitted;
            }
        }
    } else if width > req.available.width + EPSILON || height > req.available.height + EPSILON
    {
        overflowed = true;
    }

    SizeOutcome {
        width: width.max(0.0),
        height: height.max(0.0),
        overflowed,
    }
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

/// Border-box width of a block-level box without intrinsic size: the
/// explicit width, or whatever the container offers after margins, clamped
/// by the minimum and maximum.
pub fn block_width(
    explicit: Option<f64>,
    min: Option<f64>,
    max: Option<f64>,
    container: f64,
    horizontal_margins: f64,
) -> f64 {
    let available = (container - horizontal_margins).max(0.0);
    let mut width = explicit.unwrap_or(available);
    if let Some(max) = max {
        width = width.min(max);
    }
    if let Some(min) = min {
        width = width.max(min);
    }
    width.max(0.0)
}

/// Convert a pixel size to points at the given resolution (pixels per inch).
pub fn pixels_to_points(pixels: u32, resolution: f64) -> f64 {
    let ppi = if resolution > 0.0 { resolution } else { 96.0 };
    pixels as f64 * 72.0 / ppi
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(natural: (f64, f64)) -> SizeRequest {
        SizeRequest {
            natural: Some(Size::new(natural.0, natural.1)),
            available: Size::new(f64::INFINITY, f64::INFINITY),
            min_scale_reduction: 0.25,
            ..Default::default()
        }
    }

    #[test]
    fn max_width_preserves_aspect_ratio() {
        let natural = (pixels_to_points(682, 96.0), pixels_to_points(452, 96.0));
        assert!((natural.0 - 511.5).abs() < 1e-9);
        assert!((natural.1 - 339.0).abs() < 1e-9);

        let out = solve(&SizeRequest {
            max_width: Some(200.0),
            ..image(natural)
        });
        assert!((out.width - 200.0).abs() < 1e-9);
        assert!((out.height - 339.0 * 200.0 / 511.5).abs() < 1e-9);
        assert!((out.height - 132.55).abs() < 0.01);
        assert!(!out.overflowed);
    }

    #[test]
    fn one_explicit_dimension_keeps_ratio() {
        for (w, h) in [(Some(120.0), None), (None, Some(45.0))] {
            let out = solve(&SizeRequest {
                width: w,
                height: h,
                ..image((400.0, 150.0))
            });
            assert!((out.width / out.height - 400.0 / 150.0).abs() < 1e-9);
        }
    }

    #[test]
    fn both_explicit_ignores_ratio() {
        let out = solve(&SizeRequest {
            width: Some(100.0),
            height: Some(100.0),
            ..image((400.0, 150.0))
        });
        assert_eq!((out.width, out.height), (100.0, 100.0));
    }

    #[test]
    fn larger_minimum_scale_wins() {
        // Width minimum scales by 550/511.5, height minimum by 350/339:
        // the width constraint dominates.
        let out = solve(&SizeRequest {
            min_width: Some(550.0),
            min_height: Some(350.0),
            ..image((511.5, 339.0))
        });
        assert!((out.width - 550.0).abs() < 1e-9);
        assert!((out.height - 339.0 * 550.0 / 511.5).abs() < 1e-9);

        // Same minimums on a tall image: height dominates.
        let out = solve(&SizeRequest {
            min_width: Some(550.0),
            min_height: Some(350.0),
            ..image((500.0, 200.0))
        });
        assert!((out.height - 350.0).abs() < 1e-9);
        assert!((out.width - 875.0).abs() < 1e-9);

        let out = solve(&SizeRequest {
            min_width: Some(100.0),
            min_height: Some(350.0),
            ..image((200.0, 200.0))
        });
        assert!((out.width - 350.0).abs() < 1e-9);
        assert!((out.height - 350.0).abs() < 1e-9);
    }

    #[test]
    fn shrinks_to_fit_available_space() {
        let out = solve(&SizeRequest {
            available: Size::new(300.0, 1000.0),
            ..image((600.0, 400.0))
        });
        assert!((out.width - 300.0).abs() < 1e-9);
        assert!((out.height - 200.0).abs() < 1e-9);
        assert!(!out.overflowed);
    }

    #[test]
    fn never_shrinks_below_the_floor() {
        let out = solve(&SizeRequest {
            available: Size::new(100.0, 1000.0),
            min_scale_reduction: 0.5,
            ..image((600.0, 400.0))
        });
        assert!(out.overflowed);
        assert!(out.width >= 300.0);
        assert!(out.height >= 200.0);
    }

    #[test]
    fn explicit_size_overflow_is_reported() {
        let out = solve(&SizeRequest {
            width: Some(500.0),
            height: Some(10.0),
            available: Size::new(400.0, 100.0),
            ..Default::default()
        });
        assert_eq!(out.width, 500.0);
        assert!(out.overflowed);
    }

    #[test]
    fn block_width_fills_container_after_margins() {
        assert_eq!(block_width(None, None, None, 600.0, 40.0), 560.0);
        assert_eq!(block_width(Some(200.0), Some(250.0), None, 600.0, 0.0), 250.0);
        assert_eq!(block_width(None, None, Some(100.0), 600.0, 0.0), 100.0);
    }
}
