use serde::{Deserialize, Serialize};

/// Rectangular arena centred on the origin.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArenaBounds {
    pub half_extent: [f64; 2],
}

impl ArenaBounds {
    pub fn new(half_width: f64, half_height: f64) -> Self {
        Self {
            half_extent: [half_width, half_height],
        }
    }

    /// Square arena with side length `size`.
    pub fn square(size: f64) -> Self {
        Self::new(size * 0.5, size * 0.5)
    }

    pub fn is_valid(&self) -> bool {
        self.half_extent
            .iter()
            .all(|h| h.is_finite() && *h > 0.0)
    }

    pub fn min(&self) -> [f64; 2] {
        [-self.half_extent[0], -self.half_extent[1]]
    }

    pub fn max(&self) -> [f64; 2] {
        self.half_extent
    }

    pub fn contains(&self, p: [f64; 2]) -> bool {
        p[0].abs() <= self.half_extent[0] && p[1].abs() <= self.half_extent[1]
    }

    pub fn area(&self) -> f64 {
        4.0 * self.half_extent[0] * self.half_extent[1]
    }
}

/// Source of the arena rectangle, queried once per tick since the viewport may
/// change between ticks.
pub trait BoundsProvider {
    fn arena_bounds(&self) -> ArenaBounds;
}

impl BoundsProvider for ArenaBounds {
    fn arena_bounds(&self) -> ArenaBounds {
        *self
    }
}

impl<F> BoundsProvider for F
where
    F: Fn() -> ArenaBounds,
{
    fn arena_bounds(&self) -> ArenaBounds {
        self()
    }
}

/// Wrap one coordinate to the opposite edge. Returns the new value and whether it moved.
fn wrap_axis(value: f64, half: f64, epsilon: f64) -> (f64, bool) {
    // Keep the inset strictly inside the arena even for tiny arenas.
    let inset = epsilon.min(half * 0.5);
    if value > half {
        (-half + inset, true)
    } else if value < -half {
        (half - inset, true)
    } else {
        (value, false)
    }
}

/// Move an out-of-bounds position to the opposite edge, axes independently.
/// Returns `true` if either axis wrapped.
pub fn wrap_position(position: &mut [f64; 2], bounds: &ArenaBounds, epsilon: f64) -> bool {
    let (x, wrapped_x) = wrap_axis(position[0], bounds.half_extent[0], epsilon);
    let (y, wrapped_y) = wrap_axis(position[1], bounds.half_extent[1], epsilon);
    position[0] = x;
    position[1] = y;
    wrapped_x || wrapped_y
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_each_axis_to_opposite_edge() {
        let bounds = ArenaBounds::new(10.0, 5.0);
        let mut p = [10.5, -6.0];
        assert!(wrap_position(&mut p, &bounds, 0.1));
        assert!((p[0] - (-9.9)).abs() < 1e-12);
        assert!((p[1] - 4.9).abs() < 1e-12);
    }

    #[test]
    fn inside_positions_are_untouched() {
        let bounds = ArenaBounds::new(10.0, 5.0);
        let mut p = [10.0, -5.0];
        assert!(!wrap_position(&mut p, &bounds, 0.1));
        assert_eq!(p, [10.0, -5.0]);
    }

    #[test]
    fn wrap_is_idempotent() {
        let bounds = ArenaBounds::new(3.0, 3.0);
        let mut p = [3.0 + 1e-9, 0.0];
        assert!(wrap_position(&mut p, &bounds, 0.1));
        assert!(p[0] > -3.0 && p[0] < 3.0);
        let after_first = p;
        for _ in 0..5 {
            assert!(!wrap_position(&mut p, &bounds, 0.1));
            assert_eq!(p, after_first);
        }
    }

    #[test]
    fn oversized_epsilon_still_lands_inside() {
        let bounds = ArenaBounds::new(0.1, 0.1);
        let mut p = [0.2, -0.2];
        wrap_position(&mut p, &bounds, 5.0);
        assert!(bounds.contains(p));
        assert!(p[0].abs() < 0.1 && p[1].abs() < 0.1);
    }

    #[test]
    fn closures_provide_bounds() {
        let provider = || ArenaBounds::square(8.0);
        assert_eq!(provider.arena_bounds().half_extent, [4.0, 4.0]);
        assert!(provider.arena_bounds().is_valid());
        assert!(!ArenaBounds::new(0.0, 1.0).is_valid());
    }
}
