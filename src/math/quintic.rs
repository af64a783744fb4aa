//! Mathematical functions.

/// A quintic function.
///
/// Fitting one against position, velocity and acceleration constraints at
/// both ends of an interval is the two-point boundary value problem behind
/// every planned maneuver.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QuinticFn {
    /// Coefficients in ascending order: `y = c[0] + c[1] x + ... + c[5] x^5`.
    coeffs: [f64; 6],
    offset: f64,
}

impl QuinticFn {
    pub const fn constant(y: f64) -> Self {
        Self {
            coeffs: [y, 0.0, 0.0, 0.0, 0.0, 0.0],
            offset: 0.0,
        }
    }

    /// Fits the unique degree-5 polynomial matching value, first and second
    /// derivative at `x1` and at `x2`.
    pub fn fit(
        x1: f64,
        y1: f64,
        dy1: f64,
        d2y1: f64,
        x2: f64,
        y2: f64,
        dy2: f64,
        d2y2: f64,
    ) -> Self {
        let t = x2 - x1;
        let c0 = y1;
        let c1 = dy1;
        let c2 = 0.5 * d2y1;

        // Residual constraints at the far end once the near-end terms are removed.
        let h = y2 - y1 - dy1 * t - 0.5 * d2y1 * t * t;
        let dh = dy2 - dy1 - d2y1 * t;
        let d2h = d2y2 - d2y1;

        let c3 = (20. * h - 8. * dh * t + d2h * t * t) / (2. * t.powi(3));
        let c4 = (-30. * h + 14. * dh * t - 2. * d2h * t * t) / (2. * t.powi(4));
        let c5 = (12. * h - 6. * dh * t + d2h * t * t) / (2. * t.powi(5));

        Self {
            coeffs: [c0, c1, c2, c3, c4, c5],
            offset: -x1,
        }
    }

    pub fn y(&self, x: f64) -> f64 {
        let c = &self.coeffs;
        let x = x + self.offset;
        c[0] + x * (c[1] + x * (c[2] + x * (c[3] + x * (c[4] + x * c[5]))))
    }

    pub fn dy(&self, x: f64) -> f64 {
        let c = &self.coeffs;
        let x = x + self.offset;
        c[1] + x * (2. * c[2] + x * (3. * c[3] + x * (4. * c[4] + x * 5. * c[5])))
    }

    pub fn d2y(&self, x: f64) -> f64 {
        let c = &self.coeffs;
        let x = x + self.offset;
        2. * c[2] + x * (6. * c[3] + x * (12. * c[4] + x * 20. * c[5]))
    }

    pub fn d3y(&self, x: f64) -> f64 {
        let c = &self.coeffs;
        let x = x + self.offset;
        6. * c[3] + x * (24. * c[4] + x * 60. * c[5])
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use rand::{Rng, SeedableRng};

    #[test]
    pub fn constant() {
        let quintic = QuinticFn::constant(7.5);
        assert_approx_eq!(quintic.y(-3.0), 7.5);
        assert_approx_eq!(quintic.y(12.0), 7.5);
        assert_approx_eq!(quintic.dy(12.0), 0.0);
        assert_approx_eq!(quintic.d2y(12.0), 0.0);
    }

    #[test]
    pub fn fit() {
        let mut rng = rand::rngs::StdRng::from_seed(*b"Vegemite sandwhich is not fun...");
        for _i in 0..100 {
            let x1 = rng.gen_range(-100.0..100.0);
            let x2 = x1 + rng.gen_range(1.0..50.0);
            let y1 = rng.gen_range(-100.0..100.0);
            let y2 = rng.gen_range(-100.0..100.0);
            let dy1 = rng.gen_range(-10.0..10.0);
            let dy2 = rng.gen_range(-10.0..10.0);
            let d2y1 = rng.gen_range(-5.0..5.0);
            let d2y2 = rng.gen_range(-5.0..5.0);
            let quintic = QuinticFn::fit(x1, y1, dy1, d2y1, x2, y2, dy2, d2y2);

            assert_approx_eq!(quintic.y(x1), y1, 0.01);
            assert_approx_eq!(quintic.dy(x1), dy1, 0.01);
            assert_approx_eq!(quintic.d2y(x1), d2y1, 0.01);
            assert_approx_eq!(quintic.y(x2), y2, 0.01);
            assert_approx_eq!(quintic.dy(x2), dy2, 0.01);
            assert_approx_eq!(quintic.d2y(x2), d2y2, 0.01);
        }
    }

    #[test]
    pub fn straight_lines() {
        let mut rng = rand::rngs::StdRng::from_seed(*b"Vegemite sandwhich is not fun...");
        for _i in 0..100 {
            let x1 = rng.gen_range(-100.0..100.0);
            let x2 = x1 + rng.gen_range(1.0..50.0);
            let y1 = rng.gen_range(-100.0..100.0);
            let y2 = rng.gen_range(-100.0..100.0);
            let dydx = (y2 - y1) / (x2 - x1);
            let quintic = QuinticFn::fit(x1, y1, dydx, 0.0, x2, y2, dydx, 0.0);

            assert_approx_eq!(quintic.y(0.5 * (x1 + x2)), 0.5 * (y1 + y2), 0.01);
            assert_approx_eq!(quintic.dy(0.5 * (x1 + x2)), dydx, 0.01);
            assert_approx_eq!(quintic.d3y(x1).abs(), 0.0, 0.01);
        }
    }
}
