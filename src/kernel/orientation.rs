// SPDX-License-Identifier: MIT
//
// Copyright (c) 2025 the surftri authors
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

use rug::Rational;

/// Error bound of the floating-point determinant filter:
/// (3 + 16 eps) * eps with eps = 2^-53.
const CCW_ERR_BOUND: f64 = 3.3306690738754716e-16;

/// Robust 2-D orientation of (a, b, c).
///
/// Returns:
/// - >0 if counter-clockwise
/// - <0 if clockwise
/// - =0 if collinear
///
/// The determinant is evaluated in `f64` first; when its magnitude falls
/// under the rounding-error bound the result is recomputed with exact
/// rational arithmetic, so the sign is always correct. Callers that only
/// need an approximate signed area should use `predicates::area2d` instead.
pub fn orient2d(a: &[f64; 2], b: &[f64; 2], c: &[f64; 2]) -> f64 {
    let detleft = (a[0] - c[0]) * (b[1] - c[1]);
    let detright = (a[1] - c[1]) * (b[0] - c[0]);
    let det = detleft - detright;

    let detsum = if detleft > 0.0 {
        if detright <= 0.0 {
            return det;
        }
        detleft + detright
    } else if detleft < 0.0 {
        if detright >= 0.0 {
            return det;
        }
        -detleft - detright
    } else {
        return det;
    };

    let errbound = CCW_ERR_BOUND * detsum;
    if det >= errbound || -det >= errbound {
        return det;
    }

    orient2d_exact(a, b, c).unwrap_or(det)
}

/// Exact evaluation over the rationals; `None` on non-finite input.
fn orient2d_exact(a: &[f64; 2], b: &[f64; 2], c: &[f64; 2]) -> Option<f64> {
    let q = |x: f64| Rational::from_f64(x);
    let (ax, ay) = (q(a[0])?, q(a[1])?);
    let (bx, by) = (q(b[0])?, q(b[1])?);
    let (cx, cy) = (q(c[0])?, q(c[1])?);

    let left = (ax - cx.clone()) * (by - cy.clone());
    let right = (ay - cy) * (bx - cx);
    Some((left - right).to_f64())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ccw_test() {
        let a = [0.0, 0.0];
        let b = [1.0, 0.0];
        let c = [0.0, 1.0];
        assert!(orient2d(&a, &b, &c) > 0.0); // counter-clockwise
        assert!(orient2d(&a, &c, &b) < 0.0); // clockwise
    }

    #[test]
    fn collinear_is_exactly_zero() {
        let a = [0.0, 0.0];
        let b = [1.0, 1.0];
        let c = [2.0, 2.0];
        assert_eq!(orient2d(&a, &b, &c), 0.0);
    }

    #[test]
    fn near_collinear_falls_back_to_exact() {
        // a few ulps off the diagonal: the determinant lands well under
        // the filter bound, so the rational path decides the sign
        let a = [1.0, 1.0];
        let b = [2.0, 2.0];
        let c = [3.0, 3.0 + 4.0 * f64::EPSILON];
        assert!(orient2d(&a, &b, &c) > 0.0);
        assert!(orient2d(&a, &c, &b) < 0.0);
    }

    #[test]
    fn shifted_grid_signs_agree() {
        // Perturbations around a collinear configuration far from the
        // origin, where cancellation defeats plain f64.
        let base = 1.0e7;
        let a = [base, base];
        let b = [base + 1.0, base + 1.0];
        for k in 1..=4 {
            let eps = (k as f64) * f64::EPSILON * base;
            let above = [base + 2.0, base + 2.0 + eps];
            let below = [base + 2.0, base + 2.0 - eps];
            assert!(orient2d(&a, &b, &above) > 0.0);
            assert!(orient2d(&a, &b, &below) < 0.0);
        }
    }
}
