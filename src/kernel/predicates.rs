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

//! Geometric predicates of the refinement engine: signed parameter-space
//! area, point-in-triangle tests, edge distance queries, and the angle
//! metrics the quality tests optimise.

use std::f64::consts::PI;

use crate::geometry::{cross, dist2, dot, sub, unit};
use crate::kernel::orientation::orient2d;

/// Signed 2-D parallelogram area of (a - c) x (b - c). Plain floating
/// point; sign-critical callers go through [`in_tri_exact`].
#[inline(always)]
pub fn area2d(a: &[f64; 2], b: &[f64; 2], c: &[f64; 2]) -> f64 {
    (a[0] - c[0]) * (b[1] - c[1]) - (a[1] - c[1]) * (b[0] - c[0])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Containment {
    Inside,
    Outside,
    Degenerate,
}

#[inline(always)]
fn sign(s: f64) -> i32 {
    if s > 0.0 {
        1
    } else if s < 0.0 {
        -1
    } else {
        0
    }
}

/// Exact point-in-triangle classification with normalised barycentric
/// weights. A point on an edge or a corner counts as inside; a fully
/// collapsed triangle reports [`Containment::Degenerate`].
pub fn in_tri_exact(
    t1: &[f64; 2],
    t2: &[f64; 2],
    t3: &[f64; 2],
    p: &[f64; 2],
) -> (Containment, [f64; 3]) {
    let mut w = [
        orient2d(t2, t3, p),
        orient2d(t1, p, t3),
        orient2d(t1, t2, p),
    ];
    let d1 = sign(w[0]);
    let d2 = sign(w[1]);
    let d3 = sign(w[2]);
    let sum = w[0] + w[1] + w[2];
    if sum != 0.0 {
        w[0] /= sum;
        w[1] /= sum;
        w[2] /= sum;
    }

    if d1 * d2 * d3 == 0 {
        if d1 == 0 {
            if d2 == 0 && d3 == 0 {
                return (Containment::Degenerate, w);
            }
            if d2 == d3 || d2 == 0 || d3 == 0 {
                return (Containment::Inside, w);
            }
        } else if d2 == 0 {
            if d1 == d3 || d3 == 0 {
                return (Containment::Inside, w);
            }
        } else if d1 == d2 {
            return (Containment::Inside, w);
        }
    }

    // all sub-triangles carry the same sign -> containment
    if d1 == d2 && d2 == d3 {
        return (Containment::Inside, w);
    }

    (Containment::Outside, w)
}

/// Project `x` onto the plane of the 3-D triangle (p0, p1, p2) and test
/// whether every barycentric weight clears `fuzz`. Degenerate triangles
/// never contain anything.
pub fn strictly_inside_projected(
    p0: &[f64; 3],
    p1: &[f64; 3],
    p2: &[f64; 3],
    x: &[f64; 3],
    fuzz: f64,
) -> bool {
    let x1 = sub(p1, p0);
    let x2 = sub(p2, p0);
    let Some(n2) = unit(&cross(&x1, &x2)) else {
        return false;
    };
    let Some(n0) = unit(&x2) else {
        return false;
    };
    let n1 = cross(&n0, &n2);

    // local frame coordinates
    let a = [dot(&n0, p0), dot(&n1, p0)];
    let b = [dot(&n0, p1), dot(&n1, p1)];
    let c = [dot(&n0, p2), dot(&n1, p2)];
    let q = [dot(&n0, x), dot(&n1, x)];

    let dx1 = a[0] - c[0];
    let dy1 = a[1] - c[1];
    let dx2 = b[0] - c[0];
    let dy2 = b[1] - c[1];
    let det = dx1 * dy2 - dy1 * dx2;
    if det == 0.0 {
        return false;
    }
    let dxx = q[0] - c[0];
    let dyy = q[1] - c[1];
    let w0 = (dxx * dy2 - dyy * dx2) / det;
    let w1 = -(dxx * dy1 - dyy * dx1) / det;
    let w2 = 1.0 - w0 - w1;
    w0 > fuzz && w1 > fuzz && w2 > fuzz
}

/// Squared distance from `p2` to the infinite line through (p0, p1),
/// measured at the foot of the perpendicular. Returns `1e20` for a
/// degenerate segment and `1e40` when the foot parameter leaves
/// `[-0.01, 1.01]`.
pub fn line_offset2(p0: &[f64; 3], p1: &[f64; 3], p2: &[f64; 3]) -> f64 {
    let d = sub(p1, p0);
    let len2 = dot(&d, &d);
    if len2 == 0.0 {
        return 1.0e20;
    }
    let t = dot(&sub(p2, p0), &d) / len2;
    if !(-0.01..=1.01).contains(&t) {
        return 1.0e40;
    }
    let foot = [p0[0] + t * d[0], p0[1] + t * d[1], p0[2] + t * d[2]];
    dist2(&foot, p2)
}

/// Perpendicular distance from `p2` to the segment (p0, p1), normalised by
/// the segment length. `100.0` for a zero-length segment.
pub fn ray_offset(p0: &[f64; 3], p1: &[f64; 3], p2: &[f64; 3]) -> f64 {
    let dx = sub(p1, p0);
    let d = dot(&dx, &dx).sqrt();
    if d == 0.0 {
        log::warn!("edge segment with zero length (ray_offset)");
        return 100.0;
    }
    let du = [dx[0] / d, dx[1] / d, dx[2] / d];

    let dp = sub(p2, p0);
    let mut dist = dot(&dp, &dp).sqrt();
    let dpu = if dist != 0.0 {
        [dp[0] / dist, dp[1] / dist, dp[2] / dist]
    } else {
        dp
    };

    dist *= dot(&du, &dpu) / d;
    let px = [
        p0[0] + dist * dx[0] - p2[0],
        p0[1] + dist * dx[1] - p2[1],
        p0[2] + dist * dx[2] - p2[2],
    ];
    dot(&px, &px).sqrt() / d
}

/// Dot of the unit normals of (p0, p1, p2) and (p3, p2, p1); `1.0` when
/// either triangle is degenerate.
pub fn dot_norm(p0: &[f64; 3], p1: &[f64; 3], p2: &[f64; 3], p3: &[f64; 3]) -> f64 {
    let Some(n1) = unit(&cross(&sub(p1, p0), &sub(p2, p0))) else {
        return 1.0;
    };
    let Some(n2) = unit(&cross(&sub(p2, p3), &sub(p1, p3))) else {
        return 1.0;
    };
    dot(&n1, &n2)
}

/// Maximum interior angle of the 3-D triangle (a, b, c), in radians.
pub fn max_xyz_angle(a: &[f64; 3], b: &[f64; 3], c: &[f64; 3]) -> f64 {
    let mut v1 = sub(b, a);
    let mut v2 = sub(c, a);
    let cosa = dot(&v1, &v2);
    let n = cross(&v1, &v2);
    let sina = dot(&n, &n).sqrt();
    let ang0 = sina.atan2(cosa);

    v1 = [-v1[0], -v1[1], -v1[2]];
    v2 = sub(c, b);
    let cosa = dot(&v1, &v2);
    let n = cross(&v1, &v2);
    let sina = dot(&n, &n).sqrt();
    let ang1 = sina.atan2(cosa);

    let ang2 = PI - ang1 - ang0;
    ang0.max(ang1).max(ang2)
}

/// Maximum interior angle of the triangle (a, b, c) in parameter space,
/// with the v axis scaled by `v_over_u` (the face's average metric ratio).
pub fn max_uv_angle(a: &[f64; 2], b: &[f64; 2], c: &[f64; 2], v_over_u: f64) -> f64 {
    let mut v1 = [b[0] - a[0], (b[1] - a[1]) * v_over_u];
    let mut v2 = [c[0] - a[0], (c[1] - a[1]) * v_over_u];
    let cosa = v1[0] * v2[0] + v1[1] * v2[1];
    let sina = (v1[0] * v2[1] - v1[1] * v2[0]).abs();
    let ang0 = sina.atan2(cosa);

    v1 = [-v1[0], -v1[1]];
    v2 = [c[0] - b[0], (c[1] - b[1]) * v_over_u];
    let cosa = v1[0] * v2[0] + v1[1] * v2[1];
    let sina = (v1[0] * v2[1] - v1[1] * v2[0]).abs();
    let ang1 = sina.atan2(cosa);

    let ang2 = PI - ang1 - ang0;
    ang0.max(ang1).max(ang2)
}
