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

//! Small concrete vector helpers over `[f64; 3]` / `[f64; 2]`.

#[inline(always)]
pub fn sub(a: &[f64; 3], b: &[f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline(always)]
pub fn dot(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline(always)]
pub fn cross(a: &[f64; 3], b: &[f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

#[inline(always)]
pub fn dist2(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    (a[0] - b[0]) * (a[0] - b[0])
        + (a[1] - b[1]) * (a[1] - b[1])
        + (a[2] - b[2]) * (a[2] - b[2])
}

#[inline(always)]
pub fn norm2(a: &[f64; 3]) -> f64 {
    dot(a, a)
}

/// Unit vector along `a`; `None` if the vector is exactly zero.
#[inline]
pub fn unit(a: &[f64; 3]) -> Option<[f64; 3]> {
    let d = norm2(a);
    if d == 0.0 {
        return None;
    }
    let s = 1.0 / d.sqrt();
    Some([a[0] * s, a[1] * s, a[2] * s])
}

/// Unit normal of the triangle (a, b, c); `None` when the area vanishes.
#[inline]
pub fn tri_normal(a: &[f64; 3], b: &[f64; 3], c: &[f64; 3]) -> Option<[f64; 3]> {
    unit(&cross(&sub(b, a), &sub(c, a)))
}

#[inline(always)]
pub fn midpoint(a: &[f64; 3], b: &[f64; 3]) -> [f64; 3] {
    [
        0.5 * (a[0] + b[0]),
        0.5 * (a[1] + b[1]),
        0.5 * (a[2] + b[2]),
    ]
}

#[inline(always)]
pub fn mid_uv(a: &[f64; 2], b: &[f64; 2]) -> [f64; 2] {
    [0.5 * (a[0] + b[0]), 0.5 * (a[1] + b[1])]
}

#[inline(always)]
pub fn centroid(a: &[f64; 3], b: &[f64; 3], c: &[f64; 3]) -> [f64; 3] {
    [
        (a[0] + b[0] + c[0]) / 3.0,
        (a[1] + b[1] + c[1]) / 3.0,
        (a[2] + b[2] + c[2]) / 3.0,
    ]
}

#[inline(always)]
pub fn centroid_uv(a: &[f64; 2], b: &[f64; 2], c: &[f64; 2]) -> [f64; 2] {
    [(a[0] + b[0] + c[0]) / 3.0, (a[1] + b[1] + c[1]) / 3.0]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cross_is_orthogonal() {
        let a = [1.0, 2.0, 3.0];
        let b = [-2.0, 0.5, 4.0];
        let c = cross(&a, &b);
        assert!(dot(&a, &c).abs() < 1e-12);
        assert!(dot(&b, &c).abs() < 1e-12);
    }

    #[test]
    fn unit_rejects_zero() {
        assert!(unit(&[0.0, 0.0, 0.0]).is_none());
        let u = unit(&[3.0, 0.0, 4.0]).unwrap();
        assert!((norm2(&u) - 1.0).abs() < 1e-15);
    }

    #[test]
    fn degenerate_triangle_has_no_normal() {
        let a = [0.0, 0.0, 0.0];
        let b = [1.0, 1.0, 1.0];
        let c = [2.0, 2.0, 2.0];
        assert!(tri_normal(&a, &b, &c).is_none());
    }
}
