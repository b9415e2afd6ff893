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

//! Analytic surfaces with closed-form inverse evaluation. Mostly exercised
//! by the test suite, but they implement the full [`Surface`] contract and
//! can back a real face.

use std::f64::consts::PI;

use crate::surface::{SurfEval, Surface, SurfaceError, UvRange};

/// Plane through `origin` spanned by `du` and `dv`.
#[derive(Debug, Clone, Copy)]
pub struct Plane {
    pub origin: [f64; 3],
    pub du: [f64; 3],
    pub dv: [f64; 3],
}

impl Plane {
    /// The z = 0 plane with uv equal to xy.
    pub fn xy() -> Self {
        Plane {
            origin: [0.0; 3],
            du: [1.0, 0.0, 0.0],
            dv: [0.0, 1.0, 0.0],
        }
    }
}

impl Surface for Plane {
    fn evaluate(&self, uv: [f64; 2]) -> Result<SurfEval, SurfaceError> {
        let mut xyz = self.origin;
        for i in 0..3 {
            xyz[i] += uv[0] * self.du[i] + uv[1] * self.dv[i];
        }
        Ok(SurfEval {
            xyz,
            du: self.du,
            dv: self.dv,
            d2: Some([[0.0; 3]; 3]),
        })
    }

    fn inv_evaluate(&self, xyz: [f64; 3]) -> Result<([f64; 2], [f64; 3]), SurfaceError> {
        // assumes orthogonal axes, which every constructor here produces
        let r = [
            xyz[0] - self.origin[0],
            xyz[1] - self.origin[1],
            xyz[2] - self.origin[2],
        ];
        let d2u = self.du[0] * self.du[0] + self.du[1] * self.du[1] + self.du[2] * self.du[2];
        let d2v = self.dv[0] * self.dv[0] + self.dv[1] * self.dv[1] + self.dv[2] * self.dv[2];
        if d2u == 0.0 || d2v == 0.0 {
            return Err(SurfaceError::Degenerate);
        }
        let u = (r[0] * self.du[0] + r[1] * self.du[1] + r[2] * self.du[2]) / d2u;
        let v = (r[0] * self.dv[0] + r[1] * self.dv[1] + r[2] * self.dv[2]) / d2v;
        let on = self.evaluate([u, v])?;
        Ok(([u, v], on.xyz))
    }

    fn range(&self) -> Result<UvRange, SurfaceError> {
        Ok(UvRange {
            u_min: -1.0e8,
            u_max: 1.0e8,
            v_min: -1.0e8,
            v_max: 1.0e8,
            periodic: false,
        })
    }
}

/// Sphere of `radius` about `center`; u is the azimuth, v the latitude.
#[derive(Debug, Clone, Copy)]
pub struct Sphere {
    pub center: [f64; 3],
    pub radius: f64,
}

impl Surface for Sphere {
    fn evaluate(&self, uv: [f64; 2]) -> Result<SurfEval, SurfaceError> {
        let (su, cu) = uv[0].sin_cos();
        let (sv, cv) = uv[1].sin_cos();
        let r = self.radius;
        let xyz = [
            self.center[0] + r * cv * cu,
            self.center[1] + r * cv * su,
            self.center[2] + r * sv,
        ];
        let du = [-r * cv * su, r * cv * cu, 0.0];
        let dv = [-r * sv * cu, -r * sv * su, r * cv];
        let d2 = [
            [-r * cv * cu, -r * cv * su, 0.0],
            [r * sv * su, -r * sv * cu, 0.0],
            [-r * cv * cu, -r * cv * su, -r * sv],
        ];
        Ok(SurfEval {
            xyz,
            du,
            dv,
            d2: Some(d2),
        })
    }

    fn inv_evaluate(&self, xyz: [f64; 3]) -> Result<([f64; 2], [f64; 3]), SurfaceError> {
        let r = [
            xyz[0] - self.center[0],
            xyz[1] - self.center[1],
            xyz[2] - self.center[2],
        ];
        let len = (r[0] * r[0] + r[1] * r[1] + r[2] * r[2]).sqrt();
        if len == 0.0 {
            return Err(SurfaceError::Degenerate);
        }
        let v = (r[2] / len).clamp(-1.0, 1.0).asin();
        let u = r[1].atan2(r[0]).rem_euclid(2.0 * PI);
        let on = self.evaluate([u, v])?;
        Ok(([u, v], on.xyz))
    }

    fn range(&self) -> Result<UvRange, SurfaceError> {
        Ok(UvRange {
            u_min: 0.0,
            u_max: 2.0 * PI,
            v_min: -PI / 2.0,
            v_max: PI / 2.0,
            periodic: true,
        })
    }
}

/// Cylinder about the z axis; u is the azimuth, v the height.
#[derive(Debug, Clone, Copy)]
pub struct Cylinder {
    pub radius: f64,
    pub height: f64,
}

impl Surface for Cylinder {
    fn evaluate(&self, uv: [f64; 2]) -> Result<SurfEval, SurfaceError> {
        let (su, cu) = uv[0].sin_cos();
        let r = self.radius;
        Ok(SurfEval {
            xyz: [r * cu, r * su, uv[1]],
            du: [-r * su, r * cu, 0.0],
            dv: [0.0, 0.0, 1.0],
            d2: Some([[-r * cu, -r * su, 0.0], [0.0; 3], [0.0; 3]]),
        })
    }

    fn inv_evaluate(&self, xyz: [f64; 3]) -> Result<([f64; 2], [f64; 3]), SurfaceError> {
        if xyz[0] == 0.0 && xyz[1] == 0.0 {
            return Err(SurfaceError::Degenerate);
        }
        let u = xyz[1].atan2(xyz[0]).rem_euclid(2.0 * PI);
        let on = self.evaluate([u, xyz[2]])?;
        Ok(([u, xyz[2]], on.xyz))
    }

    fn range(&self) -> Result<UvRange, SurfaceError> {
        Ok(UvRange {
            u_min: 0.0,
            u_max: 2.0 * PI,
            v_min: 0.0,
            v_max: self.height,
            periodic: true,
        })
    }
}

/// Cone about the z axis with base `radius` at v = 0 shrinking to the apex
/// at v = `height`. The apex is a degenerate node: `du` vanishes there.
#[derive(Debug, Clone, Copy)]
pub struct Cone {
    pub radius: f64,
    pub height: f64,
}

impl Surface for Cone {
    fn evaluate(&self, uv: [f64; 2]) -> Result<SurfEval, SurfaceError> {
        let (su, cu) = uv[0].sin_cos();
        let t = uv[1] / self.height;
        let r = self.radius * (1.0 - t);
        let drdv = -self.radius / self.height;
        Ok(SurfEval {
            xyz: [r * cu, r * su, uv[1]],
            du: [-r * su, r * cu, 0.0],
            dv: [drdv * cu, drdv * su, 1.0],
            d2: Some([
                [-r * cu, -r * su, 0.0],
                [-drdv * su, drdv * cu, 0.0],
                [0.0; 3],
            ]),
        })
    }

    fn inv_evaluate(&self, xyz: [f64; 3]) -> Result<([f64; 2], [f64; 3]), SurfaceError> {
        let v = xyz[2].clamp(0.0, self.height);
        if xyz[0] == 0.0 && xyz[1] == 0.0 {
            // on the axis; the apex is the only surface point there
            if (v - self.height).abs() > 1.0e-12 * self.height {
                return Err(SurfaceError::Degenerate);
            }
            return Ok(([0.0, self.height], [0.0, 0.0, self.height]));
        }
        let u = xyz[1].atan2(xyz[0]).rem_euclid(2.0 * PI);
        let on = self.evaluate([u, v])?;
        Ok(([u, v], on.xyz))
    }

    fn range(&self) -> Result<UvRange, SurfaceError> {
        Ok(UvRange {
            u_min: 0.0,
            u_max: 2.0 * PI,
            v_min: 0.0,
            v_max: self.height,
            periodic: true,
        })
    }
}
