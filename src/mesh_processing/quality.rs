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

//! The swap predicates and the marked-side swap loop. Each predicate
//! answers "does swapping this side improve the metric by more than
//! `ANGTOL`" and keeps the scheduler's `accum` statistic current either
//! way.

use crate::geometry::{cross, dot, sub, unit};
use crate::kernel::predicates::{area2d, max_uv_angle, max_xyz_angle};
use crate::mesh::basic_types::{MidClose, Neighbor};
use crate::mesh_processing::refine::{Phase, Refiner};
use crate::mesh_processing::{ANGTOL, MAXANG};

/// Which metric a swap pass optimises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SwapTest {
    /// Recover inverted parameter-space areas.
    Area,
    /// Reduce the maximum parameter-space angle.
    AngUv,
    /// Reduce the maximum 3-space angle.
    AngXyz,
    /// Raise the minimum dihedral dot across the shared side.
    Diag,
}

impl SwapTest {
    /// Starting value of the `accum` statistic: maximised metrics start at
    /// zero, the minimised dihedral dot starts at one.
    pub(crate) fn start(self) -> f64 {
        match self {
            SwapTest::Diag => 1.0,
            _ => 0.0,
        }
    }
}

impl<'a> Refiner<'a> {
    fn area_test(&mut self, t1: usize, side: usize, t2: usize) -> bool {
        let i0 = self.mesh.tris[t1].indices[side];
        let (i1, i2) = self.mesh.side_verts(t1, side);
        let Some(i3) = self.mesh.opposite_vert(t2, i1, i2) else {
            return false;
        };
        let uv0 = self.mesh.verts[i0].uv;
        let uv1 = self.mesh.verts[i1].uv;
        let uv2 = self.mesh.verts[i2].uv;
        let uv3 = self.mesh.verts[i3].uv;

        let a1 = area2d(&uv0, &uv1, &uv2);
        let a2 = area2d(&uv1, &uv3, &uv2);
        if a1 * self.or_uv > 0.0 && a2 * self.or_uv > 0.0 {
            return false;
        }

        // at least one inverted half; would the swapped pair be upright?
        let a1 = area2d(&uv0, &uv1, &uv3);
        let a2 = area2d(&uv0, &uv3, &uv2);
        a1 * self.or_uv > 0.0 && a2 * self.or_uv > 0.0
    }

    fn ang_uv_test(&mut self, t1: usize, side: usize, t2: usize) -> bool {
        let i0 = self.mesh.tris[t1].indices[side];
        let (i1, i2) = self.mesh.side_verts(t1, side);
        let Some(i3) = self.mesh.opposite_vert(t2, i1, i2) else {
            return false;
        };
        let uv0 = self.mesh.verts[i0].uv;
        let uv1 = self.mesh.verts[i1].uv;
        let uv2 = self.mesh.verts[i2].uv;
        let uv3 = self.mesh.verts[i3].uv;
        let r = self.v_over_u;

        let angle_now =
            max_uv_angle(&uv0, &uv1, &uv2, r).max(max_uv_angle(&uv1, &uv3, &uv2, r));
        let angle_swap =
            max_uv_angle(&uv0, &uv1, &uv3, r).max(max_uv_angle(&uv0, &uv3, &uv2, r));

        if angle_swap + ANGTOL < angle_now {
            self.accum = self.accum.max(angle_swap);
            return true;
        }
        self.accum = self.accum.max(angle_now);
        false
    }

    fn ang_xyz_test(&mut self, t1: usize, side: usize, t2: usize) -> bool {
        let i0 = self.mesh.tris[t1].indices[side];
        let (i1, i2) = self.mesh.side_verts(t1, side);
        let Some(i3) = self.mesh.opposite_vert(t2, i1, i2) else {
            return false;
        };
        let x0 = self.mesh.verts[i0].xyz;
        let x1 = self.mesh.verts[i1].xyz;
        let x2 = self.mesh.verts[i2].xyz;
        let x3 = self.mesh.verts[i3].xyz;

        let angle_now = max_xyz_angle(&x0, &x1, &x2).max(max_xyz_angle(&x1, &x3, &x2));

        // outside the planar pass the swapped pair must stay within the
        // dihedral threshold
        if self.phase != Phase::PlanarSwap {
            let ok = (|| {
                let n1 = unit(&cross(&sub(&x1, &x0), &sub(&x3, &x0)))?;
                let n2 = unit(&cross(&sub(&x2, &x3), &sub(&x0, &x3)))?;
                Some(dot(&n1, &n2) >= self.dotnrm)
            })();
            if ok != Some(true) {
                self.accum = self.accum.max(angle_now);
                return false;
            }
        }

        let angle_swap = max_xyz_angle(&x0, &x1, &x3).max(max_xyz_angle(&x0, &x3, &x2));
        if angle_swap + ANGTOL >= angle_now {
            self.accum = self.accum.max(angle_now);
            return false;
        }
        self.accum = self.accum.max(angle_swap);
        true
    }

    fn diag_test(&mut self, t1: usize, side: usize, t2: usize) -> bool {
        let i0 = self.mesh.tris[t1].indices[side];
        let (i1, i2) = self.mesh.side_verts(t1, side);
        let Some(i3) = self.mesh.opposite_vert(t2, i1, i2) else {
            return false;
        };
        let x0 = self.mesh.verts[i0].xyz;
        let x1 = self.mesh.verts[i1].xyz;
        let x2 = self.mesh.verts[i2].xyz;
        let x3 = self.mesh.verts[i3].xyz;

        // current dihedral dot across the shared side; -2 when degenerate
        let mut old = -2.0;
        if let Some(n1) = unit(&cross(&sub(&x1, &x0), &sub(&x2, &x0))) {
            if let Some(n2) = unit(&cross(&sub(&x2, &x3), &sub(&x1, &x3))) {
                old = dot(&n1, &n2);
            }
        }

        let Some(n1) = unit(&cross(&sub(&x3, &x1), &sub(&x0, &x1))) else {
            return false;
        };
        let Some(n2) = unit(&cross(&sub(&x0, &x2), &sub(&x3, &x2))) else {
            return false;
        };
        let newd = dot(&n1, &n2);

        if newd > old + ANGTOL {
            let uv0 = self.mesh.verts[i0].uv;
            let uv1 = self.mesh.verts[i1].uv;
            let uv2 = self.mesh.verts[i2].uv;
            let uv3 = self.mesh.verts[i3].uv;
            let angle = max_uv_angle(&uv0, &uv1, &uv3, self.v_over_u)
                .max(max_uv_angle(&uv0, &uv3, &uv2, self.v_over_u));
            if angle > MAXANG {
                self.accum = self.accum.min(old);
                return false;
            }
            self.accum = self.accum.min(newd);
            return true;
        }

        self.accum = self.accum.min(old);
        false
    }

    pub(crate) fn run_test(&mut self, test: SwapTest, t1: usize, side: usize, t2: usize) -> bool {
        match test {
            SwapTest::Area => self.area_test(t1, side, t2),
            SwapTest::AngUv => self.ang_uv_test(t1, side, t2),
            SwapTest::AngXyz => self.ang_xyz_test(t1, side, t2),
            SwapTest::Diag => self.diag_test(t1, side, t2),
        }
    }

    /// Sweep every marked interior side with `test`, swapping where it
    /// says so, until a round makes no swaps (or the round cap trips).
    /// Triangles untouched by a round are skipped in the next one. A final
    /// no-op sweep leaves `accum` describing the finished mesh.
    pub(crate) fn swap_tris(&mut self, test: SwapTest) {
        let start = test.start();
        for tri in self.mesh.tris.iter_mut() {
            tri.hit = false;
        }

        let mut rounds = 0;
        loop {
            self.accum = start;
            for tri in self.mesh.tris.iter_mut() {
                tri.count = 0;
            }

            let mut swaps = 0;
            let mut t1 = 0;
            while t1 < self.mesh.tris.len() {
                for side in 0..3 {
                    if self.mesh.tris[t1].mark & (1 << side) == 0 {
                        continue;
                    }
                    let Neighbor::Tri(t2) = self.mesh.tris[t1].neighbors[side] else {
                        continue;
                    };
                    if t2 <= t1 {
                        continue;
                    }
                    if self.mesh.tris[t1].hit && self.mesh.tris[t2].hit {
                        continue;
                    }
                    if !self.run_test(test, t1, side, t2) {
                        continue;
                    }
                    self.mesh.tris[t1].hit = false;
                    self.mesh.tris[t2].hit = false;
                    self.mesh.tris[t1].count += 1;
                    self.mesh.tris[t2].count += 1;

                    // a caching phase saves the doomed centroids before the
                    // triangles change underneath them
                    if self.phase == Phase::CacheFill {
                        for &t in &[t1, t2] {
                            let tri = &self.mesh.tris[t];
                            if tri.close != MidClose::Unfilled {
                                let [a, b, c] = tri.indices;
                                let (close, mid) = (tri.close, tri.mid);
                                if let Some(cache) = self.cache.as_mut() {
                                    cache.add(a, b, c, close, mid);
                                }
                            }
                        }
                    }

                    self.perform_swap(t1, side, t2);
                    swaps += 1;
                }
                t1 += 1;
            }

            for tri in self.mesh.tris.iter_mut() {
                tri.hit = tri.count == 0;
            }
            rounds += 1;
            if swaps == 0 || rounds >= 200 {
                break;
            }
        }

        // one last no-op sweep to refresh the statistic
        self.accum = start;
        for t1 in 0..self.mesh.tris.len() {
            for side in 0..3 {
                if self.mesh.tris[t1].mark & (1 << side) == 0 {
                    continue;
                }
                if let Neighbor::Tri(t2) = self.mesh.tris[t1].neighbors[side] {
                    if t2 > t1 {
                        self.run_test(test, t1, side, t2);
                    }
                }
            }
        }
    }
}
