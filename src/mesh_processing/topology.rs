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

//! The local topology operations: edge swap, triangle split, side split,
//! and edge collapse. Every routine either rejects without touching the
//! store or completes with all mesh invariants re-established, including
//! the per-side swap-candidate marks of everything in reach.

use smallvec::SmallVec;

use crate::geometry::{dist2, midpoint, mid_uv};
use crate::kernel::predicates::area2d;
use crate::mesh::basic_types::{MidClose, Neighbor, TriTri, VertexKind, SIDES};
use crate::mesh_processing::refine::{MidHint, Refiner};

/// Why a local operation was refused. The mesh is untouched in every case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpReject {
    /// Zero or inverted parameter-space area in the affected quad.
    Degenerate,
    /// The split would leave a fragment under 1/8 of the original side.
    RangeViolation,
    /// The surface evaluator refused the query.
    Evaluation,
}

impl<'a> Refiner<'a> {
    /// Side of `t2` facing `t1`.
    #[inline]
    pub(crate) fn opposite_side(&self, t2: usize, t1: usize) -> usize {
        let mut os = 0;
        if self.mesh.tris[t2].neighbors[1] == Neighbor::Tri(t1) {
            os = 1;
        }
        if self.mesh.tris[t2].neighbors[2] == Neighbor::Tri(t1) {
            os = 2;
        }
        os
    }

    /// Replace every link of `n` onto `from` with `to`.
    fn relink_all(&mut self, n: usize, from: usize, to: Neighbor) {
        for j in 0..3 {
            if self.mesh.tris[n].neighbors[j] == Neighbor::Tri(from) {
                self.mesh.tris[n].neighbors[j] = to;
            }
        }
    }

    /// Replace the (last) link of `n` onto `from` with `to`.
    fn relink_one(&mut self, n: usize, from: usize, to: Neighbor) {
        let mut j = 0;
        for s in 1..3 {
            if self.mesh.tris[n].neighbors[s] == Neighbor::Tri(from) {
                j = s;
            }
        }
        self.mesh.tris[n].neighbors[j] = to;
    }

    /// Set or clear the mark bits of `n` on the side(s) facing `t`.
    pub(crate) fn set_back_mark(&mut self, n: usize, t: usize, on: bool) {
        for j in 0..3 {
            if self.mesh.tris[n].neighbors[j] == Neighbor::Tri(t) {
                if on {
                    self.mesh.tris[n].mark |= 1 << j;
                } else {
                    self.mesh.tris[n].mark &= !(1 << j);
                }
            }
        }
    }

    /// Orientation consistency of the configuration a swap across
    /// (`t1`, `side`) would produce: both halves must come out with the
    /// face's reference sign. A sign fault feeds the `or_cnt` budget.
    pub(crate) fn check_or(&mut self, t1: usize, side: usize, t2: usize) -> bool {
        let i0 = self.mesh.tris[t1].indices[side];
        let (i1, i2) = self.mesh.side_verts(t1, side);
        let Some(i3) = self.mesh.opposite_vert(t2, i1, i2) else {
            return false;
        };
        let uv0 = self.mesh.verts[i0].uv;
        let uv1 = self.mesh.verts[i1].uv;
        let uv2 = self.mesh.verts[i2].uv;
        let uv3 = self.mesh.verts[i3].uv;
        let a1 = area2d(&uv0, &uv1, &uv3);
        let a2 = area2d(&uv0, &uv3, &uv2);
        if a1 * a2 <= 0.0 {
            return false;
        }
        if a1 * self.or_uv > 0.0 {
            return true;
        }
        self.or_cnt += 1;
        log::debug!(
            "face {}: wrong OR = {:e}, {:e} ({}), phase = {:?} -- {}",
            self.f_index,
            a1,
            a2,
            self.or_uv,
            self.phase,
            self.or_cnt
        );
        false
    }

    /// Re-derive the mark of `t` on the side facing `n` after a local edit.
    fn mark_after(&mut self, t: usize, side: usize, n: usize) {
        if self.check_or(t, side, n) {
            self.mesh.tris[t].mark |= 1 << side;
            self.set_back_mark(n, t, true);
        } else {
            self.set_back_mark(n, t, false);
        }
    }

    /// Re-derive all three side marks of `t`. The triangle's mark must have
    /// been cleared by the caller.
    pub(crate) fn refresh_marks(&mut self, t: usize) {
        for j in 0..3 {
            if let Neighbor::Tri(n) = self.mesh.tris[t].neighbors[j] {
                self.mark_after(t, j, n);
            }
        }
    }

    /// Mark a neighbourhood of `t` as visited so the surrounding loop does
    /// not immediately re-work freshly edited triangles.
    pub(crate) fn flood(&mut self, t: usize, depth: u32) {
        if depth == 0 {
            return;
        }
        self.mesh.tris[t].hit = true;
        for j in 0..3 {
            if let Neighbor::Tri(n) = self.mesh.tris[t].neighbors[j] {
                self.flood(n, depth - 1);
            }
        }
    }

    /// Swap the shared side of (`t1`, `t2`). The caller has already decided
    /// the swap is an improvement; this rewires the quad, patches the four
    /// outer neighbours, and refreshes every affected mark.
    pub(crate) fn perform_swap(&mut self, t1: usize, side: usize, t2: usize) {
        let os = self.opposite_side(t2, t1);
        let i0 = self.mesh.tris[t1].indices[side];
        let (i1, i2) = self.mesh.side_verts(t1, side);
        let i3 = self.mesh.tris[t2].indices[os];

        let n11 = self.mesh.tris[t1].neighbors[SIDES[side][0]];
        let n12 = self.mesh.tris[t1].neighbors[SIDES[side][1]];
        let (n21, n22) = if self.mesh.tris[t2].indices[SIDES[os][0]] == i1 {
            (
                self.mesh.tris[t2].neighbors[SIDES[os][0]],
                self.mesh.tris[t2].neighbors[SIDES[os][1]],
            )
        } else {
            (
                self.mesh.tris[t2].neighbors[SIDES[os][1]],
                self.mesh.tris[t2].neighbors[SIDES[os][0]],
            )
        };

        self.mesh.tris[t1].indices = [i1, i3, i0];
        self.mesh.tris[t1].neighbors = [Neighbor::Tri(t2), n12, n22];
        self.mesh.tris[t1].mark = 1;
        if let Neighbor::Tri(n) = n22 {
            self.relink_all(n, t2, Neighbor::Tri(t1));
        }
        if let Neighbor::Tri(n) = n12 {
            self.mark_after(t1, 1, n);
        }
        if let Neighbor::Tri(n) = n22 {
            self.mark_after(t1, 2, n);
        }

        self.mesh.tris[t2].indices = [i2, i0, i3];
        self.mesh.tris[t2].neighbors = [Neighbor::Tri(t1), n21, n11];
        self.mesh.tris[t2].mark = 1;
        if let Neighbor::Tri(n) = n11 {
            self.relink_all(n, t1, Neighbor::Tri(t2));
        }
        if let Neighbor::Tri(n) = n21 {
            self.mark_after(t2, 1, n);
        }
        if let Neighbor::Tri(n) = n11 {
            self.mark_after(t2, 2, n);
        }

        let hint = if self.mesh.tris[t1].close == MidClose::Far
            && self.mesh.tris[t2].close == MidClose::Far
        {
            MidHint::Far
        } else {
            MidHint::Compute
        };
        self.fill_mid(t1, hint);
        self.fill_mid(t2, hint);
    }

    /// Replace `t0` with three triangles sharing the inserted face-interior
    /// vertex at (`uv`, `point`).
    pub(crate) fn split_tri(&mut self, t0: usize, uv: [f64; 2], point: [f64; 3]) {
        let node = self.mesh.add_vert(VertexKind::Face, point, uv);
        let indices = self.mesh.tris[t0].indices;
        let neighbr = self.mesh.tris[t0].neighbors;
        let t1 = self.mesh.tris.len();
        let t2 = t1 + 1;

        {
            let tri = &mut self.mesh.tris[t0];
            tri.mark = 0;
            tri.indices[2] = node;
            tri.neighbors[0] = Neighbor::Tri(t1);
            tri.neighbors[1] = Neighbor::Tri(t2);
        }

        self.mesh.tris.push(TriTri::new(
            [indices[1], indices[2], node],
            [Neighbor::Tri(t2), Neighbor::Tri(t0), neighbr[0]],
        ));
        if let Neighbor::Tri(n) = neighbr[0] {
            self.relink_one(n, t0, Neighbor::Tri(t1));
        }

        self.mesh.tris.push(TriTri::new(
            [indices[2], indices[0], node],
            [Neighbor::Tri(t0), Neighbor::Tri(t1), neighbr[1]],
        ));
        if let Neighbor::Tri(n) = neighbr[1] {
            self.relink_one(n, t0, Neighbor::Tri(t2));
        }

        self.fill_mid(t0, MidHint::Compute);
        self.fill_mid(t1, MidHint::Compute);
        self.fill_mid(t2, MidHint::Compute);
        for t in [t0, t1, t2] {
            self.refresh_marks(t);
        }
    }

    /// Split the shared side of (`t1`, `t2`) at its mid-parameter point,
    /// producing four triangles. When either endpoint is a degenerate node
    /// the Euclidean midpoint is inverse-evaluated instead, with a
    /// parameter-space validity check and fallback to the parameter
    /// midpoint. With `side_mid`, refuse fragments under 1/8 of the side.
    pub(crate) fn split_side(
        &mut self,
        t1: usize,
        side: usize,
        t2: usize,
        side_mid: bool,
    ) -> Result<(), OpReject> {
        let os = self.opposite_side(t2, t1);
        let i0 = self.mesh.tris[t1].indices[side];
        let (i1, i2) = self.mesh.side_verts(t1, side);
        let i3 = self.mesh.tris[t2].indices[os];

        let uv0 = self.mesh.verts[i0].uv;
        let uv1 = self.mesh.verts[i1].uv;
        let uv2 = self.mesh.verts[i2].uv;
        let uv3 = self.mesh.verts[i3].uv;
        let a1 = area2d(&uv0, &uv1, &uv3);
        let a2 = area2d(&uv0, &uv3, &uv2);
        if a1 * a2 <= 0.0 || a1 * self.or_uv < 0.0 {
            return Err(OpReject::Degenerate);
        }

        let x1 = self.mesh.verts[i1].xyz;
        let x2 = self.mesh.verts[i2].xyz;
        let degen = self.mesh.verts[i1].kind.is_degenerate_node()
            || self.mesh.verts[i2].kind.is_degenerate_node();
        let (uvm, point) = if degen {
            let probe = self.surf.inv_evaluate(midpoint(&x1, &x2)).ok().filter(
                |(uvq, _)| {
                    a1 * area2d(&uv0, &uv1, uvq) > 0.0
                        && a1 * area2d(&uv0, uvq, &uv2) > 0.0
                        && a1 * area2d(&uv1, &uv3, uvq) > 0.0
                        && a1 * area2d(uvq, &uv3, &uv2) > 0.0
                },
            );
            match probe {
                Some((uvq, xq)) => (uvq, xq),
                None => {
                    let uvq = mid_uv(&uv1, &uv2);
                    let ev = self
                        .surf
                        .evaluate(uvq)
                        .map_err(|_| OpReject::Evaluation)?;
                    (uvq, ev.xyz)
                }
            }
        } else {
            let uvq = mid_uv(&uv1, &uv2);
            let ev = self
                .surf
                .evaluate(uvq)
                .map_err(|_| OpReject::Evaluation)?;
            (uvq, ev.xyz)
        };

        if side_mid {
            let d0 = dist2(&x1, &x2);
            let d1 = dist2(&point, &x2);
            let d2 = dist2(&x1, &point);
            if d1 / d0 < 0.125 || d2 / d0 < 0.125 {
                return Err(OpReject::RangeViolation);
            }
        }

        let node = self.mesh.add_vert(VertexKind::Face, point, uvm);

        let n11 = self.mesh.tris[t1].neighbors[SIDES[side][0]];
        let n12 = self.mesh.tris[t1].neighbors[SIDES[side][1]];
        let (n21, n22) = if self.mesh.tris[t2].indices[SIDES[os][0]] == i1 {
            (
                self.mesh.tris[t2].neighbors[SIDES[os][0]],
                self.mesh.tris[t2].neighbors[SIDES[os][1]],
            )
        } else {
            (
                self.mesh.tris[t2].neighbors[SIDES[os][1]],
                self.mesh.tris[t2].neighbors[SIDES[os][0]],
            )
        };

        let far_hint = self.mesh.tris[t1].close == MidClose::Far
            && self.mesh.tris[t2].close == MidClose::Far;

        let t = [t1, t2, self.mesh.tris.len(), self.mesh.tris.len() + 1];

        {
            let tri = &mut self.mesh.tris[t[0]];
            tri.mark = 0;
            tri.indices = [i0, i1, node];
            tri.neighbors = [Neighbor::Tri(t[1]), Neighbor::Tri(t[2]), n12];
        }
        {
            let tri = &mut self.mesh.tris[t[1]];
            tri.mark = 0;
            tri.indices = [i1, i3, node];
            tri.neighbors = [Neighbor::Tri(t[3]), Neighbor::Tri(t[0]), n22];
        }
        self.mesh.tris.push(TriTri::new(
            [i2, i0, node],
            [Neighbor::Tri(t[0]), Neighbor::Tri(t[3]), n11],
        ));
        if let Neighbor::Tri(n) = n11 {
            self.relink_one(n, t[0], Neighbor::Tri(t[2]));
        }
        self.mesh.tris.push(TriTri::new(
            [i3, i2, node],
            [Neighbor::Tri(t[2]), Neighbor::Tri(t[1]), n21],
        ));
        if let Neighbor::Tri(n) = n21 {
            self.relink_one(n, t[1], Neighbor::Tri(t[3]));
        }

        let hint = if far_hint {
            MidHint::Far
        } else {
            MidHint::Compute
        };
        for &ti in &t {
            self.fill_mid(ti, hint);
        }
        for &ti in &t {
            self.refresh_marks(ti);
        }
        Ok(())
    }

    /// Merge vertex `node` into its neighbour `onto`, removing the two
    /// triangles sharing the edge between them. Arrays are compacted by
    /// swapping the doomed entities to the end and truncating; every
    /// surviving link is rewritten in the same step. `allow_boundary`
    /// admits collapses whose removed vertex sits on the face boundary.
    pub(crate) fn collapse_edge(&mut self, node: usize, onto: usize, allow_boundary: bool) {
        if !allow_boundary && !self.mesh.verts[node].kind.is_face() {
            log::warn!(
                "face {}: collapse vertex {} is not face-interior ({:?})",
                self.f_index,
                node,
                self.mesh.verts[node].kind
            );
            return;
        }

        let tin: SmallVec<[usize; 16]> = self
            .mesh
            .tris
            .iter()
            .enumerate()
            .filter(|(_, tri)| tri.indices.contains(&node))
            .map(|(i, _)| i)
            .collect();

        // the two triangles carrying the collapsing edge, with the index
        // positions of `onto` and `node` inside each
        let mut pair: SmallVec<[(usize, usize, usize); 2]> = SmallVec::new();
        let mut nn = 0;
        for &ti in &tin {
            let tri = &self.mesh.tris[ti];
            if let Some(jt) = (0..3).find(|&j| tri.indices[j] == onto) {
                if nn < 2 {
                    let jn = (0..3).find(|&j| tri.indices[j] == node).unwrap_or(0);
                    pair.push((ti, jt, jn));
                }
                nn += 1;
            }
        }
        if nn != 2 {
            log::warn!(
                "face {}: edge collapse sees {} triangles on the side",
                self.f_index,
                nn
            );
            return;
        }

        // move the doomed vertex to the end of the array
        let last_v = self.mesh.verts.len() - 1;
        if node != last_v {
            self.mesh.verts.swap(node, last_v);
            for tri in &mut self.mesh.tris {
                for idx in &mut tri.indices {
                    if *idx == node {
                        *idx = last_v;
                    } else if *idx == last_v {
                        *idx = node;
                    }
                }
            }
        }
        let merged = if onto == last_v { node } else { onto };
        for tri in &mut self.mesh.tris {
            for idx in &mut tri.indices {
                if *idx == last_v {
                    *idx = merged;
                }
            }
        }

        // move the two doomed triangles to the end of the array
        let ntris = self.mesh.tris.len();
        let (e1, e2) = (ntris - 2, ntris - 1);
        let (mut ta, ja, jna) = pair[0];
        let (mut tb, jb, jnb) = pair[1];
        if e1 != ta {
            self.mesh.tris.swap(e1, ta);
            if tb == e1 {
                tb = ta;
            }
            for tri in &mut self.mesh.tris {
                for nb in &mut tri.neighbors {
                    if *nb == Neighbor::Tri(e1) {
                        *nb = Neighbor::Tri(ta);
                    } else if *nb == Neighbor::Tri(ta) {
                        *nb = Neighbor::Tri(e1);
                    }
                }
            }
            ta = e1;
        }
        if e2 != tb {
            self.mesh.tris.swap(e2, tb);
            for tri in &mut self.mesh.tris {
                for nb in &mut tri.neighbors {
                    if *nb == Neighbor::Tri(e2) {
                        *nb = Neighbor::Tri(tb);
                    } else if *nb == Neighbor::Tri(tb) {
                        *nb = Neighbor::Tri(e2);
                    }
                }
            }
            tb = e2;
        }

        // bridge the outer neighbours across each removed triangle
        for &(slot, jt, jn) in &[(ta, ja, jna), (tb, jb, jnb)] {
            let na = self.mesh.tris[slot].neighbors[jt];
            let nb = self.mesh.tris[slot].neighbors[jn];
            if let Neighbor::Tri(x) = na {
                for j in 0..3 {
                    if self.mesh.tris[x].neighbors[j] == Neighbor::Tri(slot) {
                        self.mesh.tris[x].neighbors[j] = nb;
                    }
                }
            }
            if let Neighbor::Tri(x) = nb {
                for j in 0..3 {
                    if self.mesh.tris[x].neighbors[j] == Neighbor::Tri(slot) {
                        self.mesh.tris[x].neighbors[j] = na;
                    }
                }
            }
        }

        self.mesh.verts.pop();
        self.mesh.tris.truncate(ntris - 2);

        // re-derive the marks around the merged vertex
        let affected: SmallVec<[usize; 16]> = self
            .mesh
            .tris
            .iter()
            .enumerate()
            .filter(|(_, tri)| tri.indices.contains(&merged))
            .map(|(i, _)| i)
            .collect();
        for &t in &affected {
            self.mesh.tris[t].mark = 0;
        }
        for &t in &affected {
            self.refresh_marks(t);
            self.fill_mid(t, MidHint::Compute);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::mesh::basic_types::{TriMesh, TriVert, VertexKind};
    use crate::mesh::midpoint_cache::MidpointCache;
    use crate::mesh_processing::quality::SwapTest;
    use crate::mesh_processing::refine::{Phase, Refiner};
    use crate::surface::analytic::Plane;
    use crate::surface::Surface;

    fn vert(x: f64, y: f64) -> TriVert {
        TriVert {
            kind: VertexKind::Face,
            xyz: [x, y, 0.0],
            uv: [x, y],
        }
    }

    fn refiner<'a>(mesh: &'a mut TriMesh, surf: &'a dyn Surface) -> Refiner<'a> {
        Refiner {
            mesh,
            surf,
            or_uv: 1.0,
            dotnrm: 0.0,
            chord: 0.0,
            maxlen: 0.0,
            minlen: 0.0,
            max_pts: 0,
            planar: true,
            f_index: 0,
            v_over_u: 1.0,
            eps2: 0.0,
            devia2: 0.0,
            edist2: 1.0,
            accum: 0.0,
            or_cnt: 0,
            phase: Phase::Setup,
            cache: None::<MidpointCache>,
            side_mid: false,
            stri: 0,
        }
    }

    /// Unit square split along the (0, 2) diagonal.
    fn square() -> TriMesh {
        TriMesh::new(
            vec![
                vert(0.0, 0.0),
                vert(1.0, 0.0),
                vert(1.0, 1.0),
                vert(0.0, 1.0),
            ],
            vec![[0, 1, 2], [0, 2, 3]],
            vec![[0, 1], [1, 2], [2, 3], [3, 0]],
        )
        .unwrap()
    }

    /// Skinny kite whose long diagonal (0, 2) wants flipping to (1, 3).
    fn kite() -> TriMesh {
        TriMesh::new(
            vec![
                vert(0.0, 0.0),
                vert(1.0, -0.2),
                vert(2.0, 0.0),
                vert(1.0, 0.2),
            ],
            vec![[0, 1, 2], [0, 2, 3]],
            vec![[0, 1], [1, 2], [2, 3], [3, 0]],
        )
        .unwrap()
    }

    fn tri_sets(mesh: &TriMesh) -> Vec<[usize; 3]> {
        mesh.tris
            .iter()
            .map(|t| {
                let mut s = t.indices;
                s.sort_unstable();
                s
            })
            .collect()
    }

    #[test]
    fn uv_angle_swap_flips_the_skinny_pair() {
        let plane = Plane::xy();
        let mut mesh = kite();
        let mut r = refiner(&mut mesh, &plane);
        r.swap_tris(SwapTest::AngUv);
        let sets = tri_sets(r.mesh);
        assert!(sets.contains(&[1, 2, 3]));
        assert!(sets.contains(&[0, 1, 3]));
        mesh.check(Some(1.0)).unwrap();
    }

    #[test]
    fn balanced_pair_does_not_swap() {
        let plane = Plane::xy();
        let mut mesh = square();
        let before = tri_sets(&mesh);
        let mut r = refiner(&mut mesh, &plane);
        r.swap_tris(SwapTest::AngUv);
        assert_eq!(tri_sets(&mesh), before);
        mesh.check(Some(1.0)).unwrap();
    }

    #[test]
    fn side_split_makes_four_triangles() {
        let plane = Plane::xy();
        let mut mesh = square();
        let mut r = refiner(&mut mesh, &plane);
        // the diagonal is side 1 of triangle 0
        r.split_side(0, 1, 1, false).unwrap();
        assert_eq!(mesh.verts.len(), 5);
        assert_eq!(mesh.tris.len(), 4);
        assert_eq!(mesh.verts[4].uv, [0.5, 0.5]);
        mesh.check(Some(1.0)).unwrap();
    }

    /// Maps the unit square onto itself with a strong pull towards the
    /// origin, so mid-parameter points land close to one side endpoint.
    struct Quartic;

    impl Surface for Quartic {
        fn evaluate(
            &self,
            uv: [f64; 2],
        ) -> Result<crate::surface::SurfEval, crate::surface::SurfaceError> {
            let (u, v) = (uv[0], uv[1]);
            Ok(crate::surface::SurfEval {
                xyz: [u * u * u * u, v * v * v * v, 0.0],
                du: [4.0 * u * u * u, 0.0, 0.0],
                dv: [0.0, 4.0 * v * v * v, 0.0],
                d2: None,
            })
        }

        fn inv_evaluate(
            &self,
            _xyz: [f64; 3],
        ) -> Result<([f64; 2], [f64; 3]), crate::surface::SurfaceError> {
            Err(crate::surface::SurfaceError::Failed)
        }

        fn range(&self) -> Result<crate::surface::UvRange, crate::surface::SurfaceError> {
            Ok(crate::surface::UvRange {
                u_min: 0.0,
                u_max: 1.0,
                v_min: 0.0,
                v_max: 1.0,
                periodic: false,
            })
        }
    }

    #[test]
    fn side_split_honours_the_fragment_rule() {
        // corner uv values map to themselves under the quartic, so the
        // frame is consistent; the diagonal's mid-parameter point lands at
        // (1/16, 1/16), far under 1/8 of the way along the diagonal
        let quartic = Quartic;
        let mut mesh = square();
        let mut r = refiner(&mut mesh, &quartic);
        assert_eq!(
            r.split_side(0, 1, 1, true),
            Err(super::OpReject::RangeViolation)
        );
        assert_eq!(mesh.verts.len(), 4);
        assert_eq!(mesh.tris.len(), 2);
        mesh.check(Some(1.0)).unwrap();

        // without the mid-side rule the same split is admitted
        let mut r = refiner(&mut mesh, &quartic);
        r.split_side(0, 1, 1, false).unwrap();
        assert_eq!(mesh.tris.len(), 4);
        mesh.check(Some(1.0)).unwrap();
    }

    #[test]
    fn tri_split_fans_about_the_inserted_point() {
        let plane = Plane::xy();
        let mut mesh = square();
        let mut r = refiner(&mut mesh, &plane);
        let uv = [2.0 / 3.0, 1.0 / 3.0];
        r.split_tri(0, uv, [uv[0], uv[1], 0.0]);
        assert_eq!(mesh.verts.len(), 5);
        assert_eq!(mesh.tris.len(), 4);
        let with_new = mesh
            .tris
            .iter()
            .filter(|t| t.indices.contains(&4))
            .count();
        assert_eq!(with_new, 3);
        mesh.check(Some(1.0)).unwrap();
    }

    #[test]
    fn collapse_removes_a_fan_centre() {
        let plane = Plane::xy();
        let mut mesh = TriMesh::new(
            vec![
                vert(0.0, 0.0),
                vert(1.0, 0.0),
                vert(1.0, 1.0),
                vert(0.0, 1.0),
                vert(0.5, 0.5),
            ],
            vec![[0, 1, 4], [1, 2, 4], [2, 3, 4], [3, 0, 4]],
            vec![[0, 1], [1, 2], [2, 3], [3, 0]],
        )
        .unwrap();
        let mut r = refiner(&mut mesh, &plane);
        r.collapse_edge(4, 0, false);
        assert_eq!(mesh.verts.len(), 4);
        assert_eq!(mesh.tris.len(), 2);
        assert!(mesh.tris.iter().all(|t| !t.indices.contains(&4)));
        mesh.check(Some(1.0)).unwrap();
    }

    #[test]
    fn collapse_refuses_a_boundary_vertex_without_the_flag() {
        let plane = Plane::xy();
        let mut mesh = TriMesh::new(
            vec![
                vert(0.0, 0.0),
                vert(1.0, 0.0),
                vert(1.0, 1.0),
                vert(0.0, 1.0),
                vert(0.5, 0.5),
            ],
            vec![[0, 1, 4], [1, 2, 4], [2, 3, 4], [3, 0, 4]],
            vec![[0, 1], [1, 2], [2, 3], [3, 0]],
        )
        .unwrap();
        for v in [0usize, 1, 2, 3] {
            mesh.verts[v].kind = VertexKind::Edge { edge: 0, ordinal: v };
        }
        let ntris = mesh.tris.len();
        let mut r = refiner(&mut mesh, &plane);
        // vertex 0 sits on the boundary; flag 0 collapses must refuse it
        r.collapse_edge(0, 4, false);
        assert_eq!(mesh.tris.len(), ntris);
        mesh.check(Some(1.0)).unwrap();
    }

    #[test]
    fn swap_preserves_invariants_on_a_grid() {
        // 3x1 strip of squares with noisy diagonals; run the full swap
        // loop and audit the store afterwards
        let plane = Plane::xy();
        let mut verts = Vec::new();
        for i in 0..4 {
            verts.push(vert(i as f64, 0.0));
        }
        for i in 0..4 {
            verts.push(vert(i as f64, 1.0 + 0.1 * (i % 2) as f64));
        }
        let mut tris = Vec::new();
        let mut segs = Vec::new();
        for k in 0..3 {
            tris.push([k, k + 1, k + 5]);
            tris.push([k, k + 5, k + 4]);
            segs.push([k, k + 1]);
            segs.push([k + 4, k + 5]);
        }
        segs.push([0, 4]);
        segs.push([3, 7]);
        let mut mesh = TriMesh::new(verts, tris, segs).unwrap();
        let mut r = refiner(&mut mesh, &plane);
        r.swap_tris(SwapTest::AngUv);
        r.swap_tris(SwapTest::Diag);
        mesh.check(Some(1.0)).unwrap();
    }
}
