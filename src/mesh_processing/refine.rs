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

//! The multi-phase refinement schedule. Each phase drives a different
//! quality metric; the mesh stays valid between any two operations, so a
//! budget cutoff anywhere still returns the best triangulation reached.

use thiserror::Error;

use crate::geometry::{centroid, centroid_uv, cross, dist2, dot, midpoint, sub, unit};
use crate::kernel::predicates::{
    area2d, dot_norm, line_offset2, max_uv_angle, ray_offset, strictly_inside_projected,
};
use crate::mesh::basic_types::{MidClose, Neighbor, TriMesh, TriTri, VertexKind};
use crate::mesh::core::MeshError;
use crate::mesh::midpoint_cache::MidpointCache;
use crate::mesh_processing::quality::SwapTest;
use crate::mesh_processing::{CUTANG, DEVANG, FLOOD_DEPTH, MAXANG, MAX_OR_CNT, ANGTOL};
use crate::surface::{Quadder, Surface, SurfaceError};

/// Sense of the face's parameter-space orientation relative to its surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UvOrientation {
    #[default]
    Forward,
    Reverse,
}

impl UvOrientation {
    #[inline]
    pub fn sign(self) -> f64 {
        match self {
            UvOrientation::Forward => 1.0,
            UvOrientation::Reverse => -1.0,
        }
    }
}

/// Refinement criteria and limits for one face.
#[derive(Debug, Clone)]
pub struct RefineOptions {
    /// Face label used in diagnostics only.
    pub face_index: usize,
    /// Planar faces skip the curvature phases entirely.
    pub planar: bool,
    pub or_uv: UvOrientation,
    /// Minimum acceptable dihedral dot across interior sides, in [0, 1].
    pub dotnrm: f64,
    /// Maximum side length; zero disables edge-length enforcement.
    pub maxlen: f64,
    /// Minimum side length floor folded into the derived tolerances.
    pub minlen: f64,
    /// Chord-height tolerance; zero disables chord refinement.
    pub chord: f64,
    /// Positive: absolute vertex cap. Negative: cap on vertices added over
    /// the frame. Zero: unbounded.
    pub max_pts: i64,
    /// Hints passed through to an external quadder.
    pub qparm: [f64; 3],
    /// Quad side counts of the face's loop, when quadding applies.
    pub lens: [usize; 4],
    /// Boundary UV grid for an external quadder; `None` disables the quad
    /// path.
    pub quad_uvs: Option<Vec<[f64; 2]>>,
    /// Collapse boundary-hugging interior vertices left behind by the
    /// opposing-edge phase. Off by default.
    pub prune_interior: bool,
}

impl Default for RefineOptions {
    fn default() -> Self {
        RefineOptions {
            face_index: 0,
            planar: false,
            or_uv: UvOrientation::Forward,
            dotnrm: 0.0,
            maxlen: 0.0,
            minlen: 0.0,
            chord: 0.0,
            max_pts: 0,
            qparm: [0.0; 3],
            lens: [0; 4],
            quad_uvs: None,
            prune_interior: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum TessError {
    #[error("no frame triangle contains vertex {vertex}")]
    FrameTriangleNotFound { vertex: usize },
    #[error(transparent)]
    Surface(#[from] SurfaceError),
    #[error(transparent)]
    Mesh(#[from] MeshError),
}

/// Whether `fill_mid` may trust that the centroid is far from the boundary
/// (both parents of the edit were) or has to re-test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MidHint {
    Compute,
    Far,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    /// Zero-area sweep and initial area swap.
    Setup,
    /// The lettered point-spreading phases.
    Spread,
    /// Facet-normal refinement; centroids are live.
    FacetNorm,
    /// Chord-height refinement; centroids are live.
    FacetDist,
    /// Final swap passes.
    Cleanup,
    /// The planar-face swap pass (no dihedral guard).
    PlanarSwap,
    /// Swap pass that spills evicted centroids into the midpoint cache.
    CacheFill,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BreakMode {
    /// Phase A: largest facet first, folded-neighbour candidates.
    Largest,
    /// Phase C: split where the memoised centroid no longer projects into
    /// its facet.
    CacheMiss,
}

pub(crate) struct Refiner<'a> {
    pub(crate) mesh: &'a mut TriMesh,
    pub(crate) surf: &'a dyn Surface,
    pub(crate) or_uv: f64,
    pub(crate) dotnrm: f64,
    pub(crate) chord: f64,
    pub(crate) maxlen: f64,
    pub(crate) minlen: f64,
    pub(crate) max_pts: i64,
    pub(crate) planar: bool,
    pub(crate) f_index: usize,
    pub(crate) v_over_u: f64,
    pub(crate) eps2: f64,
    pub(crate) devia2: f64,
    pub(crate) edist2: f64,
    pub(crate) accum: f64,
    pub(crate) or_cnt: u32,
    pub(crate) phase: Phase,
    pub(crate) cache: Option<MidpointCache>,
    pub(crate) side_mid: bool,
    /// Triangle count at entry; scales the split budgets.
    pub(crate) stri: usize,
}

/// Refine `mesh` against `surf` until the criteria in `opts` hold, the
/// vertex budget runs out, or the orientation-fault budget trips. The mesh
/// is valid on every return. A `quadder` is consulted only when `opts`
/// carries a quad UV grid; an unusable quadding falls back to triangle
/// refinement.
pub fn tessellate(
    surf: &dyn Surface,
    mesh: &mut TriMesh,
    opts: &RefineOptions,
    quadder: Option<&dyn Quadder>,
) -> Result<(), TessError> {
    let mut r = Refiner {
        mesh,
        surf,
        or_uv: opts.or_uv.sign(),
        dotnrm: opts.dotnrm,
        chord: opts.chord,
        maxlen: opts.maxlen,
        minlen: opts.minlen,
        max_pts: opts.max_pts,
        planar: opts.planar,
        f_index: opts.face_index,
        v_over_u: 1.0,
        eps2: f64::MAX,
        devia2: 0.0,
        edist2: 0.0,
        accum: 0.0,
        or_cnt: 0,
        phase: Phase::Setup,
        cache: None,
        side_mid: false,
        stri: 0,
    };
    r.run(opts, quadder)
}

impl<'a> Refiner<'a> {
    /// Cached-centroid maintenance for triangle `t`. Outside the facet
    /// phases this only invalidates; inside them the surface is evaluated
    /// at the UV centroid and the boundary proximity re-derived unless both
    /// parents of the edit were already known to be far.
    pub(crate) fn fill_mid(&mut self, t: usize, hint: MidHint) {
        self.mesh.tris[t].close = MidClose::Unfilled;
        if !matches!(self.phase, Phase::FacetNorm | Phase::FacetDist) {
            return;
        }
        let [i0, i1, i2] = self.mesh.tris[t].indices;
        let uv = centroid_uv(
            &self.mesh.verts[i0].uv,
            &self.mesh.verts[i1].uv,
            &self.mesh.verts[i2].uv,
        );
        let Ok(ev) = self.surf.evaluate(uv) else {
            return;
        };
        self.mesh.tris[t].mid = ev.xyz;
        self.mesh.tris[t].close = match hint {
            MidHint::Far => MidClose::Far,
            MidHint::Compute => {
                if self.close_edge(t, &ev.xyz) {
                    MidClose::Near
                } else {
                    MidClose::Far
                }
            }
        };
    }

    /// Is `xyz` within ray distance of a boundary edge, looking up to four
    /// neighbours deep? A boundary side joining two copies of one model
    /// node counts as close outright.
    pub(crate) fn close_edge(&self, t: usize, xyz: &[f64; 3]) -> bool {
        self.rec_close_edge(t, xyz, 4)
    }

    fn rec_close_edge(&self, t: usize, xyz: &[f64; 3], depth: u32) -> bool {
        if depth == 0 {
            return false;
        }
        for side in 0..3 {
            match self.mesh.tris[t].neighbors[side] {
                Neighbor::Seg(_) => {
                    let (a, b) = self.mesh.side_verts(t, side);
                    let va = &self.mesh.verts[a];
                    let vb = &self.mesh.verts[b];
                    if let (
                        VertexKind::Node { index: ia, .. },
                        VertexKind::Node { index: ib, .. },
                    ) = (va.kind, vb.kind)
                    {
                        if ia == ib {
                            return true;
                        }
                    }
                    if ray_offset(&va.xyz, &vb.xyz, xyz) < 0.125 {
                        return true;
                    }
                }
                Neighbor::Tri(tn) => {
                    if self.rec_close_edge(tn, xyz, depth - 1) {
                        return true;
                    }
                }
            }
        }
        false
    }

    /// Like `close_edge` but measured as squared distance to the boundary
    /// line against the mean-segment tolerance, six neighbours deep.
    fn close2_edge(&self, t: usize, xyz: &[f64; 3]) -> bool {
        self.rec_close2_edge(t, xyz, 6)
    }

    fn rec_close2_edge(&self, t: usize, xyz: &[f64; 3], depth: u32) -> bool {
        if depth == 0 {
            return false;
        }
        for side in 0..3 {
            match self.mesh.tris[t].neighbors[side] {
                Neighbor::Seg(_) => {
                    let (a, b) = self.mesh.side_verts(t, side);
                    if line_offset2(&self.mesh.verts[a].xyz, &self.mesh.verts[b].xyz, xyz)
                        < self.edist2
                    {
                        return true;
                    }
                }
                Neighbor::Tri(tn) => {
                    if self.rec_close2_edge(tn, xyz, depth - 1) {
                        return true;
                    }
                }
            }
        }
        false
    }

    fn past_max_pts(&self) -> bool {
        if self.max_pts > 0 {
            self.mesh.verts.len() as i64 > self.max_pts
        } else if self.max_pts < 0 {
            (self.mesh.verts.len() - self.mesh.nfrvrts + 2) as i64 > -self.max_pts
        } else {
            false
        }
    }

    fn past_max_pts_pos(&self) -> bool {
        self.max_pts > 0 && self.mesh.verts.len() as i64 > self.max_pts
    }

    /// Collapse boundary-degenerate triangles: zero 3-D area with the
    /// offending side joining two vertices of one boundary entity.
    fn zero_area(&mut self) {
        let range = match self.surf.range() {
            Ok(r) => r,
            Err(e) => {
                log::warn!("face {}: range query failed in zero-area sweep: {e}", self.f_index);
                return;
            }
        };
        // twice the snap window the edge discretisation uses
        let smallu = 0.0001 * (range.u_max - range.u_min);
        let smallv = 0.0001 * (range.v_max - range.v_min);

        let pt_pair = |kind: VertexKind| -> Option<(i64, i64)> {
            match kind {
                VertexKind::Node { index, .. } => Some((0, index as i64)),
                VertexKind::Edge { edge, ordinal } => Some((ordinal as i64, edge as i64)),
                VertexKind::Face => None,
            }
        };

        let mut i = 0;
        while i < self.mesh.tris.len() {
            let [i0, i1, i2] = self.mesh.tris[i].indices;
            let x0 = self.mesh.verts[i0].xyz;
            let x1 = self.mesh.verts[i1].xyz;
            let x2 = self.mesh.verts[i2].xyz;
            let n = cross(&sub(&x1, &x0), &sub(&x2, &x0));
            if dot(&n, &n) != 0.0 {
                i += 1;
                continue;
            }

            let (Some(p0), Some(p1), Some(p2)) = (
                pt_pair(self.mesh.verts[i0].kind),
                pt_pair(self.mesh.verts[i1].kind),
                pt_pair(self.mesh.verts[i2].kind),
            ) else {
                i += 1;
                continue;
            };
            let mut side = None;
            if p1 == p2 {
                side = Some(0);
            }
            if p0 == p2 {
                side = Some(1);
            }
            if p0 == p1 {
                side = Some(2);
            }
            let Some(side) = side else {
                i += 1;
                continue;
            };
            if self.mesh.tris[i].neighbors[side].tri().is_none() {
                i += 1;
                continue;
            }

            let (s0, s1) = self.mesh.side_verts(i, side);
            let uv0 = self.mesh.verts[s0].uv;
            let uv1 = self.mesh.verts[s1].uv;
            if (uv0[0] - uv1[0]).abs() > smallu || (uv0[1] - uv1[1]).abs() > smallv {
                i += 1;
                continue;
            }
            log::debug!(
                "face {}: zero area {}/{} -- {:?} {:?} {:?}",
                self.f_index,
                i,
                side,
                p0,
                p1,
                p2
            );
            self.collapse_edge(s0, s1, true);
            i += 1;
        }
    }

    /// Outward surface normal at a parameter point, from the (individually
    /// normalised) first derivatives. Zero when evaluation fails.
    fn vertex_normal(&self, uv: [f64; 2]) -> [f64; 3] {
        match self.surf.evaluate(uv) {
            Ok(ev) => {
                let du = unit(&ev.du).unwrap_or(ev.du);
                let dv = unit(&ev.dv).unwrap_or(ev.dv);
                cross(&du, &dv)
            }
            Err(SurfaceError::Extrapolated) => [0.0; 3],
            Err(e) => {
                log::warn!(
                    "face {}: evaluate failed at {:?} building normals: {e}",
                    self.f_index,
                    uv
                );
                [0.0; 3]
            }
        }
    }

    /// Split the longest interior side per triangle whose endpoints both
    /// sit on the face boundary (or, with `aux` normals, point opposite
    /// ways), then flood the neighbourhood. `cnt` caps the vertex count;
    /// zero means no cap.
    fn split_inter(&mut self, mut aux: Option<&mut Vec<[f64; 3]>>, cnt: usize) -> usize {
        let total = self.mesh.tris.len();
        for tri in self.mesh.tris.iter_mut() {
            tri.hit = false;
        }

        let mut split = 0;
        for t1 in 0..total {
            if self.mesh.tris[t1].hit {
                continue;
            }

            let mut side = None;
            let mut dist = 0.0;
            for j in 0..3 {
                let Neighbor::Tri(t2) = self.mesh.tris[t1].neighbors[j] else {
                    continue;
                };
                if self.mesh.tris[t2].hit {
                    continue;
                }
                let (i1, i2) = self.mesh.side_verts(t1, j);
                match aux.as_ref() {
                    None => {
                        if self.mesh.verts[i1].kind.is_face()
                            || self.mesh.verts[i2].kind.is_face()
                        {
                            continue;
                        }
                    }
                    Some(a) => {
                        if dot(&a[i1], &a[i2]) >= -0.00001 {
                            continue;
                        }
                    }
                }
                let d = dist2(&self.mesh.verts[i1].xyz, &self.mesh.verts[i2].xyz);
                if d > dist {
                    dist = d;
                    side = Some(j);
                }
            }
            let Some(side) = side else {
                continue;
            };

            let Neighbor::Tri(t2) = self.mesh.tris[t1].neighbors[side] else {
                continue;
            };
            let i0 = self.mesh.tris[t1].indices[side];
            let (i1, i2) = self.mesh.side_verts(t1, side);
            let Some(i3) = self.mesh.opposite_vert(t2, i1, i2) else {
                continue;
            };
            let uvm = crate::geometry::mid_uv(&self.mesh.verts[i1].uv, &self.mesh.verts[i2].uv);
            let Ok(ev) = self.surf.evaluate(uvm) else {
                continue;
            };
            let x0 = self.mesh.verts[i0].xyz;
            let x1 = self.mesh.verts[i1].xyz;
            let x2 = self.mesh.verts[i2].xyz;
            let x3 = self.mesh.verts[i3].xyz;
            if dot_norm(&x0, &ev.xyz, &x2, &x3) <= 0.1 {
                continue;
            }
            if dot_norm(&x0, &x1, &ev.xyz, &x3) <= 0.1 {
                continue;
            }

            if self.split_side(t1, side, t2, self.side_mid).is_ok() {
                self.flood(t1, FLOOD_DEPTH);
                self.flood(t2, FLOOD_DEPTH);
                if let Some(a) = aux.as_mut() {
                    let nv = self.mesh.verts.len() - 1;
                    let n = self.vertex_normal(self.mesh.verts[nv].uv);
                    debug_assert_eq!(a.len(), nv);
                    a.push(n);
                }
                split += 1;
                if cnt != 0 && self.mesh.verts.len() >= cnt {
                    return split;
                }
            } else {
                self.mesh.tris[t1].hit = true;
                self.mesh.tris[t2].hit = true;
            }
        }
        split
    }

    /// Side-length scratch for edge-length enforcement: `area` holds the
    /// triangle's split threshold, `mid[j]` the squared length of interior
    /// side `j` (owned by the lower-indexed triangle).
    fn fill_sides(&mut self, t1: usize, mindist: f64, emndist: f64) {
        let [i0, i1, i2] = self.mesh.tris[t1].indices;
        let boundary_touch = !self.mesh.verts[i0].kind.is_face()
            || !self.mesh.verts[i1].kind.is_face()
            || !self.mesh.verts[i2].kind.is_face();
        self.mesh.tris[t1].area = if boundary_touch { emndist } else { mindist };
        for j in 0..3 {
            self.mesh.tris[t1].mid[j] = 0.0;
            let Neighbor::Tri(t2) = self.mesh.tris[t1].neighbors[j] else {
                continue;
            };
            if t2 < t1 {
                continue;
            }
            let (a, b) = self.mesh.side_verts(t1, j);
            self.mesh.tris[t1].mid[j] =
                dist2(&self.mesh.verts[a].xyz, &self.mesh.verts[b].xyz);
        }
    }

    /// Split the longest interior side over `maxlen2` until none qualify.
    /// `iter` scales the per-call batch; each batch is followed by a swap
    /// pass in the caller.
    fn add_side_dist(&mut self, iter: usize, maxlen2: f64) -> usize {
        let mindist = maxlen2.max(self.devia2);
        let emndist = mindist.max(self.edist2).max(self.eps2);
        for t in 0..self.mesh.tris.len() {
            self.mesh.tris[t].hit = false;
            self.fill_sides(t, mindist, emndist);
        }

        let mut split = 0;
        loop {
            let mut best = None;
            let mut dist = 0.0;
            for i in 0..self.mesh.tris.len() {
                if self.mesh.tris[i].hit {
                    continue;
                }
                let cmp = self.mesh.tris[i].area;
                for j in 0..3 {
                    let d = self.mesh.tris[i].mid[j];
                    if d <= cmp {
                        continue;
                    }
                    if d > dist {
                        best = Some((i, j));
                        dist = d;
                    }
                }
            }
            let Some((t1, side)) = best else {
                break;
            };

            // a final-phase pass keeps new points off the boundary strip
            if self.phase == Phase::Cleanup {
                let (a, b) = self.mesh.side_verts(t1, side);
                let m = midpoint(&self.mesh.verts[a].xyz, &self.mesh.verts[b].xyz);
                if self.close2_edge(t1, &m) {
                    self.mesh.tris[t1].hit = true;
                    continue;
                }
            }
            let Neighbor::Tri(t2) = self.mesh.tris[t1].neighbors[side] else {
                self.mesh.tris[t1].hit = true;
                continue;
            };
            if self.split_side(t1, side, t2, self.side_mid).is_ok() {
                split += 1;
                if 2 * split > iter {
                    break;
                }
                self.flood(t1, FLOOD_DEPTH);
                self.flood(t2, FLOOD_DEPTH);
                let n = self.mesh.tris.len();
                for t in [t1, t2, n - 2, n - 1] {
                    self.fill_sides(t, mindist, emndist);
                }
            } else {
                self.mesh.tris[t1].hit = true;
            }
            if self.past_max_pts() {
                break;
            }
        }
        split
    }

    /// Centroid insertion. `Largest` targets the biggest facets whose
    /// neighbourhood is folded; `CacheMiss` targets facets whose memoised
    /// surface centroid no longer projects inside. A local budget of one
    /// initial-triangle-count of splits yields back to the swap passes.
    fn break_tri(&mut self, mode: BreakMode) -> usize {
        // candidate scan
        for i in 0..self.mesh.tris.len() {
            self.mesh.tris[i].hit = true;

            let [i0, i1, i2] = self.mesh.tris[i].indices;
            let uv0 = self.mesh.verts[i0].uv;
            let uv1 = self.mesh.verts[i1].uv;
            let uv2 = self.mesh.verts[i2].uv;
            if max_uv_angle(&uv0, &uv1, &uv2, self.v_over_u) > CUTANG {
                continue;
            }
            let x0 = self.mesh.verts[i0].xyz;
            let x1 = self.mesh.verts[i1].xyz;
            let x2 = self.mesh.verts[i2].xyz;
            let n = cross(&sub(&x1, &x0), &sub(&x2, &x0));
            let area = dot(&n, &n);
            self.mesh.tris[i].area = area;
            if area == 0.0 {
                continue;
            }

            let mut dotn = 1.0;
            let mut mina = f64::MAX;
            let mut interior = 0;
            for side in 0..3 {
                let Neighbor::Tri(t2) = self.mesh.tris[i].neighbors[side] else {
                    continue;
                };
                interior += 1;
                if mode == BreakMode::Largest {
                    let s0 = self.mesh.tris[i].indices[side];
                    let (s1, s2) = self.mesh.side_verts(i, side);
                    let Some(s3) = self.mesh.opposite_vert(t2, s1, s2) else {
                        continue;
                    };
                    let y0 = self.mesh.verts[s0].xyz;
                    let y1 = self.mesh.verts[s1].xyz;
                    let y2 = self.mesh.verts[s2].xyz;
                    let y3 = self.mesh.verts[s3].xyz;
                    dotn = dotn.min(dot_norm(&y0, &y1, &y2, &y3));
                    let nn = cross(&sub(&y1, &y3), &sub(&y2, &y3));
                    mina = mina.min(dot(&nn, &nn));
                }
            }
            if interior <= 1 {
                continue;
            }
            if mode == BreakMode::Largest && dotn > -0.9 && mina / area > 0.001 {
                continue;
            }

            if dist2(&x1, &x2) <= self.eps2
                || dist2(&x1, &x0) <= self.eps2
                || dist2(&x0, &x2) <= self.eps2
            {
                continue;
            }
            self.mesh.tris[i].hit = false;
        }

        let mut split = 0;
        let mut budget = 0;
        loop {
            // biggest remaining candidate
            let mut t1 = None;
            let mut area = 0.0;
            for i in 0..self.mesh.tris.len() {
                if self.mesh.tris[i].hit {
                    continue;
                }
                if self.mesh.tris[i].area > area {
                    t1 = Some(i);
                    area = self.mesh.tris[i].area;
                }
            }
            let Some(t1) = t1 else {
                break;
            };
            self.mesh.tris[t1].hit = true;

            let [i0, i1, i2] = self.mesh.tris[t1].indices;
            let uv0 = self.mesh.verts[i0].uv;
            let uv1 = self.mesh.verts[i1].uv;
            let uv2 = self.mesh.verts[i2].uv;
            let x0 = self.mesh.verts[i0].xyz;
            let x1 = self.mesh.verts[i1].xyz;
            let x2 = self.mesh.verts[i2].xyz;
            let mut uvq = centroid_uv(&uv0, &uv1, &uv2);
            let Ok(ev) = self.surf.evaluate(uvq) else {
                continue;
            };
            let mut xyz = ev.xyz;

            match mode {
                BreakMode::CacheMiss => {
                    let hit = self
                        .cache
                        .as_ref()
                        .and_then(|c| c.find(i0, i1, i2));
                    match hit {
                        None => {
                            let degen = self.mesh.verts[i0].kind.is_degenerate_node()
                                || self.mesh.verts[i1].kind.is_degenerate_node()
                                || self.mesh.verts[i2].kind.is_degenerate_node();
                            if degen && strictly_inside_projected(&x0, &x1, &x2, &xyz, 0.1) {
                                let cen = centroid(&x0, &x1, &x2);
                                if let Ok((uvi, xi)) = self.surf.inv_evaluate(cen) {
                                    let a = area2d(&uv0, &uv1, &uv2);
                                    if a * area2d(&uv0, &uv1, &uvi) <= 0.0
                                        || a * area2d(&uv1, &uv2, &uvi) <= 0.0
                                        || a * area2d(&uv2, &uv0, &uvi) <= 0.0
                                    {
                                        uvq = centroid_uv(&uv0, &uv1, &uv2);
                                        let Ok(e2) = self.surf.evaluate(uvq) else {
                                            continue;
                                        };
                                        xyz = e2.xyz;
                                    } else {
                                        uvq = uvi;
                                        xyz = xi;
                                    }
                                }
                            }
                            if let Some(c) = self.cache.as_mut() {
                                c.add(i0, i1, i2, MidClose::Far, xyz);
                            }
                        }
                        Some(e) => {
                            xyz = e.xyz;
                        }
                    }
                    // the memoised centroid still projecting inside means
                    // the facet tracks the surface well enough
                    if strictly_inside_projected(&x0, &x1, &x2, &xyz, 0.0001) {
                        continue;
                    }
                    if dot_norm(&x0, &x1, &xyz, &x2) < -0.98 {
                        continue;
                    }
                    if dot_norm(&x1, &x2, &xyz, &x0) < -0.98 {
                        continue;
                    }
                    if dot_norm(&x2, &x0, &xyz, &x1) < -0.98 {
                        continue;
                    }
                }
                BreakMode::Largest => {
                    if !strictly_inside_projected(&x0, &x1, &x2, &xyz, 0.0001) {
                        continue;
                    }
                    let cen = centroid(&x0, &x1, &x2);
                    let Ok((uvi, xi)) = self.surf.inv_evaluate(cen) else {
                        continue;
                    };
                    let a = area2d(&uv0, &uv1, &uv2);
                    if a * area2d(&uv0, &uv1, &uvi) <= 0.0
                        || a * area2d(&uv1, &uv2, &uvi) <= 0.0
                        || a * area2d(&uv2, &uv0, &uvi) <= 0.0
                    {
                        uvq = centroid_uv(&uv0, &uv1, &uv2);
                        let Ok(e2) = self.surf.evaluate(uvq) else {
                            continue;
                        };
                        xyz = e2.xyz;
                    } else {
                        uvq = uvi;
                        xyz = xi;
                    }
                }
            }

            if self.close_edge(t1, &xyz) {
                continue;
            }
            self.split_tri(t1, uvq, xyz);
            split += 1;
            budget += 1;
            if budget > self.stri {
                break;
            }
            self.flood(t1, FLOOD_DEPTH);
        }
        split
    }

    /// Split facets whose worst neighbour dihedral dot misses `dotnrm`,
    /// inserting their cached surface centroid.
    fn add_facet_norm(&mut self) -> usize {
        let total = self.mesh.tris.len();
        let mut split = 0;
        for t1 in 0..total {
            if self.mesh.tris[t1].close != MidClose::Far {
                continue;
            }

            let interior = (0..3)
                .filter(|&s| self.mesh.tris[t1].neighbors[s].tri().is_some())
                .count();
            if interior <= 1 {
                continue;
            }

            let [i0, i1, i2] = self.mesh.tris[t1].indices;
            let uv0 = self.mesh.verts[i0].uv;
            let uv1 = self.mesh.verts[i1].uv;
            let uv2 = self.mesh.verts[i2].uv;
            if max_uv_angle(&uv0, &uv1, &uv2, self.v_over_u) > CUTANG {
                continue;
            }

            let mid = self.mesh.tris[t1].mid;
            let x0 = self.mesh.verts[i0].xyz;
            let x1 = self.mesh.verts[i1].xyz;
            let x2 = self.mesh.verts[i2].xyz;
            let prox = 0.001 * self.edist2;
            if dist2(&x0, &mid) < prox || dist2(&x1, &mid) < prox || dist2(&x2, &mid) < prox {
                continue;
            }

            let n = cross(&sub(&x1, &x0), &sub(&x2, &x0));
            let area = dot(&n, &n);
            let uvq = centroid_uv(&uv0, &uv1, &uv2);

            let mut dotn = 1.0;
            let mut folded = false;
            for side in 0..3 {
                let Neighbor::Tri(t2) = self.mesh.tris[t1].neighbors[side] else {
                    continue;
                };
                let s0 = self.mesh.tris[t1].indices[side];
                let (s1, s2) = self.mesh.side_verts(t1, side);
                let Some(s3) = self.mesh.opposite_vert(t2, s1, s2) else {
                    continue;
                };
                let y0 = self.mesh.verts[s0].xyz;
                let y1 = self.mesh.verts[s1].xyz;
                let y2 = self.mesh.verts[s2].xyz;
                let y3 = self.mesh.verts[s3].xyz;
                let nn = cross(&sub(&y1, &y3), &sub(&y2, &y3));
                if dot(&nn, &nn) > area && self.mesh.tris[t2].close == MidClose::Far {
                    continue;
                }
                let d = dot_norm(&y0, &y1, &y2, &y3);
                if d < 0.0 {
                    folded = true;
                    break;
                }
                if d < dotn && dot_norm(&mid, &y1, &y2, &y3) > d {
                    dotn = d;
                }
            }
            if folded {
                continue;
            }
            if dotn + ANGTOL > self.dotnrm {
                continue;
            }

            self.split_tri(t1, uvq, mid);
            split += 1;
            if self.past_max_pts_pos() {
                break;
            }
        }
        log::trace!("face {}: facet-normal splits: {split}", self.f_index);
        split
    }

    /// Split facets whose 3-D centroid drifts from the surface centroid by
    /// more than the chord tolerance.
    fn add_facet_dist(&mut self) -> usize {
        let cmp = (self.chord * self.chord).max(self.devia2);
        let total = self.mesh.tris.len();
        let mut split = 0;
        for t1 in 0..total {
            if self.mesh.tris[t1].close != MidClose::Far {
                continue;
            }

            let [i0, i1, i2] = self.mesh.tris[t1].indices;
            let uv0 = self.mesh.verts[i0].uv;
            let uv1 = self.mesh.verts[i1].uv;
            let uv2 = self.mesh.verts[i2].uv;
            let x0 = self.mesh.verts[i0].xyz;
            let x1 = self.mesh.verts[i1].xyz;
            let x2 = self.mesh.verts[i2].xyz;
            let uvq = centroid_uv(&uv0, &uv1, &uv2);
            let cen = centroid(&x0, &x1, &x2);
            let mid = self.mesh.tris[t1].mid;
            if dist2(&cen, &mid) <= cmp {
                continue;
            }

            if max_uv_angle(&uv0, &uv1, &uv2, self.v_over_u) > DEVANG {
                continue;
            }
            if !strictly_inside_projected(&x0, &x1, &x2, &mid, 0.10) {
                continue;
            }
            if dot_norm(&x0, &x1, &mid, &x2) < 0.0
                || dot_norm(&x1, &x2, &mid, &x0) < 0.0
                || dot_norm(&x2, &x0, &mid, &x1) < 0.0
            {
                continue;
            }
            let short = (0..3).any(|side| {
                let (a, b) = self.mesh.side_verts(t1, side);
                dist2(&self.mesh.verts[a].xyz, &self.mesh.verts[b].xyz) <= cmp
            });
            if short {
                continue;
            }

            self.split_tri(t1, uvq, mid);
            split += 1;
            if self.past_max_pts_pos() {
                break;
            }
        }
        log::trace!("face {}: chord splits: {split}", self.f_index);
        split
    }

    /// Collapse interior vertices that ended up hugging the boundary with
    /// both neighbour facets bending away.
    fn remove_phase_b(&mut self) -> usize {
        let mut count = 0;
        let mut t1 = 0;
        while t1 < self.mesh.tris.len() {
            let bnd: Vec<usize> = (0..3)
                .filter(|&j| self.mesh.tris[t1].neighbors[j].tri().is_none())
                .collect();
            if bnd.len() != 1 {
                t1 += 1;
                continue;
            }
            let vert = self.mesh.tris[t1].indices[bnd[0]];
            let vx = self.mesh.verts[vert].xyz;
            if !self.close_edge(t1, &vx) {
                t1 += 1;
                continue;
            }

            // nearest face-interior neighbour of `vert`
            let mut tnode = None;
            let mut dist = f64::MAX;
            for t2 in 0..self.mesh.tris.len() {
                if t2 == t1 {
                    continue;
                }
                let tri = &self.mesh.tris[t2];
                if tri.indices.iter().filter(|&&v| v == vert).count() != 1 {
                    continue;
                }
                for &i in &tri.indices {
                    if i == vert || !self.mesh.verts[i].kind.is_face() {
                        continue;
                    }
                    let d = dist2(&vx, &self.mesh.verts[i].xyz);
                    if d < dist {
                        dist = d;
                        tnode = Some(i);
                    }
                }
            }
            let Some(tnode) = tnode else {
                t1 += 1;
                continue;
            };

            let [i0, i1, i2] = self.mesh.tris[t1].indices;
            let Some(n2) = crate::geometry::tri_normal(
                &self.mesh.verts[i0].xyz,
                &self.mesh.verts[i1].xyz,
                &self.mesh.verts[i2].xyz,
            ) else {
                t1 += 1;
                continue;
            };
            let mut dots = [1.0f64; 2];
            let mut n = 0;
            for j in 0..3 {
                let Neighbor::Tri(t2) = self.mesh.tris[t1].neighbors[j] else {
                    continue;
                };
                let [j0, j1, j2] = self.mesh.tris[t2].indices;
                match crate::geometry::tri_normal(
                    &self.mesh.verts[j0].xyz,
                    &self.mesh.verts[j1].xyz,
                    &self.mesh.verts[j2].xyz,
                ) {
                    Some(n1) => {
                        dots[n] = dot(&n1, &n2);
                        n += 1;
                    }
                    None => {
                        n += 1;
                    }
                }
            }
            if !(dots[0] < 0.866 && dots[1] < 0.866) {
                t1 += 1;
                continue;
            }
            log::trace!(
                "face {}: pruning interior vertex {tnode} onto {vert}",
                self.f_index
            );
            self.collapse_edge(tnode, vert, false);
            count += 1;
            t1 += 1;
        }
        count
    }

    /// Validate a quadder's triangulation: every facet normal must agree
    /// with the surface normal at its centroid.
    fn check_quadding(&self, degenerate_map: bool) -> Result<(), SurfaceError> {
        if degenerate_map {
            return Ok(());
        }
        for i in 0..self.mesh.tris.len() {
            let [i0, i1, i2] = self.mesh.tris[i].indices;
            let x0 = self.mesh.verts[i0].xyz;
            let x1 = self.mesh.verts[i1].xyz;
            let x2 = self.mesh.verts[i2].xyz;
            let Some(n) = crate::geometry::tri_normal(&x0, &x1, &x2) else {
                log::warn!("face {}: quad triangle {i} has zero area", self.f_index);
                return Err(SurfaceError::Degenerate);
            };
            let uv = centroid_uv(
                &self.mesh.verts[i0].uv,
                &self.mesh.verts[i1].uv,
                &self.mesh.verts[i2].uv,
            );
            let ev = self.surf.evaluate(uv).map_err(|e| {
                log::warn!("face {}: quad triangle {i} evaluate failed: {e}", self.f_index);
                e
            })?;
            let Some(nor) = unit(&cross(&ev.du, &ev.dv)) else {
                log::warn!("face {}: quad triangle {i} has zero normal", self.f_index);
                return Err(SurfaceError::Degenerate);
            };
            let d = dot(&n, &nor);
            if d <= 0.0 {
                log::debug!("face {}: quad triangle {i} dot = {d}", self.f_index);
                return Err(SurfaceError::Degenerate);
            }
        }
        Ok(())
    }

    /// Try the quad path. `Ok(true)` means the quadding was accepted and
    /// the mesh is final; `Ok(false)` means refinement continues on the
    /// (restored) frame.
    fn try_quadding(
        &mut self,
        opts: &RefineOptions,
        quadder: Option<&dyn Quadder>,
    ) -> Result<bool, TessError> {
        let Some(uv_grid) = opts.quad_uvs.as_deref() else {
            return Ok(false);
        };

        let single = self.mesh.tris.len() == 2
            && self.mesh.verts.len() == 4
            && opts.lens == [1, 1, 1, 1];
        let result = if single {
            Some(crate::surface::QuadResult {
                uvs: self.mesh.verts.iter().map(|v| v.uv).collect(),
                tris: vec![[0, 1, 2], [0, 2, 3]],
                tfi: true,
                degenerate_map: false,
            })
        } else if let Some(q) = quadder {
            // the cone-like (lens[3] == 0) versus regular split is the
            // quadder's concern
            q.quad_tris(self.surf, &opts.qparm, &opts.lens, uv_grid).ok()
        } else {
            None
        };
        let Some(result) = result else {
            return Ok(false);
        };

        let saved_tris = self.mesh.tris.clone();

        for j in self.mesh.verts.len()..result.uvs.len() {
            let ev = self.surf.evaluate(result.uvs[j])?;
            self.mesh.add_vert(VertexKind::Face, ev.xyz, result.uvs[j]);
        }
        self.mesh.tris = result
            .tris
            .iter()
            .enumerate()
            .map(|(i, &t)| TriTri::new(t, [Neighbor::Tri(i); 3]))
            .collect();

        if self.check_quadding(result.degenerate_map).is_ok() {
            if self.or_uv < 0.0 {
                if result.tfi {
                    let mut i = 0;
                    while i + 1 < self.mesh.tris.len() {
                        let qi1 = self.mesh.tris[i].indices[1];
                        let qi3 = self.mesh.tris[i + 1].indices[2];
                        self.mesh.tris[i].indices[1] = qi3;
                        self.mesh.tris[i + 1].indices[2] = qi1;
                        i += 2;
                    }
                } else {
                    for tri in self.mesh.tris.iter_mut() {
                        tri.indices.swap(1, 2);
                    }
                }
            }
            for seg in self.mesh.segs.iter_mut() {
                seg.neighbor = None;
            }
            self.mesh.build_neighbors()?;
            return Ok(true);
        }

        // unusable quadding; back to the frame
        self.mesh.verts.truncate(self.mesh.nfrvrts);
        self.mesh.tris = saved_tris;
        Ok(false)
    }

    /// Quality statistics of the finished mesh, through the logger.
    fn report(&self, lang: f64) {
        if !log::log_enabled!(log::Level::Debug) {
            return;
        }
        let mut min_dot = 1.0;
        let (mut ok, mut big) = (0usize, 0usize);
        for i in 0..self.mesh.tris.len() {
            for j in 0..3 {
                let Neighbor::Tri(k) = self.mesh.tris[i].neighbors[j] else {
                    continue;
                };
                if k < i {
                    continue;
                }
                let n0 = self.mesh.tris[i].indices[j];
                let (n1, n2) = self.mesh.side_verts(i, j);
                let Some(n3) = self.mesh.opposite_vert(k, n1, n2) else {
                    continue;
                };
                let d = dot_norm(
                    &self.mesh.verts[n0].xyz,
                    &self.mesh.verts[n1].xyz,
                    &self.mesh.verts[n2].xyz,
                    &self.mesh.verts[n3].xyz,
                );
                min_dot = min_dot.min(d);
                if d >= self.dotnrm {
                    ok += 1;
                } else {
                    big += 1;
                }
            }
        }
        log::debug!(
            "face {}: min dihedral dot = {:e} ({:e}), OK = {ok}, too big = {big}",
            self.f_index,
            min_dot,
            self.dotnrm
        );

        if self.chord > 0.0 {
            let mut worst: f64 = 0.0;
            let (mut ok, mut big) = (0usize, 0usize);
            for tri in self.mesh.tris.iter() {
                let [i0, i1, i2] = tri.indices;
                let cen = centroid(
                    &self.mesh.verts[i0].xyz,
                    &self.mesh.verts[i1].xyz,
                    &self.mesh.verts[i2].xyz,
                );
                let d = dist2(&cen, &tri.mid);
                worst = worst.max(d);
                if d <= self.chord * self.chord {
                    ok += 1;
                } else {
                    big += 1;
                }
            }
            log::debug!(
                "face {}: max deviation = {:e} ({:e}), OK = {ok}, too big = {big}",
                self.f_index,
                worst.sqrt(),
                self.chord
            );
        }

        if self.maxlen > 0.0 {
            let mut worst: f64 = 0.0;
            let (mut ok, mut big) = (0usize, 0usize);
            for i in 0..self.mesh.tris.len() {
                for j in 0..3 {
                    if let Neighbor::Tri(k) = self.mesh.tris[i].neighbors[j] {
                        if k < i {
                            continue;
                        }
                    }
                    let (a, b) = self.mesh.side_verts(i, j);
                    let d = dist2(&self.mesh.verts[a].xyz, &self.mesh.verts[b].xyz);
                    worst = worst.max(d);
                    if d <= self.maxlen * self.maxlen {
                        ok += 1;
                    } else {
                        big += 1;
                    }
                }
            }
            log::debug!(
                "face {}: max side length = {:e} ({:e}), OK = {ok}, too big = {big}",
                self.f_index,
                worst.sqrt(),
                self.maxlen
            );
        }
        log::debug!(
            "face {}: npts = {}, ntris = {}, UVang = {:e}, accum = {:e}",
            self.f_index,
            self.mesh.verts.len(),
            self.mesh.tris.len(),
            lang,
            self.accum
        );
    }

    fn run(
        &mut self,
        opts: &RefineOptions,
        quadder: Option<&dyn Quadder>,
    ) -> Result<(), TessError> {
        self.stri = self.mesh.tris.len();
        let maxlen2 = self.maxlen * self.maxlen;

        // parameter-space metric, deviation, and segment-length tolerances
        let mut du_sum = 0.0;
        let mut dv_sum = 0.0;
        for i in 0..self.mesh.verts.len() {
            let Ok(ev) = self.surf.evaluate(self.mesh.verts[i].uv) else {
                continue;
            };
            let d = dist2(&self.mesh.verts[i].xyz, &ev.xyz);
            if d > self.devia2 {
                self.devia2 = d;
            }
            du_sum += dot(&ev.du, &ev.du).sqrt();
            dv_sum += dot(&ev.dv, &ev.dv).sqrt();
        }
        if du_sum != 0.0 {
            self.v_over_u = dv_sum / du_sum;
        }
        for seg in self.mesh.segs.iter() {
            let d = dist2(
                &self.mesh.verts[seg.indices[0]].xyz,
                &self.mesh.verts[seg.indices[1]].xyz,
            );
            self.edist2 += d.sqrt();
            if d == 0.0 {
                continue;
            }
            if d < self.eps2 {
                self.eps2 = d;
            }
        }
        for tri in self.mesh.tris.iter_mut() {
            tri.close = MidClose::Unfilled;
        }
        self.devia2 /= 256.0;
        self.eps2 /= 4.0;
        if !self.mesh.segs.is_empty() {
            self.edist2 /= self.mesh.segs.len() as f64;
        }
        self.edist2 *= self.edist2;
        if self.eps2 < self.devia2 {
            self.eps2 = self.devia2;
        }
        if self.minlen != 0.0 {
            let floor = self.minlen * self.minlen;
            if self.eps2 < floor {
                self.eps2 = floor;
            }
            if self.devia2 < floor {
                self.devia2 = floor;
            }
        }
        log::trace!(
            "face {}: tolerances eps2 = {:e}, devia2 = {:e}, edist2 = {:e}",
            self.f_index,
            self.eps2,
            self.devia2,
            self.edist2
        );

        // degenerate boundary triangles, then recover inverted areas
        self.phase = Phase::Setup;
        self.zero_area();
        self.swap_tris(SwapTest::Area);

        self.mesh.capture_frame();

        if self.try_quadding(opts, quadder)? {
            return Ok(());
        }

        // seed the swap-candidate marks, counting unrecoverable areas
        for tri in self.mesh.tris.iter_mut() {
            tri.mark = 0;
        }
        let mut bad = 0;
        for i in 0..self.mesh.tris.len() {
            let a = self.or_uv * self.mesh.uv_area(i);
            if a <= 0.0 {
                log::warn!(
                    "face {}: tri {} (of {}) area = {:e} planar = {}",
                    self.f_index,
                    i,
                    self.mesh.tris.len(),
                    a,
                    self.planar
                );
                bad += 1;
                continue;
            }
            for j in 0..3 {
                let Neighbor::Tri(k) = self.mesh.tris[i].neighbors[j] else {
                    continue;
                };
                if k <= i {
                    continue;
                }
                if !self.check_or(i, j, k) {
                    continue;
                }
                self.mesh.tris[i].mark |= 1 << j;
                self.set_back_mark(k, i, true);
            }
        }
        let mut bad_start = false;
        if bad > 1 {
            return Ok(());
        }
        if bad == 1 {
            // a single bad triangle amongst many may still be recoverable
            if self.mesh.tris.len() < 16 || self.planar {
                return Ok(());
            }
            bad_start = true;
        }

        let mut lang;
        if !self.planar {
            self.phase = Phase::Spread;

            self.swap_tris(SwapTest::AngUv);
            lang = self.accum;
            self.swap_tris(SwapTest::Diag);
            log::trace!(
                "face {}: start dotN = {:e} ({:e}), UVang = {:e}",
                self.f_index,
                self.accum,
                self.dotnrm,
                lang
            );

            // X) split interior sides whose endpoint normals oppose
            let cap = 6 * self.mesh.verts.len();
            let mut aux: Vec<[f64; 3]> = Vec::with_capacity(cap);
            for i in 0..self.mesh.verts.len() {
                let uv = self.mesh.verts[i].uv;
                aux.push(self.vertex_normal(uv));
            }
            let mut count = 0;
            loop {
                let split = self.split_inter(Some(&mut aux), cap);
                if split != 0 {
                    self.swap_tris(SwapTest::AngUv);
                    lang = self.accum;
                    self.swap_tris(SwapTest::Diag);
                    count += split;
                    if self.mesh.verts.len() >= cap {
                        break;
                    }
                }
                if split == 0 || self.or_cnt >= MAX_OR_CNT {
                    break;
                }
            }
            drop(aux);
            log::trace!(
                "face {}: phase X dotN = {:e}, UVang = {:e}, split = {count}",
                self.f_index,
                self.accum,
                lang
            );

            // 0) spread towards the length bound, twice relaxed
            if self.maxlen > 0.0 {
                let mut iter = 0;
                loop {
                    let mut split = self.add_side_dist(iter, 4.0 * maxlen2);
                    if split > 0 {
                        self.swap_tris(SwapTest::AngUv);
                        lang = self.accum;
                        self.swap_tris(SwapTest::Diag);
                        if lang > MAXANG && self.accum < 0.0 {
                            split = 0;
                        }
                    }
                    iter += 1;
                    if self.past_max_pts() {
                        break;
                    }
                    if split == 0 || self.or_cnt >= MAX_OR_CNT {
                        break;
                    }
                }
            }

            // A) break big facets with inverted neighbourhoods
            loop {
                let split = self.break_tri(BreakMode::Largest);
                if split != 0 {
                    self.swap_tris(SwapTest::AngUv);
                    lang = self.accum;
                    self.swap_tris(SwapTest::Diag);
                    if self.accum > 0.866 || self.accum <= -1.0 {
                        break;
                    }
                }
                if split == 0 || self.or_cnt >= MAX_OR_CNT {
                    break;
                }
            }

            // B) split interior opposing sides
            let mut count = 0;
            loop {
                let split = self.split_inter(None, 0);
                if split != 0 {
                    self.swap_tris(SwapTest::AngUv);
                    lang = self.accum;
                    self.swap_tris(SwapTest::Diag);
                    count += split;
                }
                if split == 0 || count > 3 * self.stri || self.or_cnt >= MAX_OR_CNT {
                    break;
                }
            }
            if opts.prune_interior && count != 0 {
                let removed = self.remove_phase_b();
                if removed > 0 {
                    self.swap_tris(SwapTest::AngUv);
                    lang = self.accum;
                    self.swap_tris(SwapTest::Diag);
                }
            }

            // C) add vertices where memoised centroids stop matching
            self.cache = Some(MidpointCache::new());
            loop {
                let split = self.break_tri(BreakMode::CacheMiss);
                if split != 0 {
                    self.swap_tris(SwapTest::AngUv);
                    lang = self.accum;
                    self.swap_tris(SwapTest::Diag);
                    if self.accum > 0.866 || self.accum <= -1.0 {
                        break;
                    }
                }
                if split == 0 || self.or_cnt >= MAX_OR_CNT {
                    break;
                }
            }
            self.cache = None;

            // D) enforce the exact length bound; fragments under 1/8 of a
            // side are refused from here on
            self.side_mid = true;
            if self.maxlen > 0.0 && !bad_start {
                let mut iter = 0;
                loop {
                    let mut split = self.add_side_dist(iter, maxlen2);
                    if split > 0 {
                        self.swap_tris(SwapTest::AngUv);
                        lang = self.accum;
                        self.swap_tris(SwapTest::Diag);
                        if lang > MAXANG && self.accum < 0.0 {
                            split = 0;
                        }
                    }
                    iter += 1;
                    if self.past_max_pts() {
                        break;
                    }
                    if split == 0 || self.or_cnt >= MAX_OR_CNT {
                        break;
                    }
                }
            }

            // 1) facet-normal refinement
            let mut mids_live = false;
            if self.accum < self.dotnrm {
                self.phase = Phase::FacetNorm;
                mids_live = true;
                for t in 0..self.mesh.tris.len() {
                    self.fill_mid(t, MidHint::Compute);
                }
                let mut stall = 0;
                let mut lsplit = 0;
                loop {
                    let split = self.add_facet_norm();
                    let laccum = self.accum;
                    if split != 0 {
                        self.swap_with_cache(Phase::FacetNorm);
                        if self.accum <= laccum && split > lsplit {
                            stall += 1;
                        } else {
                            stall = 0;
                        }
                        lsplit = split;
                    }
                    log::trace!(
                        "face {}: phase 1 dotN = {:e}, split = {split}, stall = {stall}",
                        self.f_index,
                        self.accum
                    );
                    if stall > 6 || self.past_max_pts_pos() || split == 0 {
                        break;
                    }
                }
            }

            // 2) chord-height refinement
            if self.chord > 0.0 {
                self.phase = Phase::FacetDist;
                if !mids_live {
                    for t in 0..self.mesh.tris.len() {
                        self.fill_mid(t, MidHint::Compute);
                    }
                }
                let mut stall = 0;
                let mut lsplit = 0;
                loop {
                    let split = self.add_facet_dist();
                    let laccum = self.accum;
                    if split != 0 {
                        self.swap_with_cache(Phase::FacetDist);
                        if self.accum <= laccum && split > lsplit {
                            stall += 1;
                        } else {
                            stall = 0;
                        }
                        lsplit = split;
                    }
                    log::trace!(
                        "face {}: phase 2 dotN = {:e}, split = {split}, stall = {stall}",
                        self.f_index,
                        self.accum
                    );
                    if stall > 6 || self.past_max_pts_pos() || split == 0 {
                        break;
                    }
                }
            }

            // 3) final clean-up
            self.phase = Phase::Cleanup;
            self.swap_tris(SwapTest::AngUv);
            lang = self.accum;
            self.swap_tris(SwapTest::Diag);

            if self.accum < -0.1 || lang > MAXANG {
                log::debug!(
                    "face {}: tessellation problem {:e} {:e}",
                    self.f_index,
                    lang,
                    self.accum
                );
            }
        } else {
            // planar faces: consistency of the facet normals, then swaps
            // and the length bound in 3-space
            let mut flipped = 0;
            let mut norm = [0.0; 3];
            for i in 0..self.mesh.tris.len() {
                let [n0, n1, n2] = self.mesh.tris[i].indices;
                let x0 = self.mesh.verts[n0].xyz;
                let x1 = self.mesh.verts[n1].xyz;
                let x2 = self.mesh.verts[n2].xyz;
                let raw = cross(&sub(&x1, &x0), &sub(&x2, &x0));
                let nrm = unit(&raw).unwrap_or(raw);
                if i == 0 {
                    norm = nrm;
                } else if dot(&norm, &nrm) < 0.0 {
                    flipped += 1;
                }
            }

            self.phase = Phase::PlanarSwap;
            self.swap_tris(SwapTest::AngXyz);
            lang = self.accum;

            if self.maxlen > 0.0 {
                let mut iter = 0;
                let mut stuck = false;
                let mut last_split = 0;
                loop {
                    let split = self.add_side_dist(iter, maxlen2);
                    if split > 0 {
                        self.swap_tris(SwapTest::AngXyz);
                        lang = self.accum;
                    }
                    iter += 1;
                    if self.past_max_pts() {
                        break;
                    }
                    // a bad frame start can leave one stubborn side that
                    // splits forever one fragment at a time
                    if iter != 1 && flipped != 0 {
                        if !stuck && split != 1 {
                            stuck = true;
                        } else if stuck && split == 1 && last_split == 1 {
                            log::warn!(
                                "face {}: planar early breakout after {iter} passes",
                                self.f_index
                            );
                            break;
                        }
                    }
                    last_split = split;
                    if split == 0 {
                        break;
                    }
                }
            }

            if lang > MAXANG {
                log::debug!("face {}: tessellation problem {:e}", self.f_index, lang);
            }
        }

        self.report(lang);

        // one last pass against physical angles once the mesh has grown
        if !self.planar && self.mesh.tris.len() > 2 * self.stri {
            self.swap_tris(SwapTest::AngXyz);
        }

        Ok(())
    }

    /// The swap passes of the facet phases: spill live centroids into a
    /// cache across the swaps, then restore every invalidated triangle from
    /// the cache (or re-evaluate on a genuine miss).
    fn swap_with_cache(&mut self, back_to: Phase) {
        self.phase = Phase::CacheFill;
        self.cache = Some(MidpointCache::new());
        self.swap_tris(SwapTest::AngUv);
        self.swap_tris(SwapTest::Diag);
        self.phase = back_to;
        for t in 0..self.mesh.tris.len() {
            if self.mesh.tris[t].close != MidClose::Unfilled {
                continue;
            }
            let [a, b, c] = self.mesh.tris[t].indices;
            let hit = self.cache.as_ref().and_then(|cc| cc.find(a, b, c));
            match hit {
                Some(e) => {
                    self.mesh.tris[t].mid = e.xyz;
                    self.mesh.tris[t].close = e.close;
                }
                None => self.fill_mid(t, MidHint::Compute),
            }
        }
        self.cache = None;
    }
}
