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

use ahash::AHashMap;
use thiserror::Error;

use crate::kernel::predicates::area2d;
use crate::mesh::basic_types::{
    Neighbor, TriMesh, TriSeg, TriTri, TriVert, VertexKind, SIDES,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MeshError {
    #[error("vertex index out of range in triangle {0}")]
    BadVertexIndex(usize),
    #[error("triangle side ({0}, {1}) is shared by more than two triangles")]
    NonManifoldSide(usize, usize),
    #[error("triangle side ({0}, {1}) matches neither a triangle nor a segment")]
    UnmatchedSide(usize, usize),
    #[error("triangle {0} has no back-link from its neighbor {1}")]
    MissingBackLink(usize, usize),
    #[error("triangle {0} neighbor on side {1} shares the wrong vertex pair")]
    MismatchedSide(usize, usize),
    #[error("triangle {0} has parameter-space area of the wrong sign")]
    InvertedArea(usize),
    #[error("frame references vertex {0} beyond the frame vertex count")]
    BadFrameVertex(usize),
}

#[inline]
fn edge_key(a: usize, b: usize) -> (usize, usize) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

impl TriMesh {
    /// Build a store from the frame arrays: vertices, triangle vertex
    /// triples, and the boundary segments of the edge discretisation.
    /// Neighbour links are derived from the shared sides.
    pub fn new(
        verts: Vec<TriVert>,
        tris: Vec<[usize; 3]>,
        segs: Vec<[usize; 2]>,
    ) -> Result<Self, MeshError> {
        let mut mesh = TriMesh {
            verts,
            tris: tris
                .iter()
                .enumerate()
                .map(|(i, &t)| TriTri::new(t, [Neighbor::Tri(i); 3]))
                .collect(),
            segs: segs
                .into_iter()
                .map(|s| TriSeg {
                    indices: s,
                    neighbor: None,
                })
                .collect(),
            frame: Vec::new(),
            nfrvrts: 0,
        };
        mesh.build_neighbors()?;
        Ok(mesh)
    }

    pub fn add_vert(&mut self, kind: VertexKind, xyz: [f64; 3], uv: [f64; 2]) -> usize {
        self.verts.push(TriVert { kind, xyz, uv });
        self.verts.len() - 1
    }

    /// Ordered endpoints of side `s` of triangle `t`.
    #[inline]
    pub fn side_verts(&self, t: usize, s: usize) -> (usize, usize) {
        let tri = &self.tris[t];
        (tri.indices[SIDES[s][0]], tri.indices[SIDES[s][1]])
    }

    /// The vertex of triangle `t` not in {i1, i2}, recovered from the index
    /// sum. `None` when the arithmetic leaves the vertex range, which means
    /// the adjacency is corrupt and the caller must reject the operation.
    #[inline]
    pub fn opposite_vert(&self, t: usize, i1: usize, i2: usize) -> Option<usize> {
        let tri = &self.tris[t];
        let sum = tri.indices[0] as i64 + tri.indices[1] as i64 + tri.indices[2] as i64;
        let i3 = sum - i1 as i64 - i2 as i64;
        if i3 < 0 || i3 >= self.verts.len() as i64 {
            return None;
        }
        Some(i3 as usize)
    }

    /// Signed parameter-space area of triangle `t`.
    #[inline]
    pub fn uv_area(&self, t: usize) -> f64 {
        let [i0, i1, i2] = self.tris[t].indices;
        area2d(
            &self.verts[i0].uv,
            &self.verts[i1].uv,
            &self.verts[i2].uv,
        )
    }

    /// Record the current triangulation as the frame.
    pub fn capture_frame(&mut self) {
        self.frame = self.tris.iter().map(|t| t.indices).collect();
        self.nfrvrts = self.verts.len();
    }

    /// Derive all neighbour links from shared sides; boundary sides are
    /// matched against the segment list.
    pub fn build_neighbors(&mut self) -> Result<(), MeshError> {
        let nverts = self.verts.len();
        let mut open: AHashMap<(usize, usize), (usize, usize)> =
            AHashMap::with_capacity(self.tris.len() * 2);

        for t in 0..self.tris.len() {
            for &i in &self.tris[t].indices {
                if i >= nverts {
                    return Err(MeshError::BadVertexIndex(t));
                }
            }
            for s in 0..3 {
                let (a, b) = self.side_verts(t, s);
                let key = edge_key(a, b);
                match open.remove(&key) {
                    Some((t2, s2)) => {
                        if self.tris[t2].neighbors[s2] != Neighbor::Tri(t2) {
                            return Err(MeshError::NonManifoldSide(key.0, key.1));
                        }
                        self.tris[t].neighbors[s] = Neighbor::Tri(t2);
                        self.tris[t2].neighbors[s2] = Neighbor::Tri(t);
                        // every interior side starts out as a swap candidate
                        self.tris[t].mark |= 1 << s;
                        self.tris[t2].mark |= 1 << s2;
                    }
                    None => {
                        open.insert(key, (t, s));
                        self.tris[t].neighbors[s] = Neighbor::Tri(t);
                    }
                }
            }
        }

        let seg_map: AHashMap<(usize, usize), usize> = self
            .segs
            .iter()
            .enumerate()
            .map(|(i, s)| (edge_key(s.indices[0], s.indices[1]), i))
            .collect();
        for (key, (t, s)) in open {
            let Some(&seg) = seg_map.get(&key) else {
                return Err(MeshError::UnmatchedSide(key.0, key.1));
            };
            self.tris[t].neighbors[s] = Neighbor::Seg(seg);
            self.segs[seg].neighbor = Some(t);
        }
        Ok(())
    }

    /// Audit the mesh invariants: index bounds, mutual neighbour links over
    /// identical vertex pairs, and (when an orientation reference is given)
    /// the parameter-space area sign of every triangle.
    pub fn check(&self, or_uv: Option<f64>) -> Result<(), MeshError> {
        let nverts = self.verts.len();
        for t in 0..self.tris.len() {
            for &i in &self.tris[t].indices {
                if i >= nverts {
                    return Err(MeshError::BadVertexIndex(t));
                }
            }
            for s in 0..3 {
                let (a, b) = self.side_verts(t, s);
                match self.tris[t].neighbors[s] {
                    Neighbor::Tri(n) => {
                        if n >= self.tris.len() {
                            return Err(MeshError::MissingBackLink(t, n));
                        }
                        let back = (0..3)
                            .find(|&s2| self.tris[n].neighbors[s2] == Neighbor::Tri(t));
                        let Some(s2) = back else {
                            return Err(MeshError::MissingBackLink(t, n));
                        };
                        let (a2, b2) = self.side_verts(n, s2);
                        if edge_key(a, b) != edge_key(a2, b2) {
                            return Err(MeshError::MismatchedSide(t, s));
                        }
                    }
                    Neighbor::Seg(g) => {
                        if g >= self.segs.len() {
                            return Err(MeshError::UnmatchedSide(a, b));
                        }
                    }
                }
            }
            if let Some(or) = or_uv {
                if or * self.uv_area(t) <= 0.0 {
                    return Err(MeshError::InvertedArea(t));
                }
            }
        }
        for f in &self.frame {
            for &i in f {
                if i >= self.nfrvrts {
                    return Err(MeshError::BadFrameVertex(i));
                }
            }
        }
        Ok(())
    }
}
