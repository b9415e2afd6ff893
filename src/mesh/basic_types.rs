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

/// Side `i` of a triangle is opposite vertex `i`: these are the ordered
/// endpoint positions of each side within `indices`.
pub const SIDES: [[usize; 2]; 3] = [[1, 2], [2, 0], [0, 1]];

/// Where a vertex came from in the face's boundary topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexKind {
    /// A model node. `degenerate` marks nodes whose surrounding
    /// parameterisation collapses (cone apex, sphere pole).
    Node { index: usize, degenerate: bool },
    /// An interior point of bounding edge `edge`, the `ordinal`-th point of
    /// that edge's discretisation.
    Edge { edge: usize, ordinal: usize },
    /// A point inserted on the face interior by the engine.
    Face,
}

impl VertexKind {
    #[inline]
    pub fn is_face(&self) -> bool {
        matches!(self, VertexKind::Face)
    }

    #[inline]
    pub fn is_degenerate_node(&self) -> bool {
        matches!(self, VertexKind::Node { degenerate: true, .. })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TriVert {
    pub kind: VertexKind,
    pub xyz: [f64; 3],
    pub uv: [f64; 2],
}

/// What lies on the far side of a triangle side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Neighbor {
    Tri(usize),
    /// Boundary side, owned by the given segment.
    Seg(usize),
}

impl Neighbor {
    #[inline]
    pub fn tri(self) -> Option<usize> {
        match self {
            Neighbor::Tri(t) => Some(t),
            Neighbor::Seg(_) => None,
        }
    }
}

/// State of a triangle's cached surface-evaluated centroid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MidClose {
    /// `mid` holds no surface point (or a side-length scratch value).
    #[default]
    Unfilled,
    /// Centroid evaluated, not near a boundary edge.
    Far,
    /// Centroid evaluated and within ray distance of a boundary edge.
    Near,
}

#[derive(Debug, Clone)]
pub struct TriTri {
    pub indices: [usize; 3],
    pub neighbors: [Neighbor; 3],
    /// Bit `i` set: side `i` is a swap candidate.
    pub mark: u8,
    /// Transient per-pass visitation flag.
    pub hit: bool,
    /// Swaps touching this triangle in the current swap round.
    pub count: u32,
    /// Surface point at the UV centroid during the facet phases; side-length
    /// scratch during edge-length enforcement.
    pub mid: [f64; 3],
    pub close: MidClose,
    /// Squared 3-D area scratch (also the per-triangle length threshold
    /// during edge-length enforcement).
    pub area: f64,
}

impl TriTri {
    pub fn new(indices: [usize; 3], neighbors: [Neighbor; 3]) -> Self {
        TriTri {
            indices,
            neighbors,
            mark: 0,
            hit: false,
            count: 0,
            mid: [0.0; 3],
            close: MidClose::Unfilled,
            area: 0.0,
        }
    }
}

/// A boundary segment of the face's edge discretisation.
#[derive(Debug, Clone, Copy)]
pub struct TriSeg {
    pub indices: [usize; 2],
    /// Triangle currently sharing this side; `None` until connected.
    pub neighbor: Option<usize>,
}

/// The per-face triangulation store. All engine state that survives a
/// [`crate::tessellate`] call lives here; everything else is scratch.
#[derive(Debug, Clone, Default)]
pub struct TriMesh {
    pub verts: Vec<TriVert>,
    pub tris: Vec<TriTri>,
    pub segs: Vec<TriSeg>,
    /// The frame: vertex triples of the triangulation as captured right
    /// after the initial clean-up, read-only from then on.
    pub frame: Vec<[usize; 3]>,
    /// Number of vertices the frame had at capture; every vertex the
    /// engine inserts has an index at or above this.
    pub nfrvrts: usize,
}
