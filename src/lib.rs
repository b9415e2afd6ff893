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

//! Adaptive triangulation refinement for one parametric face of a B-rep
//! model.
//!
//! Starting from a frame triangulation derived from the face's bounding edge
//! discretisation, [`tessellate`] refines the mesh with edge swaps, vertex
//! insertions, and edge collapses until the configured geometric criteria
//! (facet-normal deviation, chord height, edge-length bounds) are met. The
//! underlying surface is reached through the [`surface::Surface`] trait; the
//! crate never owns geometry beyond the triangulation itself.

pub mod geometry;
pub mod kernel;
pub mod mesh;
pub mod mesh_processing;
pub mod surface;

pub use mesh::basic_types::{
    MidClose, Neighbor, TriMesh, TriSeg, TriTri, TriVert, VertexKind,
};
pub use mesh_processing::bary::{bary_frame, bary_tess, BaryRef};
pub use mesh_processing::fit::{fit_triangles, FitError, FitGrid, Parameterizer};
pub use mesh_processing::refine::{tessellate, RefineOptions, TessError, UvOrientation};
pub use surface::{Quadder, Surface, SurfaceError};
