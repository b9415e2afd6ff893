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

//! The seam between the refinement engine and the geometry kernel that owns
//! the actual surfaces. The engine only ever talks to [`Surface`] (and, for
//! quad-based initial meshes, [`Quadder`]).

pub mod analytic;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SurfaceError {
    /// The query point lies outside the surface's domain and the result
    /// would be an extrapolation. The engine treats this as a silent
    /// rejection of the local operation.
    #[error("query extrapolated outside the surface domain")]
    Extrapolated,
    /// A degenerate configuration (zero normal, collapsed parameterisation).
    #[error("degenerate surface configuration")]
    Degenerate,
    #[error("surface evaluation failed")]
    Failed,
}

/// Position and derivatives at a parameter-space point.
#[derive(Debug, Clone, Copy)]
pub struct SurfEval {
    pub xyz: [f64; 3],
    pub du: [f64; 3],
    pub dv: [f64; 3],
    /// Second derivatives (duu, duv, dvv) when the evaluator provides them.
    /// The engine reads them through but never requires them.
    pub d2: Option<[[f64; 3]; 3]>,
}

/// Parameter range of a face.
#[derive(Debug, Clone, Copy)]
pub struct UvRange {
    pub u_min: f64,
    pub u_max: f64,
    pub v_min: f64,
    pub v_max: f64,
    pub periodic: bool,
}

/// One parametric face of the containing geometry model.
pub trait Surface {
    fn evaluate(&self, uv: [f64; 2]) -> Result<SurfEval, SurfaceError>;

    /// Closest-point inverse evaluation: parameter and surface point for an
    /// arbitrary 3-space query.
    fn inv_evaluate(&self, xyz: [f64; 3]) -> Result<([f64; 2], [f64; 3]), SurfaceError>;

    fn range(&self) -> Result<UvRange, SurfaceError>;
}

/// A quad-dominant triangulation produced by an external quadder.
#[derive(Debug, Clone)]
pub struct QuadResult {
    /// Parameter positions for all vertices; the leading entries coincide
    /// with the frame vertices already in the mesh.
    pub uvs: Vec<[f64; 2]>,
    pub tris: Vec<[usize; 3]>,
    /// Whether the quadder ran its transfinite-interpolation template
    /// (paired triangles, flipped pairwise on reversed faces).
    pub tfi: bool,
    /// Set when the quadding came from a degenerate mapping; normal
    /// validation is skipped for such meshes.
    pub degenerate_map: bool,
}

/// External quad-mesher the engine may hand the frame to. The engine
/// validates the result and falls back to its own refinement when the
/// quadding is unusable; it never produces quads itself.
pub trait Quadder {
    fn quad_tris(
        &self,
        surf: &dyn Surface,
        parms: &[f64; 3],
        lens: &[usize; 4],
        uv: &[[f64; 2]],
    ) -> Result<QuadResult, SurfaceError>;
}
