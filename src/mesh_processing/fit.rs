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

//! Reconstruction of a tensor-product grid from an unstructured
//! triangulation, driving an external parameteriser. This is a consumer of
//! the engine's output, not part of the refiner itself: it flattens the
//! triangulation into a global UV layout and escalates through the
//! parameterisation methods until a grid meets the tolerance.

use ahash::AHashMap;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PrmError {
    #[error("no global parameterisation exists for this triangulation")]
    NoGlobalUv,
    #[error("smoothing did not converge")]
    NotConverged,
    #[error("grid tolerance not met")]
    ToleranceUnmet,
    #[error("parameterisation failed")]
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FitError {
    #[error("empty triangulation")]
    Empty,
    #[error("vertex index out of range in triangle {0}")]
    BadIndex(usize),
    #[error("neighbour index out of range in triangle {0}")]
    BadNeighbor(usize),
    #[error("parameterisation stage {stage} failed: {source}")]
    Prm {
        stage: &'static str,
        source: PrmError,
    },
}

/// Triangulation view handed to the parameteriser. Neighbours use `None`
/// for boundary sides.
#[derive(Debug, Clone, Copy)]
pub struct PrmMesh<'a> {
    pub xyz: &'a [[f64; 3]],
    pub tris: &'a [[usize; 3]],
    pub neighbors: &'a [[Option<usize>; 3]],
}

/// A parameterisation produced by [`Parameterizer::create_uv`].
#[derive(Debug, Clone)]
pub struct CreatedUv {
    pub uv: Vec<[f64; 2]>,
    /// Periodicity bits of the layout (1 = u, 2 = v).
    pub periodic: u32,
    /// Vertices pinned by the layout; fed back into smoothing and
    /// gridding.
    pub pinned: Vec<usize>,
    /// Positive classes benefit from smoothing; zero is already smooth.
    pub class: u32,
}

/// The resulting tensor-product grid.
#[derive(Debug, Clone)]
pub struct FitGrid {
    pub nu: usize,
    pub nv: usize,
    pub xyz: Vec<[f64; 3]>,
    pub rms_err: f64,
    pub max_err: f64,
    pub dot_min: f64,
}

/// External surface-parameterisation primitives.
pub trait Parameterizer {
    /// Lay the triangulation out in a global UV space with `method`
    /// (0 = default; higher values trade quality for robustness).
    fn create_uv(&self, method: u32, mesh: &PrmMesh) -> Result<CreatedUv, PrmError>;

    fn smooth_uv(
        &self,
        periodic: u32,
        pinned: &[usize],
        mesh: &PrmMesh,
        uv: &mut [[f64; 2]],
    ) -> Result<(), PrmError>;

    fn normalize_uv(
        &self,
        frac: f64,
        periodic: u32,
        uv: &mut [[f64; 2]],
    ) -> Result<(), PrmError>;

    fn best_grid(
        &self,
        mesh: &PrmMesh,
        uv: &[[f64; 2]],
        tol: f64,
        periodic: u32,
        pinned: &[usize],
        nu_hint: usize,
    ) -> Result<FitGrid, PrmError>;
}

fn build_fit_neighbors(tris: &[[usize; 3]]) -> Vec<[Option<usize>; 3]> {
    let mut out = vec![[None; 3]; tris.len()];
    let mut open: AHashMap<(usize, usize), (usize, usize)> =
        AHashMap::with_capacity(tris.len() * 2);
    for (t, tri) in tris.iter().enumerate() {
        for s in 0..3 {
            let a = tri[(s + 1) % 3];
            let b = tri[(s + 2) % 3];
            let key = (a.min(b), a.max(b));
            match open.remove(&key) {
                Some((t2, s2)) => {
                    out[t][s] = Some(t2);
                    out[t2][s2] = Some(t);
                }
                None => {
                    open.insert(key, (t, s));
                }
            }
        }
    }
    out
}

/// Fit a tensor-product grid to a triangulation, escalating through the
/// parameteriser's methods when the cheap layout fails to smooth. The
/// returned grid is ready for spline approximation by the caller.
pub fn fit_triangles(
    prm: &dyn Parameterizer,
    pts: &[[f64; 3]],
    tris: &[[usize; 3]],
    tric: Option<&[[Option<usize>; 3]]>,
    tol: f64,
) -> Result<FitGrid, FitError> {
    if pts.is_empty() || tris.is_empty() {
        return Err(FitError::Empty);
    }
    for (i, tri) in tris.iter().enumerate() {
        if tri.iter().any(|&v| v >= pts.len()) {
            log::warn!(
                "bad triangle {} of [0-{}): {:?} (fit_triangles)",
                i,
                pts.len(),
                tri
            );
            return Err(FitError::BadIndex(i));
        }
    }
    if let Some(tric) = tric {
        for (i, nb) in tric.iter().enumerate() {
            if nb.iter().flatten().any(|&t| t >= tris.len()) {
                log::warn!(
                    "bad neighbours {} of [0-{}): {:?} (fit_triangles)",
                    i,
                    tris.len(),
                    nb
                );
                return Err(FitError::BadNeighbor(i));
            }
        }
    }

    let built;
    let neighbors = match tric {
        Some(t) => t,
        None => {
            built = build_fit_neighbors(tris);
            &built[..]
        }
    };
    let mesh = PrmMesh {
        xyz: pts,
        tris,
        neighbors,
    };

    let mut method = 0;
    let mut created = prm.create_uv(method, &mesh).map_err(|source| FitError::Prm {
        stage: "create",
        source,
    })?;

    if created.class > 0 {
        // smoothing may reject a cheap layout; walk up the methods
        let mut smoothed = matches!(
            prm.smooth_uv(created.periodic, &created.pinned, &mesh, &mut created.uv),
            Ok(()) | Err(PrmError::NotConverged)
        );
        while !smoothed && method < 7 {
            method += 1;
            created = prm.create_uv(method, &mesh).map_err(|source| FitError::Prm {
                stage: "create",
                source,
            })?;
            smoothed = matches!(
                prm.smooth_uv(created.periodic, &created.pinned, &mesh, &mut created.uv),
                Ok(()) | Err(PrmError::NotConverged)
            );
        }
        if !smoothed {
            return Err(FitError::Prm {
                stage: "smooth",
                source: PrmError::NotConverged,
            });
        }
    }

    prm.normalize_uv(0.01, created.periodic, &mut created.uv)
        .map_err(|source| FitError::Prm {
            stage: "normalize",
            source,
        })?;

    match prm.best_grid(
        &mesh,
        &created.uv,
        tol,
        created.periodic,
        &created.pinned,
        2 * pts.len(),
    ) {
        Ok(grid) => Ok(grid),
        Err(PrmError::ToleranceUnmet) => {
            // keep the best grid the parameteriser managed; the caller sees
            // the achieved error in the grid itself
            log::warn!("fit tolerance not met ({tol})");
            Err(FitError::Prm {
                stage: "grid",
                source: PrmError::ToleranceUnmet,
            })
        }
        Err(source) => Err(FitError::Prm {
            stage: "grid",
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct IdentityPrm;

    impl Parameterizer for IdentityPrm {
        fn create_uv(&self, _method: u32, mesh: &PrmMesh) -> Result<CreatedUv, PrmError> {
            // project onto xy; good enough for the flat fixtures here
            Ok(CreatedUv {
                uv: mesh.xyz.iter().map(|p| [p[0], p[1]]).collect(),
                periodic: 0,
                pinned: Vec::new(),
                class: 0,
            })
        }

        fn smooth_uv(
            &self,
            _periodic: u32,
            _pinned: &[usize],
            _mesh: &PrmMesh,
            _uv: &mut [[f64; 2]],
        ) -> Result<(), PrmError> {
            Ok(())
        }

        fn normalize_uv(
            &self,
            _frac: f64,
            _periodic: u32,
            _uv: &mut [[f64; 2]],
        ) -> Result<(), PrmError> {
            Ok(())
        }

        fn best_grid(
            &self,
            mesh: &PrmMesh,
            _uv: &[[f64; 2]],
            _tol: f64,
            _periodic: u32,
            _pinned: &[usize],
            _nu_hint: usize,
        ) -> Result<FitGrid, PrmError> {
            Ok(FitGrid {
                nu: 2,
                nv: 2,
                xyz: mesh.xyz.to_vec(),
                rms_err: 0.0,
                max_err: 0.0,
                dot_min: 1.0,
            })
        }
    }

    #[test]
    fn rejects_out_of_range_indices() {
        let pts = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let tris = [[0usize, 1, 7]];
        assert_eq!(
            fit_triangles(&IdentityPrm, &pts, &tris, None, 1e-3).unwrap_err(),
            FitError::BadIndex(0)
        );
    }

    #[test]
    fn flat_square_fits() {
        let pts = [
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
        ];
        let tris = [[0usize, 1, 2], [0, 2, 3]];
        let grid = fit_triangles(&IdentityPrm, &pts, &tris, None, 1e-3).unwrap();
        assert_eq!(grid.xyz.len(), 4);
        assert_eq!(grid.max_err, 0.0);
    }

    #[test]
    fn derived_neighbours_share_the_diagonal() {
        let tris = [[0usize, 1, 2], [0, 2, 3]];
        let nb = build_fit_neighbors(&tris);
        // diagonal (0, 2) is opposite vertex 1 in the first triangle and
        // opposite vertex 3 in the second
        assert_eq!(nb[0][1], Some(1));
        assert_eq!(nb[1][2], Some(0));
        assert_eq!(nb[0][0], None);
    }
}
