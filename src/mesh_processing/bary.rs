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

//! Barycentric association of refined vertices with the frame. Downstream
//! sensitivity code inverts this map to transport a parameter displacement
//! of a frame vertex onto every refined vertex.

use crate::kernel::predicates::{in_tri_exact, Containment};
use crate::mesh::basic_types::TriMesh;
use crate::mesh_processing::refine::TessError;

/// A vertex's place in the frame: the containing frame triangle and its
/// barycentric weights there.
#[derive(Debug, Clone, Copy)]
pub struct BaryRef {
    pub tri: usize,
    pub w: [f64; 3],
}

/// Assign every vertex its containing frame triangle and weights. A vertex
/// no frame triangle contains falls back to the closest-inside-out
/// triangle (greatest least weight) with a warning; failure to find any
/// frame triangle at all is fatal for the call.
pub fn bary_frame(mesh: &TriMesh) -> Result<Vec<BaryRef>, TessError> {
    let mut out = Vec::with_capacity(mesh.verts.len());

    for (i, vert) in mesh.verts.iter().enumerate() {
        let p = vert.uv;
        let mut found = None;
        let mut closest: Option<(usize, f64)> = None;
        for (j, f) in mesh.frame.iter().enumerate() {
            let (c, w) = in_tri_exact(
                &mesh.verts[f[0]].uv,
                &mesh.verts[f[1]].uv,
                &mesh.verts[f[2]].uv,
                &p,
            );
            if c == Containment::Inside {
                found = Some(BaryRef { tri: j, w });
                break;
            }
            let least = w[0].min(w[1]).min(w[2]);
            match closest {
                None => closest = Some((j, least)),
                Some((_, best)) if least > best => closest = Some((j, least)),
                _ => {}
            }
        }

        let bary = match (found, closest) {
            (Some(b), _) => b,
            (None, Some((j, _))) => {
                let f = mesh.frame[j];
                let (_, w) = in_tri_exact(
                    &mesh.verts[f[0]].uv,
                    &mesh.verts[f[1]].uv,
                    &mesh.verts[f[2]].uv,
                    &p,
                );
                log::warn!(
                    "extrapolated frame weights for vertex {i} at {:?} (frame tri {j})",
                    p
                );
                BaryRef { tri: j, w }
            }
            (None, None) => {
                log::warn!("no frame triangle found for vertex {i} at {:?}", p);
                return Err(TessError::FrameTriangleNotFound { vertex: i });
            }
        };
        out.push(bary);
    }

    Ok(out)
}

/// Point query into the refined triangulation: the triangle containing
/// `uv` and its barycentric weights, falling back to the closest
/// triangle when the point grazes the boundary. `None` on an empty mesh.
pub fn bary_tess(mesh: &TriMesh, uv: [f64; 2]) -> Option<(usize, [f64; 3])> {
    let mut closest: Option<(usize, f64)> = None;
    for (j, tri) in mesh.tris.iter().enumerate() {
        let [i0, i1, i2] = tri.indices;
        let (c, w) = in_tri_exact(
            &mesh.verts[i0].uv,
            &mesh.verts[i1].uv,
            &mesh.verts[i2].uv,
            &uv,
        );
        if c == Containment::Inside {
            return Some((j, w));
        }
        let least = w[0].min(w[1]).min(w[2]);
        match closest {
            None => closest = Some((j, least)),
            Some((_, best)) if least > best => closest = Some((j, least)),
            _ => {}
        }
    }

    let (j, _) = closest?;
    let [i0, i1, i2] = mesh.tris[j].indices;
    let (_, w) = in_tri_exact(
        &mesh.verts[i0].uv,
        &mesh.verts[i1].uv,
        &mesh.verts[i2].uv,
        &uv,
    );
    Some((j, w))
}
