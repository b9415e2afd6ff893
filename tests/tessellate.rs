use std::f64::consts::PI;

use surftri::kernel::predicates::dot_norm;
use surftri::surface::analytic::Plane;
use surftri::surface::{SurfEval, Surface, SurfaceError, UvRange};
use surftri::{
    bary_frame, tessellate, Neighbor, RefineOptions, TriMesh, TriVert, UvOrientation, VertexKind,
};

fn corner(i: usize, x: f64, y: f64) -> TriVert {
    TriVert {
        kind: VertexKind::Node {
            index: i,
            degenerate: false,
        },
        xyz: [x, y, 0.0],
        uv: [x, y],
    }
}

fn edge_vert(edge: usize, ordinal: usize, x: f64, y: f64) -> TriVert {
    TriVert {
        kind: VertexKind::Edge { edge, ordinal },
        xyz: [x, y, 0.0],
        uv: [x, y],
    }
}

fn unit_square() -> TriMesh {
    TriMesh::new(
        vec![
            corner(0, 0.0, 0.0),
            corner(1, 1.0, 0.0),
            corner(2, 1.0, 1.0),
            corner(3, 0.0, 1.0),
        ],
        vec![[0, 1, 2], [0, 2, 3]],
        vec![[0, 1], [1, 2], [2, 3], [3, 0]],
    )
    .unwrap()
}

/// 10x1 strip of 0.1-sized squares: 22 boundary vertices, 20 triangles.
fn strip(reverse_one: bool) -> TriMesh {
    let mut verts = Vec::new();
    for i in 0..=10 {
        verts.push(edge_vert(0, i, 0.1 * i as f64, 0.0));
    }
    for i in 0..=10 {
        verts.push(edge_vert(2, i, 0.1 * i as f64, 0.1));
    }
    let mut tris = Vec::new();
    for k in 0..10 {
        tris.push([k, k + 1, 12 + k]);
        tris.push([k, 12 + k, 11 + k]);
    }
    if reverse_one {
        tris[10] = [6, 5, 17];
    }
    let mut segs = Vec::new();
    for k in 0..10 {
        segs.push([k, k + 1]);
        segs.push([11 + k, 12 + k]);
    }
    segs.push([0, 11]);
    segs.push([10, 21]);
    TriMesh::new(verts, tris, segs).unwrap()
}

fn side_lengths(mesh: &TriMesh) -> Vec<f64> {
    let mut out = Vec::new();
    for tri in &mesh.tris {
        for s in 0..3 {
            let a = tri.indices[(s + 1) % 3];
            let b = tri.indices[(s + 2) % 3];
            let pa = mesh.verts[a].xyz;
            let pb = mesh.verts[b].xyz;
            let d2 = (pa[0] - pb[0]).powi(2) + (pa[1] - pb[1]).powi(2) + (pa[2] - pb[2]).powi(2);
            out.push(d2.sqrt());
        }
    }
    out
}

fn min_dihedral(mesh: &TriMesh) -> f64 {
    let mut min = 1.0f64;
    for (i, tri) in mesh.tris.iter().enumerate() {
        for j in 0..3 {
            let Neighbor::Tri(k) = tri.neighbors[j] else {
                continue;
            };
            if k < i {
                continue;
            }
            let i0 = tri.indices[j];
            let i1 = tri.indices[(j + 1) % 3];
            let i2 = tri.indices[(j + 2) % 3];
            let other = &mesh.tris[k];
            let sum = other.indices[0] + other.indices[1] + other.indices[2];
            let i3 = sum - i1 - i2;
            min = min.min(dot_norm(
                &mesh.verts[i0].xyz,
                &mesh.verts[i1].xyz,
                &mesh.verts[i2].xyz,
                &mesh.verts[i3].xyz,
            ));
        }
    }
    min
}

#[test]
fn flat_square_splits_the_long_diagonal() {
    let mut mesh = unit_square();
    let opts = RefineOptions {
        planar: true,
        maxlen: 0.5,
        dotnrm: 0.25,
        ..Default::default()
    };
    tessellate(&Plane::xy(), &mut mesh, &opts, None).unwrap();

    assert_eq!(mesh.verts.len(), 5);
    assert_eq!(mesh.tris.len(), 4);
    assert_eq!(mesh.verts[4].uv, [0.5, 0.5]);
    assert!(mesh.verts[4].kind.is_face());
    mesh.check(Some(1.0)).unwrap();
}

#[test]
fn second_run_changes_nothing() {
    let mut mesh = unit_square();
    let opts = RefineOptions {
        planar: true,
        maxlen: 0.5,
        dotnrm: 0.25,
        ..Default::default()
    };
    tessellate(&Plane::xy(), &mut mesh, &opts, None).unwrap();
    let nverts = mesh.verts.len();
    let ntris = mesh.tris.len();

    tessellate(&Plane::xy(), &mut mesh, &opts, None).unwrap();
    assert_eq!(mesh.verts.len(), nverts);
    assert_eq!(mesh.tris.len(), ntris);
    mesh.check(Some(1.0)).unwrap();
}

#[test]
fn balanced_mesh_makes_no_swaps() {
    let mut mesh = unit_square();
    let before: Vec<_> = mesh.tris.iter().map(|t| t.indices).collect();
    let opts = RefineOptions {
        planar: true,
        ..Default::default()
    };
    tessellate(&Plane::xy(), &mut mesh, &opts, None).unwrap();
    let after: Vec<_> = mesh.tris.iter().map(|t| t.indices).collect();
    assert_eq!(before, after);
    assert_eq!(mesh.verts.len(), 4);
}

#[test]
fn no_edge_falls_under_the_minimum_length() {
    let mut mesh = strip(false);
    let opts = RefineOptions {
        planar: true,
        maxlen: 0.1,
        minlen: 0.05,
        ..Default::default()
    };
    tessellate(&Plane::xy(), &mut mesh, &opts, None).unwrap();

    assert!(mesh.verts.len() > 22);
    mesh.check(Some(1.0)).unwrap();
    for len in side_lengths(&mesh) {
        assert!(len >= 0.05 - 1.0e-9, "edge of length {len}");
        assert!(len <= 0.1 + 1.0e-9, "edge of length {len}");
    }
}

#[test]
fn vertex_budget_stops_refinement() {
    let mut mesh = strip(false);
    let opts = RefineOptions {
        planar: true,
        maxlen: 0.1,
        minlen: 0.05,
        max_pts: 25,
        ..Default::default()
    };
    tessellate(&Plane::xy(), &mut mesh, &opts, None).unwrap();
    // the budget is checked after each insertion, so at most one extra
    assert!(mesh.verts.len() <= 26);
    assert!(mesh.verts.len() > 22);
    mesh.check(Some(1.0)).unwrap();
}

#[test]
fn planar_bad_start_returns_the_input_untouched() {
    let mut mesh = strip(true);
    let before: Vec<_> = mesh.tris.iter().map(|t| t.indices).collect();
    let opts = RefineOptions {
        planar: true,
        maxlen: 0.1,
        ..Default::default()
    };
    tessellate(&Plane::xy(), &mut mesh, &opts, None).unwrap();

    assert_eq!(mesh.verts.len(), 22);
    let after: Vec<_> = mesh.tris.iter().map(|t| t.indices).collect();
    assert_eq!(before, after);
}

#[test]
fn degenerate_boundary_pair_is_collapsed() {
    // two coincident copies of one model node joined by a zero-area pair,
    // as a cylinder seam leaves behind at a cone-like closure
    let verts = vec![
        TriVert {
            kind: VertexKind::Node {
                index: 1,
                degenerate: false,
            },
            xyz: [0.0, 0.0, 0.0],
            uv: [0.0, 0.0],
        },
        TriVert {
            kind: VertexKind::Node {
                index: 2,
                degenerate: false,
            },
            xyz: [1.0, 0.0, 0.0],
            uv: [1.0, 0.0],
        },
        TriVert {
            kind: VertexKind::Node {
                index: 2,
                degenerate: false,
            },
            xyz: [1.0, 0.0, 0.0],
            uv: [1.0, 0.0],
        },
        edge_vert(0, 1, 1.0, 1.0),
        edge_vert(1, 1, 0.0, 1.0),
    ];
    let tris = vec![[1, 2, 3], [2, 1, 0], [0, 1, 3], [0, 3, 4]];
    let segs = vec![[2, 3], [0, 2], [3, 4], [4, 0]];
    let mut mesh = TriMesh::new(verts, tris, segs).unwrap();

    let opts = RefineOptions {
        planar: true,
        dotnrm: 0.5,
        ..Default::default()
    };
    tessellate(&Plane::xy(), &mut mesh, &opts, None).unwrap();

    assert_eq!(mesh.tris.len(), 2);
    assert_eq!(mesh.verts.len(), 4);
    mesh.check(Some(1.0)).unwrap();
}

struct Paraboloid;

impl Surface for Paraboloid {
    fn evaluate(&self, uv: [f64; 2]) -> Result<SurfEval, SurfaceError> {
        let (u, v) = (uv[0], uv[1]);
        Ok(SurfEval {
            xyz: [u, v, 1.0 - u * u - v * v],
            du: [1.0, 0.0, -2.0 * u],
            dv: [0.0, 1.0, -2.0 * v],
            d2: Some([[0.0, 0.0, -2.0], [0.0; 3], [0.0, 0.0, -2.0]]),
        })
    }

    fn inv_evaluate(&self, xyz: [f64; 3]) -> Result<([f64; 2], [f64; 3]), SurfaceError> {
        let uv = [xyz[0], xyz[1]];
        Ok((uv, self.evaluate(uv)?.xyz))
    }

    fn range(&self) -> Result<UvRange, SurfaceError> {
        Ok(UvRange {
            u_min: -2.0,
            u_max: 2.0,
            v_min: -2.0,
            v_max: 2.0,
            periodic: false,
        })
    }
}

fn cap_fan() -> TriMesh {
    let mut verts = Vec::new();
    for k in 0..8 {
        let a = 2.0 * PI * k as f64 / 8.0;
        verts.push(TriVert {
            kind: VertexKind::Edge {
                edge: 0,
                ordinal: k,
            },
            xyz: [a.cos(), a.sin(), 0.0],
            uv: [a.cos(), a.sin()],
        });
    }
    verts.push(TriVert {
        kind: VertexKind::Face,
        xyz: [0.0, 0.0, 1.0],
        uv: [0.0, 0.0],
    });
    let mut tris = Vec::new();
    let mut segs = Vec::new();
    for k in 0..8 {
        tris.push([k, (k + 1) % 8, 8]);
        segs.push([k, (k + 1) % 8]);
    }
    TriMesh::new(verts, tris, segs).unwrap()
}

#[test]
fn curved_cap_gains_interior_points() {
    let mut mesh = cap_fan();
    let before = min_dihedral(&mesh);
    let opts = RefineOptions {
        planar: false,
        dotnrm: 0.9,
        chord: 0.05,
        max_pts: 3000,
        ..Default::default()
    };
    tessellate(&Paraboloid, &mut mesh, &opts, None).unwrap();

    // the facet phases must have inserted interior vertices
    assert!(mesh.verts.len() > 9, "nverts = {}", mesh.verts.len());
    assert!(mesh.verts[9..].iter().all(|v| v.kind.is_face()));
    mesh.check(Some(1.0)).unwrap();

    // the frame survives refinement untouched
    assert_eq!(mesh.nfrvrts, 9);
    assert_eq!(mesh.frame.len(), 8);

    // no folds anywhere, and the worst dihedral did not regress
    let after = min_dihedral(&mesh);
    assert!(after > 0.5, "min dihedral {after} (started at {before})");

    // the frame map covers the refined vertices
    let bary = bary_frame(&mesh).unwrap();
    assert_eq!(bary.len(), mesh.verts.len());
}

struct FixedQuadder {
    tris: Vec<[usize; 3]>,
}

impl surftri::Quadder for FixedQuadder {
    fn quad_tris(
        &self,
        _surf: &dyn Surface,
        _parms: &[f64; 3],
        _lens: &[usize; 4],
        _uv: &[[f64; 2]],
    ) -> Result<surftri::surface::QuadResult, SurfaceError> {
        Ok(surftri::surface::QuadResult {
            uvs: Vec::new(),
            tris: self.tris.clone(),
            tfi: false,
            degenerate_map: false,
        })
    }
}

#[test]
fn acceptable_quadding_replaces_the_triangulation() {
    let mut mesh = unit_square();
    let quadder = FixedQuadder {
        tris: vec![[0, 1, 3], [1, 2, 3]],
    };
    let opts = RefineOptions {
        planar: true,
        lens: [2, 1, 2, 1],
        quad_uvs: Some(Vec::new()),
        ..Default::default()
    };
    tessellate(&Plane::xy(), &mut mesh, &opts, Some(&quadder)).unwrap();

    let tris: Vec<_> = mesh.tris.iter().map(|t| t.indices).collect();
    assert_eq!(tris, vec![[0, 1, 3], [1, 2, 3]]);
    mesh.check(Some(1.0)).unwrap();
}

#[test]
fn inverted_quadding_falls_back_to_the_frame() {
    let mut mesh = unit_square();
    // facet normals oppose the surface normal; validation must reject it
    let quadder = FixedQuadder {
        tris: vec![[0, 2, 1], [0, 3, 2]],
    };
    let opts = RefineOptions {
        planar: true,
        lens: [2, 1, 2, 1],
        quad_uvs: Some(Vec::new()),
        ..Default::default()
    };
    tessellate(&Plane::xy(), &mut mesh, &opts, Some(&quadder)).unwrap();

    assert_eq!(mesh.verts.len(), 4);
    let tris: Vec<_> = mesh.tris.iter().map(|t| t.indices).collect();
    assert_eq!(tris, vec![[0, 1, 2], [0, 2, 3]]);
    mesh.check(Some(1.0)).unwrap();
}

#[test]
fn single_quad_face_passes_through() {
    let mut mesh = unit_square();
    let opts = RefineOptions {
        planar: true,
        lens: [1, 1, 1, 1],
        quad_uvs: Some(Vec::new()),
        ..Default::default()
    };
    tessellate(&Plane::xy(), &mut mesh, &opts, None).unwrap();

    assert_eq!(mesh.verts.len(), 4);
    let tris: Vec<_> = mesh.tris.iter().map(|t| t.indices).collect();
    assert_eq!(tris, vec![[0, 1, 2], [0, 2, 3]]);
    mesh.check(Some(1.0)).unwrap();
}

#[test]
fn single_quad_face_flips_when_reversed() {
    let mut mesh = unit_square();
    let opts = RefineOptions {
        planar: true,
        or_uv: UvOrientation::Reverse,
        lens: [1, 1, 1, 1],
        quad_uvs: Some(Vec::new()),
        ..Default::default()
    };
    tessellate(&Plane::xy(), &mut mesh, &opts, None).unwrap();

    assert_eq!(mesh.verts.len(), 4);
    let tris: Vec<_> = mesh.tris.iter().map(|t| t.indices).collect();
    assert_eq!(tris, vec![[0, 3, 2], [0, 2, 1]]);
    mesh.check(Some(-1.0)).unwrap();
}
