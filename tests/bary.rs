use approx::assert_abs_diff_eq;
use surftri::surface::analytic::Plane;
use surftri::{bary_frame, bary_tess, tessellate, RefineOptions, TriMesh, TriVert, VertexKind};

fn vert(x: f64, y: f64) -> TriVert {
    TriVert {
        kind: VertexKind::Face,
        xyz: [x, y, 0.0],
        uv: [x, y],
    }
}

fn refined_square() -> TriMesh {
    let corner = |i: usize, x: f64, y: f64| TriVert {
        kind: VertexKind::Node {
            index: i,
            degenerate: false,
        },
        xyz: [x, y, 0.0],
        uv: [x, y],
    };
    let mut mesh = TriMesh::new(
        vec![
            corner(0, 0.0, 0.0),
            corner(1, 1.0, 0.0),
            corner(2, 1.0, 1.0),
            corner(3, 0.0, 1.0),
        ],
        vec![[0, 1, 2], [0, 2, 3]],
        vec![[0, 1], [1, 2], [2, 3], [3, 0]],
    )
    .unwrap();
    let opts = RefineOptions {
        planar: true,
        maxlen: 0.5,
        dotnrm: 0.25,
        ..Default::default()
    };
    tessellate(&Plane::xy(), &mut mesh, &opts, None).unwrap();
    mesh
}

#[test]
fn frame_weights_reconstruct_every_vertex() {
    let mesh = refined_square();
    assert!(mesh.verts.len() > 4);

    let bary = bary_frame(&mesh).unwrap();
    assert_eq!(bary.len(), mesh.verts.len());
    for (i, b) in bary.iter().enumerate() {
        let f = mesh.frame[b.tri];
        let mut uv = [0.0; 2];
        for (k, &fv) in f.iter().enumerate() {
            uv[0] += b.w[k] * mesh.verts[fv].uv[0];
            uv[1] += b.w[k] * mesh.verts[fv].uv[1];
        }
        assert_abs_diff_eq!(uv[0], mesh.verts[i].uv[0], epsilon = 1e-12);
        assert_abs_diff_eq!(uv[1], mesh.verts[i].uv[1], epsilon = 1e-12);
    }
}

#[test]
fn point_query_reconstructs_the_probe() {
    let mesh = refined_square();

    // probe at the centroid of the first frame triangle
    let f = mesh.frame[0];
    let probe = [
        (mesh.verts[f[0]].uv[0] + mesh.verts[f[1]].uv[0] + mesh.verts[f[2]].uv[0]) / 3.0,
        (mesh.verts[f[0]].uv[1] + mesh.verts[f[1]].uv[1] + mesh.verts[f[2]].uv[1]) / 3.0,
    ];
    let (t, w) = bary_tess(&mesh, probe).expect("probe lies inside the face");
    let tri = mesh.tris[t].indices;
    let mut uv = [0.0; 2];
    for (k, &v) in tri.iter().enumerate() {
        uv[0] += w[k] * mesh.verts[v].uv[0];
        uv[1] += w[k] * mesh.verts[v].uv[1];
    }
    assert_abs_diff_eq!(uv[0], probe[0], epsilon = 1e-12);
    assert_abs_diff_eq!(uv[1], probe[1], epsilon = 1e-12);
}

#[test]
fn outside_vertex_extrapolates_from_the_closest_triangle() {
    let mut mesh = TriMesh::new(
        vec![vert(0.0, 0.0), vert(1.0, 0.0), vert(0.0, 1.0)],
        vec![[0, 1, 2]],
        vec![[0, 1], [1, 2], [2, 0]],
    )
    .unwrap();
    mesh.capture_frame();
    // a vertex no frame triangle contains
    mesh.verts.push(vert(2.0, 2.0));

    let bary = bary_frame(&mesh).unwrap();
    assert_eq!(bary[3].tri, 0);
    // barycentric coordinates stay affine outside the triangle
    let f = mesh.frame[0];
    let mut uv = [0.0; 2];
    for (k, &fv) in f.iter().enumerate() {
        uv[0] += bary[3].w[k] * mesh.verts[fv].uv[0];
        uv[1] += bary[3].w[k] * mesh.verts[fv].uv[1];
    }
    assert_abs_diff_eq!(uv[0], 2.0, epsilon = 1e-9);
    assert_abs_diff_eq!(uv[1], 2.0, epsilon = 1e-9);
}

#[test]
fn missing_frame_is_fatal() {
    let mesh = TriMesh::new(
        vec![vert(0.0, 0.0), vert(1.0, 0.0), vert(0.0, 1.0)],
        vec![[0, 1, 2]],
        vec![[0, 1], [1, 2], [2, 0]],
    )
    .unwrap();
    // no capture_frame: the frame is empty
    assert!(bary_frame(&mesh).is_err());
}

#[test]
fn empty_mesh_has_no_containing_triangle() {
    let mesh = TriMesh::default();
    assert!(bary_tess(&mesh, [0.5, 0.5]).is_none());
}
