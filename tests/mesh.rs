use surftri::mesh::core::MeshError;
use surftri::{Neighbor, TriMesh, TriVert, VertexKind};

fn vert(x: f64, y: f64) -> TriVert {
    TriVert {
        kind: VertexKind::Face,
        xyz: [x, y, 0.0],
        uv: [x, y],
    }
}

fn fan() -> TriMesh {
    TriMesh::new(
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
    .unwrap()
}

#[test]
fn construction_links_all_sides() {
    let mesh = fan();
    mesh.check(Some(1.0)).unwrap();

    let mut interior = 0;
    let mut boundary = 0;
    for tri in &mesh.tris {
        for nb in tri.neighbors {
            match nb {
                Neighbor::Tri(_) => interior += 1,
                Neighbor::Seg(_) => boundary += 1,
            }
        }
    }
    // four spokes counted from both sides, four boundary sides
    assert_eq!(interior, 8);
    assert_eq!(boundary, 4);
    // every segment knows a triangle that carries it
    assert!(mesh.segs.iter().all(|s| s.neighbor.is_some()));
}

#[test]
fn interior_sides_start_marked() {
    let mesh = fan();
    for (t, tri) in mesh.tris.iter().enumerate() {
        for s in 0..3 {
            let marked = tri.mark & (1 << s) != 0;
            let interior = mesh.tris[t].neighbors[s].tri().is_some();
            assert_eq!(marked, interior);
        }
    }
}

#[test]
fn bad_vertex_index_is_rejected() {
    let r = TriMesh::new(
        vec![vert(0.0, 0.0), vert(1.0, 0.0)],
        vec![[0, 1, 5]],
        vec![],
    );
    assert_eq!(r.unwrap_err(), MeshError::BadVertexIndex(0));
}

#[test]
fn capture_frame_snapshots_the_triangles() {
    let mut mesh = fan();
    mesh.capture_frame();
    assert_eq!(mesh.nfrvrts, 5);
    assert_eq!(mesh.frame.len(), 4);
    assert_eq!(mesh.frame[2], [2, 3, 4]);
}

#[test]
fn orientation_audit_flags_an_inverted_triangle() {
    let mut mesh = fan();
    mesh.check(Some(1.0)).unwrap();
    // drag the fan centre outside the square; one wedge folds over
    mesh.verts[4].uv = [2.0, 0.5];
    assert!(matches!(
        mesh.check(Some(1.0)),
        Err(MeshError::InvertedArea(1))
    ));
}
