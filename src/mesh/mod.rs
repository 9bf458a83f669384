//! Indexed polygon mesh used as the shared workspace of a gear build.
//!
//! The mesh is an arena: stages append vertices, edges and faces and refer to them by
//! `u32` index. Indices stay stable until an explicit [`Mesh::weld`] or
//! [`Mesh::compact`] pass renumbers them and hands back the remap table.
//!
//! Edges are stored as unordered pairs. While a stage works on polylines (flank,
//! tooth profile, outline) the edge list is the topology. Once faces exist,
//! [`Mesh::sync_edges`] rebuilds the edge list from the face boundaries.

use crate::aabb::Aabb;
use crate::float_types::Real;
use hashbrown::HashMap;
use nalgebra::{Point3, Vector3};

pub mod manifold;
pub mod quality;
pub mod weld;
pub mod winding;

/// A mesh vertex. `selected` is scratch state used while a stage picks its working set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshVertex {
    pub pos: Point3<Real>,
    pub selected: bool,
}

impl MeshVertex {
    #[inline]
    pub const fn new(pos: Point3<Real>) -> Self {
        Self {
            pos,
            selected: false,
        }
    }

    /// Distance from the gear axis (the z axis).
    #[inline]
    pub fn radial_distance(&self) -> Real {
        self.pos.x.hypot(self.pos.y)
    }
}

/// A polygon given as a cyclic sequence of vertex indices.
/// The winding (counter-clockwise seen from outside) determines the outward normal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Face {
    pub indices: Vec<u32>,
}

impl Face {
    pub const fn new(indices: Vec<u32>) -> Self {
        Self { indices }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Directed boundary edges `(indices[i], indices[i + 1])`, wrapping around.
    pub fn edges(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        let n = self.indices.len();
        (0..n).map(move |i| (self.indices[i], self.indices[(i + 1) % n]))
    }

    /// Reverse the winding in place.
    pub fn flip(&mut self) {
        self.indices.reverse();
    }

    /// `Some(true)` if the face traverses `a -> b`, `Some(false)` for `b -> a`,
    /// `None` if the edge is not on this face.
    pub fn edge_direction(&self, a: u32, b: u32) -> Option<bool> {
        self.edges().find_map(|(p, q)| {
            if p == a && q == b {
                Some(true)
            } else if p == b && q == a {
                Some(false)
            } else {
                None
            }
        })
    }

    pub fn position_of(&self, vertex: u32) -> Option<usize> {
        self.indices.iter().position(|&i| i == vertex)
    }

    /// The vertices before and after `vertex` in winding order.
    pub fn neighbors_of(&self, vertex: u32) -> Option<(u32, u32)> {
        let n = self.indices.len();
        let at = self.position_of(vertex)?;
        Some((self.indices[(at + n - 1) % n], self.indices[(at + 1) % n]))
    }
}

/// Canonical (sorted) key of an undirected edge.
#[inline]
pub const fn edge_key(a: u32, b: u32) -> [u32; 2] {
    if a < b { [a, b] } else { [b, a] }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<MeshVertex>,
    pub edges: Vec<[u32; 2]>,
    pub faces: Vec<Face>,
}

impl Mesh {
    pub const fn new() -> Self {
        Self {
            vertices: Vec::new(),
            edges: Vec::new(),
            faces: Vec::new(),
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Append a vertex and return its index.
    pub fn add_vertex(&mut self, pos: Point3<Real>) -> u32 {
        self.vertices.push(MeshVertex::new(pos));
        (self.vertices.len() - 1) as u32
    }

    /// Append several vertices, returning the index of each.
    pub fn add_vertices(&mut self, positions: impl IntoIterator<Item = Point3<Real>>) -> Vec<u32> {
        positions.into_iter().map(|p| self.add_vertex(p)).collect()
    }

    pub fn add_edge(&mut self, a: u32, b: u32) {
        self.edges.push([a, b]);
    }

    /// Connect consecutive indices with edges.
    pub fn add_polyline(&mut self, indices: &[u32]) {
        for pair in indices.windows(2) {
            self.add_edge(pair[0], pair[1]);
        }
    }

    /// Append a face and return its index.
    pub fn add_face(&mut self, indices: Vec<u32>) -> usize {
        self.faces.push(Face::new(indices));
        self.faces.len() - 1
    }

    #[inline]
    pub fn position(&self, index: u32) -> Point3<Real> {
        self.vertices[index as usize].pos
    }

    /// Vertex positions in index order.
    pub fn positions(&self) -> Vec<Point3<Real>> {
        self.vertices.iter().map(|v| v.pos).collect()
    }

    pub fn edges(&self) -> &[[u32; 2]] {
        &self.edges
    }

    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    pub fn bounding_box(&self) -> Option<Aabb> {
        Aabb::from_points(self.vertices.iter().map(|v| &v.pos))
    }

    /// Mark every vertex matching `predicate` as selected and return the matching
    /// indices in index order. Vertices that do not match keep their current flag.
    pub fn select_where(&mut self, mut predicate: impl FnMut(&MeshVertex) -> bool) -> Vec<u32> {
        let mut picked = Vec::new();
        for (i, vertex) in self.vertices.iter_mut().enumerate() {
            if predicate(vertex) {
                vertex.selected = true;
                picked.push(i as u32);
            }
        }
        picked
    }

    pub fn deselect_all(&mut self) {
        for vertex in &mut self.vertices {
            vertex.selected = false;
        }
    }

    pub fn selected(&self) -> Vec<u32> {
        self.vertices
            .iter()
            .enumerate()
            .filter(|(_, v)| v.selected)
            .map(|(i, _)| i as u32)
            .collect()
    }

    pub fn edge_length(&self, [a, b]: [u32; 2]) -> Real {
        (self.position(b) - self.position(a)).norm()
    }

    /// Map each undirected face edge to the faces that use it, in face order.
    pub fn edge_face_map(&self) -> HashMap<[u32; 2], Vec<usize>> {
        let mut map: HashMap<[u32; 2], Vec<usize>> = HashMap::new();
        for (face_idx, face) in self.faces.iter().enumerate() {
            for (a, b) in face.edges() {
                map.entry(edge_key(a, b)).or_default().push(face_idx);
            }
        }
        map
    }

    /// Faces containing `vertex`, in face order.
    pub fn faces_around(&self, vertex: u32) -> Vec<usize> {
        self.faces
            .iter()
            .enumerate()
            .filter(|(_, f)| f.indices.contains(&vertex))
            .map(|(i, _)| i)
            .collect()
    }

    /// Rebuild the edge list from face boundaries: one entry per undirected edge,
    /// in order of first appearance. Loose edges that no face uses are dropped.
    pub fn sync_edges(&mut self) {
        let mut seen: HashMap<[u32; 2], ()> = HashMap::with_capacity(self.faces.len() * 2);
        let mut edges = Vec::with_capacity(self.faces.len() * 2);
        for face in &self.faces {
            for (a, b) in face.edges() {
                let key = edge_key(a, b);
                if seen.insert(key, ()).is_none() {
                    edges.push(key);
                }
            }
        }
        self.edges = edges;
    }

    /// Rewrite every edge and face through `remap` (old index -> new index), dropping
    /// edges that collapse to a point, duplicate edges, repeated consecutive face
    /// indices and faces left with fewer than three vertices.
    pub(crate) fn apply_remap(&mut self, remap: &[u32]) {
        let mut seen: HashMap<[u32; 2], ()> = HashMap::with_capacity(self.edges.len());
        let edges = std::mem::take(&mut self.edges);
        for [a, b] in edges {
            let (a, b) = (remap[a as usize], remap[b as usize]);
            if a != b && seen.insert(edge_key(a, b), ()).is_none() {
                self.edges.push([a, b]);
            }
        }

        for face in &mut self.faces {
            let mut indices: Vec<u32> = face.indices.iter().map(|&i| remap[i as usize]).collect();
            indices.dedup();
            while indices.len() > 1 && indices.first() == indices.last() {
                indices.pop();
            }
            face.indices = indices;
        }
        self.faces.retain(|f| f.len() >= 3);
    }

    /// Drop vertices that no edge or face references and renumber the rest,
    /// preserving their relative order. Returns the remap table (`u32::MAX` for removed
    /// vertices).
    pub fn compact(&mut self) -> Vec<u32> {
        let mut used = vec![false; self.vertices.len()];
        for [a, b] in &self.edges {
            used[*a as usize] = true;
            used[*b as usize] = true;
        }
        for face in &self.faces {
            for &i in &face.indices {
                used[i as usize] = true;
            }
        }

        let mut remap = vec![u32::MAX; self.vertices.len()];
        let mut kept = Vec::with_capacity(self.vertices.len());
        for (old, vertex) in self.vertices.iter().enumerate() {
            if used[old] {
                remap[old] = kept.len() as u32;
                kept.push(*vertex);
            }
        }
        self.vertices = kept;
        self.apply_remap(&remap);
        remap
    }

    /// Newell normal of a face, scaled by twice its area.
    pub fn face_area_vector(&self, face: &Face) -> Vector3<Real> {
        let mut normal = Vector3::zeros();
        for (a, b) in face.edges() {
            let p = self.position(a);
            let q = self.position(b);
            normal.x += (p.y - q.y) * (p.z + q.z);
            normal.y += (p.z - q.z) * (p.x + q.x);
            normal.z += (p.x - q.x) * (p.y + q.y);
        }
        normal
    }

    pub fn face_area(&self, face: &Face) -> Real {
        0.5 * self.face_area_vector(face).norm()
    }

    pub fn face_normal(&self, face: &Face) -> Option<Vector3<Real>> {
        self.face_area_vector(face).try_normalize(Real::EPSILON)
    }

    /// Signed volume enclosed by `faces` (fan-triangulated), positive when the faces
    /// wind outward.
    pub fn signed_volume_of(&self, faces: impl IntoIterator<Item = usize>) -> Real {
        let mut volume = 0.0;
        for face_idx in faces {
            let indices = &self.faces[face_idx].indices;
            if indices.len() < 3 {
                continue;
            }
            let p0 = self.position(indices[0]).coords;
            for pair in indices[1..].windows(2) {
                let p1 = self.position(pair[0]).coords;
                let p2 = self.position(pair[1]).coords;
                volume += p0.dot(&p1.cross(&p2));
            }
        }
        volume / 6.0
    }

    pub fn signed_volume(&self) -> Real {
        self.signed_volume_of(0..self.faces.len())
    }
}

/// Signed area of a closed polygon projected onto the xy plane; positive for
/// counter-clockwise winding.
pub fn signed_area_xy(points: impl IntoIterator<Item = Point3<Real>>) -> Real {
    let points: Vec<Point3<Real>> = points.into_iter().collect();
    let n = points.len();
    let mut twice_area = 0.0;
    for i in 0..n {
        let p = points[i];
        let q = points[(i + 1) % n];
        twice_area += p.x * q.y - q.x * p.y;
    }
    0.5 * twice_area
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Unit cube with outward winding, used by the kernel tests.
    pub(crate) fn unit_cube() -> Mesh {
        let mut mesh = Mesh::new();
        for z in [0.0, 1.0] {
            for (x, y) in [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)] {
                mesh.add_vertex(Point3::new(x, y, z));
            }
        }
        mesh.add_face(vec![0, 3, 2, 1]);
        mesh.add_face(vec![4, 5, 6, 7]);
        mesh.add_face(vec![0, 1, 5, 4]);
        mesh.add_face(vec![1, 2, 6, 5]);
        mesh.add_face(vec![2, 3, 7, 6]);
        mesh.add_face(vec![3, 0, 4, 7]);
        mesh.sync_edges();
        mesh
    }

    #[test]
    fn cube_has_twelve_edges_and_unit_volume() {
        let cube = unit_cube();
        assert_eq!(cube.edge_count(), 12);
        assert!((cube.signed_volume() - 1.0).abs() < 1e-12);
        let aabb = cube.bounding_box().expect("non-empty");
        assert_eq!(aabb.extents(), Vector3::new(1.0, 1.0, 1.0));
    }

    #[test]
    fn face_edge_direction_and_neighbors() {
        let face = Face::new(vec![4, 7, 9]);
        assert_eq!(face.edge_direction(7, 9), Some(true));
        assert_eq!(face.edge_direction(4, 9), Some(false));
        assert_eq!(face.edge_direction(4, 5), None);
        assert_eq!(face.neighbors_of(4), Some((9, 7)));
    }

    #[test]
    fn top_face_normal_points_up() {
        let cube = unit_cube();
        let normal = cube.face_normal(&cube.faces[1]).expect("non-degenerate");
        assert!((normal - Vector3::z()).norm() < 1e-12);
        assert!((cube.face_area(&cube.faces[1]) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn compact_drops_unreferenced_vertices() {
        let mut mesh = Mesh::new();
        let a = mesh.add_vertex(Point3::new(0.0, 0.0, 0.0));
        let _orphan = mesh.add_vertex(Point3::new(5.0, 5.0, 5.0));
        let b = mesh.add_vertex(Point3::new(1.0, 0.0, 0.0));
        let c = mesh.add_vertex(Point3::new(0.0, 1.0, 0.0));
        mesh.add_face(vec![a, b, c]);
        mesh.sync_edges();

        let remap = mesh.compact();
        assert_eq!(remap, vec![0, u32::MAX, 1, 2]);
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.faces[0].indices, vec![0, 1, 2]);
    }

    #[test]
    fn selection_is_scratch_state() {
        let mut cube = unit_cube();
        let top = cube.select_where(|v| v.pos.z > 0.5);
        assert_eq!(top, vec![4, 5, 6, 7]);
        assert_eq!(cube.selected(), top);
        cube.deselect_all();
        assert!(cube.selected().is_empty());
    }

    #[test]
    fn signed_area_follows_winding() {
        let square = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(2.0, 2.0, 0.0),
            Point3::new(0.0, 2.0, 0.0),
        ];
        assert!((signed_area_xy(square) - 4.0).abs() < 1e-12);
        assert!((signed_area_xy(square.into_iter().rev()) + 4.0).abs() < 1e-12);
    }
}
