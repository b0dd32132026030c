//! Room boundary geometry: triangle meshes, mirror-plane extraction, and the
//! aggregated global plane set.
//!
//! Each [`RoomBoundary`] owns one mesh instance and its world transform, and
//! derives the deduplicated list of infinite mirror planes that approximate
//! its reflecting surfaces. The [`MirrorPlaneSet`] concatenates the plane
//! lists of every boundary in the scene and refreshes only the slices whose
//! owning boundary reported a change.

use serde::{Deserialize, Serialize};

use crate::error::{IsmError, Result};
use crate::math::{Plane, Transform, Vec3, planes_equal};

/// Triangle-list mesh data for one room boundary.
///
/// `indices` holds three entries per triangle into `positions`/`normals`.
/// Fields are public for hosts that already have validated mesh data;
/// [`TriangleMesh::new`] checks the shape invariants.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TriangleMesh {
    /// Vertex positions in local space.
    pub positions: Vec<Vec3>,
    /// Per-vertex normals in local space.
    pub normals: Vec<Vec3>,
    /// Flat triangle index list, three indices per triangle.
    pub indices: Vec<u32>,
}

impl TriangleMesh {
    /// Build a mesh, validating that it describes a triangle list.
    pub fn new(positions: Vec<Vec3>, normals: Vec<Vec3>, indices: Vec<u32>) -> Result<Self> {
        if normals.len() != positions.len() {
            return Err(IsmError::MeshAttributeMismatch {
                positions: positions.len(),
                normals: normals.len(),
            });
        }
        if indices.len() % 3 != 0 {
            return Err(IsmError::MeshIndexCount {
                count: indices.len(),
            });
        }
        if let Some(&index) = indices.iter().find(|&&i| i as usize >= positions.len()) {
            return Err(IsmError::MeshIndexOutOfBounds {
                index,
                vertices: positions.len(),
            });
        }
        Ok(Self {
            positions,
            normals,
            indices,
        })
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Rectangular room spanning `[0, width] x [0, depth] x [0, height]` with
    /// all faces pointing inward, the usual test and demo scene.
    pub fn shoebox(width: f64, depth: f64, height: f64) -> Self {
        let mut positions = Vec::with_capacity(24);
        let mut normals = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        let mut push_face = |corners: [Vec3; 4], normal: Vec3| {
            let base = positions.len() as u32;
            positions.extend_from_slice(&corners);
            normals.extend_from_slice(&[normal; 4]);
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        };

        let (w, d, h) = (width, depth, height);
        // Floor (z = 0) and ceiling (z = h)
        push_face(
            [
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(w, 0.0, 0.0),
                Vec3::new(w, d, 0.0),
                Vec3::new(0.0, d, 0.0),
            ],
            Vec3::new(0.0, 0.0, 1.0),
        );
        push_face(
            [
                Vec3::new(0.0, 0.0, h),
                Vec3::new(w, 0.0, h),
                Vec3::new(w, d, h),
                Vec3::new(0.0, d, h),
            ],
            Vec3::new(0.0, 0.0, -1.0),
        );
        // Side walls (x = 0, x = w)
        push_face(
            [
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(0.0, d, 0.0),
                Vec3::new(0.0, d, h),
                Vec3::new(0.0, 0.0, h),
            ],
            Vec3::new(1.0, 0.0, 0.0),
        );
        push_face(
            [
                Vec3::new(w, 0.0, 0.0),
                Vec3::new(w, d, 0.0),
                Vec3::new(w, d, h),
                Vec3::new(w, 0.0, h),
            ],
            Vec3::new(-1.0, 0.0, 0.0),
        );
        // Front and back walls (y = 0, y = d)
        push_face(
            [
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(w, 0.0, 0.0),
                Vec3::new(w, 0.0, h),
                Vec3::new(0.0, 0.0, h),
            ],
            Vec3::new(0.0, 1.0, 0.0),
        );
        push_face(
            [
                Vec3::new(0.0, d, 0.0),
                Vec3::new(w, d, 0.0),
                Vec3::new(w, d, h),
                Vec3::new(0.0, d, h),
            ],
            Vec3::new(0.0, -1.0, 0.0),
        );

        Self {
            positions,
            normals,
            indices,
        }
    }
}

/// One room-boundary instance: a mesh, its world transform, and the derived
/// mirror planes. Mutations raise a change flag that the aggregator consumes
/// on its next refresh.
#[derive(Clone, Debug)]
pub struct RoomBoundary {
    mesh: TriangleMesh,
    transform: Transform,
    planes: Vec<Plane>,
    changed: bool,
}

impl RoomBoundary {
    pub fn new(mesh: TriangleMesh, transform: Transform) -> Self {
        Self {
            mesh,
            transform,
            planes: Vec::new(),
            changed: true,
        }
    }

    pub fn mesh(&self) -> &TriangleMesh {
        &self.mesh
    }

    pub fn transform(&self) -> Transform {
        self.transform
    }

    /// Replace the world transform and flag the boundary as changed.
    pub fn set_transform(&mut self, transform: Transform) {
        self.transform = transform;
        self.changed = true;
    }

    /// Replace the mesh and flag the boundary as changed. The derived plane
    /// count may differ after the next extraction.
    pub fn set_mesh(&mut self, mesh: TriangleMesh) {
        self.mesh = mesh;
        self.changed = true;
    }

    /// Raise the change flag without mutating anything, for hosts whose
    /// geometry is modified in place.
    pub fn mark_changed(&mut self) {
        self.changed = true;
    }

    /// Whether the boundary changed since the aggregator last consumed it.
    pub fn has_changed(&self) -> bool {
        self.changed
    }

    fn clear_changed(&mut self) {
        self.changed = false;
    }

    /// The mirror planes derived by the last extraction.
    pub fn planes(&self) -> &[Plane] {
        &self.planes
    }

    /// Derive the deduplicated mirror planes from the current mesh and
    /// transform.
    ///
    /// Each triangle contributes its centroid and averaged vertex normal,
    /// mapped to world space (normals through the inverse-transpose so
    /// non-uniform scale is handled) and compared against every accepted
    /// plane so coplanar triangles collapse to one entry. Quadratic in the
    /// accepted plane count, which stays in the tens for room geometry.
    /// Zero-area triangles produce an undefined normal and are not guarded
    /// against.
    pub fn recalculate_mirror_planes(&mut self) {
        self.planes.clear();
        let normal_matrix = self.transform.normal_matrix();
        for triangle in self.mesh.indices.chunks_exact(3) {
            let [a, b, c] = [
                triangle[0] as usize,
                triangle[1] as usize,
                triangle[2] as usize,
            ];
            let centroid_local =
                (self.mesh.positions[a] + self.mesh.positions[b] + self.mesh.positions[c]) / 3.0;
            let normal_local =
                (self.mesh.normals[a] + self.mesh.normals[b] + self.mesh.normals[c]) / 3.0;
            let point = self.transform.transform_point(centroid_local);
            let normal = (normal_matrix * normal_local).normalized();
            let duplicate = self
                .planes
                .iter()
                .any(|plane| planes_equal(plane.point, plane.normal, point, normal));
            if !duplicate {
                self.planes.push(Plane::new(point, normal));
            }
        }
    }
}

/// Ordered concatenation of every boundary's mirror planes, with per-boundary
/// start offsets so a single changed boundary refreshes in place.
#[derive(Clone, Debug, Default)]
pub struct MirrorPlaneSet {
    points: Vec<Vec3>,
    normals: Vec<Vec3>,
    start: Vec<usize>,
}

impl MirrorPlaneSet {
    /// Extract every boundary and rebuild the global arrays from scratch.
    pub fn construct(&mut self, boundaries: &mut [RoomBoundary]) {
        self.points.clear();
        self.normals.clear();
        self.start.clear();
        for boundary in boundaries.iter_mut() {
            boundary.recalculate_mirror_planes();
            boundary.clear_changed();
            self.start.push(self.points.len());
            for plane in boundary.planes() {
                self.points.push(plane.point);
                self.normals.push(plane.normal);
            }
        }
    }

    /// Re-extract only the boundaries whose change flag is set, splicing
    /// their slice of the global arrays in place. The slice length may
    /// change (a mesh swap can alter the plane count), in which case the
    /// offsets of every following boundary are shifted. Returns whether any
    /// boundary needed refreshing so the owner can propagate a recompute.
    pub fn refresh(&mut self, boundaries: &mut [RoomBoundary]) -> bool {
        let mut refreshed = false;
        for i in 0..boundaries.len() {
            if !boundaries[i].has_changed() {
                continue;
            }
            boundaries[i].recalculate_mirror_planes();
            boundaries[i].clear_changed();
            let begin = self.start[i];
            let end = match self.start.get(i + 1) {
                Some(&next) => next,
                None => self.points.len(),
            };
            let fresh = boundaries[i].planes();
            self.points
                .splice(begin..end, fresh.iter().map(|plane| plane.point));
            self.normals
                .splice(begin..end, fresh.iter().map(|plane| plane.normal));
            let delta = fresh.len() as isize - (end - begin) as isize;
            if delta != 0 {
                for offset in self.start[i + 1..].iter_mut() {
                    *offset = (*offset as isize + delta) as usize;
                }
            }
            refreshed = true;
        }
        refreshed
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Plane locations, ordered per boundary then per traversal.
    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    /// Plane normals, parallel to [`MirrorPlaneSet::points`].
    pub fn normals(&self) -> &[Vec3] {
        &self.normals
    }

    /// Per-boundary start offsets into the global arrays.
    pub fn start_offsets(&self) -> &[usize] {
        &self.start
    }

    pub fn plane(&self, index: usize) -> Plane {
        Plane::new(self.points[index], self.normals[index])
    }

    pub fn iter(&self) -> impl Iterator<Item = Plane> + '_ {
        self.points
            .iter()
            .zip(self.normals.iter())
            .map(|(&point, &normal)| Plane::new(point, normal))
    }
}
