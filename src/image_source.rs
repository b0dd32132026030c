//! Recursive image-source generation.
//!
//! A virtual source is obtained by mirroring the real source (or a previous
//! image) across a mirror plane; a chain of such mirrorings models one
//! specular reflection path. Candidates are generated exhaustively up to the
//! configured order and only culled later by ray-cast validation, so the
//! candidate count grows as `planes^order`.

use serde::Serialize;

use crate::math::{Vec3, direction_equal};
use crate::room::MirrorPlaneSet;

/// One candidate virtual source in the image-source arena.
///
/// `parent` is an arena index forming a tree rooted at the order-0 entry
/// (the real source), used to unfold a validated path back into real-space
/// reflection points. For the order-0 entry the plane fields are unused.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct ImageSource {
    /// Mirrored source position in world space.
    pub position: Vec3,
    /// Unit normal of the mirroring plane.
    pub plane_normal: Vec3,
    /// Signed distance of the mirroring plane from the origin along its
    /// normal, stored so visibility checks need not re-touch the plane set.
    pub plane_offset: f64,
    /// Number of reflections this source represents.
    pub order: u32,
    /// Arena index of the image source this one was mirrored from.
    pub parent: Option<usize>,
}

impl ImageSource {
    /// Whether a ray hit lies on this image source's mirroring plane.
    pub fn matches_hit(&self, hit_point: Vec3, hit_normal: Vec3) -> bool {
        direction_equal(hit_normal, self.plane_normal)
            && (hit_point.dot(self.plane_normal) - self.plane_offset).abs()
                < crate::math::EPSILON
    }
}

/// Mirror `source` recursively across every plane in the set, breadth first,
/// up to `max_order` reflections.
///
/// The arena starts with the order-0 real source; each order-`k` generation
/// mirrors every order-`k-1` entry across every plane. No deduplication is
/// performed across plane sequences, so the result holds exactly
/// `sum(planes^k for k in 0..=max_order)` entries.
pub fn generate_image_sources(
    source: Vec3,
    planes: &MirrorPlaneSet,
    max_order: u32,
) -> Vec<ImageSource> {
    let plane_count = planes.len();
    let mut capacity = 1usize;
    let mut level = 1usize;
    for _ in 0..max_order {
        level = level.saturating_mul(plane_count);
        capacity = capacity.saturating_add(level);
    }

    let mut arena = Vec::with_capacity(capacity);
    arena.push(ImageSource {
        position: source,
        plane_normal: Vec3::ZERO,
        plane_offset: 0.0,
        order: 0,
        parent: None,
    });

    let mut level_start = 0;
    for order in 1..=max_order {
        let level_end = arena.len();
        for parent in level_start..level_end {
            let parent_position = arena[parent].position;
            for index in 0..plane_count {
                let normal = planes.normals()[index];
                let offset = planes.points()[index].dot(normal);
                arena.push(ImageSource {
                    position: parent_position.mirror_across(normal, offset),
                    plane_normal: normal,
                    plane_offset: offset,
                    order,
                    parent: Some(parent),
                });
            }
        }
        level_start = level_end;
    }
    arena
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{Transform, position_equal};
    use crate::room::{MirrorPlaneSet, RoomBoundary, TriangleMesh};

    fn cube_planes() -> MirrorPlaneSet {
        let mut boundaries = vec![RoomBoundary::new(
            TriangleMesh::shoebox(2.0, 2.0, 2.0),
            Transform::IDENTITY,
        )];
        let mut set = MirrorPlaneSet::default();
        set.construct(&mut boundaries);
        set
    }

    #[test]
    fn test_candidate_count_grows_geometrically() {
        let planes = cube_planes();
        assert_eq!(planes.len(), 6);
        let source = Vec3::new(1.0, 1.0, 1.0);

        for max_order in 0..=3u32 {
            let arena = generate_image_sources(source, &planes, max_order);
            let expected: usize = (0..=max_order).map(|k| 6usize.pow(k)).sum();
            assert_eq!(arena.len(), expected);

            let top_order = arena.iter().filter(|s| s.order == max_order).count();
            assert_eq!(top_order, 6usize.pow(max_order));
        }
    }

    #[test]
    fn test_first_order_positions_for_cube() {
        let planes = cube_planes();
        let source = Vec3::new(0.5, 1.0, 1.5);
        let arena = generate_image_sources(source, &planes, 1);

        assert!(position_equal(arena[0].position, source));
        assert!(arena[0].parent.is_none());

        // Mirrors across x = 0 and x = 2 walls
        let expect_x0 = Vec3::new(-0.5, 1.0, 1.5);
        let expect_x2 = Vec3::new(3.5, 1.0, 1.5);
        let positions: Vec<Vec3> = arena[1..].iter().map(|s| s.position).collect();
        assert!(positions.iter().any(|&p| position_equal(p, expect_x0)));
        assert!(positions.iter().any(|&p| position_equal(p, expect_x2)));

        for image in &arena[1..] {
            assert_eq!(image.order, 1);
            assert_eq!(image.parent, Some(0));
            // The stored offset matches the plane the position was mirrored across
            let back = image
                .position
                .mirror_across(image.plane_normal, image.plane_offset);
            assert!(position_equal(back, source));
        }
    }

    #[test]
    fn test_parent_chain_walks_back_to_real_source() {
        let planes = cube_planes();
        let source = Vec3::new(1.0, 1.0, 1.0);
        let arena = generate_image_sources(source, &planes, 2);

        let second_order = arena.iter().rposition(|s| s.order == 2).expect("order 2");
        let mut index = second_order;
        let mut steps = 0;
        while let Some(parent) = arena[index].parent {
            assert_eq!(arena[parent].order, arena[index].order - 1);
            index = parent;
            steps += 1;
        }
        assert_eq!(steps, 2);
        assert!(position_equal(arena[index].position, source));
    }

    #[test]
    fn test_zero_planes_yields_only_real_source() {
        let set = MirrorPlaneSet::default();
        let arena = generate_image_sources(Vec3::ZERO, &set, 3);
        assert_eq!(arena.len(), 1);
        assert_eq!(arena[0].order, 0);
    }
}
