//! Reflection-path validation by ray casting.
//!
//! A candidate image source is only an algebraic mirror position; whether it
//! corresponds to a real reflection depends on the actual room geometry. The
//! validator unfolds the mirrored path back into real-space segments: it
//! casts from the listener toward the candidate, requires the nearest hit to
//! lie on the candidate's mirroring plane, then continues from that hit
//! toward the candidate's parent, down to the real source. Most candidates
//! fail here, which is expected pruning rather than an error.

use serde::Serialize;

use crate::image_source::ImageSource;
use crate::math::{EPSILON, Vec3};

/// Nearest intersection reported by the host's ray-casting primitive.
#[derive(Clone, Copy, Debug)]
pub struct RayHit {
    /// World-space intersection point.
    pub point: Vec3,
    /// Surface normal at the intersection.
    pub normal: Vec3,
    /// Distance from the ray origin to the intersection.
    pub distance: f64,
}

/// The ray-vs-geometry primitive, provided by the hosting geometry system.
///
/// `cast` returns the nearest intersection along `direction` (unit length)
/// from `origin`, or `None` when the ray escapes the scene. Implementations
/// must not report hits at effectively zero distance, so that a ray leaving
/// a surface does not immediately re-hit it.
pub trait RayCaster {
    fn cast(&self, origin: Vec3, direction: Vec3) -> Option<RayHit>;
}

/// One validated reflection path: the world-space reflection points ordered
/// from the listener side to the source side. Empty for a direct,
/// unobstructed line of sight.
#[derive(Clone, Debug, Default, Serialize)]
pub struct HitPath {
    pub points: Vec<Vec3>,
}

impl HitPath {
    /// Number of wall bounces on this path.
    pub fn order(&self) -> u32 {
        self.points.len() as u32
    }

    /// Total traveled distance listener -> reflections -> source.
    pub fn total_length(&self, listener: Vec3, source: Vec3) -> f64 {
        match self.points.first() {
            None => listener.distance_to(source),
            Some(&first) => {
                let mut length = listener.distance_to(first);
                for pair in self.points.windows(2) {
                    length += pair[0].distance_to(pair[1]);
                }
                length += self.points[self.points.len() - 1].distance_to(source);
                length
            }
        }
    }
}

/// Validate a single candidate, returning its unfolded reflection path or
/// `None` when the candidate does not correspond to a real reflection.
///
/// Walking the parent chain: at each level a ray is cast from the current
/// origin toward the current image source. A hit must lie on that image
/// source's mirroring plane and becomes the next origin; at the terminal
/// order-0 level the segment to the real source must instead be unoccluded
/// (no hit, or the nearest hit no closer than the source itself).
pub fn validate_path<C: RayCaster>(
    listener: Vec3,
    arena: &[ImageSource],
    candidate: usize,
    caster: &C,
) -> Option<HitPath> {
    let mut points = Vec::with_capacity(arena[candidate].order as usize);
    let mut origin = listener;
    let mut current = candidate;

    loop {
        let image = &arena[current];
        let to_target = image.position - origin;
        let distance = to_target.length();
        if distance < EPSILON {
            // Origin coincides with the target; only meaningful for a
            // listener sitting on the source.
            return if image.order == 0 {
                Some(HitPath { points })
            } else {
                None
            };
        }
        let direction = to_target / distance;

        let hit = caster.cast(origin, direction);
        if image.order == 0 {
            return match hit {
                Some(hit) if hit.distance < distance - EPSILON => None,
                _ => Some(HitPath { points }),
            };
        }

        let hit = hit?;
        if hit.distance >= distance {
            // No surface between here and the mirror position, so the
            // reflection this level promised does not exist.
            return None;
        }
        if !image.matches_hit(hit.point, hit.normal) {
            return None;
        }
        points.push(hit.point);
        origin = hit.point;
        let Some(parent) = image.parent else {
            return None;
        };
        current = parent;
    }
}

/// Validate every candidate in the arena against the room geometry.
pub fn validate_paths<C: RayCaster>(
    listener: Vec3,
    arena: &[ImageSource],
    caster: &C,
) -> Vec<HitPath> {
    (0..arena.len())
        .filter_map(|candidate| validate_path(listener, arena, candidate, caster))
        .collect()
}
