//! End-to-end simulation tests in a cubic room.
//!
//! The test acts as the host: it owns the room geometry and provides an
//! analytic ray caster for a convex room (from inside a convex boundary the
//! nearest positive plane intersection is the room surface).

use ism_reverb::{
    Plane, RayCaster, RayHit, RoomBoundary, Simulation, SimulationConfig, Transform, TriangleMesh,
    Vec3,
};

struct ConvexRoomCaster {
    planes: Vec<Plane>,
}

impl ConvexRoomCaster {
    fn from_simulation(simulation: &Simulation) -> Self {
        let planes = simulation
            .plane_centers()
            .iter()
            .zip(simulation.plane_normals())
            .map(|(&point, &normal)| Plane::new(point, normal))
            .collect();
        Self { planes }
    }
}

impl RayCaster for ConvexRoomCaster {
    fn cast(&self, origin: Vec3, direction: Vec3) -> Option<RayHit> {
        let mut nearest: Option<RayHit> = None;
        for plane in &self.planes {
            let denom = direction.dot(plane.normal);
            if denom.abs() < 1e-12 {
                continue;
            }
            let t = (plane.offset() - origin.dot(plane.normal)) / denom;
            if t <= 1e-6 {
                continue;
            }
            if nearest.as_ref().is_none_or(|hit| t < hit.distance) {
                nearest = Some(RayHit {
                    point: origin + direction * t,
                    normal: plane.normal,
                    distance: t,
                });
            }
        }
        nearest
    }
}

/// 2 m cube, source and listener straddling the center by 0.1 m along x.
fn cube_simulation(config: &SimulationConfig) -> (Simulation, usize) {
    let boundary = RoomBoundary::new(TriangleMesh::shoebox(2.0, 2.0, 2.0), Transform::IDENTITY);
    let mut simulation = Simulation::new(vec![boundary], config, Vec3::new(0.9, 1.0, 1.0));
    let source = simulation.add_source(Vec3::new(1.1, 1.0, 1.0));
    (simulation, source)
}

#[test]
fn test_cube_first_order_scenario() {
    let config = SimulationConfig {
        wall_absorption: 0.5,
        diffuse_proportion: 0.0,
        max_reflection_order: 1,
        ..SimulationConfig::default()
    };
    let (mut simulation, source) = cube_simulation(&config);
    let caster = ConvexRoomCaster::from_simulation(&simulation);

    assert!(simulation.recompute_required());
    assert!(simulation.update(&caster));
    assert!(!simulation.recompute_required());

    // 6 planes, 1 + 6 candidates, all of them visible in a convex room
    assert_eq!(simulation.plane_centers().len(), 6);
    assert_eq!(simulation.image_sources(source).unwrap().len(), 7);
    let paths = simulation.hit_paths(source).unwrap();
    assert_eq!(paths.iter().filter(|p| p.order() == 0).count(), 1);
    assert_eq!(paths.iter().filter(|p| p.order() == 1).count(), 6);

    let ir = simulation.impulse_response(source).unwrap();
    assert_eq!(ir.samples.len(), 48000);

    // Direct path: 0.2 m
    let direct_delay = (0.2_f64 / 343.0 * 48000.0).round() as usize;
    assert!((ir.samples[direct_delay] - 1.0).abs() < 1e-12);

    // Both x walls reflect over exactly 2.0 m, amplitude 0.5 each
    let x_delay = (2.0_f64 / 343.0 * 48000.0).round() as usize;
    assert!((ir.samples[x_delay] - 1.0).abs() < 1e-12);

    // The four remaining walls reflect over sqrt(0.2^2 + 2^2) m
    let other_length = (0.2_f64 * 0.2 + 4.0).sqrt();
    let other_delay = (other_length / 343.0 * 48000.0).round() as usize;
    assert!((ir.samples[other_delay] - 2.0).abs() < 1e-12);

    // Total energy: direct 1.0 plus six bounces at 0.5
    let total: f64 = ir.samples.iter().sum();
    assert!((total - 4.0).abs() < 1e-12);
}

#[test]
fn test_absorption_change_rescales_reflections() {
    let config = SimulationConfig {
        wall_absorption: 0.8,
        diffuse_proportion: 0.0,
        max_reflection_order: 1,
        ..SimulationConfig::default()
    };
    let (mut simulation, source) = cube_simulation(&config);
    let caster = ConvexRoomCaster::from_simulation(&simulation);
    simulation.update(&caster);
    let before = simulation.impulse_response(source).unwrap().samples.clone();

    simulation.params_mut().set_wall_absorption(0.5);
    assert!(simulation.recompute_required());
    assert!(simulation.update(&caster));
    let after = simulation.impulse_response(source).unwrap();

    // Reflected amplitudes scale by (1 - 0.5) / (1 - 0.8); the direct
    // sample is untouched
    let direct_delay = (0.2_f64 / 343.0 * 48000.0).round() as usize;
    let scale = 0.5 / 0.2;
    for (i, (&old, &new)) in before.iter().zip(&after.samples).enumerate() {
        if i == direct_delay {
            assert!((new - old).abs() < 1e-12);
        } else {
            assert!((new - old * scale).abs() < 1e-9);
        }
    }
}

#[test]
fn test_listener_move_keeps_image_sources() {
    let config = SimulationConfig {
        max_reflection_order: 1,
        ..SimulationConfig::default()
    };
    let (mut simulation, source) = cube_simulation(&config);
    let caster = ConvexRoomCaster::from_simulation(&simulation);
    simulation.update(&caster);

    let candidates_before: Vec<Vec3> = simulation
        .image_sources(source)
        .unwrap()
        .iter()
        .map(|s| s.position)
        .collect();

    simulation.set_listener_position(Vec3::new(0.5, 0.6, 0.7));
    assert!(simulation.recompute_required());
    assert!(simulation.update(&caster));

    // Image sources depend only on source and planes, so they are unchanged
    let candidates_after: Vec<Vec3> = simulation
        .image_sources(source)
        .unwrap()
        .iter()
        .map(|s| s.position)
        .collect();
    assert_eq!(candidates_before.len(), candidates_after.len());
    for (before, after) in candidates_before.iter().zip(&candidates_after) {
        assert_eq!(before, after);
    }

    // But the direct delay follows the new listener distance
    let distance = Vec3::new(0.5, 0.6, 0.7).distance_to(Vec3::new(1.1, 1.0, 1.0));
    let delay = (distance / 343.0 * 48000.0).round() as usize;
    let ir = simulation.impulse_response(source).unwrap();
    assert!(ir.samples[delay] >= 1.0);
}

#[test]
fn test_geometry_move_triggers_recompute() {
    let config = SimulationConfig {
        max_reflection_order: 1,
        ..SimulationConfig::default()
    };
    let (mut simulation, source) = cube_simulation(&config);
    let caster = ConvexRoomCaster::from_simulation(&simulation);
    simulation.update(&caster);
    assert!(!simulation.recompute_required());

    // Slide the whole room half a meter along x; listener and source stay
    // inside the moved volume
    let shift = Vec3::new(0.5, 0.0, 0.0);
    simulation.boundaries_mut()[0].set_transform(Transform::from_translation(shift));
    assert!(simulation.recompute_required());

    // The host's acceleration structure follows its geometry
    let moved_caster = ConvexRoomCaster {
        planes: caster
            .planes
            .iter()
            .map(|p| Plane::new(p.point + shift, p.normal))
            .collect(),
    };
    assert!(simulation.update(&moved_caster));
    assert!(!simulation.recompute_required());

    // Refreshed plane centers reflect the translation: the x = 0 wall's
    // centroid moved to x = 0.5
    let x_min = simulation
        .plane_centers()
        .iter()
        .map(|p| p.x)
        .fold(f64::INFINITY, f64::min);
    assert!((x_min - 0.5).abs() < 1e-9);

    // Direct path is unchanged, reflections shifted: the response still
    // contains the direct impulse
    let ir = simulation.impulse_response(source).unwrap();
    let direct_delay = (0.2_f64 / 343.0 * 48000.0).round() as usize;
    assert!(ir.samples[direct_delay] >= 1.0);
}
