//! Shoebox room demo: simulate the impulse response of a rectangular room
//! and emit it as JSON.
//!
//! This binary plays the host role: it owns the scene geometry and provides
//! the ray-casting primitive (a Möller-Trumbore triangle-mesh caster over
//! the room boundary), then drives the simulation once and reports the
//! result.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::info;
use serde::Serialize;

use ism_reverb::{
    RayCaster, RayHit, RoomBoundary, Simulation, SimulationConfig, Transform, TriangleMesh, Vec3,
};

#[derive(Parser, Debug)]
#[command(
    name = "shoebox",
    about = "Simulate the early impulse response of a shoebox room with the Image Source Method"
)]
struct Args {
    /// Room width in meters (x axis)
    #[arg(long, default_value_t = 4.0)]
    width: f64,

    /// Room depth in meters (y axis)
    #[arg(long, default_value_t = 5.0)]
    depth: f64,

    /// Room height in meters (z axis)
    #[arg(long, default_value_t = 2.5)]
    height: f64,

    /// Source position as "x,y,z"
    #[arg(long, default_value = "1.0,1.0,1.2", value_parser = parse_vec3)]
    source: Vec3,

    /// Listener position as "x,y,z"
    #[arg(long, default_value = "3.0,3.5,1.2", value_parser = parse_vec3)]
    listener: Vec3,

    /// Wall absorption, 0 to 1
    #[arg(long, default_value_t = 0.8)]
    absorption: f64,

    /// Diffuse proportion, 0 to 1
    #[arg(long, default_value_t = 0.2)]
    diffuse: f64,

    /// Maximum reflection order
    #[arg(long, default_value_t = 2)]
    order: u32,

    /// Impulse response length in seconds
    #[arg(long, default_value_t = 1.0)]
    ir_length: f64,

    /// Output sample rate in Hz
    #[arg(long, default_value_t = 48000.0)]
    sample_rate: f64,

    /// Attenuate paths by air absorption
    #[arg(long)]
    air_absorption: bool,

    /// Write the JSON report here instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

fn parse_vec3(s: &str) -> Result<Vec3, String> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() != 3 {
        return Err(format!("expected \"x,y,z\", got \"{s}\""));
    }
    let mut coords = [0.0; 3];
    for (slot, part) in coords.iter_mut().zip(&parts) {
        *slot = part
            .trim()
            .parse::<f64>()
            .map_err(|e| format!("bad coordinate \"{part}\": {e}"))?;
    }
    Ok(Vec3::new(coords[0], coords[1], coords[2]))
}

/// World-space triangle soup caster: the ray-intersection primitive the
/// simulation consumes, baked from the boundary meshes once up front.
struct MeshRayCaster {
    triangles: Vec<([Vec3; 3], Vec3)>,
}

impl MeshRayCaster {
    const T_MIN: f64 = 1e-6;

    fn from_boundaries(boundaries: &[RoomBoundary]) -> Self {
        let mut triangles = Vec::new();
        for boundary in boundaries {
            let mesh = boundary.mesh();
            let transform = boundary.transform();
            let normal_matrix = transform.normal_matrix();
            for triangle in mesh.indices.chunks_exact(3) {
                let [a, b, c] = [
                    triangle[0] as usize,
                    triangle[1] as usize,
                    triangle[2] as usize,
                ];
                let corners = [
                    transform.transform_point(mesh.positions[a]),
                    transform.transform_point(mesh.positions[b]),
                    transform.transform_point(mesh.positions[c]),
                ];
                let normal_local = (mesh.normals[a] + mesh.normals[b] + mesh.normals[c]) / 3.0;
                let normal = (normal_matrix * normal_local).normalized();
                triangles.push((corners, normal));
            }
        }
        Self { triangles }
    }

    /// Möller-Trumbore ray/triangle intersection, no backface culling.
    fn intersect(corners: &[Vec3; 3], origin: Vec3, direction: Vec3) -> Option<f64> {
        let edge1 = corners[1] - corners[0];
        let edge2 = corners[2] - corners[0];
        let p = direction.cross(edge2);
        let det = edge1.dot(p);
        if det.abs() < 1e-12 {
            return None;
        }
        let inv_det = 1.0 / det;
        let to_origin = origin - corners[0];
        let u = to_origin.dot(p) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }
        let q = to_origin.cross(edge1);
        let v = direction.dot(q) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }
        let t = edge2.dot(q) * inv_det;
        (t > Self::T_MIN).then_some(t)
    }
}

impl RayCaster for MeshRayCaster {
    fn cast(&self, origin: Vec3, direction: Vec3) -> Option<RayHit> {
        let mut nearest: Option<RayHit> = None;
        for (corners, normal) in &self.triangles {
            if let Some(t) = Self::intersect(corners, origin, direction) {
                if nearest.as_ref().is_none_or(|hit| t < hit.distance) {
                    nearest = Some(RayHit {
                        point: origin + direction * t,
                        normal: *normal,
                        distance: t,
                    });
                }
            }
        }
        nearest
    }
}

#[derive(Serialize)]
struct IrReport {
    sample_rate: f64,
    duration: f64,
    peak_amplitude: f64,
    plane_count: usize,
    candidate_count: usize,
    path_count: usize,
    samples: Vec<f64>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if args.width <= 0.0 || args.depth <= 0.0 || args.height <= 0.0 {
        bail!("room dimensions must be positive");
    }

    let config = SimulationConfig {
        wall_absorption: args.absorption,
        diffuse_proportion: args.diffuse,
        max_reflection_order: args.order,
        ir_length_seconds: args.ir_length,
        sample_rate: args.sample_rate,
        air_absorption: args.air_absorption,
        ..SimulationConfig::default()
    };

    let mesh = TriangleMesh::shoebox(args.width, args.depth, args.height);
    let boundary = RoomBoundary::new(mesh, Transform::IDENTITY);
    let mut simulation = Simulation::new(vec![boundary], &config, args.listener);
    let source_id = simulation.add_source(args.source);

    let caster = MeshRayCaster::from_boundaries(simulation.boundaries());
    simulation.update(&caster);

    let ir = simulation.impulse_response(source_id)?;
    let report = IrReport {
        sample_rate: ir.sample_rate,
        duration: ir.duration(),
        peak_amplitude: ir.peak_amplitude(),
        plane_count: simulation.plane_centers().len(),
        candidate_count: simulation.image_sources(source_id)?.len(),
        path_count: simulation.hit_paths(source_id)?.len(),
        samples: ir.samples.clone(),
    };
    info!(
        "{} planes, {} candidates, {} validated paths, peak {:.4}",
        report.plane_count, report.candidate_count, report.path_count, report.peak_amplitude
    );

    let json = serde_json::to_string(&report).context("failed to serialize IR report")?;
    match &args.output {
        Some(path) => {
            fs::write(path, json)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!("wrote impulse response to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}
