//! Early room reverberation with the Image Source Method (ISM).
//!
//! Given room boundary meshes and a source/listener pair, this library:
//! - extracts and deduplicates infinite mirror planes from the boundary
//!   geometry, re-extracting only the instances that changed
//! - recursively mirrors the source across the plane set up to a configured
//!   reflection order, producing candidate image sources
//! - validates each candidate against the real geometry by ray casting,
//!   unfolding the mirrored path into real-space reflection points
//! - synthesizes a discrete impulse response from the validated paths
//!   (distance-based delay, per-reflection wall absorption, diffuse-energy
//!   split, optional air absorption)
//!
//! The host supplies geometry access and the ray-vs-mesh primitive (the
//! [`RayCaster`] trait); the resulting [`ImpulseResponse`] is intended for
//! convolution-based audio rendering. The whole pipeline is single-threaded
//! and recomputes on demand: nothing runs until geometry, the listener, a
//! source, or a parameter actually changes.

use log::debug;
use serde::{Deserialize, Serialize};

pub mod error;
pub mod image_source;
pub mod math;
pub mod response;
pub mod room;
pub mod trace;

pub use error::{IsmError, Result};
pub use image_source::{ImageSource, generate_image_sources};
pub use math::{EPSILON, Mat3, Plane, Transform, Vec3};
pub use response::{ImpulseResponse, air_absorption_coefficient, synthesize_impulse_response};
pub use room::{MirrorPlaneSet, RoomBoundary, TriangleMesh};
pub use trace::{HitPath, RayCaster, RayHit, validate_path, validate_paths};

use math::position_equal;

/// Smallest accepted impulse response length; shorter requests clamp here.
const MIN_IR_LENGTH_SECONDS: f64 = 1e-3;

// ============================================================================
// Configuration
// ============================================================================

/// Serializable simulation settings with the defaults the library ships.
///
/// Hosts typically deserialize this from JSON and convert it into
/// [`SimulationParameters`], which clamps every field into its documented
/// range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Proportion of energy absorbed per wall reflection, 0 to 1.
    #[serde(default = "default_wall_absorption")]
    pub wall_absorption: f64,
    /// Proportion of reflected energy scattered diffusely, 0 to 1.
    #[serde(default = "default_diffuse_proportion")]
    pub diffuse_proportion: f64,
    /// Maximum number of reflections simulated per path. Candidate count
    /// grows as `planes^order`, so this stays a small integer.
    #[serde(default = "default_max_reflection_order")]
    pub max_reflection_order: u32,
    /// Impulse response length in seconds.
    #[serde(default = "default_ir_length_seconds")]
    pub ir_length_seconds: f64,
    /// Output sample rate in Hz.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: f64,
    /// Speed of sound in m/s.
    #[serde(default = "default_speed_of_sound")]
    pub speed_of_sound: f64,
    /// Attenuate paths by air absorption over their traveled distance.
    #[serde(default)]
    pub air_absorption: bool,
    /// Air temperature in °C, used by air absorption.
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Relative humidity in percent, used by air absorption.
    #[serde(default = "default_humidity")]
    pub humidity: f64,
}

fn default_wall_absorption() -> f64 {
    0.8
}
fn default_diffuse_proportion() -> f64 {
    0.2
}
fn default_max_reflection_order() -> u32 {
    2
}
fn default_ir_length_seconds() -> f64 {
    1.0
}
fn default_sample_rate() -> f64 {
    48000.0
}
fn default_speed_of_sound() -> f64 {
    343.0
}
fn default_temperature() -> f64 {
    20.0
}
fn default_humidity() -> f64 {
    50.0
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            wall_absorption: default_wall_absorption(),
            diffuse_proportion: default_diffuse_proportion(),
            max_reflection_order: default_max_reflection_order(),
            ir_length_seconds: default_ir_length_seconds(),
            sample_rate: default_sample_rate(),
            speed_of_sound: default_speed_of_sound(),
            air_absorption: false,
            temperature: default_temperature(),
            humidity: default_humidity(),
        }
    }
}

// ============================================================================
// Runtime parameters
// ============================================================================

/// Live simulation parameters with change tracking.
///
/// Every setter clamps its value into the documented range and records
/// whether the clamped value differs from the old one; the owning update
/// cycle consumes the aggregate flag to decide whether a recompute is due.
#[derive(Debug, Clone)]
pub struct SimulationParameters {
    wall_absorption: f64,
    diffuse_proportion: f64,
    max_reflection_order: u32,
    ir_length_seconds: f64,
    sample_rate: f64,
    speed_of_sound: f64,
    air_absorption: bool,
    temperature: f64,
    humidity: f64,
    changed: bool,
}

impl SimulationParameters {
    /// Build runtime parameters from a config, clamping every field.
    pub fn from_config(config: &SimulationConfig) -> Self {
        Self {
            wall_absorption: config.wall_absorption.clamp(0.0, 1.0),
            diffuse_proportion: config.diffuse_proportion.clamp(0.0, 1.0),
            max_reflection_order: config.max_reflection_order,
            ir_length_seconds: config.ir_length_seconds.max(MIN_IR_LENGTH_SECONDS),
            sample_rate: config.sample_rate.max(1.0),
            speed_of_sound: config.speed_of_sound.max(1.0),
            air_absorption: config.air_absorption,
            temperature: config.temperature,
            humidity: config.humidity.clamp(0.0, 100.0),
            changed: false,
        }
    }

    pub fn wall_absorption(&self) -> f64 {
        self.wall_absorption
    }

    pub fn set_wall_absorption(&mut self, value: f64) {
        let value = value.clamp(0.0, 1.0);
        if value != self.wall_absorption {
            self.changed = true;
        }
        self.wall_absorption = value;
    }

    pub fn diffuse_proportion(&self) -> f64 {
        self.diffuse_proportion
    }

    pub fn set_diffuse_proportion(&mut self, value: f64) {
        let value = value.clamp(0.0, 1.0);
        if value != self.diffuse_proportion {
            self.changed = true;
        }
        self.diffuse_proportion = value;
    }

    pub fn max_reflection_order(&self) -> u32 {
        self.max_reflection_order
    }

    pub fn set_max_reflection_order(&mut self, value: u32) {
        if value != self.max_reflection_order {
            self.changed = true;
        }
        self.max_reflection_order = value;
    }

    pub fn ir_length_seconds(&self) -> f64 {
        self.ir_length_seconds
    }

    pub fn set_ir_length_seconds(&mut self, value: f64) {
        let value = value.max(MIN_IR_LENGTH_SECONDS);
        if value != self.ir_length_seconds {
            self.changed = true;
        }
        self.ir_length_seconds = value;
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn set_sample_rate(&mut self, value: f64) {
        let value = value.max(1.0);
        if value != self.sample_rate {
            self.changed = true;
        }
        self.sample_rate = value;
    }

    pub fn speed_of_sound(&self) -> f64 {
        self.speed_of_sound
    }

    pub fn set_speed_of_sound(&mut self, value: f64) {
        let value = value.max(1.0);
        if value != self.speed_of_sound {
            self.changed = true;
        }
        self.speed_of_sound = value;
    }

    pub fn air_absorption(&self) -> bool {
        self.air_absorption
    }

    pub fn set_air_absorption(&mut self, value: bool) {
        if value != self.air_absorption {
            self.changed = true;
        }
        self.air_absorption = value;
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn set_temperature(&mut self, value: f64) {
        if value != self.temperature {
            self.changed = true;
        }
        self.temperature = value;
    }

    pub fn humidity(&self) -> f64 {
        self.humidity
    }

    pub fn set_humidity(&mut self, value: f64) {
        let value = value.clamp(0.0, 100.0);
        if value != self.humidity {
            self.changed = true;
        }
        self.humidity = value;
    }

    /// Maximum traveled distance that still lands inside the impulse
    /// response buffer.
    pub fn max_ray_length(&self) -> f64 {
        self.ir_length_seconds * self.speed_of_sound
    }

    /// Whether any setter changed a value since the last consume.
    pub fn changed(&self) -> bool {
        self.changed
    }

    fn take_changed(&mut self) -> bool {
        let changed = self.changed;
        self.changed = false;
        changed
    }
}

impl Default for SimulationParameters {
    fn default() -> Self {
        Self::from_config(&SimulationConfig::default())
    }
}

// ============================================================================
// Simulation
// ============================================================================

/// Per-source simulation state.
#[derive(Debug)]
struct ReverbSource {
    position: Vec3,
    previous_position: Vec3,
    dirty: bool,
    image_sources: Vec<ImageSource>,
    hit_paths: Vec<HitPath>,
    impulse_response: ImpulseResponse,
}

/// The image-source simulation: room boundaries, the aggregated mirror-plane
/// set, simulation parameters, listener state, and one reverb state per
/// sound source.
///
/// Drive it by mutating geometry, positions, or parameters and then calling
/// [`Simulation::update`] once per logical step with the host's
/// [`RayCaster`]; the pipeline only recomputes when something changed.
#[derive(Debug)]
pub struct Simulation {
    boundaries: Vec<RoomBoundary>,
    plane_set: MirrorPlaneSet,
    params: SimulationParameters,
    listener_position: Vec3,
    previous_listener_position: Vec3,
    sources: Vec<ReverbSource>,
    update_requested: bool,
}

impl Simulation {
    /// Build a simulation over the given boundaries, extracting the mirror
    /// planes eagerly. The first [`Simulation::update`] computes everything.
    pub fn new(
        mut boundaries: Vec<RoomBoundary>,
        config: &SimulationConfig,
        listener_position: Vec3,
    ) -> Self {
        let mut plane_set = MirrorPlaneSet::default();
        plane_set.construct(&mut boundaries);
        debug!(
            "constructed mirror plane set: {} planes from {} boundaries",
            plane_set.len(),
            boundaries.len()
        );
        Self {
            boundaries,
            plane_set,
            params: SimulationParameters::from_config(config),
            listener_position,
            previous_listener_position: listener_position,
            sources: Vec::new(),
            update_requested: true,
        }
    }

    /// Register a sound source, returning its id for later lookups.
    pub fn add_source(&mut self, position: Vec3) -> usize {
        let sample_rate = self.params.sample_rate();
        self.sources.push(ReverbSource {
            position,
            previous_position: position,
            dirty: true,
            image_sources: Vec::new(),
            hit_paths: Vec::new(),
            impulse_response: ImpulseResponse::empty(sample_rate),
        });
        self.sources.len() - 1
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    pub fn listener_position(&self) -> Vec3 {
        self.listener_position
    }

    pub fn set_listener_position(&mut self, position: Vec3) {
        self.listener_position = position;
    }

    /// Whether the listener moved beyond tolerance since the last update.
    pub fn listener_has_moved(&self) -> bool {
        !position_equal(self.listener_position, self.previous_listener_position)
    }

    pub fn source_position(&self, id: usize) -> Result<Vec3> {
        self.source(id).map(|s| s.position)
    }

    pub fn set_source_position(&mut self, id: usize, position: Vec3) -> Result<()> {
        self.source_mut(id)?.position = position;
        Ok(())
    }

    pub fn params(&self) -> &SimulationParameters {
        &self.params
    }

    /// Mutable parameter access; setters record changes that the next
    /// update consumes.
    pub fn params_mut(&mut self) -> &mut SimulationParameters {
        &mut self.params
    }

    /// The room boundaries, for hosts that bake their ray-casting structures
    /// from the same geometry.
    pub fn boundaries(&self) -> &[RoomBoundary] {
        &self.boundaries
    }

    /// The room boundaries; mutate through this to move or swap geometry,
    /// which flags the touched boundary for re-extraction.
    pub fn boundaries_mut(&mut self) -> &mut [RoomBoundary] {
        &mut self.boundaries
    }

    pub fn boundary_count(&self) -> usize {
        self.boundaries.len()
    }

    /// Plane locations of the aggregated mirror-plane set, for debug
    /// visualization.
    pub fn plane_centers(&self) -> &[Vec3] {
        self.plane_set.points()
    }

    /// Plane normals of the aggregated mirror-plane set, parallel to
    /// [`Simulation::plane_centers`].
    pub fn plane_normals(&self) -> &[Vec3] {
        self.plane_set.normals()
    }

    /// Candidate image sources from the last update of the given source.
    pub fn image_sources(&self, id: usize) -> Result<&[ImageSource]> {
        self.source(id).map(|s| s.image_sources.as_slice())
    }

    /// Validated reflection paths from the last update of the given source.
    pub fn hit_paths(&self, id: usize) -> Result<&[HitPath]> {
        self.source(id).map(|s| s.hit_paths.as_slice())
    }

    /// Impulse response from the last update of the given source.
    pub fn impulse_response(&self, id: usize) -> Result<&ImpulseResponse> {
        self.source(id).map(|s| &s.impulse_response)
    }

    /// Whether the next [`Simulation::update`] has work to do: geometry
    /// dirty, parameters changed, listener or a source moved, or a source
    /// never simulated. Consumed (cleared) by the update itself.
    pub fn recompute_required(&self) -> bool {
        self.update_requested
            || self.params.changed()
            || self.boundaries.iter().any(|b| b.has_changed())
            || self.listener_has_moved()
            || self.sources.iter().any(|s| {
                s.dirty || !position_equal(s.position, s.previous_position)
            })
    }

    /// Run one synchronous simulation step: refresh changed geometry, then
    /// for each source that needs it regenerate image sources, re-validate
    /// paths, and re-synthesize the impulse response. Image sources are
    /// kept when only the listener moved, since they do not depend on it.
    /// Returns whether any impulse response was recomputed.
    pub fn update<C: RayCaster>(&mut self, caster: &C) -> bool {
        let planes_changed = self.plane_set.refresh(&mut self.boundaries);
        if planes_changed {
            debug!("mirror planes refreshed: {} planes", self.plane_set.len());
        }
        let params_changed = self.params.take_changed();
        let listener_moved = self.listener_has_moved();
        let force = self.update_requested || planes_changed || params_changed;

        let mut recomputed = false;
        for (id, source) in self.sources.iter_mut().enumerate() {
            let source_moved =
                source.dirty || !position_equal(source.position, source.previous_position);
            if !(force || listener_moved || source_moved) {
                continue;
            }
            if force || source_moved {
                source.image_sources = generate_image_sources(
                    source.position,
                    &self.plane_set,
                    self.params.max_reflection_order(),
                );
            }
            source.hit_paths =
                validate_paths(self.listener_position, &source.image_sources, caster);
            source.impulse_response = synthesize_impulse_response(
                self.listener_position,
                source.position,
                &source.hit_paths,
                &self.params,
            );
            debug!(
                "source {id}: {} candidates, {} validated paths, peak {:.4}",
                source.image_sources.len(),
                source.hit_paths.len(),
                source.impulse_response.peak_amplitude()
            );
            source.previous_position = source.position;
            source.dirty = false;
            recomputed = true;
        }

        self.previous_listener_position = self.listener_position;
        self.update_requested = false;
        recomputed
    }

    fn source(&self, id: usize) -> Result<&ReverbSource> {
        self.sources.get(id).ok_or(IsmError::UnknownSource { id })
    }

    fn source_mut(&mut self, id: usize) -> Result<&mut ReverbSource> {
        self.sources
            .get_mut(id)
            .ok_or(IsmError::UnknownSource { id })
    }
}
