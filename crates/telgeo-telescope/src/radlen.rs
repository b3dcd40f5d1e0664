//! Radiation-length integration along a straight segment.
//!
//! The integrator walks a [`Navigator`] from `start` towards `finish`,
//! boundary by boundary, and sums `step / X0` over the traversed media.
//! Geometry lengths are in mm, radiation lengths in cm, so every
//! contribution carries the factor [`MM_TO_CM`].
//!
//! Steps shorter than [`SMALL_STEP`] happen when the track sits on a
//! boundary the navigator cannot resolve.  They are handled by nudging the
//! point forward by [`NUDGE`] and relocating; more than
//! [`MAX_SMALL_STEPS`] in a row abandon the walk with the partial sum.
//!
//! A boundary crossing moves the navigator [`BOUNDARY_PUSH`] past the hit.
//! The push is taken off the remaining distance but carries no material.

use telgeo_geometry::navigator::BOUNDARY_PUSH;
use telgeo_geometry::{GeoModel, Navigator, Vec3};
use telgeo_types::GeoError;
use tracing::{debug, warn};

pub const MM_TO_CM: f64 = 0.1;

/// Remaining distance (mm) below which the walk is complete.
pub const MIN_SEGMENT: f64 = 1e-9;

/// Steps (mm) shorter than this are degenerate.
pub const SMALL_STEP: f64 = 1e-8;

/// Forward nudge (mm) after a degenerate step.
pub const NUDGE: f64 = 1e-7;

pub const MAX_SMALL_STEPS: u32 = 3;

/// Media with a radiation length (cm) outside this open range contribute
/// nothing.
const RADLEN_RANGE: (f64, f64) = (1e-9, 1e10);

/// Why a walk stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The whole segment was traversed.
    Reached,
    /// The track left the world before reaching `finish`.
    LeftWorld,
    /// Too many consecutive degenerate steps.
    DegenerateSteps,
    /// The current volume has no resolvable medium.
    NoMedium,
    /// `start` lies outside the world.
    StartOutside,
    /// `start` and `finish` coincide.
    ZeroLength,
}

/// Outcome of one walk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Integration {
    /// Accumulated radiation length (X0).
    pub radiation_lengths: f64,
    /// Path length walked (mm), including boundary pushes and nudges.
    pub length: f64,
    /// Number of regular steps.
    pub steps: usize,
    pub termination: Termination,
}

impl Integration {
    fn empty(termination: Termination) -> Self {
        Self {
            radiation_lengths: 0.0,
            length: 0.0,
            steps: 0,
            termination,
        }
    }
}

/// Radiation-length walker over a closed model.
#[derive(Debug, Clone)]
pub struct RadLengthIntegrator<'a> {
    navigator: Navigator<'a>,
}

impl<'a> RadLengthIntegrator<'a> {
    pub fn new(model: &'a GeoModel) -> Result<Self, GeoError> {
        Ok(Self {
            navigator: Navigator::new(model)?,
        })
    }

    /// Radiation length (X0) between two global points (mm).
    ///
    /// With `skip_boundary_volumes`, volumes containing `start` or `finish`
    /// contribute nothing.
    pub fn integrate(&self, start: Vec3, finish: Vec3, skip_boundary_volumes: bool) -> f64 {
        self.trace(start, finish, skip_boundary_volumes).radiation_lengths
    }

    /// Like [`integrate`][Self::integrate], with step statistics and the
    /// reason the walk ended.
    pub fn trace(&self, start: Vec3, finish: Vec3, skip_boundary_volumes: bool) -> Integration {
        let segment = finish.sub(start);
        let total = segment.norm();
        if total < MIN_SEGMENT {
            return Integration::empty(Termination::ZeroLength);
        }
        let direction = segment.scale(1.0 / total);
        debug!(?start, ?finish, ?direction, "radiation length walk");

        let mut nav = self.navigator.clone();
        if nav.init_track(start, direction).is_none() {
            debug!(?start, "walk starts outside the world");
            return Integration::empty(Termination::StartOutside);
        }

        let mut out = Integration::empty(Termination::Reached);
        let mut remaining = total;
        let mut last_rad = 0.0;
        let mut small_steps = 0;

        loop {
            let is_boundary = nav.is_same_location(start) || nav.is_same_location(finish);
            let counts = !(skip_boundary_volumes && is_boundary);

            let Some(medium) = nav.current_medium() else {
                out.termination = Termination::NoMedium;
                return out;
            };
            if remaining <= MIN_SEGMENT {
                out.termination = Termination::Reached;
                return out;
            }

            let next = nav.find_next_boundary_and_step(remaining);
            let step = nav.step();
            let crossed = step < remaining;

            if step < SMALL_STEP {
                small_steps += 1;
                if small_steps > MAX_SMALL_STEPS {
                    warn!(path = %nav.path_name(), "too many small steps, integration abandoned");
                    out.termination = Termination::DegenerateSteps;
                    return out;
                }
                let pt = nav.current_point().add(nav.current_direction().scale(NUDGE));
                out.length += NUDGE;
                if counts {
                    out.radiation_lengths += last_rad * NUDGE;
                }
                nav.cd_top();
                if nav.find_node(pt).is_none() {
                    out.termination = Termination::LeftWorld;
                    return out;
                }
                let local = nav.master_to_local(pt);
                if !nav.current_volume().shape.contains(local) {
                    nav.cd_up();
                }
                continue;
            }
            small_steps = 0;

            out.steps += 1;
            out.length += step;
            remaining -= step;
            if crossed {
                out.length += BOUNDARY_PUSH;
                remaining -= BOUNDARY_PUSH;
            }
            let radlen = medium.radiation_length();
            if radlen > RADLEN_RANGE.0 && radlen < RADLEN_RANGE.1 {
                last_rad = MM_TO_CM / radlen;
                if counts {
                    out.radiation_lengths += last_rad * step;
                }
            } else {
                last_rad = 0.0;
            }
            debug!(
                step_no = out.steps,
                step,
                length = out.length,
                x0 = step * MM_TO_CM / radlen,
                medium = %medium.name,
                density = medium.material.density,
                radlen,
                boundary = is_boundary,
                "radiation length step"
            );

            if next.is_none() {
                out.termination = Termination::LeftWorld;
                return out;
            }
        }
    }
}
