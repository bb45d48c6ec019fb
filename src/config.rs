//! World configuration and per-step timing data.

use glam::Vec2;

use crate::error::{PhysicsError, PhysicsResult};

/// Maximum number of contact points between two convex shapes.
pub const MAX_MANIFOLD_POINTS: usize = 2;

/// Maximum number of vertices on a convex polygon.
pub const MAX_POLYGON_VERTICES: usize = 8;

/// Collision and constraint tolerance used by shape construction.
pub const LINEAR_SLOP: f32 = 0.005;

/// Angular collision tolerance (2 degrees).
pub const ANGULAR_SLOP: f32 = 2.0 / 180.0 * std::f32::consts::PI;

/// Skin radius around polygons, keeping them slightly apart for GJK.
pub const POLYGON_RADIUS: f32 = 2.0 * LINEAR_SLOP;

/// Configuration for the physics simulation.
///
/// Every tunable the solver, broadphase and sleep logic read lives here and is
/// passed into [`World::new`](crate::World::new).
#[derive(Debug, Clone)]
pub struct WorldConfig {
    /// Gravity vector. Default: (0, -10).
    pub gravity: Vec2,
    /// Velocity iterations used by [`World::advance`](crate::World::advance). Default: 8.
    pub velocity_iterations: u32,
    /// Position iterations used by [`World::advance`](crate::World::advance). Default: 3.
    pub position_iterations: u32,
    /// Fixed timestep for [`World::advance`](crate::World::advance) in seconds. Default: 1/60.
    pub fixed_timestep: f64,
    /// Maximum number of fixed steps per `advance` call. Default: 4.
    pub max_substeps: u32,
    /// Carry accumulated impulses from the previous step. Default: true.
    pub warm_starting: bool,
    /// Run the time-of-impact sweep after the discrete solve. Default: true.
    pub continuous_physics: bool,
    /// Stop after the first TOI event each step (debugging aid). Default: false.
    pub sub_stepping: bool,
    /// Solve two-point manifolds as a block LCP. Default: true.
    pub block_solve: bool,
    /// Let islands fall asleep. Default: true.
    pub allow_sleep: bool,
    /// Clear applied forces after every step. Default: true.
    pub auto_clear_forces: bool,
    /// Allowed penetration. Default: [`LINEAR_SLOP`].
    pub linear_slop: f32,
    /// Allowed angular error for joint limits. Default: [`ANGULAR_SLOP`].
    pub angular_slop: f32,
    /// Fixed fattening margin added to every proxy AABB. Default: 0.1.
    pub aabb_extension: f32,
    /// Scale of the displacement-based predictive AABB extension. Default: 4.
    pub aabb_multiplier: f32,
    /// Relative normal speed above which restitution applies. Default: 1.
    pub velocity_threshold: f32,
    /// Largest linear position correction per contact per iteration. Default: 0.2.
    pub max_linear_correction: f32,
    /// Largest angular position correction for joints. Default: 8 degrees.
    pub max_angular_correction: f32,
    /// Fraction of penetration removed per position iteration. Default: 0.2.
    pub baumgarte: f32,
    /// Position correction factor for TOI sub-steps. Default: 0.75.
    pub toi_baumgarte: f32,
    /// Stiffness of the soft contact velocity bias in Hz; 0 disables it. Default: 0.
    pub contact_hertz: f32,
    /// Damping ratio of the soft contact velocity bias. Default: 10.
    pub contact_damping_ratio: f32,
    /// Largest separation speed the soft contact bias may request. Default: 3.
    pub contact_push_velocity: f32,
    /// Maximum linear motion of a body per step. Default: 2.
    pub max_translation: f32,
    /// Maximum rotation of a body per step. Default: pi/2.
    pub max_rotation: f32,
    /// Time a body must be still before it sleeps, in seconds. Default: 0.5.
    pub time_to_sleep: f32,
    /// Linear speed below which a body counts as still. Default: 0.01.
    pub linear_sleep_tolerance: f32,
    /// Angular speed below which a body counts as still. Default: 2 degrees/s.
    pub angular_sleep_tolerance: f32,
    /// TOI sub-steps per body per step. Default: 8.
    pub max_toi_sub_steps: u32,
    /// Contacts gathered into one TOI mini-island. Default: 32.
    pub max_toi_contacts: usize,
    /// GJK iteration cap for the distance queries inside time of impact.
    /// Sensor overlap tests keep
    /// [`DEFAULT_GJK_ITERATIONS`](crate::collision::distance::DEFAULT_GJK_ITERATIONS).
    /// Default: 20.
    pub max_gjk_iterations: u32,
    /// TOI root-finder iteration cap. Default: 20.
    pub max_toi_iterations: u32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            gravity: Vec2::new(0.0, -10.0),
            velocity_iterations: 8,
            position_iterations: 3,
            fixed_timestep: 1.0 / 60.0,
            max_substeps: 4,
            warm_starting: true,
            continuous_physics: true,
            sub_stepping: false,
            block_solve: true,
            allow_sleep: true,
            auto_clear_forces: true,
            linear_slop: LINEAR_SLOP,
            angular_slop: ANGULAR_SLOP,
            aabb_extension: 0.1,
            aabb_multiplier: 4.0,
            velocity_threshold: 1.0,
            max_linear_correction: 0.2,
            max_angular_correction: 8.0 / 180.0 * std::f32::consts::PI,
            baumgarte: 0.2,
            toi_baumgarte: 0.75,
            contact_hertz: 0.0,
            contact_damping_ratio: 10.0,
            contact_push_velocity: 3.0,
            max_translation: 2.0,
            max_rotation: 0.5 * std::f32::consts::PI,
            time_to_sleep: 0.5,
            linear_sleep_tolerance: 0.01,
            angular_sleep_tolerance: 2.0 / 180.0 * std::f32::consts::PI,
            max_toi_sub_steps: 8,
            max_toi_contacts: 32,
            max_gjk_iterations: 20,
            max_toi_iterations: 20,
        }
    }
}

impl WorldConfig {
    /// Check that every field is in range.
    pub fn validate(&self) -> PhysicsResult<()> {
        if !self.gravity.is_finite() {
            return Err(PhysicsError::InvalidConfig {
                reason: "gravity must be finite",
            });
        }
        if self.fixed_timestep <= 0.0 {
            return Err(PhysicsError::InvalidConfig {
                reason: "fixed_timestep must be positive",
            });
        }
        if self.velocity_iterations == 0 {
            return Err(PhysicsError::InvalidConfig {
                reason: "velocity_iterations must be at least 1",
            });
        }
        if self.linear_slop <= 0.0 || self.aabb_extension < 0.0 || self.aabb_multiplier < 0.0 {
            return Err(PhysicsError::InvalidConfig {
                reason: "tolerances must be non-negative",
            });
        }
        if self.max_gjk_iterations == 0 || self.max_toi_iterations == 0 {
            return Err(PhysicsError::InvalidConfig {
                reason: "iteration caps must be at least 1",
            });
        }
        if self.contact_hertz < 0.0 {
            return Err(PhysicsError::InvalidConfig {
                reason: "contact_hertz must be non-negative",
            });
        }
        Ok(())
    }
}

/// Timing data for one solver pass.
#[derive(Debug, Clone, Copy)]
pub struct TimeStep {
    pub dt: f32,
    pub inv_dt: f32,
    /// `dt * inv_dt0`, scales warm-start impulses when the step size changes.
    pub dt_ratio: f32,
    pub velocity_iterations: u32,
    pub position_iterations: u32,
    pub warm_starting: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_world_config_default() {
        let config = WorldConfig::default();
        assert_eq!(config.gravity, Vec2::new(0.0, -10.0));
        assert!((config.fixed_timestep - 1.0 / 60.0).abs() < 1e-10);
        assert_eq!(config.velocity_iterations, 8);
        assert_eq!(config.position_iterations, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_world_config_rejects_bad_values() {
        let config = WorldConfig {
            fixed_timestep: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = WorldConfig {
            velocity_iterations: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
