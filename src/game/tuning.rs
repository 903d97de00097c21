//! Gameplay tunables and the live-edit handle
//!
//! The simulation owns a `Tuning` by value. Debug tooling edits a shared
//! `TuningHandle`; the session copies it into the simulation between ticks.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Player movement and inhale parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tuning {
    /// Jump impulse (negative = up)
    pub jump_vel: f32,
    /// Ticks a held jump keeps boosting the rise
    pub jump_hold_ticks: u32,
    /// Fraction of `jump_vel` added per held tick
    pub jump_hold_boost: f32,
    pub gravity_rise: f32,
    pub gravity_fall: f32,
    pub walk_speed: f32,
    pub max_fall: f32,

    // Float / flap
    pub float_gravity: f32,
    pub float_max_fall: f32,
    pub float_flap_vel: f32,
    pub max_float_flaps: u8,

    // Inhale
    /// Forward reach of the inhale zone (px)
    pub inhale_range: f32,
    /// Height of the inhale zone (px)
    pub inhale_height: f32,
    /// Speed at which a caught enemy is pulled (px/tick)
    pub inhale_pull_speed: f32,
    /// Distance on both axes under which a pulled enemy is captured
    pub capture_radius: f32,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            jump_vel: -9.0,
            jump_hold_ticks: 10,
            jump_hold_boost: 0.03,
            gravity_rise: 0.28,
            gravity_fall: 0.40,
            walk_speed: 2.4,
            max_fall: 12.0,
            float_gravity: 0.04,
            float_max_fall: 1.0,
            float_flap_vel: -3.2,
            max_float_flaps: 6,
            inhale_range: 96.0,
            inhale_height: 44.0,
            inhale_pull_speed: 5.0,
            capture_radius: 14.0,
        }
    }
}

/// Partial update accepted by the debug surface. Absent fields are unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TuningPatch {
    pub jump_vel: Option<f32>,
    pub jump_hold_ticks: Option<u32>,
    pub jump_hold_boost: Option<f32>,
    pub gravity_rise: Option<f32>,
    pub gravity_fall: Option<f32>,
    pub walk_speed: Option<f32>,
    pub max_fall: Option<f32>,
    pub float_gravity: Option<f32>,
    pub float_max_fall: Option<f32>,
    pub float_flap_vel: Option<f32>,
    pub max_float_flaps: Option<u8>,
    pub inhale_range: Option<f32>,
    pub inhale_height: Option<f32>,
    pub inhale_pull_speed: Option<f32>,
    pub capture_radius: Option<f32>,
}

/// Tuning validation errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TuningError {
    #[error("{field} must be finite")]
    NotFinite { field: &'static str },

    #[error("{field} out of range: {value}")]
    OutOfRange { field: &'static str, value: f32 },
}

impl Tuning {
    /// Apply a patch, returning the new value without touching `self` on error
    pub fn patched(&self, patch: &TuningPatch) -> Result<Tuning, TuningError> {
        let mut next = *self;
        macro_rules! take {
            ($field:ident) => {
                if let Some(v) = patch.$field {
                    next.$field = v;
                }
            };
        }
        take!(jump_vel);
        take!(jump_hold_ticks);
        take!(jump_hold_boost);
        take!(gravity_rise);
        take!(gravity_fall);
        take!(walk_speed);
        take!(max_fall);
        take!(float_gravity);
        take!(float_max_fall);
        take!(float_flap_vel);
        take!(max_float_flaps);
        take!(inhale_range);
        take!(inhale_height);
        take!(inhale_pull_speed);
        take!(capture_radius);
        next.validate()?;
        Ok(next)
    }

    /// Reject values the resolver cannot handle
    pub fn validate(&self) -> Result<(), TuningError> {
        let checks: [(&'static str, f32, f32, f32); 13] = [
            ("jump_vel", self.jump_vel, -31.0, 0.0),
            ("jump_hold_boost", self.jump_hold_boost, 0.0, 1.0),
            ("gravity_rise", self.gravity_rise, 0.0, 4.0),
            ("gravity_fall", self.gravity_fall, 0.0, 4.0),
            ("walk_speed", self.walk_speed, 0.0, 16.0),
            // fall speed must stay under one tile per tick
            ("max_fall", self.max_fall, 0.0, 31.0),
            ("float_gravity", self.float_gravity, 0.0, 4.0),
            ("float_max_fall", self.float_max_fall, 0.0, 31.0),
            ("float_flap_vel", self.float_flap_vel, -31.0, 0.0),
            ("inhale_range", self.inhale_range, 0.0, 512.0),
            ("inhale_height", self.inhale_height, 0.0, 512.0),
            ("inhale_pull_speed", self.inhale_pull_speed, 0.0, 31.0),
            ("capture_radius", self.capture_radius, 0.0, 128.0),
        ];
        for (field, value, min, max) in checks {
            if !value.is_finite() {
                return Err(TuningError::NotFinite { field });
            }
            if value < min || value > max {
                return Err(TuningError::OutOfRange { field, value });
            }
        }
        if self.max_float_flaps > 32 {
            return Err(TuningError::OutOfRange {
                field: "max_float_flaps",
                value: self.max_float_flaps as f32,
            });
        }
        Ok(())
    }
}

/// Shared, lockable tuning value for the debug surface
#[derive(Clone, Default)]
pub struct TuningHandle {
    inner: Arc<RwLock<Tuning>>,
}

impl TuningHandle {
    pub fn new(tuning: Tuning) -> Self {
        Self {
            inner: Arc::new(RwLock::new(tuning)),
        }
    }

    /// Copy of the current value
    pub fn get(&self) -> Tuning {
        *self.inner.read()
    }

    /// Validate and apply a patch; returns the new value
    pub fn apply(&self, patch: &TuningPatch) -> Result<Tuning, TuningError> {
        let mut guard = self.inner.write();
        let next = guard.patched(patch)?;
        *guard = next;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(Tuning::default().validate(), Ok(()));
    }

    #[test]
    fn patch_changes_only_named_fields() {
        let handle = TuningHandle::default();
        let patch = TuningPatch {
            walk_speed: Some(3.0),
            ..Default::default()
        };
        let next = handle.apply(&patch).unwrap();
        assert_eq!(next.walk_speed, 3.0);
        assert_eq!(next.jump_vel, Tuning::default().jump_vel);
        assert_eq!(handle.get(), next);
    }

    #[test]
    fn invalid_patch_leaves_handle_untouched() {
        let handle = TuningHandle::default();
        let patch = TuningPatch {
            max_fall: Some(64.0),
            gravity_fall: Some(1.0),
            ..Default::default()
        };
        assert!(matches!(
            handle.apply(&patch),
            Err(TuningError::OutOfRange { field: "max_fall", .. })
        ));
        assert_eq!(handle.get(), Tuning::default());
    }

    #[test]
    fn nan_is_rejected() {
        let patch = TuningPatch {
            gravity_rise: Some(f32::NAN),
            ..Default::default()
        };
        assert_eq!(
            Tuning::default().patched(&patch),
            Err(TuningError::NotFinite { field: "gravity_rise" })
        );
    }
}
