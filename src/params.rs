//! Gear parameters and the scalars derived from them.

use crate::errors::{GearError, Result};
use crate::float_types::{FRAC_PI_2, PI, Real, TAU};
use crate::pipeline::BuildStage;

/// Pressure angle of the generated tooth form, in degrees.
pub const PRESSURE_ANGLE_DEG: Real = 20.0;
/// Smallest accepted module.
pub const MIN_MODULE: Real = 0.1;
/// Largest accepted module.
pub const MAX_MODULE: Real = 100.0;
/// Smallest accepted tooth count.
pub const MIN_TEETH: u32 = 2;
/// Largest accepted tooth count.
pub const MAX_TEETH: u32 = 256;

/// The four user-facing inputs of a build.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GearParameters {
    /// Pitch diameter divided by tooth count.
    pub module: Real,
    pub teeth: u32,
    /// Axial height of the solid.
    pub height: Real,
    /// Radius of the through-bore.
    pub inner_radius: Real,
}

impl Default for GearParameters {
    fn default() -> Self {
        Self {
            module: 1.0,
            teeth: 18,
            height: 1.0,
            inner_radius: 1.0,
        }
    }
}

impl GearParameters {
    pub const fn new(module: Real, teeth: u32, height: Real, inner_radius: Real) -> Self {
        Self {
            module,
            teeth,
            height,
            inner_radius,
        }
    }

    /// Check every constraint and return the derived scalars.
    ///
    /// Runs before any mesh exists, so a rejected parameter set never leaves partial state.
    pub fn validate(&self) -> Result<GearGeometry> {
        let stage = BuildStage::Validating;

        if !(MIN_TEETH..=MAX_TEETH).contains(&self.teeth) {
            return Err(GearError::invalid(
                stage,
                "teeth",
                format!("must be in {MIN_TEETH}..={MAX_TEETH}, got {}", self.teeth),
            ));
        }
        if !self.module.is_finite() || self.module < MIN_MODULE || self.module > MAX_MODULE {
            return Err(GearError::invalid(
                stage,
                "module",
                format!("must be in [{MIN_MODULE}, {MAX_MODULE}], got {}", self.module),
            ));
        }
        if !self.height.is_finite() || self.height <= 0.0 {
            return Err(GearError::invalid(
                stage,
                "height",
                format!("must be positive, got {}", self.height),
            ));
        }

        let geometry = GearGeometry::from_parameters(self);
        if geometry.gap_angle() <= 0.0 {
            return Err(GearError::invalid(
                stage,
                "teeth",
                format!(
                    "{} teeth overlap at the base circle for a {PRESSURE_ANGLE_DEG}° \
                     pressure angle",
                    self.teeth
                ),
            ));
        }
        if !self.inner_radius.is_finite()
            || self.inner_radius <= 0.0
            || self.inner_radius >= geometry.base_radius
        {
            return Err(GearError::invalid(
                stage,
                "inner_radius",
                format!(
                    "must lie in (0, {}) (the base radius), got {}",
                    geometry.base_radius, self.inner_radius
                ),
            ));
        }

        Ok(geometry)
    }
}

/// Involute function `inv(α) = tan α − α`.
#[inline]
pub fn involute_function(alpha: Real) -> Real {
    alpha.tan() - alpha
}

/// Base circle radius `m·z·cos(α)/2` for the fixed pressure angle.
#[inline]
pub fn base_radius(module: Real, teeth: u32) -> Real {
    module * teeth as Real * PRESSURE_ANGLE_DEG.to_radians().cos() / 2.0
}

/// Tip (addendum) circle radius `m·(z/2 + 1)`.
#[inline]
pub fn tip_radius(module: Real, teeth: u32) -> Real {
    module * (teeth as Real / 2.0 + 1.0)
}

/// Scalars derived once per build from [`GearParameters`]. Angles are in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GearGeometry {
    pub teeth: u32,
    pub height: Real,
    pub inner_radius: Real,
    pub pressure_angle: Real,
    pub base_radius: Real,
    pub tip_radius: Real,
    /// Angle of one tooth-and-gap unit, `2π/z`.
    pub angular_pitch: Real,
    /// Angular tooth thickness at the base circle, `π/z + 2·inv(α)`.
    pub tooth_angle: Real,
}

impl GearGeometry {
    /// Derive the scalars without validating; see [`GearParameters::validate`].
    pub fn from_parameters(params: &GearParameters) -> Self {
        let z = params.teeth.max(1) as Real;
        let pressure_angle = PRESSURE_ANGLE_DEG.to_radians();
        Self {
            teeth: params.teeth,
            height: params.height,
            inner_radius: params.inner_radius,
            pressure_angle,
            base_radius: base_radius(params.module, params.teeth),
            tip_radius: tip_radius(params.module, params.teeth),
            angular_pitch: TAU / z,
            tooth_angle: PI / z + 2.0 * involute_function(pressure_angle),
        }
    }

    /// Upper end of the involute parameter range, where the flank meets the tip circle.
    pub fn involute_limit(&self) -> Real {
        ((self.tip_radius / self.base_radius).powi(2) - 1.0)
            .max(0.0)
            .sqrt()
    }

    /// Polar angle swept by one flank between base and tip circle.
    pub fn flank_sweep(&self) -> Real {
        let u = self.involute_limit();
        u - u.atan()
    }

    /// Angular width of the tooth at the tip circle.
    pub fn tip_angle(&self) -> Real {
        self.tooth_angle - 2.0 * self.flank_sweep()
    }

    /// Angular width of the gap between two teeth at the base circle.
    pub fn gap_angle(&self) -> Real {
        self.angular_pitch - self.tooth_angle
    }

    /// Length of one segment of a root fillet split into `segments` pieces.
    ///
    /// The fillet is a semicircle over the base-circle gap chord, so its radius is
    /// `r·sin(gap/2)`.
    pub fn fillet_segment_length(&self, segments: usize) -> Real {
        let radius = self.base_radius * (0.5 * self.gap_angle()).sin();
        2.0 * radius * (FRAC_PI_2 / segments.max(1) as Real).sin()
    }
}
