//! Build settings: sampling resolution, fillet resolution, weld tolerance and bevel shape.
//!
//! The defaults reproduce the reference gear: 10 involute steps per flank, a
//! 16-segment root fillet and a 0.6 unit, 10-segment tip bevel.

use crate::errors::{GearError, Result};
use crate::float_types::{Real, tolerance};
use crate::params::GearGeometry;
use crate::pipeline::BuildStage;

/// Default number of involute steps per flank (`steps + 1` samples).
pub const DEFAULT_FLANK_STEPS: usize = 10;
/// Default number of segments in the 180° root fillet.
pub const DEFAULT_FILLET_SEGMENTS: usize = 16;
/// Default bevel offset, in length units.
pub const DEFAULT_BEVEL_OFFSET: Real = 0.6;
/// Default number of bevel profile segments.
pub const DEFAULT_BEVEL_SEGMENTS: usize = 10;

/// Shape of the tip bevel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BevelSettings {
    /// Distance of the new edges from the bevelled edge, measured in each adjacent face.
    pub offset: Real,
    /// Number of quads across the bevel strip.
    pub segments: usize,
    /// Shrink the offset so slid vertices never pass the middle of their edge.
    pub clamp_overlap: bool,
}

impl Default for BevelSettings {
    fn default() -> Self {
        Self {
            offset: DEFAULT_BEVEL_OFFSET,
            segments: DEFAULT_BEVEL_SEGMENTS,
            clamp_overlap: true,
        }
    }
}

/// Resolution and tolerance knobs for one build.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BuildSettings {
    pub flank_steps: usize,
    pub fillet_segments: usize,
    pub weld_tolerance: Real,
    pub bevel: BevelSettings,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            flank_steps: DEFAULT_FLANK_STEPS,
            fillet_segments: DEFAULT_FILLET_SEGMENTS,
            weld_tolerance: tolerance(),
            bevel: BevelSettings::default(),
        }
    }
}

impl BuildSettings {
    pub const fn with_flank_steps(mut self, steps: usize) -> Self {
        self.flank_steps = steps;
        self
    }

    pub const fn with_fillet_segments(mut self, segments: usize) -> Self {
        self.fillet_segments = segments;
        self
    }

    pub const fn with_weld_tolerance(mut self, tolerance: Real) -> Self {
        self.weld_tolerance = tolerance;
        self
    }

    pub const fn with_bevel(mut self, bevel: BevelSettings) -> Self {
        self.bevel = bevel;
        self
    }

    /// Vertices in one tooth boundary: both flanks, tip closure included.
    pub const fn tooth_vertex_count(&self) -> usize {
        2 * self.flank_steps + 2
    }

    /// Vertices one tooth-and-gap unit contributes to the welded outline.
    /// The fillet's two end points are shared with the flank roots.
    pub const fn unit_vertex_count(&self) -> usize {
        self.tooth_vertex_count() + self.fillet_segments - 1
    }

    /// Outline vertices per unit lying on or inside the base circle:
    /// both roots plus the fillet interior.
    pub const fn rim_candidates_per_unit(&self) -> usize {
        self.fillet_segments + 1
    }

    pub(crate) fn validate(&self) -> Result<()> {
        let stage = BuildStage::Validating;
        if self.flank_steps == 0 {
            return Err(GearError::invalid(stage, "flank_steps", "must be at least 1"));
        }
        if self.fillet_segments < 2 {
            return Err(GearError::invalid(
                stage,
                "fillet_segments",
                format!("must be at least 2, got {}", self.fillet_segments),
            ));
        }
        if !(self.weld_tolerance.is_finite() && self.weld_tolerance > 0.0) {
            return Err(GearError::invalid(
                stage,
                "weld_tolerance",
                format!("must be positive and finite, got {}", self.weld_tolerance),
            ));
        }
        if self.bevel.segments == 0 {
            return Err(GearError::invalid(stage, "bevel.segments", "must be at least 1"));
        }
        if !(self.bevel.offset.is_finite() && self.bevel.offset > 0.0) {
            return Err(GearError::invalid(
                stage,
                "bevel.offset",
                format!("must be positive and finite, got {}", self.bevel.offset),
            ));
        }
        Ok(())
    }

    /// Checks that need the gear: the root fillet has to survive the weld.
    pub(crate) fn validate_for(&self, geometry: &GearGeometry) -> Result<()> {
        let segment = geometry.fillet_segment_length(self.fillet_segments);
        if segment <= self.weld_tolerance {
            return Err(GearError::invalid(
                BuildStage::Validating,
                "teeth",
                format!(
                    "{} teeth leave a root gap whose {}-segment fillet has edges of {segment}, \
                     not above the weld tolerance {}; use fewer teeth or a larger module",
                    geometry.teeth, self.fillet_segments, self.weld_tolerance
                ),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::GearParameters;

    #[test]
    fn default_unit_has_37_vertices() {
        let settings = BuildSettings::default();
        assert_eq!(settings.tooth_vertex_count(), 22);
        assert_eq!(settings.unit_vertex_count(), 37);
        assert_eq!(settings.rim_candidates_per_unit(), 17);
    }

    #[test]
    fn counts_follow_resolution() {
        let settings = BuildSettings::default()
            .with_flank_steps(4)
            .with_fillet_segments(8);
        assert_eq!(settings.tooth_vertex_count(), 10);
        assert_eq!(settings.unit_vertex_count(), 17);
        assert_eq!(settings.rim_candidates_per_unit(), 9);
    }

    #[test]
    fn rejects_bad_settings() {
        let bad = [
            BuildSettings::default().with_flank_steps(0),
            BuildSettings::default().with_fillet_segments(1),
            BuildSettings::default().with_weld_tolerance(0.0),
            BuildSettings::default().with_weld_tolerance(Real::NAN),
            BuildSettings::default().with_bevel(BevelSettings {
                segments: 0,
                ..BevelSettings::default()
            }),
            BuildSettings::default().with_bevel(BevelSettings {
                offset: -0.1,
                ..BevelSettings::default()
            }),
        ];
        for settings in bad {
            assert!(
                matches!(settings.validate(), Err(GearError::InvalidParameter { .. })),
                "{settings:?} should be rejected"
            );
        }
        assert!(BuildSettings::default().validate().is_ok());
    }

    #[test]
    fn fillet_that_would_weld_shut_is_rejected() {
        // 105 teeth leave a 1.1e-4 rad gap; at module 0.1 each fillet segment is ~5.4e-5.
        let tiny = GearParameters::new(0.1, 105, 1.0, 0.2).validate().expect("in range");
        let settings = BuildSettings::default();
        assert!(tiny.fillet_segment_length(16) < settings.weld_tolerance);
        match settings.validate_for(&tiny) {
            Err(GearError::InvalidParameter { stage, parameter, .. }) => {
                assert_eq!(stage, BuildStage::Validating);
                assert_eq!(parameter, "teeth");
            },
            other => panic!("expected rejection, got {other:?}"),
        }

        // A larger module or a coarser fillet keeps the segments apart.
        let larger = GearParameters::new(0.25, 105, 1.0, 0.2).validate().expect("in range");
        assert!(settings.validate_for(&larger).is_ok());
        assert!(settings.with_fillet_segments(4).validate_for(&tiny).is_ok());
    }

    #[test]
    fn fillet_segment_length_matches_reference_gear() {
        let geometry = GearParameters::default().validate().expect("valid");
        let half_gap = 0.5 * geometry.gap_angle();
        let radius = geometry.base_radius * half_gap.sin();
        let expected = 2.0 * radius * (crate::float_types::PI / 32.0).sin();
        assert!((geometry.fillet_segment_length(16) - expected).abs() < 1e-12);
        assert!(geometry.fillet_segment_length(16) > 0.1);
    }
}
