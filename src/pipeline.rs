//! Build orchestration.
//!
//! A build walks a fixed sequence of stages over one exclusively owned
//! [`PipelineContext`]:
//!
//! ```text
//! Validating → Sampling → ProfileBuilt → OutlineAssembled → Extruded → Bored → Beveled → Done
//! ```
//!
//! The first error ends the build. It is returned as is and names the stage that
//! raised it through [`GearError::stage`]; the partially built mesh is dropped with the
//! context. Every completed stage records a [`Checkpoint`].

use crate::config::BuildSettings;
use crate::errors::{GearError, Result};
use crate::gear::{bevel, bore, extrude, involute, outline, tooth};
use crate::mesh::Mesh;
use crate::params::{GearGeometry, GearParameters};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, instrument, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Stages of a build, in execution order, plus the terminal `Failed` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildStage {
    Validating,
    Sampling,
    ProfileBuilt,
    OutlineAssembled,
    Extruded,
    Bored,
    Beveled,
    Done,
    Failed,
}

impl BuildStage {
    /// The stage that follows a successful `self`. Terminal states map to themselves.
    pub const fn next(self) -> Self {
        match self {
            BuildStage::Validating => BuildStage::Sampling,
            BuildStage::Sampling => BuildStage::ProfileBuilt,
            BuildStage::ProfileBuilt => BuildStage::OutlineAssembled,
            BuildStage::OutlineAssembled => BuildStage::Extruded,
            BuildStage::Extruded => BuildStage::Bored,
            BuildStage::Bored => BuildStage::Beveled,
            BuildStage::Beveled => BuildStage::Done,
            BuildStage::Done => BuildStage::Done,
            BuildStage::Failed => BuildStage::Failed,
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, BuildStage::Done | BuildStage::Failed)
    }
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BuildStage::Validating => "validating",
            BuildStage::Sampling => "sampling",
            BuildStage::ProfileBuilt => "profile",
            BuildStage::OutlineAssembled => "outline",
            BuildStage::Extruded => "extrude",
            BuildStage::Bored => "bore",
            BuildStage::Beveled => "bevel",
            BuildStage::Done => "done",
            BuildStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// The working subset a stage operates on. Cleared whenever a new stage starts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    pub vertices: Vec<u32>,
    pub edges: Vec<[u32; 2]>,
    pub faces: Vec<usize>,
}

impl Selection {
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.edges.clear();
        self.faces.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() && self.edges.is_empty() && self.faces.is_empty()
    }
}

/// Mesh size after a stage completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    pub stage: BuildStage,
    pub vertices: usize,
    pub edges: usize,
    pub faces: usize,
}

/// What a successful build did, stage by stage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildReport {
    pub checkpoints: Vec<Checkpoint>,
    /// Bevel offset actually applied after overlap clamping
    pub bevel_offset: Option<crate::float_types::Real>,
    /// The bore annulus was faced by ear clipping instead of the angular zipper
    pub bore_fallback: bool,
}

impl BuildReport {
    pub fn checkpoint(&self, stage: BuildStage) -> Option<&Checkpoint> {
        self.checkpoints.iter().find(|c| c.stage == stage)
    }
}

/// State owned by one build: the mesh under construction, the validated inputs and
/// the scratch selection.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub mesh: Mesh,
    pub params: GearParameters,
    pub geometry: GearGeometry,
    pub settings: BuildSettings,
    pub selection: Selection,
    stage: BuildStage,
    report: BuildReport,
}

impl PipelineContext {
    /// Validate inputs and settings and open a context with an empty mesh.
    pub fn new(params: GearParameters, settings: BuildSettings) -> Result<Self> {
        settings.validate()?;
        let geometry = params.validate()?;
        settings.validate_for(&geometry)?;
        Ok(Self {
            mesh: Mesh::new(),
            params,
            geometry,
            settings,
            selection: Selection::default(),
            stage: BuildStage::Validating,
            report: BuildReport::default(),
        })
    }

    pub const fn stage(&self) -> BuildStage {
        self.stage
    }

    pub const fn report(&self) -> &BuildReport {
        &self.report
    }

    /// Weld tolerance of this build.
    pub const fn tolerance(&self) -> crate::float_types::Real {
        self.settings.weld_tolerance
    }

    fn enter(&mut self, stage: BuildStage) {
        self.stage = stage;
        self.selection.clear();
        self.mesh.deselect_all();
    }

    fn record(&mut self) {
        let checkpoint = Checkpoint {
            stage: self.stage,
            vertices: self.mesh.vertex_count(),
            edges: self.mesh.edge_count(),
            faces: self.mesh.face_count(),
        };
        debug!(
            stage = %checkpoint.stage,
            vertices = checkpoint.vertices,
            edges = checkpoint.edges,
            faces = checkpoint.faces,
            "checkpoint"
        );
        self.report.checkpoints.push(checkpoint);
    }

    pub(crate) fn note_bevel_offset(&mut self, offset: crate::float_types::Real) {
        self.report.bevel_offset = Some(offset);
    }

    pub(crate) fn note_bore_fallback(&mut self) {
        self.report.bore_fallback = true;
    }
}

/// Runs builds with fixed settings and an optional cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct MeshPipeline {
    settings: BuildSettings,
    cancel: Option<Arc<AtomicBool>>,
}

impl MeshPipeline {
    pub const fn new(settings: BuildSettings) -> Self {
        Self {
            settings,
            cancel: None,
        }
    }

    /// Stop builds at the next stage boundary once `flag` becomes `true`.
    pub fn with_cancellation(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub const fn settings(&self) -> &BuildSettings {
        &self.settings
    }

    /// Build one gear solid.
    pub fn build(&self, params: &GearParameters) -> Result<Mesh> {
        self.build_with_report(params).map(|(mesh, _)| mesh)
    }

    /// Build one gear solid and return the per-stage report alongside it.
    #[instrument(skip(self))]
    pub fn build_with_report(&self, params: &GearParameters) -> Result<(Mesh, BuildReport)> {
        match self.run(params) {
            Ok(ctx) => {
                info!(
                    teeth = params.teeth,
                    vertices = ctx.mesh.vertex_count(),
                    faces = ctx.mesh.face_count(),
                    "gear built"
                );
                Ok((ctx.mesh, ctx.report))
            },
            Err(err) => {
                warn!(stage = %err.stage(), %err, "gear build failed");
                Err(err)
            },
        }
    }

    /// Build independent parameter sets, one result per input in input order.
    /// Runs in parallel when the `parallel` feature is enabled.
    pub fn build_all(&self, params: &[GearParameters]) -> Vec<Result<Mesh>> {
        #[cfg(feature = "parallel")]
        {
            params.par_iter().map(|p| self.build(p)).collect()
        }

        #[cfg(not(feature = "parallel"))]
        {
            params.iter().map(|p| self.build(p)).collect()
        }
    }

    fn check_cancelled(&self, stage: BuildStage) -> Result<()> {
        match &self.cancel {
            Some(flag) if flag.load(Ordering::Relaxed) => Err(GearError::Cancelled { stage }),
            _ => Ok(()),
        }
    }

    fn begin(&self, ctx: &mut PipelineContext, stage: BuildStage) -> Result<()> {
        self.check_cancelled(stage)?;
        ctx.enter(stage);
        Ok(())
    }

    fn run(&self, params: &GearParameters) -> Result<PipelineContext> {
        self.check_cancelled(BuildStage::Validating)?;
        let mut ctx = PipelineContext::new(*params, self.settings)?;
        ctx.record();

        self.begin(&mut ctx, BuildStage::Sampling)?;
        let flank = involute::sample_flank(&mut ctx)?;
        ctx.record();

        self.begin(&mut ctx, BuildStage::ProfileBuilt)?;
        let profile = tooth::build_profile(&mut ctx, &flank)?;
        ctx.record();

        self.begin(&mut ctx, BuildStage::OutlineAssembled)?;
        let outline = outline::assemble_outline(&mut ctx, &profile)?;
        ctx.record();

        self.begin(&mut ctx, BuildStage::Extruded)?;
        let solid = extrude::extrude(&mut ctx, &outline)?;
        ctx.record();

        self.begin(&mut ctx, BuildStage::Bored)?;
        bore::cut_bore(&mut ctx, &solid)?;
        ctx.record();

        self.begin(&mut ctx, BuildStage::Beveled)?;
        bevel::bevel_tips(&mut ctx)?;
        ctx.record();

        self.begin(&mut ctx, BuildStage::Done)?;
        verify_solid(&mut ctx)?;
        ctx.record();

        Ok(ctx)
    }
}

/// Final consistency pass and closed-solid check.
fn verify_solid(ctx: &mut PipelineContext) -> Result<()> {
    let stage = BuildStage::Done;
    ctx.mesh.orient_consistently();
    ctx.mesh.ensure_non_degenerate(stage, ctx.tolerance())?;

    ctx.mesh.analyze_manifold().ensure_closed_solid(stage, 1)
}

/// Build one gear with default settings.
pub fn build_gear(params: &GearParameters) -> Result<Mesh> {
    MeshPipeline::default().build(params)
}
