//! Dual Kawase pass sequencing.
//!
//! ## Usage
//!
//! Turn one set of blur parameters into the ordered filter passes of a frame.
//!
//! For `n` iterations the screen is downsampled into levels `1..=n`, then
//! upsampled back through levels `n-1..=0`, and a final upsample writes level 0
//! into the output surface: `2n + 1` passes in total. With zero iterations the
//! single final pass filters the screen directly.
//!
//! Every resource is validated before the first pass. When anything is missing
//! the frame is skipped and the output keeps its previous contents.

use tracing::{debug, warn};

use crate::{
    backend::{GpuBackend, ScreenCapture},
    chain::{ChainCache, ChainKey},
    filter::{FilterKind, FilterPrograms},
    output::OutputSurface,
    params::BlurParameters,
    pass::PassExecutor,
    surface::{Surface, scaled_extent},
};

/// Where a pass reads from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PassSource {
    /// The captured screen.
    Screen,
    /// A chain level.
    Level(usize),
}

/// Where a pass writes to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PassTarget {
    /// A chain level.
    Level(usize),
    /// The output surface.
    Output,
}

/// One entry of the pass sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlannedPass {
    /// Input of the pass.
    pub source: PassSource,
    /// Destination of the pass.
    pub target: PassTarget,
    /// Filter used.
    pub kind: FilterKind,
}

impl PlannedPass {
    fn new(source: PassSource, target: PassTarget, kind: FilterKind) -> Self {
        Self {
            source,
            target,
            kind,
        }
    }
}

/// Returns the pass sequence for `iterations`.
pub fn plan(iterations: u32) -> Vec<PlannedPass> {
    let n = iterations as usize;
    let mut passes = Vec::with_capacity(2 * n + 1);
    if n == 0 {
        passes.push(PlannedPass::new(
            PassSource::Screen,
            PassTarget::Output,
            FilterKind::Upsample,
        ));
        return passes;
    }

    passes.push(PlannedPass::new(
        PassSource::Screen,
        PassTarget::Level(1),
        FilterKind::Downsample,
    ));
    for level in 2..=n {
        passes.push(PlannedPass::new(
            PassSource::Level(level - 1),
            PassTarget::Level(level),
            FilterKind::Downsample,
        ));
    }
    for level in (1..=n).rev() {
        passes.push(PlannedPass::new(
            PassSource::Level(level),
            PassTarget::Level(level - 1),
            FilterKind::Upsample,
        ));
    }
    passes.push(PlannedPass::new(
        PassSource::Level(0),
        PassTarget::Output,
        FilterKind::Upsample,
    ));
    passes
}

/// Why an execution did not render.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// The parameters were already reclaimed.
    StaleHandle,
    /// No screen target was available.
    NoScreen,
    /// The screen has a zero dimension.
    EmptyScreen,
    /// The chain could not be allocated or is incomplete.
    ChainUnavailable,
    /// The output surface could not be allocated.
    OutputUnavailable,
}

/// Result of one execution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecuteOutcome {
    /// Every pass ran.
    Rendered {
        /// Number of filter passes issued.
        passes: u32,
    },
    /// Nothing was drawn.
    Skipped(SkipReason),
}

impl ExecuteOutcome {
    /// Returns `true` if the output surface was updated.
    pub fn is_rendered(&self) -> bool {
        matches!(self, ExecuteOutcome::Rendered { .. })
    }
}

/// Mutable state an execution works on.
pub struct BlurResources<'a, B: GpuBackend> {
    /// Device collaborator.
    pub backend: &'a mut B,
    /// Compiled filters.
    pub programs: &'a FilterPrograms<B>,
    /// Cached chains.
    pub chains: &'a mut ChainCache<B>,
    /// Output surface.
    pub output: &'a mut OutputSurface<B>,
    /// Pass runner.
    pub executor: &'a PassExecutor,
}

/// Runs the full blur for `params`.
#[tracing::instrument(level = "trace", skip_all, fields(iterations = params.iterations()))]
pub fn execute<B: GpuBackend>(
    resources: BlurResources<'_, B>,
    params: &BlurParameters,
) -> ExecuteOutcome {
    let BlurResources {
        backend,
        programs,
        chains,
        output,
        executor,
    } = resources;

    let Some(screen) = backend.capture_screen() else {
        debug!("Skipping blur: no screen to capture");
        return ExecuteOutcome::Skipped(SkipReason::NoScreen);
    };
    if screen.width == 0 || screen.height == 0 {
        debug!("Skipping blur: empty screen");
        return ExecuteOutcome::Skipped(SkipReason::EmptyScreen);
    }

    let (width, height) = scaled_extent(screen.width, screen.height, params.scale());
    let key = ChainKey::new(params.iterations(), width, height);
    let chain = match chains.ensure(backend, key) {
        Ok(chain) if chain.is_complete() => chain,
        Ok(_) => {
            warn!("Skipping blur: chain {key:?} is incomplete");
            return ExecuteOutcome::Skipped(SkipReason::ChainUnavailable);
        }
        Err(err) => {
            warn!("Skipping blur: {err}");
            return ExecuteOutcome::Skipped(SkipReason::ChainUnavailable);
        }
    };
    let target = match output.ensure(backend, screen.width, screen.height) {
        Ok(target) => target,
        Err(err) => {
            warn!("Skipping blur: output surface unavailable: {err}");
            return ExecuteOutcome::Skipped(SkipReason::OutputUnavailable);
        }
    };

    let saved = backend.save_render_state();
    backend.bind_filter_state();
    let passes = run_plan(
        backend,
        executor,
        programs,
        chain.levels(),
        target,
        &screen,
        params,
    );
    backend.restore_render_state(saved);
    ExecuteOutcome::Rendered { passes }
}

fn run_plan<B: GpuBackend>(
    backend: &mut B,
    executor: &PassExecutor,
    programs: &FilterPrograms<B>,
    levels: &[Surface<B>],
    output: &Surface<B>,
    screen: &ScreenCapture<B::ReadView>,
    params: &BlurParameters,
) -> u32 {
    let mut passes = 0;
    for pass in plan(params.iterations()) {
        let source = match pass.source {
            PassSource::Screen => &screen.view,
            PassSource::Level(level) => levels[level].view(),
        };
        let destination = match pass.target {
            PassTarget::Level(level) => &levels[level],
            PassTarget::Output => output,
        };
        executor.run(
            backend,
            destination,
            source,
            programs.get(pass.kind),
            params.offset(),
            params.noise(),
        );
        passes += 1;
    }
    passes
}
