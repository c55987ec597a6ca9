//! The blur context.
//!
//! ## Usage
//!
//! Schedule backdrop blurs while building a frame and composite the result.

use std::num::NonZeroUsize;

use tracing::{error, info, trace, warn};

use crate::{
    backend::GpuBackend,
    chain::ChainCache,
    config::BlurConfig,
    deferred::{BlurHandle, DeferredParams},
    error::BlurError,
    filter::FilterPrograms,
    host::{BackdropRect, DrawCallback, ImageQuad, UiHost},
    orchestrator::{self, BlurResources, ExecuteOutcome, SkipReason},
    output::OutputSurface,
    params::{BlurParameters, BlurSettings},
    pass::PassExecutor,
};

/// Counters describing the work done so far.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BlurStats {
    /// Chains allocated by the cache.
    pub chain_rebuilds: u64,
    /// Output surface allocations.
    pub output_rebuilds: u64,
    /// Executions that rendered.
    pub executions: u64,
    /// Executions that were skipped.
    pub skipped: u64,
    /// Passes issued by the last rendered execution.
    pub last_passes: u32,
    /// Parameter blocks currently alive.
    pub pending_params: usize,
    /// Parameter blocks freed so far.
    pub freed_params: u64,
    /// Completed frames.
    pub frames: u64,
}

/// Backdrop blur state for one renderer.
///
/// A frame looks like this:
///
/// 1. While building the UI, call [`process`](Self::process) for every panel that
///    wants a blurred backdrop, then [`render`](Self::render) to paint it.
/// 2. While replaying the draw list, pass each [`DrawCallback`] to
///    [`handle_callback`](Self::handle_callback).
/// 3. After the frame is presented, call [`collect`](Self::collect) exactly once.
pub struct BackdropBlur<B: GpuBackend> {
    backend: B,
    programs: FilterPrograms<B>,
    chains: ChainCache<B>,
    output: OutputSurface<B>,
    params: DeferredParams,
    executor: PassExecutor,
    config: BlurConfig,
    executions: u64,
    skipped: u64,
    last_passes: u32,
    frames: u64,
}

impl<B: GpuBackend> BackdropBlur<B> {
    /// Compiles the filter programs and creates an idle context.
    ///
    /// Fails if either program does not compile; no context exists afterwards.
    pub fn setup(mut backend: B, config: BlurConfig) -> Result<Self, BlurError> {
        let programs = match FilterPrograms::compile(&mut backend) {
            Ok(programs) => programs,
            Err(err) => {
                error!("Backdrop blur setup failed: {err}");
                return Err(err.into());
            }
        };
        let capacity = NonZeroUsize::new(config.chain_cache_capacity).unwrap_or(NonZeroUsize::MIN);
        info!(
            "Backdrop blur ready (chain cache capacity {capacity}, max iterations {})",
            config.max_iterations
        );
        Ok(Self {
            backend,
            programs,
            chains: ChainCache::new(capacity),
            output: OutputSurface::default(),
            params: DeferredParams::new(),
            executor: PassExecutor::new(config.clear_color),
            config,
            executions: 0,
            skipped: 0,
            last_passes: 0,
            frames: 0,
        })
    }

    /// Releases every surface and pending parameter, returning the backend.
    pub fn destroy(mut self) -> B {
        self.chains.clear(&mut self.backend);
        self.output.release(&mut self.backend);
        self.params.clear();
        info!("Backdrop blur destroyed after {} frames", self.frames);
        self.backend
    }

    /// Schedules one blur for the frame being built.
    ///
    /// Queues [`DrawCallback::Blur`] followed by [`DrawCallback::ResetRenderState`]
    /// into `host`. Invalid settings queue nothing.
    pub fn process<H: UiHost>(
        &mut self,
        host: &mut H,
        settings: BlurSettings,
    ) -> Result<BlurHandle, BlurError> {
        let params = BlurParameters::new(settings, self.config.max_iterations)?;
        let handle = self.params.submit(params);
        host.add_callback(DrawCallback::Blur(handle));
        host.add_callback(DrawCallback::ResetRenderState);
        Ok(handle)
    }

    /// Runs the blur scheduled under `handle`.
    ///
    /// Per-frame failures never propagate; they are reported as
    /// [`ExecuteOutcome::Skipped`] and leave the previous output in place.
    pub fn execute(&mut self, handle: BlurHandle) -> ExecuteOutcome {
        let Some(params) = self.params.get(handle).copied() else {
            warn!("Skipping blur: parameters for {handle:?} were already reclaimed");
            self.skipped += 1;
            return ExecuteOutcome::Skipped(SkipReason::StaleHandle);
        };
        let outcome = orchestrator::execute(
            BlurResources {
                backend: &mut self.backend,
                programs: &self.programs,
                chains: &mut self.chains,
                output: &mut self.output,
                executor: &self.executor,
            },
            &params,
        );
        self.backend.flush();
        match outcome {
            ExecuteOutcome::Rendered { passes } => {
                self.executions += 1;
                self.last_passes = passes;
            }
            ExecuteOutcome::Skipped(_) => self.skipped += 1,
        }
        outcome
    }

    /// Executes a replayed callback.
    ///
    /// Returns `None` for [`DrawCallback::ResetRenderState`], which the host handles itself.
    pub fn handle_callback(&mut self, callback: &DrawCallback) -> Option<ExecuteOutcome> {
        match *callback {
            DrawCallback::Blur(handle) => Some(self.execute(handle)),
            DrawCallback::ResetRenderState => None,
        }
    }

    /// Paints the blurred backdrop into `rect`.
    ///
    /// Returns `false`, drawing nothing, until an execution has produced output
    /// or while the display has no area.
    pub fn render<H>(&self, host: &mut H, rect: BackdropRect) -> bool
    where
        H: UiHost<Texture = B::ReadView>,
    {
        let Some(texture) = self.output.texture() else {
            return false;
        };
        let display_size = host.display_size();
        if display_size.x <= 0.0 || display_size.y <= 0.0 {
            return false;
        }
        host.add_image_rounded(ImageQuad::for_display(
            texture.clone(),
            &rect,
            display_size,
        ));
        true
    }

    /// Returns the read view of the blurred output.
    ///
    /// `None` before the first successful execution.
    pub fn texture(&self) -> Option<&B::ReadView> {
        self.output.texture()
    }

    /// Ends the frame: frees parameters scheduled two frames ago.
    ///
    /// Must be called exactly once per frame boundary.
    pub fn collect(&mut self) -> usize {
        let freed = self.params.collect();
        self.frames += 1;
        if freed > 0 {
            trace!("Freed {freed} blur parameter blocks");
        }
        freed
    }

    /// Returns the work counters.
    pub fn stats(&self) -> BlurStats {
        BlurStats {
            chain_rebuilds: self.chains.rebuilds(),
            output_rebuilds: self.output.rebuilds(),
            executions: self.executions,
            skipped: self.skipped,
            last_passes: self.last_passes,
            pending_params: self.params.len(),
            freed_params: self.params.freed(),
            frames: self.frames,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &BlurConfig {
        &self.config
    }

    /// Returns the backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Returns the backend mutably, e.g. to hand it the next screen target.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}
