//! Render pipeline
//!
//! Turns saved HTML pages into documents through an external renderer:
//! - [`Renderer`]: the collaborator seam, with [`CommandRenderer`] running
//!   the configured command templates
//! - [`RenderPipeline`]: tries the configured strategies in order, each under
//!   a timeout, and renders batches on a bounded pool
//!
//! A page for which every strategy fails is excluded from the output and
//! recorded in `render_errors.log`; it never aborts the run.

mod pipeline;
mod renderer;

pub use pipeline::{
    RenderAttempt, RenderAttemptError, RenderBatch, RenderFailure, RenderJob, RenderPipeline,
    RenderedArtifact,
};
pub use renderer::{CommandRenderer, RenderError, RenderRequest, Renderer};
