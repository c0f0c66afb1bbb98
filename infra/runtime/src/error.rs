use cmdkit_kernel::format_context;
use std::borrow::Cow;

/// Errors raised while turning detected limits into a runtime.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The Tokio runtime could not be built with the requested parallelism.
    #[error("Failed to initialize runtime{}: {source}", format_context(context))]
    Build { source: std::io::Error, context: Option<Cow<'static, str>> },

    /// The memory soft-limit ratio is outside `(0, 1]`.
    #[error("Memory limit ratio must be in (0, 1], got {ratio}")]
    InvalidRatio { ratio: f64 },
}
