//! Error types for the compositor and its configuration.

use thiserror::Error;

/// Shader stage, used in compile diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl std::fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// Errors raised while building GPU resources.
///
/// None of these ever reach the host page: the compositor logs them and
/// renders with whatever is left.
#[derive(Error, Debug)]
pub enum CompositorError {
    /// The drawing surface could not provide a WebGL2 context.
    #[error("WebGL2 context unavailable: {0}")]
    ContextUnavailable(String),

    /// A shader failed to compile.
    #[error("{stage} shader compilation failed: {log}")]
    ShaderCompile { stage: ShaderStage, log: String },

    /// Vertex and fragment shaders failed to link.
    #[error("program linking failed: {log}")]
    ProgramLink { log: String },

    /// A freshly built framebuffer was not complete.
    #[error("framebuffer incomplete (status {status:#06x})")]
    FramebufferIncomplete { status: u32 },

    /// The driver refused to hand out an object.
    #[error("failed to allocate {0}")]
    Allocation(&'static str),
}

/// Errors from reading an effect-layer document.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The document is not valid JSON or lacks the layer list.
    #[error("invalid effect document: {0}")]
    Document(#[from] serde_json::Error),

    /// A single layer was rejected during validation.
    #[error("layer '{id}' rejected: {reason}")]
    Layer { id: String, reason: String },
}
