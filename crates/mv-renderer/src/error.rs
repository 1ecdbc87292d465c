//! Renderer error types.

/// Shader pipeline stage, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Compute,
}

impl std::fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShaderStage::Vertex => write!(f, "vertex"),
            ShaderStage::Fragment => write!(f, "fragment"),
            ShaderStage::Compute => write!(f, "compute"),
        }
    }
}

/// Errors surfaced by the rendering pipeline.
///
/// Contract violations (querying unbuffered meshes, double releases) are
/// panics, not errors; this enum covers device-level faults that a caller
/// can meaningfully report.
#[derive(Debug, thiserror::Error)]
pub enum RendererError {
    /// A shader failed to compile or validate.
    #[error("shader '{name}' failed in {stage} stage:\n{log}")]
    ShaderCompilation {
        name: String,
        stage: ShaderStage,
        log: String,
    },

    /// A GPU buffer readback failed to map.
    #[error("buffer readback failed: {0}")]
    Readback(String),
}
