// ============================================================================
// spark-fiber - Errors
// Render protocol violations, component failures and host binding failures
// ============================================================================

use crate::host::HostHandle;

/// Result alias used across the crate.
pub type Result<T, E = RenderError> = std::result::Result<T, E>;

// =============================================================================
// HOST ERROR
// =============================================================================

/// A failure reported by a [`HostTree`](crate::host::HostTree) binding.
///
/// Host failures are fatal for the commit that hit them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum HostError {
    #[error("unknown host node {0}")]
    UnknownNode(HostHandle),

    #[error("host node {child} is not a child of {parent}")]
    NotAChild { parent: HostHandle, child: HostHandle },

    #[error("host node {0} cannot hold children")]
    NotAContainer(HostHandle),

    #[error("host operation failed: {0}")]
    Operation(String),
}

// =============================================================================
// RENDER ERROR
// =============================================================================

/// Everything that can go wrong while rendering or committing a tree.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum RenderError {
    /// Hooks were requested in a different order or count than the previous
    /// render of the same node.
    #[error("hook #{index} in `{component}` changed: expected {expected}, found {found}")]
    HookMismatch {
        component: String,
        index: usize,
        expected: String,
        found: String,
    },

    #[error("no provider for context `{context}` and no default value")]
    MissingProvider { context: &'static str },

    #[error("`{component}` re-rendered more than {limit} times in one pass")]
    TooManyRerenders { component: String, limit: u32 },

    #[error("computed values are read-only")]
    ReadOnlySignal,

    /// An error raised by component code.
    #[error("{component}: {message}")]
    Component { component: String, message: String },

    #[error(transparent)]
    Host(#[from] HostError),

    #[error("root failed during an earlier commit")]
    RootFailed,

    #[error("root has been unmounted")]
    Unmounted,

    #[error("updates kept scheduling after {passes} commit passes")]
    CommitLoop { passes: u32 },

    #[error("invalid runtime config: {0}")]
    Config(String),
}

impl RenderError {
    /// Build a component error. Component code returns it with `Err(..)` or `?`.
    ///
    /// # Example
    ///
    /// ```
    /// use spark_fiber::RenderError;
    ///
    /// let err = RenderError::component("Profile", "user not found");
    /// assert_eq!(err.to_string(), "Profile: user not found");
    /// ```
    pub fn component(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }

    /// True for errors that leave a root unusable.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Host(_) | Self::RootFailed | Self::Unmounted)
    }
}

// =============================================================================
// TESTS
// =============================================================================
