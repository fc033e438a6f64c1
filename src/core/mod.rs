// ============================================================================
// spark-fiber - Core Module
// Flags, reactive context, graph traits, errors and configuration
// ============================================================================

pub mod config;
pub mod constants;
pub mod context;
pub mod error;
pub mod types;
