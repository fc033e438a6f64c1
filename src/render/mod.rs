// ============================================================================
// spark-fiber - Render Module
// Entry points: mounting into a host, and rendering to a string
// ============================================================================

pub mod mount;
pub mod string;

pub use mount::{Root, mount, mount_with_config};
pub use string::render_to_string;
