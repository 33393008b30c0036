// Re-export all types so callers can use `domain::types::*`
// while the code stays organized by concern internally.

pub use self::attribute::*;
pub use self::certificate::*;
pub use self::config::*;
pub use self::core::*;
pub use self::signature::*;
pub use self::trust::*;

// Module declarations
mod attribute;
mod certificate;
mod config;
mod core;
mod signature;
mod trust;
