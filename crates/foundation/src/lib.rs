pub mod bounds;
pub mod coords;
pub mod num;
pub mod precision;

// Foundation crate: small, well-tested primitives only.
pub use bounds::*;
pub use coords::*;
pub use num::*;
pub use precision::*;
