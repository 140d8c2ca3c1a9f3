pub mod dataset;
pub mod path;
pub mod status;
pub mod tiles;

pub use dataset::*;
pub use path::*;
pub use status::*;
pub use tiles::*;
