pub mod frame;
pub mod host;
pub mod orchestrator;
pub mod playback;
pub mod tile_view;

pub use frame::*;
pub use host::*;
pub use orchestrator::*;
pub use playback::*;
pub use tile_view::*;
