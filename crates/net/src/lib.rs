pub mod client;
pub mod poller;
pub mod pool;

pub use client::*;
pub use poller::*;
pub use pool::*;
