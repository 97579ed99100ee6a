//! Built-in callback plugins.

pub mod log;
pub mod null;
pub mod recap;

pub use log::LogCallback;
pub use null::NullCallback;
pub use recap::RecapCallback;
