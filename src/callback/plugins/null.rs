//! Null callback plugin.
//!
//! Produces no output at all. The engine uses it when no callback is given.

use async_trait::async_trait;

use crate::callback::ExecutionCallback;

/// Callback that discards every event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct NullCallback;

#[async_trait]
impl ExecutionCallback for NullCallback {}
