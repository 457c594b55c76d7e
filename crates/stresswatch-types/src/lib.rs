//! Shared types for the Stresswatch live session coordinator.

mod report;
mod session;
mod status;
mod ws;

pub use report::*;
pub use session::*;
pub use status::*;
pub use ws::*;
