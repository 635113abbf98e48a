//! Bridge module: turn lifecycle, callbacks and process bookkeeping.

mod callback;
mod reducer;
mod registry;
mod runner;
mod session;

pub use callback::*;
pub use reducer::*;
pub use registry::*;
pub use runner::*;
pub use session::*;
