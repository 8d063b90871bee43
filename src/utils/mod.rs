// Shared utilities module
pub mod errors;
pub mod logging;
pub mod ui;

pub use errors::*;
pub use logging::*;
pub use ui::*;
