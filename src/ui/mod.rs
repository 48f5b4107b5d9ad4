//! Terminal output for the `ies` binary.
//!
//! Provides the progress bar that follows the run phases and the summary
//! printed once a run ends.

mod colors;
mod progress;
mod summary;

pub use colors::Theme;
pub use progress::TerminalProgress;
pub use summary::render_summary;
