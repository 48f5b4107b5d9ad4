//! 24-bit RGB color theme for terminal output.

use owo_colors::Rgb;

/// Color palette of the terminal output.
#[derive(Debug, Clone, Copy)]
pub struct Theme {
    /// Success state color - green (34, 197, 94)
    pub success: Rgb,
    /// Error state color - red (239, 68, 68)
    pub error: Rgb,
    /// Retry/warning color - yellow (234, 179, 8)
    pub warning: Rgb,
    /// Running phase color - blue (59, 130, 246)
    pub in_progress: Rgb,
    /// Secondary text - gray (107, 114, 128)
    pub muted: Rgb,
    /// Case and module names - cyan (34, 211, 238)
    pub highlight: Rgb,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            success: Rgb(34, 197, 94),
            error: Rgb(239, 68, 68),
            warning: Rgb(234, 179, 8),
            in_progress: Rgb(59, 130, 246),
            muted: Rgb(107, 114, 128),
            highlight: Rgb(34, 211, 238),
        }
    }
}
