//! Summary printed when a run ends.

use owo_colors::OwoColorize;

use crate::status::RunStatus;
use crate::ui::colors::Theme;

/// Render a run status as a few human-readable lines.
pub fn render_summary(status: &RunStatus, theme: &Theme, use_color: bool) -> String {
    let mut out = String::new();

    let headline = if status.failed {
        "FAILED"
    } else if status.finished {
        "COMPLETED"
    } else {
        "RUNNING"
    };
    let headline = if !use_color {
        headline.to_string()
    } else if status.failed {
        headline.color(theme.error).bold().to_string()
    } else if status.finished {
        headline.color(theme.success).bold().to_string()
    } else {
        headline.color(theme.in_progress).to_string()
    };
    let model = if use_color {
        status.model_name.color(theme.highlight).to_string()
    } else {
        status.model_name.clone()
    };
    out.push_str(&format!("{} {}\n", model, headline));

    out.push_str(&format!(
        "  phase:      {}/{} {}\n",
        status.phase, status.phase_count, status.phase_message
    ));
    if let Some(iteration) = status.last_completed_iteration {
        out.push_str(&format!("  iteration:  {}\n", iteration));
    }
    if status.retries > 0 {
        let retries = format!("{}", status.retries);
        let retries = if use_color {
            retries.color(theme.warning).to_string()
        } else {
            retries
        };
        out.push_str(&format!("  retries:    {}\n", retries));
    }
    if let Some(duration) = status.duration() {
        let seconds = format!("{:.1}s", duration.num_milliseconds() as f64 / 1000.0);
        let seconds = if use_color {
            seconds.color(theme.muted).to_string()
        } else {
            seconds
        };
        out.push_str(&format!("  duration:   {}\n", seconds));
    }
    if let Some(message) = &status.fail_message {
        let message = if use_color {
            message.color(theme.error).to_string()
        } else {
            message.clone()
        };
        out.push_str(&format!("  error:      {}\n", message));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RunError;

    #[test]
    fn test_plain_summary_of_failed_run() {
        let mut status = RunStatus::new("Iterated Ensemble Smoother");
        status.start();
        status.record_phase(0, 3, "Running forecast...");
        status.last_completed_iteration = Some(0);
        status.retries = 2;
        status.fail(&RunError::RetriesExhausted {
            retries: 2,
            iteration: 0,
        });

        let text = render_summary(&status, &Theme::default(), false);

        assert!(text.starts_with("Iterated Ensemble Smoother FAILED"));
        assert!(text.contains("phase:      0/3 Running forecast..."));
        assert!(text.contains("retries:    2"));
        assert!(text.contains("(2 retries) reached for iteration 0"));
    }

    #[test]
    fn test_plain_summary_of_completed_run() {
        let mut status = RunStatus::new("m");
        status.start();
        status.record_phase(4, 4, "Simulations completed.");
        status.complete();

        let text = render_summary(&status, &Theme::default(), false);
        assert!(text.starts_with("m COMPLETED"));
        assert!(!text.contains("error:"));
    }

    #[test]
    fn test_colored_summary_uses_theme() {
        let theme = Theme::default();
        let mut status = RunStatus::new("m");
        status.start();
        status.complete();

        let text = render_summary(&status, &theme, true);

        assert!(text.contains(&"m".color(theme.highlight).to_string()));
        assert!(text.contains(&"COMPLETED".color(theme.success).bold().to_string()));
        assert!(text.contains("\x1b[38;2;107;114;128m"));
    }
}
