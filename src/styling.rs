//! Terminal styling for pkgflow output.
//!
//! Uses the anstyle ecosystem:
//! - anstream for auto-detecting color support
//! - anstyle for composable styling
//! - `color_print::cformat!` with HTML-like tags for user-facing messages
//!
//! ## stdout vs stderr principle
//!
//! - **stdout**: primary data output (token listings, JSON)
//! - **stderr**: status messages (progress, success, errors, hints, warnings)
//!
//! This separation allows piping without status messages interfering.

// Re-exports from anstream (auto-detecting output)
pub use anstream::{eprint, eprintln, print, println, stderr, stdout};

use anstyle::{AnsiColor, Color, Style};
use color_print::cformat;

/// Gutter style for quoted content (commands, previews, error details).
pub const GUTTER: Style = Style::new().bg_color(Some(Color::Ansi(AnsiColor::BrightWhite)));

// ============================================================================
// Message Emojis
// ============================================================================

/// Progress emoji: `cformat!("{PROGRESS_EMOJI} <cyan>message</>")`
pub const PROGRESS_EMOJI: &str = "🔄";

/// Success emoji: `cformat!("{SUCCESS_EMOJI} <green>message</>")`
pub const SUCCESS_EMOJI: &str = "✅";

/// Error emoji: `cformat!("{ERROR_EMOJI} <red>message</>")`
pub const ERROR_EMOJI: &str = "❌";

/// Warning emoji: `cformat!("{WARNING_EMOJI} <yellow>message</>")`
pub const WARNING_EMOJI: &str = "🟡";

/// Hint emoji: `cformat!("{HINT_EMOJI} <dim>message</>")`
pub const HINT_EMOJI: &str = "💡";

/// Info emoji - neutral status
pub const INFO_EMOJI: &str = "⚪";

/// Prompt emoji - questions requiring user input
pub const PROMPT_EMOJI: &str = "❓";

// ============================================================================
// Message Formatting Functions
// ============================================================================
//
// Canonical formatting for each message type, used by both the UI layer and
// error Display impls so styling stays consistent.

/// Format an error message with emoji and red styling.
///
/// Content can include inner styling like `<bold>`:
/// ```
/// use color_print::cformat;
/// use pkgflow::styling::error_message;
///
/// let branch = "main";
/// let msg = error_message(cformat!("Cannot push to <bold>{branch}</>"));
/// ```
pub fn error_message(content: impl AsRef<str>) -> String {
    cformat!("{ERROR_EMOJI} <red>{}</>", content.as_ref())
}

/// Format a hint message with emoji and dim styling
pub fn hint_message(content: impl AsRef<str>) -> String {
    cformat!("{HINT_EMOJI} <dim>{}</>", content.as_ref())
}

/// Format a warning message with emoji and yellow styling
pub fn warning_message(content: impl AsRef<str>) -> String {
    cformat!("{WARNING_EMOJI} <yellow>{}</>", content.as_ref())
}

/// Format a success message with emoji and green styling
pub fn success_message(content: impl AsRef<str>) -> String {
    cformat!("{SUCCESS_EMOJI} <green>{}</>", content.as_ref())
}

/// Format a progress message with emoji and cyan styling
pub fn progress_message(content: impl AsRef<str>) -> String {
    cformat!("{PROGRESS_EMOJI} <cyan>{}</>", content.as_ref())
}

/// Format an info message with emoji (no color - neutral status)
pub fn info_message(content: impl AsRef<str>) -> String {
    cformat!("{INFO_EMOJI} {}", content.as_ref())
}

/// Format a branch name for display (bold cyan)
pub fn format_branch(name: impl AsRef<str>) -> String {
    cformat!("<cyan><bold>{}</></>", name.as_ref())
}

/// Formats text with a gutter (single-space with background color) on each line.
///
/// Creates a subtle visual separator for quoted content like commands or git
/// stderr. The gutter appears at column 0, followed by a space, so content
/// starts at column 2 - aligned with message symbols (1 char) + space.
///
/// # Example
/// ```
/// use pkgflow::styling::format_with_gutter;
///
/// print!("{}", format_with_gutter("$ git fetch --all"));
/// ```
pub fn format_with_gutter(content: &str) -> String {
    let gutter = GUTTER;
    let lines: Vec<String> = content
        .lines()
        .map(|line| format!("{gutter} {gutter:#} {line}"))
        .collect();
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message() {
        let msg = error_message("Something went wrong");
        assert!(msg.contains("❌"));
        assert!(msg.contains("Something went wrong"));
    }

    #[test]
    fn test_success_message() {
        let msg = success_message("Operation completed");
        assert!(msg.contains("✅"));
        assert!(msg.contains("Operation completed"));
    }

    #[test]
    fn test_warning_message() {
        let msg = warning_message("Deprecated option");
        assert!(msg.contains("🟡"));
        assert!(msg.contains("Deprecated option"));
    }

    #[test]
    fn test_hint_message() {
        let msg = hint_message("Try --help");
        assert!(msg.contains("💡"));
    }

    #[test]
    fn test_gutter_prefixes_every_line() {
        let formatted = format_with_gutter("one\ntwo");
        let lines: Vec<&str> = formatted.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(" one"));
        assert!(lines[1].ends_with(" two"));
    }

    #[test]
    fn test_gutter_style() {
        // BrightWhite background is ANSI 107
        let rendered = GUTTER.render().to_string();
        assert!(rendered.contains("107"));
    }
}
