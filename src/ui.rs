//! The narrow callback surface the core consumes for user interaction.
//!
//! Flows never print directly; they talk to a [`HostUi`]. The terminal
//! implementation here backs the CLI; hosts with their own surfaces (a GUI,
//! a test harness) provide their own implementation. All methods may be
//! called from the operation worker thread, so implementations must be
//! `Send + Sync` and marshal to their own UI thread as needed.

use std::io::{self, IsTerminal, Write};

use color_print::cformat;

use crate::styling::{self, PROMPT_EMOJI, WARNING_EMOJI, eprint, eprintln, format_with_gutter};

/// Style token for [`HostUi::log`] lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStyle {
    Cyan,
    Green,
    Red,
    Yellow,
    White,
    Dim,
    Purple,
}

/// Severity for [`HostUi::toast`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// What the host can do; the flow engine reads this to select prompt-heavy
/// vs prompt-light paths.
#[derive(Debug, Clone, Copy)]
pub struct Capabilities {
    /// Menus, confirmations and inputs reach a human.
    pub interactive: bool,
    /// No human is attached; prompts must not block.
    pub headless: bool,
}

/// A rendered plan step handed to [`HostUi::show_preview`].
#[derive(Debug, Clone)]
pub struct PreviewStep {
    pub index: usize,
    pub description: String,
    /// `$ git …` rendering; `None` for callback-backed steps.
    pub command: Option<String>,
    pub destructive: bool,
}

/// Host-provided interaction surface consumed by the core.
///
/// The progress-sink methods default to no-ops so headless hosts only
/// implement what they need.
pub trait HostUi: Send + Sync {
    /// Append a log line. Non-blocking.
    fn log(&self, style: LogStyle, message: &str);

    /// Show a menu; returns the selected index or `None` for cancel.
    fn show_menu(
        &self,
        title: &str,
        options: &[String],
        default_index: Option<usize>,
    ) -> Option<usize>;

    /// Yes/no question.
    fn confirm(&self, question: &str) -> bool;

    /// Free-form input; returns `None` for cancel.
    fn ask_input(&self, prompt: &str, default: Option<&str>) -> Option<String>;

    /// Present an operation plan; returns true to proceed.
    fn show_preview(&self, steps: &[PreviewStep], dry_run: bool) -> bool;

    /// As [`HostUi::confirm`], with explicit destructive styling.
    fn show_confirmation(&self, title: &str, message: &str, destructive: bool) -> bool;

    fn set_progress(&self, _fraction: f64, _text: Option<&str>) {}

    fn set_status(&self, _text: &str) {}

    fn append_detail(&self, _line: &str, _style: Option<LogStyle>) {}

    fn toast(&self, _message: &str, _level: ToastLevel) {}

    fn capabilities(&self) -> Capabilities;
}

/// Terminal implementation used by the CLI. Status goes to stderr so data
/// output stays pipeable.
pub struct TerminalUi;

impl TerminalUi {
    pub fn new() -> Self {
        Self
    }

    fn read_line() -> Option<String> {
        let mut response = String::new();
        io::stdin().read_line(&mut response).ok()?;
        Some(response.trim().to_string())
    }
}

impl Default for TerminalUi {
    fn default() -> Self {
        Self::new()
    }
}

impl HostUi for TerminalUi {
    fn log(&self, style: LogStyle, message: &str) {
        let line = match style {
            LogStyle::Cyan => cformat!("<cyan>{message}</>"),
            LogStyle::Green => cformat!("<green>{message}</>"),
            LogStyle::Red => cformat!("<red>{message}</>"),
            LogStyle::Yellow => cformat!("<yellow>{message}</>"),
            LogStyle::White => message.to_string(),
            LogStyle::Dim => cformat!("<dim>{message}</>"),
            LogStyle::Purple => cformat!("<magenta>{message}</>"),
        };
        eprintln!("{line}");
    }

    fn show_menu(
        &self,
        title: &str,
        options: &[String],
        default_index: Option<usize>,
    ) -> Option<usize> {
        if !io::stdin().is_terminal() {
            return default_index;
        }

        eprintln!();
        eprintln!("{}", cformat!("<cyan><bold>{title}</></>"));
        for (i, option) in options.iter().enumerate() {
            let marker = if Some(i) == default_index { "*" } else { " " };
            eprintln!("{}", cformat!(" {marker}<bold>{}</>. {option}", i + 1));
        }

        loop {
            match default_index {
                Some(d) => eprint!("{PROMPT_EMOJI} Choice [{}]: ", d + 1),
                None => eprint!("{PROMPT_EMOJI} Choice (empty to cancel): "),
            }
            let _ = styling::stderr().flush();

            let response = Self::read_line()?;
            if response.is_empty() {
                return default_index;
            }
            match response.parse::<usize>() {
                Ok(n) if n >= 1 && n <= options.len() => return Some(n - 1),
                _ => eprintln!(
                    "{}",
                    styling::warning_message(format!("Enter a number between 1 and {}", options.len()))
                ),
            }
        }
    }

    fn confirm(&self, question: &str) -> bool {
        if !io::stdin().is_terminal() {
            return false;
        }
        let bold = anstyle::Style::new().bold();
        eprint!("{PROMPT_EMOJI} {question} {bold}[y/N]{bold:#} ");
        let _ = styling::stderr().flush();
        Self::read_line().is_some_and(|r| r.eq_ignore_ascii_case("y"))
    }

    fn ask_input(&self, prompt: &str, default: Option<&str>) -> Option<String> {
        if !io::stdin().is_terminal() {
            return default.map(str::to_owned);
        }
        match default {
            Some(d) => eprint!("{PROMPT_EMOJI} {prompt} [{d}]: "),
            None => eprint!("{PROMPT_EMOJI} {prompt}: "),
        }
        let _ = styling::stderr().flush();

        let response = Self::read_line()?;
        if response.is_empty() {
            default.map(str::to_owned)
        } else {
            Some(response)
        }
    }

    fn show_preview(&self, steps: &[PreviewStep], dry_run: bool) -> bool {
        let destructive_count = steps.iter().filter(|s| s.destructive).count();

        eprintln!();
        eprintln!("{}", cformat!("<cyan><bold>OPERATION PLAN</></>"));
        for step in steps {
            let label = if step.destructive {
                cformat!("<yellow>⚠️  {}. {}</>", step.index, step.description)
            } else {
                cformat!("<cyan>▶ {}. {}</>", step.index, step.description)
            };
            eprintln!("{label}");
            if let Some(command) = &step.command {
                eprintln!("{}", format_with_gutter(command));
            }
        }
        eprintln!();

        if destructive_count > 0 {
            eprintln!(
                "{}",
                styling::warning_message(format!(
                    "{destructive_count} destructive operation(s) out of {} total",
                    steps.len()
                ))
            );
        } else {
            eprintln!(
                "{}",
                styling::info_message(format!("{} safe operation(s)", steps.len()))
            );
        }

        if dry_run {
            eprintln!("{}", styling::hint_message("Dry-run: nothing will be executed"));
            return true;
        }

        let question = if destructive_count > 0 {
            format!("{WARNING_EMOJI} Proceed with these operations? (includes destructive actions)")
        } else {
            "Proceed with these operations?".to_string()
        };
        self.confirm(&question)
    }

    fn show_confirmation(&self, title: &str, message: &str, destructive: bool) -> bool {
        if destructive {
            eprintln!("{}", styling::warning_message(title));
        } else {
            eprintln!("{}", styling::info_message(title));
        }
        if !message.is_empty() {
            eprintln!("{}", format_with_gutter(message));
        }
        self.confirm("Continue?")
    }

    fn toast(&self, message: &str, level: ToastLevel) {
        let line = match level {
            ToastLevel::Info => styling::info_message(message),
            ToastLevel::Success => styling::success_message(message),
            ToastLevel::Warning => styling::warning_message(message),
            ToastLevel::Error => styling::error_message(message),
        };
        eprintln!("{line}");
    }

    fn set_status(&self, text: &str) {
        eprintln!("{}", cformat!("<dim>{text}</>"));
    }

    fn capabilities(&self) -> Capabilities {
        let interactive = io::stdin().is_terminal();
        Capabilities {
            interactive,
            headless: !interactive,
        }
    }
}

/// Non-interactive implementation for tests and headless automation.
///
/// Menus return their default, confirmations answer with a configured
/// value, and log lines are captured for assertions.
pub struct HeadlessUi {
    pub auto_confirm: bool,
    lines: std::sync::Mutex<Vec<String>>,
}

impl HeadlessUi {
    pub fn new(auto_confirm: bool) -> Self {
        Self {
            auto_confirm,
            lines: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Everything logged so far, joined with newlines.
    pub fn transcript(&self) -> String {
        self.lines.lock().expect("ui transcript lock").join("\n")
    }

    fn record(&self, line: String) {
        self.lines.lock().expect("ui transcript lock").push(line);
    }
}

impl HostUi for HeadlessUi {
    fn log(&self, _style: LogStyle, message: &str) {
        log::debug!("{message}");
        self.record(message.to_string());
    }

    fn show_menu(
        &self,
        _title: &str,
        _options: &[String],
        default_index: Option<usize>,
    ) -> Option<usize> {
        if self.auto_confirm { default_index.or(Some(0)) } else { None }
    }

    fn confirm(&self, _question: &str) -> bool {
        self.auto_confirm
    }

    fn ask_input(&self, _prompt: &str, default: Option<&str>) -> Option<String> {
        default.map(str::to_owned)
    }

    fn show_preview(&self, steps: &[PreviewStep], _dry_run: bool) -> bool {
        for step in steps {
            self.record(format!("[plan] {}", step.description));
        }
        self.auto_confirm
    }

    fn show_confirmation(&self, title: &str, _message: &str, _destructive: bool) -> bool {
        self.record(format!("[confirm] {title}"));
        self.auto_confirm
    }

    fn toast(&self, message: &str, _level: ToastLevel) {
        self.record(format!("[toast] {message}"));
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            interactive: false,
            headless: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headless_confirm_follows_setting() {
        assert!(HeadlessUi::new(true).confirm("ok?"));
        assert!(!HeadlessUi::new(false).confirm("ok?"));
    }

    #[test]
    fn test_headless_menu_returns_default() {
        let ui = HeadlessUi::new(true);
        assert_eq!(ui.show_menu("t", &["a".into(), "b".into()], Some(1)), Some(1));
        assert_eq!(ui.show_menu("t", &["a".into()], None), Some(0));

        let declined = HeadlessUi::new(false);
        assert_eq!(declined.show_menu("t", &["a".into()], Some(0)), None);
    }

    #[test]
    fn test_headless_transcript_captures_logs() {
        let ui = HeadlessUi::new(true);
        ui.log(LogStyle::Cyan, "probing state");
        ui.toast("done", ToastLevel::Success);
        let transcript = ui.transcript();
        assert!(transcript.contains("probing state"));
        assert!(transcript.contains("done"));
    }
}
