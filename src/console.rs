//! Console presentation layer.
//!
//! Color support is decided exactly once at startup (`Console::detect`) and
//! the resulting value is threaded by reference into everything that prints.
//! `NO_COLOR` always wins over terminal detection.
//!
//! All human-readable output goes to stderr; stdout is reserved for the
//! machine-readable reporters.

use ::console::{Style, Term};

/// Width of the `=` banner around section headers.
const BANNER_WIDTH: usize = 40;

/// Immutable presentation configuration.
#[derive(Debug, Clone, Copy)]
pub struct Console {
    colors: bool,
}

impl Console {
    /// Detect color support from the terminal and the `NO_COLOR` override.
    pub fn detect() -> Self {
        let colors = std::env::var_os("NO_COLOR").is_none()
            && Term::stderr().features().colors_supported();
        Self { colors }
    }

    /// A console with styling disabled, for tests and captured output.
    pub fn plain() -> Self {
        Self { colors: false }
    }

    pub fn colors_enabled(&self) -> bool {
        self.colors
    }

    fn apply(&self, style: Style, text: &str) -> String {
        if self.colors {
            style.force_styling(true).apply_to(text).to_string()
        } else {
            text.to_string()
        }
    }

    pub fn cyan(&self, text: &str) -> String {
        self.apply(Style::new().cyan(), text)
    }

    pub fn green(&self, text: &str) -> String {
        self.apply(Style::new().green(), text)
    }

    pub fn red(&self, text: &str) -> String {
        self.apply(Style::new().red(), text)
    }

    pub fn yellow(&self, text: &str) -> String {
        self.apply(Style::new().yellow(), text)
    }

    /// Section banner, `=`-framed with the title in cyan.
    pub fn header(&self, msg: &str) {
        eprintln!();
        eprintln!("{}", "=".repeat(BANNER_WIDTH));
        eprintln!(" {}", self.cyan(msg));
        eprintln!("{}", "=".repeat(BANNER_WIDTH));
    }

    pub fn success(&self, msg: &str) {
        eprintln!("{}", self.green(msg));
    }

    pub fn error(&self, msg: &str) {
        eprintln!("{}", self.red(msg));
    }

    pub fn warn(&self, msg: &str) {
        eprintln!("{}", self.yellow(msg));
    }

    /// Plain unstyled line.
    pub fn line(&self, msg: &str) {
        eprintln!("{msg}");
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_console_passes_text_through() {
        let console = Console::plain();
        assert_eq!(console.green("PASS"), "PASS");
        assert_eq!(console.red("FAIL"), "FAIL");
        assert_eq!(console.cyan("header"), "header");
        assert_eq!(console.yellow("warning"), "warning");
    }

    #[test]
    fn test_plain_console_reports_disabled() {
        assert!(!Console::plain().colors_enabled());
    }

    #[test]
    fn test_colored_output_wraps_in_escape_codes() {
        let console = Console { colors: true };
        let styled = console.green("PASS");
        assert!(styled.contains("PASS"));
        assert!(styled.starts_with('\x1b'));
    }
}
