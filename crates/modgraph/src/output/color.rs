//! Color and styling helpers for CLI output.
//!
//! Semantic Color Theme:
//!   - Success:   green   (published snapshots, acyclic graphs)
//!   - Warning:   yellow  (truncated cycle search, skipped manifest lines)
//!   - Error:     red     (cycles, provider outages)
//!   - Info:      cyan    (module identifiers)
//!   - Muted:     dimmed  (field labels, counts)
//!   - Emphasis:  bold    (section headers)

use colored::{ColoredString, Colorize};

use super::OutputConfig;

fn paint(text: &str, config: &OutputConfig, style: fn(&str) -> ColoredString) -> String {
    if config.use_colors {
        style(text).to_string()
    } else {
        text.to_owned()
    }
}

/// Green, for good news.
pub fn success(text: &str, config: &OutputConfig) -> String {
    paint(text, config, |t| t.green())
}

/// Red, for cycles and failures.
pub fn error(text: &str, config: &OutputConfig) -> String {
    paint(text, config, |t| t.red())
}

/// Yellow, for partial results.
pub fn warning(text: &str, config: &OutputConfig) -> String {
    paint(text, config, |t| t.yellow())
}

/// Cyan, for module ids.
pub fn info(text: &str, config: &OutputConfig) -> String {
    paint(text, config, |t| t.cyan())
}

pub(crate) fn dimmed(text: &str, config: &OutputConfig) -> String {
    paint(text, config, |t| t.dimmed())
}

pub(crate) fn bold(text: &str, config: &OutputConfig) -> String {
    paint(text, config, |t| t.bold())
}

#[cfg(test)]
mod tests {
    use super::*;
    use colored::control::set_override;
    use std::sync::{Mutex, MutexGuard};

    static GLOBAL_STATE_MUTEX: Mutex<()> = Mutex::new(());

    struct ColorGuard<'a> {
        _guard: MutexGuard<'a, ()>,
    }

    impl ColorGuard<'_> {
        fn new() -> Self {
            let guard = GLOBAL_STATE_MUTEX
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            set_override(true);
            Self { _guard: guard }
        }
    }

    impl Drop for ColorGuard<'_> {
        fn drop(&mut self) {
            set_override(false);
        }
    }

    #[test]
    fn semantic_colors_emit_ansi_codes() {
        let _guard = ColorGuard::new();
        let config = OutputConfig::new(true);

        for styled in [
            success("ok", &config),
            error("cycle", &config),
            warning("truncated", &config),
            info("music", &config),
            bold("Load order", &config),
        ] {
            assert!(styled.contains("\x1b["), "expected ANSI codes in {styled:?}");
        }
    }

    #[test]
    fn plain_text_without_colors() {
        let config = OutputConfig::new(false);
        assert_eq!(success("ok", &config), "ok");
        assert_eq!(error("cycle", &config), "cycle");
        assert_eq!(dimmed("3 modules", &config), "3 modules");
    }
}
