use nu_ansi_term::Color;

use crate::color::paint;

pub const DEFAULT_EXIT_CODE: i32 = 1;

/// Exit code when a generation was interrupted by the user
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

fn diagnostic(indicator: Color, label: &str, text: &str) -> String {
    format!(
        "{} {}",
        paint(indicator.bold(), label),
        paint(Color::Default.bold(), text)
    )
}

pub(crate) fn error_internal(text: &str) {
    eprintln!("{}", diagnostic(Color::Red, "error:", text));
}

pub(crate) fn warn_internal(text: &str) {
    eprintln!("{}", diagnostic(Color::Yellow, "warning:", text));
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => ({
        let formatted = format!($($arg)*);
        $crate::utils::errors::warn_internal(&formatted);
    })
}

#[macro_export]
macro_rules! die {
    ($($arg:tt)*) => ({
        let formatted = format!($($arg)*);
        $crate::utils::errors::error_internal(&formatted);
        ::std::process::exit($crate::utils::errors::DEFAULT_EXIT_CODE);
    })
}
