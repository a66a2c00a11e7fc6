use crate::cli::ColorMode;
use lazy_static::lazy_static;
use nu_ansi_term::{Color, Style};
use std::sync::atomic::{AtomicBool, Ordering};

lazy_static! {
    /// The `model>` marker printed before a streamed response
    pub(crate) static ref MODEL_PROMPT: Style = Color::Green.bold();
}

static USE_COLOR: AtomicBool = AtomicBool::new(true);

pub(crate) fn configure_color(cmode: ColorMode) {
    USE_COLOR.store(matches!(cmode, ColorMode::On), Ordering::Relaxed);
}

pub(crate) fn color_mode() -> ColorMode {
    match USE_COLOR.load(Ordering::Relaxed) {
        true => ColorMode::On,
        false => ColorMode::Off,
    }
}

fn render(mode: ColorMode, style: Style, text: &str) -> String {
    match mode {
        ColorMode::On => style.paint(text).to_string(),
        ColorMode::Off => text.to_string(),
    }
}

/// Styles `text` unless color was turned off with [`configure_color`].
pub(crate) fn paint(style: Style, text: &str) -> String {
    render(color_mode(), style, text)
}
