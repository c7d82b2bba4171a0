//! Color constants for the terminal user interface.

use ratatui::style::Color;

use crate::fields::Pole;

/// Used for the photo pole
pub const GOLD: Color = Color::Rgb(255, 215, 0);
/// Used for the film pole
pub const DARK_GREEN: Color = Color::Rgb(0, 80, 0);
/// Used for the album/DVD pole
pub const DARK_PURPLE: Color = Color::Rgb(86, 60, 92);
/// Used for the communication pole
pub const DARK_RED: Color = Color::Rgb(114, 0, 0);

pub fn pole_color(pole: Pole) -> Color {
    match pole {
        Pole::Photo => GOLD,
        Pole::Film => DARK_GREEN,
        Pole::Dvd => DARK_PURPLE,
        Pole::Com => DARK_RED,
    }
}

/// Readable foreground on top of `bg`.
pub fn text_on(bg: Color) -> Color {
    match bg {
        GOLD => Color::Rgb(20, 20, 20),
        _ => Color::White,
    }
}
