//! Color constants for the terminal user interface.

use ratatui::style::Color;

use crate::fields::Status;

/// App name, selected tab and primary buttons.
pub const BRAND: Color = Color::Rgb(123, 25, 132);
/// Border of the focused form field or board column.
pub const GOLD: Color = Color::Rgb(255, 215, 0);

pub const TODO: Color = Color::Rgb(250, 195, 255);
pub const IN_PROGRESS: Color = Color::Rgb(133, 217, 241);
pub const COMPLETED: Color = Color::Rgb(206, 255, 204);

pub const ERROR: Color = Color::Rgb(220, 60, 60);
pub const SUCCESS: Color = Color::Rgb(60, 170, 90);

/// Header color of a status section or column.
pub fn status_color(status: Status) -> Color {
    match status {
        Status::ToDo => TODO,
        Status::InProgress => IN_PROGRESS,
        Status::Completed => COMPLETED,
    }
}
