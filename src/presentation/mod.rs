//! Presentation layer handling terminal UI and user input.
//!
//! This module renders the three wizard screens with ratatui and maps
//! keyboard input onto application actions.

pub mod ui;
pub mod input;

pub use ui::*;
pub use input::*;
