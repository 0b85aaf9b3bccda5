pub mod board_display;
pub mod tui;

pub use tui::{LocalPurse, TuiApp};
