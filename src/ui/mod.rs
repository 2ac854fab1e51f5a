/// User interface building blocks
///
/// - grid.rs: the scrollable three-column photo grid
/// - picker.rs: album selection
/// - alert.rs: the "no access" modal
/// - settings.rs: library access settings

pub mod alert;
pub mod grid;
pub mod picker;
pub mod settings;
