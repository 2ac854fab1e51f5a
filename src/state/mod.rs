/// State management module
///
/// This module handles all application state, including:
/// - The SQLite catalog and its smart albums (library.rs)
/// - Shared data structures (data.rs)
/// - Folder import (import.rs)

pub mod data;
pub mod import;
pub mod library;
