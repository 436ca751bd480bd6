//! Request and report files

mod loader;

pub use loader::*;
