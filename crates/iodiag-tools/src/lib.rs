pub mod common;
pub mod console;
