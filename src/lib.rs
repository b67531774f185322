// Library crate root.
//
// This crate is used both as a binary (src/main.rs) and as a library.
// Keeping modules here prevents "dead_code" warnings for public APIs that are
// intentionally exported for downstream crates.

pub mod desc;
pub mod geom;
pub mod merge;
pub mod planner;
pub mod tabs;
pub mod gcode;

#[cfg(test)]
pub mod test_helpers;
