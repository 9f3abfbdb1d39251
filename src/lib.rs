#![warn(clippy::missing_docs_in_private_items)]
#![warn(rustdoc::missing_crate_level_docs)]
#![doc = include_str!("../README.md")]

pub mod hook;
pub mod lifecycle;
pub mod memory;
pub mod patch;
pub mod registry;
