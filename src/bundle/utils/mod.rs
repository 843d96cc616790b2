//! Shared helpers for file staging and tool invocation.

pub mod fs;
pub mod process;
