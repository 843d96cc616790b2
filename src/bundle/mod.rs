//! Bundle fixup engine: context, closure, platform primitives and stagers.

pub mod closure;
pub mod context;
pub mod modules;
pub mod platform;
pub mod plugins;
pub mod resources;
pub mod utils;

pub use closure::ClosureEngine;
pub use context::{BundleContext, DistType, InstallEnv};
pub use platform::{Dependency, Disposition, Platform};
