//! Post-install bundle fixup for self-contained desktop application bundles.
//!
//! After the build system installs binaries, libraries and GTK/Qt plugins
//! into a staging prefix, this crate walks the prefix, computes the
//! transitive closure of shared-library dependencies that are not part of
//! the target OS base system, copies them into the bundle and rewrites link
//! metadata so the bundle is relocatable:
//! - Linux: copy only (relative RPATHs are baked in at link time)
//! - macOS: `install_name_tool` load-command rewriting to `@executable_path`
//! - Windows: DLL co-location next to the consuming executables
//!
//! It can be used both as the `fix-bundle` install hook and as a library.

pub mod bundle;
pub mod cli;
pub mod error;

// Re-export commonly used types
pub use error::{Error, Result};
