//! fix-bundle - post-install dependency closure and relocation.
//!
//! Invoked by the build system as an install hook. Copies every foreign
//! shared-library dependency into the staged bundle and rewrites link
//! metadata so the result is self-contained.

use std::process;

fn main() {
    // MESON_INSTALL_QUIET demotes progress output; RUST_LOG still overrides.
    let default_level = if std::env::var_os("MESON_INSTALL_QUIET").is_some() {
        "warn"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    // Uniform exit codes: 0 success or intentional skip, -1 on any failure.
    let exit_code = match bundle_fixup::cli::run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            -1
        }
    };

    process::exit(exit_code);
}
