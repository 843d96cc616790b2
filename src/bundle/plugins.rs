//! Qt plugin staging and `qt.conf` generation.
//!
//! A fixed per-platform catalogue of UI-toolkit plugins (image format
//! loaders, platform integration, icon engines, style plugins) is copied
//! into bundle-relative plugin directories and fed through the closure
//! engine. `qt.conf` points Qt's plugin search at the bundled copy.

use std::io::Write;

use crate::bundle::closure::ClosureEngine;
use crate::bundle::context::BundleContext;
use crate::bundle::platform::Platform;
use crate::bundle::utils::fs as fs_utils;
use crate::error::{Error, Result};

/// Writes `<bindir>/qt.conf` declaring the bundle-relative plugin path.
pub fn write_qt_conf(ctx: &BundleContext) -> Result<()> {
    std::fs::create_dir_all(ctx.abs(ctx.lib_dir.join("qt")))?;
    let conf_path = ctx.abs(ctx.bin_dir.join("qt.conf"));
    if let Some(parent) = conf_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::File::create(&conf_path)?;
    writeln!(file, "[Paths]")?;
    writeln!(file, "Plugins=../{}/qt", ctx.lib_dir.display())?;
    log::info!("wrote {}", conf_path.display());
    Ok(())
}

/// Stages the platform's Qt plugin catalogue and seeds every staged
/// category directory.
///
/// Plugins absent from the toolchain installation are skipped; partial Qt
/// installs are normal (e.g. no svg module).
pub fn stage_qt_plugins(
    engine: &mut ClosureEngine<'_>,
    platform: &dyn Platform,
    ctx: &BundleContext,
) -> Result<()> {
    for (category, plugins) in platform.qt_plugin_catalogue() {
        let dest_rel = ctx.lib_dir.join("qt").join(category);
        std::fs::create_dir_all(ctx.abs(&dest_rel))?;
        for plugin in *plugins {
            let src = ctx.qt_plugin_dir.join(category).join(plugin);
            if !src.exists() {
                log::debug!("{} not installed, skipping", src.display());
                continue;
            }
            fs_utils::copy_file(&src, &ctx.abs(dest_rel.join(plugin)))?;
        }
        engine.fix_directory(&dest_rel, true)?;
    }
    Ok(())
}

/// Stages the platform's auxiliary host binaries into the executable
/// directory and fixes them (Windows needs `gdbus.exe` next to the app).
pub fn stage_aux_binaries(
    engine: &mut ClosureEngine<'_>,
    platform: &dyn Platform,
    ctx: &BundleContext,
) -> Result<()> {
    for name in platform.aux_binaries() {
        let src = platform
            .resolve_aux(ctx, name)
            .ok_or_else(|| Error::BinaryNotFound {
                name: (*name).to_string(),
            })?;
        let key = ctx.bin_dir.join(name);
        fs_utils::copy_file(&src, &ctx.abs(&key))?;
        engine.fix_binary(&key, &key, false)?;
    }
    Ok(())
}
