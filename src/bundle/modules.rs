//! GTK/GIO loader-module staging and cache regeneration.
//!
//! For the `full` distribution flavor the loader modules (pixbuf format
//! loaders, input methods, GIO extensions) are copied into bundle-relative
//! directories and their loader caches regenerated with paths rewritten to
//! be bundle-relative. The staged modules then go through the closure
//! engine like any other binary.

use std::path::{Path, PathBuf};

use crate::bundle::closure::ClosureEngine;
use crate::bundle::context::BundleContext;
use crate::bundle::platform::Platform;
use crate::bundle::utils::{fs as fs_utils, process};
use crate::error::Result;

/// Loader-cache flavor of a module category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKind {
    /// `gdk-pixbuf-query-loaders`, cache captured and rewritten.
    PixbufLoaders,
    /// `gtk-query-immodules-3.0`, cache captured and rewritten.
    ImModules,
    /// `gio-querymodules`, writes its cache file itself.
    GioModules,
}

/// One entry of the per-platform module staging table.
#[derive(Debug, Clone)]
pub struct ModuleStage {
    /// Bundle-relative destination directory.
    pub dest_dir: &'static str,
    /// Toolchain directory the modules are copied from.
    pub source_dir: PathBuf,
    pub kind: CacheKind,
}

/// Path substitutions applied line by line to captured cache output.
#[derive(Debug, Clone)]
pub struct CacheRewrite {
    /// (needle, replacement) pairs.
    pub subs: Vec<(String, String)>,
    /// Replace only a needle that starts the line (quoted module paths);
    /// unanchored rules replace every occurrence.
    pub anchored: bool,
}

impl CacheRewrite {
    pub fn apply(&self, line: &str) -> String {
        let mut line = line.to_string();
        for (needle, replacement) in &self.subs {
            if self.anchored {
                if let Some(rest) = line.strip_prefix(needle) {
                    line = format!("{replacement}{rest}");
                }
            } else {
                line = line.replace(needle, replacement);
            }
        }
        line
    }
}

/// Stages every module category of the platform's catalogue and feeds the
/// staged directories through the closure engine.
pub fn stage_gtk_modules(
    engine: &mut ClosureEngine<'_>,
    platform: &dyn Platform,
    ctx: &BundleContext,
) -> Result<()> {
    for stage in platform.gtk_module_catalogue(ctx) {
        let dest_rel = Path::new(stage.dest_dir);
        std::fs::create_dir_all(ctx.abs(dest_rel))?;
        if stage.source_dir.is_dir() {
            let mut names: Vec<_> = std::fs::read_dir(&stage.source_dir)?
                .collect::<std::io::Result<Vec<_>>>()?
                .into_iter()
                .map(|e| e.file_name())
                .collect();
            names.sort();
            for name in names {
                let src = stage.source_dir.join(&name);
                if platform.probe_binary(&src, true)? {
                    fs_utils::copy_file(&src, &ctx.abs(dest_rel.join(&name)))?;
                }
            }
        }
        generate_cache(platform, ctx, &stage)?;
        engine.fix_directory(dest_rel, false)?;
    }
    Ok(())
}

fn generate_cache(platform: &dyn Platform, ctx: &BundleContext, stage: &ModuleStage) -> Result<()> {
    let dest_abs = ctx.abs(stage.dest_dir);
    match stage.kind {
        CacheKind::GioModules => {
            // giomodule.cache is written by the tool directly.
            let mut cmd = platform.tool_command(ctx, "gio-querymodules");
            cmd.arg(&dest_abs);
            process::run_status(cmd)
        }
        CacheKind::PixbufLoaders => {
            let mut cmd = platform.tool_command(ctx, "gdk-pixbuf-query-loaders");
            cmd.env("GDK_PIXBUF_MODULEDIR", &dest_abs);
            query_and_rewrite(platform, ctx, stage, cmd)
        }
        CacheKind::ImModules => {
            let mut cmd = platform.tool_command(ctx, "gtk-query-immodules-3.0");
            cmd.env("GTK_EXE_PREFIX", &ctx.prefix);
            query_and_rewrite(platform, ctx, stage, cmd)
        }
    }
}

/// Captures the cache generator's output, rewrites build-prefix paths to
/// bundle-relative ones and writes the expected `<moddir>.cache` file.
fn query_and_rewrite(
    platform: &dyn Platform,
    ctx: &BundleContext,
    stage: &ModuleStage,
    cmd: std::process::Command,
) -> Result<()> {
    let stdout = process::run_capture(cmd)?;
    let rewrite = platform.cache_rewrite(ctx, stage.kind);
    let cache_file = PathBuf::from(format!("{}.cache", ctx.abs(stage.dest_dir).display()));
    let mut out = String::new();
    for line in stdout.split('\n') {
        out.push_str(&rewrite.apply(line));
        out.push('\n');
    }
    std::fs::write(&cache_file, out)?;
    log::info!("wrote {}", cache_file.display());
    Ok(())
}
