//! macOS platform primitives: `otool -L` listing and `install_name_tool`
//! load-command rewriting.
//!
//! Each binary gets a single batched `install_name_tool` invocation: a
//! `-id` for libraries plus one `-change` per foreign dependency,
//! redirecting resolution to `@executable_path`-relative bundle paths.
//! Framework dependencies keep their internal `Versions/...` structure.
//!
//! The internationalization runtime is special: dependencies on
//! `libintl.N.dylib` are redirected to the bundled relocatable shim
//! `libintl-reloc.dylib`, and the consuming binary's
//! `_libintl_bindtextdomain` symbol reference is patched in place (fixed
//! width, so file offsets never move).

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::LazyLock;

use regex::Regex;

use crate::bundle::context::BundleContext;
use crate::bundle::modules::{CacheKind, ModuleStage};
use crate::bundle::platform::{
    probe_object, Dependency, Disposition, ObjectKind, Platform,
};
use crate::bundle::resources;
use crate::bundle::utils::{fs as fs_utils, process};
use crate::error::Result;

// `/path/to/libfoo.1.dylib (compatibility version ...)`
static DYLIB_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([/A-Za-z\.].+\.dylib)\s.*").unwrap_or_else(|e| panic!("otool regex: {e}"))
});
// `/path/to/Qt.framework/Versions/5/Qt (compatibility version ...)`;
// the sub-path after the framework root is captured separately.
static FRAMEWORK_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([/A-Za-z\.].+\.framework)([^A-Za-z0-9][A-Za-z0-9/]*)\s.*")
        .unwrap_or_else(|e| panic!("otool regex: {e}"))
});
static INTL_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^libintl\.\d+\.dylib$").unwrap_or_else(|e| panic!("intl regex: {e}"))
});

const INTL_RELOC: &str = "libintl-reloc.dylib";

#[derive(Debug)]
pub struct MacosPlatform;

impl MacosPlatform {
    pub fn new() -> Self {
        MacosPlatform
    }

    fn parse_otool(output: &str) -> Vec<Dependency> {
        let mut deps = Vec::new();
        for line in output.split('\n') {
            if let Some(caps) = DYLIB_LINE.captures(line) {
                deps.push(Dependency::new(&caps[1], &caps[1]));
            } else if let Some(caps) = FRAMEWORK_LINE.captures(line) {
                deps.push(Dependency::new(&caps[1], &caps[1]).with_subpath(&caps[2]));
            }
        }
        deps
    }

    fn is_intl(dep: &Dependency) -> bool {
        Path::new(&dep.declared)
            .file_name()
            .and_then(OsStr::to_str)
            .is_some_and(|name| INTL_NAME.is_match(name))
    }

    fn is_reloc_shim(file: &Path) -> bool {
        file.file_name() == Some(OsStr::new(INTL_RELOC))
    }
}

impl Default for MacosPlatform {
    fn default() -> Self {
        Self::new()
    }
}

/// Full rewrite instruction set for one binary, executed as a single
/// `install_name_tool` invocation.
#[derive(Debug, PartialEq, Eq)]
struct RewritePlan {
    /// New self-identity (`-id`), libraries only.
    set_id: Option<String>,
    /// Load-command redirections (`-change from to`).
    changes: Vec<(String, String)>,
    /// Whether the intl symbol reference must be patched afterwards.
    patch_intl: bool,
}

impl RewritePlan {
    fn build(
        platform: &MacosPlatform,
        ctx: &BundleContext,
        file: &Path,
        fix_id: bool,
        deps: &[Dependency],
    ) -> Self {
        let set_id = fix_id.then(|| format!("@executable_path/../{}", file.display()));
        let in_reloc_shim = MacosPlatform::is_reloc_shim(file);
        let mut changes = Vec::new();
        let mut patch_intl = false;
        for dep in deps {
            if platform.classify(dep) != Disposition::Bundle {
                continue;
            }
            let sub = dep.subpath.as_deref().unwrap_or("");
            let from = format!("{}{}", dep.declared, sub);
            let to = if MacosPlatform::is_intl(dep) && !in_reloc_shim {
                patch_intl = true;
                format!(
                    "@executable_path/../{}",
                    ctx.lib_dir.join(INTL_RELOC).display()
                )
            } else {
                format!(
                    "@executable_path/../{}{}",
                    platform.dest_key(ctx, dep).display(),
                    sub
                )
            };
            changes.push((from, to));
        }
        RewritePlan {
            set_id,
            changes,
            patch_intl,
        }
    }
}

impl Platform for MacosPlatform {
    fn name(&self) -> &'static str {
        "macos"
    }

    fn probe_binary(&self, path: &Path, deref: bool) -> Result<bool> {
        probe_object(path, deref, ObjectKind::MachO)
    }

    fn list_dependencies(&self, ctx: &BundleContext, file: &Path) -> Result<Vec<Dependency>> {
        let mut cmd = Command::new("otool");
        cmd.args(["-L", "-X"]).arg(ctx.abs(file));
        let stdout = process::run_capture(cmd)?;
        Ok(Self::parse_otool(&stdout))
    }

    fn classify(&self, dep: &Dependency) -> Disposition {
        if dep.declared.starts_with("/usr/lib/") || dep.declared.starts_with("/System/") {
            Disposition::System
        } else {
            Disposition::Bundle
        }
    }

    fn dest_key(&self, ctx: &BundleContext, dep: &Dependency) -> PathBuf {
        match Path::new(&dep.declared).file_name() {
            Some(name) => ctx.lib_dir.join(name),
            None => ctx.lib_dir.join(&dep.declared),
        }
    }

    fn stage(&self, ctx: &BundleContext, key: &Path, dep: &Dependency) -> Result<PathBuf> {
        match &dep.subpath {
            None => {
                fs_utils::copy_file(&dep.source, &ctx.abs(key))?;
                Ok(key.to_path_buf())
            }
            Some(sub) => {
                // Frameworks are copied preserving Versions/... internals;
                // copy_file creates the intermediate directories.
                let rel = PathBuf::from(format!("{}{}", key.display(), sub));
                let src = PathBuf::from(format!("{}{}", dep.source.display(), sub));
                fs_utils::copy_file(&src, &ctx.abs(&rel))?;
                Ok(rel)
            }
        }
    }

    fn rewrite(
        &self,
        ctx: &BundleContext,
        file: &Path,
        fix_id: bool,
        deps: &[Dependency],
    ) -> Result<()> {
        let plan = RewritePlan::build(self, ctx, file, fix_id, deps);
        let mut cmd = Command::new("install_name_tool");
        if let Some(id) = &plan.set_id {
            cmd.arg("-id").arg(id);
        }
        for (from, to) in &plan.changes {
            cmd.arg("-change").arg(from).arg(to);
        }
        cmd.arg(ctx.abs(file));
        process::run_capture(cmd)?;
        if plan.patch_intl {
            fs_utils::patch_file_bytes(
                &ctx.abs(file),
                &[(b"_libintl_bindtextdomain", b"_X_reloc_bindtextdomain")],
            )?;
        }
        Ok(())
    }

    fn schedule_deps(
        &self,
        _ctx: &BundleContext,
        file: &Path,
        deps: &[Dependency],
    ) -> Vec<Dependency> {
        // Redirected intl dependencies are never copied; the shim ships
        // with the application and schedules the real libintl itself.
        let in_reloc_shim = Self::is_reloc_shim(file);
        deps.iter()
            .filter(|dep| self.classify(dep) == Disposition::Bundle)
            .filter(|dep| in_reloc_shim || !Self::is_intl(dep))
            .cloned()
            .collect()
    }

    fn qt_plugin_catalogue(&self) -> &'static [(&'static str, &'static [&'static str])] {
        &[
            ("imageformats", &["libqsvg.dylib", "libqicns.dylib"]),
            ("iconengines", &["libqsvgicon.dylib"]),
            ("platforms", &["libqcocoa.dylib"]),
            ("styles", &["libqmacstyle.dylib"]),
        ]
    }

    fn gtk_module_catalogue(&self, ctx: &BundleContext) -> Vec<ModuleStage> {
        vec![
            ModuleStage {
                dest_dir: "lib/gdk-pixbuf-loaders",
                source_dir: ctx.gdk_pixbuf_dir.clone(),
                kind: CacheKind::PixbufLoaders,
            },
            ModuleStage {
                dest_dir: "lib/gio-modules",
                source_dir: ctx.gio_module_dir.clone(),
                kind: CacheKind::GioModules,
            },
            ModuleStage {
                dest_dir: "lib/gtk-3.0/immodules",
                source_dir: ctx.im_module_dir.clone(),
                kind: CacheKind::ImModules,
            },
        ]
    }

    fn stage_resources(&self, ctx: &BundleContext) -> Result<()> {
        let root = ctx.sys_root_or("/usr/local");
        resources::symlink_qm_aliases(&ctx.abs("share/gapr/translations"))?;
        for theme in ["hicolor", "Adwaita"] {
            resources::copy_icon_theme(
                &root.join("share/icons").join(theme),
                &ctx.abs(Path::new("share/icons").join(theme)),
                Some(self.tool_command(ctx, "gtk3-update-icon-cache")),
            )?;
        }
        resources::copy_message_catalogs(&root, ctx)?;
        fs_utils::copy_dir(
            &root.join("share/themes/Mac"),
            &ctx.abs("share/themes/Mac"),
        )?;
        Ok(())
    }
}
