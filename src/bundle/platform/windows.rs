//! Windows platform primitives: `objdump -p` listing and DLL co-location.
//!
//! PE binaries need no metadata rewriting; runtime resolution follows the
//! implicit DLL search order, so it is enough to place every required DLL
//! next to the consuming executables. Works both natively and when
//! cross-compiling from a mingw sysroot (GTK/GIO host tools then run
//! through wine).

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::LazyLock;

use regex::Regex;

use crate::bundle::context::BundleContext;
use crate::bundle::modules::{CacheKind, CacheRewrite, ModuleStage};
use crate::bundle::platform::{Dependency, Disposition, Platform};
use crate::bundle::resources;
use crate::bundle::utils::process;
use crate::error::Result;

static DLL_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*DLL Name:\s*(\S.*\.dll)\s*$").unwrap_or_else(|e| panic!("pe regex: {e}"))
});
static BINARY_EXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\.(dll|exe)$").unwrap_or_else(|e| panic!("ext regex: {e}"))
});
static SYSTEM_DIR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[a-z]:[\\/]Windows[\\/]System32[\\/]")
        .unwrap_or_else(|e| panic!("sysdir regex: {e}"))
});
static MINGW_RUNTIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)mingw").unwrap_or_else(|e| panic!("mingw regex: {e}")));

#[derive(Debug)]
pub struct WindowsPlatform {
    /// Directories DLL names resolve against: the sysroot's `bin` when
    /// cross-compiling, the host search path otherwise.
    search_path: Vec<PathBuf>,
}

impl WindowsPlatform {
    pub fn new(ctx: &BundleContext) -> Self {
        let search_path = match &ctx.sys_root {
            Some(root) => vec![root.join("bin")],
            None => std::env::var_os("PATH")
                .map(|p| std::env::split_paths(&p).collect())
                .unwrap_or_default(),
        };
        WindowsPlatform { search_path }
    }

    /// Resolves a declared DLL/EXE name to an on-disk file, trying an exact
    /// match first and falling back to a case-insensitive scan (PE headers
    /// do not agree on DLL name casing).
    fn resolve_name(&self, name: &str) -> Option<PathBuf> {
        for dir in &self.search_path {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
            let Ok(entries) = std::fs::read_dir(dir) else {
                continue;
            };
            for entry in entries.flatten() {
                if entry
                    .file_name()
                    .to_str()
                    .is_some_and(|f| f.eq_ignore_ascii_case(name))
                    && entry.path().is_file()
                {
                    return Some(entry.path());
                }
            }
        }
        None
    }

    fn parse_objdump(&self, output: &str) -> Vec<Dependency> {
        let mut deps = Vec::new();
        for line in output.split('\n') {
            let Some(caps) = DLL_NAME.captures(line) else {
                continue;
            };
            let name = &caps[1];
            match self.resolve_name(name) {
                Some(source) => deps.push(Dependency::new(name, source)),
                // Not on the search path: either a system DLL we cannot
                // see from the build host, or genuinely absent.
                None => log::debug!("cannot resolve {name}, skipping"),
            }
        }
        deps
    }
}

impl Platform for WindowsPlatform {
    fn name(&self) -> &'static str {
        "windows"
    }

    fn probe_binary(&self, path: &Path, _deref: bool) -> Result<bool> {
        Ok(path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| BINARY_EXT.is_match(n))
            && path.is_file())
    }

    fn list_dependencies(&self, ctx: &BundleContext, file: &Path) -> Result<Vec<Dependency>> {
        let mut cmd = Command::new(&ctx.objdump);
        cmd.arg("-p").arg(ctx.abs(file));
        let stdout = process::run_capture(cmd)?;
        Ok(self.parse_objdump(&stdout))
    }

    fn classify(&self, dep: &Dependency) -> Disposition {
        let source = dep.source.to_string_lossy();
        if SYSTEM_DIR.is_match(&source) {
            Disposition::System
        } else if MINGW_RUNTIME.is_match(&source) {
            Disposition::Bundle
        } else {
            // Known gap: non-system DLLs outside the mingw runtime are not
            // bundled, only diagnosed.
            Disposition::Ignored
        }
    }

    fn dest_key(&self, ctx: &BundleContext, dep: &Dependency) -> PathBuf {
        // Co-location: DLLs land next to the executables.
        match Path::new(&dep.declared).file_name() {
            Some(name) => ctx.bin_dir.join(name),
            None => ctx.bin_dir.join(&dep.declared),
        }
    }

    fn rewrite(
        &self,
        _ctx: &BundleContext,
        file: &Path,
        _fix_id: bool,
        _deps: &[Dependency],
    ) -> Result<()> {
        // Resolution works through physical placement, not metadata.
        log::debug!("no metadata rewrite for {}", file.display());
        Ok(())
    }

    fn qt_plugin_catalogue(&self) -> &'static [(&'static str, &'static [&'static str])] {
        &[
            ("imageformats", &["qsvg.dll", "qico.dll"]),
            ("iconengines", &["qsvgicon.dll"]),
            ("platforms", &["qwindows.dll"]),
            ("styles", &["qwindowsvistastyle.dll"]),
        ]
    }

    fn aux_binaries(&self) -> &'static [&'static str] {
        // gdbus.exe must ship for GLib IPC to work in the bundle.
        &["gdbus.exe"]
    }

    fn resolve_aux(&self, _ctx: &BundleContext, name: &str) -> Option<PathBuf> {
        // Native builds may keep host tools anywhere on PATH.
        self.resolve_name(name).or_else(|| which::which(name).ok())
    }

    fn gtk_module_catalogue(&self, ctx: &BundleContext) -> Vec<ModuleStage> {
        vec![
            ModuleStage {
                dest_dir: "lib/gdk-pixbuf-2.0/2.10.0/loaders",
                source_dir: ctx.gdk_pixbuf_dir.clone(),
                kind: CacheKind::PixbufLoaders,
            },
            ModuleStage {
                dest_dir: "lib/gio/modules",
                source_dir: ctx.gio_module_dir.clone(),
                kind: CacheKind::GioModules,
            },
            ModuleStage {
                dest_dir: "lib/gtk-3.0/3.0.0/immodules",
                source_dir: ctx.im_module_dir.clone(),
                kind: CacheKind::ImModules,
            },
        ]
    }

    fn cache_rewrite(&self, ctx: &BundleContext, kind: CacheKind) -> CacheRewrite {
        // Caches are resolved relative to different anchors: pixbuf loader
        // paths relative to the executable directory, immodule paths
        // relative to the prefix root.
        let rel = match kind {
            CacheKind::PixbufLoaders => "./",
            _ => "../",
        };
        let mut subs = vec![(format!("{}/", ctx.prefix.display()), rel.to_string())];
        if let Some(root) = &ctx.sys_root {
            subs.push((format!("{}/", root.display()), rel.to_string()));
        }
        CacheRewrite {
            subs,
            anchored: false,
        }
    }

    fn tool_command(&self, ctx: &BundleContext, name: &str) -> Command {
        let name = if BINARY_EXT.is_match(name) {
            name.to_string()
        } else {
            format!("{name}.exe")
        };
        match &ctx.sys_root {
            // Cross build: host tools are PE binaries inside the sysroot.
            Some(root) => {
                let mut cmd = Command::new("wine");
                cmd.arg(root.join("bin").join(name));
                cmd
            }
            None => Command::new(name),
        }
    }

    fn stage_resources(&self, ctx: &BundleContext) -> Result<()> {
        let root = ctx.sys_root_or("/mingw64");
        for theme in ["hicolor", "Adwaita"] {
            resources::copy_icon_theme(
                &root.join("share/icons").join(theme),
                &ctx.abs(Path::new("share/icons").join(theme)),
                Some(self.tool_command(ctx, "gtk-update-icon-cache")),
            )?;
        }
        resources::copy_message_catalogs(&root, ctx)?;
        resources::copy_schema_files(
            &root.join("share/glib-2.0/schemas"),
            &ctx.abs("share/glib-2.0/schemas"),
            Some(self.tool_command(ctx, "glib-compile-schemas")),
            &[
                "org.gtk.Settings.FileChooser",
                "org.gtk.Settings.ColorChooser",
                "org.gtk.Settings.EmojiChooser",
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn platform_with_search(dir: &Path) -> WindowsPlatform {
        WindowsPlatform {
            search_path: vec![dir.to_path_buf()],
        }
    }

    #[test]
    fn extracts_and_resolves_dll_names() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("libgtk-3-0.dll"), b"pe").unwrap();
        let platform = platform_with_search(dir.path());

        let output = "\
\tDLL Name: libgtk-3-0.dll
\tDLL Name: KERNEL32.dll
  some other line
";
        let deps = platform.parse_objdump(output);
        // KERNEL32.dll is not on the search path and drops out here.
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].declared, "libgtk-3-0.dll");
        assert_eq!(deps[0].source, dir.path().join("libgtk-3-0.dll"));
    }

    #[test]
    fn resolution_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("libwinpthread-1.dll"), b"pe").unwrap();
        let platform = platform_with_search(dir.path());
        assert_eq!(
            platform.resolve_name("LIBWINPTHREAD-1.DLL"),
            Some(dir.path().join("libwinpthread-1.dll"))
        );
        assert_eq!(platform.resolve_name("missing.dll"), None);
    }

    #[test]
    fn policy_filter_buckets() {
        let dir = tempfile::tempdir().unwrap();
        let platform = platform_with_search(dir.path());
        let system = Dependency::new("kernel32.dll", "C:\\Windows\\System32\\kernel32.dll");
        let mingw = Dependency::new("libgcc_s_seh-1.dll", "/opt/mingw64/bin/libgcc_s_seh-1.dll");
        let foreign = Dependency::new("vendor.dll", "/opt/vendor/bin/vendor.dll");
        assert_eq!(platform.classify(&system), Disposition::System);
        assert_eq!(platform.classify(&mingw), Disposition::Bundle);
        assert_eq!(platform.classify(&foreign), Disposition::Ignored);
        // Deterministic on repeat.
        assert_eq!(platform.classify(&foreign), Disposition::Ignored);
    }

    #[test]
    fn binaries_are_detected_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["app.exe", "HELPER.EXE", "libx.dll"] {
            std::fs::write(dir.path().join(name), b"pe").unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), b"t").unwrap();
        let platform = platform_with_search(dir.path());
        assert!(platform.probe_binary(&dir.path().join("app.exe"), false).unwrap());
        assert!(platform.probe_binary(&dir.path().join("HELPER.EXE"), false).unwrap());
        assert!(platform.probe_binary(&dir.path().join("libx.dll"), false).unwrap());
        assert!(!platform.probe_binary(&dir.path().join("notes.txt"), false).unwrap());
    }

    #[test]
    fn dlls_land_next_to_the_executables() {
        use crate::bundle::context::{BundleContext, InstallEnv};
        let args = [
            ("bindir", "bin"),
            ("libdir", "lib"),
            ("qt_plugin_dir", "/q"),
            ("gdk_pixbuf_dir", "/g"),
            ("gio_module_dir", "/m"),
            ("im_module_dir", "/i"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let ctx = BundleContext::new(
            InstallEnv {
                prefix: "/stage".into(),
            },
            &args,
        )
        .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let platform = platform_with_search(dir.path());
        let dep = Dependency::new("libglib-2.0-0.dll", "/opt/mingw64/bin/libglib-2.0-0.dll");
        assert_eq!(
            platform.dest_key(&ctx, &dep),
            PathBuf::from("bin/libglib-2.0-0.dll")
        );
    }
}
