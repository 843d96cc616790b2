//! Install context detection and bundle-wide configuration.

use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use crate::cli::args::required;
use crate::error::{Error, Result};

/// Which distribution flavor is being packaged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistType {
    /// System libraries are used, nothing is bundled.
    System,
    /// Qt plugins plus GTK/GIO modules and their caches.
    Full,
    /// Qt plugins and the core dependency closure only.
    Standard,
}

impl DistType {
    pub fn from_arg(value: &str) -> Self {
        match value {
            "system" => DistType::System,
            "full" => DistType::Full,
            _ => DistType::Standard,
        }
    }
}

/// The staging install context exported by the build system.
#[derive(Debug)]
pub struct InstallEnv {
    /// Absolute staging prefix the bundle is assembled in.
    pub prefix: PathBuf,
}

impl InstallEnv {
    /// Evaluate the "should I run at all" guard once at startup.
    ///
    /// Outside a packaged-install context (neither `DESTDIR` nor
    /// `FLATPAK_DEST` set) the whole hook is a silent no-op; inside one,
    /// the staging prefix is mandatory.
    pub fn detect() -> Result<Option<Self>> {
        if env::var_os("DESTDIR").is_none() && env::var_os("FLATPAK_DEST").is_none() {
            return Ok(None);
        }
        let prefix = env::var_os("MESON_INSTALL_DESTDIR_PREFIX").ok_or(Error::MissingEnv {
            var: "MESON_INSTALL_DESTDIR_PREFIX",
        })?;
        Ok(Some(InstallEnv {
            prefix: PathBuf::from(prefix),
        }))
    }
}

/// Everything the stagers and platform primitives need to know about the
/// bundle layout and the source toolchain.
#[derive(Debug, Clone)]
pub struct BundleContext {
    /// Staging prefix; all bundle paths are relative to this.
    pub prefix: PathBuf,
    /// Bundle-relative executable directory, e.g. `bin`.
    pub bin_dir: PathBuf,
    /// Bundle-relative library directory, e.g. `lib`.
    pub lib_dir: PathBuf,
    /// Toolchain directory holding the installed Qt plugins.
    pub qt_plugin_dir: PathBuf,
    /// Toolchain directory holding gdk-pixbuf loader modules.
    pub gdk_pixbuf_dir: PathBuf,
    /// Toolchain directory holding GIO extension modules.
    pub gio_module_dir: PathBuf,
    /// Toolchain directory holding GTK input-method modules.
    pub im_module_dir: PathBuf,
    /// Toolchain/sysroot to pull dependencies and resources from.
    /// macOS defaults to `/usr/local`; Windows falls back to the host
    /// search path (native build) when unset.
    pub sys_root: Option<PathBuf>,
    /// Dependency-dump tool for PE binaries, overridable for cross builds.
    pub objdump: String,
    /// Library-name blacklist file (Linux only).
    pub libs_blacklist: Option<PathBuf>,
}

impl BundleContext {
    pub fn new(env: InstallEnv, args: &BTreeMap<String, String>) -> Result<Self> {
        Ok(BundleContext {
            prefix: env.prefix,
            bin_dir: PathBuf::from(required(args, "bindir")?),
            lib_dir: PathBuf::from(required(args, "libdir")?),
            qt_plugin_dir: PathBuf::from(required(args, "qt_plugin_dir")?),
            gdk_pixbuf_dir: PathBuf::from(required(args, "gdk_pixbuf_dir")?),
            gio_module_dir: PathBuf::from(required(args, "gio_module_dir")?),
            im_module_dir: PathBuf::from(required(args, "im_module_dir")?),
            sys_root: args.get("sys_root").filter(|v| !v.is_empty()).map(PathBuf::from),
            objdump: args
                .get("objdump")
                .cloned()
                .unwrap_or_else(|| "objdump".to_string()),
            libs_blacklist: args.get("libs_bl").map(PathBuf::from),
        })
    }

    /// Absolute path of a bundle-relative entry.
    pub fn abs(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.prefix.join(rel)
    }

    /// Toolchain root used for resource staging, with a platform default.
    pub fn sys_root_or(&self, default: &str) -> PathBuf {
        self.sys_root
            .clone()
            .unwrap_or_else(|| PathBuf::from(default))
    }
}
