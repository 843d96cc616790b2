//! Platform primitives consumed by the generic closure engine.
//!
//! One engine, three implementations: each platform supplies the leaf
//! operations (dependency listing, policy classification, destination
//! layout, staging, metadata rewriting) while the worklist/fixed-set logic
//! lives in [`crate::bundle::closure`].

mod linux;
mod macos;
mod windows;

pub use linux::LinuxPlatform;
pub use macos::MacosPlatform;
pub use windows::WindowsPlatform;

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::bundle::context::BundleContext;
use crate::bundle::modules::{CacheKind, CacheRewrite, ModuleStage};
use crate::bundle::utils::fs as fs_utils;
use crate::error::{Error, Result};

/// A shared-library dependency discovered in a binary's load metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    /// Name or path exactly as declared by the binary.
    pub declared: String,
    /// Resolved on-disk location the bytes are copied from.
    pub source: PathBuf,
    /// Sub-path below a `.framework` root (macOS), e.g. `/Versions/A/QtCore`.
    /// Framework binaries are copied preserving this internal structure.
    pub subpath: Option<String>,
}

impl Dependency {
    pub fn new(declared: impl Into<String>, source: impl Into<PathBuf>) -> Self {
        Dependency {
            declared: declared.into(),
            source: source.into(),
            subpath: None,
        }
    }

    pub fn with_subpath(mut self, subpath: impl Into<String>) -> Self {
        self.subpath = Some(subpath.into());
        self
    }
}

/// Verdict of the policy filter for one discovered dependency.
///
/// The filter is a pure function of the dependency and the platform rule
/// set; classifying the same dependency twice yields the same verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Foreign: must be copied into the bundle and fixed in turn.
    Bundle,
    /// Satisfied by the base OS on every target machine; left alone.
    System,
    /// Neither bundled nor trusted as system; skipped with a diagnostic
    /// (Windows only: non-system DLLs outside the mingw runtime).
    Ignored,
}

/// Per-platform leaf operations for the closure engine.
pub trait Platform: std::fmt::Debug {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Whether a staged file is a binary this platform processes.
    ///
    /// `deref` controls symlink handling during directory scans: the
    /// executable directory is scanned without following symlinks, the
    /// library directory with.
    fn probe_binary(&self, path: &Path, deref: bool) -> Result<bool>;

    /// Declared dependencies of a staged binary, via the platform's native
    /// introspection tool. Lists only; never copies or mutates.
    fn list_dependencies(&self, ctx: &BundleContext, file: &Path) -> Result<Vec<Dependency>>;

    /// Policy filter: system, foreign or ignored.
    fn classify(&self, dep: &Dependency) -> Disposition;

    /// Bundle-relative destination for a foreign dependency.
    fn dest_key(&self, ctx: &BundleContext, dep: &Dependency) -> PathBuf;

    /// Copies a scheduled dependency into the bundle, returning the
    /// bundle-relative path of the staged binary to fix next.
    fn stage(&self, ctx: &BundleContext, key: &Path, dep: &Dependency) -> Result<PathBuf> {
        fs_utils::copy_file(&dep.source, &ctx.abs(key))?;
        Ok(key.to_path_buf())
    }

    /// Rewrites the binary's link metadata against the bundle layout.
    /// `fix_id` requests a self-identity rewrite (libraries, never the
    /// main executables).
    fn rewrite(
        &self,
        ctx: &BundleContext,
        file: &Path,
        fix_id: bool,
        deps: &[Dependency],
    ) -> Result<()>;

    /// Of `deps`, the ones the engine must schedule for bundling.
    ///
    /// Defaults to everything the policy filter marks foreign; macOS drops
    /// dependencies that the rewrite step redirects to a pre-bundled
    /// replacement instead of copying.
    fn schedule_deps(
        &self,
        _ctx: &BundleContext,
        _file: &Path,
        deps: &[Dependency],
    ) -> Vec<Dependency> {
        deps.iter()
            .filter(|d| self.classify(d) == Disposition::Bundle)
            .cloned()
            .collect()
    }

    /// Static catalogue of Qt plugins to stage: (category dir, file names).
    fn qt_plugin_catalogue(&self) -> &'static [(&'static str, &'static [&'static str])];

    /// Extra host binaries staged into the executable directory before the
    /// closure runs (Windows stages `gdbus.exe`).
    fn aux_binaries(&self) -> &'static [&'static str] {
        &[]
    }

    /// Resolves an aux binary name to the file to copy.
    fn resolve_aux(&self, _ctx: &BundleContext, name: &str) -> Option<PathBuf> {
        let _ = name;
        None
    }

    /// Loader-module staging table for `dist_type=full`.
    fn gtk_module_catalogue(&self, _ctx: &BundleContext) -> Vec<ModuleStage> {
        Vec::new()
    }

    /// Path-substitution rules applied to captured cache-tool output.
    fn cache_rewrite(&self, ctx: &BundleContext, _kind: CacheKind) -> CacheRewrite {
        // Loader caches quote absolute module paths; anchor on the opening
        // quote and retarget them below the executable directory.
        CacheRewrite {
            subs: vec![(
                format!("\"{}/", ctx.prefix.display()),
                "\"@executable_path/../".to_string(),
            )],
            anchored: true,
        }
    }

    /// Command for a host-side GTK/GIO tool (Windows wraps cross tools in
    /// wine and appends `.exe`).
    fn tool_command(&self, _ctx: &BundleContext, name: &str) -> Command {
        Command::new(name)
    }

    /// Post-closure resource staging (icon themes, locales, schemas).
    fn stage_resources(&self, _ctx: &BundleContext) -> Result<()> {
        Ok(())
    }
}

/// Constructs the platform named by the `platform=` setting.
pub fn for_name(name: &str, ctx: &BundleContext) -> Result<Box<dyn Platform>> {
    match name {
        "linux" => {
            let blacklist = ctx
                .libs_blacklist
                .as_deref()
                .ok_or(Error::MissingArgument {
                    key: "libs_bl".to_string(),
                })?;
            Ok(Box::new(LinuxPlatform::from_blacklist_file(blacklist)?))
        }
        "macos" => Ok(Box::new(MacosPlatform::new())),
        "windows" => Ok(Box::new(WindowsPlatform::new(ctx))),
        other => Err(Error::UnknownPlatform {
            name: other.to_string(),
        }),
    }
}

/// Object formats accepted by the seed-phase binary probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ObjectKind {
    Elf,
    MachO,
}

/// File-signature probe backing `probe_binary` on Linux and macOS.
///
/// Parses the file head instead of shelling out to `file --mime`; anything
/// goblin cannot parse is simply not a binary.
pub(crate) fn probe_object(path: &Path, deref: bool, want: ObjectKind) -> Result<bool> {
    if !deref {
        let meta = std::fs::symlink_metadata(path)?;
        if meta.file_type().is_symlink() {
            return Ok(false);
        }
    }
    if !path.is_file() {
        return Ok(false);
    }
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(_) => return Ok(false),
    };
    Ok(match goblin::Object::parse(&data) {
        Ok(goblin::Object::Elf(elf)) => {
            use goblin::elf::header::{ET_DYN, ET_EXEC};
            want == ObjectKind::Elf
                && (elf.header.e_type == ET_EXEC || elf.header.e_type == ET_DYN)
        }
        Ok(goblin::Object::Mach(_)) => want == ObjectKind::MachO,
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    // Minimal 64-bit little-endian ELF header, e_type patched per test.
    fn elf_header(e_type: u16) -> Vec<u8> {
        let mut h = vec![0u8; 64];
        h[..4].copy_from_slice(b"\x7fELF");
        h[4] = 2; // ELFCLASS64
        h[5] = 1; // little endian
        h[6] = 1; // EV_CURRENT
        h[16..18].copy_from_slice(&e_type.to_le_bytes());
        h[18..20].copy_from_slice(&62u16.to_le_bytes()); // EM_X86_64
        h[20..24].copy_from_slice(&1u32.to_le_bytes());
        h[52..54].copy_from_slice(&64u16.to_le_bytes()); // ehsize
        h
    }

    #[test]
    fn probe_accepts_executables_and_shared_objects() {
        let dir = tempfile::tempdir().unwrap();
        for (name, e_type, want) in [
            ("exec", 2u16, true),
            ("shared", 3u16, true),
            ("relocatable", 1u16, false),
        ] {
            let p = dir.path().join(name);
            std::fs::File::create(&p)
                .unwrap()
                .write_all(&elf_header(e_type))
                .unwrap();
            assert_eq!(
                probe_object(&p, false, ObjectKind::Elf).unwrap(),
                want,
                "{name}"
            );
        }
    }

    #[cfg(unix)]
    #[test]
    fn probe_rejects_text_and_symlinks_without_deref() {
        let dir = tempfile::tempdir().unwrap();
        let text = dir.path().join("notes.txt");
        std::fs::write(&text, "just text").unwrap();
        assert!(!probe_object(&text, false, ObjectKind::Elf).unwrap());

        let target = dir.path().join("real");
        std::fs::write(&target, elf_header(3)).unwrap();
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(&target, &link).unwrap();
        assert!(!probe_object(&link, false, ObjectKind::Elf).unwrap());
        assert!(probe_object(&link, true, ObjectKind::Elf).unwrap());
    }

    #[test]
    fn unknown_platform_is_rejected() {
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
        assert!(matches!(
            for_name("beos", &ctx).unwrap_err(),
            Error::UnknownPlatform { .. }
        ));
    }
}
