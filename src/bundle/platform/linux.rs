//! Linux platform primitives: `ldd` listing and a blacklist policy filter.
//!
//! Linux binaries carry relative RPATHs baked in at link time that already
//! point at the bundle layout, so fixing a binary means copying it and
//! recursing into its dependencies; no metadata is rewritten.

use std::collections::HashSet;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::LazyLock;

use regex::Regex;

use crate::bundle::context::BundleContext;
use crate::bundle::platform::{
    probe_object, Dependency, Disposition, ObjectKind, Platform,
};
use crate::bundle::utils::process;
use crate::error::Result;

// `name => /resolved/path (0xADDR)`
static DEP_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(.*) => (.+) \(0x[0-9a-f]+\)$").unwrap_or_else(|e| panic!("ldd regex: {e}"))
});
// bare `/resolved/path (0xADDR)` for already-absolute references
static ABS_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(.+/([^/]+)) \(0x[0-9a-f]+\)$").unwrap_or_else(|e| panic!("ldd regex: {e}"))
});

#[derive(Debug)]
pub struct LinuxPlatform {
    /// Library names always treated as satisfied by the base OS.
    blacklist: HashSet<String>,
}

impl LinuxPlatform {
    pub fn new(blacklist: HashSet<String>) -> Self {
        LinuxPlatform { blacklist }
    }

    /// Reads the blacklist config: one library name per line,
    /// whitespace-trimmed, blank lines skipped.
    pub fn from_blacklist_file(path: &Path) -> Result<Self> {
        let mut blacklist = HashSet::new();
        let file = std::fs::File::open(path)?;
        for line in std::io::BufReader::new(file).lines() {
            let line = line?;
            let name = line.trim();
            if !name.is_empty() {
                blacklist.insert(name.to_string());
            }
        }
        log::debug!("loaded {} blacklisted library names", blacklist.len());
        Ok(LinuxPlatform { blacklist })
    }

    fn parse_ldd(output: &str) -> Vec<Dependency> {
        let mut deps = Vec::new();
        for line in output.split('\n') {
            if let Some(caps) = DEP_LINE.captures(line) {
                deps.push(Dependency::new(&caps[1], &caps[2]));
            } else if let Some(caps) = ABS_LINE.captures(line) {
                deps.push(Dependency::new(&caps[2], &caps[1]));
            }
            // `linux-vdso.so.1 (0x...)`, `statically linked` and
            // `... => not found` match neither form and are dropped.
        }
        deps
    }
}

impl Platform for LinuxPlatform {
    fn name(&self) -> &'static str {
        "linux"
    }

    fn probe_binary(&self, path: &Path, deref: bool) -> Result<bool> {
        probe_object(path, deref, ObjectKind::Elf)
    }

    fn list_dependencies(&self, ctx: &BundleContext, file: &Path) -> Result<Vec<Dependency>> {
        let mut cmd = Command::new("ldd");
        cmd.arg(ctx.abs(file));
        let stdout = process::run_capture(cmd)?;
        Ok(Self::parse_ldd(&stdout))
    }

    fn classify(&self, dep: &Dependency) -> Disposition {
        if self.blacklist.contains(&dep.declared) {
            Disposition::System
        } else {
            Disposition::Bundle
        }
    }

    fn dest_key(&self, ctx: &BundleContext, dep: &Dependency) -> PathBuf {
        ctx.lib_dir.join(&dep.declared)
    }

    fn rewrite(
        &self,
        _ctx: &BundleContext,
        file: &Path,
        _fix_id: bool,
        _deps: &[Dependency],
    ) -> Result<()> {
        // Relative RPATH search order already resolves inside the bundle.
        log::debug!("no metadata rewrite for {}", file.display());
        Ok(())
    }

    fn qt_plugin_catalogue(&self) -> &'static [(&'static str, &'static [&'static str])] {
        &[
            ("imageformats", &["libqsvg.so"]),
            ("iconengines", &["libqsvgicon.so"]),
            ("platforms", &["libqxcb.so"]),
            ("platformthemes", &["libqgtk3.so", "libqxdgdesktopportal.so"]),
            (
                "xcbglintegrations",
                &["libqxcb-egl-integration.so", "libqxcb-glx-integration.so"],
            ),
        ]
    }

    // GTK module staging never shipped on Linux; the default empty
    // catalogue keeps it short-circuited even for dist_type=full.
}
