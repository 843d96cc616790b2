//! Host-toolchain resource staging: icon themes, message catalogs, GLib
//! schemas and translation aliases.
//!
//! Icon themes are pruned to the icons the application actually references
//! so the bundle does not carry thousands of unused files.

use std::path::Path;
use std::process::Command;
use std::sync::LazyLock;

use regex::Regex;

use crate::bundle::context::BundleContext;
use crate::bundle::utils::{fs as fs_utils, process};
use crate::error::Result;

/// Icon names the application references, by stem.
const USED_ICONS: &[&str] = &[
    "application-exit-symbolic",
    "application-x-executable-symbolic",
    "changes-allow-symbolic",
    "changes-prevent-symbolic",
    "configure-symbolic",
    "dialog-cancel-symbolic",
    "dialog-ok-symbolic",
    "dialog-password-symbolic",
    "document-import-symbolic",
    "document-new-symbolic",
    "document-open-recent-symbolic",
    "document-open-remote-symbolic",
    "document-open-symbolic",
    "document-properties-symbolic",
    "document-save-as-symbolic",
    "document-save-symbolic",
    "edit-cut-symbolic",
    "edit-find-symbolic",
    "edit-redo-symbolic",
    "edit-rename-symbolic",
    "edit-undo-symbolic",
    "emblem-important-symbolic",
    "find-location-symbolic",
    "go-first-symbolic",
    "go-jump-symbolic",
    "go-next-symbolic",
    "help-about-symbolic",
    "help-contents-symbolic",
    "image-missing",
    "list-add-symbolic",
    "list-remove-symbolic",
    "open-menu-symbolic",
    "plugins-symbolic",
    "process-stop-symbolic",
    "process-working-symbolic",
    "system-run-symbolic",
    "view-refresh-symbolic",
    "window-close-symbolic",
    "window-maximize-symbolic",
    "window-minimize-symbolic",
    "window-restore-symbolic",
    "zoom-fit-best-symbolic",
    "zoom-original-symbolic",
];

/// Message catalogs shipped for the GTK stack.
const MO_FILES: &[&str] = &["atk10", "gdk-pixbuf", "glib20", "gtk30", "gtk30-properties"];

/// Locales the application is translated into.
const LOCALES: &[&str] = &["zh_CN"];

static ICON_FILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^([^\.]+).*\.(svg|png|cur|ani)$").unwrap_or_else(|e| panic!("icon regex: {e}"))
});
static CURSOR_DIR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bcursors\b").unwrap_or_else(|e| panic!("cursor regex: {e}")));
// The boundary keeps `foo_zh_CN.qm` from aliasing; only a whole `zh_CN`
// tag (start of name or after a non-word separator) counts.
static QM_FILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.*)\bzh_CN\.qm$").unwrap_or_else(|e| panic!("qm regex: {e}"))
});

/// Decides whether one icon-theme entry survives the pruning.
///
/// Theme metadata and cursor sets are kept whole; image files are kept
/// only when their stem appears in the used-icon allowlist. The stale
/// `icon-theme.cache` and `legacy` trees never get copied (the cache is
/// regenerated for the pruned tree).
fn keep_icon_entry(rel: &Path, _is_dir: bool) -> bool {
    let Some(name) = rel.file_name().and_then(|n| n.to_str()) else {
        return true;
    };
    if name == "icon-theme.cache" || name == "legacy" {
        return false;
    }
    let Some(caps) = ICON_FILE.captures(name) else {
        return true;
    };
    if CURSOR_DIR.is_match(&rel.to_string_lossy()) {
        return true;
    }
    USED_ICONS.contains(&&caps[1])
}

/// Copies an icon theme pruned to the used-icon allowlist, then rebuilds
/// the theme index.
pub fn copy_icon_theme(src: &Path, dst: &Path, update_cmd: Option<Command>) -> Result<()> {
    log::info!("copy_icon_theme: {} -> {}", src.display(), dst.display());
    std::fs::create_dir_all(dst)?;
    if src.is_dir() {
        fs_utils::copy_dir_filtered(src, dst, keep_icon_entry)?;
    }
    if let Some(mut cmd) = update_cmd {
        cmd.arg("--index-only").arg(dst);
        process::run_status(cmd)?;
    }
    Ok(())
}

/// Copies the named schema files and compiles the destination directory.
pub fn copy_schema_files(
    src: &Path,
    dst: &Path,
    compile_cmd: Option<Command>,
    schemas: &[&str],
) -> Result<()> {
    log::info!("copy_schema_files: {} -> {}", src.display(), dst.display());
    std::fs::create_dir_all(dst)?;
    for schema in schemas {
        let file_name = format!("{schema}.gschema.xml");
        let src_file = src.join(&file_name);
        if src_file.is_file() {
            std::fs::copy(&src_file, dst.join(&file_name))?;
        }
    }
    if let Some(mut cmd) = compile_cmd {
        cmd.arg(dst);
        process::run_status(cmd)?;
    }
    Ok(())
}

/// Copies the LC_MESSAGES catalogs of one locale; missing catalogs are
/// skipped.
pub fn copy_locale(src: &Path, dst: &Path, mo_files: &[&str]) -> Result<()> {
    log::info!("copy_locale: {} -> {}", src.display(), dst.display());
    let src = src.join("LC_MESSAGES");
    let dst = dst.join("LC_MESSAGES");
    std::fs::create_dir_all(&dst)?;
    for mo in mo_files {
        let file_name = format!("{mo}.mo");
        let src_file = src.join(&file_name);
        if src_file.is_file() {
            std::fs::copy(&src_file, dst.join(&file_name))?;
        }
    }
    Ok(())
}

/// Stages the GTK-stack message catalogs for every shipped locale.
pub fn copy_message_catalogs(sys_root: &Path, ctx: &BundleContext) -> Result<()> {
    for locale in LOCALES {
        copy_locale(
            &sys_root.join("share/locale").join(locale),
            &ctx.abs(Path::new("share/locale").join(locale)),
            MO_FILES,
        )?;
    }
    Ok(())
}

/// Gives every `zh_CN.qm` translation file a `zh_Hans.qm` alias so Qt's
/// BCP 47 lookup finds it. An alias that already exists is left alone.
pub fn symlink_qm_aliases(dir: &Path) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let Some(name) = entry.file_name().to_str().map(String::from) else {
            continue;
        };
        let Some(caps) = QM_FILE.captures(&name) else {
            continue;
        };
        let alias = format!("{}zh_Hans.qm", &caps[1]);
        #[cfg(unix)]
        if let Err(e) = std::os::unix::fs::symlink(&name, dir.join(&alias)) {
            log::debug!("alias {alias}: {e}");
        }
        #[cfg(not(unix))]
        {
            let _ = alias;
        }
    }
    Ok(())
}
