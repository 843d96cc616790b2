//! Command line argument parsing and validation.
//!
//! The build system forwards install-time settings as positional
//! `key=value` tokens. clap handles the outer invocation (help, version);
//! token validation happens here and a malformed token is fatal.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use clap::Parser;
use regex::Regex;

use crate::error::{Error, Result};

static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([a-z_0-9]+)=(.*)$").unwrap_or_else(|e| panic!("token regex: {e}"))
});

/// Post-install dependency closure and relocation for desktop bundles
#[derive(Parser, Debug)]
#[command(
    name = "fix-bundle",
    version,
    about = "Copies foreign shared-library dependencies into an installed bundle and rewrites link metadata",
    long_about = "Runs as an install hook after the build system populates the staging prefix.

Settings are passed as positional key=value tokens, e.g.:
  fix-bundle platform=linux dist_type=full bindir=bin libdir=lib \\
      qt_plugin_dir=/usr/lib/qt5/plugins gdk_pixbuf_dir=... libs_bl=...

The staging prefix is taken from MESON_INSTALL_DESTDIR_PREFIX; outside an
install context (neither DESTDIR nor FLATPAK_DEST set) the hook is a no-op.

Exit code 0 = bundle fixed (or step intentionally skipped)."
)]
pub struct Args {
    /// Install-time settings as `key=value` tokens
    #[arg(value_name = "KEY=VALUE")]
    pub defines: Vec<String>,
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate every token and collect the settings into a map.
    ///
    /// A later duplicate of a key overrides an earlier one, matching how
    /// build systems append overrides to a fixed argument list.
    pub fn into_map(self) -> Result<BTreeMap<String, String>> {
        let mut map = BTreeMap::new();
        for token in self.defines {
            let caps = TOKEN.captures(&token).ok_or(Error::InvalidArgument {
                token: token.clone(),
            })?;
            map.insert(caps[1].to_string(), caps[2].to_string());
        }
        Ok(map)
    }
}

/// Look up a required setting.
pub fn required<'a>(map: &'a BTreeMap<String, String>, key: &str) -> Result<&'a str> {
    map.get(key).map(String::as_str).ok_or(Error::MissingArgument {
        key: key.to_string(),
    })
}
