//! Closure engine behavior against a fake platform with an in-memory
//! dependency graph: termination on cycles, exactly-once fixing, policy
//! filtering and first-claim-wins deduplication.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use bundle_fixup::bundle::closure::ClosureEngine;
use bundle_fixup::bundle::context::{BundleContext, InstallEnv};
use bundle_fixup::bundle::platform::{Dependency, Disposition, Platform};
use bundle_fixup::error::{Error, Result};

/// Platform whose dependency "introspection" reads a prepared graph keyed
/// by file name, with sources living in a fake toolchain directory.
#[derive(Debug)]
struct FakePlatform {
    graph: HashMap<String, Vec<Dependency>>,
    /// (file, fix_id) pairs in rewrite order.
    rewrites: RefCell<Vec<(PathBuf, bool)>>,
}

impl FakePlatform {
    fn new() -> Self {
        FakePlatform {
            graph: HashMap::new(),
            rewrites: RefCell::new(Vec::new()),
        }
    }

    fn depend(&mut self, binary: &str, declared: &str, source: &Path) {
        self.graph
            .entry(binary.to_string())
            .or_default()
            .push(Dependency::new(declared, source));
    }
}

impl Platform for FakePlatform {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn probe_binary(&self, path: &Path, _deref: bool) -> Result<bool> {
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        Ok(path.is_file() && (name.ends_with(".so") || !name.contains('.')))
    }

    fn list_dependencies(&self, _ctx: &BundleContext, file: &Path) -> Result<Vec<Dependency>> {
        let name = file
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        Ok(self.graph.get(name).cloned().unwrap_or_default())
    }

    fn classify(&self, dep: &Dependency) -> Disposition {
        if dep.declared.starts_with("sys") {
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
        fix_id: bool,
        _deps: &[Dependency],
    ) -> Result<()> {
        self.rewrites.borrow_mut().push((file.to_path_buf(), fix_id));
        Ok(())
    }

    fn qt_plugin_catalogue(&self) -> &'static [(&'static str, &'static [&'static str])] {
        &[]
    }
}

fn make_ctx(prefix: &Path) -> BundleContext {
    let args: BTreeMap<String, String> = [
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
    BundleContext::new(
        InstallEnv {
            prefix: prefix.to_path_buf(),
        },
        &args,
    )
    .unwrap()
}

fn touch(path: &Path, contents: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

#[test]
fn closure_copies_every_reachable_foreign_dependency() {
    let dir = tempfile::tempdir().unwrap();
    let toolchain = dir.path().join("toolchain");
    let prefix = dir.path().join("stage");
    touch(&prefix.join("bin/app"), "app");
    std::fs::create_dir_all(prefix.join("lib")).unwrap();
    let libfoo = toolchain.join("libfoo.so");
    let libbar = toolchain.join("libbar.so");
    touch(&libfoo, "foo");
    touch(&libbar, "bar");

    let mut platform = FakePlatform::new();
    // app -> libfoo -> libbar -> libfoo (cycle), plus a system dep.
    platform.depend("app", "libfoo.so", &libfoo);
    platform.depend("app", "sysc.so", Path::new("/sys/sysc.so"));
    platform.depend("libfoo.so", "libbar.so", &libbar);
    platform.depend("libbar.so", "libfoo.so", &libfoo);

    let ctx = make_ctx(&prefix);
    let mut engine = ClosureEngine::new(&ctx, &platform);
    engine.fix_directory(Path::new("bin"), false).unwrap();
    engine.fix_directory(Path::new("lib"), true).unwrap();
    engine.run_to_fixpoint().unwrap();

    // Both transitive foreign deps landed at their destinations.
    assert_eq!(
        std::fs::read_to_string(prefix.join("lib/libfoo.so")).unwrap(),
        "foo"
    );
    assert_eq!(
        std::fs::read_to_string(prefix.join("lib/libbar.so")).unwrap(),
        "bar"
    );
    // The system dep was never copied.
    assert!(!prefix.join("lib/sysc.so").exists());
    // app + 2 libraries, each fixed exactly once despite the cycle.
    assert_eq!(engine.fixed_count(), 3);

    let rewrites = platform.rewrites.borrow();
    assert_eq!(rewrites[0], (PathBuf::from("bin/app"), false));
    assert!(rewrites[1..]
        .iter()
        .all(|(file, fix_id)| *fix_id && file.starts_with("lib")));
}

#[test]
fn seeded_binaries_enter_the_fixed_set_directly() {
    let dir = tempfile::tempdir().unwrap();
    let prefix = dir.path().join("stage");
    touch(&prefix.join("bin/app"), "app");
    touch(&prefix.join("bin/readme.txt"), "not a binary");
    touch(&prefix.join("lib/libz.so"), "z");

    let platform = FakePlatform::new();
    let ctx = make_ctx(&prefix);
    let mut engine = ClosureEngine::new(&ctx, &platform);
    engine.fix_directory(Path::new("bin"), false).unwrap();
    engine.fix_directory(Path::new("lib"), true).unwrap();

    // Probe-negative files are not seeded.
    assert_eq!(engine.fixed_count(), 2);
    // Nothing was scheduled, so the fixpoint is immediate.
    engine.run_to_fixpoint().unwrap();
    assert_eq!(engine.fixed_count(), 2);
}

#[test]
fn fixing_a_path_twice_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let prefix = dir.path().join("stage");
    touch(&prefix.join("bin/app"), "app");

    let platform = FakePlatform::new();
    let ctx = make_ctx(&prefix);
    let mut engine = ClosureEngine::new(&ctx, &platform);
    let key = Path::new("bin/app");
    engine.fix_binary(key, key, false).unwrap();
    match engine.fix_binary(key, key, false).unwrap_err() {
        Error::AlreadyFixed { path } => assert_eq!(path, PathBuf::from("bin/app")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn conflicting_rediscovery_keeps_the_first_claim() {
    let dir = tempfile::tempdir().unwrap();
    let toolchain = dir.path().join("toolchain");
    let prefix = dir.path().join("stage");
    touch(&prefix.join("bin/app"), "app");
    touch(&prefix.join("bin/tool"), "tool");
    std::fs::create_dir_all(prefix.join("lib")).unwrap();
    let first = toolchain.join("a/libdup.so");
    let second = toolchain.join("b/libdup.so");
    touch(&first, "first");
    touch(&second, "second");

    let mut platform = FakePlatform::new();
    // Directory scan order is sorted, so `app` claims the key first.
    platform.depend("app", "libdup.so", &first);
    platform.depend("tool", "libdup.so", &second);

    let ctx = make_ctx(&prefix);
    let mut engine = ClosureEngine::new(&ctx, &platform);
    engine.fix_directory(Path::new("bin"), false).unwrap();
    engine.run_to_fixpoint().unwrap();

    assert_eq!(
        std::fs::read_to_string(prefix.join("lib/libdup.so")).unwrap(),
        "first"
    );
}

#[test]
fn rediscovery_of_a_fixed_path_is_not_rescheduled() {
    let dir = tempfile::tempdir().unwrap();
    let toolchain = dir.path().join("toolchain");
    let prefix = dir.path().join("stage");
    touch(&prefix.join("bin/app"), "app");
    let liba = toolchain.join("liba.so");
    touch(&liba, "a-v1");

    let mut platform = FakePlatform::new();
    platform.depend("app", "liba.so", &liba);
    // liba depends on itself through a different binary name; once fixed
    // it must never be copied again.
    platform.depend("liba.so", "liba.so", &liba);

    let ctx = make_ctx(&prefix);
    let mut engine = ClosureEngine::new(&ctx, &platform);
    engine.fix_directory(Path::new("bin"), false).unwrap();
    engine.run_to_fixpoint().unwrap();

    assert_eq!(engine.fixed_count(), 2);
    assert_eq!(platform.rewrites.borrow().len(), 2);
}
