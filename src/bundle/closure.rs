//! Worklist/fixed-set closure over the bundle's dependency graph.
//!
//! One generic fixed-point engine; the platforms supply the leaf
//! primitives (list, classify, stage, rewrite). Starting from the
//! installed binaries, every newly discovered foreign dependency is copied
//! into the bundle exactly once and then receives the same treatment until
//! no unseen dependency remains.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::bundle::context::BundleContext;
use crate::bundle::platform::{Dependency, Disposition, Platform};
use crate::error::{Error, Result};

pub struct ClosureEngine<'a> {
    ctx: &'a BundleContext,
    platform: &'a dyn Platform,
    /// Known foreign dependencies not yet copied, keyed by destination.
    to_add: BTreeMap<PathBuf, Dependency>,
    /// Destination paths already processed. A path enters exactly once.
    fixed: BTreeSet<PathBuf>,
}

impl<'a> ClosureEngine<'a> {
    pub fn new(ctx: &'a BundleContext, platform: &'a dyn Platform) -> Self {
        ClosureEngine {
            ctx,
            platform,
            to_add: BTreeMap::new(),
            fixed: BTreeSet::new(),
        }
    }

    /// Number of bundle paths processed so far.
    pub fn fixed_count(&self) -> usize {
        self.fixed.len()
    }

    /// Records a discovered foreign dependency. The first claim on a
    /// destination wins; a conflicting rediscovery is logged, not fatal.
    fn schedule(&mut self, key: PathBuf, dep: Dependency) {
        match self.to_add.entry(key) {
            Entry::Occupied(entry) => {
                if entry.get() != &dep {
                    log::warn!(
                        "conflicting sources for {}: keeping {}, ignoring {}",
                        entry.key().display(),
                        entry.get().source.display(),
                        dep.source.display()
                    );
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(dep);
            }
        }
    }

    /// Fixes one staged binary: rewrites its link metadata, then schedules
    /// its foreign dependencies for bundling.
    ///
    /// `key` is the destination path owning the fixed-set slot; `file` is
    /// the actual staged binary, which differs from `key` only for
    /// framework sub-paths.
    pub fn fix_binary(&mut self, key: &Path, file: &Path, fix_id: bool) -> Result<()> {
        if !self.fixed.insert(key.to_path_buf()) {
            return Err(Error::AlreadyFixed {
                path: key.to_path_buf(),
            });
        }
        let deps = self.platform.list_dependencies(self.ctx, file)?;
        self.platform.rewrite(self.ctx, file, fix_id, &deps)?;
        for dep in &deps {
            if self.platform.classify(dep) == Disposition::Ignored {
                log::warn!(
                    "ignoring unexpected dependency {} ({})",
                    dep.declared,
                    dep.source.display()
                );
            }
        }
        for dep in self.platform.schedule_deps(self.ctx, file, &deps) {
            let key = self.platform.dest_key(self.ctx, &dep);
            self.schedule(key, dep);
        }
        Ok(())
    }

    /// Seeds the engine with every probe-positive file in a bundle
    /// directory. Seeded binaries enter the fixed set directly, bypassing
    /// the worklist.
    pub fn fix_directory(&mut self, dir: &Path, fix_id: bool) -> Result<()> {
        let abs = self.ctx.abs(dir);
        log::debug!("fix directory: {}", abs.display());
        let mut names: Vec<_> = std::fs::read_dir(&abs)?
            .collect::<std::io::Result<Vec<_>>>()?
            .into_iter()
            .map(|e| e.file_name())
            .collect();
        names.sort();
        for name in names {
            let f_abs = abs.join(&name);
            if self.platform.probe_binary(&f_abs, false)? {
                let rel = dir.join(&name);
                log::info!("fix directory entry: {}", rel.display());
                self.fix_binary(&rel, &rel, fix_id)?;
            }
        }
        Ok(())
    }

    /// Runs copy+fix rounds until no unseen dependency remains.
    ///
    /// Terminates because the fixed set only grows and destination paths
    /// are drawn from a finite universe; cycles are harmless since a path
    /// is only ever scheduled before its first fix.
    pub fn run_to_fixpoint(&mut self) -> Result<()> {
        let mut round = 0u32;
        loop {
            round += 1;
            let to_fix: Vec<(PathBuf, Dependency)> = std::mem::take(&mut self.to_add)
                .into_iter()
                .filter(|(key, _)| !self.fixed.contains(key))
                .collect();
            if to_fix.is_empty() {
                log::debug!("closure complete after {} round(s)", round - 1);
                return Ok(());
            }
            for (key, dep) in to_fix {
                log::info!(
                    "fix recurse {round}: {} <- {}",
                    key.display(),
                    dep.source.display()
                );
                let file = self.platform.stage(self.ctx, &key, &dep)?;
                self.fix_binary(&key, &file, true)?;
            }
        }
    }
}
