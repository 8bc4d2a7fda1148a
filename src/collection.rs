// src/collection.rs

//! Operations over collections of packages
//!
//! The set-algebra layer the resolver is built on: newest/oldest
//! selection, de-duplication, architecture filtering and bulk
//! dependency-satisfaction filtering. All operators work on an ordered
//! `Vec` of shared package handles and preserve the relative order of the
//! elements they keep.

use crate::arch::{arch_is_64bit, arch_is_compatible};
use crate::depend::Depend;
use crate::download::DownloadClient;
use crate::error::{Error, Result};
use crate::package::{
    COMPARE_ARCH, COMPARE_DATA, COMPARE_INSTALLED, COMPARE_VERSION, Package, PackageId,
};
use crate::progress::Progress;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{debug, warn};

/// Which relation a bulk filter or search consults
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    Provides,
    Requires,
    Conflicts,
    Obsoletes,
}

fn query_relation(
    package: &Package,
    kind: RelationKind,
    depend: &Depend,
    progress: &Progress,
) -> Result<Option<Rc<Depend>>> {
    match kind {
        RelationKind::Provides => package.provide(depend, progress),
        RelationKind::Requires => package.require(depend, progress),
        RelationKind::Conflicts => package.conflict(depend, progress),
        RelationKind::Obsoletes => package.obsolete(depend, progress),
    }
}

/// Find a package by its exact id
pub fn find(packages: &[Rc<Package>], package_id: &PackageId) -> Result<Rc<Package>> {
    let id = package_id.to_string();
    packages
        .iter()
        .find(|package| package.id() == id)
        .cloned()
        .ok_or_else(|| Error::NotFound(format!("failed to find {}", id)))
}

/// Return the newest package in the collection.
///
/// The package name is ignored; version, then arch, decide. Ties keep
/// the first-seen element.
pub fn newest(packages: &[Rc<Package>]) -> Result<Rc<Package>> {
    let mut iter = packages.iter();
    let mut newest = iter
        .next()
        .ok_or_else(|| Error::NotFound("nothing in collection".to_string()))?;
    for package in iter {
        let ord = Package::compare_full(package, newest, COMPARE_VERSION | COMPARE_ARCH);
        if ord == Ordering::Greater {
            newest = package;
        }
    }
    Ok(Rc::clone(newest))
}

/// Return the oldest package in the collection.
pub fn oldest(packages: &[Rc<Package>]) -> Result<Rc<Package>> {
    let mut iter = packages.iter();
    let mut oldest = iter
        .next()
        .ok_or_else(|| Error::NotFound("nothing in collection".to_string()))?;
    for package in iter {
        if Package::compare(package, oldest) == Some(Ordering::Less) {
            oldest = package;
        }
    }
    Ok(Rc::clone(oldest))
}

/// Remove packages whose name-version-arch id was already seen, keeping
/// the first occurrence.
pub fn filter_duplicates(packages: &mut Vec<Rc<Package>>) {
    let mut seen = HashSet::new();
    packages.retain(|package| seen.insert(package.basic_id()));
}

/// Keep only the newest version of each package *name*.
///
/// Grouping is by name alone, so differing architectures of one name
/// compete; version, arch, installed state and origin are compared in
/// that order. An exact tie keeps the already-tracked (first-seen)
/// package, which makes the result deterministic for a given input
/// order.
///
/// Returns true if any package was removed.
pub fn filter_newest(packages: &mut Vec<Rc<Package>>) -> bool {
    // first, filter out any duplicates
    filter_duplicates(packages);

    let flags = COMPARE_VERSION | COMPARE_ARCH | COMPARE_INSTALLED | COMPARE_DATA;
    let mut tracked: HashMap<String, Rc<Package>> = HashMap::new();
    let mut keep: HashSet<String> = HashSet::new();
    let mut changed = false;

    for package in packages.iter() {
        let name = package.name().to_string();
        let Some(best) = tracked.get(&name) else {
            keep.insert(package.basic_id());
            tracked.insert(name, Rc::clone(package));
            continue;
        };
        match Package::compare_full(package, best, flags) {
            // indistinguishable even with all flags: keep the tracked one
            Ordering::Equal => {
                warn!(
                    "cannot choose between {} and {}",
                    package.printable(),
                    best.printable()
                );
                changed = true;
            }
            Ordering::Less => changed = true,
            Ordering::Greater => {
                keep.remove(&best.basic_id());
                keep.insert(package.basic_id());
                tracked.insert(name, Rc::clone(package));
                changed = true;
            }
        }
    }

    packages.retain(|package| keep.contains(&package.basic_id()));
    changed
}

/// Remove packages that are neither "noarch" nor arch-compatible with
/// the given root arch.
pub fn filter_arch(packages: &mut Vec<Rc<Package>>, arch: &str) {
    packages.retain(|package| {
        package.arch() == "noarch" || arch_is_compatible(arch, package.arch())
    });
}

/// For a 32-bit target, keep only the best 32-bit arch present.
///
/// The best arch is the lexicographically greatest one excluding x86_64
/// and noarch; noarch packages always survive and x86_64 never does. An
/// all-noarch set is reduced with a plain noarch filter.
fn filter_best_arch32(packages: &mut Vec<Rc<Package>>) {
    let mut best_arch: Option<&str> = None;
    for package in packages.iter() {
        let arch = package.arch();
        if arch == "x86_64" || arch == "noarch" {
            continue;
        }
        if best_arch.is_none_or(|best| arch > best) {
            best_arch = Some(arch);
        }
    }

    debug!("best 32 bit arch={:?}", best_arch);
    let Some(best_arch) = best_arch.map(str::to_string) else {
        filter_arch(packages, "noarch");
        return;
    };

    packages.retain(|package| {
        let arch = package.arch();
        arch != "x86_64" && (arch == best_arch || arch == "noarch")
    });
}

/// Keep only packages installable as the best arch for the target.
///
/// A 64-bit target takes only its own family; a 32-bit target is
/// narrowed to the single best 32-bit arch present in the set.
pub fn filter_best_arch(packages: &mut Vec<Rc<Package>>, arch: &str) {
    if arch_is_64bit(arch) {
        filter_arch(packages, arch);
        return;
    }
    filter_best_arch32(packages);
}

fn filter_depends(
    packages: &mut Vec<Rc<Package>>,
    depends: &[Depend],
    kind: RelationKind,
    progress: &Progress,
) -> Result<()> {
    if packages.is_empty() {
        progress.finished()?;
        return Ok(());
    }
    progress.set_steps(packages.len())?;

    let mut i = 0;
    while i < packages.len() {
        let child = progress.child()?;
        child.check_cancelled()?;
        let package = Rc::clone(&packages[i]);

        // try each depend as 'OR'
        let mut satisfied = false;
        for depend in depends {
            if query_relation(&package, kind, depend, &child)?.is_some() {
                satisfied = true;
                break;
            }
        }
        child.finished()?;

        if satisfied {
            i += 1;
        } else {
            packages.remove(i);
        }
    }
    Ok(())
}

/// Remove every package for which none of the depends is provided.
///
/// An empty result is a valid outcome, not an error; callers detect a
/// missing dependency by checking the collection length afterwards.
pub fn filter_provide(
    packages: &mut Vec<Rc<Package>>,
    depends: &[Depend],
    progress: &Progress,
) -> Result<()> {
    filter_depends(packages, depends, RelationKind::Provides, progress)
}

/// Remove every package for which none of the depends is required.
pub fn filter_require(
    packages: &mut Vec<Rc<Package>>,
    depends: &[Depend],
    progress: &Progress,
) -> Result<()> {
    filter_depends(packages, depends, RelationKind::Requires, progress)
}

/// Remove every package for which none of the depends conflicts.
pub fn filter_conflict(
    packages: &mut Vec<Rc<Package>>,
    depends: &[Depend],
    progress: &Progress,
) -> Result<()> {
    filter_depends(packages, depends, RelationKind::Conflicts, progress)
}

/// Remove every package for which none of the depends is obsoleted.
pub fn filter_obsolete(
    packages: &mut Vec<Rc<Package>>,
    depends: &[Depend],
    progress: &Progress,
) -> Result<()> {
    filter_depends(packages, depends, RelationKind::Obsoletes, progress)
}

/// Search a relation across the collection.
///
/// Returns every matching package, plus the best (greatest-comparing)
/// matched depend; the latter is how "prefer the highest-versioned
/// provider" is implemented.
pub fn search_relation(
    packages: &[Rc<Package>],
    kind: RelationKind,
    depend: &Depend,
    progress: &Progress,
) -> Result<(Vec<Rc<Package>>, Option<Rc<Depend>>)> {
    let mut matches = Vec::new();
    let mut best_depend: Option<Rc<Depend>> = None;

    for package in packages {
        let Some(satisfies) = query_relation(package, kind, depend, progress)? else {
            continue;
        };
        // gotcha, but keep looking for a better provider
        matches.push(Rc::clone(package));
        let better = best_depend
            .as_ref()
            .is_none_or(|best| Depend::compare(&satisfies, best) == Ordering::Greater);
        if better {
            best_depend = Some(satisfies);
        }
    }
    Ok((matches, best_depend))
}

/// Packages whose provides satisfy `depend`, plus the best provide
pub fn what_provides(
    packages: &[Rc<Package>],
    depend: &Depend,
    progress: &Progress,
) -> Result<(Vec<Rc<Package>>, Option<Rc<Depend>>)> {
    search_relation(packages, RelationKind::Provides, depend, progress)
}

/// Packages whose requires match `depend`, plus the best require
pub fn what_requires(
    packages: &[Rc<Package>],
    depend: &Depend,
    progress: &Progress,
) -> Result<(Vec<Rc<Package>>, Option<Rc<Depend>>)> {
    search_relation(packages, RelationKind::Requires, depend, progress)
}

/// Packages whose conflicts match `depend`
pub fn what_conflicts(
    packages: &[Rc<Package>],
    depend: &Depend,
    progress: &Progress,
) -> Result<(Vec<Rc<Package>>, Option<Rc<Depend>>)> {
    search_relation(packages, RelationKind::Conflicts, depend, progress)
}

/// Packages whose obsoletes match `depend`
pub fn what_obsoletes(
    packages: &[Rc<Package>],
    depend: &Depend,
    progress: &Progress,
) -> Result<(Vec<Rc<Package>>, Option<Rc<Depend>>)> {
    search_relation(packages, RelationKind::Obsoletes, depend, progress)
}

/// Download the artifacts for a list of packages, one weighted step per
/// package. Local packages with no source URL are an error.
pub fn download(
    packages: &[Rc<Package>],
    directory: &Path,
    client: &DownloadClient,
    progress: &Progress,
) -> Result<Vec<PathBuf>> {
    if packages.is_empty() {
        progress.finished()?;
        return Ok(Vec::new());
    }
    progress.set_steps(packages.len())?;

    let mut downloaded = Vec::with_capacity(packages.len());
    for package in packages {
        let child = progress.child()?;
        let url = package.source_url().ok_or_else(|| {
            Error::Metadata(format!("no source url for {}", package.id()))
        })?;
        let filename = url
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| Error::Download(format!("cannot derive filename from {}", url)))?;
        let dest_path = directory.join(filename);

        debug!("downloading {}", package.id());
        client
            .fetch(url, &dest_path, &child)
            .map_err(|e| Error::Download(format!("cannot download {}: {}", package.printable(), e)))?;
        if let Some(expected) = package.checksum() {
            client.verify_checksum(&dest_path, expected)?;
        }
        child.finished()?;
        downloaded.push(dest_path);
    }
    Ok(downloaded)
}
