// src/transaction.rs

//! Transaction building and dependency resolution
//!
//! A [`Transaction`] accumulates install/update/remove requests against
//! one local store and a set of remote stores, then [`Transaction::resolve`]
//! expands them into a closed, conflict-free plan: every requirement of
//! every scheduled package is satisfied by the goal set or by a package
//! staying installed, obsoleted packages are scheduled for removal, and
//! no two versions of one package are installed together.
//!
//! The resolver never mutates any store; it only produces the plan.
//! Stores are treated as immutable snapshots for the duration of one
//! resolve call.

use crate::collection;
use crate::config::Config;
use crate::depend::Depend;
use crate::error::{Error, Result};
use crate::package::{
    COMPARE_DATA, COMPARE_INSTALLED, COMPARE_VERSION, Package,
};
use crate::progress::Progress;
use crate::store::Store;
use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use tracing::{debug, info, warn};

/// Resolution lifecycle of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Unresolved,
    Resolving,
    Resolved,
    Failed,
}

/// A set of package requests being resolved into a plan
pub struct Transaction {
    local: Rc<dyn Store>,
    /// Remote stores in caller-supplied priority order
    remotes: Vec<Rc<dyn Store>>,
    config: Config,
    state: Cell<TransactionState>,
    install: RefCell<Vec<Rc<Package>>>,
    update: RefCell<Vec<Rc<Package>>>,
    remove: RefCell<Vec<Rc<Package>>>,
    reinstall: RefCell<Vec<Rc<Package>>>,
}

impl Transaction {
    pub fn new(local: Rc<dyn Store>, remotes: Vec<Rc<dyn Store>>, config: &Config) -> Self {
        Self {
            local,
            remotes,
            config: config.clone(),
            state: Cell::new(TransactionState::Unresolved),
            install: RefCell::new(Vec::new()),
            update: RefCell::new(Vec::new()),
            remove: RefCell::new(Vec::new()),
            reinstall: RefCell::new(Vec::new()),
        }
    }

    pub fn state(&self) -> TransactionState {
        self.state.get()
    }

    // -- request accumulation ----------------------------------------------

    fn add_to(&self, set: &RefCell<Vec<Rc<Package>>>, package: Rc<Package>) -> Result<()> {
        if self.state.get() != TransactionState::Unresolved {
            return Err(Error::InvalidState(
                "cannot add requests once resolution has started".to_string(),
            ));
        }

        // already in another set: the request is contradictory
        for other in [&self.install, &self.update, &self.remove, &self.reinstall] {
            if std::ptr::eq(other, set) {
                continue;
            }
            if set_contains(other, package.id()) {
                return Err(Error::InvalidState(format!(
                    "{} is already requested in a conflicting set",
                    package.printable()
                )));
            }
        }

        push_unique(set, package);
        Ok(())
    }

    /// Request a package install
    pub fn add_install(&self, package: Rc<Package>) -> Result<()> {
        debug!("add_install {}", package.id());
        self.add_to(&self.install, package)
    }

    /// Request an update to the given (newer, remote) package
    pub fn add_update(&self, package: Rc<Package>) -> Result<()> {
        debug!("add_update {}", package.id());
        self.add_to(&self.update, package)
    }

    /// Request removal of an installed package
    pub fn add_remove(&self, package: Rc<Package>) -> Result<()> {
        debug!("add_remove {}", package.id());
        self.add_to(&self.remove, package)
    }

    /// Request a reinstall of an installed package
    pub fn add_reinstall(&self, package: Rc<Package>) -> Result<()> {
        debug!("add_reinstall {}", package.id());
        self.add_to(&self.reinstall, package)
    }

    // -- resolution --------------------------------------------------------

    /// Resolve the accumulated requests into a dependency-closed,
    /// conflict-free plan.
    ///
    /// Not resumable: after a failure the transaction stays failed until
    /// [`Transaction::reset`].
    pub fn resolve(&self, progress: &Progress) -> Result<()> {
        if self.state.get() != TransactionState::Unresolved {
            return Err(Error::InvalidState(
                "transaction has already been resolved".to_string(),
            ));
        }
        self.state.set(TransactionState::Resolving);

        let result = self.resolve_inner(progress);
        match &result {
            Ok(()) => {
                self.state.set(TransactionState::Resolved);
                info!(
                    "resolved: {} to install, {} to update, {} to remove",
                    self.install.borrow().len(),
                    self.update.borrow().len(),
                    self.remove.borrow().len()
                );
            }
            Err(e) => {
                self.state.set(TransactionState::Failed);
                warn!("resolution failed: {}", e);
            }
        }
        result
    }

    fn resolve_inner(&self, progress: &Progress) -> Result<()> {
        // loading store snapshots is quick next to the passes
        progress.set_step_weights(&[20, 80])?;

        // snapshot every store once; they must not change mid-resolve
        let child = progress.child()?;
        child.set_steps(1 + self.remotes.len())?;
        let step = child.child()?;
        let installed = self.local.get_packages(&step)?;
        step.finished()?;

        let mut snapshots: Vec<Vec<Rc<Package>>> = Vec::with_capacity(self.remotes.len());
        for store in &self.remotes {
            let step = child.child()?;
            snapshots.push(store.get_packages(&step)?);
            step.finished()?;
        }

        // iterate to a fixed point under the pass cap; cycles in the
        // dependency graph converge because a satisfied requirement is
        // never expanded twice
        let child = progress.child()?;
        let mut pass = 0u32;
        loop {
            pass += 1;
            if pass > self.config.resolver_pass_limit {
                return Err(Error::NotConverged(self.config.resolver_pass_limit));
            }
            child.check_cancelled()?;
            debug!("resolution pass {}", pass);

            let mut changed = false;
            changed |= self.resolve_updates(&installed)?;
            changed |= self.resolve_requires(&installed, &snapshots, &child)?;
            changed |= self.resolve_obsoletes(&installed, &child)?;
            changed |= self.dedupe_candidates();

            if !changed {
                self.check_conflicts(&installed, &child)?;
                break;
            }
        }
        child.finished()?;
        Ok(())
    }

    /// Install + update + reinstall: everything going onto the system
    fn goal_packages(&self) -> Vec<Rc<Package>> {
        let mut goal = self.install.borrow().clone();
        goal.extend(self.update.borrow().iter().cloned());
        goal.extend(self.reinstall.borrow().iter().cloned());
        goal
    }

    fn removing_ids(&self) -> HashSet<String> {
        self.remove
            .borrow()
            .iter()
            .map(|package| package.id().to_string())
            .collect()
    }

    /// Schedule removal of the installed versions every update replaces
    fn resolve_updates(&self, installed: &[Rc<Package>]) -> Result<bool> {
        let mut changed = false;
        let updates = self.update.borrow().clone();
        for package in updates {
            for old in installed {
                if old.name() != package.name() {
                    continue;
                }
                if set_contains(&self.remove, old.id()) {
                    continue;
                }
                debug!("update {} replaces {}", package.printable(), old.printable());
                push_unique(&self.remove, Rc::clone(old));
                changed = true;
            }
        }
        Ok(changed)
    }

    /// Whether a requirement is already covered by the goal set or by a
    /// package staying installed
    fn depend_satisfied(
        &self,
        depend: &Depend,
        installed: &[Rc<Package>],
        removing: &HashSet<String>,
        progress: &Progress,
    ) -> Result<bool> {
        for package in self.goal_packages() {
            if package.satisfying_depend(depend, progress)?.is_some() {
                return Ok(true);
            }
        }
        for package in installed {
            if removing.contains(package.id()) {
                continue;
            }
            if package.satisfying_depend(depend, progress)?.is_some() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// One pass of requirement expansion over the goal set
    fn resolve_requires(
        &self,
        installed: &[Rc<Package>],
        snapshots: &[Vec<Rc<Package>>],
        progress: &Progress,
    ) -> Result<bool> {
        let mut changed = false;
        let goal = self.goal_packages();
        for package in &goal {
            let requires = package.requires(progress)?;
            for depend in requires {
                let removing = self.removing_ids();
                if self.depend_satisfied(&depend, installed, &removing, progress)? {
                    continue;
                }
                let candidate = self
                    .find_provider(&depend, snapshots, progress)?
                    .ok_or_else(|| Error::UnresolvedDepend {
                        requirer: package.id().to_string(),
                        depend: depend.to_string(),
                    })?;
                info!(
                    "adding {} to satisfy '{}' required by {}",
                    candidate.printable(),
                    depend,
                    package.printable()
                );
                push_unique(&self.install, candidate);
                changed = true;
            }
        }
        Ok(changed)
    }

    /// Scan every remote store for the best provider of a requirement.
    ///
    /// All stores are consulted before choosing: among everything that
    /// satisfies, the provider whose matched depend compares greatest
    /// wins, narrowed to the best arch, newest candidate last.
    fn find_provider(
        &self,
        depend: &Depend,
        snapshots: &[Vec<Rc<Package>>],
        progress: &Progress,
    ) -> Result<Option<Rc<Package>>> {
        let mut matches: Vec<(Rc<Package>, Depend)> = Vec::new();
        let mut best: Option<Depend> = None;

        for packages in snapshots {
            for package in packages {
                let Some(satisfies) = package.satisfying_depend(depend, progress)? else {
                    continue;
                };
                if best
                    .as_ref()
                    .is_none_or(|b| Depend::compare(&satisfies, b) == Ordering::Greater)
                {
                    best = Some(satisfies.clone());
                }
                matches.push((Rc::clone(package), satisfies));
            }
        }

        let Some(best) = best else {
            return Ok(None);
        };

        // keep only providers of the best-comparing depend
        let mut candidates: Vec<Rc<Package>> = matches
            .into_iter()
            .filter(|(_, satisfies)| Depend::compare(satisfies, &best) == Ordering::Equal)
            .map(|(package, _)| package)
            .collect();

        collection::filter_best_arch(&mut candidates, &self.config.basearch);
        if candidates.is_empty() {
            // providers exist but none is installable on this arch
            return Ok(None);
        }
        Ok(Some(collection::newest(&candidates)?))
    }

    /// Schedule removal of installed packages obsoleted by the goal set.
    ///
    /// Obsoletes match against the installed package's name and version,
    /// not its provides.
    fn resolve_obsoletes(
        &self,
        installed: &[Rc<Package>],
        progress: &Progress,
    ) -> Result<bool> {
        let mut changed = false;
        let goal = self.goal_packages();
        for package in &goal {
            let obsoletes = package.obsoletes(progress)?;
            for depend in obsoletes {
                for old in installed {
                    if set_contains(&self.remove, old.id()) {
                        continue;
                    }
                    if old.as_depend().satisfies(&depend) {
                        info!("{} obsoletes {}", package.printable(), old.printable());
                        push_unique(&self.remove, Rc::clone(old));
                        changed = true;
                    }
                }
            }
        }
        Ok(changed)
    }

    /// Verify the converged goal set is conflict-free in both directions
    fn check_conflicts(&self, installed: &[Rc<Package>], progress: &Progress) -> Result<()> {
        let goal = self.goal_packages();
        let removing = self.removing_ids();
        let remaining: Vec<&Rc<Package>> = installed
            .iter()
            .filter(|package| !removing.contains(package.id()))
            .collect();

        for package in &goal {
            // what this package declares conflicts against
            for depend in package.conflicts(progress)? {
                for other in &goal {
                    if other.id() == package.id() {
                        continue;
                    }
                    if other.satisfying_depend(&depend, progress)?.is_some() {
                        return Err(Error::Conflict {
                            package: package.id().to_string(),
                            conflicts_with: other.id().to_string(),
                        });
                    }
                }
                for old in &remaining {
                    if old.satisfying_depend(&depend, progress)?.is_some() {
                        return Err(Error::Conflict {
                            package: package.id().to_string(),
                            conflicts_with: old.id().to_string(),
                        });
                    }
                }
            }

            // the reverse direction: an installed package declaring a
            // conflict against something we are adding
            for old in &remaining {
                for depend in old.conflicts(progress)? {
                    if package.satisfying_depend(&depend, progress)?.is_some() {
                        return Err(Error::Conflict {
                            package: old.id().to_string(),
                            conflicts_with: package.id().to_string(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Keep a single candidate per package name (or name+arch with
    /// multilib allowed) on the install and update sides
    fn dedupe_candidates(&self) -> bool {
        let mut changed = false;
        for set in [&self.install, &self.update] {
            let mut packages = set.borrow().clone();
            let before = packages.len();
            if self.config.allow_multilib {
                filter_newest_per_name_arch(&mut packages);
            } else {
                collection::filter_newest(&mut packages);
            }
            if packages.len() != before {
                *set.borrow_mut() = packages;
                changed = true;
            }
        }
        changed
    }

    // -- frozen results ----------------------------------------------------

    fn frozen(&self, set: &RefCell<Vec<Rc<Package>>>) -> Result<Vec<Rc<Package>>> {
        if self.state.get() != TransactionState::Resolved {
            return Err(Error::InvalidState(
                "transaction is not resolved".to_string(),
            ));
        }
        Ok(set.borrow().clone())
    }

    /// Packages to install, valid once resolved
    pub fn get_install(&self) -> Result<Vec<Rc<Package>>> {
        self.frozen(&self.install)
    }

    /// Packages to update, valid once resolved
    pub fn get_update(&self) -> Result<Vec<Rc<Package>>> {
        self.frozen(&self.update)
    }

    /// Packages to remove, valid once resolved
    pub fn get_remove(&self) -> Result<Vec<Rc<Package>>> {
        self.frozen(&self.remove)
    }

    /// Packages to reinstall, valid once resolved
    pub fn get_reinstall(&self) -> Result<Vec<Rc<Package>>> {
        self.frozen(&self.reinstall)
    }

    /// Clear all requests and resolution state for a fresh attempt
    pub fn reset(&self) {
        self.install.borrow_mut().clear();
        self.update.borrow_mut().clear();
        self.remove.borrow_mut().clear();
        self.reinstall.borrow_mut().clear();
        self.state.set(TransactionState::Unresolved);
    }
}

fn set_contains(set: &RefCell<Vec<Rc<Package>>>, id: &str) -> bool {
    set.borrow().iter().any(|package| package.id() == id)
}

/// Append to a set unless the id is already present
fn push_unique(set: &RefCell<Vec<Rc<Package>>>, package: Rc<Package>) {
    if !set_contains(set, package.id()) {
        set.borrow_mut().push(package);
    }
}

/// Multilib variant of newest-filtering: group by name+arch instead of
/// name, so differing architectures of one package can coexist
fn filter_newest_per_name_arch(packages: &mut Vec<Rc<Package>>) {
    collection::filter_duplicates(packages);

    let flags = COMPARE_VERSION | COMPARE_INSTALLED | COMPARE_DATA;
    let mut tracked: HashMap<String, Rc<Package>> = HashMap::new();
    let mut keep: HashSet<String> = HashSet::new();

    for package in packages.iter() {
        let key = package.name_arch();
        let Some(best) = tracked.get(&key) else {
            keep.insert(package.basic_id());
            tracked.insert(key, Rc::clone(package));
            continue;
        };
        if Package::compare_full(package, best, flags) == Ordering::Greater {
            keep.remove(&best.basic_id());
            keep.insert(package.basic_id());
            tracked.insert(key, Rc::clone(package));
        }
    }
    packages.retain(|package| keep.contains(&package.basic_id()));
}
