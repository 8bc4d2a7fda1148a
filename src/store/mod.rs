// src/store/mod.rs

//! Package sources
//!
//! A [`Store`] is a queryable source of packages: the local installed
//! database, a remote repository, or a synthetic in-memory set. The
//! resolver only ever talks to the trait, so every concrete kind is
//! interchangeable. Packages returned from a store are shared handles;
//! the store keeps its own reference but never owns one exclusively.

use crate::collection;
use crate::depend::Depend;
use crate::error::Result;
use crate::package::{Package, PackageId};
use crate::progress::Progress;
use std::rc::Rc;

pub mod local;
pub mod memory;
pub mod remote;

pub use local::LocalStore;
pub use memory::MemoryStore;
pub use remote::RemoteStore;

/// The backing kind of a store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// The installed-package database
    Local,
    /// A remote repository
    Remote,
    /// A synthetic in-memory source
    Memory,
}

/// A queryable source of packages
pub trait Store {
    /// The origin label stamped on this store's packages, e.g.
    /// "installed" or a repository id
    fn id(&self) -> &str;

    fn kind(&self) -> StoreKind;

    /// Load the package list into memory. Idempotent; every query loads
    /// on demand, so calling this explicitly is just a way to control
    /// when the work happens.
    fn load(&self, progress: &Progress) -> Result<()>;

    /// All packages in the store
    fn get_packages(&self, progress: &Progress) -> Result<Vec<Rc<Package>>>;

    /// Exact-id lookup
    fn find_package(&self, package_id: &PackageId, progress: &Progress) -> Result<Rc<Package>> {
        let packages = self.get_packages(progress)?;
        collection::find(&packages, package_id)
    }

    /// Packages whose name contains any of the search terms
    fn search_name(&self, terms: &[&str], progress: &Progress) -> Result<Vec<Rc<Package>>> {
        let packages = self.get_packages(progress)?;
        Ok(packages
            .into_iter()
            .filter(|package| terms.iter().any(|term| package.name().contains(term)))
            .collect())
    }

    /// Installable candidates matching the names exactly
    fn resolve(&self, names: &[&str], progress: &Progress) -> Result<Vec<Rc<Package>>> {
        let packages = self.get_packages(progress)?;
        Ok(packages
            .into_iter()
            .filter(|package| names.contains(&package.name()))
            .collect())
    }

    /// Packages satisfying any of the given depends, either through an
    /// explicit provide or their own name and version
    fn what_provides(
        &self,
        depends: &[Depend],
        progress: &Progress,
    ) -> Result<Vec<Rc<Package>>> {
        let packages = self.get_packages(progress)?;
        let mut matches = Vec::new();
        for package in packages {
            for depend in depends {
                if package.satisfying_depend(depend, progress)?.is_some() {
                    matches.push(package);
                    break;
                }
            }
        }
        Ok(matches)
    }
}
