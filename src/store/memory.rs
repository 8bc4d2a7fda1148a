// src/store/memory.rs

//! Synthetic in-memory store
//!
//! Holds packages assembled directly by the caller, with no backing
//! metadata source. Used by tests and by anything that needs to feed
//! hand-built packages into the resolver.

use crate::error::Result;
use crate::package::Package;
use crate::progress::Progress;
use crate::store::{Store, StoreKind};
use std::cell::RefCell;
use std::rc::Rc;

/// An in-memory store of hand-assembled packages
pub struct MemoryStore {
    id: String,
    packages: RefCell<Vec<Rc<Package>>>,
}

impl MemoryStore {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            packages: RefCell::new(Vec::new()),
        }
    }

    /// Add a package to the store.
    ///
    /// The package is sealed: any relation or file list the caller did
    /// not set becomes empty rather than a lazy-load failure.
    pub fn add_package(&self, package: Rc<Package>) {
        package.seal();
        self.packages.borrow_mut().push(package);
    }
}

impl Store for MemoryStore {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> StoreKind {
        StoreKind::Memory
    }

    fn load(&self, _progress: &Progress) -> Result<()> {
        Ok(())
    }

    fn get_packages(&self, _progress: &Progress) -> Result<Vec<Rc<Package>>> {
        Ok(self.packages.borrow().clone())
    }
}
