// src/package.rs

//! Concrete package representation
//!
//! A [`Package`] is identified by an immutable [`PackageId`] and carries
//! lazily-populated metadata: descriptive fields and the four dependency
//! relation lists (requires, provides, conflicts, obsoletes). Fields are
//! absent until first requested, fetched through the owning store's
//! [`PackageLoader`] and then cached for the lifetime of the package.
//! Packages are shared `Rc` handles; stores and transactions never own
//! one exclusively.
//!
//! Each relation keeps two lookup caches so repeated dependency queries
//! stay O(1): an "any version" map keyed by plain name (the common case)
//! and a description-keyed memo of versioned lookups, which also records
//! negative outcomes.

use crate::arch::arch_is_compatible;
use crate::depend::{Depend, DependFlag};
use crate::error::{Error, Result};
use crate::progress::Progress;
use crate::version::compare_evr;
use std::cell::{Cell, OnceCell, RefCell};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use tracing::debug;

/// Origin label given to packages from the installed database
pub const DATA_INSTALLED: &str = "installed";

/// Compare flag: include the package name
pub const COMPARE_NAME: u32 = 1;
/// Compare flag: include the EVR version
pub const COMPARE_VERSION: u32 = 2;
/// Compare flag: include the architecture
pub const COMPARE_ARCH: u32 = 4;
/// Compare flag: prefer installed packages
pub const COMPARE_INSTALLED: u32 = 8;
/// Compare flag: include the origin label
pub const COMPARE_DATA: u32 = 16;

/// Canonical package identity: name, version-release, arch, origin label
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageId {
    pub name: String,
    pub version: String,
    pub arch: String,
    pub data: String,
}

impl PackageId {
    pub fn new(name: &str, version: &str, arch: &str, data: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            arch: arch.to_string(),
            data: data.to_string(),
        }
    }

    /// Parse the canonical `name;version;arch;data` form
    pub fn parse(text: &str) -> Result<Self> {
        let sections: Vec<&str> = text.split(';').collect();
        if sections.len() != 4 || sections[0].is_empty() {
            return Err(Error::Parse(format!("not a valid package id: '{}'", text)));
        }
        Ok(Self::new(sections[0], sections[1], sections[2], sections[3]))
    }

    /// The identity without the origin label, used for de-duplication
    pub fn basic_id(&self) -> String {
        format!("{};{};{}", self.name, self.version, self.arch)
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{};{};{};{}",
            self.name, self.version, self.arch, self.data
        )
    }
}

/// The kinds of data a [`PackageLoader`] can be asked to supply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Summary,
    Description,
    License,
    Url,
    Group,
    Category,
    Size,
    Files,
    Requires,
    Provides,
    Conflicts,
    Obsoletes,
}

impl FieldKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FieldKind::Summary => "summary",
            FieldKind::Description => "description",
            FieldKind::License => "license",
            FieldKind::Url => "url",
            FieldKind::Group => "group",
            FieldKind::Category => "category",
            FieldKind::Size => "size",
            FieldKind::Files => "files",
            FieldKind::Requires => "requires",
            FieldKind::Provides => "provides",
            FieldKind::Conflicts => "conflicts",
            FieldKind::Obsoletes => "obsoletes",
        }
    }
}

/// Backing-store callback that populates one lazily-fetched field.
///
/// Implementations must set exactly the requested field kind via the
/// package's `set_*` methods.
pub trait PackageLoader {
    fn ensure_data(&self, package: &Package, kind: FieldKind, progress: &Progress) -> Result<()>;
}

/// One dependency relation list plus its two lookup caches
#[derive(Default)]
struct Relation {
    depends: RefCell<Vec<Rc<Depend>>>,
    /// Name-keyed cache covering unversioned queries; fully populated at
    /// load time, so absence is authoritative
    any: RefCell<HashMap<String, Rc<Depend>>>,
    /// Description-keyed memo of versioned lookups, negative results
    /// included
    memo: RefCell<HashMap<String, Option<Rc<Depend>>>>,
    loaded: Cell<bool>,
    /// Whether the relation contains any `/`-path entry
    any_file: Cell<bool>,
}

impl Relation {
    /// Populate the list and the any-cache. Caches are never invalidated
    /// afterwards.
    fn load(&self, depends: Vec<Depend>) {
        let mut any = self.any.borrow_mut();
        let mut list = self.depends.borrow_mut();
        for depend in depends {
            let depend = Rc::new(depend);
            if depend.is_file() {
                self.any_file.set(true);
            }
            any.insert(depend.name().to_string(), Rc::clone(&depend));
            list.push(depend);
        }
        self.loaded.set(true);
    }

    /// Look up a satisfying depend, assuming the relation is loaded
    fn search(&self, depend: &Depend) -> Option<Rc<Depend>> {
        // a file depend, but we know there are none: skip both caches
        if depend.is_file() && !self.any_file.get() {
            return None;
        }

        // unversioned queries hit the fully-populated any-cache
        if depend.flag() == DependFlag::Any {
            return self.any.borrow().get(depend.name()).cloned();
        }

        // versioned queries go through the description memo
        let key = depend.description();
        if let Some(cached) = self.memo.borrow().get(&key) {
            return cached.clone();
        }
        let found = self
            .depends
            .borrow()
            .iter()
            .find(|have| have.satisfies(depend))
            .cloned();
        self.memo.borrow_mut().insert(key, found.clone());
        found
    }
}

/// A concrete package with lazily-populated metadata
pub struct Package {
    id: PackageId,
    /// Cached canonical rendering of the id
    id_string: String,
    installed: Cell<bool>,
    loader: RefCell<Option<Rc<dyn PackageLoader>>>,

    summary: OnceCell<String>,
    description: OnceCell<String>,
    license: OnceCell<String>,
    url: OnceCell<String>,
    group: OnceCell<String>,
    category: OnceCell<String>,
    size: OnceCell<u64>,
    files: OnceCell<Vec<String>>,
    /// Full artifact URL, set by remote stores
    source_url: OnceCell<String>,
    /// Expected artifact checksum, set by remote stores
    checksum: OnceCell<String>,

    requires: Relation,
    provides: Relation,
    conflicts: Relation,
    obsoletes: Relation,
}

impl Package {
    /// Create a package with its immutable identity
    pub fn new(id: PackageId) -> Self {
        let id_string = id.to_string();
        Self {
            id,
            id_string,
            installed: Cell::new(false),
            loader: RefCell::new(None),
            summary: OnceCell::new(),
            description: OnceCell::new(),
            license: OnceCell::new(),
            url: OnceCell::new(),
            group: OnceCell::new(),
            category: OnceCell::new(),
            size: OnceCell::new(),
            files: OnceCell::new(),
            source_url: OnceCell::new(),
            checksum: OnceCell::new(),
            requires: Relation::default(),
            provides: Relation::default(),
            conflicts: Relation::default(),
            obsoletes: Relation::default(),
        }
    }

    /// Attach the store callback that supplies lazy fields
    pub fn set_loader(&self, loader: Rc<dyn PackageLoader>) {
        *self.loader.borrow_mut() = Some(loader);
    }

    pub fn package_id(&self) -> &PackageId {
        &self.id
    }

    /// Canonical `name;version;arch;data` id string
    pub fn id(&self) -> &str {
        &self.id_string
    }

    pub fn name(&self) -> &str {
        &self.id.name
    }

    pub fn version(&self) -> &str {
        &self.id.version
    }

    pub fn arch(&self) -> &str {
        &self.id.arch
    }

    pub fn data(&self) -> &str {
        &self.id.data
    }

    /// Identity without the origin label, used for de-duplication
    pub fn basic_id(&self) -> String {
        self.id.basic_id()
    }

    /// `name.arch` key used when grouping multilib candidates
    pub fn name_arch(&self) -> String {
        format!("{}.{}", self.id.name, self.id.arch)
    }

    /// One-line human form, e.g. `hal-0.5.2-1.i386 (fedora)`
    pub fn printable(&self) -> String {
        format!("{}-{}.{} ({})", self.id.name, self.id.version, self.id.arch, self.id.data)
    }

    pub fn is_installed(&self) -> bool {
        self.installed.get()
    }

    pub fn set_installed(&self, installed: bool) {
        self.installed.set(installed);
    }

    /// Development packages are not interesting to most frontends
    pub fn is_devel(&self) -> bool {
        let name = self.name();
        name.ends_with("-devel")
            || name.ends_with("-debuginfo")
            || name.ends_with("-static")
            || name.ends_with("-libs")
    }

    /// Heuristic: the package drags in a graphical toolkit
    pub fn is_gui(&self, progress: &Progress) -> Result<bool> {
        let requires = self.requires(progress)?;
        Ok(requires
            .iter()
            .any(|depend| {
                let name = depend.name();
                name.contains("gtk") || name.contains("kde") || name.contains("qt")
            }))
    }

    /// Whether the package is installable on the given base arch
    pub fn is_native(&self, basearch: &str) -> bool {
        self.arch() == "noarch" || arch_is_compatible(basearch, self.arch())
    }

    fn ensure_data(&self, kind: FieldKind, progress: &Progress) -> Result<()> {
        let loader = self.loader.borrow().clone();
        match loader {
            Some(loader) => loader.ensure_data(self, kind, progress),
            None => Err(Error::Metadata(format!(
                "cannot get {} data for {}",
                kind.as_str(),
                self.id_string
            ))),
        }
    }

    // -- lazily-fetched descriptive fields ---------------------------------

    pub fn summary(&self, progress: &Progress) -> Result<&str> {
        if self.summary.get().is_none() {
            self.ensure_data(FieldKind::Summary, progress)?;
        }
        self.field(&self.summary, FieldKind::Summary)
    }

    pub fn description(&self, progress: &Progress) -> Result<&str> {
        if self.description.get().is_none() {
            self.ensure_data(FieldKind::Description, progress)?;
        }
        self.field(&self.description, FieldKind::Description)
    }

    pub fn license(&self, progress: &Progress) -> Result<&str> {
        if self.license.get().is_none() {
            self.ensure_data(FieldKind::License, progress)?;
        }
        self.field(&self.license, FieldKind::License)
    }

    pub fn url(&self, progress: &Progress) -> Result<&str> {
        if self.url.get().is_none() {
            self.ensure_data(FieldKind::Url, progress)?;
        }
        self.field(&self.url, FieldKind::Url)
    }

    pub fn group(&self, progress: &Progress) -> Result<&str> {
        if self.group.get().is_none() {
            self.ensure_data(FieldKind::Group, progress)?;
        }
        self.field(&self.group, FieldKind::Group)
    }

    pub fn category(&self, progress: &Progress) -> Result<&str> {
        if self.category.get().is_none() {
            self.ensure_data(FieldKind::Category, progress)?;
        }
        self.field(&self.category, FieldKind::Category)
    }

    pub fn size(&self, progress: &Progress) -> Result<u64> {
        if self.size.get().is_none() {
            self.ensure_data(FieldKind::Size, progress)?;
        }
        self.size.get().copied().ok_or_else(|| {
            Error::Metadata(format!("size not provided for {}", self.id_string))
        })
    }

    pub fn files(&self, progress: &Progress) -> Result<&[String]> {
        if self.files.get().is_none() {
            self.ensure_data(FieldKind::Files, progress)?;
        }
        self.files
            .get()
            .map(Vec::as_slice)
            .ok_or_else(|| Error::Metadata(format!("files not provided for {}", self.id_string)))
    }

    /// Full artifact URL, known only for remote packages
    pub fn source_url(&self) -> Option<&str> {
        self.source_url.get().map(String::as_str)
    }

    /// Expected artifact checksum, known only for remote packages
    pub fn checksum(&self) -> Option<&str> {
        self.checksum.get().map(String::as_str)
    }

    fn field<'a>(&self, cell: &'a OnceCell<String>, kind: FieldKind) -> Result<&'a str> {
        cell.get().map(String::as_str).ok_or_else(|| {
            Error::Metadata(format!(
                "{} not provided for {}",
                kind.as_str(),
                self.id_string
            ))
        })
    }

    // -- set-once mutators -------------------------------------------------

    pub fn set_summary(&self, summary: &str) -> Result<()> {
        self.set_field(&self.summary, summary, "summary")
    }

    pub fn set_description(&self, description: &str) -> Result<()> {
        self.set_field(&self.description, description, "description")
    }

    pub fn set_license(&self, license: &str) -> Result<()> {
        self.set_field(&self.license, license, "license")
    }

    pub fn set_url(&self, url: &str) -> Result<()> {
        self.set_field(&self.url, url, "url")
    }

    pub fn set_group(&self, group: &str) -> Result<()> {
        self.set_field(&self.group, group, "group")
    }

    pub fn set_category(&self, category: &str) -> Result<()> {
        self.set_field(&self.category, category, "category")
    }

    pub fn set_source_url(&self, source_url: &str) -> Result<()> {
        self.set_field(&self.source_url, source_url, "source url")
    }

    pub fn set_checksum(&self, checksum: &str) -> Result<()> {
        self.set_field(&self.checksum, checksum, "checksum")
    }

    pub fn set_size(&self, size: u64) -> Result<()> {
        self.size
            .set(size)
            .map_err(|_| Error::InvalidState(format!("size already set for {}", self.id_string)))
    }

    /// Set the file list. Every file becomes an implicit unversioned
    /// provide, so `Requires: /usr/bin/foo` resolves to the owner.
    pub fn set_files(&self, files: Vec<String>) -> Result<()> {
        if self.files.get().is_some() {
            return Err(Error::InvalidState(format!(
                "files already set for {}",
                self.id_string
            )));
        }
        {
            let mut any = self.provides.any.borrow_mut();
            let mut list = self.provides.depends.borrow_mut();
            for filename in &files {
                let depend = Rc::new(Depend::new_any(filename));
                any.insert(filename.clone(), Rc::clone(&depend));
                list.push(depend);
                self.provides.any_file.set(true);
            }
        }
        self.files
            .set(files)
            .map_err(|_| Error::InvalidState(format!("files already set for {}", self.id_string)))
    }

    fn set_field(&self, cell: &OnceCell<String>, value: &str, what: &str) -> Result<()> {
        cell.set(value.to_string()).map_err(|_| {
            Error::InvalidState(format!("{} already set for {}", what, self.id_string))
        })
    }

    fn set_relation(&self, relation: &Relation, depends: Vec<Depend>, kind: FieldKind) -> Result<()> {
        if relation.loaded.get() {
            return Err(Error::InvalidState(format!(
                "{} already set for {}",
                kind.as_str(),
                self.id_string
            )));
        }
        relation.load(depends);
        Ok(())
    }

    pub fn set_requires(&self, requires: Vec<Depend>) -> Result<()> {
        self.set_relation(&self.requires, requires, FieldKind::Requires)
    }

    pub fn set_provides(&self, provides: Vec<Depend>) -> Result<()> {
        self.set_relation(&self.provides, provides, FieldKind::Provides)
    }

    pub fn set_conflicts(&self, conflicts: Vec<Depend>) -> Result<()> {
        self.set_relation(&self.conflicts, conflicts, FieldKind::Conflicts)
    }

    pub fn set_obsoletes(&self, obsoletes: Vec<Depend>) -> Result<()> {
        self.set_relation(&self.obsoletes, obsoletes, FieldKind::Obsoletes)
    }

    // -- relation lists and queries ----------------------------------------

    fn relation_list(
        &self,
        relation: &Relation,
        kind: FieldKind,
        progress: &Progress,
    ) -> Result<Vec<Rc<Depend>>> {
        if !relation.loaded.get() {
            self.ensure_data(kind, progress)?;
        }
        Ok(relation.depends.borrow().clone())
    }

    pub fn requires(&self, progress: &Progress) -> Result<Vec<Rc<Depend>>> {
        self.relation_list(&self.requires, FieldKind::Requires, progress)
    }

    pub fn provides(&self, progress: &Progress) -> Result<Vec<Rc<Depend>>> {
        self.ensure_provides(progress)?;
        Ok(self.provides.depends.borrow().clone())
    }

    pub fn conflicts(&self, progress: &Progress) -> Result<Vec<Rc<Depend>>> {
        self.relation_list(&self.conflicts, FieldKind::Conflicts, progress)
    }

    pub fn obsoletes(&self, progress: &Progress) -> Result<Vec<Rc<Depend>>> {
        self.relation_list(&self.obsoletes, FieldKind::Obsoletes, progress)
    }

    /// Provides queries also need the file list, as files are implicit
    /// provides
    fn ensure_provides(&self, progress: &Progress) -> Result<()> {
        if !self.provides.loaded.get() {
            self.ensure_data(FieldKind::Provides, progress)?;
        }
        if self.files.get().is_none() {
            self.ensure_data(FieldKind::Files, progress)?;
        }
        Ok(())
    }

    /// Find a provide satisfying `depend`, or None
    pub fn provide(&self, depend: &Depend, progress: &Progress) -> Result<Option<Rc<Depend>>> {
        self.ensure_provides(progress)?;
        let found = self.provides.search(depend);
        if let Some(found) = &found {
            debug!("{} provides {}", self.id_string, found);
        }
        Ok(found)
    }

    /// Find a require satisfying `depend`, or None
    pub fn require(&self, depend: &Depend, progress: &Progress) -> Result<Option<Rc<Depend>>> {
        if !self.requires.loaded.get() {
            self.ensure_data(FieldKind::Requires, progress)?;
        }
        Ok(self.requires.search(depend))
    }

    /// Find a conflict matching `depend`, or None
    pub fn conflict(&self, depend: &Depend, progress: &Progress) -> Result<Option<Rc<Depend>>> {
        if !self.conflicts.loaded.get() {
            self.ensure_data(FieldKind::Conflicts, progress)?;
        }
        Ok(self.conflicts.search(depend))
    }

    /// Find an obsolete matching `depend`, or None
    pub fn obsolete(&self, depend: &Depend, progress: &Progress) -> Result<Option<Rc<Depend>>> {
        if !self.obsoletes.loaded.get() {
            self.ensure_data(FieldKind::Obsoletes, progress)?;
        }
        Ok(self.obsoletes.search(depend))
    }

    /// The versioned depend naming this package, used when matching
    /// obsoletes and conflicts against installed packages
    pub fn as_depend(&self) -> Depend {
        Depend::new(self.name(), DependFlag::Equal, self.version())
    }

    /// The depend through which this package satisfies `depend`: an
    /// explicit provide if there is one, otherwise the package's own
    /// name and version.
    pub fn satisfying_depend(
        &self,
        depend: &Depend,
        progress: &Progress,
    ) -> Result<Option<Depend>> {
        if let Some(provide) = self.provide(depend, progress)? {
            return Ok(Some((*provide).clone()));
        }
        let own = self.as_depend();
        if own.satisfies(depend) {
            return Ok(Some(own));
        }
        Ok(None)
    }

    // -- comparison --------------------------------------------------------

    /// Compare same-name packages by EVR, arch as tie-break.
    ///
    /// Returns None when the names differ, matching the legacy engine
    /// where cross-name comparison is meaningless.
    pub fn compare(a: &Package, b: &Package) -> Option<Ordering> {
        if !std::ptr::eq(a, b) && a.name() != b.name() {
            return None;
        }
        let ord = compare_evr(a.version(), b.version());
        if ord != Ordering::Equal {
            return Some(ord);
        }
        Some(a.arch().cmp(b.arch()))
    }

    /// Configurable comparison used by newest-candidate selection
    pub fn compare_full(a: &Package, b: &Package, flags: u32) -> Ordering {
        if flags & COMPARE_NAME != 0 {
            let ord = a.name().cmp(b.name());
            if ord != Ordering::Equal {
                return ord;
            }
        }
        if flags & COMPARE_VERSION != 0 {
            let ord = compare_evr(a.version(), b.version());
            if ord != Ordering::Equal {
                return ord;
            }
        }
        if flags & COMPARE_ARCH != 0 {
            let ord = a.arch().cmp(b.arch());
            if ord != Ordering::Equal {
                return ord;
            }
        }
        if flags & COMPARE_INSTALLED != 0 {
            let ord = a.is_installed().cmp(&b.is_installed());
            if ord != Ordering::Equal {
                return ord;
            }
        }
        if flags & COMPARE_DATA != 0 {
            let ord = a.data().cmp(b.data());
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    /// Multi-line dump of the loaded metadata
    pub fn describe(&self, progress: &Progress) -> Result<String> {
        let mut out = String::new();
        out.push_str(&format!("id={}\n", self.id_string));
        out.push_str(&format!("summary={}\n", self.summary(progress)?));
        out.push_str(&format!("description={}\n", self.description(progress)?));
        out.push_str(&format!("license={}\n", self.license(progress)?));
        out.push_str(&format!("size={}\n", self.size(progress)?));
        let files = self.files(progress)?;
        if !files.is_empty() {
            out.push_str("files:\n");
            for file in files {
                out.push_str(&format!("\t{}\n", file));
            }
        }
        for (label, depends) in [
            ("requires", self.requires(progress)?),
            ("provides", self.provides(progress)?),
            ("conflicts", self.conflicts(progress)?),
            ("obsoletes", self.obsoletes(progress)?),
        ] {
            if depends.is_empty() {
                continue;
            }
            out.push_str(&format!("{}:\n", label));
            for depend in depends {
                out.push_str(&format!("\t{}\n", depend));
            }
        }
        Ok(out)
    }

    /// Fill any still-unloaded relation or file list with an empty value.
    ///
    /// Synthetic packages have no loader, so anything left unset would
    /// otherwise fail relation queries with a metadata error.
    pub fn seal(&self) {
        for relation in [&self.requires, &self.provides, &self.conflicts, &self.obsoletes] {
            if !relation.loaded.get() {
                relation.load(Vec::new());
            }
        }
        if self.files.get().is_none() {
            let _ = self.files.set(Vec::new());
        }
    }
}

impl fmt::Debug for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Package")
            .field("id", &self.id_string)
            .field("installed", &self.installed.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_package(id: &str) -> Package {
        Package::new(PackageId::parse(id).unwrap())
    }

    #[test]
    fn test_package_id_roundtrip() {
        let id = PackageId::parse("hal;0.5.2-1;i386;fedora").unwrap();
        assert_eq!(id.name, "hal");
        assert_eq!(id.version, "0.5.2-1");
        assert_eq!(id.arch, "i386");
        assert_eq!(id.data, "fedora");
        assert_eq!(id.to_string(), "hal;0.5.2-1;i386;fedora");
    }

    #[test]
    fn test_package_id_invalid() {
        assert!(PackageId::parse("hal;1.0").is_err());
        assert!(PackageId::parse(";1.0;i386;fedora").is_err());
        assert!(PackageId::parse("a;b;c;d;e").is_err());
    }

    #[test]
    fn test_relation_set_twice_is_error() {
        let package = make_package("hal;0.5.2-1;i386;fedora");
        package.set_requires(vec![]).unwrap();
        assert!(matches!(
            package.set_requires(vec![]),
            Err(Error::InvalidState(_))
        ));
    }

    #[test]
    fn test_any_query_uses_cache() {
        let progress = Progress::new();
        let package = make_package("hal;0.5.2-1;i386;fedora");
        package
            .set_provides(vec![Depend::new("hal", DependFlag::Equal, "0.5.2")])
            .unwrap();
        package.set_files(vec![]).unwrap();

        let hit = package
            .provide(&Depend::new_any("hal"), &progress)
            .unwrap();
        assert!(hit.is_some());
        // absence in the any-cache is authoritative
        let miss = package
            .provide(&Depend::new_any("dbus"), &progress)
            .unwrap();
        assert!(miss.is_none());
    }

    #[test]
    fn test_versioned_query_memoizes_negative() {
        let progress = Progress::new();
        let package = make_package("hal;0.5.2-1;i386;fedora");
        package
            .set_provides(vec![Depend::new("hal", DependFlag::Equal, "0.5.2")])
            .unwrap();
        package.set_files(vec![]).unwrap();

        let need = Depend::new("hal", DependFlag::Greater, "1.0");
        assert!(package.provide(&need, &progress).unwrap().is_none());
        // second query comes out of the description memo
        assert!(package.provide(&need, &progress).unwrap().is_none());

        let need = Depend::new("hal", DependFlag::GreaterEqual, "0.5.2");
        assert!(package.provide(&need, &progress).unwrap().is_some());
    }

    #[test]
    fn test_file_provides() {
        let progress = Progress::new();
        let package = make_package("hal;0.5.2-1;i386;fedora");
        package.set_provides(vec![]).unwrap();
        package
            .set_files(vec!["/usr/bin/hal".to_string()])
            .unwrap();

        let hit = package
            .provide(&Depend::new_any("/usr/bin/hal"), &progress)
            .unwrap();
        assert!(hit.is_some());
    }

    #[test]
    fn test_file_fast_path() {
        let progress = Progress::new();
        let package = make_package("hal;0.5.2-1;i386;fedora");
        package.set_requires(vec![Depend::new_any("dbus")]).unwrap();

        // no file entries in requires: answered without scanning
        let miss = package
            .require(&Depend::new_any("/usr/bin/dbus"), &progress)
            .unwrap();
        assert!(miss.is_none());
    }

    #[test]
    fn test_missing_loader_is_metadata_error() {
        let progress = Progress::new();
        let package = make_package("hal;0.5.2-1;i386;fedora");
        assert!(matches!(
            package.require(&Depend::new_any("dbus"), &progress),
            Err(Error::Metadata(_))
        ));
    }

    #[test]
    fn test_compare() {
        let a = make_package("hal;0.5.2-1;i386;fedora");
        let b = make_package("hal;0.5.2-2;i386;fedora");
        let c = make_package("dbus;0.5.2-1;i386;fedora");
        assert_eq!(Package::compare(&a, &b), Some(Ordering::Less));
        assert_eq!(Package::compare(&b, &a), Some(Ordering::Greater));
        assert_eq!(Package::compare(&a, &c), None);
    }

    #[test]
    fn test_compare_full_installed_tiebreak() {
        let a = make_package("hal;0.5.2-1;i386;fedora");
        let b = make_package("hal;0.5.2-1;i386;installed");
        b.set_installed(true);
        let flags = COMPARE_VERSION | COMPARE_ARCH | COMPARE_INSTALLED;
        assert_eq!(Package::compare_full(&a, &b, flags), Ordering::Less);
        assert_eq!(Package::compare_full(&b, &a, flags), Ordering::Greater);
    }

    #[test]
    fn test_classification_helpers() {
        let progress = Progress::new();
        assert!(make_package("glib-devel;2.0-1;i386;fedora").is_devel());
        assert!(!make_package("glib;2.0-1;i386;fedora").is_devel());

        let package = make_package("gnome-power-manager;2.0-1;i386;fedora");
        package
            .set_requires(vec![Depend::new_any("libgtk-2.0.so.0")])
            .unwrap();
        assert!(package.is_gui(&progress).unwrap());

        let package = make_package("hal;0.5.2-1;i386;fedora");
        assert!(package.is_native("i686"));
        assert!(!package.is_native("x86_64"));
        assert!(make_package("tzdata;2020a-1;noarch;fedora").is_native("x86_64"));
    }

    #[test]
    fn test_seal_fills_empty_relations() {
        let progress = Progress::new();
        let package = make_package("hal;0.5.2-1;i386;fedora");
        package.seal();
        assert!(package
            .require(&Depend::new_any("dbus"), &progress)
            .unwrap()
            .is_none());
        assert!(package.requires(&progress).unwrap().is_empty());
    }
}
