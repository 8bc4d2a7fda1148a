// src/store/remote.rs

//! Remote repository store
//!
//! A repository is a base URL with a JSON metadata index describing the
//! packages it serves. The index is cached on disk and refreshed when it
//! expires; loading builds fully-populated packages, so no lazy loader
//! is attached. Artifact URLs and checksums are stamped on each package
//! for the download stage.

use crate::config::{Config, RepoConfig};
use crate::depend::Depend;
use crate::download::DownloadClient;
use crate::error::{Error, Result};
use crate::package::{Package, PackageId};
use crate::progress::Progress;
use crate::store::{Store, StoreKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;
use tracing::{debug, info, warn};

/// Repository metadata index
#[derive(Debug, Serialize, Deserialize)]
pub struct RepoMetadata {
    pub name: String,
    #[serde(default)]
    pub packages: Vec<PackageMeta>,
}

/// One package entry in the metadata index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageMeta {
    pub name: String,
    /// Full `[epoch:]version-release` string
    pub version: String,
    pub arch: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub license: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub size: u64,
    /// Artifact path relative to the repository base URL
    pub location: String,
    #[serde(default)]
    pub checksum: String,
    #[serde(default)]
    pub files: Vec<String>,
    /// Textual depend descriptions, e.g. "dbus >= 0.5"
    #[serde(default)]
    pub requires: Vec<String>,
    #[serde(default)]
    pub provides: Vec<String>,
    #[serde(default)]
    pub conflicts: Vec<String>,
    #[serde(default)]
    pub obsoletes: Vec<String>,
}

/// A remote repository store
pub struct RemoteStore {
    repo: RepoConfig,
    cache_dir: PathBuf,
    packages: RefCell<Option<Vec<Rc<Package>>>>,
}

impl RemoteStore {
    pub fn new(repo: RepoConfig, config: &Config) -> Self {
        let cache_dir = config.cache_dir.join(&repo.id);
        Self {
            repo,
            cache_dir,
            packages: RefCell::new(None),
        }
    }

    pub fn priority(&self) -> i32 {
        self.repo.priority
    }

    pub fn enabled(&self) -> bool {
        self.repo.enabled
    }

    fn metadata_path(&self) -> PathBuf {
        self.cache_dir.join("metadata.json")
    }

    fn sync_path(&self) -> PathBuf {
        self.cache_dir.join("last_sync")
    }

    /// Whether the cached metadata is missing or older than the expiry
    pub fn needs_refresh(&self) -> bool {
        if !self.metadata_path().exists() {
            return true;
        }
        let Ok(stamp) = fs::read_to_string(self.sync_path()) else {
            return true;
        };
        match DateTime::parse_from_rfc3339(stamp.trim()) {
            Ok(last_sync) => {
                let age = Utc::now().signed_duration_since(last_sync);
                age.num_seconds() < 0 || age.num_seconds() as u64 > self.repo.metadata_expire
            }
            // unparseable stamp, force a refresh
            Err(_) => true,
        }
    }

    /// Fetch a fresh metadata index and reparse it.
    ///
    /// A two-step weighted operation: downloading dominates at 80%,
    /// parsing takes the rest.
    pub fn refresh(&self, client: &DownloadClient, progress: &Progress) -> Result<()> {
        info!("refreshing repository {}", self.repo.id);
        progress.set_step_weights(&[80, 20])?;

        let url = format!(
            "{}/metadata.json",
            self.repo.base_url.trim_end_matches('/')
        );
        let child = progress.child()?;
        client.fetch(&url, &self.metadata_path(), &child)?;
        child.finished()?;

        let child = progress.child()?;
        *self.packages.borrow_mut() = None;
        self.ensure_loaded(&child)?;
        child.finished()?;

        fs::write(self.sync_path(), Utc::now().to_rfc3339())?;
        Ok(())
    }

    fn ensure_loaded(&self, progress: &Progress) -> Result<()> {
        if self.packages.borrow().is_some() {
            return Ok(());
        }
        progress.check_cancelled()?;

        let path = self.metadata_path();
        let text = fs::read_to_string(&path).map_err(|e| {
            Error::Metadata(format!(
                "no metadata for repository {} ({}): refresh it first",
                self.repo.id, e
            ))
        })?;
        let metadata: RepoMetadata = serde_json::from_str(&text)
            .map_err(|e| Error::Metadata(format!("corrupt metadata for {}: {}", self.repo.id, e)))?;

        let base_url = self.repo.base_url.trim_end_matches('/');
        let mut packages = Vec::with_capacity(metadata.packages.len());
        for meta in metadata.packages {
            packages.push(Rc::new(self.build_package(meta, base_url)?));
        }
        debug!(
            "loaded {} packages from repository {}",
            packages.len(),
            self.repo.id
        );
        *self.packages.borrow_mut() = Some(packages);
        Ok(())
    }

    fn build_package(&self, meta: PackageMeta, base_url: &str) -> Result<Package> {
        let package = Package::new(PackageId::new(
            &meta.name,
            &meta.version,
            &meta.arch,
            &self.repo.id,
        ));
        package.set_summary(&meta.summary)?;
        package.set_description(&meta.description)?;
        package.set_license(&meta.license)?;
        package.set_url(&meta.url)?;
        package.set_group(&meta.group)?;
        package.set_category(&meta.category)?;
        package.set_size(meta.size)?;
        package.set_source_url(&format!("{}/{}", base_url, meta.location))?;
        if !meta.checksum.is_empty() {
            package.set_checksum(&meta.checksum)?;
        }
        package.set_files(meta.files)?;
        package.set_requires(parse_depends(&meta.requires, &meta.name)?)?;
        package.set_provides(parse_depends(&meta.provides, &meta.name)?)?;
        package.set_conflicts(parse_depends(&meta.conflicts, &meta.name)?)?;
        package.set_obsoletes(parse_depends(&meta.obsoletes, &meta.name)?)?;
        Ok(package)
    }
}

fn parse_depends(descriptions: &[String], package: &str) -> Result<Vec<Depend>> {
    let mut depends = Vec::with_capacity(descriptions.len());
    for description in descriptions {
        match Depend::parse(description) {
            Ok(depend) => depends.push(depend),
            Err(e) => {
                warn!("bad depend '{}' in {}: {}", description, package, e);
                return Err(e);
            }
        }
    }
    Ok(depends)
}

impl Store for RemoteStore {
    fn id(&self) -> &str {
        &self.repo.id
    }

    fn kind(&self) -> StoreKind {
        StoreKind::Remote
    }

    fn load(&self, progress: &Progress) -> Result<()> {
        self.ensure_loaded(progress)?;
        progress.finished()
    }

    fn get_packages(&self, progress: &Progress) -> Result<Vec<Rc<Package>>> {
        self.ensure_loaded(progress)?;
        Ok(self
            .packages
            .borrow()
            .as_ref()
            .map(Vec::clone)
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::depend::DependFlag;
    use tempfile::TempDir;

    fn write_metadata(dir: &TempDir, repo_id: &str, json: &str) {
        let repo_dir = dir.path().join(repo_id);
        fs::create_dir_all(&repo_dir).unwrap();
        fs::write(repo_dir.join("metadata.json"), json).unwrap();
    }

    fn test_store(dir: &TempDir) -> RemoteStore {
        let mut config = Config::new();
        config.cache_dir = dir.path().to_path_buf();
        let repo = RepoConfig {
            id: "fedora".to_string(),
            base_url: "https://example.com/fedora/".to_string(),
            enabled: true,
            priority: 0,
            metadata_expire: 3600,
        };
        RemoteStore::new(repo, &config)
    }

    #[test]
    fn test_load_metadata() {
        let dir = TempDir::new().unwrap();
        write_metadata(
            &dir,
            "fedora",
            r#"{
                "name": "Fedora",
                "packages": [{
                    "name": "hal",
                    "version": "0.5.2-1",
                    "arch": "i386",
                    "summary": "Hardware abstraction layer",
                    "size": 1024,
                    "location": "packages/hal-0.5.2-1.i386.rpm",
                    "checksum": "cafe",
                    "files": ["/usr/bin/hald"],
                    "requires": ["dbus >= 0.5"],
                    "provides": ["hal = 0.5.2-1"]
                }]
            }"#,
        );

        let progress = Progress::new();
        let store = test_store(&dir);
        let packages = store.get_packages(&progress).unwrap();
        assert_eq!(packages.len(), 1);

        let package = &packages[0];
        assert_eq!(package.id(), "hal;0.5.2-1;i386;fedora");
        assert!(!package.is_installed());
        assert_eq!(
            package.source_url(),
            Some("https://example.com/fedora/packages/hal-0.5.2-1.i386.rpm")
        );
        assert_eq!(package.checksum(), Some("cafe"));

        let hit = package
            .require(&Depend::new("dbus", DependFlag::Equal, "0.6"), &progress)
            .unwrap();
        assert!(hit.is_some());
    }

    #[test]
    fn test_missing_metadata_is_error() {
        let dir = TempDir::new().unwrap();
        let progress = Progress::new();
        let store = test_store(&dir);
        assert!(store.needs_refresh());
        assert!(matches!(
            store.get_packages(&progress),
            Err(Error::Metadata(_))
        ));
    }

    #[test]
    fn test_corrupt_metadata_is_error() {
        let dir = TempDir::new().unwrap();
        write_metadata(&dir, "fedora", "not json");
        let progress = Progress::new();
        let store = test_store(&dir);
        assert!(matches!(
            store.get_packages(&progress),
            Err(Error::Metadata(_))
        ));
    }

    #[test]
    fn test_needs_refresh_without_stamp() {
        let dir = TempDir::new().unwrap();
        write_metadata(&dir, "fedora", r#"{"name": "Fedora", "packages": []}"#);
        let store = test_store(&dir);
        // metadata exists but was never stamped as synced
        assert!(store.needs_refresh());

        fs::write(
            dir.path().join("fedora").join("last_sync"),
            Utc::now().to_rfc3339(),
        )
        .unwrap();
        assert!(!store.needs_refresh());
    }
}
