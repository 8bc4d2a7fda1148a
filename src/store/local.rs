// src/store/local.rs

//! Installed-package database
//!
//! SQLite-backed store of what is currently on the system. Package rows
//! hold the identity and the descriptive columns; dependency relations
//! and file lists live in side tables and are pulled lazily, per package
//! and per field, through the [`PackageLoader`] seam.

use crate::depend::{Depend, DependFlag};
use crate::error::{Error, Result};
use crate::package::{DATA_INSTALLED, FieldKind, Package, PackageId, PackageLoader};
use crate::progress::Progress;
use crate::store::{Store, StoreKind};
use rusqlite::{Connection, OptionalExtension, params};
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;
use tracing::{debug, info};

/// Current schema version
const SCHEMA_VERSION: i32 = 2;

/// Initialize a new installed-package database at the given path.
///
/// Creates the file, sets pragmas and applies all migrations. Idempotent.
pub fn init(db_path: &str) -> Result<()> {
    debug!("initializing database at: {}", db_path);

    if let Some(parent) = Path::new(db_path).parent() {
        std::fs::create_dir_all(parent)?;
    }

    let conn = Connection::open(db_path)?;
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA busy_timeout = 5000;
        ",
    )?;
    migrate(&conn)?;

    info!("database initialized successfully");
    Ok(())
}

fn init_schema_version(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;
    Ok(())
}

fn get_schema_version(conn: &Connection) -> Result<i32> {
    init_schema_version(conn)?;
    let version = conn
        .query_row(
            "SELECT version FROM schema_version ORDER BY version DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);
    Ok(version)
}

/// Apply all pending migrations to bring the database up to date
pub fn migrate(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;
    if current_version >= SCHEMA_VERSION {
        return Ok(());
    }

    for version in (current_version + 1)..=SCHEMA_VERSION {
        info!("applying migration to version {}", version);
        apply_migration(conn, version)?;
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [version],
        )?;
    }
    Ok(())
}

fn apply_migration(conn: &Connection, version: i32) -> Result<()> {
    match version {
        1 => migrate_v1(conn),
        2 => migrate_v2(conn),
        _ => Err(Error::Database(rusqlite::Error::InvalidQuery)),
    }
}

/// v1: core tables
fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE packages (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            version TEXT NOT NULL,
            arch TEXT NOT NULL,
            summary TEXT,
            description TEXT,
            license TEXT,
            url TEXT,
            group_name TEXT,
            category TEXT,
            size INTEGER NOT NULL DEFAULT 0,
            installed_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (name, version, arch)
        );

        CREATE TABLE depends (
            id INTEGER PRIMARY KEY,
            package_id INTEGER NOT NULL REFERENCES packages(id) ON DELETE CASCADE,
            kind TEXT NOT NULL,
            name TEXT NOT NULL,
            flag TEXT NOT NULL,
            version TEXT
        );

        CREATE TABLE files (
            id INTEGER PRIMARY KEY,
            package_id INTEGER NOT NULL REFERENCES packages(id) ON DELETE CASCADE,
            path TEXT NOT NULL
        );
        ",
    )?;
    Ok(())
}

/// v2: lookup indices for relation and file queries
fn migrate_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE INDEX idx_depends_package ON depends(package_id, kind);
        CREATE INDEX idx_depends_name ON depends(name);
        CREATE INDEX idx_files_path ON files(path);
        ",
    )?;
    Ok(())
}

fn flag_to_db(flag: DependFlag) -> &'static str {
    match flag {
        DependFlag::Any => "any",
        other => other.as_str(),
    }
}

fn flag_from_db(text: &str) -> Result<DependFlag> {
    match text {
        "any" => Ok(DependFlag::Any),
        other => DependFlag::parse(other),
    }
}

fn relation_to_db(kind: FieldKind) -> Result<&'static str> {
    match kind {
        FieldKind::Requires => Ok("requires"),
        FieldKind::Provides => Ok("provides"),
        FieldKind::Conflicts => Ok("conflicts"),
        FieldKind::Obsoletes => Ok("obsoletes"),
        _ => Err(Error::Metadata(format!(
            "{} is not a relation kind",
            kind.as_str()
        ))),
    }
}

/// Lazy-field loader shared by every package of one [`LocalStore`]
struct LocalLoader {
    conn: Rc<Connection>,
}

impl LocalLoader {
    fn row_id(&self, package: &Package) -> Result<i64> {
        self.conn
            .query_row(
                "SELECT id FROM packages WHERE name = ?1 AND version = ?2 AND arch = ?3",
                params![package.name(), package.version(), package.arch()],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("no database row for {}", package.id())))
    }

    fn text_column(&self, package: &Package, column: &str) -> Result<String> {
        let value: Option<String> = self.conn.query_row(
            &format!(
                "SELECT {} FROM packages WHERE name = ?1 AND version = ?2 AND arch = ?3",
                column
            ),
            params![package.name(), package.version(), package.arch()],
            |row| row.get(0),
        )?;
        Ok(value.unwrap_or_default())
    }

    fn load_depends(&self, package: &Package, kind: FieldKind) -> Result<Vec<Depend>> {
        let package_id = self.row_id(package)?;
        let mut stmt = self.conn.prepare(
            "SELECT name, flag, version FROM depends WHERE package_id = ?1 AND kind = ?2",
        )?;
        let rows = stmt.query_map(params![package_id, relation_to_db(kind)?], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
            ))
        })?;

        let mut depends = Vec::new();
        for row in rows {
            let (name, flag, version) = row?;
            let flag = flag_from_db(&flag)?;
            depends.push(match version {
                Some(version) if flag != DependFlag::Any => Depend::new(&name, flag, &version),
                _ => Depend::new_any(&name),
            });
        }
        Ok(depends)
    }

    fn load_files(&self, package: &Package) -> Result<Vec<String>> {
        let package_id = self.row_id(package)?;
        let mut stmt = self
            .conn
            .prepare("SELECT path FROM files WHERE package_id = ?1")?;
        let rows = stmt.query_map([package_id], |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

impl PackageLoader for LocalLoader {
    fn ensure_data(&self, package: &Package, kind: FieldKind, progress: &Progress) -> Result<()> {
        progress.check_cancelled()?;
        debug!("loading {} for {}", kind.as_str(), package.id());
        match kind {
            FieldKind::Summary => package.set_summary(&self.text_column(package, "summary")?),
            FieldKind::Description => {
                package.set_description(&self.text_column(package, "description")?)
            }
            FieldKind::License => package.set_license(&self.text_column(package, "license")?),
            FieldKind::Url => package.set_url(&self.text_column(package, "url")?),
            FieldKind::Group => package.set_group(&self.text_column(package, "group_name")?),
            FieldKind::Category => package.set_category(&self.text_column(package, "category")?),
            FieldKind::Size => {
                let size: i64 = self.conn.query_row(
                    "SELECT size FROM packages WHERE name = ?1 AND version = ?2 AND arch = ?3",
                    params![package.name(), package.version(), package.arch()],
                    |row| row.get(0),
                )?;
                package.set_size(size as u64)
            }
            FieldKind::Files => package.set_files(self.load_files(package)?),
            FieldKind::Requires => package.set_requires(self.load_depends(package, kind)?),
            FieldKind::Provides => package.set_provides(self.load_depends(package, kind)?),
            FieldKind::Conflicts => package.set_conflicts(self.load_depends(package, kind)?),
            FieldKind::Obsoletes => package.set_obsoletes(self.load_depends(package, kind)?),
        }
    }
}

/// The installed-package store
pub struct LocalStore {
    conn: Rc<Connection>,
    packages: RefCell<Option<Vec<Rc<Package>>>>,
}

impl LocalStore {
    /// Open an existing database
    pub fn open(db_path: &str) -> Result<Self> {
        if !Path::new(db_path).exists() {
            return Err(Error::NotFound(format!("database not found at {}", db_path)));
        }
        let conn = Connection::open(db_path)?;
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
            ",
        )?;
        migrate(&conn)?;
        Ok(Self {
            conn: Rc::new(conn),
            packages: RefCell::new(None),
        })
    }

    /// Open a private in-memory database, mostly useful for tests
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        migrate(&conn)?;
        Ok(Self {
            conn: Rc::new(conn),
            packages: RefCell::new(None),
        })
    }

    fn ensure_loaded(&self, progress: &Progress) -> Result<()> {
        if self.packages.borrow().is_some() {
            return Ok(());
        }
        progress.check_cancelled()?;

        let loader: Rc<dyn PackageLoader> = Rc::new(LocalLoader {
            conn: Rc::clone(&self.conn),
        });

        let mut stmt = self
            .conn
            .prepare("SELECT name, version, arch FROM packages ORDER BY name, version")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut packages = Vec::new();
        for row in rows {
            let (name, version, arch) = row?;
            let package = Package::new(PackageId::new(&name, &version, &arch, DATA_INSTALLED));
            package.set_installed(true);
            package.set_loader(Rc::clone(&loader));
            packages.push(Rc::new(package));
        }
        debug!("loaded {} installed packages", packages.len());
        *self.packages.borrow_mut() = Some(packages);
        Ok(())
    }

    /// Record a resolved install into the database.
    ///
    /// Called by the host after it has actually put the package on disk;
    /// the resolver itself never writes here.
    pub fn record_install(&self, package: &Package, progress: &Progress) -> Result<()> {
        let summary = package.summary(progress).unwrap_or_default().to_string();
        let description = package.description(progress).unwrap_or_default().to_string();
        let license = package.license(progress).unwrap_or_default().to_string();
        let size = package.size(progress).unwrap_or(0);

        self.conn.execute(
            "INSERT INTO packages (name, version, arch, summary, description, license, size)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                package.name(),
                package.version(),
                package.arch(),
                summary,
                description,
                license,
                size as i64,
            ],
        )?;
        let row_id = self.conn.last_insert_rowid();

        for (kind, depends) in [
            ("requires", package.requires(progress)?),
            ("provides", package.provides(progress)?),
            ("conflicts", package.conflicts(progress)?),
            ("obsoletes", package.obsoletes(progress)?),
        ] {
            for depend in depends {
                // implicit file provides are reconstructed from the file
                // table on load, not duplicated here
                if kind == "provides" && depend.is_file() {
                    continue;
                }
                self.conn.execute(
                    "INSERT INTO depends (package_id, kind, name, flag, version)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        row_id,
                        kind,
                        depend.name(),
                        flag_to_db(depend.flag()),
                        depend.version(),
                    ],
                )?;
            }
        }

        for path in package.files(progress)? {
            self.conn.execute(
                "INSERT INTO files (package_id, path) VALUES (?1, ?2)",
                params![row_id, path],
            )?;
        }

        info!("recorded install of {}", package.printable());
        *self.packages.borrow_mut() = None;
        Ok(())
    }

    /// Record a package removal; depends and files cascade away
    pub fn record_remove(&self, package: &Package) -> Result<()> {
        let changed = self.conn.execute(
            "DELETE FROM packages WHERE name = ?1 AND version = ?2 AND arch = ?3",
            params![package.name(), package.version(), package.arch()],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!(
                "{} is not installed",
                package.printable()
            )));
        }
        info!("recorded removal of {}", package.printable());
        *self.packages.borrow_mut() = None;
        Ok(())
    }
}

impl Store for LocalStore {
    fn id(&self) -> &str {
        DATA_INSTALLED
    }

    fn kind(&self) -> StoreKind {
        StoreKind::Local
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

    fn seed_package(store: &LocalStore) {
        let progress = Progress::new();
        let package = Package::new(PackageId::new("hal", "0.5.2-1", "i386", "fedora"));
        package.set_summary("Hardware abstraction layer").unwrap();
        package.set_description("Listens to hardware events").unwrap();
        package.set_license("GPLv2").unwrap();
        package.set_size(1024).unwrap();
        package
            .set_requires(vec![Depend::new("dbus", DependFlag::GreaterEqual, "0.5")])
            .unwrap();
        package
            .set_provides(vec![Depend::new("hal", DependFlag::Equal, "0.5.2-1")])
            .unwrap();
        package.set_conflicts(vec![]).unwrap();
        package.set_obsoletes(vec![]).unwrap();
        package.set_files(vec!["/usr/bin/hald".to_string()]).unwrap();
        store.record_install(&package, &progress).unwrap();
    }

    #[test]
    fn test_record_and_load() {
        let progress = Progress::new();
        let store = LocalStore::open_in_memory().unwrap();
        seed_package(&store);

        let packages = store.get_packages(&progress).unwrap();
        assert_eq!(packages.len(), 1);
        let package = &packages[0];
        assert!(package.is_installed());
        assert_eq!(package.data(), DATA_INSTALLED);

        // descriptive fields arrive lazily from the database
        assert_eq!(package.summary(&progress).unwrap(), "Hardware abstraction layer");
        assert_eq!(package.size(&progress).unwrap(), 1024);
    }

    #[test]
    fn test_lazy_relations_and_files() {
        let progress = Progress::new();
        let store = LocalStore::open_in_memory().unwrap();
        seed_package(&store);

        let packages = store.get_packages(&progress).unwrap();
        let package = &packages[0];

        let hit = package
            .require(&Depend::new_any("dbus"), &progress)
            .unwrap();
        assert_eq!(hit.unwrap().version(), Some("0.5"));

        // the file list doubles as an implicit provide
        let hit = package
            .provide(&Depend::new_any("/usr/bin/hald"), &progress)
            .unwrap();
        assert!(hit.is_some());
    }

    #[test]
    fn test_record_remove() {
        let progress = Progress::new();
        let store = LocalStore::open_in_memory().unwrap();
        seed_package(&store);

        let packages = store.get_packages(&progress).unwrap();
        store.record_remove(&packages[0]).unwrap();
        assert!(store.get_packages(&progress).unwrap().is_empty());

        // removing again is a lookup miss
        assert!(matches!(
            store.record_remove(&packages[0]),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_find_package_missing() {
        let progress = Progress::new();
        let store = LocalStore::open_in_memory().unwrap();
        let id = PackageId::new("ghost", "1.0-1", "i386", DATA_INSTALLED);
        assert!(matches!(
            store.find_package(&id, &progress),
            Err(Error::NotFound(_))
        ));
    }
}
