// tests/integration_test.rs

//! Integration tests for Sift
//!
//! These tests drive the resolver end-to-end over synthetic stores and
//! verify the local database round trip.

use sift::Error;
use sift::config::Config;
use sift::depend::Depend;
use sift::package::{Package, PackageId};
use sift::progress::Progress;
use sift::store::{LocalStore, MemoryStore, Store};
use sift::transaction::{Transaction, TransactionState};
use std::rc::Rc;

/// Assemble a package from textual depend descriptions
fn build_package(
    id: &str,
    requires: &[&str],
    provides: &[&str],
    conflicts: &[&str],
    obsoletes: &[&str],
) -> Rc<Package> {
    let package = Package::new(PackageId::parse(id).unwrap());
    package
        .set_requires(requires.iter().map(|d| Depend::parse(d).unwrap()).collect())
        .unwrap();
    package
        .set_provides(provides.iter().map(|d| Depend::parse(d).unwrap()).collect())
        .unwrap();
    package
        .set_conflicts(conflicts.iter().map(|d| Depend::parse(d).unwrap()).collect())
        .unwrap();
    package
        .set_obsoletes(obsoletes.iter().map(|d| Depend::parse(d).unwrap()).collect())
        .unwrap();
    Rc::new(package)
}

fn test_config() -> Config {
    let mut config = Config::new();
    config.basearch = "i686".to_string();
    config
}

fn transaction_over(
    installed: Vec<Rc<Package>>,
    available: Vec<Rc<Package>>,
) -> Transaction {
    let local = Rc::new(MemoryStore::new("installed"));
    for package in installed {
        package.set_installed(true);
        local.add_package(package);
    }
    let remote = Rc::new(MemoryStore::new("fedora"));
    for package in available {
        remote.add_package(package);
    }
    Transaction::new(
        local as Rc<dyn Store>,
        vec![remote as Rc<dyn Store>],
        &test_config(),
    )
}

fn ids(packages: &[Rc<Package>]) -> Vec<&str> {
    packages.iter().map(|p| p.id()).collect()
}

#[test]
fn test_install_pulls_in_requirement() {
    let a = build_package("A;1.0-1;i386;fedora", &["B"], &[], &[], &[]);
    let b = build_package("B;1.0-1;i386;fedora", &[], &[], &[], &[]);
    let transaction = transaction_over(vec![], vec![Rc::clone(&a), b]);

    transaction.add_install(a).unwrap();
    transaction.resolve(&Progress::new()).unwrap();

    assert_eq!(transaction.state(), TransactionState::Resolved);
    let install = transaction.get_install().unwrap();
    assert_eq!(
        ids(&install),
        vec!["A;1.0-1;i386;fedora", "B;1.0-1;i386;fedora"]
    );
    assert!(transaction.get_remove().unwrap().is_empty());
}

#[test]
fn test_transitive_requirements() {
    let a = build_package("A;1.0-1;i386;fedora", &["B"], &[], &[], &[]);
    let b = build_package("B;1.0-1;i386;fedora", &["C"], &[], &[], &[]);
    let c = build_package("C;1.0-1;i386;fedora", &[], &[], &[], &[]);
    let transaction = transaction_over(vec![], vec![Rc::clone(&a), b, c]);

    transaction.add_install(a).unwrap();
    transaction.resolve(&Progress::new()).unwrap();

    let install = transaction.get_install().unwrap();
    assert_eq!(install.len(), 3);
}

#[test]
fn test_dependency_cycle_converges() {
    let a = build_package("A;1.0-1;i386;fedora", &["B"], &[], &[], &[]);
    let b = build_package("B;1.0-1;i386;fedora", &["A"], &[], &[], &[]);
    let transaction = transaction_over(vec![], vec![Rc::clone(&a), b]);

    transaction.add_install(a).unwrap();
    transaction.resolve(&Progress::new()).unwrap();

    // both scheduled exactly once, not infinitely re-expanded
    let install = transaction.get_install().unwrap();
    assert_eq!(
        ids(&install),
        vec!["A;1.0-1;i386;fedora", "B;1.0-1;i386;fedora"]
    );
}

#[test]
fn test_requirement_satisfied_by_installed() {
    let a = build_package("A;1.0-1;i386;fedora", &["B"], &[], &[], &[]);
    let b_installed = build_package("B;1.0-1;i386;installed", &[], &[], &[], &[]);
    let transaction = transaction_over(vec![b_installed], vec![Rc::clone(&a)]);

    transaction.add_install(a).unwrap();
    transaction.resolve(&Progress::new()).unwrap();

    let install = transaction.get_install().unwrap();
    assert_eq!(ids(&install), vec!["A;1.0-1;i386;fedora"]);
}

#[test]
fn test_unresolved_requirement_reports_context() {
    let a = build_package("A;1.0-1;i386;fedora", &["missing >= 2.0"], &[], &[], &[]);
    let transaction = transaction_over(vec![], vec![Rc::clone(&a)]);

    transaction.add_install(a).unwrap();
    let err = transaction.resolve(&Progress::new()).unwrap_err();
    match err {
        Error::UnresolvedDepend { requirer, depend } => {
            assert_eq!(requirer, "A;1.0-1;i386;fedora");
            assert_eq!(depend, "missing >= 2.0");
        }
        other => panic!("expected UnresolvedDepend, got {:?}", other),
    }
    assert_eq!(transaction.state(), TransactionState::Failed);
}

#[test]
fn test_conflicting_installs_fail() {
    let a = build_package("A;1.0-1;i386;fedora", &[], &[], &["B"], &[]);
    let b = build_package("B;1.0-1;i386;fedora", &[], &[], &[], &[]);
    let transaction = transaction_over(vec![], vec![Rc::clone(&a), Rc::clone(&b)]);

    transaction.add_install(a).unwrap();
    transaction.add_install(b).unwrap();
    let err = transaction.resolve(&Progress::new()).unwrap_err();
    match err {
        Error::Conflict {
            package,
            conflicts_with,
        } => {
            assert_eq!(package, "A;1.0-1;i386;fedora");
            assert_eq!(conflicts_with, "B;1.0-1;i386;fedora");
        }
        other => panic!("expected Conflict, got {:?}", other),
    }
}

#[test]
fn test_conflict_with_installed_package_fails() {
    let a = build_package("A;1.0-1;i386;fedora", &[], &[], &["B < 2.0"], &[]);
    let b_installed = build_package("B;1.0-1;i386;installed", &[], &[], &[], &[]);
    let transaction = transaction_over(vec![b_installed], vec![Rc::clone(&a)]);

    transaction.add_install(a).unwrap();
    assert!(matches!(
        transaction.resolve(&Progress::new()),
        Err(Error::Conflict { .. })
    ));
}

#[test]
fn test_conflict_resolved_by_requested_removal() {
    let a = build_package("A;1.0-1;i386;fedora", &[], &[], &["B"], &[]);
    let b_installed = build_package("B;1.0-1;i386;installed", &[], &[], &[], &[]);
    let transaction = transaction_over(vec![Rc::clone(&b_installed)], vec![Rc::clone(&a)]);

    transaction.add_install(a).unwrap();
    transaction.add_remove(b_installed).unwrap();
    transaction.resolve(&Progress::new()).unwrap();

    assert_eq!(
        ids(&transaction.get_remove().unwrap()),
        vec!["B;1.0-1;i386;installed"]
    );
}

#[test]
fn test_obsoleted_package_scheduled_for_removal() {
    let new = build_package(
        "NetworkManager;1.0-1;i386;fedora",
        &[],
        &[],
        &[],
        &["wireless-tools < 1.0"],
    );
    let old = build_package("wireless-tools;0.9-1;i386;installed", &[], &[], &[], &[]);
    let transaction = transaction_over(vec![old], vec![Rc::clone(&new)]);

    transaction.add_install(new).unwrap();
    transaction.resolve(&Progress::new()).unwrap();

    assert_eq!(
        ids(&transaction.get_install().unwrap()),
        vec!["NetworkManager;1.0-1;i386;fedora"]
    );
    assert_eq!(
        ids(&transaction.get_remove().unwrap()),
        vec!["wireless-tools;0.9-1;i386;installed"]
    );
}

#[test]
fn test_update_replaces_installed_version() {
    let old = build_package("foo;1.0-1;i386;installed", &[], &[], &[], &[]);
    let new = build_package("foo;2.0-1;i386;fedora", &[], &[], &[], &[]);
    let transaction = transaction_over(vec![old], vec![Rc::clone(&new)]);

    transaction.add_update(new).unwrap();
    transaction.resolve(&Progress::new()).unwrap();

    assert_eq!(ids(&transaction.get_update().unwrap()), vec!["foo;2.0-1;i386;fedora"]);
    assert_eq!(
        ids(&transaction.get_remove().unwrap()),
        vec!["foo;1.0-1;i386;installed"]
    );
}

#[test]
fn test_best_provider_wins() {
    let a = build_package("A;1.0-1;i386;fedora", &["lib"], &[], &[], &[]);
    let older = build_package("liba;1.0-1;i386;fedora", &[], &["lib = 1.0"], &[], &[]);
    let newer = build_package("libb;2.0-1;i386;fedora", &[], &["lib = 2.0"], &[], &[]);
    let transaction = transaction_over(vec![], vec![Rc::clone(&a), older, newer]);

    transaction.add_install(a).unwrap();
    transaction.resolve(&Progress::new()).unwrap();

    let install = transaction.get_install().unwrap();
    assert_eq!(
        ids(&install),
        vec!["A;1.0-1;i386;fedora", "libb;2.0-1;i386;fedora"]
    );
}

#[test]
fn test_file_requirement_resolved_by_owner() {
    let a = build_package("A;1.0-1;i386;fedora", &["/usr/bin/tool"], &[], &[], &[]);
    let b = build_package("B;1.0-1;i386;fedora", &[], &[], &[], &[]);
    b.set_files(vec!["/usr/bin/tool".to_string()]).unwrap();
    let transaction = transaction_over(vec![], vec![Rc::clone(&a), b]);

    transaction.add_install(a).unwrap();
    transaction.resolve(&Progress::new()).unwrap();

    let install = transaction.get_install().unwrap();
    assert_eq!(
        ids(&install),
        vec!["A;1.0-1;i386;fedora", "B;1.0-1;i386;fedora"]
    );
}

#[test]
fn test_duplicate_versions_deduplicated() {
    let old = build_package("foo;1.0-1;i386;fedora", &[], &[], &[], &[]);
    let new = build_package("foo;2.0-1;i386;fedora", &[], &[], &[], &[]);
    let transaction = transaction_over(vec![], vec![Rc::clone(&old), Rc::clone(&new)]);

    transaction.add_install(old).unwrap();
    transaction.add_install(new).unwrap();
    transaction.resolve(&Progress::new()).unwrap();

    // only the newest version of one name survives
    assert_eq!(
        ids(&transaction.get_install().unwrap()),
        vec!["foo;2.0-1;i386;fedora"]
    );
}

#[test]
fn test_resolution_reports_progress() {
    let a = build_package("A;1.0-1;i386;fedora", &[], &[], &[], &[]);
    let transaction = transaction_over(vec![], vec![Rc::clone(&a)]);
    transaction.add_install(a).unwrap();

    let progress = Progress::new();
    transaction.resolve(&progress).unwrap();
    assert_eq!(progress.percentage(), 100);
}

#[test]
fn test_resolver_against_local_database() {
    // the installed side comes from a real (in-memory) database with
    // lazily-loaded relations
    let progress = Progress::new();
    let local = Rc::new(LocalStore::open_in_memory().unwrap());

    let b = Package::new(PackageId::new("B", "1.0-1", "i386", "fedora"));
    b.set_summary("A library").unwrap();
    b.set_description("").unwrap();
    b.set_license("MIT").unwrap();
    b.set_size(512).unwrap();
    b.set_requires(vec![]).unwrap();
    b.set_provides(vec![Depend::parse("B = 1.0-1").unwrap()])
        .unwrap();
    b.set_conflicts(vec![]).unwrap();
    b.set_obsoletes(vec![]).unwrap();
    b.set_files(vec![]).unwrap();
    local.record_install(&b, &progress).unwrap();

    let a = build_package("A;1.0-1;i386;fedora", &["B"], &[], &[], &[]);
    let remote = Rc::new(MemoryStore::new("fedora"));
    remote.add_package(Rc::clone(&a));

    let transaction = Transaction::new(
        Rc::clone(&local) as Rc<dyn Store>,
        vec![remote as Rc<dyn Store>],
        &test_config(),
    );
    transaction.add_install(a).unwrap();
    transaction.resolve(&Progress::new()).unwrap();

    // B is already installed, so only A is scheduled
    assert_eq!(
        ids(&transaction.get_install().unwrap()),
        vec!["A;1.0-1;i386;fedora"]
    );
}
