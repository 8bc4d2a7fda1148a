// src/main.rs

use anyhow::Result;
use clap::{Parser, Subcommand};
use sift::config::Config;
use sift::download::DownloadClient;
use sift::progress::Progress;
use sift::store::{LocalStore, RemoteStore, Store, local};
use sift::transaction::Transaction;
use sift::{collection, version};
use std::cmp::Ordering;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;
use tracing::info;

const DEFAULT_DB_PATH: &str = "/var/lib/sift/sift.db";
const DEFAULT_CONFIG_PATH: &str = "/etc/sift/sift.json";

#[derive(Parser)]
#[command(name = "sift")]
#[command(author, version, about = "Package dependency resolution and transaction engine", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH, global = true)]
    config: String,

    /// Database path
    #[arg(short, long, default_value = DEFAULT_DB_PATH, global = true)]
    db_path: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the installed-package database
    Init,
    /// Resolve a set of requests and print the plan without applying it
    Resolve {
        /// Package names to install
        #[arg(long, value_delimiter = ',')]
        install: Vec<String>,
        /// Package names to update
        #[arg(long, value_delimiter = ',')]
        update: Vec<String>,
        /// Package names to remove
        #[arg(long, value_delimiter = ',')]
        remove: Vec<String>,
    },
    /// Resolve, download and record an install
    Install {
        /// Package names to install
        #[arg(required = true)]
        packages: Vec<String>,
    },
    /// Resolve and record a removal
    Remove {
        /// Package names to remove
        #[arg(required = true)]
        packages: Vec<String>,
    },
    /// Resolve, download and record updates
    Update {
        /// Package names to update
        #[arg(required = true)]
        packages: Vec<String>,
    },
    /// Query installed packages
    Query {
        /// Package name pattern (optional, shows all if omitted)
        pattern: Option<String>,
    },
    /// Search package names across all repositories
    Search {
        /// Search pattern
        pattern: String,
    },
    /// Show detailed metadata for a package
    Info {
        /// Package name
        package_name: String,
    },
    /// Show dependencies of a package
    Depends {
        /// Package name
        package_name: String,
    },
    /// Show packages providing a dependency
    Whatprovides {
        /// Dependency description, e.g. "hal >= 0.5"
        depend: String,
    },
    /// Compare two [epoch:]version[-release] strings
    EvrCompare {
        version_a: String,
        version_b: String,
    },
    /// List configured repositories
    RepoList,
    /// Refresh repository metadata
    RepoSync {
        /// Repository id (syncs all if omitted)
        name: Option<String>,
        /// Refresh even if the metadata has not expired
        #[arg(short, long)]
        force: bool,
    },
}

fn load_config(path: &str) -> Result<Config> {
    if Path::new(path).exists() {
        Ok(Config::load(Path::new(path))?)
    } else {
        Ok(Config::new())
    }
}

fn open_stores(config: &Config, db_path: &str) -> Result<(Rc<LocalStore>, Vec<Rc<RemoteStore>>)> {
    let local = Rc::new(LocalStore::open(db_path)?);
    let remotes = config
        .enabled_repos()
        .into_iter()
        .map(|repo| Rc::new(RemoteStore::new(repo.clone(), config)))
        .collect();
    Ok((local, remotes))
}

fn remote_trait_objects(remotes: &[Rc<RemoteStore>]) -> Vec<Rc<dyn Store>> {
    remotes
        .iter()
        .map(|store| Rc::clone(store) as Rc<dyn Store>)
        .collect()
}

/// Pick the best installable candidate for a package name
fn pick_candidate(
    name: &str,
    remotes: &[Rc<RemoteStore>],
    config: &Config,
    progress: &Progress,
) -> Result<Rc<sift::package::Package>> {
    let mut candidates = Vec::new();
    for store in remotes {
        candidates.extend(store.resolve(&[name], progress)?);
    }
    collection::filter_best_arch(&mut candidates, &config.basearch);
    collection::filter_newest(&mut candidates);
    Ok(collection::newest(&candidates)
        .map_err(|_| anyhow::anyhow!("no repository provides '{}'", name))?)
}

fn print_plan(transaction: &Transaction) -> Result<()> {
    let install = transaction.get_install()?;
    let update = transaction.get_update()?;
    let remove = transaction.get_remove()?;

    if !install.is_empty() {
        println!("Installing:");
        for package in &install {
            println!("  {}", package.printable());
        }
    }
    if !update.is_empty() {
        println!("Updating:");
        for package in &update {
            println!("  {}", package.printable());
        }
    }
    if !remove.is_empty() {
        println!("Removing:");
        for package in &remove {
            println!("  {}", package.printable());
        }
    }
    if install.is_empty() && update.is_empty() && remove.is_empty() {
        println!("Nothing to do");
    }
    Ok(())
}

/// Build and resolve a transaction from plain package names
fn resolve_requests(
    local: &Rc<LocalStore>,
    remotes: &[Rc<RemoteStore>],
    config: &Config,
    install: &[String],
    update: &[String],
    remove: &[String],
) -> Result<Transaction> {
    let progress = Progress::new();
    let transaction = Transaction::new(
        Rc::clone(local) as Rc<dyn Store>,
        remote_trait_objects(remotes),
        config,
    );

    for name in install {
        let candidate = pick_candidate(name, remotes, config, &progress)?;
        transaction.add_install(candidate)?;
    }
    for name in update {
        let candidate = pick_candidate(name, remotes, config, &progress)?;
        transaction.add_update(candidate)?;
    }
    for name in remove {
        let installed = local.resolve(&[name.as_str()], &progress)?;
        let package = collection::newest(&installed)
            .map_err(|_| anyhow::anyhow!("'{}' is not installed", name))?;
        transaction.add_remove(package)?;
    }

    transaction.resolve(&progress)?;
    Ok(transaction)
}

/// Download the install side of a resolved plan and record the result
fn apply_plan(
    transaction: &Transaction,
    local: &Rc<LocalStore>,
    config: &Config,
) -> Result<()> {
    let progress = Progress::new();
    let client = DownloadClient::with_options(
        Duration::from_secs(config.http_timeout),
        config.max_retries,
    )?;

    let install = transaction.get_install()?;
    let update = transaction.get_update()?;
    let remove = transaction.get_remove()?;

    let mut fetch: Vec<Rc<sift::package::Package>> = install.clone();
    fetch.extend(update.iter().cloned());
    if !fetch.is_empty() {
        let download_dir = config.cache_dir.join("packages");
        let download_progress = Progress::new();
        let paths = collection::download(&fetch, &download_dir, &client, &download_progress)?;
        for path in &paths {
            info!("fetched {}", path.display());
        }
    }

    for package in &remove {
        local.record_remove(package)?;
    }
    for package in install.iter().chain(update.iter()) {
        local.record_install(package, &progress)?;
    }
    Ok(())
}

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    let progress = Progress::new();

    match cli.command {
        Commands::Init => {
            info!("initializing database at: {}", cli.db_path);
            local::init(&cli.db_path)?;
            println!("Database initialized at: {}", cli.db_path);
            Ok(())
        }
        Commands::Resolve {
            install,
            update,
            remove,
        } => {
            let (local, remotes) = open_stores(&config, &cli.db_path)?;
            let transaction =
                resolve_requests(&local, &remotes, &config, &install, &update, &remove)?;
            print_plan(&transaction)
        }
        Commands::Install { packages } => {
            let (local, remotes) = open_stores(&config, &cli.db_path)?;
            let transaction = resolve_requests(&local, &remotes, &config, &packages, &[], &[])?;
            print_plan(&transaction)?;
            apply_plan(&transaction, &local, &config)
        }
        Commands::Remove { packages } => {
            let (local, remotes) = open_stores(&config, &cli.db_path)?;
            let transaction = resolve_requests(&local, &remotes, &config, &[], &[], &packages)?;
            print_plan(&transaction)?;
            for package in &transaction.get_remove()? {
                local.record_remove(package)?;
            }
            Ok(())
        }
        Commands::Update { packages } => {
            let (local, remotes) = open_stores(&config, &cli.db_path)?;
            let transaction = resolve_requests(&local, &remotes, &config, &[], &packages, &[])?;
            print_plan(&transaction)?;
            apply_plan(&transaction, &local, &config)
        }
        Commands::Query { pattern } => {
            let (local, _) = open_stores(&config, &cli.db_path)?;
            let packages = match &pattern {
                Some(pattern) => local.search_name(&[pattern.as_str()], &progress)?,
                None => local.get_packages(&progress)?,
            };
            for package in &packages {
                println!("{}", package.printable());
            }
            Ok(())
        }
        Commands::Search { pattern } => {
            let (local, remotes) = open_stores(&config, &cli.db_path)?;
            let mut packages = local.search_name(&[pattern.as_str()], &progress)?;
            for store in &remotes {
                packages.extend(store.search_name(&[pattern.as_str()], &progress)?);
            }
            collection::filter_duplicates(&mut packages);
            for package in &packages {
                println!("{}", package.printable());
            }
            Ok(())
        }
        Commands::Info { package_name } => {
            let (local, remotes) = open_stores(&config, &cli.db_path)?;
            let mut packages = local.resolve(&[package_name.as_str()], &progress)?;
            for store in &remotes {
                packages.extend(store.resolve(&[package_name.as_str()], &progress)?);
            }
            let package = collection::newest(&packages)
                .map_err(|_| anyhow::anyhow!("no package named '{}'", package_name))?;
            print!("{}", package.describe(&progress)?);
            Ok(())
        }
        Commands::Depends { package_name } => {
            let (local, remotes) = open_stores(&config, &cli.db_path)?;
            let mut packages = local.resolve(&[package_name.as_str()], &progress)?;
            for store in &remotes {
                packages.extend(store.resolve(&[package_name.as_str()], &progress)?);
            }
            let package = collection::newest(&packages)
                .map_err(|_| anyhow::anyhow!("no package named '{}'", package_name))?;
            for depend in package.requires(&progress)? {
                println!("{}", depend);
            }
            Ok(())
        }
        Commands::Whatprovides { depend } => {
            let depend = sift::depend::Depend::parse(&depend)?;
            let (local, remotes) = open_stores(&config, &cli.db_path)?;
            let mut packages = local.what_provides(std::slice::from_ref(&depend), &progress)?;
            for store in &remotes {
                packages.extend(store.what_provides(std::slice::from_ref(&depend), &progress)?);
            }
            for package in &packages {
                println!("{}", package.printable());
            }
            Ok(())
        }
        Commands::EvrCompare {
            version_a,
            version_b,
        } => {
            let relation = match version::compare_evr(&version_a, &version_b) {
                Ordering::Less => "<",
                Ordering::Equal => "==",
                Ordering::Greater => ">",
            };
            println!("{} {} {}", version_a, relation, version_b);
            Ok(())
        }
        Commands::RepoList => {
            for repo in &config.repos {
                println!(
                    "{}\t{}\tpriority={}\t{}",
                    repo.id,
                    if repo.enabled { "enabled" } else { "disabled" },
                    repo.priority,
                    repo.base_url
                );
            }
            Ok(())
        }
        Commands::RepoSync { name, force } => {
            let client = DownloadClient::with_options(
                Duration::from_secs(config.http_timeout),
                config.max_retries,
            )?;
            let repos = config.enabled_repos();
            let mut synced = 0;
            for repo in repos {
                if let Some(name) = &name
                    && &repo.id != name
                {
                    continue;
                }
                let store = RemoteStore::new(repo.clone(), &config);
                if !force && !store.needs_refresh() {
                    info!("repository {} is up to date", repo.id);
                    continue;
                }
                let sync_progress = Progress::new();
                store.refresh(&client, &sync_progress)?;
                println!(
                    "Synchronized {} ({} packages)",
                    repo.id,
                    store.get_packages(&Progress::new())?.len()
                );
                synced += 1;
            }
            if let Some(name) = name
                && synced == 0
            {
                anyhow::bail!("repository '{}' not found or up to date", name);
            }
            Ok(())
        }
    }
}
