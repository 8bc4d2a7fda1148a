// build.rs

use clap::{Arg, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn build_cli() -> Command {
    let config_arg = Arg::new("config")
        .short('c')
        .long("config")
        .value_name("PATH")
        .default_value("/etc/sift/sift.json")
        .help("Config file path");
    let db_arg = Arg::new("db_path")
        .short('d')
        .long("db-path")
        .value_name("PATH")
        .default_value("/var/lib/sift/sift.db")
        .help("Database path");

    Command::new("sift")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Sift Contributors")
        .about("Package dependency resolution and transaction engine")
        .arg(config_arg)
        .arg(db_arg)
        .subcommand(Command::new("init").about("Initialize the installed-package database"))
        .subcommand(
            Command::new("resolve")
                .about("Resolve a set of requests and print the plan without applying it")
                .arg(
                    Arg::new("install")
                        .long("install")
                        .value_name("NAMES")
                        .help("Package names to install"),
                )
                .arg(
                    Arg::new("update")
                        .long("update")
                        .value_name("NAMES")
                        .help("Package names to update"),
                )
                .arg(
                    Arg::new("remove")
                        .long("remove")
                        .value_name("NAMES")
                        .help("Package names to remove"),
                ),
        )
        .subcommand(
            Command::new("install")
                .about("Resolve, download and record an install")
                .arg(Arg::new("packages").required(true).num_args(1..)),
        )
        .subcommand(
            Command::new("remove")
                .about("Resolve and record a removal")
                .arg(Arg::new("packages").required(true).num_args(1..)),
        )
        .subcommand(
            Command::new("update")
                .about("Resolve, download and record updates")
                .arg(Arg::new("packages").required(true).num_args(1..)),
        )
        .subcommand(
            Command::new("query")
                .about("Query installed packages")
                .arg(Arg::new("pattern").help("Package name pattern (optional)")),
        )
        .subcommand(
            Command::new("search")
                .about("Search package names across all repositories")
                .arg(Arg::new("pattern").required(true)),
        )
        .subcommand(
            Command::new("info")
                .about("Show detailed metadata for a package")
                .arg(Arg::new("package_name").required(true)),
        )
        .subcommand(
            Command::new("depends")
                .about("Show dependencies of a package")
                .arg(Arg::new("package_name").required(true)),
        )
        .subcommand(
            Command::new("whatprovides")
                .about("Show packages providing a dependency")
                .arg(Arg::new("depend").required(true)),
        )
        .subcommand(
            Command::new("evr-compare")
                .about("Compare two [epoch:]version[-release] strings")
                .arg(Arg::new("version_a").required(true))
                .arg(Arg::new("version_b").required(true)),
        )
        .subcommand(Command::new("repo-list").about("List configured repositories"))
        .subcommand(
            Command::new("repo-sync")
                .about("Refresh repository metadata")
                .arg(Arg::new("name").help("Repository id (syncs all if omitted)"))
                .arg(
                    Arg::new("force")
                        .short('f')
                        .long("force")
                        .action(clap::ArgAction::SetTrue)
                        .help("Refresh even if the metadata has not expired"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory
    let out_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir).expect("Failed to create man directory");

    // Generate main man page
    let cmd = build_cli();
    let man = Man::new(cmd);
    let mut buffer = Vec::new();
    man.render(&mut buffer).expect("Failed to render man page");

    let man_path = man_dir.join("sift.1");
    fs::write(&man_path, buffer).expect("Failed to write man page");

    println!("cargo:warning=Man page generated at {}", man_path.display());
}
