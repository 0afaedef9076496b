//! Diagnostic entry point: builds a host, loads extensions, prints the
//! registry and tears down.

use clap::Parser;
use cuekit_core::{
    builtin, init_logging, ExtensionHost, ExtensionLocation, HostConfig, LocationKind,
    MemorySettingsStore, SettingsStore, SqliteSettingsStore,
};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "cuekit", version, about = "Inspect the cuekit extension host")]
struct Args {
    /// Host configuration file (JSON).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Extra extension directories, scanned after the configured ones.
    #[arg(short, long = "extensions", value_name = "DIR")]
    extensions: Vec<PathBuf>,

    /// Install the built-in extensions directly, enabled.
    #[arg(long)]
    builtins: bool,

    /// Directory for rotating log files (absolute).
    #[arg(long, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    /// Log level (trace|debug|info|warn|error).
    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let mut config = match args.config.as_deref() {
        Some(path) => match HostConfig::load(path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("cuekit: {err}");
                return ExitCode::FAILURE;
            }
        },
        None => HostConfig::default(),
    };
    config.locations.extend(
        args.extensions
            .iter()
            .map(|dir| ExtensionLocation::new(LocationKind::External, dir)),
    );
    if args.log_dir.is_some() {
        config.log_dir = args.log_dir.clone();
    }
    if args.log_level.is_some() {
        config.log_level = args.log_level.clone();
    }

    if let Some(log_dir) = config.log_dir.as_deref() {
        let level = config
            .log_level
            .clone()
            .unwrap_or_else(|| cuekit_core::default_log_level().to_string());
        if let Err(err) = init_logging(&level, log_dir) {
            eprintln!("cuekit: logging disabled: {err}");
        }
    }

    let store: Box<dyn SettingsStore> = match config.settings_db.as_deref() {
        Some(path) => match SqliteSettingsStore::open(path) {
            Ok(store) => Box::new(store),
            Err(err) => {
                eprintln!("cuekit: {err}");
                return ExitCode::FAILURE;
            }
        },
        None => Box::new(MemorySettingsStore::new()),
    };

    let mut host = ExtensionHost::new(config, builtin::catalog(), store);
    if args.builtins {
        for extension in builtin::extensions() {
            let id = extension.descriptor().id.clone();
            if let Err(err) = host.install(extension, true) {
                eprintln!("cuekit: {id}: {err}");
            }
        }
    }
    let loaded = host.load_all();

    println!("session {}", host.session_id());
    println!("discovered {loaded} extension(s)");
    let registry = host.registry();
    for id in registry.ids() {
        let Some(entry) = registry.get(id) else {
            continue;
        };
        let roles: Vec<&str> = entry.roles().iter().map(|role| role.as_str()).collect();
        println!(
            "{id}\t{}\t[{}]\t{}",
            entry.extension().descriptor().version,
            roles.join(","),
            if registry.is_enabled(id) { "enabled" } else { "disabled" }
        );
    }

    host.teardown();
    log::info!("event=cli_exit module=cli status=ok loaded={loaded}");
    ExitCode::SUCCESS
}
