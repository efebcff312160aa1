//! CLI smoke entry point.
//!
//! # Responsibility
//! - Open a store (file path argument, or in-memory), seed the ignore list
//!   and print it.
//! - Keep output deterministic for quick local sanity checks.
//!
//! Usage: `rowkeep_cli [DB_PATH] [LOG_DIR]`

use log::info;
use rowkeep_core::{
    builtin_registry, init_logging, IgnoreListService, LoggingConfig, RowEntity,
    SqliteRowRepository, Store, StoreConfig,
};
use std::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("rowkeep_cli error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => StoreConfig::file(path),
        None => StoreConfig::in_memory(),
    }
    .manual_flush();

    if let Some(log_dir) = args.next() {
        init_logging(&LoggingConfig::new(rowkeep_core::default_log_level(), log_dir))?;
    }

    let store = Store::open(config, builtin_registry()?)?;
    let service = IgnoreListService::new(SqliteRowRepository::new(&store));
    let items = service.ensure_default_items()?;

    println!("rowkeep_core version={}", rowkeep_core::core_version());
    for item in &items {
        println!(
            "{}\t{}\t{}\t{}",
            item.id(),
            item.package_name,
            item.app_name,
            item.description
        );
    }
    info!("event=cli_list module=cli status=ok items={}", items.len());

    drop(service);
    store.close();
    Ok(())
}
