//! vellum-dbutil: operator commands against a configured store.
//!
//! Usage:
//!   vellum-dbutil [--datadir DIR] [--backend sled|sqlite] <command> [args]
//!
//! Configuration comes from `VELLUM_CONFIG` (default `config/vellum`) and
//! `VELLUM__*` environment variables; the flags above override both.

use std::path::PathBuf;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vellum_cache::{Cache, RecordReader, SqliteCache};
use vellum_core::backup::write_backup;
use vellum_core::{create_store, open_store, Accounts, BackendKind, KeyValueStore, StoreConfig};

type CliResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

fn usage() {
    eprintln!("vellum-dbutil: store maintenance");
    eprintln!("  [--datadir DIR] [--backend sled|sqlite] <command>");
    eprintln!();
    eprintln!("  create                       Create the database and key file (first run only)");
    eprintln!("  version                      Print the store's version marker");
    eprintln!("  dump                         List every stored user");
    eprintln!("  backup [DIR]                 Write a snapshot (default: configured backup_dir)");
    eprintln!("  setadmin EMAIL true|false    Grant or revoke admin");
    eprintln!("  stats                        Print record cache inventory stats");
}

fn main() -> CliResult<()> {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[vellum-dbutil] .env not loaded: {} (using system environment)", e);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut cfg = StoreConfig::load()?;
    let mut args = std::env::args().skip(1);
    let mut rest: Vec<String> = Vec::new();

    while let Some(a) = args.next() {
        match a.as_str() {
            "--datadir" => {
                cfg.data_dir = args.next().ok_or("--datadir needs a value")?;
            }
            "--backend" => {
                let value = args.next().ok_or("--backend needs a value")?;
                cfg.backend = value.parse::<BackendKind>()?;
            }
            "-h" | "--help" => {
                usage();
                return Ok(());
            }
            _ => rest.push(a),
        }
    }

    let Some((command, params)) = rest.split_first() else {
        usage();
        return Ok(());
    };

    match command.as_str() {
        "create" => cmd_create(&cfg),
        "version" => with_store(&cfg, |store| {
            let marker = store.version();
            println!("version {} (written {})", marker.version, marker.time);
            Ok(())
        }),
        "dump" => with_store(&cfg, cmd_dump),
        "backup" => {
            let dir = params
                .first()
                .map(PathBuf::from)
                .unwrap_or_else(|| cfg.backup_dir());
            with_store(&cfg, |store| cmd_backup(store, dir))
        }
        "setadmin" => {
            let (email, flag) = match params {
                [email, flag] => (email.as_str(), flag.parse::<bool>()?),
                _ => return Err("usage: setadmin EMAIL true|false".into()),
            };
            with_store(&cfg, |store| cmd_set_admin(store, email, flag))
        }
        "stats" => cmd_stats(&cfg),
        other => {
            usage();
            Err(format!("unknown command: {other}").into())
        }
    }
}

/// Opens the store, runs `f`, and closes the store whatever `f` returned.
fn with_store<F>(cfg: &StoreConfig, f: F) -> CliResult<()>
where
    F: FnOnce(&dyn KeyValueStore) -> CliResult<()>,
{
    let store = open_store(cfg)?;
    let result = f(store.as_ref());
    store.close()?;
    result
}

fn cmd_create(cfg: &StoreConfig) -> CliResult<()> {
    let store = create_store(cfg)?;
    info!(
        backend = %cfg.backend,
        key = %cfg.encryption_key_path().display(),
        "store ready"
    );
    println!(
        "created {} store in {} (key file {})",
        cfg.backend,
        cfg.data_dir,
        cfg.encryption_key_path().display()
    );
    store.close()?;
    Ok(())
}

fn cmd_dump(store: &dyn KeyValueStore) -> CliResult<()> {
    let accounts = Accounts::new(store);
    for user in accounts.all_users()? {
        let line = serde_json::json!({
            "id": user.id,
            "email": user.email,
            "username": user.username,
            "admin": user.admin,
            "deactivated": user.deactivated,
            "identities": user.identities.len(),
        });
        println!("{line}");
    }
    Ok(())
}

fn cmd_backup(store: &dyn KeyValueStore, dir: PathBuf) -> CliResult<()> {
    let snapshot = store.snapshot()?;
    if !snapshot.point_in_time {
        eprintln!("note: {} backend has no point-in-time reads; snapshot built by iteration", snapshot.backend);
    }
    for path in write_backup(&dir, &snapshot)? {
        println!("{}", path.display());
    }
    Ok(())
}

fn cmd_set_admin(store: &dyn KeyValueStore, email: &str, admin: bool) -> CliResult<()> {
    let accounts = Accounts::new(store);
    let mut user = accounts.user_get(email)?;
    user.admin = admin;
    accounts.user_update(&user)?;
    info!(user_id = %user.id, admin = admin, "admin flag updated");
    println!("{} admin={}", user.email, admin);
    Ok(())
}

fn cmd_stats(cfg: &StoreConfig) -> CliResult<()> {
    let cache = SqliteCache::open(cfg.cache_path())?;
    let stats = cache.inventory_stats();
    cache.close();
    println!("{}", serde_json::to_string_pretty(&stats?)?);
    Ok(())
}
