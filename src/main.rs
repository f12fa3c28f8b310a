use anyhow::Result;
use relreg::db::{migrate, Db};
use relreg::server::HttpServer;
use relreg::{Config, RelregError};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;

    env_logger::Builder::from_env(
        env_logger::Env::default()
            .filter_or("RUST_LOG", &config.registry.log_level)
    ).init();

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("verify");

    match command {
        "serve" => run_http_server(config).await?,
        "verify" => run_schema_verification(config).await?,
        other => anyhow::bail!("Unknown command '{}'. Usage: relreg [serve|verify]", other),
    }

    Ok(())
}

/// Apply pending migrations to the configured database
async fn prepare_db(config: &Config) -> Result<Db> {
    let db = Db::new(config.db_path());
    let version = db.with_connection(|conn| migrate::run_migrations(conn)).await?;
    log::info!(
        "Database initialized: {} (schema v{})",
        config.db_path().display(),
        version
    );
    Ok(db)
}

async fn run_http_server(config: Config) -> Result<()> {
    log::info!("Starting Relreg HTTP server v{}", env!("CARGO_PKG_VERSION"));

    let db = prepare_db(&config).await?;
    let server = HttpServer::new(db, &config);
    server.run(&config.bind_addr()).await?;

    Ok(())
}

/// Check tables and pragmas of the registry database
async fn run_schema_verification(config: Config) -> Result<()> {
    log::info!("Starting Relreg v{}", env!("CARGO_PKG_VERSION"));

    let db = prepare_db(&config).await?;

    db.with_connection(|conn| {
        let problems = migrate::schema_problems(conn)?;
        if !problems.is_empty() {
            for problem in &problems {
                log::error!("Schema problem: {}", problem);
            }
            return Err(RelregError::Config("Registry schema is incomplete".to_string()));
        }
        log::debug!("✓ Registry tables and columns present");

        let journal_mode: String = conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))?;
        if journal_mode.to_uppercase() != "WAL" {
            return Err(RelregError::Config(format!("Journal mode is not WAL: {}", journal_mode)));
        }

        let foreign_keys: i32 = conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0))?;
        if foreign_keys != 1 {
            return Err(RelregError::Config("Foreign keys not enabled".to_string()));
        }

        let integrity: String = conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        if integrity != "ok" {
            return Err(RelregError::Config(format!("Database integrity check failed: {}", integrity)));
        }
        log::info!("✓ Database integrity: OK");

        // Surface bad entity tags now rather than on the first lookup
        let directory = relreg::registry::list_entities(conn)?;
        log::info!(
            "✓ {} hospitals, {} EMS units registered",
            directory.hospital_list.len(),
            directory.ems_list.len()
        );

        Ok(())
    }).await?;

    log::info!("✓ Database schema verification complete");
    Ok(())
}
