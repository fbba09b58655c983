use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context;
use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use clap::Parser;
use rand_core::OsRng;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use weft_server::{AppState, ServerConfig, router, seed};
use weft_service::MatrixService;
use weft_store_sqlite::{SoulDocStore, SqliteMatrixStore};

#[derive(Parser)]
#[command(author, version, about = "Soul-channel matrix server")]
struct Cli {
  /// Path to config file
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Hash a key for use in a `[keys.<name>]` config block
  #[arg(long)]
  hash_key: bool,

  /// TOML fixture of souls and integrations to load before serving
  #[arg(long)]
  seed: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  if cli.hash_key {
    let key = read_key_from_stdin()?;
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(key.as_bytes(), &salt)
      .map_err(|e| anyhow::anyhow!("failed to hash key: {e}"))?;
    println!("{hash}");
    return Ok(());
  }

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("WEFT"))
    .build()
    .context("failed to read config")?;

  let config: ServerConfig = settings
    .try_deserialize()
    .context("failed to parse config")?;

  let matrix_path = expand_tilde(&config.matrix_store_path);
  let matrix = SqliteMatrixStore::open(&matrix_path)
    .await
    .with_context(|| format!("failed to open matrix store at {matrix_path:?}"))?;

  let soul_path = expand_tilde(&config.soul_store_path);
  let souls = SoulDocStore::open(&soul_path)
    .await
    .with_context(|| format!("failed to open soul store at {soul_path:?}"))?;

  if let Some(path) = &cli.seed {
    let (soul_count, integration_count) = seed::load(path, &souls, &matrix)
      .await
      .with_context(|| format!("failed to load seed fixture {path:?}"))?;
    tracing::info!(
      souls = soul_count,
      integrations = integration_count,
      "seed fixture loaded"
    );
  }

  let service = MatrixService::new(matrix.clone(), souls, matrix)
    .with_soul_limit(config.soul_limit);

  let state = AppState {
    service: Arc::new(service),
    auth:    Arc::new(config.auth_config()),
  };
  let app = router(state);

  let address = format!("{}:{}", config.host, config.port);
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  tracing::info!("Listening on http://{address}");
  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

fn read_key_from_stdin() -> anyhow::Result<String> {
  use std::io::{BufRead, Write};

  print!("Key: ");
  std::io::stdout().flush()?;

  let mut key = String::new();
  std::io::stdin().lock().read_line(&mut key)?;
  Ok(key.trim_end_matches(['\n', '\r']).to_string())
}

fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
