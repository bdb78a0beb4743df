use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context;
use clap::{self, Parser};
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection};
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod context;
mod error;
mod http;
mod media;

use context::BackendContext;
use media::store::LocalBlobStore;

#[derive(clap::Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Data directory path
    #[arg(short, long)]
    data: PathBuf,

    /// Port to listen on, auto if not set
    #[arg(short, long, env = "MLIB_PORT")]
    port: Option<u16>,

    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Emit logs as json lines
    #[arg(long)]
    log_json: bool,

    /// Overrides the sqlite file under the data directory
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,
}

fn init_tracing(level: Option<&str>, json: bool) {
    let filter = level
        .and_then(|l| EnvFilter::try_new(l).ok())
        .unwrap_or_else(|| EnvFilter::new("warn"));
    let registry = tracing_subscriber::registry().with(filter);
    let res = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer()).try_init()
    };
    if let Err(e) = res {
        eprintln!("tracing already initialized: {}", e);
    }
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let args = Args::parse();
    init_tracing(args.log_level.as_deref(), args.log_json);

    tokio::fs::create_dir_all(&args.data)
        .await
        .with_context(|| format!("create data dir {}", args.data.display()))?;
    let db = prepare_db(&args.data, args.database_url.as_deref()).await?;
    let blobs = LocalBlobStore::new(args.data.join("blobs"));
    tracing::info!("blobs stored under {}", blobs.root().display());
    let ctx = Arc::new(BackendContext::new(db, Arc::new(blobs)));

    // port 0 lets the system pick one
    let addr = format!("{}:{}", args.host, args.port.unwrap_or(0));
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("bind {}", addr))?;
    let local_addr = listener.local_addr()?;
    tracing::info!("Listening on: {}", local_addr);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(v) => v,
                    Err(e) => {
                        tracing::warn!("accept failed: {}", e);
                        continue;
                    }
                };
                let ctx = ctx.clone();
                tokio::spawn(async move {
                    let service = service_fn(move |req| {
                        let ctx = ctx.clone();
                        async move {
                            Ok::<_, std::convert::Infallible>(
                                http::router::process_http(&ctx, req).await,
                            )
                        }
                    });
                    if let Err(e) = auto::Builder::new(TokioExecutor::new())
                        .serve_connection(TokioIo::new(stream), service)
                        .await
                    {
                        tracing::debug!("connection {} closed: {}", peer, e);
                    }
                });
            }
            _ = &mut shutdown => {
                tracing::info!("shutting down");
                break;
            }
        }
    }

    Ok(())
}

async fn prepare_db(data: &Path, url: Option<&str>) -> Result<DatabaseConnection, anyhow::Error> {
    let db_url = match url {
        Some(url) => url.to_string(),
        None => format!(
            "sqlite://{}?mode=rwc",
            data.join("library.db").to_string_lossy()
        ),
    };
    let db = Database::connect(&db_url).await?;
    db.execute_unprepared("PRAGMA journal_mode=WAL;").await?;

    Migrator::up(&db, None).await?;
    tracing::info!("database ready at {}", db_url);

    Ok(db)
}
