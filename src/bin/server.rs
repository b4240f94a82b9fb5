use clap::Parser;
use livetail::{cli::Args, create_router, file::WatchedFile, RouterConfig, StartupError};
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Parse CLI arguments; a missing FILE exits here
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "livetail=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run(args).await {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), StartupError> {
    let file = WatchedFile::open_or_create(&args.file)?;
    tracing::info!("Watching file: {}", file.path().display());

    let app = create_router(RouterConfig {
        file,
        stream: args.stream_config(),
        static_dir: args.static_dir.clone(),
    });

    let addr = format!("{}:{}", args.host, args.port);
    let addr: SocketAddr = addr
        .parse()
        .map_err(|source| StartupError::Address { addr, source })?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| StartupError::Bind { addr, source })?;
    tracing::info!("listening on {}", addr);

    axum::serve(listener, app).await.map_err(StartupError::Serve)
}
