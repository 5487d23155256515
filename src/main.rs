use std::net::SocketAddr;

use clap::Parser;
use donorgate::cli::{
    Args, build_config, handle_seed_demo, init_logging, load_jwt_secret, open_database,
};
use donorgate::create_app;
use donorgate::rate_limit::spawn_limiter_cleanup;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logging(&args.log_format);

    let Some(jwt_secret) = load_jwt_secret(args.jwt_secret_file.as_deref()) else {
        std::process::exit(1);
    };

    let Some(db) = open_database(&args.database).await else {
        std::process::exit(1);
    };

    if args.seed_demo {
        handle_seed_demo(&db).await;
    }

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            error!(address = %addr, error = %e, "Failed to bind");
            std::process::exit(1);
        });

    let local_addr = listener.local_addr().unwrap_or_else(|e| {
        error!(error = %e, "Failed to read local address");
        std::process::exit(1);
    });

    let config = build_config(db, jwt_secret, args.production, args.trust_proxy);
    let app = create_app(&config);
    spawn_limiter_cleanup(config.rate_limits.clone());

    info!(address = %local_addr, secure_cookies = config.secure_cookies, "Listening");

    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    if let Err(e) = axum::serve(listener, make_service).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
