use std::process::ExitCode;
use tokio::sync::{mpsc, watch};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use imposter::config::AppConfig;
use imposter::console::{self, CommandSink};
use imposter::identity::{self, IdentityStore};
use imposter::peer::{run_guest, run_host};
use imposter::state::{Coordinator, GuestMirror};
use imposter::transport::ws;

const USAGE: &str = "usage: imposter host | imposter join <CODE> [ADDR]";

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    // Logs go to stderr, the console owns stdout
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "imposter=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = AppConfig::from_env();
    let nickname = match &config.nickname {
        Some(n) => n.clone(),
        None => IdentityStore::new(&config.identity_file).get_or_create(),
    };

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("host") => host(config, nickname).await,
        Some("join") => {
            let Some(code) = args.get(1).and_then(|c| identity::parse_room_code(c)) else {
                eprintln!("Invalid room code.\n{}", USAGE);
                return ExitCode::FAILURE;
            };
            let addr = args
                .get(2)
                .cloned()
                .unwrap_or_else(|| format!("127.0.0.1:{}", config.bind.port()));
            join(&addr, code, nickname).await
        }
        _ => {
            eprintln!("{}", USAGE);
            ExitCode::FAILURE
        }
    }
}

async fn host(config: AppConfig, nickname: String) -> ExitCode {
    let room_code = identity::generate_room_code(&mut rand::rng());
    let endpoint = match ws::listen(config.bind, &room_code).await {
        Ok(endpoint) => endpoint,
        Err(e) => {
            tracing::error!("Failed to open room {}: {}", room_code, e);
            eprintln!("Could not host a room: {}", e);
            return ExitCode::FAILURE;
        }
    };
    tracing::info!("Listening on ws://{}/room/{}", config.bind, room_code);
    println!("Room code: {} (share it with the other players)", room_code);

    let coordinator = Coordinator::new(room_code, nickname);
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let (views_tx, views_rx) = watch::channel(coordinator.view());

    let session = tokio::spawn(run_host(endpoint, coordinator, commands_rx, views_tx));
    console::run(
        views_rx,
        CommandSink::Host {
            commands: commands_tx,
            defaults: config.default_settings,
        },
    )
    .await;

    if let Err(e) = session.await {
        tracing::error!("Host session panicked: {}", e);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

async fn join(addr: &str, room_code: String, nickname: String) -> ExitCode {
    let mut mirror = GuestMirror::new(room_code.clone(), nickname);
    let endpoint = match ws::connect(addr, &room_code).await {
        Ok(endpoint) => endpoint,
        Err(e) => {
            tracing::warn!("Could not reach room {} at {}: {}", room_code, addr, e);
            mirror.on_connect_failed();
            print!("{}", console::render(&mirror.view()));
            return ExitCode::FAILURE;
        }
    };

    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let (views_tx, views_rx) = watch::channel(mirror.view());

    let session = tokio::spawn(run_guest(endpoint, mirror, commands_rx, views_tx));
    console::run(views_rx, CommandSink::Guest(commands_tx)).await;

    match session.await {
        Ok(mirror) if mirror.error().is_some() => ExitCode::FAILURE,
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Guest session panicked: {}", e);
            ExitCode::FAILURE
        }
    }
}
