//! Server binary: parses CLI flags, loads configuration, and runs the
//! connection acceptor loop (`spec.md` §1, §6). Argument *semantics* for
//! game features are out of scope; the flags here only select a config
//! file and a log level/format, the ambient CLI surface every binary in
//! this workspace carries regardless of that non-goal.

use clap::Parser;
use rt_core::config::ServerConfig;
use rt_core::identity::IdentityRegistry;
use rt_core::level::LevelStore;
use rt_core::logging::{root_logger, LogFormat};
use rt_core::world::World;
use rt_server::context::ServerContext;
use rt_server::error::ServerError;
use rt_server::session;
use slog::{info, warn};
use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

#[derive(Parser, Debug)]
#[command(name = "rt_server", version, about = "Spatial voice roguelike server")]
struct Args {
    /// Path to a TOML config file; falls back to built-in defaults if absent.
    #[arg(long, default_value = "rt_server.toml")]
    config: PathBuf,

    /// Emit JSON logs instead of the terminal format.
    #[arg(long)]
    json_logs: bool,

    /// Enable debug-level logging.
    #[arg(long)]
    verbose: bool,
}

fn main() -> Result<(), ServerError> {
    let args = Args::parse();
    let format = if args.json_logs { LogFormat::Json } else { LogFormat::Terminal };
    let log = root_logger(format, args.verbose);

    let config = ServerConfig::load(&args.config)?;
    info!(log, "configuration loaded"; "config" => %args.config.display());

    std::fs::create_dir_all(&config.data_dir)?;
    let levels = Arc::new(LevelStore::load(&config.levels_dir)?);
    info!(log, "level packs loaded"; "levels_dir" => %config.levels_dir.display());

    let identity = Arc::new(IdentityRegistry::open(config.identities_path())?);
    let world = Arc::new(World::new(levels.clone()));

    let sfu_api_secret = match std::fs::read(&config.sfu.api_secret_file) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(log, "sfu api secret file missing, using empty secret for this run";
                "path" => %config.sfu.api_secret_file.display());
            Vec::new()
        }
        Err(e) => return Err(e.into()),
    };

    let listen_host = config.server.listen_host.clone();
    let listen_port = config.server.listen_port;
    let ctx = Arc::new(ServerContext { config, levels, identity, world, sfu_api_secret, log: log.clone() });

    let listener = TcpListener::bind((listen_host.as_str(), listen_port))?;
    info!(log, "listening"; "host" => %listen_host, "port" => listen_port);

    for stream in listener.incoming() {
        let stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                warn!(log, "failed to accept connection"; "error" => %e);
                continue;
            }
        };
        let ctx = ctx.clone();
        let peer = stream.peer_addr().ok();
        thread::spawn(move || {
            session::handle_connection(stream, ctx);
        });
        info!(log, "accepted connection"; "addr" => format!("{peer:?}"));
    }

    Ok(())
}
