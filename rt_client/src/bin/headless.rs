//! A minimal headless client: connects, logs every event, and otherwise
//! does nothing. Stands in for the terminal UI (`spec.md` §1 Non-goal)
//! so `rt_client`'s connection machinery can be exercised end to end
//! without one.

use clap::Parser;
use rt_client::connection::Connection;
use rt_client::events::ClientEvents;
use rt_client::identity::Identity;
use rt_core::config::ClientConfig;
use rt_core::wire::PlayerRecord;
use slog::{info, o, Logger};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "rt_client_headless", version, about = "Headless rt_client connection driver")]
struct Args {
    /// Path to a TOML config file; falls back to built-in defaults if absent.
    #[arg(long, default_value = "rt_client.toml")]
    config: PathBuf,

    /// Player name to authenticate as.
    #[arg(long)]
    name: String,

    /// Emit JSON logs instead of the terminal format.
    #[arg(long)]
    json_logs: bool,

    /// Enable debug-level logging.
    #[arg(long)]
    verbose: bool,
}

struct LoggingEvents {
    log: Logger,
}

impl ClientEvents for LoggingEvents {
    fn on_world_state(&mut self, players: &[PlayerRecord]) {
        info!(self.log, "world state"; "player_count" => players.len());
    }

    fn on_position_ack(&mut self, x: u16, y: u16, accepted: bool) {
        info!(self.log, "position ack"; "x" => x, "y" => y, "accepted" => accepted);
    }

    fn on_door_transition(&mut self, level_name: &str, x: u16, y: u16) {
        info!(self.log, "door transition"; "level" => level_name, "x" => x, "y" => y);
    }

    fn on_player_joined(&mut self, player_id: u32, name: &str) {
        info!(self.log, "player joined"; "player_id" => player_id, "name" => name);
    }

    fn on_player_left(&mut self, player_id: u32) {
        info!(self.log, "player left"; "player_id" => player_id);
    }

    fn on_disconnect(&mut self, reason: &str) {
        info!(self.log, "disconnected"; "reason" => reason);
    }
}

fn main() -> Result<(), rt_client::error::ClientError> {
    let args = Args::parse();
    let format = if args.json_logs { rt_core::logging::LogFormat::Json } else { rt_core::logging::LogFormat::Terminal };
    let log = rt_core::logging::root_logger(format, args.verbose);

    let config = ClientConfig::load(&args.config).unwrap_or_default();
    let identity = Identity::load_or_create(&config.keyfile)?;
    let addr = format!("{}:{}", config.server_host, config.server_port);

    info!(log, "connecting"; "addr" => %addr, "name" => %args.name);
    let mut events = LoggingEvents { log: log.new(o!()) };
    let mut connection = Connection::connect(
        &addr,
        &identity,
        &args.name,
        &config.cache_dir,
        config.session.max_frame_bytes,
        &mut events,
    )?;
    info!(log, "connected"; "player_id" => connection.player_id, "level" => %connection.level_name);

    connection.run(&mut events)
}
