//! Bot binary: connects with a fixed name and walks a pathfinding target
//! it is given, logging proximity and speaking events. No game logic
//! beyond "wander": the pathfinding/event plumbing is what this crate
//! exists to demonstrate, not a scripted bot AI (out of scope per
//! `spec.md` §1's "pathfinding helper used by example bots").

use clap::Parser;
use rt_bot::events::BotEvents;
use rt_bot::runtime::BotRuntime;
use rt_client::connection::Connection;
use rt_client::events::NoopEvents;
use rt_client::identity::Identity;
use rt_core::config::BotConfig;
use rt_core::wire::PlayerRecord;
use slog::{info, o, Logger};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "rt_bot", version, about = "Scripted bot connection driver")]
struct Args {
    /// Path to a TOML config file; falls back to built-in defaults if absent.
    #[arg(long, default_value = "rt_bot.toml")]
    config: PathBuf,

    /// Tile to walk to once connected (x,y), if any.
    #[arg(long, value_parser = parse_xy)]
    goal: Option<(u16, u16)>,

    /// Emit JSON logs instead of the terminal format.
    #[arg(long)]
    json_logs: bool,

    /// Enable debug-level logging.
    #[arg(long)]
    verbose: bool,
}

fn parse_xy(s: &str) -> Result<(u16, u16), String> {
    let (x, y) = s.split_once(',').ok_or_else(|| "expected X,Y".to_string())?;
    Ok((x.parse().map_err(|e| format!("{e}"))?, y.parse().map_err(|e| format!("{e}"))?))
}

struct LoggingBotEvents {
    log: Logger,
}

impl BotEvents for LoggingBotEvents {
    fn on_world_state(&mut self, players: &[PlayerRecord]) {
        info!(self.log, "world state"; "player_count" => players.len());
    }

    fn on_player_nearby(&mut self, player: &PlayerRecord) {
        info!(self.log, "player entered audio range"; "player_id" => player.player_id, "name" => %player.name);
    }

    fn on_player_left_range(&mut self, player: &PlayerRecord) {
        info!(self.log, "player left audio range"; "player_id" => player.player_id, "name" => %player.name);
    }

    fn on_player_speaks(&mut self, player_id: u32) {
        info!(self.log, "player started speaking"; "player_id" => player_id);
    }

    fn on_player_stops_speaking(&mut self, player_id: u32) {
        info!(self.log, "player stopped speaking"; "player_id" => player_id);
    }

    fn on_disconnect(&mut self, reason: &str) {
        info!(self.log, "disconnected"; "reason" => reason);
    }
}

fn main() -> Result<(), rt_client::error::ClientError> {
    let args = Args::parse();
    let format = if args.json_logs { rt_core::logging::LogFormat::Json } else { rt_core::logging::LogFormat::Terminal };
    let log = rt_core::logging::root_logger(format, args.verbose);

    let config = BotConfig::load(&args.config).unwrap_or_default();
    let identity = Identity::load_or_create(&config.keyfile)?;
    let addr = format!("{}:{}", config.server_host, config.server_port);

    info!(log, "connecting"; "addr" => %addr, "name" => %config.name);
    let mut handshake_events = NoopEvents;
    let connection = Connection::connect(
        &addr,
        &identity,
        &config.name,
        &config.cache_dir,
        config.session.max_frame_bytes,
        &mut handshake_events,
    )?;
    info!(log, "connected"; "player_id" => connection.player_id, "level" => %connection.level_name);

    let mut runtime = BotRuntime::new(connection);
    if let Some((x, y)) = args.goal {
        runtime.walk_to(x, y);
    }

    let mut events = LoggingBotEvents { log: log.new(o!()) };
    runtime.run(&mut events)
}
