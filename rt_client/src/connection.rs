//! The client's mirror of the server's session state machine
//! (`spec.md` §4.2/§4.7): one `TcpStream`, driven from a single thread —
//! there is no writer-thread split here the way `rt_server::session` has
//! one, since a client only ever has one thread wanting to write at a
//! time (`SPEC_FULL.md` §5 "the reader thread *is* the writer").
//!
//! Level distribution requests (`spec.md` §4.6) are synchronous calls
//! embedded in the same read loop: while waiting for a `LEVEL_MANIFEST`
//! or `LEVEL_FILES_DATA` reply, any other message kind that arrives is
//! dispatched through the same [`ClientEvents`] path `run` uses, so a
//! `WORLD_STATE` broadcast interleaved with a manifest reply during a
//! door transition is never dropped (`spec.md` §4.6's tolerance for
//! out-of-order delivery during a logical request/response pair).

use crate::cache::LevelCache;
use crate::error::ClientError;
use crate::events::ClientEvents;
use crate::identity::Identity;
use crate::level_mirror::ClientLevel;
use crate::prediction::PredictionState;
use rt_core::wire::{self, AuthResultCode, Message, PlayerRecord};
use std::io::BufReader;
use std::net::TcpStream;
use std::time::Duration;

/// The outcome of [`Connection::poll`].
#[derive(Debug)]
pub enum PollOutcome {
    /// A message was read and dispatched.
    Message(Message),
    /// The read timed out; the connection is still open.
    Timeout,
    /// The peer closed the connection.
    Closed,
}

/// Reads one message during the handshake (`spec.md` §4.2), distinguishing
/// the server hanging up mid-handshake from any other protocol error: a
/// clean EOF surfaces from `rt_core::wire` as `ProtocolError::FramingError`,
/// which at this point in the connection means "closed", not "malformed".
fn read_handshake_message(reader: &mut BufReader<TcpStream>, max_frame_bytes: u32) -> Result<Message, ClientError> {
    match wire::read_message(reader, max_frame_bytes) {
        Ok(message) => Ok(message),
        Err(rt_core::error::ProtocolError::FramingError) => Err(ClientError::HandshakeClosed),
        Err(e) => Err(e.into()),
    }
}

/// A live, authenticated connection to an `rt_server`.
pub struct Connection {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
    max_frame_bytes: u32,
    cache: LevelCache,
    pub player_id: u32,
    pub level_name: String,
    pub level: ClientLevel,
    pub x: u16,
    pub y: u16,
    pub prediction: PredictionState,
    pub sfu_url: Option<String>,
    pub sfu_token: Option<String>,
    /// Last received `WORLD_STATE` snapshot, kept so callers (notably
    /// `rt_bot`'s proximity tracker) can diff against it without
    /// re-deriving state from individual `PLAYER_JOINED`/`PLAYER_LEFT`
    /// messages.
    pub players: Vec<PlayerRecord>,
}

impl Connection {
    /// Connects to `addr`, runs the handshake (`spec.md` §4.2), and fetches
    /// the starting level's tile definitions so local movement prediction
    /// can check walkability from the first frame.
    pub fn connect(
        addr: &str,
        identity: &Identity,
        name: &str,
        cache_root: impl Into<std::path::PathBuf>,
        max_frame_bytes: u32,
        events: &mut impl ClientEvents,
    ) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr)?;
        let writer = stream.try_clone()?;
        let mut reader = BufReader::new(stream);

        let challenge = read_handshake_message(&mut reader, max_frame_bytes)?;
        let nonce = match challenge {
            Message::AuthChallenge { nonce } => nonce,
            _ => return Err(ClientError::UnexpectedHandshakeMessage),
        };

        let signature = identity.sign_challenge(&nonce, name);
        let response = Message::AuthResponse { public_key: identity.public_key, name: name.to_string(), signature };
        let mut writer_for_handshake = writer.try_clone()?;
        wire::write_message(&mut writer_for_handshake, &response)?;

        match read_handshake_message(&mut reader, max_frame_bytes)? {
            Message::AuthResult { code: AuthResultCode::Success } => {}
            Message::AuthResult { code } => return Err(ClientError::HandshakeRejected(code)),
            _ => return Err(ClientError::UnexpectedHandshakeMessage),
        }

        let (player_id, width, height, x, y, grid, level_name) =
            match read_handshake_message(&mut reader, max_frame_bytes)? {
                Message::ServerHello { player_id, width, height, x, y, grid, level_name } => {
                    (player_id, width, height, x, y, grid, level_name)
                }
                _ => return Err(ClientError::UnexpectedHandshakeMessage),
            };

        let mut conn = Connection {
            reader,
            writer,
            max_frame_bytes,
            cache: LevelCache::new(cache_root),
            player_id,
            level_name: level_name.clone(),
            level: ClientLevel::new(width, height, grid.clone(), None),
            x,
            y,
            prediction: PredictionState::new(),
            sfu_url: None,
            sfu_token: None,
            players: Vec::new(),
        };

        let tiles_json = conn.fetch_level_files(&level_name, events)?;
        conn.level = ClientLevel::new(width, height, grid, tiles_json.as_deref());

        // The SFU token arrives right after `SERVER_HELLO`; tolerate other
        // traffic interleaved ahead of it the same way level fetches do.
        loop {
            match conn.read_dispatch(events)? {
                Some(Message::LivekitToken { url, token }) => {
                    conn.sfu_url = Some(url);
                    conn.sfu_token = Some(token);
                    break;
                }
                Some(_) => continue,
                None => break,
            }
        }

        Ok(conn)
    }

    fn send(&mut self, message: &Message) -> Result<(), ClientError> {
        wire::write_message(&mut self.writer, message).map_err(Into::into)
    }

    /// Sends a locally-predicted move (`spec.md` §4.7 step (a)) if the
    /// target tile is walkable in the local mirror; returns `None` if the
    /// move was rejected client-side without ever reaching the wire.
    pub fn try_move_local(&mut self, dx: i32, dy: i32) -> Result<Option<(u16, u16)>, ClientError> {
        let level = &self.level;
        let Some(outcome) = self.prediction.apply_local_move(self.x, self.y, dx, dy, |x, y| level.is_walkable(x, y))
        else {
            return Ok(None);
        };
        self.send(&Message::PositionUpdate { seq: outcome.seq, x: outcome.new_x, y: outcome.new_y })?;
        self.x = outcome.new_x;
        self.y = outcome.new_y;
        Ok(Some((outcome.new_x, outcome.new_y)))
    }

    pub fn set_muted(&mut self, muted: bool) -> Result<(), ClientError> {
        self.send(&Message::MuteStatus { muted })
    }

    /// Reads and dispatches messages until the connection closes or an
    /// unrecoverable protocol error occurs. Blocks the calling thread.
    pub fn run(&mut self, events: &mut impl ClientEvents) -> Result<(), ClientError> {
        loop {
            if self.read_dispatch(events)?.is_none() {
                return Ok(());
            }
        }
    }

    /// Sets (or clears) a read timeout on the underlying socket, so a
    /// caller driving its own loop (e.g. `rt_bot`'s decision loop, which
    /// also needs to tick pathfinding and speaking timeouts between
    /// incoming messages) can use [`Connection::poll`] instead of
    /// blocking in [`Connection::run`] forever.
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) -> std::io::Result<()> {
        self.reader.get_ref().set_read_timeout(timeout)
    }

    /// Reads and dispatches a single message. Distinguishes "nothing
    /// arrived before the read timeout" from "the connection closed", so
    /// a caller driving its own loop can tell whether to keep ticking or
    /// stop.
    pub fn poll(&mut self, events: &mut impl ClientEvents) -> Result<PollOutcome, ClientError> {
        match self.read_dispatch(events) {
            Ok(Some(message)) => Ok(PollOutcome::Message(message)),
            Ok(None) => Ok(PollOutcome::Closed),
            Err(ClientError::Protocol(rt_core::error::ProtocolError::Io(e)))
                if e.kind() == std::io::ErrorKind::WouldBlock || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                Ok(PollOutcome::Timeout)
            }
            Err(e) => Err(e),
        }
    }

    /// Reads one message and dispatches it to `events`, returning it for
    /// callers (level fetch helpers) that need to recognize a specific
    /// reply among interleaved traffic. Returns `Ok(None)` on a clean
    /// connection close.
    fn read_dispatch(&mut self, events: &mut impl ClientEvents) -> Result<Option<Message>, ClientError> {
        let message = match wire::read_message(&mut self.reader, self.max_frame_bytes) {
            Ok(m) => m,
            Err(rt_core::error::ProtocolError::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                events.on_disconnect("connection closed");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        match &message {
            Message::WorldState { players } => {
                self.players = players.clone();
                events.on_world_state(players);
            }
            Message::PositionAck { seq, x, y } => {
                let outcome = self.prediction.apply_ack(*x, *y, *seq, |x, y| self.level.is_walkable(x, y));
                self.x = outcome.x;
                self.y = outcome.y;
                events.on_position_ack(outcome.x, outcome.y, !outcome.rejected);
            }
            Message::DoorTransition { target_level, spawn_x, spawn_y } => {
                self.prediction.clear();
                self.x = *spawn_x;
                self.y = *spawn_y;
                self.level_name = target_level.clone();
                events.on_door_transition(target_level, *spawn_x, *spawn_y);
            }
            Message::PlayerJoined { player_id, name } => events.on_player_joined(*player_id, name),
            Message::PlayerLeft { player_id } => events.on_player_left(*player_id),
            Message::Ping => self.send(&Message::Pong)?,
            _ => {}
        }

        Ok(Some(message))
    }

    /// Fetches and caches `level_name`'s distributed files, returning the
    /// raw `tiles.json` bytes if present (`spec.md` §4.6). Any other
    /// message kind arriving while waiting for a reply is dispatched
    /// normally rather than discarded.
    fn fetch_level_files(&mut self, level_name: &str, events: &mut impl ClientEvents) -> Result<Option<Vec<u8>>, ClientError> {
        self.send(&Message::LevelManifestRequest { level_name: level_name.to_string() })?;
        let entries = loop {
            match self.read_dispatch(events)? {
                Some(Message::LevelManifest { entries }) => break entries,
                Some(_) => continue,
                None => return Ok(None),
            }
        };

        let manifest: Vec<(String, String, u32)> =
            entries.iter().map(|e| (e.filename.clone(), e.hash_hex.clone(), e.size)).collect();
        let (cached, missing) = self.cache.partition(level_name, &manifest);
        let mut files: std::collections::HashMap<String, Vec<u8>> =
            cached.into_iter().map(|(name, bytes)| (name.to_string(), bytes)).collect();

        if !missing.is_empty() {
            let filenames = missing.iter().map(|s| s.to_string()).collect();
            self.send(&Message::LevelFilesRequest { level_name: level_name.to_string(), filenames })?;
            let fetched = loop {
                match self.read_dispatch(events)? {
                    Some(Message::LevelFilesData { files }) => break files,
                    Some(_) => continue,
                    None => return Ok(None),
                }
            };
            let fetched_pairs: Vec<(String, Vec<u8>)> =
                fetched.iter().map(|f| (f.filename.clone(), f.content.clone())).collect();
            self.cache.ingest(level_name, &manifest, &fetched_pairs)?;
            for (filename, content) in fetched_pairs {
                files.insert(filename, content);
            }
        }

        Ok(files.remove("tiles.json"))
    }
}
