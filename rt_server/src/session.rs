//! Per-connection session state machine (`spec.md` §4.2):
//! `AWAIT_RESPONSE → AUTHENTICATED → RUNNING → CLOSED`.
//!
//! Concurrency follows `spec.md` §5/§9 "single-writer per connection,
//! preferred form": one reader thread drives the state machine and enqueues
//! every outbound message (including its own replies) onto an mpsc channel;
//! a dedicated writer thread owns the socket's write half and drains that
//! channel, so a slow or wedged peer can never interleave a partial frame
//! from two threads. A third thread drives the keep-alive timer.

use crate::context::ServerContext;
use rt_core::crypto;
use rt_core::error::{HandshakeError, SessionError};
use rt_core::identity::Binding;
use rt_core::wire::{self, AuthResultCode, FileEntry, ManifestEntry, Message};
use rt_core::world::Broadcaster;
use slog::{o, warn, Logger};
use std::io::BufReader;
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Sends outbound messages onto the session's mpsc channel; the writer
/// thread is the only thing that ever touches the socket's write half.
struct ChannelSink {
    tx: mpsc::Sender<Message>,
    alive: Arc<AtomicBool>,
}

impl Broadcaster for ChannelSink {
    fn send(&self, message: &Message) -> bool {
        if !self.alive.load(Ordering::SeqCst) {
            return false;
        }
        self.tx.send(message.clone()).is_ok()
    }
}

/// Validates the name and signature half of the acceptance rule
/// (`spec.md` §4.2). The registry-binding half is handled separately by
/// the caller, since a registry I/O failure is not itself a
/// `HandshakeError` the client has a result code for.
fn validate_signature_and_name(
    nonce: &[u8; 32],
    public_key: &[u8; 32],
    name: &str,
    signature: &[u8; 64],
) -> Result<(), HandshakeError> {
    if name.is_empty() || name.len() > 32 || !name.bytes().all(|b| b.is_ascii_graphic() || b == b' ') {
        return Err(HandshakeError::InvalidName);
    }

    let mut message = Vec::with_capacity(32 + name.len());
    message.extend_from_slice(nonce);
    message.extend_from_slice(name.as_bytes());
    if !crypto::verify(&message, signature, public_key) {
        return Err(HandshakeError::InvalidSignature);
    }
    Ok(())
}

/// Drives one connection end to end. Never panics on peer misbehavior;
/// logs and returns once the session is fully torn down.
pub fn handle_connection(stream: TcpStream, ctx: Arc<ServerContext>) {
    let peer = stream.peer_addr().ok();
    let log = ctx.log.new(o!("addr" => format!("{peer:?}")));
    if let Err(err) = run_session(stream, &ctx, &log) {
        warn!(log, "session ended"; "error" => %err);
    }
}

fn run_session(stream: TcpStream, ctx: &ServerContext, _log: &Logger) -> Result<(), SessionError> {
    let reader_stream = stream.try_clone()?;
    let writer_stream = stream.try_clone()?;
    let shutdown_stream = stream.try_clone()?;
    let mut reader = BufReader::new(reader_stream);
    let max_frame_bytes = ctx.config.session.max_frame_bytes;

    let (tx, rx) = mpsc::channel::<Message>();
    let alive = Arc::new(AtomicBool::new(true));
    let writer_handle = thread::spawn(move || {
        let mut writer_stream = writer_stream;
        for message in rx {
            if wire::write_message(&mut writer_stream, &message).is_err() {
                break;
            }
        }
        let _ = writer_stream.shutdown(Shutdown::Both);
    });
    let sink = Arc::new(ChannelSink { tx: tx.clone(), alive: alive.clone() });

    // AWAIT_RESPONSE
    let nonce = crypto::random_nonce();
    sink.send(&Message::AuthChallenge { nonce });

    let first = wire::read_message(&mut reader, max_frame_bytes);
    let (public_key, name, signature) = match first {
        Ok(Message::AuthResponse { public_key, name, signature }) => (public_key, name, signature),
        Ok(_) => {
            alive.store(false, Ordering::SeqCst);
            drop(tx);
            let _ = writer_handle.join();
            return Ok(());
        }
        Err(err) => {
            alive.store(false, Ordering::SeqCst);
            drop(tx);
            let _ = writer_handle.join();
            return Err(err.into());
        }
    };

    if let Err(handshake_err) = validate_signature_and_name(&nonce, &public_key, &name, &signature) {
        sink.send(&Message::AuthResult { code: handshake_err.into() });
        alive.store(false, Ordering::SeqCst);
        drop(tx);
        let _ = writer_handle.join();
        return Ok(());
    }

    // `register` performs the whole check-then-bind sequence atomically
    // under the registry's lock (`spec.md` §4.4: "atomic against concurrent
    // handshakes").
    let registry_outcome = ctx.identity.register(&name, &public_key);
    let binding = match registry_outcome {
        Ok(binding) => binding,
        Err(_) => {
            alive.store(false, Ordering::SeqCst);
            drop(tx);
            let _ = writer_handle.join();
            return Ok(());
        }
    };
    if let Err(handshake_err) = match binding {
        Binding::New | Binding::Known => Ok(()),
        Binding::NameTaken => Err(HandshakeError::NameTaken),
        Binding::KeyMismatch => Err(HandshakeError::KeyMismatch),
    } {
        sink.send(&Message::AuthResult { code: handshake_err.into() });
        alive.store(false, Ordering::SeqCst);
        drop(tx);
        let _ = writer_handle.join();
        return Ok(());
    }

    // AUTHENTICATED
    let saved = ctx.identity.load_position(&name).map(|p| (p.x, p.y, p.level_name));
    let Some((x, y, level_name)) = ctx.world.spawn_position(saved) else {
        sink.send(&Message::AuthResult { code: AuthResultCode::InvalidName });
        alive.store(false, Ordering::SeqCst);
        drop(tx);
        let _ = writer_handle.join();
        return Ok(());
    };

    let Some(player_id) = ctx.world.join(name.clone(), public_key, x, y, level_name.clone(), sink.clone()) else {
        sink.send(&Message::AuthResult { code: AuthResultCode::AlreadyConnected });
        alive.store(false, Ordering::SeqCst);
        drop(tx);
        let _ = writer_handle.join();
        return Ok(());
    };

    sink.send(&Message::AuthResult { code: AuthResultCode::Success });
    if let Some(level) = ctx.levels.get(&level_name) {
        sink.send(&Message::ServerHello {
            player_id,
            width: level.width,
            height: level.height,
            x,
            y,
            grid: level.grid.clone(),
            level_name: level_name.clone(),
        });
    }

    let now = chrono::Utc::now().timestamp();
    let token = rt_core::voice::mint_token(
        &ctx.config.sfu.api_key,
        &ctx.sfu_api_secret,
        &name,
        &ctx.config.sfu.room_name,
        now,
        ctx.config.sfu.token_ttl_secs,
    );
    sink.send(&Message::LivekitToken { url: ctx.config.sfu.url.clone(), token });

    ctx.world.broadcast_others(player_id, &Message::PlayerJoined { player_id, name: name.clone() });
    ctx.world.broadcast_all(&ctx.world.snapshot());

    let timed_out = Arc::new(AtomicBool::new(false));
    let keepalive_handle =
        spawn_keepalive(ctx, player_id, sink.clone(), shutdown_stream.try_clone()?, timed_out.clone());

    // RUNNING
    let result = run_dispatch_loop(ctx, &mut reader, max_frame_bytes, player_id, &sink);
    // The keepalive thread's shutdown races the dispatch loop's blocking
    // read: whatever I/O error that shutdown produces, a tripped timeout
    // flag is the real cause.
    let result = if timed_out.load(Ordering::SeqCst) { Err(SessionError::Timeout) } else { result };

    // CLOSED
    if let Some((pname, px, py, plevel)) = ctx.world.leave(player_id) {
        let _ = ctx.identity.save_position(&pname, px, py, &plevel);
        ctx.world.broadcast_all(&Message::PlayerLeft { player_id });
    }

    alive.store(false, Ordering::SeqCst);
    let _ = shutdown_stream.shutdown(Shutdown::Both);
    drop(tx);
    let _ = keepalive_handle.join();
    let _ = writer_handle.join();
    result
}

fn run_dispatch_loop(
    ctx: &ServerContext,
    reader: &mut BufReader<TcpStream>,
    max_frame_bytes: u32,
    player_id: u32,
    sink: &Arc<ChannelSink>,
) -> Result<(), SessionError> {
    loop {
        let message = match wire::read_message(reader, max_frame_bytes) {
            Ok(message) => message,
            // A clean EOF surfaces as a framing error (`rt_core::wire`
            // maps `UnexpectedEof` this way); mid-stream that would be a
            // real protocol violation, but here it is the peer hanging up.
            Err(rt_core::error::ProtocolError::FramingError) => return Err(SessionError::Closed),
            Err(err) => return Err(err.into()),
        };
        match message {
            Message::PositionUpdate { seq, x, y } => {
                let Some(outcome) = ctx.world.try_move(player_id, x, y) else {
                    return Ok(());
                };
                if let Some(transition) = outcome.door_transition {
                    sink.send(&Message::DoorTransition {
                        target_level: transition.target_level,
                        spawn_x: transition.target_x,
                        spawn_y: transition.target_y,
                    });
                }
                sink.send(&Message::PositionAck { seq, x: outcome.ack_x, y: outcome.ack_y });
                ctx.world.broadcast_all(&ctx.world.snapshot());
            }
            Message::LevelManifestRequest { level_name } => {
                let entries = ctx
                    .levels
                    .manifest(&level_name)
                    .into_iter()
                    .map(|(filename, hash_hex, size)| ManifestEntry { filename, hash_hex, size })
                    .collect();
                sink.send(&Message::LevelManifest { entries });
            }
            Message::LevelFilesRequest { level_name, filenames } => {
                let files = ctx
                    .levels
                    .files(&level_name, &filenames)
                    .into_iter()
                    .map(|(filename, content)| FileEntry { filename, content })
                    .collect();
                sink.send(&Message::LevelFilesData { files });
            }
            Message::MuteStatus { muted } => {
                ctx.world.set_muted(player_id, muted);
                ctx.world.broadcast_all(&ctx.world.snapshot());
            }
            Message::Pong => {
                ctx.world.record_pong(player_id);
            }
            other => return Err(SessionError::UnexpectedMessage(other.type_byte())),
        }
    }
}

fn spawn_keepalive(
    ctx: &ServerContext,
    player_id: u32,
    sink: Arc<ChannelSink>,
    shutdown_stream: TcpStream,
    timed_out: Arc<AtomicBool>,
) -> thread::JoinHandle<()> {
    let world = ctx.world.clone();
    let ping_interval_secs = ctx.config.session.ping_interval_secs;
    let pong_timeout_secs = ctx.config.session.pong_timeout_secs;
    thread::spawn(move || loop {
        thread::sleep(Duration::from_secs(ping_interval_secs));
        world.record_ping_sent(player_id);
        if !sink.send(&Message::Ping) {
            return;
        }
        match world.seconds_since_pong(player_id) {
            Some(elapsed) if elapsed > pong_timeout_secs as f64 => {
                timed_out.store(true, Ordering::SeqCst);
                let _ = shutdown_stream.shutdown(Shutdown::Both);
                return;
            }
            Some(_) => continue,
            None => return,
        }
    })
}
