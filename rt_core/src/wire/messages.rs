//! Per-message payload structs and the closed `Message` enum that switches
//! over the type byte. Grounded on `t51core::net::frame::{ConnectionToken,
//! Header}`: each struct owns its own `SIZE`/encode/decode, the way the
//! teacher's `ConnectionToken` and `Header` do, generalized from one
//! hand-rolled control message to the full closed set `spec.md` §4.1 names.
//!
//! No dynamic dispatch: a `match` on the type byte is sufficient and faster
//! than an open polymorphic dispatch table (`spec.md` §9).

use super::primitives::{read_blob, read_string, write_blob, write_string};
use crate::error::{ProtocolError, ProtocolResult};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

macro_rules! type_bytes {
    ($($name:ident = $value:expr),* $(,)?) => {
        $(pub const $name: u8 = $value;)*
    };
}

type_bytes! {
    TYPE_AUTH_CHALLENGE = 1,
    TYPE_AUTH_RESPONSE = 2,
    TYPE_AUTH_RESULT = 3,
    TYPE_SERVER_HELLO = 4,
    TYPE_LIVEKIT_TOKEN = 5,
    TYPE_LEVEL_MANIFEST_REQUEST = 6,
    TYPE_LEVEL_MANIFEST = 7,
    TYPE_LEVEL_FILES_REQUEST = 8,
    TYPE_LEVEL_FILES_DATA = 9,
    TYPE_POSITION_UPDATE = 10,
    TYPE_POSITION_ACK = 11,
    TYPE_DOOR_TRANSITION = 12,
    TYPE_WORLD_STATE = 13,
    TYPE_PLAYER_JOINED = 14,
    TYPE_PLAYER_LEFT = 15,
    TYPE_MUTE_STATUS = 16,
    TYPE_PING = 17,
    TYPE_PONG = 18,
}

/// `AUTH_RESULT` result codes (`spec.md` §4.1/§4.2).
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[repr(u8)]
pub enum AuthResultCode {
    Success = 0,
    NameTaken = 1,
    KeyMismatch = 2,
    InvalidSignature = 3,
    InvalidName = 4,
    AlreadyConnected = 5,
}

impl AuthResultCode {
    fn from_byte(byte: u8) -> ProtocolResult<Self> {
        Ok(match byte {
            0 => Self::Success,
            1 => Self::NameTaken,
            2 => Self::KeyMismatch,
            3 => Self::InvalidSignature,
            4 => Self::InvalidName,
            5 => Self::AlreadyConnected,
            other => return Err(ProtocolError::UnknownType(other)),
        })
    }
}

impl From<crate::error::HandshakeError> for AuthResultCode {
    fn from(err: crate::error::HandshakeError) -> Self {
        use crate::error::HandshakeError::*;
        match err {
            NameTaken => AuthResultCode::NameTaken,
            KeyMismatch => AuthResultCode::KeyMismatch,
            InvalidSignature => AuthResultCode::InvalidSignature,
            InvalidName => AuthResultCode::InvalidName,
            AlreadyConnected => AuthResultCode::AlreadyConnected,
        }
    }
}

/// One entry of a `WORLD_STATE` snapshot (`spec.md` §3).
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerRecord {
    pub player_id: u32,
    pub x: u16,
    pub y: u16,
    pub is_muted: bool,
    pub name: String,
    pub level_name: String,
    pub ping_ms: u32,
}

/// One entry of a `LEVEL_MANIFEST` response (`spec.md` §3/§4.6).
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestEntry {
    pub filename: String,
    pub hash_hex: String,
    pub size: u32,
}

/// One entry of a `LEVEL_FILES_DATA` response.
#[derive(Debug, Clone, PartialEq)]
pub struct FileEntry {
    pub filename: String,
    pub content: Vec<u8>,
}

/// The closed set of protocol messages.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    AuthChallenge { nonce: [u8; 32] },
    AuthResponse { public_key: [u8; 32], name: String, signature: [u8; 64] },
    AuthResult { code: AuthResultCode },
    ServerHello { player_id: u32, width: u16, height: u16, x: u16, y: u16, grid: Vec<u8>, level_name: String },
    LivekitToken { url: String, token: String },
    LevelManifestRequest { level_name: String },
    LevelManifest { entries: Vec<ManifestEntry> },
    LevelFilesRequest { level_name: String, filenames: Vec<String> },
    LevelFilesData { files: Vec<FileEntry> },
    PositionUpdate { seq: u32, x: u16, y: u16 },
    PositionAck { seq: u32, x: u16, y: u16 },
    DoorTransition { target_level: String, spawn_x: u16, spawn_y: u16 },
    WorldState { players: Vec<PlayerRecord> },
    PlayerJoined { player_id: u32, name: String },
    PlayerLeft { player_id: u32 },
    MuteStatus { muted: bool },
    Ping,
    Pong,
}

impl Message {
    /// The type byte this message is framed with.
    pub fn type_byte(&self) -> u8 {
        match self {
            Message::AuthChallenge { .. } => TYPE_AUTH_CHALLENGE,
            Message::AuthResponse { .. } => TYPE_AUTH_RESPONSE,
            Message::AuthResult { .. } => TYPE_AUTH_RESULT,
            Message::ServerHello { .. } => TYPE_SERVER_HELLO,
            Message::LivekitToken { .. } => TYPE_LIVEKIT_TOKEN,
            Message::LevelManifestRequest { .. } => TYPE_LEVEL_MANIFEST_REQUEST,
            Message::LevelManifest { .. } => TYPE_LEVEL_MANIFEST,
            Message::LevelFilesRequest { .. } => TYPE_LEVEL_FILES_REQUEST,
            Message::LevelFilesData { .. } => TYPE_LEVEL_FILES_DATA,
            Message::PositionUpdate { .. } => TYPE_POSITION_UPDATE,
            Message::PositionAck { .. } => TYPE_POSITION_ACK,
            Message::DoorTransition { .. } => TYPE_DOOR_TRANSITION,
            Message::WorldState { .. } => TYPE_WORLD_STATE,
            Message::PlayerJoined { .. } => TYPE_PLAYER_JOINED,
            Message::PlayerLeft { .. } => TYPE_PLAYER_LEFT,
            Message::MuteStatus { .. } => TYPE_MUTE_STATUS,
            Message::Ping => TYPE_PING,
            Message::Pong => TYPE_PONG,
        }
    }

    pub fn encode<W: Write>(&self, w: &mut W) -> ProtocolResult<()> {
        match self {
            Message::AuthChallenge { nonce } => w.write_all(nonce).map_err(Into::into),
            Message::AuthResponse { public_key, name, signature } => {
                w.write_all(public_key)?;
                write_string(w, name)?;
                w.write_all(signature)?;
                Ok(())
            }
            Message::AuthResult { code } => w.write_u8(*code as u8).map_err(Into::into),
            Message::ServerHello { player_id, width, height, x, y, grid, level_name } => {
                w.write_u32::<BigEndian>(*player_id)?;
                w.write_u16::<BigEndian>(*width)?;
                w.write_u16::<BigEndian>(*height)?;
                w.write_u16::<BigEndian>(*x)?;
                w.write_u16::<BigEndian>(*y)?;
                write_blob(w, grid)?;
                write_string(w, level_name)?;
                Ok(())
            }
            Message::LivekitToken { url, token } => {
                write_string(w, url)?;
                write_string(w, token)?;
                Ok(())
            }
            Message::LevelManifestRequest { level_name } => write_string(w, level_name),
            Message::LevelManifest { entries } => {
                w.write_u32::<BigEndian>(entries.len() as u32)?;
                for entry in entries {
                    write_string(w, &entry.filename)?;
                    write_string(w, &entry.hash_hex)?;
                    w.write_u32::<BigEndian>(entry.size)?;
                }
                Ok(())
            }
            Message::LevelFilesRequest { level_name, filenames } => {
                write_string(w, level_name)?;
                w.write_u32::<BigEndian>(filenames.len() as u32)?;
                for filename in filenames {
                    write_string(w, filename)?;
                }
                Ok(())
            }
            Message::LevelFilesData { files } => {
                w.write_u32::<BigEndian>(files.len() as u32)?;
                for file in files {
                    write_string(w, &file.filename)?;
                    write_blob(w, &file.content)?;
                }
                Ok(())
            }
            Message::PositionUpdate { seq, x, y } | Message::PositionAck { seq, x, y } => {
                w.write_u32::<BigEndian>(*seq)?;
                w.write_u16::<BigEndian>(*x)?;
                w.write_u16::<BigEndian>(*y)?;
                Ok(())
            }
            Message::DoorTransition { target_level, spawn_x, spawn_y } => {
                write_string(w, target_level)?;
                w.write_u16::<BigEndian>(*spawn_x)?;
                w.write_u16::<BigEndian>(*spawn_y)?;
                Ok(())
            }
            Message::WorldState { players } => {
                w.write_u32::<BigEndian>(players.len() as u32)?;
                for p in players {
                    w.write_u32::<BigEndian>(p.player_id)?;
                    w.write_u16::<BigEndian>(p.x)?;
                    w.write_u16::<BigEndian>(p.y)?;
                    w.write_u8(p.is_muted as u8)?;
                    write_string(w, &p.name)?;
                    write_string(w, &p.level_name)?;
                    w.write_u32::<BigEndian>(p.ping_ms)?;
                }
                Ok(())
            }
            Message::PlayerJoined { player_id, name } => {
                w.write_u32::<BigEndian>(*player_id)?;
                write_string(w, name)?;
                Ok(())
            }
            Message::PlayerLeft { player_id } => w.write_u32::<BigEndian>(*player_id).map_err(Into::into),
            Message::MuteStatus { muted } => w.write_u8(*muted as u8).map_err(Into::into),
            Message::Ping | Message::Pong => Ok(()),
        }
    }

    pub fn decode(msg_type: u8, payload: &[u8]) -> ProtocolResult<Self> {
        let mut r = payload;
        Ok(match msg_type {
            TYPE_AUTH_CHALLENGE => {
                let mut nonce = [0u8; 32];
                r.read_exact(&mut nonce).map_err(|_| ProtocolError::FramingError)?;
                Message::AuthChallenge { nonce }
            }
            TYPE_AUTH_RESPONSE => {
                let mut public_key = [0u8; 32];
                r.read_exact(&mut public_key).map_err(|_| ProtocolError::FramingError)?;
                let name = read_string(&mut r)?;
                let mut signature = [0u8; 64];
                r.read_exact(&mut signature).map_err(|_| ProtocolError::FramingError)?;
                Message::AuthResponse { public_key, name, signature }
            }
            TYPE_AUTH_RESULT => {
                let code = AuthResultCode::from_byte(r.read_u8()?)?;
                Message::AuthResult { code }
            }
            TYPE_SERVER_HELLO => {
                let player_id = r.read_u32::<BigEndian>()?;
                let width = r.read_u16::<BigEndian>()?;
                let height = r.read_u16::<BigEndian>()?;
                let x = r.read_u16::<BigEndian>()?;
                let y = r.read_u16::<BigEndian>()?;
                let grid = read_blob(&mut r)?;
                let level_name = read_string(&mut r)?;
                Message::ServerHello { player_id, width, height, x, y, grid, level_name }
            }
            TYPE_LIVEKIT_TOKEN => {
                let url = read_string(&mut r)?;
                let token = read_string(&mut r)?;
                Message::LivekitToken { url, token }
            }
            TYPE_LEVEL_MANIFEST_REQUEST => Message::LevelManifestRequest { level_name: read_string(&mut r)? },
            TYPE_LEVEL_MANIFEST => {
                let count = r.read_u32::<BigEndian>()?;
                let mut entries = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let filename = read_string(&mut r)?;
                    let hash_hex = read_string(&mut r)?;
                    let size = r.read_u32::<BigEndian>()?;
                    entries.push(ManifestEntry { filename, hash_hex, size });
                }
                Message::LevelManifest { entries }
            }
            TYPE_LEVEL_FILES_REQUEST => {
                let level_name = read_string(&mut r)?;
                let count = r.read_u32::<BigEndian>()?;
                let mut filenames = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    filenames.push(read_string(&mut r)?);
                }
                Message::LevelFilesRequest { level_name, filenames }
            }
            TYPE_LEVEL_FILES_DATA => {
                let count = r.read_u32::<BigEndian>()?;
                let mut files = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let filename = read_string(&mut r)?;
                    let content = read_blob(&mut r)?;
                    files.push(FileEntry { filename, content });
                }
                Message::LevelFilesData { files }
            }
            TYPE_POSITION_UPDATE => {
                let seq = r.read_u32::<BigEndian>()?;
                let x = r.read_u16::<BigEndian>()?;
                let y = r.read_u16::<BigEndian>()?;
                Message::PositionUpdate { seq, x, y }
            }
            TYPE_POSITION_ACK => {
                let seq = r.read_u32::<BigEndian>()?;
                let x = r.read_u16::<BigEndian>()?;
                let y = r.read_u16::<BigEndian>()?;
                Message::PositionAck { seq, x, y }
            }
            TYPE_DOOR_TRANSITION => {
                let target_level = read_string(&mut r)?;
                let spawn_x = r.read_u16::<BigEndian>()?;
                let spawn_y = r.read_u16::<BigEndian>()?;
                Message::DoorTransition { target_level, spawn_x, spawn_y }
            }
            TYPE_WORLD_STATE => {
                let count = r.read_u32::<BigEndian>()?;
                let mut players = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let player_id = r.read_u32::<BigEndian>()?;
                    let x = r.read_u16::<BigEndian>()?;
                    let y = r.read_u16::<BigEndian>()?;
                    let is_muted = r.read_u8()? != 0;
                    let name = read_string(&mut r)?;
                    let level_name = read_string(&mut r)?;
                    let ping_ms = r.read_u32::<BigEndian>()?;
                    players.push(PlayerRecord { player_id, x, y, is_muted, name, level_name, ping_ms });
                }
                Message::WorldState { players }
            }
            TYPE_PLAYER_JOINED => {
                let player_id = r.read_u32::<BigEndian>()?;
                let name = read_string(&mut r)?;
                Message::PlayerJoined { player_id, name }
            }
            TYPE_PLAYER_LEFT => Message::PlayerLeft { player_id: r.read_u32::<BigEndian>()? },
            TYPE_MUTE_STATUS => Message::MuteStatus { muted: r.read_u8()? != 0 },
            TYPE_PING => Message::Ping,
            TYPE_PONG => Message::Pong,
            other => return Err(ProtocolError::UnknownType(other)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(message: Message) {
        let mut buf = Vec::new();
        message.encode(&mut buf).unwrap();
        let decoded = Message::decode(message.type_byte(), &buf).unwrap();
        assert_eq!(message, decoded);
    }

    #[test]
    fn every_message_kind_roundtrips() {
        roundtrip(Message::AuthChallenge { nonce: [9u8; 32] });
        roundtrip(Message::AuthResponse { public_key: [1u8; 32], name: "alice".into(), signature: [2u8; 64] });
        roundtrip(Message::AuthResult { code: AuthResultCode::NameTaken });
        roundtrip(Message::ServerHello {
            player_id: 1,
            width: 10,
            height: 10,
            x: 5,
            y: 5,
            grid: b"..#..".to_vec(),
            level_name: "main".into(),
        });
        roundtrip(Message::LivekitToken { url: "wss://sfu".into(), token: "abc.def.ghi".into() });
        roundtrip(Message::LevelManifestRequest { level_name: "dungeon".into() });
        roundtrip(Message::LevelManifest {
            entries: vec![ManifestEntry { filename: "level.txt".into(), hash_hex: "ab".repeat(32), size: 42 }],
        });
        roundtrip(Message::LevelFilesRequest { level_name: "dungeon".into(), filenames: vec!["level.json".into()] });
        roundtrip(Message::LevelFilesData {
            files: vec![FileEntry { filename: "level.json".into(), content: vec![1, 2, 3] }],
        });
        roundtrip(Message::PositionUpdate { seq: 7, x: 6, y: 5 });
        roundtrip(Message::PositionAck { seq: 7, x: 5, y: 5 });
        roundtrip(Message::DoorTransition { target_level: "dungeon".into(), spawn_x: 3, spawn_y: 4 });
        roundtrip(Message::WorldState {
            players: vec![PlayerRecord {
                player_id: 1,
                x: 5,
                y: 5,
                is_muted: false,
                name: "alice".into(),
                level_name: "main".into(),
                ping_ms: 30,
            }],
        });
        roundtrip(Message::PlayerJoined { player_id: 1, name: "alice".into() });
        roundtrip(Message::PlayerLeft { player_id: 1 });
        roundtrip(Message::MuteStatus { muted: true });
        roundtrip(Message::Ping);
        roundtrip(Message::Pong);
    }

    #[test]
    fn empty_manifest_is_not_an_error() {
        roundtrip(Message::LevelManifest { entries: vec![] });
    }
}
