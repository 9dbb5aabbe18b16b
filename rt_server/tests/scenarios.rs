//! End-to-end scenario tests driving a real `TcpListener` (`spec.md` §8):
//! handshake, name-taken rejection, rejected move, same-level teleporter,
//! cross-level door, and cached level distribution.

use rt_core::config::ServerConfig;
use rt_core::crypto;
use rt_core::identity::IdentityRegistry;
use rt_core::level::LevelStore;
use rt_core::wire::{self, AuthResultCode, Message};
use rt_core::world::World;
use rt_server::context::ServerContext;
use rt_server::session;
use std::io::BufReader;
use std::net::{TcpListener, TcpStream};
use std::path::Path;
use std::sync::Arc;
use std::thread;

/// A 12x12 open floor with a wall at (6,5) and a same-level teleporter door
/// at (10,10) -> (2,2). The spawn tile `S` sits at (9,9), diagonally
/// adjacent to the door, so a single `POSITION_UPDATE` exercises the door
/// without an intermediate multi-step walk.
fn write_main_level(levels_dir: &Path) {
    let main_dir = levels_dir.join("main");
    std::fs::create_dir_all(&main_dir).unwrap();
    let mut rows = Vec::new();
    for y in 0..12u16 {
        let mut row = String::new();
        for x in 0..12u16 {
            if (x, y) == (6, 5) {
                row.push('#');
            } else if (x, y) == (10, 10) {
                row.push('D');
            } else if (x, y) == (9, 9) {
                row.push('S');
            } else {
                row.push('.');
            }
        }
        rows.push(row);
    }
    std::fs::write(main_dir.join("level.txt"), rows.join("\n") + "\n").unwrap();
    std::fs::write(
        main_dir.join("tiles.json"),
        r#"{"tiles": {"#": {"walkable": false}, ".": {"walkable": true}, "S": {"walkable": true, "is_spawn": true}, "D": {"walkable": true, "is_door": true}}, "default": {"walkable": false}}"#,
    )
    .unwrap();
    std::fs::write(
        main_dir.join("level.json"),
        r#"{"doors": {"10,10": {"target_level": null, "target_x": 2, "target_y": 2}}, "streams": {}}"#,
    )
    .unwrap();
}

/// Same wall layout as `write_main_level`, but the spawn tile sits right
/// next to the wall at (6,5) so a single move exercises rejection without a
/// multi-step walk.
fn write_main_level_spawn_near_wall(levels_dir: &Path) {
    let main_dir = levels_dir.join("main");
    std::fs::create_dir_all(&main_dir).unwrap();
    let mut rows = Vec::new();
    for y in 0..12u16 {
        let mut row = String::new();
        for x in 0..12u16 {
            if (x, y) == (6, 5) {
                row.push('#');
            } else if (x, y) == (5, 5) {
                row.push('S');
            } else {
                row.push('.');
            }
        }
        rows.push(row);
    }
    std::fs::write(main_dir.join("level.txt"), rows.join("\n") + "\n").unwrap();
    std::fs::write(
        main_dir.join("tiles.json"),
        r#"{"tiles": {"#": {"walkable": false}, ".": {"walkable": true}, "S": {"walkable": true, "is_spawn": true}}, "default": {"walkable": false}}"#,
    )
    .unwrap();
    std::fs::write(main_dir.join("level.json"), r#"{"doors": {}, "streams": {}}"#).unwrap();
}

/// Same shape as `write_main_level`, but the door at (10,10) leads to a
/// separate `dungeon` level instead of teleporting within `main`.
fn write_main_level_with_cross_level_door(levels_dir: &Path) {
    let main_dir = levels_dir.join("main");
    std::fs::create_dir_all(&main_dir).unwrap();
    let mut rows = Vec::new();
    for y in 0..12u16 {
        let mut row = String::new();
        for x in 0..12u16 {
            if (x, y) == (10, 10) {
                row.push('D');
            } else if (x, y) == (9, 9) {
                row.push('S');
            } else {
                row.push('.');
            }
        }
        rows.push(row);
    }
    std::fs::write(main_dir.join("level.txt"), rows.join("\n") + "\n").unwrap();
    std::fs::write(
        main_dir.join("tiles.json"),
        r#"{"tiles": {".": {"walkable": true}, "S": {"walkable": true, "is_spawn": true}, "D": {"walkable": true, "is_door": true}}, "default": {"walkable": false}}"#,
    )
    .unwrap();
    std::fs::write(
        main_dir.join("level.json"),
        r#"{"doors": {"10,10": {"target_level": "dungeon", "target_x": 3, "target_y": 4}}, "streams": {}}"#,
    )
    .unwrap();

    let dungeon_dir = levels_dir.join("dungeon");
    std::fs::create_dir_all(&dungeon_dir).unwrap();
    std::fs::write(dungeon_dir.join("level.txt"), "........\n........\n........\n........\n........\n").unwrap();
    std::fs::write(
        dungeon_dir.join("tiles.json"),
        r#"{"tiles": {".": {"walkable": true}}, "default": {"walkable": false}}"#,
    )
    .unwrap();
    std::fs::write(dungeon_dir.join("level.json"), r#"{"doors": {}, "streams": {}}"#).unwrap();
}

struct TestServer {
    addr: std::net::SocketAddr,
    _data_dir: tempfile::TempDir,
    _levels_dir: tempfile::TempDir,
}

fn spawn_server(write_levels: impl FnOnce(&Path)) -> TestServer {
    let levels_dir = tempfile::tempdir().unwrap();
    write_levels(levels_dir.path());
    let data_dir = tempfile::tempdir().unwrap();

    let mut config = ServerConfig::default();
    config.levels_dir = levels_dir.path().to_owned();
    config.data_dir = data_dir.path().to_owned();

    let levels = Arc::new(LevelStore::load(&config.levels_dir).unwrap());
    let identity = Arc::new(IdentityRegistry::open(config.identities_path()).unwrap());
    let world = Arc::new(World::new(levels.clone()));
    let log = rt_core::logging::root_logger(rt_core::logging::LogFormat::Terminal, false);
    let ctx = Arc::new(ServerContext { config, levels, identity, world, sfu_api_secret: vec![], log });

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let ctx = ctx.clone();
            thread::spawn(move || session::handle_connection(stream, ctx));
        }
    });

    TestServer { addr, _data_dir: data_dir, _levels_dir: levels_dir }
}

fn connect(addr: std::net::SocketAddr) -> (BufReader<TcpStream>, TcpStream) {
    let stream = TcpStream::connect(addr).unwrap();
    let reader = BufReader::new(stream.try_clone().unwrap());
    (reader, stream)
}

fn read_msg(reader: &mut BufReader<TcpStream>) -> Message {
    wire::read_message(reader, wire::DEFAULT_MAX_FRAME_BYTES).unwrap()
}

fn write_msg(stream: &mut TcpStream, msg: &Message) {
    wire::write_message(stream, msg).unwrap();
}

fn do_handshake(
    reader: &mut BufReader<TcpStream>,
    stream: &mut TcpStream,
    name: &str,
) -> ([u8; 32], [u8; 64]) {
    let (public_key, secret_key) = crypto::generate_keypair();
    let challenge = read_msg(reader);
    let Message::AuthChallenge { nonce } = challenge else { panic!("expected AUTH_CHALLENGE") };

    let mut message = Vec::new();
    message.extend_from_slice(&nonce);
    message.extend_from_slice(name.as_bytes());
    let signature = crypto::sign(&message, &secret_key);

    write_msg(stream, &Message::AuthResponse { public_key, name: name.to_owned(), signature });
    (public_key, signature)
}

#[test]
fn handshake_new_player_succeeds_and_assigns_player_id() {
    let server = spawn_server(write_main_level);
    let (mut reader, mut stream) = connect(server.addr);
    do_handshake(&mut reader, &mut stream, "alice");

    let result = read_msg(&mut reader);
    assert_eq!(result, Message::AuthResult { code: AuthResultCode::Success });

    let hello = read_msg(&mut reader);
    let Message::ServerHello { player_id, level_name, .. } = hello else { panic!("expected SERVER_HELLO") };
    assert_eq!(player_id, 1);
    assert_eq!(level_name, "main");

    let token = read_msg(&mut reader);
    assert!(matches!(token, Message::LivekitToken { .. }));
}

#[test]
fn second_player_with_same_name_different_key_is_rejected_name_taken() {
    let server = spawn_server(write_main_level);

    let (mut reader_a, mut stream_a) = connect(server.addr);
    do_handshake(&mut reader_a, &mut stream_a, "alice");
    assert_eq!(read_msg(&mut reader_a), Message::AuthResult { code: AuthResultCode::Success });

    let (mut reader_b, mut stream_b) = connect(server.addr);
    do_handshake(&mut reader_b, &mut stream_b, "alice");
    assert_eq!(read_msg(&mut reader_b), Message::AuthResult { code: AuthResultCode::NameTaken });
}

#[test]
fn move_onto_wall_is_rejected_and_ack_reflects_old_position() {
    let server = spawn_server(write_main_level_spawn_near_wall);
    let (mut reader, mut stream) = connect(server.addr);
    do_handshake(&mut reader, &mut stream, "alice");
    assert_eq!(read_msg(&mut reader), Message::AuthResult { code: AuthResultCode::Success });
    let hello = read_msg(&mut reader);
    let Message::ServerHello { x, y, .. } = hello else { panic!() };
    assert_eq!((x, y), (5, 5));
    let _ = read_msg(&mut reader); // LIVEKIT_TOKEN
    let _ = read_msg(&mut reader); // WORLD_STATE (self-join broadcast)

    write_msg(&mut stream, &Message::PositionUpdate { seq: 7, x: 6, y: 5 });
    let ack = read_msg(&mut reader);
    assert_eq!(ack, Message::PositionAck { seq: 7, x: 5, y: 5 });
}

#[test]
fn teleporter_door_acks_at_target_with_no_door_transition() {
    let server = spawn_server(write_main_level);
    let (mut reader, mut stream) = connect(server.addr);
    do_handshake(&mut reader, &mut stream, "alice");
    assert_eq!(read_msg(&mut reader), Message::AuthResult { code: AuthResultCode::Success });
    let hello = read_msg(&mut reader);
    let Message::ServerHello { x, y, .. } = hello else { panic!() };
    assert_eq!((x, y), (9, 9));
    let _token = read_msg(&mut reader);
    let _ws = read_msg(&mut reader);

    // Spawn sits diagonally adjacent to the door; one move steps onto it.
    write_msg(&mut stream, &Message::PositionUpdate { seq: 2, x: 10, y: 10 });
    let ack = read_msg(&mut reader);
    assert_eq!(ack, Message::PositionAck { seq: 2, x: 2, y: 2 });
    let world_state = read_msg(&mut reader);
    match world_state {
        Message::WorldState { players } => {
            let me = players.iter().find(|p| p.name == "alice").unwrap();
            assert_eq!((me.x, me.y), (2, 2));
            assert_eq!(me.level_name, "main");
        }
        other => panic!("expected WORLD_STATE, got {other:?}"),
    }
}

#[test]
fn cross_level_door_sends_transition_then_ack() {
    let server = spawn_server(write_main_level_with_cross_level_door);
    let (mut reader, mut stream) = connect(server.addr);
    do_handshake(&mut reader, &mut stream, "alice");
    assert_eq!(read_msg(&mut reader), Message::AuthResult { code: AuthResultCode::Success });
    let hello = read_msg(&mut reader);
    let Message::ServerHello { x, y, .. } = hello else { panic!() };
    assert_eq!((x, y), (9, 9));
    let _token = read_msg(&mut reader);
    let _ws = read_msg(&mut reader);

    write_msg(&mut stream, &Message::PositionUpdate { seq: 2, x: 10, y: 10 });
    let transition = read_msg(&mut reader);
    assert_eq!(
        transition,
        Message::DoorTransition { target_level: "dungeon".into(), spawn_x: 3, spawn_y: 4 }
    );
    let ack = read_msg(&mut reader);
    assert_eq!(ack, Message::PositionAck { seq: 2, x: 3, y: 4 });

    let world_state = read_msg(&mut reader);
    match world_state {
        Message::WorldState { players } => {
            let me = players.iter().find(|p| p.name == "alice").unwrap();
            assert_eq!((me.x, me.y), (3, 4));
            assert_eq!(me.level_name, "dungeon");
        }
        other => panic!("expected WORLD_STATE, got {other:?}"),
    }
}

#[test]
fn level_distribution_returns_only_requested_files_with_matching_hashes() {
    let server = spawn_server(write_main_level);
    let (mut reader, mut stream) = connect(server.addr);
    do_handshake(&mut reader, &mut stream, "alice");
    assert_eq!(read_msg(&mut reader), Message::AuthResult { code: AuthResultCode::Success });
    let _hello = read_msg(&mut reader);
    let _token = read_msg(&mut reader);
    let _ws = read_msg(&mut reader);

    write_msg(&mut stream, &Message::LevelManifestRequest { level_name: "main".into() });
    let manifest = read_msg(&mut reader);
    let Message::LevelManifest { entries } = manifest else { panic!("expected LEVEL_MANIFEST") };
    assert!(entries.iter().any(|e| e.filename == "level.json"));

    write_msg(
        &mut stream,
        &Message::LevelFilesRequest { level_name: "main".into(), filenames: vec!["level.json".into()] },
    );
    let files = read_msg(&mut reader);
    let Message::LevelFilesData { files } = files else { panic!("expected LEVEL_FILES_DATA") };
    assert_eq!(files.len(), 1);
    let entry = entries.iter().find(|e| e.filename == "level.json").unwrap();
    use sha2::{Digest, Sha256};
    assert_eq!(hex::encode(Sha256::digest(&files[0].content)), entry.hash_hex);
}

#[test]
fn unknown_level_manifest_request_yields_empty_manifest_not_an_error() {
    let server = spawn_server(write_main_level);
    let (mut reader, mut stream) = connect(server.addr);
    do_handshake(&mut reader, &mut stream, "alice");
    assert_eq!(read_msg(&mut reader), Message::AuthResult { code: AuthResultCode::Success });
    let _hello = read_msg(&mut reader);
    let _token = read_msg(&mut reader);
    let _ws = read_msg(&mut reader);

    write_msg(&mut stream, &Message::LevelManifestRequest { level_name: "nonexistent".into() });
    let manifest = read_msg(&mut reader);
    assert_eq!(manifest, Message::LevelManifest { entries: vec![] });
}
