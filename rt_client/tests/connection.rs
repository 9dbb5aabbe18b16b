//! End-to-end test driving `rt_client::connection::Connection` against a
//! real `rt_server` instance (`spec.md` §8), exercising the handshake,
//! level distribution, and movement prediction/rollback together rather
//! than each module in isolation.

use rt_client::connection::Connection;
use rt_client::events::NoopEvents;
use rt_client::identity::Identity;
use rt_core::config::ServerConfig;
use rt_core::identity::IdentityRegistry;
use rt_core::level::LevelStore;
use rt_core::world::World;
use rt_server::context::ServerContext;
use rt_server::session;
use std::path::Path;
use std::sync::Arc;
use std::thread;

fn write_level(levels_dir: &Path) {
    let main_dir = levels_dir.join("main");
    std::fs::create_dir_all(&main_dir).unwrap();
    let mut rows = Vec::new();
    for y in 0..8u16 {
        let mut row = String::new();
        for x in 0..8u16 {
            if (x, y) == (2, 0) {
                row.push('#');
            } else if (x, y) == (0, 0) {
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

struct TestServer {
    addr: std::net::SocketAddr,
    _data_dir: tempfile::TempDir,
    _levels_dir: tempfile::TempDir,
}

fn spawn_server() -> TestServer {
    let levels_dir = tempfile::tempdir().unwrap();
    write_level(levels_dir.path());
    let data_dir = tempfile::tempdir().unwrap();

    let mut config = ServerConfig::default();
    config.levels_dir = levels_dir.path().to_owned();
    config.data_dir = data_dir.path().to_owned();

    let levels = Arc::new(LevelStore::load(&config.levels_dir).unwrap());
    let identity = Arc::new(IdentityRegistry::open(config.identities_path()).unwrap());
    let world = Arc::new(World::new(levels.clone()));
    let log = rt_core::logging::root_logger(rt_core::logging::LogFormat::Terminal, false);
    let ctx = Arc::new(ServerContext { config, levels, identity, world, sfu_api_secret: vec![], log });

    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let ctx = ctx.clone();
            thread::spawn(move || session::handle_connection(stream, ctx));
        }
    });

    TestServer { addr, _data_dir: data_dir, _levels_dir: levels_dir }
}

#[test]
fn connect_fetches_level_and_predicts_a_walkable_move() {
    let server = spawn_server();
    let identity_dir = tempfile::tempdir().unwrap();
    let cache_dir = tempfile::tempdir().unwrap();
    let identity = Identity::load_or_create(&identity_dir.path().join("id.json")).unwrap();

    let mut events = NoopEvents;
    let mut conn = Connection::connect(
        &server.addr.to_string(),
        &identity,
        "alice",
        cache_dir.path(),
        rt_core::wire::DEFAULT_MAX_FRAME_BYTES,
        &mut events,
    )
    .unwrap();

    assert_eq!((conn.x, conn.y), (0, 0));
    assert!(conn.level.is_walkable(1, 0));
    assert!(!conn.level.is_walkable(2, 0));

    let moved = conn.try_move_local(1, 0).unwrap();
    assert_eq!(moved, Some((1, 0)));

    // Drain the ack and subsequent world-state broadcast.
    let _ = conn.poll(&mut events).unwrap();
    let _ = conn.poll(&mut events).unwrap();
    assert_eq!((conn.x, conn.y), (1, 0));
    assert!(!conn.prediction.has_pending());
}

#[test]
fn cache_is_reused_on_a_second_connection() {
    let server = spawn_server();
    let identity_dir = tempfile::tempdir().unwrap();
    let cache_dir = tempfile::tempdir().unwrap();

    let mut events = NoopEvents;
    let identity_a = Identity::load_or_create(&identity_dir.path().join("a.json")).unwrap();
    let _conn_a = Connection::connect(
        &server.addr.to_string(),
        &identity_a,
        "alice",
        cache_dir.path(),
        rt_core::wire::DEFAULT_MAX_FRAME_BYTES,
        &mut events,
    )
    .unwrap();

    assert!(cache_dir.path().join("main").read_dir().unwrap().next().is_some());

    let identity_b = Identity::load_or_create(&identity_dir.path().join("b.json")).unwrap();
    let conn_b = Connection::connect(
        &server.addr.to_string(),
        &identity_b,
        "bob",
        cache_dir.path(),
        rt_core::wire::DEFAULT_MAX_FRAME_BYTES,
        &mut events,
    )
    .unwrap();
    assert!(conn_b.level.is_walkable(1, 0));
}
