//! End-to-End: two workers share trigger dispatch round-robin (spec §4.I,
//! §8 scenario: two-worker round-robin fairness).

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use webrocket_core::Context;
use webrocket_storage::SledStorage;

struct Harness {
    backend_addr: std::net::SocketAddr,
    state: server::AppState,
    _tmp: tempfile::TempDir,
}

async fn spawn_server() -> Harness {
    let tmp = tempfile::tempdir().unwrap();
    let storage: Arc<dyn webrocket_core::Storage> = Arc::new(SledStorage::open(tmp.path()).unwrap());
    let context = Arc::new(Context::bootstrap(storage).unwrap());
    context.add_vhost("/test").unwrap();
    let state = server::AppState::new(context);

    let backend_listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let backend_addr = backend_listener.local_addr().unwrap();
    let accept_state = state.clone();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = backend_listener.accept().await else {
                break;
            };
            let state = accept_state.clone();
            tokio::spawn(server::backend_conn::handle_connection(stream, state));
        }
    });

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    Harness {
        backend_addr,
        state,
        _tmp: tmp,
    }
}

async fn connect_worker(harness: &Harness, worker_id: &str) -> (BufReader<tokio::net::tcp::OwnedReadHalf>, tokio::net::tcp::OwnedWriteHalf) {
    let access_token = harness.state.context.vhost("/test").unwrap().access_token();
    let stream = TcpStream::connect(harness.backend_addr).await.unwrap();
    let (read_half, mut write_half) = stream.into_split();
    let identity = format!("dlr:/test:{access_token}:{worker_id}");
    let message = format!("{identity}\n\nRD\n\n\r\n\r\n");
    write_half.write_all(message.as_bytes()).await.unwrap();
    (BufReader::new(read_half), write_half)
}

async fn read_trigger(reader: &mut BufReader<tokio::net::tcp::OwnedReadHalf>) -> serde_json::Value {
    let mut lines = Vec::new();
    loop {
        let mut raw = String::new();
        let n = reader.read_line(&mut raw).await.unwrap();
        assert!(n > 0, "connection closed before a full message arrived");
        if raw == "\r\n" {
            let mut raw2 = String::new();
            reader.read_line(&mut raw2).await.unwrap();
            break;
        }
        lines.push(raw.strip_suffix('\n').unwrap_or(&raw).to_owned());
    }
    assert_eq!(lines[0], "TR");
    serde_json::from_str(&lines[1]).unwrap()
}

#[tokio::test]
async fn two_workers_receive_triggers_in_round_robin_order() {
    let harness = spawn_server().await;
    let (mut reader_a, _writer_a) = connect_worker(&harness, "550e8400-e29b-41d4-a716-446655440000").await;
    let (mut reader_b, _writer_b) = connect_worker(&harness, "660e8400-e29b-41d4-a716-446655440001").await;
    tokio::time::sleep(std::time::Duration::from_millis(30)).await;

    // Drive four triggers straight through the same `Lobby` the two workers
    // just registered with (bypassing the frontend, since round-robin
    // fairness is a `Lobby` property, not a frontend one) and expect them to
    // land worker-a, worker-b, worker-a, worker-b in order.
    let lobby = harness.state.lobbies.lobby("/test").expect("lobby must exist for a bootstrapped vhost");
    for i in 0..4 {
        lobby.trigger(serde_json::json!({"n": i}));
    }

    let first = read_trigger(&mut reader_a).await;
    let second = read_trigger(&mut reader_b).await;
    let third = read_trigger(&mut reader_a).await;
    let fourth = read_trigger(&mut reader_b).await;

    assert_eq!(first["n"], 0);
    assert_eq!(second["n"], 1);
    assert_eq!(third["n"], 2);
    assert_eq!(fourth["n"], 3);
}
