// crates/farm-server/tests/end_to_end.rs
//
// Drives the real server over TCP: signup/login, planting through
// maturation pushes to harvest, friendship, visiting, a steal round, and
// login eviction.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

use farm_server::config::Config;
use farm_server::server;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

struct TestClient {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
    next_id: u32,
    /// Pushes (and other uncorrelated lines) that arrived while waiting
    /// for a response.
    pending: VecDeque<Value>,
}

impl TestClient {
    async fn connect(addr: &str) -> Self {
        let stream = TcpStream::connect(addr).await.expect("connect");
        let (read_half, writer) = stream.into_split();
        TestClient {
            lines: BufReader::new(read_half).lines(),
            writer,
            next_id: 1,
            pending: VecDeque::new(),
        }
    }

    async fn read_line(&mut self) -> Option<Value> {
        let line = timeout(RECV_TIMEOUT, self.lines.next_line())
            .await
            .expect("timed out waiting for a line")
            .expect("read error")?;
        Some(serde_json::from_str(&line).expect("server sent invalid json"))
    }

    /// Send a request (injecting a fresh requestId) and wait for the
    /// matching response, buffering any pushes that arrive first.
    async fn request(&mut self, mut body: Value) -> Value {
        let rid = self.next_id.to_string();
        self.next_id += 1;
        body["requestId"] = Value::String(rid.clone());

        let mut line = body.to_string();
        line.push('\n');
        self.writer.write_all(line.as_bytes()).await.expect("write");

        loop {
            let msg = self.read_line().await.expect("connection closed mid-request");
            if msg["type"] == "RESP" && msg["requestId"] == rid.as_str() {
                return msg;
            }
            self.pending.push_back(msg);
        }
    }

    /// Next uncorrelated message (push or notice).
    async fn next_push(&mut self) -> Value {
        if let Some(msg) = self.pending.pop_front() {
            return msg;
        }
        self.read_line().await.expect("connection closed")
    }

    /// Collect pushes until one matches, discarding the rest.
    async fn await_push(&mut self, predicate: impl Fn(&Value) -> bool) -> Value {
        loop {
            let msg = self.next_push().await;
            if predicate(&msg) {
                return msg;
            }
        }
    }
}

fn test_config(data_dir: PathBuf) -> Config {
    Config {
        bind_addr: "127.0.0.1".to_string(),
        port: 0,
        max_clients: 16,
        data_dir,
        grow_ms: 200,
    }
}

async fn spawn_server() -> (String, PathBuf) {
    let data_dir =
        std::env::temp_dir().join(format!("farmstead-e2e-{}", uuid::Uuid::new_v4()));
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr").to_string();
    let config = test_config(data_dir.clone());
    tokio::spawn(async move {
        let _ = server::serve(listener, config).await;
    });
    (addr, data_dir)
}

#[tokio::test]
async fn signup_login_plant_mature_harvest() {
    let (addr, data_dir) = spawn_server().await;
    let mut alice = TestClient::connect(&addr).await;

    let resp = alice
        .request(json!({"type":"SIGNUP","username":"alice","password":"secret1"}))
        .await;
    assert_eq!(resp["ok"], true, "{resp}");

    // Duplicate signup is rejected.
    let resp = alice
        .request(json!({"type":"SIGNUP","username":"Alice","password":"other"}))
        .await;
    assert_eq!(resp["ok"], false);
    assert_eq!(resp["msg"], "player exists");

    // Wrong password is rejected.
    let resp = alice
        .request(json!({"type":"LOGIN","username":"alice","password":"nope"}))
        .await;
    assert_eq!(resp["ok"], false);
    assert_eq!(resp["msg"], "wrong password");

    let login = alice
        .request(json!({"type":"LOGIN","username":"alice","password":"secret1"}))
        .await;
    assert_eq!(login["ok"], true, "{login}");
    assert_eq!(login["coins"], 100);
    assert_eq!(login["rows"], 4);
    assert_eq!(login["cols"], 4);
    let player_id = login["playerId"].as_u64().unwrap();
    let cells = login["cells"].as_array().unwrap();
    assert_eq!(cells.len(), 16);
    assert!(cells.iter().all(|c| c == "EMPTY"));
    assert!(login["session"].is_string());

    let resp = alice
        .request(json!({"type":"PLANT","playerId":player_id,"row":0,"col":0}))
        .await;
    assert_eq!(resp["ok"], true, "{resp}");
    assert_eq!(resp["coins"], 90);
    assert_eq!(resp["plotState"], "GROWING");

    // The owner is a viewer of their own farm: the GROWING push and, after
    // the grow timer, the RIPE push both arrive here.
    let push = alice
        .await_push(|m| m["type"] == "PUSH_CELL_UPDATE" && m["plotState"] == "RIPE")
        .await;
    assert_eq!(push["playerId"].as_u64().unwrap(), player_id);
    assert_eq!(push["row"], 0);
    assert_eq!(push["col"], 0);

    let resp = alice
        .request(json!({"type":"HARVEST","playerId":player_id,"row":0,"col":0}))
        .await;
    assert_eq!(resp["ok"], true, "{resp}");
    assert_eq!(resp["coins"], 110);
    assert_eq!(resp["plotState"], "EMPTY");

    // Harvesting again fails cleanly and the connection survives.
    let resp = alice
        .request(json!({"type":"HARVEST","playerId":player_id,"row":0,"col":0}))
        .await;
    assert_eq!(resp["ok"], false);
    assert_eq!(resp["msg"], "not ripe");

    let resp = alice.request(json!({"type":"PING"})).await;
    assert_eq!(resp["msg"], "pong");

    let _ = std::fs::remove_dir_all(&data_dir);
}

#[tokio::test]
async fn requests_are_bound_to_the_logged_in_identity() {
    let (addr, data_dir) = spawn_server().await;
    let mut client = TestClient::connect(&addr).await;

    client
        .request(json!({"type":"SIGNUP","username":"carol","password":"pw"}))
        .await;

    // No login yet: mutating requests are refused.
    let resp = client
        .request(json!({"type":"PLANT","playerId":1,"row":0,"col":0}))
        .await;
    assert_eq!(resp["ok"], false);
    assert_eq!(resp["msg"], "login first");

    let login = client
        .request(json!({"type":"LOGIN","username":"carol","password":"pw"}))
        .await;
    let carol_id = login["playerId"].as_u64().unwrap();

    // A client-supplied playerId that isn't ours is refused.
    let resp = client
        .request(json!({"type":"PLANT","playerId":carol_id + 7,"row":0,"col":0}))
        .await;
    assert_eq!(resp["ok"], false);
    assert_eq!(resp["msg"], "not your session");

    // Unknown and malformed frames get error responses, connection stays up.
    let resp = client.request(json!({"type":"DANCE"})).await;
    assert_eq!(resp["ok"], false);
    assert_eq!(resp["msg"], "unknown type");

    client.writer.write_all(b"not json at all\n").await.unwrap();
    let msg = client.next_push().await;
    assert_eq!(msg["type"], "RESP");
    assert_eq!(msg["ok"], false);
    assert!(msg["requestId"].is_null());

    let resp = client.request(json!({"type":"PING"})).await;
    assert_eq!(resp["ok"], true);

    let _ = std::fs::remove_dir_all(&data_dir);
}

#[tokio::test]
async fn befriend_visit_and_steal_round() {
    let (addr, data_dir) = spawn_server().await;

    let mut alice = TestClient::connect(&addr).await;
    alice
        .request(json!({"type":"SIGNUP","username":"alice","password":"pw"}))
        .await;
    let login = alice
        .request(json!({"type":"LOGIN","username":"alice","password":"pw"}))
        .await;
    let alice_id = login["playerId"].as_u64().unwrap();

    let mut bob = TestClient::connect(&addr).await;
    bob.request(json!({"type":"SIGNUP","username":"bob","password":"pw"}))
        .await;
    let login = bob
        .request(json!({"type":"LOGIN","username":"bob","password":"pw"}))
        .await;
    let bob_id = login["playerId"].as_u64().unwrap();

    // Visiting before friendship is refused.
    let resp = bob
        .request(json!({"type":"VISIT_FARM","playerId":bob_id,"targetId":alice_id}))
        .await;
    assert_eq!(resp["ok"], false);
    assert_eq!(resp["msg"], "not friends");

    let resp = bob
        .request(json!({"type":"ADD_FRIEND","playerId":bob_id,"targetId":alice_id}))
        .await;
    assert_eq!(resp["ok"], true, "{resp}");
    assert_eq!(resp["friendName"], "alice");

    let resp = bob
        .request(json!({"type":"ADD_FRIEND","playerId":bob_id,"targetId":alice_id}))
        .await;
    assert_eq!(resp["msg"], "already friends");

    // Symmetry: alice sees bob in her list.
    let resp = alice
        .request(json!({"type":"LIST_FRIENDS","playerId":alice_id}))
        .await;
    let friends = resp["friends"].as_array().unwrap();
    assert_eq!(friends.len(), 1);
    assert_eq!(friends[0]["name"], "bob");

    // Bob watches alice's farm while she plants: he receives her pushes.
    let resp = bob
        .request(json!({"type":"VISIT_FARM","playerId":bob_id,"targetId":alice_id}))
        .await;
    assert_eq!(resp["ok"], true, "{resp}");
    assert_eq!(resp["ownerOnline"], true);
    assert_eq!(resp["canSteal"], false);
    assert_eq!(resp["targetName"], "alice");

    for col in 0..4 {
        let resp = alice
            .request(json!({"type":"PLANT","playerId":alice_id,"row":0,"col":col}))
            .await;
        assert_eq!(resp["ok"], true, "{resp}");
    }

    // Bob sees alice's plots ripen.
    for _ in 0..4 {
        let push = bob
            .await_push(|m| m["type"] == "PUSH_CELL_UPDATE" && m["plotState"] == "RIPE")
            .await;
        assert_eq!(push["playerId"].as_u64().unwrap(), alice_id);
    }

    // Stealing while the owner is online is refused.
    let resp = bob
        .request(json!({"type":"STEAL","playerId":bob_id,"targetId":alice_id,"row":0,"col":0}))
        .await;
    assert_eq!(resp["ok"], false);
    assert_eq!(resp["msg"], "owner online, cannot steal");

    // Alice goes offline; her teardown races our next request slightly.
    drop(alice);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let resp = bob
        .request(json!({"type":"VISIT_FARM","playerId":bob_id,"targetId":alice_id}))
        .await;
    assert_eq!(resp["ownerOnline"], false);
    assert_eq!(resp["canSteal"], true);
    let ripe = resp["cells"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|c| *c == "RIPE")
        .count();
    assert_eq!(ripe, 4);

    // Self-theft is refused regardless of state.
    let resp = bob
        .request(json!({"type":"STEAL","playerId":bob_id,"targetId":bob_id,"row":0,"col":0}))
        .await;
    assert_eq!(resp["msg"], "cannot steal from yourself");

    // One steal allowed: floor(4 / 4) = 1. Alice planted 4 at 10 each,
    // so her 60 coins drop to 40; bob's 100 rise to 120.
    let resp = bob
        .request(json!({"type":"STEAL","playerId":bob_id,"targetId":alice_id,"row":0,"col":0}))
        .await;
    assert_eq!(resp["ok"], true, "{resp}");
    assert_eq!(resp["coins"], 120);
    assert_eq!(resp["ownerCoins"], 40);
    assert_eq!(resp["plotState"], "EMPTY");
    assert_eq!(resp["canSteal"], false);

    // The farm is now below the four-ripe threshold, so the round is over.
    let resp = bob
        .request(json!({"type":"STEAL","playerId":bob_id,"targetId":alice_id,"row":0,"col":1}))
        .await;
    assert_eq!(resp["ok"], false);
    assert_eq!(resp["msg"], "not enough ripe plots to steal (need at least 4)");

    let _ = std::fs::remove_dir_all(&data_dir);
}

#[tokio::test]
async fn relogin_evicts_the_previous_connection() {
    let (addr, data_dir) = spawn_server().await;

    let mut first = TestClient::connect(&addr).await;
    first
        .request(json!({"type":"SIGNUP","username":"dana","password":"pw"}))
        .await;
    first
        .request(json!({"type":"LOGIN","username":"dana","password":"pw"}))
        .await;

    let mut second = TestClient::connect(&addr).await;
    let login = second
        .request(json!({"type":"LOGIN","username":"dana","password":"pw"}))
        .await;
    assert_eq!(login["ok"], true);
    let dana_id = login["playerId"].as_u64().unwrap();

    // The first connection gets the relogin notice, then the stream ends.
    let notice = first
        .await_push(|m| m["type"] == "INFO")
        .await;
    assert_eq!(notice["msg"], "relogin");
    assert!(first.read_line().await.is_none());

    // The second connection owns the session.
    let resp = second
        .request(json!({"type":"PLANT","playerId":dana_id,"row":2,"col":2}))
        .await;
    assert_eq!(resp["ok"], true, "{resp}");

    let _ = std::fs::remove_dir_all(&data_dir);
}
