use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};

use loanq::catalog::InMemoryCatalog;
use loanq::engine::{Engine, EngineConfig};
use loanq::notify::NotifyHub;
use loanq::wire;

// ── Test infrastructure ──────────────────────────────────────

async fn start_test_server(catalog: Arc<InMemoryCatalog>) -> (SocketAddr, Arc<Engine>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let engine = Arc::new(Engine::new(catalog, Arc::new(NotifyHub::new()), EngineConfig::default()));

    let eng = engine.clone();
    tokio::spawn(async move {
        loop {
            let (socket, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => break,
            };
            let eng = eng.clone();
            tokio::spawn(async move {
                let _ = wire::process_connection(socket, eng).await;
            });
        }
    });

    (addr, engine)
}

struct Client {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Client {
    async fn connect(addr: SocketAddr) -> Self {
        let (r, w) = TcpStream::connect(addr).await.unwrap().into_split();
        Self {
            reader: BufReader::new(r),
            writer: w,
        }
    }

    async fn send_raw(&mut self, line: &str) -> Value {
        self.writer.write_all(line.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
        let mut reply = String::new();
        tokio::time::timeout(Duration::from_secs(5), self.reader.read_line(&mut reply))
            .await
            .expect("reply timed out")
            .unwrap();
        serde_json::from_str(&reply).unwrap()
    }

    async fn call(&mut self, req: Value) -> Value {
        self.send_raw(&req.to_string()).await
    }
}

fn library() -> Arc<InMemoryCatalog> {
    let catalog = Arc::new(InMemoryCatalog::new());
    catalog.add_book(1, "Dune", 1);
    catalog.add_member(1, "Ada", false);
    catalog.add_member(2, "Bob", false);
    catalog
}

// ── Tests ────────────────────────────────────────────────────

#[tokio::test]
async fn borrow_queue_return_approve_over_tcp() {
    let (addr, _engine) = start_test_server(library()).await;
    let mut c = Client::connect(addr).await;

    assert_eq!(c.call(json!({"op": "enter", "member_id": 1})).await["ok"], true);
    assert_eq!(c.call(json!({"op": "enter", "member_id": 2})).await["ok"], true);

    let r = c.call(json!({"op": "request", "member_id": 1, "book_id": 1})).await;
    assert_eq!(r["data"]["success"], true);
    let reservation = r["data"]["reservation_id"].as_u64().unwrap();

    let r = c
        .call(json!({"op": "request", "member_id": 2, "book_id": 1, "duration_secs": 7200}))
        .await;
    assert_eq!(r["data"]["success"], false);
    assert_eq!(r["data"]["rank"], 1);

    let n = c.call(json!({"op": "notifications"})).await;
    assert_eq!(n["data"], json!([]));

    let r = c.call(json!({"op": "return", "reservation_id": reservation})).await;
    assert_eq!(r["data"]["returned"], true);

    let n = c.call(json!({"op": "notifications"})).await;
    assert_eq!(
        n["data"],
        json!([{"book_id": 1, "member_id": 2, "duration_secs": 7200}])
    );

    let a = c.call(json!({"op": "approve", "book_id": 1})).await;
    assert_eq!(a["data"]["success"], true);

    let w = c.call(json!({"op": "waitlist", "book_id": 1})).await;
    assert_eq!(w["data"], json!({"waiting": [], "notified": []}));
}

#[tokio::test]
async fn absent_member_gets_structured_failure() {
    let (addr, _engine) = start_test_server(library()).await;
    let mut c = Client::connect(addr).await;

    let r = c.call(json!({"op": "request", "member_id": 1, "book_id": 1})).await;
    assert_eq!(r["ok"], true);
    assert_eq!(r["data"]["success"], false);
    assert!(r["data"].get("rank").is_none());
}

#[tokio::test]
async fn engine_errors_and_bad_lines_keep_connection_open() {
    let (addr, _engine) = start_test_server(library()).await;
    let mut c = Client::connect(addr).await;

    let r = c.send_raw("this is not json").await;
    assert_eq!(r["ok"], false);
    assert!(r["error"].as_str().unwrap().contains("bad request"));

    let r = c.call(json!({"op": "return", "reservation_id": 404})).await;
    assert_eq!(r["ok"], false);
    assert_eq!(r["error"], "reservation not found: 404");

    // still usable
    let r = c.call(json!({"op": "enter", "member_id": 1})).await;
    assert_eq!(r["ok"], true);
}

#[tokio::test]
async fn leave_and_reset_over_tcp() {
    let (addr, engine) = start_test_server(library()).await;
    let mut c = Client::connect(addr).await;

    c.call(json!({"op": "enter", "member_id": 1})).await;
    c.call(json!({"op": "enter", "member_id": 2})).await;
    c.call(json!({"op": "request", "member_id": 1, "book_id": 1})).await;
    c.call(json!({"op": "request", "member_id": 2, "book_id": 1})).await;

    c.call(json!({"op": "leave", "member_id": 2})).await;
    assert!(engine.waitlist(1).await.is_empty());
    assert!(!engine.is_active(2));

    let r = c.call(json!({"op": "reset"})).await;
    assert_eq!(r["ok"], true);
    assert!(!engine.is_active(1));

    let r = c.call(json!({"op": "overdue"})).await;
    assert_eq!(r["data"], json!([]));
}

#[tokio::test]
async fn concurrent_clients_share_one_copy() {
    let catalog = Arc::new(InMemoryCatalog::new());
    catalog.add_book(1, "Dune", 1);
    for m in 1..=8 {
        catalog.add_member(m, "reader", true);
    }
    let (addr, engine) = start_test_server(catalog).await;

    let mut handles = Vec::new();
    for m in 1..=8u64 {
        handles.push(tokio::spawn(async move {
            let mut c = Client::connect(addr).await;
            c.call(json!({"op": "enter", "member_id": m})).await;
            c.call(json!({"op": "request", "member_id": m, "book_id": 1})).await
        }));
    }
    let mut granted = 0;
    for h in handles {
        if h.await.unwrap()["data"]["success"] == true {
            granted += 1;
        }
    }
    assert_eq!(granted, 1);
    assert_eq!(engine.waitlist(1).await.len(), 7);
}
