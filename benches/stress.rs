use std::sync::Arc;
use std::time::{Duration, Instant};

use loanq::catalog::{Catalog, InMemoryCatalog};
use loanq::engine::{Engine, EngineConfig};
use loanq::notify::NotifyHub;

const BOOKS: u64 = 10;
const MEMBERS: u64 = 2_000;
const ROUNDS: usize = 5;

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    if latencies.is_empty() {
        println!("  {label}: no samples");
        return;
    }
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.3}ms, p50={:.3}ms, p95={:.3}ms, p99={:.3}ms, max={:.3}ms",
        latencies.len(),
        avg.as_secs_f64() * 1000.0,
        percentile(latencies, 50.0).as_secs_f64() * 1000.0,
        percentile(latencies, 95.0).as_secs_f64() * 1000.0,
        percentile(latencies, 99.0).as_secs_f64() * 1000.0,
        latencies.last().map_or(0.0, |d| d.as_secs_f64() * 1000.0),
    );
}

fn setup() -> (Arc<InMemoryCatalog>, Arc<Engine>) {
    let capacities = [1, 1, 1, 1, 1, 5, 5, 5, 10, 10];
    let catalog = Arc::new(InMemoryCatalog::new());
    for (i, &cap) in capacities.iter().enumerate() {
        catalog.add_book(i as u64 + 1, format!("book {i}"), cap);
    }
    for m in 1..=MEMBERS {
        catalog.add_member(m, format!("member {m}"), true);
    }
    let engine = Arc::new(Engine::new(
        catalog.clone(),
        Arc::new(NotifyHub::new()),
        EngineConfig::default(),
    ));
    (catalog, engine)
}

/// Every member asks for one book; books are contended ~200 ways each.
async fn contended_requests(engine: &Arc<Engine>) -> (Vec<Duration>, usize) {
    let mut handles = Vec::new();
    for m in 1..=MEMBERS {
        let eng = engine.clone();
        handles.push(tokio::spawn(async move {
            eng.enter(m).await;
            let book = m % BOOKS + 1;
            let start = Instant::now();
            let r = eng.request_book(m, book, None).await.expect("request failed");
            (start.elapsed(), r.success)
        }));
    }
    let mut latencies = Vec::with_capacity(handles.len());
    let mut granted = 0;
    for h in handles {
        let (d, ok) = h.await.expect("task panicked");
        latencies.push(d);
        granted += ok as usize;
    }
    (latencies, granted)
}

/// Members leave in parallel, each sweeping the queue they wait in.
async fn mass_departure(engine: &Arc<Engine>) -> Vec<Duration> {
    let mut handles = Vec::new();
    for m in 1..=MEMBERS {
        let eng = engine.clone();
        handles.push(tokio::spawn(async move {
            let start = Instant::now();
            eng.leave(m).await.expect("leave failed");
            start.elapsed()
        }));
    }
    let mut latencies = Vec::with_capacity(handles.len());
    for h in handles {
        latencies.push(h.await.expect("task panicked"));
    }
    latencies
}

#[tokio::main]
async fn main() {
    println!("loanq stress: {BOOKS} books, {MEMBERS} members, {ROUNDS} rounds");

    for round in 1..=ROUNDS {
        let (catalog, engine) = setup();
        println!("round {round}");

        let wall = Instant::now();
        let (mut req, granted) = contended_requests(&engine).await;
        println!("  requests: {granted} granted in {:.1}ms", wall.elapsed().as_secs_f64() * 1000.0);
        print_latency("request_book", &mut req);

        let mut free = 0;
        for b in 1..=BOOKS {
            free += catalog.available_copies(b).await.expect("book missing");
        }
        assert_eq!(free, 0, "all copies should be held");

        let mut leave = mass_departure(&engine).await;
        print_latency("leave", &mut leave);
        for b in 1..=BOOKS {
            assert!(engine.waitlist(b).await.is_empty());
        }
    }
}
