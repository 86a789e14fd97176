use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::Semaphore;
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};

use crate::engine::{now_ms, Engine, EngineError};
use crate::limits::MAX_LINE_LEN;
use crate::model::*;
use crate::observability::{command_label, COMMANDS_TOTAL, COMMAND_DURATION_SECONDS};

/// One request line. Tagged by `"op"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Enter {
        member_id: MemberId,
    },
    Leave {
        member_id: MemberId,
    },
    Request {
        member_id: MemberId,
        book_id: BookId,
        #[serde(default)]
        duration_secs: Option<u64>,
    },
    Return {
        reservation_id: ReservationId,
    },
    /// Without `member_id`, approves the head of the notified set.
    Approve {
        book_id: BookId,
        #[serde(default)]
        member_id: Option<MemberId>,
    },
    Notifications,
    Waitlist {
        book_id: BookId,
    },
    Overdue,
    Reset,
}

async fn execute(engine: &Engine, req: Request) -> Result<Value, EngineError> {
    match req {
        Request::Enter { member_id } => {
            engine.enter(member_id).await;
            Ok(Value::Null)
        }
        Request::Leave { member_id } => {
            engine.leave(member_id).await?;
            Ok(Value::Null)
        }
        Request::Request {
            member_id,
            book_id,
            duration_secs,
        } => {
            let resp = engine
                .request_book(member_id, book_id, duration_secs.map(Duration::from_secs))
                .await?;
            Ok(json!(resp))
        }
        Request::Return { reservation_id } => {
            let closed = engine.return_book(reservation_id).await?;
            Ok(json!({ "returned": closed }))
        }
        Request::Approve { book_id, member_id } => {
            let resp = match member_id {
                Some(m) => engine.approve_next_reader(book_id, m).await?,
                None => engine.approve_front(book_id).await?,
            };
            Ok(json!(resp))
        }
        Request::Notifications => {
            let rows: Vec<Value> = engine
                .list_notification_candidates()
                .await?
                .into_iter()
                .map(|c| {
                    json!({
                        "book_id": c.book_id,
                        "member_id": c.member_id,
                        "duration_secs": c.requested.as_secs(),
                    })
                })
                .collect();
            Ok(Value::Array(rows))
        }
        Request::Waitlist { book_id } => {
            let waiting = engine.waitlist(book_id).await;
            let notified = engine.notified(book_id).await;
            Ok(json!({ "waiting": waiting, "notified": notified }))
        }
        Request::Overdue => {
            let overdue = engine.overdue_reservations(now_ms()).await?;
            Ok(json!(overdue))
        }
        Request::Reset => {
            engine.daily_reset().await?;
            Ok(Value::Null)
        }
    }
}

fn ok_line(data: Value) -> String {
    json!({ "ok": true, "data": data }).to_string()
}

fn err_line(msg: impl std::fmt::Display) -> String {
    json!({ "ok": false, "error": msg.to_string() }).to_string()
}

/// Serve newline-delimited JSON requests until the peer hangs up.
pub async fn process_connection(socket: TcpStream, engine: Arc<Engine>) -> Result<(), LinesCodecError> {
    let mut framed = Framed::new(socket, LinesCodec::new_with_max_length(MAX_LINE_LEN));

    while let Some(line) = framed.next().await {
        let line = match line {
            Ok(line) => line,
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                framed.send(err_line("request line too long")).await?;
                continue;
            }
            Err(e) => return Err(e),
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: Request = match serde_json::from_str(&line) {
            Ok(req) => req,
            Err(e) => {
                framed.send(err_line(format!("bad request: {e}"))).await?;
                continue;
            }
        };

        let label = command_label(&req);
        let started = Instant::now();
        let reply = match execute(&engine, req).await {
            Ok(data) => {
                metrics::counter!(COMMANDS_TOTAL, "command" => label, "status" => "ok").increment(1);
                ok_line(data)
            }
            Err(e) => {
                tracing::warn!("{label} failed: {e}");
                metrics::counter!(COMMANDS_TOTAL, "command" => label, "status" => "error").increment(1);
                err_line(e)
            }
        };
        metrics::histogram!(COMMAND_DURATION_SECONDS, "command" => label)
            .record(started.elapsed().as_secs_f64());
        framed.send(reply).await?;
    }
    Ok(())
}

/// Wait until every connection permit is back, or `within` elapses.
/// On timeout, returns how many connections are still open.
pub async fn drain(semaphore: &Semaphore, max_connections: usize, within: Duration) -> Result<(), usize> {
    let all = u32::try_from(max_connections).unwrap_or(u32::MAX);
    match tokio::time::timeout(within, semaphore.acquire_many(all)).await {
        Ok(_) => Ok(()),
        Err(_) => Err(max_connections.saturating_sub(semaphore.available_permits())),
    }
}
