use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::engine::{now_ms, Engine};
use crate::model::Ms;

const HOUR_MS: Ms = 3_600_000;
const DAY_MS: Ms = 24 * HOUR_MS;

/// Millis from `now` until the next `hour_utc:00`. A reset due exactly now
/// is scheduled a full day out.
pub fn ms_until_next_reset(now: Ms, hour_utc: u32) -> Ms {
    let into_day = now.rem_euclid(DAY_MS);
    let target = Ms::from(hour_utc % 24) * HOUR_MS;
    let delay = (target - into_day).rem_euclid(DAY_MS);
    if delay == 0 { DAY_MS } else { delay }
}

/// Background task that wipes the engine once a day at `hour_utc`.
pub async fn run_daily_reset(engine: Arc<Engine>, hour_utc: u32) {
    loop {
        let wait = ms_until_next_reset(now_ms(), hour_utc);
        info!("next daily reset in {}s", wait / 1000);
        tokio::time::sleep(Duration::from_millis(wait as u64)).await;
        match engine.daily_reset().await {
            Ok(()) => {
                engine.notify.prune();
                info!("daily reset complete");
            }
            Err(e) => error!("daily reset failed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::engine::EngineConfig;
    use crate::notify::NotifyHub;

    #[test]
    fn waits_until_later_today() {
        let now = 10 * HOUR_MS;
        assert_eq!(ms_until_next_reset(now, 20), 10 * HOUR_MS);
    }

    #[test]
    fn rolls_over_to_tomorrow() {
        let now = 3 * DAY_MS + 21 * HOUR_MS;
        assert_eq!(ms_until_next_reset(now, 20), 23 * HOUR_MS);
    }

    #[test]
    fn exact_hour_waits_a_full_day() {
        assert_eq!(ms_until_next_reset(20 * HOUR_MS, 20), DAY_MS);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_fires_after_delay() {
        let catalog = Arc::new(InMemoryCatalog::new());
        catalog.add_member(1, "Ada", false);
        let engine = Arc::new(Engine::new(
            catalog,
            Arc::new(NotifyHub::new()),
            EngineConfig::default(),
        ));
        engine.enter(1).await;
        assert!(engine.is_active(1));

        let task = tokio::spawn(run_daily_reset(engine.clone(), 20));
        // paused clock: sleeping a day auto-advances past the first reset
        tokio::time::sleep(Duration::from_millis(DAY_MS as u64 + 1000)).await;
        assert!(!engine.is_active(1));
        task.abort();
    }
}
