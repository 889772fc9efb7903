//! Poll-based test synchronization.

use std::time::Duration;

use tokio::time::{Instant, sleep};

/// Poll `condition` until it holds or `timeout` elapses.
///
/// Polling is cooperative: each miss yields to the runtime with a short
/// sleep so background tasks can make progress in the meantime.
///
/// # Panics
///
/// Panics if `condition` is still false after `timeout`.
pub async fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return;
        }
        assert!(
            Instant::now() < deadline,
            "condition not met within {timeout:?}"
        );
        sleep(Duration::from_millis(2)).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[tokio::test]
    async fn returns_once_condition_holds() {
        let polls = AtomicU32::new(0);

        wait_for(Duration::from_secs(1), || {
            polls.fetch_add(1, Ordering::SeqCst) >= 3
        })
        .await;

        assert!(polls.load(Ordering::SeqCst) >= 3);
    }
}
