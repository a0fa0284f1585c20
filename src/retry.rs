use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use log::warn;
use tokio::time::sleep;

const MAX_ATTEMPTS: u32 = 3;
const INITIAL_DELAY: Duration = Duration::from_secs(4);
const MAX_DELAY: Duration = Duration::from_secs(10);

/// Run `f` up to three times with exponential backoff between attempts.
/// The final error is returned to the caller; intermediate failures are logged.
pub async fn with_retry<F, Fut, T>(what: &str, mut f: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut delay = INITIAL_DELAY;

    for attempt in 1..=MAX_ATTEMPTS {
        match f().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if attempt == MAX_ATTEMPTS {
                    return Err(e);
                }
                warn!("{what}: attempt {attempt} failed: {e:#}, retrying in {delay:?}");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }

    unreachable!()
}
