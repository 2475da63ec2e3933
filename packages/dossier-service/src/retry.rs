//! Per-call timeout and bounded retry for provider calls.

use std::{future::Future, time::Duration};

use color_eyre::{Result, eyre};
use tokio::time;

use dossier_config::Retry;

const MAX_BACKOFF_EXPONENT: u32 = 16;

/// Runs `call` until it succeeds or `max_attempts` is spent, sleeping with capped
/// exponential backoff in between. Each attempt is bounded by `call_timeout_ms`.
pub async fn with_retry<T, F, Fut>(retry: &Retry, label: &str, mut call: F) -> Result<T>
where
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<T>>,
{
	let attempts = retry.max_attempts.max(1);
	let timeout = Duration::from_millis(retry.call_timeout_ms);
	let mut last_error = None;

	for attempt in 1..=attempts {
		match time::timeout(timeout, call()).await {
			Ok(Ok(value)) => return Ok(value),
			Ok(Err(err)) => {
				tracing::warn!(call = label, attempt, error = %err, "Provider call failed.");

				last_error = Some(err);
			},
			Err(_) => {
				tracing::warn!(
					call = label,
					attempt,
					timeout_ms = retry.call_timeout_ms,
					"Provider call timed out."
				);

				last_error =
					Some(eyre::eyre!("{label} timed out after {} ms.", retry.call_timeout_ms));
			},
		}

		if attempt < attempts {
			time::sleep(backoff_for_attempt(retry, attempt)).await;
		}
	}

	Err(last_error.unwrap_or_else(|| eyre::eyre!("{label} failed.")))
}

pub fn backoff_for_attempt(retry: &Retry, attempt: u32) -> Duration {
	let exp = attempt.max(1).saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
	let base = retry.base_backoff_ms.saturating_mul(1_u64 << exp);

	Duration::from_millis(base.min(retry.max_backoff_ms))
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::{AtomicU32, Ordering};

	use super::*;

	fn retry() -> Retry {
		Retry { max_attempts: 3, base_backoff_ms: 1, max_backoff_ms: 3, call_timeout_ms: 50 }
	}

	#[test]
	fn backoff_doubles_until_capped() {
		let cfg = Retry { max_attempts: 5, base_backoff_ms: 250, max_backoff_ms: 1_000, call_timeout_ms: 1 };

		assert_eq!(backoff_for_attempt(&cfg, 1), Duration::from_millis(250));
		assert_eq!(backoff_for_attempt(&cfg, 2), Duration::from_millis(500));
		assert_eq!(backoff_for_attempt(&cfg, 3), Duration::from_millis(1_000));
		assert_eq!(backoff_for_attempt(&cfg, 40), Duration::from_millis(1_000));
	}

	#[tokio::test]
	async fn succeeds_after_transient_failures() {
		let calls = AtomicU32::new(0);
		let counter = &calls;
		let value = with_retry(&retry(), "flaky", move || async move {
			if counter.fetch_add(1, Ordering::SeqCst) < 2 {
				Err(eyre::eyre!("transient"))
			} else {
				Ok(7)
			}
		})
		.await
		.expect("Third attempt should succeed.");

		assert_eq!(value, 7);
		assert_eq!(calls.load(Ordering::SeqCst), 3);
	}

	#[tokio::test]
	async fn gives_up_after_max_attempts() {
		let calls = AtomicU32::new(0);
		let counter = &calls;
		let result: Result<()> = with_retry(&retry(), "down", move || async move {
			counter.fetch_add(1, Ordering::SeqCst);

			Err(eyre::eyre!("still down"))
		})
		.await;

		assert!(result.is_err());
		assert_eq!(calls.load(Ordering::SeqCst), 3);
	}

	#[tokio::test]
	async fn times_out_slow_calls() {
		let result: Result<()> = with_retry(&retry(), "slow", || async {
			time::sleep(Duration::from_secs(5)).await;

			Ok(())
		})
		.await;
		let err = result.expect_err("Slow call should time out.");

		assert!(err.to_string().contains("timed out"));
	}
}
