//! Language-model callers.
//!
//! [`LlmCaller`] is the single seam between the pipeline and a model
//! backend. [`Retrying`] adds the bounded internal retry policy on top of
//! any caller; [`rig::RigCaller`] talks to real providers through rig-core.

pub mod rig;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

pub use self::rig::RigCaller;

/// Retries made after the first call for transient failures.
pub const MAX_CALL_RETRIES: u32 = 3;
const MAX_RATE_LIMIT_BACKOFF_SECS: u64 = 30;

/// Errors from a language-model call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("model call timed out after {0} seconds")]
    Timeout(u64),

    #[error("LLM API error: {0}")]
    Api(String),

    #[error("provider not configured: {0}")]
    NotConfigured(String),
}

impl ProviderError {
    /// Sort a raw backend error message into a variant.
    pub fn from_message(msg: String) -> Self {
        let lower = msg.to_lowercase();
        if lower.contains("429") || lower.contains("rate limit") || lower.contains("too many requests")
        {
            ProviderError::RateLimited(msg)
        } else {
            ProviderError::Api(msg)
        }
    }

    /// Gateway, overload and connection failures that usually clear up.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Api(msg) => {
                let lower = msg.to_lowercase();
                [
                    "502",
                    "503",
                    "529",
                    "overloaded",
                    "service unavailable",
                    "connection",
                    "temporarily",
                    "try again",
                ]
                .iter()
                .any(|needle| lower.contains(needle))
            }
            _ => false,
        }
    }
}

/// Delay before retry number `retry` (0-based), or `None` when the error is permanent.
pub fn retry_delay(err: &ProviderError, retry: u32) -> Option<Duration> {
    match err {
        ProviderError::RateLimited(_) => Some(Duration::from_secs(
            (5 * u64::from(retry + 1)).min(MAX_RATE_LIMIT_BACKOFF_SECS),
        )),
        ProviderError::Timeout(_) => Some(Duration::from_secs(2)),
        e if e.is_transient() => Some(Duration::from_secs(1)),
        _ => None,
    }
}

/// A language-model backend.
#[async_trait]
pub trait LlmCaller: Send + Sync {
    /// Send one prompt and return the raw response text.
    async fn call(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        max_tokens: u64,
    ) -> Result<String, ProviderError>;
}

/// Wraps a caller with up to [`MAX_CALL_RETRIES`] retries for transient errors.
pub struct Retrying<C> {
    inner: C,
    max_retries: u32,
}

impl<C: LlmCaller> Retrying<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            max_retries: MAX_CALL_RETRIES,
        }
    }
}

#[async_trait]
impl<C: LlmCaller> LlmCaller for Retrying<C> {
    async fn call(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        max_tokens: u64,
    ) -> Result<String, ProviderError> {
        let mut retry = 0;
        loop {
            match self.inner.call(prompt, system_prompt, max_tokens).await {
                Ok(text) => return Ok(text),
                Err(err) => {
                    let delay = (retry < self.max_retries)
                        .then(|| retry_delay(&err, retry))
                        .flatten();
                    let Some(delay) = delay else {
                        return Err(err);
                    };
                    warn!(
                        error = %err,
                        retry = retry + 1,
                        max = self.max_retries,
                        delay_secs = delay.as_secs(),
                        "model call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    struct Scripted {
        replies: Mutex<VecDeque<Result<String, ProviderError>>>,
        calls: Mutex<u32>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<String, ProviderError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl LlmCaller for Scripted {
        async fn call(&self, _: &str, _: Option<&str>, _: u64) -> Result<String, ProviderError> {
            *self.calls.lock().unwrap() += 1;
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok("done".to_string()))
        }
    }

    #[test]
    fn classifies_rate_limits() {
        let err = ProviderError::from_message("HttpError: status 429 Too Many Requests".into());
        assert!(matches!(err, ProviderError::RateLimited(_)));
        let err = ProviderError::from_message("Invalid API key: 401 Unauthorized".into());
        assert!(matches!(err, ProviderError::Api(_)));
    }

    #[test]
    fn retry_delays_follow_policy() {
        let rate = ProviderError::RateLimited("429".into());
        assert_eq!(retry_delay(&rate, 0), Some(Duration::from_secs(5)));
        assert_eq!(retry_delay(&rate, 2), Some(Duration::from_secs(15)));
        assert_eq!(retry_delay(&rate, 9), Some(Duration::from_secs(30)));
        assert_eq!(
            retry_delay(&ProviderError::Timeout(180), 0),
            Some(Duration::from_secs(2))
        );
        let overloaded = ProviderError::Api("529 overloaded".into());
        assert_eq!(retry_delay(&overloaded, 0), Some(Duration::from_secs(1)));
        assert_eq!(retry_delay(&ProviderError::Api("401 Unauthorized".into()), 0), None);
        assert_eq!(retry_delay(&ProviderError::NotConfigured("key".into()), 0), None);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_errors_then_succeeds() {
        let caller = Retrying::new(Scripted::new(vec![
            Err(ProviderError::RateLimited("429".into())),
            Err(ProviderError::Api("502 Bad Gateway".into())),
            Ok("verdict".to_string()),
        ]));
        let text = caller.call("p", None, 10).await.unwrap();
        assert_eq!(text, "verdict");
        assert_eq!(caller.inner.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_retries() {
        let caller = Retrying::new(Scripted::new(vec![
            Err(ProviderError::Timeout(1)),
            Err(ProviderError::Timeout(1)),
            Err(ProviderError::Timeout(1)),
            Err(ProviderError::Timeout(1)),
            Ok("too late".to_string()),
        ]));
        let err = caller.call("p", None, 10).await.unwrap_err();
        assert_eq!(err, ProviderError::Timeout(1));
        assert_eq!(caller.inner.calls(), 1 + MAX_CALL_RETRIES);
    }

    #[tokio::test]
    async fn permanent_errors_fail_immediately() {
        let caller = Retrying::new(Scripted::new(vec![Err(ProviderError::Api(
            "401 Unauthorized".into(),
        ))]));
        assert!(caller.call("p", Some("sys"), 10).await.is_err());
        assert_eq!(caller.inner.calls(), 1);
    }
}
