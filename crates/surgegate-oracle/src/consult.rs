//! Bounded retries around a single oracle consultation.

use std::time::Duration;

use tracing::{error, info, warn};

use surgegate_core::{DecisionSource, OracleConfig};

use crate::client::DecisionOracle;
use crate::error::{OracleError, OracleResult};
use crate::extract::{RawDecision, extract_decision, extract_intent};
use crate::prompt::OracleRequest;

/// Attempt budget for one consultation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub attempts: u32,
    /// Sub-timeout applied to each attempt individually.
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &OracleConfig) -> Self {
        Self {
            attempts: config.max_retries.max(1),
            attempt_timeout: config.attempt_timeout(),
        }
    }
}

/// A decoded, not yet validated, oracle answer.
#[derive(Debug, Clone, PartialEq)]
pub struct OracleVerdict {
    pub raw: RawDecision,
    pub source: DecisionSource,
    /// Attempt number that produced the answer (1-based).
    pub attempt: u32,
}

/// Ask the oracle, retrying on timeout, transport failure and unparseable
/// output.
///
/// Only the final attempt falls back to intent extraction. When every
/// attempt fails the result is [`OracleError::Exhausted`] and the caller
/// makes no change. An attempt that times out is dropped, so nothing it
/// was doing survives.
pub async fn consult(
    oracle: &dyn DecisionOracle,
    request: &OracleRequest,
    policy: &RetryPolicy,
) -> OracleResult<OracleVerdict> {
    let attempts = policy.attempts.max(1);
    let mut last = OracleError::Exhausted {
        attempts: 0,
        last: "not attempted".to_string(),
    };

    for attempt in 1..=attempts {
        let outcome = tokio::time::timeout(policy.attempt_timeout, oracle.generate(request)).await;
        let text = match outcome {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                warn!(
                    tenant = %request.tenant,
                    resource = %request.resource,
                    attempt,
                    error = %e,
                    "oracle attempt failed"
                );
                last = e;
                continue;
            }
            Err(_) => {
                warn!(
                    tenant = %request.tenant,
                    resource = %request.resource,
                    attempt,
                    timeout = ?policy.attempt_timeout,
                    "oracle attempt timed out"
                );
                last = OracleError::Timeout(policy.attempt_timeout);
                continue;
            }
        };

        if let Some(raw) = extract_decision(&text) {
            info!(
                tenant = %request.tenant,
                resource = %request.resource,
                attempt,
                action = %raw.action,
                confidence = raw.confidence.unwrap_or_default(),
                "oracle decision parsed"
            );
            return Ok(OracleVerdict {
                raw,
                source: DecisionSource::Oracle,
                attempt,
            });
        }

        let snippet: String = text.chars().take(200).collect();
        warn!(
            tenant = %request.tenant,
            resource = %request.resource,
            attempt,
            raw_response = %snippet,
            "oracle output had no decision object"
        );

        if attempt == attempts {
            if let Some(raw) = extract_intent(&text, request.current_rps, request.scenario) {
                warn!(
                    tenant = %request.tenant,
                    resource = %request.resource,
                    action = %raw.action,
                    "using intent extracted from oracle prose"
                );
                return Ok(OracleVerdict {
                    raw,
                    source: DecisionSource::IntentExtracted,
                    attempt,
                });
            }
        }
        last = OracleError::Malformed(snippet);
    }

    error!(
        tenant = %request.tenant,
        resource = %request.resource,
        attempts,
        last_error = %last,
        "oracle consultation failed"
    );
    Err(OracleError::Exhausted {
        attempts,
        last: last.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::OracleFuture;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use surgegate_core::{PairKey, Policy, TenantTier};

    /// Replays a fixed list of replies; `None` entries hang forever.
    struct Scripted {
        replies: Mutex<VecDeque<Option<OracleResult<String>>>>,
        calls: Mutex<u32>,
    }

    impl Scripted {
        fn new(replies: Vec<Option<OracleResult<String>>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock()
        }
    }

    impl DecisionOracle for Scripted {
        fn generate<'a>(&'a self, _request: &'a OracleRequest) -> OracleFuture<'a> {
            *self.calls.lock() += 1;
            let next = self.replies.lock().pop_front().flatten();
            Box::pin(async move {
                match next {
                    Some(reply) => reply,
                    None => std::future::pending().await,
                }
            })
        }
    }

    fn request() -> OracleRequest {
        OracleRequest::new(
            &PairKey::new(TenantTier::Free, "/api/v1/resourceA"),
            Policy { rps: 10.0, burst: 30 },
            9.0,
            0.5,
            0.01,
        )
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            attempts: 2,
            attempt_timeout: Duration::from_millis(50),
        }
    }

    #[test]
    fn retry_policy_splits_timeout() {
        let config = OracleConfig {
            timeout_secs: 12.0,
            max_retries: 2,
            ..OracleConfig::default()
        };
        let policy = RetryPolicy::from_config(&config);
        assert_eq!(policy.attempts, 2);
        assert_eq!(policy.attempt_timeout, Duration::from_secs(6));
    }

    #[tokio::test]
    async fn first_good_answer_wins() {
        let oracle = Scripted::new(vec![Some(Ok(
            r#"ok: {"action":"up","new_rps":25,"new_burst":75,"confidence":0.9}"#.to_string(),
        ))]);
        let verdict = consult(&oracle, &request(), &policy()).await.unwrap();
        assert_eq!(verdict.source, DecisionSource::Oracle);
        assert_eq!(verdict.attempt, 1);
        assert_eq!(verdict.raw.new_rps, Some(25.0));
        assert_eq!(oracle.calls(), 1);
    }

    #[tokio::test]
    async fn timeout_then_success() {
        let oracle = Scripted::new(vec![None, Some(Ok(r#"{"action":"same"}"#.to_string()))]);
        let verdict = consult(&oracle, &request(), &policy()).await.unwrap();
        assert_eq!(verdict.attempt, 2);
        assert_eq!(verdict.raw.action, "same");
    }

    #[tokio::test]
    async fn missing_action_is_a_hold_not_a_retry() {
        let oracle = Scripted::new(vec![
            Some(Ok(r#"{"new_rps":12,"confidence":0.9} scale up later"#.to_string())),
            Some(Ok("scale up".to_string())),
        ]);
        let verdict = consult(&oracle, &request(), &policy()).await.unwrap();
        assert_eq!(verdict.source, DecisionSource::Oracle);
        assert_eq!(verdict.attempt, 1);
        assert_eq!(verdict.raw.action, "same");
        assert_eq!(oracle.calls(), 1);
    }

    #[tokio::test]
    async fn all_timeouts_exhaust() {
        let oracle = Scripted::new(vec![None, None]);
        let err = consult(&oracle, &request(), &policy()).await.unwrap_err();
        assert!(matches!(err, OracleError::Exhausted { attempts: 2, .. }));
        assert_eq!(oracle.calls(), 2);
    }

    #[tokio::test]
    async fn transport_errors_exhaust() {
        let oracle = Scripted::new(vec![
            Some(Err(OracleError::Transport("refused".into()))),
            Some(Err(OracleError::Status(500))),
        ]);
        match consult(&oracle, &request(), &policy()).await {
            Err(OracleError::Exhausted { attempts, last }) => {
                assert_eq!(attempts, 2);
                assert!(last.contains("500"));
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn prose_on_last_attempt_becomes_intent() {
        let oracle = Scripted::new(vec![
            Some(Ok("I think you should scale up".to_string())),
            Some(Ok("definitely increase it".to_string())),
        ]);
        let verdict = consult(&oracle, &request(), &policy()).await.unwrap();
        assert_eq!(verdict.source, DecisionSource::IntentExtracted);
        assert_eq!(verdict.attempt, 2);
        assert_eq!(verdict.raw.action, "up");
        assert_eq!(verdict.raw.confidence, Some(0.5));
    }

    #[tokio::test]
    async fn directionless_prose_is_total_failure() {
        let oracle = Scripted::new(vec![
            Some(Ok("hmm".to_string())),
            Some(Ok("no idea".to_string())),
        ]);
        assert!(matches!(
            consult(&oracle, &request(), &policy()).await,
            Err(OracleError::Exhausted { .. })
        ));
    }
}
