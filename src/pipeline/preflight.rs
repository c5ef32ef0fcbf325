//! Preflight engine
//!
//! Runs the configured checks in declared order and gates the rest of the
//! pipeline. Retry handling is an explicit per-check state machine
//! (`Pending -> Retrying(n) -> Passed | Failed`) so the budget and jitter
//! are testable deterministically; the random source is injected.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use crate::adapters::CheckAdapter;
use crate::clients::EventSink;
use crate::error::PipelineError;
use crate::types::{CheckOutcome, CheckResult, PipelineEvent};

/// Per-check retry budget and backoff shape. The budget is never shared
/// across checks.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub max_retries: u32,
}

impl BackoffPolicy {
    /// Delay before retry number `retry` (zero-based): exponential in the
    /// base plus randomized jitter of up to one base interval.
    pub fn delay(&self, retry: u32, jitter: &mut dyn JitterSource) -> Duration {
        let exponential = self.base.saturating_mul(2u32.saturating_pow(retry));
        exponential.saturating_add(jitter.sample(self.base))
    }
}

/// Injectable randomness for backoff jitter.
pub trait JitterSource: Send {
    /// A duration in `[0, max]`.
    fn sample(&mut self, max: Duration) -> Duration;
}

/// Production jitter backed by the thread RNG.
pub struct RandomJitter;

impl JitterSource for RandomJitter {
    fn sample(&mut self, max: Duration) -> Duration {
        let max_ms = max.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
    }
}

/// Deterministic zero jitter, for tests.
pub struct NoJitter;

impl JitterSource for NoJitter {
    fn sample(&mut self, _max: Duration) -> Duration {
        Duration::ZERO
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CheckState {
    Pending,
    Retrying(u32),
    Passed,
    Failed,
}

/// Run every check in order. A failing check with a retry recommendation
/// is retried up to the policy budget with exponential backoff; any other
/// failure aborts immediately and no later check runs. Skipped checks
/// pass implicitly without invocation.
pub async fn run_preflight(
    checks: &[Arc<dyn CheckAdapter>],
    policy: BackoffPolicy,
    jitter: &mut dyn JitterSource,
    sink: &dyn EventSink,
) -> Result<Vec<CheckResult>, PipelineError> {
    let mut check_log = Vec::with_capacity(checks.len());

    for check in checks {
        if check.skipped() {
            sink.emit(PipelineEvent::CheckSkipped {
                check: check.name().to_string(),
            });
            tracing::info!(check = check.name(), "check skipped by operator override");
            check_log.push(CheckResult::passed(
                check.name(),
                "skipped by operator override",
            ));
            continue;
        }

        let mut state = CheckState::Pending;
        let mut failure: Option<CheckResult> = None;
        loop {
            let attempt = match state {
                CheckState::Pending => 0,
                CheckState::Retrying(n) => n,
                CheckState::Passed | CheckState::Failed => break,
            };

            let result = check.run_check().await;
            sink.emit(PipelineEvent::CheckAttempt {
                check: check.name().to_string(),
                attempt: attempt + 1,
                outcome: if result.passed {
                    CheckOutcome::Passed
                } else {
                    CheckOutcome::Failed
                },
            });

            if result.passed {
                tracing::info!(check = check.name(), attempt = attempt + 1, "check passed");
                state = CheckState::Passed;
                check_log.push(result);
                continue;
            }

            if result.retry_recommended && attempt < policy.max_retries {
                let delay = policy.delay(attempt, jitter);
                tracing::warn!(
                    check = check.name(),
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    message = %result.message,
                    "check failed, retrying"
                );
                tokio::time::sleep(delay).await;
                state = CheckState::Retrying(attempt + 1);
                continue;
            }

            tracing::error!(
                check = check.name(),
                attempts = attempt + 1,
                message = %result.message,
                "check failed fatally"
            );
            failure = Some(result);
            state = CheckState::Failed;
        }

        if let Some(result) = failure {
            return Err(PipelineError::FatalCheckFailure {
                check: check.name().to_string(),
                message: result.message,
            });
        }
    }

    Ok(check_log)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    struct NullSink;
    impl EventSink for NullSink {
        fn emit(&self, _event: PipelineEvent) {}
    }

    /// Check that replays a scripted sequence of results.
    struct ScriptedCheck {
        name: &'static str,
        script: Mutex<Vec<CheckResult>>,
        invocations: AtomicU32,
        skip: bool,
    }

    impl ScriptedCheck {
        fn new(name: &'static str, script: Vec<CheckResult>) -> Self {
            Self {
                name,
                script: Mutex::new(script),
                invocations: AtomicU32::new(0),
                skip: false,
            }
        }

        fn skipped(name: &'static str) -> Self {
            let mut check = Self::new(name, vec![]);
            check.skip = true;
            check
        }
    }

    #[async_trait]
    impl CheckAdapter for ScriptedCheck {
        fn name(&self) -> &'static str {
            self.name
        }

        fn skipped(&self) -> bool {
            self.skip
        }

        async fn run_check(&self) -> CheckResult {
            self.invocations.fetch_add(1, Ordering::SeqCst);
            self.script.lock().unwrap().remove(0)
        }
    }

    fn policy() -> BackoffPolicy {
        BackoffPolicy {
            base: Duration::ZERO,
            max_retries: 3,
        }
    }

    #[tokio::test]
    async fn test_fails_twice_then_passes_within_budget() {
        // Scenario: two retry-recommended failures, success on the third attempt.
        let check = Arc::new(ScriptedCheck::new(
            "flaky",
            vec![
                CheckResult::failed("flaky", "transient", true),
                CheckResult::failed("flaky", "transient", true),
                CheckResult::passed("flaky", "ok"),
            ],
        ));
        let checks: Vec<Arc<dyn CheckAdapter>> = vec![check.clone()];

        let log = run_preflight(&checks, policy(), &mut NoJitter, &NullSink)
            .await
            .unwrap();
        assert_eq!(log.len(), 1);
        assert!(log[0].passed);
        assert_eq!(check.invocations.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_fast() {
        let fatal = Arc::new(ScriptedCheck::new(
            "fatal",
            vec![CheckResult::failed("fatal", "hard stop", false)],
        ));
        let never_run = Arc::new(ScriptedCheck::new("later", vec![]));
        let checks: Vec<Arc<dyn CheckAdapter>> = vec![fatal.clone(), never_run.clone()];

        let err = run_preflight(&checks, policy(), &mut NoJitter, &NullSink)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::FatalCheckFailure { ref check, .. } if check == "fatal"));
        assert_eq!(fatal.invocations.load(Ordering::SeqCst), 1);
        // fail-fast: no subsequent checks run
        assert_eq!(never_run.invocations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_retry_budget_exhaustion_is_fatal() {
        let script: Vec<_> = (0..4)
            .map(|_| CheckResult::failed("stuck", "still broken", true))
            .collect();
        let check = Arc::new(ScriptedCheck::new("stuck", script));
        let checks: Vec<Arc<dyn CheckAdapter>> = vec![check.clone()];

        let err = run_preflight(&checks, policy(), &mut NoJitter, &NullSink)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::FatalCheckFailure { .. }));
        // initial attempt + max_retries
        assert_eq!(check.invocations.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_skipped_check_never_invoked() {
        let check = Arc::new(ScriptedCheck::skipped("overridden"));
        let checks: Vec<Arc<dyn CheckAdapter>> = vec![check.clone()];

        let log = run_preflight(&checks, policy(), &mut NoJitter, &NullSink)
            .await
            .unwrap();
        assert!(log[0].passed);
        assert_eq!(check.invocations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_idempotent_when_all_pass() {
        // Two clean runs produce identical check logs and no retries.
        let mut logs = Vec::new();
        for _ in 0..2 {
            let check = Arc::new(ScriptedCheck::new(
                "clean",
                vec![CheckResult::passed("clean", "ok")],
            ));
            let checks: Vec<Arc<dyn CheckAdapter>> = vec![check.clone()];
            let log = run_preflight(&checks, policy(), &mut NoJitter, &NullSink)
                .await
                .unwrap();
            assert_eq!(check.invocations.load(Ordering::SeqCst), 1);
            logs.push(log);
        }
        assert_eq!(logs[0], logs[1]);
    }

    #[test]
    fn test_backoff_is_exponential() {
        let policy = BackoffPolicy {
            base: Duration::from_millis(100),
            max_retries: 3,
        };
        assert_eq!(policy.delay(0, &mut NoJitter), Duration::from_millis(100));
        assert_eq!(policy.delay(1, &mut NoJitter), Duration::from_millis(200));
        assert_eq!(policy.delay(2, &mut NoJitter), Duration::from_millis(400));
    }
}
