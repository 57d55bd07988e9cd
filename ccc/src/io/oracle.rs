//! Oracle abstraction for content transformation.
//!
//! The [`Oracle`] trait decouples task execution from the actual backend
//! (currently an OpenAI-compatible chat-completions endpoint). An oracle
//! transforms exactly one batch; [`transform_project`] owns batching, retry
//! and the task deadline. Tests use scripted oracles that return predetermined
//! results without touching the network.

use std::time::Instant;

use thiserror::Error;
use tracing::{debug, instrument};

use crate::core::batch::{DEFAULT_BATCH_BUDGET_BYTES, batch_files, merge_results};
use crate::core::budget::remaining_budget;
use crate::core::types::{ProjectFile, Rule, Safety, Task, TransformResult};
use crate::io::retry::{RetryFailure, RetryPolicy, retry};

/// One batch worth of oracle input.
#[derive(Debug, Clone)]
pub struct OracleRequest<'a> {
    pub task: &'a Task,
    pub rules: &'a [Rule],
    pub files: &'a [ProjectFile],
    pub safety: Safety,
    /// Whole-task deadline; transports must not block past it.
    pub deadline: Instant,
}

/// Failure talking to or interpreting the oracle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
    #[error("oracle transport error: {message}")]
    Transport { message: String, retryable: bool },
    #[error("oracle HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("parse oracle response: {0}")]
    Parse(String),
    #[error("oracle API error: {0}")]
    Api(String),
    #[error("build oracle request: {0}")]
    Request(String),
    #[error("task deadline exceeded")]
    DeadlineExceeded,
    #[error("task deadline exceeded after {attempts} attempts: {last}")]
    OutOfTime {
        attempts: u32,
        last: Box<OracleError>,
    },
    #[error("oracle failed after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        last: Box<OracleError>,
    },
}

impl OracleError {
    /// Build a transport error, classifying it from the failure kind and text.
    pub fn transport(message: impl Into<String>, timeout_or_connect: bool) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        let retryable = timeout_or_connect
            || lower.contains("timeout")
            || lower.contains("timed out")
            || lower.contains("deadline exceeded")
            || lower.contains("temporarily unavailable");
        Self::Transport { message, retryable }
    }

    /// Transport timeouts, connection failures and HTTP 5xx are retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { retryable, .. } => *retryable,
            Self::Status { status, .. } => (500..600).contains(status),
            Self::Parse(_)
            | Self::Api(_)
            | Self::Request(_)
            | Self::DeadlineExceeded
            | Self::OutOfTime { .. }
            | Self::Exhausted { .. } => false,
        }
    }
}

/// Abstraction over transformation backends.
pub trait Oracle {
    /// Transform one batch. Paths absent from the result are unchanged.
    fn transform(&self, request: &OracleRequest<'_>) -> Result<TransformResult, OracleError>;
}

impl<O: Oracle + ?Sized> Oracle for &O {
    fn transform(&self, request: &OracleRequest<'_>) -> Result<TransformResult, OracleError> {
        (**self).transform(request)
    }
}

/// Batching and retry knobs for [`transform_project`].
#[derive(Debug, Clone, Copy)]
pub struct TransformOptions {
    pub batch_budget_bytes: usize,
    pub retry: RetryPolicy,
    pub deadline: Instant,
}

impl TransformOptions {
    pub fn new(deadline: Instant) -> Self {
        Self {
            batch_budget_bytes: DEFAULT_BATCH_BUDGET_BYTES,
            retry: RetryPolicy::default(),
            deadline,
        }
    }
}

/// Transform a task's files, batching by byte budget and retrying each batch.
///
/// Batches run sequentially; the first batch that fails terminally or
/// exhausts its retries fails the whole call. Empty input never reaches the
/// oracle.
#[instrument(skip_all, fields(task_id = %task.id, files = files.len()))]
pub fn transform_project<O: Oracle + ?Sized>(
    oracle: &O,
    files: &[ProjectFile],
    task: &Task,
    rules: &[Rule],
    safety: Safety,
    options: &TransformOptions,
) -> Result<TransformResult, OracleError> {
    if files.is_empty() {
        debug!("no files in scope, skipping oracle");
        return Ok(TransformResult::unchanged());
    }

    let batches = batch_files(files, options.batch_budget_bytes);
    let total = batches.len();
    let mut results = Vec::with_capacity(total);
    for (idx, batch) in batches.iter().enumerate() {
        debug!(batch = idx + 1, total, files = batch.len(), "transforming batch");
        let request = OracleRequest {
            task,
            rules,
            files: batch,
            safety,
            deadline: options.deadline,
        };
        let result = retry(
            &options.retry,
            Some(options.deadline),
            OracleError::is_retryable,
            |attempt| {
                if remaining_budget(options.deadline).is_none() {
                    return Err(OracleError::DeadlineExceeded);
                }
                debug!(attempt, "oracle attempt");
                oracle.transform(&request)
            },
        )
        .map_err(|failure| {
            debug!(attempts = failure.attempts(), "batch failed");
            match failure {
                RetryFailure::Terminal { error, .. } => error,
                RetryFailure::Exhausted { attempts, error } => OracleError::Exhausted {
                    attempts,
                    last: Box::new(error),
                },
                RetryFailure::OutOfTime { attempts, error } => OracleError::OutOfTime {
                    attempts,
                    last: Box::new(error),
                },
            }
        })?;
        results.push(result);
    }
    Ok(merge_results(results))
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use std::time::Duration;

    use super::*;

    struct FakeOracle {
        responses: RefCell<Vec<Result<TransformResult, OracleError>>>,
        seen: RefCell<Vec<Vec<String>>>,
    }

    impl FakeOracle {
        fn new(mut responses: Vec<Result<TransformResult, OracleError>>) -> Self {
            responses.reverse();
            Self {
                responses: RefCell::new(responses),
                seen: RefCell::new(Vec::new()),
            }
        }
    }

    impl Oracle for FakeOracle {
        fn transform(&self, request: &OracleRequest<'_>) -> Result<TransformResult, OracleError> {
            self.seen
                .borrow_mut()
                .push(request.files.iter().map(|f| f.path.clone()).collect());
            self.responses
                .borrow_mut()
                .pop()
                .unwrap_or_else(|| Ok(TransformResult::unchanged()))
        }
    }

    fn task() -> Task {
        Task {
            id: "task-01-r".to_string(),
            rule_id: "r".to_string(),
            rule_title: "R".to_string(),
            description: "d".to_string(),
            files: vec!["a.go".to_string(), "b.go".to_string()],
        }
    }

    fn file(path: &str, bytes: usize) -> ProjectFile {
        ProjectFile {
            path: path.to_string(),
            content: "x".repeat(bytes),
        }
    }

    fn options() -> TransformOptions {
        TransformOptions {
            batch_budget_bytes: 100,
            retry: RetryPolicy::new(3, Duration::ZERO),
            deadline: Instant::now() + Duration::from_secs(60),
        }
    }

    fn changed(path: &str, content: &str, summary: &str) -> TransformResult {
        TransformResult {
            changed: true,
            summary: summary.to_string(),
            changed_files: BTreeMap::from([(path.to_string(), content.to_string())]),
        }
    }

    #[test]
    fn classification_matches_policy() {
        assert!(OracleError::transport("operation timed out", false).is_retryable());
        assert!(OracleError::transport("service temporarily unavailable", false).is_retryable());
        assert!(OracleError::transport("tcp connect error", true).is_retryable());
        assert!(!OracleError::transport("invalid header value", false).is_retryable());
        let status = |status| OracleError::Status {
            status,
            body: String::new(),
        };
        assert!(status(503).is_retryable());
        assert!(!status(429).is_retryable());
        assert!(!status(400).is_retryable());
        assert!(!OracleError::Parse("bad".to_string()).is_retryable());
        assert!(!OracleError::DeadlineExceeded.is_retryable());
    }

    #[test]
    fn empty_input_skips_oracle() {
        let oracle = FakeOracle::new(Vec::new());
        let out = transform_project(&oracle, &[], &task(), &[], Safety::default(), &options())
            .expect("transform");
        assert_eq!(out, TransformResult::unchanged());
        assert!(oracle.seen.borrow().is_empty());
    }

    #[test]
    fn batches_run_in_order_and_merge() {
        let oracle = FakeOracle::new(vec![
            Ok(changed("a.go", "A", "first")),
            Ok(changed("b.go", "B", "second")),
        ]);
        let files = vec![file("a.go", 80), file("b.go", 80)];
        let out = transform_project(&oracle, &files, &task(), &[], Safety::default(), &options())
            .expect("transform");

        assert_eq!(
            *oracle.seen.borrow(),
            vec![vec!["a.go".to_string()], vec!["b.go".to_string()]]
        );
        assert_eq!(out.summary, "first; second");
        assert_eq!(out.changed_files.len(), 2);
    }

    #[test]
    fn server_errors_are_retried() {
        let oracle = FakeOracle::new(vec![
            Err(OracleError::Status {
                status: 502,
                body: "bad gateway".to_string(),
            }),
            Ok(changed("a.go", "A", "ok")),
        ]);
        let out = transform_project(
            &oracle,
            &[file("a.go", 1)],
            &task(),
            &[],
            Safety::default(),
            &options(),
        )
        .expect("transform");
        assert_eq!(oracle.seen.borrow().len(), 2);
        assert_eq!(out.summary, "ok");
    }

    #[test]
    fn client_errors_are_terminal() {
        let oracle = FakeOracle::new(vec![Err(OracleError::Status {
            status: 401,
            body: "unauthorized".to_string(),
        })]);
        let err = transform_project(
            &oracle,
            &[file("a.go", 1)],
            &task(),
            &[],
            Safety::default(),
            &options(),
        )
        .unwrap_err();
        assert_eq!(oracle.seen.borrow().len(), 1);
        assert!(matches!(err, OracleError::Status { status: 401, .. }));
    }

    #[test]
    fn exhaustion_wraps_last_error() {
        let timeout = || Err(OracleError::transport("request timed out", true));
        let oracle = FakeOracle::new(vec![timeout(), timeout(), timeout()]);
        let err = transform_project(
            &oracle,
            &[file("a.go", 1)],
            &task(),
            &[],
            Safety::default(),
            &options(),
        )
        .unwrap_err();
        assert_eq!(oracle.seen.borrow().len(), 3);
        assert!(matches!(err, OracleError::Exhausted { attempts: 3, .. }));
        assert!(err.to_string().contains("request timed out"));
    }

    #[test]
    fn backoff_never_outlives_task_deadline() {
        let unavailable = || {
            Err(OracleError::Status {
                status: 503,
                body: "unavailable".to_string(),
            })
        };
        let oracle = FakeOracle::new(vec![unavailable(), unavailable(), unavailable()]);
        let started = Instant::now();
        let opts = TransformOptions {
            batch_budget_bytes: 100,
            retry: RetryPolicy::new(3, Duration::from_millis(100)),
            deadline: started + Duration::from_millis(250),
        };

        let err = transform_project(
            &oracle,
            &[file("a.go", 1)],
            &task(),
            &[],
            Safety::default(),
            &opts,
        )
        .unwrap_err();

        assert!(started.elapsed() < Duration::from_millis(250));
        assert_eq!(oracle.seen.borrow().len(), 2);
        let OracleError::OutOfTime { attempts, last } = &err else {
            panic!("expected out-of-time error, got {err}");
        };
        assert_eq!(*attempts, 2);
        assert!(matches!(**last, OracleError::Status { status: 503, .. }));
        assert!(err.to_string().contains("unavailable"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn expired_deadline_never_calls_oracle() {
        let oracle = FakeOracle::new(Vec::new());
        let mut opts = options();
        opts.deadline = Instant::now();
        std::thread::sleep(Duration::from_millis(2));
        let err = transform_project(
            &oracle,
            &[file("a.go", 1)],
            &task(),
            &[],
            Safety::default(),
            &opts,
        )
        .unwrap_err();
        assert_eq!(err, OracleError::DeadlineExceeded);
        assert!(oracle.seen.borrow().is_empty());
    }
}
