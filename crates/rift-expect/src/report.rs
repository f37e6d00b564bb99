//! Pass/fail classification, the human-readable summary, and test reporting.

use crate::error::VerificationError;
use crate::expectation::{ExpectationNode, Quantifier};
use crate::expecter::Expecter;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info};

/// Callback registered with a [`TestReporter`], run when the test finishes.
pub type CleanupFn = Box<dyn FnOnce(&dyn TestReporter) + Send>;

/// The parts of a test harness the expecter reports through.
pub trait TestReporter: Send + Sync {
    /// Mark the calling frame as a helper, for harnesses that track them.
    fn helper(&self) {}

    fn register_cleanup(&self, cleanup: CleanupFn);

    fn log(&self, line: &str);

    fn error(&self, line: &str);
}

impl Expecter {
    /// Expectations that pass, in pre-order.
    pub fn passed_expectations(&self) -> Vec<&ExpectationNode> {
        self.nodes_where(true)
    }

    /// Expectations that fail, in pre-order.
    pub fn failed_expectations(&self) -> Vec<&ExpectationNode> {
        self.nodes_where(false)
    }

    fn nodes_where(&self, pass: bool) -> Vec<&ExpectationNode> {
        let tree = self.tree();
        tree.preorder()
            .into_iter()
            .filter_map(|id| tree.get(id))
            .filter(|node| node.pass() == pass)
            .collect()
    }

    /// True when no expectation fails.
    pub fn pass(&self) -> bool {
        self.failed_expectations().is_empty()
    }

    pub fn fail(&self) -> bool {
        !self.pass()
    }

    /// Passed expectations, then failed ones with their reasons, then any
    /// unmatched requests.
    pub fn summary(&self) -> String {
        let mut out = String::from("Expectations\n");
        for node in self
            .passed_expectations()
            .into_iter()
            .chain(self.failed_expectations())
        {
            let _ = writeln!(out, "\t{}", node.summary_line());
        }

        let unmatched = self.unmatched_requests();
        if !unmatched.is_empty() {
            out.push_str("Unmatched Requests\n");
            for request in unmatched {
                let _ = writeln!(out, "\t{} {}", request.method(), request.path());
            }
        }
        out
    }

    /// `Ok` when every expectation passes, otherwise the failure count and summary.
    pub fn verify(&self) -> Result<(), VerificationError> {
        let failed = self.failed_expectations().len();
        if failed == 0 {
            return Ok(());
        }
        Err(VerificationError {
            failed,
            summary: self.summary(),
        })
    }

    /// Report the verdict to a test harness. Raises one error when anything
    /// failed, and always logs the summary.
    pub fn report(&self, reporter: &dyn TestReporter) {
        reporter.helper();
        let failed = self.fail();
        info!(
            passed = self.passed_expectations().len(),
            failed = self.failed_expectations().len(),
            unmatched = self.unmatched_requests().len(),
            "HTTP expectations verified"
        );

        if failed {
            reporter.error("One or more HTTP expectations failed");
        }
        for line in self.summary().lines() {
            reporter.log(line);
        }
    }

    /// Serializable snapshot of the current verdict.
    pub fn snapshot(&self) -> Report {
        let expectations = self
            .tree()
            .preorder()
            .into_iter()
            .filter_map(|id| self.tree().get(id))
            .map(|node| ExpectationReport {
                description: node.describe(),
                passed: node.pass(),
                matches: node.matched_requests().len(),
                quantifier: node.quantifier().cloned(),
                failure: node.failure_reason(),
            })
            .collect();

        Report {
            passed: self.pass(),
            expectations,
            unmatched: self
                .unmatched_requests()
                .iter()
                .map(|r| UnmatchedReport {
                    request: r.to_string(),
                    received_at: r.received_at(),
                })
                .collect(),
        }
    }
}

/// Verdict of a whole expecter, for machine-readable output.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub passed: bool,
    pub expectations: Vec<ExpectationReport>,
    pub unmatched: Vec<UnmatchedReport>,
}

/// A request no expectation matched, with its arrival time.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnmatchedReport {
    pub request: String,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExpectationReport {
    pub description: String,
    pub passed: bool,
    pub matches: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantifier: Option<Quantifier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

/// Reporter that writes to `tracing` and runs cleanups when dropped.
#[derive(Default)]
pub struct TracingReporter {
    cleanups: Mutex<Vec<CleanupFn>>,
    failed: AtomicBool,
}

impl TracingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `error` has been called.
    pub fn failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }

    /// Run registered cleanups now, most recent first.
    pub fn run_cleanups(&self) {
        let cleanups = std::mem::take(&mut *self.cleanups.lock());
        for cleanup in cleanups.into_iter().rev() {
            cleanup(self);
        }
    }
}

impl TestReporter for TracingReporter {
    fn register_cleanup(&self, cleanup: CleanupFn) {
        self.cleanups.lock().push(cleanup);
    }

    fn log(&self, line: &str) {
        info!("{}", line);
    }

    fn error(&self, line: &str) {
        self.failed.store(true, Ordering::SeqCst);
        error!("{}", line);
    }
}

impl Drop for TracingReporter {
    fn drop(&mut self) {
        self.run_cleanups();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Request;
    use std::sync::Arc;

    #[derive(Default)]
    struct Recorder {
        logs: Mutex<Vec<String>>,
        errors: Mutex<Vec<String>>,
    }

    impl TestReporter for Recorder {
        fn register_cleanup(&self, _cleanup: CleanupFn) {}

        fn log(&self, line: &str) {
            self.logs.lock().push(line.to_string());
        }

        fn error(&self, line: &str) {
            self.errors.lock().push(line.to_string());
        }
    }

    fn scenario() -> Expecter {
        let mut hex = Expecter::new();
        hex.expect("GET", "/status").unwrap();
        hex.expect("POST", "/users").unwrap();
        hex.log_request(Request::get("/status")).unwrap();
        hex.log_request(Request::new("PATCH", "/items")).unwrap();
        hex
    }

    #[test]
    fn test_summary_lists_passes_failures_and_unmatched() {
        let hex = scenario();

        assert!(hex.fail());
        assert_eq!(hex.passed_expectations().len(), 1);
        assert_eq!(hex.failed_expectations().len(), 1);
        assert_eq!(
            hex.summary(),
            "Expectations\n\
             \tGET /status - passed\n\
             \tPOST /users - failed, no matching requests\n\
             Unmatched Requests\n\
             \tPATCH /items\n"
        );
    }

    #[test]
    fn test_verify_carries_summary() {
        let hex = scenario();
        let err = hex.verify().unwrap_err();
        assert_eq!(err.failed, 1);
        assert!(err.summary.contains("POST /users - failed, no matching requests"));

        assert!(Expecter::new().verify().is_ok());
    }

    #[test]
    fn test_report_raises_one_error_and_logs_summary() {
        let recorder = Recorder::default();
        scenario().report(&recorder);

        assert_eq!(
            *recorder.errors.lock(),
            vec!["One or more HTTP expectations failed".to_string()]
        );
        let logs = recorder.logs.lock();
        assert_eq!(logs[0], "Expectations");
        assert!(logs.contains(&"\tPATCH /items".to_string()));
    }

    #[test]
    fn test_report_passing_only_logs() {
        let mut hex = Expecter::new();
        hex.expect("GET", "/").unwrap();
        hex.log_request(Request::get("/")).unwrap();

        let recorder = Recorder::default();
        hex.report(&recorder);
        assert!(recorder.errors.lock().is_empty());
        assert_eq!(*recorder.logs.lock(), vec!["Expectations", "\tGET / - passed"]);
    }

    #[test]
    fn test_snapshot_serializes() {
        let before = Utc::now();
        let snapshot = scenario().snapshot();
        assert!(!snapshot.passed);
        assert_eq!(snapshot.unmatched.len(), 1);
        assert_eq!(snapshot.unmatched[0].request, "PATCH /items");
        assert!(snapshot.unmatched[0].received_at <= Utc::now());
        assert!(snapshot.unmatched[0].received_at >= before);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["expectations"][1]["failure"], "no matching requests");
        assert!(json["expectations"][0].get("failure").is_none());
        assert_eq!(json["unmatched"][0]["request"], "PATCH /items");
        assert!(json["unmatched"][0]["receivedAt"].is_string());
    }

    #[test]
    fn test_tracing_reporter_runs_cleanups_on_drop() {
        let ran = Arc::new(Mutex::new(Vec::new()));
        {
            let reporter = TracingReporter::new();
            for n in 0..2 {
                let ran = Arc::clone(&ran);
                reporter.register_cleanup(Box::new(move |r| {
                    r.error("cleanup");
                    ran.lock().push(n);
                }));
            }
        }
        assert_eq!(*ran.lock(), vec![1, 0]);
    }
}
