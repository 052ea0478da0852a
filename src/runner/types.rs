use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use uuid::Uuid;

fn as_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}

/// 单个事务的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Pass,
    Fail,
}

/// 事务失败的原因
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepFailure {
    /// 超时、连接被拒绝等，等同于状态码不匹配
    Transport { message: String },
    UnexpectedStatus { actual: u16, expected: Vec<u16> },
    /// 模板无法渲染，请求未发送
    Configuration { message: String },
}

impl StepFailure {
    pub fn is_configuration(&self) -> bool {
        matches!(self, StepFailure::Configuration { .. })
    }
}

impl fmt::Display for StepFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepFailure::Transport { message } => write!(f, "transport error: {}", message),
            StepFailure::UnexpectedStatus { actual, expected } => {
                let expected: Vec<String> = expected.iter().map(u16::to_string).collect();
                write!(
                    f,
                    "unexpected status {} (expected {})",
                    actual,
                    expected.join("|")
                )
            }
            StepFailure::Configuration { message } => {
                write!(f, "configuration error: {}", message)
            }
        }
    }
}

/// 提取未命中
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionMiss {
    pub variable: String,
    pub message: String,
}

/// 一个已执行步骤的记录，写入后不再修改
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionResult {
    pub step: String,

    #[serde(rename = "elapsed_ms", serialize_with = "as_millis")]
    pub elapsed: Duration,

    /// 最后一次收到的状态码，传输错误或配置错误时为空
    pub status: Option<u16>,

    pub outcome: Outcome,

    /// 实际发出的 HTTP 请求数
    pub requests: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<StepFailure>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extraction_misses: Vec<ExtractionMiss>,
}

impl TransactionResult {
    pub fn passed(step: impl Into<String>, status: u16, elapsed: Duration) -> Self {
        Self {
            step: step.into(),
            elapsed,
            status: Some(status),
            outcome: Outcome::Pass,
            requests: 1,
            failure: None,
            extraction_misses: Vec::new(),
        }
    }

    pub fn failed(
        step: impl Into<String>,
        status: Option<u16>,
        elapsed: Duration,
        failure: StepFailure,
    ) -> Self {
        Self {
            step: step.into(),
            elapsed,
            status,
            outcome: Outcome::Fail,
            requests: 1,
            failure: Some(failure),
            extraction_misses: Vec::new(),
        }
    }

    pub fn configuration_error(
        step: impl Into<String>,
        message: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        let mut result = Self::failed(
            step,
            None,
            elapsed,
            StepFailure::Configuration {
                message: message.into(),
            },
        );
        result.requests = 0;
        result
    }

    pub fn with_requests(mut self, requests: usize) -> Self {
        self.requests = requests;
        self
    }

    pub fn with_misses(mut self, misses: Vec<ExtractionMiss>) -> Self {
        self.extraction_misses = misses;
        self
    }

    pub fn is_pass(&self) -> bool {
        self.outcome == Outcome::Pass
    }
}

/// 步骤未执行的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// 之前的 abort 步骤失败
    Aborted,
    Cancelled,
    /// 之前的步骤出现配置错误
    ConfigurationError,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Aborted => write!(f, "aborted"),
            SkipReason::Cancelled => write!(f, "cancelled"),
            SkipReason::ConfigurationError => write!(f, "configuration error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotExecuted {
    pub step: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IterationOutcome {
    Pass,
    Fail,
    Cancelled,
}

impl fmt::Display for IterationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IterationOutcome::Pass => write!(f, "PASS"),
            IterationOutcome::Fail => write!(f, "FAIL"),
            IterationOutcome::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// 一次迭代的完整报告，按值返回给调用方
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IterationReport {
    pub id: Uuid,
    pub scenario: String,
    pub started_at: DateTime<Utc>,

    #[serde(rename = "elapsed_ms", serialize_with = "as_millis")]
    pub elapsed: Duration,

    pub outcome: IterationOutcome,
    pub results: Vec<TransactionResult>,
    pub not_executed: Vec<NotExecuted>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_error: Option<String>,
}

impl IterationReport {
    pub fn new(scenario: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            scenario: scenario.into(),
            started_at: Utc::now(),
            elapsed: Duration::ZERO,
            outcome: IterationOutcome::Pass,
            results: Vec::new(),
            not_executed: Vec::new(),
            config_error: None,
        }
    }

    pub fn passed(&self) -> bool {
        self.outcome == IterationOutcome::Pass
    }

    /// 按步骤名查找事务结果
    pub fn result(&self, step: &str) -> Option<&TransactionResult> {
        self.results.iter().find(|r| r.step == step)
    }
}

/// 多次迭代的计数摘要
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IterationSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub total_duration: Duration,
}

impl IterationSummary {
    pub fn from_reports(reports: &[IterationReport]) -> Self {
        let count = |outcome: IterationOutcome| reports.iter().filter(|r| r.outcome == outcome).count();
        Self {
            total: reports.len(),
            passed: count(IterationOutcome::Pass),
            failed: count(IterationOutcome::Fail),
            cancelled: count(IterationOutcome::Cancelled),
            total_duration: reports.iter().map(|r| r.elapsed).sum(),
        }
    }

    pub fn all_passed(&self) -> bool {
        self.passed == self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_failure_display() {
        let failure = StepFailure::UnexpectedStatus {
            actual: 500,
            expected: vec![200, 201],
        };
        assert_eq!(
            failure.to_string(),
            "unexpected status 500 (expected 200|201)"
        );
        assert!(
            StepFailure::Configuration {
                message: "x".into()
            }
            .is_configuration()
        );
    }

    #[test]
    fn test_configuration_error_sends_nothing() {
        let result = TransactionResult::configuration_error(
            "T04_Create_Booking",
            "unresolved placeholder(s): eventTypeId",
            Duration::ZERO,
        );
        assert_eq!(result.requests, 0);
        assert_eq!(result.status, None);
        assert!(!result.is_pass());
    }

    #[test]
    fn test_report_serialization() {
        let mut report = IterationReport::new("booking_flow");
        report.elapsed = Duration::from_millis(1500);
        report.outcome = IterationOutcome::Fail;
        report.results.push(TransactionResult::passed(
            "T01_Login",
            200,
            Duration::from_millis(120),
        ));
        report.results.push(TransactionResult::failed(
            "T02_Get_Event_Types",
            Some(500),
            Duration::from_millis(80),
            StepFailure::UnexpectedStatus {
                actual: 500,
                expected: vec![200],
            },
        ));
        report.not_executed.push(NotExecuted {
            step: "T03_Get_Available_Slots".into(),
            reason: SkipReason::Aborted,
        });

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["scenario"], "booking_flow");
        assert_eq!(value["elapsed_ms"], 1500);
        assert_eq!(value["outcome"], "fail");
        assert_eq!(
            value["results"][0],
            json!({"step": "T01_Login", "elapsed_ms": 120, "status": 200, "outcome": "pass", "requests": 1})
        );
        assert_eq!(
            value["results"][1]["failure"],
            json!({"kind": "unexpected_status", "actual": 500, "expected": [200]})
        );
        assert_eq!(value["not_executed"][0]["reason"], "aborted");
        assert!(value.get("config_error").is_none());
    }

    #[test]
    fn test_summary_counts() {
        let mut pass = IterationReport::new("s");
        pass.elapsed = Duration::from_millis(100);
        let mut fail = IterationReport::new("s");
        fail.outcome = IterationOutcome::Fail;
        fail.elapsed = Duration::from_millis(200);
        let mut cancelled = IterationReport::new("s");
        cancelled.outcome = IterationOutcome::Cancelled;

        let summary = IterationSummary::from_reports(&[pass, fail, cancelled]);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.cancelled, 1);
        assert_eq!(summary.total_duration, Duration::from_millis(300));
        assert!(!summary.all_passed());
    }
}
