//! 框架消息定义
//!
//! Messages published on the framework bus. Every message carries a `type`
//! discriminator on the wire and a human-readable `Display` form.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Discriminator of a bus message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MessageType {
    #[serde(rename = "TestResultMessage")]
    TestResult,
    #[serde(rename = "TestRunMessage")]
    TestRun,
    #[serde(rename = "EnvironmentMessage")]
    Environment,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::TestResult => "TestResultMessage",
            MessageType::TestRun => "TestRunMessage",
            MessageType::Environment => "EnvironmentMessage",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 测试用例状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TestStatus {
    NotRun,
    Running,
    Failed,
    Passed,
    Skipped,
    Attempted,
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TestStatus::NotRun => "NOTRUN",
            TestStatus::Running => "RUNNING",
            TestStatus::Failed => "FAILED",
            TestStatus::Passed => "PASSED",
            TestStatus::Skipped => "SKIPPED",
            TestStatus::Attempted => "ATTEMPTED",
        };
        f.write_str(name)
    }
}

/// 测试运行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TestRunStatus {
    Initializing,
    Running,
    Success,
    Failed,
}

impl fmt::Display for TestRunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TestRunStatus::Initializing => "INITIALIZING",
            TestRunStatus::Running => "RUNNING",
            TestRunStatus::Success => "SUCCESS",
            TestRunStatus::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// Outcome of one test case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResultMessage {
    pub id: String,
    pub name: String,
    pub status: TestStatus,
    /// Free-form information such as a failure reason
    #[serde(default)]
    pub message: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl TestResultMessage {
    pub fn new(id: impl Into<String>, name: impl Into<String>, status: TestStatus) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status,
            message: String::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

impl fmt::Display for TestResultMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.status, self.name)?;
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        Ok(())
    }
}

/// Progress of a whole test run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestRunMessage {
    pub run_id: String,
    pub status: TestRunStatus,
    #[serde(default)]
    pub message: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl TestRunMessage {
    pub fn new(run_id: impl Into<String>, status: TestRunStatus) -> Self {
        Self {
            run_id: run_id.into(),
            status,
            message: String::new(),
            timestamp: Utc::now(),
        }
    }
}

impl fmt::Display for TestRunMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run {} {}", self.run_id, self.status)?;
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        Ok(())
    }
}

/// State change of a test environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentMessage {
    pub name: String,
    pub status: String,
}

impl EnvironmentMessage {
    pub fn new(name: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: status.into(),
        }
    }
}

impl fmt::Display for EnvironmentMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "environment {} {}", self.name, self.status)
    }
}

/// A message as delivered by the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    #[serde(rename = "TestResultMessage")]
    TestResult(TestResultMessage),
    #[serde(rename = "TestRunMessage")]
    TestRun(TestRunMessage),
    #[serde(rename = "EnvironmentMessage")]
    Environment(EnvironmentMessage),
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::TestResult(_) => MessageType::TestResult,
            Message::TestRun(_) => MessageType::TestRun,
            Message::Environment(_) => MessageType::Environment,
        }
    }

    pub fn from_json(json: &str) -> crate::error::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::TestResult(m) => fmt::Display::fmt(m, f),
            Message::TestRun(m) => fmt::Display::fmt(m, f),
            Message::Environment(m) => fmt::Display::fmt(m, f),
        }
    }
}

impl From<TestResultMessage> for Message {
    fn from(message: TestResultMessage) -> Self {
        Message::TestResult(message)
    }
}

impl From<TestRunMessage> for Message {
    fn from(message: TestRunMessage) -> Self {
        Message::TestRun(message)
    }
}

impl From<EnvironmentMessage> for Message {
    fn from(message: EnvironmentMessage) -> Self {
        Message::Environment(message)
    }
}
