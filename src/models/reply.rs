//! Uniform operation reply for JSON consumers.

use serde::Serialize;
use serde_json::Value;

use crate::error::{AppError, ErrorKind};

/// Reply status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyStatus {
    Success,
    Error,
}

/// `{ status, kind, message, data }` envelope.
#[derive(Debug, Clone, Serialize)]
pub struct OperationReply {
    pub status: ReplyStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl OperationReply {
    pub fn success(message: impl Into<String>, data: impl Serialize) -> Self {
        // Serializing our own plain data types does not fail.
        let data = serde_json::to_value(data).ok().filter(|v| !v.is_null());
        Self {
            status: ReplyStatus::Success,
            kind: None,
            message: message.into(),
            data,
        }
    }

    /// A completed operation whose device outcome was negative (NAK, void).
    pub fn failure(message: impl Into<String>, data: impl Serialize) -> Self {
        Self {
            status: ReplyStatus::Error,
            ..Self::success(message, data)
        }
    }

    pub fn error(err: &AppError) -> Self {
        Self {
            status: ReplyStatus::Error,
            kind: Some(err.kind()),
            message: err.to_string(),
            data: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ReplyStatus::Success
    }
}
