//! Message envelope exchanged over an interactive session.
//!
//! Every frame is one JSON object tagged by `type`:
//!
//! ```json
//! {"type":"InitExecution","contentContainer":"snippets","contentKey":"u1/5","version":"1.1"}
//! {"type":"InputRequest","prompt":"Name?"}
//! {"type":"InputResponse","value":"Ada"}
//! {"type":"Output","value":"Hello Ada"}
//! {"type":"Error","value":"division by zero"}
//! {"type":"ExecutionFinished"}
//! ```

use serde::{Deserialize, Serialize};

use crate::error::SessionError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SessionMessage {
    /// Client -> server. Starts the run; must be the first message.
    #[serde(rename_all = "camelCase")]
    InitExecution {
        #[serde(default)]
        content_container: Option<String>,
        #[serde(default)]
        content_key: Option<String>,
        #[serde(default)]
        version: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language_id: Option<String>,
    },

    /// Server -> client. The program is waiting for input.
    InputRequest { prompt: String },

    /// Client -> server. Answer to the pending input request.
    InputResponse { value: String },

    /// Server -> client. One line of program output.
    Output { value: String },

    /// Server -> client. The run failed; the session closes next.
    Error { value: String },

    /// Server -> client. The run completed; the session closes next.
    ExecutionFinished,
}

impl SessionMessage {
    /// Decode one text frame.
    pub fn parse(text: &str) -> Result<Self, SessionError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Encode as one text frame.
    pub fn to_text(&self) -> Result<String, SessionError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::InitExecution { .. } => "InitExecution",
            Self::InputRequest { .. } => "InputRequest",
            Self::InputResponse { .. } => "InputResponse",
            Self::Output { .. } => "Output",
            Self::Error { .. } => "Error",
            Self::ExecutionFinished => "ExecutionFinished",
        }
    }
}

/// Where the source lives and how to run it, taken from `InitExecution`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionTarget {
    pub content_container: String,
    pub content_key: String,
    pub version: String,
    pub language_id: Option<String>,
}

impl ExecutionTarget {
    /// Check that an init message names a content location and version.
    pub fn from_init(
        content_container: Option<String>,
        content_key: Option<String>,
        version: Option<String>,
        language_id: Option<String>,
    ) -> Result<Self, SessionError> {
        let required = |value: Option<String>, field: &'static str| {
            value
                .filter(|v| !v.trim().is_empty())
                .ok_or(SessionError::MissingInitField(field))
        };
        Ok(Self {
            content_container: required(content_container, "contentContainer")?,
            content_key: required(content_key, "contentKey")?,
            version: required(version, "version")?,
            language_id,
        })
    }
}
