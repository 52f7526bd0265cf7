use serde::{Deserialize, Serialize};
use std::fmt;

/// Build request as it arrives on the wire. Every field is optional so that a
/// missing key reaches the validator instead of failing deserialization.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildRequestCandidate {
    #[serde(default)]
    pub project_github_url: Option<String>,
    #[serde(default)]
    pub build_command: Option<String>,
    #[serde(default)]
    pub build_out_dir: Option<String>,
}

/// A build request that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    project_github_url: String,
    build_command: String,
    build_out_dir: String,
}

impl BuildRequest {
    pub(crate) fn new(project_github_url: String, build_command: String, build_out_dir: String) -> Self {
        Self {
            project_github_url,
            build_command,
            build_out_dir,
        }
    }

    pub fn project_github_url(&self) -> &str {
        &self.project_github_url
    }

    pub fn build_command(&self) -> &str {
        &self.build_command
    }

    pub fn build_out_dir(&self) -> &str {
        &self.build_out_dir
    }
}

/// Opaque build identifier. Correlates a submission with its status record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildId(String);

impl BuildId {
    pub(crate) fn from_generated(value: String) -> Self {
        Self(value)
    }

    /// Wrap a caller-supplied id. Blank input is rejected; anything else is
    /// passed to the store as-is.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BuildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Payload handed to the message channel for the build worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchEnvelope {
    pub build_id: BuildId,
    pub project_github_url: String,
    pub build_command: String,
    pub build_out_dir: String,
}

impl DispatchEnvelope {
    pub fn new(build_id: BuildId, request: BuildRequest) -> Self {
        Self {
            build_id,
            project_github_url: request.project_github_url,
            build_command: request.build_command,
            build_out_dir: request.build_out_dir,
        }
    }

    pub fn to_json_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// Response body of `POST /collect`. Callers branch on `success`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectResponse {
    pub success: bool,
    pub message: String,
    pub build_id: Option<BuildId>,
}

impl CollectResponse {
    pub fn queued(build_id: BuildId) -> Self {
        Self {
            success: true,
            message: "New build request added to the queue successfully!".to_string(),
            build_id: Some(build_id),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            build_id: None,
        }
    }
}

/// `{"message": ...}` body used by lookup errors and the route fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageBody {
    pub message: String,
}

impl MessageBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
