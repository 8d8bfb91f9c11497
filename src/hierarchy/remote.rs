//! Hierarchy provider backed by an HTTP ontology service.
//!
//! Issues `GET {endpoint}?type={semantic_type}` and expects a JSON array of
//! type names, most specific first. A 404 means the service does not know
//! the type.

use std::time::Duration;

use super::{HierarchyProvider, HierarchyResult};
use crate::error::HierarchyError;

/// Default request timeout, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct RemoteHierarchy {
    endpoint: String,
    agent: ureq::Agent,
}

impl RemoteHierarchy {
    pub fn new(endpoint: impl Into<String>, timeout_secs: u64) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(timeout_secs))
            .build();
        Self {
            endpoint: endpoint.into(),
            agent,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn provider_err(semantic_type: &str, message: impl Into<String>) -> HierarchyError {
        HierarchyError::Provider {
            semantic_type: semantic_type.to_string(),
            message: message.into(),
        }
    }
}

impl HierarchyProvider for RemoteHierarchy {
    fn ancestors_of(&self, semantic_type: &str) -> HierarchyResult<Vec<String>> {
        let request = self.agent.get(&self.endpoint).query("type", semantic_type);

        match request.call() {
            Ok(response) => {
                let body = response
                    .into_string()
                    .map_err(|e| Self::provider_err(semantic_type, format!("failed to read body: {e}")))?;
                serde_json::from_str::<Vec<String>>(&body).map_err(|e| {
                    Self::provider_err(semantic_type, format!("expected a JSON array of types: {e}"))
                })
            }
            Err(ureq::Error::Status(404, _)) => Err(HierarchyError::UnknownType {
                semantic_type: semantic_type.to_string(),
            }),
            Err(ureq::Error::Status(code, response)) => {
                let body = response.into_string().unwrap_or_default();
                let preview: String = body.chars().take(200).collect();
                Err(Self::provider_err(
                    semantic_type,
                    format!("HTTP error {code}: {preview}"),
                ))
            }
            Err(ureq::Error::Transport(transport)) => Err(Self::provider_err(
                semantic_type,
                format!("transport error: {transport}"),
            )),
        }
    }
}
