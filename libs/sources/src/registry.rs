use std::collections::HashMap;

use http::HeaderMap;
use http::header;

use crate::verify::VerificationStrategy;

/// Where a source places its signature on the inbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureLocation {
    Header(&'static str),
    Query(&'static str),
}

impl SignatureLocation {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Header(key) | Self::Query(key) => key,
        }
    }
}

/// One authorized source: how to recognize it, where its signature lives,
/// and which scheme verifies it.
#[derive(Debug, Clone, Copy)]
pub struct SourceDescriptor {
    pub source_id: &'static str,
    pub signature_location: SignatureLocation,
    pub strategy: VerificationStrategy,
}

impl SourceDescriptor {
    /// Candidate signature for this source. Headers take precedence over
    /// query parameters when both carry the key.
    pub fn candidate(
        &self,
        headers: &HeaderMap,
        query: &HashMap<String, String>,
    ) -> Option<String> {
        let key = self.signature_location.key();
        if let Some(value) = headers.get(key).and_then(|v| v.to_str().ok()) {
            return Some(value.to_string());
        }
        query.get(key).cloned()
    }
}

/// Process-wide registry of authorized sources. Built once at startup and
/// never mutated.
#[derive(Debug, Clone)]
pub struct SourceRegistry {
    sources: Vec<SourceDescriptor>,
}

impl SourceRegistry {
    /// The fixed deployment-time source set.
    pub fn authorized() -> Self {
        Self {
            sources: vec![
                SourceDescriptor {
                    source_id: "github",
                    signature_location: SignatureLocation::Header("x-hub-signature"),
                    strategy: VerificationStrategy::HmacSha1,
                },
                SourceDescriptor {
                    source_id: "jenkins",
                    signature_location: SignatureLocation::Header("x-jenkins-token"),
                    strategy: VerificationStrategy::StaticToken,
                },
                SourceDescriptor {
                    source_id: "redmine",
                    signature_location: SignatureLocation::Query("secret"),
                    strategy: VerificationStrategy::StaticToken,
                },
            ],
        }
    }

    /// Fingerprints the request. Resolution order is fixed: known
    /// `User-Agent` substrings first, then the jenkins token header, then
    /// the raw `User-Agent` value as an opaque (never authorized) id.
    pub fn identify(&self, headers: &HeaderMap) -> Option<String> {
        let user_agent = headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok());
        if let Some(ua) = user_agent {
            if ua.contains("GitHub-Hookshot") {
                return Some("github".to_string());
            }
        }
        if headers.contains_key("x-jenkins-token") {
            return Some("jenkins".to_string());
        }
        if let Some(ua) = user_agent {
            if ua.contains("Faraday") {
                return Some("redmine".to_string());
            }
        }
        user_agent.map(str::to_string)
    }

    /// `None` means the source is not authorized; dispatch must abort, never
    /// fall through to a default strategy.
    pub fn lookup(&self, source_id: &str) -> Option<&SourceDescriptor> {
        self.sources.iter().find(|s| s.source_id == source_id)
    }
}
