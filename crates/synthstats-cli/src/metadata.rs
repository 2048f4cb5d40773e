use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use synthstats_core::{EnvelopeMeta, ProviderId, ValidationError};
use uuid::Uuid;

pub const SCHEMA_VERSION: &str = "v1.0.0";

/// Request identifier (UUID v4) stamped on every envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// Command metadata used to construct envelope metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub request_id: RequestId,
    pub source_chain: Vec<ProviderId>,
    pub latency_ms: u64,
    pub warnings: Vec<String>,
}

impl Metadata {
    pub fn new(source_chain: Vec<ProviderId>, latency_ms: u64) -> Result<Self, ValidationError> {
        if source_chain.is_empty() {
            return Err(ValidationError::EmptySourceChain);
        }

        Ok(Self {
            request_id: RequestId::new_v4(),
            source_chain,
            latency_ms,
            warnings: Vec::new(),
        })
    }

    /// Reuses one request id across the snapshots of a single run.
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = request_id;
        self
    }

    pub fn push_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn into_envelope_meta(self) -> EnvelopeMeta {
        EnvelopeMeta::new(
            self.request_id.to_string(),
            SCHEMA_VERSION,
            self.source_chain,
            self.latency_ms,
        )
        .with_warnings(self.warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_id_is_uuid_v4() {
        let request_id = RequestId::new_v4();
        assert_eq!(request_id.0.get_version_num(), 4);
    }

    #[test]
    fn empty_source_chain_is_rejected() {
        assert_eq!(
            Metadata::new(Vec::new(), 0),
            Err(ValidationError::EmptySourceChain)
        );
    }

    #[test]
    fn warnings_carry_into_envelope_meta() {
        let mut metadata = Metadata::new(vec![ProviderId::Fixture], 12).expect("valid metadata");
        metadata.push_warning("fixture data");
        let request_id = metadata.request_id.to_string();

        let meta = metadata.into_envelope_meta();
        assert_eq!(meta.request_id, request_id);
        assert_eq!(meta.schema_version, SCHEMA_VERSION);
        assert_eq!(meta.latency_ms, 12);
        assert_eq!(meta.warnings, vec![String::from("fixture data")]);
    }
}
