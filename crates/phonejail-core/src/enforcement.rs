//! Contract with the OS-level blocking backend.
//!
//! The backend itself lives outside this crate. Implementations must treat
//! `deactivate` as idempotent: stopping enforcement that is not running is
//! a success.

use async_trait::async_trait;
use thiserror::Error;

use crate::schema::{BlockingCondition, ContentSelection, SchemaId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnforcementError {
    #[error("not authorized to enforce restrictions")]
    NotAuthorized,

    #[error("enforcement failed: {0}")]
    Failed(String),
}

#[async_trait]
pub trait EnforcementAdapter: Send + Sync {
    /// Begin blocking `content` for the schema under `conditions`.
    async fn activate(
        &self,
        schema_id: SchemaId,
        content: &ContentSelection,
        conditions: &[BlockingCondition],
    ) -> Result<(), EnforcementError>;

    /// Stop blocking for the schema.
    async fn deactivate(&self, schema_id: SchemaId) -> Result<(), EnforcementError>;
}
