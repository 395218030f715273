//! Concrete work items handed from the payload pipeline to workers.

use serde::{Deserialize, Serialize};

use crate::docgen::{self, Document};
use crate::error::WorkloadError;

/// A keyed CRUD operation ready to run against a store.
///
/// Built once by the pipeline and consumed exactly once by a worker.
#[derive(Debug, Clone)]
pub enum KvPayload {
    Create { key: String, doc: Document },
    Read { key: String },
    Update { key: String, doc: Document },
    Delete { key: String },
}

impl KvPayload {
    pub fn key(&self) -> &str {
        match self {
            KvPayload::Create { key, .. }
            | KvPayload::Read { key }
            | KvPayload::Update { key, .. }
            | KvPayload::Delete { key } => key,
        }
    }

    /// Lowercase operation name used in logs.
    pub fn op_name(&self) -> &'static str {
        match self {
            KvPayload::Create { .. } => "create",
            KvPayload::Read { .. } => "read",
            KvPayload::Update { .. } => "update",
            KvPayload::Delete { .. } => "delete",
        }
    }
}

/// Which secondary-index query the mixed workload issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    ByCategory,
    ByLocalGroup,
}

impl QueryKind {
    /// Document field the query filters on.
    pub fn field(&self) -> &'static str {
        match self {
            QueryKind::ByCategory => "category",
            QueryKind::ByLocalGroup => "localGroup",
        }
    }
}

impl std::str::FromStr for QueryKind {
    type Err = WorkloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "by_category" | "category" => Ok(QueryKind::ByCategory),
            "by_local_group" | "local_group" => Ok(QueryKind::ByLocalGroup),
            other => Err(WorkloadError::InvalidConfig(format!(
                "unknown query kind: {}",
                other
            ))),
        }
    }
}

/// Argument for a secondary-index query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryArg {
    Int(i64),
    Text(String),
}

/// A query operation ready to run against a store.
#[derive(Debug, Clone)]
pub struct QueryPayload {
    pub kind: QueryKind,
    pub arg: QueryArg,
}

impl QueryPayload {
    /// Query whose argument matches the document most recently created at
    /// `bound`, so results track the growing key space.
    pub fn at_bound(kind: QueryKind, bound: i64) -> Self {
        let arg = match kind {
            QueryKind::ByCategory => QueryArg::Int(docgen::category(bound)),
            QueryKind::ByLocalGroup => QueryArg::Text(docgen::local_group(bound)),
        };
        Self { kind, arg }
    }
}
