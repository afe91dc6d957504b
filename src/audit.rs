//! Audit Log - Per-job milestone messages persisted in the destination
//!
//! Every job opens one session against its own backend. Entries go to the
//! `dblog` table (appended, never overwritten) and to the tracing output.

use crate::backend::{Backend, TableMode};
use crate::error::Result;
use crate::schema::{ColumnDescriptor, SemanticType};
use crate::source::RawValue;
use chrono::{SecondsFormat, Utc};
use tracing::{info, warn};
use uuid::Uuid;

pub const AUDIT_TABLE: &str = "dblog";

/// Final state of a session, written as its last entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    Completed,
    Interrupted,
    Failed(String),
}

impl SessionStatus {
    fn message(&self) -> String {
        match self {
            SessionStatus::Completed => "Session completed".to_string(),
            SessionStatus::Interrupted => "Session interrupted".to_string(),
            SessionStatus::Failed(reason) => format!("Session failed: {}", reason),
        }
    }
}

fn audit_fields() -> [ColumnDescriptor; 3] {
    [
        ColumnDescriptor::new("session", "session", SemanticType::Text, true),
        ColumnDescriptor::new("timestamp", "timestamp", SemanticType::Text, false),
        ColumnDescriptor::new("message", "message", SemanticType::Text, false),
    ]
}

#[derive(Debug)]
pub struct AuditSession {
    session: String,
    destination: String,
}

impl AuditSession {
    pub fn open(backend: &mut dyn Backend) -> Result<Self> {
        backend.open_table(AUDIT_TABLE, TableMode::Append)?;
        backend.create_fields(AUDIT_TABLE, &audit_fields())?;
        let session = Self {
            session: Uuid::new_v4().to_string(),
            destination: backend.destination().to_string(),
        };
        session.update_entry(backend, format!("Session {} opened", session.session))?;
        Ok(session)
    }

    pub fn id(&self) -> &str {
        &self.session
    }

    pub fn update_entry(&self, backend: &mut dyn Backend, message: impl AsRef<str>) -> Result<()> {
        let message = message.as_ref();
        info!("[{}] {}", self.destination, message);
        backend.insert_fields(
            AUDIT_TABLE,
            vec![
                RawValue::Text(self.session.clone()),
                RawValue::Text(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
                RawValue::from(message),
            ],
        )
    }

    /// Entry that must not turn an already failing job into a different failure.
    pub fn try_entry(&self, backend: &mut dyn Backend, message: impl AsRef<str>) {
        if let Err(e) = self.update_entry(backend, message) {
            warn!("[{}] Could not write audit entry: {}", self.destination, e);
        }
    }

    pub fn close(self, backend: &mut dyn Backend, status: &SessionStatus) {
        self.try_entry(backend, status.message());
    }
}
