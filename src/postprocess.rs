//! Post-processing passes run once per job after its imports are committed.

use crate::audit::{AuditSession, AUDIT_TABLE};
use crate::backend::Backend;
use crate::error::Result;
use crate::interrupt::Interrupt;
use tracing::info;

pub trait PostProcessor: Send + Sync {
    fn name(&self) -> &str;

    fn process(&self, backend: &mut dyn Backend, audit: &AuditSession, interrupt: &Interrupt) -> Result<()>;
}

/// Logs and audits the row count of every table in the destination.
pub struct TableSummary;

impl PostProcessor for TableSummary {
    fn name(&self) -> &str {
        "table summary"
    }

    fn process(&self, backend: &mut dyn Backend, audit: &AuditSession, interrupt: &Interrupt) -> Result<()> {
        for table in backend.table_names()? {
            if table == AUDIT_TABLE {
                continue;
            }
            interrupt.check("post-processing")?;
            let rows = backend.count(&table)?;
            info!("[{}] {} rows", table, rows);
            audit.update_entry(backend, format!("Table [{}] holds {} rows", table, rows))?;
        }
        Ok(())
    }
}
