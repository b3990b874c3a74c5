//! Invoice batch export.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::escape_csv;
use crate::db::{Database, DbResult};
use crate::models::BloodInvoice;

/// A batch of invoices for accounting hand-off.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceBatchExport {
    pub exported_at: String,
    pub invoices: Vec<BloodInvoice>,
    pub total_units: i64,
}

impl InvoiceBatchExport {
    /// Export to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Export to CSV format.
    pub fn to_csv(&self) -> String {
        let mut csv = String::new();
        csv.push_str("invoice_id,facility_name,unit_count,issued_by,issued_at\n");
        for invoice in &self.invoices {
            csv.push_str(&format!(
                "{},{},{},{},{}\n",
                escape_csv(&invoice.invoice_id),
                escape_csv(&invoice.facility_name),
                invoice.unit_count,
                escape_csv(&invoice.issued_by),
                escape_csv(&invoice.issued_at),
            ));
        }
        csv
    }
}

/// Invoice exporter.
pub struct InvoiceExporter<'a> {
    db: &'a Database,
}

impl<'a> InvoiceExporter<'a> {
    /// Create a new invoice exporter.
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Export all invoices.
    pub fn export_all(&self) -> DbResult<InvoiceBatchExport> {
        let invoices = self.db.list_invoices()?;
        let total_units = invoices.iter().map(|i| i.unit_count).sum();
        Ok(InvoiceBatchExport {
            exported_at: Utc::now().to_rfc3339(),
            invoices,
            total_units,
        })
    }
}
