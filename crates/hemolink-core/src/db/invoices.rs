//! Blood invoice table operations.

use rusqlite::{params, Connection, OptionalExtension};

use super::{Database, DbResult};
use crate::models::BloodInvoice;

fn map_invoice_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<BloodInvoice> {
    Ok(BloodInvoice {
        invoice_id: row.get(0)?,
        facility_name: row.get(1)?,
        unit_count: row.get(2)?,
        issued_by: row.get(3)?,
        issued_at: row.get(4)?,
    })
}

/// Insert an invoice.
pub fn insert_invoice(conn: &Connection, invoice: &BloodInvoice) -> DbResult<()> {
    conn.execute(
        r#"
        INSERT INTO blood_invoices (invoice_id, facility_name, unit_count, issued_by, issued_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
        params![
            invoice.invoice_id,
            invoice.facility_name,
            invoice.unit_count,
            invoice.issued_by,
            invoice.issued_at,
        ],
    )?;
    Ok(())
}

impl Database {
    /// Get an invoice by id.
    pub fn get_invoice(&self, invoice_id: &str) -> DbResult<Option<BloodInvoice>> {
        self.conn()
            .query_row(
                "SELECT invoice_id, facility_name, unit_count, issued_by, issued_at
                 FROM blood_invoices WHERE invoice_id = ?",
                [invoice_id],
                map_invoice_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// List invoices, newest first.
    pub fn list_invoices(&self) -> DbResult<Vec<BloodInvoice>> {
        let mut stmt = self.conn().prepare(
            "SELECT invoice_id, facility_name, unit_count, issued_by, issued_at
             FROM blood_invoices ORDER BY issued_at DESC",
        )?;
        let rows = stmt.query_map([], map_invoice_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let db = Database::open_in_memory().unwrap();
        let invoice = BloodInvoice::new("City General Hospital".into(), 4, "tech-1".into());
        insert_invoice(db.conn(), &invoice).unwrap();

        let retrieved = db.get_invoice(&invoice.invoice_id).unwrap().unwrap();
        assert_eq!(retrieved.facility_name, "City General Hospital");
        assert_eq!(retrieved.unit_count, 4);

        assert_eq!(db.list_invoices().unwrap().len(), 1);
    }
}
