//! Formulary database operations.

use rusqlite::{params, OptionalExtension};

use super::{Database, DbError, DbResult};
use crate::models::FormularyEntry;

impl Database {
    /// Insert or update a formulary entry.
    pub fn upsert_formulary_entry(&self, entry: &FormularyEntry) -> DbResult<()> {
        let aliases_json = serde_json::to_string(&entry.aliases)?;

        self.conn.execute(
            r#"
            INSERT INTO formulary (code, generic_name, aliases, active, updated_at)
            VALUES (?1, ?2, ?3, ?4, datetime('now'))
            ON CONFLICT(code) DO UPDATE SET
                generic_name = excluded.generic_name,
                aliases = excluded.aliases,
                active = excluded.active,
                updated_at = datetime('now')
            "#,
            params![entry.code, entry.generic_name, aliases_json, entry.active],
        )?;
        Ok(())
    }

    /// Get a formulary entry by code.
    pub fn get_formulary_entry(&self, code: &str) -> DbResult<Option<FormularyEntry>> {
        let result = self
            .conn
            .query_row(
                "SELECT code, generic_name, aliases, active FROM formulary WHERE code = ?",
                [code],
                |row| {
                    Ok(FormularyRow {
                        code: row.get(0)?,
                        generic_name: row.get(1)?,
                        aliases: row.get(2)?,
                        active: row.get(3)?,
                    })
                },
            )
            .optional()?;

        result.map(|row| row.try_into()).transpose()
    }

    /// Search the formulary using FTS5 (BM25 ranking, prefix matching).
    pub fn search_formulary(&self, query: &str, limit: usize) -> DbResult<Vec<FormularyEntry>> {
        let escaped_query = escape_fts_query(query);
        if escaped_query.is_empty() {
            return Ok(Vec::new());
        }

        let mut stmt = self.conn.prepare(
            r#"
            SELECT f.code, f.generic_name, f.aliases, f.active,
                   bm25(formulary_fts) as rank
            FROM formulary f
            JOIN formulary_fts fts ON f.rowid = fts.rowid
            WHERE formulary_fts MATCH ?
            AND f.active = 1
            ORDER BY rank
            LIMIT ?
            "#,
        )?;

        let rows = stmt.query_map(params![escaped_query, limit as i64], |row| {
            Ok(FormularyRow {
                code: row.get(0)?,
                generic_name: row.get(1)?,
                aliases: row.get(2)?,
                active: row.get(3)?,
            })
        })?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?.try_into()?);
        }
        Ok(entries)
    }

    /// Resolve a free-text medicine name to a formulary code.
    ///
    /// Matches the generic name or any alias, ignoring case and surrounding
    /// whitespace. Inactive entries never resolve.
    pub fn resolve_formulary_code(&self, name: &str) -> DbResult<Option<String>> {
        let needle = name.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(None);
        }

        let code = self
            .conn
            .query_row(
                r#"
                SELECT f.code FROM formulary f
                WHERE f.active = 1
                AND (
                    lower(f.generic_name) = ?1
                    OR EXISTS (
                        SELECT 1 FROM json_each(f.aliases) a
                        WHERE lower(a.value) = ?1
                    )
                )
                ORDER BY f.code
                LIMIT 1
                "#,
                [needle],
                |row| row.get(0),
            )
            .optional()?;
        Ok(code)
    }

    /// Mark an entry inactive (soft delete).
    pub fn deactivate_formulary_entry(&self, code: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE formulary SET active = 0, updated_at = datetime('now') WHERE code = ?",
            [code],
        )?;
        Ok(rows_affected > 0)
    }
}

/// Intermediate row struct for database mapping.
struct FormularyRow {
    code: String,
    generic_name: String,
    aliases: String,
    active: bool,
}

impl TryFrom<FormularyRow> for FormularyEntry {
    type Error = DbError;

    fn try_from(row: FormularyRow) -> Result<Self, Self::Error> {
        Ok(FormularyEntry {
            code: row.code,
            generic_name: row.generic_name,
            aliases: serde_json::from_str(&row.aliases)?,
            active: row.active,
        })
    }
}

/// Strip FTS5 operators and turn each word into a prefix match.
fn escape_fts_query(query: &str) -> String {
    let cleaned: String = query
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();

    cleaned
        .split_whitespace()
        .map(|word| format!("{}*", word))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.upsert_formulary_entry(
            &FormularyEntry::new("N02BE01".into(), "Paracetamol".into())
                .with_aliases(["Crocin", "Dolo 650", "Calpol"]),
        )
        .unwrap();
        db.upsert_formulary_entry(
            &FormularyEntry::new("M01AE01".into(), "Ibuprofen".into()).with_aliases(["Brufen"]),
        )
        .unwrap();
        db
    }

    #[test]
    fn test_upsert_and_get() {
        let db = seeded_db();

        let entry = db.get_formulary_entry("N02BE01").unwrap().unwrap();
        assert_eq!(entry.generic_name, "Paracetamol");
        assert_eq!(entry.aliases, vec!["Crocin", "Dolo 650", "Calpol"]);

        let updated = FormularyEntry::new("N02BE01".into(), "Acetaminophen".into());
        db.upsert_formulary_entry(&updated).unwrap();
        let entry = db.get_formulary_entry("N02BE01").unwrap().unwrap();
        assert_eq!(entry.generic_name, "Acetaminophen");
        assert!(entry.aliases.is_empty());
    }

    #[test]
    fn test_search_formulary() {
        let db = seeded_db();

        let results = db.search_formulary("parac", 10).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].code, "N02BE01");

        let results = db.search_formulary("brufen", 10).unwrap();
        assert_eq!(results[0].code, "M01AE01");

        assert!(db.search_formulary("\"*", 10).unwrap().is_empty());
    }

    #[test]
    fn test_resolve_code_by_name_or_alias() {
        let db = seeded_db();

        assert_eq!(
            db.resolve_formulary_code("paracetamol").unwrap().as_deref(),
            Some("N02BE01")
        );
        assert_eq!(
            db.resolve_formulary_code("  CROCIN ").unwrap().as_deref(),
            Some("N02BE01")
        );
        assert_eq!(db.resolve_formulary_code("Azithromycin").unwrap(), None);
        assert_eq!(db.resolve_formulary_code("").unwrap(), None);
    }

    #[test]
    fn test_inactive_entry_does_not_resolve() {
        let db = seeded_db();
        db.deactivate_formulary_entry("M01AE01").unwrap();

        assert_eq!(db.resolve_formulary_code("ibuprofen").unwrap(), None);
        assert!(db.search_formulary("ibu", 10).unwrap().is_empty());
        assert!(!db.get_formulary_entry("M01AE01").unwrap().unwrap().active);
    }
}
