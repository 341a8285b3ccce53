mod schema;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, ToSql, TransactionBehavior};

use crate::error::Result;
use crate::models::*;
use crate::resolve::{self, ContactFilter, ContactStore};

const CONTACT_COLUMNS: &str =
    "id, phone_number, email, linked_id, link_precedence, created_at, updated_at, deleted_at";

/// SQLite-backed contact store.
///
/// Cloning is cheap; clones share one connection behind a mutex.
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: PathBuf) -> anyhow::Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Database path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_default() -> anyhow::Result<Self> {
        Self::open(Self::default_path()?)
    }

    /// `<data dir>/identify/contacts.db` for the current user.
    pub fn default_path() -> anyhow::Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("", "", "identify")
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        Ok(dirs.data_dir().join("contacts.db"))
    }

    pub fn open_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn migrate(&self) -> anyhow::Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        schema::run_migrations(&conn)
    }

    // ============================================================
    // Identity resolution
    // ============================================================

    /// Resolve `observation` into an identity inside one immediate transaction.
    ///
    /// Holding the connection lock and SQLite's write lock for the whole
    /// match + merge keeps concurrent requests with overlapping identifiers
    /// from each creating a primary. Any failure rolls back every write made
    /// by this call.
    pub fn identify(&self, observation: &Observation) -> Result<IdentityView> {
        let mut conn = self.conn.lock().expect("database lock poisoned");
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let view = resolve::identify(&*tx, observation)?;
        tx.commit()?;
        Ok(view)
    }

    // ============================================================
    // Contact operations
    // ============================================================

    pub fn find_contacts(&self, filter: &ContactFilter) -> Result<Vec<Contact>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        conn.find_contacts(filter)
    }

    pub fn create_contact(&self, input: NewContact) -> Result<Contact> {
        let conn = self.conn.lock().expect("database lock poisoned");
        conn.create_contact(input)
    }

    /// Fetch a contact by id, including soft-deleted ones.
    pub fn get_contact(&self, id: i64) -> Result<Option<Contact>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let contact = conn
            .query_row(
                &format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE id = ?"),
                [id],
                contact_from_row,
            )
            .optional()?;
        Ok(contact)
    }

    /// Mark a contact deleted. Returns false if it does not exist or was
    /// already deleted.
    pub fn soft_delete_contact(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let now = format_datetime(now());
        let rows = conn.execute(
            "UPDATE contacts SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
            (&now, &now, id),
        )?;
        Ok(rows > 0)
    }

    /// Remove every contact and restart id assignment. Returns the number of
    /// contacts removed.
    pub fn reset(&self) -> Result<usize> {
        let mut conn = self.conn.lock().expect("database lock poisoned");
        let tx = conn.transaction()?;
        let rows = tx.execute("DELETE FROM contacts", [])?;
        tx.execute("DELETE FROM sqlite_sequence WHERE name = 'contacts'", [])?;
        tx.commit()?;
        Ok(rows)
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
        }
    }
}

impl ContactStore for Connection {
    fn find_contacts(&self, filter: &ContactFilter) -> Result<Vec<Contact>> {
        if filter.is_empty() {
            return Ok(Vec::new());
        }

        let mut clauses = Vec::new();
        let mut params: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(email) = &filter.email {
            clauses.push("email = ?".to_string());
            params.push(Box::new(email.clone()));
        }
        if let Some(phone_number) = &filter.phone_number {
            clauses.push("phone_number = ?".to_string());
            params.push(Box::new(phone_number.clone()));
        }
        if !filter.ids.is_empty() {
            clauses.push(format!("id IN ({})", placeholders(filter.ids.len())));
            params.extend(filter.ids.iter().map(|id| Box::new(*id) as Box<dyn ToSql>));
        }
        if !filter.linked_ids.is_empty() {
            clauses.push(format!("linked_id IN ({})", placeholders(filter.linked_ids.len())));
            params.extend(filter.linked_ids.iter().map(|id| Box::new(*id) as Box<dyn ToSql>));
        }

        let sql = format!(
            "SELECT {CONTACT_COLUMNS} FROM contacts
             WHERE deleted_at IS NULL AND ({})
             ORDER BY created_at, id",
            clauses.join(" OR ")
        );
        let params_ref: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let mut stmt = self.prepare(&sql)?;
        let contacts = stmt
            .query_map(params_ref.as_slice(), contact_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(contacts)
    }

    fn create_contact(&self, input: NewContact) -> Result<Contact> {
        let now = now();

        self.execute(
            "INSERT INTO contacts (phone_number, email, linked_id, link_precedence, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            (
                &input.phone_number,
                &input.email,
                input.linked_id,
                input.link_precedence.as_str(),
                format_datetime(now),
                format_datetime(now),
            ),
        )?;

        Ok(Contact {
            id: self.last_insert_rowid(),
            phone_number: input.phone_number,
            email: input.email,
            linked_id: input.linked_id,
            link_precedence: input.link_precedence,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        })
    }

    fn link_to_primary(&self, contact: &mut Contact, primary_id: i64) -> Result<()> {
        let now = now();

        let rows = self.execute(
            "UPDATE contacts SET link_precedence = ?, linked_id = ?, updated_at = ? WHERE id = ?",
            (
                LinkPrecedence::Secondary.as_str(),
                primary_id,
                format_datetime(now),
                contact.id,
            ),
        )?;
        if rows == 0 {
            return Err(rusqlite::Error::QueryReturnedNoRows.into());
        }

        contact.link_precedence = LinkPrecedence::Secondary;
        contact.linked_id = Some(primary_id);
        contact.updated_at = now;
        Ok(())
    }
}

fn contact_from_row(row: &Row<'_>) -> rusqlite::Result<Contact> {
    Ok(Contact {
        id: row.get(0)?,
        phone_number: row.get(1)?,
        email: row.get(2)?,
        linked_id: row.get(3)?,
        link_precedence: LinkPrecedence::from_str(&row.get::<_, String>(4)?)
            .unwrap_or(LinkPrecedence::Primary),
        created_at: parse_datetime(5, &row.get::<_, String>(5)?)?,
        updated_at: parse_datetime(6, &row.get::<_, String>(6)?)?,
        deleted_at: row
            .get::<_, Option<String>>(7)?
            .map(|s| parse_datetime(7, &s))
            .transpose()?,
    })
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// Current time at the precision timestamps are stored with.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Fixed-width RFC 3339, so lexical order in SQL matches time order.
fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Timestamps decide which contact is canonical, so an unreadable one is an
/// error rather than a guess.
fn parse_datetime(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
