//! Generic CRUD repository over any [`Record`] type.
//!
//! # Responsibility
//! - Implement create/update/save/delete/find once for every record type.
//! - Run each operation in exactly one scope, committed once on success.
//! - Write stored state (generated keys, defaults) back onto the caller's
//!   domain value after create/update/save.
//!
//! # Invariants
//! - Key columns are never part of an `UPDATE ... SET` clause.
//! - `save` branches on an existence check, never on a failed insert.
//! - Reads materialize relations through `Record::load_relations` before the
//!   scope closes.
//!
//! No locking is done here: concurrent `save` calls on the same key may both
//! take the create branch, and the loser surfaces `AlreadyExists`.

use super::{Fields, Key, Record};
use crate::db::{ScopedSession, SessionManager};
use crate::error::{StorageError, StorageResult};
use log::debug;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Params};
use std::marker::PhantomData;

pub struct Repository<R: Record> {
    sessions: SessionManager,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> Clone for Repository<R> {
    fn clone(&self) -> Self {
        Self {
            sessions: self.sessions.clone(),
            _record: PhantomData,
        }
    }
}

impl<R: Record> std::fmt::Debug for Repository<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("table", &R::TABLE)
            .finish()
    }
}

impl<R: Record> Repository<R> {
    pub fn new(sessions: SessionManager) -> Self {
        Self {
            sessions,
            _record: PhantomData,
        }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Persists a new record built from `domain`.
    ///
    /// On success `domain` is replaced by the stored projection, so generated
    /// keys and defaults become visible to the caller.
    ///
    /// # Errors
    /// - `AlreadyExists` on unique or primary-key collisions.
    /// - `IntegrityViolation` for other constraint failures.
    pub fn create(&self, domain: &mut R::Domain) -> StorageResult<()> {
        self.create_with(domain, R::Material::default())
    }

    /// [`Repository::create`] with record material not carried by `domain`.
    pub fn create_with(&self, domain: &mut R::Domain, material: R::Material) -> StorageResult<()> {
        let record = R::from_domain(domain, material);
        let stored = self.sessions.scope(|session| {
            let stored = insert_record(session.connection(), &record)?;
            session.commit()?;
            Ok(stored)
        })?;
        debug!(
            "event=repo_create module=repo status=ok table={} key={}",
            R::TABLE,
            stored.primary_key()
        );
        *domain = stored.to_domain();
        Ok(())
    }

    /// Applies `domain` onto the stored record with the same key.
    ///
    /// # Errors
    /// - `NotFound` when no record has the domain's key; nothing is written.
    pub fn update(&self, domain: &mut R::Domain) -> StorageResult<()> {
        let key = self.checked_key(domain_key::<R>(domain))?;
        let stored = self.sessions.scope(|session| {
            let conn = session.connection();
            let mut record = fetch_one::<R>(conn, &key)?
                .ok_or_else(|| not_found::<R>(&key))?;
            let stored = update_record(conn, &mut record, domain)?;
            session.commit()?;
            Ok(stored)
        })?;
        *domain = stored.to_domain();
        Ok(())
    }

    /// Upsert: updates when the domain's key exists, creates otherwise.
    pub fn save(&self, domain: &mut R::Domain) -> StorageResult<()> {
        self.save_with(domain, R::Material::default())
    }

    /// [`Repository::save`] with material used only when creating.
    pub fn save_with(&self, domain: &mut R::Domain, material: R::Material) -> StorageResult<()> {
        let record = R::from_domain(domain, material);
        let key = self.checked_key(record.primary_key())?;
        let stored = self.sessions.scope(|session| {
            let conn = session.connection();
            let stored = match fetch_one::<R>(conn, &key)? {
                Some(mut existing) => update_record(conn, &mut existing, domain)?,
                None => insert_record(conn, &record)?,
            };
            session.commit()?;
            Ok(stored)
        })?;
        *domain = stored.to_domain();
        Ok(())
    }

    /// Removes the record with `key`.
    ///
    /// # Errors
    /// - `NotFound` when no row was affected.
    pub fn delete(&self, key: impl Into<Key>) -> StorageResult<()> {
        let key = self.checked_key(key.into())?;
        self.sessions.scope(|session| {
            let sql = format!(
                "DELETE FROM {} WHERE {}",
                quote_ident(R::TABLE),
                key_clause(R::KEY_COLUMNS, 1)
            );
            let affected = session
                .connection()
                .execute(&sql, params_from_iter(key.parts()))?;
            if affected == 0 {
                return Err(not_found::<R>(&key));
            }
            session.commit()
        })
    }

    /// Loads one record or fails with `NotFound`.
    pub fn get_by_id(&self, key: impl Into<Key>) -> StorageResult<R::Domain> {
        let key = key.into();
        self.find_by_id(key.clone())?
            .ok_or_else(|| not_found::<R>(&key))
    }

    /// Loads one record; absence is `Ok(None)`, not an error.
    pub fn find_by_id(&self, key: impl Into<Key>) -> StorageResult<Option<R::Domain>> {
        let key = self.checked_key(key.into())?;
        self.read(|conn| Ok(fetch_one::<R>(conn, &key)?.map(|record| record.to_domain())))
    }

    /// Every record, fully materialized.
    pub fn find_all(&self) -> StorageResult<Vec<R::Domain>> {
        self.read(|conn| {
            let records = query_records::<R, _>(conn, &select_sql::<R>(), params![])?;
            Ok(records.iter().map(Record::to_domain).collect())
        })
    }

    /// Records whose columns equal every value in `criteria`.
    ///
    /// Empty criteria match every record.
    pub fn find_by(&self, criteria: &Fields) -> StorageResult<Vec<R::Domain>> {
        let (clause, values) = self.criteria_clause(criteria)?;
        self.read(|conn| {
            let sql = match clause {
                Some(clause) => format!("{} WHERE {}", select_sql::<R>(), clause),
                None => select_sql::<R>(),
            };
            let records = query_records::<R, _>(conn, &sql, params_from_iter(values.iter()))?;
            Ok(records.iter().map(Record::to_domain).collect())
        })
    }

    /// Assigns `changes` to the record with `key` in one transaction.
    ///
    /// # Errors
    /// - `InvalidColumn` for unknown columns or key columns (keys are
    ///   immutable).
    /// - `NotFound` when no row was affected.
    pub fn update_fields(&self, key: impl Into<Key>, changes: &Fields) -> StorageResult<()> {
        let key = self.checked_key(key.into())?;
        for (column, _) in changes.iter() {
            self.checked_column(column)?;
            if R::KEY_COLUMNS.contains(&column) {
                return Err(StorageError::InvalidColumn {
                    table: R::TABLE,
                    column: column.to_string(),
                    reason: "key columns are immutable",
                });
            }
        }

        self.sessions.scope(|session| {
            let conn = session.connection();
            if changes.is_empty() {
                fetch_one::<R>(conn, &key)?
                    .ok_or_else(|| not_found::<R>(&key))?;
                return session.commit();
            }

            let assignments = changes
                .iter()
                .enumerate()
                .map(|(index, (column, _))| format!("{} = ?{}", quote_ident(column), index + 1))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!(
                "UPDATE {} SET {} WHERE {}",
                quote_ident(R::TABLE),
                assignments,
                key_clause(R::KEY_COLUMNS, changes.len() + 1)
            );
            let params = changes
                .iter()
                .map(|(_, value)| value)
                .chain(key.parts().iter());
            let affected = conn.execute(&sql, params_from_iter(params))?;
            if affected == 0 {
                return Err(not_found::<R>(&key));
            }
            session.commit()
        })
    }

    /// Number of stored records.
    pub fn count(&self) -> StorageResult<u64> {
        self.read(|conn| {
            let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(R::TABLE));
            let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
            u64::try_from(count).map_err(|_| {
                StorageError::InvalidData(format!("negative row count {count} for {}", R::TABLE))
            })
        })
    }

    fn read<T, F>(&self, operation: F) -> StorageResult<T>
    where
        F: FnOnce(&Connection) -> StorageResult<T>,
    {
        self.sessions.scope(|session: &mut ScopedSession| {
            let value = operation(session.connection())?;
            session.commit()?;
            Ok(value)
        })
    }

    fn checked_key(&self, key: Key) -> StorageResult<Key> {
        if key.len() != R::KEY_COLUMNS.len() {
            return Err(StorageError::KeyMismatch {
                table: R::TABLE,
                expected: R::KEY_COLUMNS.len(),
                actual: key.len(),
            });
        }
        Ok(key)
    }

    fn checked_column<'c>(&self, column: &'c str) -> StorageResult<&'c str> {
        if R::COLUMNS.contains(&column) {
            Ok(column)
        } else {
            Err(StorageError::InvalidColumn {
                table: R::TABLE,
                column: column.to_string(),
                reason: "unknown column",
            })
        }
    }

    fn criteria_clause(&self, criteria: &Fields) -> StorageResult<(Option<String>, Vec<Value>)> {
        let mut conditions = Vec::with_capacity(criteria.len());
        let mut values = Vec::with_capacity(criteria.len());
        for (index, (column, value)) in criteria.iter().enumerate() {
            let column = self.checked_column(column)?;
            // `=` never matches NULL, so NULL criteria use `IS`.
            if *value == Value::Null {
                conditions.push(format!("{} IS ?{}", quote_ident(column), index + 1));
            } else {
                conditions.push(format!("{} = ?{}", quote_ident(column), index + 1));
            }
            values.push(value.clone());
        }
        if conditions.is_empty() {
            Ok((None, values))
        } else {
            Ok((Some(conditions.join(" AND ")), values))
        }
    }
}

fn domain_key<R: Record>(domain: &R::Domain) -> Key {
    R::from_domain(domain, R::Material::default()).primary_key()
}

fn not_found<R: Record>(key: &Key) -> StorageError {
    StorageError::NotFound(format!("{} {}", R::TABLE, key))
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn select_sql<R: Record>() -> String {
    let columns = R::COLUMNS
        .iter()
        .map(|column| quote_ident(column))
        .collect::<Vec<_>>()
        .join(", ");
    format!("SELECT {} FROM {}", columns, quote_ident(R::TABLE))
}

/// `"a" = ?n AND "b" = ?n+1 ...`, zipped positionally with key components.
fn key_clause(columns: &[&str], first_index: usize) -> String {
    columns
        .iter()
        .enumerate()
        .map(|(offset, column)| format!("{} = ?{}", quote_ident(column), first_index + offset))
        .collect::<Vec<_>>()
        .join(" AND ")
}

fn query_records<R: Record, P: Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> StorageResult<Vec<R>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        records.push(R::from_row(row)?);
    }
    R::load_relations(conn, &mut records)?;
    Ok(records)
}

fn fetch_one<R: Record>(conn: &Connection, key: &Key) -> StorageResult<Option<R>> {
    let sql = format!(
        "{} WHERE {} LIMIT 1",
        select_sql::<R>(),
        key_clause(R::KEY_COLUMNS, 1)
    );
    let mut records = query_records::<R, _>(conn, &sql, params_from_iter(key.parts()))?;
    Ok(records.pop())
}

fn insert_record<R: Record>(conn: &Connection, record: &R) -> StorageResult<R> {
    let (columns, values): (Vec<&str>, Vec<Value>) = R::COLUMNS
        .iter()
        .copied()
        .zip(record.values())
        .filter(|(_, value)| *value != Value::Null)
        .unzip();

    let sql = if columns.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES", quote_ident(R::TABLE))
    } else {
        let placeholders = (1..=columns.len())
            .map(|index| format!("?{index}"))
            .collect::<Vec<_>>()
            .join(", ");
        let column_list = columns
            .iter()
            .map(|column| quote_ident(column))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(R::TABLE),
            column_list,
            placeholders
        )
    };

    conn.execute(&sql, params_from_iter(values.iter()))
        .map_err(|err| match StorageError::from(err) {
            StorageError::IntegrityViolation { kind, .. } if kind.is_uniqueness() => {
                StorageError::AlreadyExists(format!("{} {}", R::TABLE, record.primary_key()))
            }
            other => other,
        })?;

    let sql = format!("{} WHERE rowid = ?1", select_sql::<R>());
    let rowid = conn.last_insert_rowid();
    let mut stored = query_records::<R, _>(conn, &sql, [rowid])?;
    stored.pop().ok_or_else(|| {
        StorageError::InvalidData(format!(
            "{} row {rowid} vanished right after insert",
            R::TABLE
        ))
    })
}

/// Persists the non-key columns of `record` after applying `domain`, and
/// returns the reloaded row. The key used is the one stored before update.
fn update_record<R: Record>(
    conn: &Connection,
    record: &mut R,
    domain: &R::Domain,
) -> StorageResult<R> {
    let key = record.primary_key();
    record.update(domain);

    let assignments: Vec<(&str, Value)> = R::COLUMNS
        .iter()
        .copied()
        .zip(record.values())
        .filter(|(column, _)| !R::KEY_COLUMNS.contains(column))
        .collect();

    if !assignments.is_empty() {
        let set_clause = assignments
            .iter()
            .enumerate()
            .map(|(index, (column, _))| format!("{} = ?{}", quote_ident(column), index + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE {} SET {} WHERE {}",
            quote_ident(R::TABLE),
            set_clause,
            key_clause(R::KEY_COLUMNS, assignments.len() + 1)
        );
        let params = assignments
            .iter()
            .map(|(_, value)| value)
            .chain(key.parts().iter());
        conn.execute(&sql, params_from_iter(params))?;
    }

    fetch_one::<R>(conn, &key)?
        .ok_or_else(|| not_found::<R>(&key))
}

#[cfg(test)]
mod tests {
    use super::{key_clause, quote_ident};

    #[test]
    fn key_clause_zips_columns_positionally() {
        assert_eq!(key_clause(&["id"], 1), "\"id\" = ?1");
        assert_eq!(
            key_clause(&["compid0", "compid1"], 3),
            "\"compid0\" = ?3 AND \"compid1\" = ?4"
        );
    }

    #[test]
    fn identifiers_are_quoted() {
        assert_eq!(quote_ident("users"), "\"users\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }
}
