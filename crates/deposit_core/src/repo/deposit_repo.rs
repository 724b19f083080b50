//! Deposit repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide the durable `add + commit` capability for deposits.
//! - Provide read-back by id and per-user listing.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - `create_deposit` returns `Ok` only after the transaction committed.
//! - A failed write leaves no partial row behind.
//! - Write paths call `Deposit::validate()` before SQL mutations.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::db::migrations::{current_user_version, latest_version};
use crate::db::DbError;
use crate::model::deposit::{Deposit, DepositId, DepositValidationError, UserId};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use rust_decimal::Decimal;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const DEPOSIT_SELECT_SQL: &str = "SELECT
    id,
    user_id,
    amount,
    created_at
FROM deposits";

const REQUIRED_DEPOSIT_COLUMNS: &[&str] = &["id", "user_id", "amount", "created_at"];

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for deposit persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(DepositValidationError),
    Db(DbError),
    NotFound(DepositId),
    InvalidData(String),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "deposit not found: {id}"),
            Self::InvalidData(message) => {
                write!(f, "invalid persisted deposit data: {message}")
            }
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection schema version {actual_version} does not match expected {expected_version}; open it through db::open_db"
            ),
            Self::MissingRequiredTable(table) => write!(f, "required table `{table}` is missing"),
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "required column `{table}.{column}` is missing")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound(_)
            | Self::InvalidData(_)
            | Self::UninitializedConnection { .. }
            | Self::MissingRequiredTable(_)
            | Self::MissingRequiredColumn { .. } => None,
        }
    }
}

impl From<DepositValidationError> for RepoError {
    fn from(value: DepositValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Query options for listing deposits.
#[derive(Debug, Clone, Default)]
pub struct DepositListQuery {
    pub user_id: Option<UserId>,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Durable deposit store.
///
/// `create_deposit` is the store's `add(deposit); commit()` unit: it either
/// records the deposit durably or leaves nothing behind.
pub trait DepositRepository {
    fn create_deposit(&self, deposit: &Deposit) -> RepoResult<DepositId>;
    fn get_deposit(&self, id: DepositId) -> RepoResult<Option<Deposit>>;
    fn list_deposits(&self, query: &DepositListQuery) -> RepoResult<Vec<Deposit>>;
    fn count_deposits(&self, user_id: Option<UserId>) -> RepoResult<u64>;
}

impl<R: DepositRepository + ?Sized> DepositRepository for &R {
    fn create_deposit(&self, deposit: &Deposit) -> RepoResult<DepositId> {
        (**self).create_deposit(deposit)
    }

    fn get_deposit(&self, id: DepositId) -> RepoResult<Option<Deposit>> {
        (**self).get_deposit(id)
    }

    fn list_deposits(&self, query: &DepositListQuery) -> RepoResult<Vec<Deposit>> {
        (**self).list_deposits(query)
    }

    fn count_deposits(&self, user_id: Option<UserId>) -> RepoResult<u64> {
        (**self).count_deposits(user_id)
    }
}

/// SQLite-backed deposit repository.
pub struct SqliteDepositRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDepositRepository<'conn> {
    /// Wraps a connection that was bootstrapped by `db::open_db*`.
    ///
    /// # Errors
    /// - `UninitializedConnection` when migrations were not applied.
    /// - `MissingRequiredTable` / `MissingRequiredColumn` when the schema
    ///   does not carry the deposit layout.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        let expected_version = latest_version();
        let actual_version = current_user_version(conn)?;
        if actual_version != expected_version {
            return Err(RepoError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }

        ensure_deposits_schema(conn)?;
        Ok(Self { conn })
    }
}

impl DepositRepository for SqliteDepositRepository<'_> {
    fn create_deposit(&self, deposit: &Deposit) -> RepoResult<DepositId> {
        deposit.validate()?;

        // Dropping the transaction on an early return rolls it back.
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO deposits (
                id,
                user_id,
                amount,
                created_at
            ) VALUES (?1, ?2, ?3, ?4);",
            params![
                deposit.id.to_string(),
                deposit.user_id.to_string(),
                deposit.amount.to_string(),
                deposit.created_at_ms,
            ],
        )?;
        tx.commit()?;

        Ok(deposit.id)
    }

    fn get_deposit(&self, id: DepositId) -> RepoResult<Option<Deposit>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{DEPOSIT_SELECT_SQL} WHERE id = ?1;"))?;

        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_deposit_row(row)?));
        }

        Ok(None)
    }

    fn list_deposits(&self, query: &DepositListQuery) -> RepoResult<Vec<Deposit>> {
        let mut sql = format!("{DEPOSIT_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(user_id) = query.user_id {
            sql.push_str(" AND user_id = ?");
            bind_values.push(Value::Text(user_id.to_string()));
        }

        sql.push_str(" ORDER BY created_at ASC, id ASC");

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
            if query.offset > 0 {
                sql.push_str(" OFFSET ?");
                bind_values.push(Value::Integer(i64::from(query.offset)));
            }
        } else if query.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut deposits = Vec::new();

        while let Some(row) = rows.next()? {
            deposits.push(parse_deposit_row(row)?);
        }

        Ok(deposits)
    }

    fn count_deposits(&self, user_id: Option<UserId>) -> RepoResult<u64> {
        let count: i64 = match user_id {
            Some(user_id) => self.conn.query_row(
                "SELECT COUNT(*) FROM deposits WHERE user_id = ?1;",
                [user_id.to_string()],
                |row| row.get(0),
            )?,
            None => self
                .conn
                .query_row("SELECT COUNT(*) FROM deposits;", [], |row| row.get(0))?,
        };

        u64::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("negative deposit count `{count}`")))
    }
}

fn ensure_deposits_schema(conn: &Connection) -> RepoResult<()> {
    let table_exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'deposits'
        );",
        [],
        |row| row.get(0),
    )?;
    if table_exists != 1 {
        return Err(RepoError::MissingRequiredTable("deposits"));
    }

    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info('deposits');")?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    for &required in REQUIRED_DEPOSIT_COLUMNS {
        if !columns.iter().any(|column| column == required) {
            return Err(RepoError::MissingRequiredColumn {
                table: "deposits",
                column: required,
            });
        }
    }

    Ok(())
}

fn parse_deposit_row(row: &Row<'_>) -> RepoResult<Deposit> {
    let id = parse_uuid_column(row, "id")?;
    let user_id = parse_uuid_column(row, "user_id")?;

    let amount_text: String = row.get("amount")?;
    let amount = Decimal::from_str_exact(&amount_text).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid amount value `{amount_text}` in deposits.amount"
        ))
    })?;

    let deposit = Deposit::with_id(id, user_id, amount, row.get("created_at")?)?;
    Ok(deposit)
}

fn parse_uuid_column(row: &Row<'_>, column: &'static str) -> RepoResult<Uuid> {
    let text: String = row.get(column)?;
    Uuid::parse_str(&text).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid value `{text}` in deposits.{column}"))
    })
}

#[cfg(test)]
mod tests {
    use super::{DepositRepository, RepoError, SqliteDepositRepository};
    use crate::db::open_db_in_memory;
    use crate::model::deposit::Deposit;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    #[test]
    fn create_is_rolled_back_when_insert_fails() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteDepositRepository::try_new(&conn).unwrap();

        let deposit = Deposit::new(Uuid::new_v4(), Decimal::new(1_000, 2));
        repo.create_deposit(&deposit).unwrap();

        let err = repo.create_deposit(&deposit).unwrap_err();
        assert!(matches!(err, RepoError::Db(_)));
        assert_eq!(repo.count_deposits(None).unwrap(), 1);
        assert!(conn.is_autocommit(), "failed write must not leave a tx open");
    }

    #[test]
    fn corrupted_amount_is_reported_as_invalid_data() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteDepositRepository::try_new(&conn).unwrap();

        let deposit = Deposit::new(Uuid::new_v4(), Decimal::ONE);
        repo.create_deposit(&deposit).unwrap();
        conn.execute("UPDATE deposits SET amount = 'ten';", [])
            .unwrap();

        let err = repo.get_deposit(deposit.id).unwrap_err();
        assert!(matches!(err, RepoError::InvalidData(message) if message.contains("ten")));
    }
}
