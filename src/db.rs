use crate::errors::{ServiceError, ServiceResult};
use crate::models::PricingInputs;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

pub type DbPool = Arc<Mutex<Connection>>;

const SCHEMA: &str = include_str!("../migrations/001_init.sql");

const OPTION_COLUMNS: &str = "id, name, strike, time_to_maturity, risk_free_rate, volatility, future_price, option_type, black76_price, priced_at";

pub fn init_db(data_dir: &Path, file_name: &str) -> ServiceResult<DbPool> {
    std::fs::create_dir_all(data_dir)?;
    let db_path = data_dir.join(file_name);
    let conn = Connection::open(&db_path)?;

    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
    conn.execute_batch(SCHEMA)?;

    tracing::info!("database initialized at {}", db_path.display());
    Ok(Arc::new(Mutex::new(conn)))
}

/// Throwaway store with the same schema; nothing touches disk.
pub fn init_memory_db() -> ServiceResult<DbPool> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch(SCHEMA)?;
    Ok(Arc::new(Mutex::new(conn)))
}

fn lock(db: &DbPool) -> ServiceResult<MutexGuard<'_, Connection>> {
    db.lock().map_err(|e| ServiceError::Database(format!("lock poisoned: {e}")))
}

// ── Row types ──

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct OptionRecord {
    pub id: i64,
    pub name: String,
    pub strike: f64,
    pub time_to_maturity: f64,
    pub risk_free_rate: f64,
    pub volatility: f64,
    pub future_price: f64,
    pub option_type: String,
    pub black76_price: Option<f64>,
    pub priced_at: Option<String>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct NewOption {
    pub name: String,
    pub strike: f64,
    #[serde(alias = "maturity")]
    pub time_to_maturity: f64,
    pub risk_free_rate: f64,
    pub volatility: f64,
    pub future_price: f64,
    pub option_type: String,
    #[serde(default)]
    pub black76_price: Option<f64>,
}

/// Partial update. Absent (or null) fields are left as stored.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct OptionPatch {
    pub name: Option<String>,
    pub strike: Option<f64>,
    #[serde(alias = "maturity")]
    pub time_to_maturity: Option<f64>,
    pub risk_free_rate: Option<f64>,
    pub volatility: Option<f64>,
    pub future_price: Option<f64>,
    pub option_type: Option<String>,
    pub black76_price: Option<f64>,
}

impl OptionPatch {
    fn touches_pricing_inputs(&self) -> bool {
        self.strike.is_some()
            || self.time_to_maturity.is_some()
            || self.risk_free_rate.is_some()
            || self.volatility.is_some()
            || self.future_price.is_some()
            || self.option_type.is_some()
    }
}

impl From<&OptionRecord> for PricingInputs {
    fn from(rec: &OptionRecord) -> Self {
        PricingInputs::from_parts(
            rec.future_price,
            rec.strike,
            rec.time_to_maturity,
            rec.risk_free_rate,
            rec.volatility,
            &rec.option_type,
        )
    }
}

fn row_to_option(row: &rusqlite::Row<'_>) -> rusqlite::Result<OptionRecord> {
    Ok(OptionRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        strike: row.get(2)?,
        time_to_maturity: row.get(3)?,
        risk_free_rate: row.get(4)?,
        volatility: row.get(5)?,
        future_price: row.get(6)?,
        option_type: row.get(7)?,
        black76_price: row.get(8)?,
        priced_at: row.get(9)?,
    })
}

fn get_option_inner(conn: &Connection, id: i64) -> ServiceResult<Option<OptionRecord>> {
    let sql = format!("SELECT {OPTION_COLUMNS} FROM options WHERE id = ?1");
    let rec = conn
        .query_row(&sql, rusqlite::params![id], row_to_option)
        .optional()?;
    Ok(rec)
}

// ── Store operations ──

pub fn insert_option(db: &DbPool, new: &NewOption) -> ServiceResult<OptionRecord> {
    let conn = lock(db)?;
    conn.execute(
        "INSERT INTO options (name, strike, time_to_maturity, risk_free_rate, volatility, future_price, option_type, black76_price)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        rusqlite::params![
            new.name, new.strike, new.time_to_maturity, new.risk_free_rate,
            new.volatility, new.future_price, new.option_type, new.black76_price
        ],
    )?;
    let id = conn.last_insert_rowid();
    tracing::debug!(id, name = %new.name, "option inserted");

    get_option_inner(&conn, id)?
        .ok_or_else(|| ServiceError::Database(format!("inserted option {id} vanished")))
}

pub fn list_options(db: &DbPool, offset: usize, limit: usize) -> ServiceResult<Vec<OptionRecord>> {
    let offset = i64::try_from(offset)
        .map_err(|_| ServiceError::InvalidRequest(format!("offset must be at most {}", i64::MAX)))?;
    let limit = i64::try_from(limit)
        .map_err(|_| ServiceError::InvalidRequest(format!("limit must be at most {}", i64::MAX)))?;

    let conn = lock(db)?;
    let sql = format!("SELECT {OPTION_COLUMNS} FROM options ORDER BY id LIMIT ?1 OFFSET ?2");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params![limit, offset], row_to_option)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub fn get_option(db: &DbPool, id: i64) -> ServiceResult<Option<OptionRecord>> {
    let conn = lock(db)?;
    get_option_inner(&conn, id)
}

/// Applies only the fields present in `patch`. Changing any pricing input
/// clears a stored price unless the patch supplies a new one.
pub fn update_option(db: &DbPool, id: i64, patch: &OptionPatch) -> ServiceResult<Option<OptionRecord>> {
    let conn = lock(db)?;

    let mut sets: Vec<&'static str> = Vec::new();
    let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(v) = &patch.name {
        sets.push("name");
        params.push(Box::new(v.clone()));
    }
    if let Some(v) = patch.strike {
        sets.push("strike");
        params.push(Box::new(v));
    }
    if let Some(v) = patch.time_to_maturity {
        sets.push("time_to_maturity");
        params.push(Box::new(v));
    }
    if let Some(v) = patch.risk_free_rate {
        sets.push("risk_free_rate");
        params.push(Box::new(v));
    }
    if let Some(v) = patch.volatility {
        sets.push("volatility");
        params.push(Box::new(v));
    }
    if let Some(v) = patch.future_price {
        sets.push("future_price");
        params.push(Box::new(v));
    }
    if let Some(v) = &patch.option_type {
        sets.push("option_type");
        params.push(Box::new(v.clone()));
    }
    match patch.black76_price {
        Some(v) => {
            sets.push("black76_price");
            params.push(Box::new(v));
            sets.push("priced_at");
            params.push(Box::new(None::<String>));
        }
        None if patch.touches_pricing_inputs() => {
            sets.push("black76_price");
            params.push(Box::new(None::<f64>));
            sets.push("priced_at");
            params.push(Box::new(None::<String>));
        }
        None => {}
    }

    if sets.is_empty() {
        return get_option_inner(&conn, id);
    }

    let assignments = sets
        .iter()
        .enumerate()
        .map(|(i, col)| format!("{col} = ?{}", i + 1))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!("UPDATE options SET {assignments} WHERE id = ?{}", sets.len() + 1);
    params.push(Box::new(id));

    let changed = conn.execute(&sql, rusqlite::params_from_iter(params.iter()))?;
    if changed == 0 {
        return Ok(None);
    }
    tracing::debug!(id, fields = ?sets, "option updated");
    get_option_inner(&conn, id)
}

pub fn delete_option(db: &DbPool, id: i64) -> ServiceResult<bool> {
    let conn = lock(db)?;
    let changed = conn.execute("DELETE FROM options WHERE id = ?1", rusqlite::params![id])?;
    tracing::debug!(id, deleted = changed > 0, "option delete");
    Ok(changed > 0)
}

/// Prices the stored record and writes the result while holding the
/// connection, so no update can land between the read and the write.
/// `None` when the record does not exist; a pricing failure leaves it untouched.
pub fn reprice_option<P>(
    db: &DbPool,
    id: i64,
    priced_at: &str,
    pricer: P,
) -> ServiceResult<Option<OptionRecord>>
where
    P: FnOnce(&OptionRecord) -> ServiceResult<f64>,
{
    let conn = lock(db)?;
    let Some(record) = get_option_inner(&conn, id)? else {
        return Ok(None);
    };
    let price = pricer(&record)?;

    conn.execute(
        "UPDATE options SET black76_price = ?1, priced_at = ?2 WHERE id = ?3",
        rusqlite::params![price, priced_at, id],
    )?;
    tracing::debug!(id, price, "black-76 price stored");
    get_option_inner(&conn, id)
}
