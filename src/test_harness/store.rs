//! Store access
//!
//! The harness only needs four things from the data store: execute a
//! statement, fetch rows, close, and a bounded wait until it accepts
//! connections. `StoreConnection` is that seam; `MysqlStore` implements it
//! over the MySQL wire protocol, which ColumnStore speaks.

use super::config::{RetryPolicy, StoreSettings};
use super::error::{TestHarnessError, TestHarnessResult};
use async_trait::async_trait;
use mysql_async::prelude::Queryable;
use mysql_async::{Conn, Opts, OptsBuilder, Value};
use std::fmt;

/// Typed scalar read from the store
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Integer(i64),
    UnsignedInteger(u64),
    Float(f64),
    Text(String),
    Temporal(String),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Text form used for comparison; `None` for null
    pub fn to_text(&self) -> Option<String> {
        match self {
            FieldValue::Null => None,
            FieldValue::Integer(i) => Some(i.to_string()),
            FieldValue::UnsignedInteger(u) => Some(u.to_string()),
            FieldValue::Float(f) => Some(f.to_string()),
            FieldValue::Text(s) | FieldValue::Temporal(s) => Some(s.clone()),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_text() {
            Some(text) => write!(f, "'{}'", text),
            None => write!(f, "NULL"),
        }
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        match value {
            Value::NULL => FieldValue::Null,
            Value::Bytes(bytes) => FieldValue::Text(String::from_utf8_lossy(&bytes).into_owned()),
            Value::Int(i) => FieldValue::Integer(i),
            Value::UInt(u) => FieldValue::UnsignedInteger(u),
            Value::Float(f) => FieldValue::Float(f as f64),
            Value::Double(d) => FieldValue::Float(d),
            Value::Date(year, month, day, hour, minute, second, micros) => {
                let mut text = format!(
                    "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                    year, month, day, hour, minute, second
                );
                if micros > 0 {
                    text.push_str(&format!(".{:06}", micros));
                }
                FieldValue::Temporal(text)
            }
            Value::Time(negative, days, hours, minutes, seconds, micros) => {
                let total_hours = days * 24 + u32::from(hours);
                let mut text = format!(
                    "{}{:02}:{:02}:{:02}",
                    if negative { "-" } else { "" },
                    total_hours,
                    minutes,
                    seconds
                );
                if micros > 0 {
                    text.push_str(&format!(".{:06}", micros));
                }
                FieldValue::Temporal(text)
            }
        }
    }
}

/// One row as returned by the store
pub type StoreRow = Vec<FieldValue>;

/// Minimal query capability the harness drives
#[async_trait]
pub trait StoreConnection: Send {
    /// Execute a statement, discarding any result set
    async fn execute(&mut self, statement: &str) -> TestHarnessResult<()>;

    /// Run a query and return all rows
    async fn query(&mut self, statement: &str) -> TestHarnessResult<Vec<StoreRow>>;

    /// Release the connection
    async fn close(&mut self) -> TestHarnessResult<()>;
}

/// MySQL-protocol store connection
pub struct MysqlStore {
    conn: Option<Conn>,
}

impl MysqlStore {
    /// Open a single connection
    pub async fn connect(settings: &StoreSettings) -> TestHarnessResult<Self> {
        let conn = Conn::new(opts(settings))
            .await
            .map_err(|e| TestHarnessError::StoreError {
                statement: "CONNECT".to_string(),
                message: e.to_string(),
            })?;
        Ok(Self { conn: Some(conn) })
    }

    fn conn(&mut self, statement: &str) -> TestHarnessResult<&mut Conn> {
        self.conn.as_mut().ok_or_else(|| TestHarnessError::StoreError {
            statement: statement.to_string(),
            message: "connection already closed".to_string(),
        })
    }
}

#[async_trait]
impl StoreConnection for MysqlStore {
    async fn execute(&mut self, statement: &str) -> TestHarnessResult<()> {
        log::debug!("Executing: {}", statement);
        self.conn(statement)?
            .query_drop(statement)
            .await
            .map_err(|e| TestHarnessError::StoreError {
                statement: statement.to_string(),
                message: e.to_string(),
            })
    }

    async fn query(&mut self, statement: &str) -> TestHarnessResult<Vec<StoreRow>> {
        log::debug!("Querying: {}", statement);
        let rows: Vec<mysql_async::Row> = self
            .conn(statement)?
            .query(statement)
            .await
            .map_err(|e| TestHarnessError::StoreError {
                statement: statement.to_string(),
                message: e.to_string(),
            })?;

        Ok(rows
            .into_iter()
            .map(|row| {
                (0..row.len())
                    .map(|idx| {
                        row.as_ref(idx)
                            .cloned()
                            .map(FieldValue::from)
                            .unwrap_or(FieldValue::Null)
                    })
                    .collect()
            })
            .collect())
    }

    async fn close(&mut self) -> TestHarnessResult<()> {
        if let Some(conn) = self.conn.take() {
            conn.disconnect().await?;
        }
        Ok(())
    }
}

/// Connect, retrying up to `policy.attempts` times
///
/// Exhausting the attempts is a `ConnectionError`, which aborts the whole
/// run before any case executes.
pub async fn connect_with_retry(
    settings: &StoreSettings,
    policy: RetryPolicy,
) -> TestHarnessResult<MysqlStore> {
    let attempts = policy.attempts.max(1);
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        match MysqlStore::connect(settings).await {
            Ok(store) => {
                log::info!(
                    "Connected to {}:{} (attempt {}/{})",
                    settings.host,
                    settings.port,
                    attempt,
                    attempts
                );
                return Ok(store);
            }
            Err(e) => {
                last_error = e.to_string();
                log::debug!(
                    "Connection attempt {}/{} to {}:{} failed: {}",
                    attempt,
                    attempts,
                    settings.host,
                    settings.port,
                    last_error
                );
                if attempt < attempts {
                    tokio::time::sleep(policy.interval).await;
                }
            }
        }
    }

    Err(TestHarnessError::ConnectionError {
        host: settings.host.clone(),
        port: settings.port,
        attempts,
        message: last_error,
    })
}

/// Quote a table name for use in generated statements
///
/// Qualified names (`db.table`) are quoted per part.
pub fn quote_identifier(name: &str) -> String {
    name.split('.')
        .map(|part| format!("`{}`", part.replace('`', "``")))
        .collect::<Vec<_>>()
        .join(".")
}

fn opts(settings: &StoreSettings) -> Opts {
    let password = if settings.password.is_empty() {
        None
    } else {
        Some(settings.password.clone())
    };

    OptsBuilder::default()
        .ip_or_hostname(settings.host.clone())
        .tcp_port(settings.port)
        .user(Some(settings.user.clone()))
        .pass(password)
        .db_name(Some(settings.database.clone()))
        .into()
}
