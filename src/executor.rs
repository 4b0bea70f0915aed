//! Asynchronous execution façade.
//!
//! The core translation is pure; this module is the single place that
//! suspends. It owns a Postgres connection pool, binds parameter values by
//! name to the translation's placeholder positions, and streams result
//! rows. Dropping the stream closes the cursor and returns the pooled
//! connection, so cancellation is cooperative.

use std::collections::HashMap;
use std::pin::Pin;
use std::task::{Context, Poll};

use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use futures_util::{Stream, TryStreamExt};
use serde_json::Value;
use thiserror::Error;
use tokio_postgres::types::{to_sql_checked, IsNull, ToSql, Type};
use tokio_postgres::{NoTls, Row, RowStream};
use uuid::Uuid;

use crate::config::PgrafConfig;
use crate::diagnostics::TranslateError;
use crate::{translate_with_options, TranslateOptions, Translation};

#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error(transparent)]
    Translate(#[from] TranslateError),
    #[error("missing value for parameter `{0}`")]
    MissingParameter(String),
    #[error("unsupported value for parameter `{0}`")]
    UnsupportedValue(String),
    #[error("pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),
    #[error("pool build error: {0}")]
    PoolBuild(String),
    #[error("database error: {0}")]
    Database(#[from] tokio_postgres::Error),
}

/// A parameter value on its way to the wire.
#[derive(Debug, Clone)]
pub enum BindValue {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    TextArray(Vec<String>),
    Json(Value),
    Null,
}

impl BindValue {
    fn from_json(name: &str, value: &Value) -> Result<BindValue, ExecuteError> {
        match value {
            Value::String(s) => Ok(BindValue::Text(s.clone())),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(BindValue::Int(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(BindValue::Float(f))
                } else {
                    Err(ExecuteError::UnsupportedValue(name.to_string()))
                }
            }
            Value::Bool(b) => Ok(BindValue::Bool(*b)),
            Value::Null => Ok(BindValue::Null),
            Value::Array(items) => {
                // Text arrays cover the `IN $list` and label-list cases;
                // anything heterogeneous ships as jsonb.
                let mut texts = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::String(s) => texts.push(s.clone()),
                        _ => return Ok(BindValue::Json(value.clone())),
                    }
                }
                Ok(BindValue::TextArray(texts))
            }
            Value::Object(_) => Ok(BindValue::Json(value.clone())),
        }
    }
}

impl ToSql for BindValue {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut bytes::BytesMut,
    ) -> Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            BindValue::Text(s) => s.to_sql(ty, out),
            BindValue::Int(i) => i.to_sql(ty, out),
            BindValue::Float(f) => f.to_sql(ty, out),
            BindValue::Bool(b) => b.to_sql(ty, out),
            BindValue::TextArray(items) => items.to_sql(ty, out),
            BindValue::Json(v) => v.to_sql(ty, out),
            BindValue::Null => Ok(IsNull::Yes),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

/// Streaming query result; holds its pooled connection for as long as rows
/// are being consumed.
pub struct QueryStream {
    _client: Object,
    rows: Pin<Box<RowStream>>,
}

impl Stream for QueryStream {
    type Item = Result<Row, tokio_postgres::Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rows.as_mut().poll_next(cx)
    }
}

/// A node row decoded from a `SELECT <alias>.*` projection.
#[derive(Debug, Clone)]
pub struct NodeRow {
    pub id: Uuid,
    pub labels: Vec<String>,
    pub properties: Value,
}

impl NodeRow {
    pub fn from_row(row: &Row) -> Result<NodeRow, tokio_postgres::Error> {
        Ok(NodeRow {
            id: row.try_get("id")?,
            labels: row.try_get("labels")?,
            properties: row.try_get("properties")?,
        })
    }
}

/// Cypher access to a pgraf database: translate then execute.
pub struct PgrafCypher {
    pool: Pool,
    options: TranslateOptions,
}

impl PgrafCypher {
    /// Build the connection pool; no connection is opened until the first
    /// query.
    pub fn connect(config: PgrafConfig) -> Result<Self, ExecuteError> {
        let pg_config: tokio_postgres::Config = config.url.parse()?;
        let manager = Manager::from_config(
            pg_config,
            NoTls,
            ManagerConfig {
                recycling_method: RecyclingMethod::Fast,
            },
        );
        let pool = Pool::builder(manager)
            .max_size(config.pool_max_size)
            .build()
            .map_err(|e| ExecuteError::PoolBuild(e.to_string()))?;
        Ok(PgrafCypher {
            pool,
            options: config.translate_options(),
        })
    }

    /// Pure translation with this façade's options.
    pub fn translate(&self, source: &str) -> Result<Translation, TranslateError> {
        translate_with_options(source, &self.options)
    }

    /// Translate and execute, streaming rows as the database produces them.
    pub async fn execute(
        &self,
        source: &str,
        bindings: &HashMap<String, Value>,
    ) -> Result<QueryStream, ExecuteError> {
        let translation = self.translate(source)?;
        let values = bind_parameters(&translation, bindings)?;

        let client = self.pool.get().await?;
        let statement = client.prepare(&translation.sql).await?;
        log::debug!(
            "executing translated query with {} parameter(s): {}",
            values.len(),
            translation.sql
        );
        let rows = client.query_raw(&statement, values.iter()).await?;
        Ok(QueryStream {
            _client: client,
            rows: Box::pin(rows),
        })
    }

    /// Convenience wrapper collecting every row.
    pub async fn fetch_all(
        &self,
        source: &str,
        bindings: &HashMap<String, Value>,
    ) -> Result<Vec<Row>, ExecuteError> {
        let stream = self.execute(source, bindings).await?;
        Ok(stream.try_collect().await?)
    }

    /// Collect rows shaped like `SELECT <alias>.*` over the nodes table.
    pub async fn fetch_nodes(
        &self,
        source: &str,
        bindings: &HashMap<String, Value>,
    ) -> Result<Vec<NodeRow>, ExecuteError> {
        let rows = self.fetch_all(source, bindings).await?;
        let mut nodes = Vec::with_capacity(rows.len());
        for row in &rows {
            nodes.push(NodeRow::from_row(row)?);
        }
        Ok(nodes)
    }
}

/// Match binding values to placeholder positions by parameter name.
fn bind_parameters(
    translation: &Translation,
    bindings: &HashMap<String, Value>,
) -> Result<Vec<BindValue>, ExecuteError> {
    let mut values = Vec::with_capacity(translation.parameters.len());
    for (name, _position) in translation.parameters.iter() {
        let value = bindings
            .get(name)
            .ok_or_else(|| ExecuteError::MissingParameter(name.to_string()))?;
        values.push(BindValue::from_json(name, value)?);
    }
    Ok(values)
}
