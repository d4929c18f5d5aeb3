use std::collections::HashMap;

use serde_json::{Map, Value};
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Column, Row, Sqlite};

use super::{QueryExecutor, QueryParams, RepositoryError};
use crate::DbPool;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl QueryRows {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// `col | col` header followed by one line per row.
    pub fn render(&self) -> String {
        if self.rows.is_empty() {
            return "No rows returned.".to_string();
        }
        std::iter::once(self.columns.join(" | "))
            .chain(self.rows.iter().map(|row| row.join(" | ")))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub struct SqliteQueryExecutor {
    pool: DbPool,
}

impl SqliteQueryExecutor {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl QueryExecutor for SqliteQueryExecutor {
    async fn execute(&self, sql: &str, params: &QueryParams) -> Result<QueryRows, RepositoryError> {
        let (statement, values) = match params {
            QueryParams::None => (sql.to_string(), Vec::new()),
            QueryParams::Positional(values) => (sql.to_string(), values.clone()),
            QueryParams::Named(map) => number_named_parameters(sql, map)?,
        };

        let query = values.into_iter().fold(sqlx::query(&statement), bind_json);
        let rows = query.fetch_all(&self.pool).await?;

        let columns = rows
            .first()
            .map(|row| row.columns().iter().map(|column| column.name().to_string()).collect())
            .unwrap_or_default();
        let rows = rows.iter().map(render_row).collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(
            event_name = "db.query.executed",
            row_count = rows.len(),
            "guarded query executed"
        );
        Ok(QueryRows { columns, rows })
    }
}

fn bind_json<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: Value,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(flag) => query.bind(flag),
        Value::Number(number) => match number.as_i64() {
            Some(integer) => query.bind(integer),
            None => query.bind(number.as_f64().unwrap_or_default()),
        },
        Value::String(text) => query.bind(text),
        other => query.bind(other.to_string()),
    }
}

fn render_row(row: &SqliteRow) -> Result<Vec<String>, RepositoryError> {
    (0..row.len()).map(|index| render_cell(row, index)).collect()
}

fn render_cell(row: &SqliteRow, index: usize) -> Result<String, RepositoryError> {
    if let Ok(value) = row.try_get::<Option<i64>, _>(index) {
        return Ok(value.map_or_else(null, |value| value.to_string()));
    }
    if let Ok(value) = row.try_get::<Option<f64>, _>(index) {
        return Ok(value.map_or_else(null, |value| value.to_string()));
    }
    if let Ok(value) = row.try_get::<Option<String>, _>(index) {
        return Ok(value.unwrap_or_else(null));
    }
    row.try_get::<Option<Vec<u8>>, _>(index)
        .map(|value| value.map_or_else(null, |bytes| format!("<{} bytes>", bytes.len())))
        .map_err(|error| RepositoryError::Decode(format!("column {index}: {error}")))
}

fn null() -> String {
    "NULL".to_string()
}

/// Rewrites `:name`, `@name` and `$name` placeholders to `?N` numbered by first
/// appearance and returns the values in that order. Quoted text is left alone.
fn number_named_parameters(
    sql: &str,
    params: &Map<String, Value>,
) -> Result<(String, Vec<Value>), RepositoryError> {
    let chars: Vec<char> = sql.chars().collect();
    let mut rewritten = String::with_capacity(sql.len());
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut values = Vec::new();
    let mut quote: Option<char> = None;
    let mut index = 0;

    while index < chars.len() {
        let current = chars[index];
        if let Some(open) = quote {
            if current == open {
                quote = None;
            }
            rewritten.push(current);
            index += 1;
            continue;
        }
        if current == '\'' || current == '"' {
            quote = Some(current);
            rewritten.push(current);
            index += 1;
            continue;
        }

        let starts_name = matches!(current, ':' | '@' | '$')
            && chars.get(index + 1).is_some_and(|next| next.is_ascii_alphabetic() || *next == '_');
        if !starts_name {
            rewritten.push(current);
            index += 1;
            continue;
        }

        let end = (index + 1..chars.len())
            .find(|&cursor| !(chars[cursor].is_ascii_alphanumeric() || chars[cursor] == '_'))
            .unwrap_or(chars.len());
        let name: String = chars[index + 1..end].iter().collect();
        let position = match positions.get(&name) {
            Some(position) => *position,
            None => {
                let value = params.get(&name).cloned().ok_or_else(|| {
                    RepositoryError::Decode(format!("missing value for parameter `{name}`"))
                })?;
                values.push(value);
                positions.insert(name, values.len());
                values.len()
            }
        };
        rewritten.push_str(&format!("?{position}"));
        index = end;
    }

    Ok((rewritten, values))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{number_named_parameters, QueryRows};
    use crate::repositories::{QueryExecutor, QueryParams, SqliteQueryExecutor};
    use crate::{connect_with_settings, migrations::run_pending};

    async fn seeded_executor() -> SqliteQueryExecutor {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");
        SqliteQueryExecutor::new(pool)
    }

    #[tokio::test]
    async fn renders_header_and_rows() {
        let executor = seeded_executor().await;
        let rows = executor
            .execute("SELECT name, price FROM products ORDER BY id", &QueryParams::None)
            .await
            .expect("select");

        assert_eq!(
            rows.render(),
            "name | price\nWidget A | 10.5\nWidget B | 25\nGadget X | 99.99"
        );
    }

    #[tokio::test]
    async fn binds_positional_parameters() {
        let executor = seeded_executor().await;
        let params = QueryParams::Positional(vec![json!(20)]);
        let rows = executor
            .execute("SELECT name FROM products WHERE price > ? ORDER BY price", &params)
            .await
            .expect("select");

        assert_eq!(rows.rows, vec![vec!["Widget B".to_string()], vec!["Gadget X".to_string()]]);
    }

    #[tokio::test]
    async fn binds_named_parameters_and_reports_empty_results() {
        let executor = seeded_executor().await;
        let params = QueryParams::from_json(Some(&json!({ "name": "Nothing Here" }))).expect("params");
        let rows = executor
            .execute("SELECT id FROM products WHERE name = :name", &params)
            .await
            .expect("select");

        assert!(rows.is_empty());
        assert_eq!(rows.render(), "No rows returned.");
    }

    #[tokio::test]
    async fn null_cells_render_as_null() {
        let executor = seeded_executor().await;
        let rows = executor
            .execute("SELECT NULL AS nothing, COUNT(*) AS total FROM products", &QueryParams::None)
            .await
            .expect("select");

        assert_eq!(rows.render(), "nothing | total\nNULL | 3");
    }

    #[test]
    fn named_parameters_are_numbered_by_first_appearance() {
        let params = json!({ "low": 1, "high": 50 });
        let map = params.as_object().expect("object");
        let (sql, values) = number_named_parameters(
            "SELECT * FROM t WHERE a > :low AND b < @high AND c <> ':low' AND d > $low",
            map,
        )
        .expect("rewrite");

        assert_eq!(sql, "SELECT * FROM t WHERE a > ?1 AND b < ?2 AND c <> ':low' AND d > ?1");
        assert_eq!(values, vec![json!(1), json!(50)]);
    }

    #[test]
    fn missing_named_parameter_is_an_error() {
        let params = json!({});
        let map = params.as_object().expect("object");
        assert!(number_named_parameters("SELECT :missing", map).is_err());
        assert_eq!(QueryRows::default().render(), "No rows returned.");
    }
}
