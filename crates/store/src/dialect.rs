//! Per-dialect SQL rendering.
//!
//! SQLite stores timestamps as integer Unix microseconds and has no boolean,
//! array or regex support; PostgreSQL has native `timestamptz`, `boolean` and
//! `text[]`. The differences are confined to this module.

use crate::expr::{ARCHIVE_TABLE, Column, Expr, LABELS_TABLE, LabelTest, SqlValue};

/// SQL flavor of the backing store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    Postgres,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Postgres => "postgres",
        }
    }

    fn bool_literal(&self, value: bool) -> &'static str {
        match (self, value) {
            (Self::Sqlite, true) => "1",
            (Self::Sqlite, false) => "0",
            (Self::Postgres, true) => "TRUE",
            (Self::Postgres, false) => "FALSE",
        }
    }
}

/// A rendered statement and its parameters in placeholder order.
#[derive(Clone, Debug, PartialEq)]
pub struct Compiled {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

/// Incrementally renders a statement for one dialect.
#[derive(Debug)]
pub struct SqlBuilder {
    dialect: Dialect,
    sql: String,
    params: Vec<SqlValue>,
}

impl SqlBuilder {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            sql: String::new(),
            params: Vec::new(),
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Append raw SQL text.
    pub fn push(&mut self, sql: &str) -> &mut Self {
        self.sql.push_str(sql);
        self
    }

    /// Append a placeholder bound to `value`.
    pub fn push_bind(&mut self, value: SqlValue) -> &mut Self {
        self.params.push(value);
        match self.dialect {
            Dialect::Sqlite => self.sql.push('?'),
            Dialect::Postgres => {
                self.sql.push('$');
                self.sql.push_str(&self.params.len().to_string());
            }
        }
        self
    }

    /// Append a comma separated list of placeholders.
    pub fn push_bind_list(&mut self, values: impl IntoIterator<Item = SqlValue>) -> &mut Self {
        for (idx, value) in values.into_iter().enumerate() {
            if idx > 0 {
                self.push(", ");
            }
            self.push_bind(value);
        }
        self
    }

    /// Append a column name. Timestamp columns order chronologically in both
    /// dialects.
    pub fn push_column(&mut self, column: Column) -> &mut Self {
        self.push(column.as_str())
    }

    /// Most recently started first, uid as a tie-breaker.
    pub fn push_order_by_started_desc(&mut self) -> &mut Self {
        self.push(" ORDER BY ")
            .push_column(Column::StartedAt)
            .push(" DESC, uid DESC")
    }

    /// `LIMIT`/`OFFSET`, or nothing when `limit` is zero (unbounded).
    pub fn push_page(&mut self, limit: u32, offset: u32) -> &mut Self {
        if limit == 0 {
            return self;
        }
        self.push(" LIMIT ")
            .push_bind(SqlValue::Int(i64::from(limit)))
            .push(" OFFSET ")
            .push_bind(SqlValue::Int(i64::from(offset)))
    }

    /// Render a conditional expression.
    pub fn push_expr(&mut self, expr: &Expr) -> &mut Self {
        match expr {
            Expr::True => self.push(self.dialect.bool_literal(true)),
            Expr::And(terms) => self.push_junction(terms, " AND ", true),
            Expr::Or(terms) => self.push_junction(terms, " OR ", false),
            Expr::Not(inner) => self.push("NOT (").push_expr(inner).push(")"),
            Expr::Compare { column, op, value } => {
                self.push_column(*column)
                    .push(" ")
                    .push(op.as_str())
                    .push(" ")
                    .push_bind(value.clone())
            }
            Expr::StartsWith { column, prefix } => self.push_starts_with(*column, prefix),
            Expr::Label { present, key, test } => self.push_label(*present, key, test),
            Expr::FinishedBefore { ttl_secs } => self.push_finished_before(*ttl_secs),
        }
    }

    pub fn finish(self) -> Compiled {
        Compiled {
            sql: self.sql,
            params: self.params,
        }
    }

    fn push_junction(&mut self, terms: &[Expr], sep: &str, empty: bool) -> &mut Self {
        if terms.is_empty() {
            return self.push(self.dialect.bool_literal(empty));
        }
        self.push("(");
        for (idx, term) in terms.iter().enumerate() {
            if idx > 0 {
                self.push(sep);
            }
            self.push_expr(term);
        }
        self.push(")")
    }

    fn push_starts_with(&mut self, column: Column, prefix: &str) -> &mut Self {
        match self.dialect {
            // LIKE is case-insensitive in SQLite, so compare the leading characters instead.
            Dialect::Sqlite => self
                .push("substr(")
                .push(column.as_str())
                .push(", 1, ")
                .push_bind(SqlValue::Int(prefix.chars().count() as i64))
                .push(") = ")
                .push_bind(SqlValue::Text(prefix.to_string())),
            Dialect::Postgres => self
                .push(column.as_str())
                .push(" LIKE ")
                .push_bind(SqlValue::Text(format!("{}%", escape_like(prefix))))
                .push(" ESCAPE '\\'"),
        }
    }

    fn push_label(&mut self, present: bool, key: &str, test: &LabelTest) -> &mut Self {
        if !present {
            self.push("NOT ");
        }
        self.push("EXISTS (SELECT 1 FROM ")
            .push(LABELS_TABLE)
            .push(" l WHERE l.cluster_name = ")
            .push(ARCHIVE_TABLE)
            .push(".cluster_name AND l.uid = ")
            .push(ARCHIVE_TABLE)
            .push(".uid AND l.label_key = ")
            .push_bind(SqlValue::Text(key.to_string()));

        match test {
            LabelTest::Any => {}
            LabelTest::Equals(value) => {
                self.push(" AND l.label_value = ")
                    .push_bind(SqlValue::Text(value.clone()));
            }
            LabelTest::In(values) => match self.dialect {
                Dialect::Sqlite => {
                    self.push(" AND l.label_value IN (")
                        .push_bind_list(values.iter().cloned().map(SqlValue::Text))
                        .push(")");
                }
                Dialect::Postgres => {
                    self.push(" AND l.label_value = ANY(")
                        .push_bind(SqlValue::TextArray(values.clone()))
                        .push(")");
                }
            },
            LabelTest::GreaterThan(n) => self.push_label_int_compare(">", *n),
            LabelTest::LessThan(n) => self.push_label_int_compare("<", *n),
        }
        self.push(")")
    }

    /// A label value is an integer when it is an optional sign followed by
    /// decimal digits, leading zeros allowed, with magnitude at most
    /// `i64::MAX`. Other values never satisfy an integer comparison.
    fn push_label_int_compare(&mut self, op: &str, n: i64) {
        match self.dialect {
            Dialect::Sqlite => {
                let digits = "(CASE WHEN substr(l.label_value, 1, 1) IN ('+', '-') \
                              THEN substr(l.label_value, 2) ELSE l.label_value END)";
                let significant = format!("ltrim({digits}, '0')");
                self.push(&format!(
                    " AND {digits} <> '' AND {digits} NOT GLOB '*[^0-9]*' \
                     AND (length({significant}) < {len} OR (length({significant}) = {len} \
                     AND {significant} <= '{max}')) AND CAST(l.label_value AS INTEGER) ",
                    len = I64_MAX_DIGITS.len(),
                    max = I64_MAX_DIGITS,
                ));
            }
            Dialect::Postgres => {
                let value = "CASE WHEN l.label_value ~ '^[+-]?[0-9]+$' \
                             THEN CAST(l.label_value AS NUMERIC) END";
                self.push(&format!(
                    " AND abs({value}) <= {max} AND {value} ",
                    max = I64_MAX_DIGITS,
                ));
            }
        }
        self.push(op).push(" ").push_bind(SqlValue::Int(n));
    }

    fn push_finished_before(&mut self, ttl_secs: i64) -> &mut Self {
        match self.dialect {
            Dialect::Sqlite => self
                .push("finished_at < CAST((julianday('now', ")
                .push_bind(SqlValue::Text(format!("-{ttl_secs} seconds")))
                .push(") - 2440587.5) * 86400000000.0 AS INTEGER)"),
            Dialect::Postgres => self
                .push("finished_at < CURRENT_TIMESTAMP - CAST(")
                .push_bind(SqlValue::Int(ttl_secs))
                .push(" AS DOUBLE PRECISION) * INTERVAL '1 second'"),
        }
    }
}

const I64_MAX_DIGITS: &str = "9223372036854775807";

/// Escape `LIKE` wildcards so the pattern matches literally.
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
