//! Predicate builders for the scalar list filters.
//!
//! An empty string or a missing bound never constrains the query; it is not
//! an "equals empty" test.

use crate::expr::{CmpOp, Column, Expr, SqlValue};
use std::time::Duration;
use time::{OffsetDateTime, UtcOffset};

pub fn namespace_equal(namespace: &str) -> Expr {
    text_equal(Column::Namespace, namespace)
}

pub fn name_equal(name: &str) -> Expr {
    text_equal(Column::Name, name)
}

pub fn uid_equal(uid: &str) -> Expr {
    Expr::eq(Column::Uid, SqlValue::Text(uid.to_string()))
}

pub fn name_prefix(prefix: &str) -> Expr {
    if prefix.is_empty() {
        Expr::True
    } else {
        Expr::StartsWith {
            column: Column::Name,
            prefix: prefix.to_string(),
        }
    }
}

/// `started_at` strictly inside `(min, max)`; either bound may be absent.
pub fn started_at_range(min: Option<OffsetDateTime>, max: Option<OffsetDateTime>) -> Expr {
    let bound = |op, at: OffsetDateTime| Expr::Compare {
        column: Column::StartedAt,
        op,
        value: SqlValue::Timestamp(to_utc(at)),
    };
    Expr::all([
        min.map_or(Expr::True, |at| bound(CmpOp::Gt, at)),
        max.map_or(Expr::True, |at| bound(CmpOp::Lt, at)),
    ])
}

/// Longest retention period a sweep honors, about 200 years.
pub const MAX_TTL_SECS: u64 = 200 * 365 * 24 * 60 * 60;

/// `finished_at` older than the store clock minus `ttl`, clamped to
/// [`MAX_TTL_SECS`] so the cutoff stays a representable timestamp.
pub fn finished_before(ttl: Duration) -> Expr {
    Expr::FinishedBefore {
        ttl_secs: ttl.as_secs().min(MAX_TTL_SECS) as i64,
    }
}

fn text_equal(column: Column, value: &str) -> Expr {
    if value.is_empty() {
        Expr::True
    } else {
        Expr::eq(column, SqlValue::Text(value.to_string()))
    }
}

/// Timestamps are stored and compared in UTC at microsecond precision, the
/// finest both backends keep.
pub(crate) fn to_utc(at: OffsetDateTime) -> OffsetDateTime {
    let at = at.to_offset(UtcOffset::UTC);
    at.replace_nanosecond(at.nanosecond() / 1_000 * 1_000)
        .unwrap_or(at)
}

/// Microseconds since the Unix epoch, the SQLite storage form of a timestamp.
pub(crate) fn unix_micros(at: OffsetDateTime) -> i64 {
    // Every representable OffsetDateTime fits in i64 microseconds.
    at.unix_timestamp_nanos().div_euclid(1_000) as i64
}
