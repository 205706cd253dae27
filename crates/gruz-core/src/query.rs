//! Parameterized statement construction.
//!
//! Filters are lowered into an ordered list of [`Predicate`]s and rendered by a
//! single function ([`Predicates::render`]). Column names and operators are
//! `&'static str`, so the only text that can reach a statement is compiled into
//! the binary; user values travel exclusively through the positional `args`.

use std::fmt;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Default page size when the caller asks for `limit <= 0`.
pub const DEFAULT_LIMIT: i64 = 20;

/// SQL type tag, used to bind typed NULLs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SqlType {
    Int,
    Float,
    Text,
    TextArray,
    Uuid,
    Timestamp,
}

/// A positional argument, or a decoded column value.
#[derive(Clone, Debug, PartialEq)]
pub enum SqlValue {
    Int(i64),
    Float(f64),
    Text(String),
    TextArray(Vec<String>),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    Null(SqlType),
}

impl SqlValue {
    pub fn sql_type(&self) -> SqlType {
        match self {
            SqlValue::Int(_) => SqlType::Int,
            SqlValue::Float(_) => SqlType::Float,
            SqlValue::Text(_) => SqlType::Text,
            SqlValue::TextArray(_) => SqlType::TextArray,
            SqlValue::Uuid(_) => SqlType::Uuid,
            SqlValue::Timestamp(_) => SqlType::Timestamp,
            SqlValue::Null(t) => *t,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null(_))
    }
}

/// Rust types with a fixed SQL counterpart.
pub trait SqlTyped: Into<SqlValue> {
    const SQL_TYPE: SqlType;
}

macro_rules! sql_typed {
    ($ty:ty, $variant:ident) => {
        impl From<$ty> for SqlValue {
            fn from(v: $ty) -> Self {
                SqlValue::$variant(v)
            }
        }

        impl SqlTyped for $ty {
            const SQL_TYPE: SqlType = SqlType::$variant;
        }
    };
}

sql_typed!(i64, Int);
sql_typed!(f64, Float);
sql_typed!(String, Text);
sql_typed!(Vec<String>, TextArray);
sql_typed!(Uuid, Uuid);
sql_typed!(DateTime<Utc>, Timestamp);

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl<T: SqlTyped> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => SqlValue::Null(T::SQL_TYPE),
        }
    }
}

/// Statement text plus its positional arguments (`$1`, `$2`, ...).
#[derive(Clone, Debug, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub args: Vec<SqlValue>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, args: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            args,
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -- {} arg(s)", self.sql, self.args.len())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
    Gte,
    Lte,
    Eq,
    /// Array overlap: at least one element in common.
    Overlaps,
    /// Case-insensitive substring match. The value is already a LIKE pattern.
    Contains,
}

impl Op {
    pub fn as_sql(self) -> &'static str {
        match self {
            Op::Gte => ">=",
            Op::Lte => "<=",
            Op::Eq => "=",
            Op::Overlaps => "&&",
            Op::Contains => "ILIKE",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Predicate {
    pub column: &'static str,
    pub op: Op,
    pub value: SqlValue,
}

/// Ordered predicate list. Absent filter values never produce a predicate.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Predicates {
    items: Vec<Predicate>,
}

impl Predicates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, column: &'static str, op: Op, value: impl Into<SqlValue>) {
        self.items.push(Predicate {
            column,
            op,
            value: value.into(),
        });
    }

    pub fn at_least(&mut self, column: &'static str, bound: Option<f64>) {
        if let Some(v) = bound {
            self.push(column, Op::Gte, v);
        }
    }

    pub fn at_most(&mut self, column: &'static str, bound: Option<f64>) {
        if let Some(v) = bound {
            self.push(column, Op::Lte, v);
        }
    }

    pub fn contains(&mut self, column: &'static str, needle: Option<&str>) {
        match needle {
            Some(s) if !s.is_empty() => self.push(column, Op::Contains, like_pattern(s)),
            _ => {}
        }
    }

    pub fn overlaps(&mut self, column: &'static str, values: &[String]) {
        if !values.is_empty() {
            self.push(column, Op::Overlaps, values.to_vec());
        }
    }

    pub fn equals_int(&mut self, column: &'static str, value: Option<i64>) {
        if let Some(v) = value {
            self.push(column, Op::Eq, v);
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Render as ` AND col op $n` terms, appending values to `args`.
    ///
    /// Placeholder numbers continue from whatever `args` already holds.
    pub fn render(&self, args: &mut Vec<SqlValue>) -> String {
        let mut out = String::new();
        for p in &self.items {
            args.push(p.value.clone());
            out.push_str(&format!(" AND {} {} ${}", p.column, p.op.as_sql(), args.len()));
        }
        out
    }
}

/// Wrap `needle` in `%` after escaping LIKE metacharacters.
pub fn like_pattern(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len() + 2);
    out.push('%');
    for c in needle.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    /// `Desc` only for the exact string `"desc"`.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("desc") => SortDirection::Desc,
            _ => SortDirection::Asc,
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// A whitelisted ORDER BY expression.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrderBy {
    pub expr: &'static str,
    pub direction: SortDirection,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl Pagination {
    pub fn new(page: i64, limit: i64) -> Self {
        Self { page, limit }
    }

    /// Clamp non-positive values to the defaults (page 1, limit 20).
    pub fn normalized(self) -> Self {
        Self {
            page: if self.page <= 0 { 1 } else { self.page },
            limit: if self.limit <= 0 {
                DEFAULT_LIMIT
            } else {
                self.limit
            },
        }
    }

    pub fn offset(self) -> i64 {
        let p = self.normalized();
        (p.page - 1).saturating_mul(p.limit)
    }
}

/// A filtered, sorted, paginated listing over one base relation.
#[derive(Clone, Debug)]
pub struct ListQuery {
    /// Row-select text ending in `WHERE 1=1`.
    pub select: &'static str,
    /// Count text ending in `WHERE 1=1`.
    pub count: &'static str,
    pub predicates: Predicates,
    pub order_by: OrderBy,
    pub pagination: Pagination,
}

/// Row and count statements built from the same predicate set.
#[derive(Clone, Debug, PartialEq)]
pub struct ListStatements {
    pub rows: Statement,
    pub count: Statement,
    /// The normalized page actually requested by `rows`.
    pub pagination: Pagination,
}

impl ListQuery {
    pub fn build(&self) -> ListStatements {
        let pagination = self.pagination.normalized();

        let mut args = Vec::with_capacity(self.predicates.len() + 2);
        let mut sql = String::from(self.select);
        sql.push_str(&self.predicates.render(&mut args));
        sql.push_str(&format!(
            " ORDER BY {} {}",
            self.order_by.expr,
            self.order_by.direction.as_sql()
        ));
        args.push(SqlValue::Int(pagination.limit));
        sql.push_str(&format!(" LIMIT ${}", args.len()));
        args.push(SqlValue::Int(pagination.offset()));
        sql.push_str(&format!(" OFFSET ${}", args.len()));

        let mut count_args = Vec::with_capacity(self.predicates.len());
        let mut count_sql = String::from(self.count);
        count_sql.push_str(&self.predicates.render(&mut count_args));

        ListStatements {
            rows: Statement::new(sql, args),
            count: Statement::new(count_sql, count_args),
            pagination,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_query(predicates: Predicates, pagination: Pagination) -> ListQuery {
        ListQuery {
            select: "SELECT x FROM t WHERE 1=1",
            count: "SELECT COUNT(*) FROM t WHERE 1=1",
            predicates,
            order_by: OrderBy {
                expr: "t.created_at",
                direction: SortDirection::Desc,
            },
            pagination,
        }
    }

    #[test]
    fn absent_values_produce_no_predicates() {
        let mut p = Predicates::new();
        p.at_least("t.a", None);
        p.at_most("t.a", None);
        p.contains("t.b", None);
        p.contains("t.b", Some(""));
        p.overlaps("t.c", &[]);
        p.equals_int("t.d", None);
        assert!(p.is_empty());
    }

    #[test]
    fn zero_bound_is_a_real_bound() {
        let mut p = Predicates::new();
        p.at_least("t.price", Some(0.0));
        assert_eq!(p.len(), 1);
    }

    #[test]
    fn render_numbers_placeholders_after_existing_args() {
        let mut p = Predicates::new();
        p.at_least("t.a", Some(1.0));
        p.equals_int("t.d", Some(7));

        let mut args = vec![SqlValue::Int(99)];
        let sql = p.render(&mut args);
        assert_eq!(sql, " AND t.a >= $2 AND t.d = $3");
        assert_eq!(args.len(), 3);
    }

    #[test]
    fn like_pattern_escapes_metacharacters() {
        assert_eq!(like_pattern("Kazan"), "%Kazan%");
        assert_eq!(like_pattern("50%_off\\"), "%50\\%\\_off\\\\%");
    }

    #[test]
    fn pagination_clamps_non_positive_values() {
        for (page, limit) in [(0, 0), (-3, -1), (0, 5), (2, 0)] {
            let p = Pagination::new(page, limit).normalized();
            assert!(p.page >= 1);
            assert!(p.limit >= 1);
        }
        assert_eq!(Pagination::new(0, 0).normalized(), Pagination::new(1, 20));
        assert_eq!(Pagination::new(3, 10).offset(), 20);
        assert_eq!(Pagination::new(-1, -1).offset(), 0);
    }

    #[test]
    fn count_statement_shares_predicates_but_not_paging() {
        let mut p = Predicates::new();
        p.at_least("t.a", Some(1.0));
        p.contains("t.b", Some("x"));
        let built = sample_query(p, Pagination::new(2, 5)).build();

        assert_eq!(
            built.rows.sql,
            "SELECT x FROM t WHERE 1=1 AND t.a >= $1 AND t.b ILIKE $2 ORDER BY t.created_at DESC LIMIT $3 OFFSET $4"
        );
        assert_eq!(
            built.count.sql,
            "SELECT COUNT(*) FROM t WHERE 1=1 AND t.a >= $1 AND t.b ILIKE $2"
        );
        assert_eq!(built.rows.args[..2], built.count.args[..]);
        assert_eq!(built.rows.args[2..], [SqlValue::Int(5), SqlValue::Int(5)]);
    }

    #[test]
    fn limit_and_offset_are_always_last() {
        let built = sample_query(Predicates::new(), Pagination::new(0, 0)).build();
        assert!(built.rows.sql.ends_with("LIMIT $1 OFFSET $2"));
        assert_eq!(built.rows.args, vec![SqlValue::Int(20), SqlValue::Int(0)]);
        assert!(built.count.args.is_empty());
        assert_eq!(built.pagination, Pagination::new(1, 20));
    }

    #[test]
    fn optional_values_become_typed_nulls() {
        assert_eq!(SqlValue::from(None::<f64>), SqlValue::Null(SqlType::Float));
        assert_eq!(SqlValue::from(Some(2.5)), SqlValue::Float(2.5));
        assert_eq!(SqlValue::from(None::<String>).sql_type(), SqlType::Text);
    }

    #[test]
    fn sort_direction_is_desc_only_for_exact_desc() {
        assert_eq!(SortDirection::parse(Some("desc")), SortDirection::Desc);
        assert_eq!(SortDirection::parse(Some("DESC")), SortDirection::Asc);
        assert_eq!(SortDirection::parse(Some("asc")), SortDirection::Asc);
        assert_eq!(SortDirection::parse(None), SortDirection::Asc);
    }
}
