//! Row mapping: positional column values to domain entities.
//!
//! Column order must match the SELECT/RETURNING lists in [`crate::model::filter`]
//! and [`crate::repository`]:
//! - customer: uuid, name, phone, telegram_id, telegram_tag, created_at
//! - order: uuid, customer_uuid, title, description, weight_kg, length_cm, width_cm,
//!   height_cm, from_location, to_location, tags, price, available_from, created_at

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    errors::Error,
    model::{Customer, Order},
    query::{SqlType, SqlValue},
    Result,
};

pub const CUSTOMER_COLUMNS: usize = 6;
pub const ORDER_COLUMNS: usize = 14;

/// One result row as decoded by the driver adapter.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Row {
    values: Vec<SqlValue>,
}

impl Row {
    pub fn new(values: Vec<SqlValue>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&SqlValue> {
        self.values.get(idx)
    }

    pub fn reader(&self) -> RowReader<'_> {
        RowReader { row: self, next: 0 }
    }
}

impl From<Vec<SqlValue>> for Row {
    fn from(values: Vec<SqlValue>) -> Self {
        Self::new(values)
    }
}

/// Sequential typed access to a [`Row`].
pub struct RowReader<'a> {
    row: &'a Row,
    next: usize,
}

impl<'a> RowReader<'a> {
    fn take(&mut self) -> Result<(usize, &'a SqlValue)> {
        let idx = self.next;
        let row: &'a Row = self.row;
        let v = row.values.get(idx).ok_or_else(|| Error::Decode {
            column: idx,
            reason: format!("row has only {} column(s)", row.len()),
        })?;
        self.next += 1;
        Ok((idx, v))
    }

    fn mismatch(column: usize, expected: SqlType, got: &SqlValue) -> Error {
        let reason = if got.is_null() {
            format!("unexpected NULL, expected {expected:?}")
        } else {
            format!("expected {expected:?}, got {:?}", got.sql_type())
        };
        Error::Decode { column, reason }
    }

    /// Read the next column, mapping NULL to `None`.
    fn optional<T>(
        &mut self,
        expected: SqlType,
        pick: impl FnOnce(&'a SqlValue) -> Option<T>,
    ) -> Result<Option<T>> {
        let (idx, v) = self.take()?;
        if v.is_null() {
            return Ok(None);
        }
        pick(v)
            .map(Some)
            .ok_or_else(|| Self::mismatch(idx, expected, v))
    }

    fn required<T>(
        &mut self,
        expected: SqlType,
        pick: impl FnOnce(&'a SqlValue) -> Option<T>,
    ) -> Result<T> {
        let idx = self.next;
        match self.optional(expected, pick)? {
            Some(v) => Ok(v),
            None => Err(Self::mismatch(idx, expected, &SqlValue::Null(expected))),
        }
    }

    pub fn uuid(&mut self) -> Result<Uuid> {
        self.required(SqlType::Uuid, |v| match v {
            SqlValue::Uuid(u) => Some(*u),
            _ => None,
        })
    }

    pub fn opt_text(&mut self) -> Result<Option<String>> {
        self.optional(SqlType::Text, |v| match v {
            SqlValue::Text(s) => Some(s.clone()),
            _ => None,
        })
    }

    pub fn text(&mut self) -> Result<String> {
        self.required(SqlType::Text, |v| match v {
            SqlValue::Text(s) => Some(s.clone()),
            _ => None,
        })
    }

    pub fn opt_float(&mut self) -> Result<Option<f64>> {
        self.optional(SqlType::Float, |v| match v {
            SqlValue::Float(f) => Some(*f),
            SqlValue::Int(i) => Some(*i as f64),
            _ => None,
        })
    }

    pub fn float(&mut self) -> Result<f64> {
        self.required(SqlType::Float, |v| match v {
            SqlValue::Float(f) => Some(*f),
            SqlValue::Int(i) => Some(*i as f64),
            _ => None,
        })
    }

    pub fn opt_int(&mut self) -> Result<Option<i64>> {
        self.optional(SqlType::Int, |v| match v {
            SqlValue::Int(i) => Some(*i),
            _ => None,
        })
    }

    /// NULL arrays read as empty.
    pub fn text_array(&mut self) -> Result<Vec<String>> {
        Ok(self
            .optional(SqlType::TextArray, |v| match v {
                SqlValue::TextArray(a) => Some(a.clone()),
                _ => None,
            })?
            .unwrap_or_default())
    }

    pub fn opt_timestamp(&mut self) -> Result<Option<DateTime<Utc>>> {
        self.optional(SqlType::Timestamp, |v| match v {
            SqlValue::Timestamp(t) => Some(*t),
            _ => None,
        })
    }

    pub fn timestamp(&mut self) -> Result<DateTime<Utc>> {
        self.required(SqlType::Timestamp, |v| match v {
            SqlValue::Timestamp(t) => Some(*t),
            _ => None,
        })
    }
}

impl Customer {
    pub fn read(r: &mut RowReader<'_>) -> Result<Self> {
        Ok(Self {
            id: r.uuid()?,
            name: r.text()?,
            phone: r.text()?,
            telegram_id: r.opt_int()?,
            telegram_tag: r.opt_text()?,
            created_at: r.timestamp()?,
        })
    }

    pub fn from_row(row: &Row) -> Result<Self> {
        Self::read(&mut row.reader())
    }
}

impl Order {
    /// Read the order columns only; `customer` stays `None`.
    pub fn read(r: &mut RowReader<'_>) -> Result<Self> {
        Ok(Self {
            id: r.uuid()?,
            customer_id: r.uuid()?,
            title: r.text()?,
            description: r.opt_text()?,
            weight_kg: r.float()?,
            length_cm: r.opt_float()?,
            width_cm: r.opt_float()?,
            height_cm: r.opt_float()?,
            from_location: r.opt_text()?,
            to_location: r.opt_text()?,
            tags: r.text_array()?,
            price: r.float()?,
            available_from: r.opt_timestamp()?,
            created_at: r.timestamp()?,
            customer: None,
        })
    }

    pub fn from_row(row: &Row) -> Result<Self> {
        Self::read(&mut row.reader())
    }

    /// Order columns followed by the joined customer columns.
    pub fn from_joined_row(row: &Row) -> Result<Self> {
        let mut r = row.reader();
        let mut order = Self::read(&mut r)?;
        order.customer = Some(Customer::read(&mut r)?);
        Ok(order)
    }
}
