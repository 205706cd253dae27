//! Partial `UPDATE ... SET` construction from sparse inputs.

use uuid::Uuid;

use crate::{
    errors::Error,
    model::{UpdateCustomerInput, UpdateOrderInput},
    query::{SqlValue, Statement},
    Result,
};

/// Ordered `column = value` assignments for the fields that are present.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UpdateSet {
    assignments: Vec<(&'static str, SqlValue)>,
}

impl UpdateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `column = value` when `value` is present.
    pub fn set<T: Into<SqlValue>>(&mut self, column: &'static str, value: Option<T>) {
        if let Some(v) = value {
            self.assignments.push((column, v.into()));
        }
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// `UPDATE table SET a = $1, ... WHERE id_column = $n RETURNING returning`.
    ///
    /// An empty set is rejected with [`Error::InvalidUpdate`]: `SET` with no
    /// assignments is not valid SQL and always means a caller mistake.
    pub fn build(
        self,
        table: &'static str,
        id_column: &'static str,
        id: Uuid,
        returning: &'static str,
    ) -> Result<Statement> {
        if self.assignments.is_empty() {
            return Err(Error::InvalidUpdate);
        }

        let mut args = Vec::with_capacity(self.assignments.len() + 1);
        let mut sets = Vec::with_capacity(self.assignments.len());
        for (column, value) in self.assignments {
            args.push(value);
            sets.push(format!("{column} = ${}", args.len()));
        }
        args.push(SqlValue::Uuid(id));

        let sql = format!(
            "UPDATE {table} SET {} WHERE {id_column} = ${} RETURNING {returning}",
            sets.join(", "),
            args.len()
        );
        Ok(Statement::new(sql, args))
    }
}

impl UpdateOrderInput {
    pub fn to_update_set(&self) -> UpdateSet {
        let mut set = UpdateSet::new();
        set.set("title", self.title.clone());
        set.set("description", self.description.clone());
        set.set("weight_kg", self.weight_kg);
        set.set("length_cm", self.length_cm);
        set.set("width_cm", self.width_cm);
        set.set("height_cm", self.height_cm);
        set.set("from_location", self.from_location.clone());
        set.set("to_location", self.to_location.clone());
        set.set("tags", self.tags.clone());
        set.set("price", self.price);
        set.set("available_from", self.available_from);
        set
    }
}

impl UpdateCustomerInput {
    pub fn to_update_set(&self) -> UpdateSet {
        let mut set = UpdateSet::new();
        set.set("name", self.name.clone());
        set.set("phone", self.phone.clone());
        set.set("telegram_id", self.telegram_id);
        set.set("telegram_tag", self.telegram_tag.clone());
        set
    }
}
