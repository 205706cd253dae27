//! List filters and the statements they lower to.

use crate::query::{ListQuery, ListStatements, OrderBy, Pagination, Predicates, SortDirection};

const ORDER_SELECT: &str = "SELECT o.uuid, o.customer_uuid, o.title, o.description, o.weight_kg, \
o.length_cm, o.width_cm, o.height_cm, o.from_location, o.to_location, o.tags, o.price, \
o.available_from, o.created_at, c.uuid, c.name, c.phone, c.telegram_id, c.telegram_tag, c.created_at \
FROM orders o JOIN customers c ON o.customer_uuid = c.uuid WHERE 1=1";

const ORDER_COUNT: &str = "SELECT COUNT(*) FROM orders o WHERE 1=1";

const CUSTOMER_SELECT: &str =
    "SELECT uuid, name, phone, telegram_id, telegram_tag, created_at FROM customers WHERE 1=1";

const CUSTOMER_COUNT: &str = "SELECT COUNT(*) FROM customers WHERE 1=1";

/// Inclusive numeric range; either side may be open.
///
/// A bound of `Some(0.0)` is a real bound, distinct from `None`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FloatRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl FloatRange {
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }

    fn push_into(&self, preds: &mut Predicates, column: &'static str) {
        preds.at_least(column, self.min);
        preds.at_most(column, self.max);
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct OrderFilter {
    pub weight: FloatRange,
    pub length: FloatRange,
    pub width: FloatRange,
    pub height: FloatRange,
    pub price: FloatRange,
    /// Matches orders sharing at least one tag.
    pub tags: Vec<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub pagination: Pagination,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

impl OrderFilter {
    pub fn page(page: i64, limit: i64) -> Self {
        Self {
            pagination: Pagination::new(page, limit),
            ..Self::default()
        }
    }

    pub fn predicates(&self) -> Predicates {
        let mut p = Predicates::new();
        self.weight.push_into(&mut p, "o.weight_kg");
        self.length.push_into(&mut p, "o.length_cm");
        self.width.push_into(&mut p, "o.width_cm");
        self.height.push_into(&mut p, "o.height_cm");
        self.price.push_into(&mut p, "o.price");
        p.overlaps("o.tags", &self.tags);
        p.contains("o.from_location", self.from.as_deref());
        p.contains("o.to_location", self.to.as_deref());
        p
    }

    pub fn order_by(&self) -> OrderBy {
        let Some(key) = self.sort_by.as_deref().filter(|k| !k.is_empty()) else {
            return OrderBy {
                expr: "o.created_at",
                direction: SortDirection::Desc,
            };
        };
        let expr = match key {
            "price" => "o.price",
            "weight" => "o.weight_kg",
            "price/weight" => "o.price / o.weight_kg",
            _ => "o.created_at",
        };
        OrderBy {
            expr,
            direction: SortDirection::parse(self.sort_order.as_deref()),
        }
    }

    pub fn statements(&self) -> ListStatements {
        ListQuery {
            select: ORDER_SELECT,
            count: ORDER_COUNT,
            predicates: self.predicates(),
            order_by: self.order_by(),
            pagination: self.pagination,
        }
        .build()
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CustomerFilter {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub telegram_tag: Option<String>,
    pub telegram_id: Option<i64>,
    pub pagination: Pagination,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

impl CustomerFilter {
    pub fn page(page: i64, limit: i64) -> Self {
        Self {
            pagination: Pagination::new(page, limit),
            ..Self::default()
        }
    }

    pub fn predicates(&self) -> Predicates {
        let mut p = Predicates::new();
        p.contains("name", self.name.as_deref());
        p.contains("phone", self.phone.as_deref());
        p.contains("telegram_tag", self.telegram_tag.as_deref());
        p.equals_int("telegram_id", self.telegram_id);
        p
    }

    pub fn order_by(&self) -> OrderBy {
        let Some(key) = self.sort_by.as_deref().filter(|k| !k.is_empty()) else {
            return OrderBy {
                expr: "created_at",
                direction: SortDirection::Desc,
            };
        };
        let expr = match key {
            "name" => "name",
            "phone" => "phone",
            "telegram_tag" => "telegram_tag",
            _ => "created_at",
        };
        OrderBy {
            expr,
            direction: SortDirection::parse(self.sort_order.as_deref()),
        }
    }

    pub fn statements(&self) -> ListStatements {
        ListQuery {
            select: CUSTOMER_SELECT,
            count: CUSTOMER_COUNT,
            predicates: self.predicates(),
            order_by: self.order_by(),
            pagination: self.pagination,
        }
        .build()
    }
}
