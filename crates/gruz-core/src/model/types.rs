use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// A party that places freight orders.
///
/// `id` is assigned by the store at creation and never changes afterwards.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Customer {
    #[serde(rename = "uuid")]
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telegram_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telegram_tag: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A freight order. Weight in kilograms, dimensions in centimeters.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Order {
    #[serde(rename = "uuid")]
    pub id: Uuid,
    #[serde(rename = "customer_uuid")]
    pub customer_id: Uuid,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub weight_kg: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length_cm: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width_cm: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height_cm: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_location: Option<String>,
    pub tags: Vec<String>,
    pub price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_from: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    /// Only populated by the listing query, which joins the owner.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer: Option<Customer>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CreateCustomerInput {
    pub name: String,
    pub phone: String,
    pub telegram_id: Option<i64>,
    pub telegram_tag: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CreateOrderInput {
    pub customer_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub weight_kg: f64,
    pub length_cm: Option<f64>,
    pub width_cm: Option<f64>,
    pub height_cm: Option<f64>,
    pub from_location: Option<String>,
    pub to_location: Option<String>,
    pub tags: Vec<String>,
    pub price: f64,
    pub available_from: Option<DateTime<Utc>>,
}

/// Sparse order update: `Some` means "set this field", `None` means "leave it".
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UpdateOrderInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub weight_kg: Option<f64>,
    pub length_cm: Option<f64>,
    pub width_cm: Option<f64>,
    pub height_cm: Option<f64>,
    pub from_location: Option<String>,
    pub to_location: Option<String>,
    pub tags: Option<Vec<String>>,
    pub price: Option<f64>,
    pub available_from: Option<DateTime<Utc>>,
}

/// Sparse customer update, same convention as [`UpdateOrderInput`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UpdateCustomerInput {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub telegram_id: Option<i64>,
    pub telegram_tag: Option<String>,
}

/// One page of a listing plus the total matching the same filter.
#[derive(Clone, Debug, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

/// Totals shown by the admin bot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    pub customers: i64,
    pub orders: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn order() -> Order {
        Order {
            id: Uuid::from_u128(1),
            customer_id: Uuid::from_u128(2),
            title: "Диван".into(),
            description: None,
            weight_kg: 50.0,
            length_cm: Some(200.0),
            width_cm: None,
            height_cm: None,
            from_location: Some("Тверь".into()),
            to_location: None,
            tags: vec!["fragile".into()],
            price: 2000.0,
            available_from: None,
            created_at: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
            customer: None,
        }
    }

    #[test]
    fn order_json_uses_wire_names_and_omits_absent_fields() {
        let v = serde_json::to_value(order()).unwrap();
        assert_eq!(v["uuid"], "00000000-0000-0000-0000-000000000001");
        assert_eq!(v["customer_uuid"], "00000000-0000-0000-0000-000000000002");
        assert_eq!(v["length_cm"], 200.0);
        assert!(v.get("width_cm").is_none());
        assert!(v.get("description").is_none());
        assert!(v.get("customer").is_none());
        assert_eq!(v["tags"], serde_json::json!(["fragile"]));
    }
}
