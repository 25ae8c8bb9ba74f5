use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: i64,
    pub image: Option<String>,
    pub category: String,
    pub stock: i32,
    pub weight: i32,
    pub rating: f64,
    pub reviews: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub address: Value,
    pub payment_method: String,
    pub subtotal: i64,
    pub shipping_cost: i64,
    pub total: i64,
    pub status: String,
    pub shipping_status: Option<String>,
    pub tracking_code: Option<String>,
    pub cancellation_reason: Option<String>,
    pub payment_proof_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub price: i64,
    pub subtotal: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub full_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Paid,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Paid,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(OrderStatus::Pending),
            "paid" => Some(OrderStatus::Paid),
            "shipped" => Some(OrderStatus::Shipped),
            "delivered" => Some(OrderStatus::Delivered),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Self-service cancellation is withdrawn once fulfillment has
    /// progressed past "paid".
    pub fn allows_self_service_cancel(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Paid)
    }

    /// Cancelled is terminal; every other status may still move.
    pub fn allows_transition_to(&self, next: OrderStatus) -> bool {
        match self {
            OrderStatus::Cancelled => next == OrderStatus::Cancelled,
            _ => true,
        }
    }

    /// Statuses that count toward recognized revenue.
    pub fn counts_as_revenue(&self) -> bool {
        matches!(
            self,
            OrderStatus::Paid | OrderStatus::Shipped | OrderStatus::Delivered
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Credit,
    Debit,
    Pix,
    Boleto,
    Transfer,
}

impl PaymentMethod {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "credit" => Some(PaymentMethod::Credit),
            "debit" => Some(PaymentMethod::Debit),
            "pix" => Some(PaymentMethod::Pix),
            "boleto" => Some(PaymentMethod::Boleto),
            "transfer" => Some(PaymentMethod::Transfer),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Credit => "credit",
            PaymentMethod::Debit => "debit",
            PaymentMethod::Pix => "pix",
            PaymentMethod::Boleto => "boleto",
            PaymentMethod::Transfer => "transfer",
        }
    }

    /// Methods simulated as settling instantly: the order is confirmed
    /// paid right after creation without further user action.
    pub fn settles_immediately(&self) -> bool {
        matches!(self, PaymentMethod::Credit | PaymentMethod::Pix)
    }
}

#[cfg(test)]
mod tests {
    use super::{OrderStatus, PaymentMethod};

    #[test]
    fn self_service_cancel_only_while_pending_or_paid() {
        assert!(OrderStatus::Pending.allows_self_service_cancel());
        assert!(OrderStatus::Paid.allows_self_service_cancel());
        assert!(!OrderStatus::Shipped.allows_self_service_cancel());
        assert!(!OrderStatus::Delivered.allows_self_service_cancel());
        assert!(!OrderStatus::Cancelled.allows_self_service_cancel());
    }

    #[test]
    fn cancelled_is_terminal() {
        for next in OrderStatus::ALL {
            let allowed = OrderStatus::Cancelled.allows_transition_to(next);
            assert_eq!(allowed, next == OrderStatus::Cancelled);
        }
        assert!(OrderStatus::Pending.allows_transition_to(OrderStatus::Cancelled));
        assert!(OrderStatus::Shipped.allows_transition_to(OrderStatus::Delivered));
    }

    #[test]
    fn revenue_statuses_are_paid_shipped_delivered() {
        let recognized: Vec<&str> = OrderStatus::ALL
            .iter()
            .filter(|status| status.counts_as_revenue())
            .map(OrderStatus::as_str)
            .collect();
        assert_eq!(recognized, ["paid", "shipped", "delivered"]);
    }

    #[test]
    fn only_credit_and_pix_settle_immediately() {
        assert!(PaymentMethod::Credit.settles_immediately());
        assert!(PaymentMethod::Pix.settles_immediately());
        assert!(!PaymentMethod::Debit.settles_immediately());
        assert!(!PaymentMethod::Boleto.settles_immediately());
        assert!(!PaymentMethod::Transfer.settles_immediately());
    }

    #[test]
    fn status_round_trips_through_parse() {
        for status in OrderStatus::ALL {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(OrderStatus::parse("refunded"), None);
    }
}
