use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use utoipa::ToSchema;

use crate::error::AppError;
use crate::models::{Order, OrderItem};
use crate::payments::PaymentInstructions;

/// Contact and address fields captured by the checkout form and stored as
/// an immutable snapshot on the order.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct CustomerData {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    #[serde(default)]
    pub number: String,
    #[serde(default)]
    pub complement: Option<String>,
    #[serde(default)]
    pub neighborhood: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub cep: String,
}

impl CustomerData {
    /// Step-one gate of the checkout wizard: the required contact fields
    /// must be present before payment collection is reachable.
    pub fn validate(&self) -> Result<(), AppError> {
        let required = [
            ("name", &self.name),
            ("email", &self.email),
            ("phone", &self.phone),
            ("address", &self.address),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(AppError::BadRequest(format!(
                    "required field '{field}' is missing"
                )));
            }
        }
        Ok(())
    }

    /// Address snapshot persisted on the order row.
    pub fn address_snapshot(&self) -> Value {
        json!({
            "address": self.address,
            "number": self.number,
            "complement": self.complement,
            "neighborhood": self.neighborhood,
            "city": self.city,
            "state": self.state,
            "cep": self.cep,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckoutQuoteRequest {
    pub customer: CustomerData,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckoutQuote {
    pub subtotal: i64,
    pub shipping_cost: i64,
    pub total: i64,
    pub item_count: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    pub customer: CustomerData,
    pub payment_method: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckoutResponse {
    #[serde(flatten)]
    pub order: OrderWithItems,
    pub payment: PaymentInstructions,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<OrderWithItems>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CancellationReason {
    ChangeOfMind,
    FoundBetterPrice,
    DeliveryTime,
    OrderedWrongItem,
    Other,
}

impl CancellationReason {
    pub fn label(&self) -> Option<&'static str> {
        match self {
            CancellationReason::ChangeOfMind => Some("Changed my mind"),
            CancellationReason::FoundBetterPrice => Some("Found a better price"),
            CancellationReason::DeliveryTime => Some("Delivery time too long"),
            CancellationReason::OrderedWrongItem => Some("Ordered the wrong item"),
            CancellationReason::Other => None,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CancelOrderRequest {
    pub reason: CancellationReason,
    /// Free text, required when reason is "other".
    pub custom_reason: Option<String>,
}

impl CancelOrderRequest {
    /// Resolve to the reason string stored on the order; must be
    /// non-empty.
    pub fn resolve_reason(&self) -> Result<String, AppError> {
        if let Some(label) = self.reason.label() {
            return Ok(label.to_string());
        }
        match self.custom_reason.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => Ok(text.to_string()),
            _ => Err(AppError::BadRequest(
                "a cancellation reason is required".into(),
            )),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentProofResponse {
    pub url: String,
    /// False when the proof was stored but could not be linked onto the
    /// order; informational, not an error.
    pub linked: bool,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customer() -> CustomerData {
        CustomerData {
            name: "Maria".into(),
            email: "maria@example.com".into(),
            phone: "11 99999-0000".into(),
            address: "Rua das Flores".into(),
            number: "42".into(),
            complement: None,
            neighborhood: "Centro".into(),
            city: "Sao Paulo".into(),
            state: "SP".into(),
            cep: "01000-000".into(),
        }
    }

    #[test]
    fn validate_requires_contact_fields() {
        assert!(customer().validate().is_ok());
        let mut missing = customer();
        missing.phone = "  ".into();
        assert!(missing.validate().is_err());
        let mut missing = customer();
        missing.address = String::new();
        assert!(missing.validate().is_err());
    }

    #[test]
    fn enumerated_reasons_resolve_to_labels() {
        let request = CancelOrderRequest {
            reason: CancellationReason::DeliveryTime,
            custom_reason: None,
        };
        assert_eq!(request.resolve_reason().unwrap(), "Delivery time too long");
    }

    #[test]
    fn other_reason_requires_non_empty_text() {
        let request = CancelOrderRequest {
            reason: CancellationReason::Other,
            custom_reason: Some("  ".into()),
        };
        assert!(request.resolve_reason().is_err());

        let request = CancelOrderRequest {
            reason: CancellationReason::Other,
            custom_reason: Some(" arrived too late ".into()),
        };
        assert_eq!(request.resolve_reason().unwrap(), "arrived too late");
    }
}
