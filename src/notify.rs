use anyhow::bail;
use uuid::Uuid;

use crate::payments::format_amount;

/// Payload for the order-status email collaborator.
#[derive(Debug, Clone)]
pub struct OrderStatusEmail {
    pub email: String,
    pub name: String,
    pub order_id: Uuid,
    pub status: String,
    pub total: i64,
}

/// Best-effort dispatch: the caller spawns this and discards the result
/// after logging. Delivery is delegated to an external mail collaborator;
/// this default implementation records the dispatch intent.
pub async fn send_order_status_email(message: OrderStatusEmail) -> anyhow::Result<()> {
    if !message.email.contains('@') {
        bail!("invalid recipient address");
    }
    tracing::info!(
        order_id = %message.order_id,
        status = %message.status,
        recipient = %message.email,
        recipient_name = %message.name,
        total = %format_amount(message.total),
        "order status email dispatched"
    );
    Ok(())
}

/// Fire-and-forget wrapper. A notification failure is logged and never
/// blocks or reverts the status change that triggered it.
pub fn spawn_order_status_email(message: OrderStatusEmail) {
    tokio::spawn(async move {
        if let Err(err) = send_order_status_email(message).await {
            tracing::warn!(error = %err, "order status email failed");
        }
    });
}

pub async fn send_password_reset_email(email: &str, token: Uuid) -> anyhow::Result<()> {
    if !email.contains('@') {
        bail!("invalid recipient address");
    }
    tracing::info!(recipient = %email, reset_token = %token, "password reset email dispatched");
    Ok(())
}

pub fn spawn_password_reset_email(email: String, token: Uuid) {
    tokio::spawn(async move {
        if let Err(err) = send_password_reset_email(&email, token).await {
            tracing::warn!(error = %err, "password reset email failed");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_addresses_without_at_sign() {
        let result = send_order_status_email(OrderStatusEmail {
            email: "not-an-address".to_string(),
            name: "Cliente".to_string(),
            order_id: Uuid::new_v4(),
            status: "paid".to_string(),
            total: 7290,
        })
        .await;
        assert!(result.is_err());
    }
}
