use serde::Serialize;
use utoipa::ToSchema;

use crate::config::MerchantConfig;
use crate::models::PaymentMethod;

/// Demonstration boleto digitable line. Real slips come from a payment
/// provider; artifact generation stays pluggable behind this module.
pub const BOLETO_DEMO_LINE: &str = "34191.79001 01043.510047 91020.150008 1 88650000012345";

/// Static bank details shown for manual transfers.
pub const TRANSFER_INSTRUCTIONS: &str =
    "Banco do Brasil 001 | Ag 1234-5 | Cc 67890-1 | Fav: CHA PREMIUM STORE | CNPJ: 12.345.678/0001-99";

/// Method-specific artifact returned with a created order. Card methods
/// carry nothing: card data is captured client-side only and never enters
/// a real payment network.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum PaymentInstructions {
    Pix {
        /// Copy-and-paste payload, also the QR code content.
        payload: String,
    },
    Boleto {
        digitable_line: String,
        /// Digits only, for rendering a CODE128 barcode.
        barcode_digits: String,
    },
    Transfer {
        instructions: String,
    },
    Card,
}

pub fn instructions_for(
    method: PaymentMethod,
    merchant: &MerchantConfig,
    total: i64,
) -> PaymentInstructions {
    match method {
        PaymentMethod::Pix => PaymentInstructions::Pix {
            payload: pix_payload(merchant, total),
        },
        PaymentMethod::Boleto => PaymentInstructions::Boleto {
            digitable_line: BOLETO_DEMO_LINE.to_string(),
            barcode_digits: boleto_barcode_digits(BOLETO_DEMO_LINE),
        },
        PaymentMethod::Transfer => PaymentInstructions::Transfer {
            instructions: TRANSFER_INSTRUCTIONS.to_string(),
        },
        PaymentMethod::Credit | PaymentMethod::Debit => PaymentInstructions::Card,
    }
}

/// Simulated "Pix copia e cola" payload carrying the merchant identifiers
/// and the order amount. The layout mirrors the EMV-style field/length
/// framing of real payloads but is not provider-issued.
pub fn pix_payload(merchant: &MerchantConfig, total: i64) -> String {
    let amount = format_amount(total);
    format!(
        "00020126360014BR.GOV.BCB.PIX0114{}5204000053039865406{}5802BR5913{}6009{}62070503***6304",
        merchant.pix_key, amount, merchant.name, merchant.city
    )
}

/// Strip the digitable line down to the digits encoded in the barcode.
pub fn boleto_barcode_digits(line: &str) -> String {
    line.chars().filter(char::is_ascii_digit).collect()
}

/// Cents to a dot-separated decimal string, e.g. 7290 -> "72.90".
pub fn format_amount(cents: i64) -> String {
    format!("{}.{:02}", cents / 100, (cents % 100).abs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MerchantConfig;
    use crate::models::PaymentMethod;

    #[test]
    fn amount_formatting_pads_cents() {
        assert_eq!(format_amount(7290), "72.90");
        assert_eq!(format_amount(10_000), "100.00");
        assert_eq!(format_amount(5), "0.05");
    }

    #[test]
    fn pix_payload_embeds_merchant_and_amount() {
        let merchant = MerchantConfig::default();
        let payload = pix_payload(&merchant, 7290);
        assert!(payload.starts_with("00020126360014BR.GOV.BCB.PIX0114"));
        assert!(payload.contains("12345678901"));
        assert!(payload.contains("540672.90"));
        assert!(payload.contains("CHA PREMIUM STORE"));
        assert!(payload.contains("SAO PAULO"));
        assert!(payload.ends_with("6304"));
    }

    #[test]
    fn boleto_digits_are_digits_only() {
        let digits = boleto_barcode_digits(BOLETO_DEMO_LINE);
        assert!(!digits.is_empty());
        assert!(digits.chars().all(|c| c.is_ascii_digit()));
        assert!(!digits.contains('.'));
    }

    #[test]
    fn instructions_match_method() {
        let merchant = MerchantConfig::default();
        assert!(matches!(
            instructions_for(PaymentMethod::Pix, &merchant, 1000),
            PaymentInstructions::Pix { .. }
        ));
        assert!(matches!(
            instructions_for(PaymentMethod::Boleto, &merchant, 1000),
            PaymentInstructions::Boleto { .. }
        ));
        assert!(matches!(
            instructions_for(PaymentMethod::Transfer, &merchant, 1000),
            PaymentInstructions::Transfer { .. }
        ));
        assert!(matches!(
            instructions_for(PaymentMethod::Credit, &merchant, 1000),
            PaymentInstructions::Card
        ));
        assert!(matches!(
            instructions_for(PaymentMethod::Debit, &merchant, 1000),
            PaymentInstructions::Card
        ));
    }
}
