use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub storage_root: PathBuf,
    pub public_base_url: String,
    pub shipping: ShippingConfig,
    pub merchant: MerchantConfig,
}

/// Flat-rate shipping with a free-shipping threshold, both in cents.
#[derive(Debug, Clone, Copy)]
pub struct ShippingConfig {
    pub flat_rate: i64,
    pub free_threshold: i64,
}

impl Default for ShippingConfig {
    fn default() -> Self {
        Self {
            flat_rate: 1290,
            free_threshold: 10_000,
        }
    }
}

impl ShippingConfig {
    /// Free at or above the threshold, flat rate below it.
    pub fn cost_for(&self, subtotal: i64) -> i64 {
        if subtotal >= self.free_threshold {
            0
        } else {
            self.flat_rate
        }
    }
}

/// Merchant identifiers stamped into payment artifacts. Demonstration
/// values by default; a real deployment points these at the payment
/// provider's registration.
#[derive(Debug, Clone)]
pub struct MerchantConfig {
    pub pix_key: String,
    pub name: String,
    pub city: String,
}

impl Default for MerchantConfig {
    fn default() -> Self {
        Self {
            pix_key: "12345678901".to_string(),
            name: "CHA PREMIUM STORE".to_string(),
            city: "SAO PAULO".to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let storage_root = env::var("STORAGE_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("uploads"));
        let public_base_url = env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| format!("http://{host}:{port}/uploads"));

        let mut shipping = ShippingConfig::default();
        if let Some(rate) = env::var("SHIPPING_FLAT_RATE_CENTS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
        {
            shipping.flat_rate = rate;
        }
        if let Some(threshold) = env::var("FREE_SHIPPING_THRESHOLD_CENTS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
        {
            shipping.free_threshold = threshold;
        }

        let mut merchant = MerchantConfig::default();
        if let Ok(key) = env::var("MERCHANT_PIX_KEY") {
            merchant.pix_key = key;
        }
        if let Ok(name) = env::var("MERCHANT_NAME") {
            merchant.name = name;
        }
        if let Ok(city) = env::var("MERCHANT_CITY") {
            merchant.city = city;
        }

        Ok(Self {
            database_url,
            host,
            port,
            storage_root,
            public_base_url,
            shipping,
            merchant,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::ShippingConfig;

    #[test]
    fn shipping_is_free_at_and_above_threshold() {
        let cfg = ShippingConfig::default();
        assert_eq!(cfg.cost_for(10_000), 0);
        assert_eq!(cfg.cost_for(25_000), 0);
    }

    #[test]
    fn shipping_is_flat_below_threshold() {
        let cfg = ShippingConfig::default();
        assert_eq!(cfg.cost_for(6_000), 1290);
        assert_eq!(cfg.cost_for(9_999), 1290);
    }
}
