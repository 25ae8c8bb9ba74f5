use crate::{
    cart::CartStore,
    config::{MerchantConfig, ShippingConfig},
    db::{DbPool, OrmConn},
    events::OrderEvents,
    storage::Storage,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub carts: CartStore,
    pub events: OrderEvents,
    pub storage: Storage,
    pub shipping: ShippingConfig,
    pub merchant: MerchantConfig,
}
