mod whitelist_store_redis;

pub use whitelist_store_redis::*;
