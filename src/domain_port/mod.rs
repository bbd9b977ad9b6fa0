// store

mod whitelist_store;

pub use whitelist_store::*;

// repo

mod user_repo;

pub use user_repo::*;
