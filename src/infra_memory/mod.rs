mod user_repo_memory;
mod whitelist_store_memory;

pub use user_repo_memory::*;
pub use whitelist_store_memory::*;
