mod fingerprint;
mod key_space;
mod token;
mod user;

pub use fingerprint::*;
pub use key_space::*;
pub use token::*;
pub use user::*;
