pub mod authenticate;

pub use authenticate::{authenticate, X_TOKEN_CACHE};
