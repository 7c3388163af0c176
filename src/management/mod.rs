mod auth;

pub use auth::StoreError;
pub use auth::TokenStore;
