pub mod credentials;
pub mod store;
pub mod token;

pub use credentials::Credentials;
pub use store::{FileTokenStore, MemoryTokenStore, TokenStore};
pub use token::{AuthToken, TokenError};
