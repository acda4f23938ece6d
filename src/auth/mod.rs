//! Session tokens. Issuance lives outside this service; tokens are only
//! verified here and minted by tests and tooling.

mod error;
pub use error::{CryptError, CryptResult};

mod jwt;
pub use jwt::{UserClaims, generate_token, process_token};
