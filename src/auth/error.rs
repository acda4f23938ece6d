use jsonwebtoken::errors::ErrorKind;
use thiserror::Error;

pub type CryptResult<T> = std::result::Result<T, CryptError>;

#[derive(Debug, Error)]
pub enum CryptError {
    #[error("session token expired")]
    Expired,
    #[error("jwt error: {0}")]
    JwtError(jsonwebtoken::errors::Error),
}

impl From<jsonwebtoken::errors::Error> for CryptError {
    fn from(error: jsonwebtoken::errors::Error) -> Self {
        match error.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            _ => Self::JwtError(error),
        }
    }
}
