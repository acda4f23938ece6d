use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};

use crate::auth::CryptResult;

/// Claims carried by the `SID` cookie. `sub` is the personne's matricule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    pub sub: String,
    pub exp: i64,
}

pub fn generate_token<K: AsRef<[u8]>>(
    claims: UserClaims,
    key: K,
) -> CryptResult<String> {
    let header = Header::default();
    let key = EncodingKey::from_secret(key.as_ref());

    let token = jsonwebtoken::encode(&header, &claims, &key)?;
    Ok(token)
}

pub fn process_token<K: AsRef<[u8]>>(
    token: &str,
    key: K,
) -> CryptResult<TokenData<UserClaims>> {
    let validation = Validation::default();
    let key = DecodingKey::from_secret(key.as_ref());

    let claims = jsonwebtoken::decode::<UserClaims>(token, &key, &validation)?;
    Ok(claims)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn token_roundtrip_keeps_matricule() {
        let claims = UserClaims {
            sub: "M-0042".to_string(),
            exp: (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp(),
        };
        let token = generate_token(claims, "secret").unwrap();
        let data = process_token(&token, "secret").unwrap();
        assert_eq!(data.claims.sub, "M-0042");
    }

    #[test]
    fn token_with_wrong_key_is_rejected() {
        let claims = UserClaims {
            sub: "M-0042".to_string(),
            exp: (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp(),
        };
        let token = generate_token(claims, "secret").unwrap();
        assert!(process_token(&token, "other").is_err());
    }

    #[test]
    fn expired_token_is_reported_as_such() {
        let claims = UserClaims {
            sub: "M-0042".to_string(),
            exp: (chrono::Utc::now() - chrono::Duration::hours(1)).timestamp(),
        };
        let token = generate_token(claims, "secret").unwrap();
        assert!(matches!(
            process_token(&token, "secret"),
            Err(crate::auth::CryptError::Expired)
        ));
    }
}
