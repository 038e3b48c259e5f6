//! Identity token issuance and verification.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifetime of every issued token.
pub const TOKEN_TTL_DAYS: i64 = 7;

/// Claims embedded in an identity token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID).
    pub sub: String,
    pub email: String,
    /// Issued at (Unix seconds).
    pub iat: i64,
    /// Expiry (Unix seconds).
    pub exp: i64,
}

/// Verified identity attached to a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub subject_id: String,
    pub email: String,
}

/// Credential failures, from most to least client-attributable.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("no token signing secret is configured")]
    MissingSecret,
    #[error("token has expired")]
    Expired,
    #[error("malformed token: {0}")]
    Malformed(String),
    #[error("token verification unavailable: {0}")]
    Unavailable(String),
}

struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

/// HS256 token codec with keys cached for the lifetime of the process.
///
/// A codec built without a secret still exists so public routes keep working;
/// it refuses to issue and reports verification as unavailable.
#[derive(Clone)]
pub struct TokenCodec {
    keys: Option<Arc<SigningKeys>>,
    validation: Validation,
}

impl TokenCodec {
    /// Build a codec. An empty secret counts as no secret.
    pub fn new(secret: Option<&SecretString>) -> Self {
        let keys = secret
            .map(|s| s.expose_secret().as_bytes())
            .filter(|bytes| !bytes.is_empty())
            .map(|bytes| {
                Arc::new(SigningKeys {
                    encoding: EncodingKey::from_secret(bytes),
                    decoding: DecodingKey::from_secret(bytes),
                })
            });

        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is judged by verify_at against its own clock.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self { keys, validation }
    }

    /// Codec with no signing secret.
    pub fn unconfigured() -> Self {
        Self::new(None)
    }

    pub fn is_configured(&self) -> bool {
        self.keys.is_some()
    }

    /// Issue a token for `subject_id` valid for [`TOKEN_TTL_DAYS`] from now.
    pub fn issue(&self, subject_id: &str, email: &str) -> Result<String, CredentialError> {
        self.issue_at(subject_id, email, Utc::now())
    }

    /// Issue a token as if the current time were `issued_at`.
    pub fn issue_at(
        &self,
        subject_id: &str,
        email: &str,
        issued_at: DateTime<Utc>,
    ) -> Result<String, CredentialError> {
        let keys = self.keys.as_ref().ok_or(CredentialError::MissingSecret)?;
        let claims = Claims {
            sub: subject_id.to_string(),
            email: email.to_string(),
            iat: issued_at.timestamp(),
            exp: (issued_at + Duration::days(TOKEN_TTL_DAYS)).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding)
            .map_err(|e| CredentialError::Unavailable(format!("token encoding failed: {e}")))
    }

    /// Verify a token against the current time.
    pub fn verify(&self, token: &str) -> Result<Principal, CredentialError> {
        self.verify_at(token, Utc::now())
    }

    /// Verify a token as if the current time were `now`.
    ///
    /// Expiry is decided from the embedded claim before the signature is
    /// checked, so an expired token reports `Expired` whatever its signature.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Principal, CredentialError> {
        let keys = self
            .keys
            .as_ref()
            .ok_or_else(|| CredentialError::Unavailable("no signing secret configured".into()))?;

        let embedded = peek_claims(token)?;
        if now.timestamp() >= embedded.exp {
            return Err(CredentialError::Expired);
        }

        let data = decode::<Claims>(token, &keys.decoding, &self.validation)
            .map_err(classify_decode_error)?;

        Ok(Principal {
            subject_id: data.claims.sub,
            email: data.claims.email,
        })
    }
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("keys", &self.keys.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Read the claims without checking the signature.
fn peek_claims(token: &str) -> Result<Claims, CredentialError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.required_spec_claims.clear();

    decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims)
        .map_err(|e| CredentialError::Malformed(e.to_string()))
}

fn classify_decode_error(err: jsonwebtoken::errors::Error) -> CredentialError {
    match err.kind() {
        ErrorKind::ExpiredSignature => CredentialError::Expired,
        ErrorKind::InvalidToken
        | ErrorKind::InvalidSignature
        | ErrorKind::InvalidAlgorithm
        | ErrorKind::InvalidAlgorithmName
        | ErrorKind::MissingRequiredClaim(_)
        | ErrorKind::ImmatureSignature
        | ErrorKind::InvalidIssuer
        | ErrorKind::InvalidAudience
        | ErrorKind::InvalidSubject
        | ErrorKind::Base64(_)
        | ErrorKind::Json(_)
        | ErrorKind::Utf8(_) => CredentialError::Malformed(err.to_string()),
        _ => CredentialError::Unavailable(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret() -> SecretString {
        SecretString::from("test_secret_key_minimum_32_chars!")
    }

    fn codec() -> TokenCodec {
        TokenCodec::new(Some(&secret()))
    }

    #[test]
    fn issued_token_verifies_to_same_identity() {
        let codec = codec();
        let token = codec.issue("user-42", "ada@example.com").unwrap();

        let principal = codec.verify(&token).unwrap();
        assert_eq!(principal.subject_id, "user-42");
        assert_eq!(principal.email, "ada@example.com");
    }

    #[test]
    fn token_is_valid_until_just_before_expiry() {
        let codec = codec();
        let issued = Utc::now() - Duration::days(1);
        let token = codec.issue_at("u1", "u1@example.com", issued).unwrap();

        let almost = issued + Duration::days(TOKEN_TTL_DAYS) - Duration::seconds(1);
        assert!(codec.verify_at(&token, almost).is_ok());

        let at_expiry = issued + Duration::days(TOKEN_TTL_DAYS);
        assert!(matches!(
            codec.verify_at(&token, at_expiry),
            Err(CredentialError::Expired)
        ));
    }

    #[test]
    fn expired_token_is_expired_even_with_foreign_signature() {
        let other = TokenCodec::new(Some(&SecretString::from("some_other_secret_of_enough_length")));
        let issued = Utc::now() - Duration::days(TOKEN_TTL_DAYS + 1);
        let token = other.issue_at("u1", "u1@example.com", issued).unwrap();

        assert!(matches!(codec().verify(&token), Err(CredentialError::Expired)));
    }

    #[test]
    fn foreign_signature_is_malformed() {
        let other = TokenCodec::new(Some(&SecretString::from("some_other_secret_of_enough_length")));
        let token = other.issue("u1", "u1@example.com").unwrap();

        assert!(matches!(codec().verify(&token), Err(CredentialError::Malformed(_))));
    }

    #[test]
    fn swapped_signature_is_malformed() {
        let codec = codec();
        let a = codec.issue("alice", "alice@example.com").unwrap();
        let b = codec.issue("bob", "bob@example.com").unwrap();

        let (a_message, _) = a.rsplit_once('.').unwrap();
        let (_, b_signature) = b.rsplit_once('.').unwrap();
        let tampered = format!("{a_message}.{b_signature}");

        assert!(matches!(codec.verify(&tampered), Err(CredentialError::Malformed(_))));
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            codec().verify("invalid.token.here"),
            Err(CredentialError::Malformed(_))
        ));
        assert!(matches!(codec().verify(""), Err(CredentialError::Malformed(_))));
    }

    #[test]
    fn unconfigured_codec_refuses_to_issue() {
        let codec = TokenCodec::unconfigured();
        assert!(!codec.is_configured());
        assert!(matches!(
            codec.issue("u1", "u1@example.com"),
            Err(CredentialError::MissingSecret)
        ));
    }

    #[test]
    fn unconfigured_codec_reports_verification_unavailable() {
        let token = codec().issue("u1", "u1@example.com").unwrap();
        assert!(matches!(
            TokenCodec::unconfigured().verify(&token),
            Err(CredentialError::Unavailable(_))
        ));
    }

    #[test]
    fn empty_secret_counts_as_missing() {
        let codec = TokenCodec::new(Some(&SecretString::from("")));
        assert!(!codec.is_configured());
    }

    #[test]
    fn expiry_is_seven_days_after_issue() {
        let codec = codec();
        let issued = Utc::now();
        let token = codec.issue_at("u1", "u1@example.com", issued).unwrap();
        let claims = peek_claims(&token).unwrap();
        assert_eq!(claims.exp - claims.iat, TOKEN_TTL_DAYS * 24 * 60 * 60);
    }

    #[test]
    fn debug_output_redacts_keys() {
        let rendered = format!("{:?}", codec());
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains("test_secret"));
    }
}
