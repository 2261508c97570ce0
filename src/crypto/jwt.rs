//! Compact signed access tokens (RS256 JWT) carrying identity claims.
//!
//! The private key is loaded once at startup; the verifier key is derived
//! from it, so the same process can mint and validate tokens. `verify`
//! distinguishes an expired token from a malformed or badly signed one:
//! only the renewal endpoint accepts the expired variant.

use base64ct::{Base64UrlUnpadded, Encoding};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::HashMap;
use thiserror::Error;

pub const PAYLOAD_ROLES: &str = "roles";
pub const PAYLOAD_USERNAME: &str = "username";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct Header {
    alg: String,
    typ: String,
}

impl Header {
    fn rs256() -> Self {
        Self {
            alg: "RS256".to_string(),
            typ: "JWT".to_string(),
        }
    }
}

/// Temp-token infos embedded into a claim set when a token was minted from
/// an out-of-band link (e.g. survey login).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TempTokenClaims {
    pub user_id: String,
    pub instance_id: String,
    pub purpose: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub info: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// User id the token was issued for.
    pub sub: String,
    pub instance_id: String,
    pub profile_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub other_profile_ids: Vec<String>,
    pub account_confirmed: bool,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub payload: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_token: Option<TempTokenClaims>,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        user_id: &str,
        instance_id: &str,
        profile_id: &str,
        other_profile_ids: Vec<String>,
        account_confirmed: bool,
        roles: &[String],
        username: &str,
        temp_token: Option<TempTokenClaims>,
        now: i64,
        ttl_seconds: i64,
    ) -> Self {
        let mut payload = HashMap::new();
        if !roles.is_empty() {
            payload.insert(PAYLOAD_ROLES.to_string(), roles.join(","));
        }
        if !username.is_empty() {
            payload.insert(PAYLOAD_USERNAME.to_string(), username.to_string());
        }
        Self {
            sub: user_id.to_string(),
            instance_id: instance_id.to_string(),
            profile_id: profile_id.to_string(),
            other_profile_ids,
            account_confirmed,
            payload,
            temp_token,
            iat: now,
            exp: now + ttl_seconds,
        }
    }

    /// Roles carried in the payload, empty when none were set.
    #[must_use]
    pub fn roles(&self) -> Vec<String> {
        self.payload
            .get(PAYLOAD_ROLES)
            .map(|joined| {
                joined
                    .split(',')
                    .filter(|role| !role.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    #[must_use]
    pub fn username(&self) -> &str {
        self.payload
            .get(PAYLOAD_USERNAME)
            .map_or("", String::as_str)
    }

    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.payload
            .get(PAYLOAD_ROLES)
            .is_some_and(|joined| joined.split(',').any(|entry| entry == role))
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid token format")]
    TokenFormat,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlg(String),
    #[error("failed to parse signing key")]
    KeyParse,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
}

/// Holds the signing key pair for the process lifetime.
pub struct TokenSigner {
    signing_key: SigningKey<Sha256>,
    verifying_key: VerifyingKey<Sha256>,
}

impl TokenSigner {
    /// Build a signer from a PKCS#8 or PKCS#1 private key in PEM or DER form.
    ///
    /// # Errors
    /// Returns `Error::KeyParse` if the key cannot be decoded.
    pub fn from_private_key_bytes(pem_or_der: &[u8]) -> Result<Self, Error> {
        Ok(Self::from_private_key(decode_private_key(pem_or_der)?))
    }

    #[must_use]
    pub fn from_private_key(private_key: RsaPrivateKey) -> Self {
        let public_key = RsaPublicKey::from(&private_key);
        Self {
            signing_key: SigningKey::<Sha256>::new(private_key),
            verifying_key: VerifyingKey::<Sha256>::new(public_key),
        }
    }

    /// Mint a compact RS256 token for the given claims.
    ///
    /// # Errors
    /// Returns an error if the claims cannot be serialized.
    pub fn sign(&self, claims: &Claims) -> Result<String, Error> {
        let header_b64 = b64e_json(&Header::rs256())?;
        let claims_b64 = b64e_json(claims)?;
        let signing_input = format!("{header_b64}.{claims_b64}");

        let signature: Signature = self.signing_key.sign(signing_input.as_bytes());
        let signature_b64 = Base64UrlUnpadded::encode_string(&signature.to_vec());

        Ok(format!("{signing_input}.{signature_b64}"))
    }

    /// Verify a token's signature and expiry, returning its claims.
    ///
    /// # Errors
    /// `Error::Expired` when only the expiry check failed; any other variant
    /// means the token is malformed or forged.
    pub fn verify(&self, token: &str, now_unix_seconds: i64) -> Result<Claims, Error> {
        let claims = self.verify_allow_expired(token)?;
        if claims.exp <= now_unix_seconds {
            return Err(Error::Expired);
        }
        Ok(claims)
    }

    /// Verify a token's signature but not its expiry.
    ///
    /// Only the renewal flow may use this: the refresh token presented
    /// alongside still gates the operation.
    ///
    /// # Errors
    /// Returns an error if the token is malformed or the signature is invalid.
    pub fn verify_allow_expired(&self, token: &str) -> Result<Claims, Error> {
        let mut parts = token.split('.');
        let header_b64 = parts.next().ok_or(Error::TokenFormat)?;
        let claims_b64 = parts.next().ok_or(Error::TokenFormat)?;
        let sig_b64 = parts.next().ok_or(Error::TokenFormat)?;
        if parts.next().is_some() {
            return Err(Error::TokenFormat);
        }

        let header: Header = b64d_json(header_b64)?;
        if header.alg != "RS256" {
            return Err(Error::UnsupportedAlg(header.alg));
        }

        let signing_input = format!("{header_b64}.{claims_b64}");
        let signature_bytes = Base64UrlUnpadded::decode_vec(sig_b64).map_err(|_| Error::Base64)?;
        let signature =
            Signature::try_from(signature_bytes.as_slice()).map_err(|_| Error::InvalidSignature)?;
        self.verifying_key
            .verify(signing_input.as_bytes(), &signature)
            .map_err(|_| Error::InvalidSignature)?;

        b64d_json(claims_b64)
    }
}

fn decode_private_key(pem_or_der: &[u8]) -> Result<RsaPrivateKey, Error> {
    if pem_or_der.starts_with(b"-----BEGIN") {
        let text = std::str::from_utf8(pem_or_der).map_err(|_| Error::KeyParse)?;
        if let Ok(key) = RsaPrivateKey::from_pkcs8_pem(text) {
            return Ok(key);
        }
        if let Ok(key) = RsaPrivateKey::from_pkcs1_pem(text) {
            return Ok(key);
        }
        return Err(Error::KeyParse);
    }

    if let Ok(key) = RsaPrivateKey::from_pkcs8_der(pem_or_der) {
        return Ok(key);
    }
    if let Ok(key) = RsaPrivateKey::from_pkcs1_der(pem_or_der) {
        return Ok(key);
    }
    Err(Error::KeyParse)
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, Error> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(encoded: &str) -> Result<T, Error> {
    let bytes = Base64UrlUnpadded::decode_vec(encoded).map_err(|_| Error::Base64)?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::{Claims, Error, TempTokenClaims, TokenSigner};
    use rand::rngs::OsRng;
    use rsa::RsaPrivateKey;
    use std::sync::OnceLock;

    const NOW: i64 = 1_700_000_000;

    fn signer() -> &'static TokenSigner {
        static SIGNER: OnceLock<TokenSigner> = OnceLock::new();
        SIGNER.get_or_init(|| {
            let key = RsaPrivateKey::new(&mut OsRng, 2048).expect("generate test key");
            TokenSigner::from_private_key(key)
        })
    }

    fn test_claims(ttl_seconds: i64) -> Claims {
        Claims::new(
            "user-1",
            "inst1",
            "profile-1",
            vec!["profile-2".to_string()],
            true,
            &["PARTICIPANT".to_string(), "ADMIN".to_string()],
            "alice@example.org",
            None,
            NOW,
            ttl_seconds,
        )
    }

    #[test]
    fn sign_and_verify_round_trip() -> Result<(), Error> {
        let token = signer().sign(&test_claims(120))?;
        let verified = signer().verify(&token, NOW + 60)?;
        assert_eq!(verified.sub, "user-1");
        assert_eq!(verified.instance_id, "inst1");
        assert_eq!(verified.profile_id, "profile-1");
        assert_eq!(verified.other_profile_ids, vec!["profile-2".to_string()]);
        assert!(verified.account_confirmed);
        assert_eq!(
            verified.roles(),
            vec!["PARTICIPANT".to_string(), "ADMIN".to_string()]
        );
        assert_eq!(verified.username(), "alice@example.org");
        Ok(())
    }

    #[test]
    fn expired_token_is_distinguished() -> Result<(), Error> {
        let token = signer().sign(&test_claims(60))?;
        let result = signer().verify(&token, NOW + 120);
        assert!(matches!(result, Err(Error::Expired)));

        // The renewal path still reads the claims.
        let claims = signer().verify_allow_expired(&token)?;
        assert_eq!(claims.sub, "user-1");
        Ok(())
    }

    #[test]
    fn tampered_token_is_rejected() -> Result<(), Error> {
        let token = signer().sign(&test_claims(120))?;
        let mut tampered = token.clone();
        tampered.pop();
        assert!(matches!(
            signer().verify(&tampered, NOW),
            Err(Error::InvalidSignature | Error::Base64)
        ));

        assert!(matches!(
            signer().verify("not-a-token", NOW),
            Err(Error::TokenFormat)
        ));
        Ok(())
    }

    #[test]
    fn different_key_is_rejected() -> Result<(), Error> {
        let token = signer().sign(&test_claims(120))?;
        let other_key = RsaPrivateKey::new(&mut OsRng, 2048).expect("generate test key");
        let other = TokenSigner::from_private_key(other_key);
        assert!(matches!(
            other.verify(&token, NOW),
            Err(Error::InvalidSignature)
        ));
        Ok(())
    }

    #[test]
    fn temp_token_claims_survive_round_trip() -> Result<(), Error> {
        let mut claims = test_claims(120);
        claims.temp_token = Some(TempTokenClaims {
            user_id: "user-1".to_string(),
            instance_id: "inst1".to_string(),
            purpose: "survey-login".to_string(),
            info: [("study".to_string(), "weekly".to_string())].into(),
        });
        let token = signer().sign(&claims)?;
        let verified = signer().verify(&token, NOW)?;
        assert_eq!(verified.temp_token, claims.temp_token);
        Ok(())
    }

    #[test]
    fn has_role_matches_exact_entries() {
        let claims = test_claims(120);
        assert!(claims.has_role("ADMIN"));
        assert!(claims.has_role("PARTICIPANT"));
        assert!(!claims.has_role("RESEARCHER"));
        assert!(!claims.has_role("ADMI"));
    }
}
