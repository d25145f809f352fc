use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};

use crate::config;

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Hash a password with the configured bcrypt cost
pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    hash_password_with_cost(password, config::config().security.bcrypt_cost)
}

pub fn hash_password_with_cost(password: &str, cost: u32) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(password, cost)
}

/// Verify a password against a stored bcrypt hash. Malformed hashes never verify.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match bcrypt::verify(password, hash) {
        Ok(ok) => ok,
        Err(e) => {
            tracing::warn!("Stored password hash could not be verified: {}", e);
            false
        }
    }
}

/// Minimal password policy shared by registration, admin creation and reset
pub fn validate_password_policy(password: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(format!("A senha deve ter pelo menos {} caracteres", MIN_PASSWORD_LENGTH));
    }
    if password.trim().is_empty() {
        return Err("A senha não pode ser composta apenas de espaços".to_string());
    }
    Ok(())
}

/// Cryptographically random, URL-safe token of `bytes` random bytes
pub fn generate_token(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    OsRng.fill_bytes(&mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}

/// SHA-256 hex digest; reset tokens are stored only in this form
pub fn sha256_hex(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_verify() {
        let hash = hash_password_with_cost("correct horse", 4).unwrap();
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("battery staple", &hash));
    }

    #[test]
    fn garbage_hash_does_not_verify() {
        assert!(!verify_password("anything", "not-a-bcrypt-hash"));
    }

    #[test]
    fn tokens_are_url_safe_and_unique() {
        let a = generate_token(32);
        let b = generate_token(32);
        assert_ne!(a, b);
        assert_eq!(a.len(), crate::share::encoded_len(32));
        assert!(crate::share::is_well_formed_token(&a));
    }

    #[test]
    fn sha256_is_stable_hex() {
        assert_eq!(
            sha256_hex("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn password_policy() {
        assert!(validate_password_policy("curta").is_err());
        assert!(validate_password_policy("        ").is_err());
        assert!(validate_password_policy("suficiente").is_ok());
    }
}
