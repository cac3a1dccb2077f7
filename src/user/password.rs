//! Credential format policy and Argon2id hashing.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};

use tokio::task;

use super::errors::CredentialError;

pub const MAX_IDENTIFIER_LENGTH: usize = 150;
pub const MAX_CREDENTIAL_LENGTH: usize = 128;

/// Format rules a raw credential must satisfy before it is hashed
#[derive(Debug, Clone)]
pub struct CredentialPolicy {
    pub min_length: usize,
    pub max_length: usize,
}

impl CredentialPolicy {
    pub fn with_min_length(min_length: usize) -> Self {
        Self {
            min_length,
            ..Self::default()
        }
    }

    pub fn check(&self, identifier: &str, raw_credential: &str) -> Result<(), CredentialError> {
        let length = raw_credential.chars().count();

        if length < self.min_length {
            return Err(CredentialError::InvalidCredential(format!(
                "Ensure this field has at least {} characters.",
                self.min_length
            )));
        }
        if length > self.max_length {
            return Err(CredentialError::InvalidCredential(format!(
                "Ensure this field has no more than {} characters.",
                self.max_length
            )));
        }
        if raw_credential.trim().is_empty() {
            return Err(CredentialError::InvalidCredential(
                "This field may not be blank.".to_string(),
            ));
        }
        if raw_credential == identifier {
            return Err(CredentialError::InvalidCredential(
                "The credential is too similar to the identifier.".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for CredentialPolicy {
    fn default() -> Self {
        Self {
            min_length: 6,
            max_length: MAX_CREDENTIAL_LENGTH,
        }
    }
}

/// Checks that an identifier is 1-150 letters, digits and `@ . + - _`
pub fn validate_identifier(identifier: &str) -> Result<(), CredentialError> {
    if identifier.is_empty() {
        return Err(CredentialError::InvalidIdentifier(
            "This field may not be blank.".to_string(),
        ));
    }
    if identifier.chars().count() > MAX_IDENTIFIER_LENGTH {
        return Err(CredentialError::InvalidIdentifier(format!(
            "Ensure this field has no more than {} characters.",
            MAX_IDENTIFIER_LENGTH
        )));
    }
    if !identifier
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
    {
        return Err(CredentialError::InvalidIdentifier(
            "Enter a valid identifier. This value may contain only letters, numbers, and @/./+/-/_ characters."
                .to_string(),
        ));
    }

    Ok(())
}

/// Argon2id hasher shared by registration and verification
#[derive(Clone)]
pub struct CredentialHasher {
    argon2: Argon2<'static>,
}

impl CredentialHasher {
    /// Hasher with the `argon2` crate's recommended Argon2id parameters
    pub fn new() -> Self {
        Self {
            argon2: Argon2::default(),
        }
    }

    /// Hasher with explicit memory (KiB) and iteration costs
    pub fn with_cost(memory_kib: u32, iterations: u32) -> Result<Self, CredentialError> {
        let params = Params::new(memory_kib, iterations, 1, None)
            .map_err(|e| CredentialError::Hashing(e.to_string()))?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    /// Hashes a raw credential with a fresh random salt
    pub fn hash(&self, raw_credential: &str) -> Result<String, CredentialError> {
        let salt = SaltString::generate(&mut OsRng);

        self.argon2
            .hash_password(raw_credential.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| CredentialError::Hashing(e.to_string()))
    }

    /// Verifies a raw credential against a stored PHC hash.
    ///
    /// The digest comparison inside `argon2` runs in constant time.
    pub fn verify(&self, raw_credential: &str, stored_hash: &str) -> Result<bool, CredentialError> {
        let parsed =
            PasswordHash::new(stored_hash).map_err(|e| CredentialError::Hashing(e.to_string()))?;

        match self.argon2.verify_password(raw_credential.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(CredentialError::Hashing(e.to_string())),
        }
    }

    /// `hash` on the blocking thread pool, keeping runtime workers free
    pub async fn hash_blocking(&self, raw_credential: String) -> Result<String, CredentialError> {
        let hasher = self.clone();
        task::spawn_blocking(move || hasher.hash(&raw_credential))
            .await
            .map_err(|e| CredentialError::Hashing(e.to_string()))?
    }

    /// `verify` on the blocking thread pool
    pub async fn verify_blocking(
        &self,
        raw_credential: String,
        stored_hash: String,
    ) -> Result<bool, CredentialError> {
        let hasher = self.clone();
        task::spawn_blocking(move || hasher.verify(&raw_credential, &stored_hash))
            .await
            .map_err(|e| CredentialError::Hashing(e.to_string()))?
    }
}

impl Default for CredentialHasher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn fast_hasher() -> CredentialHasher {
        CredentialHasher::with_cost(64, 1).unwrap()
    }

    #[test]
    fn test_hash_and_verify() {
        let hasher = fast_hasher();
        let hash = hasher.hash("pw12345").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify("pw12345", &hash).unwrap());
        assert!(!hasher.verify("wrongpw", &hash).unwrap());
    }

    #[test]
    fn test_default_hasher_round_trip() {
        let hasher = CredentialHasher::new();
        let hash = hasher.hash("pw12345").unwrap();
        assert!(hasher.verify("pw12345", &hash).unwrap());
    }

    #[test]
    fn test_hashes_are_salted() {
        let hasher = fast_hasher();
        let first = hasher.hash("pw12345").unwrap();
        let second = hasher.hash("pw12345").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_verify_rejects_malformed_hash() {
        let result = fast_hasher().verify("pw12345", "not-a-phc-string");
        assert!(matches!(result, Err(CredentialError::Hashing(_))));
    }

    #[test]
    fn test_invalid_cost_rejected() {
        assert!(CredentialHasher::with_cost(1, 1).is_err());
    }

    #[rstest]
    #[case("alice")]
    #[case("alice@example.com")]
    #[case("first.last+tag")]
    #[case("user_name-1")]
    fn test_valid_identifiers(#[case] identifier: &str) {
        assert!(validate_identifier(identifier).is_ok());
    }

    #[rstest]
    #[case("")]
    #[case("has space")]
    #[case("semi;colon")]
    #[case("slash/")]
    fn test_invalid_identifiers(#[case] identifier: &str) {
        assert!(matches!(
            validate_identifier(identifier),
            Err(CredentialError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn test_identifier_too_long() {
        let identifier = "a".repeat(MAX_IDENTIFIER_LENGTH + 1);
        assert!(validate_identifier(&identifier).is_err());
        assert!(validate_identifier(&"a".repeat(MAX_IDENTIFIER_LENGTH)).is_ok());
    }

    #[rstest]
    #[case("pw12345", true)]
    #[case("abcdef", true)]
    #[case("abcde", false)] // below minimum
    #[case("      ", false)] // whitespace only
    #[case("alice", false)]
    fn test_default_policy(#[case] credential: &str, #[case] accepted: bool) {
        let policy = CredentialPolicy::default();
        assert_eq!(policy.check("alice", credential).is_ok(), accepted);
    }

    #[test]
    fn test_credential_equal_to_identifier_rejected() {
        let policy = CredentialPolicy::default();
        let result = policy.check("alice123", "alice123");
        assert!(matches!(result, Err(CredentialError::InvalidCredential(_))));
    }

    #[test]
    fn test_credential_too_long() {
        let policy = CredentialPolicy::default();
        let credential = "x".repeat(MAX_CREDENTIAL_LENGTH + 1);
        assert!(policy.check("alice", &credential).is_err());
    }

    #[test]
    fn test_custom_min_length() {
        let policy = CredentialPolicy::with_min_length(10);
        assert!(policy.check("alice", "pw12345").is_err());
        assert!(policy.check("alice", "pw12345678").is_ok());
    }
}
