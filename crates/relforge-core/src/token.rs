//! Deployment-name token generation.
//!
//! Each run deploys under a unique name so a stray failure never collides
//! with a later run's deployment.

use std::io::Read;
use std::sync::Mutex;

use uuid::Uuid;

/// Error produced when a token cannot be generated.
#[derive(Debug, thiserror::Error)]
#[error("could not generate deployment token: {0}")]
pub struct TokenError(#[from] std::io::Error);

/// Produces a unique string token, or fails.
pub trait TokenGenerator: Send + Sync {
    fn generate(&self) -> Result<String, TokenError>;
}

/// GUID-format tokens drawn from an arbitrary entropy source.
///
/// Reads exactly 16 bytes and formats them as hex grouped 8-4-4-4-12.
/// Feeding a fixed byte source makes the token deterministic for tests.
#[derive(Debug)]
pub struct GuidGenerator<R> {
    entropy: Mutex<R>,
}

impl<R: Read + Send> GuidGenerator<R> {
    pub fn new(entropy: R) -> Self {
        GuidGenerator {
            entropy: Mutex::new(entropy),
        }
    }
}

impl<R: Read + Send> TokenGenerator for GuidGenerator<R> {
    fn generate(&self) -> Result<String, TokenError> {
        let mut bytes = [0u8; 16];
        self.entropy.lock().unwrap().read_exact(&mut bytes)?;
        let hex = hex::encode(bytes);
        Ok(format!(
            "{}-{}-{}-{}-{}",
            &hex[..8],
            &hex[8..12],
            &hex[12..16],
            &hex[16..20],
            &hex[20..]
        ))
    }
}

/// Random v4 UUID tokens; the production default.
#[derive(Debug, Default)]
pub struct UuidTokenGenerator;

impl UuidTokenGenerator {
    pub fn new() -> Self {
        UuidTokenGenerator
    }
}

impl TokenGenerator for UuidTokenGenerator {
    fn generate(&self) -> Result<String, TokenError> {
        Ok(Uuid::new_v4().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ErrorReader;

    impl Read for ErrorReader {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("failed to read"))
        }
    }

    #[test]
    fn test_guid_format_from_known_bytes() {
        let generator = GuidGenerator::new(&b"abcdefghijklmnopqrstuvwxyz1234567890"[..]);
        let token = generator.generate().expect("generate");
        assert_eq!(token, "61626364-6566-6768-696a-6b6c6d6e6f70");
    }

    #[test]
    fn test_guid_generation_fails_when_entropy_fails() {
        let generator = GuidGenerator::new(ErrorReader);
        let err = generator.generate().expect_err("should fail");
        assert!(err.to_string().contains("failed to read"));
    }

    #[test]
    fn test_uuid_tokens_are_unique() {
        let generator = UuidTokenGenerator::new();
        let first = generator.generate().expect("generate");
        let second = generator.generate().expect("generate");
        assert_ne!(first, second);
    }
}
