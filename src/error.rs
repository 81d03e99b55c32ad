use thiserror::Error;

/// Message returned to external callers for every failure in the decrypt path
/// that must not reveal which step rejected the input.
pub const DECRYPTION_FAILED: &str = "decryption failed";

#[derive(Error, Debug)]
pub enum SealError {
    #[error("Authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// AES-GCM tag did not verify (tampered ciphertext, wrong key or wrong nonce).
    #[error("Ciphertext authentication failed")]
    AuthenticationFailed,

    /// RSA-OAEP unwrap rejected the wrapped key (wrong private key or corrupted input).
    #[error("Symmetric key unwrap failed")]
    KeyUnwrap,

    #[error("Ledger record not found: {0}")]
    RecordNotFound(String),

    #[error("Ledger record {0} is not confirmed")]
    RecordNotConfirmed(String),

    #[error("File integrity verification failed: expected {expected}, got {actual}")]
    IntegrityVerification { expected: String, actual: String },

    #[error("Key pair not found: {0}")]
    KeyNotFound(String),

    #[error("Key pair {id} is {status}, not active")]
    KeyNotActive { id: String, status: String },

    #[error("Invalid status transition from {from} to {to}")]
    InvalidStatusTransition { from: String, to: String },

    #[error("Ledger record already exists: {0}")]
    DuplicateRecord(String),

    /// A ledger file line that cannot be replayed.
    #[error("Ledger file corrupt at line {line}: {reason}")]
    LedgerCorrupt { line: usize, reason: String },

    #[error("Key envelope error: {0}")]
    KeyEnvelope(String),

    #[error("Storage error")]
    Storage(#[from] std::io::Error),

    #[error("Serialization error")]
    Serialization(#[from] serde_json::Error),
}

pub type SealResult<T> = Result<T, SealError>;

/// How a failure is presented at the serving boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Unauthorized,
    BadRequest,
    NotFound,
    DecryptionFailed,
    IntegrityFailed,
    Internal,
}

impl ErrorClass {
    /// HTTP-style status code for the class.
    pub fn status(self) -> u16 {
        match self {
            ErrorClass::Unauthorized => 401,
            ErrorClass::BadRequest => 400,
            ErrorClass::NotFound => 404,
            ErrorClass::DecryptionFailed => 400,
            ErrorClass::IntegrityFailed => 422,
            ErrorClass::Internal => 500,
        }
    }
}

impl SealError {
    pub fn kind(&self) -> ErrorClass {
        match self {
            SealError::AuthenticationRequired(_) => ErrorClass::Unauthorized,
            SealError::Validation(_)
            | SealError::InvalidKey(_)
            | SealError::KeyNotActive { .. }
            | SealError::InvalidStatusTransition { .. } => ErrorClass::BadRequest,
            SealError::KeyNotFound(_) => ErrorClass::NotFound,
            SealError::AuthenticationFailed
            | SealError::KeyUnwrap
            | SealError::RecordNotFound(_)
            | SealError::RecordNotConfirmed(_) => ErrorClass::DecryptionFailed,
            SealError::IntegrityVerification { .. } => ErrorClass::IntegrityFailed,
            SealError::KeyGeneration(_)
            | SealError::DuplicateRecord(_)
            | SealError::LedgerCorrupt { .. }
            | SealError::KeyEnvelope(_)
            | SealError::Storage(_)
            | SealError::Serialization(_) => ErrorClass::Internal,
        }
    }

    /// Message safe to hand to an external caller.
    ///
    /// Decrypt-path failures collapse into one string; internal failures never
    /// carry their detail outward.
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorClass::DecryptionFailed => DECRYPTION_FAILED.to_string(),
            ErrorClass::IntegrityFailed => {
                "File integrity verification failed. The file may be corrupted or tampered with."
                    .to_string()
            }
            ErrorClass::Internal => "internal error".to_string(),
            ErrorClass::Unauthorized | ErrorClass::BadRequest | ErrorClass::NotFound => {
                self.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decrypt_path_failures_share_one_public_message() {
        let errors = [
            SealError::AuthenticationFailed,
            SealError::KeyUnwrap,
            SealError::RecordNotFound("0xabc".into()),
            SealError::RecordNotConfirmed("0xabc".into()),
        ];
        for err in &errors {
            assert_eq!(err.kind(), ErrorClass::DecryptionFailed);
            assert_eq!(err.public_message(), DECRYPTION_FAILED);
        }
    }

    #[test]
    fn test_integrity_failure_is_distinct() {
        let err = SealError::IntegrityVerification {
            expected: "aa".into(),
            actual: "bb".into(),
        };
        assert_eq!(err.kind(), ErrorClass::IntegrityFailed);
        assert_ne!(err.public_message(), DECRYPTION_FAILED);
        assert!(err.public_message().contains("integrity"));
    }

    #[test]
    fn test_internal_errors_hide_detail() {
        let err = SealError::KeyGeneration("modulus rejected".into());
        assert_eq!(err.public_message(), "internal error");
        assert_eq!(err.kind().status(), 500);
    }
}
