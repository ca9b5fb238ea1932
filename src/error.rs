use thiserror::Error;

#[derive(Error, Debug)]
pub enum WalletError {
    #[error("OS entropy source unavailable: {0}")]
    EntropyUnavailable(String),

    #[error("Invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("Storage error: {0}")]
    Persistence(#[from] StorageError),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("Fee exceeds available funds: {0}")]
    FeeExceedsFunds(String),

    #[error("Signing failed: {0}")]
    SigningFailed(String),

    #[error("Invalid address: {0}")]
    AddressInvalid(String),

    #[error("Encryption error: {0}")]
    Encryption(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Record not found: {0}")]
    MissingRecord(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Record already exists: {0}")]
    AlreadyExists(String),
}
