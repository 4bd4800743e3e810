pub mod encryption_service;

pub use encryption_service::{
    EncryptedToken, EncryptedDocument, DocumentMetadata, DocumentPublicKey,
    BATCH_SIZE, LEDGER_TOKEN_WIDTH,
    encrypt_tokens_with_progress, create_encrypted_document,
    ciphertexts_to_ledger_format, prepare_tokens_for_ledger,
};
