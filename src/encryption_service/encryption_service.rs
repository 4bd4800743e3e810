// ============================================================================
// Service de chiffrement de documents
//
// Assemble les jetons du tokenizer en document chiffré prêt pour le ledger :
// chaque chiffré est encodé en octets big-endian puis en base64, avec sa
// position d'origine.
// ============================================================================

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::Utc;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::crypto_error::CryptoError;
use crate::paillier::p_codec::{from_bytes, to_bytes};
use crate::paillier::p_encrypt::Cryptosystem;

/// Jetons chiffrés entre deux rapports de progression
pub const BATCH_SIZE: usize = 10;

/// Largeur fixe d'un jeton clair au format du ledger
pub const LEDGER_TOKEN_WIDTH: usize = 32;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct EncryptedToken {
    /// Chiffré en octets big-endian, encodé base64
    pub value: String,
    /// Position dans la séquence de jetons d'origine
    pub index: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DocumentPublicKey {
    pub n: String,
    pub g: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    pub token_count:     usize,
    pub original_length: usize,
    /// Millisecondes depuis l'epoch
    pub timestamp:       i64,
    pub public_key:      DocumentPublicKey,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedDocument {
    pub id:               String,
    pub encrypted_tokens: Vec<EncryptedToken>,
    pub metadata:         DocumentMetadata,
}

// ---------------------------------------------------------------------------
// Chiffrement par lots de BATCH_SIZE, progression 0..=100 (arrondie au plus
// proche) après chaque lot
// ---------------------------------------------------------------------------
pub fn encrypt_tokens_with_progress<F>(
    cryptosystem: &Cryptosystem,
    tokens: &[u32],
    mut on_progress: F,
) -> Result<Vec<EncryptedToken>, CryptoError>
where
    F: FnMut(u8),
{
    let total = tokens.len();
    let mut encrypted = Vec::with_capacity(total);

    for (batch_no, batch) in tokens.chunks(BATCH_SIZE).enumerate() {
        let offset = batch_no * BATCH_SIZE;
        for (i, &token) in batch.iter().enumerate() {
            let ciphertext = cryptosystem.encrypt(&BigUint::from(token))?;
            encrypted.push(EncryptedToken {
                value: STANDARD.encode(to_bytes(&ciphertext)),
                index: offset + i,
            });
        }
        let done = offset + batch.len();
        on_progress(((done * 200 + total) / (2 * total)).min(100) as u8);
    }

    Ok(encrypted)
}

pub fn create_encrypted_document<F>(
    doc_id: &str,
    tokens: &[u32],
    original_length: usize,
    cryptosystem: &Cryptosystem,
    on_progress: F,
) -> Result<EncryptedDocument, CryptoError>
where
    F: FnMut(u8),
{
    let encrypted_tokens = encrypt_tokens_with_progress(cryptosystem, tokens, on_progress)?;
    let pk = cryptosystem.public_key();
    debug!(doc_id, tokens = tokens.len(), "document chiffré");

    Ok(EncryptedDocument {
        id: doc_id.to_string(),
        encrypted_tokens,
        metadata: DocumentMetadata {
            token_count: tokens.len(),
            original_length,
            timestamp: Utc::now().timestamp_millis(),
            public_key: DocumentPublicKey {
                n: pk.n().to_str_radix(10),
                g: pk.g().to_str_radix(10),
            },
        },
    })
}

/// base64 → octets bruts, dans l'ordre des jetons. Refuse un chiffré vide.
pub fn ciphertexts_to_ledger_format(tokens: &[EncryptedToken]) -> Result<Vec<Vec<u8>>, CryptoError> {
    tokens
        .iter()
        .map(|t| {
            let bytes = STANDARD
                .decode(&t.value)
                .map_err(|e| CryptoError::InvalidInput(format!("base64 invalide au jeton {} : {e}", t.index)))?;
            from_bytes(&bytes)?;
            Ok(bytes)
        })
        .collect()
}

/// Jeton clair sur 32 octets, petit-boutiste, complété par des zéros.
pub fn prepare_tokens_for_ledger(tokens: &[u32]) -> Vec<[u8; LEDGER_TOKEN_WIDTH]> {
    tokens
        .iter()
        .map(|&token| {
            let mut bytes = [0u8; LEDGER_TOKEN_WIDTH];
            bytes[..4].copy_from_slice(&token.to_le_bytes());
            bytes
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paillier::p_keygen::PublicKey;

    // Petit module : suffisant pour vérifier l'assemblage, pas la sécurité
    fn small_cryptosystem() -> Cryptosystem {
        let n = BigUint::from(1_000_003u64 * 999_983u64);
        Cryptosystem::new(PublicKey::from_modulus(n).unwrap())
    }

    #[test]
    fn test_progress_reported_per_batch() {
        let cs = small_cryptosystem();
        let tokens: Vec<u32> = (0..25).collect();
        let mut reports = Vec::new();
        let encrypted = encrypt_tokens_with_progress(&cs, &tokens, |p| reports.push(p)).unwrap();

        assert_eq!(reports, vec![40, 80, 100]);
        assert_eq!(encrypted.len(), 25);
        let indices: Vec<usize> = encrypted.iter().map(|t| t.index).collect();
        assert_eq!(indices, (0..25).collect::<Vec<_>>());
    }

    #[test]
    fn test_progress_is_rounded() {
        let cs = small_cryptosystem();
        let tokens: Vec<u32> = (0..15).collect();
        let mut reports = Vec::new();
        encrypt_tokens_with_progress(&cs, &tokens, |p| reports.push(p)).unwrap();
        assert_eq!(reports, vec![67, 100]);
    }

    #[test]
    fn test_empty_document() {
        let cs = small_cryptosystem();
        let mut called = false;
        let doc = create_encrypted_document("doc-0", &[], 0, &cs, |_| called = true).unwrap();
        assert!(!called);
        assert!(doc.encrypted_tokens.is_empty());
        assert_eq!(doc.metadata.token_count, 0);
    }

    #[test]
    fn test_document_metadata() {
        let cs = small_cryptosystem();
        let doc = create_encrypted_document("doc-1", &[5, 6, 7], 42, &cs, |_| {}).unwrap();
        assert_eq!(doc.id, "doc-1");
        assert_eq!(doc.metadata.token_count, 3);
        assert_eq!(doc.metadata.original_length, 42);
        assert_eq!(doc.metadata.public_key.n, (1_000_003u64 * 999_983u64).to_string());
        assert_eq!(doc.metadata.public_key.g, (1_000_003u64 * 999_983u64 + 1).to_string());

        let json = serde_json::to_value(&doc).unwrap();
        assert!(json.get("encryptedTokens").is_some());
        assert!(json["metadata"].get("tokenCount").is_some());
    }

    #[test]
    fn test_ledger_format_decodes_ciphertexts() {
        let cs = small_cryptosystem();
        let encrypted = encrypt_tokens_with_progress(&cs, &[1, 2, 3], |_| {}).unwrap();
        let raw = ciphertexts_to_ledger_format(&encrypted).unwrap();
        assert_eq!(raw.len(), 3);
        for bytes in &raw {
            let c = from_bytes(bytes).unwrap();
            assert!(&c < cs.public_key().n_squared());
        }
    }

    #[test]
    fn test_ledger_format_rejects_bad_values() {
        let bad = [EncryptedToken { value: "***".into(), index: 0 }];
        assert!(matches!(ciphertexts_to_ledger_format(&bad), Err(CryptoError::InvalidInput(_))));
        let empty = [EncryptedToken { value: String::new(), index: 0 }];
        assert_eq!(ciphertexts_to_ledger_format(&empty), Err(CryptoError::EmptyEncoding));
    }

    #[test]
    fn test_out_of_range_token_fails_document() {
        let cs = Cryptosystem::new(PublicKey::from_modulus(BigUint::from(77u32)).unwrap());
        let err = create_encrypted_document("doc", &[1, 200], 0, &cs, |_| {}).unwrap_err();
        assert_eq!(err, CryptoError::MessageOutOfRange);
    }

    #[test]
    fn test_prepare_tokens_for_ledger() {
        let prepared = prepare_tokens_for_ledger(&[0x0403_0201, 7]);
        assert_eq!(&prepared[0][..4], &[1, 2, 3, 4]);
        assert!(prepared[0][4..].iter().all(|&b| b == 0));
        assert_eq!(prepared[1][0], 7);
    }
}
