use std::fs;
use std::io;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use num_bigint::BigUint;
use num_traits::Num;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::crypto_error::CryptoError;
use crate::paillier::p_keygen::{KeyPair, PrivateKey, PublicKey};

// ============================================================================
// Protection DoS parsing
//
// BigUint::from_str_radix est quadratique en taille d'entrée : la longueur
// est vérifiée AVANT toute conversion. Dimensionné pour des modules jusqu'à
// 8192 bits (2048 caractères hex) avec marge.
// ============================================================================
pub const MAX_HEX_FIELD_LEN: usize = 3_072;

pub const DEMO_KEY_WARNING: &str =
    "This key was generated for DEMO purposes only. Do not use for production!";

// ============================================================================
// Formats textuels (hexadécimal minuscule, sans préfixe)
// ============================================================================

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyHex {
    pub n: String,
    pub g: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PrivateKeyHex {
    pub lambda: String,
    pub mu:     String,
}

/// Document de sauvegarde complet : les deux moitiés, un avertissement et
/// la date de génération.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct KeyPairExport {
    pub public_key:   PublicKeyHex,
    pub private_key:  PrivateKeyHex,
    pub warning:      String,
    pub generated_at: String,
}

// ============================================================================
// Conversion BigUint ↔ hexadécimal
// ============================================================================

pub fn biguint_to_hex(value: &BigUint) -> String {
    value.to_str_radix(16)
}

/// Convertit une string hex en BigUint (majuscules ou minuscules).
///
/// Retourne :
///   Err(HexFieldTooLong)  si len > MAX_HEX_FIELD_LEN
///   Err(HexParseError)    si le contenu n'est pas un hex valide ou est vide
pub fn hex_to_biguint(hex_str: &str) -> Result<BigUint, CryptoError> {
    if hex_str.len() > MAX_HEX_FIELD_LEN {
        return Err(CryptoError::HexFieldTooLong {
            actual:  hex_str.len(),
            maximum: MAX_HEX_FIELD_LEN,
        });
    }
    // from_str_radix tolère un '+' initial, pas nous
    if hex_str.is_empty() || !hex_str.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(CryptoError::HexParseError);
    }
    BigUint::from_str_radix(hex_str, 16).map_err(|_| CryptoError::HexParseError)
}

// ============================================================================
// Exports
// ============================================================================

pub fn export_public_key(pk: &PublicKey) -> PublicKeyHex {
    PublicKeyHex {
        n: biguint_to_hex(pk.n()),
        g: biguint_to_hex(pk.g()),
    }
}

/// Export EXPLICITE de la clé privée, pour sauvegarde uniquement.
pub fn export_private_key_for_backup(sk: &PrivateKey) -> PrivateKeyHex {
    warn!("export de clé privée en clair demandé");
    PrivateKeyHex {
        lambda: biguint_to_hex(sk.lambda()),
        mu:     biguint_to_hex(sk.mu()),
    }
}

pub fn export_keypair(kp: &KeyPair, generated_at: DateTime<Utc>) -> KeyPairExport {
    KeyPairExport {
        public_key:   export_public_key(kp.public_key()),
        private_key:  export_private_key_for_backup(kp.private_key()),
        warning:      DEMO_KEY_WARNING.to_string(),
        generated_at: generated_at.to_rfc3339_opts(SecondsFormat::Millis, true),
    }
}

pub fn export_keypair_json(kp: &KeyPair) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&export_keypair(kp, Utc::now()))
}

/// Reconstruit une clé publique depuis sa forme hex ; n_squared recalculé.
pub fn import_public_key(hex: &PublicKeyHex) -> Result<PublicKey, CryptoError> {
    let n = hex_to_biguint(&hex.n)?;
    let g = hex_to_biguint(&hex.g)?;
    PublicKey::new(n, g)
}

// ============================================================================
// Sauvegarde sur disque — seul chemin qui persiste une clé privée
// ============================================================================

pub fn write_keypair_backup(kp: &KeyPair, filepath: &Path) -> io::Result<()> {
    if let Some(parent) = filepath.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let json = export_keypair_json(kp)?;
    fs::write(filepath, json)?;
    Ok(())
}
