use num_bigint::BigUint;
use crate::crypto_error::CryptoError;
use crate::paillier::p_keygen::PublicKey;

// ---------------------------------------------------------------------------
// Encodage big-endian sans largeur fixe
//
// Nombre minimal d'octets, octet de tête non nul sauf pour 0 (encodé [0x00]).
// Le décodage refuse l'entrée vide.
// ---------------------------------------------------------------------------

pub fn to_bytes(value: &BigUint) -> Vec<u8> {
    value.to_bytes_be()
}

pub fn from_bytes(bytes: &[u8]) -> Result<BigUint, CryptoError> {
    if bytes.is_empty() {
        return Err(CryptoError::EmptyEncoding);
    }
    Ok(BigUint::from_bytes_be(bytes))
}

pub fn serialize_ciphertexts(ciphertexts: &[BigUint]) -> Vec<Vec<u8>> {
    ciphertexts.iter().map(to_bytes).collect()
}

pub fn deserialize_ciphertexts<B: AsRef<[u8]>>(encoded: &[B]) -> Result<Vec<BigUint>, CryptoError> {
    encoded.iter().map(|b| from_bytes(b.as_ref())).collect()
}

/// Clé publique au format du ledger : n et g en octets big-endian.
/// n_squared est recalculé, jamais transmis.
pub fn parse_public_key(n_bytes: &[u8], g_bytes: &[u8]) -> Result<PublicKey, CryptoError> {
    let n = from_bytes(n_bytes)?;
    let g = from_bytes(g_bytes)?;
    PublicKey::new(n, g)
}

pub fn public_key_to_bytes(pk: &PublicKey) -> (Vec<u8>, Vec<u8>) {
    (to_bytes(pk.n()), to_bytes(pk.g()))
}
