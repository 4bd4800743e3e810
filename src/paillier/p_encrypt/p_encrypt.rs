use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::One;
use rand_core::{CryptoRng, OsRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::crypto_error::CryptoError;
use crate::paillier::math::{gcd, mod_pow, random_below_with};
use crate::paillier::p_keygen::PublicKey;

// Constantes du dérivé déterministe de r (format des anciens chiffrés de démo)
const LEGACY_R_FACTOR: u64 = 31_415_926_535;
const LEGACY_R_OFFSET: u64 = 2_718_281_828;

/// Choix de la valeur d'aveuglement r de chaque chiffrement.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Blinding {
    /// r uniforme dans [1, n) avec gcd(r, n) = 1 : sécurité sémantique.
    #[default]
    Random,
    /// r dérivé du message. Deux chiffrements du même m sont identiques.
    /// Uniquement pour relire/reproduire les chiffrés de démo existants.
    LegacyDeterministic,
}

// ============================================================================
// Moteur de chiffrement Paillier
//
// Ne détient qu'une clé publique : il ne peut pas déchiffrer.
// ============================================================================
#[derive(Clone, Debug)]
pub struct Cryptosystem {
    public_key: PublicKey,
    blinding:   Blinding,
}

impl Cryptosystem {
    pub fn new(public_key: PublicKey) -> Self {
        Self::with_blinding(public_key, Blinding::Random)
    }

    pub fn with_blinding(public_key: PublicKey, blinding: Blinding) -> Self {
        Cryptosystem { public_key, blinding }
    }

    pub fn public_key(&self) -> &PublicKey { &self.public_key }

    pub fn blinding(&self) -> Blinding { self.blinding }

    // -----------------------------------------------------------------------
    // Chiffrement Paillier : c = g^m · r^n  mod n²
    //
    // Retourne Err(CryptoError::MessageOutOfRange) si m >= n : le message
    // n'est jamais réduit silencieusement.
    // -----------------------------------------------------------------------
    pub fn encrypt(&self, m: &BigUint) -> Result<BigUint, CryptoError> {
        self.encrypt_with_rng(m, &mut OsRng)
    }

    pub fn encrypt_with_rng<R: RngCore + CryptoRng>(&self, m: &BigUint, rng: &mut R) -> Result<BigUint, CryptoError> {
        let pk = &self.public_key;
        if m >= pk.n() {
            return Err(CryptoError::MessageOutOfRange);
        }

        let r = match self.blinding {
            Blinding::Random => random_blinding(pk.n(), rng)?,
            Blinding::LegacyDeterministic => legacy_blinding(m, pk.n()),
        };

        let g_m = mod_pow(pk.g(), m, pk.n_squared())?;
        let r_n = mod_pow(&r, pk.n(), pk.n_squared())?;
        Ok((g_m * r_n) % pk.n_squared())
    }

    /// Chiffrement élément par élément, ordre préservé.
    pub fn encrypt_many(&self, plaintexts: &[BigUint]) -> Result<Vec<BigUint>, CryptoError> {
        plaintexts.iter().map(|m| self.encrypt(m)).collect()
    }

    /// Chiffre directement les identifiants de jetons du tokenizer.
    pub fn encrypt_tokens(&self, tokens: &[u32]) -> Result<Vec<BigUint>, CryptoError> {
        tokens.iter().map(|&t| self.encrypt(&BigUint::from(t))).collect()
    }
}

// Choisit r dans Z*_n : tirage uniforme dans [1, n), re-tirage si gcd(r, n) != 1
pub(crate) fn random_blinding<R: RngCore + CryptoRng>(n: &BigUint, rng: &mut R) -> Result<BigUint, CryptoError> {
    if n <= &BigUint::one() {
        return Err(CryptoError::InvalidPublicKey("module trop petit pour un aléa dans [1, n)".into()));
    }
    let span = n - BigUint::one();
    loop {
        let candidate = random_below_with(rng, &span)? + BigUint::one();
        if gcd(&candidate, n).is_one() {
            return Ok(candidate);
        }
    }
}

// r = (m·31415926535 + 2718281828) mod n, rendu impair
fn legacy_blinding(m: &BigUint, n: &BigUint) -> BigUint {
    let mut r = (m * BigUint::from(LEGACY_R_FACTOR) + BigUint::from(LEGACY_R_OFFSET)) % n;
    if r.is_even() {
        r += BigUint::one();
    }
    r
}
