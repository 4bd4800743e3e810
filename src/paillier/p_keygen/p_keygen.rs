use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use num_bigint::BigUint;
use num_traits::{One, Zero};
use rand_core::OsRng;
use tracing::{debug, info, warn};
use zeroize::Zeroize;

use crate::crypto_error::CryptoError;
use crate::paillier::math::{
    has_small_factor, is_probable_prime_with, l_function, lcm, mod_inverse, mod_pow,
    random_bits_with, DEFAULT_MR_ROUNDS,
};

// Taille minimale de module acceptée
pub const MIN_KEY_BITS: u64 = 512;

// ============================================================================
// Clé publique Paillier — pas de données secrètes, pas de zeroize nécessaire
//
// Invariant : n > 0 et n_squared == n*n. Les champs sont privés pour que
// l'invariant ne puisse pas être cassé après construction.
// ============================================================================
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicKey {
    n:         BigUint,
    g:         BigUint,
    n_squared: BigUint,
}

impl PublicKey {
    /// Construit une clé publique ; n_squared est recalculé, jamais transmis.
    pub fn new(n: BigUint, g: BigUint) -> Result<Self, CryptoError> {
        if n.is_zero() {
            return Err(CryptoError::InvalidPublicKey("le module n doit être > 0".into()));
        }
        if g.is_zero() {
            return Err(CryptoError::InvalidPublicKey("le générateur g doit être > 0".into()));
        }
        let n_squared = &n * &n;
        Ok(PublicKey { n, g, n_squared })
    }

    /// Clé publique canonique g = n+1.
    pub fn from_modulus(n: BigUint) -> Result<Self, CryptoError> {
        let g = &n + BigUint::one();
        Self::new(n, g)
    }

    pub fn n(&self) -> &BigUint { &self.n }
    pub fn g(&self) -> &BigUint { &self.g }
    pub fn n_squared(&self) -> &BigUint { &self.n_squared }

    /// Taille du module en bits
    pub fn bits(&self) -> u64 { self.n.bits() }
}

// ============================================================================
// Helper : remet à zéro un BigUint
// ============================================================================
fn zeroize_biguint(n: &mut BigUint) {
    n.set_zero();
}

// ============================================================================
// Clé privée Paillier — ZEROISÉE À LA DESTRUCTION
// ============================================================================
#[derive(Clone)]
pub struct PrivateKey {
    lambda: BigUint,
    mu:     BigUint,
}

impl PrivateKey {
    pub fn lambda(&self) -> &BigUint { &self.lambda }
    pub fn mu(&self) -> &BigUint { &self.mu }
}

// Jamais de lambda/mu dans les logs
impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey { .. }")
    }
}

impl Zeroize for PrivateKey {
    fn zeroize(&mut self) {
        zeroize_biguint(&mut self.lambda);
        zeroize_biguint(&mut self.mu);
    }
}

impl Drop for PrivateKey {
    fn drop(&mut self) {
        self.zeroize();
    }
}

// ============================================================================
// Paire de clés — produite d'un bloc par generate_keypair
// ============================================================================
#[derive(Debug)]
pub struct KeyPair {
    public_key:  PublicKey,
    private_key: PrivateKey,
}

impl KeyPair {
    pub fn public_key(&self) -> &PublicKey { &self.public_key }
    pub fn private_key(&self) -> &PrivateKey { &self.private_key }

    /// Ne garde que la moitié publique ; la clé privée est zéroïsée.
    pub fn into_public_key(self) -> PublicKey {
        let KeyPair { public_key, .. } = self;
        public_key
    }
}

// ============================================================================
// Annulation coopérative
//
// Vérifiée entre deux candidats de la recherche de premiers. La génération
// ne touche aucun état partagé avant de rendre la paire : annuler ne laisse
// rien à moitié écrit.
// ============================================================================
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self { Self::default() }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), CryptoError> {
        if self.is_cancelled() {
            return Err(CryptoError::Cancelled);
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug)]
pub struct KeygenOptions {
    /// Témoins Miller-Rabin par candidat
    pub rounds: u32,
}

impl Default for KeygenOptions {
    fn default() -> Self {
        KeygenOptions { rounds: DEFAULT_MR_ROUNDS }
    }
}

// ---------------------------------------------------------------------------
// Recherche de premier par rejet : candidats impairs de `bits` bits jusqu'à
// ce que l'un passe Miller-Rabin. Nombre d'essais non borné.
// ---------------------------------------------------------------------------
pub fn generate_prime_with(bits: u64, rounds: u32, cancel: &CancelToken) -> Result<BigUint, CryptoError> {
    if bits < 2 {
        return Err(CryptoError::InvalidInput(format!(
            "un premier impair exige au moins 2 bits, {bits} demandés"
        )));
    }
    if rounds == 0 {
        return Err(CryptoError::InvalidInput("au moins un tour de Miller-Rabin".into()));
    }

    let mut rng = OsRng;
    let mut attempts: u64 = 0;

    loop {
        cancel.check()?;
        attempts += 1;

        let mut candidate = random_bits_with(&mut rng, bits)?;
        candidate.set_bit(0, true);

        if has_small_factor(&candidate) {
            continue;
        }
        if is_probable_prime_with(&candidate, rounds, &mut rng)? {
            debug!(bits, attempts, "premier trouvé");
            return Ok(candidate);
        }
    }
}

pub fn generate_prime(bits: u64) -> Result<BigUint, CryptoError> {
    generate_prime_with(bits, DEFAULT_MR_ROUNDS, &CancelToken::new())
}

/// Rejet des tailles invalides (impaire ou < MIN_KEY_BITS), avant toute
/// consommation d'aléa.
pub fn validate_key_bits(bit_length: u64) -> Result<(), CryptoError> {
    if bit_length % 2 != 0 {
        return Err(CryptoError::OddKeySize(bit_length));
    }
    if bit_length < MIN_KEY_BITS {
        return Err(CryptoError::KeySizeTooSmall {
            requested: bit_length,
            minimum:   MIN_KEY_BITS,
        });
    }
    Ok(())
}

// ============================================================================
// Génération de clés Paillier
//
//   n = p·q, lambda = lcm(p-1, q-1), g = n+1
//   mu = L(g^lambda mod n²)^-1 mod n
//
// p == q est rejeté et toute la génération recommence (boucle, pas de
// récursion). Une inverse introuvable remonte telle quelle : c'est un
// invariant violé, pas une entrée invalide.
// ============================================================================
pub fn generate_keypair_with(
    bit_length: u64,
    options: &KeygenOptions,
    cancel: &CancelToken,
) -> Result<KeyPair, CryptoError> {
    validate_key_bits(bit_length)?;

    let started = Instant::now();
    let half_bits = bit_length / 2;

    let (p, q) = loop {
        let p = generate_prime_with(half_bits, options.rounds, cancel)?;
        let q = generate_prime_with(half_bits, options.rounds, cancel)?;
        if p != q {
            break (p, q);
        }
        warn!(bit_length, "p == q, nouvelle génération");
    };

    let n         = &p * &q;
    let n_squared = &n * &n;

    let p_minus_1 = &p - BigUint::one();
    let q_minus_1 = &q - BigUint::one();
    let lambda    = lcm(&p_minus_1, &q_minus_1)?;

    let g = &n + BigUint::one();

    let g_lambda   = mod_pow(&g, &lambda, &n_squared)?;
    let l_g_lambda = l_function(&g_lambda, &n);
    let mu         = mod_inverse(&l_g_lambda, &n)?;

    info!(
        bit_length,
        modulus_bits = n.bits(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "paire de clés Paillier générée"
    );

    Ok(KeyPair {
        public_key:  PublicKey { n, g, n_squared },
        private_key: PrivateKey { lambda, mu },
    })
}

pub fn generate_keypair(bit_length: u64) -> Result<KeyPair, CryptoError> {
    generate_keypair_with(bit_length, &KeygenOptions::default(), &CancelToken::new())
}

// ---------------------------------------------------------------------------
// Génération sur un worker dédié (recherche CPU, non bornée)
//
// Le jeton reste utilisable par l'appelant pour interrompre la recherche.
// ---------------------------------------------------------------------------
pub async fn generate_keypair_in_background(
    bit_length: u64,
    options: KeygenOptions,
    cancel: CancelToken,
) -> Result<KeyPair, CryptoError> {
    validate_key_bits(bit_length)?;
    tokio::task::spawn_blocking(move || generate_keypair_with(bit_length, &options, &cancel))
        .await
        .map_err(|e| CryptoError::BackgroundTask(e.to_string()))?
}
