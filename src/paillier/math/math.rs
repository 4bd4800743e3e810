use num_bigint::{BigInt, BigUint};
use num_integer::Integer;
use num_traits::{One, Zero};
use rand_core::{CryptoRng, OsRng, RngCore};
use crate::crypto_error::CryptoError;

/// Nombre de témoins Miller-Rabin par défaut : probabilité de faux positif <= 4^-40.
pub const DEFAULT_MR_ROUNDS: u32 = 40;

// ---------------------------------------------------------------------------
// Table de petits premiers (crible préliminaire de la recherche de premiers)
// ---------------------------------------------------------------------------
pub(crate) const SMALL_PRIMES: &[u32] = &[
      3,   5,   7,  11,  13,  17,  19,  23,  29,  31,
     37,  41,  43,  47,  53,  59,  61,  67,  71,  73,
     79,  83,  89,  97, 101, 103, 107, 109, 113, 127,
    131, 137, 139, 149, 151, 157, 163, 167, 173, 179,
    181, 191, 193, 197, 199, 211, 223, 227, 229, 233,
    239, 241, 251,
];

// Fonction L(u) = (u-1)/n
pub fn l_function(u: &BigUint, n: &BigUint) -> BigUint {
    (u - BigUint::one()) / n
}

// ---------------------------------------------------------------------------
// Aléa
//
// Toute la génération passe par try_fill_bytes : une panne de la source
// système remonte en CryptoError::RandomSource, jamais de repli sur un
// générateur non cryptographique.
// ---------------------------------------------------------------------------

fn fill_bits<R: RngCore + CryptoRng>(rng: &mut R, bits: u64) -> Result<BigUint, CryptoError> {
    let nbytes = ((bits + 7) / 8) as usize;
    let mut buf = vec![0u8; nbytes];
    rng.try_fill_bytes(&mut buf)?;

    let mut value = BigUint::from_bytes_be(&buf);
    // Masque à `bits` bits : on ne garde que les bits de poids faible
    let excess = nbytes as u64 * 8 - bits;
    if excess > 0 {
        let mask = (BigUint::one() << bits) - BigUint::one();
        value &= mask;
    }
    Ok(value)
}

/// Entier aléatoire d'exactement `bits` bits (bit de poids fort forcé à 1).
pub fn random_bits_with<R: RngCore + CryptoRng>(rng: &mut R, bits: u64) -> Result<BigUint, CryptoError> {
    if bits == 0 {
        return Err(CryptoError::InvalidInput("randomBits exige au moins 1 bit".into()));
    }
    let mut value = fill_bits(rng, bits)?;
    value.set_bit(bits - 1, true);
    Ok(value)
}

pub fn random_bits(bits: u64) -> Result<BigUint, CryptoError> {
    random_bits_with(&mut OsRng, bits)
}

/// Entier uniforme dans [0, bound), par rejet.
pub fn random_below_with<R: RngCore + CryptoRng>(rng: &mut R, bound: &BigUint) -> Result<BigUint, CryptoError> {
    if bound.is_zero() {
        return Err(CryptoError::InvalidInput("borne supérieure nulle".into()));
    }
    let bits = bound.bits();
    loop {
        let candidate = fill_bits(rng, bits)?;
        if &candidate < bound {
            return Ok(candidate);
        }
    }
}

pub fn random_below(bound: &BigUint) -> Result<BigUint, CryptoError> {
    random_below_with(&mut OsRng, bound)
}

// ---------------------------------------------------------------------------
// Arithmétique modulaire
// ---------------------------------------------------------------------------

/// base^exponent mod modulus, par carrés successifs. Résultat dans [0, modulus).
pub fn mod_pow(base: &BigUint, exponent: &BigUint, modulus: &BigUint) -> Result<BigUint, CryptoError> {
    if modulus.is_zero() {
        return Err(CryptoError::ZeroModulus);
    }
    Ok(base.modpow(exponent, modulus))
}

// Calcule le pgcd de deux nombres
pub fn gcd(a: &BigUint, b: &BigUint) -> BigUint {
    a.gcd(b)
}

pub fn lcm(a: &BigUint, b: &BigUint) -> Result<BigUint, CryptoError> {
    let g = gcd(a, b);
    if g.is_zero() {
        return Err(CryptoError::LcmOfZeros);
    }
    Ok((a / &g) * b)
}

// ---------------------------------------------------------------------------
// Calcule l'inverse modulaire de a mod m.
// Retourne Err(CryptoError::NoModularInverse) si gcd(a,m) != 1 : jamais
// d'inverse fantaisiste.
// ---------------------------------------------------------------------------
pub fn mod_inverse(a: &BigUint, m: &BigUint) -> Result<BigUint, CryptoError> {
    if m.is_zero() {
        return Err(CryptoError::ZeroModulus);
    }
    if m.is_one() {
        return Ok(BigUint::zero());
    }

    let (g, x) = extended_gcd(a, m);
    if !g.is_one() {
        return Err(CryptoError::NoModularInverse);
    }

    let m_big = BigInt::from(m.clone());
    let x_mod = x.mod_floor(&m_big);
    x_mod.to_biguint().ok_or(CryptoError::NegativeConversion)
}

// Renvoie (gcd(a, b), s) avec a·s ≡ gcd (mod b)
fn extended_gcd(a: &BigUint, b: &BigUint) -> (BigUint, BigInt) {
    let (mut old_r, mut r) = (BigInt::from(a.clone()), BigInt::from(b.clone()));
    let (mut old_s, mut s) = (BigInt::one(), BigInt::zero());

    while !r.is_zero() {
        let quotient = &old_r / &r;

        let next_r = &old_r - &quotient * &r;
        old_r = std::mem::replace(&mut r, next_r);

        let next_s = &old_s - &quotient * &s;
        old_s = std::mem::replace(&mut s, next_s);
    }

    (old_r.to_biguint().unwrap_or_default(), old_s)
}

// ---------------------------------------------------------------------------
// Test de primalité de Miller-Rabin
//
// n - 1 = d·2^r ; chaque tour tire un témoin a uniforme dans [2, n-2].
// Sortie anticipée sur x = 1 ou x = n-1.
// ---------------------------------------------------------------------------
pub fn is_probable_prime_with<R: RngCore + CryptoRng>(
    n: &BigUint,
    rounds: u32,
    rng: &mut R,
) -> Result<bool, CryptoError> {
    let two = BigUint::from(2u32);
    let three = BigUint::from(3u32);

    if n < &two { return Ok(false); }
    if n == &two || n == &three { return Ok(true); }
    if n.is_even() { return Ok(false); }

    let n_minus_1 = n - BigUint::one();
    let mut d = n_minus_1.clone();
    let mut r = 0u64;
    while d.is_even() {
        d >>= 1;
        r += 1;
    }

    // Témoins dans [2, n-2] : 2 + [0, n-3)
    let witness_span = n - &three;

    'witness: for _ in 0..rounds {
        let a = random_below_with(rng, &witness_span)? + &two;
        let mut x = a.modpow(&d, n);
        if x.is_one() || x == n_minus_1 {
            continue 'witness;
        }
        for _ in 0..r.saturating_sub(1) {
            x = (&x * &x) % n;
            if x == n_minus_1 {
                continue 'witness;
            }
            if x.is_one() {
                return Ok(false);
            }
        }
        return Ok(false);
    }
    Ok(true)
}

pub fn is_probable_prime(n: &BigUint, rounds: u32) -> Result<bool, CryptoError> {
    is_probable_prime_with(n, rounds, &mut OsRng)
}

// Vrai si n est divisible par un des petits premiers de la table (n lui-même exclu)
pub(crate) fn has_small_factor(n: &BigUint) -> bool {
    SMALL_PRIMES.iter().any(|&p| {
        let bp = BigUint::from(p);
        n != &bp && (n % &bp).is_zero()
    })
}
