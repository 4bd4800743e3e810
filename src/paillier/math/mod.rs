// Réexporte toutes les fonctions mathématiques

mod math;

pub use math::{
    l_function, gcd, lcm, mod_pow, mod_inverse,
    random_bits, random_bits_with, random_below, random_below_with,
    is_probable_prime, is_probable_prime_with,
    DEFAULT_MR_ROUNDS,
};

pub(crate) use math::has_small_factor;
