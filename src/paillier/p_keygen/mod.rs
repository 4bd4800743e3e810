pub mod p_keygen;

pub use p_keygen::{
    PublicKey, PrivateKey, KeyPair, CancelToken, KeygenOptions, MIN_KEY_BITS,
    validate_key_bits, generate_prime, generate_prime_with,
    generate_keypair, generate_keypair_with, generate_keypair_in_background,
};
