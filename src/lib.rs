// Déclaration des modules
pub mod crypto_error;
pub mod paillier;
pub mod key_management;
pub mod encryption_service;
pub mod config;
pub mod logger;

pub use crate::paillier::math;
pub use crate::paillier::p_keygen;
pub use crate::paillier::p_encrypt;
pub use crate::paillier::p_codec;

// Fonctions mathématiques principales
pub use crate::paillier::math::{gcd, lcm, mod_pow, mod_inverse, random_bits, is_probable_prime};

// Génération de clés et chiffrement
pub use p_keygen::{PublicKey, PrivateKey, KeyPair, CancelToken, KeygenOptions, generate_keypair, generate_prime};
pub use p_encrypt::{Cryptosystem, Blinding};
pub use p_codec::parse_public_key;

// Erreur centralisée
pub use crypto_error::{CryptoError, ErrorKind};

// Stockage persistant des clés publiques
pub use key_management::{KeyStore, KeyStoreError, StoredKeyRecord};

pub use config::{Config, ConfigError};
