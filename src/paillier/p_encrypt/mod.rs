pub mod p_encrypt;

pub use p_encrypt::{Cryptosystem, Blinding};
