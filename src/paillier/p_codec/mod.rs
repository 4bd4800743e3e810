pub mod p_codec;

pub use p_codec::{
    to_bytes, from_bytes, serialize_ciphertexts, deserialize_ciphertexts,
    parse_public_key, public_key_to_bytes,
};
