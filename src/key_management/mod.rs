pub mod key_export;
pub mod key_store;

// Réexportations key_export
pub use key_export::{
    PublicKeyHex, PrivateKeyHex, KeyPairExport, MAX_HEX_FIELD_LEN, DEMO_KEY_WARNING,
    biguint_to_hex, hex_to_biguint,
    export_public_key, export_private_key_for_backup, export_keypair, export_keypair_json,
    import_public_key, write_keypair_backup,
};

// Réexportations key_store
pub use key_store::{KeyStore, KeyStoreError, StoredKeyRecord};
