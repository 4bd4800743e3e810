use num_bigint::BigUint;

use paillier_vault::encryption_service::{ciphertexts_to_ledger_format, create_encrypted_document};
use paillier_vault::key_management::{biguint_to_hex, export_public_key, write_keypair_backup, KeyPairExport};
use paillier_vault::{generate_keypair, Config, Cryptosystem, KeyStore, KeyStoreError};

#[tokio::test]
async fn generate_store_reload_encrypt() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("vault").join("keys.db");

    let kp = generate_keypair(512).unwrap();
    let id = {
        let store = KeyStore::new(&db);
        store.store_key("principale", kp.public_key()).await.unwrap()
    };

    // Nouvelle instance sur le même fichier
    let store = KeyStore::new(&db);
    let record = store.get_key(&id).await.unwrap().expect("clé persistée");
    assert_eq!(record.name, "principale");
    assert_eq!(record.public_key, export_public_key(kp.public_key()));

    let pk = record.to_public_key().unwrap();
    assert_eq!(pk, *kp.public_key());

    let cs = Cryptosystem::new(pk);
    let doc = create_encrypted_document("doc-42", &[10, 20, 30], 12, &cs, |_| {}).unwrap();
    let raw = ciphertexts_to_ledger_format(&doc.encrypted_tokens).unwrap();
    assert_eq!(raw.len(), 3);

    let all = store.get_all_keys().await.unwrap();
    assert_eq!(all.len(), 1);
    store.delete_key(&id).await.unwrap();
    assert!(store.get_key(&id).await.unwrap().is_none());
    assert!(store.get_all_keys().await.unwrap().is_empty());
}

#[tokio::test]
async fn import_then_export_json_shape() {
    let store = KeyStore::in_memory();
    let n = BigUint::from(3233u32);
    let g = BigUint::from(3234u32);

    let id = store.import_key("importée", &biguint_to_hex(&n), &biguint_to_hex(&g)).await.unwrap();
    let json = store.export_key(&id).await.unwrap().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert_eq!(value["name"], "importée");
    assert_eq!(value["publicKey"]["n"], "ca1");
    assert_eq!(value["publicKey"]["g"], "ca2");
    assert!(value["createdAt"].is_string());

    assert!(store.export_key("inconnue").await.unwrap().is_none());
}

#[tokio::test]
async fn import_rejects_bad_material() {
    let store = KeyStore::in_memory();
    let err = store.import_key("x", "zz", "01").await.unwrap_err();
    assert!(matches!(err, KeyStoreError::InvalidKeyMaterial(_)));
    assert!(!err.is_retryable());

    let err = store.import_key("x", "0", "01").await.unwrap_err();
    assert!(matches!(err, KeyStoreError::InvalidKeyMaterial(_)));
    assert!(store.get_all_keys().await.unwrap().is_empty());
}

#[tokio::test]
async fn store_path_from_config_override() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::from_toml_str("[keygen]\nbits = 512\n").unwrap();
    config.apply_overrides(Some(dir.path().join("keys.db")));

    let store = KeyStore::new(config.store.path.clone());
    store.init().await.unwrap();
    assert!(dir.path().join("keys.db").exists());
}

#[test]
fn keypair_backup_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("backups").join("pair.json");
    let kp = generate_keypair(512).unwrap();

    write_keypair_backup(&kp, &path).unwrap();
    let raw = std::fs::read_to_string(&path).unwrap();
    let backup: KeyPairExport = serde_json::from_str(&raw).unwrap();
    assert_eq!(backup.public_key, export_public_key(kp.public_key()));
    assert_eq!(backup.private_key.lambda, biguint_to_hex(kp.private_key().lambda()));
    assert!(!backup.warning.is_empty());
}
