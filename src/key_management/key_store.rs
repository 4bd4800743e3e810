// ============================================================================
// KeyStore — stockage persistant des clés publiques nommées
//
// Substrat : SQLite (rusqlite), une table `keys` avec clé primaire `id`, un
// index non unique sur `name` et un index sur `created_at` pour le listage
// ordonné. La version du schéma est tenue dans PRAGMA user_version.
//
// Chaque opération logique est une seule transaction SQLite, exécutée sur
// un worker bloquant (spawn_blocking). La connexion est ouverte
// paresseusement à la première opération : init() est facultatif.
// ============================================================================

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row, TransactionBehavior};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::crypto_error::CryptoError;
use crate::key_management::key_export::{export_public_key, hex_to_biguint, import_public_key, PublicKeyHex};
use crate::paillier::p_keygen::PublicKey;

const SCHEMA_VERSION: i64 = 1;

const SCHEMA_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS keys (
        id          TEXT PRIMARY KEY NOT NULL,
        name        TEXT NOT NULL,
        n_hex       TEXT NOT NULL,
        g_hex       TEXT NOT NULL,
        created_at  INTEGER NOT NULL,
        last_used   INTEGER NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_keys_name ON keys(name);
    CREATE INDEX IF NOT EXISTS idx_keys_created_at ON keys(created_at);
"#;

const SELECT_COLUMNS: &str = "SELECT id, name, n_hex, g_hex, created_at, last_used FROM keys";

// ============================================================================
// Erreurs du stockage
// ============================================================================

#[derive(Debug, Error)]
pub enum KeyStoreError {
    /// Base introuvable, illisible, ou worker perdu
    #[error("Stockage des clés indisponible : {0}")]
    Unavailable(String),
    #[error("Transaction annulée : {0}")]
    Transaction(#[from] rusqlite::Error),
    /// Un enregistrement existe déjà sous cet identifiant : jamais écrasé
    #[error("Identifiant de clé déjà utilisé : {0}")]
    IdCollision(String),
    #[error("Matériel de clé invalide : {0}")]
    InvalidKeyMaterial(#[from] CryptoError),
    #[error("Enregistrement corrompu : {0}")]
    CorruptRecord(String),
    #[error("Sérialisation JSON : {0}")]
    Serialization(#[from] serde_json::Error),
}

impl KeyStoreError {
    /// Chaque opération étant atomique, elle peut être rejouée telle quelle.
    pub fn is_retryable(&self) -> bool {
        matches!(self, KeyStoreError::Unavailable(_) | KeyStoreError::Transaction(_))
    }
}

// ============================================================================
// Enregistrement
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredKeyRecord {
    pub id:         String,
    pub name:       String,
    pub public_key: PublicKeyHex,
    pub created_at: DateTime<Utc>,
    pub last_used:  DateTime<Utc>,
}

impl StoredKeyRecord {
    /// n_squared n'est pas stocké : il est recalculé ici.
    pub fn to_public_key(&self) -> Result<PublicKey, CryptoError> {
        import_public_key(&self.public_key)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportedKey<'a> {
    name:       &'a str,
    public_key: &'a PublicKeyHex,
    created_at: String,
}

// Ligne brute de la table, timestamps en microsecondes
struct KeyRow {
    id:         String,
    name:       String,
    n_hex:      String,
    g_hex:      String,
    created_at: i64,
    last_used:  i64,
}

impl KeyRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(KeyRow {
            id:         row.get(0)?,
            name:       row.get(1)?,
            n_hex:      row.get(2)?,
            g_hex:      row.get(3)?,
            created_at: row.get(4)?,
            last_used:  row.get(5)?,
        })
    }
}

fn micros_to_datetime(id: &str, micros: i64) -> Result<DateTime<Utc>, KeyStoreError> {
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| KeyStoreError::CorruptRecord(format!("horodatage hors plage pour {id}")))
}

impl TryFrom<KeyRow> for StoredKeyRecord {
    type Error = KeyStoreError;

    fn try_from(row: KeyRow) -> Result<Self, Self::Error> {
        let created_at = micros_to_datetime(&row.id, row.created_at)?;
        let last_used = micros_to_datetime(&row.id, row.last_used)?;
        Ok(StoredKeyRecord {
            id: row.id,
            name: row.name,
            public_key: PublicKeyHex { n: row.n_hex, g: row.g_hex },
            created_at,
            last_used,
        })
    }
}

// ============================================================================
// Accès SQLite (fonctions bloquantes, appelées depuis un worker)
// ============================================================================

fn unavailable(path: &Path, e: impl std::fmt::Display) -> KeyStoreError {
    KeyStoreError::Unavailable(format!("{} : {e}", path.display()))
}

// Ouvre ou crée la base et amène le schéma à SCHEMA_VERSION
fn open_connection(path: &Path) -> Result<Connection, KeyStoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| unavailable(path, e))?;
        }
    }

    let conn = Connection::open(path).map_err(|e| unavailable(path, e))?;
    let version: i64 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .map_err(|e| unavailable(path, e))?;

    if version > SCHEMA_VERSION {
        return Err(unavailable(
            path,
            format!("schéma version {version} plus récent que la version supportée {SCHEMA_VERSION}"),
        ));
    }
    if version < SCHEMA_VERSION {
        conn.execute_batch(SCHEMA_SQL).map_err(|e| unavailable(path, e))?;
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)
            .map_err(|e| unavailable(path, e))?;
        debug!(path = %path.display(), version = SCHEMA_VERSION, "schéma du stockage initialisé");
    }
    Ok(conn)
}

// INSERT strict : un identifiant existant n'est jamais fusionné ni écrasé
fn insert_row(conn: &mut Connection, row: &KeyRow) -> Result<(), KeyStoreError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let inserted = tx.execute(
        "INSERT INTO keys (id, name, n_hex, g_hex, created_at, last_used)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![row.id, row.name, row.n_hex, row.g_hex, row.created_at, row.last_used],
    );
    match inserted {
        Ok(_) => {}
        Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
            return Err(KeyStoreError::IdCollision(row.id.clone()));
        }
        Err(e) => return Err(e.into()),
    }
    tx.commit()?;
    Ok(())
}

fn touch_last_used(conn: &Connection, id: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE keys SET last_used = ?1 WHERE id = ?2",
        params![Utc::now().timestamp_micros(), id],
    )
}

fn query_rows(conn: &Connection, sql: &str, args: &[&dyn rusqlite::ToSql]) -> Result<Vec<KeyRow>, KeyStoreError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(args, KeyRow::from_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

fn into_records(rows: Vec<KeyRow>) -> Result<Vec<StoredKeyRecord>, KeyStoreError> {
    rows.into_iter().map(StoredKeyRecord::try_from).collect()
}

// ============================================================================
// KeyStore
//
// Clonable à faible coût (Arc) : toutes les copies partagent la connexion.
// ============================================================================

struct Inner {
    path: PathBuf,
    conn: OnceCell<Arc<Mutex<Connection>>>,
}

#[derive(Clone)]
pub struct KeyStore {
    inner: Arc<Inner>,
}

impl KeyStore {
    /// Aucun accès disque ici : la base est ouverte à la première opération.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        KeyStore {
            inner: Arc::new(Inner { path: path.into(), conn: OnceCell::new() }),
        }
    }

    /// Base SQLite en mémoire, perdue à la destruction du store.
    pub fn in_memory() -> Self {
        Self::new(":memory:")
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Ouverture explicite (open-or-create). Facultative.
    pub async fn init(&self) -> Result<(), KeyStoreError> {
        self.connection().await.map(|_| ())
    }

    // Un échec d'ouverture laisse la cellule vide : la prochaine opération
    // retente l'ouverture.
    async fn connection(&self) -> Result<Arc<Mutex<Connection>>, KeyStoreError> {
        let conn = self
            .inner
            .conn
            .get_or_try_init(|| async {
                let path = self.inner.path.clone();
                let conn = tokio::task::spawn_blocking(move || open_connection(&path))
                    .await
                    .map_err(|e| KeyStoreError::Unavailable(format!("worker d'ouverture : {e}")))??;
                Ok::<_, KeyStoreError>(Arc::new(Mutex::new(conn)))
            })
            .await?;
        Ok(Arc::clone(conn))
    }

    async fn run<T, F>(&self, op: F) -> Result<T, KeyStoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, KeyStoreError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.connection().await?;
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| KeyStoreError::Unavailable("verrou de connexion empoisonné".into()))?;
            op(&mut guard)
        })
        .await
        .map_err(|e| KeyStoreError::Unavailable(format!("worker de stockage : {e}")))?
    }

    // -----------------------------------------------------------------------
    // storeKey : nouvel identifiant, createdAt = lastUsed = maintenant
    // -----------------------------------------------------------------------
    pub async fn store_key(&self, name: &str, public_key: &PublicKey) -> Result<String, KeyStoreError> {
        let hex = export_public_key(public_key);
        let now = Utc::now().timestamp_micros();
        let row = KeyRow {
            id:         Uuid::new_v4().to_string(),
            name:       name.to_string(),
            n_hex:      hex.n,
            g_hex:      hex.g,
            created_at: now,
            last_used:  now,
        };
        let id = row.id.clone();

        self.run(move |conn| insert_row(conn, &row)).await?;
        debug!(%id, name, "clé publique stockée");
        Ok(id)
    }

    // -----------------------------------------------------------------------
    // getKey : enregistrement tel que lu. Lecture et mise à jour de lastUsed
    // dans une même transaction ; la mise à jour est isolée dans un
    // savepoint : un échec l'annule seule, est journalisé, et la lecture
    // aboutit quand même.
    // -----------------------------------------------------------------------
    pub async fn get_key(&self, id: &str) -> Result<Option<StoredKeyRecord>, KeyStoreError> {
        let id = id.to_string();
        let row = self
            .run(move |conn| {
                let mut tx = conn.transaction()?;
                let row = tx
                    .query_row(&format!("{SELECT_COLUMNS} WHERE id = ?1"), params![id], KeyRow::from_row)
                    .optional()?;
                if row.is_some() {
                    // Savepoint abandonné = rollback à la destruction
                    let sp = tx.savepoint()?;
                    if let Err(e) = touch_last_used(&sp, &id).and_then(|_| sp.commit()) {
                        warn!(%id, error = %e, "mise à jour de lastUsed échouée");
                    }
                }
                tx.commit()?;
                Ok(row)
            })
            .await?;
        row.map(StoredKeyRecord::try_from).transpose()
    }

    /// Tous les enregistrements, par date de création croissante.
    pub async fn get_all_keys(&self) -> Result<Vec<StoredKeyRecord>, KeyStoreError> {
        let rows = self
            .run(|conn| query_rows(conn, &format!("{SELECT_COLUMNS} ORDER BY created_at, rowid"), params![]))
            .await?;
        into_records(rows)
    }

    /// Recherche par l'index secondaire `name` (non unique).
    pub async fn find_by_name(&self, name: &str) -> Result<Vec<StoredKeyRecord>, KeyStoreError> {
        let name = name.to_string();
        let rows = self
            .run(move |conn| {
                query_rows(conn, &format!("{SELECT_COLUMNS} WHERE name = ?1 ORDER BY created_at, rowid"), params![name])
            })
            .await?;
        into_records(rows)
    }

    /// Idempotent : supprimer un identifiant absent n'est pas une erreur.
    pub async fn delete_key(&self, id: &str) -> Result<(), KeyStoreError> {
        let id = id.to_string();
        let removed = self
            .run({
                let id = id.clone();
                move |conn| Ok(conn.execute("DELETE FROM keys WHERE id = ?1", params![id])?)
            })
            .await?;
        debug!(%id, removed, "suppression de clé");
        Ok(())
    }

    /// Importe une clé publique fournie en hexadécimal.
    pub async fn import_key(&self, name: &str, n_hex: &str, g_hex: &str) -> Result<String, KeyStoreError> {
        let n = hex_to_biguint(n_hex)?;
        let g = hex_to_biguint(g_hex)?;
        let public_key = PublicKey::new(n, g)?;
        self.store_key(name, &public_key).await
    }

    /// Document JSON { name, publicKey, createdAt } ; None si l'identifiant est absent.
    pub async fn export_key(&self, id: &str) -> Result<Option<String>, KeyStoreError> {
        let Some(record) = self.get_key(id).await? else {
            return Ok(None);
        };
        let exported = ExportedKey {
            name:       &record.name,
            public_key: &record.public_key,
            created_at: record.created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        };
        Ok(Some(serde_json::to_string_pretty(&exported)?))
    }
}
