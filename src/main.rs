// =========================================================
// paillier_vault — génération, stockage et chiffrement
// avec des clés publiques Paillier
// =========================================================

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use num_bigint::BigUint;
use tracing::info;

use paillier_vault::config::Config;
use paillier_vault::encryption_service::create_encrypted_document;
use paillier_vault::key_management::{export_public_key, write_keypair_backup, KeyStore};
use paillier_vault::p_codec::to_bytes;
use paillier_vault::p_keygen::{generate_keypair_in_background, CancelToken};
use paillier_vault::{logger, Cryptosystem};

#[derive(Parser)]
#[command(name = "paillier_vault", version, about = "Clés Paillier : génération, stockage, chiffrement")]
struct Cli {
    /// Fichier de configuration TOML
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Base de clés (remplace la valeur de la configuration)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Génère une paire de clés et stocke la clé publique
    Keygen {
        #[arg(long)]
        bits: Option<u64>,
        #[arg(long, default_value = "default")]
        name: String,
        /// Écrit aussi la paire complète (clé privée en clair) dans ce fichier
        #[arg(long)]
        backup: Option<PathBuf>,
    },
    /// Importe une clé publique hexadécimale
    Import {
        #[arg(long)]
        name: String,
        #[arg(long)]
        n: String,
        #[arg(long)]
        g: String,
    },
    /// Liste les clés stockées
    List,
    /// Affiche une clé
    Show { id: String },
    /// Export JSON d'une clé
    Export { id: String },
    /// Supprime une clé (sans erreur si absente)
    Delete { id: String },
    /// Chiffre des identifiants de jetons avec une clé stockée
    Encrypt {
        #[arg(long)]
        key: String,
        /// Produit un document chiffré JSON sous cet identifiant
        #[arg(long)]
        document: Option<String>,
        #[arg(required = true)]
        tokens: Vec<u32>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    logger::init();

    let cli = Cli::parse();
    let mut config = Config::load_or_default(cli.config.as_deref())?;
    config.apply_overrides(cli.db.clone());

    let store = KeyStore::new(config.store.path.clone());

    match cli.command {
        Command::Keygen { bits, name, backup } => {
            let bits = bits.unwrap_or(config.keygen.bits);
            let token = CancelToken::new();
            let keygen = generate_keypair_in_background(bits, config.keygen.options(), token.clone());
            tokio::pin!(keygen);

            let pair = tokio::select! {
                res = &mut keygen => res?,
                _ = tokio::signal::ctrl_c() => {
                    // La tâche bloquante s'arrête au prochain candidat
                    token.cancel();
                    bail!("génération interrompue");
                }
            };

            if let Some(path) = backup {
                write_keypair_backup(&pair, &path)
                    .with_context(|| format!("écriture de la sauvegarde {}", path.display()))?;
                info!(path = %path.display(), "sauvegarde de la paire écrite");
            }

            let id = store.store_key(&name, pair.public_key()).await?;
            let hex = export_public_key(pair.public_key());
            println!("{id}");
            println!("n = {}", hex.n);
            println!("g = {}", hex.g);
        }
        Command::Import { name, n, g } => {
            let id = store.import_key(&name, &n, &g).await?;
            println!("{id}");
        }
        Command::List => {
            for record in store.get_all_keys().await? {
                println!(
                    "{}  {:<20}  créée {}  utilisée {}",
                    record.id,
                    record.name,
                    record.created_at.to_rfc3339(),
                    record.last_used.to_rfc3339()
                );
            }
        }
        Command::Show { id } => match store.get_key(&id).await? {
            Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
            None => bail!("clé introuvable : {id}"),
        },
        Command::Export { id } => match store.export_key(&id).await? {
            Some(json) => println!("{json}"),
            None => bail!("clé introuvable : {id}"),
        },
        Command::Delete { id } => {
            store.delete_key(&id).await?;
        }
        Command::Encrypt { key, document, tokens } => {
            let Some(record) = store.get_key(&key).await? else {
                bail!("clé introuvable : {key}");
            };
            let cryptosystem = Cryptosystem::with_blinding(record.to_public_key()?, config.encryption.blinding);

            match document {
                Some(doc_id) => {
                    let doc = create_encrypted_document(&doc_id, &tokens, 0, &cryptosystem, |p| {
                        info!(progress = p, "chiffrement");
                    })?;
                    println!("{}", serde_json::to_string_pretty(&doc)?);
                }
                None => {
                    for token in tokens {
                        let c = cryptosystem.encrypt(&BigUint::from(token))?;
                        println!("{}", hex::encode(to_bytes(&c)));
                    }
                }
            }
        }
    }

    Ok(())
}
