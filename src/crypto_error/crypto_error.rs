// ===========================================================================
// Gestion centralisée des erreurs cryptographiques
//
// Tous les modules du noyau (math, keygen, chiffrement, codec) renvoient ce
// type au lieu de panic!/assert!/unwrap(). Les erreurs sont réparties en
// quatre classes (voir ErrorKind) pour que l'appelant distingue une entrée
// invalide d'un invariant arithmétique violé.
// ===========================================================================

use thiserror::Error;

/// Classe d'une erreur cryptographique.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Entrée refusée avant tout traitement.
    Validation,
    /// Précondition arithmétique violée : défaut logique en amont.
    Arithmetic,
    /// La source d'aléa système a échoué.
    Entropy,
    /// Opération interrompue (annulation ou worker perdu).
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    // --- Erreurs de paramètres d'entrée ---
    /// Le message m est >= n (hors domaine plaintext Paillier)
    #[error("Le message doit être dans [0, n)")]
    MessageOutOfRange,
    #[error("Taille de clé {requested} bits insuffisante, minimum requis : {minimum} bits")]
    KeySizeTooSmall { requested: u64, minimum: u64 },
    #[error("Taille de clé {0} bits impaire : le module doit avoir un nombre pair de bits")]
    OddKeySize(u64),
    /// Séquence d'octets vide là où un entier est attendu
    #[error("Encodage vide : au moins un octet est requis")]
    EmptyEncoding,
    #[error("Parsing hexadécimal invalide")]
    HexParseError,
    /// Champ hex trop long : conversion BigUint coûteuse (vecteur DoS)
    #[error("Champ hexadécimal trop long : {actual} caractères (maximum autorisé : {maximum})")]
    HexFieldTooLong { actual: usize, maximum: usize },
    #[error("Clé publique invalide : {0}")]
    InvalidPublicKey(String),
    #[error("Entrée invalide : {0}")]
    InvalidInput(String),

    // --- Erreurs mathématiques internes ---
    /// L'inverse modulaire n'existe pas (gcd != 1)
    #[error("Impossible de calculer l'inverse modulaire (gcd != 1)")]
    NoModularInverse,
    #[error("ppcm indéfini : les deux opérandes sont nuls")]
    LcmOfZeros,
    #[error("Module nul : l'exponentiation modulaire exige un module >= 1")]
    ZeroModulus,
    /// Conversion BigInt -> BigUint échouée (résultat négatif, invariant interne)
    #[error("Conversion interne BigInt -> BigUint : résultat négatif inattendu")]
    NegativeConversion,

    // --- Aléa ---
    #[error("Source d'aléa cryptographique indisponible : {0}")]
    RandomSource(String),

    // --- Annulation ---
    #[error("Génération de clés annulée")]
    Cancelled,
    #[error("Tâche de génération en arrière-plan interrompue : {0}")]
    BackgroundTask(String),
}

impl CryptoError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CryptoError::MessageOutOfRange
            | CryptoError::KeySizeTooSmall { .. }
            | CryptoError::OddKeySize(_)
            | CryptoError::EmptyEncoding
            | CryptoError::HexParseError
            | CryptoError::HexFieldTooLong { .. }
            | CryptoError::InvalidPublicKey(_)
            | CryptoError::InvalidInput(_) => ErrorKind::Validation,
            CryptoError::NoModularInverse
            | CryptoError::LcmOfZeros
            | CryptoError::ZeroModulus
            | CryptoError::NegativeConversion => ErrorKind::Arithmetic,
            CryptoError::RandomSource(_) => ErrorKind::Entropy,
            CryptoError::Cancelled | CryptoError::BackgroundTask(_) => ErrorKind::Cancelled,
        }
    }

    /// Vrai pour les violations d'invariant arithmétique.
    pub fn is_precondition_violation(&self) -> bool {
        self.kind() == ErrorKind::Arithmetic
    }
}

impl From<rand_core::Error> for CryptoError {
    fn from(e: rand_core::Error) -> Self {
        CryptoError::RandomSource(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_are_distinct() {
        assert_eq!(CryptoError::OddKeySize(513).kind(), ErrorKind::Validation);
        assert_eq!(CryptoError::MessageOutOfRange.kind(), ErrorKind::Validation);
        assert_eq!(CryptoError::NoModularInverse.kind(), ErrorKind::Arithmetic);
        assert_eq!(CryptoError::LcmOfZeros.kind(), ErrorKind::Arithmetic);
        assert!(CryptoError::NoModularInverse.is_precondition_violation());
        assert!(!CryptoError::HexParseError.is_precondition_violation());
        assert_eq!(CryptoError::Cancelled.kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn test_display_carries_parameters() {
        let e = CryptoError::KeySizeTooSmall { requested: 256, minimum: 512 };
        let msg = e.to_string();
        assert!(msg.contains("256"));
        assert!(msg.contains("512"));
    }
}
