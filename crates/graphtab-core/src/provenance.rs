use sha2::{Digest, Sha256};

/// Lower-case hex SHA-256 of the document bytes.
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProvenanceWarning {
    #[error("sheet carries no source hash; cannot tell which document it was exported from")]
    MissingHash,

    #[error("document changed since export (sheet hash {stored}, document hash {current})")]
    Mismatch { stored: String, current: String },
}

/// Compare the current document hash against the one stored at export.
///
/// Never fatal: a document may legitimately change between export and import.
pub fn check_provenance(current: &str, stored: Option<&str>) -> Option<ProvenanceWarning> {
    let warning = match stored.map(str::trim) {
        None | Some("") => ProvenanceWarning::MissingHash,
        Some(stored) if stored.eq_ignore_ascii_case(current) => return None,
        Some(stored) => ProvenanceWarning::Mismatch {
            stored: stored.to_string(),
            current: current.to_string(),
        },
    };
    tracing::warn!("{warning}");
    Some(warning)
}
