//! Secret store
//!
//! Missing credentials are generated once and written back to the config
//! file; every later run reads them back instead of rotating them.

use crate::envfile::EnvFile;
use crate::error::{CoreError, Result};
use base64::Engine;
use rand::RngCore;
use rand::rngs::OsRng;
use std::path::Path;

/// Bytes of entropy behind every generated secret
pub const SECRET_BYTES: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretEncoding {
    /// Lowercase hex, safe for database and service passwords
    Hex,
    /// URL-safe base64 without padding, used for signing keys
    Base64,
}

/// A secret the deployment needs, keyed by its config file name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecretSpec {
    pub key: &'static str,
    pub encoding: SecretEncoding,
}

pub const DB_PASSWORD: SecretSpec = SecretSpec {
    key: "DB_PASSWORD",
    encoding: SecretEncoding::Hex,
};

pub const STORAGE_SECRET_KEY: SecretSpec = SecretSpec {
    key: "STORAGE_SECRET_KEY",
    encoding: SecretEncoding::Hex,
};

pub const APP_SECRET_KEY: SecretSpec = SecretSpec {
    key: "APP_SECRET_KEY",
    encoding: SecretEncoding::Base64,
};

pub const ALL_SECRETS: [SecretSpec; 3] = [DB_PASSWORD, STORAGE_SECRET_KEY, APP_SECRET_KEY];

/// Return `existing` unchanged when it is non-empty, otherwise generate a
/// fresh value.
pub fn resolve_secret(spec: SecretSpec, existing: Option<&str>) -> Result<String> {
    match existing {
        Some(value) if !value.is_empty() => Ok(value.to_string()),
        _ => generate(spec),
    }
}

pub fn generate(spec: SecretSpec) -> Result<String> {
    let mut bytes = [0u8; SECRET_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| CoreError::Secret {
            name: spec.key.to_string(),
            message: e.to_string(),
        })?;

    let encoded: String = match spec.encoding {
        SecretEncoding::Hex => hex::encode(bytes),
        SecretEncoding::Base64 => base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes),
    };
    tracing::debug!(secret = spec.key, "Generated new secret");
    Ok(encoded)
}

/// Upsert `values` into the config file at `path`, creating it if needed.
///
/// Unrelated lines are preserved and the write is atomic.
pub fn persist(path: &Path, values: &[(&str, &str)]) -> Result<()> {
    if values.is_empty() {
        return Ok(());
    }
    let mut file = EnvFile::load(path)?.unwrap_or_default();
    for (key, value) in values {
        file.set(key, value);
    }
    file.save(path)?;
    tracing::info!(count = values.len(), "Persisted generated secrets to {}", path.display());
    Ok(())
}
