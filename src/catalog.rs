//! Asset catalog: the validated, ordered list of assets to give away

use crate::types::{AssetError, AssetSpec};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

/// Capability interface the orchestrator consumes
pub trait AssetCatalog: Send + Sync {
    /// Validated asset list, in distribution order
    fn assets(&self) -> &[AssetSpec];
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse catalog file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid asset at row {row}: {source}")]
    InvalidAsset {
        row: usize,
        #[source]
        source: AssetError,
    },

    #[error("duplicate asset {code}:{issuer} at row {row}")]
    Duplicate {
        row: usize,
        code: String,
        issuer: String,
    },
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    asset: Vec<RawAsset>,
}

#[derive(Debug, Deserialize)]
struct RawAsset {
    code: String,
    issuer: Option<String>,
    amount: String,
}

/// Catalog loaded from a TOML file of `[[asset]]` tables.
///
/// Every row passes [`AssetSpec::new`] validation here, once; file order is
/// preserved as distribution order.
#[derive(Debug)]
pub struct FileCatalog {
    assets: Vec<AssetSpec>,
}

impl FileCatalog {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = toml::from_str(content)?;

        let mut assets = Vec::with_capacity(file.asset.len());
        let mut seen = HashSet::new();
        for (idx, raw) in file.asset.iter().enumerate() {
            let row = idx + 1;
            let spec = AssetSpec::new(&raw.code, raw.issuer.as_deref(), &raw.amount)
                .map_err(|source| CatalogError::InvalidAsset { row, source })?;
            let key = (
                spec.code().to_string(),
                spec.issuer().unwrap_or("native").to_string(),
            );
            if !seen.insert(key.clone()) {
                return Err(CatalogError::Duplicate {
                    row,
                    code: key.0,
                    issuer: key.1,
                });
            }
            assets.push(spec);
        }

        Ok(Self { assets })
    }

    /// Put the primary asset at the front of the distribution order,
    /// dropping any duplicate listing of it from the file.
    pub fn with_primary(mut self, primary: AssetSpec) -> Self {
        self.assets
            .retain(|a| (a.code(), a.issuer()) != (primary.code(), primary.issuer()));
        self.assets.insert(0, primary);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }
}

impl AssetCatalog for FileCatalog {
    fn assets(&self) -> &[AssetSpec] {
        &self.assets
    }
}
