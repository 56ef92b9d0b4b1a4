use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use super::block::Block;
use super::wallet::WalletLedger;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error on {path}: {source}")]
    Serialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Persists the chain document and the wallet document as JSON files
///
/// Both documents are rewritten in full on every save.
#[derive(Debug, Clone)]
pub struct LedgerStorage {
    chain_path: PathBuf,
    wallet_path: PathBuf,
}

impl LedgerStorage {
    /// Creates a storage over the two document paths
    ///
    /// Parent directories are created on first save.
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(chain_path: P, wallet_path: Q) -> Self {
        Self {
            chain_path: chain_path.as_ref().to_path_buf(),
            wallet_path: wallet_path.as_ref().to_path_buf(),
        }
    }

    pub fn chain_path(&self) -> &Path {
        &self.chain_path
    }

    pub fn wallet_path(&self) -> &Path {
        &self.wallet_path
    }

    /// Saves every block, oldest first
    pub fn save_chain(&self, blocks: &[Block]) -> Result<(), StorageError> {
        write_document(&self.chain_path, &blocks)?;
        debug!("Saved {} blocks to {}", blocks.len(), self.chain_path.display());
        Ok(())
    }

    /// Loads the chain document, `None` if it does not exist yet
    pub fn load_chain(&self) -> Result<Option<Vec<Block>>, StorageError> {
        let blocks: Option<Vec<Block>> = read_document(&self.chain_path)?;

        if let Some(blocks) = &blocks {
            info!("Loaded {} blocks from {}", blocks.len(), self.chain_path.display());
        }

        Ok(blocks)
    }

    pub fn save_wallets(&self, wallets: &WalletLedger) -> Result<(), StorageError> {
        write_document(&self.wallet_path, wallets)?;
        debug!("Saved wallets to {}", self.wallet_path.display());
        Ok(())
    }

    /// Loads the wallet document, `None` if it does not exist yet
    pub fn load_wallets(&self) -> Result<Option<WalletLedger>, StorageError> {
        let wallets: Option<WalletLedger> = read_document(&self.wallet_path)?;

        Ok(wallets.map(|mut wallets| {
            wallets.normalize_keys();
            info!("Loaded wallets from {}", self.wallet_path.display());
            wallets
        }))
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
    move |source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Writes to a sibling temp file and renames it over the target
fn write_document<T: Serialize + ?Sized>(path: &Path, document: &T) -> Result<(), StorageError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_error(parent))?;
    }

    let mut tmp_name = path.as_os_str().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    let file = File::create(&tmp_path).map_err(io_error(&tmp_path))?;
    let mut writer = BufWriter::new(file);

    serde_json::to_writer_pretty(&mut writer, document).map_err(|source| {
        StorageError::Serialization {
            path: path.to_path_buf(),
            source,
        }
    })?;
    writer.flush().map_err(io_error(&tmp_path))?;
    writer.get_ref().sync_all().map_err(io_error(&tmp_path))?;

    fs::rename(&tmp_path, path).map_err(io_error(path))
}

fn read_document<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StorageError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(io_error(path)(err)),
    };

    serde_json::from_reader(BufReader::new(file))
        .map(Some)
        .map_err(|source| StorageError::Serialization {
            path: path.to_path_buf(),
            source,
        })
}
