//! Model store.
//!
//! A persisted instance is one gzip stream holding four bincode values in a
//! fixed order: feature header, location registry, trained models, family
//! id. There is no schema tag; reader and writer share the layout below.
//!
//! Saves go to a uniquely named temporary file next to the target and are
//! renamed into place, so a previous save is either fully replaced or left
//! untouched.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tempfile::NamedTempFile;

use crate::calibration::{FeatureHeader, LocationRegistry};
use crate::config::StoreConfig;
use crate::engine::AiInstance;
use crate::error::{log_store_error, StoreError};
use crate::models::{ClassifierFamily, TrainedModel};

/// Write an instance to `path`
///
/// # Errors
/// * `Io` - the temporary file could not be created, written or renamed
/// * `Serialize` - a component failed to encode
pub fn save(instance: &AiInstance, path: impl AsRef<Path>) -> Result<(), StoreError> {
    let path = path.as_ref();
    let result = write_atomically(instance, path);
    match &result {
        Ok(()) => log::info!(
            "[Store] Saved '{}' ({} models) to {}",
            instance.family,
            instance.models.len(),
            path.display()
        ),
        Err(err) => log_store_error(err, "store::save"),
    }
    result
}

/// Read an instance back from `path`
///
/// # Errors
/// * `NotFound` - nothing persisted at `path`
/// * `Corrupt` - truncated stream, bad checksum or undecodable component
/// * `Io` - any other filesystem failure
pub fn load(path: impl AsRef<Path>) -> Result<AiInstance, StoreError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|err| StoreError::from_io(path, err))?;
    let instance = read_from(BufReader::new(file), path)?;
    log::info!(
        "[Store] Loaded '{}' ({} models) from {}",
        instance.family,
        instance.models.len(),
        path.display()
    );
    Ok(instance)
}

/// Encode an instance into any writer
pub fn write_instance<W: Write>(instance: &AiInstance, writer: W) -> Result<(), StoreError> {
    let ser_err = |err: bincode::Error| StoreError::Serialize {
        reason: err.to_string(),
    };

    let mut encoder = GzEncoder::new(writer, Compression::default());
    bincode::serialize_into(&mut encoder, &instance.header).map_err(ser_err)?;
    bincode::serialize_into(&mut encoder, &instance.registry).map_err(ser_err)?;
    bincode::serialize_into(&mut encoder, &instance.models).map_err(ser_err)?;
    bincode::serialize_into(&mut encoder, &instance.family).map_err(ser_err)?;
    let mut inner = encoder.finish().map_err(|err| StoreError::Serialize {
        reason: err.to_string(),
    })?;
    inner.flush().map_err(|err| StoreError::Serialize {
        reason: err.to_string(),
    })
}

/// Decode an instance from any reader
///
/// `source` only labels errors.
pub fn read_from<R: Read>(reader: R, source: &Path) -> Result<AiInstance, StoreError> {
    let corrupt = |reason: String| StoreError::Corrupt {
        path: source.display().to_string(),
        reason,
    };

    let mut decoder = GzDecoder::new(reader);
    let header: FeatureHeader =
        bincode::deserialize_from(&mut decoder).map_err(|err| corrupt(format!("header: {}", err)))?;
    let registry: LocationRegistry =
        bincode::deserialize_from(&mut decoder).map_err(|err| corrupt(format!("registry: {}", err)))?;
    let models: BTreeMap<ClassifierFamily, TrainedModel> =
        bincode::deserialize_from(&mut decoder).map_err(|err| corrupt(format!("models: {}", err)))?;
    let family: String =
        bincode::deserialize_from(&mut decoder).map_err(|err| corrupt(format!("family: {}", err)))?;

    // The gzip trailer is only checked once the stream is read to its end
    let mut trailing = Vec::new();
    decoder
        .read_to_end(&mut trailing)
        .map_err(|err| corrupt(format!("stream: {}", err)))?;
    if !trailing.is_empty() {
        return Err(corrupt(format!("{} unexpected trailing bytes", trailing.len())));
    }

    Ok(AiInstance::new(family, header, registry, models))
}

/// Encode into a fresh temp file beside `path`, then rename it into place
///
/// Every call gets its own temp file, so concurrent saves of one family
/// never interleave; the last rename wins. The temp file is removed when
/// any step fails.
fn write_atomically(instance: &AiInstance, path: &Path) -> Result<(), StoreError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir).map_err(|err| StoreError::from_io(dir, err))?;
    write_instance(instance, BufWriter::new(tmp.as_file_mut()))?;
    tmp.as_file()
        .sync_all()
        .map_err(|err| StoreError::from_io(tmp.path(), err))?;
    tmp.persist(path)
        .map_err(|err| StoreError::from_io(path, err.error))?;
    Ok(())
}

/// Per-family file layout inside the data folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelStore {
    data_folder: PathBuf,
    extension: String,
}

impl ModelStore {
    pub fn new(data_folder: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            data_folder: data_folder.into(),
            extension: extension.into(),
        }
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(config.data_folder.clone(), config.extension.clone())
    }

    pub fn data_folder(&self) -> &Path {
        &self.data_folder
    }

    /// File for a family id
    ///
    /// The id is hex encoded so any string maps to a safe, unique file name.
    pub fn path_for(&self, family: &str) -> PathBuf {
        let encoded: String = family.bytes().map(|b| format!("{:02x}", b)).collect();
        self.data_folder.join(format!("{}.{}", encoded, self.extension))
    }

    pub fn save(&self, instance: &AiInstance) -> Result<PathBuf, StoreError> {
        fs::create_dir_all(&self.data_folder)
            .map_err(|err| StoreError::from_io(&self.data_folder, err))
            .inspect_err(|err| log_store_error(err, "ModelStore::save"))?;
        let path = self.path_for(&instance.family);
        save(instance, &path)?;
        Ok(path)
    }

    pub fn load(&self, family: &str) -> Result<AiInstance, StoreError> {
        load(self.path_for(family))
    }
}
