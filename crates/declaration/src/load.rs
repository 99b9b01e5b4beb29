//! Reading declarations from files or stdin

use crate::error::{Error, Result};
use crate::types::{ApplicationDeclaration, ClusterDeclaration};
use serde::de::DeserializeOwned;
use std::io::Read;
use std::path::Path;

/// Source name meaning "read from stdin"
pub const STDIN: &str = "-";

/// Serialization format of a declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Toml,
    Json,
}

impl Format {
    /// Format implied by a file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(Self::Toml),
            Some("json") => Ok(Self::Json),
            other => Err(Error::UnsupportedFormat(
                other.map_or_else(|| path.display().to_string(), |ext| format!(".{ext}")),
            )),
        }
    }

    /// Guess the format of content without a file name
    pub fn sniff(content: &str) -> Self {
        if content.trim_start().starts_with('{') {
            Self::Json
        } else {
            Self::Toml
        }
    }
}

/// Deserialize a declaration of any type from text
pub fn parse<T: DeserializeOwned>(content: &str, format: Format) -> Result<T> {
    match format {
        Format::Toml => Ok(toml::from_str(content)?),
        Format::Json => Ok(serde_json::from_str(content)?),
    }
}

/// Read and validate a cluster declaration from a path, or stdin for `-`
pub fn load_cluster(source: &str) -> Result<ClusterDeclaration> {
    let declaration: ClusterDeclaration = read_source(source)?;
    declaration.validate()?;
    log::debug!(
        "Loaded cluster declaration {}/{}",
        declaration.metadata.name,
        declaration.metadata.environment
    );
    Ok(declaration)
}

/// Read and validate an application declaration from a path, or stdin for `-`
pub fn load_application(source: &str) -> Result<ApplicationDeclaration> {
    let declaration: ApplicationDeclaration = read_source(source)?;
    declaration.validate()?;
    log::debug!("Loaded application declaration {}", declaration.metadata.name);
    Ok(declaration)
}

/// Deserialize from any reader, sniffing the format
pub fn from_reader<T: DeserializeOwned>(mut reader: impl Read) -> Result<T> {
    let mut content = String::new();
    reader.read_to_string(&mut content).map_err(Error::Stdin)?;
    parse(&content, Format::sniff(&content))
}

fn read_source<T: DeserializeOwned>(source: &str) -> Result<T> {
    if source == STDIN {
        return from_reader(std::io::stdin().lock());
    }

    let path = Path::new(source);
    let format = Format::from_path(path)?;
    let content = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&content, format)
}
