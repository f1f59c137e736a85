//! Declarative search-term configuration.
//!
//! Terms arrive as attribute sets, typically from YAML documents. Every
//! recognized attribute maps to one criterion of the resulting search
//! term; unrecognized attributes are ignored. A malformed spec rejects
//! that one term only, never the batch.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};

/// One declarative search-term specification.
///
/// All fields are optional, but at least one criterion field must be
/// present for the spec to build into a term. Size fields accept decimal
/// byte counts with an optional `K`/`M`/`G` suffix; hex fields accept an
/// optional `0x` prefix.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TermSpec {
    /// Optional label carried into every match report for this term.
    pub name: Option<String>,

    /// Exact key short name (case-insensitive).
    pub key: Option<String>,
    /// Key short-name regex (case-insensitive, whole-name).
    pub key_regex: Option<String>,

    /// Exact key full path (case-insensitive).
    pub path: Option<String>,
    /// Key full-path regex.
    pub path_regex: Option<String>,

    /// Exact value name (case-insensitive).
    pub value: Option<String>,
    /// Value-name regex.
    pub value_regex: Option<String>,

    /// Registry type name, e.g. `REG_SZ` or `REG_DWORD`.
    pub value_type: Option<String>,

    /// Exact data content as a text literal.
    pub data: Option<String>,
    /// Exact data content as hex.
    pub data_hex: Option<String>,
    /// Data-content regex.
    pub data_regex: Option<String>,

    /// Data substring as a text literal.
    pub data_contains: Option<String>,
    /// Data substring as hex.
    pub data_contains_hex: Option<String>,

    pub data_size: Option<String>,
    pub data_size_less_than: Option<String>,
    pub data_size_more_than: Option<String>,
    pub data_size_at_most: Option<String>,
    pub data_size_at_least: Option<String>,
}

/// A named group of term specifications. Every term built from a template
/// carries the template name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TermTemplate {
    pub name: String,
    pub terms: Vec<TermSpec>,
}

/// Parse a list of term specifications from a YAML document.
pub fn specs_from_yaml(yaml: &str) -> Result<Vec<TermSpec>> {
    serde_yaml::from_str(yaml).context("Failed to parse search term YAML")
}

/// Load a list of term specifications from a YAML file.
pub fn specs_from_yaml_file(path: &Path) -> Result<Vec<TermSpec>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read term config file: {}", path.display()))?;
    let specs = specs_from_yaml(&content)?;
    debug!("Loaded {} term specs from {}", specs.len(), path.display());
    Ok(specs)
}

/// Parse a term template from a YAML document.
pub fn template_from_yaml(yaml: &str) -> Result<TermTemplate> {
    serde_yaml::from_str(yaml).context("Failed to parse term template YAML")
}

/// Load a term template from a YAML file.
pub fn template_from_yaml_file(path: &Path) -> Result<TermTemplate> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read template file: {}", path.display()))?;
    let template = template_from_yaml(&content)?;
    debug!(
        "Loaded template '{}' with {} term specs from {}",
        template.name,
        template.terms.len(),
        path.display()
    );
    Ok(template)
}
