//! Beamline registry and scan-database connection settings.
//!
//! The registry maps a beamline key (`CHX`, `SMI`, `SRX`) to the Tiled catalog
//! holding its scans and to the default columns/units used for plotting. A copy
//! of `config/beamlines.json` is compiled into the binary; `--config <path>` or
//! `BEAMLINEX_CONFIG` replaces it at runtime.
//!
//! Server settings come from the environment (a `.env` file is honored):
//!
//! - `TILED_URL`: base URL of the Tiled server
//! - `TILED_API_KEY`: optional API key

use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::Beamline;
use crate::error::AppError;

const BUILTIN_REGISTRY: &str = include_str!("../../config/beamlines.json");

pub const CONFIG_ENV: &str = "BEAMLINEX_CONFIG";
pub const URL_ENV: &str = "TILED_URL";
pub const API_KEY_ENV: &str = "TILED_API_KEY";

/// Default axis columns and units of a beamline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultLabels {
    pub x_label: String,
    pub y_label: String,
    pub x_units: String,
    pub y_units: String,
}

/// Per-beamline settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeamlineConfig {
    /// Catalog path on the Tiled server (e.g. `smi/raw`).
    pub catalog: String,
    /// Column holding the storage-ring current.
    #[serde(default = "default_ring_current")]
    pub ring_current: String,
    pub default_labels: DefaultLabels,
}

fn default_ring_current() -> String {
    "ring_current".to_string()
}

/// All configured beamlines.
#[derive(Debug, Clone)]
pub struct Registry {
    beamlines: BTreeMap<String, BeamlineConfig>,
    source: Option<PathBuf>,
}

impl Registry {
    /// Load from an explicit path, else `$BEAMLINEX_CONFIG`, else the built-in copy.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let from_env = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        match path.map(Path::to_path_buf).or(from_env) {
            Some(p) => Self::from_file(&p),
            None => Self::builtin(),
        }
    }

    pub fn builtin() -> Result<Self, AppError> {
        Self::from_json(BUILTIN_REGISTRY, None)
    }

    pub fn from_file(path: &Path) -> Result<Self, AppError> {
        let file = File::open(path).map_err(|e| {
            AppError::usage(format!("{}: JSON config file not found ({e}).", path.display()))
        })?;
        let beamlines: BTreeMap<String, BeamlineConfig> = serde_json::from_reader(file)
            .map_err(|e| AppError::usage(format!("Invalid config '{}': {e}", path.display())))?;
        log::debug!("loaded beamline registry from {}", path.display());
        Ok(Self::normalized(beamlines, Some(path.to_path_buf())))
    }

    pub fn from_json(json: &str, source: Option<PathBuf>) -> Result<Self, AppError> {
        let beamlines: BTreeMap<String, BeamlineConfig> = serde_json::from_str(json)
            .map_err(|e| AppError::usage(format!("Invalid beamline config: {e}")))?;
        Ok(Self::normalized(beamlines, source))
    }

    fn normalized(beamlines: BTreeMap<String, BeamlineConfig>, source: Option<PathBuf>) -> Self {
        let beamlines = beamlines
            .into_iter()
            .map(|(k, v)| (k.to_ascii_uppercase(), v))
            .collect();
        Self { beamlines, source }
    }

    pub fn get(&self, beamline: Beamline) -> Result<&BeamlineConfig, AppError> {
        self.beamlines.get(beamline.key()).ok_or_else(|| {
            AppError::usage(format!(
                "Beamline \"{beamline}\" is not configured{}. Allowed beamlines: {}",
                self.source
                    .as_ref()
                    .map(|p| format!(" in {}", p.display()))
                    .unwrap_or_default(),
                self.keys().join(", ")
            ))
        })
    }

    pub fn keys(&self) -> Vec<&str> {
        self.beamlines.keys().map(String::as_str).collect()
    }
}

/// Connection settings for the Tiled server.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerSettings {
    pub url: String,
    pub api_key: Option<String>,
}

impl ServerSettings {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        let url = std::env::var(URL_ENV).map_err(|_| {
            AppError::usage(format!(
                "Missing {URL_ENV} in environment (.env); or read scans offline with --source-dir."
            ))
        })?;
        let api_key = std::env::var(API_KEY_ENV).ok().filter(|k| !k.trim().is_empty());
        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

/// Axis settings after merging CLI overrides into the beamline defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisLabels {
    pub x_label: String,
    pub y_label: String,
    pub x_units: String,
    pub y_units: String,
}

impl AxisLabels {
    pub fn resolve(
        defaults: &DefaultLabels,
        x_label: Option<&str>,
        y_label: Option<&str>,
        x_units: Option<&str>,
        y_units: Option<&str>,
    ) -> Self {
        Self {
            x_label: x_label.unwrap_or(&defaults.x_label).to_string(),
            y_label: y_label.unwrap_or(&defaults.y_label).to_string(),
            x_units: x_units.unwrap_or(&defaults.x_units).to_string(),
            y_units: y_units.unwrap_or(&defaults.y_units).to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_has_all_beamlines() {
        let reg = Registry::builtin().unwrap();
        for bl in Beamline::ALL {
            let cfg = reg.get(bl).unwrap();
            assert!(!cfg.catalog.is_empty());
            assert_eq!(cfg.ring_current, "ring_current");
        }
        assert_eq!(reg.get(Beamline::Smi).unwrap().default_labels.y_label, "VFMcamroi1");
    }

    #[test]
    fn keys_are_case_insensitive_and_missing_beamline_lists_allowed() {
        let json = r#"{"chx": {"catalog": "chx/raw", "default_labels":
            {"x_label": "dcm_b", "y_label": "i", "x_units": "deg", "y_units": "a.u."}}}"#;
        let reg = Registry::from_json(json, None).unwrap();
        assert!(reg.get(Beamline::Chx).is_ok());
        let err = reg.get(Beamline::Smi).unwrap_err();
        assert!(err.message().contains("Allowed beamlines: CHX"), "{}", err.message());
    }

    #[test]
    fn cli_values_override_defaults() {
        let reg = Registry::builtin().unwrap();
        let d = &reg.get(Beamline::Chx).unwrap().default_labels;
        let labels = AxisLabels::resolve(d, Some("ivu_gap"), None, Some("mm"), None);
        assert_eq!(labels.x_label, "ivu_gap");
        assert_eq!(labels.x_units, "mm");
        assert_eq!(labels.y_label, d.y_label);
    }
}
