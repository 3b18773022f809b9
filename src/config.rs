use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use hpc_quota::{ClusterConfig, Error, FileSystem, Result};
use regex::Regex;
use serde::Deserialize;

pub const CONFIG_NAME: &str = "dusage.toml";

/// One `[cluster]` table, as written in the config file.
#[derive(Deserialize, Debug, Default)]
pub struct Cluster {
    #[serde(default)]
    pub file_system:           Option<String>,
    #[serde(default)]
    pub file_system_prefix:    Option<String>,
    #[serde(default)]
    pub home_prefix:           Option<String>,
    #[serde(default)]
    pub scratch_prefix:        Option<String>,
    #[serde(default)]
    pub project_path_prefixes: Option<OneOrMany>,
    #[serde(default)]
    pub path_based:            Option<YesNo>,
    #[serde(default)]
    pub ignore_groups:         Option<String>,
}

// "/a, /b" or ["/a", "/b"].
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn to_vec(&self) -> Vec<String> {
        let v: Vec<String> = match self {
            OneOrMany::One(s) => s.split(',').map(|p| p.trim().to_string()).collect(),
            OneOrMany::Many(v) => v.iter().map(|p| p.trim().to_string()).collect(),
        };
        v.into_iter().filter(|p| !p.is_empty()).collect()
    }
}

// "yes" / anything else, or a real boolean.
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum YesNo {
    Bool(bool),
    Word(String),
}

impl YesNo {
    fn is_yes(&self) -> bool {
        match self {
            YesNo::Bool(b) => *b,
            YesNo::Word(w) => w.trim() == "yes",
        }
    }
}

// Read the TOML config into a map of cluster name to settings.
pub fn read(toml_file: impl AsRef<Path>) -> Result<BTreeMap<String, Cluster>> {
    let toml_file = toml_file.as_ref();
    if !toml_file.exists() {
        return Err(Error::Config(format!(
            "could not find configuration file {}",
            toml_file.display()
        )));
    }
    let buffer = fs::read_to_string(toml_file)
        .map_err(|e| Error::Config(format!("{}: {}", toml_file.display(), e)))?;
    toml::from_str(&buffer).map_err(|e| Error::Config(format!("{}: {}", toml_file.display(), e)))
}

/// Load and check the settings for one cluster.
pub fn load(toml_file: impl AsRef<Path>, cluster: &str) -> Result<ClusterConfig> {
    let toml_file = toml_file.as_ref();
    let mut clusters = read(toml_file)?;
    let section = clusters.remove(cluster).ok_or_else(|| {
        Error::Config(format!(
            "cluster '{}' not correctly defined in {}",
            cluster,
            toml_file.display()
        ))
    })?;
    debug!("config: using cluster {} from {}", cluster, toml_file.display());
    check(section)
}

fn required(value: Option<String>, option: &str) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(Error::Config(format!("option {} is not set correctly", option))),
    }
}

// Turn a raw section into a ClusterConfig. Every option except
// ignore_groups must be present and non-empty.
pub fn check(section: Cluster) -> Result<ClusterConfig> {
    let file_system = required(section.file_system, "file_system")?.parse::<FileSystem>()?;
    let mut config = ClusterConfig::new(
        file_system,
        required(section.file_system_prefix, "file_system_prefix")?,
        required(section.home_prefix, "home_prefix")?,
        required(section.scratch_prefix, "scratch_prefix")?,
    );

    config.project_path_prefixes = section
        .project_path_prefixes
        .map(|p| p.to_vec())
        .unwrap_or_default();
    if config.project_path_prefixes.is_empty() {
        return Err(Error::Config("option project_path_prefixes is not set correctly".to_string()));
    }

    config.path_based = match section.path_based {
        Some(p) => p.is_yes(),
        None => return Err(Error::Config("option path_based is not set correctly".to_string())),
    };

    if let Some(pat) = section.ignore_groups.filter(|p| !p.trim().is_empty()) {
        let re = Regex::new(&pat)
            .map_err(|e| Error::Config(format!("option ignore_groups: {}", e)))?;
        config.ignore_groups = Some(re);
    }
    Ok(config)
}

/// The config file to use: the one given, `$DUSAGE_CONFIG`, or
/// `dusage.toml` next to the executable.
pub fn locate(given: Option<&Path>) -> PathBuf {
    if let Some(p) = given {
        return p.to_path_buf();
    }
    if let Some(p) = env::var_os("DUSAGE_CONFIG") {
        return PathBuf::from(p);
    }
    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(CONFIG_NAME)))
        .unwrap_or_else(|| PathBuf::from(CONFIG_NAME))
}
