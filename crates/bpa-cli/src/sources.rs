//! Host-side rule locations: files on disk, rule URLs and the preferences
//! document that controls the built-in rules.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bpa_rules::{
    BuiltInRulesConfig, BuiltInSource, LoadOptions, ModelRuleConfig, PrecedenceOrder,
    RuleSourceError, RuleSourceKind, RuleSourceProvider, RuleStore, UnavailableSource,
};
use tracing::debug;

pub const USER_RULES_ENV: &str = "BPA_USER_RULES";
pub const MACHINE_RULES_ENV: &str = "BPA_MACHINE_RULES";
pub const PREFERENCES_ENV: &str = "BPA_PREFERENCES";

const HOST_FOLDER: &str = "TabularEditor3";
const RULES_FILE: &str = "BPARules.json";
const PREFERENCES_FILE: &str = "Preferences.json";

/// A rule document read from the local filesystem.
#[derive(Debug, Clone)]
pub struct FileSource {
    kind: RuleSourceKind,
    path: PathBuf,
}

impl FileSource {
    pub fn new(kind: RuleSourceKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RuleSourceProvider for FileSource {
    fn kind(&self) -> RuleSourceKind {
        self.kind
    }

    fn id(&self) -> String {
        self.path.display().to_string()
    }

    fn fetch(&self) -> Result<Vec<u8>, RuleSourceError> {
        fs::read(&self.path).map_err(|err| RuleSourceError::io(&self.path, err))
    }
}

/// Provider for a rule URL.
///
/// `file://` URLs and plain paths are read from disk; relative paths are
/// resolved against `base` when given. Other schemes are not fetched and
/// report a load failure.
pub fn url_source(url: &str, base: Option<&Path>) -> Box<dyn RuleSourceProvider> {
    let path = if let Some(rest) = url.strip_prefix("file://") {
        PathBuf::from(rest)
    } else if url.contains("://") {
        return Box::new(UnavailableSource::new(
            RuleSourceKind::Url,
            url,
            "remote rule URLs are not fetched by this host",
        ));
    } else {
        PathBuf::from(url)
    };
    let path = match base {
        Some(base) if path.is_relative() => base.join(path),
        _ => path,
    };
    Box::new(FileSource::new(RuleSourceKind::Url, path))
}

/// Where the local rule files and preferences live.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleLocations {
    pub user: Option<PathBuf>,
    pub machine: Option<PathBuf>,
    pub preferences: Option<PathBuf>,
}

impl RuleLocations {
    pub fn from_env() -> Self {
        Self::resolve(|key| std::env::var_os(key))
    }

    /// Resolve locations through `lookup`.
    ///
    /// An explicit `BPA_*` variable always wins, even when its file is
    /// missing. The host folders under `LOCALAPPDATA` and `PROGRAMDATA` are
    /// only used when the file exists.
    pub fn resolve(lookup: impl Fn(&str) -> Option<OsString>) -> Self {
        let host_file = |root: &str, file: &str| {
            lookup(root)
                .map(|dir| PathBuf::from(dir).join(HOST_FOLDER).join(file))
                .filter(|path| path.is_file())
        };
        Self {
            user: lookup(USER_RULES_ENV)
                .map(PathBuf::from)
                .or_else(|| host_file("LOCALAPPDATA", RULES_FILE)),
            machine: lookup(MACHINE_RULES_ENV)
                .map(PathBuf::from)
                .or_else(|| host_file("PROGRAMDATA", RULES_FILE)),
            preferences: lookup(PREFERENCES_ENV)
                .map(PathBuf::from)
                .or_else(|| host_file("LOCALAPPDATA", PREFERENCES_FILE)),
        }
    }
}

/// Everything needed to assemble the rule store for one model.
#[derive(Debug, Clone)]
pub struct SourcePlan {
    pub locations: RuleLocations,
    pub urls: Vec<String>,
    pub include_builtin: bool,
    pub precedence: PrecedenceOrder,
}

impl Default for SourcePlan {
    fn default() -> Self {
        Self {
            locations: RuleLocations::default(),
            urls: Vec::new(),
            include_builtin: true,
            precedence: PrecedenceOrder::default(),
        }
    }
}

impl SourcePlan {
    /// Built-in rule settings from the preferences file, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if a preferences file is configured but cannot be
    /// read or parsed.
    pub fn load_options(&self) -> Result<LoadOptions> {
        let builtin = if !self.include_builtin {
            BuiltInRulesConfig::disabled()
        } else if let Some(path) = &self.locations.preferences {
            let bytes = fs::read(path)
                .with_context(|| format!("read preferences {}", path.display()))?;
            BuiltInRulesConfig::from_preferences(&bytes)
                .with_context(|| format!("parse preferences {}", path.display()))?
        } else {
            BuiltInRulesConfig::default()
        };
        Ok(LoadOptions::default()
            .with_precedence(self.precedence)
            .with_builtin(builtin))
    }

    /// Assemble the store: built-in rules, rule URLs (command line first,
    /// then the model's external rule files), the model's embedded rules and
    /// the local files.
    ///
    /// Relative paths in the model's external rule files resolve against
    /// `model_dir`.
    ///
    /// # Errors
    ///
    /// Fails only when the preferences file is unusable.
    pub fn store(&self, model: &ModelRuleConfig, model_dir: Option<&Path>) -> Result<RuleStore> {
        let mut store = RuleStore::new(self.load_options()?).with_source(BuiltInSource);
        for url in &self.urls {
            store.add_source(url_source(url, None));
        }
        for url in &model.external_rule_files {
            store.add_source(url_source(url, model_dir));
        }
        if let Some(embedded) = model.embedded_source() {
            store.add_source(Box::new(embedded));
        }
        if let Some(path) = &self.locations.user {
            store.add_source(Box::new(FileSource::new(RuleSourceKind::UserFile, path)));
        }
        if let Some(path) = &self.locations.machine {
            store.add_source(Box::new(FileSource::new(RuleSourceKind::MachineFile, path)));
        }
        debug!(
            urls = self.urls.len() + model.external_rule_files.len(),
            embedded = model.embedded_rules.is_some(),
            user = ?self.locations.user,
            machine = ?self.locations.machine,
            "rule sources assembled"
        );
        Ok(store)
    }
}
