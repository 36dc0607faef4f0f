use crate::errors::CompilationError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Naming strategy applied to the output program
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JsOutputOption {
    /// Shortest unique identifiers, literals interned
    #[default]
    Obfuscated,
    /// Readable derived names, literals left in place
    Pretty,
    /// Fully-qualified names, literals interned
    Detailed,
}

/// Identifiers the pretty namer must never produce (compared case-insensitively)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NameDenylist {
    #[serde(default)]
    pub exact: Vec<String>,
    #[serde(default)]
    pub suffixes: Vec<String>,
}

impl NameDenylist {
    pub fn is_denied(&self, name: &str) -> bool {
        let lower = name.to_ascii_lowercase();
        self.exact.iter().any(|e| e.to_ascii_lowercase() == lower)
            || self
                .suffixes
                .iter()
                .any(|s| lower.ends_with(&s.to_ascii_lowercase()))
    }

    /// Reject lists that leave the namer no numbered fallback: an empty
    /// suffix denies every name, and denying every trailing digit denies
    /// every `base_N`
    pub fn validate(&self) -> Result<(), String> {
        if self.suffixes.iter().any(String::is_empty) {
            return Err("prettyNameDenylist.suffixes must not contain an empty suffix".to_string());
        }
        if (0..10).all(|digit| self.is_denied(&digit.to_string())) {
            return Err("prettyNameDenylist.suffixes deny every trailing digit".to_string());
        }
        Ok(())
    }
}

/// Compiler options that control optimization, lowering and output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilerOptions {
    /// Enable inlining at both AST levels (default: true)
    #[serde(default = "default_true")]
    pub aggressively_optimize: bool,

    /// Keep assertions as runtime checks instead of stripping them (default: false)
    #[serde(default)]
    pub enable_assertions: bool,

    /// Naming strategy (default: OBFUSCATED)
    #[serde(default)]
    pub output: JsOutputOption,

    /// Stop after entry-point and rebind validation (default: false)
    #[serde(default)]
    pub validate_only: bool,

    /// Produce a source map for each permutation (default: false)
    #[serde(default)]
    pub source_map: bool,

    /// Produce a symbol map for each permutation (default: false)
    #[serde(default)]
    pub symbol_map: bool,

    /// Produce a size report grouped by class (default: false)
    #[serde(default)]
    pub compile_report: bool,

    /// Track parents and correlations on source infos (default: false)
    #[serde(default)]
    pub track_source_info: bool,

    /// Drop runtime checks from reference casts (default: false)
    #[serde(default)]
    pub cast_checking_disabled: bool,

    /// Safety bound on fixpoint iterations (default: 100)
    #[serde(default = "default_max_fixpoint_iterations")]
    pub max_fixpoint_iterations: usize,

    /// Denylist consulted by the pretty namer
    #[serde(default)]
    pub pretty_name_denylist: NameDenylist,
}

fn default_true() -> bool {
    true
}

fn default_max_fixpoint_iterations() -> usize {
    100
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            aggressively_optimize: true,
            enable_assertions: false,
            output: JsOutputOption::Obfuscated,
            validate_only: false,
            source_map: false,
            symbol_map: false,
            compile_report: false,
            track_source_info: false,
            cast_checking_disabled: false,
            max_fixpoint_iterations: default_max_fixpoint_iterations(),
            pretty_name_denylist: NameDenylist::default(),
        }
    }
}

impl CompilerOptions {
    /// Whether source infos need parent/correlation tracking
    pub fn needs_tracking(&self) -> bool {
        self.track_source_info || self.source_map || self.compile_report
    }
}

/// The module being compiled: its name and declared entry-point classes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleDef {
    #[serde(default = "default_module_name")]
    pub name: String,
    #[serde(default)]
    pub entry_points: Vec<String>,
}

fn default_module_name() -> String {
    "app".to_string()
}

impl Default for ModuleDef {
    fn default() -> Self {
        Self {
            name: default_module_name(),
            entry_points: Vec::new(),
        }
    }
}

impl ModuleDef {
    pub fn new(name: impl Into<String>, entry_points: Vec<String>) -> Self {
        Self {
            name: name.into(),
            entry_points,
        }
    }
}

/// One permutation: a fixed set of rebind answers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermutationDef {
    #[serde(default)]
    pub id: usize,
    /// requested type name -> answer type name
    #[serde(default)]
    pub rebinds: IndexMap<String, String>,
}

/// Main compiler configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilerConfig {
    #[serde(default)]
    pub compiler_options: CompilerOptions,

    #[serde(default)]
    pub module: ModuleDef,

    /// Empty means a single permutation with no rebinds
    #[serde(default)]
    pub permutations: Vec<PermutationDef>,
}

/// Command-line values that override a loaded configuration
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub aggressively_optimize: Option<bool>,
    pub enable_assertions: Option<bool>,
    pub output: Option<JsOutputOption>,
    pub validate_only: Option<bool>,
    pub source_map: Option<bool>,
    pub symbol_map: Option<bool>,
    pub compile_report: Option<bool>,
    pub entry_points: Option<Vec<String>>,
}

impl CompilerConfig {
    /// Load configuration from a YAML or JSON file, chosen by extension
    pub fn from_file(path: &Path) -> Result<Self, CompilationError> {
        let content = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json(&content)
        } else {
            Self::from_yaml(&content)
        }
    }

    pub fn from_json(content: &str) -> Result<Self, CompilationError> {
        let config: Self = serde_json::from_str(content).map_err(|e| CompilationError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self, CompilationError> {
        let config: Self = serde_yaml::from_str(content).map_err(|e| CompilationError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), CompilationError> {
        self.compiler_options
            .pretty_name_denylist
            .validate()
            .map_err(CompilationError::Config)
    }

    /// Permutations to compile; a single empty one when none are configured
    pub fn effective_permutations(&self) -> Vec<PermutationDef> {
        if self.permutations.is_empty() {
            return vec![PermutationDef::default()];
        }
        self.permutations
            .iter()
            .enumerate()
            .map(|(index, perm)| PermutationDef {
                id: index,
                rebinds: perm.rebinds.clone(),
            })
            .collect()
    }

    /// Merge command-line overrides into this configuration
    pub fn merge(&mut self, overrides: &CliOverrides) {
        let options = &mut self.compiler_options;
        if let Some(value) = overrides.aggressively_optimize {
            options.aggressively_optimize = value;
        }
        if let Some(value) = overrides.enable_assertions {
            options.enable_assertions = value;
        }
        if let Some(value) = overrides.output {
            options.output = value;
        }
        if let Some(value) = overrides.validate_only {
            options.validate_only = value;
        }
        if let Some(value) = overrides.source_map {
            options.source_map = value;
        }
        if let Some(value) = overrides.symbol_map {
            options.symbol_map = value;
        }
        if let Some(value) = overrides.compile_report {
            options.compile_report = value;
        }
        if let Some(entry_points) = &overrides.entry_points {
            self.module.entry_points = entry_points.clone();
        }
    }
}
