//! Merge configuration: defaults, settings files, and resolution
//!
//! Settings come from an optional JSON file with CLI flags laid over it.
//! [`MergeSettings::resolve`] fills the gaps from a [`Defaults`] value and
//! validates everything once, producing the immutable [`MergeConfig`] every
//! pipeline stage reads.

use crate::error::{Error, Result};
use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Input directory used when none is given
pub const DEFAULT_INPUT_DIR: &str = "SS";
/// Output path used when none is given
pub const DEFAULT_OUTPUT: &str = "merged.csv";
/// Filename pattern used when none is given
pub const DEFAULT_PATTERN: &str = "*.csv";
/// Field delimiter used when none is given
pub const DEFAULT_DELIMITER: &str = ",";
/// Text encoding used when none is given
pub const DEFAULT_ENCODING: &str = "utf-8";

/// How differing column sets across files are reconciled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMode {
    /// Every column seen in any file
    #[default]
    Union,
    /// Only columns present in all files
    Intersection,
    /// All files must have the first file's columns
    Strict,
}

impl MergeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeMode::Union => "union",
            MergeMode::Intersection => "intersection",
            MergeMode::Strict => "strict",
        }
    }
}

impl FromStr for MergeMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "union" => Ok(MergeMode::Union),
            "intersection" => Ok(MergeMode::Intersection),
            "strict" => Ok(MergeMode::Strict),
            _ => Err(Error::InvalidMode(s.to_string())),
        }
    }
}

impl fmt::Display for MergeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved text encoding for reading inputs and writing the output
#[derive(Debug, Clone)]
pub struct TextEncoding {
    label: String,
    encoding: &'static Encoding,
    write_bom: bool,
}

impl TextEncoding {
    /// Resolve an encoding label such as `utf-8`, `utf-8-sig` or `cp1252`
    pub fn from_label(label: &str) -> Result<Self> {
        let normalized = label.trim().to_ascii_lowercase().replace('_', "-");

        let (encoding, write_bom) = match normalized.as_str() {
            "utf-8-sig" | "utf8-sig" => (encoding_rs::UTF_8, true),
            other => {
                let encoding = Encoding::for_label(other.as_bytes())
                    .ok_or_else(|| Error::UnknownEncoding(label.to_string()))?;
                (encoding, false)
            }
        };

        // UTF-16 and the replacement encoding cannot be produced by the encoder
        if encoding.output_encoding() != encoding {
            return Err(Error::UnknownEncoding(label.to_string()));
        }

        Ok(Self {
            label: label.trim().to_string(),
            encoding,
            write_bom,
        })
    }

    /// The label this encoding was resolved from
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Canonical encoding name
    pub fn name(&self) -> &'static str {
        self.encoding.name()
    }

    /// Whether output starts with a byte order mark
    pub fn writes_bom(&self) -> bool {
        self.write_bom
    }

    /// Decode file bytes, stripping a leading BOM; `None` on malformed input
    pub fn decode(&self, bytes: &[u8]) -> Option<String> {
        let (text, had_errors) = self.encoding.decode_with_bom_removal(bytes);
        if had_errors {
            None
        } else {
            Some(text.into_owned())
        }
    }

    /// Encode text for output; `None` if a character cannot be represented
    pub fn encode(&self, text: &str) -> Option<Vec<u8>> {
        let (bytes, _, unmappable) = self.encoding.encode(text);
        if unmappable {
            return None;
        }

        let mut out = Vec::with_capacity(bytes.len() + 3);
        if self.write_bom {
            out.extend_from_slice(b"\xEF\xBB\xBF");
        }
        out.extend_from_slice(&bytes);
        Some(out)
    }
}

impl Default for TextEncoding {
    fn default() -> Self {
        Self {
            label: DEFAULT_ENCODING.to_string(),
            encoding: encoding_rs::UTF_8,
            write_bom: false,
        }
    }
}

/// Parse a delimiter argument into a single byte
pub fn parse_delimiter(value: &str) -> Result<u8> {
    match value {
        "\\t" | "tab" => return Ok(b'\t'),
        _ => {}
    }

    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii() && c != '"' && c != '\n' && c != '\r' => Ok(c as u8),
        _ => Err(Error::InvalidDelimiter(value.to_string())),
    }
}

/// Parse a comma-separated project list; items are trimmed and blanks dropped
pub fn parse_project_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Default values handed to configuration resolution
#[derive(Debug, Clone)]
pub struct Defaults {
    pub input: PathBuf,
    pub output: PathBuf,
    pub pattern: String,
    pub delimiter: String,
    pub encoding: String,
    pub mode: MergeMode,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            input: PathBuf::from(DEFAULT_INPUT_DIR),
            output: PathBuf::from(DEFAULT_OUTPUT),
            pattern: DEFAULT_PATTERN.to_string(),
            delimiter: DEFAULT_DELIMITER.to_string(),
            encoding: DEFAULT_ENCODING.to_string(),
            mode: MergeMode::Union,
        }
    }
}

/// Unresolved settings, as read from a JSON file or collected from flags
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MergeSettings {
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub add_source: Option<bool>,
    pub delimiter: Option<String>,
    pub encoding: Option<String>,
    pub mode: Option<MergeMode>,
    pub recursive: Option<bool>,
    pub pattern: Option<String>,
    pub keep_identifying_info: Option<bool>,
    pub only_projects: Option<Vec<String>>,
    pub exclude_projects: Option<Vec<String>>,
}

impl MergeSettings {
    /// Load settings from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| Error::ConfigRead {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(Error::Json)
    }

    /// Lay `other` over `self`; values set in `other` win
    pub fn overlay(self, other: MergeSettings) -> MergeSettings {
        MergeSettings {
            input: other.input.or(self.input),
            output: other.output.or(self.output),
            add_source: other.add_source.or(self.add_source),
            delimiter: other.delimiter.or(self.delimiter),
            encoding: other.encoding.or(self.encoding),
            mode: other.mode.or(self.mode),
            recursive: other.recursive.or(self.recursive),
            pattern: other.pattern.or(self.pattern),
            keep_identifying_info: other.keep_identifying_info.or(self.keep_identifying_info),
            only_projects: other.only_projects.or(self.only_projects),
            exclude_projects: other.exclude_projects.or(self.exclude_projects),
        }
    }

    /// Fill unset values from `defaults` and validate the result
    pub fn resolve(self, defaults: &Defaults) -> Result<MergeConfig> {
        let pattern = self.pattern.unwrap_or_else(|| defaults.pattern.clone());
        glob::Pattern::new(&pattern).map_err(|e| Error::InvalidPattern {
            pattern: pattern.clone(),
            message: e.msg.to_string(),
        })?;

        let delimiter = parse_delimiter(self.delimiter.as_deref().unwrap_or(&defaults.delimiter))?;
        let encoding =
            TextEncoding::from_label(self.encoding.as_deref().unwrap_or(&defaults.encoding))?;

        Ok(MergeConfig {
            input: self.input.unwrap_or_else(|| defaults.input.clone()),
            output: self.output.unwrap_or_else(|| defaults.output.clone()),
            delimiter,
            encoding,
            mode: self.mode.unwrap_or(defaults.mode),
            recursive: self.recursive.unwrap_or(false),
            pattern,
            add_source: self.add_source.unwrap_or(false),
            keep_identifying_info: self.keep_identifying_info.unwrap_or(false),
            only_projects: project_set(self.only_projects),
            exclude_projects: project_set(self.exclude_projects),
        })
    }
}

fn project_set(items: Option<Vec<String>>) -> BTreeSet<String> {
    items
        .unwrap_or_default()
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

/// Fully resolved configuration for one merge run
#[derive(Debug, Clone)]
pub struct MergeConfig {
    /// Root directory searched for input files
    pub input: PathBuf,
    /// Output file path
    pub output: PathBuf,
    /// Field delimiter for inputs and output
    pub delimiter: u8,
    /// Text encoding for inputs and output
    pub encoding: TextEncoding,
    /// Column reconciliation mode
    pub mode: MergeMode,
    /// Descend into subdirectories of `input`
    pub recursive: bool,
    /// Filename glob
    pub pattern: String,
    /// Add a `source_file` column
    pub add_source: bool,
    /// Keep the `project_name` column
    pub keep_identifying_info: bool,
    /// Keep only rows for these projects
    pub only_projects: BTreeSet<String>,
    /// Drop rows for these projects
    pub exclude_projects: BTreeSet<String>,
}

impl MergeConfig {
    /// Configuration with every value at its default
    pub fn with_defaults(defaults: &Defaults) -> Result<Self> {
        MergeSettings::default().resolve(defaults)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_from_str() {
        assert_eq!("union".parse::<MergeMode>().unwrap(), MergeMode::Union);
        assert_eq!("Intersection".parse::<MergeMode>().unwrap(), MergeMode::Intersection);
        assert_eq!(" strict ".parse::<MergeMode>().unwrap(), MergeMode::Strict);
        assert!(matches!("unoin".parse::<MergeMode>(), Err(Error::InvalidMode(_))));
    }

    #[test]
    fn test_mode_serde_lowercase() {
        let json = serde_json::to_string(&MergeMode::Intersection).unwrap();
        assert_eq!(json, "\"intersection\"");
        let mode: MergeMode = serde_json::from_str("\"strict\"").unwrap();
        assert_eq!(mode, MergeMode::Strict);
    }

    #[test]
    fn test_parse_delimiter() {
        assert_eq!(parse_delimiter(",").unwrap(), b',');
        assert_eq!(parse_delimiter(";").unwrap(), b';');
        assert_eq!(parse_delimiter("\\t").unwrap(), b'\t');
        assert_eq!(parse_delimiter("tab").unwrap(), b'\t');
        assert!(parse_delimiter("").is_err());
        assert!(parse_delimiter(";;").is_err());
        assert!(parse_delimiter("é").is_err());
    }

    #[test]
    fn test_parse_project_list() {
        let projects = parse_project_list("ELM,PolicyExplorer,AskEdHelp, edhelp-usva,");
        assert_eq!(projects, vec!["ELM", "PolicyExplorer", "AskEdHelp", "edhelp-usva"]);
        assert!(parse_project_list("").is_empty());
        assert!(parse_project_list(" , ").is_empty());
    }

    #[test]
    fn test_encoding_labels() {
        assert_eq!(TextEncoding::from_label("utf-8").unwrap().name(), "UTF-8");
        assert_eq!(TextEncoding::from_label("cp1252").unwrap().name(), "windows-1252");

        let sig = TextEncoding::from_label("utf-8-sig").unwrap();
        assert_eq!(sig.name(), "UTF-8");
        assert!(sig.writes_bom());

        assert!(matches!(
            TextEncoding::from_label("klingon"),
            Err(Error::UnknownEncoding(_))
        ));
        assert!(matches!(
            TextEncoding::from_label("utf-16"),
            Err(Error::UnknownEncoding(_))
        ));
    }

    #[test]
    fn test_encoding_round_trip_and_bom() {
        let sig = TextEncoding::from_label("utf-8-sig").unwrap();
        let bytes = sig.encode("a,b\n").unwrap();
        assert_eq!(&bytes[..3], b"\xEF\xBB\xBF");
        assert_eq!(sig.decode(&bytes).unwrap(), "a,b\n");

        let utf8 = TextEncoding::default();
        assert_eq!(utf8.decode(b"\xEF\xBB\xBFx").unwrap(), "x");
        assert!(utf8.decode(b"\xFF\xFE\xFD").is_none());
    }

    #[test]
    fn test_encode_unmappable_fails() {
        let cp1252 = TextEncoding::from_label("cp1252").unwrap();
        assert!(cp1252.encode("caf\u{e9}").is_some());
        assert!(cp1252.encode("\u{65e5}\u{672c}").is_none());
    }

    #[test]
    fn test_resolve_uses_defaults() {
        let config = MergeConfig::with_defaults(&Defaults::default()).unwrap();

        assert_eq!(config.input, PathBuf::from("SS"));
        assert_eq!(config.output, PathBuf::from("merged.csv"));
        assert_eq!(config.pattern, "*.csv");
        assert_eq!(config.delimiter, b',');
        assert_eq!(config.mode, MergeMode::Union);
        assert!(!config.recursive);
        assert!(!config.add_source);
        assert!(!config.keep_identifying_info);
        assert!(config.only_projects.is_empty());
        assert!(config.exclude_projects.is_empty());
    }

    #[test]
    fn test_resolve_with_injected_defaults() {
        let defaults = Defaults {
            input: PathBuf::from("exports"),
            pattern: "cost_*.csv".to_string(),
            delimiter: ";".to_string(),
            ..Defaults::default()
        };
        let config = MergeConfig::with_defaults(&defaults).unwrap();

        assert_eq!(config.input, PathBuf::from("exports"));
        assert_eq!(config.pattern, "cost_*.csv");
        assert_eq!(config.delimiter, b';');
    }

    #[test]
    fn test_resolve_rejects_bad_pattern() {
        let settings = MergeSettings {
            pattern: Some("[*.csv".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            settings.resolve(&Defaults::default()),
            Err(Error::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_overlay_prefers_later_values() {
        let file = MergeSettings {
            input: Some(PathBuf::from("data")),
            mode: Some(MergeMode::Strict),
            only_projects: Some(vec!["ELM".to_string()]),
            ..Default::default()
        };
        let flags = MergeSettings {
            mode: Some(MergeMode::Intersection),
            add_source: Some(true),
            ..Default::default()
        };

        let config = file.overlay(flags).resolve(&Defaults::default()).unwrap();
        assert_eq!(config.input, PathBuf::from("data"));
        assert_eq!(config.mode, MergeMode::Intersection);
        assert!(config.add_source);
        assert!(config.only_projects.contains("ELM"));
    }

    #[test]
    fn test_settings_file_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("merge.json");
        fs::write(
            &path,
            r#"{"pattern": "cost_*.csv", "recursive": true, "mode": "strict", "exclude_projects": ["ELM"]}"#,
        )
        .unwrap();

        let loaded = MergeSettings::load(&path).unwrap();
        assert_eq!(
            loaded,
            MergeSettings {
                pattern: Some("cost_*.csv".to_string()),
                recursive: Some(true),
                mode: Some(MergeMode::Strict),
                exclude_projects: Some(vec!["ELM".to_string()]),
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_settings_rejects_unknown_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("merge.json");
        fs::write(&path, r#"{"inputt": "data"}"#).unwrap();

        assert!(matches!(MergeSettings::load(&path), Err(Error::Json(_))));
    }
}
