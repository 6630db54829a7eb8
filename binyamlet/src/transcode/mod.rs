//! Conversions between Yamlet values and other data formats.

pub mod json;
pub mod toml;
pub mod yaml;

use libyamlet::{to_string_with, EncodeOptions, Value};
use std::path::Path;

/// A document format the tool reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Yamlet,
    Json,
    Yaml,
    Toml,
}

impl Format {
    /// Look up a format by its command-line name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "yamlet" => Some(Format::Yamlet),
            "json" => Some(Format::Json),
            "yaml" | "yml" => Some(Format::Yaml),
            "toml" => Some(Format::Toml),
            _ => None,
        }
    }

    /// Guess the format of a file from its extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Format::from_name)
    }

    pub fn extension(self) -> &'static str {
        match self {
            Format::Yamlet => "yamlet",
            Format::Json => "json",
            Format::Yaml => "yaml",
            Format::Toml => "toml",
        }
    }

    /// Decode `input`. `filename` is only used to locate Yamlet errors.
    pub fn decode(self, input: &str, filename: Option<&str>) -> Result<Value, String> {
        match self {
            Format::Yamlet => {
                libyamlet::parse_with_filename(input, filename).map_err(|e| e.to_string())
            }
            Format::Json => json::decode(input),
            Format::Yaml => yaml::decode(input),
            Format::Toml => toml::decode(input),
        }
    }

    pub fn encode(self, value: &Value, options: &EncodeOptions) -> Result<String, String> {
        match self {
            Format::Yamlet => Ok(to_string_with(value, options)),
            Format::Json => json::encode(value),
            Format::Yaml => yaml::encode(value),
            Format::Toml => toml::encode(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_names_and_extensions() {
        assert_eq!(Format::from_name("yml"), Some(Format::Yaml));
        assert_eq!(Format::from_name("xml"), None);
        assert_eq!(
            Format::from_path(Path::new("conf/app.yamlet")),
            Some(Format::Yamlet)
        );
        assert_eq!(Format::from_path(Path::new("README")), None);
        assert_eq!(Format::Toml.extension(), "toml");
    }

    #[test]
    fn test_yamlet_errors_name_the_file() {
        let err = Format::Yamlet
            .decode("a: [1]", Some("list.yamlet"))
            .unwrap_err();
        assert_eq!(err, "Unsupported inline sequence at 1:4 of <list.yamlet>");
    }
}
