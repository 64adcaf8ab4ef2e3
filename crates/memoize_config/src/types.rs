//! Configuration types deserialized from `memoize.toml`.

use serde::Deserialize;
use std::collections::BTreeMap;

/// The top-level project configuration parsed from `memoize.toml`.
#[derive(Debug, Deserialize)]
pub struct MemoizeConfig {
    /// The memoized stage group: name and cache location.
    pub stage: StageMeta,
    /// Source and output directories, relative to the project root.
    pub paths: PathsConfig,
    /// Path-pattern to encoding table consulted during traversal.
    /// Patterns support `*` wildcards; the first match wins.
    #[serde(default)]
    pub encodings: BTreeMap<String, String>,
}

/// Identity and cache location of the memoized stage group.
#[derive(Debug, Deserialize)]
pub struct StageMeta {
    /// Stage group name; namespaces the cache directory and manifest
    /// file, so differently named groups never share cache state.
    pub name: String,
    /// Root-relative directory memoization data lives under.
    #[serde(default = "default_cache_path")]
    pub cache_path: String,
}

fn default_cache_path() -> String {
    ".cache".to_string()
}

/// Source and output directory configuration.
#[derive(Debug, Deserialize)]
pub struct PathsConfig {
    /// Directory holding the source files fed into the pipeline.
    pub source: String,
    /// Directory the final build output is written to.
    pub output: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_path_defaults() {
        let toml = r#"
[stage]
name = "minify"

[paths]
source = "src"
output = "dist"
"#;
        let config: MemoizeConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.stage.cache_path, ".cache");
        assert!(config.encodings.is_empty());
    }

    #[test]
    fn encodings_table_parses() {
        let toml = r#"
[stage]
name = "minify"

[paths]
source = "src"
output = "dist"

[encodings]
"*.css" = "gbk"
"legacy/*" = "gb2312"
"#;
        let config: MemoizeConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.encodings["*.css"], "gbk");
        assert_eq!(config.encodings["legacy/*"], "gb2312");
    }
}
