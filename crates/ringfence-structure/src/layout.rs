//! Expected layouts
//!
//! An [`ExpectedLayout`] names the layers a platform's codebase is organised
//! into (controller, service, repository...), the directory names each layer
//! lives under, and the type-name suffixes that identify its members.
//!
//! Built-in layouts exist for the platforms the default detector recognises;
//! custom ones deserialize from configuration.

use ringfence_scope::ScopePath;
use serde::{Deserialize, Serialize};

/// One architectural layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerSpec {
    /// Layer name
    pub name: String,
    /// Directory names the layer may live under (case-insensitive)
    #[serde(default)]
    pub directory_names: Vec<String>,
    /// Type-name suffixes of the layer's members
    #[serde(default)]
    pub name_patterns: Vec<String>,
    /// Whether a codebase must have this layer
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

impl LayerSpec {
    /// Create a required layer whose directory is its name
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            directory_names: Vec::new(),
            name_patterns: Vec::new(),
            required: true,
        }
    }

    /// With directory aliases
    #[must_use]
    pub fn with_directories<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.directory_names = names.into_iter().map(Into::into).collect();
        self
    }

    /// With name patterns
    #[must_use]
    pub fn with_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.name_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Mark the layer optional
    #[inline]
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Preferred directory name for a new layer directory
    #[must_use]
    pub fn primary_directory(&self) -> &str {
        self.directory_names
            .first()
            .map_or(self.name.as_str(), String::as_str)
    }

    /// Whether a directory named `dir_name` holds this layer
    #[must_use]
    pub fn matches_directory(&self, dir_name: &str) -> bool {
        if self.directory_names.is_empty() {
            return self.name.eq_ignore_ascii_case(dir_name);
        }
        self.directory_names
            .iter()
            .any(|alias| alias.eq_ignore_ascii_case(dir_name))
    }

    /// Whether a type or file named `symbol` belongs to this layer
    ///
    /// `OrderController` and `order_controller` both match `Controller`.
    #[must_use]
    pub fn matches_symbol(&self, symbol: &str) -> bool {
        self.name_patterns
            .iter()
            .any(|pattern| suffix_matches(symbol, pattern))
    }
}

fn suffix_matches(symbol: &str, pattern: &str) -> bool {
    if pattern.is_empty() || symbol.is_empty() {
        return false;
    }
    if symbol.ends_with(pattern) {
        return true;
    }
    let lower = symbol.to_ascii_lowercase();
    let pattern = pattern.to_ascii_lowercase();
    if lower == pattern {
        return true;
    }
    lower
        .strip_suffix(&pattern)
        .is_some_and(|prefix| prefix.ends_with('_') || prefix.ends_with('-'))
}

/// Layers a platform's codebase is expected to have
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedLayout {
    /// Platform identifier
    pub platform: String,
    /// Layers in canonical order
    pub layers: Vec<LayerSpec>,
    /// Extensions (without dot) of files inspected for declarations
    #[serde(default)]
    pub source_extensions: Vec<String>,
    /// Directory, relative to the codebase root, layers are searched under
    #[serde(default)]
    pub source_root: Option<String>,
    /// Nested type names that are idiomatic and never flagged
    #[serde(default)]
    pub nested_allowlist: Vec<String>,
}

impl ExpectedLayout {
    /// Create empty layout for a platform
    #[must_use]
    pub fn new(platform: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            layers: Vec::new(),
            source_extensions: Vec::new(),
            source_root: None,
            nested_allowlist: Vec::new(),
        }
    }

    /// With an additional layer
    #[must_use]
    pub fn with_layer(mut self, layer: LayerSpec) -> Self {
        self.layers.push(layer);
        self
    }

    /// With source extensions
    #[must_use]
    pub fn with_source_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.source_extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// With source root
    #[must_use]
    pub fn with_source_root(mut self, root: impl Into<String>) -> Self {
        self.source_root = Some(root.into());
        self
    }

    /// With nested allowlist
    #[must_use]
    pub fn with_nested_allowlist<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.nested_allowlist = names.into_iter().map(Into::into).collect();
        self
    }

    /// Platforms with a built-in layout
    #[must_use]
    pub fn builtin_platforms() -> &'static [&'static str] {
        &[
            "java-spring",
            "typescript-node",
            "python-service",
            "go-service",
            "rust-service",
        ]
    }

    /// Built-in layout for a platform
    #[must_use]
    pub fn builtin(platform: &str) -> Option<Self> {
        let layout = match platform {
            "java-spring" => Self::new(platform)
                .with_layer(
                    LayerSpec::new("controller")
                        .with_directories(["controller", "controllers", "web", "api"])
                        .with_patterns(["Controller", "Resource"]),
                )
                .with_layer(
                    LayerSpec::new("service")
                        .with_directories(["service", "services"])
                        .with_patterns(["Service", "ServiceImpl"]),
                )
                .with_layer(
                    LayerSpec::new("repository")
                        .with_directories(["repository", "repositories", "dao"])
                        .with_patterns(["Repository", "Dao"]),
                )
                .with_layer(
                    LayerSpec::new("model")
                        .with_directories(["model", "models", "entity", "domain"])
                        .with_patterns(["Entity"]),
                )
                .with_layer(
                    LayerSpec::new("dto")
                        .with_directories(["dto", "dtos"])
                        .with_patterns(["Dto", "DTO", "Request", "Response"]),
                )
                .with_source_extensions(["java"])
                .with_nested_allowlist(["Builder"]),
            "typescript-node" => Self::new(platform)
                .with_layer(
                    LayerSpec::new("controllers")
                        .with_directories(["controllers", "controller", "routes"])
                        .with_patterns(["Controller", "Router", "Routes"]),
                )
                .with_layer(
                    LayerSpec::new("services")
                        .with_directories(["services", "service"])
                        .with_patterns(["Service"]),
                )
                .with_layer(
                    LayerSpec::new("repositories")
                        .with_directories(["repositories", "repository"])
                        .with_patterns(["Repository", "Repo"]),
                )
                .with_layer(
                    LayerSpec::new("models")
                        .with_directories(["models", "model", "entities"])
                        .with_patterns(["Model", "Entity"]),
                )
                .with_source_extensions(["ts", "tsx", "js", "jsx"])
                .with_source_root("src"),
            "python-service" => Self::new(platform)
                .with_layer(
                    LayerSpec::new("api")
                        .with_directories(["api", "routers", "routes", "views"])
                        .with_patterns(["Router", "View", "Handler"]),
                )
                .with_layer(
                    LayerSpec::new("services")
                        .with_directories(["services", "service"])
                        .with_patterns(["Service"]),
                )
                .with_layer(
                    LayerSpec::new("repositories")
                        .with_directories(["repositories", "repository", "crud"])
                        .with_patterns(["Repository", "Repo"]),
                )
                .with_layer(
                    LayerSpec::new("models")
                        .with_directories(["models", "model"])
                        .with_patterns(["Model"]),
                )
                .with_layer(
                    LayerSpec::new("schemas")
                        .with_directories(["schemas", "schema"])
                        .with_patterns(["Schema"])
                        .optional(),
                )
                .with_source_extensions(["py"])
                .with_nested_allowlist(["Meta", "Config"]),
            "go-service" => Self::new(platform)
                .with_layer(
                    LayerSpec::new("handler")
                        .with_directories(["handler", "handlers", "api"])
                        .with_patterns(["Handler"]),
                )
                .with_layer(
                    LayerSpec::new("service")
                        .with_directories(["service", "services"])
                        .with_patterns(["Service"]),
                )
                .with_layer(
                    LayerSpec::new("repository")
                        .with_directories(["repository", "store", "storage"])
                        .with_patterns(["Repository", "Store"]),
                )
                .with_layer(
                    LayerSpec::new("model")
                        .with_directories(["model", "models", "domain"])
                        .with_patterns(["Model"]),
                )
                .with_source_extensions(["go"]),
            "rust-service" => Self::new(platform)
                .with_layer(
                    LayerSpec::new("handlers")
                        .with_directories(["handlers", "handler", "routes", "api"])
                        .with_patterns(["Handler"]),
                )
                .with_layer(
                    LayerSpec::new("services")
                        .with_directories(["services", "service"])
                        .with_patterns(["Service"]),
                )
                .with_layer(
                    LayerSpec::new("repository")
                        .with_directories(["repository", "repositories", "store", "db"])
                        .with_patterns(["Repository", "Store"]),
                )
                .with_layer(
                    LayerSpec::new("models")
                        .with_directories(["models", "model", "domain"])
                        .with_patterns(["Model"]),
                )
                .with_source_extensions(["rs"])
                .with_source_root("src")
                .with_nested_allowlist(["Builder"]),
            _ => return None,
        };
        Some(layout)
    }

    /// Required layers
    pub fn required_layers(&self) -> impl Iterator<Item = &LayerSpec> {
        self.layers.iter().filter(|l| l.required)
    }

    /// Layer a directory name belongs to
    #[must_use]
    pub fn layer_for_directory(&self, dir_name: &str) -> Option<&LayerSpec> {
        self.layers.iter().find(|l| l.matches_directory(dir_name))
    }

    /// First layer whose name patterns match `symbol`
    #[must_use]
    pub fn layer_for_symbol(&self, symbol: &str) -> Option<&LayerSpec> {
        self.layers.iter().find(|l| l.matches_symbol(symbol))
    }

    /// Whether `path` should be inspected for declarations
    #[must_use]
    pub fn is_source_file(&self, path: &ScopePath) -> bool {
        let Some(ext) = path.extension() else {
            return false;
        };
        if self.source_extensions.is_empty() {
            return crate::declarations::SourceLanguage::from_extension(ext).is_some();
        }
        self.source_extensions
            .iter()
            .any(|e| e.trim_start_matches('.').eq_ignore_ascii_case(ext))
    }

    /// Whether a nested type name is exempt
    #[must_use]
    pub fn allows_nested(&self, name: &str) -> bool {
        self.nested_allowlist.iter().any(|n| n == name)
    }

    /// Source root as a relative path (empty when absent)
    #[must_use]
    pub fn source_root_path(&self) -> ScopePath {
        ScopePath::parse(self.source_root.as_deref().unwrap_or(""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_builtin_platform_has_a_layout() {
        for platform in ExpectedLayout::builtin_platforms() {
            let layout = ExpectedLayout::builtin(platform).unwrap();
            assert_eq!(&layout.platform, platform);
            assert!(layout.required_layers().count() >= 4);
        }
        assert!(ExpectedLayout::builtin("cobol-mainframe").is_none());
    }

    #[test]
    fn java_spring_requires_five_layers() {
        let layout = ExpectedLayout::builtin("java-spring").unwrap();
        assert_eq!(layout.required_layers().count(), 5);
    }

    #[test]
    fn directory_aliases_are_case_insensitive() {
        let layout = ExpectedLayout::builtin("java-spring").unwrap();
        assert_eq!(layout.layer_for_directory("Controllers").map(|l| l.name.as_str()), Some("controller"));
        assert!(layout.layer_for_directory("util").is_none());
    }

    #[test]
    fn symbols_match_camel_and_snake_suffixes() {
        let layer = LayerSpec::new("service").with_patterns(["Service"]);
        assert!(layer.matches_symbol("OrderService"));
        assert!(layer.matches_symbol("order_service"));
        assert!(layer.matches_symbol("service"));
        assert!(!layer.matches_symbol("orderservices"));
        assert!(!layer.matches_symbol("Order"));
    }

    #[test]
    fn layer_without_aliases_uses_its_name() {
        let layer = LayerSpec::new("handlers");
        assert!(layer.matches_directory("Handlers"));
        assert_eq!(layer.primary_directory(), "handlers");
    }

    #[test]
    fn source_files_follow_extensions() {
        let layout = ExpectedLayout::builtin("typescript-node").unwrap();
        assert!(layout.is_source_file(&ScopePath::parse("src/app.ts")));
        assert!(!layout.is_source_file(&ScopePath::parse("src/app.py")));
        assert!(!layout.is_source_file(&ScopePath::parse("Makefile")));
    }
}
