//! Declaration inspection
//!
//! Parses a source file with tree-sitter and records what the scorer needs
//! to know about it: the types it declares (and which ones sit inside
//! another type's body or a function), its annotations / decorators /
//! attributes, its imports, and how many fields look like in-memory storage.
//!
//! Everything is read from the syntax tree; comments never count.

use serde::{Deserialize, Serialize};
use tree_sitter::Node;

/// Languages with declaration inspection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceLanguage {
    /// Java
    Java,
    /// TypeScript
    TypeScript,
    /// TSX / JSX / JavaScript
    Tsx,
    /// Python
    Python,
    /// Rust
    Rust,
    /// Go
    Go,
}

impl SourceLanguage {
    /// Detect language from file extension
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "java" => Some(SourceLanguage::Java),
            "ts" | "mts" | "cts" => Some(SourceLanguage::TypeScript),
            "tsx" | "js" | "jsx" | "mjs" | "cjs" => Some(SourceLanguage::Tsx),
            "py" => Some(SourceLanguage::Python),
            "rs" => Some(SourceLanguage::Rust),
            "go" => Some(SourceLanguage::Go),
            _ => None,
        }
    }

    /// Get tree-sitter language
    #[must_use]
    pub fn tree_sitter_language(self) -> tree_sitter::Language {
        match self {
            SourceLanguage::Java => tree_sitter_java::LANGUAGE.into(),
            SourceLanguage::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            SourceLanguage::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
            SourceLanguage::Python => tree_sitter_python::LANGUAGE.into(),
            SourceLanguage::Rust => tree_sitter_rust::LANGUAGE.into(),
            SourceLanguage::Go => tree_sitter_go::LANGUAGE.into(),
        }
    }

    fn profile(self) -> &'static Profile {
        match self {
            SourceLanguage::Java => &JAVA,
            SourceLanguage::TypeScript | SourceLanguage::Tsx => &TYPESCRIPT,
            SourceLanguage::Python => &PYTHON,
            SourceLanguage::Rust => &RUST,
            SourceLanguage::Go => &GO,
        }
    }
}

impl std::fmt::Display for SourceLanguage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SourceLanguage::Java => "Java",
            SourceLanguage::TypeScript => "TypeScript",
            SourceLanguage::Tsx => "TSX",
            SourceLanguage::Python => "Python",
            SourceLanguage::Rust => "Rust",
            SourceLanguage::Go => "Go",
        };
        write!(f, "{name}")
    }
}

/// Node kinds of interest for one grammar
struct Profile {
    types: &'static [&'static str],
    /// Containers that are not declarations themselves (Rust `impl`)
    impls: &'static [&'static str],
    functions: &'static [&'static str],
    annotations: &'static [&'static str],
    imports: &'static [&'static str],
    storage: &'static [&'static str],
}

static JAVA: Profile = Profile {
    types: &[
        "class_declaration",
        "interface_declaration",
        "enum_declaration",
        "record_declaration",
        "annotation_type_declaration",
    ],
    impls: &[],
    functions: &["method_declaration", "constructor_declaration", "lambda_expression"],
    annotations: &["marker_annotation", "annotation"],
    imports: &["import_declaration"],
    storage: &["field_declaration"],
};

static TYPESCRIPT: Profile = Profile {
    types: &[
        "class_declaration",
        "abstract_class_declaration",
        "interface_declaration",
        "enum_declaration",
    ],
    impls: &[],
    functions: &[
        "function_declaration",
        "generator_function_declaration",
        "method_definition",
        "arrow_function",
        "function_expression",
    ],
    annotations: &["decorator"],
    imports: &["import_statement"],
    storage: &["public_field_definition", "field_definition", "variable_declarator"],
};

static PYTHON: Profile = Profile {
    types: &["class_definition"],
    impls: &[],
    functions: &["function_definition", "lambda"],
    annotations: &["decorator"],
    imports: &["import_statement", "import_from_statement"],
    storage: &["assignment"],
};

static RUST: Profile = Profile {
    types: &["struct_item", "enum_item", "trait_item", "union_item"],
    impls: &["impl_item"],
    functions: &["function_item", "closure_expression"],
    annotations: &["attribute_item"],
    imports: &["use_declaration"],
    storage: &["field_declaration", "static_item"],
};

static GO: Profile = Profile {
    types: &["type_spec", "type_alias"],
    impls: &[],
    functions: &["function_declaration", "method_declaration", "func_literal"],
    annotations: &[],
    imports: &["import_spec"],
    storage: &["field_declaration", "var_spec"],
};

const HTTP_ANNOTATIONS: &[&str] = &[
    "RestController",
    "Controller",
    "RequestMapping",
    "GetMapping",
    "PostMapping",
    "PutMapping",
    "DeleteMapping",
    "PatchMapping",
    "Path",
    "GET",
    "POST",
    "PUT",
    "DELETE",
    "PATCH",
    "Get",
    "Post",
    "Put",
    "Delete",
    "Patch",
    "get",
    "post",
    "put",
    "delete",
    "patch",
    "route",
    "api_view",
];

const HTTP_MODULES: &[&str] = &[
    "org.springframework.web",
    "javax.ws.rs",
    "jakarta.ws.rs",
    "javax.servlet.http",
    "jakarta.servlet.http",
    "express",
    "@nestjs/common",
    "koa",
    "fastify",
    "flask",
    "fastapi",
    "django.http",
    "starlette",
    "aiohttp",
    "net/http",
    "github.com/gin-gonic/gin",
    "github.com/labstack/echo",
    "github.com/gofiber/fiber",
    "axum",
    "actix_web",
    "warp",
    "rocket",
];

const JAVA_COLLECTIONS: &[&str] = &[
    "HashMap",
    "ConcurrentHashMap",
    "LinkedHashMap",
    "TreeMap",
    "ArrayList",
    "LinkedList",
    "CopyOnWriteArrayList",
    "HashSet",
    "TreeSet",
];

const PYTHON_COLLECTIONS: &[&str] = &["dict", "list", "set", "defaultdict", "OrderedDict"];

const TS_COLLECTIONS: &[&str] = &["Map", "Set", "WeakMap", "Array"];

const RUST_STORES: &[&str] = &[
    "HashMap",
    "BTreeMap",
    "HashSet",
    "BTreeSet",
    "DashMap",
    "Mutex<Vec",
    "RwLock<Vec",
];

/// A type declared in a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDeclaration {
    /// Type name
    pub name: String,
    /// Enclosing type, or the enclosing function when no type encloses it
    pub parent: Option<String>,
    /// 1-based line of the declaration
    pub line: usize,
}

impl TypeDeclaration {
    /// Whether the type sits inside another type or a function
    #[inline]
    #[must_use]
    pub fn is_nested(&self) -> bool {
        self.parent.is_some()
    }
}

/// What a source file declares
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDeclarations {
    /// Language the file was parsed as
    pub language: SourceLanguage,
    /// Types in source order
    pub types: Vec<TypeDeclaration>,
    /// Annotation, decorator and attribute names
    pub annotations: Vec<String>,
    /// Import statements as written
    pub imports: Vec<String>,
    /// Fields or module-level values holding in-memory collections
    pub storage_fields: usize,
}

impl FileDeclarations {
    fn empty(language: SourceLanguage) -> Self {
        Self {
            language,
            types: Vec::new(),
            annotations: Vec::new(),
            imports: Vec::new(),
            storage_fields: 0,
        }
    }

    /// Types not nested in another type
    pub fn top_level_types(&self) -> impl Iterator<Item = &TypeDeclaration> {
        self.types.iter().filter(|t| !t.is_nested())
    }

    /// Types nested in another type
    pub fn nested_types(&self) -> impl Iterator<Item = &TypeDeclaration> {
        self.types.iter().filter(|t| t.is_nested())
    }

    /// First top-level type
    #[must_use]
    pub fn primary_type(&self) -> Option<&str> {
        self.top_level_types().next().map(|t| t.name.as_str())
    }

    /// Whether the file serves HTTP requests
    #[must_use]
    pub fn handles_http(&self) -> bool {
        self.annotations
            .iter()
            .any(|a| HTTP_ANNOTATIONS.contains(&a.as_str()))
            || self
                .imports
                .iter()
                .any(|i| HTTP_MODULES.iter().any(|m| imports_module(i, m)))
    }

    /// Whether the file keeps data in memory
    #[inline]
    #[must_use]
    pub fn holds_storage(&self) -> bool {
        self.storage_fields > 0
    }
}

/// Parse error types
#[derive(Debug, Clone, thiserror::Error)]
pub enum ParseError {
    /// Grammar could not be loaded
    #[error("parser initialization failed for {language}: {message}")]
    ParserInit {
        /// Language
        language: SourceLanguage,
        /// Underlying message
        message: String,
    },

    /// Parser gave up
    #[error("parse failed for {0} source")]
    ParseFailed(SourceLanguage),
}

/// Inspect a source file
///
/// Syntax errors are tolerated; whatever the parser recovered is inspected.
///
/// # Errors
/// Returns error if the grammar cannot be loaded or parsing is aborted
pub fn inspect(source: &str, language: SourceLanguage) -> Result<FileDeclarations, ParseError> {
    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(&language.tree_sitter_language())
        .map_err(|e| ParseError::ParserInit {
            language,
            message: e.to_string(),
        })?;

    let tree = parser
        .parse(source, None)
        .ok_or(ParseError::ParseFailed(language))?;

    let root = tree.root_node();
    if root.has_error() {
        tracing::debug!(%language, "source has syntax errors; inspecting recovered tree");
    }

    let mut walker = Walker {
        profile: language.profile(),
        language,
        source,
        out: FileDeclarations::empty(language),
        enclosing: Vec::new(),
        functions: Vec::new(),
    };
    walker.visit(root);
    Ok(walker.out)
}

struct Walker<'a> {
    profile: &'static Profile,
    language: SourceLanguage,
    source: &'a str,
    out: FileDeclarations,
    enclosing: Vec<String>,
    /// Names of the functions being walked, innermost last
    functions: Vec<String>,
}

impl<'a> Walker<'a> {
    fn text(&self, node: Node<'_>) -> &'a str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }

    fn field_text(&self, node: Node<'_>, field: &str) -> Option<&'a str> {
        node.child_by_field_name(field).map(|n| self.text(n))
    }

    fn visit(&mut self, node: Node<'_>) {
        let kind = node.kind();
        let profile = self.profile;

        if profile.annotations.contains(&kind) {
            let name = annotation_name(self.text(node));
            if !name.is_empty() {
                self.out.annotations.push(name.to_string());
            }
        } else if profile.imports.contains(&kind) {
            let import = self.text(node).trim().to_string();
            self.out.imports.push(import);
        } else if profile.storage.contains(&kind) && self.is_storage(node) {
            self.out.storage_fields += 1;
        }

        let mut entered_type = false;
        if profile.types.contains(&kind) {
            if let Some(name) = self.field_text(node, "name").map(str::to_string) {
                if !name.is_empty() {
                    self.out.types.push(TypeDeclaration {
                        name: name.clone(),
                        parent: self.enclosing.last().or(self.functions.last()).cloned(),
                        line: node.start_position().row + 1,
                    });
                    self.enclosing.push(name);
                    entered_type = true;
                }
            }
        } else if profile.impls.contains(&kind) {
            if let Some(name) = self.field_text(node, "type").map(strip_generics) {
                self.enclosing.push(name);
                entered_type = true;
            }
        }

        let entered_function = profile.functions.contains(&kind);
        if entered_function {
            let name = self.field_text(node, "name").unwrap_or("<closure>");
            self.functions.push(name.to_string());
        }

        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
        for child in children {
            self.visit(child);
        }

        if entered_function {
            self.functions.pop();
        }
        if entered_type {
            self.enclosing.pop();
        }
    }

    fn is_storage(&self, node: Node<'_>) -> bool {
        let at_module_level = self.functions.is_empty();
        match (self.language, node.kind()) {
            (SourceLanguage::Java, _) => {
                let text = self.text(node);
                JAVA_COLLECTIONS
                    .iter()
                    .any(|c| text.contains(&format!("new {c}")))
            }
            (SourceLanguage::Python, _) => {
                let left = self.field_text(node, "left").unwrap_or("");
                if !at_module_level && !left.starts_with("self.") {
                    return false;
                }
                node.child_by_field_name("right")
                    .is_some_and(|right| self.is_python_collection(right))
            }
            (SourceLanguage::TypeScript | SourceLanguage::Tsx, "variable_declarator")
                if !at_module_level =>
            {
                false
            }
            (SourceLanguage::TypeScript | SourceLanguage::Tsx, _) => node
                .child_by_field_name("value")
                .is_some_and(|value| self.is_ts_collection(value)),
            (SourceLanguage::Go, "field_declaration") => node
                .child_by_field_name("type")
                .is_some_and(|t| t.kind() == "map_type"),
            (SourceLanguage::Go, _) => at_module_level && self.text(node).contains("map["),
            (SourceLanguage::Rust, "field_declaration") => {
                let ty = self.field_text(node, "type").unwrap_or("");
                RUST_STORES.iter().any(|s| ty.contains(s))
            }
            (SourceLanguage::Rust, _) => {
                let text = self.text(node);
                RUST_STORES.iter().any(|s| text.contains(s))
            }
        }
    }

    fn is_python_collection(&self, value: Node<'_>) -> bool {
        match value.kind() {
            "dictionary" | "list" | "set" | "dictionary_comprehension" | "list_comprehension"
            | "set_comprehension" => true,
            "call" => self
                .field_text(value, "function")
                .is_some_and(|f| PYTHON_COLLECTIONS.contains(&f)),
            _ => false,
        }
    }

    fn is_ts_collection(&self, value: Node<'_>) -> bool {
        match value.kind() {
            "array" => true,
            "new_expression" => self
                .field_text(value, "constructor")
                .is_some_and(|c| TS_COLLECTIONS.contains(&c)),
            _ => false,
        }
    }
}

/// `@app.get("/x")` → `get`, `#[derive(Debug)]` → `derive`
fn annotation_name(text: &str) -> &str {
    let trimmed = text
        .trim()
        .trim_start_matches("#!")
        .trim_start_matches('#')
        .trim_start_matches('[')
        .trim_start_matches('@')
        .trim_end_matches(']');
    let head = trimmed.split('(').next().unwrap_or("").trim();
    let last = head.rsplit("::").next().unwrap_or(head);
    last.rsplit('.').next().unwrap_or(last).trim()
}

fn strip_generics(name: &str) -> String {
    name.split('<').next().unwrap_or(name).trim().to_string()
}

fn imports_module(import: &str, module: &str) -> bool {
    import
        .split(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | '\'' | '"' | '(' | ')' | '{'))
        .any(|token| {
            token == module
                || token
                    .strip_prefix(module)
                    .is_some_and(|rest| rest.starts_with(['.', '/', ':']))
        })
}
