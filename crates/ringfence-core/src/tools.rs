//! Workspace file tools
//!
//! [`WorkspaceTools`] serves list/read/search/create/edit calls against the
//! codebase. Mutations go to an in-memory staging overlay instead of disk;
//! reads and searches see staged content. Every successful mutation yields
//! a [`Patch`] carrying the full resulting file.

use crate::backend::{ToolExecutor, ToolOutcome, ToolRequest};
use crate::patch::{Patch, PatchOperation};
use async_trait::async_trait;
use ignore::WalkBuilder;
use parking_lot::Mutex;
use regex::Regex;
use ringfence_guard::extract::{extract_payload, extract_string};
use ringfence_guard::{ToolCall, ToolKind};
use ringfence_scope::ScopePath;
use std::collections::{BTreeMap, BTreeSet};
use std::io::ErrorKind;

const PATTERN_KEYS: &[&str] = &["pattern", "query", "regex"];
const OLD_TEXT_KEYS: &[&str] = &["old_string", "old_str", "search"];

/// File tools with a staging overlay
#[derive(Debug)]
pub struct WorkspaceTools {
    overlay: Mutex<BTreeMap<ScopePath, String>>,
    max_results: usize,
}

impl Default for WorkspaceTools {
    fn default() -> Self {
        Self {
            overlay: Mutex::new(BTreeMap::new()),
            max_results: 200,
        }
    }
}

impl WorkspaceTools {
    /// Create tools with an empty overlay
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With a cap on search hits
    #[inline]
    #[must_use]
    pub fn with_max_results(mut self, max: usize) -> Self {
        self.max_results = max;
        self
    }

    /// Staged content of `path`
    #[must_use]
    pub fn staged(&self, path: &ScopePath) -> Option<String> {
        self.overlay.lock().get(path).cloned()
    }

    /// Number of staged files
    #[must_use]
    pub fn staged_count(&self) -> usize {
        self.overlay.lock().len()
    }

    async fn current(&self, path: &ScopePath) -> std::io::Result<Option<String>> {
        let staged = self.overlay.lock().get(path).cloned();
        if staged.is_some() {
            return Ok(staged);
        }
        match tokio::fs::read_to_string(path.to_path_buf()).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn list(&self, dir: &ScopePath) -> ToolOutcome {
        let mut names = BTreeSet::new();
        let mut exists = false;

        match tokio::fs::read_dir(dir.to_path_buf()).await {
            Ok(mut entries) => {
                exists = true;
                while let Ok(Some(entry)) = entries.next_entry().await {
                    let name = entry.file_name().to_string_lossy().into_owned();
                    let is_dir = entry.file_type().await.is_ok_and(|t| t.is_dir());
                    names.insert(if is_dir { format!("{name}/") } else { name });
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return ToolOutcome::failure(format!("cannot list {dir}: {e}")),
        }

        for staged in self.overlay.lock().keys() {
            let Ok(rel) = staged.relative_to(dir) else {
                continue;
            };
            match rel.segments() {
                [] => {}
                [file] => {
                    names.insert(file.clone());
                }
                [first, ..] => {
                    names.insert(format!("{first}/"));
                }
            }
            exists = true;
        }

        if !exists {
            return ToolOutcome::failure(format!("{dir} does not exist"));
        }
        ToolOutcome::ok(names.into_iter().collect::<Vec<_>>().join("\n"))
    }

    async fn read(&self, path: &ScopePath) -> ToolOutcome {
        match self.current(path).await {
            Ok(Some(content)) => ToolOutcome::ok(content),
            Ok(None) => ToolOutcome::failure(format!("{path} does not exist")),
            Err(e) => ToolOutcome::failure(format!("cannot read {path}: {e}")),
        }
    }

    async fn search(&self, call: &ToolCall, scope: &ScopePath, root: &ScopePath) -> ToolOutcome {
        let Some(pattern) = extract_string(&call.arguments, PATTERN_KEYS) else {
            return ToolOutcome::failure("search needs a `pattern` argument");
        };
        let regex = match Regex::new(&pattern) {
            Ok(regex) => regex,
            Err(e) => return ToolOutcome::failure(format!("invalid pattern: {e}")),
        };

        let overlay = self.overlay.lock().clone();
        let scope = scope.clone();
        let root = root.clone();
        let limit = self.max_results;
        let search = tokio::task::spawn_blocking(move || {
            search_files(&regex, &scope, &root, &overlay, limit)
        });
        match search.await {
            Ok(hits) if hits.is_empty() => ToolOutcome::ok("no matches"),
            Ok(hits) => ToolOutcome::ok(hits.join("\n")),
            Err(e) => ToolOutcome::failure(format!("search aborted: {e}")),
        }
    }

    fn create(&self, call: &ToolCall, path: &ScopePath) -> ToolOutcome {
        let Some(content) = extract_payload(&call.arguments) else {
            return ToolOutcome::failure(format!("{} needs content", call.name));
        };
        self.stage(PatchOperation::Create, path, content)
    }

    async fn edit(&self, call: &ToolCall, path: &ScopePath) -> ToolOutcome {
        let Some(replacement) = extract_payload(&call.arguments) else {
            return ToolOutcome::failure(format!("{} needs new content", call.name));
        };
        let current = match self.current(path).await {
            Ok(current) => current,
            Err(e) => return ToolOutcome::failure(format!("cannot read {path}: {e}")),
        };

        let old = extract_string(&call.arguments, OLD_TEXT_KEYS).filter(|s| !s.is_empty());
        let Some(old) = old else {
            let operation = if current.is_some() {
                PatchOperation::Edit
            } else {
                PatchOperation::Create
            };
            return self.stage(operation, path, replacement);
        };

        let Some(current) = current else {
            return ToolOutcome::failure(format!("{path} does not exist"));
        };
        if !current.contains(&old) {
            return ToolOutcome::failure(format!("old text not found in {path}"));
        }
        let replace_all = call
            .arguments
            .get("replace_all")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false);
        let updated = if replace_all {
            current.replace(&old, &replacement)
        } else {
            current.replacen(&old, &replacement, 1)
        };
        self.stage(PatchOperation::Edit, path, updated)
    }

    fn stage(&self, operation: PatchOperation, path: &ScopePath, content: String) -> ToolOutcome {
        let patch = Patch::new(operation, path.clone(), content);
        self.overlay.lock().insert(path.clone(), patch.payload.clone());
        tracing::debug!(%patch, "change staged");
        ToolOutcome::staged(format!("staged {patch}"), patch)
    }
}

#[async_trait]
impl ToolExecutor for WorkspaceTools {
    async fn execute(&self, request: ToolRequest<'_>) -> ToolOutcome {
        let call = request.call;
        if request.kind.is_mutating() && request.target.is_none() {
            return ToolOutcome::failure(format!("{} needs a target path", call.name));
        }
        let target = request.target.unwrap_or(request.root);

        match request.kind {
            ToolKind::List => self.list(target).await,
            ToolKind::Read => self.read(target).await,
            ToolKind::Search => self.search(call, target, request.root).await,
            ToolKind::Create => self.create(call, target),
            ToolKind::Edit => self.edit(call, target).await,
            ToolKind::Other => ToolOutcome::failure(format!("unsupported tool '{}'", call.name)),
        }
    }

    async fn reset(&self) {
        let discarded = {
            let mut overlay = self.overlay.lock();
            let n = overlay.len();
            overlay.clear();
            n
        };
        if discarded > 0 {
            tracing::debug!(discarded, "staging overlay cleared");
        }
    }
}

fn search_files(
    regex: &Regex,
    scope: &ScopePath,
    root: &ScopePath,
    overlay: &BTreeMap<ScopePath, String>,
    limit: usize,
) -> Vec<String> {
    let mut contents: BTreeMap<ScopePath, Option<String>> = BTreeMap::new();

    let walker = WalkBuilder::new(scope.to_path_buf())
        .hidden(true)
        .follow_links(false)
        .git_ignore(true)
        .build();
    for entry in walker.flatten() {
        if entry.file_type().is_some_and(|t| t.is_file()) {
            let path = ScopePath::from_path(entry.path());
            let content = std::fs::read_to_string(entry.path()).ok();
            contents.insert(path, content);
        }
    }
    for (path, content) in overlay {
        if scope.is_prefix_of(path) {
            contents.insert(path.clone(), Some(content.clone()));
        }
    }

    let mut hits = Vec::new();
    for (path, content) in &contents {
        let Some(content) = content else {
            continue;
        };
        let shown = path.relative_to(root).unwrap_or_else(|_| path.clone());
        for (idx, line) in content.lines().enumerate() {
            if regex.is_match(line) {
                hits.push(format!("{shown}:{}: {}", idx + 1, line.trim()));
                if hits.len() >= limit {
                    return hits;
                }
            }
        }
    }
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Fixture {
        _dir: tempfile::TempDir,
        root: ScopePath,
        tools: WorkspaceTools,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            std::fs::create_dir_all(dir.path().join("src/model")).unwrap();
            std::fs::write(
                dir.path().join("src/model/Order.java"),
                "public class Order {\n    private long id;\n}\n",
            )
            .unwrap();
            Self {
                root: ScopePath::from_path(dir.path()),
                _dir: dir,
                tools: WorkspaceTools::new(),
            }
        }

        fn path(&self, rel: &str) -> ScopePath {
            self.root.child(rel)
        }

        async fn run(&self, name: &str, args: serde_json::Value, target: Option<&ScopePath>) -> ToolOutcome {
            let call = ToolCall::new(name, args);
            self.tools
                .execute(ToolRequest {
                    call: &call,
                    kind: call.kind(),
                    target,
                    root: &self.root,
                })
                .await
        }
    }

    #[tokio::test]
    async fn writes_are_staged_not_written() {
        let fx = Fixture::new();
        let dto = fx.path("src/model/OrderDto.java");
        let outcome = fx
            .run("Write", json!({"path": "x", "content": "record OrderDto() {}"}), Some(&dto))
            .await;
        assert!(outcome.success);
        let patch = outcome.patch.unwrap();
        assert_eq!(patch.operation, PatchOperation::Create);
        assert!(!dto.to_path_buf().exists());

        let read = fx.run("Read", json!({}), Some(&dto)).await;
        assert_eq!(read.output, "record OrderDto() {}");

        let listing = fx.run("LS", json!({}), Some(&fx.path("src/model"))).await;
        assert_eq!(listing.output, "Order.java\nOrderDto.java");
    }

    #[tokio::test]
    async fn edits_replace_old_text_and_carry_full_content() {
        let fx = Fixture::new();
        let order = fx.path("src/model/Order.java");
        let outcome = fx
            .run(
                "Edit",
                json!({"old_string": "private long id;", "new_string": "private final long id;"}),
                Some(&order),
            )
            .await;
        assert!(outcome.success, "{}", outcome.output);
        let patch = outcome.patch.unwrap();
        assert_eq!(patch.operation, PatchOperation::Edit);
        assert_eq!(patch.payload, "public class Order {\n    private final long id;\n}\n");

        let missing = fx
            .run("Edit", json!({"old_string": "nope", "new_string": "x"}), Some(&order))
            .await;
        assert!(!missing.success);
        assert!(missing.patch.is_none());
    }

    #[tokio::test]
    async fn search_sees_disk_and_overlay() {
        let fx = Fixture::new();
        fx.run(
            "Write",
            json!({"content": "class Invoice { long id; }"}),
            Some(&fx.path("src/model/Invoice.java")),
        )
        .await;
        let hits = fx.run("Grep", json!({"pattern": "long id"}), None).await;
        assert_eq!(
            hits.output,
            "src/model/Invoice.java:1: class Invoice { long id; }\nsrc/model/Order.java:2: private long id;"
        );
        let bad = fx.run("Grep", json!({"pattern": "("}), None).await;
        assert!(!bad.success);
    }

    #[tokio::test]
    async fn reset_discards_the_overlay() {
        let fx = Fixture::new();
        let dto = fx.path("src/model/OrderDto.java");
        fx.run("Write", json!({"content": "x"}), Some(&dto)).await;
        assert_eq!(fx.tools.staged_count(), 1);
        fx.tools.reset().await;
        assert_eq!(fx.tools.staged(&dto), None);
    }

    #[tokio::test]
    async fn mutations_without_target_and_unknown_tools_fail() {
        let fx = Fixture::new();
        assert!(!fx.run("Write", json!({"content": "x"}), None).await.success);
        assert!(!fx.run("Bash", json!({"command": "ls"}), None).await.success);
    }
}
