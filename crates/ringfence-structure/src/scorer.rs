//! Structure compliance scoring
//!
//! Compares a [`DirectoryTree`] against an [`ExpectedLayout`] and produces
//! the violations, a 0-100 compliance score and the [`RefactorPlan`] that
//! would resolve them.
//!
//! # Rules
//! - A required layer with no matching directory is a `MissingLayer`.
//! - A source file outside every layer directory whose declared symbol
//!   matches a layer's name pattern is a `MisplacedFile`.
//! - A type declared inside another type's body is a `NestedDefinition`,
//!   unless its name is allowlisted.
//! - A file that serves HTTP and holds in-memory storage, or declares types
//!   belonging to two layers, is a `MixedConcern`.
//!
//! Scoring is pure: the same inputs always give the same report.

use crate::declarations::{inspect, FileDeclarations, SourceLanguage};
use crate::layout::{ExpectedLayout, LayerSpec};
use crate::plan::{Extraction, FileMove, RefactorPlan};
use crate::tree::DirectoryTree;
use crate::violation::{Severity, SeverityWeights, Violation, ViolationKind};
use ringfence_scope::ScopePath;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

const TEST_DIRS: &[&str] = &["test", "tests", "__tests__", "spec", "testdata"];

/// Scoring configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Penalty per severity
    pub weights: SeverityWeights,
    /// Severity to use instead of a kind's default
    pub severity_overrides: BTreeMap<ViolationKind, Severity>,
}

impl ScoringConfig {
    /// With weights
    #[inline]
    #[must_use]
    pub fn with_weights(mut self, weights: SeverityWeights) -> Self {
        self.weights = weights;
        self
    }

    /// With a severity override
    #[inline]
    #[must_use]
    pub fn with_override(mut self, kind: ViolationKind, severity: Severity) -> Self {
        self.severity_overrides.insert(kind, severity);
        self
    }

    /// Severity for a kind
    #[must_use]
    pub fn severity_of(&self, kind: ViolationKind) -> Severity {
        self.severity_overrides
            .get(&kind)
            .copied()
            .unwrap_or_else(|| kind.default_severity())
    }
}

/// Result of one scoring run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceReport {
    /// Violations sorted by kind, location, message
    pub violations: Vec<Violation>,
    /// 0-100, higher is better
    pub score: u8,
    /// Steps that resolve the violations
    pub plan: RefactorPlan,
    /// Layer name → directory it was found in
    pub present_layers: BTreeMap<String, ScopePath>,
}

impl ComplianceReport {
    /// Whether any violation is critical
    #[must_use]
    pub fn has_critical(&self) -> bool {
        self.violations.iter().any(Violation::is_critical)
    }

    /// Whether the workflow should detour through refactor planning
    ///
    /// True when a violation is critical or the score is below `min_score`.
    #[must_use]
    pub fn needs_clarification(&self, min_score: Option<u8>) -> bool {
        needs_clarification(&self.violations, self.score, min_score)
    }
}

/// Routing decision after structure validation
#[must_use]
pub fn needs_clarification(violations: &[Violation], score: u8, min_score: Option<u8>) -> bool {
    violations.iter().any(Violation::is_critical) || min_score.is_some_and(|min| score < min)
}

/// Clamp `100 - penalty` into `0..=100`
#[must_use]
pub fn clamp_score(penalty: u64) -> u8 {
    u8::try_from(100u64.saturating_sub(penalty)).unwrap_or(0)
}

/// Scores codebases against expected layouts
#[derive(Debug, Clone, Default)]
pub struct StructureComplianceScorer {
    config: ScoringConfig,
}

impl StructureComplianceScorer {
    /// Create scorer
    #[must_use]
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Configuration in effect
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Score a tree against a layout
    #[must_use]
    pub fn score(&self, layout: &ExpectedLayout, tree: &DirectoryTree) -> ComplianceReport {
        let mut run = ScoringRun::new(layout, tree);
        run.check_layers();
        run.check_files();

        let mut violations = run.violations;
        for v in &mut violations {
            v.severity = self.config.severity_of(v.kind);
        }
        violations.sort_by(|a, b| {
            (a.kind, &a.location, &a.message).cmp(&(b.kind, &b.location, &b.message))
        });
        violations.dedup();

        let penalty: u64 = violations
            .iter()
            .map(|v| u64::from(self.config.weights.weight(v.severity)))
            .sum();
        let score = clamp_score(penalty);

        let mut plan = run.plan;
        plan.normalize();

        tracing::info!(
            platform = %layout.platform,
            violations = violations.len(),
            score,
            plan_steps = plan.len(),
            "structure scored"
        );

        ComplianceReport {
            violations,
            score,
            plan,
            present_layers: run.present,
        }
    }
}

struct ScoringRun<'a> {
    layout: &'a ExpectedLayout,
    tree: &'a DirectoryTree,
    /// Layer name → canonical directory
    present: BTreeMap<String, ScopePath>,
    /// Layer name → directory a missing layer should be created at
    planned: BTreeMap<String, ScopePath>,
    violations: Vec<Violation>,
    plan: RefactorPlan,
}

impl<'a> ScoringRun<'a> {
    fn new(layout: &'a ExpectedLayout, tree: &'a DirectoryTree) -> Self {
        Self {
            layout,
            tree,
            present: BTreeMap::new(),
            planned: BTreeMap::new(),
            violations: Vec::new(),
            plan: RefactorPlan::default(),
        }
    }

    fn check_layers(&mut self) {
        let source_root = self.layout.source_root_path();

        for layer in &self.layout.layers {
            let found = self
                .tree
                .directories()
                .iter()
                .filter(|dir| source_root.is_prefix_of(dir))
                .filter(|dir| dir.file_name().is_some_and(|n| layer.matches_directory(n)))
                .filter(|dir| !is_test_path(dir))
                .min_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
            if let Some(dir) = found {
                self.present.insert(layer.name.clone(), dir.clone());
            }
        }

        let base = self
            .layout
            .layers
            .iter()
            .find_map(|l| self.present.get(&l.name))
            .and_then(ScopePath::parent)
            .unwrap_or(source_root);

        for layer in self.layout.required_layers() {
            if self.present.contains_key(&layer.name) {
                continue;
            }
            let planned = base.child(layer.primary_directory());
            self.violations.push(
                Violation::new(
                    ViolationKind::MissingLayer,
                    format!(
                        "required layer '{}' is missing (expected a '{}' directory)",
                        layer.name,
                        layer.primary_directory()
                    ),
                )
                .at(planned.clone()),
            );
            self.plan.directories_to_create.insert(planned.clone());
            self.planned.insert(layer.name.clone(), planned);
        }
    }

    fn layer_dir(&self, layer: &LayerSpec) -> ScopePath {
        self.present
            .get(&layer.name)
            .or_else(|| self.planned.get(&layer.name))
            .cloned()
            .unwrap_or_else(|| {
                self.layout
                    .source_root_path()
                    .child(layer.primary_directory())
            })
    }

    fn enclosing_layer(&self, file: &ScopePath) -> Option<&'a LayerSpec> {
        let dirs = &file.segments()[..file.len().saturating_sub(1)];
        dirs.iter()
            .rev()
            .find_map(|name| self.layout.layer_for_directory(name))
    }

    fn check_files(&mut self) {
        let tree = self.tree;
        for (path, content) in tree.files() {
            if !self.layout.is_source_file(path) || is_test_path(path) {
                continue;
            }
            let declarations = content.and_then(|source| {
                let language = SourceLanguage::from_extension(path.extension()?)?;
                match inspect(source, language) {
                    Ok(decls) => Some(decls),
                    Err(err) => {
                        tracing::warn!(path = %path, error = %err, "declaration inspection failed");
                        None
                    }
                }
            });
            self.check_file(path, declarations.as_ref());
        }
    }

    fn check_file(&mut self, path: &ScopePath, decls: Option<&FileDeclarations>) {
        let stem = path.file_stem().unwrap_or_default();
        let symbol = decls.and_then(FileDeclarations::primary_type).unwrap_or(stem);

        if self.enclosing_layer(path).is_none() {
            if let Some(layer) = self.layout.layer_for_symbol(symbol) {
                let file_name = path.file_name().unwrap_or_default();
                let target = self.layer_dir(layer).child(file_name);
                self.violations.push(
                    Violation::new(
                        ViolationKind::MisplacedFile,
                        format!(
                            "{symbol} belongs in the '{}' layer but is outside every layer directory",
                            layer.name
                        ),
                    )
                    .at(path.clone()),
                );
                self.plan.moves.push(FileMove {
                    source_path: path.clone(),
                    target_path: target,
                });
            }
        }

        let Some(decls) = decls else {
            return;
        };

        let extension = path.extension().unwrap_or_default();
        for nested in decls.nested_types() {
            if self.layout.allows_nested(&nested.name) {
                continue;
            }
            let parent = nested.parent.as_deref().unwrap_or_default();
            let target_dir = match self.layout.layer_for_symbol(&nested.name) {
                Some(layer) => self.layer_dir(layer),
                None => path.parent().unwrap_or_else(|| ScopePath::parse("")),
            };
            let target = target_dir.child(&format!("{}.{extension}", nested.name));
            self.violations.push(
                Violation::new(
                    ViolationKind::NestedDefinition,
                    format!(
                        "{} is declared inside {parent} (line {})",
                        nested.name, nested.line
                    ),
                )
                .at(path.clone()),
            );
            self.plan.extractions.push(Extraction {
                source_path: path.clone(),
                symbol_name: nested.name.clone(),
                target_path: target,
            });
        }

        let layers: BTreeSet<&str> = decls
            .top_level_types()
            .filter_map(|t| self.layout.layer_for_symbol(&t.name))
            .map(|l| l.name.as_str())
            .collect();

        if decls.handles_http() && decls.holds_storage() {
            self.violations.push(
                Violation::new(
                    ViolationKind::MixedConcern,
                    format!("{symbol} handles HTTP requests and also keeps data in memory"),
                )
                .at(path.clone()),
            );
        } else if layers.len() > 1 {
            let names: Vec<&str> = layers.into_iter().collect();
            self.violations.push(
                Violation::new(
                    ViolationKind::MixedConcern,
                    format!("declares types of several layers: {}", names.join(", ")),
                )
                .at(path.clone()),
            );
        }
    }
}

fn is_test_path(path: &ScopePath) -> bool {
    let segments = path.segments();
    if segments
        .iter()
        .take(segments.len().saturating_sub(1))
        .any(|s| TEST_DIRS.contains(&s.to_ascii_lowercase().as_str()))
    {
        return true;
    }
    if TEST_DIRS.contains(&path.file_name().unwrap_or_default()) && path.extension().is_none() {
        return true;
    }
    let stem = path.file_stem().unwrap_or_default();
    stem.starts_with("test_")
        || stem.ends_with("_test")
        || stem.ends_with(".test")
        || stem.ends_with(".spec")
        || (stem.ends_with("Test") && path.extension() == Some("java"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn java() -> ExpectedLayout {
        ExpectedLayout::builtin("java-spring").unwrap()
    }

    fn full_java_tree() -> DirectoryTree {
        DirectoryTree::new("/repo")
            .with_file("src/controller/OrderController.java", "public class OrderController {}")
            .with_file("src/service/OrderService.java", "public class OrderService {}")
            .with_file("src/repository/OrderRepository.java", "public interface OrderRepository {}")
            .with_file("src/model/Order.java", "public class Order {}")
            .with_file("src/dto/OrderDto.java", "public record OrderDto(long id) {}")
    }

    #[test]
    fn compliant_tree_scores_100() {
        let report = StructureComplianceScorer::default().score(&java(), &full_java_tree());
        assert!(report.violations.is_empty(), "{:?}", report.violations);
        assert_eq!(report.score, 100);
        assert!(report.plan.is_empty());
        assert_eq!(report.present_layers.len(), 5);
    }

    #[test]
    fn missing_layer_is_planned_beside_present_layers() {
        let tree = DirectoryTree::new("/repo")
            .with_file("src/main/java/controller/OrderController.java", "class OrderController {}")
            .with_file("src/main/java/service/OrderService.java", "class OrderService {}")
            .with_file("src/main/java/repository/OrderRepository.java", "interface OrderRepository {}")
            .with_file("src/main/java/model/Order.java", "class Order {}");
        let report = StructureComplianceScorer::default().score(&java(), &tree);
        assert_eq!(report.violations.len(), 1);
        assert_eq!(report.violations[0].kind, ViolationKind::MissingLayer);
        assert_eq!(report.score, 85);
        assert!(report
            .plan
            .directories_to_create
            .contains(&ScopePath::parse("src/main/java/dto")));
    }

    #[test]
    fn misplaced_file_is_moved_into_its_layer() {
        let tree = full_java_tree().with_file("src/OrderHelperService.java", "class OrderHelperService {}");
        let report = StructureComplianceScorer::default().score(&java(), &tree);
        assert_eq!(report.violations.len(), 1);
        assert_eq!(report.violations[0].kind, ViolationKind::MisplacedFile);
        assert_eq!(
            report.plan.moves,
            vec![FileMove {
                source_path: ScopePath::parse("src/OrderHelperService.java"),
                target_path: ScopePath::parse("src/service/OrderHelperService.java"),
            }]
        );
    }

    #[test]
    fn nested_type_is_extracted_to_implied_layer() {
        let tree = full_java_tree().with_file(
            "src/controller/OrderController.java",
            "public class OrderController { static class CreateOrderRequest {} }",
        );
        let report = StructureComplianceScorer::default().score(&java(), &tree);
        assert_eq!(report.violations.len(), 1);
        assert_eq!(report.violations[0].kind, ViolationKind::NestedDefinition);
        assert_eq!(report.score, 95);
        assert_eq!(
            report.plan.extractions[0].target_path,
            ScopePath::parse("src/dto/CreateOrderRequest.java")
        );
    }

    #[test]
    fn allowlisted_nested_types_are_ignored() {
        let tree = full_java_tree().with_file(
            "src/model/Order.java",
            "public class Order { public static class Builder {} }",
        );
        let report = StructureComplianceScorer::default().score(&java(), &tree);
        assert!(report.violations.is_empty());
    }

    #[test]
    fn controller_with_in_memory_store_is_mixed_concern() {
        let tree = full_java_tree().with_file(
            "src/controller/OrderController.java",
            r#"
@RestController
public class OrderController {
    private final Map<Long, Order> store = new HashMap<>();
}
"#,
        );
        let report = StructureComplianceScorer::default().score(&java(), &tree);
        assert_eq!(report.violations.len(), 1);
        assert_eq!(report.violations[0].kind, ViolationKind::MixedConcern);
        assert_eq!(report.violations[0].severity, Severity::High);
    }

    #[test]
    fn two_layers_in_one_file_is_mixed_concern() {
        let tree = full_java_tree().with_file(
            "src/service/OrderService.java",
            "class OrderService {}\nclass OrderRepositoryImpl {}\ninterface OrderDao {}",
        );
        let report = StructureComplianceScorer::default().score(&java(), &tree);
        assert!(report
            .violations
            .iter()
            .any(|v| v.kind == ViolationKind::MixedConcern));
    }

    #[test]
    fn overrides_can_raise_severity_to_critical() {
        let config = ScoringConfig::default().with_override(ViolationKind::MissingLayer, Severity::Critical);
        let tree = DirectoryTree::new("/repo").with_directory("src");
        let report = StructureComplianceScorer::new(config).score(&java(), &tree);
        assert!(report.has_critical());
        assert!(report.needs_clarification(None));
        assert_eq!(report.score, 0);
    }

    #[test]
    fn routing_is_a_function_of_violations_and_score() {
        assert!(!needs_clarification(&[], 100, None));
        assert!(needs_clarification(&[], 40, Some(50)));
        assert!(!needs_clarification(&[], 50, Some(50)));
        let critical = Violation::new(ViolationKind::MixedConcern, "x").with_severity(Severity::Critical);
        assert!(needs_clarification(&[critical], 100, None));
    }

    #[test]
    fn test_files_are_not_scored() {
        let tree = full_java_tree()
            .with_file("src/test/java/OrderServiceTest.java", "class OrderServiceTest { class Inner {} }")
            .with_file("OrderControllerTest.java", "class OrderControllerTest {}");
        let report = StructureComplianceScorer::default().score(&java(), &tree);
        assert!(report.violations.is_empty());
    }

    #[test]
    fn clamp_bounds() {
        assert_eq!(clamp_score(0), 100);
        assert_eq!(clamp_score(80), 20);
        assert_eq!(clamp_score(1000), 0);
    }
}
