use pretty_assertions::assert_eq;
use proptest::prelude::*;
use ringfence_scope::{ScopePath, ScopePolicy};

const ROOT: &str = "/ringfence-fixture/repo";

fn segment() -> impl Strategy<Value = String> {
    "[a-z]{1,8}"
}

fn file_path() -> impl Strategy<Value = String> {
    (prop::collection::vec(segment(), 1..4), segment())
        .prop_map(|(dirs, stem)| format!("{ROOT}/{}/{stem}.java", dirs.join("/")))
}

#[test]
fn order_scenario() {
    let policy = ScopePolicy::build("/repo", &["/repo/src/model/Order.java"]);
    assert!(policy.is_allowed("/repo/src/model/Order.java"));
    assert!(policy.is_allowed("/repo/src/model/NewDto.java"));
    assert!(!policy.is_allowed("/repo/src/controller/Other.java"));
}

#[test]
fn existing_directory_with_dotted_name_is_a_directory() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("conf.d")).unwrap();
    std::fs::write(dir.path().join("Makefile"), "all:\n").unwrap();

    let policy = ScopePolicy::build(dir.path(), &["conf.d", "Makefile"]);
    let root = ScopePath::from_path(dir.path());

    assert!(policy.directories().contains(&root.child("conf.d")));
    assert!(policy.files().contains(&root.child("Makefile")));
    assert!(policy.is_allowed("conf.d/extra.conf"));
    assert!(policy.is_allowed("Makefile"));
    assert!(policy.is_allowed("NewFile.txt"));
}

#[test]
fn missing_target_is_still_included() {
    let dir = tempfile::tempdir().unwrap();
    let policy = ScopePolicy::build(dir.path(), &["src/dto/OrderDto.java"]);
    assert!(policy.is_allowed("src/dto/OrderDto.java"));
    assert!(policy.is_allowed("src/dto/OrderSummaryDto.java"));
    assert!(!policy.is_allowed("src/OrderDto.java"));
}

#[test]
fn missing_extensionless_target_is_a_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("deploy")).unwrap();

    let policy = ScopePolicy::build(dir.path(), &["deploy/Dockerfile"]);
    let root = ScopePath::from_path(dir.path());

    assert!(policy.files().contains(&root.child("deploy").child("Dockerfile")));
    assert!(policy.is_allowed("deploy/Dockerfile"));
    assert!(policy.is_allowed("deploy/compose.yml"));
    assert!(!policy.is_allowed("Makefile"));
}

proptest! {
    #[test]
    fn prop_target_file_and_siblings_are_allowed(target in file_path(), sibling in segment()) {
        let policy = ScopePolicy::build(ROOT, &[target.clone()]);
        prop_assert!(policy.is_allowed(&target));

        let parent = ScopePath::parse(&target).parent().unwrap();
        let sibling_path = parent.child(&format!("{sibling}.java"));
        prop_assert!(policy.is_allowed(&sibling_path.to_string()));
    }

    #[test]
    fn prop_empty_policy_rejects_everything(candidate in "[a-z/.]{0,40}") {
        let policy = ScopePolicy::build(ROOT, &Vec::<String>::new());
        prop_assert!(!policy.is_allowed(&candidate));
        let rooted = format!("{ROOT}/{candidate}");
        prop_assert!(!policy.is_allowed(&rooted));
    }

    #[test]
    fn prop_target_order_does_not_matter(
        (targets, shuffled) in prop::collection::vec(file_path(), 1..6)
            .prop_flat_map(|v| (Just(v.clone()), Just(v).prop_shuffle())),
        candidate in file_path(),
    ) {
        let a = ScopePolicy::build(ROOT, &targets);
        let b = ScopePolicy::build(ROOT, &shuffled);
        assert_eq!(&a, &b);
        prop_assert_eq!(a.is_allowed(&candidate), b.is_allowed(&candidate));
        prop_assert_eq!(a.summary(), b.summary());
    }

    #[test]
    fn prop_paths_outside_root_are_rejected(target in file_path(), other in file_path()) {
        let policy = ScopePolicy::build(ROOT, &[target]);
        let outside = other.replacen(ROOT, "/elsewhere", 1);
        prop_assert!(!policy.is_allowed(&outside));
    }
}
