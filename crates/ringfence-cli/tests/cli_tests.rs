//! Command-line tests

use clap::Parser;
use pretty_assertions::assert_eq;
use ringfence_cli::{execute, Cli, LogFormat};
use ringfence_test_utils::TempCodebase;
use serde_json::{json, Value};

const ORDER: &str = "src/main/java/shop/model/Order.java";
const ORDER_DTO: &str = "src/main/java/shop/dto/OrderDto.java";

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("ringfence").chain(args.iter().copied())).unwrap()
}

async fn invoke(args: &[&str]) -> (bool, Value) {
    let cli = parse(args);
    let mut out = Vec::new();
    let succeeded = execute(cli, &mut out).await.unwrap();
    (succeeded, serde_json::from_slice(&out).unwrap())
}

fn path(codebase: &TempCodebase) -> String {
    codebase.path().to_string_lossy().into_owned()
}

#[test]
fn json_flag_overrides_log_format() {
    let cli = Cli::try_parse_from(["ringfence", "--json", "score", "."]).unwrap();
    assert_eq!(cli.log_format(), LogFormat::Json);
    let cli = Cli::try_parse_from(["ringfence", "score", "."]).unwrap();
    assert_eq!(cli.log_format(), LogFormat::Pretty);
}

#[test]
fn run_requires_a_transcript() {
    assert!(Cli::try_parse_from(["ringfence", "run", ".", "Add a DTO"]).is_err());
}

#[tokio::test]
async fn score_detects_the_platform() {
    let codebase = TempCodebase::java_service();
    let (passed, output) = invoke(&["score", &path(&codebase)]).await;

    assert!(passed);
    assert_eq!(output["platform"], "java-spring");
    assert_eq!(output["score"], 100);
    assert_eq!(output["files"], 5);
    assert_eq!(output["violations"], json!([]));
}

#[tokio::test]
async fn score_reports_a_missing_layer() {
    let codebase = TempCodebase::new()
        .file(
            "src/main/java/shop/controller/OrderController.java",
            "public class OrderController { }",
        )
        .file(
            "src/main/java/shop/service/OrderService.java",
            "public class OrderService { }",
        )
        .file(
            "src/main/java/shop/repository/OrderRepository.java",
            "public interface OrderRepository { }",
        )
        .file(ORDER, "public class Order { private long id; }");

    let (passed, output) = invoke(&["score", &path(&codebase), "--platform", "java-spring"]).await;

    assert!(passed);
    assert_eq!(output["score"], 85);
    assert_eq!(output["violations"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn score_rejects_an_unknown_platform() {
    let codebase = TempCodebase::java_service();
    let cli = parse(&["score", &path(&codebase), "--platform", "cobol"]);
    let err = execute(cli, &mut Vec::new()).await.unwrap_err();
    assert!(err.to_string().contains("unknown platform 'cobol'"));
}

#[tokio::test]
async fn score_without_markers_fails() {
    let codebase = TempCodebase::new().file("README.md", "# shop");
    let cli = parse(&["score", &path(&codebase)]);
    assert!(execute(cli, &mut Vec::new()).await.is_err());
}

#[tokio::test]
async fn check_allows_a_sibling_of_the_target() {
    let codebase = TempCodebase::java_service();
    let sibling = codebase.abs("src/main/java/shop/model/OrderLine.java");
    let arguments = json!({ "file_path": sibling, "content": "class OrderLine {}" }).to_string();

    let (permitted, output) = invoke(&[
        "check",
        &path(&codebase),
        "Write",
        &arguments,
        "--target",
        ORDER,
    ])
    .await;

    assert!(permitted);
    assert_eq!(output["decision"], "allow");
    assert!(output["scope"].as_str().unwrap().contains("Order.java"));
}

#[tokio::test]
async fn check_rejects_an_out_of_scope_write() {
    let codebase = TempCodebase::java_service();
    let outside = codebase.abs("src/main/java/shop/controller/Backdoor.java");
    let arguments = json!({ "file_path": outside, "content": "class Backdoor {}" }).to_string();

    let (permitted, output) = invoke(&[
        "check",
        &path(&codebase),
        "Write",
        &arguments,
        "-t",
        ORDER,
    ])
    .await;

    assert!(!permitted);
    assert_eq!(output["decision"], "reject");
}

#[tokio::test]
async fn check_rejects_writes_in_read_only_phases() {
    let codebase = TempCodebase::java_service();
    let arguments = json!({ "file_path": codebase.abs(ORDER), "content": "" }).to_string();

    let (permitted, output) = invoke(&[
        "check",
        &path(&codebase),
        "Write",
        &arguments,
        "-t",
        ORDER,
        "--read-only",
    ])
    .await;

    assert!(!permitted);
    assert_eq!(output["decision"], "reject");
}

#[tokio::test]
async fn check_soft_reads_warn() {
    let codebase = TempCodebase::java_service();
    let arguments =
        json!({ "file_path": codebase.abs("src/main/java/shop/service/OrderService.java") })
            .to_string();

    let (permitted, output) = invoke(&[
        "check",
        &path(&codebase),
        "Read",
        &arguments,
        "-t",
        ORDER,
        "--reads",
        "soft",
    ])
    .await;

    assert!(permitted);
    assert_eq!(output["decision"], "warn");
}

#[tokio::test]
async fn check_rejects_malformed_arguments() {
    let cli = parse(&["check", ".", "Write", "[1, 2]"]);
    let err = execute(cli, &mut Vec::new()).await.unwrap_err();
    assert!(err.to_string().contains("JSON object"));
}

#[tokio::test]
async fn run_replays_a_transcript() {
    let codebase = TempCodebase::java_service();
    let scratch = tempfile::tempdir().unwrap();
    let transcript = scratch.path().join("transcript.json");
    std::fs::write(
        &transcript,
        json!({
            "phases": {
                "produce_edits": [{
                    "message": "adding the DTO",
                    "tool_calls": [{
                        "name": "Write",
                        "arguments": {
                            "file_path": codebase.abs(ORDER_DTO),
                            "content": "public record OrderDto(long id) {}"
                        }
                    }]
                }]
            }
        })
        .to_string(),
    )
    .unwrap();

    let request = format!("Add {ORDER_DTO} mirroring {ORDER}");
    let (succeeded, report) = invoke(&[
        "run",
        &path(&codebase),
        &request,
        "--transcript",
        &transcript.to_string_lossy(),
    ])
    .await;

    assert!(succeeded, "{report:#}");
    assert_eq!(report["status"], "success");
    assert_eq!(report["compliance_score"], 100);
    assert_eq!(report["patches"].as_array().map(Vec::len), Some(1));
    assert_eq!(
        codebase.read(ORDER_DTO).as_deref(),
        Some("public record OrderDto(long id) {}")
    );
}

#[tokio::test]
async fn run_reads_a_config_file() {
    let codebase = TempCodebase::java_service();
    let scratch = tempfile::tempdir().unwrap();
    let transcript = scratch.path().join("transcript.json");
    std::fs::write(&transcript, r#"{"phases": {}}"#).unwrap();
    let config = scratch.path().join("ringfence.toml");
    std::fs::write(&config, "max_turns = 0\n").unwrap();

    let cli = parse(&[
        "run",
        &path(&codebase),
        "Add a DTO",
        "--transcript",
        &transcript.to_string_lossy(),
        "--config",
        &config.to_string_lossy(),
    ]);
    let err = execute(cli, &mut Vec::new()).await.unwrap_err();
    assert!(format!("{err:#}").contains("max_turns"));
}

#[tokio::test]
async fn run_rejects_unknown_transcript_phases() {
    let codebase = TempCodebase::java_service();
    let scratch = tempfile::tempdir().unwrap();
    let transcript = scratch.path().join("transcript.json");
    std::fs::write(&transcript, r#"{"phases": {"deploy": []}}"#).unwrap();

    let cli = parse(&[
        "run",
        &path(&codebase),
        "Add a DTO",
        "--transcript",
        &transcript.to_string_lossy(),
    ]);
    let err = execute(cli, &mut Vec::new()).await.unwrap_err();
    assert!(format!("{err:#}").contains("unknown phase 'deploy'"));
}
