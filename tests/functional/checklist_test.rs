//! Functional tests for the smoke checklist

use magic_quill_client::backend::traits::GenerationParams;
use magic_quill_client::checklist::{CheckStatus, Checklist, ChecklistReport};
use magic_quill_client::config::ChecklistConfig;
use serde_json::json;
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::support::{backend, png_header, png_uri};

fn sample_file(width: u32, height: u32) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&png_header(width, height)).unwrap();
    file
}

async fn mount_guess_prompt(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/magic_quill/guess_prompt"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!("a house, garden")))
        .mount(server)
        .await;
}

async fn mount_background(server: &MockServer, width: u32, height: u32) {
    Mock::given(method("POST"))
        .and(path("/magic_quill/process_background_img"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!(png_uri(width, height).as_str())),
        )
        .mount(server)
        .await;
}

async fn run(server: &MockServer, config: ChecklistConfig) -> ChecklistReport {
    Checklist::new(Arc::new(backend(server)), config, GenerationParams::default())
        .run()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_checklist_passes_for_each_documented_resolution() {
    let sample = sample_file(1600, 1200);

    for target in [256u32, 512, 1024] {
        let server = MockServer::start().await;
        mount_guess_prompt(&server).await;
        mount_background(&server, target, target * 3 / 4).await;

        let config = ChecklistConfig {
            sample_image: Some(sample.path().to_string_lossy().to_string()),
            target_resolution: target,
            ..Default::default()
        };
        let report = run(&server, config).await;

        assert!(report.is_success(), "target {}: {:?}", target, report.outcomes);
        assert_eq!(report.passed(), 3);
        assert_eq!(report.skipped(), 2);
        assert_eq!(
            report.outcome("background_resize").unwrap().status,
            CheckStatus::Passed
        );
    }
}

#[tokio::test]
async fn test_checklist_flags_wrong_resolution() {
    let sample = sample_file(1600, 1200);
    let server = MockServer::start().await;
    mount_guess_prompt(&server).await;
    mount_background(&server, 512, 384).await;

    let config = ChecklistConfig {
        sample_image: Some(sample.path().to_string_lossy().to_string()),
        target_resolution: 1024,
        ..Default::default()
    };
    let report = run(&server, config).await;

    assert!(!report.is_success());
    let outcome = report.outcome("background_resize").unwrap();
    assert_eq!(outcome.status, CheckStatus::Failed);
    assert!(outcome.detail.contains("1024"));
}

#[tokio::test]
async fn test_checklist_records_backend_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/magic_quill/guess_prompt"))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .mount(&server)
        .await;
    mount_background(&server, 512, 512).await;

    let report = run(&server, ChecklistConfig::default()).await;

    assert_eq!(report.failed(), 2);
    assert_eq!(
        report.outcome("guess_prompt_minimal").unwrap().status,
        CheckStatus::Failed
    );
    assert!(report
        .outcome("guess_prompt_full")
        .unwrap()
        .detail
        .contains("503"));
    // builtin 1x1 sample scales to a 512x512 square
    assert_eq!(
        report.outcome("background_resize").unwrap().status,
        CheckStatus::Passed
    );
}

#[tokio::test]
async fn test_checklist_generate_seed_checks() {
    let server = MockServer::start().await;
    mount_guess_prompt(&server).await;
    mount_background(&server, 512, 512).await;

    let fixed_image = png_uri(512, 512);
    Mock::given(method("POST"))
        .and(path("/magic_quill/generate"))
        .and(body_partial_json(json!({ "params": { "seed": 42 } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "generated_image": fixed_image.as_str(),
            "seed": 42
        })))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/magic_quill/generate"))
        .and(body_partial_json(json!({ "params": { "seed": -1 } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "generated_image": fixed_image.as_str(),
            "seed": 3141592
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = ChecklistConfig {
        include_generate: true,
        ..Default::default()
    };
    let report = run(&server, config).await;

    assert!(report.is_success(), "{:?}", report.outcomes);
    assert_eq!(report.passed(), 5);
    assert!(report
        .outcome("generate_random_seed")
        .unwrap()
        .detail
        .contains("3141592"));
}

#[tokio::test]
async fn test_checklist_detects_ignored_seed() {
    let server = MockServer::start().await;
    mount_guess_prompt(&server).await;
    mount_background(&server, 512, 512).await;

    // Backend that ignores the requested seed and echoes -1 back
    Mock::given(method("POST"))
        .and(path("/magic_quill/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "generated_image": png_uri(512, 512).as_str(),
            "seed": -1
        })))
        .mount(&server)
        .await;

    let config = ChecklistConfig {
        include_generate: true,
        ..Default::default()
    };
    let report = run(&server, config).await;

    assert_eq!(
        report.outcome("generate_fixed_seed_deterministic").unwrap().status,
        CheckStatus::Failed
    );
    assert_eq!(
        report.outcome("generate_random_seed").unwrap().status,
        CheckStatus::Failed
    );
}

#[tokio::test]
async fn test_checklist_missing_sample_image_is_error() {
    let server = MockServer::start().await;
    let config = ChecklistConfig {
        sample_image: Some("/no/such/sample.png".to_string()),
        ..Default::default()
    };

    let result = Checklist::new(Arc::new(backend(&server)), config, GenerationParams::default())
        .run()
        .await;
    assert!(result.is_err());
}
