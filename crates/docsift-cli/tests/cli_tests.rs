use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn test_help_lists_subcommands() {
    Command::cargo_bin("docsift")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("build-index"))
        .stdout(predicate::str::contains("process"))
        .stdout(predicate::str::contains("preprocess"));
}

#[test]
fn test_config_show_prints_defaults() {
    Command::cargo_bin("docsift")
        .unwrap()
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("document_types"))
        .stdout(predicate::str::contains("phi3:mini"));
}

#[test]
fn test_process_missing_input_fails() {
    Command::cargo_bin("docsift")
        .unwrap()
        .args(["process", "does_not_exist.pdf"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Input file not found"));
}

#[test]
fn test_preprocess_writes_all_variants() {
    let dir = tempfile::TempDir::new().unwrap();
    let input = dir.path().join("scan.png");
    let output_dir = dir.path().join("variants");

    let img = image::DynamicImage::ImageLuma8(image::GrayImage::from_pixel(
        16,
        16,
        image::Luma([220]),
    ));
    img.save_with_format(&input, image::ImageFormat::Png).unwrap();

    Command::cargo_bin("docsift")
        .unwrap()
        .args([
            "preprocess",
            input.to_str().unwrap(),
            "--output-dir",
            output_dir.to_str().unwrap(),
        ])
        .assert()
        .success();

    for label in ["none", "denoise", "threshold", "deskew"] {
        assert!(
            output_dir.join(format!("scan_{}.png", label)).exists(),
            "missing {} variant",
            label
        );
    }
}
