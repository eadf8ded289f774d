use anyhow::Result;
use std::fs;
use std::process::Command;
use tempfile::TempDir;

const UNSORTED_FASTQ: &str = "@b\nTTT\n+\nIII\n@a\nAAA\n+\nIII\n@c\nCCC\n+\nIII\n";

fn fastq_sort() -> Command {
    Command::new(env!("CARGO_BIN_EXE_fastq-sort"))
}

#[test]
fn test_cli_sorts_and_keeps_stdout_empty() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let input = temp_dir.path().join("reads.fastq");
    let output = temp_dir.path().join("sorted.fastq");
    fs::write(&input, UNSORTED_FASTQ)?;

    let result = fastq_sort().arg(&input).arg("-o").arg(&output).output()?;

    assert!(result.status.success(), "stderr: {}", String::from_utf8_lossy(&result.stderr));
    assert!(result.stdout.is_empty());
    assert_eq!(
        fs::read_to_string(&output)?,
        "@a\nAAA\n+\nIII\n@c\nCCC\n+\nIII\n@b\nTTT\n+\nIII\n"
    );
    assert!(temp_dir.path().join("sorted.fastq0").exists());
    Ok(())
}

#[test]
fn test_cli_temp_dir_and_config() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let input = temp_dir.path().join("reads.fastq");
    let output = temp_dir.path().join("sorted.fastq");
    let staging = temp_dir.path().join("tmp");
    let config = temp_dir.path().join("config.json");
    fs::write(&input, UNSORTED_FASTQ)?;
    fs::write(&config, r#"{ "max_records": 1 }"#)?;

    let result = fastq_sort()
        .arg(&input)
        .arg("--output")
        .arg(&output)
        .arg("--temp-dir")
        .arg(&staging)
        .arg("--config")
        .arg(&config)
        .output()?;

    assert!(result.status.success(), "stderr: {}", String::from_utf8_lossy(&result.stderr));
    for index in 0..3 {
        assert!(staging.join(format!("sorted.fastq{}", index)).exists());
    }
    assert!(!temp_dir.path().join("sorted.fastq0").exists());
    Ok(())
}

#[test]
fn test_cli_missing_input_fails() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let output = temp_dir.path().join("sorted.fastq");

    let result = fastq_sort()
        .arg(temp_dir.path().join("absent.fastq"))
        .arg("-o")
        .arg(&output)
        .output()?;

    assert!(!result.status.success());
    assert!(!output.exists());
    Ok(())
}

#[test]
fn test_cli_requires_output() -> Result<()> {
    let result = fastq_sort().arg("reads.fastq").output()?;
    assert!(!result.status.success());
    Ok(())
}
