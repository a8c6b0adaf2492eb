use anyhow::{Context, Result, anyhow};
use std::io::Read;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use super::TesseractConfig;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_millis(20);

pub(crate) fn probe_version(config: &TesseractConfig) -> Result<String> {
    let mut command = Command::new(&config.command);
    command.arg("--version");
    let output = run_bounded(command, PROBE_TIMEOUT)?;
    if !output.status.success() {
        return Err(anyhow!("tesseract --version failed: {}", output.stderr.trim()));
    }
    // Older builds print the banner on stderr.
    let banner = if output.stdout.trim().is_empty() {
        &output.stderr
    } else {
        &output.stdout
    };
    Ok(banner.lines().next().unwrap_or_default().trim().to_string())
}

pub(crate) fn list_languages(config: &TesseractConfig) -> Result<Vec<String>> {
    let mut command = Command::new(&config.command);
    command.arg("--list-langs");
    let output = run_bounded(command, PROBE_TIMEOUT)?;
    if !output.status.success() {
        return Err(anyhow!(
            "tesseract --list-langs failed: {}",
            output.stderr.trim()
        ));
    }
    Ok(parse_language_list(&output.stdout))
}

pub(super) fn run_tsv(
    config: &TesseractConfig,
    image: &Path,
    out_dir: &Path,
    languages: &str,
) -> Result<String> {
    let out_base = out_dir.join("result");
    let mut command = Command::new(&config.command);
    command
        .arg(image)
        .arg(&out_base)
        .arg("-l")
        .arg(languages)
        .arg("--oem")
        .arg("1")
        .arg("--psm")
        .arg(config.psm.to_string())
        .arg("--dpi")
        .arg("300")
        .arg("tsv");
    let output = run_bounded(command, config.timeout)?;
    if !output.status.success() {
        return Err(anyhow!("tesseract failed: {}", output.stderr.trim()));
    }
    let tsv_path = out_base.with_extension("tsv");
    std::fs::read_to_string(&tsv_path)
        .with_context(|| format!("failed to read tesseract output: {}", tsv_path.display()))
}

struct BoundedOutput {
    status: ExitStatus,
    stdout: String,
    stderr: String,
}

/// Runs a command and kills it once `timeout` elapses. Only short outputs
/// (banners, language lists, error text) go through the pipes.
fn run_bounded(mut command: Command, timeout: Duration) -> Result<BoundedOutput> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| "failed to run tesseract (is it installed?)")?;

    let deadline = Instant::now() + timeout;
    let status = loop {
        if let Some(status) = child.try_wait().with_context(|| "failed to wait for tesseract")? {
            break status;
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Err(anyhow!("tesseract timed out after {:?}", timeout));
        }
        std::thread::sleep(POLL_INTERVAL);
    };

    let mut stdout = String::new();
    if let Some(mut pipe) = child.stdout.take() {
        pipe.read_to_string(&mut stdout).ok();
    }
    let mut stderr = String::new();
    if let Some(mut pipe) = child.stderr.take() {
        pipe.read_to_string(&mut stderr).ok();
    }
    Ok(BoundedOutput {
        status,
        stdout,
        stderr,
    })
}

fn parse_language_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter(|line| !line.starts_with("List of available languages"))
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
