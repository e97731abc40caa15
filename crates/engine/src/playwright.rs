//! Playwright browser automation

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::Path;
use std::process::{Command, Stdio};
use tokio::fs;
use tokio::process::Command as TokioCommand;
use tracing::{debug, info};
use vizreg_common::config::working_dir;
use vizreg_common::{CaptureConfig, TestCase};

use crate::capture::Capture;
use crate::error::{RegressionError, RegressionResult};

/// Captures screenshots by running a generated Playwright script under Node
#[derive(Debug, Clone)]
pub struct PlaywrightCapture {
    config: CaptureConfig,
}

impl PlaywrightCapture {
    /// Create a capture handle, verifying Playwright is resolvable
    pub fn new(config: CaptureConfig) -> RegressionResult<Self> {
        Self::check_playwright_installed(&config.node_binary)?;
        Ok(Self { config })
    }

    /// Create a capture handle without probing the Node installation
    pub fn unchecked(config: CaptureConfig) -> Self {
        Self { config }
    }

    /// Check if Node can resolve the `playwright` package
    fn check_playwright_installed(node_binary: &str) -> RegressionResult<()> {
        let status = Command::new(node_binary)
            .args(["-e", "require.resolve('playwright')"])
            .env("NODE_PATH", node_path())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match status {
            Ok(status) if status.success() => Ok(()),
            _ => Err(RegressionError::PlaywrightNotFound),
        }
    }

    /// Build the capture script for one test case
    pub fn build_script(&self, case: &TestCase, output: &Path) -> String {
        let mut script = format!(
            r#"
const {{ chromium, firefox, webkit }} = require('playwright');

(async () => {{
  const browser = await {browser}.launch({{ headless: {headless} }});
  try {{
    const page = await browser.newPage({{
      viewport: {{ width: {width}, height: {height} }}
    }});
"#,
            browser = self.config.browser.as_str(),
            headless = self.config.headless,
            width = case.viewport.width,
            height = case.viewport.height,
        );

        if self.config.navigation_timeout_ms > 0 {
            script.push_str(&format!(
                "    page.setDefaultNavigationTimeout({});\n",
                self.config.navigation_timeout_ms
            ));
        }

        script.push_str(&format!("    await page.goto({});\n", js_string(&case.url)));

        if case.wait_ms > 0 {
            script.push_str(&format!("    await page.waitForTimeout({});\n", case.wait_ms));
        }

        script.push_str(&format!(
            "    await page.screenshot({{ path: {}, fullPage: {} }});\n",
            js_string(&output.to_string_lossy()),
            self.config.full_page,
        ));

        script.push_str(
            r#"  } catch (error) {
    console.error(error.message);
    process.exitCode = 1;
  } finally {
    await browser.close();
  }
})();
"#,
        );

        script
    }

    /// Execute a capture script for `url` via Node
    pub async fn run_script(&self, url: &str, script: &str) -> RegressionResult<()> {
        let temp_dir = tempfile::tempdir()?;
        let script_path = temp_dir.path().join("capture.js");
        fs::write(&script_path, script).await?;

        debug!("Running Playwright script: {}", script_path.display());

        let output = TokioCommand::new(&self.config.node_binary)
            .arg(&script_path)
            .env("NODE_PATH", node_path())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RegressionError::CaptureFailed {
                url: url.to_string(),
                reason: format!("{} ({})", stderr.trim(), output.status),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl Capture for PlaywrightCapture {
    async fn capture(&self, case: &TestCase) -> RegressionResult<()> {
        let target = case.artifacts().regression;
        let failed = |reason: String| RegressionError::CaptureFailed {
            url: case.url.clone(),
            reason,
        };

        // A stale image must never be mistaken for this run's capture
        match fs::remove_file(&target).await {
            Ok(()) => debug!("Removed previous regression image {}", target.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(failed(e.to_string())),
        }

        let script = self.build_script(case, &target);
        self.run_script(&case.url, &script).await.map_err(|e| match e {
            e @ RegressionError::CaptureFailed { .. } => e,
            other => failed(other.to_string()),
        })?;

        if !fs::try_exists(&target).await.unwrap_or(false) {
            return Err(failed("browser exited without writing a screenshot".to_string()));
        }

        info!("Captured {} at {}", case.url, case.viewport);
        Ok(())
    }
}

/// Quote a string as a JavaScript literal
fn js_string(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

/// `NODE_PATH` resolving packages installed next to the working directory
fn node_path() -> OsString {
    let local = working_dir().join("node_modules").into_os_string();
    match std::env::var_os("NODE_PATH") {
        Some(existing) if !existing.is_empty() => {
            let mut joined = local;
            joined.push(if cfg!(windows) { ";" } else { ":" });
            joined.push(existing);
            joined
        }
        _ => local,
    }
}
