//! Regression check command

use colored::Colorize;
use tracing::warn;
use vizreg_common::Settings;

use super::CaseArgs;
use crate::output::{print_list, print_success, CaseRow, OutputFormat};

/// Compare fresh captures against their references.
///
/// Returns `Ok(false)` when any case did not match or failed.
pub async fn execute(args: CaseArgs, settings: Settings, format: OutputFormat) -> anyhow::Result<bool> {
    let inputs = args.inputs()?;
    if args.dry_run {
        super::dry_run("regression", &inputs, &settings)?;
        return Ok(true);
    }

    let pipeline = super::pipeline(settings)?;
    let results = pipeline.run_cases(&inputs).await?;

    let mut passed = true;
    let rows: Vec<CaseRow> = results
        .iter()
        .zip(inputs.iter())
        .map(|(result, input)| match result {
            Ok(case) => {
                if case.matched != Some(true) {
                    passed = false;
                }
                CaseRow::from(case)
            }
            Err(e) => {
                passed = false;
                let url = input.url.as_str().unwrap_or_default();
                warn!("{}", e);
                CaseRow::failed(url, e.root().to_string())
            }
        })
        .collect();

    print_list(&rows, format);

    if format == OutputFormat::Table {
        if passed {
            print_success(&format!("{} case(s) match their references", rows.len()));
        } else {
            let failing = rows.iter().filter(|r| r.matched != Some(true)).count();
            eprintln!(
                "{} {} of {} case(s) did not match",
                "Regression:".red().bold(),
                failing,
                rows.len()
            );
        }
    }

    Ok(passed)
}
