//! Reference refresh command

use vizreg_common::Settings;

use super::CaseArgs;
use crate::output::{print_list, print_success, CaseRow, OutputFormat};

/// Replace the references of the given cases with fresh captures
pub async fn execute(args: CaseArgs, settings: Settings, format: OutputFormat) -> anyhow::Result<bool> {
    if args.dry_run {
        super::dry_run("reference", &args.inputs()?, &settings)?;
        return Ok(true);
    }

    let items = args.to_value()?;
    let pipeline = super::pipeline(settings)?;
    let cases = pipeline.fresh_reference_value(&items).await?;

    let rows: Vec<CaseRow> = cases.iter().map(CaseRow::from).collect();
    print_list(&rows, format);
    if format == OutputFormat::Table {
        print_success(&format!("{} reference(s) updated", rows.len()));
    }

    Ok(true)
}
