//! `mdv check` and its remediation modes.

use std::process::ExitCode;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::json;

use mdv_check::report::{format_issue, format_schema_issue, group_by_file, JsonReport};
use mdv_check::{
    apply_fixes, check_vault, collect_fixable, create_stubs, plan_stubs, CheckReport,
};
use mdv_vault::{Vault, VaultSnapshot};

use crate::{load_snapshot, open_index};

#[derive(Debug, clap::Args)]
pub struct CheckArgs {
    /// Fail on warnings as well as errors.
    #[arg(long)]
    pub strict: bool,

    /// Group issues under the file they occur in.
    #[arg(long)]
    pub by_file: bool,

    /// Print a JSON report with per-kind summaries.
    #[arg(long)]
    pub json: bool,

    /// Repair short references and quoted enum values (preview unless --confirm).
    #[arg(long, conflicts_with = "create_missing")]
    pub fix: bool,

    /// Create stub pages for missing references of certain type (preview unless --confirm).
    #[arg(long)]
    pub create_missing: bool,

    /// Write the changes --fix or --create-missing would make.
    #[arg(long)]
    pub confirm: bool,
}

pub fn run(vault: &Vault, args: &CheckArgs) -> Result<ExitCode> {
    let snapshot = load_snapshot(vault)?;
    let index = open_index(vault, &snapshot)?;
    let report = check_vault(&snapshot, &index).context("check vault")?;

    if args.fix {
        return fix(vault, &report, args);
    }
    if args.create_missing {
        return create_missing(vault, &snapshot, &report, args);
    }

    if args.json {
        print_json(&JsonReport::new(&report))?;
    } else if args.by_file {
        print_by_file(&report);
    } else {
        for issue in &report.issues {
            println!("{}", format_issue(issue));
        }
        for issue in &report.schema_issues {
            println!("{}", format_schema_issue(issue));
        }
        print_totals(&report);
    }

    Ok(if report.failed(args.strict) {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn print_totals(report: &CheckReport) {
    println!(
        "Checked {} files: {} error(s), {} warning(s)",
        report.file_count,
        report.error_count(),
        report.warning_count()
    );
}

fn print_by_file(report: &CheckReport) {
    for (file, issues) in group_by_file(&report.issues) {
        println!("{}", if file.is_empty() { "(vault)" } else { file });
        for issue in issues {
            if issue.line > 0 {
                println!("  {:>4}  {:<5} {}", issue.line, issue.level.to_string(), issue.message);
            } else {
                println!("        {:<5} {}", issue.level.to_string(), issue.message);
            }
        }
    }
    if !report.schema_issues.is_empty() {
        println!("schema.yaml");
        for issue in &report.schema_issues {
            println!("        {:<5} {}", issue.level.to_string(), issue.message);
        }
    }
    print_totals(report);
}

fn fix(vault: &Vault, report: &CheckReport, args: &CheckArgs) -> Result<ExitCode> {
    let fixes = collect_fixable(&report.issues);
    let result = apply_fixes(vault, &fixes, args.confirm).context("apply fixes")?;

    if args.json {
        print_json(&json!({ "fixes": fixes, "result": result }))?;
        return Ok(ExitCode::SUCCESS);
    }
    if fixes.is_empty() {
        println!("No fixable issues");
        return Ok(ExitCode::SUCCESS);
    }
    for fix in &fixes {
        println!("{}:{} {}", fix.file_path, fix.line, fix.description);
    }
    if result.applied {
        println!(
            "Fixed {} issue(s) in {} file(s)",
            result.issue_count, result.file_count
        );
    } else {
        println!(
            "Would fix {} issue(s) in {} file(s); run with --confirm to apply",
            result.issue_count, result.file_count
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn create_missing(
    vault: &Vault,
    snapshot: &VaultSnapshot,
    report: &CheckReport,
    args: &CheckArgs,
) -> Result<ExitCode> {
    let plan = plan_stubs(&snapshot.schema, &report.missing_refs, |path| vault.exists(path));
    let created = create_stubs(vault, &plan, args.confirm).context("create stub pages")?;

    if args.json {
        print_json(&json!({
            "stubs": plan.stubs,
            "unresolved": plan.unresolved,
            "undefined_traits": report.undefined_traits,
            "created": created,
        }))?;
        return Ok(ExitCode::SUCCESS);
    }

    if !plan.stubs.is_empty() {
        println!("Pages to create:");
        for stub in &plan.stubs {
            println!("  {} ({}) for [[{}]]", stub.file_path, stub.type_name, stub.target);
        }
    }
    if !plan.unresolved.is_empty() {
        println!("Left for review:");
        for missing in &plan.unresolved {
            let guess = missing
                .inferred_type
                .as_deref()
                .map(|t| format!(", maybe {t}"))
                .unwrap_or_default();
            println!(
                "  [[{}]] ({}{guess}) in {}:{}",
                missing.target_path, missing.confidence, missing.source_file, missing.line
            );
        }
    }
    if !report.undefined_traits.is_empty() {
        println!("Undefined traits:");
        for undefined in &report.undefined_traits {
            println!(
                "  @{} used {} time(s), e.g. {}",
                undefined.trait_name,
                undefined.usage_count,
                undefined.locations.join(", ")
            );
        }
    }

    if plan.stubs.is_empty() {
        println!("No pages to create");
    } else if args.confirm {
        println!("Created {created} page(s)");
    } else {
        println!(
            "Would create {} page(s); run with --confirm to write them",
            plan.stubs.len()
        );
    }
    Ok(ExitCode::SUCCESS)
}

pub(crate) fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).context("serialize output")?);
    Ok(())
}
