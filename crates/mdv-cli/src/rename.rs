//! `mdv schema rename type|field`.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Subcommand;
use serde::Serialize;

use mdv_refactor::{
    apply_plan, plan_field_rename, plan_type_rename, ApplyOptions, ApplySummary, Change, Conflict,
    RefactorError, RenamePlan,
};
use mdv_vault::Vault;

use crate::check::print_json;
use crate::load_snapshot;

#[derive(Debug, Subcommand)]
pub enum RenameTarget {
    /// Rename a type, e.g. `mdv schema rename type event meeting`.
    Type(TypeArgs),
    /// Rename a field of one type, e.g. `mdv schema rename field person email email_address`.
    Field(FieldArgs),
}

#[derive(Debug, clap::Args)]
pub struct TypeArgs {
    old: String,
    new: String,

    /// Also rename the type's default directory and move its files.
    #[arg(long)]
    rename_default_path: bool,

    #[command(flatten)]
    apply: ApplyArgs,
}

#[derive(Debug, clap::Args)]
pub struct FieldArgs {
    #[arg(value_name = "TYPE")]
    type_name: String,
    old: String,
    new: String,

    #[command(flatten)]
    apply: ApplyArgs,
}

#[derive(Debug, clap::Args)]
struct ApplyArgs {
    /// Apply the plan instead of previewing it.
    #[arg(long)]
    confirm: bool,

    /// Print the plan as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct RenameOutput<'a> {
    preview: bool,
    #[serde(flatten)]
    plan: &'a RenamePlan,
    default_path_rename_available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    default_path_old: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    default_path_new: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    applied: Option<ApplySummary>,
}

pub fn run(vault: &Vault, target: &RenameTarget) -> Result<ExitCode> {
    let snapshot = load_snapshot(vault)?;
    let (plan, apply, rename_default_path, title) = match target {
        RenameTarget::Type(args) => (
            plan_type_rename(vault, &snapshot, &args.old, &args.new)?,
            &args.apply,
            args.rename_default_path,
            format!("Rename type '{}' to '{}'", args.old, args.new),
        ),
        RenameTarget::Field(args) => (
            plan_field_rename(vault, &snapshot, &args.type_name, &args.old, &args.new)?,
            &args.apply,
            false,
            format!(
                "Rename field '{}.{}' to '{}'",
                args.type_name, args.old, args.new
            ),
        ),
    };
    if rename_default_path && plan.default_path.is_none() {
        return Err(RefactorError::NoDefaultPathRename.into());
    }

    let mut conflicts: Vec<&Conflict> = plan.conflicts.iter().collect();
    if rename_default_path {
        conflicts.extend(plan.default_path.iter().flat_map(|dir| &dir.conflicts));
    }
    let blocked = !conflicts.is_empty();

    let applied = if apply.confirm && !blocked {
        let options = ApplyOptions { rename_default_path };
        Some(apply_plan(vault, &plan, options).context("apply rename")?)
    } else {
        None
    };

    if apply.json {
        print_json(&RenameOutput {
            preview: applied.is_none(),
            plan: &plan,
            default_path_rename_available: plan.default_path.is_some(),
            default_path_old: plan.default_path.as_ref().map(|d| d.old_path.as_str()),
            default_path_new: plan.default_path.as_ref().map(|d| d.new_path.as_str()),
            applied,
        })?;
    } else {
        print_plan(&title, &plan, rename_default_path, &conflicts, applied.as_ref());
    }

    Ok(if blocked {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn print_change(change: &Change) {
    if change.line > 0 {
        println!("  {}:{}  {}", change.file_path, change.line, change.description);
    } else {
        println!("  {}  {}", change.file_path, change.description);
    }
}

fn print_plan(
    title: &str,
    plan: &RenamePlan,
    rename_default_path: bool,
    conflicts: &[&Conflict],
    applied: Option<&ApplySummary>,
) {
    println!("{title}");
    for change in &plan.changes {
        print_change(change);
    }
    if let Some(dir) = &plan.default_path {
        if rename_default_path {
            println!("Default path {} → {}", dir.old_path, dir.new_path);
            for change in &dir.changes {
                print_change(change);
            }
        } else {
            println!(
                "Default path {} could become {} ({} file(s) would move); pass --rename-default-path to include it",
                dir.old_path,
                dir.new_path,
                dir.moves.len()
            );
        }
    }

    if !conflicts.is_empty() {
        for conflict in conflicts {
            if conflict.line > 0 {
                println!("CONFLICT {}:{} {}", conflict.file_path, conflict.line, conflict.message);
            } else {
                println!("CONFLICT {} {}", conflict.file_path, conflict.message);
            }
        }
        println!("Rename blocked by {} conflict(s); nothing was changed", conflicts.len());
        return;
    }

    match applied {
        Some(summary) => println!(
            "Wrote {} file(s), moved {} file(s)",
            summary.files_written, summary.files_moved
        ),
        None => println!(
            "Preview: {} change(s) in {} file(s); run with --confirm to apply",
            plan.changes.len(),
            plan.files().len()
        ),
    }
}
