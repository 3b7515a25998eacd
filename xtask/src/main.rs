// breadcrumbs/xtask/src/main.rs

use anyhow::{Context, Result};
use breadcrumbs::{Loaf, crumb::{Crumb, TIME}};
use clap::{Parser, Subcommand};
use std::{fs, path::{Path, PathBuf}};

#[derive(Parser)]
#[command(name = "xtask", about = "breadcrumbs workspace tasks")]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Check that a loaf file is in canonical chronological order
    CheckLoaf {
        file: PathBuf,
        /// Attribute overriding creation date + TIME, as the `sort_key` setting
        #[arg(long)]
        sort_key: Option<String>,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Cmd::CheckLoaf { file, sort_key, json } => check_loaf(&file, sort_key, json),
    }
}

fn check_loaf(path: &Path, sort_key: Option<String>, json: bool) -> Result<()> {
    let text = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let mut loaf = Loaf::load(path).with_context(|| format!("parse {}", path.display()))?;
    loaf.sort_key = sort_key;
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let bad = loaf.out_of_order();
    // Lines without a creation date or TIME stamp sort as if made at the epoch.
    let unstamped: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, l)| {
            let c = Crumb::parse(l);
            c.creation_date.is_none() || c.attribute(TIME).is_none()
        })
        .map(|(i, _)| i + 1)
        .collect();

    if json {
        let report = serde_json::json!({
            "file": path.display().to_string(),
            "crumbs": loaf.len(),
            "out_of_order": bad,
            "unstamped": unstamped,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for n in &bad {
            eprintln!("- line {n} sorts before line {}: {}", n - 1, lines.get(n - 1).unwrap_or(&""));
        }
        for n in &unstamped {
            eprintln!("- line {n} has no creation date or TIME stamp: {}", lines.get(n - 1).unwrap_or(&""));
        }
    }
    if !bad.is_empty() {
        eprintln!("Out of order: {}", path.display());
        std::process::exit(1);
    }
    if !json { println!("OK: {} ({} crumbs)", path.display(), loaf.len()); }
    Ok(())
}
