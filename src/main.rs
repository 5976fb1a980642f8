use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use similar::{ChangeTag, TextDiff};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use yaml_patcher::config::{load_patch_set_from_path, load_schema_from_path};
use yaml_patcher::edit::write_atomic;
use yaml_patcher::session::{FieldValue, Session};
use yaml_patcher::yaml::{
    apply_patches, apply_template_patches, extract_comment_section, extract_top_level_block,
    get_object_array, get_scalar, get_string_array, list_map_keys, normalize_snippet_to_root,
    KeyOrderMap, PatchOutcome, PatchReport, Value, YamlPath,
};

#[derive(Parser)]
#[command(name = "yaml-patcher")]
#[command(about = "Structural YAML patching that keeps comments and layout", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read a value at a dotted path and print it as JSON
    Get {
        file: PathBuf,

        /// Dotted path, e.g. `remote-management.secret-key`
        path: String,

        #[arg(short, long, value_enum, default_value_t = ValueKind::Scalar)]
        kind: ValueKind,
    },

    /// Print a top-level block, or the normalized commented example section
    Extract {
        file: PathBuf,

        /// Top-level key to extract
        #[arg(short, long)]
        root: String,

        /// Marker comment opening the example section
        #[arg(long, requires = "end")]
        start: Option<String>,

        /// Marker comment closing the example section
        #[arg(long, requires = "start")]
        end: Option<String>,
    },

    /// Apply a TOML patch file to a YAML document
    Apply {
        file: PathBuf,

        /// Patch file with `[[patches]]` and `[[templates]]`
        #[arg(short, long)]
        patches: PathBuf,

        /// Schema whose `[key_order]` places new keys
        #[arg(short, long)]
        key_order: Option<PathBuf>,

        /// Dry run - show what would change without writing the file
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,
    },

    /// Edit schema fields and save the minimal set of changes
    Save {
        file: PathBuf,

        #[arg(short, long)]
        schema: PathBuf,

        /// `field-id=value`; records fields take a JSON array
        #[arg(long = "set", value_name = "ID=VALUE")]
        sets: Vec<String>,

        /// Dry run - show what would change without writing the file
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ValueKind {
    Scalar,
    List,
    Records,
    Keys,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env("YAML_PATCHER_LOG")
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Get { file, path, kind } => cmd_get(&file, &path, kind),
        Commands::Extract {
            file,
            root,
            start,
            end,
        } => cmd_extract(&file, &root, start.as_deref().zip(end.as_deref())),
        Commands::Apply {
            file,
            patches,
            key_order,
            dry_run,
            diff,
        } => cmd_apply(&file, &patches, key_order.as_deref(), dry_run, diff),
        Commands::Save {
            file,
            schema,
            sets,
            dry_run,
            diff,
        } => cmd_save(&file, &schema, &sets, dry_run, diff),
    }
}

fn read_document(file: &Path) -> Result<String> {
    fs::read_to_string(file).with_context(|| format!("failed to read {}", file.display()))
}

fn cmd_get(file: &Path, path: &str, kind: ValueKind) -> Result<()> {
    let text = read_document(file)?;
    let path = YamlPath::parse(path)?;

    let json = match kind {
        ValueKind::Scalar => {
            serde_json::to_string_pretty(&get_scalar(&text, &path).map(Value::Scalar))?
        }
        ValueKind::List => {
            serde_json::to_string_pretty(&get_string_array(&text, &path).map(Value::StringArray))?
        }
        ValueKind::Records => {
            serde_json::to_string_pretty(&get_object_array(&text, &path).map(Value::ObjectArray))?
        }
        ValueKind::Keys => serde_json::to_string_pretty(&list_map_keys(&text, &path))?,
    };
    println!("{json}");
    Ok(())
}

fn cmd_extract(file: &Path, root: &str, markers: Option<(&str, &str)>) -> Result<()> {
    let text = read_document(file)?;

    let block = extract_top_level_block(&text, root);
    if !block.is_empty() {
        print!("{block}");
        return Ok(());
    }

    if let Some((start, end)) = markers {
        let section = extract_comment_section(&text, start, end);
        if !section.is_empty() {
            print!("{}", normalize_snippet_to_root(&section, root));
            return Ok(());
        }
    }

    anyhow::bail!("no block or example section found for '{root}'")
}

fn cmd_apply(
    file: &Path,
    patches: &Path,
    key_order: Option<&Path>,
    dry_run: bool,
    show_diff: bool,
) -> Result<()> {
    let original = read_document(file)?;
    let set = load_patch_set_from_path(patches)?;
    let key_order = match key_order {
        Some(path) => load_schema_from_path(path)?.key_order,
        None => KeyOrderMap::new(),
    };

    println!("Loading patches from {}...", patches.display());
    if dry_run {
        println!("{}", "  [DRY RUN - showing what would be applied]".cyan());
    }

    let mut expanded = original.clone();
    for template in &set.templates {
        let next = apply_template_patches(&expanded, std::slice::from_ref(template));
        if next == expanded {
            println!(
                "{} {}: Template not expanded (block is live or markers missing)",
                "⊙".yellow(),
                template.root_key
            );
        } else {
            println!("{} {}: Template expanded", "✓".green(), template.root_key);
            expanded = next;
        }
    }
    let report = apply_patches(&expanded, &set.patches, &key_order)?;
    finish(
        file,
        &original,
        &report.text,
        &report.outcomes,
        dry_run,
        show_diff,
    )
}

fn cmd_save(
    file: &Path,
    schema_path: &Path,
    sets: &[String],
    dry_run: bool,
    show_diff: bool,
) -> Result<()> {
    let schema = load_schema_from_path(schema_path)?;
    let original = read_document(file)?;
    let mut session = Session::load(original.clone(), &schema);

    for assignment in sets {
        let (id, raw) = assignment
            .split_once('=')
            .with_context(|| format!("expected ID=VALUE, got '{assignment}'"))?;
        let field = schema
            .field(id)
            .with_context(|| format!("unknown field '{id}'"))?;
        let value = FieldValue::from_input(field.kind, raw)
            .with_context(|| format!("invalid value for '{id}'"))?;
        session.current_mut().set(id, value);
    }

    if !session.is_dirty() {
        println!("{}", "No changes".dimmed());
        return Ok(());
    }

    let outcome = session.save()?;
    if outcome.templates > 0 {
        println!(
            "{} {} template region(s) expanded",
            "✓".green(),
            outcome.templates
        );
    }
    finish(
        file,
        &original,
        &outcome.text,
        &outcome.report,
        dry_run,
        show_diff,
    )
}

/// Report outcomes, write the result unless dry-running, and print the summary.
fn finish(
    file: &Path,
    original: &str,
    updated: &str,
    outcomes: &[PatchReport],
    dry_run: bool,
    show_diff: bool,
) -> Result<()> {
    let mut total_applied = 0;
    let mut total_noop = 0;
    let mut total_skipped = 0;

    for report in outcomes {
        match &report.outcome {
            PatchOutcome::Applied => {
                let verb = if dry_run { "Would apply" } else { "Applied" };
                println!("{} {}: {}", "✓".green(), report.path, verb);
                total_applied += 1;
            }
            PatchOutcome::NoOp { reason } => {
                println!("{} {}: No change ({})", "⊙".yellow(), report.path, reason);
                total_noop += 1;
            }
            PatchOutcome::Skipped { reason } => {
                eprintln!("{} {}: Skipped - {}", "✗".red(), report.path, reason);
                total_skipped += 1;
            }
        }
    }

    if show_diff && original != updated {
        display_diff(file, original, updated);
    }

    if !dry_run && original != updated {
        write_atomic(file, updated)
            .with_context(|| format!("failed to write {}", file.display()))?;
    }

    println!();
    println!("{}", "Summary:".bold());
    println!("  {} applied", format!("{}", total_applied).green());
    println!("  {} unchanged", format!("{}", total_noop).yellow());
    println!("  {} skipped", format!("{}", total_skipped).red());

    if total_skipped > 0 {
        std::process::exit(1);
    }

    Ok(())
}

/// Helper: Show unified diff between original and modified content
fn display_diff(file: &Path, original: &str, modified: &str) {
    println!(
        "\n{}",
        format!("--- {} (original)", file.display()).dimmed()
    );
    println!("{}", format!("+++ {} (patched)", file.display()).dimmed());

    let diff = TextDiff::from_lines(original, modified);

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => format!(" {}", change).normal(),
        };
        print!("{}", sign);
    }
}
