use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tablelib::{
    FXY, TableType,
    config::TablesConfig,
    pattern,
    prelude::{TableB, TableC, TableD, TableFile},
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "table-ctl")]
#[command(about = "BUFR table inspection tool", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the table files found in a directory
    Scan {
        /// Table directory (defaults to $BUFR_TABLES)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Table type to list: "b", "c", "d", or "all"
        #[arg(short, long, default_value = "all")]
        table_type: String,
    },
    /// Print a table file in formatted output
    Print {
        /// Path to a B, C or D table file
        #[arg(short, long)]
        input: PathBuf,

        /// Table type, guessed from the file name when omitted
        #[arg(short, long)]
        table_type: Option<String>,

        /// Maximum number of entries to print (optional)
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Look up one descriptor in a table file
    Lookup {
        /// Path to a B, C or D table file
        #[arg(short, long)]
        input: PathBuf,

        /// Descriptor in FXXYYY form
        #[arg(short, long)]
        key: String,

        /// Code value (Table C only)
        #[arg(long)]
        value: Option<u32>,

        /// Table type, guessed from the file name when omitted
        #[arg(short, long)]
        table_type: Option<String>,
    },
    /// Generate example configuration file
    GenConfig {
        /// Output path for the configuration file
        #[arg(short, long, default_value = "bufr-tables.toml")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Scan { input, table_type } => {
            let dir = input.unwrap_or_else(|| TablesConfig::from_env().tables_dir);
            scan_directory(&dir, &table_type)?;
        }
        Commands::Print {
            input,
            table_type,
            limit,
        } => {
            let table = open(&input, table_type.as_deref())?;
            print_table(table, limit);
        }
        Commands::Lookup {
            input,
            key,
            value,
            table_type,
        } => {
            let table = open(&input, table_type.as_deref())?;
            lookup(table, &key, value)?;
        }
        Commands::GenConfig { output } => {
            generate_config_file(&output)?;
        }
    }

    Ok(())
}

fn parse_table_type(s: &str) -> Result<TableType> {
    let mut chars = s.chars();
    match (chars.next().and_then(TableType::from_char), chars.next()) {
        (Some(t), None) => Ok(t),
        _ => bail!("Invalid table type: {}. Use 'b', 'c' or 'd'", s),
    }
}

fn open(path: &Path, table_type: Option<&str>) -> Result<Arc<TableFile>> {
    let table_type = match table_type {
        Some(t) => parse_table_type(t)?,
        None => path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.chars().next())
            .and_then(TableType::from_char)
            .with_context(|| {
                format!(
                    "Cannot guess the table type of {}, use --table-type",
                    path.display()
                )
            })?,
    };

    Ok(Arc::new(TableFile::read(path, table_type)?))
}

fn scan_directory(dir: &Path, table_type: &str) -> Result<()> {
    let filter = match table_type.to_lowercase().as_str() {
        "all" => None,
        t => Some(parse_table_type(t)?),
    };

    println!("Scanning directory: {}", dir.display());
    let files = pattern::scan(dir, filter).context("Failed to scan directory")?;
    println!("Found {} matching files", files.len());
    println!();

    println!(
        "{:<26} | {:<5} | {:>6} | {:>9} | {:>6} | {:>7} | {:>5}",
        "File", "Type", "Master", "Subcentre", "Centre", "Version", "Local"
    );
    println!("{}", "-".repeat(86));
    for (_, name) in &files {
        println!(
            "{:<26} | {:<5} | {:>6} | {:>9} | {:>6} | {:>7} | {:>5}",
            name.file_name(),
            name.table_type.as_char(),
            name.master_table,
            name.subcentre,
            name.centre,
            name.version,
            name.local_version
        );
    }

    let wmo = files.iter().filter(|(_, n)| n.is_wmo()).count();
    println!();
    println!("Summary:");
    println!("  WMO tables: {}", wmo);
    println!("  Local tables: {}", files.len() - wmo);

    Ok(())
}

fn print_limited<T: std::fmt::Display>(entries: &[T], limit: Option<usize>) {
    let display_entries = if let Some(max) = limit {
        &entries[..entries.len().min(max)]
    } else {
        entries
    };

    for entry in display_entries {
        println!("{}", entry);
    }

    if let Some(max) = limit {
        if entries.len() > max {
            println!("\n... ({} more entries omitted)", entries.len() - max);
        }
    }
}

fn print_table(table: Arc<TableFile>, limit: Option<usize>) {
    println!("Loaded {} from: {}", table.table_type(), table.path().display());

    match table.table_type() {
        TableType::B => {
            let entries = TableB(table).entries();
            println!("\nTable B Entries (Total: {})", entries.len());
            println!("{}", "=".repeat(110));
            println!(
                "{:<6} | {:<40} | {:<24} | {:>5} | {:>12} | {:>5}",
                "FXY", "Element Name", "Unit", "Scale", "Ref Val", "Width"
            );
            println!("{}", "-".repeat(110));
            print_limited(&entries, limit);
        }
        TableType::D => {
            let entries = TableD(table).entries();
            println!("\nTable D Entries (Total: {})", entries.len());
            println!("{}", "=".repeat(110));
            println!("{:<6} | {:>3} | {}", "FXY", "N", "FXY Chain");
            println!("{}", "-".repeat(110));
            print_limited(&entries, limit);
        }
        TableType::C => {
            let keys = table.keys();
            let c = TableC(table);
            let lines: Vec<String> = keys
                .iter()
                .flat_map(|k| {
                    c.entries_for(k)
                        .into_iter()
                        .map(move |e| format!("{} | {:>4} | {}", k, e.value, e.meaning))
                })
                .collect();
            println!("\nTable C Entries (Total: {})", lines.len());
            println!("{}", "=".repeat(110));
            print_limited(&lines, limit);
        }
    }
}

fn lookup(table: Arc<TableFile>, key: &str, value: Option<u32>) -> Result<()> {
    let fxy: FXY = key.parse()?;

    match table.table_type() {
        TableType::B => match TableB(table).lookup(&fxy) {
            Some(entry) => println!("{}", entry),
            None => bail!("{} not found in Table B", fxy),
        },
        TableType::D => match TableD(table).lookup(&fxy) {
            Some(entry) => println!("{}", entry),
            None => bail!("{} not found in Table D", fxy),
        },
        TableType::C => {
            let c = TableC(table);
            match value {
                Some(v) => match c.code_meaning(&fxy, v) {
                    Some(meaning) => println!("{} {} : {}", fxy, v, meaning),
                    None => bail!("{} has no entry for value {}", fxy, v),
                },
                None => {
                    let entries = c.entries_for(&fxy);
                    if entries.is_empty() {
                        bail!("{} not found in Table C", fxy);
                    }
                    for e in entries {
                        println!("{} {:>4} : {}", fxy, e.value, e.meaning);
                    }
                }
            }
        }
    }

    Ok(())
}

fn generate_config_file(output_path: &Path) -> Result<()> {
    println!(
        "Generating example configuration file: {}",
        output_path.display()
    );

    let config = TablesConfig::default_example();
    config
        .save_to_file(output_path)
        .context("Failed to save configuration file")?;

    println!("Configuration file generated successfully!");
    println!();
    println!("Edit tables_dir to point at your B, C and D table directory.");
    println!(
        "Use it with: bufrdump --config {} <files>",
        output_path.display()
    );

    Ok(())
}
