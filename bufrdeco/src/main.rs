use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use libbufrdeco::{
    Decoder, DecoderConfig, MessageBlock, MessageVersion, SubsetValues, parse,
    value::AtomicValue,
};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Text,
    Json,
    Csv,
}

#[derive(Parser)]
#[command(name = "bufrdump")]
#[command(about = "Decode BUFR messages and print their values", long_about = None)]
struct Cli {
    /// Files or glob patterns to decode
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Table directory, overrides the configuration and $BUFR_TABLES
    #[arg(short, long)]
    tables: Option<PathBuf>,

    /// Decoder configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Keep loaded tables in memory across messages
    #[arg(long)]
    cache: bool,

    /// Print section information of each message
    #[arg(long)]
    info: bool,

    /// Print the expanded descriptor tree of each message
    #[arg(long)]
    tree: bool,

    /// Output format for decoded values
    #[arg(short, long, value_enum, default_value = "text")]
    format: Format,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Serialize)]
struct JsonSubset<'a> {
    file: &'a str,
    message: usize,
    subset: usize,
    values: &'a [AtomicValue],
}

#[derive(Serialize)]
struct CsvRow<'a> {
    file: &'a str,
    message: usize,
    subset: usize,
    descriptor: String,
    name: &'a str,
    value: String,
    unit: &'a str,
    explanation: &'a str,
}

struct Output {
    format: Format,
    csv: Option<csv::Writer<std::io::Stdout>>,
}

impl Output {
    fn new(format: Format) -> Self {
        let csv = matches!(format, Format::Csv).then(|| csv::Writer::from_writer(std::io::stdout()));
        Output { format, csv }
    }

    fn subset(&mut self, file: &str, message: usize, values: &SubsetValues) -> Result<()> {
        match self.format {
            Format::Text => {
                print!("{}", values);
            }
            Format::Json => {
                let line = serde_json::to_string(&JsonSubset {
                    file,
                    message,
                    subset: values.subset,
                    values: values.values(),
                })?;
                println!("{}", line);
            }
            Format::Csv => {
                if let Some(writer) = self.csv.as_mut() {
                    for v in values.iter() {
                        writer.serialize(CsvRow {
                            file,
                            message,
                            subset: values.subset,
                            descriptor: v.desc.key(),
                            name: &v.name,
                            value: v.format_value(),
                            unit: &v.unit,
                            explanation: v.explanation.as_deref().unwrap_or(""),
                        })?;
                    }
                }
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(writer) = self.csv.as_mut() {
            writer.flush()?;
        }
        std::io::stdout().flush()?;
        Ok(())
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => DecoderConfig::load_from_file(path)?,
        None => DecoderConfig::default(),
    };
    if let Some(dir) = &cli.tables {
        config.tables.tables_dir = dir.clone();
    }
    if cli.cache {
        config.tables.use_cache = true;
    }

    let files = expand_inputs(&cli.inputs)?;
    let mut output = Output::new(cli.format);
    let mut failed = 0usize;
    let mut total = 0usize;

    for path in &files {
        let file = match parse(path) {
            Ok(file) => file,
            Err(e) => {
                error!(path = %path.display(), "{}", e);
                failed += 1;
                continue;
            }
        };
        info!(path = %path.display(), messages = file.message_count(), "file parsed");

        let name = path.display().to_string();
        for (index, block) in file.messages().iter().enumerate() {
            total += 1;
            if let Err(e) = dump_message(&cli, &config, &mut output, &name, index, block) {
                error!(path = %name, message = index, "{}", e);
                failed += 1;
            }
        }
    }

    output.finish()?;

    if failed > 0 {
        bail!("{} of {} inputs could not be decoded", failed, total.max(failed));
    }
    Ok(())
}

fn expand_inputs(inputs: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = vec![];
    for input in inputs {
        let path = Path::new(input);
        if path.is_file() {
            files.push(path.to_path_buf());
            continue;
        }

        let matches = glob::glob(input).with_context(|| format!("Invalid pattern: {}", input))?;
        let before = files.len();
        files.extend(matches.filter_map(|m| m.ok()).filter(|p| p.is_file()));
        if files.len() == before {
            error!(pattern = %input, "no file matched");
        }
    }
    Ok(files)
}

fn dump_message(
    cli: &Cli,
    config: &DecoderConfig,
    output: &mut Output,
    file: &str,
    index: usize,
    block: &MessageBlock,
) -> Result<()> {
    if cli.info {
        eprintln!("== {} message {} at byte {}", file, index, block.offset());
        eprintln!("{}", block);
    }

    let mut decoder = Decoder::from_message(block, config)
        .with_context(|| format!("message {} of {}", index, file))?;

    if cli.tree {
        eprintln!("{}", decoder.tree().listing(Some(&decoder.tables().b)));
    }

    let mut values = decoder.buffer();
    let mut errors = 0;
    loop {
        match decoder.next_subset(&mut values) {
            Ok(true) => output.subset(file, index, &values)?,
            Ok(false) => break,
            Err(_) => errors += 1,
        }
    }

    for d in decoder.diagnostics().entries() {
        eprintln!("{} message {}: {}", file, index, d);
    }

    if errors > 0 {
        bail!("{} of {} subsets failed", errors, block.subsets_count());
    }
    Ok(())
}
