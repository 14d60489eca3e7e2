//! quire - EPUB content normalizer and splitter

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::debug;

use quire::pipeline::{DeriveToc, NormalizeContent};
use quire::{
    Book, EpubVersion, NormalizeOptions, OutlineEntry, Pipeline, SerializeOptions,
    SplitOptions, normalize_html, split_document,
};

#[derive(Parser)]
#[command(name = "quire")]
#[command(version, about = "EPUB content normalizer and splitter", long_about = None)]
#[command(after_help = "EXAMPLES:
    quire normalize chapter.html -o chapter.xhtml     Clean up tag soup
    quire split ch1.xhtml --offset 2048 --front a.xhtml --back b.xhtml
    quire toc ch1.xhtml ch2.xhtml --json              Outline from headings")]
struct Cli {
    /// Log what is happening
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Normalize an HTML file into pretty-printed XHTML
    Normalize {
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output file (defaults to stdout)
        #[arg(short, long, value_name = "OUTPUT")]
        output: Option<PathBuf>,

        /// Target EPUB version (2, 3 or 3.1)
        #[arg(long, default_value = "3")]
        epub_version: EpubVersion,

        /// Write empty elements as <tag></tag>
        #[arg(long)]
        expand_empty: bool,

        /// Tag elements with their source line
        #[arg(long)]
        tag_lines: bool,
    },

    /// Split an XHTML file at a byte offset into two documents
    Split {
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Byte offset of the split point
        #[arg(long)]
        offset: usize,

        /// Output file for the part before the split point
        #[arg(long, value_name = "FILE")]
        front: PathBuf,

        /// Output file for the part after the split point
        #[arg(long, value_name = "FILE")]
        back: PathBuf,

        #[arg(long, default_value = "3")]
        epub_version: EpubVersion,
    },

    /// Derive a table of contents from the headings of HTML files
    Toc {
        #[arg(value_name = "FILES", required = true)]
        files: Vec<PathBuf>,

        /// Print the outline as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> Result<(), Box<dyn Error>> {
    match command {
        Command::Normalize {
            input,
            output,
            epub_version,
            expand_empty,
            tag_lines,
        } => {
            let options = NormalizeOptions::new(epub_version)
                .with_source_lines(tag_lines)
                .with_serialize_options(
                    SerializeOptions::default().with_expand_empty_elements(expand_empty),
                );
            let xhtml = normalize_html(&fs::read(&input)?, &options);
            match output {
                Some(path) => fs::write(path, xhtml)?,
                None => print!("{xhtml}"),
            }
            Ok(())
        }
        Command::Split {
            input,
            offset,
            front,
            back,
            epub_version,
        } => {
            let source = fs::read_to_string(&input)?;
            let result = split_document(&source, offset, &SplitOptions::new(epub_version))?;
            fs::write(&front, result.front)?;
            fs::write(&back, result.back)?;
            debug!("Wrote {} and {}", front.display(), back.display());
            Ok(())
        }
        Command::Toc { files, json } => show_toc(&files, json),
    }
}

fn show_toc(files: &[PathBuf], json: bool) -> Result<(), Box<dyn Error>> {
    let mut loose = Vec::with_capacity(files.len());
    for path in files {
        loose.push((href_for(path), fs::read(path)?));
    }
    let book = Pipeline::new()
        .with_step(NormalizeContent::default())
        .with_step(DeriveToc)
        .run(Book::from_loose_files(loose)?)?;

    let outline = book.toc.outline();
    if json {
        println!("{}", serde_json::to_string_pretty(&outline)?);
    } else {
        print_outline(&outline, 0);
    }
    Ok(())
}

fn print_outline(entries: &[OutlineEntry], depth: usize) {
    for entry in entries {
        println!("{}{}  ({})", "  ".repeat(depth), entry.title, entry.target);
        print_outline(&entry.children, depth + 1);
    }
}

fn href_for(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
