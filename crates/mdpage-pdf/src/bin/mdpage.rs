//! Render a markdown file to PDF.
//!
//! Usage:
//!   mdpage [OPTIONS] [INPUT]
//!
//! Reads INPUT (or stdin when absent or `-`) and writes the PDF to `-o`
//! (or stdout). Exit status is 2 for malformed input and 1 for any other
//! failure.

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use mdpage_pdf::{PdfConfig, PdfRenderer};
use simplelog::{Config, LevelFilter, WriteLogger};

struct Args {
    config: Option<PathBuf>,
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    title: Option<String>,
    no_compress: bool,
    page_numbers: bool,
    level: LevelFilter,
}

fn usage() {
    eprintln!(
        "Usage: mdpage [OPTIONS] [INPUT]\n\n\
         Options:\n  \
         -o, --output FILE   write PDF to FILE instead of stdout\n  \
         --config FILE       JSON layout/typography config\n  \
         --title TEXT        document title (default: first heading)\n  \
         --no-compress       leave page content streams uncompressed\n  \
         --footer            draw page numbers\n  \
         -v, --verbose       debug logging on stderr\n  \
         -q, --quiet         errors only\n  \
         -h, --help          show this help"
    );
}

fn parse_args() -> Result<Args, String> {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    let mut args = Args {
        config: None,
        input: None,
        output: None,
        title: None,
        no_compress: false,
        page_numbers: false,
        level: LevelFilter::Warn,
    };
    let mut i = 0;
    while i < argv.len() {
        match argv[i].as_str() {
            "-o" | "--output" => {
                i += 1;
                let value = argv.get(i).ok_or("--output needs a path")?;
                if value != "-" {
                    args.output = Some(PathBuf::from(value));
                }
            }
            "--config" => {
                i += 1;
                let value = argv.get(i).ok_or("--config needs a path")?;
                args.config = Some(PathBuf::from(value));
            }
            "--title" => {
                i += 1;
                let value = argv.get(i).ok_or("--title needs a value")?;
                args.title = Some(value.clone());
            }
            "--no-compress" => args.no_compress = true,
            "--footer" => args.page_numbers = true,
            "-v" | "--verbose" => args.level = LevelFilter::Debug,
            "-q" | "--quiet" => args.level = LevelFilter::Error,
            "-h" | "--help" => {
                usage();
                std::process::exit(0);
            }
            "-" => args.input = None,
            other if other.starts_with('-') => return Err(format!("unknown option: {other}")),
            other => {
                if args.input.is_some() {
                    return Err(format!("unexpected extra input: {other}"));
                }
                args.input = Some(PathBuf::from(other));
            }
        }
        i += 1;
    }
    Ok(args)
}

fn load_config(args: &Args) -> Result<PdfConfig, String> {
    let mut cfg = match args.config.as_ref() {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
            PdfConfig::from_json(&json)
                .map_err(|e| format!("invalid config {}: {}", path.display(), e))?
        }
        None => PdfConfig::default(),
    };
    if args.no_compress {
        cfg.pdf.compress = false;
    }
    if args.page_numbers {
        cfg.layout.page_numbers = true;
    }
    if args.title.is_some() {
        cfg.pdf.title = args.title.clone();
    }
    Ok(cfg)
}

fn read_input(args: &Args) -> Result<String, String> {
    match args.input.as_ref() {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read {}: {}", path.display(), e)),
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .map_err(|e| format!("failed to read stdin: {}", e))?;
            Ok(buf)
        }
    }
}

fn run(args: &Args) -> Result<(), (u8, String)> {
    let renderer: PdfRenderer = load_config(args).map_err(|e| (1, e))?.into_renderer();
    let markdown = read_input(args).map_err(|e| (1, e))?;

    let result = match args.output.as_ref() {
        Some(path) => {
            // A failed render must not leave a partial file behind.
            match renderer.render(&markdown) {
                Ok(doc) => {
                    let mut file = File::create(path)
                        .map_err(|e| (1, format!("failed to create {}: {}", path.display(), e)))?;
                    file.write_all(doc.as_bytes())
                        .map_err(|e| (1, format!("failed to write {}: {}", path.display(), e)))?;
                    Ok(*doc.report())
                }
                Err(err) => Err(err),
            }
        }
        None => {
            let stdout = io::stdout();
            renderer.render_to_writer(&markdown, BufWriter::new(stdout.lock()))
        }
    };

    match result {
        Ok(report) => {
            log::info!(
                "rendered {} blocks onto {} pages ({} bytes)",
                report.summary.blocks,
                report.pages,
                report.bytes_written
            );
            Ok(())
        }
        Err(err) => {
            let code = if err.is_client_error() { 2 } else { 1 };
            Err((code, err.to_string()))
        }
    }
}

fn main() -> ExitCode {
    let args = match parse_args() {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("{msg}");
            usage();
            return ExitCode::from(1);
        }
    };
    if let Err(err) = WriteLogger::init(args.level, Config::default(), io::stderr()) {
        eprintln!("failed to initialize logging: {err}");
    }
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err((code, msg)) => {
            eprintln!("mdpage: {msg}");
            ExitCode::from(code)
        }
    }
}
