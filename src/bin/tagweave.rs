//! Command-line wrapper around the `tagweave` processing API.
//!
//! A thin CLI: read the template and data files, delegate to the pure API
//! (`tagweave::api::parse_template`/`render`), print the rendered bytes to
//! stdout. All parsing/rendering logic lives in the library; this binary
//! only handles argument parsing, file I/O, and process exit codes.

use std::fs;
use std::path::PathBuf;
use std::process;

use clap::Parser;

use tagweave::api::{parse_template, render};
use tagweave::renderer::RenderOptions;
use tagweave::value::Value;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the template file
    template: PathBuf,

    /// Path to a JSON file supplying the data root (`d.`-prefixed tags)
    data: PathBuf,

    /// Path to a JSON file supplying the complement root (`c.`-prefixed tags)
    #[arg(long)]
    complement: Option<PathBuf>,

    /// Path to a JSON file supplying the options root (`o.`-prefixed tags)
    #[arg(long)]
    options_data: Option<PathBuf>,

    /// Locale consulted by translation tags before `default_locale`
    #[arg(long)]
    locale: Option<String>,

    /// Locale translation tags fall back to when `--locale` misses
    #[arg(long, default_value = "en")]
    default_locale: String,

    /// Promote UNKNOWN_FORMATTER / INVALID_PARAMETERS to fatal errors
    #[arg(long)]
    strict: bool,

    /// Print the render report (diagnostics, per-tag status) to stderr as JSON
    #[arg(long)]
    report: bool,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    if let Err(err) = run(args) {
        eprintln!("Error: {err}");
        process::exit(1);
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let template_text = fs::read_to_string(&args.template)?;
    let data = read_json(&args.data)?;
    let complement = args.complement.as_deref().map(read_json).transpose()?;
    let options_data = args.options_data.as_deref().map(read_json).transpose()?;

    let options = RenderOptions {
        locale: args.locale,
        strict: args.strict,
        default_locale: args.default_locale,
    };

    let parsed = parse_template(&template_text)?;
    let (output, report) = render(&parsed, &data, complement.as_ref(), options_data.as_ref(), None, &options)?;

    print!("{output}");

    if args.report {
        let report_json = serde_json::to_string_pretty(&report)?;
        eprintln!("{report_json}");
    }

    Ok(())
}

fn read_json(path: &std::path::Path) -> Result<Value, Box<dyn std::error::Error>> {
    let text = fs::read_to_string(path)?;
    let json: serde_json::Value = serde_json::from_str(&text)?;
    Ok(Value::from(json))
}
