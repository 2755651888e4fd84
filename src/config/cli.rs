use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the texd client.
#[derive(Debug, Parser)]
#[command(name = "texd", version, about = "Client for the texd TeX compilation service")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "TEXD_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: Overrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Query the server and print its status document.
    Status,
    /// Compile a TeX document together with its attachments.
    Render(RenderArgs),
}

#[derive(Debug, Args, Clone)]
pub struct RenderArgs {
    /// Main input file, uploaded as the document body.
    #[arg(long, value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub input: PathBuf,

    /// File to upload in full, optionally renamed (`PATH=NAME`). Without a
    /// name the file keeps its basename.
    #[arg(long = "attach", value_name = "PATH[=NAME]", value_parser = parse_attach)]
    pub attach: Vec<AttachSpec>,

    /// File to upload as a checksum reference.
    #[arg(long = "reference", value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub reference: Vec<PathBuf>,

    /// Where to write the PDF; standard output when omitted.
    #[arg(long, short, value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub output: Option<PathBuf>,
}

/// A `--attach` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachSpec {
    pub path: PathBuf,
    pub name: Option<String>,
}

fn parse_attach(value: &str) -> Result<AttachSpec, String> {
    let (path, name) = match value.split_once('=') {
        Some((path, name)) => (path, Some(name)),
        None => (value, None),
    };
    if path.is_empty() {
        return Err("path must not be empty".to_string());
    }
    if name.is_some_and(str::is_empty) {
        return Err("name after `=` must not be empty".to_string());
    }
    Ok(AttachSpec {
        path: PathBuf::from(path),
        name: name.map(str::to_string),
    })
}

#[derive(Debug, Args, Default, Clone)]
pub struct Overrides {
    /// Override the server endpoint URL.
    #[arg(long = "endpoint", value_name = "URL")]
    pub endpoint: Option<String>,

    /// Override the connect timeout in seconds (0 disables it).
    #[arg(long = "open-timeout", value_name = "SECONDS")]
    pub open_timeout: Option<u64>,

    /// Override the read timeout in seconds (0 disables it).
    #[arg(long = "read-timeout", value_name = "SECONDS")]
    pub read_timeout: Option<u64>,

    /// Override the write timeout in seconds (0 disables it).
    #[arg(long = "write-timeout", value_name = "SECONDS")]
    pub write_timeout: Option<u64>,

    /// Override the error report format (json|full|condensed).
    #[arg(long = "errors", value_name = "FORMAT")]
    pub errors: Option<String>,

    /// Override the TeX engine (xelatex|lualatex|pdflatex).
    #[arg(long = "engine", value_name = "ENGINE")]
    pub engine: Option<String>,

    /// Override the compiler image.
    #[arg(long = "image", value_name = "IMAGE")]
    pub image: Option<String>,

    /// Add a search path for attachments; may be repeated. Replaces the
    /// configured list.
    #[arg(long = "lookup-path", value_name = "DIR", value_hint = ValueHint::DirPath)]
    pub lookup_paths: Vec<PathBuf>,

    /// Override the checksum cache capacity.
    #[arg(long = "checksum-cache-capacity", value_name = "COUNT")]
    pub checksum_cache_capacity: Option<usize>,

    /// Override the compilation error policy (raise|stderr|ignore).
    #[arg(long = "error-handler", value_name = "POLICY")]
    pub error_handler: Option<String>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,
}
