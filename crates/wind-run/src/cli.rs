use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use itertools::Itertools;
use miette::{IntoDiagnostic, miette};
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt};
use wind_core::{
    DEFAULT_CACHE_ROOT, DEFAULT_MAX_DEPTH, DEFAULT_SOURCE_ROOT, DispatchOptions, Dispatcher,
    ProgramCache, RequestParams, Response,
};

#[derive(Parser, Debug)]
#[command(name = "wind")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(after_help = "# Examples:\n\n\
    ## To call a function with parameters:\n\
    wind users.list -p page=2\n\n\
    ## To run a batch of calls:\n\
    wind --batch 'a,Zj11c2Vycy5saXN0;b,Zj1zdGF0cw=='\n\n\
    ## To drop every compiled program:\n\
    wind --clear-cache")]
#[command(about = "Runs wind functions from the command line, one request per invocation.", long_about = None)]
pub struct Cli {
    /// Dotted function path, same as `-p f=PATH`
    #[arg(value_name = "FUNCTION")]
    function: Option<String>,

    /// Directory holding function sources
    #[arg(long, default_value = DEFAULT_SOURCE_ROOT)]
    source_root: PathBuf,

    /// Directory holding compiled programs
    #[arg(long, default_value = DEFAULT_CACHE_ROOT)]
    cache_root: PathBuf,

    /// Request parameter, repeatable
    #[arg(short, long = "param", value_name = "KEY=VALUE", value_parser = parse_param)]
    params: Vec<(String, String)>,

    /// Batch envelope: `label,base64(query);...`
    #[arg(long, value_name = "ENVELOPE")]
    batch: Option<String>,

    /// Request path used when no function is given, e.g. `/users/list`
    #[arg(long)]
    route: Option<String>,

    /// Value of the Accept header the request carries
    #[arg(long)]
    accept: Option<String>,

    /// Print the content type and headers before the body
    #[arg(short, long, default_value_t = false)]
    include_headers: bool,

    /// Deepest nested call allowed
    #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
    max_depth: u32,

    /// Delete compiled programs before running
    #[arg(long, default_value_t = false)]
    clear_cache: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_param(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got `{}`", s)),
    }
}

impl Cli {
    pub fn run(&self) -> miette::Result<()> {
        self.init_tracing();

        let cache = ProgramCache::new(self.source_root.clone(), self.cache_root.clone());

        if self.clear_cache {
            let removed = cache.clear().into_diagnostic()?;
            eprintln!("Removed {} compiled program(s)", removed);
            if self.function.is_none() && self.params.is_empty() && self.batch.is_none() {
                return Ok(());
            }
        }

        let params = self.request_params();
        if params.is_empty() && params.route().is_none() {
            return Err(miette!("No function given; pass FUNCTION, -p f=PATH, --route or --batch"));
        }

        debug!(params = params.len(), "dispatching");
        let options = DispatchOptions {
            max_depth: self.max_depth,
        };
        let response = Dispatcher::with_options(Arc::new(cache), options)
            .main(params)
            .into_diagnostic()?;

        let stdout = io::stdout();
        let mut handle = BufWriter::new(stdout.lock());
        self.write_response(&mut handle, &response).into_diagnostic()?;
        handle.flush().into_diagnostic()
    }

    fn request_params(&self) -> RequestParams {
        let mut params: RequestParams = self.params.iter().cloned().collect();

        if let Some(function) = &self.function {
            params.insert("f", function.as_str());
        }
        if let Some(envelope) = &self.batch {
            params.insert("rpkg", envelope.as_str());
        }

        params
            .with_route(self.route.as_deref())
            .with_accept(self.accept.as_deref())
    }

    fn write_response<W: Write>(&self, writer: &mut W, response: &Response) -> io::Result<()> {
        if self.include_headers {
            if let Some(content_type) = &response.content_type {
                writeln!(writer, "Content-Type: {}", content_type)?;
            }
            let headers = response
                .headers
                .iter()
                .map(|(name, value)| format!("{}: {}", name, value))
                .join("\n");
            if !headers.is_empty() {
                writeln!(writer, "{}", headers)?;
            }
            writeln!(writer)?;
        }

        write!(writer, "{}", response.body)?;
        if !response.body.is_empty() && !response.body.ends_with('\n') {
            writeln!(writer)?;
        }
        Ok(())
    }

    fn init_tracing(&self) {
        let default = match self.verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        };
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

        let _ = fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .try_init();
    }
}
