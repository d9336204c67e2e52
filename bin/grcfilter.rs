use anyhow::{Context, Result};
use clap::Parser;
use grcfilter::query::{to_wire, CanonicalMappings, FilterParser, QueryBuilder};
use grcfilter::FilterConfig;
use std::io::Read;
use std::path::PathBuf;
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "grcfilter")]
#[command(about = "Compile GRC filter expressions into query API JSON", long_about = None)]
struct Args {
    /// Filter expression; read from stdin when omitted
    query: Option<String>,

    /// Wrap the filter in a full query request for this object type
    #[arg(long, env = "GRCFILTER_OBJECT")]
    object: Option<String>,

    /// JSON configuration file
    #[arg(long, env = "GRCFILTER_CONFIG")]
    config: Option<PathBuf>,

    /// JSON canonical mappings file used to check relevance filters
    #[arg(long, env = "GRCFILTER_MAPPINGS", requires = "object")]
    mappings: Option<PathBuf>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,
}

fn main() -> Result<()> {
    // Logs go to stderr so stdout stays valid JSON
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => FilterConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => FilterConfig::default(),
    };
    debug!("Configuration: {:?}", config);

    let text = match args.query {
        Some(q) => q,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading query from stdin")?;
            buf
        }
    };

    let input = text.trim_end_matches(&['\n', '\r'][..]);
    let parser = FilterParser::new(config.clone());
    let expression = match parser.parse(input) {
        Ok(expr) => expr,
        Err(err) => {
            let (line_number, line, column) = locate(input, err.column);
            eprintln!("{}", line);
            eprintln!("{:>width$}", "^", width = column);
            eprintln!("error: {}", err);
            if input.contains('\n') {
                eprintln!(" --> line {}, column {}", line_number, column);
            }
            std::process::exit(1);
        }
    };

    let output = match &args.object {
        Some(object) => {
            if let (Some(path), Some(expr)) = (&args.mappings, &expression) {
                let json = std::fs::read_to_string(path)
                    .with_context(|| format!("reading mappings from {}", path.display()))?;
                CanonicalMappings::from_json_str(&json)?.validate_relevance(expr, object)?;
            }
            let mut builder = QueryBuilder::new(object.as_str()).filter(expression);
            if let Some(page) = config.default_limit {
                builder = builder.limit(0, page)?;
            }
            serde_json::to_value(builder.build())?
        }
        None => match &expression {
            Some(expr) => to_wire(expr),
            None => serde_json::json!({}),
        },
    };

    info!("Compiled filter ({} chars)", input.chars().count());

    if args.pretty {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}", output);
    }

    Ok(())
}

/// Line number, line text and in-line column of a 1-based character column
/// counted over the whole input
fn locate(text: &str, column: usize) -> (usize, &str, usize) {
    let mut start = 0;
    let mut found = (1, text, column);
    for (index, line) in text.split('\n').enumerate() {
        found = (
            index + 1,
            line.trim_end_matches('\r'),
            column.saturating_sub(start).max(1),
        );
        let width = line.chars().count();
        if column <= start + width + 1 {
            break;
        }
        start += width + 1;
    }
    found
}
