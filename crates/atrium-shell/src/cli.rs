use clap::Parser;

/// Atrium: cross-frame messaging substrate for a micro-frontend shell.
#[derive(Parser, Debug)]
#[command(name = "atrium", version, about)]
pub struct Args {
    /// Log level override (debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Extra allowed origin prefix for the demo tree (repeatable).
    #[arg(long = "allow-origin")]
    pub allowed_origins: Vec<String>,
}

pub fn parse() -> Args {
    Args::parse()
}
