use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "vigia-server", about = "Vigia emergency neighborhood chat server")]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/vigia.toml")]
    pub config: String,
}
