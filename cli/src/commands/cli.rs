use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "prorab", about = "LLM shopping assistant for the storefront")]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP API server
    Serve(ServeArgs),
    /// Run one query through the recommendation pipeline and print the result
    Ask(AskArgs),
    /// Print the key-pool health snapshot
    Keys,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ServeArgs {
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, default_value_t = 8080)]
    pub port: u16,

    /// Reuse an existing session id instead of generating one.
    #[arg(long)]
    pub session_id: Option<String>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct AskArgs {
    #[arg(long)]
    pub query: String,

    #[arg(long)]
    pub max_results: Option<usize>,

    /// Category id hint, as if the shopper was browsing that page.
    #[arg(long)]
    pub category: Option<String>,

    /// Print the raw JSON response instead of a readable summary.
    #[arg(long)]
    pub json: bool,
}
