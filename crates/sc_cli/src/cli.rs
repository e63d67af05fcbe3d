use clap::{Args, Parser, Subcommand};

use crate::providers::ProviderOverrides;

/// Chat with a local language model from the terminal.
#[derive(Parser, Debug)]
#[command(name = "sc")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Model server base URL, e.g. http://localhost:11434
    #[arg(long, global = true, value_name = "URL")]
    pub base_url: Option<String>,

    /// Backend to use (ollama, mock)
    #[arg(long, global = true, value_name = "ID")]
    pub provider: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send one message, or start an interactive session
    Chat(ChatArgs),

    /// Read and edit the config file
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Args, Debug, Default)]
pub struct ChatArgs {
    /// Model to chat with
    #[arg(short, long)]
    pub model: Option<String>,

    /// Message to send; read from piped stdin when omitted
    pub message: Option<String>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Create the config directory and an empty config file
    Init,
    /// Print every setting as key=value
    List,
    /// Print one setting
    Get { key: String },
    /// Set one or more KEY=VALUE pairs
    Set {
        #[arg(required = true, value_name = "KEY=VALUE")]
        assignments: Vec<String>,
    },
    /// Remove one or more settings
    Unset {
        #[arg(required = true, value_name = "KEY")]
        keys: Vec<String>,
    },
    /// Print the config directory
    Dir,
}

impl Cli {
    pub fn overrides(&self, model: Option<&str>) -> ProviderOverrides {
        ProviderOverrides {
            provider: self.provider.clone(),
            base_url: self.base_url.clone(),
            model: model.map(str::to_string),
        }
    }
}
