//! Output formatting

use clap::ValueEnum;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Yaml,
}

impl OutputFormat {
    /// Print structured formats; returns false for table so the caller renders it
    pub fn print<T: Serialize>(&self, data: &T) -> anyhow::Result<bool> {
        match self {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(data)?);
                Ok(true)
            }
            OutputFormat::Yaml => {
                print!("{}", serde_yaml::to_string(data)?);
                Ok(true)
            }
            OutputFormat::Table => Ok(false),
        }
    }
}
