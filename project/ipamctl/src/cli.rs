use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "ipamctl", version, about = "CNI IP address allocator CLI")]
pub struct Cli {
    /// Allocator config file
    #[arg(short, long, default_value = "/etc/zhongcni/ipam.yaml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Allocate one address from a segment and print it
    Allocate {
        #[arg(short, long)]
        segment: String,
        /// Give up after this many seconds, overriding the config file
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// Print the usage record of a segment
    Show {
        #[arg(short, long)]
        segment: String,
    },
    /// List every key stored under the application prefix
    Dump,
}
