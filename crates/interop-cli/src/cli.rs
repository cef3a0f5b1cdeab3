use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "vtprobe")]
#[command(about = "Exercise pointer handles and vtable resolution against in-process objects")]
pub struct Cli {
    /// Resolver configuration file (JSON)
    #[arg(short, long, global = true, env = "VTPROBE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the binding cache eviction window, in seconds
    #[arg(long, global = true)]
    pub eviction_secs: Option<f64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Resolve and call every vtable slot of synthetic native objects
    Probe {
        /// Number of object instances sharing one vtable
        #[arg(short, long, default_value_t = 2)]
        instances: usize,

        /// Worker threads resolving concurrently
        #[arg(short, long, default_value_t = 4)]
        threads: usize,

        /// Resolutions per thread and slot
        #[arg(short, long, default_value_t = 100)]
        rounds: usize,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Allocate, use and release owned pointer handles
    Handle {
        /// Number of handles to create
        #[arg(short = 'n', long, default_value_t = 8)]
        count: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_probe_defaults() {
        let cli = Cli::try_parse_from(["vtprobe", "probe"]).unwrap();
        assert!(cli.config.is_none());
        match cli.command {
            Command::Probe {
                instances,
                threads,
                rounds,
                json,
            } => {
                assert_eq!((instances, threads, rounds), (2, 4, 100));
                assert!(!json);
            }
            Command::Handle { .. } => panic!("expected probe"),
        }
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["vtprobe", "handle", "-n", "3", "--eviction-secs", "0.5"]).unwrap();
        assert_eq!(cli.eviction_secs, Some(0.5));
        assert!(matches!(cli.command, Command::Handle { count: 3 }));
    }
}
