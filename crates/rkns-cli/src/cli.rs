use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "rkns",
    about = "RKNS: lossless containers for EDF/BDF recordings",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// TOML file with document settings
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Embed a foreign recording into a new RKNS store
    Convert(ConvertArgs),
    /// Report the format of each input
    Detect(DetectArgs),
    /// Summarize a store or a foreign recording
    Info(InfoArgs),
    /// Derive the standardized record of a store
    Populate(StoreArgs),
    /// Drop and derive the standardized record again
    Reset(StoreArgs),
    /// Write the embedded original file back out
    ExtractRaw(ExtractRawArgs),
    /// List the history log of a store
    History(StoreArgs),
    /// Show or change the channel mapping
    Remap(RemapArgs),
}

#[derive(Args)]
pub struct ConvertArgs {
    pub input: PathBuf,
    /// Store directory to create; must not exist
    pub output: PathBuf,
    /// Only embed the raw file, skip deriving /rkns
    #[arg(long)]
    pub no_populate: bool,
}

#[derive(Args)]
pub struct DetectArgs {
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
}

#[derive(Args)]
pub struct InfoArgs {
    pub path: PathBuf,
    /// Also print the group hierarchy
    #[arg(long)]
    pub tree: bool,
}

#[derive(Args)]
pub struct StoreArgs {
    pub store: PathBuf,
}

#[derive(Args)]
pub struct ExtractRawArgs {
    pub store: PathBuf,
    /// File to write; must not exist
    pub output: PathBuf,
}

#[derive(Args)]
pub struct RemapArgs {
    pub store: PathBuf,
    /// New standardized id for an original label, as LABEL=ID
    #[arg(long = "set", value_parser = parse_assignment)]
    pub assignments: Vec<(String, String)>,
}

fn parse_assignment(s: &str) -> Result<(String, String), String> {
    match s.rsplit_once('=') {
        Some((label, id)) if !label.is_empty() && !id.trim().is_empty() => {
            Ok((label.to_string(), id.trim().to_string()))
        }
        _ => Err(format!("expected LABEL=ID, got {s:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_convert() {
        let cli = Cli::try_parse_from(["rkns", "convert", "night.edf", "night.rkns"]).unwrap();
        if let Command::Convert(args) = cli.command {
            assert_eq!(args.input, PathBuf::from("night.edf"));
            assert_eq!(args.output, PathBuf::from("night.rkns"));
            assert!(!args.no_populate);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_convert_no_populate() {
        let cli = Cli::try_parse_from(["rkns", "convert", "--no-populate", "a.bdf", "b"]).unwrap();
        if let Command::Convert(args) = cli.command {
            assert!(args.no_populate);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_detect_needs_a_path() {
        assert!(Cli::try_parse_from(["rkns", "detect"]).is_err());
        let cli = Cli::try_parse_from(["rkns", "detect", "a.edf", "b.bdf"]).unwrap();
        if let Command::Detect(args) = cli.command {
            assert_eq!(args.paths.len(), 2);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_info_tree() {
        let cli = Cli::try_parse_from(["rkns", "info", "--tree", "night.rkns"]).unwrap();
        if let Command::Info(args) = cli.command {
            assert!(args.tree);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_store_commands() {
        for name in ["populate", "reset", "history"] {
            let cli = Cli::try_parse_from(["rkns", name, "night.rkns"]).unwrap();
            assert!(matches!(
                cli.command,
                Command::Populate(_) | Command::Reset(_) | Command::History(_)
            ));
        }
    }

    #[test]
    fn parse_extract_raw() {
        let cli = Cli::try_parse_from(["rkns", "extract-raw", "night.rkns", "copy.edf"]).unwrap();
        if let Command::ExtractRaw(args) = cli.command {
            assert_eq!(args.output, PathBuf::from("copy.edf"));
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_remap_assignments() {
        let cli = Cli::try_parse_from([
            "rkns", "remap", "night.rkns", "--set", "EEG Fp1=Fp1", "--set", "A=B=C",
        ])
        .unwrap();
        if let Command::Remap(args) = cli.command {
            assert_eq!(
                args.assignments,
                vec![("EEG Fp1".into(), "Fp1".into()), ("A=B".into(), "C".into())]
            );
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_remap_rejects_bad_assignment() {
        assert!(Cli::try_parse_from(["rkns", "remap", "s", "--set", "novalue"]).is_err());
        assert!(Cli::try_parse_from(["rkns", "remap", "s", "--set", "label="]).is_err());
    }

    #[test]
    fn parse_verbose() {
        let cli = Cli::try_parse_from(["rkns", "--verbose", "history", "s"]).unwrap();
        assert!(cli.verbose);
    }

    #[test]
    fn parse_json_format_and_config() {
        let cli =
            Cli::try_parse_from(["rkns", "info", "s", "--format", "json", "--config", "r.toml"])
                .unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.config, Some(PathBuf::from("r.toml")));
    }
}
