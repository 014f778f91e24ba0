use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "dap",
    about = "DA proxy: blob storage behind rollup commitments",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the proxy server
    Serve(ServeArgs),
    /// Validate a configuration file without starting the server
    CheckConfig(CheckConfigArgs),
    /// Wrap a raw commitment in a client-visible encoding
    Encode(EncodeArgs),
    /// Unwrap a client-visible commitment
    Decode(DecodeArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    /// TOML configuration file; built-in defaults are used when omitted
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Override the configured listen address
    #[arg(long)]
    pub bind: Option<SocketAddr>,
}

#[derive(Args)]
pub struct CheckConfigArgs {
    pub config: PathBuf,
}

#[derive(Args)]
pub struct EncodeArgs {
    /// Raw commitment as hex
    pub commitment: String,
    #[arg(short, long, default_value = "optimism_generic")]
    pub mode: String,
}

#[derive(Args)]
pub struct DecodeArgs {
    /// Encoded commitment as hex
    pub commitment: String,
    /// Commitment mode; detected from the leading byte when omitted
    #[arg(short, long)]
    pub mode: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_serve_defaults() {
        let cli = Cli::try_parse_from(["dap", "serve"]).unwrap();
        if let Command::Serve(args) = cli.command {
            assert!(args.config.is_none());
            assert!(args.bind.is_none());
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_serve_with_overrides() {
        let cli = Cli::try_parse_from(["dap", "serve", "-c", "proxy.toml", "--bind", "0.0.0.0:8080"]).unwrap();
        if let Command::Serve(args) = cli.command {
            assert_eq!(args.config, Some(PathBuf::from("proxy.toml")));
            assert_eq!(args.bind, Some("0.0.0.0:8080".parse().unwrap()));
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_serve_rejects_bad_bind() {
        assert!(Cli::try_parse_from(["dap", "serve", "--bind", "nowhere"]).is_err());
    }

    #[test]
    fn parse_check_config() {
        let cli = Cli::try_parse_from(["dap", "check-config", "proxy.toml"]).unwrap();
        assert!(matches!(cli.command, Command::CheckConfig(_)));
    }

    #[test]
    fn parse_encode_default_mode() {
        let cli = Cli::try_parse_from(["dap", "encode", "abcd"]).unwrap();
        if let Command::Encode(args) = cli.command {
            assert_eq!(args.mode, "optimism_generic");
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_decode_with_mode() {
        let cli = Cli::try_parse_from(["dap", "decode", "0x00abcd", "-m", "simple"]).unwrap();
        if let Command::Decode(args) = cli.command {
            assert_eq!(args.mode, Some("simple".into()));
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_global_flags() {
        let cli = Cli::try_parse_from(["dap", "--verbose", "--format", "json", "decode", "00ab"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.format, OutputFormat::Json));
    }
}
