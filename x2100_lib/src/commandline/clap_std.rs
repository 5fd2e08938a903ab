//! Commandline parsing with clap
use clap::Parser;
use clap_num::maybe_hex;

use crate::commandline::{Cli, EndpointArg, LogLevel};

/// Inspect the hidden memory spaces of the 51nb X210/X2100 embedded controller
#[derive(Parser)]
#[command(version, arg_required_else_help = true)]
struct ClapCli {
    #[command(flatten)]
    verbosity: clap_verbosity_flag::Verbosity,

    /// Show EC diagnostics and the available endpoints
    #[arg(long)]
    info: bool,

    /// Read from an endpoint and print a hexdump
    #[clap(value_enum)]
    #[arg(long, value_name = "ENDPOINT")]
    read: Option<EndpointArg>,

    /// Write to an endpoint (needs --write-support)
    #[clap(value_enum)]
    #[arg(long, value_name = "ENDPOINT", requires = "payload")]
    write: Option<EndpointArg>,

    /// Offset into the endpoint
    #[arg(long, value_parser=maybe_hex::<u64>, default_value_t = 0)]
    offset: u64,

    /// Number of bytes to read [default: rest of the endpoint, at most 256]
    #[arg(long, value_parser=maybe_hex::<usize>)]
    length: Option<usize>,

    /// Store the bytes read in a file instead of printing them
    #[arg(long, requires = "read")]
    output: Option<std::path::PathBuf>,

    /// Bytes to write
    #[arg(long, group = "payload", num_args = 1.., value_parser=maybe_hex::<u8>)]
    data: Vec<u8>,

    /// Write the contents of a file
    #[arg(long, group = "payload")]
    input: Option<std::path::PathBuf>,

    /// Wait for and print this many SCI events
    #[arg(long, value_name = "COUNT")]
    sci: Option<usize>,

    /// Set the fan timer (needs --write-support)
    #[arg(long, value_parser=maybe_hex::<u8>)]
    fan_timer: Option<u8>,

    /// Set the fan speed (needs --write-support)
    #[arg(long, value_parser=maybe_hex::<u8>)]
    fan_speed: Option<u8>,

    /// Config file [default: x2100_tool_config.toml next to the binary or in the working directory]
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    /// Allow writes. Dangerous, reboot and removal of battery may be needed!
    #[arg(long)]
    write_support: bool,

    /// EC command/status port
    #[arg(long, value_parser=maybe_hex::<u16>)]
    command_port: Option<u16>,

    /// EC data port
    #[arg(long, value_parser=maybe_hex::<u16>)]
    data_port: Option<u16>,
}

/// Parse a list of commandline arguments and return the struct
pub fn parse(args: &[String]) -> Cli {
    let args = ClapCli::parse_from(args);

    Cli {
        verbosity: LogLevel(args.verbosity.log_level_filter()),
        info: args.info,
        read: args.read.map(Into::into),
        write: args.write.map(Into::into),
        offset: args.offset,
        length: args.length,
        output: args
            .output
            .map(|x| x.to_string_lossy().into_owned()),
        data: args.data,
        input: args.input.map(|x| x.to_string_lossy().into_owned()),
        sci: args.sci,
        fan_timer: args.fan_timer,
        fan_speed: args.fan_speed,
        config: args.config.map(|x| x.to_string_lossy().into_owned()),
        write_support: args.write_support,
        command_port: args.command_port,
        data_port: args.data_port,
    }
}
