//! Module to factor out commandline interaction
//! The binary only parses the arguments and hands them to [`run_with_args`].

pub mod clap_std;

use std::fs;
use std::path::Path;

use crate::config;
use crate::ec::{Delay, Ec, EcResult, EcSettings, Endpoint, PortIo};
use crate::util;

/// Without --length, reads stop after this many bytes
const DEFAULT_READ_LEN: u64 = 0x100;

#[derive(Clone, Debug, PartialEq)]
pub struct LogLevel(log::LevelFilter);

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel(log::LevelFilter::Error)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum EndpointArg {
    Io,
    Ram,
    Gpio,
    Sci,
    #[value(name = "fan_timer")]
    FanTimer,
    #[value(name = "fan_speed")]
    FanSpeed,
}

impl From<EndpointArg> for Endpoint {
    fn from(arg: EndpointArg) -> Self {
        match arg {
            EndpointArg::Io => Endpoint::Io,
            EndpointArg::Ram => Endpoint::Ram,
            EndpointArg::Gpio => Endpoint::Gpio,
            EndpointArg::Sci => Endpoint::Sci,
            EndpointArg::FanTimer => Endpoint::FanTimer,
            EndpointArg::FanSpeed => Endpoint::FanSpeed,
        }
    }
}

/// Parsed commandline, independent of clap
#[derive(Debug, Default)]
pub struct Cli {
    pub verbosity: LogLevel,
    pub info: bool,
    pub read: Option<Endpoint>,
    pub write: Option<Endpoint>,
    pub offset: u64,
    pub length: Option<usize>,
    pub output: Option<String>,
    pub data: Vec<u8>,
    pub input: Option<String>,
    pub sci: Option<usize>,
    pub fan_timer: Option<u8>,
    pub fan_speed: Option<u8>,
    pub config: Option<String>,
    pub write_support: bool,
    pub command_port: Option<u16>,
    pub data_port: Option<u16>,
}

pub fn parse(args: &[String]) -> Cli {
    clap_std::parse(args)
}

/// Config file first, then commandline overrides
fn settings_from_args(args: &Cli) -> EcResult<EcSettings> {
    let mut settings = config::load_config(args.config.as_deref().map(Path::new))?;
    if args.write_support {
        settings.write_support = true;
    }
    if let Some(port) = args.command_port {
        settings.command_port = port;
    }
    if let Some(port) = args.data_port {
        settings.data_port = port;
    }
    Ok(settings)
}

#[cfg(all(
    feature = "linux_pio",
    target_os = "linux",
    any(target_arch = "x86", target_arch = "x86_64")
))]
fn open_ec(settings: &EcSettings) -> EcResult<Ec<crate::ec::portio::HwPortIo>> {
    let io = crate::ec::portio::HwPortIo::open(settings.command_port, settings.data_port)?;
    Ok(Ec::new(io, settings))
}

#[cfg(not(all(
    feature = "linux_pio",
    target_os = "linux",
    any(target_arch = "x86", target_arch = "x86_64")
)))]
fn open_ec(_settings: &EcSettings) -> EcResult<Ec<Box<dyn PortIo>>> {
    Err(crate::ec::EcError::DeviceError(
        "Port I/O is not supported on this platform".to_string(),
    ))
}

pub fn run_with_args(args: &Cli) -> i32 {
    let mut builder = env_logger::Builder::from_default_env();
    builder.target(env_logger::Target::Stdout);
    builder.filter_level(args.verbosity.0);
    builder.init();

    let settings = match settings_from_args(args) {
        Ok(settings) => settings,
        Err(err) => {
            println!("{}", err);
            return 1;
        }
    };
    if args.info {
        print_info(&settings);
    }
    if !needs_ec(args) {
        return 0;
    }

    let ec = match open_ec(&settings) {
        Ok(ec) => ec,
        Err(err) => {
            println!("Failed to access the EC: {}", err);
            return 1;
        }
    };

    run_on(&ec, args)
}

/// Whether any requested action talks to the EC. `--info` alone does not.
fn needs_ec(args: &Cli) -> bool {
    args.read.is_some()
        || args.write.is_some()
        || args.sci.is_some()
        || args.fan_timer.is_some()
        || args.fan_speed.is_some()
}

/// Diagnostics only, shown without touching the ports
fn print_info(settings: &EcSettings) {
    println!("Embedded Controller");
    println!(
        "  Ports:          cmd={:#X} data={:#X}",
        settings.command_port, settings.data_port
    );
    println!("  GPE:            {:#X}", settings.gpe);
    println!("  Global Lock:    {}", settings.global_lock);
    println!("  Write Support:  {}", settings.write_support);
    println!("Endpoints");
    for endpoint in Endpoint::ALL {
        let size = match endpoint.size() {
            Some(size) => format!("{:#X}", size),
            None => "stream".to_string(),
        };
        println!(
            "  {:<10}  {:>10}  {:04o}",
            endpoint.name(),
            size,
            endpoint.mode(settings.write_support)
        );
    }
}

fn read_endpoint<P: PortIo, D: Delay>(
    ec: &Ec<P, D>,
    endpoint: Endpoint,
    args: &Cli,
) -> EcResult<Vec<u8>> {
    let len = match (args.length, endpoint.size()) {
        (Some(len), _) => len,
        (None, Some(size)) => std::cmp::min(size.saturating_sub(args.offset), DEFAULT_READ_LEN) as usize,
        (None, None) => 1,
    };
    let mut buffer = vec![0; len];
    let read = ec.endpoint_read(endpoint, args.offset, len, &mut buffer[..])?;
    buffer.truncate(read);
    Ok(buffer)
}

fn write_endpoint<P: PortIo, D: Delay>(
    ec: &Ec<P, D>,
    endpoint: Endpoint,
    data: &mut [u8],
    offset: u64,
) -> EcResult<usize> {
    let len = data.len();
    let written = ec.endpoint_write(endpoint, offset, len, data)?;
    if written < len {
        warn!("Short write to {}: {} of {} bytes", endpoint, written, len);
    }
    Ok(written)
}

/// Run all requested actions against `ec`. Returns the process exit code.
pub fn run_on<P: PortIo, D: Delay>(ec: &Ec<P, D>, args: &Cli) -> i32 {
    let mut failed = false;

    if let Some(endpoint) = args.read {
        let stale_before = ec.stale_reads();
        match read_endpoint(ec, endpoint, args) {
            Ok(buffer) => {
                let stale = ec.stale_reads() - stale_before;
                if stale > 0 {
                    println!(
                        "Warning: {} bytes were never signalled ready by the EC and may be stale",
                        stale
                    );
                }
                if let Some(path) = &args.output {
                    if let Err(err) = fs::write(path, &buffer) {
                        println!("Failed to write {}: {:?}", path, err);
                        failed = true;
                    } else {
                        println!("Dumped {} bytes to {}", buffer.len(), path);
                    }
                } else {
                    util::print_multiline_buffer(&buffer, args.offset as usize);
                }
            }
            Err(err) => {
                println!("Failed to read {}: {}", endpoint, err);
                failed = true;
            }
        }
    }

    if let Some(endpoint) = args.write {
        let data = match &args.input {
            Some(path) => fs::read(path).map_err(|err| {
                println!("Failed to read {}: {:?}", path, err);
            }),
            None => Ok(args.data.clone()),
        };
        if let Ok(mut data) = data {
            match write_endpoint(ec, endpoint, &mut data, args.offset) {
                Ok(written) => println!("Wrote {} bytes to {}", written, endpoint),
                Err(err) => {
                    println!("Failed to write {}: {}", endpoint, err);
                    failed = true;
                }
            }
        } else {
            failed = true;
        }
    }

    if let Some(count) = args.sci {
        let mut events = vec![0; count];
        match ec.endpoint_read(Endpoint::Sci, 0, count, &mut events[..]) {
            Ok(read) => {
                print!("SCI events: ");
                util::print_buffer(&events[..read]);
            }
            Err(err) => {
                println!("Failed to read SCI events: {}", err);
                failed = true;
            }
        }
    }

    for (endpoint, value) in [
        (Endpoint::FanTimer, args.fan_timer),
        (Endpoint::FanSpeed, args.fan_speed),
    ] {
        let Some(value) = value else {
            continue;
        };
        if let Err(err) = write_endpoint(ec, endpoint, &mut [value], 0) {
            println!("Failed to set {}: {}", endpoint, err);
            failed = true;
        }
    }

    if failed {
        1
    } else {
        0
    }
}
