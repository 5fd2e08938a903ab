//! Named endpoints on top of the address spaces
//!
//! | Endpoint  | Size    | Access                 |
//! |-----------|---------|------------------------|
//! | io        | 256 B   | rw, writes gated       |
//! | ram       | 16 MiB  | rw, writes gated       |
//! | gpio      | 256 B   | rw, writes gated       |
//! | sci       | stream  | read only              |
//! | fan_timer | 1 B     | write only, gated      |
//! | fan_speed | 1 B     | write only, gated      |

use core::fmt;
use core::str::FromStr;

use super::channel::Delay;
use super::portio::PortIo;
use super::protocol::{EC_FAN_SPEED_REG, EC_FAN_TIMER_REG};
use super::stream::{AddressSpace, ByteSink, ByteSource};
use super::{Ec, EcError, EcResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Io,
    Ram,
    Gpio,
    /// Every byte read is one drained SCI event
    Sci,
    FanTimer,
    FanSpeed,
}

impl Endpoint {
    pub const ALL: [Endpoint; 6] = [
        Endpoint::Io,
        Endpoint::Sci,
        Endpoint::Ram,
        Endpoint::Gpio,
        Endpoint::FanTimer,
        Endpoint::FanSpeed,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Endpoint::Io => "io",
            Endpoint::Ram => "ram",
            Endpoint::Gpio => "gpio",
            Endpoint::Sci => "sci",
            Endpoint::FanTimer => "fan_timer",
            Endpoint::FanSpeed => "fan_speed",
        }
    }

    pub fn space(self) -> Option<AddressSpace> {
        match self {
            Endpoint::Io => Some(AddressSpace::Io),
            Endpoint::Ram => Some(AddressSpace::Ram),
            Endpoint::Gpio => Some(AddressSpace::Gpio),
            _ => None,
        }
    }

    /// Size in bytes, None for the event stream
    pub fn size(self) -> Option<u64> {
        match self {
            Endpoint::Sci => None,
            Endpoint::FanTimer | Endpoint::FanSpeed => Some(1),
            _ => self.space().map(AddressSpace::size),
        }
    }

    /// Unix permission bits the endpoint is exposed with
    pub fn mode(self, write_support: bool) -> u32 {
        match self {
            Endpoint::FanTimer | Endpoint::FanSpeed => 0o200,
            _ if write_support => 0o600,
            _ => 0o400,
        }
    }

    fn fan_register(self) -> Option<u8> {
        match self {
            Endpoint::FanTimer => Some(EC_FAN_TIMER_REG),
            Endpoint::FanSpeed => Some(EC_FAN_SPEED_REG),
            _ => None,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Endpoint {
    type Err = EcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Endpoint::ALL
            .into_iter()
            .find(|ep| ep.name() == s)
            .ok_or_else(|| EcError::InvalidArgument(format!("Unknown endpoint: {}", s)))
    }
}

impl<P: PortIo, D: Delay> Ec<P, D> {
    /// Read from an endpoint, like `read(2)` on the exposed file
    pub fn endpoint_read<S: ByteSink + ?Sized>(
        &self,
        endpoint: Endpoint,
        offset: u64,
        len: usize,
        sink: &mut S,
    ) -> EcResult<usize> {
        if let Some(space) = endpoint.space() {
            return self.read_space(space, offset, len, sink);
        }
        match endpoint {
            Endpoint::Sci => self.read_events(len, sink),
            _ => Err(EcError::InvalidArgument(format!(
                "{} is write only",
                endpoint
            ))),
        }
    }

    /// Write to an endpoint, like `write(2)` on the exposed file
    pub fn endpoint_write<S: ByteSource + ?Sized>(
        &self,
        endpoint: Endpoint,
        offset: u64,
        len: usize,
        source: &mut S,
    ) -> EcResult<usize> {
        if let Some(space) = endpoint.space() {
            return self.write_space(space, offset, len, source);
        }
        match endpoint.fan_register() {
            Some(register) => self.write_fan(register, offset, len, source),
            None => Err(EcError::InvalidArgument(format!(
                "{} is read only",
                endpoint
            ))),
        }
    }

    /// Drain `len` SCI events, holding the lock for the whole request.
    /// A timeout ends the request with an error, whatever was read before.
    fn read_events<S: ByteSink + ?Sized>(&self, len: usize, sink: &mut S) -> EcResult<usize> {
        let mut channel = self.lock();
        for i in 0..len {
            let event = channel.poll_event()?;
            if sink.store(i, event).is_err() {
                return if i > 0 { Ok(i) } else { Err(EcError::Fault) };
            }
        }
        Ok(len)
    }

    /// Single shot, only the first byte at offset 0 counts
    fn write_fan<S: ByteSource + ?Sized>(
        &self,
        register: u8,
        offset: u64,
        len: usize,
        source: &mut S,
    ) -> EcResult<usize> {
        self.check_writable()?;
        if len < 1 || offset > 0 {
            return Ok(0);
        }
        let value = source.fetch(0).map_err(|_| EcError::Fault)?;
        debug!("fan control {:#04X} = {:#04X}", register, value);
        self.lock().io_write(register, value)?;
        Ok(1)
    }
}
