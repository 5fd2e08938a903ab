//! Access to the hidden memory spaces of the 51nb X210/X2100 embedded controller
//!
//! The EC exposes, next to the standard ACPI register space, a 16 MiB RAM
//! space and a GPIO space. Both are reached through vendor commands on the
//! regular ACPI EC command/data port pair, by busy-polling the status flags.
//!
//! Layers, from the ports up:
//! - [`channel`]: handshake primitives (command, data, events)
//! - [`space`]: ordered command sequences per address space
//! - [`stream`]: offset/length requests on top of the sequences
//! - [`endpoint`]: the named endpoints that tools bind to

use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod channel;
pub mod endpoint;
pub mod portio;
pub mod protocol;
#[cfg(test)]
pub(crate) mod sim;
pub mod space;
pub mod stream;

use channel::Channel;
pub use channel::{DataRead, Delay, SystemDelay};
pub use endpoint::Endpoint;
pub use portio::PortIo;
pub use protocol::Status;
pub use stream::{AddressSpace, BufferFault, ByteSink, ByteSource};

#[derive(Debug, thiserror::Error)]
pub enum EcError {
    /// A status flag did not reach the expected state within the poll limit
    #[error("Timeout waiting for {waiting_for} (last status {status:?})")]
    Timeout {
        waiting_for: &'static str,
        status: Status,
    },
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// Mutating call while write support is disabled
    #[error("Write support is disabled")]
    PermissionDenied,
    /// The caller's buffer could not be accessed before any byte was moved
    #[error("Buffer not accessible")]
    Fault,
    #[error("Device error: {0}")]
    DeviceError(String),
    #[error("Config error: {0}")]
    Config(String),
}

impl EcError {
    /// Negative errno as a kernel style byte stream would return it
    pub fn errno(&self) -> i32 {
        match self {
            EcError::Timeout { .. } => -62, // ETIME
            EcError::InvalidArgument(_) => -22,
            EcError::PermissionDenied => -1,
            EcError::Fault => -14,
            EcError::DeviceError(_) | EcError::Config(_) => -5,
        }
    }
}

pub type EcResult<T> = Result<T, EcError>;

/// Everything needed to build a device handle. Fixed for its lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EcSettings {
    pub command_port: u16,
    pub data_port: u16,
    /// Allow any mutating operation. Off by default, writing can hang the EC
    /// until the battery is removed.
    pub write_support: bool,
    /// GPE the EC raises its SCI on. Only informational.
    pub gpe: u32,
    /// Whether firmware asks for the ACPI global lock around EC access.
    /// Only informational.
    pub global_lock: bool,
    pub poll_limit: u32,
}

impl Default for EcSettings {
    fn default() -> Self {
        EcSettings {
            command_port: protocol::EC_ADDR_ACPI_CMD,
            data_port: protocol::EC_ADDR_ACPI_DATA,
            write_support: false,
            gpe: 0,
            global_lock: false,
            poll_limit: protocol::POLL_LIMIT,
        }
    }
}

/// Handle to the one embedded controller
///
/// All multi-step transactions run under the channel lock, so their bytes
/// never interleave on the ports. The port level transactions are private to
/// the crate, the checked methods on `Ec` are the only way in:
///
/// ```compile_fail
/// # use x2100_lib::ec::{Ec, EcSettings, PortIo};
/// # struct Ports;
/// # impl PortIo for Ports {
/// #     fn inb(&mut self, _port: u16) -> u8 { 0 }
/// #     fn outb(&mut self, _port: u16, _value: u8) {}
/// # }
/// let ec = Ec::new(Ports, &EcSettings::default());
/// ec.lock().ram_write(0x10, 0xAA).unwrap();
/// ```
pub struct Ec<P: PortIo, D: Delay = SystemDelay> {
    channel: Mutex<Channel<P, D>>,
    write_support: bool,
    gpe: u32,
    global_lock: bool,
}

impl<P: PortIo> Ec<P, SystemDelay> {
    pub fn new(io: P, settings: &EcSettings) -> Self {
        Self::with_delay(io, SystemDelay::default(), settings)
    }
}

impl<P: PortIo, D: Delay> Ec<P, D> {
    pub fn with_delay(io: P, delay: D, settings: &EcSettings) -> Self {
        debug!(
            "EC at cmd={:#X} data={:#X}, write support: {}",
            settings.command_port, settings.data_port, settings.write_support
        );
        Ec {
            channel: Mutex::new(Channel::new(
                io,
                delay,
                settings.command_port,
                settings.data_port,
                settings.poll_limit,
            )),
            write_support: settings.write_support,
            gpe: settings.gpe,
            global_lock: settings.global_lock,
        }
    }

    pub fn write_support(&self) -> bool {
        self.write_support
    }

    pub fn gpe(&self) -> u32 {
        self.gpe
    }

    pub fn uses_global_lock(&self) -> bool {
        self.global_lock
    }

    /// Take the channel for a whole transaction. Released when the guard drops.
    pub(crate) fn lock(&self) -> MutexGuard<'_, Channel<P, D>> {
        // A panic mid-transaction leaves nothing half-updated in the channel
        // itself, the EC recovers on the next 0x82/flush.
        self.channel.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn check_writable(&self) -> EcResult<()> {
        if self.write_support {
            Ok(())
        } else {
            Err(EcError::PermissionDenied)
        }
    }

    /// Give back the port capability, e.g. to inspect a simulated EC
    pub fn into_inner(self) -> P {
        self.channel
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .into_io()
    }
}
