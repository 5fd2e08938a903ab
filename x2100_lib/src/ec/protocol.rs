use core::fmt;

use num_derive::FromPrimitive;

// Status byte masks, read from the command/status port
/// EC has written data but host hasn't consumed it yet
pub const EC_STATUS_OBF: u8 = 0x01;
/// Host has written data/command but EC hasn't consumed it yet
pub const EC_STATUS_IBF: u8 = 0x02;
/// Previous host write was a command, not data
const EC_STATUS_CMD: u8 = 0x08;
/// EC is in burst mode
const EC_STATUS_BURST: u8 = 0x10;
/// SCI event is pending (requesting query)
pub const EC_STATUS_SCI: u8 = 0x20;

// I/O addresses of the ACPI EC interface
pub const EC_ADDR_ACPI_CMD: u16 = 0x66;
pub const EC_ADDR_ACPI_DATA: u16 = 0x62;

/// Size of the legacy register space reachable via the ACPI accessor
pub const EC_IO_SIZE: u32 = 0x100;
/// Size of the extended RAM space (24 bit addresses)
pub const EC_RAM_SIZE: u32 = 0x0100_0000;
/// Size of the GPIO space
pub const EC_GPIO_SIZE: u32 = 0x100;

/// Register selector of the fan timer control channel
pub const EC_FAN_TIMER_REG: u8 = 0x52;
/// Register selector of the fan speed control channel
pub const EC_FAN_SPEED_REG: u8 = 0x51;

/// Sub-selector of a word read returning the byte at the address itself
pub const EC_WORD_SEL_LOW: u8 = 0x00;
/// Sub-selector of a word read returning the byte after the address
pub const EC_WORD_SEL_HIGH: u8 = 0x02;

/// How often the status port is checked before giving up.
/// Together with the backoff below, this is in the low hundreds of ms.
pub const POLL_LIMIT: u32 = 65535;

/// Backoff between two status reads of a handshake, in microseconds
pub const HANDSHAKE_BACKOFF_US: (u64, u64) = (1, 5);
/// Backoff between two status reads while waiting for an SCI event
pub const EVENT_BACKOFF_US: (u64, u64) = (10, 50);

/// Command bytes written to the command port
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[repr(u8)]
pub enum Opcode {
    /// Standard ACPI read of a legacy register (RD_EC)
    ReadIo = 0x80,
    /// Standard ACPI write of a legacy register (WR_EC)
    WriteIo = 0x81,
    /// Enter addressing mode. EC answers with one acknowledgement byte
    EnterAddressing = 0x82,
    /// Leave addressing mode
    ExitAddressing = 0x83,
    /// Query the oldest pending SCI event (QR_EC)
    QueryEvent = 0x84,
    WriteRamWord = 0xB7,
    ReadRamWord = 0xB8,
    WriteGpio = 0xB9,
    ReadGpio = 0xBA,
    WriteRam = 0xBE,
    ReadRam = 0xBF,
}

/// Snapshot of the status port
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct Status(pub u8);

impl Status {
    pub fn input_buffer_full(self) -> bool {
        self.0 & EC_STATUS_IBF != 0
    }

    pub fn output_buffer_full(self) -> bool {
        self.0 & EC_STATUS_OBF != 0
    }

    pub fn sci_pending(self) -> bool {
        self.0 & EC_STATUS_SCI != 0
    }
}

impl fmt::Debug for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04X}", self.0)?;
        let names = [
            (EC_STATUS_OBF, "OBF"),
            (EC_STATUS_IBF, "IBF"),
            (EC_STATUS_CMD, "CMD"),
            (EC_STATUS_BURST, "BURST"),
            (EC_STATUS_SCI, "SCI"),
        ];
        let set: Vec<&str> = names
            .iter()
            .filter(|(mask, _)| self.0 & mask != 0)
            .map(|(_, name)| *name)
            .collect();
        if !set.is_empty() {
            write!(f, " [{}]", set.join("|"))?;
        }
        Ok(())
    }
}
