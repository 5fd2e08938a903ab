//! Handshake primitives on the command/status and data port
//!
//! There are no interrupts. Every primitive polls the status port a bounded
//! number of times, sleeping a little between two reads.

use super::portio::PortIo;
use super::protocol::*;
use super::{EcError, EcResult};
use crate::os_specific;

/// Backoff between two status polls
pub trait Delay {
    /// Sleep at least `min_us`, ideally no longer than `max_us` microseconds
    fn sleep_range(&mut self, min_us: u64, max_us: u64);
}

/// Waits below this many microseconds spin instead of sleeping
const SPIN_LIMIT_US: u64 = 100;

/// Waits a pseudo random time inside the requested range. Short waits spin,
/// a thread sleep would take about 50 µs of timer slack each.
#[derive(Debug, Clone)]
pub struct SystemDelay {
    jitter: u32,
}

impl Default for SystemDelay {
    fn default() -> Self {
        SystemDelay { jitter: 0x2545_F491 }
    }
}

impl SystemDelay {
    /// Next wait in `min_us..=max_us`
    fn pick(&mut self, min_us: u64, max_us: u64) -> u64 {
        if max_us <= min_us {
            return min_us;
        }
        // xorshift32
        let mut x = self.jitter;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.jitter = x;
        min_us + u64::from(x) % (max_us - min_us + 1)
    }
}

impl Delay for SystemDelay {
    fn sleep_range(&mut self, min_us: u64, max_us: u64) {
        let micros = self.pick(min_us, max_us);
        if micros < SPIN_LIMIT_US {
            os_specific::spin(micros)
        } else {
            os_specific::sleep(micros)
        }
    }
}

/// Byte read from the data port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataRead {
    pub value: u8,
    /// OBF never came up, `value` is whatever the data port held after the
    /// poll limit ran out.
    pub stale: bool,
}

/// Exclusive view of the two EC ports
///
/// Only reachable through `Ec::lock` inside this crate, so holding a
/// `&mut Channel` means holding the device lock.
pub(crate) struct Channel<P: PortIo, D: Delay> {
    io: P,
    delay: D,
    command_port: u16,
    data_port: u16,
    poll_limit: u32,
    last_status: Status,
    /// Stale bytes handed out by the space transactions
    stale_reads: u64,
}

impl<P: PortIo, D: Delay> Channel<P, D> {
    pub(crate) fn new(io: P, delay: D, command_port: u16, data_port: u16, poll_limit: u32) -> Self {
        Channel {
            io,
            delay,
            command_port,
            data_port,
            poll_limit,
            last_status: Status::default(),
            stale_reads: 0,
        }
    }

    pub(crate) fn into_io(self) -> P {
        self.io
    }

    #[cfg(test)]
    pub(crate) fn io(&self) -> &P {
        &self.io
    }

    #[cfg(test)]
    pub(crate) fn io_mut(&mut self) -> &mut P {
        &mut self.io
    }

    /// Status byte seen by the most recent poll, whatever its outcome
    #[cfg(test)]
    pub(crate) fn last_status(&self) -> Status {
        self.last_status
    }

    fn read_status(&mut self) -> Status {
        self.last_status = Status(self.io.inb(self.command_port));
        self.last_status
    }

    fn backoff(&mut self) {
        let (min, max) = HANDSHAKE_BACKOFF_US;
        self.delay.sleep_range(min, max);
    }

    fn timeout(&self, waiting_for: &'static str) -> EcError {
        warn!(
            "EC timeout waiting for {}, status: {:?}",
            waiting_for, self.last_status
        );
        EcError::Timeout {
            waiting_for,
            status: self.last_status,
        }
    }

    /// Wait for IBF to clear, then write `port`
    fn write_when_ready(&mut self, port: u16, value: u8) -> EcResult<()> {
        for _ in 0..self.poll_limit {
            if !self.read_status().input_buffer_full() {
                self.io.outb(port, value);
                return Ok(());
            }
            self.backoff();
        }
        Err(self.timeout("input buffer empty"))
    }

    /// Send a command byte
    pub(crate) fn write_command(&mut self, opcode: Opcode) -> EcResult<()> {
        trace!("  cmd  {:#04X} ({:?})", opcode as u8, opcode);
        self.write_when_ready(self.command_port, opcode as u8)
    }

    /// Send a data byte (address or value)
    pub(crate) fn write_data(&mut self, value: u8) -> EcResult<()> {
        trace!("  out  {:#04X}", value);
        self.write_when_ready(self.data_port, value)
    }

    /// Read a data byte once the EC has one ready
    ///
    /// Never fails. If OBF does not come up within the poll limit, the data
    /// port is read anyway and the result is flagged as stale. Sequenced
    /// operations pass the byte on through `deliver`.
    pub(crate) fn read_data(&mut self) -> EcResult<DataRead> {
        for _ in 0..=self.poll_limit {
            let status = self.read_status();
            if !status.input_buffer_full() && status.output_buffer_full() {
                let value = self.io.inb(self.data_port);
                trace!("  in   {:#04X}", value);
                return Ok(DataRead {
                    value,
                    stale: false,
                });
            }
            self.backoff();
        }

        let value = self.io.inb(self.data_port);
        debug!(
            "EC read data timed out (status {:?}), using stale value {:#04X}",
            self.last_status, value
        );
        Ok(DataRead { value, stale: true })
    }

    /// Hand out the byte read from `addr` in `space`. A stale one is counted
    /// and logged with its address.
    pub(crate) fn deliver(&mut self, read: DataRead, space: &str, addr: u32) -> u8 {
        if read.stale {
            self.stale_reads += 1;
            warn!(
                "{} read at {:#X} returned stale data {:#04X} (status {:?})",
                space, addr, read.value, self.last_status
            );
        }
        read.value
    }

    pub(crate) fn stale_reads(&self) -> u64 {
        self.stale_reads
    }

    /// Query and drop SCI events until none is pending
    pub(crate) fn flush_pending_events(&mut self) -> EcResult<()> {
        for _ in 0..self.poll_limit {
            if !self.read_status().sci_pending() {
                return Ok(());
            }
            self.write_command(Opcode::QueryEvent)?;
            let event = self.read_data()?;
            debug!("Dropped pending SCI event {:#04X}", event.value);
        }
        Err(self.timeout("SCI events to drain"))
    }

    /// Wait for the next SCI event and return its code
    pub(crate) fn poll_event(&mut self) -> EcResult<u8> {
        let (min, max) = EVENT_BACKOFF_US;
        for _ in 0..self.poll_limit {
            if self.read_status().sci_pending() {
                self.write_command(Opcode::QueryEvent)?;
                let event = self.read_data()?;
                debug!("SCI event {:#04X}", event.value);
                return Ok(event.value);
            }
            self.delay.sleep_range(min, max);
        }
        Err(self.timeout("SCI event"))
    }
}
