//! Command sequences against the IO, RAM and GPIO space
//!
//! RAM and GPIO accesses are bracketed by 0x82 (enter addressing mode, EC
//! answers with one byte) and 0x83. Stale SCI events are flushed right after
//! entering, otherwise a pending event byte could be read in place of data.
//! A failing step aborts the sequence on the spot, 0x83 is not sent then.
//!
//! The legacy IO space uses the plain ACPI RD_EC/WR_EC accessor without the
//! bracket. The two fan control channels are WR_EC writes to fixed selectors.

use super::channel::{Channel, Delay};
use super::portio::PortIo;
use super::protocol::*;
use super::{Ec, EcError, EcResult};

fn ram_addr_bytes(addr: u32) -> [u8; 3] {
    [(addr >> 16) as u8, (addr >> 8) as u8, addr as u8]
}

// Transaction bodies. The caller holds the device lock.
impl<P: PortIo, D: Delay> Channel<P, D> {
    fn addressed<T>(&mut self, body: impl FnOnce(&mut Self) -> EcResult<T>) -> EcResult<T> {
        self.write_command(Opcode::EnterAddressing)?;
        let ack = self.read_data()?;
        trace!("  addressing mode ack {:#04X}", ack.value);
        self.flush_pending_events()?;

        let value = body(self)?;

        self.write_command(Opcode::ExitAddressing)?;
        Ok(value)
    }

    fn send_ram_addr(&mut self, opcode: Opcode, addr: u32) -> EcResult<()> {
        self.write_command(opcode)?;
        for byte in ram_addr_bytes(addr) {
            self.write_data(byte)?;
        }
        Ok(())
    }

    pub(crate) fn ram_read(&mut self, addr: u32) -> EcResult<u8> {
        self.addressed(|ch| {
            ch.send_ram_addr(Opcode::ReadRam, addr)?;
            let read = ch.read_data()?;
            Ok(ch.deliver(read, "RAM", addr))
        })
    }

    pub(crate) fn ram_write(&mut self, addr: u32, value: u8) -> EcResult<()> {
        self.addressed(|ch| {
            ch.send_ram_addr(Opcode::WriteRam, addr)?;
            ch.write_data(value)
        })
    }

    /// Both bytes of an aligned word. Two 0xB8 reads on the same address,
    /// the sub-selector picks the byte.
    pub(crate) fn ram_read_word(&mut self, addr: u32) -> EcResult<[u8; 2]> {
        self.addressed(|ch| {
            let mut word = [0; 2];
            for (i, selector) in [EC_WORD_SEL_LOW, EC_WORD_SEL_HIGH].into_iter().enumerate() {
                ch.send_ram_addr(Opcode::ReadRamWord, addr)?;
                ch.write_data(selector)?;
                let read = ch.read_data()?;
                word[i] = ch.deliver(read, "RAM", addr + i as u32);
            }
            Ok(word)
        })
    }

    pub(crate) fn ram_write_word(&mut self, addr: u32, value: u16) -> EcResult<()> {
        self.addressed(|ch| {
            ch.send_ram_addr(Opcode::WriteRamWord, addr)?;
            let [low, high] = value.to_le_bytes();
            ch.write_data(low)?;
            ch.write_data(high)
        })
    }

    pub(crate) fn gpio_read(&mut self, addr: u8) -> EcResult<u8> {
        self.addressed(|ch| {
            ch.write_command(Opcode::ReadGpio)?;
            ch.write_data(addr)?;
            let read = ch.read_data()?;
            Ok(ch.deliver(read, "GPIO", addr.into()))
        })
    }

    pub(crate) fn gpio_write(&mut self, addr: u8, value: u8) -> EcResult<()> {
        self.addressed(|ch| {
            ch.write_command(Opcode::WriteGpio)?;
            ch.write_data(addr)?;
            ch.write_data(value)
        })
    }

    pub(crate) fn io_read(&mut self, addr: u8) -> EcResult<u8> {
        self.write_command(Opcode::ReadIo)?;
        self.write_data(addr)?;
        let read = self.read_data()?;
        Ok(self.deliver(read, "IO", addr.into()))
    }

    pub(crate) fn io_write(&mut self, addr: u8, value: u8) -> EcResult<()> {
        self.write_command(Opcode::WriteIo)?;
        self.write_data(addr)?;
        self.write_data(value)
    }
}

fn check_ram_addr(addr: u32) -> EcResult<()> {
    if addr >= EC_RAM_SIZE {
        return Err(EcError::InvalidArgument(format!(
            "RAM address {:#X} out of range",
            addr
        )));
    }
    Ok(())
}

fn check_word_aligned(addr: u32) -> EcResult<()> {
    check_ram_addr(addr)?;
    if addr & 1 != 0 {
        return Err(EcError::InvalidArgument(format!(
            "RAM word address {:#X} is not aligned",
            addr
        )));
    }
    Ok(())
}

// One locked transaction per call. Argument and permission checks happen
// before the lock is taken and before any port is touched.
impl<P: PortIo, D: Delay> Ec<P, D> {
    pub fn read_ram(&self, addr: u32) -> EcResult<u8> {
        check_ram_addr(addr)?;
        debug!("read_ram({:#08X})", addr);
        self.lock().ram_read(addr)
    }

    pub fn write_ram(&self, addr: u32, value: u8) -> EcResult<()> {
        self.check_writable()?;
        check_ram_addr(addr)?;
        debug!("write_ram({:#08X}, {:#04X})", addr, value);
        self.lock().ram_write(addr, value)
    }

    pub fn read_ram_word(&self, addr: u32) -> EcResult<[u8; 2]> {
        check_word_aligned(addr)?;
        debug!("read_ram_word({:#08X})", addr);
        self.lock().ram_read_word(addr)
    }

    /// Write `value` little endian to `addr` and `addr + 1`
    pub fn write_ram_word(&self, addr: u32, value: u16) -> EcResult<()> {
        self.check_writable()?;
        check_word_aligned(addr)?;
        debug!("write_ram_word({:#08X}, {:#06X})", addr, value);
        self.lock().ram_write_word(addr, value)
    }

    pub fn read_gpio(&self, addr: u8) -> EcResult<u8> {
        debug!("read_gpio({:#04X})", addr);
        self.lock().gpio_read(addr)
    }

    pub fn write_gpio(&self, addr: u8, value: u8) -> EcResult<()> {
        self.check_writable()?;
        debug!("write_gpio({:#04X}, {:#04X})", addr, value);
        self.lock().gpio_write(addr, value)
    }

    pub fn read_io(&self, addr: u8) -> EcResult<u8> {
        debug!("read_io({:#04X})", addr);
        self.lock().io_read(addr)
    }

    pub fn write_io(&self, addr: u8, value: u8) -> EcResult<()> {
        self.check_writable()?;
        debug!("write_io({:#04X}, {:#04X})", addr, value);
        self.lock().io_write(addr, value)
    }

    pub fn set_fan_timer(&self, value: u8) -> EcResult<()> {
        self.check_writable()?;
        debug!("set_fan_timer({:#04X})", value);
        self.lock().io_write(EC_FAN_TIMER_REG, value)
    }

    pub fn set_fan_speed(&self, value: u8) -> EcResult<()> {
        self.check_writable()?;
        debug!("set_fan_speed({:#04X})", value);
        self.lock().io_write(EC_FAN_SPEED_REG, value)
    }

    /// Wait for the next SCI event
    pub fn poll_event(&self) -> EcResult<u8> {
        self.lock().poll_event()
    }

    /// Number of bytes handed out so far that the EC never signalled as
    /// ready. Compare before and after a read to tell if it may be stale.
    pub fn stale_reads(&self) -> u64 {
        self.lock().stale_reads()
    }
}
