//! Offset/length requests against one address space
//!
//! Follows regular file semantics: requests past the end move nothing,
//! requests reaching over the end are clipped, and a caller buffer that
//! becomes inaccessible midway results in a short transfer.

use super::channel::Delay;
use super::portio::PortIo;
use super::protocol::{EC_GPIO_SIZE, EC_IO_SIZE, EC_RAM_SIZE};
use super::{Ec, EcError, EcResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressSpace {
    /// Legacy ACPI register space
    Io,
    /// 24 bit extended RAM
    Ram,
    Gpio,
}

impl AddressSpace {
    pub fn size(self) -> u64 {
        match self {
            AddressSpace::Io => EC_IO_SIZE as u64,
            AddressSpace::Ram => EC_RAM_SIZE as u64,
            AddressSpace::Gpio => EC_GPIO_SIZE as u64,
        }
    }
}

/// The caller's buffer can't be accessed (anymore)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferFault;

/// Where the bytes of a write come from
pub trait ByteSource {
    fn fetch(&mut self, index: usize) -> Result<u8, BufferFault>;
}

/// Where the bytes of a read go to
pub trait ByteSink {
    fn store(&mut self, index: usize, value: u8) -> Result<(), BufferFault>;
}

impl ByteSource for [u8] {
    fn fetch(&mut self, index: usize) -> Result<u8, BufferFault> {
        self.get(index).copied().ok_or(BufferFault)
    }
}

impl ByteSink for [u8] {
    fn store(&mut self, index: usize, value: u8) -> Result<(), BufferFault> {
        let byte = self.get_mut(index).ok_or(BufferFault)?;
        *byte = value;
        Ok(())
    }
}

/// How a request walks through the space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stepping {
    Byte,
    /// Aligned 16 bit transactions, RAM only
    Word,
}

/// RAM requests with an even offset and an even length go word by word.
/// Everything else byte by byte.
pub fn stepping_for(space: AddressSpace, offset: u64, len: usize) -> Stepping {
    if space == AddressSpace::Ram && offset & 1 == 0 && len & 1 == 0 {
        Stepping::Word
    } else {
        Stepping::Byte
    }
}

/// Start address and clipped length, or None past the end of the space
fn clip(space: AddressSpace, offset: u64, len: usize) -> Option<(u32, usize)> {
    let size = space.size();
    if offset >= size {
        return None;
    }
    let len = std::cmp::min(len as u64, size - offset) as usize;
    Some((offset as u32, len))
}

/// Buffer went away after `done` bytes
fn short_transfer(done: usize) -> EcResult<usize> {
    if done > 0 {
        debug!("Buffer fault after {} bytes, partial transfer", done);
        Ok(done)
    } else {
        Err(EcError::Fault)
    }
}

impl<P: PortIo, D: Delay> Ec<P, D> {
    /// Read up to `len` bytes starting at `offset` into `sink`
    ///
    /// Returns how many bytes were stored. Protocol errors abort the request
    /// and are returned as they are, even if some bytes were moved already.
    pub fn read_space<S: ByteSink + ?Sized>(
        &self,
        space: AddressSpace,
        offset: u64,
        len: usize,
        sink: &mut S,
    ) -> EcResult<usize> {
        let Some((start, len)) = clip(space, offset, len) else {
            return Ok(0);
        };
        debug!(
            "read_space({:?}, offset={:#X}, len={:#X})",
            space, start, len
        );

        match (space, stepping_for(space, offset, len)) {
            (AddressSpace::Io, _) => {
                let mut channel = self.lock();
                for i in 0..len {
                    let value = channel.io_read((start as usize + i) as u8)?;
                    if sink.store(i, value).is_err() {
                        return short_transfer(i);
                    }
                }
            }
            (AddressSpace::Gpio, _) => {
                for i in 0..len {
                    let value = self.read_gpio((start as usize + i) as u8)?;
                    if sink.store(i, value).is_err() {
                        return short_transfer(i);
                    }
                }
            }
            (AddressSpace::Ram, Stepping::Byte) => {
                for i in 0..len {
                    let value = self.read_ram(start + i as u32)?;
                    if sink.store(i, value).is_err() {
                        return short_transfer(i);
                    }
                }
            }
            (AddressSpace::Ram, Stepping::Word) => {
                for i in (0..len).step_by(2) {
                    let [low, high] = self.read_ram_word(start + i as u32)?;
                    if sink.store(i, low).is_err() {
                        return short_transfer(i);
                    }
                    if sink.store(i + 1, high).is_err() {
                        return short_transfer(i + 1);
                    }
                }
            }
        }

        Ok(len)
    }

    /// Write up to `len` bytes from `source` starting at `offset`
    ///
    /// Fails with [`EcError::PermissionDenied`] right away if write support
    /// is off, wherever `offset` points.
    pub fn write_space<S: ByteSource + ?Sized>(
        &self,
        space: AddressSpace,
        offset: u64,
        len: usize,
        source: &mut S,
    ) -> EcResult<usize> {
        self.check_writable()?;
        let Some((start, len)) = clip(space, offset, len) else {
            return Ok(0);
        };
        debug!(
            "write_space({:?}, offset={:#X}, len={:#X})",
            space, start, len
        );

        match (space, stepping_for(space, offset, len)) {
            (AddressSpace::Io, _) => {
                let mut channel = self.lock();
                for i in 0..len {
                    let Ok(value) = source.fetch(i) else {
                        return short_transfer(i);
                    };
                    channel.io_write((start as usize + i) as u8, value)?;
                }
            }
            (AddressSpace::Gpio, _) => {
                for i in 0..len {
                    let Ok(value) = source.fetch(i) else {
                        return short_transfer(i);
                    };
                    self.write_gpio((start as usize + i) as u8, value)?;
                }
            }
            (AddressSpace::Ram, Stepping::Byte) => {
                for i in 0..len {
                    let Ok(value) = source.fetch(i) else {
                        return short_transfer(i);
                    };
                    self.write_ram(start + i as u32, value)?;
                }
            }
            (AddressSpace::Ram, Stepping::Word) => {
                for i in (0..len).step_by(2) {
                    let (Ok(low), Ok(high)) = (source.fetch(i), source.fetch(i + 1)) else {
                        return short_transfer(i);
                    };
                    self.write_ram_word(start + i as u32, u16::from_le_bytes([low, high]))?;
                }
            }
        }

        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ec::protocol::Opcode;
    use crate::ec::sim::{sim_ec, PortOp, SimEc};

    /// Buffer that faults from `fault_at` on
    struct FaultAt {
        data: Vec<u8>,
        fault_at: usize,
    }

    impl ByteSource for FaultAt {
        fn fetch(&mut self, index: usize) -> Result<u8, BufferFault> {
            if index >= self.fault_at {
                return Err(BufferFault);
            }
            self.data.as_mut_slice().fetch(index)
        }
    }

    impl ByteSink for FaultAt {
        fn store(&mut self, index: usize, value: u8) -> Result<(), BufferFault> {
            if index >= self.fault_at {
                return Err(BufferFault);
            }
            self.data.as_mut_slice().store(index, value)
        }
    }

    const SPACES: [AddressSpace; 3] = [AddressSpace::Io, AddressSpace::Ram, AddressSpace::Gpio];

    #[test]
    fn stepping_matrix() {
        use AddressSpace::*;
        assert_eq!(stepping_for(Ram, 0x10, 4), Stepping::Word);
        assert_eq!(stepping_for(Ram, 0x10, 3), Stepping::Byte);
        assert_eq!(stepping_for(Ram, 0x11, 4), Stepping::Byte);
        assert_eq!(stepping_for(Ram, 0x11, 3), Stepping::Byte);
        // Other spaces never use words
        assert_eq!(stepping_for(Io, 0x10, 4), Stepping::Byte);
        assert_eq!(stepping_for(Gpio, 0x10, 4), Stepping::Byte);
    }

    #[test]
    fn past_the_end_moves_nothing() {
        for space in SPACES {
            let ec = sim_ec(SimEc::new(), true);
            let mut buf = [0u8; 8];
            for offset in [space.size(), space.size() + 1, u64::MAX] {
                assert_eq!(ec.read_space(space, offset, 8, &mut buf[..]).unwrap(), 0);
                assert_eq!(ec.write_space(space, offset, 8, &mut buf[..]).unwrap(), 0);
            }
            assert!(ec.into_inner().ops.is_empty(), "{:?}", space);
        }
    }

    #[test]
    fn io_read_is_clipped_at_the_end() {
        let mut sim = SimEc::new();
        for (i, byte) in sim.io.iter_mut().enumerate() {
            *byte = i as u8;
        }
        let ec = sim_ec(sim, false);

        let mut buf = [0u8; 10];
        assert_eq!(ec.read_space(AddressSpace::Io, 250, 10, &mut buf[..]).unwrap(), 6);
        assert_eq!(&buf[..6], &[250, 251, 252, 253, 254, 255]);
        assert_eq!(&buf[6..], &[0; 4]);

        let sim = ec.into_inner();
        let addrs: Vec<Vec<u8>> = (250..=255).map(|addr| vec![addr]).collect();
        assert_eq!(sim.transactions(Opcode::ReadIo), addrs);
    }

    #[test]
    fn aligned_ram_read_goes_word_wise() {
        let mut sim = SimEc::new();
        for addr in 0x100..0x108 {
            sim.ram.insert(addr, addr as u8);
        }
        let ec = sim_ec(sim, false);

        let mut buf = [0u8; 8];
        assert_eq!(ec.read_space(AddressSpace::Ram, 0x100, 8, &mut buf[..]).unwrap(), 8);
        assert_eq!(buf, [0, 1, 2, 3, 4, 5, 6, 7]);
        let sim = ec.into_inner();
        // Two sub-selector reads per word
        assert_eq!(sim.transactions(Opcode::ReadRamWord).len(), 8);
        assert!(sim.transactions(Opcode::ReadRam).is_empty());
    }

    #[test]
    fn unaligned_ram_read_goes_byte_wise() {
        for (offset, len) in [(0x101, 4), (0x100, 3), (0x101, 3)] {
            let ec = sim_ec(SimEc::new(), false);
            let mut buf = [0u8; 4];
            assert_eq!(
                ec.read_space(AddressSpace::Ram, offset, len, &mut buf[..]).unwrap(),
                len
            );
            let sim = ec.into_inner();
            assert_eq!(sim.transactions(Opcode::ReadRam).len(), len);
            assert!(sim.transactions(Opcode::ReadRamWord).is_empty());
        }
    }

    #[test]
    fn ram_read_near_the_end() {
        let ec = sim_ec(SimEc::new(), false);
        let mut buf = [0u8; 4];
        let size = AddressSpace::Ram.size();
        // Exactly the last 4 bytes, two words
        assert_eq!(ec.read_space(AddressSpace::Ram, size - 4, 4, &mut buf[..]).unwrap(), 4);
        // Only 2 bytes left, clipped to the last word
        assert_eq!(ec.read_space(AddressSpace::Ram, size - 2, 4, &mut buf[..]).unwrap(), 2);
        let sim = ec.into_inner();
        assert_eq!(sim.transactions(Opcode::ReadRamWord).len(), 4 + 2);
    }

    #[test]
    fn ram_round_trip_both_paths() {
        let ec = sim_ec(SimEc::new(), true);

        let mut data = [0xDE, 0xAD, 0xBE, 0xEF];
        assert_eq!(ec.write_space(AddressSpace::Ram, 0x10, 4, &mut data[..]).unwrap(), 4);
        let mut data_odd = [0x01, 0x02, 0x03];
        assert_eq!(ec.write_space(AddressSpace::Ram, 0x21, 3, &mut data_odd[..]).unwrap(), 3);

        let mut buf = [0u8; 4];
        ec.read_space(AddressSpace::Ram, 0x10, 4, &mut buf[..]).unwrap();
        assert_eq!(buf, data);
        let mut buf = [0u8; 3];
        ec.read_space(AddressSpace::Ram, 0x21, 3, &mut buf[..]).unwrap();
        assert_eq!(buf, data_odd);

        let sim = ec.into_inner();
        assert_eq!(sim.transactions(Opcode::WriteRamWord).len(), 2);
        assert_eq!(sim.transactions(Opcode::WriteRam).len(), 3);
    }

    #[test]
    fn writes_are_denied_without_write_support() {
        for space in SPACES {
            let ec = sim_ec(SimEc::new(), false);
            let mut data = [1u8; 4];
            assert!(matches!(
                ec.write_space(space, 0, 4, &mut data[..]),
                Err(EcError::PermissionDenied)
            ));
            // Even past the end
            assert!(matches!(
                ec.write_space(space, u64::MAX, 4, &mut data[..]),
                Err(EcError::PermissionDenied)
            ));
            let mut buf = [0u8; 4];
            assert_eq!(ec.read_space(space, 0, 4, &mut buf[..]).unwrap(), 4);
            assert!(ec.into_inner().writes().iter().all(|op| !matches!(
                op,
                PortOp::Out(_, 0x81 | 0xB7 | 0xB9 | 0xBE)
            )));
        }
    }

    #[test]
    fn write_fault_midway_is_a_short_write() {
        for space in [AddressSpace::Ram, AddressSpace::Gpio, AddressSpace::Io] {
            let ec = sim_ec(SimEc::new(), true);
            let mut source = FaultAt {
                data: vec![0x11; 100],
                fault_at: 40,
            };
            assert_eq!(ec.write_space(space, 0, 100, &mut source).unwrap(), 40);
        }
    }

    #[test]
    fn write_fault_on_first_byte_is_an_error() {
        let ec = sim_ec(SimEc::new(), true);
        let mut source = FaultAt {
            data: vec![0x11; 100],
            fault_at: 0,
        };
        assert!(matches!(
            ec.write_space(AddressSpace::Ram, 0, 100, &mut source),
            Err(EcError::Fault)
        ));
        assert!(ec.into_inner().ops.is_empty());
    }

    #[test]
    fn word_write_fault_on_high_byte_drops_the_word() {
        let ec = sim_ec(SimEc::new(), true);
        let mut source = FaultAt {
            data: vec![0x22; 8],
            fault_at: 5,
        };
        // Words at 0 and 2 go out, the word at 4 can't be completed
        assert_eq!(ec.write_space(AddressSpace::Ram, 0, 8, &mut source).unwrap(), 4);
        assert_eq!(ec.into_inner().transactions(Opcode::WriteRamWord).len(), 2);
    }

    #[test]
    fn read_fault_reports_bytes_stored() {
        let ec = sim_ec(SimEc::new(), false);
        let mut sink = FaultAt {
            data: vec![0; 8],
            fault_at: 3,
        };
        // Word path, fault on the high byte of the second word
        assert_eq!(ec.read_space(AddressSpace::Ram, 0, 8, &mut sink).unwrap(), 3);

        let mut sink = FaultAt {
            data: vec![0; 8],
            fault_at: 0,
        };
        assert!(matches!(
            ec.read_space(AddressSpace::Gpio, 0, 8, &mut sink),
            Err(EcError::Fault)
        ));
    }

    #[test]
    fn protocol_errors_are_not_short_transfers() {
        let mut sim = SimEc::new();
        sim.io[0] = 0x42;
        // 0x80 and the address of the first byte get through, then the EC hangs
        sim.hang_after_writes = Some(2);
        let ec = sim_ec(sim, false);

        let mut buf = [0u8; 4];
        assert!(matches!(
            ec.read_space(AddressSpace::Io, 0, 4, &mut buf[..]),
            Err(EcError::Timeout { .. })
        ));
        assert_eq!(buf[0], 0x42);
    }
}
