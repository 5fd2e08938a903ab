//! Software EC for tests
//!
//! Consumes commands instantly, so IBF is only ever set when asked for.
//! Every port access is recorded.

use std::collections::{HashMap, VecDeque};

use num_traits::FromPrimitive;

use super::channel::Delay;
use super::portio::PortIo;
use super::protocol::*;
use super::{Ec, EcSettings};

pub const SIM_CMD: u16 = EC_ADDR_ACPI_CMD;
pub const SIM_DATA: u16 = EC_ADDR_ACPI_DATA;

/// Byte the EC answers 0x82 with
pub const SIM_ACK: u8 = 0xA5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortOp {
    In(u16, u8),
    Out(u16, u8),
}

pub struct SimEc {
    pub ops: Vec<PortOp>,
    /// Commands the EC executed, with their data bytes
    pub completed: Vec<(Opcode, Vec<u8>)>,
    pub io: [u8; 256],
    pub gpio: [u8; 256],
    pub ram: HashMap<u32, u8>,
    pub sci_events: VecDeque<u8>,
    pub ibf_stuck: bool,
    /// IBF sticks once this many bytes were written
    pub hang_after_writes: Option<usize>,
    /// Commands still execute, but OBF never comes up
    pub silent: bool,
    /// Returned by the data port when nothing is queued
    pub data_latch: u8,
    pub addressing: bool,
    output: VecDeque<u8>,
    status_script: VecDeque<u8>,
    command: Option<Opcode>,
    args: Vec<u8>,
}

fn arg_len(op: Opcode) -> usize {
    match op {
        Opcode::EnterAddressing | Opcode::ExitAddressing | Opcode::QueryEvent => 0,
        Opcode::ReadIo | Opcode::ReadGpio => 1,
        Opcode::WriteIo | Opcode::WriteGpio => 2,
        Opcode::ReadRam => 3,
        Opcode::WriteRam | Opcode::ReadRamWord => 4,
        Opcode::WriteRamWord => 5,
    }
}

fn ram_addr(args: &[u8]) -> u32 {
    (args[0] as u32) << 16 | (args[1] as u32) << 8 | args[2] as u32
}

impl SimEc {
    pub fn new() -> Self {
        SimEc {
            ops: vec![],
            completed: vec![],
            io: [0; 256],
            gpio: [0; 256],
            ram: HashMap::new(),
            sci_events: VecDeque::new(),
            ibf_stuck: false,
            hang_after_writes: None,
            silent: false,
            data_latch: 0,
            addressing: false,
            output: VecDeque::new(),
            status_script: VecDeque::new(),
            command: None,
            args: vec![],
        }
    }

    /// Status bytes returned by the next status reads, before falling back to
    /// the computed status
    pub fn script_status(&mut self, script: &[u8]) {
        self.status_script.extend(script);
    }

    pub fn push_output(&mut self, value: u8) {
        self.output.push_back(value);
    }

    pub fn raise_event(&mut self, event: u8) {
        self.sci_events.push_back(event);
    }

    pub fn writes(&self) -> Vec<PortOp> {
        self.ops
            .iter()
            .filter(|op| matches!(op, PortOp::Out(..)))
            .copied()
            .collect()
    }

    pub fn status_reads(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, PortOp::In(SIM_CMD, _)))
            .count()
    }

    /// Data bytes of every executed command with this opcode
    pub fn transactions(&self, opcode: Opcode) -> Vec<Vec<u8>> {
        self.completed
            .iter()
            .filter(|(op, _)| *op == opcode)
            .map(|(_, args)| args.clone())
            .collect()
    }

    fn status(&mut self) -> u8 {
        if let Some(scripted) = self.status_script.pop_front() {
            return scripted;
        }
        let mut status = 0;
        let written = self.writes().len();
        if self.ibf_stuck || self.hang_after_writes.is_some_and(|n| written >= n) {
            status |= EC_STATUS_IBF;
        }
        if !self.output.is_empty() && !self.silent {
            status |= EC_STATUS_OBF;
        }
        if !self.sci_events.is_empty() {
            status |= EC_STATUS_SCI;
        }
        status
    }

    fn command(&mut self, byte: u8) {
        let Some(op) = Opcode::from_u8(byte) else {
            self.command = None;
            return;
        };
        self.args.clear();
        if arg_len(op) == 0 {
            self.execute(op);
        } else {
            self.command = Some(op);
        }
    }

    fn data(&mut self, byte: u8) {
        let Some(op) = self.command else {
            return;
        };
        self.args.push(byte);
        if self.args.len() == arg_len(op) {
            self.command = None;
            self.execute(op);
        }
    }

    fn execute(&mut self, op: Opcode) {
        let args = std::mem::take(&mut self.args);
        match op {
            Opcode::EnterAddressing => {
                self.addressing = true;
                self.output.push_back(SIM_ACK);
            }
            Opcode::ExitAddressing => self.addressing = false,
            Opcode::QueryEvent => {
                let event = self.sci_events.pop_front().unwrap_or(0);
                self.output.push_back(event);
            }
            Opcode::ReadIo => self.output.push_back(self.io[args[0] as usize]),
            Opcode::WriteIo => self.io[args[0] as usize] = args[1],
            _ => {
                assert!(self.addressing, "{:?} outside of addressing mode", op);
                match op {
                    Opcode::ReadGpio => self.output.push_back(self.gpio[args[0] as usize]),
                    Opcode::WriteGpio => self.gpio[args[0] as usize] = args[1],
                    Opcode::ReadRam => {
                        let value = self.ram_byte(ram_addr(&args));
                        self.output.push_back(value);
                    }
                    Opcode::WriteRam => {
                        self.ram.insert(ram_addr(&args), args[3]);
                    }
                    Opcode::ReadRamWord => {
                        let addr = ram_addr(&args) + (args[3] / 2) as u32;
                        let value = self.ram_byte(addr);
                        self.output.push_back(value);
                    }
                    Opcode::WriteRamWord => {
                        let addr = ram_addr(&args);
                        self.ram.insert(addr, args[3]);
                        self.ram.insert(addr + 1, args[4]);
                    }
                    _ => unreachable!(),
                }
            }
        }
        self.completed.push((op, args));
    }

    pub fn ram_byte(&self, addr: u32) -> u8 {
        self.ram.get(&addr).copied().unwrap_or(0)
    }
}

impl PortIo for SimEc {
    fn inb(&mut self, port: u16) -> u8 {
        let value = if port == SIM_CMD {
            self.status()
        } else {
            let value = self.output.pop_front().unwrap_or(self.data_latch);
            self.data_latch = value;
            value
        };
        self.ops.push(PortOp::In(port, value));
        value
    }

    fn outb(&mut self, port: u16, value: u8) {
        self.ops.push(PortOp::Out(port, value));
        if port == SIM_CMD {
            self.command(value);
        } else {
            self.data(value);
        }
    }
}

#[derive(Debug, Default)]
pub struct CountingDelay {
    pub calls: Vec<(u64, u64)>,
}

impl Delay for CountingDelay {
    fn sleep_range(&mut self, min_us: u64, max_us: u64) {
        self.calls.push((min_us, max_us));
    }
}

pub fn sim_ec(sim: SimEc, write_support: bool) -> Ec<SimEc, CountingDelay> {
    let settings = EcSettings {
        write_support,
        poll_limit: 50,
        ..Default::default()
    };
    Ec::with_delay(sim, CountingDelay::default(), &settings)
}
