//! Byte access to the two EC ports
//!
//! The protocol code only ever talks to [`PortIo`]. On Linux with the
//! `linux_pio` feature, [`HwPortIo`] provides raw x86 port I/O from userspace.

/// Read and write single bytes at I/O port addresses
pub trait PortIo {
    fn inb(&mut self, port: u16) -> u8;
    fn outb(&mut self, port: u16, value: u8);
}

impl<T: PortIo + ?Sized> PortIo for Box<T> {
    fn inb(&mut self, port: u16) -> u8 {
        (**self).inb(port)
    }

    fn outb(&mut self, port: u16, value: u8) {
        (**self).outb(port, value)
    }
}

#[cfg(all(
    feature = "linux_pio",
    target_os = "linux",
    any(target_arch = "x86", target_arch = "x86_64")
))]
pub use self::hw::HwPortIo;

#[cfg(all(
    feature = "linux_pio",
    target_os = "linux",
    any(target_arch = "x86", target_arch = "x86_64")
))]
mod hw {
    use hwio::{Io, Pio};
    use libc::{c_ulong, ioperm};
    use nix::unistd::Uid;

    use super::PortIo;
    use crate::ec::{EcError, EcResult};

    /// Raw port I/O. Only the two ports passed to [`HwPortIo::open`] are accessible.
    pub struct HwPortIo {
        command_port: u16,
        data_port: u16,
    }

    impl HwPortIo {
        /// Ask the kernel for access to the command and data port
        pub fn open(command_port: u16, data_port: u16) -> EcResult<Self> {
            // In Linux userspace has to first request access to ioports
            if !Uid::effective().is_root() {
                error!("Must be root to use port based I/O for EC communication.");
                return Err(EcError::DeviceError("Not running as root".to_string()));
            }

            for port in [command_port, data_port] {
                let res = unsafe { ioperm(port as c_ulong, 1, 1) };
                if res != 0 {
                    error!("ioperm failed. portio driver is likely block by Linux kernel lockdown mode");
                    return Err(EcError::DeviceError(format!(
                        "ioperm({:#X}) failed with {}",
                        port,
                        std::io::Error::last_os_error()
                    )));
                }
            }
            debug!(
                "Port access granted: cmd={:#X} data={:#X}",
                command_port, data_port
            );

            Ok(HwPortIo {
                command_port,
                data_port,
            })
        }

        fn check(&self, port: u16) {
            debug_assert!(
                port == self.command_port || port == self.data_port,
                "port {:#X} was not opened",
                port
            );
        }
    }

    impl PortIo for HwPortIo {
        fn inb(&mut self, port: u16) -> u8 {
            self.check(port);
            Pio::<u8>::new(port).read()
        }

        fn outb(&mut self, port: u16, value: u8) {
            self.check(port);
            Pio::<u8>::new(port).write(value)
        }
    }

    impl Drop for HwPortIo {
        fn drop(&mut self) {
            for port in [self.command_port, self.data_port] {
                unsafe {
                    ioperm(port as c_ulong, 1, 0);
                }
            }
        }
    }
}
