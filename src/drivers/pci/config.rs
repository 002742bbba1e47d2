//! # PCI Configuration Space
//!
//! Mecanismo #1: endereço em `CONFIG_ADDRESS`, dado em `CONFIG_DATA`.
//!
//! ```text
//! 31      23      15      10   7       0
//! ┌───────┬───────┬───────┬────┬───────┐
//! │Enable │ Reserv│  Bus  │Dev │Func│Reg│
//! │  1b   │  7b   │  8b   │ 5b │ 3b │6b │
//! └───────┴───────┴───────┴────┴───────┘
//! ```

use crate::arch::port::Port;
use crate::sync::Spinlock;

const CONFIG_ADDRESS: u16 = 0xCF8;
const CONFIG_DATA: u16 = 0xCFC;

/// Localização de uma função PCI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PciAddress {
    pub bus: u8,
    pub device: u8,
    pub function: u8,
}

impl PciAddress {
    pub const fn new(bus: u8, device: u8, function: u8) -> Self {
        Self { bus, device, function }
    }

    /// Valor de `CONFIG_ADDRESS` para o registrador `offset`.
    pub fn config_word(self, offset: u8) -> u32 {
        0x8000_0000
            | ((self.bus as u32) << 16)
            | ((self.device as u32 & 0x1F) << 11)
            | ((self.function as u32 & 0x7) << 8)
            | (offset as u32 & 0xFC)
    }
}

/// Acesso ao espaço de configuração. O barramento real usa portas; os
/// testes usam um espaço em memória.
pub trait ConfigAccess {
    fn read32(&self, addr: PciAddress, offset: u8) -> u32;
    fn write32(&self, addr: PciAddress, offset: u8, value: u32);

    fn read16(&self, addr: PciAddress, offset: u8) -> u16 {
        (self.read32(addr, offset) >> ((offset & 2) * 8)) as u16
    }

    fn read8(&self, addr: PciAddress, offset: u8) -> u8 {
        (self.read32(addr, offset) >> ((offset & 3) * 8)) as u8
    }

    fn write16(&self, addr: PciAddress, offset: u8, value: u16) {
        let shift = (offset & 2) * 8;
        let current = self.read32(addr, offset);
        let mask = 0xFFFFu32 << shift;
        self.write32(addr, offset, (current & !mask) | ((value as u32) << shift));
    }
}

/// Par de portas 0xCF8/0xCFC; o lock mantém endereço e dado juntos.
static PORTS: Spinlock<(Port<u32>, Port<u32>)> =
    Spinlock::new((Port::new(CONFIG_ADDRESS), Port::new(CONFIG_DATA)));

/// Mecanismo #1 via portas de I/O.
pub struct PortConfig;

impl ConfigAccess for PortConfig {
    fn read32(&self, addr: PciAddress, offset: u8) -> u32 {
        let mut ports = PORTS.lock();
        // SAFETY: portas de configuração PCI, serializadas pelo lock
        unsafe {
            ports.0.write(addr.config_word(offset));
            ports.1.read()
        }
    }

    fn write32(&self, addr: PciAddress, offset: u8, value: u32) {
        let mut ports = PORTS.lock();
        // SAFETY: idem
        unsafe {
            ports.0.write(addr.config_word(offset));
            ports.1.write(value);
        }
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! Espaço de configuração em memória para testes.

    use super::*;
    use std::cell::RefCell;
    use std::collections::BTreeMap;

    #[derive(Default)]
    pub struct FakeConfig {
        regs: RefCell<BTreeMap<(u8, u8, u8, u8), u32>>,
    }

    impl FakeConfig {
        pub fn set(&self, addr: PciAddress, offset: u8, value: u32) {
            self.regs
                .borrow_mut()
                .insert((addr.bus, addr.device, addr.function, offset & 0xFC), value);
        }

        pub fn set8(&self, addr: PciAddress, offset: u8, value: u8) {
            let shift = (offset & 3) * 8;
            let current = self.read32(addr, offset);
            let word = (current & !(0xFF << shift)) | ((value as u32) << shift);
            self.set(addr, offset, word);
        }
    }

    impl ConfigAccess for FakeConfig {
        fn read32(&self, addr: PciAddress, offset: u8) -> u32 {
            let key = (addr.bus, addr.device, addr.function, offset & 0xFC);
            // função ausente lê tudo 1
            let present = self.regs.borrow().keys().any(|k| (k.0, k.1, k.2) == (key.0, key.1, key.2));
            match self.regs.borrow().get(&key) {
                Some(v) => *v,
                None if present => 0,
                None => 0xFFFF_FFFF,
            }
        }

        fn write32(&self, addr: PciAddress, offset: u8, value: u32) {
            self.set(addr, offset, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_word_layout() {
        let addr = PciAddress::new(1, 3, 2);
        assert_eq!(addr.config_word(0x10), 0x8001_1A10);
        assert_eq!(addr.config_word(0x13), 0x8001_1A10);
    }

    #[test]
    fn narrow_reads_pick_the_right_lane() {
        let cfg = fake::FakeConfig::default();
        let addr = PciAddress::new(0, 4, 0);
        cfg.set(addr, 0x00, 0x1050_1AF4);
        assert_eq!(cfg.read16(addr, 0x00), 0x1AF4);
        assert_eq!(cfg.read16(addr, 0x02), 0x1050);
        assert_eq!(cfg.read8(addr, 0x03), 0x10);

        cfg.write16(addr, 0x02, 0x1052);
        assert_eq!(cfg.read32(addr, 0x00), 0x1052_1AF4);
    }
}
