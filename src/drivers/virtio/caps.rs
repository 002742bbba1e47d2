//! Capabilities VirtIO (vendor-specific, ID 0x09) no espaço PCI.
//!
//! ```text
//! +0 cap_vndr  +1 cap_next  +2 cap_len  +3 cfg_type
//! +4 bar       +5 id        +8 offset (u32)  +12 length (u32)
//! +16 notify_off_multiplier (só cfg_type = NOTIFY)
//! ```

use crate::drivers::pci::{ConfigAccess, PciDevice};

use super::VirtioError;

const CAP_VENDOR: u8 = 0x09;

pub const CFG_COMMON: u8 = 1;
pub const CFG_NOTIFY: u8 = 2;
pub const CFG_ISR: u8 = 3;
pub const CFG_DEVICE: u8 = 4;

/// Janela dentro de um BAR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapRegion {
    pub bar: u8,
    pub offset: u32,
    pub length: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtioCaps {
    pub common: CapRegion,
    pub notify: CapRegion,
    pub notify_off_multiplier: u32,
    /// Opcional: o transporte trabalha por polling
    pub isr: Option<CapRegion>,
    pub device: Option<CapRegion>,
}

/// Percorre a lista e junta as regiões; common e notify são obrigatórias.
pub fn parse<C: ConfigAccess>(cfg: &C, dev: &PciDevice) -> Result<VirtioCaps, VirtioError> {
    let mut common = None;
    let mut notify = None;
    let mut isr = None;
    let mut device = None;

    for cap in dev.capabilities(cfg).into_iter().filter(|c| c.id == CAP_VENDOR) {
        let at = cap.offset;
        let cfg_type = cfg.read8(dev.addr, at + 3);
        let region = CapRegion {
            bar: cfg.read8(dev.addr, at + 4),
            offset: cfg.read32(dev.addr, at + 8),
            length: cfg.read32(dev.addr, at + 12),
        };
        if region.bar > 5 {
            continue;
        }
        // a primeira de cada tipo vale
        match cfg_type {
            CFG_COMMON if common.is_none() => common = Some(region),
            CFG_NOTIFY if notify.is_none() => {
                let multiplier = cfg.read32(dev.addr, at + 16);
                notify = Some((region, multiplier));
            }
            CFG_ISR if isr.is_none() => isr = Some(region),
            CFG_DEVICE if device.is_none() => device = Some(region),
            _ => {}
        }
    }

    let common = common.ok_or(VirtioError::MissingCapability)?;
    let (notify, notify_off_multiplier) = notify.ok_or(VirtioError::MissingCapability)?;
    Ok(VirtioCaps {
        common,
        notify,
        notify_off_multiplier,
        isr,
        device,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::pci::config::fake::FakeConfig;
    use crate::drivers::pci::PciAddress;

    fn vendor_cap(cfg: &FakeConfig, addr: PciAddress, at: u8, next: u8, cfg_type: u8, bar: u8, offset: u32, len: u32) {
        cfg.set(addr, at, (cfg_type as u32) << 24 | 16 << 16 | (next as u32) << 8 | 0x09);
        cfg.set(addr, at + 4, bar as u32);
        cfg.set(addr, at + 8, offset);
        cfg.set(addr, at + 12, len);
    }

    fn gpu_with_caps(with_isr: bool) -> (FakeConfig, PciDevice) {
        let cfg = FakeConfig::default();
        let addr = PciAddress::new(0, 3, 0);
        cfg.set(addr, 0x00, 0x1050_1AF4);
        cfg.set(addr, 0x04, 0x0010_0000);
        cfg.set(addr, 0x10, 0);
        cfg.set(addr, 0x20, 0xFE00_000C);
        cfg.set(addr, 0x34, 0x40);
        vendor_cap(&cfg, addr, 0x40, 0x54, CFG_COMMON, 4, 0x0000, 0x1000);
        vendor_cap(&cfg, addr, 0x54, 0x68, CFG_NOTIFY, 4, 0x3000, 0x1000);
        cfg.set(addr, 0x54 + 16, 4);
        let after_notify = if with_isr { 0x7C } else { 0x90 };
        // lista: common -> notify -> [isr] -> device
        vendor_cap(&cfg, addr, 0x68, after_notify, CFG_DEVICE, 4, 0x2000, 0x1000);
        if with_isr {
            vendor_cap(&cfg, addr, 0x7C, 0x00, CFG_ISR, 4, 0x1000, 0x1000);
        }
        let dev = PciDevice::probe(&cfg, addr).unwrap();
        (cfg, dev)
    }

    #[test]
    fn parses_all_regions() {
        let (cfg, dev) = gpu_with_caps(true);
        let caps = parse(&cfg, &dev).unwrap();
        assert_eq!(caps.common, CapRegion { bar: 4, offset: 0, length: 0x1000 });
        assert_eq!(caps.notify.offset, 0x3000);
        assert_eq!(caps.notify_off_multiplier, 4);
        assert_eq!(caps.device.map(|d| d.offset), Some(0x2000));
        assert_eq!(caps.isr.map(|d| d.offset), Some(0x1000));
    }

    #[test]
    fn isr_is_optional() {
        let (cfg, dev) = gpu_with_caps(false);
        let caps = parse(&cfg, &dev).unwrap();
        assert!(caps.isr.is_none());
    }

    #[test]
    fn missing_common_is_an_error() {
        let cfg = FakeConfig::default();
        let addr = PciAddress::new(0, 3, 0);
        cfg.set(addr, 0x00, 0x1050_1AF4);
        cfg.set(addr, 0x04, 0x0010_0000);
        cfg.set(addr, 0x34, 0x40);
        vendor_cap(&cfg, addr, 0x40, 0x00, CFG_NOTIFY, 4, 0x3000, 0x1000);
        let dev = PciDevice::probe(&cfg, addr).unwrap();
        assert_eq!(parse(&cfg, &dev), Err(VirtioError::MissingCapability));
    }
}
