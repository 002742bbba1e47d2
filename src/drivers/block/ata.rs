//! # Driver ATA/IDE (PIO, LBA28)
//!
//! Um drive master por barramento:
//!
//! | Drive | Barramento | I/O base | Controle |
//! |-------|------------|----------|----------|
//! | 0     | primário   | 0x1F0    | 0x3F6    |
//! | 1     | secundário | 0x170    | 0x376    |
//!
//! Registradores relativos à base: dado +0, erro +1, contagem +2,
//! LBA +3/+4/+5, drive/head +6, status/comando +7.

use alloc::sync::Arc;

use spin::Mutex;

use super::traits::{BlockDevice, BlockDeviceInfo, BlockError, SECTOR_SIZE};
use crate::arch::port::Port;
use crate::klib::string::FixedName;

mod status {
    pub const BSY: u8 = 0x80;
    pub const DF: u8 = 0x20;
    pub const DRQ: u8 = 0x08;
    pub const ERR: u8 = 0x01;
}

mod cmd {
    pub const READ_SECTORS: u8 = 0x20;
    pub const WRITE_SECTORS: u8 = 0x30;
    pub const CACHE_FLUSH: u8 = 0xE7;
    pub const IDENTIFY: u8 = 0xEC;
}

/// Limite de leituras de status antes de desistir.
const SPIN_LIMIT: u32 = 100_000;
const LBA28_LIMIT: u64 = 1 << 28;

/// Portas de um barramento ATA.
struct Channel {
    data: Port<u16>,
    error: Port<u8>,
    count: Port<u8>,
    lba_lo: Port<u8>,
    lba_mid: Port<u8>,
    lba_hi: Port<u8>,
    drive_head: Port<u8>,
    command: Port<u8>,
    alt_status: Port<u8>,
}

impl Channel {
    const fn new(base: u16, ctrl: u16) -> Self {
        Self {
            data: Port::new(base),
            error: Port::new(base + 1),
            count: Port::new(base + 2),
            lba_lo: Port::new(base + 3),
            lba_mid: Port::new(base + 4),
            lba_hi: Port::new(base + 5),
            drive_head: Port::new(base + 6),
            command: Port::new(base + 7),
            alt_status: Port::new(ctrl),
        }
    }

    fn status(&self) -> u8 {
        // SAFETY: leitura de status não tem efeito colateral
        unsafe { self.command.read() }
    }

    /// ~400ns: quatro leituras do status alternativo.
    fn delay(&self) {
        for _ in 0..4 {
            // SAFETY: idem
            unsafe { self.alt_status.read() };
        }
    }

    fn wait_not_busy(&self) -> Result<u8, BlockError> {
        for _ in 0..SPIN_LIMIT {
            let st = self.status();
            if st & status::BSY == 0 {
                return Ok(st);
            }
        }
        Err(BlockError::Timeout)
    }

    fn wait_drq(&self) -> Result<(), BlockError> {
        for _ in 0..SPIN_LIMIT {
            let st = self.status();
            if st & status::BSY != 0 {
                continue;
            }
            if st & (status::ERR | status::DF) != 0 {
                return Err(BlockError::DeviceError);
            }
            if st & status::DRQ != 0 {
                return Ok(());
            }
        }
        Err(BlockError::Timeout)
    }

    /// Programa LBA28 + contagem e emite `command`.
    fn issue(&mut self, lba: u32, count: u8, command: u8) -> Result<(), BlockError> {
        self.wait_not_busy()?;
        // SAFETY: acesso exclusivo ao canal (Mutex do drive)
        unsafe {
            self.drive_head.write(0xE0 | ((lba >> 24) & 0x0F) as u8);
            self.delay();
            self.error.write(0);
            self.count.write(count);
            self.lba_lo.write(lba as u8);
            self.lba_mid.write((lba >> 8) as u8);
            self.lba_hi.write((lba >> 16) as u8);
            self.command.write(command);
        }
        Ok(())
    }
}

pub struct AtaDrive {
    channel: Mutex<Channel>,
    info: BlockDeviceInfo,
}

/// Modelo (words 27..47, bytes trocados) e setores LBA28 (words 60..61).
pub fn parse_identify(words: &[u16; 256]) -> BlockDeviceInfo {
    let mut raw = [0u8; 40];
    for (i, word) in words[27..47].iter().enumerate() {
        raw[i * 2] = (word >> 8) as u8;
        raw[i * 2 + 1] = *word as u8;
    }
    let model = core::str::from_utf8(&raw).unwrap_or("").trim_end_matches([' ', '\0']);
    BlockDeviceInfo {
        model: FixedName::new(model),
        total_blocks: words[60] as u64 | ((words[61] as u64) << 16),
    }
}

impl AtaDrive {
    /// IDENTIFY no master do barramento; `None` se não há disco ATA.
    pub fn probe(base: u16, ctrl: u16) -> Option<Self> {
        let mut ch = Channel::new(base, ctrl);

        // barramento flutuante
        if ch.status() == 0xFF {
            return None;
        }

        // SAFETY: boot, ninguém mais usa o canal
        unsafe {
            ch.drive_head.write(0xA0);
            ch.delay();
            ch.count.write(0);
            ch.lba_lo.write(0);
            ch.lba_mid.write(0);
            ch.lba_hi.write(0);
            ch.command.write(cmd::IDENTIFY);
        }
        if ch.status() == 0 {
            return None;
        }
        ch.wait_not_busy().ok()?;

        // ATAPI/SATA respondem com assinatura em LBA mid/hi
        // SAFETY: idem
        let signature = unsafe { (ch.lba_mid.read(), ch.lba_hi.read()) };
        if signature != (0, 0) {
            crate::kdebug!("(ATA) Dispositivo não-ATA em ", base);
            return None;
        }
        ch.wait_drq().ok()?;

        let mut words = [0u16; 256];
        for word in words.iter_mut() {
            // SAFETY: DRQ ativo, 256 words disponíveis
            *word = unsafe { ch.data.read() };
        }
        let info = parse_identify(&words);
        crate::kinfo!("(ATA) Drive detectado, setores=", info.total_blocks);

        Some(Self {
            channel: Mutex::new(ch),
            info,
        })
    }

    pub fn info(&self) -> BlockDeviceInfo {
        self.info.clone()
    }

    fn check(&self, lba: u64, count: usize, len: usize) -> Result<(), BlockError> {
        if len < count * SECTOR_SIZE {
            return Err(BlockError::BufferTooSmall);
        }
        let end = lba + count as u64;
        if end > self.info.total_blocks || end > LBA28_LIMIT {
            return Err(BlockError::OutOfRange);
        }
        Ok(())
    }

    /// Lê `count` (1..=255) setores a partir de `lba`.
    pub fn read_sectors(&self, lba: u64, count: u8, buf: &mut [u8]) -> Result<(), BlockError> {
        self.check(lba, count as usize, buf.len())?;
        let mut ch = self.channel.lock();
        ch.issue(lba as u32, count, cmd::READ_SECTORS)?;

        for sector in buf.chunks_exact_mut(SECTOR_SIZE).take(count as usize) {
            ch.wait_drq()?;
            for pair in sector.chunks_exact_mut(2) {
                // SAFETY: DRQ ativo
                let word = unsafe { ch.data.read() };
                pair.copy_from_slice(&word.to_le_bytes());
            }
            ch.delay();
        }
        Ok(())
    }

    /// Escreve `count` setores e esvazia o cache do disco.
    pub fn write_sectors(&self, lba: u64, count: u8, buf: &[u8]) -> Result<(), BlockError> {
        self.check(lba, count as usize, buf.len())?;
        let mut ch = self.channel.lock();
        ch.issue(lba as u32, count, cmd::WRITE_SECTORS)?;

        for sector in buf.chunks_exact(SECTOR_SIZE).take(count as usize) {
            ch.wait_drq()?;
            for pair in sector.chunks_exact(2) {
                // SAFETY: DRQ ativo
                unsafe { ch.data.write(u16::from_le_bytes([pair[0], pair[1]])) };
            }
            ch.delay();
        }

        // SAFETY: comando sem dados
        unsafe { ch.command.write(cmd::CACHE_FLUSH) };
        ch.wait_not_busy()?;
        Ok(())
    }
}

impl BlockDevice for AtaDrive {
    fn read_block(&self, lba: u64, buf: &mut [u8]) -> Result<(), BlockError> {
        self.read_sectors(lba, 1, buf)
    }

    fn write_block(&self, lba: u64, buf: &[u8]) -> Result<(), BlockError> {
        self.write_sectors(lba, 1, buf)
    }

    fn total_blocks(&self) -> u64 {
        self.info.total_blocks
    }

    fn read_blocks(&self, start_lba: u64, buf: &mut [u8]) -> Result<(), BlockError> {
        let mut lba = start_lba;
        for chunk in buf.chunks_mut(255 * SECTOR_SIZE) {
            let count = (chunk.len() / SECTOR_SIZE) as u8;
            if count == 0 {
                break;
            }
            self.read_sectors(lba, count, chunk)?;
            lba += count as u64;
        }
        Ok(())
    }

    fn write_blocks(&self, start_lba: u64, buf: &[u8]) -> Result<(), BlockError> {
        let mut lba = start_lba;
        for chunk in buf.chunks(255 * SECTOR_SIZE) {
            let count = (chunk.len() / SECTOR_SIZE) as u8;
            if count == 0 {
                break;
            }
            self.write_sectors(lba, count, chunk)?;
            lba += count as u64;
        }
        Ok(())
    }
}

/// Bases (I/O, controle) dos drives 0 e 1.
pub const DRIVE_PORTS: [(u16, u16); 2] = [(0x1F0, 0x3F6), (0x170, 0x376)];

/// Procura o drive `n` (0 ou 1).
pub fn probe_drive(n: usize) -> Option<Arc<AtaDrive>> {
    let &(base, ctrl) = DRIVE_PORTS.get(n)?;
    AtaDrive::probe(base, ctrl).map(Arc::new)
}
