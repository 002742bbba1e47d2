//! Driver do 8259 PIC (Master + Slave).
//!
//! # Remapeamento
//! Os vetores padrão 0-15 colidem com as exceções da CPU. Remapeamos para
//! 32-47; o slave fica em cascata no IRQ 2 do master.

use crate::arch::port::Port;
use crate::arch::ports::io_wait;
use crate::sync::Spinlock;

const PIC1_CMD: u16 = 0x20;
const PIC1_DATA: u16 = 0x21;
const PIC2_CMD: u16 = 0xA0;
const PIC2_DATA: u16 = 0xA1;

const ICW1_INIT_ICW4: u8 = 0x11;
const ICW4_8086: u8 = 0x01;
const PIC_EOI: u8 = 0x20;
const CASCADE_IRQ: u8 = 2;

pub const MASTER_OFFSET: u8 = 32;
pub const SLAVE_OFFSET: u8 = 40;

struct Pic {
    offset: u8,
    command: Port<u8>,
    data: Port<u8>,
}

/// Cadeia de PICs.
pub struct ChainedPics {
    pics: [Pic; 2],
}

impl ChainedPics {
    pub const fn new(offset1: u8, offset2: u8) -> Self {
        Self {
            pics: [
                Pic {
                    offset: offset1,
                    command: Port::new(PIC1_CMD),
                    data: Port::new(PIC1_DATA),
                },
                Pic {
                    offset: offset2,
                    command: Port::new(PIC2_CMD),
                    data: Port::new(PIC2_DATA),
                },
            ],
        }
    }

    /// Reprograma os dois PICs e mascara tudo exceto a cascata.
    ///
    /// # Safety
    /// Acesso exclusivo às portas 0x20/0x21/0xA0/0xA1.
    pub unsafe fn init(&mut self) {
        for pic in self.pics.iter_mut() {
            pic.command.write(ICW1_INIT_ICW4);
            io_wait();
        }
        for pic in self.pics.iter_mut() {
            let offset = pic.offset;
            pic.data.write(offset);
            io_wait();
        }
        self.pics[0].data.write(1 << CASCADE_IRQ);
        io_wait();
        self.pics[1].data.write(CASCADE_IRQ);
        io_wait();
        for pic in self.pics.iter_mut() {
            pic.data.write(ICW4_8086);
            io_wait();
        }

        self.pics[0].data.write(!(1 << CASCADE_IRQ));
        self.pics[1].data.write(0xFF);
        crate::kinfo!("(PIC) Remapeado: master=", self.pics[0].offset);
    }

    /// EOI para o slave (IRQ >= 8) e sempre para o master.
    ///
    /// # Safety
    /// Deve corresponder a uma IRQ em atendimento.
    pub unsafe fn notify_eoi(&mut self, irq: u8) {
        if irq >= 8 {
            self.pics[1].command.write(PIC_EOI);
        }
        self.pics[0].command.write(PIC_EOI);
    }

    /// # Safety
    /// Habilitar uma IRQ sem handler gera interrupções espúrias.
    pub unsafe fn unmask(&mut self, irq: u8) {
        let idx = if irq < 8 { 0 } else { 1 };
        let value = self.pics[idx].data.read();
        self.pics[idx].data.write(value & !(1 << (irq % 8)));
    }
}

static PICS: Spinlock<ChainedPics> = Spinlock::new(ChainedPics::new(MASTER_OFFSET, SLAVE_OFFSET));

pub fn init() {
    // SAFETY: boot, IRQs desabilitadas
    unsafe { PICS.lock().init() };
}

pub fn unmask(irq: u8) {
    // SAFETY: chamado por quem acabou de registrar um handler
    unsafe { PICS.lock().unmask(irq) };
}

pub fn end_of_interrupt(irq: u8) {
    // SAFETY: chamado pelo roteador de IRQs
    unsafe { PICS.lock().notify_eoi(irq) };
}
