//! Teclado: decodificação de keycodes e o anel de caracteres.
//!
//! Os keycodes vêm do VirtIO input (códigos evdev, que coincidem com o
//! scancode set 1 no bloco principal). O anel alimenta `kbd_getchar`.

use spin::Mutex;

const RING_SIZE: usize = 256;

/// Buffer circular de bytes; cheio descarta o mais novo.
pub struct KeyRing {
    buffer: [u8; RING_SIZE],
    read_pos: usize,
    count: usize,
}

impl KeyRing {
    pub const fn new() -> Self {
        Self {
            buffer: [0; RING_SIZE],
            read_pos: 0,
            count: 0,
        }
    }

    pub fn push(&mut self, byte: u8) -> bool {
        if self.count == RING_SIZE {
            return false;
        }
        self.buffer[(self.read_pos + self.count) % RING_SIZE] = byte;
        self.count += 1;
        true
    }

    pub fn pop(&mut self) -> Option<u8> {
        if self.count == 0 {
            return None;
        }
        let byte = self.buffer[self.read_pos];
        self.read_pos = (self.read_pos + 1) % RING_SIZE;
        self.count -= 1;
        Some(byte)
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Modifiers {
    lshift: bool,
    rshift: bool,
    caps_lock: bool,
}

impl Modifiers {
    fn shifted(&self) -> bool {
        self.lshift || self.rshift
    }
}

const KEY_LSHIFT: u16 = 0x2A;
const KEY_RSHIFT: u16 = 0x36;
const KEY_CAPSLOCK: u16 = 0x3A;

/// Layout US: (normal, com shift), indexado pelo keycode.
const KEYMAP: [(u8, u8); 0x3A] = {
    let mut map = [(0u8, 0u8); 0x3A];
    let digits = *b"1234567890-=";
    let shifted = *b"!@#$%^&*()_+";
    let mut i = 0;
    while i < 12 {
        map[0x02 + i] = (digits[i], shifted[i]);
        i += 1;
    }
    map[0x0E] = (0x08, 0x08);
    map[0x0F] = (b'\t', b'\t');
    let top = *b"qwertyuiop[]";
    let top_s = *b"QWERTYUIOP{}";
    i = 0;
    while i < 12 {
        map[0x10 + i] = (top[i], top_s[i]);
        i += 1;
    }
    map[0x1C] = (b'\n', b'\n');
    let home = *b"asdfghjkl;'`";
    let home_s = *b"ASDFGHJKL:\"~";
    i = 0;
    while i < 12 {
        map[0x1E + i] = (home[i], home_s[i]);
        i += 1;
    }
    map[0x2B] = (b'\\', b'|');
    let bottom = *b"zxcvbnm,./";
    let bottom_s = *b"ZXCVBNM<>?";
    i = 0;
    while i < 10 {
        map[0x2C + i] = (bottom[i], bottom_s[i]);
        i += 1;
    }
    map[0x39] = (b' ', b' ');
    map
};

pub struct KeyDecoder {
    modifiers: Modifiers,
}

impl KeyDecoder {
    pub const fn new() -> Self {
        Self {
            modifiers: Modifiers {
                lshift: false,
                rshift: false,
                caps_lock: false,
            },
        }
    }

    /// Evento de tecla (`value`: 0 solta, 1 pressiona, 2 repetição).
    pub fn key_event(&mut self, code: u16, value: u32) -> Option<u8> {
        let pressed = value != 0;
        match code {
            KEY_LSHIFT => self.modifiers.lshift = pressed,
            KEY_RSHIFT => self.modifiers.rshift = pressed,
            KEY_CAPSLOCK if value == 1 => self.modifiers.caps_lock = !self.modifiers.caps_lock,
            _ if pressed => return self.translate(code),
            _ => {}
        }
        None
    }

    fn translate(&self, code: u16) -> Option<u8> {
        let &(normal, shifted) = KEYMAP.get(code as usize)?;
        if normal == 0 {
            return None;
        }
        let mut shift = self.modifiers.shifted();
        if normal.is_ascii_lowercase() && self.modifiers.caps_lock {
            shift = !shift;
        }
        Some(if shift { shifted } else { normal })
    }
}

static DECODER: Mutex<KeyDecoder> = Mutex::new(KeyDecoder::new());
static RING: Mutex<KeyRing> = Mutex::new(KeyRing::new());

/// Chamado pelo driver de input para cada evento EV_KEY.
pub fn handle_key(code: u16, value: u32) {
    if let Some(byte) = DECODER.lock().key_event(code, value) {
        RING.lock().push(byte);
    }
}

/// Próximo caractere, sem bloquear.
pub fn getchar() -> Option<u8> {
    RING.lock().pop()
}
