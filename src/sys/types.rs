//! Tipos fundamentais do sistema.

/// Process ID. `0` é reservado ("nenhum"/"qualquer", conforme o contexto).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct Pid(pub u32);

impl Pid {
    pub const NONE: Pid = Pid(0);

    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub const fn as_u32(self) -> u32 {
        self.0
    }

    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

/// Contagem de ticks do timer desde o boot.
pub type Tick = u64;
