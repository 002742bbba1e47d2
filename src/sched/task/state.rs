//! Estados de task

use crate::ipc::message::Source;
use crate::sys::Pid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Pronta, numa fila de prioridade
    Ready,
    /// Executando (fora das filas)
    Running,
    /// Dormindo até `sleep_until`
    Sleeping,
    /// Esperando o destino aceitar a mensagem
    SendBlocked(Pid),
    /// Esperando mensagem de `Source`
    ReceiveBlocked(Source),
    /// Terminada, aguardando o reaper
    Terminated,
}

impl TaskState {
    pub const fn is_runnable(self) -> bool {
        matches!(self, Self::Ready | Self::Running)
    }

    pub const fn is_blocked(self) -> bool {
        matches!(self, Self::SendBlocked(_) | Self::ReceiveBlocked(_))
    }

    /// Nome curto para `/proc/tasks`.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Running => "running",
            Self::Sleeping => "sleeping",
            Self::SendBlocked(_) => "send",
            Self::ReceiveBlocked(_) => "receive",
            Self::Terminated => "zombie",
        }
    }
}
