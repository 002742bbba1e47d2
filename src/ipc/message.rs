//! Mensagem IPC de tamanho fixo.
//!
//! Copiada por valor entre espaços de endereçamento; o layout `repr(C)` é o
//! mesmo que os servidores em ring 3 enxergam.
//!
//! ```text
//! offset  campo
//! 0       sender   (escrito pelo kernel)
//! 4       kind     (tag de MessageType)
//! 8       args[4]
//! 24      data[64] (caminho ou bytes)
//! ```

use crate::sys::Pid;

pub const MESSAGE_DATA_LEN: usize = 64;
pub const MESSAGE_ARGS: usize = 4;

/// Tipos de mensagem. Tags fora da tabela viram `User(tag)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Reply,
    Notify,
    Irq,
    Ping,
    ConsoleWrite,
    VfsOpen,
    VfsRead,
    VfsWrite,
    VfsClose,
    VfsList,
    VfsReply,
    AtaRead,
    AtaWrite,
    AtaReply,
    NetStatus,
    User(u32),
}

const TAGS: [(u32, MessageType); 15] = [
    (0x00, MessageType::Reply),
    (0x01, MessageType::Notify),
    (0x02, MessageType::Irq),
    (0x03, MessageType::Ping),
    (0x10, MessageType::ConsoleWrite),
    (0x20, MessageType::VfsOpen),
    (0x21, MessageType::VfsRead),
    (0x22, MessageType::VfsWrite),
    (0x23, MessageType::VfsClose),
    (0x24, MessageType::VfsList),
    (0x2F, MessageType::VfsReply),
    (0x30, MessageType::AtaRead),
    (0x31, MessageType::AtaWrite),
    (0x3F, MessageType::AtaReply),
    (0x40, MessageType::NetStatus),
];

impl MessageType {
    pub fn from_tag(tag: u32) -> Self {
        TAGS.iter()
            .find(|(t, _)| *t == tag)
            .map(|(_, ty)| *ty)
            .unwrap_or(MessageType::User(tag))
    }

    pub fn tag(self) -> u32 {
        match self {
            MessageType::User(tag) => tag,
            known => TAGS
                .iter()
                .find(|(_, ty)| *ty == known)
                .map(|(t, _)| *t)
                .unwrap_or(0),
        }
    }
}

/// De quem um `receive` aceita mensagens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Any,
    Task(Pid),
}

impl Source {
    /// Convenção da syscall: `0` = qualquer remetente.
    pub fn from_raw(raw: u32) -> Self {
        if raw == 0 {
            Source::Any
        } else {
            Source::Task(Pid::new(raw))
        }
    }

    pub fn accepts(self, sender: Pid) -> bool {
        match self {
            Source::Any => true,
            Source::Task(pid) => pid == sender,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Message {
    pub sender: u32,
    pub kind: u32,
    pub args: [u32; MESSAGE_ARGS],
    pub data: [u8; MESSAGE_DATA_LEN],
}

impl Message {
    pub const fn empty() -> Self {
        Self {
            sender: 0,
            kind: 0,
            args: [0; MESSAGE_ARGS],
            data: [0; MESSAGE_DATA_LEN],
        }
    }

    pub fn new(kind: MessageType) -> Self {
        Self {
            kind: kind.tag(),
            ..Self::empty()
        }
    }

    pub fn with_arg(mut self, index: usize, value: u32) -> Self {
        if let Some(slot) = self.args.get_mut(index) {
            *slot = value;
        }
        self
    }

    /// Copia `bytes` para `data`, truncando; devolve quantos couberam.
    pub fn set_data(&mut self, bytes: &[u8]) -> usize {
        let n = bytes.len().min(MESSAGE_DATA_LEN);
        self.data[..n].copy_from_slice(&bytes[..n]);
        self.data[n..].fill(0);
        n
    }

    /// `data` interpretado como string terminada em zero (caminhos).
    pub fn data_str(&self) -> &str {
        crate::klib::string::from_cstr(&self.data)
    }

    pub fn message_type(&self) -> MessageType {
        MessageType::from_tag(self.kind)
    }

    pub fn sender_pid(&self) -> Pid {
        Pid::new(self.sender)
    }
}

impl core::fmt::Debug for Message {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Message")
            .field("sender", &self.sender)
            .field("kind", &self.message_type())
            .field("args", &self.args)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_tags_are_user_messages() {
        assert_eq!(MessageType::from_tag(42), MessageType::User(42));
        assert_eq!(MessageType::User(42).tag(), 42);
        assert_eq!(MessageType::from_tag(0x21), MessageType::VfsRead);
        assert_eq!(MessageType::Irq.tag(), 2);
    }

    #[test]
    fn layout_matches_user_abi() {
        assert_eq!(core::mem::size_of::<Message>(), 88);
        assert_eq!(core::mem::align_of::<Message>(), 4);
    }

    #[test]
    fn data_is_truncated_and_zero_padded() {
        let mut msg = Message::new(MessageType::VfsOpen);
        assert_eq!(msg.set_data(b"/disk/readme.txt"), 16);
        assert_eq!(msg.data_str(), "/disk/readme.txt");
        let long = [b'x'; 100];
        assert_eq!(msg.set_data(&long), MESSAGE_DATA_LEN);
    }

    #[test]
    fn source_matching() {
        assert!(Source::from_raw(0).accepts(Pid::new(7)));
        assert!(Source::from_raw(7).accepts(Pid::new(7)));
        assert!(!Source::from_raw(7).accepts(Pid::new(8)));
    }
}
