//! # Servidores Embutidos
//!
//! Quando o módulo ELF de um servidor não vem no boot, o kernel sobe uma
//! task de kernel que fala o mesmo protocolo IPC e se registra com o mesmo
//! nome de serviço.
//!
//! | Serviço   | Mensagem       | args / data                           | Resposta                     |
//! |-----------|----------------|---------------------------------------|------------------------------|
//! | `console` | `ConsoleWrite` | a0=len, data=bytes                    | `Reply`, a0=len              |
//! | `vfs`     | `VfsOpen`      | a0=flags, data=caminho                | `VfsReply`, a0=fd            |
//! | `vfs`     | `VfsRead`      | a0=fd, a1=max                         | `VfsReply`, a0=n, data       |
//! | `vfs`     | `VfsWrite`     | a0=fd, a1=len, data=bytes             | `VfsReply`, a0=n             |
//! | `vfs`     | `VfsClose`     | a0=fd                                 | `VfsReply`, a0=0             |
//! | `vfs`     | `VfsList`      | a0=índice, data=caminho               | `VfsReply`, a0=1/0, a1=tipo, a2=tamanho, data=nome |
//! | `ata`     | `AtaRead`      | a0=drive, a1=lba, a2=pedaço (0..8)    | `AtaReply`, a0=0, data       |
//! | `ata`     | `AtaWrite`     | a0=drive, a1=lba, a2=pedaço, data     | `AtaReply`, a0=0             |
//! | `net`     | `NetStatus`    |                                       | `Reply`, a0=status, a1=IRQs  |
//!
//! Erros voltam em a0 como errno negativo. `Ping` é respondido por todos.

use crate::drivers::block::{self, BlockDevice, SECTOR_SIZE};
use crate::drivers::{rtl8139, serial};
use crate::fs::types::NodeKind;
use crate::fs::vfs::{self, OpenFlags, Vfs};
use crate::ipc::message::MESSAGE_DATA_LEN;
use crate::ipc::{self, Message, MessageType, Source};
use crate::sched::{self, config::PRIORITY_HIGH};
use crate::sys::{Errno, Pid};

use super::boot::ServerKind;

/// Pedaços de 64 bytes por setor.
const SECTOR_CHUNKS: u32 = (SECTOR_SIZE / MESSAGE_DATA_LEN) as u32;

/// Sobe a versão embutida de `kind`.
pub fn spawn(kind: ServerKind) -> Result<Pid, Errno> {
    let entry: sched::TaskEntry = match kind {
        ServerKind::Console => console_main,
        ServerKind::Vfs => vfs_main,
        ServerKind::Ata => ata_main,
        ServerKind::Net => net_main,
    };
    sched::task_create_kernel(kind.name(), entry, PRIORITY_HIGH)
}

fn status(result: Result<u32, Errno>) -> u32 {
    match result {
        Ok(v) => v,
        Err(e) => e.as_isize() as i32 as u32,
    }
}

fn pong() -> Message {
    Message::new(MessageType::Reply)
}

/// Laço comum: recebe, trata, responde quem espera resposta.
fn serve(name: &str, mut handle: impl FnMut(&Message) -> Option<Message>) {
    if let Err(err) = ipc::register_service(name) {
        crate::kerror!("(Servers) Serviço já registrado:");
        crate::kerror!(name);
        crate::kerror!(err.as_str());
        return;
    }
    crate::kinfo!("(Servers) Servidor embutido no ar:");
    crate::kinfo!(name);
    loop {
        let msg = match ipc::receive(Source::Any) {
            Ok(msg) => msg,
            Err(_) => continue,
        };
        if let Some(reply) = handle(&msg) {
            if ipc::reply(msg.sender_pid(), reply).is_err() {
                crate::ktrace!("(Servers) Remetente não esperava resposta, pid=", msg.sender);
            }
        }
    }
}

// =============================================================================
// CONSOLE
// =============================================================================

pub fn console_handle(msg: &Message, sink: &mut impl FnMut(&[u8])) -> Option<Message> {
    match msg.message_type() {
        MessageType::ConsoleWrite => {
            let len = (msg.args[0] as usize).min(MESSAGE_DATA_LEN);
            sink(&msg.data[..len]);
            Some(Message::new(MessageType::Reply).with_arg(0, len as u32))
        }
        MessageType::Ping => Some(pong()),
        _ => None,
    }
}

extern "C" fn console_main() {
    serve("console", |msg| console_handle(msg, &mut serial::emit_bytes));
}

// =============================================================================
// VFS
// =============================================================================

pub fn vfs_handle(fs: &Vfs, msg: &Message) -> Option<Message> {
    let client = msg.sender_pid();
    let reply = Message::new(MessageType::VfsReply);
    let out = match msg.message_type() {
        MessageType::VfsOpen => {
            let flags = OpenFlags::from_abi(msg.args[0]);
            reply.with_arg(0, status(fs.open(client, msg.data_str(), flags).map(|fd| fd as u32)))
        }
        MessageType::VfsRead => {
            let mut out = reply;
            let max = (msg.args[1] as usize).min(MESSAGE_DATA_LEN);
            let mut buf = [0u8; MESSAGE_DATA_LEN];
            let result = fs.fd_read(client, msg.args[0] as usize, &mut buf[..max]);
            if let Ok(n) = result {
                out.data[..n].copy_from_slice(&buf[..n]);
            }
            out.with_arg(0, status(result.map(|n| n as u32)))
        }
        MessageType::VfsWrite => {
            let len = (msg.args[1] as usize).min(MESSAGE_DATA_LEN);
            let result = fs.fd_write(client, msg.args[0] as usize, &msg.data[..len]);
            reply.with_arg(0, status(result.map(|n| n as u32)))
        }
        MessageType::VfsClose => reply.with_arg(0, status(fs.close(client, msg.args[0] as usize).map(|_| 0))),
        MessageType::VfsList => list_entry(fs, client, msg),
        MessageType::Ping => pong(),
        _ => return None,
    };
    Some(out)
}

fn list_entry(fs: &Vfs, client: Pid, msg: &Message) -> Message {
    let reply = Message::new(MessageType::VfsReply);
    let path = fs.resolve(client, msg.data_str());
    match fs.list(&path) {
        Ok(entries) => match entries.get(msg.args[0] as usize) {
            Some(entry) => {
                let mut out = reply
                    .with_arg(0, 1)
                    .with_arg(1, (entry.kind == NodeKind::Dir) as u32)
                    .with_arg(2, entry.size.min(u32::MAX as u64) as u32);
                out.set_data(entry.name.as_bytes());
                out
            }
            None => reply.with_arg(0, 0),
        },
        Err(err) => reply.with_arg(0, status(Err(err.into()))),
    }
}

extern "C" fn vfs_main() {
    serve("vfs", |msg| vfs_handle(vfs::vfs(), msg));
}

// =============================================================================
// ATA
// =============================================================================

pub fn ata_handle(dev: Option<&dyn BlockDevice>, msg: &Message) -> Option<Message> {
    let kind = msg.message_type();
    if kind == MessageType::Ping {
        return Some(pong());
    }
    if kind != MessageType::AtaRead && kind != MessageType::AtaWrite {
        return None;
    }

    let mut reply = Message::new(MessageType::AtaReply);
    let chunk = msg.args[2];
    let Some(dev) = dev.filter(|_| chunk < SECTOR_CHUNKS) else {
        let err = if chunk < SECTOR_CHUNKS { Errno::ENODEV } else { Errno::EINVAL };
        return Some(reply.with_arg(0, status(Err(err))));
    };

    let lba = msg.args[1] as u64;
    let range = chunk as usize * MESSAGE_DATA_LEN..(chunk as usize + 1) * MESSAGE_DATA_LEN;
    let mut sector = [0u8; SECTOR_SIZE];
    let result = dev.read_block(lba, &mut sector).and_then(|_| {
        if kind == MessageType::AtaWrite {
            sector[range.clone()].copy_from_slice(&msg.data);
            dev.write_block(lba, &sector)
        } else {
            reply.data.copy_from_slice(&sector[range.clone()]);
            Ok(())
        }
    });
    Some(reply.with_arg(0, status(result.map(|_| 0).map_err(|_| Errno::EIO))))
}

extern "C" fn ata_main() {
    serve("ata", |msg| {
        let dev = block::drive(msg.args[0] as usize);
        ata_handle(dev.as_deref(), msg)
    });
}

// =============================================================================
// NET
// =============================================================================

#[derive(Debug, Default)]
pub struct NetServer {
    pub irqs: u32,
}

impl NetServer {
    pub fn handle(&mut self, msg: &Message, packed_status: u32) -> Option<Message> {
        match msg.message_type() {
            MessageType::Irq => {
                self.irqs = self.irqs.wrapping_add(1);
                None
            }
            MessageType::NetStatus => Some(
                Message::new(MessageType::Reply)
                    .with_arg(0, packed_status)
                    .with_arg(1, self.irqs),
            ),
            MessageType::Ping => Some(pong()),
            _ => None,
        }
    }
}

extern "C" fn net_main() {
    if let Some(irq) = rtl8139::irq_line() {
        if ipc::irq::register_irq(irq, sched::task_get_current()).is_err() {
            crate::kwarn!("(Servers) IRQ da rede já tem dono: ", irq);
        }
    }
    let mut server = NetServer::default();
    serve("net", |msg| server.handle(msg, rtl8139::status().pack()));
}
