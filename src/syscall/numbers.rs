//! # Syscall Numbers Registry
//!
//! Catálogo de todas as operações do gate `int 0x80`.
//!
//! Numeração própria do Basalt: EAX = número, EBX/ECX/EDX/ESI/EDI =
//! argumentos, resultado em EAX (`-1` em qualquer falha).
//!
//! | Range     | Categoria                         |
//! |-----------|-----------------------------------|
//! | 0x01-0x0F | Legado (processo, E/S, tempo)     |
//! | 0x10-0x1F | Diretório corrente                |
//! | 0x20-0x2F | IPC                               |
//! | 0x30-0x3F | Serviços                          |
//! | 0x40-0x5F | Suporte a servidores              |
//! | 0x60-0x6F | Janelas GUI                       |
//! | 0x70-0x7F | GPU 3D (Virgl)                    |
//!
//! Strings e buffers sempre vão como par `(ptr, len)`.

// ============================================================================
// LEGADO (0x01 - 0x0F)
// ============================================================================

/// Encerra a task atual.
/// Args: (exit_code: i32)
/// Retorno: Nunca retorna
pub const SYS_EXIT: usize = 0x01;

/// Escreve em um descritor (1 e 2 vão para a serial).
/// Args: (fd, buf_ptr, len)
/// Retorno: bytes escritos
pub const SYS_WRITE: usize = 0x02;

/// Lê de um descritor (0 = teclado, sem bloquear).
/// Args: (fd, buf_ptr, len)
/// Retorno: bytes lidos (0 no fim do arquivo)
pub const SYS_READ: usize = 0x03;

/// Abre um caminho relativo ao cwd.
/// Args: (path_ptr, path_len, flags)
/// Retorno: descritor
pub const SYS_OPEN: usize = 0x04;

/// Args: (fd)
pub const SYS_CLOSE: usize = 0x05;

/// Retorno: pid da task atual
pub const SYS_GETPID: usize = 0x06;

/// Dorme pelo menos `ms` milissegundos.
/// Args: (ms)
pub const SYS_SLEEP: usize = 0x07;

/// Retorno: segundos desde o boot
pub const SYS_TIME: usize = 0x08;

/// Reserva páginas zeradas no heap de usuário.
/// Args: (size)
/// Retorno: endereço virtual do bloco
pub const SYS_MALLOC: usize = 0x09;

/// Args: (addr devolvido por malloc)
pub const SYS_FREE: usize = 0x0A;

/// Carrega um ELF32 do VFS num espaço isolado.
/// Args: (path_ptr, path_len)
/// Retorno: pid da nova task
pub const SYS_EXEC: usize = 0x0B;

/// Retorno: milissegundos desde o boot
pub const SYS_GET_TIME: usize = 0x0C;

/// Retorno: ticks do PIT desde o boot
pub const SYS_GET_TICKS: usize = 0x0D;

/// Cede o restante do quantum.
pub const SYS_YIELD: usize = 0x0E;

/// Espera a task terminar e recolhe.
/// Args: (pid)
/// Retorno: código de saída
pub const SYS_WAITPID: usize = 0x0F;

// ============================================================================
// DIRETÓRIO CORRENTE (0x10 - 0x1F)
// ============================================================================

/// Args: (path_ptr, path_len)
pub const SYS_CHDIR: usize = 0x10;

/// Copia o cwd (sem terminador) para o buffer.
/// Args: (buf_ptr, buf_len)
/// Retorno: tamanho do cwd
pub const SYS_GETCWD: usize = 0x11;

// ============================================================================
// IPC (0x20 - 0x2F)
// ============================================================================

/// Args: (dst_pid, msg_ptr)
pub const SYS_SEND: usize = 0x20;

/// Bloqueia até chegar mensagem de `src` (0 = qualquer).
/// Args: (src_pid, msg_ptr)
pub const SYS_RECEIVE: usize = 0x21;

/// Envia e espera a resposta, gravada no mesmo `msg_ptr`.
/// Args: (dst_pid, msg_ptr)
pub const SYS_SENDREC: usize = 0x22;

/// Args: (dst_pid, msg_ptr)
pub const SYS_REPLY: usize = 0x23;

/// Notificação assíncrona, coalescida por remetente.
/// Args: (dst_pid, arg0)
pub const SYS_NOTIFY: usize = 0x24;

// ============================================================================
// SERVIÇOS (0x30 - 0x3F)
// ============================================================================

/// Args: (name_ptr, name_len)
pub const SYS_REGISTER_SERVICE: usize = 0x30;

/// Args: (name_ptr, name_len)
/// Retorno: pid do serviço ou 0
pub const SYS_LOOKUP_SERVICE: usize = 0x31;

/// Concede IOPL=3 a uma task (0 = a própria). Exige IOPL no chamador.
/// Args: (pid)
pub const SYS_GRANT_IO: usize = 0x32;

/// Encaminha uma IRQ para a task atual como notificação.
/// Args: (irq)
pub const SYS_REGISTER_IRQ: usize = 0x33;

/// Cria uma task ring 3 no espaço shared-kernel.
/// Args: (entry, priority, iopl)
/// Retorno: pid
pub const SYS_CREATE_TASK: usize = 0x34;

// ============================================================================
// SUPORTE A SERVIDORES (0x40 - 0x5F)
// ============================================================================

/// Retorno: próximo byte do ring do teclado
pub const SYS_KBD_GETCHAR: usize = 0x40;

/// Args: (path_ptr, path_len, buf_ptr, buf_len, offset)
pub const SYS_RAMFS_READ: usize = 0x41;

/// Args: (path_ptr, path_len, data_ptr, data_len)
pub const SYS_RAMFS_WRITE: usize = 0x42;

/// Args: (path_ptr, path_len, kind) (0 = arquivo, 1 = diretório)
pub const SYS_RAMFS_CREATE: usize = 0x43;

/// Args: (path_ptr, path_len)
pub const SYS_RAMFS_DELETE: usize = 0x44;

/// Args: (name_ptr, name_len, buf_ptr, buf_len, offset)
pub const SYS_PROCFS_READ: usize = 0x45;

/// Lê do primeiro volume FAT16 montado.
/// Args: (path_ptr, path_len, buf_ptr, buf_len)
pub const SYS_FAT16_READ: usize = 0x48;

/// Args: (path_ptr, path_len, data_ptr, data_len)
pub const SYS_FAT16_WRITE: usize = 0x49;

/// Retorno: 1 se há volume FAT16 montado
pub const SYS_FAT16_MOUNTED: usize = 0x4A;

/// Lê do primeiro volume NTFS montado.
/// Args: (path_ptr, path_len, buf_ptr, buf_len)
pub const SYS_NTFS_READ: usize = 0x4C;

/// Args: (path_ptr, path_len, data_ptr, data_len)
pub const SYS_NTFS_WRITE: usize = 0x4D;

/// Retorno: 1 se há volume NTFS montado
pub const SYS_NTFS_MOUNTED: usize = 0x4E;

/// Args: (drive, lba, buf_ptr, sectors)
pub const SYS_ATA_READ: usize = 0x50;

/// Args: (drive, lba, buf_ptr, sectors)
pub const SYS_ATA_WRITE: usize = 0x51;

/// Args: (drive)
/// Retorno: total de setores
pub const SYS_ATA_INFO: usize = 0x52;

/// Retorno: bit 31 presente, bits 16..24 IRQ, bits 0..16 contagem
pub const SYS_NET_STATUS: usize = 0x54;

/// Retorno: contagem de IRQs da placa
pub const SYS_NET_POLL: usize = 0x55;

/// Linha no log serial do kernel.
/// Args: (msg_ptr, msg_len)
pub const SYS_DEBUG_LOG: usize = 0x5F;

// ============================================================================
// JANELAS GUI (0x60 - 0x6F)
// ============================================================================

/// Args: (title_ptr, title_len)
/// Retorno: endereço do framebuffer da janela
pub const SYS_GUI_WIN_OPEN: usize = 0x60;

/// Marca a janela suja e cede a CPU ao compositor.
pub const SYS_GUI_PRESENT: usize = 0x61;

pub const SYS_GUI_WIN_CLOSE: usize = 0x62;

pub const SYS_GUI_GET_TICKS: usize = 0x63;

/// Lado do compositor: recolhe janelas órfãs e devolve a máscara de sujas.
pub const SYS_GUI_POLL: usize = 0x64;

// ============================================================================
// GPU 3D (0x70 - 0x7F)
// ============================================================================

/// Args: (cmd_ptr, cmd_len) em bytes
pub const SYS_VIRGL_SUBMIT: usize = 0x70;

pub const SYS_GPU3D_INIT: usize = 0x71;

/// Args: (rgba)
pub const SYS_GPU3D_CLEAR: usize = 0x72;

/// Args: (vertex_ptr, len)
/// Retorno: vértices aceitos
pub const SYS_GPU3D_UPLOAD: usize = 0x73;

/// Args: (matrix_ptr) com 16 f32
pub const SYS_GPU3D_MVP: usize = 0x74;

/// Args: (first, count)
pub const SYS_GPU3D_DRAW: usize = 0x75;

/// Retorno: draws do quadro apresentado
pub const SYS_GPU3D_PRESENT: usize = 0x76;
