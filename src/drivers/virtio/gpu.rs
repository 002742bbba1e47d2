//! # VirtIO-GPU
//!
//! Fila de controle (0) com comandos síncronos: cada comando é um par
//! `(request readable, response writable)` e a resposta começa com o mesmo
//! header de 24 bytes.
//!
//! ```text
//! header: type u32 | flags u32 | fence_id u64 | ctx_id u32 | ring_idx u8 | pad [3]
//! ```

use alloc::vec;
use alloc::vec::Vec;

use super::dma::DmaBuffer;
use super::transport::VirtioDevice;
use super::virtqueue::Buffer;
use super::VirtioError;
use crate::drivers::pci::PciDevice;
use crate::klib::bytes::{read_u32, write_u32, write_u64};

pub const CMD_GET_DISPLAY_INFO: u32 = 0x0100;
pub const CMD_RESOURCE_CREATE_2D: u32 = 0x0101;
pub const CMD_RESOURCE_UNREF: u32 = 0x0102;
pub const CMD_SET_SCANOUT: u32 = 0x0103;
pub const CMD_RESOURCE_FLUSH: u32 = 0x0104;
pub const CMD_TRANSFER_TO_HOST_2D: u32 = 0x0105;
pub const CMD_RESOURCE_ATTACH_BACKING: u32 = 0x0106;
pub const CMD_CTX_CREATE: u32 = 0x0200;
pub const CMD_SUBMIT_3D: u32 = 0x0207;

pub const RESP_OK_NODATA: u32 = 0x1100;
pub const RESP_OK_DISPLAY_INFO: u32 = 0x1101;
/// Início da faixa de erros (`ERR_UNSPEC`).
pub const RESP_ERR_BASE: u32 = 0x1200;

pub const FORMAT_B8G8R8X8: u32 = 2;

pub const HEADER_SIZE: usize = 24;
pub const MAX_SCANOUTS: usize = 16;
const DISPLAY_ONE_SIZE: usize = 24;
const DISPLAY_INFO_SIZE: usize = HEADER_SIZE + MAX_SCANOUTS * DISPLAY_ONE_SIZE;

/// Feature VIRTIO_GPU_F_VIRGL.
pub const F_VIRGL: u64 = 1 << 0;

/// Tamanho dos buffers DMA da fila de controle.
const CONTROL_BUF_SIZE: usize = 64 * 1024;
/// Maior command buffer aceito por `submit_3d`.
pub const MAX_SUBMIT_3D: usize = CONTROL_BUF_SIZE - HEADER_SIZE - 8;

const DEFAULT_WIDTH: u32 = 1024;
const DEFAULT_HEIGHT: u32 = 768;
const SCANOUT_RESOURCE: u32 = 1;
pub const VIRGL_CONTEXT: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    fn encode(&self, buf: &mut [u8], off: usize) {
        write_u32(buf, off, self.x);
        write_u32(buf, off + 4, self.y);
        write_u32(buf, off + 8, self.width);
        write_u32(buf, off + 12, self.height);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scanout {
    pub rect: Rect,
    pub enabled: bool,
}

/// Canal request/response com o dispositivo.
pub trait CommandQueue {
    /// Envia `cmd`, espera a conclusão e copia a resposta em `resp`.
    fn exchange(&mut self, cmd: &[u8], resp: &mut [u8]) -> Result<(), VirtioError>;
}

/// Fila de controle real sobre o transporte PCI.
pub struct ControlQueue {
    dev: VirtioDevice,
    cmd: DmaBuffer,
    resp: DmaBuffer,
}

impl ControlQueue {
    pub fn new(dev: VirtioDevice) -> Result<Self, VirtioError> {
        Ok(Self {
            dev,
            cmd: DmaBuffer::new(CONTROL_BUF_SIZE)?,
            resp: DmaBuffer::new(CONTROL_BUF_SIZE)?,
        })
    }
}

impl CommandQueue for ControlQueue {
    fn exchange(&mut self, cmd: &[u8], resp: &mut [u8]) -> Result<(), VirtioError> {
        if cmd.len() > self.cmd.len() || resp.len() > self.resp.len() {
            return Err(VirtioError::QueueFull);
        }
        self.cmd.as_mut_slice()[..cmd.len()].copy_from_slice(cmd);
        self.resp.as_mut_slice()[..resp.len()].fill(0);

        self.dev.send(
            0,
            Buffer::readable(self.cmd.phys(), cmd.len() as u32),
            Some(Buffer::writable(self.resp.phys(), resp.len() as u32)),
        )?;
        self.dev.notify(0)?;
        self.dev.wait(0)?;
        resp.copy_from_slice(&self.resp.as_slice()[..resp.len()]);
        Ok(())
    }
}

fn header(buf: &mut [u8], cmd_type: u32, ctx_id: u32) {
    write_u32(buf, 0, cmd_type);
    write_u32(buf, 4, 0);
    write_u64(buf, 8, 0);
    write_u32(buf, 16, ctx_id);
    write_u32(buf, 20, 0);
}

/// Tipo da resposta; erro se estiver na faixa de erro ou diferente do esperado.
pub fn check_response(resp: &[u8], expected: u32) -> Result<(), VirtioError> {
    let ty = read_u32(resp, 0);
    if ty >= RESP_ERR_BASE || ty != expected {
        return Err(VirtioError::DeviceError(ty));
    }
    Ok(())
}

pub struct GpuDevice<Q: CommandQueue> {
    queue: Q,
    width: u32,
    height: u32,
    framebuffer: Option<DmaBuffer>,
    virgl: bool,
}

impl<Q: CommandQueue> GpuDevice<Q> {
    pub fn new(queue: Q) -> Self {
        Self {
            queue,
            width: 0,
            height: 0,
            framebuffer: None,
            virgl: false,
        }
    }

    fn simple(&mut self, cmd: &[u8]) -> Result<(), VirtioError> {
        let mut resp = [0u8; HEADER_SIZE];
        self.queue.exchange(cmd, &mut resp)?;
        check_response(&resp, RESP_OK_NODATA)
    }

    pub fn display_info(&mut self) -> Result<Vec<Scanout>, VirtioError> {
        let mut cmd = [0u8; HEADER_SIZE];
        header(&mut cmd, CMD_GET_DISPLAY_INFO, 0);
        let mut resp = vec![0u8; DISPLAY_INFO_SIZE];
        self.queue.exchange(&cmd, &mut resp)?;
        check_response(&resp, RESP_OK_DISPLAY_INFO)?;

        Ok((0..MAX_SCANOUTS)
            .map(|i| {
                let off = HEADER_SIZE + i * DISPLAY_ONE_SIZE;
                Scanout {
                    rect: Rect::new(
                        read_u32(&resp, off),
                        read_u32(&resp, off + 4),
                        read_u32(&resp, off + 8),
                        read_u32(&resp, off + 12),
                    ),
                    enabled: read_u32(&resp, off + 16) != 0,
                }
            })
            .collect())
    }

    pub fn resource_create_2d(&mut self, id: u32, width: u32, height: u32) -> Result<(), VirtioError> {
        let mut cmd = [0u8; HEADER_SIZE + 16];
        header(&mut cmd, CMD_RESOURCE_CREATE_2D, 0);
        write_u32(&mut cmd, 24, id);
        write_u32(&mut cmd, 28, FORMAT_B8G8R8X8);
        write_u32(&mut cmd, 32, width);
        write_u32(&mut cmd, 36, height);
        self.simple(&cmd)
    }

    /// Backing de uma única entrada (memória fisicamente contígua).
    pub fn attach_backing(&mut self, id: u32, addr: u64, len: u32) -> Result<(), VirtioError> {
        let mut cmd = [0u8; HEADER_SIZE + 24];
        header(&mut cmd, CMD_RESOURCE_ATTACH_BACKING, 0);
        write_u32(&mut cmd, 24, id);
        write_u32(&mut cmd, 28, 1);
        write_u64(&mut cmd, 32, addr);
        write_u32(&mut cmd, 40, len);
        self.simple(&cmd)
    }

    pub fn set_scanout(&mut self, scanout: u32, id: u32, rect: Rect) -> Result<(), VirtioError> {
        let mut cmd = [0u8; HEADER_SIZE + 24];
        header(&mut cmd, CMD_SET_SCANOUT, 0);
        rect.encode(&mut cmd, 24);
        write_u32(&mut cmd, 40, scanout);
        write_u32(&mut cmd, 44, id);
        self.simple(&cmd)
    }

    pub fn transfer_to_host_2d(&mut self, id: u32, rect: Rect, offset: u64) -> Result<(), VirtioError> {
        let mut cmd = [0u8; HEADER_SIZE + 32];
        header(&mut cmd, CMD_TRANSFER_TO_HOST_2D, 0);
        rect.encode(&mut cmd, 24);
        write_u64(&mut cmd, 40, offset);
        write_u32(&mut cmd, 48, id);
        self.simple(&cmd)
    }

    pub fn resource_flush(&mut self, id: u32, rect: Rect) -> Result<(), VirtioError> {
        let mut cmd = [0u8; HEADER_SIZE + 24];
        header(&mut cmd, CMD_RESOURCE_FLUSH, 0);
        rect.encode(&mut cmd, 24);
        write_u32(&mut cmd, 40, id);
        self.simple(&cmd)
    }

    pub fn resource_unref(&mut self, id: u32) -> Result<(), VirtioError> {
        let mut cmd = [0u8; HEADER_SIZE + 8];
        header(&mut cmd, CMD_RESOURCE_UNREF, 0);
        write_u32(&mut cmd, 24, id);
        self.simple(&cmd)
    }

    pub fn ctx_create(&mut self, ctx_id: u32, name: &str) -> Result<(), VirtioError> {
        let mut cmd = [0u8; HEADER_SIZE + 72];
        header(&mut cmd, CMD_CTX_CREATE, ctx_id);
        let bytes = &name.as_bytes()[..name.len().min(64)];
        write_u32(&mut cmd, 24, bytes.len() as u32);
        cmd[32..32 + bytes.len()].copy_from_slice(bytes);
        self.simple(&cmd)
    }

    /// Repassa um command buffer Virgl já codificado.
    pub fn submit_3d(&mut self, ctx_id: u32, data: &[u8]) -> Result<(), VirtioError> {
        if data.len() > MAX_SUBMIT_3D {
            return Err(VirtioError::QueueFull);
        }
        let mut cmd = vec![0u8; HEADER_SIZE + 8 + data.len()];
        header(&mut cmd, CMD_SUBMIT_3D, ctx_id);
        write_u32(&mut cmd, 24, data.len() as u32);
        cmd[HEADER_SIZE + 8..].copy_from_slice(data);
        self.simple(&cmd)
    }

    /// Scanout 0 ligado a um recurso 2D com backing no heap.
    pub fn setup_framebuffer(&mut self) -> Result<(), VirtioError> {
        let mode = self
            .display_info()?
            .into_iter()
            .find(|s| s.enabled && s.rect.width > 0 && s.rect.height > 0)
            .map(|s| (s.rect.width, s.rect.height))
            .unwrap_or((DEFAULT_WIDTH, DEFAULT_HEIGHT));
        let (width, height) = mode;
        let fb = DmaBuffer::new(width as usize * height as usize * 4)?;

        self.resource_create_2d(SCANOUT_RESOURCE, width, height)?;
        if let Err(e) = self
            .attach_backing(SCANOUT_RESOURCE, fb.phys(), fb.len() as u32)
            .and_then(|_| self.set_scanout(0, SCANOUT_RESOURCE, Rect::new(0, 0, width, height)))
        {
            let _ = self.resource_unref(SCANOUT_RESOURCE);
            return Err(e);
        }

        self.width = width;
        self.height = height;
        self.framebuffer = Some(fb);
        Ok(())
    }

    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn has_virgl(&self) -> bool {
        self.virgl
    }

    pub fn framebuffer_mut(&mut self) -> Option<&mut [u8]> {
        self.framebuffer.as_mut().map(DmaBuffer::as_mut_slice)
    }

    /// Envia um retângulo do framebuffer para o host e atualiza a tela.
    pub fn flush(&mut self, rect: Rect) -> Result<(), VirtioError> {
        if self.framebuffer.is_none() {
            return Err(VirtioError::NotFound);
        }
        let offset = (rect.y as u64 * self.width as u64 + rect.x as u64) * 4;
        self.transfer_to_host_2d(SCANOUT_RESOURCE, rect, offset)?;
        self.resource_flush(SCANOUT_RESOURCE, rect)
    }

    /// Preenche a tela inteira com `color` (XRGB) e faz flush.
    pub fn fill(&mut self, color: u32) -> Result<(), VirtioError> {
        let (w, h) = (self.width, self.height);
        let fb = self.framebuffer_mut().ok_or(VirtioError::NotFound)?;
        for px in fb.chunks_exact_mut(4) {
            px.copy_from_slice(&color.to_le_bytes());
        }
        self.flush(Rect::new(0, 0, w, h))
    }
}

/// Inicialização completa da GPU encontrada no barramento.
pub fn probe(pci: PciDevice) -> Result<GpuDevice<ControlQueue>, VirtioError> {
    let mut dev = VirtioDevice::init(pci, F_VIRGL)?;
    dev.setup_queue(0)?;
    dev.driver_ok();
    let virgl = dev.features() & F_VIRGL != 0;

    let mut gpu = GpuDevice::new(ControlQueue::new(dev)?);
    gpu.setup_framebuffer()?;
    if virgl {
        match gpu.ctx_create(VIRGL_CONTEXT, "basalt") {
            Ok(()) => gpu.virgl = true,
            Err(_) => crate::kwarn!("(VirtIO) GPU sem contexto 3D"),
        }
    }
    Ok(gpu)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::virtio::virtqueue::sim::SimDevice;
    use crate::drivers::virtio::virtqueue::Virtqueue;
    use std::vec::Vec;

    /// Responde como um host QEMU simplificado.
    fn host_reply(cmd: &[u8], resp: &mut [u8], fail_type: Option<u32>) {
        let ty = read_u32(cmd, 0);
        if Some(ty) == fail_type {
            write_u32(resp, 0, RESP_ERR_BASE + 3);
            return;
        }
        if ty == CMD_GET_DISPLAY_INFO {
            write_u32(resp, 0, RESP_OK_DISPLAY_INFO);
            write_u32(resp, HEADER_SIZE + 8, 640);
            write_u32(resp, HEADER_SIZE + 12, 480);
            write_u32(resp, HEADER_SIZE + 16, 1);
        } else {
            write_u32(resp, 0, RESP_OK_NODATA);
        }
    }

    #[derive(Default)]
    struct RecordingQueue {
        sent: Vec<Vec<u8>>,
        fail_type: Option<u32>,
    }

    impl CommandQueue for RecordingQueue {
        fn exchange(&mut self, cmd: &[u8], resp: &mut [u8]) -> Result<(), VirtioError> {
            self.sent.push(cmd.to_vec());
            host_reply(cmd, resp, self.fail_type);
            Ok(())
        }
    }

    /// Fila de verdade com o dispositivo simulado do outro lado.
    struct SimQueue {
        vq: Virtqueue,
        dev: SimDevice,
        cmd: DmaBuffer,
        resp: DmaBuffer,
        chain_lens: Vec<(u32, u32)>,
    }

    impl CommandQueue for SimQueue {
        fn exchange(&mut self, cmd: &[u8], resp: &mut [u8]) -> Result<(), VirtioError> {
            self.cmd.as_mut_slice()[..cmd.len()].copy_from_slice(cmd);
            let head = self.vq.send(
                Buffer::readable(self.cmd.phys(), cmd.len() as u32),
                Some(Buffer::writable(self.resp.phys(), resp.len() as u32)),
            )?;
            let lens = &mut self.chain_lens;
            self.dev.process(&self.vq, |chain| {
                lens.push((chain[0].len, chain[1].len));
                host_reply(chain[0].bytes(), chain[1].bytes(), None);
                chain[1].len
            });
            let used = self.vq.poll().ok_or(VirtioError::Timeout)?;
            assert_eq!(used.id, head);
            resp.copy_from_slice(&self.resp.as_slice()[..resp.len()]);
            Ok(())
        }
    }

    #[test]
    fn display_info_through_a_virtqueue() {
        let queue = SimQueue {
            vq: Virtqueue::new(16).unwrap(),
            dev: SimDevice::new(),
            cmd: DmaBuffer::new(4096).unwrap(),
            resp: DmaBuffer::new(4096).unwrap(),
            chain_lens: Vec::new(),
        };
        let mut gpu = GpuDevice::new(queue);

        let scanouts = gpu.display_info().unwrap();
        assert_eq!(scanouts.len(), MAX_SCANOUTS);
        assert!(scanouts.iter().any(|s| s.enabled));
        assert_eq!(scanouts[0].rect, Rect::new(0, 0, 640, 480));
        assert_eq!(gpu.queue.chain_lens, vec![(24, DISPLAY_INFO_SIZE as u32)]);
        assert_eq!(gpu.queue.vq.num_free(), 16);
    }

    #[test]
    fn create_2d_wire_format() {
        let mut gpu = GpuDevice::new(RecordingQueue::default());
        gpu.resource_create_2d(7, 800, 600).unwrap();
        let cmd = &gpu.queue.sent[0];
        assert_eq!(cmd.len(), 40);
        assert_eq!(read_u32(cmd, 0), CMD_RESOURCE_CREATE_2D);
        assert_eq!(read_u32(cmd, 24), 7);
        assert_eq!(read_u32(cmd, 28), FORMAT_B8G8R8X8);
        assert_eq!(read_u32(cmd, 32), 800);
        assert_eq!(read_u32(cmd, 36), 600);
    }

    #[test]
    fn error_range_responses_fail() {
        let mut gpu = GpuDevice::new(RecordingQueue {
            fail_type: Some(CMD_RESOURCE_FLUSH),
            ..Default::default()
        });
        assert_eq!(
            gpu.resource_flush(1, Rect::new(0, 0, 1, 1)),
            Err(VirtioError::DeviceError(RESP_ERR_BASE + 3))
        );
        assert!(check_response(&[0, 0x11, 0, 0], RESP_OK_NODATA).is_ok());
        assert!(check_response(&[1, 0x11, 0, 0], RESP_OK_NODATA).is_err());
    }

    #[test]
    fn framebuffer_setup_sequence() {
        let mut gpu = GpuDevice::new(RecordingQueue::default());
        gpu.setup_framebuffer().unwrap();
        assert_eq!(gpu.resolution(), (640, 480));

        let types: Vec<u32> = gpu.queue.sent.iter().map(|c| read_u32(c, 0)).collect();
        assert_eq!(
            types,
            vec![
                CMD_GET_DISPLAY_INFO,
                CMD_RESOURCE_CREATE_2D,
                CMD_RESOURCE_ATTACH_BACKING,
                CMD_SET_SCANOUT
            ]
        );
        let attach = &gpu.queue.sent[2];
        assert_eq!(read_u32(attach, 40), 640 * 480 * 4);

        gpu.fill(0x00FF_0000).unwrap();
        assert_eq!(gpu.framebuffer_mut().unwrap()[0..4], [0x00, 0x00, 0xFF, 0x00]);
        let n = gpu.queue.sent.len();
        assert_eq!(read_u32(&gpu.queue.sent[n - 2], 0), CMD_TRANSFER_TO_HOST_2D);
        assert_eq!(read_u32(&gpu.queue.sent[n - 1], 0), CMD_RESOURCE_FLUSH);
    }

    #[test]
    fn failed_scanout_releases_resource() {
        let mut gpu = GpuDevice::new(RecordingQueue {
            fail_type: Some(CMD_SET_SCANOUT),
            ..Default::default()
        });
        assert!(gpu.setup_framebuffer().is_err());
        assert_eq!(read_u32(gpu.queue.sent.last().unwrap(), 0), CMD_RESOURCE_UNREF);
        assert!(gpu.framebuffer_mut().is_none());
    }

    #[test]
    fn submit_3d_carries_context_and_size() {
        let mut gpu = GpuDevice::new(RecordingQueue::default());
        gpu.submit_3d(VIRGL_CONTEXT, &[1, 2, 3, 4]).unwrap();
        let cmd = &gpu.queue.sent[0];
        assert_eq!(read_u32(cmd, 16), VIRGL_CONTEXT);
        assert_eq!(read_u32(cmd, 24), 4);
        assert_eq!(&cmd[32..], &[1, 2, 3, 4]);
        assert_eq!(
            gpu.submit_3d(VIRGL_CONTEXT, &vec![0u8; MAX_SUBMIT_3D + 1]),
            Err(VirtioError::QueueFull)
        );
    }
}
