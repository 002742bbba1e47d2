//! Estado 3D por processo para as syscalls `gpu3d_*`.
//!
//! O kernel não rasteriza: guarda cor de fundo, vértices, matriz MVP e a
//! contagem de draws; `present` limpa a tela pelo caminho 2D. Programas
//! que falam Virgl direto usam `virgl_submit`.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use spin::Mutex;

use super::gpu::VIRGL_CONTEXT;
use super::GPU;
use crate::sys::{Errno, Pid};

/// Limite de dados de vértice por processo.
pub const MAX_VERTEX_BYTES: usize = 64 * 1024;
/// x, y, z, w em f32.
pub const VERTEX_STRIDE: usize = 16;

pub const IDENTITY: [f32; 16] = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0,
];

#[derive(Debug, Clone)]
pub struct Gpu3dState {
    pub clear_color: u32,
    pub vertices: Vec<u8>,
    pub mvp: [f32; 16],
    pub draws: u32,
    pub drawn_vertices: u32,
}

impl Gpu3dState {
    fn new() -> Self {
        Self {
            clear_color: 0,
            vertices: Vec::new(),
            mvp: IDENTITY,
            draws: 0,
            drawn_vertices: 0,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / VERTEX_STRIDE
    }
}

/// Resultado de um `present`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub clear_color: u32,
    pub draws: u32,
    pub vertices: u32,
}

#[derive(Default)]
pub struct Gpu3dTable {
    states: BTreeMap<u32, Gpu3dState>,
}

impl Gpu3dTable {
    pub const fn new() -> Self {
        Self { states: BTreeMap::new() }
    }

    pub fn init(&mut self, pid: Pid) {
        self.states.insert(pid.as_u32(), Gpu3dState::new());
    }

    fn state(&mut self, pid: Pid) -> Result<&mut Gpu3dState, Errno> {
        self.states.get_mut(&pid.as_u32()).ok_or(Errno::EINVAL)
    }

    pub fn get(&self, pid: Pid) -> Option<&Gpu3dState> {
        self.states.get(&pid.as_u32())
    }

    pub fn clear(&mut self, pid: Pid, color: u32) -> Result<(), Errno> {
        self.state(pid)?.clear_color = color;
        Ok(())
    }

    /// Substitui o buffer de vértices; devolve quantos vértices há.
    pub fn upload(&mut self, pid: Pid, data: &[u8]) -> Result<usize, Errno> {
        if data.len() > MAX_VERTEX_BYTES {
            return Err(Errno::EFBIG);
        }
        if data.len() % VERTEX_STRIDE != 0 {
            return Err(Errno::EINVAL);
        }
        let state = self.state(pid)?;
        state.vertices.clear();
        state.vertices.extend_from_slice(data);
        Ok(state.vertex_count())
    }

    /// Matriz 4x4 em f32 little-endian (64 bytes).
    pub fn set_mvp(&mut self, pid: Pid, raw: &[u8]) -> Result<(), Errno> {
        if raw.len() != 64 {
            return Err(Errno::EINVAL);
        }
        let state = self.state(pid)?;
        for (dst, src) in state.mvp.iter_mut().zip(raw.chunks_exact(4)) {
            *dst = f32::from_le_bytes([src[0], src[1], src[2], src[3]]);
        }
        Ok(())
    }

    pub fn draw(&mut self, pid: Pid, first: u32, count: u32) -> Result<(), Errno> {
        let state = self.state(pid)?;
        let end = first as u64 + count as u64;
        if count == 0 || end > state.vertex_count() as u64 {
            return Err(Errno::EINVAL);
        }
        state.draws += 1;
        state.drawn_vertices += count;
        Ok(())
    }

    /// Fecha o quadro e zera os contadores.
    pub fn present(&mut self, pid: Pid) -> Result<Frame, Errno> {
        let state = self.state(pid)?;
        let frame = Frame {
            clear_color: state.clear_color,
            draws: state.draws,
            vertices: state.drawn_vertices,
        };
        state.draws = 0;
        state.drawn_vertices = 0;
        Ok(frame)
    }

    pub fn release(&mut self, pid: Pid) -> bool {
        self.states.remove(&pid.as_u32()).is_some()
    }
}

static STATES: Mutex<Gpu3dTable> = Mutex::new(Gpu3dTable::new());

pub fn init(pid: Pid) -> Result<(), Errno> {
    if GPU.lock().is_none() {
        return Err(Errno::ENODEV);
    }
    STATES.lock().init(pid);
    Ok(())
}

pub fn clear(pid: Pid, color: u32) -> Result<(), Errno> {
    STATES.lock().clear(pid, color)
}

pub fn upload(pid: Pid, data: &[u8]) -> Result<usize, Errno> {
    STATES.lock().upload(pid, data)
}

pub fn set_mvp(pid: Pid, raw: &[u8]) -> Result<(), Errno> {
    STATES.lock().set_mvp(pid, raw)
}

pub fn draw(pid: Pid, first: u32, count: u32) -> Result<(), Errno> {
    STATES.lock().draw(pid, first, count)
}

/// Limpa a tela com a cor do processo; devolve os draws do quadro.
pub fn present(pid: Pid) -> Result<u32, Errno> {
    let frame = STATES.lock().present(pid)?;
    let mut gpu = GPU.lock();
    let dev = gpu.as_mut().ok_or(Errno::ENODEV)?;
    dev.fill(frame.clear_color).map_err(|_| Errno::EIO)?;
    crate::ktrace!("(GPU3D) present, draws=", frame.draws);
    Ok(frame.draws)
}

/// Command buffer Virgl do usuário para o contexto do kernel.
pub fn virgl_submit(data: &[u8]) -> Result<(), Errno> {
    let mut gpu = GPU.lock();
    let dev = gpu.as_mut().ok_or(Errno::ENODEV)?;
    if !dev.has_virgl() {
        return Err(Errno::ENODEV);
    }
    dev.submit_3d(VIRGL_CONTEXT, data).map_err(|_| Errno::EIO)
}

/// Limpeza na morte do processo.
pub fn release(pid: Pid) {
    STATES.lock().release(pid);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verts(n: usize) -> std::vec::Vec<u8> {
        vec![0u8; n * VERTEX_STRIDE]
    }

    #[test]
    fn state_is_per_process() {
        let mut t = Gpu3dTable::new();
        let a = Pid::new(3);
        let b = Pid::new(4);
        t.init(a);
        assert_eq!(t.clear(b, 1), Err(Errno::EINVAL));

        t.clear(a, 0x00112233).unwrap();
        assert_eq!(t.upload(a, &verts(3)), Ok(3));
        t.draw(a, 0, 3).unwrap();
        t.draw(a, 1, 2).unwrap();
        assert_eq!(
            t.present(a),
            Ok(Frame { clear_color: 0x00112233, draws: 2, vertices: 5 })
        );
        assert_eq!(t.present(a).unwrap().draws, 0);
        assert!(t.release(a));
        assert!(!t.release(a));
    }

    #[test]
    fn draw_range_must_fit_upload() {
        let mut t = Gpu3dTable::new();
        let p = Pid::new(5);
        t.init(p);
        t.upload(p, &verts(4)).unwrap();
        assert_eq!(t.draw(p, 2, 3), Err(Errno::EINVAL));
        assert_eq!(t.draw(p, 0, 0), Err(Errno::EINVAL));
        assert_eq!(t.upload(p, &[0u8; 10]), Err(Errno::EINVAL));
        assert_eq!(t.upload(p, &verts(MAX_VERTEX_BYTES / VERTEX_STRIDE + 1)), Err(Errno::EFBIG));
    }

    #[test]
    fn mvp_is_parsed_as_le_floats() {
        let mut t = Gpu3dTable::new();
        let p = Pid::new(6);
        t.init(p);
        assert_eq!(t.get(p).unwrap().mvp, IDENTITY);

        let mut raw = [0u8; 64];
        raw[0..4].copy_from_slice(&2.0f32.to_le_bytes());
        raw[60..64].copy_from_slice(&0.5f32.to_le_bytes());
        t.set_mvp(p, &raw).unwrap();
        let mvp = t.get(p).unwrap().mvp;
        assert_eq!(mvp[0], 2.0);
        assert_eq!(mvp[15], 0.5);
        assert_eq!(t.set_mvp(p, &raw[..32]), Err(Errno::EINVAL));
    }
}
