//! # Volume FAT16
//!
//! Caminhos são relativos à raiz do volume (`/docs/a.txt`). O diretório
//! raiz tem tamanho fixo; subdiretórios crescem um cluster por vez.

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;

use crate::drivers::block::{BlockDevice, SECTOR_SIZE};
use crate::fs::error::{FsError, FsResult};
use crate::fs::types::{DirEntry, FileStat, NodeKind, VolumeInfo};

use super::bpb::{Bpb, Layout};
use super::dir::{self, FileAttr, Found, ShortEntry, DELETED, ENTRY_SIZE};

/// Tentativas de `NOME~N` antes de desistir.
const MAX_ALIAS_PROBES: u32 = 9999;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DirLoc {
    Root,
    Cluster(u16),
}

impl DirLoc {
    /// `..` e entradas de diretório usam cluster 0 para a raiz.
    fn from_cluster(cluster: u16) -> Self {
        if cluster == 0 {
            DirLoc::Root
        } else {
            DirLoc::Cluster(cluster)
        }
    }

    fn cluster(&self) -> u16 {
        match self {
            DirLoc::Root => 0,
            DirLoc::Cluster(c) => *c,
        }
    }
}

/// Diretório inteiro em memória, com o LBA de cada setor.
struct DirImage {
    loc: DirLoc,
    lbas: Vec<u64>,
    buf: Vec<u8>,
}

pub struct Fat16 {
    pub(super) dev: Arc<dyn BlockDevice>,
    pub(super) bpb: Bpb,
    pub(super) layout: Layout,
}

fn components(path: &str) -> Vec<&str> {
    path.split('/').filter(|c| !c.is_empty() && *c != ".").collect()
}

impl Fat16 {
    /// Lê o boot sector e valida a geometria FAT16.
    pub fn mount(dev: Arc<dyn BlockDevice>) -> FsResult<Self> {
        let mut sector = [0u8; SECTOR_SIZE];
        dev.read_block(0, &mut sector)?;
        let bpb = Bpb::parse(&sector)?;
        let layout = Layout::from_bpb(&bpb)?;
        if bpb.total_sectors as u64 > dev.total_blocks() {
            return Err(FsError::Corrupt);
        }
        crate::kdebug!("(FAT16) Volume montado, clusters=", layout.total_clusters);
        Ok(Self { dev, bpb, layout })
    }

    pub fn info(&self) -> VolumeInfo {
        VolumeInfo {
            fs_type: "FAT16",
            label: self.volume_label(),
            total_sectors: self.bpb.total_sectors as u64,
            cluster_size: self.layout.cluster_size as u32,
        }
    }

    /// Rótulo da entrada VOLUME_ID da raiz, ou o do BPB.
    pub fn volume_label(&self) -> String {
        if let Ok(root) = self.load_dir(DirLoc::Root) {
            if let Some(found) = dir::scan(&root.buf).into_iter().find(|f| f.entry.attr.is_volume_id()) {
                return super::bpb::trim_label(&found.entry.name);
            }
        }
        self.bpb.label.clone()
    }

    // =========================================================================
    // DIRETÓRIOS
    // =========================================================================

    fn load_dir(&self, loc: DirLoc) -> FsResult<DirImage> {
        let lbas: Vec<u64> = match loc {
            DirLoc::Root => (0..self.layout.root_dir_sectors).map(|s| self.layout.root_dir_lba + s).collect(),
            DirLoc::Cluster(start) => {
                let spc = self.layout.sectors_per_cluster;
                self.chain(start)?
                    .into_iter()
                    .flat_map(|c| {
                        let lba = self.layout.cluster_lba(c);
                        (0..spc).map(move |s| lba + s)
                    })
                    .collect()
            }
        };

        let mut buf = vec![0u8; lbas.len() * SECTOR_SIZE];
        for (i, &lba) in lbas.iter().enumerate() {
            self.dev.read_block(lba, &mut buf[i * SECTOR_SIZE..(i + 1) * SECTOR_SIZE])?;
        }
        Ok(DirImage { loc, lbas, buf })
    }

    /// Regrava os setores que contêm os slots `[first, first + count)`.
    fn store_slots(&self, dir: &DirImage, first: usize, count: usize) -> FsResult<()> {
        let per_sector = SECTOR_SIZE / ENTRY_SIZE;
        let first_sector = first / per_sector;
        let last_sector = (first + count - 1) / per_sector;
        for s in first_sector..=last_sector {
            let lba = *dir.lbas.get(s).ok_or(FsError::Corrupt)?;
            self.dev.write_block(lba, &dir.buf[s * SECTOR_SIZE..(s + 1) * SECTOR_SIZE])?;
        }
        Ok(())
    }

    /// Acrescenta um cluster zerado a um subdiretório.
    fn grow_dir(&self, dir: &mut DirImage) -> FsResult<()> {
        let start = match dir.loc {
            DirLoc::Root => return Err(FsError::NoSpace),
            DirLoc::Cluster(c) => c,
        };
        let last = *self.chain(start)?.last().ok_or(FsError::Corrupt)?;
        let new = self.alloc_cluster()?;
        if let Err(e) = self.zero_cluster(new).and_then(|_| self.write_fat(last, new)) {
            let _ = self.free_chain(new);
            return Err(e);
        }
        let lba = self.layout.cluster_lba(new);
        dir.lbas.extend((0..self.layout.sectors_per_cluster).map(|s| lba + s));
        dir.buf.resize(dir.lbas.len() * SECTOR_SIZE, 0);
        Ok(())
    }

    fn resolve_dir(&self, comps: &[&str]) -> FsResult<DirLoc> {
        let mut loc = DirLoc::Root;
        for comp in comps {
            let dir = self.load_dir(loc)?;
            let found = find(&dir, comp).ok_or(FsError::NotFound)?;
            if !found.entry.attr.is_directory() {
                return Err(FsError::NotDir);
            }
            loc = DirLoc::from_cluster(found.entry.first_cluster);
        }
        Ok(loc)
    }

    /// Diretório pai carregado e a entrada do último componente, se existir.
    fn lookup<'p>(&self, path: &'p str) -> FsResult<(DirImage, &'p str, Option<Found>)> {
        let comps = components(path);
        let (name, parents) = comps.split_last().ok_or(FsError::IsDir)?;
        if parents.contains(&"..") || *name == ".." {
            return Err(FsError::InvalidName);
        }
        let dir = self.load_dir(self.resolve_dir(parents)?)?;
        let found = find(&dir, name);
        Ok((dir, *name, found))
    }

    /// Grava as entradas (LFN + 8.3) para `name` no diretório.
    fn add_entry(&self, dir: &mut DirImage, name: &str, mut entry: ShortEntry) -> FsResult<()> {
        let lfn = if dir::needs_lfn(name) {
            let taken: Vec<[u8; 11]> = dir::scan(&dir.buf).iter().map(|f| f.entry.name).collect();
            entry.name = (1..=MAX_ALIAS_PROBES)
                .map(|n| dir::alias(name, n))
                .find(|candidate| !taken.contains(candidate))
                .ok_or(FsError::NoSpace)?;
            dir::lfn_entries(name, dir::checksum(&entry.name))
        } else {
            entry.name = dir::short_name(name);
            Vec::new()
        };

        let total = lfn.len() + 1;
        let first = match dir::find_free_run(&dir.buf, total) {
            Some(slot) => slot,
            None => {
                self.grow_dir(dir)?;
                dir::find_free_run(&dir.buf, total).ok_or(FsError::NoSpace)?
            }
        };

        for (i, raw) in lfn.iter().enumerate() {
            let off = (first + i) * ENTRY_SIZE;
            dir.buf[off..off + ENTRY_SIZE].copy_from_slice(raw);
        }
        let off = (first + lfn.len()) * ENTRY_SIZE;
        entry.encode(&mut dir.buf[off..off + ENTRY_SIZE]);
        self.store_slots(dir, first, total)
    }

    /// Marca a entrada 8.3 e suas LFN como apagadas.
    fn remove_entry(&self, dir: &mut DirImage, found: &Found) -> FsResult<()> {
        for slot in found.first_slot..=found.slot {
            dir.buf[slot * ENTRY_SIZE] = DELETED;
        }
        self.store_slots(dir, found.first_slot, found.slot - found.first_slot + 1)
    }

    // =========================================================================
    // ARQUIVOS
    // =========================================================================

    /// Lê até `buf.len()` bytes do começo do arquivo.
    pub fn read(&self, path: &str, buf: &mut [u8]) -> FsResult<usize> {
        let (_, _, found) = self.lookup(path)?;
        let found = found.ok_or(FsError::NotFound)?;
        if found.entry.attr.is_directory() {
            return Err(FsError::IsDir);
        }

        let want = buf.len().min(found.entry.size as usize);
        if want == 0 || found.entry.first_cluster == 0 {
            return Ok(0);
        }

        let mut sector = [0u8; SECTOR_SIZE];
        let mut done = 0;
        for cluster in self.chain(found.entry.first_cluster)? {
            let lba = self.layout.cluster_lba(cluster);
            for s in 0..self.layout.sectors_per_cluster {
                if done >= want {
                    return Ok(done);
                }
                self.dev.read_block(lba + s, &mut sector)?;
                let n = (want - done).min(SECTOR_SIZE);
                buf[done..done + n].copy_from_slice(&sector[..n]);
                done += n;
            }
        }
        Ok(done)
    }

    pub fn read_file(&self, path: &str) -> FsResult<Vec<u8>> {
        let size = self.stat(path)?.size as usize;
        let mut data = vec![0u8; size];
        let n = self.read(path, &mut data)?;
        data.truncate(n);
        Ok(data)
    }

    /// Cria ou substitui o arquivo. Devolve os bytes gravados.
    pub fn write(&self, path: &str, data: &[u8]) -> FsResult<usize> {
        let (mut dir, name, existing) = self.lookup(path)?;
        dir::validate_name(name)?;
        if data.len() > u32::MAX as usize {
            return Err(FsError::TooLarge);
        }

        if let Some(old) = existing {
            if old.entry.attr.is_directory() {
                return Err(FsError::IsDir);
            }
            if old.entry.first_cluster >= 2 {
                self.free_chain(old.entry.first_cluster)?;
            }
            self.remove_entry(&mut dir, &old)?;
        }

        let chain = self.alloc_chain(data.len().div_ceil(self.layout.cluster_size))?;
        let first_cluster = chain.first().copied().unwrap_or(0);
        let entry = ShortEntry::new([b' '; 11], FileAttr::ARQUIVO, first_cluster, data.len() as u32);

        let result = self
            .write_data(&chain, data)
            .and_then(|_| self.add_entry(&mut dir, name, entry));
        if let Err(e) = result {
            if first_cluster != 0 {
                let _ = self.free_chain(first_cluster);
            }
            return Err(e);
        }
        crate::ktrace!("(FAT16) Arquivo gravado, bytes=", data.len());
        Ok(data.len())
    }

    /// Dados setor a setor; o último setor é completado com zeros.
    fn write_data(&self, chain: &[u16], data: &[u8]) -> FsResult<()> {
        let mut sector = [0u8; SECTOR_SIZE];
        let mut chunks = data.chunks(SECTOR_SIZE);
        for &cluster in chain {
            let lba = self.layout.cluster_lba(cluster);
            for s in 0..self.layout.sectors_per_cluster {
                let Some(chunk) = chunks.next() else {
                    return Ok(());
                };
                sector.fill(0);
                sector[..chunk.len()].copy_from_slice(chunk);
                self.dev.write_block(lba + s, &sector)?;
            }
        }
        Ok(())
    }

    /// Apaga arquivo ou diretório vazio.
    pub fn delete(&self, path: &str) -> FsResult<()> {
        let (mut dir, _, found) = self.lookup(path)?;
        let found = found.ok_or(FsError::NotFound)?;

        if found.entry.attr.is_directory() {
            let inner = self.load_dir(DirLoc::from_cluster(found.entry.first_cluster))?;
            if dir::scan(&inner.buf).iter().any(|f| !f.entry.is_dot()) {
                return Err(FsError::DirNotEmpty);
            }
        }
        if found.entry.first_cluster >= 2 {
            self.free_chain(found.entry.first_cluster)?;
        }
        self.remove_entry(&mut dir, &found)
    }

    /// Cria um subdiretório com `.` e `..`.
    pub fn mkdir(&self, path: &str) -> FsResult<()> {
        let (mut dir, name, existing) = self.lookup(path)?;
        dir::validate_name(name)?;
        if existing.is_some() {
            return Err(FsError::Exists);
        }

        let cluster = self.alloc_cluster()?;
        let result = self.zero_cluster(cluster).and_then(|_| {
            let mut sector = [0u8; SECTOR_SIZE];
            ShortEntry::new(*b".          ", FileAttr::DIRETORIO, cluster, 0).encode(&mut sector[..ENTRY_SIZE]);
            ShortEntry::new(*b"..         ", FileAttr::DIRETORIO, dir.loc.cluster(), 0)
                .encode(&mut sector[ENTRY_SIZE..2 * ENTRY_SIZE]);
            self.dev.write_block(self.layout.cluster_lba(cluster), &sector)?;
            let entry = ShortEntry::new([b' '; 11], FileAttr::DIRETORIO, cluster, 0);
            self.add_entry(&mut dir, name, entry)
        });
        if let Err(e) = result {
            let _ = self.free_chain(cluster);
            return Err(e);
        }
        Ok(())
    }

    /// Conteúdo de um diretório (sem `.`, `..` e rótulo).
    pub fn list(&self, path: &str) -> FsResult<Vec<DirEntry>> {
        let loc = self.dir_loc(path)?;
        let dir = self.load_dir(loc)?;
        Ok(dir::scan(&dir.buf)
            .into_iter()
            .filter(|f| !f.entry.is_dot() && !f.entry.attr.is_volume_id())
            .map(|f| DirEntry {
                kind: kind_of(&f.entry),
                size: f.entry.size as u64,
                name: f.name,
            })
            .collect())
    }

    pub fn stat(&self, path: &str) -> FsResult<FileStat> {
        if components(path).is_empty() {
            return Ok(FileStat::disk(NodeKind::Dir, 0));
        }
        let (_, _, found) = self.lookup(path)?;
        let found = found.ok_or(FsError::NotFound)?;
        Ok(FileStat::disk(kind_of(&found.entry), found.entry.size as u64))
    }

    fn dir_loc(&self, path: &str) -> FsResult<DirLoc> {
        if components(path).is_empty() {
            return Ok(DirLoc::Root);
        }
        let (_, _, found) = self.lookup(path)?;
        let found = found.ok_or(FsError::NotFound)?;
        if !found.entry.attr.is_directory() {
            return Err(FsError::NotDir);
        }
        Ok(DirLoc::from_cluster(found.entry.first_cluster))
    }
}

fn find(dir: &DirImage, name: &str) -> Option<Found> {
    dir::scan(&dir.buf)
        .into_iter()
        .find(|f| !f.entry.attr.is_volume_id() && f.matches(name))
}

fn kind_of(entry: &ShortEntry) -> NodeKind {
    if entry.attr.is_directory() {
        NodeKind::Dir
    } else {
        NodeKind::File
    }
}
