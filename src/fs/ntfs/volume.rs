//! # Volume NTFS
//!
//! Bitmaps de clusters ($Bitmap, registro 6) e de registros MFT (atributo
//! $BITMAP do próprio $MFT) ficam em memória e voltam ao disco a cada
//! mutação. O $LogFile nunca é tocado.

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;

use spin::Mutex;

use crate::drivers::block::{BlockDevice, SECTOR_SIZE};
use crate::fs::error::{FsError, FsResult};
use crate::fs::types::{DirEntry, FileStat, NodeKind, VolumeInfo};
use crate::klib::bytes::{read_u16, write_u16};
use crate::klib::Bitmap;

use super::boot::BootSector;
use super::index::{self, IndexEntry, INDX_NODE};
use super::record::{self as rec, FileName, RecordBuilder};
use super::runs::{self, Run};

pub const MFT_RECORD: u64 = 0;
pub const VOLUME_RECORD: u64 = 3;
pub const ROOT_RECORD: u64 = 5;
pub const BITMAP_RECORD: u64 = 6;

/// Registros abaixo disso são metadados do sistema.
pub const FIRST_USER_RECORD: usize = 24;
const SYSTEM_RECORDS: u64 = 16;

struct Bitmaps {
    clusters: Bitmap,
    mft: Bitmap,
}

pub struct Ntfs {
    dev: Arc<dyn BlockDevice>,
    boot: BootSector,
    mft_runs: Vec<Run>,
    mft_records: usize,
    bitmaps: Mutex<Bitmaps>,
}

fn components(path: &str) -> Vec<&str> {
    path.split('/').filter(|c| !c.is_empty() && *c != ".").collect()
}

fn validate_name(name: &str) -> FsResult<()> {
    let units = name.encode_utf16().count();
    if units == 0 || units > 255 || name == ".." || name.contains('\0') {
        return Err(FsError::InvalidName);
    }
    Ok(())
}

impl Ntfs {
    pub fn mount(dev: Arc<dyn BlockDevice>) -> FsResult<Self> {
        let mut sector = [0u8; SECTOR_SIZE];
        dev.read_block(0, &mut sector)?;
        let boot = BootSector::parse(&sector)?;
        if boot.total_sectors > dev.total_blocks() {
            return Err(FsError::Corrupt);
        }

        // Registro 0 é lido direto do LCN do $MFT para descobrir os runs.
        let rs = boot.record_size();
        let mut mft0 = vec![0u8; rs];
        let first_lba = boot.mft_lcn * boot.sectors_per_cluster as u64;
        for (i, chunk) in mft0.chunks_exact_mut(SECTOR_SIZE).enumerate() {
            dev.read_block(first_lba + i as u64, chunk)?;
        }
        check_magic(&mft0, rec::FILE_MAGIC)?;
        rec::apply_fixup(&mut mft0)?;
        let data = rec::find_unnamed(&mft0, rec::ATTR_DATA).ok_or(FsError::Corrupt)?;
        let mft_runs = data.runs()?;
        let mft_records = (data.real_size() / rs as u64) as usize;

        let mut volume = Self {
            dev,
            boot,
            mft_runs,
            mft_records,
            bitmaps: Mutex::new(Bitmaps {
                clusters: Bitmap::new(0),
                mft: Bitmap::new(0),
            }),
        };

        let mft_bitmap = {
            let attr = rec::find_unnamed(&mft0, rec::ATTR_BITMAP).ok_or(FsError::Corrupt)?;
            let bytes = volume.read_attr(&attr, usize::MAX)?;
            Bitmap::from_bytes(&bytes, mft_records)
        };
        let cluster_bitmap = {
            let record = volume.read_record(BITMAP_RECORD)?;
            let attr = rec::find_unnamed(&record, rec::ATTR_DATA).ok_or(FsError::Corrupt)?;
            let bytes = volume.read_attr(&attr, usize::MAX)?;
            Bitmap::from_bytes(&bytes, boot.total_clusters() as usize)
        };
        volume.bitmaps = Mutex::new(Bitmaps {
            clusters: cluster_bitmap,
            mft: mft_bitmap,
        });

        crate::kdebug!("(NTFS) Volume montado, registros MFT=", mft_records);
        Ok(volume)
    }

    pub fn record_size(&self) -> usize {
        self.boot.record_size()
    }

    pub fn cluster_size(&self) -> usize {
        self.boot.cluster_size()
    }

    fn spc(&self) -> u64 {
        self.boot.sectors_per_cluster as u64
    }

    pub fn info(&self) -> VolumeInfo {
        VolumeInfo {
            fs_type: "NTFS",
            label: self.volume_label(),
            total_sectors: self.boot.total_sectors,
            cluster_size: self.cluster_size() as u32,
        }
    }

    /// $VOLUME_NAME do registro 3.
    pub fn volume_label(&self) -> String {
        self.read_record(VOLUME_RECORD)
            .ok()
            .and_then(|r| {
                let value = rec::find_unnamed(&r, rec::ATTR_VOLUME_NAME)?.resident_value().ok()?;
                Some(rec::utf16_at(value, 0, value.len() / 2))
            })
            .unwrap_or_default()
    }

    pub fn free_clusters(&self) -> usize {
        let bm = self.bitmaps.lock();
        bm.clusters.len() - bm.clusters.count_ones()
    }

    // =========================================================================
    // REGISTROS MFT
    // =========================================================================

    /// LBA do setor que contém `byte_offset` no stream descrito por `runs`.
    fn stream_lba(&self, runs: &[Run], byte_offset: u64) -> FsResult<u64> {
        let cs = self.cluster_size() as u64;
        let lcn = runs::lcn_of(runs, byte_offset / cs)
            .flatten()
            .ok_or(FsError::Corrupt)?;
        Ok(lcn * self.spc() + (byte_offset % cs) / SECTOR_SIZE as u64)
    }

    /// Lê o registro `n` e valida o fixup de cada setor.
    pub fn read_record(&self, n: u64) -> FsResult<Vec<u8>> {
        if n as usize >= self.mft_records {
            return Err(FsError::NotFound);
        }
        let rs = self.record_size();
        let mut buf = vec![0u8; rs];
        for (i, chunk) in buf.chunks_exact_mut(SECTOR_SIZE).enumerate() {
            let lba = self.stream_lba(&self.mft_runs, n * rs as u64 + (i * SECTOR_SIZE) as u64)?;
            self.dev.read_block(lba, chunk)?;
        }
        check_magic(&buf, rec::FILE_MAGIC)?;
        rec::apply_fixup(&mut buf)?;
        Ok(buf)
    }

    /// Aplica o fixup numa cópia e grava o registro `n`.
    pub fn write_record(&self, n: u64, record: &[u8]) -> FsResult<()> {
        let rs = self.record_size();
        let mut buf = record[..rs].to_vec();
        rec::prepare_fixup(&mut buf)?;
        for (i, chunk) in buf.chunks_exact(SECTOR_SIZE).enumerate() {
            let lba = self.stream_lba(&self.mft_runs, n * rs as u64 + (i * SECTOR_SIZE) as u64)?;
            self.dev.write_block(lba, chunk)?;
        }
        Ok(())
    }

    /// Conteúdo de um atributo, até `max` bytes.
    fn read_attr(&self, attr: &rec::Attribute<'_>, max: usize) -> FsResult<Vec<u8>> {
        if !attr.is_non_resident() {
            let value = attr.resident_value()?;
            return Ok(value[..value.len().min(max)].to_vec());
        }
        let runs = attr.runs()?;
        let want = (attr.real_size() as usize).min(max);
        let mut out = vec![0u8; want];
        self.read_runs(&runs, &mut out)?;
        Ok(out)
    }

    /// Preenche `out` a partir do início do stream. Runs esparsos viram zeros.
    fn read_runs(&self, runs: &[Run], out: &mut [u8]) -> FsResult<()> {
        let mut sector = [0u8; SECTOR_SIZE];
        for (i, chunk) in out.chunks_mut(SECTOR_SIZE).enumerate() {
            let offset = (i * SECTOR_SIZE) as u64;
            let cs = self.cluster_size() as u64;
            match runs::lcn_of(runs, offset / cs).ok_or(FsError::Corrupt)? {
                Some(lcn) => {
                    let lba = lcn * self.spc() + (offset % cs) / SECTOR_SIZE as u64;
                    self.dev.read_block(lba, &mut sector)?;
                    chunk.copy_from_slice(&sector[..chunk.len()]);
                }
                None => chunk.fill(0),
            }
        }
        Ok(())
    }

    /// Grava `data` no começo do stream; o último setor é completado com zeros.
    fn write_runs(&self, runs: &[Run], data: &[u8]) -> FsResult<()> {
        let mut sector = [0u8; SECTOR_SIZE];
        for (i, chunk) in data.chunks(SECTOR_SIZE).enumerate() {
            let lba = self.stream_lba(runs, (i * SECTOR_SIZE) as u64)?;
            sector.fill(0);
            sector[..chunk.len()].copy_from_slice(chunk);
            self.dev.write_block(lba, &sector)?;
        }
        Ok(())
    }

    // =========================================================================
    // BITMAPS
    // =========================================================================

    fn persist_cluster_bitmap(&self, bm: &Bitmaps) -> FsResult<()> {
        let record = self.read_record(BITMAP_RECORD)?;
        let attr = rec::find_unnamed(&record, rec::ATTR_DATA).ok_or(FsError::Corrupt)?;
        let bytes = bm.clusters.to_bytes(attr.real_size() as usize);
        self.write_runs(&attr.runs()?, &bytes)
    }

    fn persist_mft_bitmap(&self, bm: &Bitmaps) -> FsResult<()> {
        let mut record = self.read_record(MFT_RECORD)?;
        let attr = rec::find_unnamed(&record, rec::ATTR_BITMAP).ok_or(FsError::Corrupt)?;
        let len = attr.real_size() as usize;
        let bytes = bm.mft.to_bytes(len);
        if attr.is_non_resident() {
            let runs = attr.runs()?;
            return self.write_runs(&runs, &bytes);
        }
        let at = attr.value_offset();
        record[at..at + len].copy_from_slice(&bytes);
        self.write_record(MFT_RECORD, &record)
    }

    fn persist(&self, bm: &Bitmaps) -> FsResult<()> {
        self.persist_cluster_bitmap(bm)?;
        self.persist_mft_bitmap(bm)
    }

    // =========================================================================
    // DIRETÓRIOS
    // =========================================================================

    /// Entradas do índice $I30 (raiz + blocos INDX em uso).
    fn dir_entries(&self, record: &[u8]) -> FsResult<Vec<IndexEntry>> {
        let root = rec::find_any(record, rec::ATTR_INDEX_ROOT).ok_or(FsError::NotDir)?;
        let value = root.resident_value()?;
        let mut entries = index::parse_node(value, index::ROOT_NODE)?;

        if let Some(alloc) = rec::find_any(record, rec::ATTR_INDEX_ALLOCATION) {
            let data = self.read_attr(&alloc, usize::MAX)?;
            let in_use = match rec::find_any(record, rec::ATTR_BITMAP) {
                Some(bm) => Some(self.read_attr(&bm, usize::MAX)?),
                None => None,
            };
            let size = self.boot.index_record_size();
            for (i, block) in data.chunks_exact(size).enumerate() {
                if let Some(bits) = &in_use {
                    if !matches!(bits.get(i / 8), Some(b) if b & (1 << (i % 8)) != 0) {
                        continue;
                    }
                }
                if &block[..4] != rec::INDX_MAGIC {
                    continue;
                }
                let mut block = block.to_vec();
                rec::apply_fixup(&mut block)?;
                entries.extend(index::parse_node(&block, INDX_NODE)?);
            }
        }
        Ok(entries)
    }

    fn find_in_dir(&self, dir: &[u8], name: &str) -> FsResult<Option<IndexEntry>> {
        Ok(self
            .dir_entries(dir)?
            .into_iter()
            .filter(|e| e.name.namespace != rec::NAMESPACE_DOS)
            .find(|e| e.name.name.eq_ignore_ascii_case(name) || e.name.name.to_uppercase() == name.to_uppercase()))
    }

    fn resolve_dir(&self, comps: &[&str]) -> FsResult<(u64, Vec<u8>)> {
        let mut n = ROOT_RECORD;
        let mut record = self.read_record(n)?;
        for comp in comps {
            if !rec::is_dir(&record) {
                return Err(FsError::NotDir);
            }
            let entry = self.find_in_dir(&record, comp)?.ok_or(FsError::NotFound)?;
            n = rec::ref_record(entry.file_ref);
            record = self.read_record(n)?;
        }
        if !rec::is_dir(&record) {
            return Err(FsError::NotDir);
        }
        Ok((n, record))
    }

    /// (registro do pai, registro do pai, nome, entrada existente)
    fn lookup<'p>(&self, path: &'p str) -> FsResult<(u64, Vec<u8>, &'p str, Option<IndexEntry>)> {
        let comps = components(path);
        let (name, parents) = comps.split_last().ok_or(FsError::IsDir)?;
        let (parent, record) = self.resolve_dir(parents)?;
        let found = self.find_in_dir(&record, name)?;
        Ok((parent, record, *name, found))
    }

    fn insert_entry(&self, parent: u64, entry: &[u8], name: &str) -> FsResult<()> {
        let mut record = self.read_record(parent)?;
        let root = rec::find_any(&record, rec::ATTR_INDEX_ROOT).ok_or(FsError::NotDir)?;
        let value = index::root_insert(root.resident_value()?, entry, name)?;
        let at = root.offset;
        rec::set_resident_value(&mut record, at, &value)?;
        self.write_record(parent, &record)
    }

    fn remove_entry(&self, parent: u64, child: u64) -> FsResult<()> {
        let mut record = self.read_record(parent)?;
        let root = rec::find_any(&record, rec::ATTR_INDEX_ROOT).ok_or(FsError::NotDir)?;
        let value = index::root_remove(root.resident_value()?, child)?.ok_or(FsError::Unsupported)?;
        let at = root.offset;
        rec::set_resident_value(&mut record, at, &value)?;
        self.write_record(parent, &record)
    }

    /// Sequência para um registro reaproveitado.
    fn next_sequence(&self, n: u64) -> u16 {
        match self.read_record(n) {
            Ok(old) => match rec::sequence(&old).wrapping_add(1) {
                0 => 1,
                s => s,
            },
            Err(_) => 1,
        }
    }

    // =========================================================================
    // ARQUIVOS
    // =========================================================================

    fn data_attr<'r>(record: &'r [u8]) -> FsResult<rec::Attribute<'r>> {
        if rec::is_dir(record) {
            return Err(FsError::IsDir);
        }
        rec::find_unnamed(record, rec::ATTR_DATA).ok_or(FsError::Corrupt)
    }

    pub fn read(&self, path: &str, buf: &mut [u8]) -> FsResult<usize> {
        let (_, _, _, found) = self.lookup(path)?;
        let entry = found.ok_or(FsError::NotFound)?;
        let record = self.read_record(rec::ref_record(entry.file_ref))?;
        let attr = Self::data_attr(&record)?;
        let data = self.read_attr(&attr, buf.len())?;
        buf[..data.len()].copy_from_slice(&data);
        Ok(data.len())
    }

    pub fn read_file(&self, path: &str) -> FsResult<Vec<u8>> {
        let (_, _, _, found) = self.lookup(path)?;
        let entry = found.ok_or(FsError::NotFound)?;
        let record = self.read_record(rec::ref_record(entry.file_ref))?;
        let attr = Self::data_attr(&record)?;
        self.read_attr(&attr, usize::MAX)
    }

    /// Espaço livre num registro novo com SI + FN para `name`.
    fn resident_limit(&self, name: &str) -> usize {
        let usa = (self.record_size() / SECTOR_SIZE + 1) * 2;
        let header = (0x30 + usa + 7) & !7;
        let si = 0x18 + 48;
        let fname = (0x18 + 66 + name.encode_utf16().count() * 2 + 7) & !7;
        let data_header = 0x18;
        let end = 8;
        self.record_size().saturating_sub(header + si + fname + data_header + end) & !7
    }

    /// Cria ou substitui um arquivo.
    pub fn write(&self, path: &str, data: &[u8]) -> FsResult<usize> {
        let (parent, parent_record, name, existing) = self.lookup(path)?;
        validate_name(name)?;
        if let Some(old) = existing {
            let old_record = self.read_record(rec::ref_record(old.file_ref))?;
            if rec::is_dir(&old_record) {
                return Err(FsError::IsDir);
            }
            self.remove(parent, rec::ref_record(old.file_ref), old_record)?;
        }
        let parent_seq = rec::sequence(&parent_record);

        let mut bm = self.bitmaps.lock();
        let n = bm
            .mft
            .find_first_zero_from(FIRST_USER_RECORD)
            .ok_or(FsError::NoSpace)?;

        let cs = self.cluster_size();
        let run = if data.len() > self.resident_limit(name) {
            let count = data.len().div_ceil(cs);
            let lcn = bm.clusters.find_zero_run(count).ok_or(FsError::NoSpace)?;
            bm.clusters.set_range(lcn, count);
            Some(Run::new(lcn as u64, count as u64))
        } else {
            None
        };
        bm.mft.set(n);

        let result = self.write_new_file(n as u64, parent, parent_seq, name, data, run);
        if let Err(e) = result {
            if let Some(r) = run {
                bm.clusters.clear_range(r.lcn.unwrap_or(0) as usize, r.length as usize);
            }
            bm.mft.clear(n);
            return Err(e);
        }
        self.persist(&bm)?;
        crate::ktrace!("(NTFS) Arquivo gravado no registro ", n);
        Ok(data.len())
    }

    fn write_new_file(&self, n: u64, parent: u64, parent_seq: u16, name: &str, data: &[u8], run: Option<Run>) -> FsResult<()> {
        let cs = self.cluster_size();
        let now = crate::drivers::timer::ticks();
        let seq = self.next_sequence(n);

        if let Some(r) = run {
            self.write_runs(&[r], data)?;
        }

        let fname = FileName {
            parent: rec::file_ref(parent, parent_seq),
            allocated_size: run.map_or(data.len() as u64, |r| r.length * cs as u64),
            real_size: data.len() as u64,
            flags: rec::FILE_ATTR_ARCHIVE,
            namespace: rec::NAMESPACE_WIN32,
            name: String::from(name),
        };
        let key = fname.encode(now);

        let mut builder = RecordBuilder::new(self.record_size(), n as u32, rec::RECORD_IN_USE, seq);
        builder
            .resident(rec::ATTR_STANDARD_INFORMATION, "", &rec::standard_information(now, rec::FILE_ATTR_ARCHIVE))?
            .resident(rec::ATTR_FILE_NAME, "", &key)?;
        match run {
            Some(r) => builder.non_resident(rec::ATTR_DATA, &[r], data.len() as u64, cs)?,
            None => builder.resident(rec::ATTR_DATA, "", data)?,
        };
        self.write_record(n, &builder.finish())?;

        if let Err(e) = self.insert_entry(parent, &index::build_entry(rec::file_ref(n, seq), &key), name) {
            let _ = self.mark_unused(n);
            return Err(e);
        }
        Ok(())
    }

    fn mark_unused(&self, n: u64) -> FsResult<()> {
        let mut record = self.read_record(n)?;
        let flags = read_u16(&record, rec::REC_FLAGS);
        write_u16(&mut record, rec::REC_FLAGS, flags & !rec::RECORD_IN_USE);
        self.write_record(n, &record)
    }

    /// Libera clusters e registro e tira a entrada do pai.
    fn remove(&self, parent: u64, n: u64, record: Vec<u8>) -> FsResult<()> {
        let mut freed = Vec::new();
        if let Some(attr) = rec::find_unnamed(&record, rec::ATTR_DATA) {
            if attr.is_non_resident() {
                freed = attr.runs()?;
            }
        }

        self.remove_entry(parent, n)?;
        self.mark_unused(n)?;

        let mut bm = self.bitmaps.lock();
        for run in &freed {
            if let Some(lcn) = run.lcn {
                bm.clusters.clear_range(lcn as usize, run.length as usize);
            }
        }
        bm.mft.clear(n as usize);
        self.persist(&bm)
    }

    pub fn delete(&self, path: &str) -> FsResult<()> {
        let (parent, _, _, found) = self.lookup(path)?;
        let entry = found.ok_or(FsError::NotFound)?;
        let n = rec::ref_record(entry.file_ref);
        if n < SYSTEM_RECORDS {
            return Err(FsError::Unsupported);
        }
        let record = self.read_record(n)?;
        if rec::is_dir(&record) && !self.dir_entries(&record)?.is_empty() {
            return Err(FsError::DirNotEmpty);
        }
        self.remove(parent, n, record)
    }

    pub fn mkdir(&self, path: &str) -> FsResult<()> {
        let (parent, parent_record, name, existing) = self.lookup(path)?;
        validate_name(name)?;
        if existing.is_some() {
            return Err(FsError::Exists);
        }
        let parent_seq = rec::sequence(&parent_record);

        let mut bm = self.bitmaps.lock();
        let n = bm.mft.find_first_zero_from(FIRST_USER_RECORD).ok_or(FsError::NoSpace)?;
        bm.mft.set(n);

        let result = (|| -> FsResult<()> {
            let now = crate::drivers::timer::ticks();
            let seq = self.next_sequence(n as u64);
            let fname = FileName {
                parent: rec::file_ref(parent, parent_seq),
                allocated_size: 0,
                real_size: 0,
                flags: rec::FILE_ATTR_DIRECTORY,
                namespace: rec::NAMESPACE_WIN32,
                name: String::from(name),
            };
            let key = fname.encode(now);
            let ixs = self.boot.index_record_size();
            let per_index = (ixs / self.cluster_size()).max(1) as u8;

            let mut builder = RecordBuilder::new(
                self.record_size(),
                n as u32,
                rec::RECORD_IN_USE | rec::RECORD_IS_DIR,
                seq,
            );
            builder
                .resident(rec::ATTR_STANDARD_INFORMATION, "", &rec::standard_information(now, rec::FILE_ATTR_DIRECTORY))?
                .resident(rec::ATTR_FILE_NAME, "", &key)?
                .resident(rec::ATTR_INDEX_ROOT, rec::I30, &index::empty_root(ixs as u32, per_index))?;
            self.write_record(n as u64, &builder.finish())?;
            if let Err(e) = self.insert_entry(parent, &index::build_entry(rec::file_ref(n as u64, seq), &key), name) {
                let _ = self.mark_unused(n as u64);
                return Err(e);
            }
            Ok(())
        })();

        if let Err(e) = result {
            bm.mft.clear(n);
            return Err(e);
        }
        self.persist(&bm)
    }

    pub fn list(&self, path: &str) -> FsResult<Vec<DirEntry>> {
        let (n, record) = self.resolve_dir(&components(path))?;
        Ok(self
            .dir_entries(&record)?
            .into_iter()
            .filter(|e| e.name.namespace != rec::NAMESPACE_DOS)
            .filter(|e| {
                let child = rec::ref_record(e.file_ref);
                child != n && child >= SYSTEM_RECORDS
            })
            .map(|e| DirEntry {
                kind: if e.name.is_dir() { NodeKind::Dir } else { NodeKind::File },
                size: e.name.real_size,
                name: e.name.name,
            })
            .collect())
    }

    pub fn stat(&self, path: &str) -> FsResult<FileStat> {
        if components(path).is_empty() {
            return Ok(FileStat::disk(NodeKind::Dir, 0));
        }
        let (_, _, _, found) = self.lookup(path)?;
        let entry = found.ok_or(FsError::NotFound)?;
        let record = self.read_record(rec::ref_record(entry.file_ref))?;
        if rec::is_dir(&record) {
            return Ok(FileStat::disk(NodeKind::Dir, 0));
        }
        let size = rec::find_unnamed(&record, rec::ATTR_DATA).map_or(0, |a| a.real_size());
        Ok(FileStat::disk(NodeKind::File, size))
    }
}

fn check_magic(buf: &[u8], magic: &[u8; 4]) -> FsResult<()> {
    if buf.get(..4) != Some(&magic[..]) {
        return Err(FsError::Corrupt);
    }
    Ok(())
}
