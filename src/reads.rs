//! Loading reads from FASTA, FASTQ, SAM/BAM and plain-text files.

use log::{debug, info, warn};
use noodles::{bam, bgzf, fasta, fastq, sam};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek};
use std::num::NonZeroUsize;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadRecord {
    pub name: String,
    pub sequence: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadFormat {
    Fasta,
    Fastq,
    Sam,
    /// Always BGZF-compressed
    Bam,
    /// One sequence per line, named by line number
    Text,
}

impl ReadFormat {
    /// Guess the format from the file name, looking through a `.gz`/`.bgz` suffix
    pub fn from_path(path: &str) -> io::Result<Self> {
        let stem = path
            .strip_suffix(".gz")
            .or_else(|| path.strip_suffix(".bgz"))
            .unwrap_or(path);
        let ext = Path::new(stem)
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        match ext.as_str() {
            "fa" | "fasta" | "fna" => Ok(ReadFormat::Fasta),
            "fq" | "fastq" => Ok(ReadFormat::Fastq),
            "sam" => Ok(ReadFormat::Sam),
            "bam" => Ok(ReadFormat::Bam),
            "txt" | "csv" | "tsv" | "list" => Ok(ReadFormat::Text),
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "Cannot determine the read format of '{}'. Allowed extensions: .fa/.fasta/.fna, .fq/.fastq, .sam, .bam, .txt/.csv/.tsv/.list (optionally .gz/.bgz)",
                    path
                ),
            )),
        }
    }
}

/// Low-quality base masking applied while reads are loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityMask {
    /// Bases scoring below this Phred value are replaced by `wildcard`. 0 disables masking.
    pub min_quality: u8,
    /// ASCII offset of FASTQ quality characters
    pub offset: u8,
    pub wildcard: u8,
}

impl Default for QualityMask {
    fn default() -> Self {
        Self {
            min_quality: 0,
            offset: 33,
            wildcard: b'N',
        }
    }
}

impl QualityMask {
    pub fn is_enabled(&self) -> bool {
        self.min_quality > 0
    }

    // `scores` are raw bytes; `offset` is subtracted before comparing. Returns the number
    // of bases masked.
    fn apply(&self, name: &str, sequence: &mut [u8], scores: &[u8], offset: u8) -> usize {
        if !self.is_enabled() || scores.is_empty() {
            return 0;
        }
        if scores.len() != sequence.len() {
            warn!(
                "Read {} has {} bases but {} quality scores; masking the shared prefix only",
                name,
                sequence.len(),
                scores.len()
            );
        }
        let mut masked = 0;
        for (base, &score) in sequence.iter_mut().zip(scores) {
            if i32::from(score) - i32::from(offset) < i32::from(self.min_quality) {
                *base = self.wildcard;
                masked += 1;
            }
        }
        masked
    }
}

const BGZF_HEADER_LEN: usize = 18;

/// True when the stream opens with a BGZF block header, i.e. gzip carrying the `BC` extra
/// subfield. Plain gzip and short or uncompressed streams give `false`. The stream is
/// rewound afterwards.
fn has_bgzf_header<R: Read + Seek>(reader: &mut R) -> io::Result<bool> {
    let mut header = [0u8; BGZF_HEADER_LEN];
    let found = match reader.read_exact(&mut header) {
        Ok(()) => matches!(
            header,
            [0x1f, 0x8b, 0x08, 0x04, _, _, _, _, _, _, 0x06, 0x00, b'B', b'C', 0x02, 0x00, _, _]
        ),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => false,
        Err(e) => return Err(e),
    };
    reader.rewind()?;
    Ok(found)
}

/// Read every record of `path`. Compressed inputs (and BAM) must be BGZF and are
/// decompressed with `threads` workers.
pub fn load_reads(
    path: &str,
    threads: NonZeroUsize,
    mask: &QualityMask,
) -> io::Result<Vec<ReadRecord>> {
    let format = ReadFormat::from_path(path)?;
    let mut file = File::open(path).map_err(|e| {
        io::Error::new(e.kind(), format!("Failed to open read file '{}': {}", path, e))
    })?;

    let compressed =
        format == ReadFormat::Bam || [".gz", ".bgz"].iter().any(|e| path.ends_with(e));
    let reader: Box<dyn BufRead> = if compressed {
        if !has_bgzf_header(&mut file)? {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "'{}' is not BGZF-compressed. Convert plain gzip with: zcat '{}' | bgzip > reads.gz",
                    path, path
                ),
            ));
        }
        debug!("Reading {} with {} BGZF workers", path, threads);
        Box::new(BufReader::new(
            bgzf::io::MultithreadedReader::with_worker_count(threads, file),
        ))
    } else {
        Box::new(BufReader::new(file))
    };

    let reads = parse_reads(reader, format, mask).map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Failed to parse reads from {}: {}", path, e),
        )
    })?;
    info!("Read {} records from {} ({:?})", reads.len(), path, format);
    Ok(reads)
}

/// Parse reads from an uncompressed stream. BAM is expected already BGZF-decoded.
pub fn parse_reads<R: BufRead>(
    reader: R,
    format: ReadFormat,
    mask: &QualityMask,
) -> io::Result<Vec<ReadRecord>> {
    let mut masked = 0;
    let reads = match format {
        ReadFormat::Fasta => parse_fasta(reader),
        ReadFormat::Fastq => parse_fastq(reader, mask, &mut masked),
        ReadFormat::Sam => parse_sam(reader, mask, &mut masked),
        ReadFormat::Bam => parse_bam(reader, mask, &mut masked),
        ReadFormat::Text => parse_text(reader),
    }?;
    if mask.is_enabled() {
        info!(
            "Masked {} bases with quality below {}",
            masked, mask.min_quality
        );
    }
    Ok(reads)
}

fn first_word(name: &[u8]) -> String {
    let end = name
        .iter()
        .position(|b| b.is_ascii_whitespace())
        .unwrap_or(name.len());
    String::from_utf8_lossy(&name[..end]).into_owned()
}

fn parse_fasta<R: BufRead>(reader: R) -> io::Result<Vec<ReadRecord>> {
    let mut reader = fasta::io::Reader::new(reader);
    let mut reads = Vec::new();
    for result in reader.records() {
        let record = result?;
        let name: &[u8] = record.name().as_ref();
        let sequence: &[u8] = record.sequence().as_ref();
        reads.push(ReadRecord {
            name: first_word(name),
            sequence: sequence.to_ascii_uppercase(),
        });
    }
    Ok(reads)
}

fn parse_fastq<R: BufRead>(
    reader: R,
    mask: &QualityMask,
    masked: &mut usize,
) -> io::Result<Vec<ReadRecord>> {
    let mut reader = fastq::io::Reader::new(reader);
    let mut reads = Vec::new();
    for result in reader.records() {
        let record = result?;
        let name: &[u8] = record.name().as_ref();
        let sequence: &[u8] = record.sequence().as_ref();
        let scores: &[u8] = record.quality_scores().as_ref();
        let mut read = ReadRecord {
            name: first_word(name),
            sequence: sequence.to_ascii_uppercase(),
        };
        *masked += mask.apply(&read.name, &mut read.sequence, scores, mask.offset);
        reads.push(read);
    }
    Ok(reads)
}

// Alignment records carry decoded Phred scores, so no offset applies. Unnamed records
// are named by their 1-based position.
fn alignment_read(
    index: usize,
    record: &sam::alignment::RecordBuf,
    mask: &QualityMask,
    masked: &mut usize,
) -> ReadRecord {
    let name = record
        .name()
        .map(|name| first_word(name.as_ref()))
        .unwrap_or_else(|| (index + 1).to_string());
    let sequence: &[u8] = record.sequence().as_ref();
    let scores: &[u8] = record.quality_scores().as_ref();
    let mut read = ReadRecord {
        name,
        sequence: sequence.to_ascii_uppercase(),
    };
    *masked += mask.apply(&read.name, &mut read.sequence, scores, 0);
    read
}

fn parse_sam<R: BufRead>(
    reader: R,
    mask: &QualityMask,
    masked: &mut usize,
) -> io::Result<Vec<ReadRecord>> {
    let mut reader = sam::io::Reader::new(reader);
    let header = reader.read_header()?;
    let mut reads = Vec::new();
    for (index, result) in reader.record_bufs(&header).enumerate() {
        let record = result?;
        reads.push(alignment_read(index, &record, mask, masked));
    }
    Ok(reads)
}

fn parse_bam<R: BufRead>(
    reader: R,
    mask: &QualityMask,
    masked: &mut usize,
) -> io::Result<Vec<ReadRecord>> {
    let mut reader = bam::io::Reader::from(reader);
    let header = reader.read_header()?;
    let mut reads = Vec::new();
    for (index, result) in reader.record_bufs(&header).enumerate() {
        let record = result?;
        reads.push(alignment_read(index, &record, mask, masked));
    }
    Ok(reads)
}

// Every line is a read, blank lines included, except an optional `seq` column header
fn parse_text<R: BufRead>(reader: R) -> io::Result<Vec<ReadRecord>> {
    let mut reads = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim_end();
        if idx == 0 && trimmed == "seq" {
            continue;
        }
        reads.push(ReadRecord {
            name: (idx + 1).to_string(),
            sequence: trimmed.as_bytes().to_ascii_uppercase(),
        });
    }
    Ok(reads)
}
