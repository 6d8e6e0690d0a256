use crate::collapse::Collapsed;
use crate::reads::ReadRecord;
use rustc_hash::FxHashMap;
use std::io::{self, Write};
use std::str::FromStr;

const FILTERED_LABEL: &str = "(filtered out, probably too many Ns)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    ReadId,
    Sequence,
    Fasta,
    /// One line per input read: read, then its canonical read
    Dup2Uniq,
    /// One line per canonical read with all of its members
    Uniq2Dup,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "readID" | "readid" => Ok(OutputFormat::ReadId),
            "sequence" => Ok(OutputFormat::Sequence),
            "fasta" => Ok(OutputFormat::Fasta),
            "dup2uniq" => Ok(OutputFormat::Dup2Uniq),
            "uniq2dup" => Ok(OutputFormat::Uniq2Dup),
            _ => Err(format!(
                "Unknown output format '{}'. Expected one of: readID, sequence, fasta, dup2uniq, uniq2dup",
                s
            )),
        }
    }
}

impl OutputFormat {
    /// Whether this format needs the per-read mapping rather than the unique list
    pub fn requires_mapping(&self) -> bool {
        matches!(self, OutputFormat::Dup2Uniq | OutputFormat::Uniq2Dup)
    }
}

/// Write `collapsed` in `format`, returning the number of canonical reads
pub fn write_output<W: Write>(
    out: &mut W,
    reads: &[ReadRecord],
    collapsed: &Collapsed,
    format: OutputFormat,
) -> io::Result<usize> {
    match format {
        OutputFormat::ReadId | OutputFormat::Sequence | OutputFormat::Fasta => {
            let unique: Vec<usize> = match collapsed {
                Collapsed::UniqueIndices(indices) => indices.clone(),
                Collapsed::Mapping(mapping) => mapping
                    .iter()
                    .enumerate()
                    .filter(|(i, m)| **m == Some(*i))
                    .map(|(i, _)| i)
                    .collect(),
            };
            for &idx in &unique {
                let read = &reads[idx];
                match format {
                    OutputFormat::ReadId => writeln!(out, "{}", read.name)?,
                    OutputFormat::Sequence => {
                        out.write_all(&read.sequence)?;
                        out.write_all(b"\n")?;
                    }
                    _ => {
                        writeln!(out, ">{}", read.name)?;
                        out.write_all(&read.sequence)?;
                        out.write_all(b"\n")?;
                    }
                }
            }
            Ok(unique.len())
        }
        OutputFormat::Dup2Uniq | OutputFormat::Uniq2Dup => {
            let mapping = collapsed.as_mapping().ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "dup2uniq and uniq2dup output require the full read mapping",
                )
            })?;
            if format == OutputFormat::Dup2Uniq {
                write_dup2uniq(out, reads, mapping)
            } else {
                write_uniq2dup(out, reads, mapping)
            }
        }
    }
}

fn write_dup2uniq<W: Write>(
    out: &mut W,
    reads: &[ReadRecord],
    mapping: &[Option<usize>],
) -> io::Result<usize> {
    let mut canonical = 0;
    for (read, target) in reads.iter().zip(mapping) {
        let sequence = String::from_utf8_lossy(&read.sequence);
        match target {
            Some(j) => {
                let uniq = &reads[*j];
                writeln!(
                    out,
                    "{}\t{}\t{}\t{}",
                    read.name,
                    sequence,
                    uniq.name,
                    String::from_utf8_lossy(&uniq.sequence)
                )?;
            }
            None => writeln!(
                out,
                "{}\t{}\t{}\t{}",
                read.name, sequence, FILTERED_LABEL, FILTERED_LABEL
            )?,
        }
    }
    for (i, target) in mapping.iter().enumerate() {
        if *target == Some(i) {
            canonical += 1;
        }
    }
    Ok(canonical)
}

fn write_uniq2dup<W: Write>(
    out: &mut W,
    reads: &[ReadRecord],
    mapping: &[Option<usize>],
) -> io::Result<usize> {
    let mut order: Vec<usize> = Vec::new();
    let mut members: FxHashMap<usize, Vec<usize>> = FxHashMap::default();
    for (idx, target) in mapping.iter().enumerate() {
        if let Some(j) = *target {
            members
                .entry(j)
                .or_insert_with(|| {
                    order.push(j);
                    Vec::new()
                })
                .push(idx);
        }
    }

    for uniq_idx in &order {
        let uniq = &reads[*uniq_idx];
        let group = &members[uniq_idx];
        let names: Vec<&str> = group.iter().map(|&i| reads[i].name.as_str()).collect();
        let sequences: Vec<String> = group
            .iter()
            .map(|&i| String::from_utf8_lossy(&reads[i].sequence).into_owned())
            .collect();
        writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}",
            uniq.name,
            String::from_utf8_lossy(&uniq.sequence),
            group.len(),
            names.join(","),
            sequences.join(",")
        )?;
    }
    Ok(order.len())
}
