use crate::core::models::pair::PairRecord;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

const PAIR_LOG_COMMENT: &str =
    " # pair_index  COM-COM_dist  MONOMERi_resID  MONOMERj_resID  timestamp_in_ps";

/// Formats one pair-log line (without the trailing newline).
pub fn format_pair_line(record: &PairRecord) -> String {
    format!(
        "{:10} {:12.8} {:10} {:10} {:15.3} {}",
        record.pair_index,
        record.com_distance,
        record.i_residue_id,
        record.j_residue_id,
        record.time,
        PAIR_LOG_COMMENT
    )
}

/// Append-only writer for the fixed-width pair log.
pub struct PairLogWriter<W: Write> {
    writer: W,
    lines: usize,
}

impl PairLogWriter<BufWriter<File>> {
    /// Creates (or truncates) the log file, creating missing parent directories.
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write> PairLogWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, lines: 0 }
    }

    pub fn write_record(&mut self, record: &PairRecord) -> io::Result<()> {
        writeln!(self.writer, "{}", format_pair_line(record))?;
        self.lines += 1;
        Ok(())
    }

    pub fn lines_written(&self) -> usize {
        self.lines
    }

    pub fn finish(mut self) -> io::Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// Writes `pair_index,predicted_overlap` rows, without a header, in the given order.
///
/// The index is zero-padded to six digits.
pub fn write_overlaps<W: Write>(writer: W, rows: &[(usize, f64)]) -> Result<(), csv::Error> {
    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    for (pair_index, overlap) in rows {
        csv_writer.write_record([format!("{:06}", pair_index), overlap.to_string()])?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn write_overlaps_to_path<P: AsRef<Path>>(
    path: P,
    rows: &[(usize, f64)],
) -> Result<(), csv::Error> {
    if let Some(parent) = path.as_ref().parent() {
        fs::create_dir_all(parent)?;
    }
    write_overlaps(File::create(path)?, rows)
}

/// File name of a stored feature array: `{prefix}{index:06}{resolution}[_CM][_1D].npy`.
pub fn feature_file_name(
    prefix: &str,
    index: usize,
    resolution: &str,
    coulomb: bool,
    flattened: bool,
) -> String {
    format!(
        "{}{:06}{}{}{}.npy",
        prefix,
        index,
        resolution,
        if coulomb { "_CM" } else { "" },
        if flattened { "_1D" } else { "" }
    )
}

/// Identifies one prediction run in output file names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLabel {
    pub temperature: String,
    pub label: String,
    pub snapshot: String,
}

impl RunLabel {
    fn cutoff_tag(cutoff: f64) -> String {
        format!("{:02}", cutoff.trunc() as i64)
    }

    /// `{root}/pair_DATs/pairs_info_cutoff{CC}A_{T}K_{LABEL}_{SNAP}.dat`
    pub fn pair_log_path(&self, root: &Path, cutoff: f64) -> PathBuf {
        root.join("pair_DATs").join(format!(
            "pairs_info_cutoff{}A_{}K_{}_{}.dat",
            Self::cutoff_tag(cutoff),
            self.temperature,
            self.label,
            self.snapshot
        ))
    }

    /// `{root}/pair-predictions-{T}K-{LABEL}-{SNAP}/overlaps_predicted_cutoff{CC}A.csv`
    pub fn overlaps_path(&self, root: &Path, cutoff: f64) -> PathBuf {
        root.join(format!(
            "pair-predictions-{}K-{}-{}",
            self.temperature, self.label, self.snapshot
        ))
        .join(format!(
            "overlaps_predicted_cutoff{}A.csv",
            Self::cutoff_tag(cutoff)
        ))
    }
}
