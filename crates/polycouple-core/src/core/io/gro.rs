use super::traits::{StructureFile, TrajectorySource};
use crate::core::models::frame::{Frame, PeriodicBox};
use crate::core::models::structure::Structure;
use crate::core::models::topology::{Topology, TopologyBuilder};
use nalgebra::{Point3, Vector3};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use thiserror::Error;

/// GRO coordinates and box edges are stored in nm.
const NM_TO_ANGSTROM: f64 = 10.0;
const DEFAULT_FIELD_WIDTH: usize = 8;
const COORDINATE_START: usize = 20;

#[derive(Debug, Error)]
pub enum GroError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse { line: usize, kind: GroParseErrorKind },
    #[error("Inconsistent data: {0}")]
    Inconsistency(String),
    #[error("Missing required record: {0}")]
    MissingRecord(String),
}

#[derive(Debug, Error)]
pub enum GroParseErrorKind {
    #[error("Invalid atom count '{0}'")]
    InvalidAtomCount(String),
    #[error("Invalid integer format in columns {columns} (value: '{value}')")]
    InvalidInt { columns: String, value: String },
    #[error("Invalid float format in columns {columns} (value: '{value}')")]
    InvalidFloat { columns: String, value: String },
    #[error("Line is too short for an atom record")]
    LineTooShort,
    #[error("Box line must hold 3 or 9 values, found {0}")]
    InvalidBox(usize),
}

struct RawAtom {
    residue_id: isize,
    residue_name: String,
    atom_name: String,
}

struct RawFrame {
    time: Option<f64>,
    atoms: Vec<RawAtom>,
    positions: Vec<Point3<f64>>,
    periodic_box: Option<PeriodicBox>,
}

fn slice_and_trim(line: &str, start: usize, end: usize) -> &str {
    line.get(start..end).unwrap_or("").trim()
}

/// Width of one coordinate field, inferred from the spacing of decimal points.
fn coordinate_field_width(line: &str) -> usize {
    let Some(rest) = line.get(COORDINATE_START..) else {
        return DEFAULT_FIELD_WIDTH;
    };
    let Some(first) = rest.find('.') else {
        return DEFAULT_FIELD_WIDTH;
    };
    match rest[first + 1..].find('.') {
        Some(offset) => offset + 1,
        None => DEFAULT_FIELD_WIDTH,
    }
}

/// Extracts the simulation time from a title such as `"Generated by gmx t= 100.000 step= 50"`.
fn parse_title_time(title: &str) -> Option<f64> {
    let (_, after) = title.split_once("t=")?;
    after.split_whitespace().next()?.parse().ok()
}

fn parse_box(line: &str, line_num: usize) -> Result<Option<PeriodicBox>, GroError> {
    let values = line
        .split_whitespace()
        .map(|v| {
            v.parse::<f64>().map_err(|_| GroError::Parse {
                line: line_num,
                kind: GroParseErrorKind::InvalidFloat {
                    columns: "box".to_string(),
                    value: v.to_string(),
                },
            })
        })
        .collect::<Result<Vec<f64>, _>>()?;

    let v: Vec<f64> = values.iter().map(|x| x * NM_TO_ANGSTROM).collect();
    let (a, b, c) = match v.len() {
        3 => (
            Vector3::new(v[0], 0.0, 0.0),
            Vector3::new(0.0, v[1], 0.0),
            Vector3::new(0.0, 0.0, v[2]),
        ),
        9 => (
            Vector3::new(v[0], v[3], v[4]),
            Vector3::new(v[5], v[1], v[6]),
            Vector3::new(v[7], v[8], v[2]),
        ),
        n => {
            return Err(GroError::Parse {
                line: line_num,
                kind: GroParseErrorKind::InvalidBox(n),
            });
        }
    };
    Ok(PeriodicBox::from_vectors(a, b, c))
}

fn parse_atom_line(
    line: &str,
    line_num: usize,
    width: usize,
) -> Result<(RawAtom, Point3<f64>), GroError> {
    let coords_end = COORDINATE_START + 3 * width;
    if line.len() < coords_end {
        return Err(GroError::Parse {
            line: line_num,
            kind: GroParseErrorKind::LineTooShort,
        });
    }

    let resid_str = slice_and_trim(line, 0, 5);
    let residue_id = resid_str.parse::<isize>().map_err(|_| GroError::Parse {
        line: line_num,
        kind: GroParseErrorKind::InvalidInt {
            columns: "1-5".to_string(),
            value: resid_str.to_string(),
        },
    })?;

    let mut coords = [0.0f64; 3];
    for (axis, coord) in coords.iter_mut().enumerate() {
        let start = COORDINATE_START + axis * width;
        let end = start + width;
        let value = slice_and_trim(line, start, end);
        *coord = value.parse::<f64>().map_err(|_| GroError::Parse {
            line: line_num,
            kind: GroParseErrorKind::InvalidFloat {
                columns: format!("{}-{}", start + 1, end),
                value: value.to_string(),
            },
        })? * NM_TO_ANGSTROM;
    }

    Ok((
        RawAtom {
            residue_id,
            residue_name: slice_and_trim(line, 5, 10).to_string(),
            atom_name: slice_and_trim(line, 10, 15).to_string(),
        },
        Point3::new(coords[0], coords[1], coords[2]),
    ))
}

/// Reads one line, stripping the trailing newline. Returns `None` at end of input.
fn read_line(reader: &mut impl BufRead, line_num: &mut usize) -> io::Result<Option<String>> {
    let mut buf = String::new();
    if reader.read_line(&mut buf)? == 0 {
        return Ok(None);
    }
    *line_num += 1;
    let trimmed_len = buf.trim_end_matches(['\n', '\r']).len();
    buf.truncate(trimmed_len);
    Ok(Some(buf))
}

fn read_raw_frame(
    reader: &mut impl BufRead,
    line_num: &mut usize,
) -> Result<Option<RawFrame>, GroError> {
    let title = loop {
        match read_line(reader, line_num)? {
            None => return Ok(None),
            Some(line) if line.trim().is_empty() => continue,
            Some(line) => break line,
        }
    };

    let count_line = read_line(reader, line_num)?
        .ok_or_else(|| GroError::MissingRecord("atom count".to_string()))?;
    let atom_count = count_line
        .trim()
        .parse::<usize>()
        .map_err(|_| GroError::Parse {
            line: *line_num,
            kind: GroParseErrorKind::InvalidAtomCount(count_line.trim().to_string()),
        })?;

    let mut atoms = Vec::with_capacity(atom_count);
    let mut positions = Vec::with_capacity(atom_count);
    let mut width = DEFAULT_FIELD_WIDTH;
    for i in 0..atom_count {
        let line = read_line(reader, line_num)?.ok_or_else(|| {
            GroError::Inconsistency(format!(
                "expected {} atom records, found {}",
                atom_count, i
            ))
        })?;
        if i == 0 {
            width = coordinate_field_width(&line);
        }
        let (atom, position) = parse_atom_line(&line, *line_num, width)?;
        atoms.push(atom);
        positions.push(position);
    }

    let box_line = read_line(reader, line_num)?
        .ok_or_else(|| GroError::MissingRecord("box vectors".to_string()))?;
    let periodic_box = parse_box(&box_line, *line_num)?;

    Ok(Some(RawFrame {
        time: parse_title_time(&title),
        atoms,
        positions,
        periodic_box,
    }))
}

fn build_topology(atoms: &[RawAtom]) -> Topology {
    let mut builder = TopologyBuilder::new();
    for atom in atoms {
        builder.add_atom(atom.residue_id, &atom.residue_name, &atom.atom_name, None);
    }
    builder.build()
}

/// Single-frame GRO reader used for reference geometries.
pub struct GroFile;

impl StructureFile for GroFile {
    type Error = GroError;

    fn read_from(reader: &mut impl BufRead) -> Result<Structure, Self::Error> {
        let mut line_num = 0;
        let raw = read_raw_frame(reader, &mut line_num)?
            .ok_or_else(|| GroError::MissingRecord("title".to_string()))?;
        if raw.atoms.is_empty() {
            return Err(GroError::MissingRecord("atoms".to_string()));
        }
        Ok(Structure::new(build_topology(&raw.atoms), raw.positions))
    }
}

/// Multi-frame GRO trajectory.
///
/// The topology is taken from the first frame; every later frame must hold the
/// same number of atoms. Frames without a `t=` field in the title get time 0.
pub struct GroTrajectory<R: BufRead> {
    reader: R,
    line_num: usize,
    topology: Topology,
    pending: Option<Frame>,
    next_index: usize,
    finished: bool,
}

impl GroTrajectory<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, GroError> {
        let file = File::open(path)?;
        Self::new(BufReader::new(file))
    }
}

impl<R: BufRead> GroTrajectory<R> {
    pub fn new(mut reader: R) -> Result<Self, GroError> {
        let mut line_num = 0;
        let raw = read_raw_frame(&mut reader, &mut line_num)?
            .ok_or_else(|| GroError::MissingRecord("first frame".to_string()))?;
        if raw.atoms.is_empty() {
            return Err(GroError::MissingRecord("atoms".to_string()));
        }
        let topology = build_topology(&raw.atoms);
        let first = Frame::new(
            0,
            raw.time.unwrap_or(0.0),
            raw.positions,
            raw.periodic_box,
        );
        Ok(Self {
            reader,
            line_num,
            topology,
            pending: Some(first),
            next_index: 1,
            finished: false,
        })
    }

    fn read_next(&mut self) -> Result<Option<Frame>, GroError> {
        let Some(raw) = read_raw_frame(&mut self.reader, &mut self.line_num)? else {
            return Ok(None);
        };
        if raw.atoms.len() != self.topology.atom_count() {
            return Err(GroError::Inconsistency(format!(
                "frame {} has {} atoms, topology has {}",
                self.next_index,
                raw.atoms.len(),
                self.topology.atom_count()
            )));
        }
        let index = self.next_index;
        self.next_index += 1;
        Ok(Some(Frame::new(
            index,
            raw.time.unwrap_or(0.0),
            raw.positions,
            raw.periodic_box,
        )))
    }
}

impl<R: BufRead> TrajectorySource for GroTrajectory<R> {
    type Error = GroError;

    fn topology(&self) -> &Topology {
        &self.topology
    }

    fn next_frame(&mut self) -> Option<Result<Frame, Self::Error>> {
        if let Some(frame) = self.pending.take() {
            return Some(Ok(frame));
        }
        if self.finished {
            return None;
        }
        match self.read_next() {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
