use super::traits::StructureFile;
use crate::core::models::structure::Structure;
use crate::core::models::topology::TopologyBuilder;
use nalgebra::Point3;
use std::io::{self, BufRead};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PdbError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse { line: usize, kind: PdbParseErrorKind },
    #[error("Missing required record: {0}")]
    MissingRecord(String),
}

#[derive(Debug, Error)]
pub enum PdbParseErrorKind {
    #[error("Invalid integer format in columns {columns} (value: '{value}')")]
    InvalidInt { columns: String, value: String },
    #[error("Invalid float format in columns {columns} (value: '{value}')")]
    InvalidFloat { columns: String, value: String },
    #[error("Line is too short for ATOM/HETATM record (must be at least 54 chars)")]
    LineTooShort,
}

fn slice_and_trim(line: &str, start: usize, end: usize) -> &str {
    line.get(start..end).unwrap_or("").trim()
}

fn parse_coordinate(line: &str, line_num: usize, start: usize, end: usize) -> Result<f64, PdbError> {
    let value = slice_and_trim(line, start, end);
    value.parse::<f64>().map_err(|_| PdbError::Parse {
        line: line_num,
        kind: PdbParseErrorKind::InvalidFloat {
            columns: format!("{}-{}", start + 1, end),
            value: value.to_string(),
        },
    })
}

/// Reader for the ATOM/HETATM records of a PDB file.
///
/// Only the first model is read. The element column (77-78) is used when
/// present; otherwise the element is guessed from the atom name.
pub struct PdbFile;

impl StructureFile for PdbFile {
    type Error = PdbError;

    fn read_from(reader: &mut impl BufRead) -> Result<Structure, Self::Error> {
        let mut builder = TopologyBuilder::new();
        let mut positions = Vec::new();

        for (line_num, line_res) in reader.lines().enumerate() {
            let line = line_res?;
            let line_num = line_num + 1;

            if line.starts_with("ENDMDL") || line.starts_with("END ") || line.trim() == "END" {
                break;
            }
            if !(line.starts_with("ATOM") || line.starts_with("HETATM")) {
                continue;
            }
            if line.len() < 54 {
                return Err(PdbError::Parse {
                    line: line_num,
                    kind: PdbParseErrorKind::LineTooShort,
                });
            }

            let resid_str = slice_and_trim(&line, 22, 26);
            let residue_id = resid_str.parse::<isize>().map_err(|_| PdbError::Parse {
                line: line_num,
                kind: PdbParseErrorKind::InvalidInt {
                    columns: "23-26".to_string(),
                    value: resid_str.to_string(),
                },
            })?;
            let x = parse_coordinate(&line, line_num, 30, 38)?;
            let y = parse_coordinate(&line, line_num, 38, 46)?;
            let z = parse_coordinate(&line, line_num, 46, 54)?;

            let element = slice_and_trim(&line, 76, 78);
            builder.add_atom(
                residue_id,
                slice_and_trim(&line, 17, 21),
                slice_and_trim(&line, 12, 16),
                (!element.is_empty()).then_some(element),
            );
            positions.push(Point3::new(x, y, z));
        }

        if positions.is_empty() {
            return Err(PdbError::MissingRecord("ATOM/HETATM".to_string()));
        }
        Ok(Structure::new(builder.build(), positions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const MONOMER: &str = "\
REMARK   reference monomer
ATOM      1  C1  PTMA    1       1.000   2.000   3.000  1.00  0.00           C
ATOM      2  N1  PTMA    1       2.000   2.000   3.000  1.00  0.00           N
HETATM    3 CL1  PTMA    1       3.000   2.000   3.000  1.00  0.00          CL
ATOM      4  O1  PTMA    1       4.000   2.000   3.000
END
ATOM      5  C9  PTMA    1       9.000   9.000   9.000  1.00  0.00           C
";

    #[test]
    fn reads_atoms_until_end_record() {
        let structure = PdbFile::read_from(&mut Cursor::new(MONOMER)).unwrap();
        assert_eq!(structure.atom_count(), 4);
        assert_eq!(structure.atom_names(), vec!["C1", "N1", "CL1", "O1"]);
        assert_eq!(structure.residue_name(), Some("PTMA"));
        assert!((structure.positions()[1] - Point3::new(2.0, 2.0, 3.0)).norm() < 1e-12);
    }

    #[test]
    fn element_column_takes_precedence_over_name_guess() {
        let structure = PdbFile::read_from(&mut Cursor::new(MONOMER)).unwrap();
        let atoms = structure.topology().atoms();
        assert_eq!(atoms[2].element, "Cl");
        assert_eq!(atoms[3].element, "O");
    }

    #[test]
    fn file_without_atoms_is_rejected() {
        let result = PdbFile::read_from(&mut Cursor::new("REMARK nothing\nEND\n"));
        assert!(matches!(result, Err(PdbError::MissingRecord(_))));
    }

    #[test]
    fn invalid_coordinate_is_reported_with_columns() {
        let pdb = "ATOM      1  C1  PTMA    1       1.000   abcdefg 3.000\n";
        match PdbFile::read_from(&mut Cursor::new(pdb)) {
            Err(PdbError::Parse {
                line,
                kind: PdbParseErrorKind::InvalidFloat { columns, .. },
            }) => {
                assert_eq!(line, 1);
                assert_eq!(columns, "39-46");
            }
            other => panic!("unexpected result: {:?}", other.map(|s| s.atom_count())),
        }
    }
}
