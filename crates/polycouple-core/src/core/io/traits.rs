use crate::core::models::frame::Frame;
use crate::core::models::structure::Structure;
use crate::core::models::topology::Topology;
use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// Defines the interface for reading single-frame structure files.
///
/// Implementors handle format-specific parsing; reference monomer geometries
/// are loaded through this trait.
pub trait StructureFile {
    /// The error type for I/O and parsing operations.
    type Error: Error + From<io::Error>;

    /// Reads a structure from a buffered reader.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing fails or the input contains no atoms.
    fn read_from(reader: &mut impl BufRead) -> Result<Structure, Self::Error>;

    /// Reads a structure from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or parsing fails.
    fn read_from_path<P: AsRef<Path>>(path: P) -> Result<Structure, Self::Error> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader)
    }
}

/// A sequential source of trajectory frames sharing one topology.
///
/// Frames are produced in file order and read one at a time; consumers never
/// hold more than the current frame.
pub trait TrajectorySource {
    /// The error type for reading a frame.
    type Error: Error + Send + Sync + 'static;

    /// Static atom/residue metadata of every frame.
    fn topology(&self) -> &Topology;

    /// Reads the next frame, or `None` once the trajectory is exhausted.
    fn next_frame(&mut self) -> Option<Result<Frame, Self::Error>>;
}
