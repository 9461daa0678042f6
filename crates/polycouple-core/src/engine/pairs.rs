use super::error::EngineError;
use crate::core::models::frame::Frame;
use crate::core::models::pair::PairRecord;
use crate::core::models::topology::Topology;
use crate::core::selection::Selection;
use crate::core::utils::geometry::{center_of_mass, self_distance_array};
use nalgebra::{DMatrix, Point3};
use tracing::{debug, trace};

/// One monomer (residue) of the analysed type.
#[derive(Debug, Clone, PartialEq)]
pub struct Monomer {
    pub residue_index: usize,
    pub residue_id: isize,
    /// Topology indices of every atom of the residue, in topology order.
    pub atoms: Vec<usize>,
    /// Positions within `atoms` picked by the group selection.
    pub group: Vec<usize>,
    pub group_masses: Vec<f64>,
}

impl Monomer {
    /// Coordinates of all atoms of the monomer, made whole across the periodic cell.
    pub fn positions(&self, frame: &Frame) -> Vec<Point3<f64>> {
        frame.unwrapped_positions(&self.atoms)
    }

    /// Picks the group atoms out of coordinates returned by [`Monomer::positions`].
    pub fn group_positions(&self, positions: &[Point3<f64>]) -> Vec<Point3<f64>> {
        self.group.iter().map(|&k| positions[k]).collect()
    }
}

/// All monomers of one residue type, in topology order.
#[derive(Debug, Clone)]
pub struct MonomerSet {
    residue_name: String,
    monomers: Vec<Monomer>,
}

impl MonomerSet {
    pub fn from_topology(
        topology: &Topology,
        residue_name: &str,
        group_selection: &Selection,
    ) -> Result<Self, EngineError> {
        let residue_indices = topology.residues_named(residue_name);
        if residue_indices.is_empty() {
            return Err(EngineError::Data(format!(
                "topology contains no residues named '{}'",
                residue_name
            )));
        }

        let mut monomers = Vec::with_capacity(residue_indices.len());
        for residue_index in residue_indices {
            let Some(residue) = topology.residue(residue_index) else {
                continue;
            };
            let atoms = residue.atoms().to_vec();
            let group = group_selection.select(topology, &atoms);
            if group.is_empty() {
                return Err(EngineError::Configuration(format!(
                    "group selection '{}' selects no atoms of residue {} {}",
                    group_selection, residue.name, residue.id
                )));
            }
            let group_masses: Vec<f64> = group
                .iter()
                .map(|&k| topology.atoms()[atoms[k]].mass)
                .collect();
            if group_masses.iter().sum::<f64>() <= 0.0 {
                return Err(EngineError::Configuration(format!(
                    "group atoms of residue {} {} have no mass (unknown elements)",
                    residue.name, residue.id
                )));
            }
            monomers.push(Monomer {
                residue_index,
                residue_id: residue.id,
                atoms,
                group,
                group_masses,
            });
        }

        Ok(Self {
            residue_name: residue_name.to_string(),
            monomers,
        })
    }

    pub fn residue_name(&self) -> &str {
        &self.residue_name
    }

    pub fn monomers(&self) -> &[Monomer] {
        &self.monomers
    }

    pub fn get(&self, index: usize) -> Option<&Monomer> {
        self.monomers.get(index)
    }

    pub fn len(&self) -> usize {
        self.monomers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.monomers.is_empty()
    }

    /// Mass-weighted center of every monomer's group atoms in `frame`.
    pub fn centers_of_mass(&self, frame: &Frame) -> Result<Vec<Point3<f64>>, EngineError> {
        self.monomers
            .iter()
            .map(|monomer| {
                let positions = monomer.positions(frame);
                let group = monomer.group_positions(&positions);
                center_of_mass(&group, &monomer.group_masses).ok_or_else(|| {
                    EngineError::Data(format!(
                        "cannot compute center of mass of residue {}",
                        monomer.residue_id
                    ))
                })
            })
            .collect()
    }
}

/// Rejects frames whose coordinate count disagrees with the topology's `atom_count`.
pub fn validate_frame(frame: &Frame, atom_count: usize) -> Result<(), EngineError> {
    if frame.positions.len() != atom_count {
        return Err(EngineError::Data(format!(
            "frame {} has {} coordinates, topology has {} atoms",
            frame.index,
            frame.positions.len(),
            atom_count
        )));
    }
    Ok(())
}

/// Run-wide pair counter. The first index handed out is 1.
#[derive(Debug, Default)]
pub struct PairIndexer {
    issued: usize,
}

impl PairIndexer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_index(&mut self) -> usize {
        self.issued += 1;
        self.issued
    }

    pub fn issued(&self) -> usize {
        self.issued
    }
}

/// Upper-triangle pairs `(i, j)`, `i < j`, with `distances[(i, j)] <= cutoff`.
///
/// `outer_limit` restricts `i` to the first K monomers; `j` still ranges over all.
pub fn select_pairs(
    distances: &DMatrix<f64>,
    cutoff: f64,
    outer_limit: Option<usize>,
) -> Vec<(usize, usize)> {
    if cutoff <= 0.0 {
        return Vec::new();
    }
    let n = distances.nrows();
    let outer = outer_limit.map_or(n, |k| k.min(n));
    let mut pairs = Vec::new();
    for i in 0..outer {
        for j in (i + 1)..n {
            if distances[(i, j)] <= cutoff {
                pairs.push((i, j));
            }
        }
    }
    pairs
}

/// Admitted pairs of one frame together with the full COM distance matrix.
#[derive(Debug, Clone)]
pub struct FrameSelection {
    pub com_distances: DMatrix<f64>,
    pub records: Vec<PairRecord>,
    /// Positions of each record's monomers within the [`MonomerSet`].
    pub members: Vec<(usize, usize)>,
}

/// Admits monomer pairs frame by frame and numbers them across the whole run.
#[derive(Debug)]
pub struct PairSelector {
    cutoff: f64,
    test_limit: Option<usize>,
    indexer: PairIndexer,
}

impl PairSelector {
    pub fn new(cutoff: f64, test_limit: Option<usize>) -> Self {
        Self {
            cutoff,
            test_limit,
            indexer: PairIndexer::new(),
        }
    }

    pub fn admitted(&self) -> usize {
        self.indexer.issued()
    }

    pub fn admit(
        &mut self,
        frame: &Frame,
        monomers: &MonomerSet,
    ) -> Result<FrameSelection, EngineError> {
        let coms = monomers.centers_of_mass(frame)?;
        let com_distances = self_distance_array(&coms, frame.periodic_box.as_ref());
        trace!(
            shape = ?com_distances.shape(),
            "COM-COM distance matrix computed"
        );

        let members = select_pairs(&com_distances, self.cutoff, self.test_limit);
        let records = members
            .iter()
            .map(|&(i, j)| {
                let mi = &monomers.monomers()[i];
                let mj = &monomers.monomers()[j];
                let record = PairRecord {
                    pair_index: self.indexer.next_index(),
                    i_residue: mi.residue_index,
                    j_residue: mj.residue_index,
                    i_residue_id: mi.residue_id,
                    j_residue_id: mj.residue_id,
                    com_distance: com_distances[(i, j)],
                    time: frame.time,
                };
                debug!(
                    pair_index = record.pair_index,
                    i = record.i_residue_id,
                    j = record.j_residue_id,
                    distance = record.com_distance,
                    "Pair admitted"
                );
                record
            })
            .collect();

        Ok(FrameSelection {
            com_distances,
            records,
            members,
        })
    }
}
