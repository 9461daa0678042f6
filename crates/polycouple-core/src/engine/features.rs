use super::alignment::{AlignedMonomer, MonomerAligner};
use super::config::{ElectronicState, FeatureKind};
use super::error::EngineError;
use super::matrices::{
    coulomb_matrix, flatten_row_major, reciprocal_distance_matrix, resolution_atom_names,
    resolution_points, truncate,
};
use super::pairs::Monomer;
use crate::core::charges::ChargeTable;
use crate::core::mapping::{MappingTable, Resolution};
use crate::core::models::frame::Frame;
use crate::core::models::structure::Structure;
use nalgebra::{DMatrix, Point3};
use std::path::Path;
use tracing::{debug, warn};

/// Setup-time facts about one resolution, resolved once against the references.
#[derive(Debug, Clone)]
pub struct ResolutionPlan<'a> {
    pub resolution: &'a Resolution,
    /// Points produced for the neutral (rows) and anion (columns) references.
    pub shape: (usize, usize),
    /// Pair-matrix shape after any declared truncation.
    pub output_shape: (usize, usize),
    /// Present only for explicit resolutions when Coulomb features were requested.
    pub charges: Option<ChargeTable>,
}

impl ResolutionPlan<'_> {
    pub fn name(&self) -> &str {
        &self.resolution.name
    }

    /// Length of the flattened pair feature vector, with two extra slots for tags.
    pub fn feature_len(&self, tagged: bool) -> usize {
        self.output_shape.0 * self.output_shape.1 + if tagged { 2 } else { 0 }
    }
}

/// Both members of a pair superimposed by their reference copies.
#[derive(Debug, Clone)]
pub struct AlignedPair {
    /// Monomer `i` carrying the neutral reference.
    pub i: AlignedMonomer,
    /// Monomer `j` carrying the anion reference.
    pub j: AlignedMonomer,
}

/// Builds feature matrices for admitted pairs and single monomers.
///
/// Holds one aligner per electronic state; the references are borrowed
/// read-only, so an assembler can be shared across worker threads.
#[derive(Debug)]
pub struct FeatureAssembler<'a> {
    mapping: &'a MappingTable,
    residue_name: String,
    neutral: MonomerAligner<'a>,
    anion: MonomerAligner<'a>,
    plans: Vec<ResolutionPlan<'a>>,
}

impl<'a> FeatureAssembler<'a> {
    /// Resolves `resolutions` against both references.
    ///
    /// With `charges_dir` set, every explicit resolution gets its charge table,
    /// checked by length and atom names against the selected atoms of both
    /// references.
    pub fn new(
        mapping: &'a MappingTable,
        residue_name: &str,
        neutral: &'a Structure,
        anion: &'a Structure,
        resolutions: Vec<&'a Resolution>,
        charges_dir: Option<&Path>,
    ) -> Result<Self, EngineError> {
        for (state, reference) in [
            (ElectronicState::Neutral, neutral),
            (ElectronicState::Anion, anion),
        ] {
            if let Some(name) = reference.residue_name() {
                if name != residue_name {
                    warn!(
                        state = %state,
                        reference = name,
                        expected = residue_name,
                        "Reference residue name differs from the analysed residue type"
                    );
                }
            }
        }

        let neutral_aligner = MonomerAligner::new(
            neutral,
            ElectronicState::Neutral,
            residue_name,
            mapping.group_selection(),
        )?;
        let anion_aligner = MonomerAligner::new(
            anion,
            ElectronicState::Anion,
            residue_name,
            mapping.group_selection(),
        )?;

        let plans = resolutions
            .into_iter()
            .map(|resolution| {
                Self::plan(mapping, residue_name, neutral, anion, resolution, charges_dir)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            mapping,
            residue_name: residue_name.to_string(),
            neutral: neutral_aligner,
            anion: anion_aligner,
            plans,
        })
    }

    fn plan(
        mapping: &MappingTable,
        residue_name: &str,
        neutral: &Structure,
        anion: &Structure,
        resolution: &'a Resolution,
        charges_dir: Option<&Path>,
    ) -> Result<ResolutionPlan<'a>, EngineError> {
        let rows = resolution_points(neutral, neutral.positions(), resolution)?.len();
        let cols = resolution_points(anion, anion.positions(), resolution)?.len();
        let shape = (rows, cols);
        let output_shape = mapping.output_shape(residue_name, &resolution.name, shape);

        let charges = match (charges_dir, resolution_atom_names(neutral, resolution)) {
            (Some(dir), Some(neutral_names)) => {
                let table = ChargeTable::load(dir, &resolution.name)?;
                table.check_against(&neutral_names)?;
                if let Some(anion_names) = resolution_atom_names(anion, resolution) {
                    table.check_against(&anion_names)?;
                }
                Some(table)
            }
            _ => None,
        };

        debug!(
            resolution = %resolution.name,
            ?shape,
            ?output_shape,
            coulomb = charges.is_some(),
            "Resolution planned"
        );
        Ok(ResolutionPlan {
            resolution,
            shape,
            output_shape,
            charges,
        })
    }

    pub fn residue_name(&self) -> &str {
        &self.residue_name
    }

    pub fn plans(&self) -> &[ResolutionPlan<'a>] {
        &self.plans
    }

    pub fn aligner(&self, state: ElectronicState) -> &MonomerAligner<'a> {
        match state {
            ElectronicState::Neutral => &self.neutral,
            ElectronicState::Anion => &self.anion,
        }
    }

    /// Aligns `i` onto the neutral reference and `j` onto the anion reference.
    pub fn align_pair(
        &self,
        frame: &Frame,
        residue_name: &str,
        i: &Monomer,
        j: &Monomer,
    ) -> Result<AlignedPair, EngineError> {
        let i = self.neutral.align(residue_name, i, &i.positions(frame))?;
        let j = self.anion.align(residue_name, j, &j.positions(frame))?;
        Ok(AlignedPair { i, j })
    }

    pub fn align_monomer(
        &self,
        state: ElectronicState,
        frame: &Frame,
        residue_name: &str,
        monomer: &Monomer,
    ) -> Result<AlignedMonomer, EngineError> {
        Ok(self
            .aligner(state)
            .align(residue_name, monomer, &monomer.positions(frame))?)
    }

    /// Raw (untruncated) feature matrix between the aligned members of a pair.
    pub fn pair_matrix(
        &self,
        plan: &ResolutionPlan<'_>,
        pair: &AlignedPair,
        kind: FeatureKind,
        frame: &Frame,
    ) -> Result<DMatrix<f64>, EngineError> {
        let a = resolution_points(self.neutral.reference(), &pair.i.positions, plan.resolution)?;
        let b = resolution_points(self.anion.reference(), &pair.j.positions, plan.resolution)?;
        self.build(plan, &a, &b, kind, frame)
    }

    /// Raw feature matrix of one aligned monomer against itself.
    pub fn monomer_matrix(
        &self,
        plan: &ResolutionPlan<'_>,
        state: ElectronicState,
        aligned: &AlignedMonomer,
        kind: FeatureKind,
        frame: &Frame,
    ) -> Result<DMatrix<f64>, EngineError> {
        let points = resolution_points(
            self.aligner(state).reference(),
            &aligned.positions,
            plan.resolution,
        )?;
        self.build(plan, &points, &points, kind, frame)
    }

    fn build(
        &self,
        plan: &ResolutionPlan<'_>,
        a: &[Point3<f64>],
        b: &[Point3<f64>],
        kind: FeatureKind,
        frame: &Frame,
    ) -> Result<DMatrix<f64>, EngineError> {
        let pbc = frame.periodic_box.as_ref();
        match kind {
            FeatureKind::DistanceMatrix => Ok(reciprocal_distance_matrix(a, b, pbc)),
            FeatureKind::CoulombMatrix => {
                let table = plan.charges.as_ref().ok_or_else(|| {
                    EngineError::Configuration(format!(
                        "no charge table for resolution '{}' (Coulomb features need an explicit resolution and a charges directory)",
                        plan.name()
                    ))
                })?;
                coulomb_matrix(a, b, table.charges(), pbc)
            }
        }
    }

    /// Applies the declared output shape of this residue type and resolution.
    pub fn shape_for_model(&self, plan: &ResolutionPlan<'_>, matrix: DMatrix<f64>) -> DMatrix<f64> {
        match self
            .mapping
            .truncation_for(&self.residue_name, plan.name(), matrix.shape())
        {
            Some(to) => truncate(&matrix, to),
            None => matrix,
        }
    }
}

/// Flattens `matrix` row-major and appends the conformation tags, if any.
pub fn feature_vector(matrix: &DMatrix<f64>, tags: Option<(i32, i32)>) -> Vec<f64> {
    let mut values = flatten_row_major(matrix);
    if let Some((i_tag, j_tag)) = tags {
        values.push(f64::from(i_tag));
        values.push(f64::from(j_tag));
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::mapping::TruncationRule;
    use crate::core::models::topology::TopologyBuilder;
    use crate::core::selection::Selection;
    use std::fs;
    use tempfile::tempdir;

    const NAMES: [&str; 4] = ["C1", "C2", "O1", "H1"];

    fn reference(residue: &str) -> Structure {
        let mut builder = TopologyBuilder::new();
        for name in NAMES {
            builder.add_atom(1, residue, name, None);
        }
        Structure::new(
            builder.build(),
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
                Point3::new(0.0, 1.0, 0.5),
            ],
        )
    }

    fn trajectory_frame() -> (Frame, Monomer, Monomer) {
        let base = reference("PTMA").positions().to_vec();
        let mut positions = base.clone();
        positions.extend(base.iter().map(|p| p + nalgebra::Vector3::new(4.0, 0.0, 0.0)));
        let monomer = |residue_index: usize, offset: usize| Monomer {
            residue_index,
            residue_id: residue_index as isize + 1,
            atoms: (offset..offset + 4).collect(),
            group: vec![0, 1, 2, 3],
            group_masses: vec![12.011, 12.011, 15.999, 1.008],
        };
        (
            Frame::new(0, 0.0, positions, None),
            monomer(0, 0),
            monomer(1, 4),
        )
    }

    fn mapping() -> MappingTable {
        MappingTable::new(
            Selection::parse("all").unwrap(),
            vec![
                Resolution::explicit("AA", "all").unwrap(),
                Resolution::explicit("HEAVY", "not name H*").unwrap(),
                Resolution::beads("M2COG", &["C1 C2", "O1"]).unwrap(),
            ],
        )
        .unwrap()
    }

    #[test]
    fn plans_follow_reference_shapes_and_truncation() {
        let mut mapping = mapping();
        mapping
            .add_truncation(TruncationRule {
                residues: vec!["PTMA".to_string()],
                resolution: Some("AA".to_string()),
                from: (4, 4),
                to: (2, 2),
            })
            .unwrap();
        let neutral = reference("PTMA");
        let anion = reference("PTMA");
        let resolutions = mapping.resolutions().iter().collect();
        let assembler =
            FeatureAssembler::new(&mapping, "PTMA", &neutral, &anion, resolutions, None).unwrap();

        let shapes: Vec<_> = assembler
            .plans()
            .iter()
            .map(|p| (p.shape, p.output_shape))
            .collect();
        assert_eq!(
            shapes,
            vec![((4, 4), (2, 2)), ((3, 3), (3, 3)), ((2, 2), (2, 2))]
        );
        assert_eq!(assembler.plans()[0].feature_len(true), 6);
    }

    #[test]
    fn pair_matrix_matches_distances_between_aligned_copies() {
        let mapping = mapping();
        let neutral = reference("PTMA");
        let anion = reference("PTMA");
        let assembler = FeatureAssembler::new(
            &mapping,
            "PTMA",
            &neutral,
            &anion,
            vec![mapping.get("AA").unwrap()],
            None,
        )
        .unwrap();
        let (frame, i, j) = trajectory_frame();
        let pair = assembler.align_pair(&frame, "PTMA", &i, &j).unwrap();
        let plan = &assembler.plans()[0];
        let matrix = assembler
            .pair_matrix(plan, &pair, FeatureKind::DistanceMatrix, &frame)
            .unwrap();
        assert_eq!(matrix.shape(), (4, 4));
        assert!((matrix[(0, 0)] - 0.25).abs() < 1e-9);
        assert!((matrix[(1, 0)] - 1.0 / 3.0).abs() < 1e-9);

        let vector = feature_vector(&assembler.shape_for_model(plan, matrix), Some((3, 7)));
        assert_eq!(vector.len(), 18);
        assert_eq!(&vector[16..], &[3.0, 7.0]);
    }

    #[test]
    fn monomer_matrix_has_zero_diagonal() {
        let mapping = mapping();
        let neutral = reference("PTMA");
        let anion = reference("PTMA");
        let assembler = FeatureAssembler::new(
            &mapping,
            "PTMA",
            &neutral,
            &anion,
            vec![mapping.get("HEAVY").unwrap()],
            None,
        )
        .unwrap();
        let (frame, i, _) = trajectory_frame();
        let aligned = assembler
            .align_monomer(ElectronicState::Neutral, &frame, "PTMA", &i)
            .unwrap();
        let matrix = assembler
            .monomer_matrix(
                &assembler.plans()[0],
                ElectronicState::Neutral,
                &aligned,
                FeatureKind::DistanceMatrix,
                &frame,
            )
            .unwrap();
        assert_eq!(matrix.shape(), (3, 3));
        for k in 0..3 {
            assert_eq!(matrix[(k, k)], 0.0);
        }
    }

    #[test]
    fn coulomb_needs_charges_and_checks_them_at_setup() {
        let mapping = mapping();
        let neutral = reference("PTMA");
        let anion = reference("PTMA");
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("charges_MOL_HEAVY.toml"),
            "names = [\"C1\", \"C2\", \"O1\"]\ncharges = [0.2, 0.3, -0.5]\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("charges_MOL_AA.toml"),
            "names = [\"C1\", \"C2\", \"O1\"]\ncharges = [0.2, 0.3, -0.5]\n",
        )
        .unwrap();

        let heavy = FeatureAssembler::new(
            &mapping,
            "PTMA",
            &neutral,
            &anion,
            vec![mapping.get("HEAVY").unwrap()],
            Some(dir.path()),
        )
        .unwrap();
        let (frame, i, j) = trajectory_frame();
        let pair = heavy.align_pair(&frame, "PTMA", &i, &j).unwrap();
        let cm = heavy
            .pair_matrix(&heavy.plans()[0], &pair, FeatureKind::CoulombMatrix, &frame)
            .unwrap();
        assert!((cm[(0, 0)] - 0.2 * 0.2 / 4.0).abs() < 1e-9);

        let aa = FeatureAssembler::new(
            &mapping,
            "PTMA",
            &neutral,
            &anion,
            vec![mapping.get("AA").unwrap()],
            Some(dir.path()),
        );
        assert!(matches!(aa, Err(EngineError::Configuration(_))));

        let beads = FeatureAssembler::new(
            &mapping,
            "PTMA",
            &neutral,
            &anion,
            vec![mapping.get("M2COG").unwrap()],
            None,
        )
        .unwrap();
        let result = beads.pair_matrix(
            &beads.plans()[0],
            &pair,
            FeatureKind::CoulombMatrix,
            &frame,
        );
        assert!(matches!(result, Err(EngineError::Configuration(_))));
    }

    #[test]
    fn wrong_residue_type_fails_validation() {
        let mapping = mapping();
        let neutral = reference("PTMA");
        let anion = reference("PTMA");
        let assembler = FeatureAssembler::new(
            &mapping,
            "PTMA",
            &neutral,
            &anion,
            vec![mapping.get("AA").unwrap()],
            None,
        )
        .unwrap();
        let (frame, i, j) = trajectory_frame();
        assert!(matches!(
            assembler.align_pair(&frame, "TFSI", &i, &j),
            Err(EngineError::Validation(_))
        ));
    }
}
