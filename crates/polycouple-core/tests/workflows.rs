use nalgebra::{Point3, Vector3};
use polycouple::core::io::gro::GroTrajectory;
use polycouple::core::io::npy;
use polycouple::core::io::records::RunLabel;
use polycouple::engine::config::{
    FeatureVariants, FeaturizeConfigBuilder, PredictionConfig, PredictionConfigBuilder, SampleMode,
};
use polycouple::engine::error::EngineError;
use polycouple::engine::progress::{Progress, ProgressReporter};
use polycouple::workflows::{featurize, predict};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::{TempDir, tempdir};

const ATOMS: [(&str, &str); 3] = [("C1", "C"), ("N1", "N"), ("O1", "O")];

/// One monomer geometry in Å, relative to its first atom.
fn monomer_shape() -> [Vector3<f64>; 3] {
    [
        Vector3::new(0.0, 0.0, 0.0),
        Vector3::new(1.5, 0.0, 0.0),
        Vector3::new(1.5, 1.2, 0.0),
    ]
}

fn monomer_at(origin: Point3<f64>) -> Vec<Point3<f64>> {
    monomer_shape().iter().map(|d| origin + d).collect()
}

fn gro_frame(time: f64, separation: f64) -> String {
    let first = monomer_at(Point3::new(1.0, 1.0, 1.0));
    let second = monomer_at(Point3::new(1.0 + separation, 1.0, 1.0));
    let mut text = format!("Two PTMA monomers t= {:.5} step= 0\n{:5}\n", time, 7);
    let mut serial = 1;
    for (resid, positions) in [(1, &first), (2, &second)] {
        for ((name, _), p) in ATOMS.iter().zip(positions.iter()) {
            text.push_str(&format!(
                "{:>5}{:<5}{:>5}{:>5}{:8.3}{:8.3}{:8.3}\n",
                resid,
                "PTMA",
                name,
                serial,
                p.x / 10.0,
                p.y / 10.0,
                p.z / 10.0
            ));
            serial += 1;
        }
    }
    text.push_str(&format!(
        "{:>5}{:<5}{:>5}{:>5}{:8.3}{:8.3}{:8.3}\n",
        3, "TFSI", "N1", serial, 4.0, 4.0, 4.0
    ));
    text.push_str("   5.00000   5.00000   5.00000\n");
    text
}

/// Reference rotated by 90 degrees about z so the fit has real work to do.
fn reference_pdb() -> String {
    monomer_shape()
        .iter()
        .zip(ATOMS.iter())
        .enumerate()
        .map(|(k, (d, (name, element)))| {
            format!(
                "ATOM  {:>5} {:<4} {:<4} {:>4}    {:8.3}{:8.3}{:8.3}  1.00  0.00          {:>2}\n",
                k + 1,
                name,
                "PTMA",
                1,
                -d.y,
                d.x,
                d.z,
                element
            )
        })
        .chain(std::iter::once("END\n".to_string()))
        .collect()
}

fn model_files(dir: &Path, inputs: usize) {
    let ones = vec!["1.0"; inputs].join(", ");
    let zeros = vec!["0.0"; inputs].join(", ");
    let kernel = vec!["[1.0]"; inputs].join(", ");
    fs::write(
        dir.join("model.toml"),
        format!(
            "[[layer]]\nkernel = [{}]\nbias = [0.0]\nactivation = \"linear\"\n",
            kernel
        ),
    )
    .unwrap();
    fs::write(
        dir.join("x_scaler.toml"),
        format!("mean = [{}]\nscale = [{}]\n", zeros, ones),
    )
    .unwrap();
    fs::write(dir.join("y_scaler.toml"), "mean = [0.0]\nscale = [1.0]\n").unwrap();
}

struct Fixture {
    dir: TempDir,
    trajectory: PathBuf,
}

impl Fixture {
    fn new(separations: &[f64], model_inputs: usize) -> Self {
        let dir = tempdir().unwrap();
        let trajectory = dir.path().join("traj.gro");
        let text: String = separations
            .iter()
            .enumerate()
            .map(|(k, &s)| gro_frame(10.0 * (k + 1) as f64, s))
            .collect();
        fs::write(&trajectory, text).unwrap();
        fs::write(dir.path().join("neutral.pdb"), reference_pdb()).unwrap();
        fs::write(dir.path().join("anion.pdb"), reference_pdb()).unwrap();
        fs::write(
            dir.path().join("mapping.toml"),
            "group-selection = \"all\"\n\n[[resolution]]\nname = \"AA\"\nselection = \"all\"\n\n\
             [[resolution]]\nname = \"M2COG\"\nbeads = [\"C1 N1\", \"O1\"]\n",
        )
        .unwrap();
        let model = dir.path().join("model");
        fs::create_dir(&model).unwrap();
        model_files(&model, model_inputs);
        Self { dir, trajectory }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn prediction(&self, cutoff: f64) -> PredictionConfig {
        PredictionConfigBuilder::new()
            .mapping_path(self.path("mapping.toml"))
            .neutral_reference(self.path("neutral.pdb"))
            .anion_reference(self.path("anion.pdb"))
            .residue_name("PTMA".to_string())
            .cutoff(cutoff)
            .model_dir(self.path("model"))
            .resolution(Some("AA".to_string()))
            .output_root(self.path("out"))
            .run_label(RunLabel {
                temperature: "300".to_string(),
                label: "test".to_string(),
                snapshot: "0".to_string(),
            })
            .build()
            .unwrap()
    }

    fn trajectory(&self) -> GroTrajectory<std::io::BufReader<fs::File>> {
        GroTrajectory::open(&self.trajectory).unwrap()
    }
}

fn reciprocal_sum(separation: f64) -> f64 {
    let a = monomer_at(Point3::origin());
    let b = monomer_at(Point3::new(separation, 0.0, 0.0));
    a.iter()
        .flat_map(|p| b.iter().map(move |q| 1.0 / (q - p).norm()))
        .sum()
}

#[test]
fn predict_numbers_pairs_across_frames_and_writes_both_outputs() {
    let fixture = Fixture::new(&[5.0, 6.0], 9);
    let config = fixture.prediction(10.0);
    let events = Mutex::new(Vec::new());
    let reporter = ProgressReporter::with_callback(Box::new(|e| events.lock().unwrap().push(e)));

    let result = predict::run(&mut fixture.trajectory(), &config, &reporter).unwrap();

    assert_eq!(result.frames_processed, 2);
    assert_eq!(result.pairs_admitted(), 2);
    assert_eq!(result.predictions[0].0, 1);
    assert_eq!(result.predictions[1].0, 2);
    assert!((result.predictions[0].1 - reciprocal_sum(5.0)).abs() < 1e-6);
    assert!((result.predictions[1].1 - reciprocal_sum(6.0)).abs() < 1e-6);

    let log = fs::read_to_string(&result.pair_log_path).unwrap();
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(lines.len(), 2);
    let fields: Vec<&str> = lines[0].split_whitespace().collect();
    assert_eq!(fields[0], "1");
    assert!((fields[1].parse::<f64>().unwrap() - 5.0).abs() < 1e-6);
    assert_eq!(&fields[2..5], &["1", "2", "10.000"]);
    assert!(lines[1].trim_start().starts_with("2 "));
    assert!(
        result
            .pair_log_path
            .ends_with("pair_DATs/pairs_info_cutoff10A_300K_test_0.dat")
    );

    let csv = fs::read_to_string(&result.overlaps_path).unwrap();
    let rows: Vec<&str> = csv.lines().collect();
    assert_eq!(rows.len(), 2);
    assert!(rows[0].starts_with("000001,"));
    assert!(rows[1].starts_with("000002,"));

    drop(reporter);
    let events = events.into_inner().unwrap();
    let frames = events
        .iter()
        .filter(|e| matches!(e, Progress::FrameFinished { .. }))
        .count();
    assert_eq!(frames, 2);
}

#[test]
fn predict_with_small_cutoff_admits_nothing() {
    let fixture = Fixture::new(&[5.0], 9);
    let config = fixture.prediction(4.0);
    let result = predict::run(&mut fixture.trajectory(), &config, &ProgressReporter::new()).unwrap();
    assert_eq!(result.pairs_admitted(), 0);
    assert_eq!(fs::read_to_string(&result.pair_log_path).unwrap(), "");
    assert_eq!(fs::read_to_string(&result.overlaps_path).unwrap(), "");
}

#[test]
fn predict_rejects_model_of_wrong_input_size_before_reading_frames() {
    let fixture = Fixture::new(&[5.0], 10);
    let config = fixture.prediction(10.0);
    let result = predict::run(&mut fixture.trajectory(), &config, &ProgressReporter::new());
    assert!(matches!(result, Err(EngineError::Configuration(_))));
    assert!(!config.run_label.pair_log_path(&config.output_root, 10.0).exists());
}

#[test]
fn predict_with_tags_needs_two_extra_inputs() {
    let fixture = Fixture::new(&[5.0], 11);
    let mut config = fixture.prediction(10.0);
    config.conformation_tags = Some((1, 0));
    let result = predict::run(&mut fixture.trajectory(), &config, &ProgressReporter::new()).unwrap();
    assert!((result.predictions[0].1 - reciprocal_sum(5.0) - 1.0).abs() < 1e-6);
}

#[test]
fn predict_fails_when_reference_does_not_match_monomer() {
    let fixture = Fixture::new(&[5.0], 9);
    let mut pdb = reference_pdb();
    pdb = pdb.replace(
        "END\n",
        "ATOM      4  H1  PTMA    1       0.000   0.000   1.000  1.00  0.00           H\nEND\n",
    );
    fs::write(fixture.path("anion.pdb"), pdb).unwrap();
    let config = fixture.prediction(10.0);
    let result = predict::run(&mut fixture.trajectory(), &config, &ProgressReporter::new());
    assert!(result.is_err());
}

#[test]
fn featurize_pairs_stores_matrices_and_tagged_vectors() {
    let fixture = Fixture::new(&[5.0, 6.0], 9);
    let config = FeaturizeConfigBuilder::new()
        .mapping_path(fixture.path("mapping.toml"))
        .neutral_reference(fixture.path("neutral.pdb"))
        .anion_reference(fixture.path("anion.pdb"))
        .residue_name("PTMA".to_string())
        .cutoff(Some(10.0))
        .mode(SampleMode::Pair)
        .variants(FeatureVariants {
            coulomb: false,
            flattened: true,
        })
        .conformation_tags((2, 1))
        .output_dir(fixture.path("features"))
        .build()
        .unwrap();

    let result = featurize::run(&mut fixture.trajectory(), &config, &ProgressReporter::new()).unwrap();
    assert_eq!(result.samples, 2);
    assert_eq!(result.files_written, 8);

    let out = fixture.path("features");
    for name in [
        "pair000001AA.npy",
        "pair000001M2COG.npy",
        "pair000002AA_1D.npy",
        "pair000002M2COG_1D.npy",
        featurize::PAIR_LOG_FILE,
    ] {
        assert!(out.join(name).exists(), "missing {}", name);
    }
    let vector = npy::read_vector_from_path(out.join("pair000001AA_1D.npy")).unwrap();
    assert_eq!(vector.len(), 11);
    assert_eq!(&vector[9..], &[2.0, 1.0]);
    assert!((vector[..9].iter().sum::<f64>() - reciprocal_sum(5.0)).abs() < 1e-6);
}

#[test]
fn featurize_monomers_respects_test_limit() {
    let fixture = Fixture::new(&[5.0, 6.0], 9);
    let config = FeaturizeConfigBuilder::new()
        .mapping_path(fixture.path("mapping.toml"))
        .neutral_reference(fixture.path("neutral.pdb"))
        .anion_reference(fixture.path("anion.pdb"))
        .residue_name("PTMA".to_string())
        .mode(SampleMode::Monomer)
        .test_limit(Some(1))
        .output_dir(fixture.path("features"))
        .build()
        .unwrap();

    let result = featurize::run(&mut fixture.trajectory(), &config, &ProgressReporter::new()).unwrap();
    assert_eq!(result.frames_processed, 2);
    assert_eq!(result.samples, 2);
    let out = fixture.path("features");
    assert!(out.join("mon000001AA.npy").exists());
    assert!(out.join("mon000002M2COG.npy").exists());
    assert!(!out.join("mon000003AA.npy").exists());
}
