use ndarray::{Array1, Array2, Array4};
use netcdf::create;
use std::path::Path;
use std::process::Command;
use tempfile::tempdir;

const LAUNCHER_VARS: &[&str] = &[
    "FILTER_MAPS_RANK",
    "FILTER_MAPS_WORLD_SIZE",
    "OMPI_COMM_WORLD_RANK",
    "OMPI_COMM_WORLD_SIZE",
    "PMI_RANK",
    "PMI_SIZE",
    "PMIX_RANK",
    "PMIX_SIZE",
];

fn write_inputs(dir: &Path, scales_km: &[f64]) {
    {
        let mut file = create(dir.join("input.nc")).unwrap();
        file.add_dimension("latitude", 3).unwrap();
        let mut lat = file.add_variable::<f64>("latitude", &["latitude"]).unwrap();
        lat.put(Array1::from(vec![40.0, 41.0, 42.0]).view(), ..)
            .unwrap();
    }

    for scale in scales_km {
        let mut file = create(dir.join(format!("filter_{}km.nc", scale))).unwrap();
        file.add_attribute("filter_scale", scale * 1e3).unwrap();
        file.add_dimension("time", 2).unwrap();
        file.add_dimension("depth", 1).unwrap();
        file.add_dimension("latitude", 3).unwrap();
        file.add_dimension("longitude", 4).unwrap();
        {
            let mut var = file.add_variable::<f64>("time", &["time"]).unwrap();
            var.put(Array1::from(vec![0.0, 1.0]).view(), ..).unwrap();
        }
        {
            let mut var = file.add_variable::<f64>("depth", &["depth"]).unwrap();
            var.put(Array1::from(vec![0.0]).view(), ..).unwrap();
        }
        {
            let mut var = file.add_variable::<f64>("latitude", &["latitude"]).unwrap();
            var.put(Array1::from(vec![40.0, 41.0, 42.0]).view(), ..)
                .unwrap();
        }
        {
            let mut var = file
                .add_variable::<f64>("longitude", &["longitude"])
                .unwrap();
            var.put(Array1::from(vec![1.0, 2.0, 3.0, 4.0]).view(), ..)
                .unwrap();
        }
        {
            let mut var = file
                .add_variable::<f64>("mask", &["latitude", "longitude"])
                .unwrap();
            var.put(Array2::<f64>::ones((3, 4)).view(), ..).unwrap();
        }
        {
            let data = Array4::from_shape_fn((2, 1, 3, 4), |(t, _, j, i)| {
                (i as f64 - 1.5) * (j + t + 1) as f64
            });
            let mut var = file
                .add_variable::<f64>("energy_transfer", &["time", "depth", "latitude", "longitude"])
                .unwrap();
            var.put(data.view(), ..).unwrap();
        }
    }
}

fn filter_maps(dir: &Path) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_filter_maps"));
    for var in LAUNCHER_VARS {
        command.env_remove(var);
    }
    command.arg("--dir").arg(dir).arg("--dpi").arg("20");
    command
}

#[test]
fn test_single_worker_run() {
    let dir = tempdir().unwrap();
    write_inputs(dir.path(), &[5.0]);

    let output = filter_maps(dir.path()).arg("transfers").output().unwrap();
    assert!(output.status.success(), "{:?}", output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Proc 1 of 1"));
    assert!(stdout.contains("Saving outputs to"));
    assert!(stdout.contains("5km"));
    assert!(dir.path().join("Videos/5km/AVE_energy_transfer.png").is_file());
    assert!(dir.path().join("Videos/tmp").is_dir());
}

#[test]
fn test_launched_workers_split_the_files() {
    let dir = tempdir().unwrap();
    write_inputs(dir.path(), &[1.0, 2.0, 3.0]);

    let output = filter_maps(dir.path())
        .args(["--workers", "2", "transfers"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{:?}", output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Proc 1 of 2"));
    assert!(stdout.contains("Proc 2 of 2"));
    assert_eq!(stdout.matches("Saving outputs to").count(), 1);
    for scale in ["1km", "2km", "3km"] {
        let image = dir.path().join("Videos").join(scale).join("AVE_energy_transfer.png");
        assert!(image.is_file(), "missing {}", image.display());
    }
}

#[test]
fn test_rank_from_mpi_environment() {
    let dir = tempdir().unwrap();
    write_inputs(dir.path(), &[1.0, 2.0]);

    let output = filter_maps(dir.path())
        .env("OMPI_COMM_WORLD_RANK", "1")
        .env("OMPI_COMM_WORLD_SIZE", "2")
        .arg("transfers")
        .output()
        .unwrap();
    assert!(output.status.success(), "{:?}", output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Proc 2 of 2"));
    assert!(!stdout.contains("Saving outputs to"));
    assert!(!dir.path().join("Videos/1km").exists());
    assert!(dir.path().join("Videos/2km/AVE_energy_transfer.png").is_file());
}

#[test]
fn test_missing_reference_fails() {
    let dir = tempdir().unwrap();
    write_inputs(dir.path(), &[5.0]);
    std::fs::remove_file(dir.path().join("input.nc")).unwrap();

    let output = filter_maps(dir.path()).arg("transfers").output().unwrap();
    assert!(!output.status.success());
}

#[test]
fn test_survey_writes_nothing() {
    let dir = tempdir().unwrap();
    write_inputs(dir.path(), &[5.0]);

    let output = filter_maps(dir.path()).arg("survey").output().unwrap();
    assert!(output.status.success(), "{:?}", output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("transfer fields: energy_transfer"));
    assert!(stdout.contains("vorticity pairs: (none)"));
    assert!(!dir.path().join("Videos").exists());
}

#[test]
fn test_mpi_rank_does_not_spawn_more_workers() {
    let dir = tempdir().unwrap();
    write_inputs(dir.path(), &[1.0, 2.0]);

    let output = filter_maps(dir.path())
        .env("OMPI_COMM_WORLD_RANK", "1")
        .env("OMPI_COMM_WORLD_SIZE", "2")
        .args(["--workers", "2", "transfers"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{:?}", output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.matches("Proc ").count(), 1);
    assert!(stdout.contains("Proc 2 of 2"));
    assert!(!dir.path().join("Videos/1km").exists());
    assert!(dir.path().join("Videos/2km/AVE_energy_transfer.png").is_file());
}

#[test]
fn test_output_root_is_absolute() {
    let dir = tempdir().unwrap();
    write_inputs(dir.path(), &[5.0]);

    let mut command = Command::new(env!("CARGO_BIN_EXE_filter_maps"));
    for var in LAUNCHER_VARS {
        command.env_remove(var);
    }
    let output = command
        .current_dir(dir.path())
        .args(["--dpi", "20", "transfers"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{:?}", output);

    let root = dir.path().canonicalize().unwrap().join("Videos");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains(&format!("Saving outputs to {}\n", root.display())),
        "{}",
        stdout
    );
}
