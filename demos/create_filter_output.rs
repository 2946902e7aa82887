//! Creates a small set of synthetic filter output files for trying filter_maps.
//!
//! Writes `input.nc` plus `filter_5km.nc`, `filter_10km.nc` and `filter_25km.nc`
//! into the directory given as first argument (default: current directory). The
//! last file holds a single time sample and is skipped by the plotting commands.

use ndarray::{Array1, Array2, Array4};
use netcdf::create;
use std::f64::consts::PI;
use std::path::{Path, PathBuf};

const N_LAT: usize = 48;
const N_LON: usize = 64;
const N_DEPTH: usize = 2;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&dir)?;

    let latitude: Vec<f64> = (0..N_LAT)
        .map(|j| 20.0 + 25.0 * j as f64 / (N_LAT - 1) as f64)
        .collect();
    let longitude: Vec<f64> = (0..N_LON)
        .map(|i| -70.0 + 40.0 * i as f64 / (N_LON - 1) as f64)
        .collect();

    write_reference(&dir.join("input.nc"), &latitude, &longitude)?;
    println!("Created {}", dir.join("input.nc").display());

    for (scale_km, n_time) in [(5.0, 6), (10.0, 6), (25.0, 1)] {
        let path = dir.join(format!("filter_{}km.nc", scale_km));
        write_filter_file(&path, scale_km * 1e3, n_time, &latitude, &longitude)?;
        println!("Created {} ({} time samples)", path.display(), n_time);
    }

    println!("\nTry: cargo run -- --dir {} transfers", dir.display());
    Ok(())
}

fn write_reference(
    path: &Path,
    latitude: &[f64],
    longitude: &[f64],
) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    let mut file = create(path)?;
    file.add_dimension("latitude", latitude.len())?;
    file.add_dimension("longitude", longitude.len())?;

    {
        let mut lat = file.add_variable::<f64>("latitude", &["latitude"])?;
        lat.put_attribute("units", "degrees_north")?;
        lat.put(Array1::from(latitude.to_vec()).view(), ..)?;
    }
    {
        let mut lon = file.add_variable::<f64>("longitude", &["longitude"])?;
        lon.put_attribute("units", "degrees_east")?;
        lon.put(Array1::from(longitude.to_vec()).view(), ..)?;
    }
    Ok(())
}

/// Land in the western quarter, ocean elsewhere
fn mask(latitude: &[f64], longitude: &[f64]) -> Array2<f64> {
    Array2::from_shape_fn((latitude.len(), longitude.len()), |(j, i)| {
        let coast = -60.0 + 5.0 * (latitude[j] * PI / 30.0).sin();
        if longitude[i] < coast {
            0.0
        } else {
            1.0
        }
    })
}

fn write_filter_file(
    path: &Path,
    scale_m: f64,
    n_time: usize,
    latitude: &[f64],
    longitude: &[f64],
) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    let mut file = create(path)?;
    file.add_attribute("filter_scale", scale_m)?;
    file.add_attribute("title", "Synthetic coarse-graining output")?;

    file.add_dimension("time", n_time)?;
    file.add_dimension("depth", N_DEPTH)?;
    file.add_dimension("latitude", latitude.len())?;
    file.add_dimension("longitude", longitude.len())?;

    {
        let mut time = file.add_variable::<f64>("time", &["time"])?;
        time.put_attribute("units", "hours since 1950-01-01")?;
        let hours: Vec<f64> = (0..n_time).map(|t| 613_608.0 + 24.0 * t as f64).collect();
        time.put(Array1::from(hours).view(), ..)?;
    }
    {
        let mut depth = file.add_variable::<f64>("depth", &["depth"])?;
        depth.put_attribute("units", "m")?;
        depth.put(Array1::from(vec![0.0, 50.0]).view(), ..)?;
    }
    {
        let mut lat = file.add_variable::<f64>("latitude", &["latitude"])?;
        lat.put(Array1::from(latitude.to_vec()).view(), ..)?;
    }
    {
        let mut lon = file.add_variable::<f64>("longitude", &["longitude"])?;
        lon.put(Array1::from(longitude.to_vec()).view(), ..)?;
    }

    let land = mask(latitude, longitude);
    {
        let mut var = file.add_variable::<f64>("mask", &["latitude", "longitude"])?;
        var.put(land.view(), ..)?;
    }

    let dims = &["time", "depth", "latitude", "longitude"];
    let shape = (n_time, N_DEPTH, latitude.len(), longitude.len());
    let fill = -1e20;
    let eddy = |t: usize, j: usize, i: usize, k: f64| {
        let x = longitude[i] * PI / 10.0 * k;
        let y = latitude[j] * PI / 8.0 * k;
        (x.sin() * y.cos()) * (1.0 + 0.2 * (t as f64).cos())
    };

    let fields: [(&str, f64); 4] = [
        ("energy_transfer", 1e-6),
        ("Lambda_m", 1e-7),
        ("PEtoKE", 0.0),
        ("div_Jtransport", 5e-6),
    ];
    for (name, amplitude) in fields {
        let data = Array4::from_shape_fn(shape, |(t, _, j, i)| {
            if land[[j, i]] == 0.0 {
                fill
            } else {
                amplitude * eddy(t, j, i, 1.0).powi(3)
            }
        });
        let mut var = file.add_variable::<f64>(name, dims)?;
        var.put_attribute("_FillValue", fill)?;
        var.put(data.view(), ..)?;
    }

    let scale_ratio = 5e3 / scale_m;
    for (component, phase) in [("vort_r", 0.0), ("vort_lon", 1.0), ("vort_lat", 2.0)] {
        let variants = [("coarse", 0.5, 1e-5), ("fine", 2.0, 3e-6 * scale_ratio)];
        for (prefix, k, amplitude) in variants {
            let data = Array4::from_shape_fn(shape, |(t, _, j, i)| {
                if land[[j, i]] == 0.0 {
                    fill
                } else {
                    amplitude * (eddy(t, j, i, k) + phase * 0.1)
                }
            });
            let name = format!("{}_{}", prefix, component);
            let mut var = file.add_variable::<f64>(&name, dims)?;
            var.put_attribute("_FillValue", fill)?;
            var.put(data.view(), ..)?;
        }
    }

    Ok(())
}
