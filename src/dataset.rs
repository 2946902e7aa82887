//! NetCDF access for filter output files
//!
//! [`ResultDataset`] wraps one `filter_*.nc` file and exposes the variables the
//! plotting pipeline needs. Fill values are turned into NaN on read so the
//! statistics can skip them.

use crate::errors::{FilterMapsError, Result};
use ndarray::{Array2, Array3};
use netcdf::{AttributeValue, File, Variable};
use std::path::{Path, PathBuf};

/// Structured summary of a result file, used by the survey command
#[derive(Debug, Clone)]
pub struct DatasetSummary {
    pub path: PathBuf,
    pub filter_scale: f64,
    pub n_time: usize,
    pub n_depth: usize,
    pub n_lat: usize,
    pub n_lon: usize,
}

/// One filter output file opened for reading
pub struct ResultDataset {
    path: PathBuf,
    file: File,
}

impl ResultDataset {
    pub fn open(path: &Path) -> Result<Self> {
        let file = netcdf::open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Filter length scale in meters.
    ///
    /// Stored as a global attribute by the filtering tool; a scalar variable of the
    /// same name is accepted as well.
    pub fn filter_scale(&self) -> Result<f64> {
        if let Some(attr) = self.file.attribute("filter_scale") {
            if let Some(value) = attribute_as_f64(&attr.value()?) {
                return Ok(value);
            }
            return Err(self.invalid("'filter_scale' attribute is not numeric"));
        }

        match self.file.variable("filter_scale") {
            Some(var) => var
                .get_values::<f64, _>(..)?
                .first()
                .copied()
                .ok_or_else(|| self.invalid("'filter_scale' variable is empty")),
            None => Err(FilterMapsError::AttributeNotFound {
                attr: "filter_scale".to_string(),
                file: self.path.clone(),
            }),
        }
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.file.variable(name).is_some()
    }

    /// Names of all variables, sorted
    pub fn variable_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.file.variables().map(|v| v.name()).collect();
        names.sort();
        names
    }

    /// Length of a named 1-D coordinate variable
    pub fn axis_len(&self, name: &str) -> Result<usize> {
        let var = self.variable(name)?;
        Ok(dimension_lengths(&var).iter().product())
    }

    /// Read a 1-D variable as f64, fill values replaced by NaN
    pub fn read_1d(&self, name: &str) -> Result<Vec<f64>> {
        let var = self.variable(name)?;
        let values = var.get_values::<f64, _>(..)?;
        Ok(mask_fill_values(&var, values))
    }

    /// Read the `[lat, lon]` land/ocean mask.
    ///
    /// The trailing dimensions must match the coordinate axes. Masks stored with
    /// extra leading dimensions contribute their first `[lat, lon]` slab.
    pub fn read_mask(&self, n_lat: usize, n_lon: usize) -> Result<Array2<f64>> {
        let var = self.variable("mask")?;
        let shape = dimension_lengths(&var);
        self.check_horizontal_shape("mask", &shape, (n_lat, n_lon))?;

        let mut values = mask_fill_values(&var, var.get_values::<f64, _>(..)?);
        values.truncate(n_lat * n_lon);
        Ok(Array2::from_shape_vec((n_lat, n_lon), values)?)
    }

    /// Read a `[time, depth, lat, lon]` field at one depth level as `[time, lat, lon]`.
    ///
    /// `grid_shape` is the `(n_lat, n_lon)` of the coordinate axes; a field on any
    /// other horizontal grid is rejected.
    pub fn read_field_at_level(
        &self,
        name: &str,
        level: usize,
        grid_shape: (usize, usize),
    ) -> Result<Array3<f64>> {
        let var = self.variable(name)?;
        let shape = dimension_lengths(&var);
        let [n_time, n_depth, n_lat, n_lon] = match shape.as_slice() {
            &[t, d, y, x] => [t, d, y, x],
            other => {
                return Err(self.invalid(&format!(
                    "'{}' has shape {:?}, expected [time, depth, lat, lon]",
                    name, other
                )))
            }
        };
        self.check_horizontal_shape(name, &shape, grid_shape)?;
        if level >= n_depth {
            return Err(self.invalid(&format!(
                "depth level {} out of range for '{}' ({} levels)",
                level, name, n_depth
            )));
        }

        log::debug!(
            "loading {} with shape {:?} at depth level {}",
            name,
            shape,
            level
        );
        let values = var.get_values::<f64, _>((
            0..n_time,
            level..level + 1,
            0..n_lat,
            0..n_lon,
        ))?;
        let values = mask_fill_values(&var, values);
        Ok(Array3::from_shape_vec((n_time, n_lat, n_lon), values)?)
    }

    pub fn summary(&self) -> Result<DatasetSummary> {
        Ok(DatasetSummary {
            path: self.path.clone(),
            filter_scale: self.filter_scale()?,
            n_time: self.axis_len("time")?,
            n_depth: self.axis_len("depth")?,
            n_lat: self.axis_len("latitude")?,
            n_lon: self.axis_len("longitude")?,
        })
    }

    fn variable(&self, name: &str) -> Result<Variable<'_>> {
        self.file
            .variable(name)
            .ok_or_else(|| FilterMapsError::VariableNotFound {
                var: name.to_string(),
                file: self.path.clone(),
            })
    }

    /// The last two dimensions of `name` must be `(n_lat, n_lon)`
    fn check_horizontal_shape(
        &self,
        name: &str,
        shape: &[usize],
        (n_lat, n_lon): (usize, usize),
    ) -> Result<()> {
        match shape {
            [.., y, x] if *y == n_lat && *x == n_lon => Ok(()),
            _ => Err(self.invalid(&format!(
                "'{}' has shape {:?}, expected trailing [lat, lon] = [{}, {}]",
                name, shape, n_lat, n_lon
            ))),
        }
    }

    fn invalid(&self, message: &str) -> FilterMapsError {
        FilterMapsError::InvalidDataset {
            file: self.path.clone(),
            message: message.to_string(),
        }
    }
}

/// Read the `units` attribute of `latitude` in the reference file.
///
/// A missing variable or attribute means "no unit"; only failing to open the
/// file is an error.
pub fn read_coordinate_units(reference: &Path) -> Result<Option<String>> {
    let file = netcdf::open(reference)?;
    let units = file
        .variable("latitude")
        .and_then(|var| var.attribute("units").and_then(|attr| attr.value().ok()))
        .and_then(|value| match value {
            AttributeValue::Str(s) => Some(s),
            _ => None,
        });

    if units.is_none() {
        log::debug!(
            "no latitude units in {}, treating coordinates as unitless",
            reference.display()
        );
    }
    Ok(units)
}

fn dimension_lengths(var: &Variable<'_>) -> Vec<usize> {
    var.dimensions().iter().map(|d| d.len()).collect()
}

fn attribute_as_f64(value: &AttributeValue) -> Option<f64> {
    match value {
        AttributeValue::Double(v) => Some(*v),
        AttributeValue::Float(v) => Some(f64::from(*v)),
        AttributeValue::Int(v) => Some(f64::from(*v)),
        AttributeValue::Short(v) => Some(f64::from(*v)),
        AttributeValue::Uint(v) => Some(f64::from(*v)),
        AttributeValue::Ushort(v) => Some(f64::from(*v)),
        AttributeValue::Doubles(v) => v.first().copied(),
        AttributeValue::Floats(v) => v.first().map(|x| f64::from(*x)),
        AttributeValue::Ints(v) => v.first().map(|x| f64::from(*x)),
        _ => None,
    }
}

/// Replace `_FillValue` / `missing_value` samples with NaN
fn mask_fill_values(var: &Variable<'_>, mut values: Vec<f64>) -> Vec<f64> {
    let sentinels: Vec<f64> = ["_FillValue", "missing_value"]
        .iter()
        .filter_map(|name| var.attribute(name))
        .filter_map(|attr| attr.value().ok())
        .filter_map(|value| attribute_as_f64(&value))
        .collect();

    if sentinels.is_empty() {
        return values;
    }
    for v in values.iter_mut() {
        if sentinels.iter().any(|s| s == v) {
            *v = f64::NAN;
        }
    }
    values
}
