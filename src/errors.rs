//! Centralized error handling for filter_maps
//!
//! Every fallible operation in the crate returns [`Result`]. Conditions that the
//! batch treats as normal (no process launcher, no coordinate unit attribute, an
//! absent optional field) never become errors; everything here is fatal for the
//! worker that hits it.

use std::fmt;
use std::path::PathBuf;

/// Main error type for filter_maps operations
#[derive(Debug)]
pub enum FilterMapsError {
    /// NetCDF file operation errors
    NetCDFError(netcdf::Error),

    /// I/O operation errors
    IoError(std::io::Error),

    /// Required variable missing from a dataset
    VariableNotFound { var: String, file: PathBuf },

    /// Required attribute missing from a dataset
    AttributeNotFound { attr: String, file: PathBuf },

    /// Dataset content does not have the expected shape or type
    InvalidDataset { file: PathBuf, message: String },

    /// Statistics computation errors
    StatisticsError(String),

    /// Map projection could not be built for the given extents
    ProjectionError(String),

    /// Image encoding or writing errors
    RenderError(image::ImageError),

    /// Malformed input file pattern
    PatternError(glob::PatternError),

    /// Unreadable entry while expanding the input file pattern
    GlobError(glob::GlobError),

    /// Thread pool configuration error
    ThreadPoolError(String),

    /// Array shape or dimension error
    ArrayError(ndarray::ShapeError),

    /// A spawned worker process exited unsuccessfully
    WorkerFailed { rank: usize, code: Option<i32> },

    /// Generic error
    Generic(String),
}

impl fmt::Display for FilterMapsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterMapsError::NetCDFError(e) => write!(f, "NetCDF error: {}", e),
            FilterMapsError::IoError(e) => write!(f, "I/O error: {}", e),
            FilterMapsError::VariableNotFound { var, file } => {
                write!(f, "Variable '{}' not found in {}", var, file.display())
            }
            FilterMapsError::AttributeNotFound { attr, file } => {
                write!(f, "Attribute '{}' not found in {}", attr, file.display())
            }
            FilterMapsError::InvalidDataset { file, message } => {
                write!(f, "Invalid dataset {}: {}", file.display(), message)
            }
            FilterMapsError::StatisticsError(msg) => {
                write!(f, "Statistics computation error: {}", msg)
            }
            FilterMapsError::ProjectionError(msg) => write!(f, "Projection error: {}", msg),
            FilterMapsError::RenderError(e) => write!(f, "Render error: {}", e),
            FilterMapsError::PatternError(e) => write!(f, "Invalid file pattern: {}", e),
            FilterMapsError::GlobError(e) => write!(f, "File discovery error: {}", e),
            FilterMapsError::ThreadPoolError(msg) => write!(f, "Thread pool error: {}", msg),
            FilterMapsError::ArrayError(e) => write!(f, "Array error: {}", e),
            FilterMapsError::WorkerFailed { rank, code } => match code {
                Some(code) => write!(f, "Worker {} exited with status {}", rank, code),
                None => write!(f, "Worker {} was terminated by a signal", rank),
            },
            FilterMapsError::Generic(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for FilterMapsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FilterMapsError::NetCDFError(e) => Some(e),
            FilterMapsError::IoError(e) => Some(e),
            FilterMapsError::RenderError(e) => Some(e),
            FilterMapsError::PatternError(e) => Some(e),
            FilterMapsError::GlobError(e) => Some(e),
            FilterMapsError::ArrayError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<netcdf::Error> for FilterMapsError {
    fn from(error: netcdf::Error) -> Self {
        FilterMapsError::NetCDFError(error)
    }
}

impl From<std::io::Error> for FilterMapsError {
    fn from(error: std::io::Error) -> Self {
        FilterMapsError::IoError(error)
    }
}

impl From<ndarray::ShapeError> for FilterMapsError {
    fn from(error: ndarray::ShapeError) -> Self {
        FilterMapsError::ArrayError(error)
    }
}

impl From<image::ImageError> for FilterMapsError {
    fn from(error: image::ImageError) -> Self {
        FilterMapsError::RenderError(error)
    }
}

impl From<glob::PatternError> for FilterMapsError {
    fn from(error: glob::PatternError) -> Self {
        FilterMapsError::PatternError(error)
    }
}

impl From<glob::GlobError> for FilterMapsError {
    fn from(error: glob::GlobError) -> Self {
        FilterMapsError::GlobError(error)
    }
}

impl From<String> for FilterMapsError {
    fn from(error: String) -> Self {
        FilterMapsError::Generic(error)
    }
}

impl From<&str> for FilterMapsError {
    fn from(error: &str) -> Self {
        FilterMapsError::Generic(error.to_string())
    }
}

/// Result type alias for filter_maps operations
pub type Result<T> = std::result::Result<T, FilterMapsError>;
