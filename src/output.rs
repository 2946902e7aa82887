//! Output directory layout
//!
//! Every worker creates the directories it needs itself; creation is idempotent,
//! so no worker ever depends on another having run first.

use crate::errors::Result;
use std::fs;
use std::env;
use std::path::{Component, Path, PathBuf};

/// Name of the output root below the working directory
pub const OUTPUT_DIR_NAME: &str = "Videos";
/// Scratch directory below the output root
pub const TMP_DIR_NAME: &str = "tmp";

/// Destination directories for the images of one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    pub root: PathBuf,
    pub tmp: PathBuf,
}

impl OutputLayout {
    /// `<root>` and `<root>/tmp`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let tmp = root.join(TMP_DIR_NAME);
        Self { root, tmp }
    }

    /// `<working_dir>/Videos`
    pub fn under(working_dir: &Path) -> Self {
        Self::new(working_dir.join(OUTPUT_DIR_NAME))
    }

    /// Create the root and scratch directories if they do not exist yet.
    ///
    /// Safe to call from every worker concurrently. Only the root worker reports
    /// the paths.
    pub fn ensure(&self, announce: bool) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        fs::create_dir_all(&self.tmp)?;
        if announce {
            println!("Saving outputs to {}", self.root.display());
            println!("  will use temporary directory {}", self.tmp.display());
        }
        Ok(())
    }

    /// Directory for one filter scale, `<root>/<scale in km, 4 sig. digits>km`
    pub fn scale_dir(&self, scale_m: f64) -> PathBuf {
        self.root
            .join(format!("{}km", format_significant(scale_m / 1e3, 4)))
    }

    /// [`OutputLayout::scale_dir`], created if missing
    pub fn ensure_scale_dir(&self, scale_m: f64) -> Result<PathBuf> {
        let dir = self.scale_dir(scale_m);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}

/// `path` made absolute against the current directory
pub fn absolute(path: &Path) -> Result<PathBuf> {
    Ok(resolve_against(&env::current_dir()?, path))
}

/// `path` joined onto `base` unless already absolute, with `.` components dropped
pub fn resolve_against(base: &Path, path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };
    joined
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

/// Format `value` with `digits` significant digits the way C's `%.*g` does:
/// fixed notation for moderate exponents, scientific otherwise, trailing zeros
/// removed.
pub fn format_significant(value: f64, digits: usize) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let digits = digits.max(1);

    // Exponent after rounding to the requested precision
    let scientific = format!("{:.*e}", digits - 1, value);
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some((m, e)) => (m.to_string(), e.parse::<i32>().unwrap_or(0)),
        None => return scientific,
    };

    if exponent < -4 || exponent >= digits as i32 {
        let mantissa = trim_fraction(&mantissa);
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, sign, exponent.abs())
    } else {
        let decimals = (digits as i32 - 1 - exponent).max(0) as usize;
        trim_fraction(&format!("{:.*}", decimals, value))
    }
}

fn trim_fraction(text: &str) -> String {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn significant_digits_match_printf() {
        assert_eq!(format_significant(5.0, 4), "5");
        assert_eq!(format_significant(2.5, 4), "2.5");
        assert_eq!(format_significant(100.0, 4), "100");
        assert_eq!(format_significant(12.3456, 4), "12.35");
        assert_eq!(format_significant(12345.6, 4), "1.235e+04");
        assert_eq!(format_significant(0.0001, 4), "0.0001");
        assert_eq!(format_significant(0.00001234, 3), "1.23e-05");
        assert_eq!(format_significant(0.0, 3), "0");
        assert_eq!(format_significant(-0.25, 3), "-0.25");
        assert_eq!(format_significant(9999.7, 4), "1e+04");
    }

    #[test]
    fn scale_dir_in_kilometers() {
        let layout = OutputLayout::new("/out/Videos");
        assert_eq!(layout.scale_dir(5000.0), PathBuf::from("/out/Videos/5km"));
        assert_eq!(layout.scale_dir(12500.0), PathBuf::from("/out/Videos/12.5km"));
        assert_eq!(layout.tmp, PathBuf::from("/out/Videos/tmp"));
    }

    #[test]
    fn ensure_is_idempotent() {
        let dir = tempdir().unwrap();
        let layout = OutputLayout::under(dir.path());
        layout.ensure(false).unwrap();
        layout.ensure(false).unwrap();
        assert!(layout.tmp.is_dir());

        let scale_dir = layout.ensure_scale_dir(250.0).unwrap();
        assert!(scale_dir.ends_with("0.25km"));
        assert!(scale_dir.is_dir());
    }

    #[test]
    fn relative_paths_resolve_against_base() {
        let base = Path::new("/work/run");
        assert_eq!(resolve_against(base, Path::new(".")), PathBuf::from("/work/run"));
        assert_eq!(
            resolve_against(base, Path::new("./out/Videos")),
            PathBuf::from("/work/run/out/Videos")
        );
        assert_eq!(resolve_against(base, Path::new("/data")), PathBuf::from("/data"));
        assert!(absolute(Path::new(".")).unwrap().is_absolute());
    }
}
