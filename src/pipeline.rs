//! Per-file plotting pipeline
//!
//! [`PlotPipeline`] runs the steps shared by every kind of figure: read the filter
//! scale, grid, time axis and land mask of a file, choose and apply a map
//! projection, and skip files holding a single time sample. What gets drawn is
//! delegated to a [`PanelRenderer`]:
//!
//! - [`ScalarTransferPlots`]: one signed-log map per transfer field
//! - [`VorticityDichotomyPlots`]: coarse/fine vorticity maps side by side

use crate::dataset::{DatasetSummary, ResultDataset};
use crate::errors::{FilterMapsError, Result};
use crate::grid::{
    describe_unix_time, normalize_coordinates, normalize_time, CoordinateUnits, GeoGrid,
    Gridlines,
};
use crate::output::{format_significant, OutputLayout};
use crate::projection::{MapProjection, ProjectedGrid};
use crate::render::{
    draw_colorbar, figure_size, Colormap, Figure, Normalization, PanelView, PixelRect,
};
use crate::statistics::{color_bound, has_nonzero, time_mean_at_level};
use ndarray::Array2;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Instant;

/// Transfer fields plotted when none are requested explicitly
pub const DEFAULT_TRANSFER_FIELDS: &[&str] =
    &["energy_transfer", "Lambda_m", "PEtoKE", "div_Jtransport"];

/// Decades covered on each side of zero by the signed-log colour scale
pub const SIGNED_LOG_ORDERS: u32 = 2;

/// Width multiplier applied to the projected aspect ratio, single column
pub const SINGLE_COLUMN_LAYOUT: f64 = 1.2;
/// Width multiplier applied to the projected aspect ratio, two columns
pub const TWO_COLUMN_LAYOUT: f64 = 2.4;

const TRANSFER_FIGURE_HEIGHT_IN: f64 = 4.0;
const VORTICITY_ROW_HEIGHT_IN: f64 = 8.0;

/// Depth level every map is drawn at
const SURFACE_LEVEL: usize = 0;

/// Everything read and derived from one file that panels are drawn from
pub struct FileContext<'a> {
    pub dataset: &'a ResultDataset,
    pub grid: GeoGrid,
    pub mask: Array2<f64>,
    pub projection: MapProjection,
    pub projected: ProjectedGrid,
    pub gridlines: Option<Gridlines>,
    pub output_dir: PathBuf,
    pub dpi: u32,
}

impl FileContext<'_> {
    /// Blank figure with `rows` panel rows, each `row_height_in` inches tall
    fn figure(&self, row_height_in: f64, layout_scale: f64, rows: usize) -> Figure {
        let rows = rows.max(1) as f64;
        let aspect = self.projected.aspect_ratio(layout_scale) / rows;
        let (width, height) = figure_size(row_height_in * rows, aspect, self.dpi);
        Figure::new(width, height)
    }

    /// Time mean of `variable` at the surface, on this file's grid
    fn time_mean(&self, variable: &str) -> Result<Array2<f64>> {
        let values = self
            .dataset
            .read_field_at_level(variable, SURFACE_LEVEL, self.grid.shape())?;
        time_mean_at_level(&values)
    }

    fn panel(&self, slot: PixelRect) -> PanelView<'_> {
        PanelView::new(slot, &self.projection, self.projected.bounds, &self.grid)
    }

    /// Land mask, gridlines and frame drawn on top of a panel
    fn decorate(&self, panel: &PanelView<'_>, figure: &mut Figure) {
        let text_scale = figure.text_scale();
        let img = figure.image_mut();
        panel.overlay_mask(img, &self.mask);
        if let Some(gridlines) = &self.gridlines {
            panel.draw_gridlines(img, gridlines, &self.grid, text_scale);
        }
        panel.frame(img);
    }

    fn save(&self, figure: &Figure, file_name: &str) -> Result<PathBuf> {
        let path = self.output_dir.join(file_name);
        figure.save(&path)?;
        println!("  saved {}", path.display());
        Ok(path)
    }
}

/// What a pipeline draws for each file
pub trait PanelRenderer: Send + Sync {
    /// Short name used in log output
    fn label(&self) -> &str;

    /// Width multiplier applied to the projected aspect ratio
    fn layout_scale(&self) -> f64;

    /// Draw and save this renderer's images, returning their paths
    fn render(&self, ctx: &FileContext<'_>) -> Result<Vec<PathBuf>>;
}

/// Time-mean maps of scalar energy transfer fields, one image per field
#[derive(Debug, Clone)]
pub struct ScalarTransferPlots {
    fields: Vec<String>,
}

impl ScalarTransferPlots {
    pub fn new(fields: Vec<String>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    fn render_field(&self, ctx: &FileContext<'_>, field: &str) -> Result<PathBuf> {
        let mean = ctx.time_mean(field)?;

        let mut figure = ctx.figure(TRANSFER_FIGURE_HEIGHT_IN, self.layout_scale(), 1);
        figure.suptitle("Time mean");
        let text_scale = figure.text_scale();
        let slot = figure.grid(1, 1)[0][0];
        let panel = ctx.panel(slot.plot);

        if has_nonzero(&mean) {
            let bound = color_bound(&mean, field)?;
            let cmap = Colormap::balance();
            let norm = Normalization::SignedLog {
                bound,
                orders: SIGNED_LOG_ORDERS,
            };
            panel.pcolor(figure.image_mut(), &mean, &cmap, &norm);
            draw_colorbar(figure.image_mut(), slot.colorbar, &cmap, &norm, "", text_scale);
        } else {
            log::debug!("{} is zero everywhere, drawing the land mask only", field);
        }

        ctx.decorate(&panel, &mut figure);
        panel.title(figure.image_mut(), field, text_scale);
        ctx.save(&figure, &format!("AVE_{}.png", field))
    }
}

impl Default for ScalarTransferPlots {
    fn default() -> Self {
        Self::new(DEFAULT_TRANSFER_FIELDS.iter().map(|f| f.to_string()).collect())
    }
}

impl PanelRenderer for ScalarTransferPlots {
    fn label(&self) -> &str {
        "transfers"
    }

    fn layout_scale(&self) -> f64 {
        SINGLE_COLUMN_LAYOUT
    }

    fn render(&self, ctx: &FileContext<'_>) -> Result<Vec<PathBuf>> {
        let mut saved = Vec::new();
        for field in &self.fields {
            if !ctx.dataset.has_variable(field) {
                log::debug!("{} not in {}", field, ctx.dataset.path().display());
                continue;
            }
            saved.push(self.render_field(ctx, field)?);
        }
        Ok(saved)
    }
}

/// Vorticity component stored as `coarse_<name>` / `fine_<name>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VorticityComponent {
    Radial,
    Longitudinal,
    Latitudinal,
}

impl VorticityComponent {
    pub const ALL: [VorticityComponent; 3] = [
        VorticityComponent::Radial,
        VorticityComponent::Longitudinal,
        VorticityComponent::Latitudinal,
    ];

    /// Variable name without the `coarse_`/`fine_` prefix
    pub fn variable(&self) -> &'static str {
        match self {
            VorticityComponent::Radial => "vort_r",
            VorticityComponent::Longitudinal => "vort_lon",
            VorticityComponent::Latitudinal => "vort_lat",
        }
    }

    pub fn coarse_variable(&self) -> String {
        format!("coarse_{}", self.variable())
    }

    pub fn fine_variable(&self) -> String {
        format!("fine_{}", self.variable())
    }

    /// Row label drawn left of the coarse panel
    pub fn axis_label(&self) -> &'static str {
        match self {
            VorticityComponent::Radial => "omega_r",
            VorticityComponent::Longitudinal => "omega_lon",
            VorticityComponent::Latitudinal => "omega_lat",
        }
    }
}

impl fmt::Display for VorticityComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.variable())
    }
}

impl FromStr for VorticityComponent {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "r" | "vort_r" | "radial" => Ok(VorticityComponent::Radial),
            "lon" | "vort_lon" | "longitudinal" => Ok(VorticityComponent::Longitudinal),
            "lat" | "vort_lat" | "latitudinal" => Ok(VorticityComponent::Latitudinal),
            other => Err(format!(
                "Unknown vorticity component '{}': expected r, lon or lat",
                other
            )),
        }
    }
}

/// Coarse and fine vorticity side by side, one row per component
#[derive(Debug, Clone)]
pub struct VorticityDichotomyPlots {
    components: Vec<VorticityComponent>,
}

impl VorticityDichotomyPlots {
    pub fn new(components: Vec<VorticityComponent>) -> Self {
        Self { components }
    }

    pub fn components(&self) -> &[VorticityComponent] {
        &self.components
    }

    /// Configured components whose coarse and fine variables both exist
    pub fn available_components(&self, dataset: &ResultDataset) -> Vec<VorticityComponent> {
        self.components
            .iter()
            .copied()
            .filter(|c| {
                let present = dataset.has_variable(&c.coarse_variable())
                    && dataset.has_variable(&c.fine_variable());
                if !present {
                    log::warn!(
                        "{} has no {}/{} pair, skipping {}",
                        dataset.path().display(),
                        c.coarse_variable(),
                        c.fine_variable(),
                        c
                    );
                }
                present
            })
            .collect()
    }
}

impl Default for VorticityDichotomyPlots {
    fn default() -> Self {
        Self::new(VorticityComponent::ALL.to_vec())
    }
}

impl PanelRenderer for VorticityDichotomyPlots {
    fn label(&self) -> &str {
        "vorticity"
    }

    fn layout_scale(&self) -> f64 {
        TWO_COLUMN_LAYOUT
    }

    fn render(&self, ctx: &FileContext<'_>) -> Result<Vec<PathBuf>> {
        let components = self.available_components(ctx.dataset);
        if components.is_empty() {
            return Err(FilterMapsError::VariableNotFound {
                var: self
                    .components
                    .iter()
                    .map(|c| c.coarse_variable())
                    .collect::<Vec<_>>()
                    .join(", "),
                file: ctx.dataset.path().to_path_buf(),
            });
        }

        let rows = components.len();
        let mut figure = ctx.figure(VORTICITY_ROW_HEIGHT_IN, self.layout_scale(), rows);
        figure.suptitle("Time average");
        let text_scale = figure.text_scale();
        let slots = figure.grid(rows, 2);
        let cmap = Colormap::balance();

        for (row, (component, row_slots)) in components.iter().zip(&slots).enumerate() {
            let pairs = [
                (component.coarse_variable(), row_slots[0], "Coarse (>l)"),
                (component.fine_variable(), row_slots[1], "Fine (>l)"),
            ];
            for (column, (variable, slot, title)) in pairs.iter().enumerate() {
                let mean = ctx.time_mean(variable)?;
                let bound = color_bound(&mean, variable)?;
                let norm = Normalization::Symmetric { bound };

                let panel = ctx.panel(slot.plot);
                panel.pcolor(figure.image_mut(), &mean, &cmap, &norm);
                draw_colorbar(figure.image_mut(), slot.colorbar, &cmap, &norm, "m/s", text_scale);
                ctx.decorate(&panel, &mut figure);

                if row == 0 {
                    panel.title(figure.image_mut(), title, text_scale);
                }
                if column == 0 {
                    panel.ylabel(figure.image_mut(), component.axis_label(), text_scale);
                }
            }
        }

        Ok(vec![ctx.save(&figure, "AVE_vorticity_dichotomies.png")?])
    }
}

/// Outcome of one file
#[derive(Debug, Clone)]
pub struct FileReport {
    pub path: PathBuf,
    pub filter_scale: f64,
    pub images: Vec<PathBuf>,
    /// True when the file held too few time samples to average
    pub skipped: bool,
}

/// The batch driver shared by every renderer
pub struct PlotPipeline<R: PanelRenderer> {
    layout: OutputLayout,
    units: CoordinateUnits,
    renderer: R,
    dpi: u32,
}

impl<R: PanelRenderer> PlotPipeline<R> {
    pub fn new(layout: OutputLayout, units: CoordinateUnits, renderer: R, dpi: u32) -> Self {
        Self {
            layout,
            units,
            renderer,
            dpi: dpi.max(1),
        }
    }

    /// Process `files` in order, stopping at the first failure
    pub fn run<P: AsRef<Path>>(&self, files: &[P]) -> Result<Vec<FileReport>> {
        files.iter().map(|f| self.process_file(f.as_ref())).collect()
    }

    /// Read one file and hand it to the renderer
    pub fn process_file(&self, path: &Path) -> Result<FileReport> {
        let start = Instant::now();
        let dataset = ResultDataset::open(path)?;

        let filter_scale = dataset.filter_scale()?;
        println!("{}km", format_significant(filter_scale / 1e3, 3));

        let latitude = normalize_coordinates(&dataset.read_1d("latitude")?, &self.units);
        let longitude = normalize_coordinates(&dataset.read_1d("longitude")?, &self.units);
        let grid = GeoGrid::new(longitude, latitude);
        let (n_lat, n_lon) = grid.shape();

        let depth = dataset.read_1d("depth")?;
        let time = normalize_time(&dataset.read_1d("time")?);
        let mask = dataset.read_mask(n_lat, n_lon)?;
        log::debug!(
            "{}: {} times, {} depths, {} x {} grid",
            path.display(),
            time.len(),
            depth.len(),
            n_lat,
            n_lon
        );
        if let (Some(first), Some(last)) = (time.first(), time.last()) {
            log::debug!(
                "time span {} to {}",
                describe_unix_time(*first),
                describe_unix_time(*last)
            );
        }

        let gridlines = Gridlines::for_grid(&grid);
        let projection = MapProjection::for_extents(
            &grid.longitude.to_vec(),
            &grid.latitude.to_vec(),
            self.units.is_meters(),
        )?;
        let projected = projection.project_grid(&grid)?;
        log::debug!(
            "{} projection, aspect {:.3}",
            projection.name(),
            projected.aspect_ratio(self.renderer.layout_scale())
        );

        if time.len() <= 1 {
            log::info!(
                "{} has {} time sample(s), nothing to average",
                path.display(),
                time.len()
            );
            return Ok(FileReport {
                path: path.to_path_buf(),
                filter_scale,
                images: Vec::new(),
                skipped: true,
            });
        }

        let output_dir = self.layout.ensure_scale_dir(filter_scale)?;
        let ctx = FileContext {
            dataset: &dataset,
            grid,
            mask,
            projection,
            projected,
            gridlines,
            output_dir,
            dpi: self.dpi,
        };
        let images = self.renderer.render(&ctx)?;

        log::debug!(
            "{} {} image(s) for {} in {:.2?}",
            self.renderer.label(),
            images.len(),
            path.display(),
            start.elapsed()
        );
        Ok(FileReport {
            path: path.to_path_buf(),
            filter_scale,
            images,
            skipped: false,
        })
    }
}

/// Describe what each file holds without drawing anything
pub fn survey_file(
    path: &Path,
    transfers: &ScalarTransferPlots,
    vorticity: &VorticityDichotomyPlots,
) -> Result<DatasetSummary> {
    let dataset = ResultDataset::open(path)?;
    let summary = dataset.summary()?;
    log::debug!("variables: {}", dataset.variable_names().join(", "));

    println!("\n {}", path.display());
    println!("=============");
    println!(
        "   scale: {}km",
        format_significant(summary.filter_scale / 1e3, 4)
    );
    println!(
        "   time = {}, depth = {}, latitude = {}, longitude = {}",
        summary.n_time, summary.n_depth, summary.n_lat, summary.n_lon
    );

    let present: Vec<&str> = transfers
        .fields()
        .iter()
        .filter(|f| dataset.has_variable(f))
        .map(|f| f.as_str())
        .collect();
    println!("   transfer fields: {}", list_or_none(&present));

    let pairs: Vec<String> = vorticity
        .components()
        .iter()
        .filter(|c| {
            dataset.has_variable(&c.coarse_variable()) && dataset.has_variable(&c.fine_variable())
        })
        .map(|c| c.to_string())
        .collect();
    let pairs: Vec<&str> = pairs.iter().map(String::as_str).collect();
    println!("   vorticity pairs: {}", list_or_none(&pairs));

    if summary.n_time <= 1 {
        println!("   skipped: single time sample");
    }
    Ok(summary)
}

fn list_or_none(items: &[&str]) -> String {
    if items.is_empty() {
        "(none)".to_string()
    } else {
        items.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn components_parse_short_and_long_names() {
        assert_eq!(
            "r".parse::<VorticityComponent>(),
            Ok(VorticityComponent::Radial)
        );
        assert_eq!(
            "vort_lon".parse::<VorticityComponent>(),
            Ok(VorticityComponent::Longitudinal)
        );
        assert_eq!(
            " lat ".parse::<VorticityComponent>(),
            Ok(VorticityComponent::Latitudinal)
        );
        assert!("theta".parse::<VorticityComponent>().is_err());
    }

    #[test]
    fn component_variables() {
        let c = VorticityComponent::Radial;
        assert_eq!(c.coarse_variable(), "coarse_vort_r");
        assert_eq!(c.fine_variable(), "fine_vort_r");
    }

    #[test]
    fn defaults() {
        assert_eq!(
            ScalarTransferPlots::default().fields(),
            &["energy_transfer", "Lambda_m", "PEtoKE", "div_Jtransport"]
        );
        assert_eq!(
            VorticityDichotomyPlots::default().components(),
            &VorticityComponent::ALL
        );
        assert_eq!(ScalarTransferPlots::default().layout_scale(), 1.2);
        assert_eq!(VorticityDichotomyPlots::default().layout_scale(), 2.4);
    }
}
