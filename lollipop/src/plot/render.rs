use anyhow::{anyhow, bail, Result};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::fs::create_dir_all;
use std::path::Path;
use tracing::info;

use super::scene::{Anchor, LegendKind, Rgb, Scene, Shape, DOMAIN_HALF_HEIGHT, PTM_LANE};

const BACKBONE_HALF_HEIGHT: f64 = 0.08;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Svg,
}

impl ImageFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase) {
            Some(ext) if ext == "png" => Ok(ImageFormat::Png),
            Some(ext) if ext == "svg" => Ok(ImageFormat::Svg),
            _ => bail!(
                "Unsupported output format for {}: use a .png or .svg file name",
                path.display()
            ),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Svg => "svg",
        }
    }
}

fn plot_err<E: std::fmt::Display>(e: E) -> anyhow::Error {
    anyhow!("Plotting error: {}", e)
}

fn color(rgb: Rgb) -> RGBColor {
    RGBColor(rgb.0, rgb.1, rgb.2)
}

fn label_style(size: u32, anchor: Anchor) -> TextStyle<'static> {
    let vertical = match anchor {
        Anchor::Center => VPos::Center,
        Anchor::BottomCenter => VPos::Bottom,
    };
    TextStyle::from(("sans-serif", f64::from(size)).into_font()).pos(Pos::new(HPos::Center, vertical))
}

/// Draw `scene` to `output_path`; the file extension picks PNG or SVG.
pub fn render(scene: &Scene, output_path: &Path) -> Result<()> {
    let format = ImageFormat::from_path(output_path)?;
    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        create_dir_all(parent)?;
    }

    let size = (scene.width, scene.height);
    match format {
        ImageFormat::Png => draw(BitMapBackend::new(output_path, size).into_drawing_area(), scene)?,
        ImageFormat::Svg => draw(SVGBackend::new(output_path, size).into_drawing_area(), scene)?,
    }

    info!("Lollipop plot saved to {}", output_path.display());
    Ok(())
}

fn draw<DB: DrawingBackend>(root: DrawingArea<DB, Shift>, scene: &Scene) -> Result<()> {
    root.fill(&WHITE).map_err(plot_err)?;

    let (x_min, x_max) = scene.x_range;
    let (y_min, y_max) = scene.y_range;

    let mut chart = ChartBuilder::on(&root)
        .caption(&scene.title, ("sans-serif", f64::from(scene.title_font_size)))
        .margin(20)
        .x_label_area_size(45)
        .y_label_area_size(50)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_desc("Amino acid position")
        .y_desc("Variants")
        .y_label_formatter(&|y| if *y < 0.0 { String::new() } else { format!("{:.0}", y) })
        .draw()
        .map_err(plot_err)?;

    // draw order follows the scene: backbone, domains, PTMs, stems, heads, labels
    for shape in &scene.shapes {
        match shape {
            Shape::Backbone { start, end } => {
                chart
                    .draw_series(std::iter::once(Rectangle::new(
                        [(*start, -BACKBONE_HALF_HEIGHT), (*end, BACKBONE_HALF_HEIGHT)],
                        RGBColor(190, 190, 190).filled(),
                    )))
                    .map_err(plot_err)?;
            }
            Shape::DomainBox { start, end, color: fill } => {
                let corners = [(*start, -DOMAIN_HALF_HEIGHT), (*end, DOMAIN_HALF_HEIGHT)];
                chart
                    .draw_series(std::iter::once(Rectangle::new(corners, color(*fill).filled())))
                    .map_err(plot_err)?;
                chart
                    .draw_series(std::iter::once(Rectangle::new(corners, BLACK.stroke_width(1))))
                    .map_err(plot_err)?;
            }
            Shape::Stem { position, top } => {
                chart
                    .draw_series(std::iter::once(PathElement::new(
                        vec![(*position, DOMAIN_HALF_HEIGHT), (*position, *top)],
                        BLACK.mix(0.6).stroke_width(1),
                    )))
                    .map_err(plot_err)?;
            }
            Shape::Head { position, height, radius, color: fill } => {
                chart
                    .draw_series(std::iter::once(Circle::new(
                        (*position, *height),
                        *radius,
                        color(*fill).filled(),
                    )))
                    .map_err(plot_err)?;
            }
            Shape::PtmMarker { position, color: fill } => {
                chart
                    .draw_series(std::iter::once(TriangleMarker::new(
                        (*position, PTM_LANE),
                        6,
                        color(*fill).filled(),
                    )))
                    .map_err(plot_err)?;
            }
            Shape::Label { x, y, text, size, anchor } => {
                chart
                    .draw_series(std::iter::once(Text::new(
                        text.clone(),
                        (*x, *y),
                        label_style(*size, *anchor),
                    )))
                    .map_err(plot_err)?;
            }
        }
    }

    // manual legend in the upper right corner
    let legend_x = x_min + (x_max - x_min) * 0.86;
    let legend_step = (y_max - y_min) * 0.06;
    let mut legend_y = y_max;
    for entry in &scene.legend {
        legend_y -= legend_step;
        let fill = color(entry.color).filled();
        match entry.kind {
            LegendKind::Circle => chart
                .draw_series(std::iter::once(Circle::new((legend_x, legend_y), 5, fill)))
                .map_err(plot_err)?,
            LegendKind::Triangle => chart
                .draw_series(std::iter::once(TriangleMarker::new((legend_x, legend_y), 6, fill)))
                .map_err(plot_err)?,
        };
        chart
            .draw_series(std::iter::once(Text::new(
                entry.label.clone(),
                (legend_x + (x_max - x_min) * 0.012, legend_y),
                TextStyle::from(("sans-serif", 14.0).into_font()).pos(Pos::new(HPos::Left, VPos::Center)),
            )))
            .map_err(plot_err)?;
    }

    root.present().map_err(plot_err)?;
    Ok(())
}
