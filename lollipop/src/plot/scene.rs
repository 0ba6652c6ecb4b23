//! Declarative description of a lollipop figure.
//!
//! Coordinates are data coordinates: x is the residue number, y is the number
//! of variant rows at that residue. The backbone sits at y = 0 and PTM
//! markers run in a lane below it.

use protein_retriever::PtmType;
use std::collections::BTreeMap;

use crate::annotation_source::ProteinAnnotations;
use crate::config::PlotConfig;
use crate::models::{Impact, VariantRecord};

pub const DOMAIN_HALF_HEIGHT: f64 = 0.35;
pub const PTM_LANE: f64 = -0.85;
const LABEL_OFFSET: f64 = 0.35;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

const DOMAIN_PALETTE: [Rgb; 8] = [
    Rgb(102, 194, 165),
    Rgb(141, 160, 203),
    Rgb(231, 138, 195),
    Rgb(166, 216, 84),
    Rgb(255, 217, 47),
    Rgb(229, 196, 148),
    Rgb(179, 179, 179),
    Rgb(252, 141, 98),
];

pub fn impact_color(impact: Impact) -> Rgb {
    match impact {
        Impact::High => Rgb(215, 25, 28),
        Impact::Moderate => Rgb(253, 174, 97),
        Impact::Low => Rgb(26, 150, 65),
        Impact::Modifier => Rgb(120, 120, 120),
        Impact::Unknown => Rgb(60, 60, 60),
    }
}

pub fn ptm_color(ptm_type: PtmType) -> Rgb {
    match ptm_type {
        PtmType::Phosphorylation => Rgb(31, 120, 180),
        PtmType::Acetylation => Rgb(51, 160, 44),
        PtmType::Methylation => Rgb(106, 61, 154),
        PtmType::Ubiquitination => Rgb(255, 127, 0),
        PtmType::Glycosylation => Rgb(177, 89, 40),
        PtmType::Other => Rgb(150, 150, 150),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Center,
    BottomCenter,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Backbone { start: f64, end: f64 },
    DomainBox { start: f64, end: f64, color: Rgb },
    Stem { position: f64, top: f64 },
    Head { position: f64, height: f64, radius: u32, color: Rgb },
    PtmMarker { position: f64, color: Rgb },
    Label { x: f64, y: f64, text: String, size: u32, anchor: Anchor },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegendKind {
    Circle,
    Triangle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegendEntry {
    pub label: String,
    pub color: Rgb,
    pub kind: LegendKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub title_font_size: u32,
    pub x_range: (f64, f64),
    pub y_range: (f64, f64),
    pub shapes: Vec<Shape>,
    pub legend: Vec<LegendEntry>,
}

/// All variant rows that share one residue.
#[derive(Debug, Clone, PartialEq)]
pub struct Lollipop {
    pub position: u32,
    pub count: usize,
    pub impact: Impact,
    pub max_allele_frequency: Option<f64>,
    pub label: Option<String>,
}

impl Lollipop {
    /// 4 px for unknown or ultra-rare, up to 10 px for common variants.
    pub fn radius(&self) -> u32 {
        match self.max_allele_frequency {
            Some(af) if af > 0.0 => 4 + (af.min(1.0).log10() + 6.0).clamp(0.0, 6.0).round() as u32,
            _ => 4,
        }
    }
}

/// Group variants by amino-acid position, keeping the most severe impact and
/// the highest allele frequency seen at each residue. Variants without a
/// position or outside `1..=protein_length` are skipped.
pub fn aggregate_variants(variants: &[VariantRecord], protein_length: u32) -> (Vec<Lollipop>, usize) {
    let mut by_position: BTreeMap<u32, Lollipop> = BTreeMap::new();
    let mut skipped = 0usize;

    for variant in variants {
        let Some(position) = variant.protein_position.filter(|p| *p >= 1 && *p <= protein_length) else {
            skipped += 1;
            continue;
        };
        let entry = by_position.entry(position).or_insert_with(|| Lollipop {
            position,
            count: 0,
            impact: Impact::Unknown,
            max_allele_frequency: None,
            label: None,
        });
        entry.count += 1;
        entry.impact = entry.impact.max(variant.impact);
        entry.max_allele_frequency = match (entry.max_allele_frequency, variant.max_allele_frequency) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        if entry.label.is_none() {
            entry.label = variant.protein_change.clone();
        }
    }

    (by_position.into_values().collect(), skipped)
}

pub fn assemble_scene(
    annotations: &ProteinAnnotations,
    lollipops: &[Lollipop],
    settings: &PlotConfig,
) -> Scene {
    let length = annotations.protein_length as f64;
    let tallest = lollipops.iter().map(|l| l.count).max().unwrap_or(0) as f64;
    let mut shapes = vec![Shape::Backbone { start: 1.0, end: length }];

    let mut domain_colors: BTreeMap<&str, Rgb> = BTreeMap::new();
    for domain in &annotations.domains {
        let next = DOMAIN_PALETTE[domain_colors.len() % DOMAIN_PALETTE.len()];
        let color = *domain_colors.entry(domain.domain_name.as_str()).or_insert(next);
        shapes.push(Shape::DomainBox {
            start: domain.start as f64,
            end: domain.end as f64,
            color,
        });
    }
    for domain in &annotations.domains {
        shapes.push(Shape::Label {
            x: (f64::from(domain.start) + f64::from(domain.end)) / 2.0,
            y: 0.0,
            text: domain.domain_name.clone(),
            size: 12,
            anchor: Anchor::Center,
        });
    }

    for ptm in &annotations.ptms {
        shapes.push(Shape::PtmMarker {
            position: ptm.position as f64,
            color: ptm_color(ptm.ptm_type),
        });
    }

    for lollipop in lollipops {
        let height = lollipop.count as f64;
        shapes.push(Shape::Stem {
            position: lollipop.position as f64,
            top: height,
        });
        shapes.push(Shape::Head {
            position: lollipop.position as f64,
            height,
            radius: lollipop.radius(),
            color: impact_color(lollipop.impact),
        });
    }

    let mut ranked: Vec<&Lollipop> = lollipops.iter().filter(|l| l.label.is_some()).collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then(a.position.cmp(&b.position)));
    for lollipop in ranked.into_iter().take(settings.max_labels) {
        shapes.push(Shape::Label {
            x: lollipop.position as f64,
            y: lollipop.count as f64 + LABEL_OFFSET,
            text: lollipop.label.clone().unwrap_or_default(),
            size: 11,
            anchor: Anchor::BottomCenter,
        });
    }

    Scene {
        title: format!(
            "{} ({} aa): {} variant(s) at {} residue(s)",
            annotations.gene,
            annotations.protein_length,
            lollipops.iter().map(|l| l.count).sum::<usize>(),
            lollipops.len()
        ),
        width: settings.width,
        height: settings.height,
        title_font_size: settings.title_font_size,
        x_range: (0.0, length + 1.0),
        y_range: (PTM_LANE - 0.5, (tallest + 1.0).max(3.0)),
        shapes,
        legend: legend(annotations, lollipops),
    }
}

fn legend(annotations: &ProteinAnnotations, lollipops: &[Lollipop]) -> Vec<LegendEntry> {
    let mut impacts: Vec<Impact> = lollipops.iter().map(|l| l.impact).collect();
    impacts.sort_by(|a, b| b.cmp(a));
    impacts.dedup();

    let mut ptm_types: Vec<PtmType> = annotations.ptms.iter().map(|p| p.ptm_type).collect();
    ptm_types.sort();
    ptm_types.dedup();

    impacts
        .into_iter()
        .map(|impact| LegendEntry {
            label: impact.label().to_string(),
            color: impact_color(impact),
            kind: LegendKind::Circle,
        })
        .chain(ptm_types.into_iter().map(|ptm_type| LegendEntry {
            label: ptm_type.as_str().to_string(),
            color: ptm_color(ptm_type),
            kind: LegendKind::Triangle,
        }))
        .collect()
}
