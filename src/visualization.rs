//! Visualization utilities for nurse routing plans.
//!
//! Generates SVG maps of the routes and per-nurse schedule charts.

use crate::cost::{self, RouteMetrics};
use crate::genotype::Individual;
use crate::instance::Instance;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::process::Command;
#[cfg(feature = "png")]
use resvg::render;
#[cfg(feature = "png")]
use resvg::tiny_skia::{Pixmap, Transform};
#[cfg(feature = "png")]
use resvg::usvg;
#[cfg(feature = "png")]
use resvg::usvg::TreeParsing;
#[cfg(feature = "png")]
use resvg::FitTo;

/// Route colours, cycled when there are more nurses
const ROUTE_COLORS: [&str; 10] = [
    "#e6194b", "#3cb44b", "#4363d8", "#f58231", "#911eb4", "#42d4f4", "#f032e6", "#9a6324",
    "#469990", "#808000",
];

fn route_color(nurse: usize) -> &'static str {
    ROUTE_COLORS[nurse % ROUTE_COLORS.len()]
}

/// SVG visualization generator
pub struct Visualizer {
    /// Canvas width
    pub width: f64,
    /// Canvas height
    pub height: f64,
    /// Margin
    pub margin: f64,
    /// Patient radius
    pub node_radius: f64,
}

impl Default for Visualizer {
    fn default() -> Self {
        Visualizer {
            width: 800.0,
            height: 800.0,
            margin: 50.0,
            node_radius: 5.0,
        }
    }
}

impl Visualizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map of every nurse route, depot legs included, one colour per nurse
    pub fn generate_svg(&self, instance: &Instance, individual: &Individual) -> String {
        let mut svg = String::new();

        let (min_x, max_x, min_y, max_y) = self.get_bounds(instance);
        let scale_x = (self.width - 2.0 * self.margin) / (max_x - min_x).max(1.0);
        let scale_y = (self.height - 2.0 * self.margin) / (max_y - min_y).max(1.0);
        let scale = scale_x.min(scale_y);

        svg.push_str(&format!(
            r##"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" width="{}" height="{}" viewBox="0 0 {} {}">
<style>
    .patient {{ fill: #ffffff; stroke: #2c3e50; stroke-width: 1.5; }}
    .depot {{ fill: #2c3e50; stroke: #000000; stroke-width: 2; }}
    .route {{ stroke-width: 2; fill: none; }}
    .label {{ font-family: Arial; font-size: 9px; fill: #2c3e50; }}
    .title {{ font-family: Arial; font-size: 14px; fill: #2c3e50; font-weight: bold; }}
</style>
<rect width="100%" height="100%" fill="#ecf0f1"/>
"##,
            self.width, self.height, self.width, self.height
        ));

        svg.push_str(&format!(
            r##"<text x="{}" y="25" class="title">Instance: {} | Fitness: {} | Valid: {}</text>
"##,
            self.margin,
            instance.instance_name,
            individual.fitness(),
            individual.is_valid()
        ));

        let transform = |x: f64, y: f64| -> (f64, f64) {
            let tx = self.margin + (x - min_x) * scale;
            let ty = self.height - self.margin - (y - min_y) * scale;
            (tx, ty)
        };
        let position = |id: usize| -> (f64, f64) {
            if id == 0 {
                transform(instance.depot.x_coord, instance.depot.y_coord)
            } else {
                let p = &instance.patients[&id];
                transform(p.x_coord, p.y_coord)
            }
        };

        for (nurse, route) in individual.genotype().routes.iter().enumerate() {
            if route.is_empty() {
                continue;
            }
            let points: Vec<String> = std::iter::once(0)
                .chain(route.iter().copied())
                .chain(std::iter::once(0))
                .map(|id| {
                    let (x, y) = position(id);
                    format!("{:.2},{:.2}", x, y)
                })
                .collect();
            svg.push_str(&format!(
                r##"<polyline points="{}" class="route" stroke="{}"/>
"##,
                points.join(" "),
                route_color(nurse)
            ));
        }

        for id in instance.patients.keys() {
            let (x, y) = position(*id);
            svg.push_str(&format!(
                r##"<circle cx="{:.2}" cy="{:.2}" r="{}" class="patient"/>
<text x="{:.2}" y="{:.2}" class="label" text-anchor="middle">{}</text>
"##,
                x,
                y,
                self.node_radius,
                x,
                y - self.node_radius - 2.0,
                id
            ));
        }

        let (dx, dy) = position(0);
        svg.push_str(&format!(
            r##"<rect x="{:.2}" y="{:.2}" width="{}" height="{}" class="depot"/>
"##,
            dx - self.node_radius * 1.5,
            dy - self.node_radius * 1.5,
            self.node_radius * 3.0,
            self.node_radius * 3.0
        ));

        let used: Vec<usize> = individual
            .genotype()
            .routes
            .iter()
            .enumerate()
            .filter(|(_, r)| !r.is_empty())
            .map(|(n, _)| n)
            .collect();
        for (row, nurse) in used.iter().enumerate() {
            let y = 45.0 + row as f64 * 14.0;
            svg.push_str(&format!(
                r##"<line x1="{}" y1="{:.1}" x2="{}" y2="{:.1}" stroke="{}" stroke-width="3"/>
<text x="{}" y="{:.1}" class="label">Nurse {}</text>
"##,
                self.width - 110.0,
                y,
                self.width - 90.0,
                y,
                route_color(*nurse),
                self.width - 85.0,
                y + 3.0,
                nurse + 1
            ));
        }

        svg.push_str("</svg>");
        svg
    }

    /// Gantt-style chart: one row per used nurse, visit bars over their time windows
    pub fn generate_schedule_svg(&self, instance: &Instance, individual: &Individual) -> String {
        let metrics: Vec<RouteMetrics> = cost::route_metrics(instance, individual.genotype())
            .into_iter()
            .filter(|m| !m.visits.is_empty())
            .collect();

        let row_height = 24.0;
        let margin = 50.0;
        let width = self.width;
        let height = margin * 2.0 + row_height * metrics.len().max(1) as f64;
        let horizon = instance.depot.return_time.max(1) as f64;
        let x_scale = (width - 2.0 * margin) / horizon;

        let mut svg = String::new();
        svg.push_str(&format!(
            r##"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" width="{}" height="{}" viewBox="0 0 {} {}">
<style>
    .window {{ fill: #bdc3c7; opacity: 0.5; }}
    .late {{ fill: #e74c3c; }}
    .axis {{ stroke: #2c3e50; stroke-width: 1; }}
    .label {{ font-family: Arial; font-size: 10px; fill: #2c3e50; }}
    .title {{ font-family: Arial; font-size: 14px; fill: #2c3e50; font-weight: bold; }}
</style>
<rect width="100%" height="100%" fill="#ecf0f1"/>
<text x="{}" y="25" class="title">Schedule - Return time: {}</text>
<line x1="{}" y1="{}" x2="{}" y2="{}" class="axis"/>
"##,
            width,
            height,
            width,
            height,
            margin,
            instance.depot.return_time,
            margin + horizon * x_scale,
            margin,
            margin + horizon * x_scale,
            height - margin
        ));

        for (row, route) in metrics.iter().enumerate() {
            let y = margin + row as f64 * row_height;
            svg.push_str(&format!(
                r##"<text x="5" y="{:.1}" class="label">N{}</text>
"##,
                y + row_height * 0.6,
                route.nurse + 1
            ));
            for visit in &route.visits {
                svg.push_str(&format!(
                    r##"<rect x="{:.2}" y="{:.1}" width="{:.2}" height="{:.1}" class="window"/>
"##,
                    margin + visit.window_start as f64 * x_scale,
                    y + 2.0,
                    (visit.window_end.saturating_sub(visit.window_start)) as f64 * x_scale,
                    row_height - 4.0
                ));
                let late = visit.visit_end > visit.window_end as f64;
                svg.push_str(&format!(
                    r##"<rect x="{:.2}" y="{:.1}" width="{:.2}" height="{:.1}" fill="{}"{}/>
"##,
                    margin + visit.visit_start * x_scale,
                    y + 6.0,
                    ((visit.visit_end - visit.visit_start) * x_scale).max(1.0),
                    row_height - 12.0,
                    route_color(route.nurse),
                    if late { r#" class="late""# } else { "" }
                ));
            }
        }

        svg.push_str("</svg>");
        svg
    }

    /// Save SVG to file
    pub fn save_svg<P: AsRef<Path>>(&self, svg: &str, path: P) -> std::io::Result<()> {
        let mut file = File::create(path)?;
        file.write_all(svg.as_bytes())?;
        Ok(())
    }

    /// Save SVG as PNG, natively with the `png` feature, otherwise through
    /// `rsvg-convert`, `magick` or `inkscape`, whichever succeeds first.
    pub fn save_png<P: AsRef<Path>>(&self, svg: &str, path: P) -> std::io::Result<()> {
        let path = path.as_ref();

        #[cfg(feature = "png")]
        {
            let opt = usvg::Options::default();
            let rtree = usvg::Tree::from_str(svg, &opt).map_err(|e| {
                std::io::Error::new(std::io::ErrorKind::Other, format!("usvg parse error: {}", e))
            })?;
            let (w, h) = svg_size(svg).unwrap_or((self.width as u32, self.height as u32));
            let mut pixmap = Pixmap::new(w.max(1), h.max(1)).ok_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::Other, "Failed to create pixmap")
            })?;
            render(&rtree, FitTo::Original, Transform::default(), pixmap.as_mut())
                .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, "resvg render failed"))?;
            pixmap.save_png(path).map_err(|e| {
                std::io::Error::new(std::io::ErrorKind::Other, format!("save_png failed: {}", e))
            })?;
            return Ok(());
        }

        #[allow(unreachable_code)]
        {
            let tmp_svg = path.with_extension("svg.tmp");
            std::fs::write(&tmp_svg, svg)?;
            let out = path.to_string_lossy();
            let input = tmp_svg.to_string_lossy();

            let attempts: [(&str, Vec<&str>); 3] = [
                ("rsvg-convert", vec!["-o", out.as_ref(), input.as_ref()]),
                ("magick", vec!["convert", input.as_ref(), out.as_ref()]),
                (
                    "inkscape",
                    vec![input.as_ref(), "--export-type=png", "--export-filename", out.as_ref()],
                ),
            ];
            let converted = attempts.iter().any(|(program, args)| {
                Command::new(program)
                    .args(args)
                    .status()
                    .map(|s| s.success())
                    .unwrap_or(false)
            });

            let _ = std::fs::remove_file(&tmp_svg);
            if converted {
                Ok(())
            } else {
                Err(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "No SVG->PNG converter succeeded (tried rsvg-convert, magick, inkscape)",
                ))
            }
        }
    }

    /// Coordinate bounds over the depot and every patient
    fn get_bounds(&self, instance: &Instance) -> (f64, f64, f64, f64) {
        let mut min_x = instance.depot.x_coord;
        let mut max_x = instance.depot.x_coord;
        let mut min_y = instance.depot.y_coord;
        let mut max_y = instance.depot.y_coord;

        for patient in instance.patients.values() {
            min_x = min_x.min(patient.x_coord);
            max_x = max_x.max(patient.x_coord);
            min_y = min_y.min(patient.y_coord);
            max_y = max_y.max(patient.y_coord);
        }

        (min_x, max_x, min_y, max_y)
    }
}

/// Width and height attributes of the root element
#[cfg(feature = "png")]
fn svg_size(svg: &str) -> Option<(u32, u32)> {
    let attribute = |name: &str| -> Option<u32> {
        let (_, rest) = svg.split_once(&format!("{name}=\""))?;
        let (value, _) = rest.split_once('"')?;
        value.parse::<f64>().ok().map(|v| v as u32)
    };
    Some((attribute("width")?, attribute("height")?))
}
