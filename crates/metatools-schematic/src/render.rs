//! Top-down skull schematic rendering.
//!
//! Draws the skull outline with bregma/lambda reference markers and a
//! coordinate grid, then one colored marker per fiber with its label and,
//! for angled fibers, an angle indicator.

use crate::extract::FiberImplant;
use svg::node::element::{Circle, Ellipse, Line, Rectangle, Text};
use svg::Document;

const SKULL_LENGTH_MM: f64 = 25.0;
const SKULL_WIDTH_MM: f64 = 15.0;
const MARGIN_MM: f64 = 2.0;
const PX_PER_MM: f64 = 20.0;

const FIBER_MARKER_RADIUS_MM: f64 = 0.4;
const BREGMA_RADIUS_MM: f64 = 0.3;
const LAMBDA_RADIUS_MM: f64 = 0.25;
const LAMBDA_AP_MM: f64 = -4.0;

const SKULL_FILL: &str = "#F5F5F5";
const SKULL_EDGE: &str = "#333333";
const GRID_COLOR: &str = "#808080";

// supports up to 8 fibers before colors repeat
const FIBER_COLORS: [&str; 8] = [
    "#FF6B6B", "#4CAF50", "#2196F3", "#FF9800", "#9C27B0", "#00BCD4", "#FFC107", "#795548",
];

struct Canvas {
    width: f64,
    height: f64,
}

impl Canvas {
    fn new() -> Self {
        Self {
            width: (SKULL_WIDTH_MM + 2.0 * MARGIN_MM) * PX_PER_MM,
            height: (SKULL_LENGTH_MM + 2.0 * MARGIN_MM) * PX_PER_MM + 60.0,
        }
    }

    /// ML offset (mm, positive right) to canvas x.
    fn x(&self, ml: f64) -> f64 {
        self.width / 2.0 + ml * PX_PER_MM
    }

    /// AP offset (mm, positive anterior/up) to canvas y.
    fn y(&self, ap: f64) -> f64 {
        40.0 + (SKULL_LENGTH_MM / 2.0 + MARGIN_MM - ap) * PX_PER_MM
    }
}

/// Render the schematic for one subject as an SVG document.
pub fn render_schematic(subject_id: &str, fibers: &[FiberImplant]) -> String {
    let canvas = Canvas::new();
    let mut doc = Document::new()
        .set("width", canvas.width)
        .set("height", canvas.height)
        .set("viewBox", (0.0, 0.0, canvas.width, canvas.height))
        .add(
            Rectangle::new()
                .set("width", "100%")
                .set("height", "100%")
                .set("fill", "white"),
        );

    doc = doc.add(
        Text::new(format!(
            "Fiber Implant Locations (Top View) - Subject: {}",
            subject_id
        ))
        .set("x", canvas.width / 2.0)
        .set("y", 24)
        .set("text-anchor", "middle")
        .set("font-size", 16)
        .set("font-weight", "bold")
        .set("font-family", "sans-serif"),
    );

    doc = draw_grid(doc, &canvas);
    doc = draw_skull(doc, &canvas);

    for (index, fiber) in fibers.iter().enumerate() {
        doc = draw_fiber(doc, &canvas, fiber, index);
    }

    doc = draw_legend(doc, fibers);
    doc.to_string()
}

fn draw_grid(mut doc: Document, canvas: &Canvas) -> Document {
    let mut ml = -6.0;
    while ml <= 6.0 {
        doc = doc.add(
            Line::new()
                .set("x1", canvas.x(ml))
                .set("y1", canvas.y(SKULL_LENGTH_MM / 2.0 + MARGIN_MM))
                .set("x2", canvas.x(ml))
                .set("y2", canvas.y(-SKULL_LENGTH_MM / 2.0 - MARGIN_MM))
                .set("stroke", GRID_COLOR)
                .set("stroke-width", 0.5)
                .set("stroke-dasharray", "2,4")
                .set("opacity", 0.2),
        );
        ml += 2.0;
    }
    let mut ap = -10.0;
    while ap <= 10.0 {
        doc = doc.add(
            Line::new()
                .set("x1", canvas.x(-SKULL_WIDTH_MM / 2.0 - MARGIN_MM))
                .set("y1", canvas.y(ap))
                .set("x2", canvas.x(SKULL_WIDTH_MM / 2.0 + MARGIN_MM))
                .set("y2", canvas.y(ap))
                .set("stroke", GRID_COLOR)
                .set("stroke-width", 0.5)
                .set("stroke-dasharray", "2,4")
                .set("opacity", 0.2),
        );
        ap += 2.0;
    }
    doc
}

fn draw_skull(doc: Document, canvas: &Canvas) -> Document {
    doc.add(
        Ellipse::new()
            .set("cx", canvas.x(0.0))
            .set("cy", canvas.y(0.0))
            .set("rx", SKULL_WIDTH_MM / 2.0 * PX_PER_MM)
            .set("ry", SKULL_LENGTH_MM / 2.0 * PX_PER_MM)
            .set("fill", SKULL_FILL)
            .set("stroke", SKULL_EDGE)
            .set("stroke-width", 2)
            .set("opacity", 0.3),
    )
    .add(
        Circle::new()
            .set("cx", canvas.x(0.0))
            .set("cy", canvas.y(0.0))
            .set("r", BREGMA_RADIUS_MM * PX_PER_MM)
            .set("fill", "black"),
    )
    .add(
        Text::new("Bregma")
            .set("x", canvas.x(0.0))
            .set("y", canvas.y(-0.8))
            .set("text-anchor", "middle")
            .set("font-size", 10)
            .set("font-weight", "bold")
            .set("font-family", "sans-serif"),
    )
    .add(
        Circle::new()
            .set("cx", canvas.x(0.0))
            .set("cy", canvas.y(LAMBDA_AP_MM))
            .set("r", LAMBDA_RADIUS_MM * PX_PER_MM)
            .set("fill", "black")
            .set("opacity", 0.7),
    )
    .add(
        Text::new("Lambda")
            .set("x", canvas.x(0.0))
            .set("y", canvas.y(LAMBDA_AP_MM - 0.8))
            .set("text-anchor", "middle")
            .set("font-size", 10)
            .set("font-family", "sans-serif")
            .set("opacity", 0.7),
    )
}

fn draw_fiber(mut doc: Document, canvas: &Canvas, fiber: &FiberImplant, index: usize) -> Document {
    let color = FIBER_COLORS[index % FIBER_COLORS.len()];
    let x = canvas.x(fiber.ml);
    let y = canvas.y(fiber.ap);

    doc = doc.add(
        Circle::new()
            .set("cx", x)
            .set("cy", y)
            .set("r", FIBER_MARKER_RADIUS_MM * PX_PER_MM)
            .set("fill", color)
            .set("stroke", "black")
            .set("stroke-width", 2),
    );

    if fiber.angle.abs() > 1.0 {
        let dx = 1.5 * fiber.angle.to_radians().sin() * PX_PER_MM;
        doc = doc
            .add(
                Line::new()
                    .set("x1", x)
                    .set("y1", y)
                    .set("x2", x + dx)
                    .set("y2", y)
                    .set("stroke", color)
                    .set("stroke-width", 2)
                    .set("opacity", 0.7),
            )
            .add(
                Text::new(format!("{}°", fiber.angle))
                    .set("x", x + dx * 1.2)
                    .set("y", y)
                    .set("text-anchor", "middle")
                    .set("font-size", 9)
                    .set("fill", color)
                    .set("font-weight", "bold")
                    .set("font-family", "sans-serif"),
            );
    }

    // label anchored away from the midline so paired fibers do not overlap
    let anchor = if fiber.ml < 0.0 { "end" } else { "start" };
    doc.add(
        Text::new(fiber.name.clone())
            .set("x", x)
            .set("y", y - 0.9 * PX_PER_MM)
            .set("text-anchor", anchor)
            .set("font-size", 11)
            .set("font-weight", "bold")
            .set("font-family", "sans-serif"),
    )
}

fn draw_legend(mut doc: Document, fibers: &[FiberImplant]) -> Document {
    doc = doc.add(
        Text::new("Fiber Details:")
            .set("x", 10)
            .set("y", 52)
            .set("font-size", 10)
            .set("font-weight", "bold")
            .set("font-family", "sans-serif"),
    );
    for (index, fiber) in fibers.iter().enumerate() {
        let mut line = format!(
            "{}: AP={:.2}, ML={:.2}, DV={:.2} mm",
            fiber.name, fiber.ap, fiber.ml, fiber.dv
        );
        if fiber.angle.abs() > 1.0 {
            line.push_str(&format!(" ∠{}°", fiber.angle));
        }
        doc = doc.add(
            Text::new(line)
                .set("x", 10)
                .set("y", 52 + 12 * (index as i32 + 1))
                .set("font-size", 9)
                .set("font-family", "sans-serif")
                .set("fill", FIBER_COLORS[index % FIBER_COLORS.len()]),
        );
    }
    doc
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fiber(name: &str, ap: f64, ml: f64, angle: f64) -> FiberImplant {
        FiberImplant {
            name: name.to_string(),
            ap,
            ml,
            dv: 4.2,
            angle,
            unit: "millimeter".to_string(),
            reference: "Bregma".to_string(),
            targeted_structure: "NAc".to_string(),
        }
    }

    #[test]
    fn schematic_contains_reference_markers_and_subject() {
        let svg = render_schematic("767891", &[fiber("Fiber_0", -0.6, 1.1, 0.0)]);
        assert!(svg.contains("<svg"));
        assert!(svg.contains("767891"));
        assert!(svg.contains("Bregma"));
        assert!(svg.contains("Lambda"));
        assert!(svg.contains("Fiber_0"));
    }

    #[test]
    fn each_fiber_gets_a_distinct_color() {
        let svg = render_schematic(
            "s",
            &[
                fiber("Fiber_0", 0.0, -1.0, 0.0),
                fiber("Fiber_1", 0.0, 1.0, 0.0),
            ],
        );
        assert!(svg.contains(FIBER_COLORS[0]));
        assert!(svg.contains(FIBER_COLORS[1]));
    }

    #[test]
    fn angled_fiber_shows_angle_indicator() {
        let svg = render_schematic("s", &[fiber("Fiber_0", 0.0, 1.0, 10.0)]);
        assert!(svg.contains("10°"));

        let flat = render_schematic("s", &[fiber("Fiber_0", 0.0, 1.0, 0.0)]);
        assert!(!flat.contains("0°"));
    }

    #[test]
    fn legend_lists_every_fiber_with_coordinates() {
        let svg = render_schematic(
            "s",
            &[
                fiber("Fiber_0", -0.6, 1.1, 0.0),
                fiber("Fiber_1", 2.0, -1.5, 0.0),
            ],
        );
        assert!(svg.contains("Fiber Details:"));
        assert!(svg.contains("Fiber_0: AP=-0.60, ML=1.10, DV=4.20 mm"));
        assert!(svg.contains("Fiber_1: AP=2.00, ML=-1.50, DV=4.20 mm"));
    }
}
