use std::collections::HashMap;

use eframe::egui::Color32;
use palette::{Hsl, IntoColor, Srgb};

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Color32> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.55);
            let rgb: Srgb = hsl.into_color();
            Color32::from_rgb(
                (rgb.red * 255.0) as u8,
                (rgb.green * 255.0) as u8,
                (rgb.blue * 255.0) as u8,
            )
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Color mapping: category label → Color32
// ---------------------------------------------------------------------------

/// Maps the labels of one categorical column to distinct colours, keeping
/// the first-seen label order for the legend.
#[derive(Debug, Clone)]
pub struct ColorMap {
    pub column: String,
    order: Vec<String>,
    mapping: HashMap<String, Color32>,
    default_color: Color32,
}

impl ColorMap {
    pub fn new(column: &str, labels: &[String]) -> Self {
        let mapping = labels
            .iter()
            .cloned()
            .zip(generate_palette(labels.len()))
            .collect();

        ColorMap {
            column: column.to_string(),
            order: labels.to_vec(),
            mapping,
            default_color: Color32::GRAY,
        }
    }

    pub fn color_for(&self, label: &str) -> Color32 {
        self.mapping
            .get(label)
            .copied()
            .unwrap_or(self.default_color)
    }

    /// Legend entries (label → colour) in first-seen order.
    pub fn legend_entries(&self) -> Vec<(String, Color32)> {
        self.order
            .iter()
            .map(|label| (label.clone(), self.color_for(label)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_colours_and_grey_fallback() {
        let labels = vec!["Queens".to_string(), "Bronx".to_string()];
        let map = ColorMap::new("neighbourhood_group", &labels);
        assert_ne!(map.color_for("Queens"), map.color_for("Bronx"));
        assert_eq!(map.color_for("Atlantis"), Color32::GRAY);
        let legend: Vec<String> = map.legend_entries().into_iter().map(|(l, _)| l).collect();
        assert_eq!(legend, labels);
    }
}
