//! Color schemes for the map and sunburst renderers

use std::fmt;
use std::str::FromStr;

/// An RGB color
pub type Rgb = (u8, u8, u8);

/// Fill used for countries without data
pub const NO_DATA_FILL: Rgb = (0xf0, 0xf0, 0xf0);

/// Hand-picked distinct base colors for top-level sunburst slices
pub const DISTINCT_COLORS: [Rgb; 12] = [
    (0xBB, 0x8F, 0xCE),
    (0x4E, 0xCD, 0xC4),
    (0x45, 0xB7, 0xD1),
    (0x96, 0xCE, 0xB4),
    (0xFF, 0xEA, 0xA7),
    (0xDD, 0xA0, 0xDD),
    (0x98, 0xD8, 0xC8),
    (0xFF, 0x6B, 0x6B),
    (0xF7, 0xDC, 0x6F),
    (0x85, 0xC1, 0xE9),
    (0xF8, 0xC4, 0x71),
    (0x82, 0xE0, 0xAA),
];

/// Named sequential color schemes for the choropleth
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorScheme {
    Blue,
    Red,
    Green,
    Purple,
    Orange,
    Pink,
    Brown,
    Grey,
    Teal,
    Yellow,
}

impl ColorScheme {
    /// All scheme names accepted on the command line
    pub const NAMES: &'static [&'static str] = &[
        "blue", "red", "green", "purple", "orange", "pink", "brown", "grey", "teal", "yellow",
    ];

    /// Light -> dark anchor stops for the ramp
    fn stops(self) -> [Rgb; 3] {
        match self {
            ColorScheme::Blue => [(222, 235, 247), (107, 174, 214), (8, 48, 107)],
            ColorScheme::Red => [(254, 224, 210), (251, 106, 74), (103, 0, 13)],
            ColorScheme::Green => [(229, 245, 224), (116, 196, 118), (0, 68, 27)],
            ColorScheme::Purple => [(239, 237, 245), (158, 154, 200), (63, 0, 125)],
            ColorScheme::Orange => [(254, 230, 206), (253, 141, 60), (127, 39, 4)],
            ColorScheme::Pink => [(253, 224, 221), (247, 104, 161), (115, 1, 70)],
            ColorScheme::Brown => [(245, 222, 179), (205, 133, 63), (92, 51, 23)],
            ColorScheme::Grey => [(240, 240, 240), (150, 150, 150), (37, 37, 37)],
            ColorScheme::Teal => [(224, 243, 219), (123, 204, 196), (8, 64, 129)],
            ColorScheme::Yellow => [(255, 255, 178), (254, 178, 76), (189, 0, 38)],
        }
    }

    /// Interpolate the ramp at `t` in [0, 1] (0 = lightest)
    pub fn ramp(self, t: f64) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        let stops = self.stops();
        let (a, b, local) = if t <= 0.5 {
            (stops[0], stops[1], t * 2.0)
        } else {
            (stops[1], stops[2], (t - 0.5) * 2.0)
        };
        (
            lerp(a.0, b.0, local),
            lerp(a.1, b.1, local),
            lerp(a.2, b.2, local),
        )
    }
}

fn lerp(a: u8, b: u8, t: f64) -> u8 {
    (a as f64 + (b as f64 - a as f64) * t).round().clamp(0.0, 255.0) as u8
}

impl FromStr for ColorScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "blue" => Ok(ColorScheme::Blue),
            "red" => Ok(ColorScheme::Red),
            "green" => Ok(ColorScheme::Green),
            "purple" => Ok(ColorScheme::Purple),
            "orange" => Ok(ColorScheme::Orange),
            "pink" => Ok(ColorScheme::Pink),
            "brown" => Ok(ColorScheme::Brown),
            "grey" | "gray" => Ok(ColorScheme::Grey),
            "teal" => Ok(ColorScheme::Teal),
            "yellow" => Ok(ColorScheme::Yellow),
            other => Err(format!(
                "unknown colour '{}' (expected one of: {})",
                other,
                Self::NAMES.join(", ")
            )),
        }
    }
}

impl fmt::Display for ColorScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColorScheme::Blue => "blue",
            ColorScheme::Red => "red",
            ColorScheme::Green => "green",
            ColorScheme::Purple => "purple",
            ColorScheme::Orange => "orange",
            ColorScheme::Pink => "pink",
            ColorScheme::Brown => "brown",
            ColorScheme::Grey => "grey",
            ColorScheme::Teal => "teal",
            ColorScheme::Yellow => "yellow",
        };
        write!(f, "{}", name)
    }
}

/// `n` visually distinct colors, cycling the base palette
pub fn distinct_colors(n: usize) -> Vec<Rgb> {
    (0..n).map(|i| DISTINCT_COLORS[i % DISTINCT_COLORS.len()]).collect()
}

/// Brightness variations of a base color for inherited sunburst levels.
/// The factor runs 0.3 -> 1.0 and is blended toward white for contrast.
pub fn color_variations(base: Rgb, n: usize) -> Vec<Rgb> {
    if n <= 1 {
        return vec![base];
    }

    (0..n)
        .map(|i| {
            let factor = 0.3 + 0.7 * i as f64 / (n - 1) as f64;
            let channel = |c: u8| -> u8 {
                let v = c as f64 / 255.0;
                let lightened = (v * factor + (1.0 - factor) * 0.9).min(1.0);
                (lightened * 255.0).round() as u8
            };
            (channel(base.0), channel(base.1), channel(base.2))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ramp_endpoints() {
        let light = ColorScheme::Blue.ramp(0.0);
        let dark = ColorScheme::Blue.ramp(1.0);

        assert_eq!(light, (222, 235, 247));
        assert_eq!(dark, (8, 48, 107));
    }

    #[test]
    fn test_ramp_midpoint_hits_middle_stop() {
        assert_eq!(ColorScheme::Red.ramp(0.5), (251, 106, 74));
    }

    #[test]
    fn test_ramp_clamps_out_of_range() {
        assert_eq!(ColorScheme::Blue.ramp(-1.0), ColorScheme::Blue.ramp(0.0));
        assert_eq!(ColorScheme::Blue.ramp(2.0), ColorScheme::Blue.ramp(1.0));
    }

    #[test]
    fn test_from_str() {
        assert_eq!("teal".parse::<ColorScheme>().unwrap(), ColorScheme::Teal);
        assert_eq!("GRAY".parse::<ColorScheme>().unwrap(), ColorScheme::Grey);
        assert!("magenta".parse::<ColorScheme>().is_err());
    }

    #[test]
    fn test_distinct_colors_cycle() {
        let colors = distinct_colors(14);
        assert_eq!(colors.len(), 14);
        assert_eq!(colors[0], colors[12]);
        assert_ne!(colors[0], colors[1]);
    }

    #[test]
    fn test_variations_single() {
        assert_eq!(color_variations((100, 100, 100), 1), vec![(100, 100, 100)]);
    }

    #[test]
    fn test_variations_get_darker_toward_base() {
        let base = (200, 40, 40);
        let v = color_variations(base, 3);

        assert_eq!(v.len(), 3);
        // The last variation uses factor 1.0 and equals the base color
        assert_eq!(v[2], base);
        // Earlier variations are lighter
        assert!(v[0].1 > v[2].1);
    }
}
