use serde::{Deserialize, Serialize};

/// Color palette selected by a `[THEME: ...]` directive in generated
/// slide content. Unknown names fall back to `Default`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Theme {
    XanhDuong,
    XanhLa,
    Cam,
    Tim,
    Default,
}

/// Hex colors (no leading '#') consumed by slide rendering and deck
/// export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Palette {
    pub slide_bg: &'static str,
    pub title: &'static str,
    pub text: &'static str,
    pub highlight: &'static str,
}

impl Theme {
    /// Resolve a directive name. Matching is exact on the trimmed
    /// Vietnamese name; anything else is the default palette.
    pub fn parse(name: &str) -> Theme {
        match name.trim() {
            "Xanh Dương" => Theme::XanhDuong,
            "Xanh Lá" => Theme::XanhLa,
            "Cam" => Theme::Cam,
            "Tím" => Theme::Tim,
            _ => Theme::Default,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Theme::XanhDuong => "Xanh Dương",
            Theme::XanhLa => "Xanh Lá",
            Theme::Cam => "Cam",
            Theme::Tim => "Tím",
            Theme::Default => "Default",
        }
    }

    pub fn palette(&self) -> Palette {
        match self {
            Theme::XanhDuong => Palette {
                slide_bg: "F0F9FF",
                title: "1E40AF",
                text: "334155",
                highlight: "2563EB",
            },
            Theme::XanhLa => Palette {
                slide_bg: "F0FDF4",
                title: "166534",
                text: "334155",
                highlight: "16A34A",
            },
            Theme::Cam => Palette {
                slide_bg: "FFF7ED",
                title: "9A3412",
                text: "334155",
                highlight: "EA580C",
            },
            Theme::Tim => Palette {
                slide_bg: "FBF5FF",
                title: "6B21A8",
                text: "334155",
                highlight: "9333EA",
            },
            Theme::Default => Palette {
                slide_bg: "F8FAFC",
                title: "1D4ED8",
                text: "334155",
                highlight: "2563EB",
            },
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Theme::Default
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_names_resolve() {
        assert_eq!(Theme::parse("Xanh Lá"), Theme::XanhLa);
        assert_eq!(Theme::parse("  Cam "), Theme::Cam);
    }

    #[test]
    fn unknown_name_is_default() {
        assert_eq!(Theme::parse("Hồng"), Theme::Default);
        assert_eq!(Theme::parse(""), Theme::Default);
    }
}
