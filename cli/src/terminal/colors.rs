use colored::Color;

pub const PRIMARY: Color = Color::TrueColor { r: 120, g: 220, b: 140 };
pub const ACCENT: Color = Color::TrueColor { r: 240, g: 200, b: 90 };
pub const SEPARATOR: Color = Color::BrightBlack;
pub const TEXT_DEFAULT: Color = Color::White;

pub const HOSTNAME: Color = Color::TrueColor { r: 130, g: 190, b: 255 };
pub const IPV4_ADDR: Color = Color::TrueColor { r: 170, g: 140, b: 250 };
pub const IPV6_ADDR: Color = Color::TrueColor { r: 200, g: 150, b: 230 };
pub const CNAME: Color = Color::Cyan;
pub const SOURCE: Color = Color::TrueColor { r: 150, g: 150, b: 150 };

pub const STATUS_OK: Color = Color::Green;
pub const STATUS_REDIRECT: Color = Color::Yellow;
pub const STATUS_ERROR: Color = Color::Red;

pub fn for_status(status: u16) -> Color {
    match status {
        200..=299 => STATUS_OK,
        300..=399 => STATUS_REDIRECT,
        _ => STATUS_ERROR,
    }
}
