//! ANSI colors for terminal output.

use std::fmt;

use log::Level;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    DarkGray,
}

impl Color {
    fn fg(self) -> u8 {
        match self {
            Self::Red => 31,
            Self::Green => 32,
            Self::Yellow => 33,
            Self::Blue => 34,
            Self::Magenta => 35,
            Self::DarkGray => 90,
        }
    }
}

/// Color and fixed-width tag used for each log level.
///
/// Error reports are painted with the [`Level::Error`] color.
pub fn level_style(level: Level) -> (Color, &'static str) {
    match level {
        Level::Trace => (Color::Magenta, "TRACE"),
        Level::Debug => (Color::Blue, "DEBUG"),
        Level::Info => (Color::Green, " INFO"),
        Level::Warn => (Color::Yellow, " WARN"),
        Level::Error => (Color::Red, "ERROR"),
    }
}

/// Displays `T` in bold, in the given foreground color.
pub struct Painted<T>(Color, T);

impl<T> Painted<T> {
    pub fn new(color: Color, value: T) -> Self {
        Self(color, value)
    }
}

impl<T> fmt::Display for Painted<T>
where
    T: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fg = self.0.fg();
        let value = &self.1;
        write!(f, "\x1B[{fg};1m{value}\x1B[0m")
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_painted_wraps_in_escape_codes() {
        assert_eq!(
            Painted::new(Color::DarkGray, "at").to_string(),
            "\x1B[90;1mat\x1B[0m"
        );
    }

    #[test]
    fn test_level_tags_share_width() {
        for level in [
            Level::Trace,
            Level::Debug,
            Level::Info,
            Level::Warn,
            Level::Error,
        ] {
            assert_eq!(level_style(level).1.len(), 5);
        }
        assert_eq!(level_style(Level::Error).0, Color::Red);
    }
}
