//! TeX lengths used by spaces and kerns

use std::fmt;

/// Unit of a TeX length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthUnit {
    Pt,
    Bp,
    Pc,
    Mm,
    Cm,
    In,
    Em,
    Ex,
    Mu,
}

impl LengthUnit {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "pt" => LengthUnit::Pt,
            "bp" => LengthUnit::Bp,
            "pc" => LengthUnit::Pc,
            "mm" => LengthUnit::Mm,
            "cm" => LengthUnit::Cm,
            "in" => LengthUnit::In,
            "em" => LengthUnit::Em,
            "ex" => LengthUnit::Ex,
            "mu" => LengthUnit::Mu,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LengthUnit::Pt => "pt",
            LengthUnit::Bp => "bp",
            LengthUnit::Pc => "pc",
            LengthUnit::Mm => "mm",
            LengthUnit::Cm => "cm",
            LengthUnit::In => "in",
            LengthUnit::Em => "em",
            LengthUnit::Ex => "ex",
            LengthUnit::Mu => "mu",
        }
    }
}

/// A signed length such as `-1.5em`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Length {
    pub value: f32,
    pub unit: LengthUnit,
}

impl Length {
    pub fn new(value: f32, unit: LengthUnit) -> Self {
        Self { value, unit }
    }

    /// Parse `<number><unit>`, allowing spaces between the two
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let split = text
            .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+'))
            .unwrap_or(text.len());
        let (number, unit) = text.split_at(split);
        let value: f32 = number.parse().ok()?;
        let unit = LengthUnit::from_name(unit.trim())?;
        Some(Self { value, unit })
    }

    /// Convert to screen units given the current em size
    pub fn to_pixels(&self, em: f32) -> f32 {
        let pt = em / 10.0;
        match self.unit {
            LengthUnit::Pt => self.value * pt,
            LengthUnit::Bp => self.value * pt * 1.00375,
            LengthUnit::Pc => self.value * pt * 12.0,
            LengthUnit::Mm => self.value * pt * 2.845,
            LengthUnit::Cm => self.value * pt * 28.45,
            LengthUnit::In => self.value * pt * 72.27,
            LengthUnit::Em => self.value * em,
            LengthUnit::Ex => self.value * em * 0.45,
            LengthUnit::Mu => self.value * em / 18.0,
        }
    }
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_length() {
        assert_eq!(Length::parse("1.5em"), Some(Length::new(1.5, LengthUnit::Em)));
        assert_eq!(Length::parse("-3 mu"), Some(Length::new(-3.0, LengthUnit::Mu)));
        assert_eq!(Length::parse("2"), None);
        assert_eq!(Length::parse("em"), None);
        assert_eq!(Length::parse("1furlong"), None);
    }

    #[test]
    fn test_display_round_trip() {
        let len = Length::new(2.0, LengthUnit::Pt);
        assert_eq!(len.to_string(), "2pt");
        assert_eq!(Length::parse(&len.to_string()), Some(len));
    }

    #[test]
    fn test_em_conversion() {
        let len = Length::new(2.0, LengthUnit::Em);
        assert_eq!(len.to_pixels(10.0), 20.0);
    }
}
