use crate::flight::CabinClass;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

/// A seat code like `15C`: one or two row digits and a column letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeatCode {
    pub row: u8,
    pub column: char,
}

impl FromStr for SeatCode {
    type Err = SeatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_ascii_uppercase();
        let malformed = || SeatError::Malformed(s.to_string());

        let column = code.chars().last().ok_or_else(malformed)?;
        if !column.is_ascii_uppercase() {
            return Err(malformed());
        }
        let digits = &code[..code.len() - 1];
        if digits.is_empty() || digits.len() > 2 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        let row: u8 = digits.parse().map_err(|_| malformed())?;
        if row == 0 {
            return Err(malformed());
        }
        Ok(SeatCode { row, column })
    }
}

impl fmt::Display for SeatCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.row, self.column)
    }
}

/// Row range and column letters of one cabin.
#[derive(Debug, Clone)]
pub struct CabinLayout {
    pub rows: RangeInclusive<u8>,
    pub columns: &'static [char],
}

impl CabinLayout {
    pub fn contains(&self, seat: &SeatCode) -> bool {
        self.rows.contains(&seat.row) && self.columns.contains(&seat.column)
    }
}

impl CabinClass {
    pub fn layout(&self) -> CabinLayout {
        match self {
            CabinClass::First => CabinLayout { rows: 1..=4, columns: &['A', 'B'] },
            CabinClass::Business => CabinLayout { rows: 5..=10, columns: &['A', 'B', 'D', 'E'] },
            CabinClass::Economy => CabinLayout { rows: 11..=30, columns: &['A', 'B', 'C', 'D', 'E', 'F'] },
        }
    }

    /// Parse `code` and check it lies inside this cabin.
    pub fn validate_seat(&self, code: &str) -> Result<SeatCode, SeatError> {
        let seat: SeatCode = code.parse()?;
        if !self.layout().contains(&seat) {
            return Err(SeatError::CabinMismatch { seat: seat.to_string(), cabin: *self });
        }
        Ok(seat)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SeatError {
    #[error("Malformed seat code: {0:?}")]
    Malformed(String),

    #[error("Seat {seat} is not in the {cabin} cabin")]
    CabinMismatch { seat: String, cabin: CabinClass },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_seat_codes() {
        assert_eq!("15C".parse::<SeatCode>().unwrap(), SeatCode { row: 15, column: 'C' });
        assert_eq!(" 3a ".parse::<SeatCode>().unwrap(), SeatCode { row: 3, column: 'A' });
        for bad in ["", "C", "123A", "A1", "0A", "12", "1-A", "1AB"] {
            assert!(bad.parse::<SeatCode>().is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_cabin_ranges() {
        assert!(CabinClass::Economy.validate_seat("15C").is_ok());
        assert!(CabinClass::First.validate_seat("3A").is_ok());
        assert!(CabinClass::Business.validate_seat("10E").is_ok());

        assert_eq!(
            CabinClass::Economy.validate_seat("3C").unwrap_err(),
            SeatError::CabinMismatch { seat: "3C".to_string(), cabin: CabinClass::Economy }
        );
        // C is not a business column
        assert!(CabinClass::Business.validate_seat("6C").is_err());
        assert!(CabinClass::Economy.validate_seat("31A").is_err());
    }
}
