//! Pin identifiers.
//!
//! A pin is a single byte: bits `[7:5]` select the port (0 = PB through
//! 6 = PH) and bits `[4:0]` select the line within that port.
//!
//! ```text
//! 011 00110  ->  port 3 (PE), line 6
//! ```
//!
//! [`Pin::new`] and [`Pin::from_raw`] accept any value, exactly like the
//! hardware does: a line index past the end of its port addresses bits that
//! the manual leaves undefined. [`Pin::checked`] and the [`FromStr`]
//! implementation are the opt-in validating constructors.

use core::fmt;
use core::str::FromStr;

/// Number of ports reachable through the port table (PB..=PH).
pub const PORT_COUNT: u8 = 7;

/// Number of implemented lines per port, indexed by port (manual, p. 376).
pub const LINES_PER_PORT: [u8; PORT_COUNT as usize] = [10, 17, 25, 18, 7, 14, 12];

const PORT_SHIFT: u8 = 5;
const LINE_MASK: u8 = 0b0001_1111;

/// Packed port/line identifier of a GPIO line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pin(u8);

impl Pin {
    /// Pack `port` and `line` without range checks.
    ///
    /// Only the low 3 bits of `port` and the low 5 bits of `line` are kept.
    #[inline]
    pub const fn new(port: u8, line: u8) -> Self {
        Self(((port & 0b111) << PORT_SHIFT) | (line & LINE_MASK))
    }

    /// Pack `port` and `line`, rejecting lines the port does not implement.
    pub fn checked(port: u8, line: u8) -> Result<Self, PinError> {
        let lines = *LINES_PER_PORT
            .get(usize::from(port))
            .ok_or(PinError::NoSuchPort(port))?;
        if line >= lines {
            return Err(PinError::NoSuchLine { port, line });
        }
        Ok(Self::new(port, line))
    }

    /// Reinterpret a raw identifier byte.
    #[inline]
    pub const fn from_raw(raw: u8) -> Self {
        Self(raw)
    }

    /// The raw identifier byte.
    #[inline]
    pub const fn raw(self) -> u8 {
        self.0
    }

    /// Port index, 0 (PB) through 7.
    #[inline]
    pub const fn port(self) -> u8 {
        self.0 >> PORT_SHIFT
    }

    /// Line index within the port, 0 through 31.
    #[inline]
    pub const fn line(self) -> u8 {
        self.0 & LINE_MASK
    }

    /// Port letter as printed in the manual (`'B'` for port 0).
    #[inline]
    pub const fn port_letter(self) -> char {
        (b'B' + self.port()) as char
    }
}

impl From<u8> for Pin {
    fn from(raw: u8) -> Self {
        Self::from_raw(raw)
    }
}

impl From<Pin> for u8 {
    fn from(pin: Pin) -> Self {
        pin.raw()
    }
}

impl fmt::Display for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}{}", self.port_letter(), self.line())
    }
}

/// Parses names such as `PC10` or `pe6`.
impl FromStr for Pin {
    type Err = PinError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        if bytes.len() < 3 || !bytes[0].eq_ignore_ascii_case(&b'P') {
            return Err(PinError::Malformed);
        }
        let letter = bytes[1].to_ascii_uppercase();
        if !(b'B'..b'B' + PORT_COUNT).contains(&letter) {
            return Err(PinError::Malformed);
        }
        // Plain decimal only: no sign, no leading zero.
        let digits = &s[2..];
        let leading_zero = digits.len() > 1 && digits.starts_with('0');
        if leading_zero || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PinError::Malformed);
        }
        let line = digits.parse::<u8>().map_err(|_| PinError::Malformed)?;
        Self::checked(letter - b'B', line)
    }
}

/// Rejection reasons of the validating constructors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinError {
    /// Port index outside PB..=PH.
    NoSuchPort(u8),
    /// Line index not implemented by the port.
    NoSuchLine { port: u8, line: u8 },
    /// Name is not of the form `P<letter><line>`.
    Malformed,
}

impl fmt::Display for PinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PinError::NoSuchPort(port) => write!(f, "no port with index {}", port),
            PinError::NoSuchLine { port, line } => match LINES_PER_PORT.get(usize::from(*port)) {
                Some(lines) => write!(
                    f,
                    "port P{} has {} lines, line {} does not exist",
                    char::from(b'B' + port),
                    lines,
                    line
                ),
                None => write!(f, "no port with index {} (line {})", port, line),
            },
            PinError::Malformed => write!(f, "expected a pin name like PC10"),
        }
    }
}

impl std::error::Error for PinError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_port_and_line() {
        let pin = Pin::new(3, 6);
        assert_eq!(pin.raw(), 0b011_00110);
        assert_eq!(pin.port(), 3);
        assert_eq!(pin.line(), 6);
        assert_eq!(pin.to_string(), "PE6");
    }

    #[test]
    fn unchecked_constructor_keeps_field_widths() {
        let pin = Pin::new(0xff, 0xff);
        assert_eq!(pin.port(), 7);
        assert_eq!(pin.line(), 31);
    }

    #[test]
    fn checked_constructor_follows_line_table() {
        assert!(Pin::checked(0, 9).is_ok());
        assert_eq!(
            Pin::checked(0, 10),
            Err(PinError::NoSuchLine { port: 0, line: 10 })
        );
        assert!(Pin::checked(2, 24).is_ok());
        assert_eq!(Pin::checked(7, 0), Err(PinError::NoSuchPort(7)));
    }

    #[test]
    fn parses_names() {
        assert_eq!("PC10".parse::<Pin>(), Ok(Pin::from_raw(0b001_01010)));
        assert_eq!("pc11".parse::<Pin>(), Ok(Pin::from_raw(0b001_01011)));
        assert_eq!("PH11".parse::<Pin>(), Ok(Pin::new(6, 11)));
        assert_eq!("PA1".parse::<Pin>(), Err(PinError::Malformed));
        assert_eq!("PC".parse::<Pin>(), Err(PinError::Malformed));
        assert_eq!("PCx".parse::<Pin>(), Err(PinError::Malformed));
        assert_eq!("PC+5".parse::<Pin>(), Err(PinError::Malformed));
        assert_eq!("PC05".parse::<Pin>(), Err(PinError::Malformed));
        assert_eq!("PC0".parse::<Pin>(), Ok(Pin::new(1, 0)));
        assert_eq!(
            "PF7".parse::<Pin>(),
            Err(PinError::NoSuchLine { port: 4, line: 7 })
        );
    }

    #[test]
    fn display_round_trips_through_parse() {
        for (port, &lines) in LINES_PER_PORT.iter().enumerate() {
            for line in 0..lines {
                let pin = Pin::new(port as u8, line);
                assert_eq!(pin.to_string().parse::<Pin>(), Ok(pin));
            }
        }
    }

    #[test]
    fn errors_format_for_any_field_values() {
        assert_eq!(
            PinError::NoSuchLine { port: 4, line: 7 }.to_string(),
            "port PF has 7 lines, line 7 does not exist"
        );
        assert_eq!(
            PinError::NoSuchLine { port: 7, line: 0 }.to_string(),
            "no port with index 7 (line 0)"
        );
        assert_eq!(
            PinError::NoSuchLine { port: 200, line: 9 }.to_string(),
            "no port with index 200 (line 9)"
        );
    }
}
