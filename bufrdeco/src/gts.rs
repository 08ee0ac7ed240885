use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::sync::OnceLock;

/// WMO abbreviated heading `TTAAii CCCC YYGGgg [BBB]` preceding a message on
/// the GTS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GtsHeader {
    pub ttaaii: String,
    pub cccc: String,
    pub yygggg: String,
    pub bbb: Option<String>,
}

fn heading_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"([A-Z]{4}\d{2}) ([A-Z]{4}) (\d{6})(?: ([A-Z]{3}))?").expect("Invalid regex")
    })
}

impl GtsHeader {
    /// Last heading found in the bytes preceding a message.
    pub fn find(preamble: &[u8]) -> Option<Self> {
        let text = String::from_utf8_lossy(preamble);
        let caps = heading_regex().captures_iter(&text).last()?;

        Some(GtsHeader {
            ttaaii: caps[1].to_string(),
            cccc: caps[2].to_string(),
            yygggg: caps[3].to_string(),
            bbb: caps.get(4).map(|m| m.as_str().to_string()),
        })
    }

    /// Data type designator `T1T2`.
    pub fn data_type(&self) -> &str {
        &self.ttaaii[..2]
    }

    pub fn day(&self) -> u8 {
        self.yygggg[0..2].parse().unwrap_or(0)
    }

    pub fn hour(&self) -> u8 {
        self.yygggg[2..4].parse().unwrap_or(0)
    }

    pub fn minute(&self) -> u8 {
        self.yygggg[4..6].parse().unwrap_or(0)
    }
}

impl Display for GtsHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.ttaaii, self.cccc, self.yygggg)?;
        if let Some(bbb) = &self.bbb {
            write!(f, " {}", bbb)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_heading_with_indicator() {
        let preamble = b"\x01\r\r\n123\r\r\nIUSK01 LEMM 151200 RRA\r\r\n";
        let h = GtsHeader::find(preamble).unwrap();
        assert_eq!(h.ttaaii, "IUSK01");
        assert_eq!(h.cccc, "LEMM");
        assert_eq!((h.day(), h.hour(), h.minute()), (15, 12, 0));
        assert_eq!(h.bbb.as_deref(), Some("RRA"));
        assert_eq!(h.data_type(), "IU");
        assert_eq!(h.to_string(), "IUSK01 LEMM 151200 RRA");
    }

    #[test]
    fn takes_the_nearest_heading() {
        let preamble = b"ISMN01 EGRR 010000\r\r\n7777 garbage ISXD03 EDZW 020600\r\n";
        let h = GtsHeader::find(preamble).unwrap();
        assert_eq!(h.to_string(), "ISXD03 EDZW 020600");
        assert!(h.bbb.is_none());
    }

    #[test]
    fn no_heading() {
        assert!(GtsHeader::find(b"").is_none());
        assert!(GtsHeader::find(b"random text 12").is_none());
    }
}
