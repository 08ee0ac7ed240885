pub mod v2;
pub mod v4;

pub(super) use super::{section, skip1};
use crate::errors::{Error, Result};
use crate::structs::tools::parse_descriptors;
use nom::{
    IResult,
    bytes::complete::tag,
    number::complete::{be_u8, be_u16, be_u24},
};
use serde::{Deserialize, Serialize};
use tablelib::{FXY, TableInfo};

macro_rules! message {
    ($(($version:ident, $t: ty, $v: pat)),+$(,)?) => {
        #[derive(Clone, Debug)]
        pub enum BUFRMessage {
            $(
                $version($t),
            )+
        }

        impl MessageVersion for BUFRMessage {
            fn parse(input: &[u8]) -> Result<Self> {
                let total = check_framing(input)?;
                let input = &input[..total];
                let (_, section0) = parse_section0(input)?;
                match section0.edition {
                    $(
                        $v => {
                            let msg = <$t as MessageVersion>::parse(input)?;
                            Ok(BUFRMessage::$version(msg))
                        }
                    )+
                    _ => Err(Error::UnsupportedVersion(section0.edition)),
                }
            }

            fn description(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(
                        BUFRMessage::$version(msg) => msg.description(f),
                    )+
                }
            }

            fn section0(&self) -> &Section0 {
                match self {
                    $(
                        BUFRMessage::$version(msg) => msg.section0(),
                    )+
                }
            }

            fn identification(&self) -> Identification {
                match self {
                    $(
                        BUFRMessage::$version(msg) => msg.identification(),
                    )+
                }
            }

            fn section2(&self) -> Option<&Section2> {
                match self {
                    $(
                        BUFRMessage::$version(msg) => msg.section2(),
                    )+
                }
            }

            fn section3(&self) -> &Section3 {
                match self {
                    $(
                        BUFRMessage::$version(msg) => msg.section3(),
                    )+
                }
            }

            fn section4(&self) -> &Section4 {
                match self {
                    $(
                        BUFRMessage::$version(msg) => msg.section4(),
                    )+
                }
            }

            fn section1_length(&self) -> usize {
                match self {
                    $(
                        BUFRMessage::$version(msg) => msg.section1_length(),
                    )+
                }
            }
        }
    };
}

message!((V2, v2::BUFRMessageV2, 2 | 3), (V4, v4::BUFRMessageV4, 4));

impl BUFRMessage {
    pub fn version(&self) -> u8 {
        self.section0().edition
    }
}

impl std::fmt::Display for BUFRMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.description(f)
    }
}

pub trait MessageVersion: Sized {
    fn parse(input: &[u8]) -> Result<Self>;

    fn description(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result;

    fn section0(&self) -> &Section0;

    fn identification(&self) -> Identification;

    fn section1_length(&self) -> usize;

    fn section2(&self) -> Option<&Section2>;

    fn section3(&self) -> &Section3;

    fn section4(&self) -> &Section4;

    fn table_info(&self) -> TableInfo {
        self.identification().table_info()
    }

    fn subsets_count(&self) -> u16 {
        self.section3().number_of_subsets
    }

    fn is_compressed(&self) -> bool {
        self.section3().is_compressed
    }

    fn is_observation(&self) -> bool {
        self.section3().is_observation
    }

    fn ndescs(&self) -> usize {
        self.section3().data.len() / 2
    }

    fn descriptors(&self) -> Result<Vec<FXY>> {
        parse_descriptors(&self.section3().data)
    }

    fn data_block(&self) -> &[u8] {
        &self.section4().data
    }

    /// Sum of the section lengths, to compare with the declared total.
    fn encoded_length(&self) -> usize {
        8 + self.section1_length()
            + self.section2().map(|s| s.length).unwrap_or(0)
            + self.section3().length
            + self.section4().length
            + 4
    }
}

/// Section 1 fields, normalised across editions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identification {
    pub edition: u8,
    pub master_table: u8,
    pub centre: u16,
    pub subcentre: u16,
    pub update_sequence: u8,
    pub has_section2: bool,
    pub data_category: u8,
    pub data_subcategory: u8,
    pub local_subcategory: u8,
    pub master_version: u8,
    pub local_version: u8,
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl Identification {
    pub fn table_info(&self) -> TableInfo {
        TableInfo {
            master_table: self.master_table,
            centre: self.centre,
            subcentre: self.subcentre,
            master_version: self.master_version,
            local_version: self.local_version,
        }
    }

    /// Date and time fields outside their calendar range.
    pub fn implausible_fields(&self) -> Vec<String> {
        let checks = [
            ("month", self.month as u32, 1, 12),
            ("day", self.day as u32, 1, 31),
            ("hour", self.hour as u32, 0, 23),
            ("minute", self.minute as u32, 0, 59),
            ("second", self.second as u32, 0, 59),
        ];

        checks
            .iter()
            .filter(|(_, v, lo, hi)| v < lo || v > hi)
            .map(|(name, v, lo, hi)| {
                format!("section 1 {} is {}, expected {}..={}", name, v, lo, hi)
            })
            .collect()
    }
}

/// Expand a year of century as written by editions 2 and 3.
pub fn full_year(year_of_century: u8) -> u16 {
    match year_of_century {
        100 => 2000,
        y if y > 70 => 1900 + y as u16,
        y => 2000 + y as u16,
    }
}

/// Check the envelope of a message before any section is parsed, returning
/// the declared total length.
pub fn check_framing(input: &[u8]) -> Result<usize> {
    if input.len() < 8 {
        return Err(Error::Framing(format!(
            "{} bytes is too short for a BUFR message",
            input.len()
        )));
    }
    if &input[..4] != b"BUFR" {
        return Err(Error::Framing("missing leading BUFR".to_string()));
    }

    let edition = input[7];
    if !(2..=4).contains(&edition) {
        return Err(Error::UnsupportedVersion(edition));
    }

    let total = u32::from_be_bytes([0, input[4], input[5], input[6]]) as usize;
    if total > input.len() {
        return Err(Error::Framing(format!(
            "declared length {} exceeds the {} bytes available",
            total,
            input.len()
        )));
    }
    if total < 12 || !input[..total].ends_with(b"7777") {
        return Err(Error::Framing("missing trailing 7777".to_string()));
    }

    Ok(total)
}

#[derive(Clone, Debug, Serialize)]
pub struct Section0 {
    pub total_length: u32,
    pub edition: u8,
}

pub(super) fn parse_section0(input: &[u8]) -> IResult<&[u8], Section0> {
    let (input, _) = tag("BUFR")(input)?;
    let (input, total_length) = be_u24(input)?;
    let (input, edition) = be_u8(input)?;
    Ok((
        input,
        Section0 {
            total_length,
            edition,
        },
    ))
}

#[derive(Clone, Debug)]
pub struct Section2 {
    pub length: usize,
    pub data: Vec<u8>,
}

pub(super) fn parse_section2(input: &[u8]) -> IResult<&[u8], Section2> {
    let (input, (length, body)) = section(4)(input)?;
    let (data, _) = skip1(body)?;
    Ok((
        input,
        Section2 {
            length,
            data: data.to_vec(),
        },
    ))
}

#[derive(Clone, Debug)]
pub struct Section3 {
    pub length: usize,
    pub number_of_subsets: u16,
    pub is_observation: bool,
    pub is_compressed: bool,
    pub data: Vec<u8>,
}

pub(super) fn parse_section3(input: &[u8]) -> IResult<&[u8], Section3> {
    let (input, (length, body)) = section(7)(input)?;
    let (body, _) = skip1(body)?;
    let (body, number_of_subsets) = be_u16(body)?;
    let (data, flags) = be_u8(body)?;
    Ok((
        input,
        Section3 {
            length,
            number_of_subsets,
            is_observation: (flags & 0b1000_0000) != 0,
            is_compressed: (flags & 0b0100_0000) != 0,
            data: data.to_vec(),
        },
    ))
}

#[derive(Clone, Debug)]
pub struct Section4 {
    pub length: usize,
    pub data: Vec<u8>,
}

pub(super) fn parse_section4(input: &[u8]) -> IResult<&[u8], Section4> {
    let (input, (length, body)) = section(4)(input)?;
    let (data, _) = skip1(body)?;
    Ok((
        input,
        Section4 {
            length,
            data: data.to_vec(),
        },
    ))
}

pub struct Section5;

pub(super) fn parse_section5(input: &[u8]) -> IResult<&[u8], Section5> {
    let (input, _) = tag("7777")(input)?;
    Ok((input, Section5 {}))
}

/// Shared tail of every edition: sections 2 to 5.
pub(super) fn parse_data_sections(
    input: &[u8],
    has_section2: bool,
) -> IResult<&[u8], (Option<Section2>, Section3, Section4)> {
    let (input, section2) = if has_section2 {
        let (input, sec2) = parse_section2(input)?;
        (input, Some(sec2))
    } else {
        (input, None)
    };
    let (input, section3) = parse_section3(input)?;
    let (input, section4) = parse_section4(input)?;
    let (input, _section5) = parse_section5(input)?;
    Ok((input, (section2, section3, section4)))
}

pub(super) fn describe_sections<M: MessageVersion>(
    msg: &M,
    f: &mut std::fmt::Formatter<'_>,
) -> std::fmt::Result {
    let s3 = msg.section3();
    writeln!(f, "Section 2 length:    {}", msg.section2().map(|s| s.length).unwrap_or(0))?;
    writeln!(f, "Section 3:")?;
    writeln!(f, "  Length: {} bytes", s3.length)?;
    writeln!(f, "  Subsets:             {}", s3.number_of_subsets)?;
    writeln!(f, "  Observed data:       {}", s3.is_observation)?;
    writeln!(f, "  Compressed:          {}", s3.is_compressed)?;
    writeln!(f, "  Descriptors:         {}", msg.ndescs())?;
    write!(f, "Section 4 length:    {}", msg.section4().length)
}
