use nom::{IResult, number::complete::be_u8};
use serde::Serialize;

use crate::errors::Result;
use crate::structs::versions::{
    Identification, MessageVersion, Section0, Section2, Section3, Section4, describe_sections,
    full_year, parse_data_sections, parse_section0, section,
};

/// Editions 2 and 3 share the same section 1 layout.
#[derive(Clone, Debug)]
pub struct BUFRMessageV2 {
    pub section0: Section0,
    pub section1: Section1,
    pub section2: Option<Section2>,
    pub section3: Section3,
    pub section4: Section4,
}

impl MessageVersion for BUFRMessageV2 {
    fn parse(input: &[u8]) -> Result<Self> {
        let (input, section0) = parse_section0(input)?;
        let (input, section1) = parse_section1(input)?;
        let (_input, (section2, section3, section4)) =
            parse_data_sections(input, section1.optional_section_present)?;

        Ok(BUFRMessageV2 {
            section0,
            section1,
            section2,
            section3,
            section4,
        })
    }

    fn description(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "BUFR Message (edition {}):", self.section0.edition)?;
        writeln!(f, "Total length: {} bytes", self.section0.total_length)?;
        writeln!(f, "{}", self.section1)?;
        describe_sections(self, f)
    }

    fn section0(&self) -> &Section0 {
        &self.section0
    }

    fn identification(&self) -> Identification {
        let s1 = &self.section1;
        Identification {
            edition: self.section0.edition,
            master_table: s1.master_table,
            centre: s1.centre as u16,
            subcentre: s1.subcentre as u16,
            update_sequence: s1.update_sequence_number,
            has_section2: s1.optional_section_present,
            data_category: s1.data_category,
            data_subcategory: s1.data_subcategory,
            local_subcategory: 0,
            master_version: s1.master_table_version,
            local_version: s1.local_table_version,
            year: full_year(s1.year),
            month: s1.month,
            day: s1.day,
            hour: s1.hour,
            minute: s1.minute,
            second: 0,
        }
    }

    fn section1_length(&self) -> usize {
        self.section1.length
    }

    fn section2(&self) -> Option<&Section2> {
        self.section2.as_ref()
    }

    fn section3(&self) -> &Section3 {
        &self.section3
    }

    fn section4(&self) -> &Section4 {
        &self.section4
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Section1 {
    pub length: usize,
    pub master_table: u8,               // octet 4
    pub subcentre: u8,                  // octet 5
    pub centre: u8,                     // octet 6
    pub update_sequence_number: u8,     // octet 7
    pub optional_section_present: bool, // octet 8 bit1 (MSB)
    pub data_category: u8,              // octet 9
    pub data_subcategory: u8,           // octet 10
    pub master_table_version: u8,       // octet 11
    pub local_table_version: u8,        // octet 12
    pub year: u8,                       // octet 13 (year of century)
    pub month: u8,                      // octet 14
    pub day: u8,                        // octet 15
    pub hour: u8,                       // octet 16
    pub minute: u8,                     // octet 17
    pub local_use: Vec<u8>,             // octet 18-
}

fn parse_section1(input: &[u8]) -> IResult<&[u8], Section1> {
    const FIXED_LEN: usize = 17;
    let (input, (length, body)) = section(FIXED_LEN)(input)?;

    let (body, master_table) = be_u8(body)?;
    let (body, subcentre) = be_u8(body)?;
    let (body, centre) = be_u8(body)?;
    let (body, update_sequence_number) = be_u8(body)?;
    let (body, optional_section_flag) = be_u8(body)?;
    let optional_section_present = (optional_section_flag & 0x80) != 0;

    let (body, data_category) = be_u8(body)?;
    let (body, data_subcategory) = be_u8(body)?;
    let (body, master_table_version) = be_u8(body)?;
    let (body, local_table_version) = be_u8(body)?;
    let (body, year) = be_u8(body)?;
    let (body, month) = be_u8(body)?;
    let (body, day) = be_u8(body)?;
    let (body, hour) = be_u8(body)?;
    let (local_use, minute) = be_u8(body)?;

    Ok((
        input,
        Section1 {
            length,
            master_table,
            subcentre,
            centre,
            update_sequence_number,
            optional_section_present,
            data_category,
            data_subcategory,
            master_table_version,
            local_table_version,
            year,
            month,
            day,
            hour,
            minute,
            local_use: local_use.to_vec(),
        },
    ))
}

impl std::fmt::Display for Section1 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Section 1 (editions 2/3):")?;
        writeln!(f, "  Length: {} bytes", self.length)?;
        writeln!(f)?;
        writeln!(f, "  Organization:")?;
        writeln!(
            f,
            "    Centre:              {:<5} (0x{:02X})",
            self.centre, self.centre
        )?;
        writeln!(
            f,
            "    Sub-centre:          {:<5} (0x{:02X})",
            self.subcentre, self.subcentre
        )?;
        writeln!(
            f,
            "    Update Sequence:     {}",
            self.update_sequence_number
        )?;
        writeln!(f)?;
        writeln!(f, "  Data Classification:")?;
        writeln!(f, "    Category:            {}", self.data_category)?;
        writeln!(f, "    Sub-category:        {}", self.data_subcategory)?;
        writeln!(f)?;
        writeln!(f, "  Table Versions:")?;
        writeln!(
            f,
            "    Master Table:        {} (v{})",
            self.master_table, self.master_table_version
        )?;
        writeln!(f, "    Local Table:         v{}", self.local_table_version)?;
        writeln!(f)?;
        writeln!(f, "  Observation Time:")?;
        writeln!(
            f,
            "    DateTime:            {:04}-{:02}-{:02} {:02}:{:02}:00 UTC",
            full_year(self.year),
            self.month,
            self.day,
            self.hour,
            self.minute
        )?;
        writeln!(f)?;
        writeln!(f, "  Optional Data:")?;
        write!(
            f,
            "    Section 2 Present:   {}",
            if self.optional_section_present {
                "Yes"
            } else {
                "No"
            }
        )
    }
}
