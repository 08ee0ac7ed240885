use crate::errors::{Error, Result};
use crate::structs::MAX_DESCRIPTORS;
use nom::{IResult, number::complete::be_u16};
use tablelib::FXY;

pub(super) fn parse_descriptors(input: &[u8]) -> Result<Vec<FXY>> {
    let count = input.len() / 2;
    if count > MAX_DESCRIPTORS {
        return Err(Error::Framing(format!(
            "section 3 lists {} descriptors, at most {} are supported",
            count, MAX_DESCRIPTORS
        )));
    }

    let (_, descriptors) = parse_descriptors_inner(input, count)?;
    Ok(descriptors)
}

fn parse_descriptors_inner(mut input: &[u8], count: usize) -> IResult<&[u8], Vec<FXY>> {
    let mut results = Vec::with_capacity(count);
    for _ in 0..count {
        let (rest, fxy) = take_fxy(input)?;
        results.push(fxy);
        input = rest;
    }

    Ok((input, results))
}

fn take_fxy(input: &[u8]) -> IResult<&[u8], FXY> {
    let (input, word) = be_u16(input)?;
    Ok((input, FXY::from_bytes(word.to_be_bytes())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptors_from_section3_bytes() {
        // Odd trailing byte is section padding.
        let bytes = [0x01, 0x01, 0xC1, 0x0B, 0x81, 0x88, 0x00];
        let d = parse_descriptors(&bytes).unwrap();
        assert_eq!(
            d,
            vec![FXY::new(0, 1, 1), FXY::new(3, 1, 11), FXY::new(2, 1, 136)]
        );
    }

    #[test]
    fn descriptor_list_is_bounded() {
        let bytes = vec![0u8; (MAX_DESCRIPTORS + 1) * 2];
        assert!(matches!(parse_descriptors(&bytes), Err(Error::Framing(_))));
    }
}
