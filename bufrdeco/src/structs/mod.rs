use nom::{
    IResult,
    bytes::complete::take,
    error::{Error, ErrorKind},
    number::complete::be_u24,
};
pub(super) mod tools;
pub mod versions;

/// Upper bound on the unexpanded descriptors of section 3.
pub const MAX_DESCRIPTORS: usize = 512;

#[inline]
pub fn skip(n: usize) -> impl Fn(&[u8]) -> IResult<&[u8], ()> {
    move |input: &[u8]| {
        let (input, _) = take(n)(input)?;
        Ok((input, ()))
    }
}

#[inline]
pub fn skip1(input: &[u8]) -> IResult<&[u8], ()> {
    skip(1)(input)
}

/// Split off one length-prefixed section, returning its declared length and
/// the bytes after the 3-byte length. Sections shorter than `min` are rejected.
#[inline]
pub fn section(min: usize) -> impl Fn(&[u8]) -> IResult<&[u8], (usize, &[u8])> {
    move |input: &[u8]| {
        let (rest, length) = be_u24(input)?;
        let length = length as usize;
        if length < min.max(3) {
            return Err(nom::Err::Error(Error::new(input, ErrorKind::LengthValue)));
        }
        let (rest, body) = take(length - 3)(rest)?;
        Ok((rest, (length, body)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_slices_by_length() {
        let input = [0, 0, 5, 0xAA, 0xBB, 0xCC];
        let (rest, (length, body)) = section(4)(&input).unwrap();
        assert_eq!(length, 5);
        assert_eq!(body, &[0xAA, 0xBB]);
        assert_eq!(rest, &[0xCC]);

        assert!(section(6)(&input).is_err());
        assert!(section(4)(&[0, 0, 9, 1]).is_err());
    }
}
