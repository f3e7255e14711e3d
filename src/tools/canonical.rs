//! Canonical prefix codes (RFC 1951 section 3.2.2).
//!
//! A canonical code is fully determined by the code length of each symbol:
//! shorter codes sort before longer ones, and codes of equal length follow
//! the natural symbol order.  Both ends therefore only ever exchange
//! lengths.  Codewords enter the bit stream most significant bit first;
//! everything else about bit packing is the [`BitBuffer`]'s business.

use crate::tools::bit_buffer::BitBuffer;
use thiserror::Error;

#[derive(Error,Debug,PartialEq)]
pub enum Error {
    #[error("code lengths violate Kraft equality")]
    MalformedCodeLengths,
    #[error("bit stream ended inside a symbol")]
    TruncatedStream
}

/// A symbol's bit pattern.  `num_bits == 0` means the symbol is absent
/// from the block and must never be encoded.
#[derive(Clone,Copy,Debug,PartialEq)]
pub struct Codeword {
    pub num_bits: u32,
    pub bits: u32
}

/// Over the used symbols a complete code satisfies
/// sum of 2^(max_len - len) == 2^max_len exactly; a lone symbol is the
/// special case and must have length 1.
fn validate(lengths: &[u32]) -> Result<usize,Error> {
    let used = lengths.iter().filter(|l| **l > 0).count();
    let max_len = match lengths.iter().max() {
        Some(m) if *m > 0 => *m as usize,
        _ => return Err(Error::MalformedCodeLengths)
    };
    if used == 1 {
        return match max_len {
            1 => Ok(1),
            _ => Err(Error::MalformedCodeLengths)
        };
    }
    let mut sum: u64 = 0;
    for l in lengths {
        if *l > 0 {
            sum += 1u64 << (max_len as u32 - l);
        }
    }
    match sum == 1u64 << max_len {
        true => Ok(max_len),
        false => Err(Error::MalformedCodeLengths)
    }
}

/// first canonical code of each length, per the RFC recurrence
fn first_codes(lengths: &[u32],max_len: usize) -> Vec<u32> {
    let mut bl_count = vec![0u32;max_len+1];
    for l in lengths {
        if *l > 0 {
            bl_count[*l as usize] += 1;
        }
    }
    let mut next_code = vec![0u32;max_len+1];
    let mut code: u32 = 0;
    for k in 1..=max_len {
        code = (code + bl_count[k-1]) << 1;
        next_code[k] = code;
    }
    next_code
}

/// Symbol to codeword table
pub struct CanonicalEncoder {
    codes: Vec<Codeword>
}

impl CanonicalEncoder {
    pub fn from_lengths(lengths: &[u32]) -> Result<Self,Error> {
        let max_len = validate(lengths)?;
        let mut next_code = first_codes(lengths,max_len);
        let mut codes = vec![Codeword { num_bits: 0, bits: 0 };lengths.len()];
        for (sym,l) in lengths.iter().enumerate() {
            if *l > 0 {
                codes[sym] = Codeword { num_bits: *l, bits: next_code[*l as usize] };
                next_code[*l as usize] += 1;
            }
        }
        Ok(Self { codes })
    }
    pub fn codeword(&self,sym: usize) -> Codeword {
        self.codes[sym]
    }
    /// append the symbol's codeword, most significant bit first
    pub fn encode(&self,sym: usize,obuf: &mut BitBuffer) {
        let code = self.codes[sym];
        debug_assert!(code.num_bits > 0,"symbol has no code");
        obuf.push_bits_msb(code.bits,code.num_bits as usize);
    }
}

/// Codeword to symbol table.  Decoding walks the stream one bit at a
/// time; after `len` bits the accumulated code is a hit if it falls
/// inside the canonical range for that length.
pub struct CanonicalDecoder {
    max_len: usize,
    /// number of codes per length
    counts: Vec<u32>,
    /// first canonical code of each length
    first_code: Vec<u32>,
    /// position in `symbols` of each length's first entry
    first_index: Vec<u32>,
    /// symbols ordered by (length, symbol)
    symbols: Vec<u16>
}

impl CanonicalDecoder {
    pub fn from_lengths(lengths: &[u32]) -> Result<Self,Error> {
        let max_len = validate(lengths)?;
        let mut counts = vec![0u32;max_len+1];
        for l in lengths {
            if *l > 0 {
                counts[*l as usize] += 1;
            }
        }
        let first_code = first_codes(lengths,max_len);
        let mut first_index = vec![0u32;max_len+1];
        let mut acc: u32 = 0;
        for k in 1..=max_len {
            first_index[k] = acc;
            acc += counts[k];
        }
        let mut symbols = vec![0u16;acc as usize];
        let mut fill = first_index.clone();
        for (sym,l) in lengths.iter().enumerate() {
            if *l > 0 {
                symbols[fill[*l as usize] as usize] = sym as u16;
                fill[*l as usize] += 1;
            }
        }
        Ok(Self { max_len, counts, first_code, first_index, symbols })
    }
    /// read one codeword from the stream and return its symbol
    pub fn decode(&self,ibuf: &mut BitBuffer) -> Result<u16,Error> {
        let mut code: u32 = 0;
        for len in 1..=self.max_len {
            code = (code << 1) | ibuf.read_bit().ok_or(Error::TruncatedStream)? as u32;
            let offset = code.wrapping_sub(self.first_code[len]);
            if offset < self.counts[len] {
                return Ok(self.symbols[(self.first_index[len] + offset) as usize]);
            }
        }
        // only reachable when a lone length-1 code reads a 1 bit
        Err(Error::MalformedCodeLengths)
    }
}

// *************** TESTS *****************

#[cfg(test)]
mod tests {
    use super::*;

    /// the worked example of RFC 1951 section 3.2.2
    const RFC_LENGTHS: [u32;8] = [3,3,3,3,3,2,4,4];

    #[test]
    fn rfc_worked_example() {
        let enc = CanonicalEncoder::from_lengths(&RFC_LENGTHS).unwrap();
        let expected = [
            (3,0b010),(3,0b011),(3,0b100),(3,0b101),
            (3,0b110),(2,0b00),(4,0b1110),(4,0b1111)
        ];
        for (sym,(num_bits,bits)) in expected.iter().enumerate() {
            assert_eq!(enc.codeword(sym),Codeword { num_bits: *num_bits, bits: *bits });
        }
    }

    #[test]
    fn encode_decode_roundtrip() {
        let enc = CanonicalEncoder::from_lengths(&RFC_LENGTHS).unwrap();
        let dec = CanonicalDecoder::from_lengths(&RFC_LENGTHS).unwrap();
        let message: Vec<usize> = vec![0,5,7,3,5,5,6,1,2,4];
        let mut bits = BitBuffer::new();
        for sym in &message {
            enc.encode(*sym,&mut bits);
        }
        let mut rd = BitBuffer::from_bytes(&bits.to_bytes());
        for sym in &message {
            assert_eq!(dec.decode(&mut rd).unwrap(),*sym as u16);
        }
    }

    #[test]
    fn zero_length_symbols_skipped() {
        // absent symbols take part in the ordering but get no codes
        let enc = CanonicalEncoder::from_lengths(&[0,2,0,2,0,2,2]).unwrap();
        assert_eq!(enc.codeword(0).num_bits,0);
        assert_eq!(enc.codeword(1),Codeword { num_bits: 2, bits: 0b00 });
        assert_eq!(enc.codeword(6),Codeword { num_bits: 2, bits: 0b11 });
    }

    #[test]
    fn lone_symbol() {
        let enc = CanonicalEncoder::from_lengths(&[0,0,1,0]).unwrap();
        assert_eq!(enc.codeword(2),Codeword { num_bits: 1, bits: 0 });
        let dec = CanonicalDecoder::from_lengths(&[0,0,1,0]).unwrap();
        let mut bits = BitBuffer::from_bytes(&[0b0]);
        assert_eq!(dec.decode(&mut bits).unwrap(),2);
        // the other branch of the lone code matches nothing
        let mut bad = BitBuffer::from_bytes(&[0b1]);
        assert_eq!(dec.decode(&mut bad),Err(Error::MalformedCodeLengths));
    }

    #[test]
    fn kraft_violations_rejected() {
        // undersubscribed
        assert_eq!(CanonicalEncoder::from_lengths(&[2,2,2]).err(),Some(Error::MalformedCodeLengths));
        // oversubscribed
        assert_eq!(CanonicalEncoder::from_lengths(&[1,1,1]).err(),Some(Error::MalformedCodeLengths));
        // a lone symbol deeper than 1 bit wastes code space
        assert_eq!(CanonicalDecoder::from_lengths(&[0,3]).err(),Some(Error::MalformedCodeLengths));
        // no symbols at all
        assert_eq!(CanonicalDecoder::from_lengths(&[0,0,0]).err(),Some(Error::MalformedCodeLengths));
    }

    #[test]
    fn truncation_detected() {
        let dec = CanonicalDecoder::from_lengths(&RFC_LENGTHS).unwrap();
        let mut bits = BitBuffer::from_bytes(&[]);
        assert_eq!(dec.decode(&mut bits),Err(Error::TruncatedStream));
        // a lone bit of a 2 bit code is not enough
        let mut short = BitBuffer::new();
        short.push_bit(false);
        assert_eq!(dec.decode(&mut short),Err(Error::TruncatedStream));
    }
}
