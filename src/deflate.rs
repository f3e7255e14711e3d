//! DEFLATE Compression (RFC 1951)
//!
//! The pipeline has three stages.  The match finder turns input bytes into
//! literal and back-reference tokens over a 32K sliding window.  Per block,
//! code lengths for the literal/length and distance alphabets are assigned
//! by boundary package-merge, which keeps every code inside the format's
//! depth limits while staying optimal.  The canonical coder then emits the
//! tokens bit-exactly per the RFC.
//!
//! Every block is also costed as a stored and as a fixed-code block, and the
//! cheapest rendition is written, so output never balloons on incompressible
//! data.  Expansion accepts any conforming stream, not just our own.

use std::io::{Cursor,Read,Write,Seek,SeekFrom,BufReader,BufWriter};
use num_derive::FromPrimitive;
use num_traits::FromPrimitive as _;
use crate::{DYNERR,STDRESULT};
use crate::tools::bit_buffer::BitBuffer;
use crate::tools::canonical::{self,CanonicalEncoder,CanonicalDecoder};
use crate::tools::match_finder::{MatchFinder,Token,WIN_SIZE};
use crate::tools::package_merge::package_merge_any;
use crate::tools::ring_buffer::RingBuffer;

/// size of the literal/length alphabet in dynamic blocks
const LITLEN_SYMBOLS: usize = 286;
const DIST_SYMBOLS: usize = 30;
const CODELEN_SYMBOLS: usize = 19;
const END_OF_BLOCK: usize = 256;
/// depth limits imposed by the block format
const MAX_CODE_BITS: usize = 15;
const MAX_CODELEN_BITS: usize = 7;
/// tokens per block before the code tables are rebuilt
const BLOCK_TOKENS: usize = 65535;
/// payload bytes per stored block
const STORED_MAX: usize = 65535;
/// chain depths for levels 1 through 9
const CHAIN_DEPTH: [usize;9] = [4,8,16,32,48,64,128,256,1024];

/// first match length of each length symbol (257 onward)
const LENGTH_BASE: [u16;29] = [
    3,4,5,6,7,8,9,10,11,13,15,17,19,23,27,31,35,43,51,59,
    67,83,99,115,131,163,195,227,258
];
const LENGTH_EXTRA: [u8;29] = [
    0,0,0,0,0,0,0,0,1,1,1,1,2,2,2,2,3,3,3,3,
    4,4,4,4,5,5,5,5,0
];
/// first distance of each distance symbol
const DIST_BASE: [u16;30] = [
    1,2,3,4,5,7,9,13,17,25,33,49,65,97,129,193,257,385,513,769,
    1025,1537,2049,3073,4097,6145,8193,12289,16385,24577
];
const DIST_EXTRA: [u8;30] = [
    0,0,0,0,1,1,2,2,3,3,4,4,5,5,6,6,7,7,8,8,
    9,9,10,10,11,11,12,12,13,13
];
/// transmission order of the code length alphabet
const CODELEN_ORDER: [usize;19] = [16,17,18,0,8,7,9,6,10,5,11,4,12,3,13,2,14,1,15];

/// BTYPE field of the block header; 11 is reserved
#[derive(FromPrimitive,Clone,Copy,Debug,PartialEq)]
enum BlockType {
    Stored = 0,
    Fixed = 1,
    Dynamic = 2
}

/// Stream errors raised during expansion
#[derive(thiserror::Error,Debug,PartialEq)]
pub enum Error {
    #[error("bit stream ended inside a block")]
    TruncatedStream,
    #[error("reserved block type")]
    InvalidBlockType,
    #[error("stored block length check failed")]
    BadStoredLength,
    #[error("code lengths are malformed")]
    MalformedCodeLengths,
    #[error("distance out of range")]
    OversizeDistance,
    #[error("back-reference reaches before stream start")]
    OversizeLength
}

impl From<canonical::Error> for Error {
    fn from(e: canonical::Error) -> Self {
        match e {
            canonical::Error::MalformedCodeLengths => Error::MalformedCodeLengths,
            canonical::Error::TruncatedStream => Error::TruncatedStream
        }
    }
}

/// Options controlling compression
#[derive(Clone)]
pub struct Options {
    /// compression level, 0 stores, 9 tries hardest
    pub level: usize,
    /// starting position in the input file
    pub in_offset: u64,
    /// starting position in the output file
    pub out_offset: u64,
    /// return error if file is larger
    pub max_file_size: u64
}

pub const STD_OPTIONS: Options = Options {
    level: 6,
    in_offset: 0,
    out_offset: 0,
    max_file_size: u32::MAX as u64
};

/// code lengths of the fixed literal/length alphabet
fn fixed_litlen_lengths() -> Vec<u32> {
    let mut ans = vec![8;288];
    for sym in 144..256 {
        ans[sym] = 9;
    }
    for sym in 256..280 {
        ans[sym] = 7;
    }
    ans
}

/// code lengths of the fixed distance alphabet
fn fixed_dist_lengths() -> Vec<u32> {
    vec![5;32]
}

/// map a match length onto (symbol, extra bits value, extra bits count)
fn length_symbol(length: u16) -> (usize,u32,usize) {
    let mut i = LENGTH_BASE.len() - 1;
    while LENGTH_BASE[i] > length {
        i -= 1;
    }
    (257 + i,(length - LENGTH_BASE[i]) as u32,LENGTH_EXTRA[i] as usize)
}

/// map a distance onto (symbol, extra bits value, extra bits count)
fn distance_symbol(distance: u16) -> (usize,u32,usize) {
    let mut i = DIST_BASE.len() - 1;
    while DIST_BASE[i] > distance {
        i -= 1;
    }
    (i,(distance - DIST_BASE[i]) as u32,DIST_EXTRA[i] as usize)
}

/// Symbol occurrence counts for one block.  The end of block marker is
/// always counted once.
struct FrequencyTally {
    litlen: [u32;LITLEN_SYMBOLS],
    dist: [u32;DIST_SYMBOLS]
}

impl FrequencyTally {
    fn tally(tokens: &[Token]) -> Self {
        let mut ans = Self {
            litlen: [0;LITLEN_SYMBOLS],
            dist: [0;DIST_SYMBOLS]
        };
        for token in tokens {
            match token {
                Token::Literal(b) => ans.litlen[*b as usize] += 1,
                Token::Backref { distance, length } => {
                    ans.litlen[length_symbol(*length).0] += 1;
                    ans.dist[distance_symbol(*distance).0] += 1;
                }
            }
        }
        ans.litlen[END_OF_BLOCK] += 1;
        ans
    }
}

/// cost in bits of coding the tallied symbols with the given lengths
fn coded_cost(tally: &FrequencyTally,litlen_lengths: &[u32],dist_lengths: &[u32]) -> usize {
    let mut bits: usize = 0;
    for (sym,f) in tally.litlen.iter().enumerate() {
        if *f > 0 {
            let extra = match sym > END_OF_BLOCK {
                true => LENGTH_EXTRA[sym-257] as usize,
                false => 0
            };
            bits += *f as usize * (litlen_lengths[sym] as usize + extra);
        }
    }
    for (sym,f) in tally.dist.iter().enumerate() {
        if *f > 0 {
            bits += *f as usize * (dist_lengths[sym] as usize + DIST_EXTRA[sym] as usize);
        }
    }
    bits
}

/// cost in bits of storing `raw_len` bytes outright, starting at bit
/// position `bit_pos` of the stream
fn stored_cost(bit_pos: usize,raw_len: usize) -> usize {
    let mut bits: usize = 0;
    let mut pos = bit_pos;
    let mut remaining = raw_len;
    loop {
        let chunk = remaining.min(STORED_MAX);
        pos += 3;
        let pad = (8 - pos % 8) % 8;
        let body = pad + 32 + chunk * 8;
        bits += 3 + body;
        pos += body;
        remaining -= chunk;
        if remaining == 0 {
            return bits;
        }
    }
}

/// one run-length-coded entry of the dynamic code length header
#[derive(Clone,Copy)]
struct ClItem {
    sym: u8,
    /// repeat count carried by symbols 16, 17 and 18
    run: u8
}

/// Run-length code a length vector with the escapes of RFC 1951:
/// 16 repeats the previous length 3-6 times, 17 gives 3-10 zeros,
/// 18 gives 11-138 zeros.  Returns the items and the tally of the
/// code length alphabet.
fn rle_encode(lengths: &[u32]) -> (Vec<ClItem>,[u32;CODELEN_SYMBOLS]) {
    let mut items: Vec<ClItem> = Vec::new();
    let mut freqs = [0u32;CODELEN_SYMBOLS];
    let mut i: usize = 0;
    while i < lengths.len() {
        let len = lengths[i];
        let mut run: usize = 1;
        while i + run < lengths.len() && lengths[i+run] == len {
            run += 1;
        }
        if len == 0 {
            let mut left = run;
            while left >= 11 {
                let take = left.min(138);
                items.push(ClItem { sym: 18, run: take as u8 });
                freqs[18] += 1;
                left -= take;
            }
            if left >= 3 {
                items.push(ClItem { sym: 17, run: left as u8 });
                freqs[17] += 1;
                left = 0;
            }
            for _k in 0..left {
                items.push(ClItem { sym: 0, run: 0 });
                freqs[0] += 1;
            }
        } else {
            items.push(ClItem { sym: len as u8, run: 0 });
            freqs[len as usize] += 1;
            let mut left = run - 1;
            while left >= 3 {
                let take = left.min(6);
                items.push(ClItem { sym: 16, run: take as u8 });
                freqs[16] += 1;
                left -= take;
            }
            for _k in 0..left {
                items.push(ClItem { sym: len as u8, run: 0 });
                freqs[len as usize] += 1;
            }
        }
        i += run;
    }
    (items,freqs)
}

/// Everything needed to emit one dynamic block, with its exact bit cost
struct DynamicPlan {
    litlen_lengths: Vec<u32>,
    dist_lengths: Vec<u32>,
    codelen_lengths: Vec<u32>,
    hlit_count: usize,
    hdist_count: usize,
    hclen_count: usize,
    rle: Vec<ClItem>,
    cost: usize
}

impl DynamicPlan {
    fn build(tally: &FrequencyTally) -> Result<Self,DYNERR> {
        let litlen_lengths = package_merge_any(&tally.litlen,MAX_CODE_BITS)?;
        let dist_lengths = match tally.dist.iter().any(|f| *f > 0) {
            true => package_merge_any(&tally.dist,MAX_CODE_BITS)?,
            false => vec![0;DIST_SYMBOLS]
        };
        // the end of block code guarantees at least 257 literal/length codes
        let hlit_count = litlen_lengths.iter().rposition(|l| *l > 0).unwrap_or(END_OF_BLOCK) + 1;
        let hdist_count = dist_lengths.iter().rposition(|l| *l > 0).unwrap_or(0) + 1;
        let combined: Vec<u32> = litlen_lengths[..hlit_count].iter()
            .chain(dist_lengths[..hdist_count].iter())
            .copied()
            .collect();
        let (rle,cl_freqs) = rle_encode(&combined);
        let codelen_lengths = package_merge_any(&cl_freqs,MAX_CODELEN_BITS)?;
        let mut hclen_count = CODELEN_ORDER.len();
        while hclen_count > 4 && codelen_lengths[CODELEN_ORDER[hclen_count-1]] == 0 {
            hclen_count -= 1;
        }
        let mut cost = 3 + 5 + 5 + 4 + 3*hclen_count;
        for item in &rle {
            cost += codelen_lengths[item.sym as usize] as usize + match item.sym {
                16 => 2,
                17 => 3,
                18 => 7,
                _ => 0
            };
        }
        cost += coded_cost(tally,&litlen_lengths,&dist_lengths);
        Ok(Self { litlen_lengths, dist_lengths, codelen_lengths, hlit_count, hdist_count, hclen_count, rle, cost })
    }
}

/// Serializes blocks into the output bit stream
struct BlockWriter {
    bits: BitBuffer
}

impl BlockWriter {
    fn new() -> Self {
        Self {
            bits: BitBuffer::new()
        }
    }
    /// Write the tokens as whichever block rendition is cheapest.
    /// `raw` must be exactly the input span the tokens expand to.
    fn write_block(&mut self,tokens: &[Token],raw: &[u8],last: bool) -> STDRESULT {
        let tally = FrequencyTally::tally(tokens);
        let plan = DynamicPlan::build(&tally)?;
        let stored = stored_cost(self.bits.len(),raw.len());
        let fixed = 3 + coded_cost(&tally,&fixed_litlen_lengths(),&fixed_dist_lengths());
        log::debug!("block of {} tokens: stored {} / fixed {} / dynamic {} bits",tokens.len(),stored,fixed,plan.cost);
        if stored <= fixed && stored <= plan.cost {
            self.write_stored(raw,last);
            Ok(())
        } else if fixed <= plan.cost {
            self.write_fixed(tokens,last)
        } else {
            self.write_dynamic(&plan,tokens,last)
        }
    }
    fn write_stored(&mut self,raw: &[u8],last: bool) {
        let mut remaining = raw;
        loop {
            let take = remaining.len().min(STORED_MAX);
            let (chunk,rest) = remaining.split_at(take);
            let final_chunk = rest.is_empty();
            self.bits.push_bits_lsb((last && final_chunk) as u32,1);
            self.bits.push_bits_lsb(BlockType::Stored as u32,2);
            self.bits.pad_to_byte();
            self.bits.push_bits_lsb(take as u32,16);
            self.bits.push_bits_lsb(!(take as u32) & 0xffff,16);
            for b in chunk {
                self.bits.push_bits_lsb(*b as u32,8);
            }
            remaining = rest;
            if final_chunk {
                return;
            }
        }
    }
    fn write_fixed(&mut self,tokens: &[Token],last: bool) -> STDRESULT {
        self.bits.push_bits_lsb(last as u32,1);
        self.bits.push_bits_lsb(BlockType::Fixed as u32,2);
        let litlen = CanonicalEncoder::from_lengths(&fixed_litlen_lengths()).map_err(Error::from)?;
        let dist = CanonicalEncoder::from_lengths(&fixed_dist_lengths()).map_err(Error::from)?;
        self.emit_tokens(&litlen,Some(&dist),tokens);
        Ok(())
    }
    fn write_dynamic(&mut self,plan: &DynamicPlan,tokens: &[Token],last: bool) -> STDRESULT {
        self.bits.push_bits_lsb(last as u32,1);
        self.bits.push_bits_lsb(BlockType::Dynamic as u32,2);
        self.bits.push_bits_lsb((plan.hlit_count - 257) as u32,5);
        self.bits.push_bits_lsb((plan.hdist_count - 1) as u32,5);
        self.bits.push_bits_lsb((plan.hclen_count - 4) as u32,4);
        for i in 0..plan.hclen_count {
            self.bits.push_bits_lsb(plan.codelen_lengths[CODELEN_ORDER[i]],3);
        }
        let cl_enc = CanonicalEncoder::from_lengths(&plan.codelen_lengths).map_err(Error::from)?;
        for item in &plan.rle {
            cl_enc.encode(item.sym as usize,&mut self.bits);
            match item.sym {
                16 => self.bits.push_bits_lsb(item.run as u32 - 3,2),
                17 => self.bits.push_bits_lsb(item.run as u32 - 3,3),
                18 => self.bits.push_bits_lsb(item.run as u32 - 11,7),
                _ => {}
            }
        }
        let litlen = CanonicalEncoder::from_lengths(&plan.litlen_lengths).map_err(Error::from)?;
        let dist = match plan.dist_lengths.iter().any(|l| *l > 0) {
            true => Some(CanonicalEncoder::from_lengths(&plan.dist_lengths).map_err(Error::from)?),
            false => None
        };
        self.emit_tokens(&litlen,dist.as_ref(),tokens);
        Ok(())
    }
    fn emit_tokens(&mut self,litlen: &CanonicalEncoder,dist: Option<&CanonicalEncoder>,tokens: &[Token]) {
        for token in tokens {
            match token {
                Token::Literal(b) => {
                    log::trace!("literal {}",b);
                    litlen.encode(*b as usize,&mut self.bits);
                },
                Token::Backref { distance, length } => {
                    log::trace!("copy {} from {} behind",length,distance);
                    let (sym,extra,num_bits) = length_symbol(*length);
                    litlen.encode(sym,&mut self.bits);
                    self.bits.push_bits_lsb(extra,num_bits);
                    let (dsym,dextra,dnum) = distance_symbol(*distance);
                    dist.expect("back-reference without a distance table").encode(dsym,&mut self.bits);
                    self.bits.push_bits_lsb(dextra,dnum);
                }
            }
        }
        litlen.encode(END_OF_BLOCK,&mut self.bits);
    }
    fn into_bytes(mut self) -> Vec<u8> {
        self.bits.pad_to_byte();
        self.bits.to_bytes()
    }
}

/// run the whole encode pipeline over a buffer
fn compress_bytes(input: &[u8],level: usize) -> Result<Vec<u8>,DYNERR> {
    let mut writer = BlockWriter::new();
    if level == 0 {
        log::debug!("level 0, storing {} bytes",input.len());
        writer.write_stored(input,true);
        return Ok(writer.into_bytes());
    }
    let mut finder = MatchFinder::new(input,CHAIN_DEPTH[level-1]);
    let mut tokens: Vec<Token> = Vec::new();
    let mut start: usize = 0;
    let mut covered: usize = 0;
    loop {
        let token = finder.next_token();
        if let Some(t) = token {
            covered += t.expanded_len();
            tokens.push(t);
        }
        let last = token.is_none();
        if last || tokens.len() == BLOCK_TOKENS {
            writer.write_block(&tokens,&input[start..start+covered],last)?;
            start += covered;
            covered = 0;
            tokens.clear();
        }
        if last {
            return Ok(writer.into_bytes());
        }
    }
}

/// Decodes a stream of blocks, resolving back-references through a
/// window of the most recent 32K of output
struct Expander<'a,W: Write> {
    bits: BitBuffer,
    window: RingBuffer<u8>,
    writer: &'a mut W,
    out_size: u64
}

impl <'a,W: Write> Expander<'a,W> {
    fn create(dat: &[u8],writer: &'a mut W) -> Self {
        Self {
            bits: BitBuffer::from_bytes(dat),
            window: RingBuffer::create(0,WIN_SIZE),
            writer,
            out_size: 0
        }
    }
    fn emit(&mut self,byte: u8) -> STDRESULT {
        self.writer.write_all(&[byte])?;
        self.window.push(byte);
        self.out_size += 1;
        Ok(())
    }
    fn run(&mut self) -> STDRESULT {
        loop {
            let last = self.bits.read_bit().ok_or(Error::TruncatedStream)?;
            let raw_type = self.bits.read_bits_lsb(2).ok_or(Error::TruncatedStream)?;
            let btype = BlockType::from_u32(raw_type).ok_or(Error::InvalidBlockType)?;
            log::debug!("expand {:?} block, final {}",btype,last);
            match btype {
                BlockType::Stored => self.stored_block()?,
                BlockType::Fixed => {
                    let litlen = CanonicalDecoder::from_lengths(&fixed_litlen_lengths()).map_err(Error::from)?;
                    let dist = CanonicalDecoder::from_lengths(&fixed_dist_lengths()).map_err(Error::from)?;
                    self.coded_block(&litlen,&Some(dist))?;
                },
                BlockType::Dynamic => {
                    let (litlen,dist) = self.dynamic_decoders()?;
                    self.coded_block(&litlen,&dist)?;
                }
            }
            if last {
                return Ok(());
            }
        }
    }
    fn stored_block(&mut self) -> STDRESULT {
        self.bits.align_to_byte();
        let len = self.bits.read_bits_lsb(16).ok_or(Error::TruncatedStream)?;
        let nlen = self.bits.read_bits_lsb(16).ok_or(Error::TruncatedStream)?;
        if len != !nlen & 0xffff {
            log::error!("stored block length check failed");
            return Err(Box::new(Error::BadStoredLength));
        }
        for _i in 0..len {
            let byte = self.bits.read_bits_lsb(8).ok_or(Error::TruncatedStream)?;
            self.emit(byte as u8)?;
        }
        Ok(())
    }
    /// read the code length tables of a dynamic block header
    fn dynamic_decoders(&mut self) -> Result<(CanonicalDecoder,Option<CanonicalDecoder>),DYNERR> {
        let hlit_count = self.bits.read_bits_lsb(5).ok_or(Error::TruncatedStream)? as usize + 257;
        let hdist_count = self.bits.read_bits_lsb(5).ok_or(Error::TruncatedStream)? as usize + 1;
        let hclen_count = self.bits.read_bits_lsb(4).ok_or(Error::TruncatedStream)? as usize + 4;
        if hlit_count > LITLEN_SYMBOLS || hdist_count > DIST_SYMBOLS {
            log::error!("dynamic header claims {} litlen and {} distance codes",hlit_count,hdist_count);
            return Err(Box::new(Error::MalformedCodeLengths));
        }
        let mut cl_lengths = [0u32;CODELEN_SYMBOLS];
        for i in 0..hclen_count {
            cl_lengths[CODELEN_ORDER[i]] = self.bits.read_bits_lsb(3).ok_or(Error::TruncatedStream)?;
        }
        let cl_dec = CanonicalDecoder::from_lengths(&cl_lengths).map_err(Error::from)?;
        let total = hlit_count + hdist_count;
        let mut lengths: Vec<u32> = Vec::with_capacity(total);
        while lengths.len() < total {
            let sym = cl_dec.decode(&mut self.bits).map_err(Error::from)?;
            let (repeat,run) = match sym {
                0..=15 => {
                    lengths.push(sym as u32);
                    continue;
                },
                16 => {
                    let prev = match lengths.last() {
                        Some(l) => *l,
                        None => {
                            log::error!("repeat escape with nothing to repeat");
                            return Err(Box::new(Error::MalformedCodeLengths));
                        }
                    };
                    (prev,3 + self.bits.read_bits_lsb(2).ok_or(Error::TruncatedStream)?)
                },
                17 => (0,3 + self.bits.read_bits_lsb(3).ok_or(Error::TruncatedStream)?),
                _ => (0,11 + self.bits.read_bits_lsb(7).ok_or(Error::TruncatedStream)?)
            };
            if lengths.len() + run as usize > total {
                log::error!("code length run overflows the table");
                return Err(Box::new(Error::MalformedCodeLengths));
            }
            for _k in 0..run {
                lengths.push(repeat);
            }
        }
        let litlen_lengths = &lengths[..hlit_count];
        let dist_lengths = &lengths[hlit_count..];
        if litlen_lengths[END_OF_BLOCK] == 0 {
            log::error!("no end of block code");
            return Err(Box::new(Error::MalformedCodeLengths));
        }
        let litlen = CanonicalDecoder::from_lengths(litlen_lengths).map_err(Error::from)?;
        let dist = match dist_lengths.iter().any(|l| *l > 0) {
            true => Some(CanonicalDecoder::from_lengths(dist_lengths).map_err(Error::from)?),
            false => None
        };
        Ok((litlen,dist))
    }
    /// decode tokens until the end of block symbol
    fn coded_block(&mut self,litlen: &CanonicalDecoder,dist: &Option<CanonicalDecoder>) -> STDRESULT {
        loop {
            let sym = litlen.decode(&mut self.bits).map_err(Error::from)? as usize;
            if sym < END_OF_BLOCK {
                log::trace!("literal {}",sym);
                self.emit(sym as u8)?;
                continue;
            }
            if sym == END_OF_BLOCK {
                return Ok(());
            }
            if sym >= 257 + LENGTH_BASE.len() {
                log::error!("length symbol {} is undefined",sym);
                return Err(Box::new(Error::MalformedCodeLengths));
            }
            let idx = sym - 257;
            let extra = self.bits.read_bits_lsb(LENGTH_EXTRA[idx] as usize).ok_or(Error::TruncatedStream)?;
            let length = LENGTH_BASE[idx] as u32 + extra;
            let dist_dec = match dist {
                Some(d) => d,
                None => {
                    log::error!("back-reference without a distance table");
                    return Err(Box::new(Error::MalformedCodeLengths));
                }
            };
            let dsym = dist_dec.decode(&mut self.bits).map_err(Error::from)? as usize;
            if dsym >= DIST_BASE.len() {
                log::error!("distance symbol {} is undefined",dsym);
                return Err(Box::new(Error::OversizeDistance));
            }
            let dextra = self.bits.read_bits_lsb(DIST_EXTRA[dsym] as usize).ok_or(Error::TruncatedStream)?;
            let distance = DIST_BASE[dsym] as u64 + dextra as u64;
            if distance > self.out_size {
                log::error!("back-reference reaches {} bytes into a {} byte stream",distance,self.out_size);
                return Err(Box::new(Error::OversizeLength));
            }
            log::trace!("copy {} from {} behind",length,distance);
            for _i in 0..length {
                let byte = self.window.read_back(distance as usize);
                self.emit(byte)?;
            }
        }
    }
}

/// Main compression function.
/// `expanded_in` is an object with `Read` and `Seek` traits, usually `std::fs::File`, or `std::io::Cursor<&[u8]>`.
/// `compressed_out` is an object with `Write` and `Seek` traits, usually `std::fs::File`, or `std::io::Cursor<Vec<u8>>`.
/// Returns (in_size,out_size) or error.  Panics if the level is out of range.
pub fn compress<R,W>(expanded_in: &mut R, compressed_out: &mut W, opt: &Options) -> Result<(u64,u64),DYNERR>
where R: Read + Seek, W: Write + Seek {
    if opt.level > 9 {
        panic!("compression level must be 0 through 9");
    }
    let mut reader = BufReader::new(expanded_in);
    let mut writer = BufWriter::new(compressed_out);
    let mut expanded_length = reader.seek(SeekFrom::End(0))?;
    if opt.in_offset > expanded_length {
        return Err(Box::new(crate::Error::FileFormatMismatch));
    }
    expanded_length -= opt.in_offset;
    if expanded_length > opt.max_file_size {
        return Err(Box::new(crate::Error::FileTooLarge));
    }
    reader.seek(SeekFrom::Start(opt.in_offset))?;
    let mut input: Vec<u8> = Vec::new();
    reader.read_to_end(&mut input)?;
    let bytes = compress_bytes(&input,opt.level)?;
    writer.seek(SeekFrom::Start(opt.out_offset))?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok((expanded_length,bytes.len() as u64))
}

/// Main decompression function.
/// `compressed_in` is an object with `Read` and `Seek` traits, usually `std::fs::File`, or `std::io::Cursor<&[u8]>`.
/// `expanded_out` is an object with `Write` and `Seek` traits, usually `std::fs::File`, or `std::io::Cursor<Vec<u8>>`.
/// Returns (in_size,out_size) or error.
pub fn expand<R,W>(compressed_in: &mut R, expanded_out: &mut W, opt: &Options) -> Result<(u64,u64),DYNERR>
where R: Read + Seek, W: Write + Seek {
    let mut reader = BufReader::new(compressed_in);
    let mut writer = BufWriter::new(expanded_out);
    let mut compressed_size = reader.seek(SeekFrom::End(0))?;
    if opt.in_offset > compressed_size {
        return Err(Box::new(crate::Error::FileFormatMismatch));
    }
    compressed_size -= opt.in_offset;
    if compressed_size > opt.max_file_size {
        return Err(Box::new(crate::Error::FileTooLarge));
    }
    reader.seek(SeekFrom::Start(opt.in_offset))?;
    let mut dat: Vec<u8> = Vec::new();
    reader.read_to_end(&mut dat)?;
    writer.seek(SeekFrom::Start(opt.out_offset))?;
    let mut expander = Expander::create(&dat,&mut writer);
    expander.run()?;
    let out_size = expander.out_size;
    writer.flush()?;
    Ok((compressed_size,out_size))
}

/// Convenience function, calls `compress` with a slice returning a Vec
pub fn compress_slice(slice: &[u8],opt: &Options) -> Result<Vec<u8>,DYNERR> {
    let mut src = Cursor::new(slice);
    let mut ans: Cursor<Vec<u8>> = Cursor::new(Vec::new());
    compress(&mut src,&mut ans,opt)?;
    Ok(ans.into_inner())
}

/// Convenience function, calls `expand` with a slice returning a Vec
pub fn expand_slice(slice: &[u8],opt: &Options) -> Result<Vec<u8>,DYNERR> {
    let mut src = Cursor::new(slice);
    let mut ans: Cursor<Vec<u8>> = Cursor::new(Vec::new());
    expand(&mut src,&mut ans,opt)?;
    Ok(ans.into_inner())
}

// *************** TESTS *****************

#[cfg(test)]
fn opts(level: usize) -> Options {
    let mut opt = STD_OPTIONS;
    opt.level = level;
    opt
}

#[cfg(test)]
fn check_roundtrip(data: &[u8],opt: &Options) {
    let compressed = compress_slice(data,opt).expect("compression failed");
    let expanded = expand_slice(&compressed,opt).expect("expansion failed");
    assert_eq!(data.to_vec(),expanded);
}

#[cfg(test)]
fn lcg_bytes(count: usize) -> Vec<u8> {
    let mut x: u32 = 0x2545f491;
    let mut ans: Vec<u8> = Vec::new();
    for _i in 0..count {
        x = x.wrapping_mul(1103515245).wrapping_add(12345);
        ans.push((x >> 16) as u8);
    }
    ans
}

#[test]
fn stored_empty_vector() {
    let compressed = compress_slice(b"",&opts(0)).expect("compression failed");
    assert_eq!(compressed,hex::decode("010000ffff").unwrap());
    assert_eq!(expand_slice(&compressed,&STD_OPTIONS).expect("expansion failed"),b"");
}

#[test]
fn stored_hello_vector() {
    let compressed = compress_slice(b"hello",&opts(0)).expect("compression failed");
    let expected = [hex::decode("010500faff").unwrap(),b"hello".to_vec()].concat();
    assert_eq!(compressed,expected);
    assert_eq!(expand_slice(&compressed,&STD_OPTIONS).expect("expansion failed"),b"hello");
}

#[test]
fn fixed_hello_vector() {
    // matches the raw stream a conforming deflater emits for "hello"
    let compressed = compress_slice(b"hello",&STD_OPTIONS).expect("compression failed");
    assert_eq!(compressed,hex::decode("cb48cdc9c90700").unwrap());
}

#[test]
fn fixed_hello_interop() {
    let expanded = expand_slice(&hex::decode("cb48cdc9c90700").unwrap(),&STD_OPTIONS).expect("expansion failed");
    assert_eq!(expanded,b"hello");
}

#[test]
fn empty_fixed_vector() {
    // a final block holding nothing but the end of block code
    let compressed = compress_slice(b"",&STD_OPTIONS).expect("compression failed");
    assert_eq!(compressed,hex::decode("0300").unwrap());
    assert_eq!(expand_slice(&compressed,&STD_OPTIONS).expect("expansion failed"),b"");
}

#[test]
fn invertibility() {
    let test_data = "I am Sam. Sam I am. I do not like this Sam I am.\n".as_bytes();
    for level in [0,1,6,9] {
        check_roundtrip(test_data,&opts(level));
    }
    check_roundtrip(b"a",&STD_OPTIONS);
    check_roundtrip(b"ab",&STD_OPTIONS);
}

#[test]
fn dynamic_block_selected() {
    // skewed symbol frequencies with no long repeats: custom codes beat
    // the fixed 8 bit ones by a wide margin
    let test_data: Vec<u8> = lcg_bytes(5000).iter().map(|b| match b & 7 {
        0..=3 => b'e',
        4 | 5 => b't',
        6 => b'a',
        _ => b'q'
    }).collect();
    let compressed = compress_slice(&test_data,&STD_OPTIONS).expect("compression failed");
    // BFINAL set, BTYPE is 10
    assert_eq!(compressed[0] & 1,1);
    assert_eq!((compressed[0] >> 1) & 3,2);
    assert!(compressed.len() < test_data.len() / 2);
    let expanded = expand_slice(&compressed,&STD_OPTIONS).expect("expansion failed");
    assert_eq!(expanded,test_data);
}

#[test]
fn repetitive_text_roundtrip() {
    let test_data = "abracadabra ".repeat(300);
    let compressed = compress_slice(test_data.as_bytes(),&STD_OPTIONS).expect("compression failed");
    assert!(compressed.len() < test_data.len() / 4);
    let expanded = expand_slice(&compressed,&STD_OPTIONS).expect("expansion failed");
    assert_eq!(expanded,test_data.as_bytes());
}

#[test]
fn deterministic_output() {
    let test_data = lcg_bytes(2000);
    let first = compress_slice(&test_data,&STD_OPTIONS).expect("compression failed");
    let second = compress_slice(&test_data,&STD_OPTIONS).expect("compression failed");
    assert_eq!(first,second);
}

#[test]
fn incompressible_stays_small() {
    let test_data = lcg_bytes(5000);
    let compressed = compress_slice(&test_data,&STD_OPTIONS).expect("compression failed");
    // the stored rendition caps the overhead at the block headers
    assert!(compressed.len() < test_data.len() + 16);
    let expanded = expand_slice(&compressed,&STD_OPTIONS).expect("expansion failed");
    assert_eq!(expanded,test_data);
}

#[test]
fn window_boundary_roundtrip() {
    let mut data = vec![0;WIN_SIZE*2+50];
    data.push(1);
    check_roundtrip(&data,&STD_OPTIONS);
    let mut patterned: Vec<u8> = Vec::new();
    for i in 0..WIN_SIZE+2000 {
        patterned.push((i % 251) as u8);
    }
    check_roundtrip(&patterned,&opts(9));
}

#[test]
fn multi_block_roundtrip() {
    // more tokens than fit in one block forces a table rebuild mid-stream
    let data = lcg_bytes(BLOCK_TOKENS + 5000);
    check_roundtrip(&data,&opts(1));
    check_roundtrip(&data,&opts(0));
}

#[test]
fn offsets_respected() {
    let payload = b"offsets offsets offsets";
    let mut src = Cursor::new([b"HDR!".to_vec(),payload.to_vec()].concat());
    let mut cmp: Cursor<Vec<u8>> = Cursor::new(Vec::new());
    let mut opt = STD_OPTIONS;
    opt.in_offset = 4;
    opt.out_offset = 2;
    let (in_size,_) = compress(&mut src,&mut cmp,&opt).expect("compression failed");
    assert_eq!(in_size,payload.len() as u64);
    let mut xpd: Cursor<Vec<u8>> = Cursor::new(Vec::new());
    let mut opt = STD_OPTIONS;
    opt.in_offset = 2;
    let (_,out_size) = expand(&mut cmp,&mut xpd,&opt).expect("expansion failed");
    assert_eq!(out_size,payload.len() as u64);
    assert_eq!(xpd.into_inner(),payload.to_vec());
}

#[test]
fn file_guards() {
    let mut opt = STD_OPTIONS;
    opt.max_file_size = 4;
    let err = compress_slice(b"hello",&opt).unwrap_err();
    assert!(matches!(err.downcast_ref::<crate::Error>(),Some(crate::Error::FileTooLarge)));
    let mut opt = STD_OPTIONS;
    opt.in_offset = 10;
    let err = compress_slice(b"hello",&opt).unwrap_err();
    assert!(matches!(err.downcast_ref::<crate::Error>(),Some(crate::Error::FileFormatMismatch)));
}

#[test]
#[should_panic]
fn bad_level_panics() {
    let mut opt = STD_OPTIONS;
    opt.level = 10;
    let _ = compress_slice(b"x",&opt);
}

#[test]
fn reserved_block_type_rejected() {
    // BFINAL=1 then BTYPE=11
    let err = expand_slice(&[0x07],&STD_OPTIONS).unwrap_err();
    assert_eq!(err.downcast_ref::<Error>(),Some(&Error::InvalidBlockType));
}

#[test]
fn truncation_rejected() {
    // a stored header with no length words behind it
    let err = expand_slice(&[0x01],&STD_OPTIONS).unwrap_err();
    assert_eq!(err.downcast_ref::<Error>(),Some(&Error::TruncatedStream));
    // a fixed block cut off mid-symbol
    let err = expand_slice(&hex::decode("cb48cd").unwrap(),&STD_OPTIONS).unwrap_err();
    assert_eq!(err.downcast_ref::<Error>(),Some(&Error::TruncatedStream));
    // nothing at all
    let err = expand_slice(&[],&STD_OPTIONS).unwrap_err();
    assert_eq!(err.downcast_ref::<Error>(),Some(&Error::TruncatedStream));
}

#[test]
fn bad_stored_length_rejected() {
    // LEN and the complement disagree
    let dat = hex::decode("0105000000").unwrap();
    let err = expand_slice(&dat,&STD_OPTIONS).unwrap_err();
    assert_eq!(err.downcast_ref::<Error>(),Some(&Error::BadStoredLength));
}

#[test]
fn oversize_backref_rejected() {
    // a fixed block carrying "a" then a copy of 3 from distance 4
    let mut bits = BitBuffer::new();
    bits.push_bits_lsb(1,1);
    bits.push_bits_lsb(BlockType::Fixed as u32,2);
    let litlen = CanonicalEncoder::from_lengths(&fixed_litlen_lengths()).unwrap();
    let dist = CanonicalEncoder::from_lengths(&fixed_dist_lengths()).unwrap();
    litlen.encode(b'a' as usize,&mut bits);
    litlen.encode(257,&mut bits);
    dist.encode(3,&mut bits);
    litlen.encode(END_OF_BLOCK,&mut bits);
    bits.pad_to_byte();
    let err = expand_slice(&bits.to_bytes(),&STD_OPTIONS).unwrap_err();
    assert_eq!(err.downcast_ref::<Error>(),Some(&Error::OversizeLength));
}

#[test]
fn undefined_length_symbol_rejected() {
    // fixed code 286 exists in the tree but not in the alphabet
    let mut bits = BitBuffer::new();
    bits.push_bits_lsb(1,1);
    bits.push_bits_lsb(BlockType::Fixed as u32,2);
    let litlen = CanonicalEncoder::from_lengths(&fixed_litlen_lengths()).unwrap();
    litlen.encode(286,&mut bits);
    bits.pad_to_byte();
    let err = expand_slice(&bits.to_bytes(),&STD_OPTIONS).unwrap_err();
    assert_eq!(err.downcast_ref::<Error>(),Some(&Error::MalformedCodeLengths));
}

#[test]
fn undefined_distance_symbol_rejected() {
    // fixed code 30 exists in the distance tree but not in the alphabet
    let mut bits = BitBuffer::new();
    bits.push_bits_lsb(1,1);
    bits.push_bits_lsb(BlockType::Fixed as u32,2);
    let litlen = CanonicalEncoder::from_lengths(&fixed_litlen_lengths()).unwrap();
    let dist = CanonicalEncoder::from_lengths(&fixed_dist_lengths()).unwrap();
    litlen.encode(b'a' as usize,&mut bits);
    litlen.encode(257,&mut bits);
    dist.encode(30,&mut bits);
    litlen.encode(END_OF_BLOCK,&mut bits);
    bits.pad_to_byte();
    let err = expand_slice(&bits.to_bytes(),&STD_OPTIONS).unwrap_err();
    assert_eq!(err.downcast_ref::<Error>(),Some(&Error::OversizeDistance));
}

#[test]
fn all_byte_values_roundtrip() {
    let mut data: Vec<u8> = Vec::new();
    for _i in 0..5 {
        for b in 0..=255u8 {
            data.push(b);
        }
    }
    check_roundtrip(&data,&STD_OPTIONS);
}
