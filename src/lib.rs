//! # Packflate Library
//!
//! Compress or expand byte streams in the DEFLATE format (RFC 1951)
//! * `deflate` is the codec: LZ77 match finding over a 32K sliding window
//!   followed by canonical Huffman coding, with stored, fixed, and dynamic blocks
//! * `tools` holds the building blocks: the bit stream, the match finder,
//!   the boundary package-merge code length assigner, and the canonical coder
//!
//! The compression/expansion functions are generics that operate on trait objects
//! with bounds `Read + Seek` or `Write + Seek`.  There are convenience functions for working
//! directly with buffers.
//!
//! ## File Example
//!
//! ```rs
//! use packflate::*;
//! let mut in_file = std::fs::File::open("some_input_path").expect("open failed");
//! let mut out_file = std::fs::File::create("some_output_path").expect("create failed");
//! let (in_size,out_size) = deflate::compress(&mut in_file,&mut out_file,&deflate::STD_OPTIONS)
//!     .expect("compression failed");
//! eprintln!("compressed {} into {}",in_size,out_size);
//! ```
//!
//! ## Buffer Example
//!
//! ```rs
//! use packflate::*;
//! let test_data = "This is the chaunt of the priests.  The chaunt of the priests of Mung.".as_bytes();
//! let compressed = deflate::compress_slice(test_data,&deflate::STD_OPTIONS).expect("compression failed");
//! ```

pub mod tools;
pub mod deflate;

type DYNERR = Box<dyn std::error::Error>;
type STDRESULT = Result<(),Box<dyn std::error::Error>>;

/// File surface errors
#[derive(thiserror::Error,Debug)]
pub enum Error {
    #[error("file format mismatch")]
    FileFormatMismatch,
    #[error("file too large")]
    FileTooLarge
}
