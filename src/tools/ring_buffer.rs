//! Ring buffer for LZ type compression windows.
//! The expander pushes every emitted value and reads back at a distance
//! to resolve back-references, so the sink itself never has to be readable.
use num_traits::PrimInt;

pub struct RingBuffer<T: PrimInt> {
    buf: Vec<T>,
    pos: usize,
    n: usize
}

impl <T: PrimInt> RingBuffer<T> {
    pub fn create(fill: T,n: usize) -> Self {
        Self {
            buf: vec![fill;n],
            pos: 0,
            n
        }
    }
    pub fn capacity(&self) -> usize {
        self.n
    }
    /// store a value at the cursor and advance by 1
    pub fn push(&mut self,val: T) {
        self.buf[self.pos] = val;
        self.pos = (self.pos + 1) % self.n;
    }
    /// value `distance` positions behind the cursor, `distance` in `1..=n`.
    /// Correctly handles positions that are "ahead" in memory order.
    pub fn read_back(&self,distance: usize) -> T {
        self.buf[(self.pos as i64 - distance as i64).rem_euclid(self.n as i64) as usize]
    }
}

// *************** TESTS *****************

#[test]
fn read_behind() {
    let mut ring: RingBuffer<u8> = RingBuffer::create(0,4);
    ring.push(10);
    ring.push(20);
    ring.push(30);
    assert_eq!(ring.read_back(1),30);
    assert_eq!(ring.read_back(3),10);
}

#[test]
fn wrapping() {
    // four positions, cursor wraps once
    let mut ring: RingBuffer<u8> = RingBuffer::create(0,4);
    for val in 1..=6 {
        ring.push(val);
    }
    assert_eq!(ring.read_back(1),6);
    assert_eq!(ring.read_back(2),5);
    assert_eq!(ring.read_back(4),3);
}

#[test]
fn full_distance() {
    let mut ring: RingBuffer<u8> = RingBuffer::create(0,3);
    ring.push(7);
    ring.push(8);
    ring.push(9);
    assert_eq!(ring.read_back(3),7);
}
