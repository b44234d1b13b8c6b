//! `multipart/byteranges` bodies for multi-range responses

use std::io;

use rand::distributions::Alphanumeric;
use rand::Rng;

use super::range::ByteRange;

const BOUNDARY_LEN: usize = 24;

/// Fresh random boundary token
pub fn generate_boundary() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(BOUNDARY_LEN)
        .map(char::from)
        .collect()
}

/// Layout of a multi-range body: one part per range, then the closing line
#[derive(Debug)]
pub struct MultipartRanges<'a> {
    boundary: String,
    content_type: &'a str,
    file_size: u64,
    ranges: &'a [ByteRange],
}

impl<'a> MultipartRanges<'a> {
    pub fn new(content_type: &'a str, file_size: u64, ranges: &'a [ByteRange]) -> Self {
        Self::with_boundary(generate_boundary(), content_type, file_size, ranges)
    }

    pub const fn with_boundary(
        boundary: String,
        content_type: &'a str,
        file_size: u64,
        ranges: &'a [ByteRange],
    ) -> Self {
        Self {
            boundary,
            content_type,
            file_size,
            ranges,
        }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// `Content-Type` of the whole response
    pub fn content_type_header(&self) -> String {
        format!("multipart/byteranges; boundary={}", self.boundary)
    }

    fn part_header(&self, range: &ByteRange) -> String {
        format!(
            "\r\n--{}\r\nContent-Type: {}\r\nContent-Range: {}\r\n\r\n",
            self.boundary,
            self.content_type,
            range.content_range(self.file_size)
        )
    }

    fn trailer(&self) -> String {
        format!("\r\n--{}--\r\n", self.boundary)
    }

    /// Exact body length, computed without reading any data
    pub fn content_length(&self) -> u64 {
        let parts: u64 = self
            .ranges
            .iter()
            .map(|r| self.part_header(r).len() as u64 + r.len())
            .sum();
        parts + self.trailer().len() as u64
    }

    /// Assemble the body, reading each range through `read`
    pub fn write_body<F>(&self, mut read: F) -> io::Result<Vec<u8>>
    where
        F: FnMut(&ByteRange) -> io::Result<Vec<u8>>,
    {
        let mut body = Vec::new();
        for range in self.ranges {
            body.extend_from_slice(self.part_header(range).as_bytes());
            body.extend_from_slice(&read(range)?);
        }
        body.extend_from_slice(self.trailer().as_bytes());
        Ok(body)
    }
}
