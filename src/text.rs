//! Whitespace-delimited decimal integer codec.

use std::io;
use std::io::prelude::*;

/// Longest token worth parsing: `i64::MIN` has 20 characters, anything longer cannot be a valid value.
const MAX_TOKEN_LEN: usize = 20;

/// How a token that is not a valid `i64` is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Malformed {
    /// The token ends the sequence, like formatted extraction does.
    Stop,
    /// The token is reported as an [`io::ErrorKind::InvalidData`] error.
    Fail,
}

/// Streaming reader of whitespace-separated decimal integers.
///
/// Bytes are consumed straight from the underlying [`BufRead`] buffer, so input laid out on a single huge line
/// is read with constant memory.
pub struct IntReader<R> {
    reader: R,
    malformed: Malformed,
    token: Vec<u8>,
    overflowed: bool,
    bytes_read: u64,
    finished: bool,
}

impl<R: BufRead> IntReader<R> {
    pub fn new(reader: R, malformed: Malformed) -> Self {
        IntReader {
            reader,
            malformed,
            token: Vec::with_capacity(MAX_TOKEN_LEN),
            overflowed: false,
            bytes_read: 0,
            finished: false,
        }
    }

    /// Number of bytes consumed from the underlying reader so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Collects the next token into `self.token`. Returns `false` when the input is exhausted.
    /// Leading zeros are dropped as they arrive; a token still longer than `MAX_TOKEN_LEN` is marked overflowed.
    fn next_token(&mut self) -> io::Result<bool> {
        self.token.clear();
        self.overflowed = false;

        loop {
            let available = match self.reader.fill_buf() {
                Ok(available) => available,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            };
            if available.is_empty() {
                return Ok(!self.token.is_empty());
            }

            let mut consumed = 0;
            let mut complete = false;
            for &byte in available {
                consumed += 1;
                if byte.is_ascii_whitespace() {
                    if !self.token.is_empty() {
                        complete = true;
                        break;
                    }
                } else {
                    push_token_byte(&mut self.token, &mut self.overflowed, byte);
                }
            }

            self.reader.consume(consumed);
            self.bytes_read += consumed as u64;

            if complete {
                return Ok(true);
            }
        }
    }

    fn parse_token(&self) -> Option<i64> {
        if self.overflowed {
            return None;
        }
        std::str::from_utf8(&self.token).ok()?.parse().ok()
    }
}

fn push_token_byte(token: &mut Vec<u8>, overflowed: &mut bool, byte: u8) {
    let digits = match token.first() {
        Some(b'-') | Some(b'+') => &token[1..],
        _ => &token[..],
    };
    // a lone leading zero followed by another digit carries no value
    if digits == b"0" && byte.is_ascii_digit() {
        token.pop();
    }

    if token.len() < MAX_TOKEN_LEN {
        token.push(byte);
    } else {
        *overflowed = true;
    }
}

impl<R: BufRead> Iterator for IntReader<R> {
    type Item = io::Result<i64>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.next_token() {
            Ok(true) => {}
            Ok(false) => {
                self.finished = true;
                return None;
            }
            Err(err) => {
                self.finished = true;
                return Some(Err(err));
            }
        }

        if let Some(value) = self.parse_token() {
            return Some(Ok(value));
        }

        self.finished = true;
        let token = String::from_utf8_lossy(&self.token);
        match self.malformed {
            Malformed::Stop => {
                log::warn!("malformed token {:?} at byte {}, input ends here", token, self.bytes_read);
                None
            }
            Malformed::Fail => Some(Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("malformed token {:?} at byte {}", token, self.bytes_read),
            ))),
        }
    }
}

/// Writes a single value followed by a line break.
pub fn write_int<W: Write>(writer: &mut W, value: i64) -> io::Result<()> {
    writeln!(writer, "{}", value)
}

#[cfg(test)]
mod test {
    use std::io::{self, BufReader};

    use rstest::*;

    use super::{write_int, IntReader, Malformed};

    fn read_all(input: &str, malformed: Malformed) -> io::Result<Vec<i64>> {
        IntReader::new(input.as_bytes(), malformed).collect()
    }

    #[rstest]
    #[case("", vec![])]
    #[case("   \n\t ", vec![])]
    #[case("5 3 8 1 9 2 ", vec![5, 3, 8, 1, 9, 2])]
    #[case("1\n2\r\n3", vec![1, 2, 3])]
    #[case("  -7\t+4  0 ", vec![-7, 4, 0])]
    #[case("-9223372036854775808 9223372036854775807", vec![i64::MIN, i64::MAX])]
    #[case("0000000000000000000000007 000000000000000000000000000042", vec![7, 42])]
    #[case("-00000000000000000000000000009223372036854775808 +0000 00", vec![i64::MIN, 0, 0])]
    fn test_read_ints(#[case] input: &str, #[case] expected: Vec<i64>) {
        assert_eq!(read_all(input, Malformed::Fail).unwrap(), expected);
    }

    #[rstest]
    #[case("1 2 x 3", vec![1, 2])]
    #[case("1 2x 3", vec![1])]
    #[case("abc", vec![])]
    #[case("1 9223372036854775808 2", vec![1])]
    #[case("1 123456789012345678901234567890 2", vec![1])]
    #[case("1 0-5 2", vec![1])]
    #[case("1 000x 2", vec![1])]
    #[case("1 -000000000000000000000000000000000001234567890123456789012 2", vec![1])]
    fn test_malformed_token_stops(#[case] input: &str, #[case] expected: Vec<i64>) {
        assert_eq!(read_all(input, Malformed::Stop).unwrap(), expected);
    }

    #[test]
    fn test_malformed_token_fails() {
        let mut reader = IntReader::new("4 oops 5".as_bytes(), Malformed::Fail);

        assert_eq!(reader.next().unwrap().unwrap(), 4);
        let err = reader.next().unwrap().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_tokens_spanning_buffer_boundaries() {
        let input = Vec::from_iter((0..500).map(|n| n * 1_000_003 - 250_000_000));
        let text = input.iter().map(|n| n.to_string()).collect::<Vec<_>>().join(" ");

        let reader = IntReader::new(BufReader::with_capacity(3, text.as_bytes()), Malformed::Fail);
        let actual: io::Result<Vec<i64>> = reader.collect();

        assert_eq!(actual.unwrap(), input);
    }

    #[test]
    fn test_bytes_read() {
        let mut reader = IntReader::new("12 345 6".as_bytes(), Malformed::Fail);
        reader.next();
        assert_eq!(reader.bytes_read(), 3);
        reader.by_ref().for_each(drop);
        assert_eq!(reader.bytes_read(), 8);
    }

    #[test]
    fn test_write_int() {
        let mut output = Vec::new();
        for value in [3, -1, 0] {
            write_int(&mut output, value).unwrap();
        }
        assert_eq!(String::from_utf8(output).unwrap(), "3\n-1\n0\n");
    }
}
