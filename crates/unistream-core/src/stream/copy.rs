//! Stream-to-stream transfer.

use crate::errno::{Result, StreamError};

use super::Stream;

/// Chunk size used by [`copy`].
pub const COPY_CHUNK: usize = 256;

fn read_failure(stream: &Stream) -> Result<()> {
    match stream.error() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Copy until `input` reports end of data. Returns the bytes copied.
pub fn copy(input: &mut Stream, output: &mut Stream) -> Result<u64> {
    let mut chunk = [0u8; COPY_CHUNK];
    let mut total = 0u64;
    loop {
        let n = input.read_bytes(&mut chunk);
        if n > 0 {
            output.write_all(&chunk[..n])?;
            total += n as u64;
        }
        if n < chunk.len() {
            read_failure(input)?;
            if input.eof() {
                return Ok(total);
            }
        }
    }
}

/// [`copy`], then close both streams. The copy error wins over close errors.
pub fn copy_and_close(mut input: Stream, mut output: Stream) -> Result<u64> {
    let copied = copy(&mut input, &mut output);
    let closed_out = output.close();
    let closed_in = input.close();
    let total = copied?;
    closed_out?;
    closed_in?;
    Ok(total)
}

/// Copy one byte at a time.
pub fn slow_copy(input: &mut Stream, output: &mut Stream) -> Result<u64> {
    let mut total = 0u64;
    while let Some(byte) = input.getc() {
        output.putc(byte)?;
        total += 1;
    }
    read_failure(input)?;
    if input.eof() {
        Ok(total)
    } else {
        Err(StreamError::Io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(len: usize) -> (Vec<u8>, Stream) {
        let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        let s = Stream::open_const_buffer(data.clone(), "rb").unwrap();
        (data, s)
    }

    #[test]
    fn copy_spans_several_chunks() {
        let (data, mut input) = source(1000);
        let mut output = Stream::open_dynamic_buffer("wb").unwrap();
        assert_eq!(copy(&mut input, &mut output).unwrap(), 1000);
        assert_eq!(output.underlying_buffer(), Some(&data[..]));
    }

    #[test]
    fn slow_copy_matches_copy() {
        let (data, mut input) = source(300);
        let mut output = Stream::open_dynamic_buffer("wb").unwrap();
        assert_eq!(slow_copy(&mut input, &mut output).unwrap(), 300);
        assert_eq!(output.underlying_buffer(), Some(&data[..]));
    }

    #[test]
    fn copy_into_full_buffer_fails() {
        let (_, mut input) = source(10);
        let mut output = Stream::open_buffer(vec![0; 4], "wb").unwrap();
        assert_eq!(copy(&mut input, &mut output), Err(StreamError::NoSpaceLeft));
    }

    #[test]
    fn copy_and_close_consumes_both() {
        let (_, input) = source(5);
        let output = Stream::open_dynamic_buffer("wb").unwrap();
        assert_eq!(copy_and_close(input, output).unwrap(), 5);
    }
}
