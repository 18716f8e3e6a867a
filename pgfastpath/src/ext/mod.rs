use std::io::{self, Read};

use bytes::{Buf, BufMut, Bytes};

/// Integer signess in postgres docs is awful.
pub trait UsizeExt {
    /// Length is `usize` in rust, while postgres want `u32`,
    /// this will panic when overflow instead of wrapping.
    fn to_u32(self) -> u32;
    /// Length is `usize` in rust, while postgres want `i32`,
    /// this will panic when overflow instead of wrapping.
    fn to_i32(self) -> i32;
}

/// Nul string operation in [`BufMut`]
pub trait BufMutExt {
    /// Write string and nul termination.
    fn put_nul_string(&mut self, string: &str);
}

/// Nul string operation in [`Bytes`]
pub trait BytesExt {
    /// Try to read nul terminated string, lossy on invalid utf8.
    ///
    /// Returns `None` if there is no nul terminator left.
    fn get_nul_string(&mut self) -> Option<String>;
}

const READ_CHUNK: usize = 8 * 1024;

/// Blocking read of postgres primitives.
///
/// All integers are in network byte order.
pub trait ReadExt: Read {
    fn read_u8(&mut self) -> io::Result<u8> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    fn read_i32(&mut self) -> io::Result<i32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(i32::from_be_bytes(buf))
    }

    /// Read exactly `len` bytes.
    ///
    /// A single `read` may return less than requested, this keeps reading
    /// until `len` bytes are read or the stream hits eof.
    ///
    /// `len` usually comes from the wire, the buffer only grows as data arrives.
    fn read_bytes(&mut self, len: usize) -> io::Result<Bytes> {
        let mut buf = Vec::with_capacity(len.min(READ_CHUNK));
        let n = Read::take(&mut *self, len as u64).read_to_end(&mut buf)?;
        if n != len {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        Ok(buf.into())
    }

    /// Read and discard exactly `len` bytes.
    fn skip(&mut self, len: u64) -> io::Result<()> {
        let n = io::copy(&mut Read::take(&mut *self, len), &mut io::sink())?;
        if n != len {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        Ok(())
    }

    /// Read nul terminated string, lossy on invalid utf8.
    fn read_nul_string(&mut self) -> io::Result<String> {
        let mut buf = Vec::new();
        loop {
            match self.read_u8()? {
                b'\0' => break,
                b => buf.push(b),
            }
        }
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

impl<R: Read + ?Sized> ReadExt for R { }

impl UsizeExt for usize {
    fn to_u32(self) -> u32 {
        self.try_into().expect("message size too large for protocol")
    }

    fn to_i32(self) -> i32 {
        self.try_into().expect("message size too large for protocol")
    }
}

impl<B: BufMut> BufMutExt for B {
    fn put_nul_string(&mut self, string: &str) {
        self.put(string.as_bytes());
        self.put_u8(b'\0');
    }
}

impl BytesExt for Bytes {
    fn get_nul_string(&mut self) -> Option<String> {
        let end = self.iter().position(|e| matches!(e, b'\0'))?;
        let me = self.split_to(end);
        Buf::advance(self, 1); // nul
        Some(String::from_utf8_lossy(&me).into_owned())
    }
}
