//! Function call arguments.
use bytes::{BufMut, Bytes};

use crate::{ext::UsizeExt, postgres::Oid};

/// A value that can be sent as a function call argument.
///
/// Each argument is framed as `Int32` length of the value (not including itself),
/// followed by the value bytes. As a special case, -1 indicates a NULL argument
/// and no value bytes follow.
pub trait FunctionArg {
    /// Number of bytes [`encode`][FunctionArg::encode] writes, including the length prefix.
    fn size_hint(&self) -> u32;

    /// Write the argument.
    ///
    /// The length written must be equal to [`size_hint`][FunctionArg::size_hint].
    fn encode(&self, buf: &mut impl BufMut);
}

impl<A: FunctionArg + ?Sized> FunctionArg for &A {
    fn size_hint(&self) -> u32 {
        A::size_hint(self)
    }

    fn encode(&self, buf: &mut impl BufMut) {
        A::encode(self, buf);
    }
}

/// Function call argument.
///
/// # Examples
///
/// ```
/// use pgfastpath::FastpathArg;
///
/// let args = [
///     FastpathArg::oid(16_401),
///     FastpathArg::from(1024i32),
///     FastpathArg::from("hello"),
///     FastpathArg::from(None::<i32>),
/// ];
/// assert!(args[3].is_null());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FastpathArg {
    /// NULL argument.
    Null,
    /// `int4` argument.
    Int(i32),
    /// Any other argument, in its binary representation.
    Bytes(Bytes),
}

impl FastpathArg {
    /// `oid` argument.
    ///
    /// Oid is sent in its 4 byte representation, values above [`i32::MAX`] wrap.
    pub fn oid(oid: Oid) -> Self {
        Self::Int(oid as i32)
    }

    /// Returns `true` if argument is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    fn value_len(&self) -> usize {
        match self {
            Self::Null => 0,
            Self::Int(_) => 4,
            Self::Bytes(bytes) => bytes.len(),
        }
    }
}

impl FunctionArg for FastpathArg {
    fn size_hint(&self) -> u32 {
        4 + self.value_len().to_u32()
    }

    fn encode(&self, buf: &mut impl BufMut) {
        match self {
            Self::Null => buf.put_i32(-1),
            Self::Int(int) => {
                buf.put_i32(4);
                buf.put_i32(*int);
            },
            Self::Bytes(bytes) => {
                buf.put_i32(bytes.len().to_i32());
                buf.put_slice(bytes);
            },
        }
    }
}

macro_rules! from {
    (<$ty:ty>$pat:pat => $body:expr) => {
        impl From<$ty> for FastpathArg {
            fn from($pat: $ty) -> Self {
                $body
            }
        }
    };
}

from!(<i32>e => Self::Int(e));
// `int8` binary representation
from!(<i64>e => Self::Bytes(Bytes::copy_from_slice(&e.to_be_bytes())));
from!(<Bytes>e => Self::Bytes(e));
from!(<Vec<u8>>e => Self::Bytes(e.into()));
from!(<&[u8]>e => Self::Bytes(Bytes::copy_from_slice(e)));
from!(<&str>e => Self::Bytes(Bytes::copy_from_slice(e.as_bytes())));
from!(<String>e => Self::Bytes(e.into()));

impl<T: Into<FastpathArg>> From<Option<T>> for FastpathArg {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => value.into(),
            None => Self::Null,
        }
    }
}

#[cfg(test)]
mod test {
    use bytes::BytesMut;

    use super::*;

    fn encoded(arg: FastpathArg) -> BytesMut {
        let mut buf = BytesMut::new();
        arg.encode(&mut buf);
        assert_eq!(buf.len() as u32, arg.size_hint());
        buf
    }

    #[test]
    fn null() {
        assert_eq!(&encoded(FastpathArg::Null)[..], b"\xff\xff\xff\xff");
        assert!(FastpathArg::from(None::<&str>).is_null());
    }

    #[test]
    fn int() {
        assert_eq!(&encoded(FastpathArg::from(-1i32))[..], b"\0\0\0\x04\xff\xff\xff\xff");
        assert_eq!(FastpathArg::oid(u32::MAX), FastpathArg::Int(-1));
    }

    #[test]
    fn long() {
        assert_eq!(
            &encoded(FastpathArg::from(1i64 << 32))[..],
            b"\0\0\0\x08\0\0\0\x01\0\0\0\0"
        );
    }

    #[test]
    fn empty_bytes_is_not_null() {
        let buf = encoded(FastpathArg::from(Vec::new()));
        assert_eq!(&buf[..], b"\0\0\0\0");
    }

    #[test]
    fn text() {
        assert_eq!(&encoded(FastpathArg::from("ab"))[..], b"\0\0\0\x02ab");
    }
}
