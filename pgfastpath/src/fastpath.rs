//! Function call dispatcher.
use std::io;

use bytes::{Buf, Bytes};

use crate::{
    Result,
    arg::FunctionArg,
    codec::{Codec, FastpathValue, UnexpectedResult, V2, V3},
    common::{span, verbose},
    postgres::{Oid, ProtocolVersion},
    registry::{FunctionRegistry, IntoFunctionId},
    transport::PgTransport,
};

/// Function to call, by id or by registered name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Function<'a> {
    Id(i32),
    Name(&'a str),
}

impl From<i32> for Function<'_> {
    fn from(id: i32) -> Self {
        Self::Id(id)
    }
}

impl<'a> From<&'a str> for Function<'a> {
    fn from(name: &'a str) -> Self {
        Self::Name(name)
    }
}

impl<'a> From<&'a String> for Function<'a> {
    fn from(name: &'a String) -> Self {
        Self::Name(name)
    }
}

/// Fastpath function call interface.
///
/// Fastpath calls a server side function directly by its id, without
/// going through the query protocol.
///
/// ```no_run
/// use std::net::TcpStream;
/// use pgfastpath::{Config, Connection, Fastpath, FastpathArg};
///
/// # fn app(socket: TcpStream) -> pgfastpath::Result<()> {
/// let fp = Fastpath::new(Connection::new(socket, Config::new()));
/// fp.add_function("lo_creat", 957);
/// fp.add_function("lo_open", 952);
///
/// let oid = fp.get_oid("lo_creat", &[FastpathArg::from(-1i32)])?;
/// let fd = fp.get_integer("lo_open", &[FastpathArg::oid(oid), FastpathArg::from(0x20000i32)])?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Fastpath<T> {
    conn: T,
    functions: FunctionRegistry,
}

impl<T: PgTransport> Fastpath<T> {
    /// Create fastpath interface with an empty function registry.
    pub fn new(conn: T) -> Self {
        Self::with_registry(conn, FunctionRegistry::new())
    }

    /// Create fastpath interface with a preloaded function registry.
    pub fn with_registry(conn: T, functions: FunctionRegistry) -> Self {
        Self { conn, functions }
    }

    /// Returns the underlying connection.
    pub fn connection(&self) -> &T {
        &self.conn
    }

    /// Returns the function registry.
    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    /// Consume the fastpath interface, returning the underlying connection.
    pub fn into_inner(self) -> T {
        self.conn
    }

    /// Register a function, see [`FunctionRegistry::register`].
    pub fn add_function(&self, name: impl Into<String>, id: i32) {
        self.functions.register(name, id);
    }

    /// Register functions in bulk, see [`FunctionRegistry::register_all`].
    ///
    /// Usually loaded with:
    ///
    /// ```sql
    /// SELECT proname, oid FROM pg_catalog.pg_proc WHERE proname IN ('lo_open', 'lo_close')
    /// ```
    pub fn add_functions<R, N, I>(&self, rows: R) -> Result<usize>
    where
        R: IntoIterator<Item = (N, I)>,
        N: Into<String>,
        I: IntoFunctionId,
    {
        self.functions.register_all(rows)
    }

    /// Returns the id of a registered function.
    pub fn function_id(&self, name: &str) -> Result<i32> {
        self.functions.resolve(name)
    }

    /// Call a function.
    ///
    /// If `want_int` is `true`, a non empty result is decoded as `int4`,
    /// otherwise the result is returned as is.
    ///
    /// The connection is locked for the whole request and response exchange.
    ///
    /// # Errors
    ///
    /// An io error or a protocol violation discards the connection, and any
    /// call afterwards fails without touching the stream.
    ///
    /// # Panics
    ///
    /// Panics if there are more than [`u16::MAX`] arguments, or an argument
    /// is larger than [`i32::MAX`] bytes.
    pub fn call<'a, A: FunctionArg>(
        &self,
        function: impl Into<Function<'a>>,
        want_int: bool,
        args: &[A],
    ) -> Result<FastpathValue> {
        let function_id = match function.into() {
            Function::Id(id) => id,
            Function::Name(name) => self.functions.resolve(name)?,
        };

        span!("fastpath", function_id);

        let result = match self.conn.protocol() {
            ProtocolVersion::V3 => self.exchange(&V3, function_id, want_int, args),
            ProtocolVersion::V2 => self.exchange(&V2, function_id, want_int, args),
        };

        result.map_err(|err| {
            if err.is_fatal() {
                verbose!(%err, "fatal fastpath error");
                self.conn.discard();
            }
            err.context(format!("fastpath call {function_id}"))
        })
    }

    fn exchange<C: Codec, A: FunctionArg>(
        &self,
        codec: &C,
        function_id: i32,
        want_int: bool,
        args: &[A],
    ) -> Result<FastpathValue> {
        let mut stream = self.conn.lock();

        // may be discarded while waiting for the lock
        if self.conn.is_broken() {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "connection was discarded").into());
        }

        stream.sync()?;

        codec.write_call(function_id, args, stream.write_buf());
        stream.flush()?;

        let value = codec.read_result(&mut *stream, want_int, &self.conn)?;
        verbose!(result = value.kind(), "fastpath call done");
        Ok(value)
    }

    /// Call a function by name, expecting an integer result.
    pub fn get_integer<A: FunctionArg>(&self, name: &str, args: &[A]) -> Result<i32> {
        Ok(self.call(name, true, args)?.try_int()?)
    }

    /// Call a function by name, expecting a binary result.
    ///
    /// NULL is not a binary result, thus an error.
    pub fn get_data<A: FunctionArg>(&self, name: &str, args: &[A]) -> Result<Bytes> {
        Ok(self.call(name, false, args)?.try_bytes()?)
    }

    /// Call a function by name, expecting an object id.
    pub fn get_oid<A: FunctionArg>(&self, name: &str, args: &[A]) -> Result<Oid> {
        Ok(self.get_integer(name, args)? as Oid)
    }

    /// Call a function by name, expecting an `int8` result.
    pub fn get_long<A: FunctionArg>(&self, name: &str, args: &[A]) -> Result<i64> {
        let mut data = self.call(name, false, args)?;
        match &mut data {
            FastpathValue::Bytes(bytes) if bytes.len() == 8 => Ok(bytes.get_i64()),
            FastpathValue::Bytes(_) => Err(UnexpectedResult::new("int8", "binary").into()),
            other => Err(UnexpectedResult::new("int8", other.kind()).into()),
        }
    }
}
