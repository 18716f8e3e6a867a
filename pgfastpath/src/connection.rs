//! Postgres connection.
use std::{
    fmt,
    io::{Read, Write},
    sync::atomic::{AtomicBool, Ordering},
};

use parking_lot::{Mutex, MutexGuard};

use crate::{
    codec::NoticeSink,
    common::verbose,
    postgres::{DiagnosticRecord, Notification, ProtocolVersion},
    transport::PgTransport,
};

mod config;
mod stream;

pub use config::{Config, ParseError};
pub use stream::PgStream;

type Handler<T> = Box<dyn Fn(T) + Send + Sync>;

/// Already established postgres connection.
///
/// Authentication and startup are done by the caller, `Connection` only
/// takes over the socket afterwards. The protocol version must be the one
/// negotiated at startup.
///
/// The stream is behind a mutex, one function call owns it for the whole
/// request and response exchange.
///
/// ```no_run
/// use std::net::TcpStream;
/// use pgfastpath::{Config, Connection};
///
/// # fn app() -> std::io::Result<()> {
/// let socket = TcpStream::connect("localhost:5432")?;
/// // ... startup and authentication
/// let conn = Connection::new(socket, Config::new())
///     .on_notice(|notice| eprintln!("{notice}"))
///     .on_discard(|| eprintln!("connection discarded"));
/// # Ok(())
/// # }
/// ```
pub struct Connection<S> {
    stream: Mutex<PgStream<S>>,
    protocol: ProtocolVersion,
    broken: AtomicBool,
    on_notice: Option<Handler<DiagnosticRecord>>,
    on_notification: Option<Handler<Notification>>,
    on_discard: Option<Box<dyn Fn() + Send + Sync>>,
}

impl<S: Read + Write> Connection<S> {
    /// Wrap an established socket.
    pub fn new(socket: S, config: Config) -> Self {
        Self {
            stream: Mutex::new(PgStream::new(socket, &config)),
            protocol: config.protocol,
            broken: AtomicBool::new(false),
            on_notice: None,
            on_notification: None,
            on_discard: None,
        }
    }

    /// Set the `NoticeResponse` handler.
    ///
    /// Without a handler, notices are logged.
    pub fn on_notice<F>(mut self, f: F) -> Self
    where
        F: Fn(DiagnosticRecord) + Send + Sync + 'static,
    {
        self.on_notice = Some(Box::new(f));
        self
    }

    /// Set the asynchronous notification handler.
    pub fn on_notification<F>(mut self, f: F) -> Self
    where
        F: Fn(Notification) + Send + Sync + 'static,
    {
        self.on_notification = Some(Box::new(f));
        self
    }

    /// Set a hook called once when the connection is discarded.
    pub fn on_discard<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_discard = Some(Box::new(f));
        self
    }

    /// Returns the socket, the connection is consumed.
    pub fn into_inner(self) -> S {
        self.stream.into_inner().into_inner()
    }
}

impl<S> NoticeSink for Connection<S> {
    fn notice(&self, notice: DiagnosticRecord) {
        match &self.on_notice {
            Some(f) => f(notice),
            None => {
                #[cfg(feature = "log")]
                log::warn!("{notice}");
                #[cfg(not(feature = "log"))]
                let _ = notice;
            },
        }
    }

    fn notification(&self, notification: Notification) {
        match &self.on_notification {
            Some(f) => f(notification),
            None => {
                verbose!(channel = %notification.channel, "notification ignored");
                #[cfg(not(feature = "verbose"))]
                let _ = notification;
            },
        }
    }
}

impl<S: Read + Write> PgTransport for Connection<S> {
    type Io = S;

    fn protocol(&self) -> ProtocolVersion {
        self.protocol
    }

    fn lock(&self) -> MutexGuard<'_, PgStream<S>> {
        self.stream.lock()
    }

    fn discard(&self) {
        if self.broken.swap(true, Ordering::AcqRel) {
            return;
        }

        #[cfg(feature = "log")]
        log::error!("connection discarded");

        if let Some(f) = &self.on_discard {
            f();
        }
    }

    fn is_broken(&self) -> bool {
        self.broken.load(Ordering::Acquire)
    }
}

impl<S> fmt::Debug for Connection<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("protocol", &self.protocol)
            .field("broken", &self.broken.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
