//! The [`PgTransport`] trait.
use std::{
    io::{Read, Write},
    sync::Arc,
};

use parking_lot::MutexGuard;

use crate::{
    codec::NoticeSink,
    connection::PgStream,
    postgres::{DiagnosticRecord, Notification, ProtocolVersion},
};

/// A shared connection which a function call can be performed on.
///
/// Implementor owns a [`PgStream`] behind a mutex, and the connection level
/// state: the negotiated protocol and whether the connection is broken.
pub trait PgTransport: NoticeSink {
    /// The underlying socket.
    type Io: Read + Write;

    /// The protocol version negotiated at startup.
    fn protocol(&self) -> ProtocolVersion;

    /// Acquire exclusive access to the stream.
    ///
    /// One request and response exchange must be done while holding the guard.
    fn lock(&self) -> MutexGuard<'_, PgStream<Self::Io>>;

    /// Mark the connection as unusable.
    ///
    /// Called when the stream is in unknown state, e.g. after an io error or
    /// a protocol violation. Subsequent calls has no effect.
    fn discard(&self);

    /// Returns `true` if the connection was discarded.
    fn is_broken(&self) -> bool;
}

macro_rules! delegate {
    ($($ty:ty),*) => {$(
        impl<P> NoticeSink for $ty where P: NoticeSink + ?Sized {
            fn notice(&self, notice: DiagnosticRecord) {
                P::notice(self, notice);
            }

            fn notification(&self, notification: Notification) {
                P::notification(self, notification);
            }
        }

        impl<P> PgTransport for $ty where P: PgTransport + ?Sized {
            type Io = P::Io;

            fn protocol(&self) -> ProtocolVersion {
                P::protocol(self)
            }

            fn lock(&self) -> MutexGuard<'_, PgStream<Self::Io>> {
                P::lock(self)
            }

            fn discard(&self) {
                P::discard(self);
            }

            fn is_broken(&self) -> bool {
                P::is_broken(self)
            }
        }
    )*};
}

delegate!(&P, Arc<P>);
