//! # Streaming Session
//!
//! A pull-based, single-consumer protocol for handing records to a transport
//! layer one at a time.
//!
//! ```text
//! Idle --init--> Prepared --next--> Streaming --next (end)--> Exhausted
//!                   ^                                             |
//!                   +---------------------init--------------------+
//! ```
//!
//! The session owns its cursor. Calling [`StreamingSession::init`] while a
//! sequence is still being served silently replaces it: there is exactly one
//! live sequence per session, and a session must not be shared between
//! concurrent consumers.
//!
//! [`DataDirSession`] binds a session to a directory of record files laid out
//! as `<root>/<zoom>/**/*.json` and maps its results onto transport statuses.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::walker::FileWalker;

/// Lifecycle of a [`StreamingSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Prepared,
    Streaming,
    Exhausted,
}

/// A unit of the sequence that could not be produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitFailure {
    pub unit: String,
    pub reason: String,
}

/// One step of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Next<R> {
    Record(R),
    /// This unit failed; the session carries on with the next one.
    NotFound(UnitFailure),
    EndOfStream,
}

type Cursor<R> = Box<dyn Iterator<Item = Result<R, UnitFailure>> + Send>;

/// Single-consumer session over a lazily produced sequence of records.
pub struct StreamingSession<R> {
    state: SessionState,
    cursor: Option<Cursor<R>>,
    served: usize,
}

impl<R> Default for StreamingSession<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> StreamingSession<R> {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            cursor: None,
            served: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Units handed out since the last `init`, failures included.
    pub fn served(&self) -> usize {
        self.served
    }

    /// Start serving `sequence`, discarding any sequence still in flight.
    pub fn init<I>(&mut self, sequence: I)
    where
        I: IntoIterator<Item = Result<R, UnitFailure>>,
        I::IntoIter: Send + 'static,
    {
        if matches!(self.state, SessionState::Prepared | SessionState::Streaming) {
            info!("[StreamingSession] Superseding in-flight sequence after {} units", self.served);
        }
        self.cursor = Some(Box::new(sequence.into_iter()));
        self.served = 0;
        self.state = SessionState::Prepared;
    }

    /// Advance to the next unit.
    ///
    /// Fails only when called before any `init`. Once exhausted, keeps
    /// returning [`Next::EndOfStream`] until the next `init`.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<Next<R>, SessionError> {
        if self.state == SessionState::Idle {
            warn!("[StreamingSession] next called before init");
            return Err(SessionError::NotInitialized);
        }

        let Some(unit) = self.cursor.as_mut().and_then(|cursor| cursor.next()) else {
            if self.state != SessionState::Exhausted {
                info!("[StreamingSession] Exhausted after {} units", self.served);
            }
            self.cursor = None;
            self.state = SessionState::Exhausted;
            return Ok(Next::EndOfStream);
        };

        self.state = SessionState::Streaming;
        self.served += 1;
        Ok(match unit {
            Ok(record) => Next::Record(record),
            Err(failure) => {
                warn!("[StreamingSession] {} unavailable: {}", failure.unit, failure.reason);
                Next::NotFound(failure)
            }
        })
    }
}

// =============================================================================
// Transport mapping
// =============================================================================

/// Status and optional body handed to the transport layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Option<Vec<u8>>,
}

impl TransportResponse {
    pub const OK: u16 = 200;
    pub const NO_CONTENT: u16 = 204;
    pub const BAD_REQUEST: u16 = 400;
    pub const NOT_FOUND: u16 = 404;

    fn status(status: u16) -> Self {
        Self { status, body: None }
    }

    /// Map the outcome of a `next` call.
    ///
    /// End of stream is a success without a body, so consumers stop on 204.
    pub fn from_next(next: Result<Next<Vec<u8>>, SessionError>) -> Self {
        match next {
            Ok(Next::Record(body)) => Self {
                status: Self::OK,
                body: Some(body),
            },
            Ok(Next::NotFound(_)) => Self::status(Self::NOT_FOUND),
            Ok(Next::EndOfStream) => Self::status(Self::NO_CONTENT),
            Err(SessionError::NotInitialized) => Self::status(Self::BAD_REQUEST),
        }
    }
}

// =============================================================================
// Data-directory session
// =============================================================================

/// Where a [`DataDirSession`] finds its records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Root of the record tree.
    /// Default: "data"
    pub data_root: PathBuf,

    /// Extension of record files.
    /// Default: "json"
    pub extension: String,

    /// Zoom subdirectory used when `init` names none.
    /// Default: none (serve the whole root)
    pub default_zoom: Option<u8>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("data"),
            extension: "json".to_string(),
            default_zoom: None,
        }
    }
}

/// Parameters of an `init` call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitParams {
    pub zoom: Option<u8>,
    /// Directory to serve, relative to the data root; overrides `zoom`.
    pub path: Option<PathBuf>,
}

/// A [`StreamingSession`] over the raw bytes of record files.
pub struct DataDirSession {
    config: SessionConfig,
    session: StreamingSession<Vec<u8>>,
}

impl DataDirSession {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            session: StreamingSession::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Directory served for `params`.
    pub fn source_dir(&self, params: &InitParams) -> PathBuf {
        if let Some(path) = &params.path {
            return self.config.data_root.join(path);
        }
        match params.zoom.or(self.config.default_zoom) {
            Some(zoom) => self.config.data_root.join(zoom.to_string()),
            None => self.config.data_root.clone(),
        }
    }

    pub fn init(&mut self, params: &InitParams) {
        let dir = self.source_dir(params);
        info!("[DataDirSession] Serving {}", dir.display());
        let records = FileWalker::new(dir)
            .with_extension(self.config.extension.clone())
            .map(|path| read_unit(&path));
        self.session.init(records);
    }

    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<Next<Vec<u8>>, SessionError> {
        self.session.next()
    }

    /// `init`, answered with 204 and no body.
    pub fn respond_init(&mut self, params: &InitParams) -> TransportResponse {
        self.init(params);
        TransportResponse::status(TransportResponse::NO_CONTENT)
    }

    /// `next`, answered with 200 and the record, 404 for an unreadable unit,
    /// 204 at the end of the stream or 400 before `init`.
    pub fn respond_next(&mut self) -> TransportResponse {
        TransportResponse::from_next(self.next())
    }
}

fn read_unit(path: &Path) -> Result<Vec<u8>, UnitFailure> {
    debug!("[DataDirSession] --i--> {}", path.display());
    fs::read(path).map_err(|e| UnitFailure {
        unit: path.display().to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn records(items: &[&str]) -> Vec<Result<String, UnitFailure>> {
        items.iter().map(|s| Ok(s.to_string())).collect()
    }

    #[test]
    fn test_next_before_init_is_an_error() {
        let mut session: StreamingSession<String> = StreamingSession::new();
        assert_eq!(session.next(), Err(SessionError::NotInitialized));
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn test_lifecycle() {
        let mut session = StreamingSession::new();
        session.init(records(&["a", "b"]));
        assert_eq!(session.state(), SessionState::Prepared);

        assert_eq!(session.next(), Ok(Next::Record("a".to_string())));
        assert_eq!(session.state(), SessionState::Streaming);
        assert_eq!(session.next(), Ok(Next::Record("b".to_string())));
        assert_eq!(session.next(), Ok(Next::EndOfStream));
        assert_eq!(session.state(), SessionState::Exhausted);
        assert_eq!(session.next(), Ok(Next::EndOfStream));
        assert_eq!(session.served(), 2);

        session.init(records(&["c"]));
        assert_eq!(session.state(), SessionState::Prepared);
        assert_eq!(session.next(), Ok(Next::Record("c".to_string())));
    }

    #[test]
    fn test_empty_sequence_goes_straight_to_exhausted() {
        let mut session: StreamingSession<String> = StreamingSession::new();
        session.init(Vec::new());
        assert_eq!(session.next(), Ok(Next::EndOfStream));
        assert_eq!(session.state(), SessionState::Exhausted);
    }

    #[test]
    fn test_init_supersedes_in_flight_sequence() {
        let mut session = StreamingSession::new();
        session.init(records(&["a", "b", "c"]));
        session.next().unwrap();

        session.init(records(&["x"]));
        assert_eq!(session.served(), 0);
        assert_eq!(session.next(), Ok(Next::Record("x".to_string())));
        assert_eq!(session.next(), Ok(Next::EndOfStream));
    }

    #[test]
    fn test_failed_unit_does_not_end_session() {
        let mut session = StreamingSession::new();
        let failure = UnitFailure {
            unit: "u1".to_string(),
            reason: "gone".to_string(),
        };
        session.init(vec![Err(failure.clone()), Ok(7)]);

        assert_eq!(session.next(), Ok(Next::NotFound(failure)));
        assert_eq!(session.state(), SessionState::Streaming);
        assert_eq!(session.next(), Ok(Next::Record(7)));
        assert_eq!(session.next(), Ok(Next::EndOfStream));
    }

    #[test]
    fn test_sequence_is_lazy() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let produced = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&produced);
        let mut session = StreamingSession::new();
        session.init((0..100).map(move |i| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, UnitFailure>(i)
        }));

        assert_eq!(produced.load(Ordering::SeqCst), 0);
        session.next().unwrap();
        session.next().unwrap();
        assert_eq!(produced.load(Ordering::SeqCst), 2);
    }

    fn data_dir() -> (TempDir, DataDirSession) {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("14/2023")).unwrap();
        fs::create_dir_all(root.join("15")).unwrap();
        fs::write(root.join("14/a.json"), b"{\"a\":1}").unwrap();
        fs::write(root.join("14/2023/b.json"), b"{\"b\":2}").unwrap();
        fs::write(root.join("14/notes.txt"), b"skip").unwrap();
        fs::write(root.join("15/c.json"), b"{\"c\":3}").unwrap();

        let session = DataDirSession::new(SessionConfig {
            data_root: root.to_path_buf(),
            ..SessionConfig::default()
        });
        (temp, session)
    }

    #[test]
    fn test_data_dir_serves_zoom_directory_in_order() {
        let (_temp, mut session) = data_dir();
        assert_eq!(
            session.respond_init(&InitParams { zoom: Some(14), path: None }).status,
            204
        );

        let first = session.respond_next();
        assert_eq!(first.status, 200);
        assert_eq!(first.body.as_deref(), Some(&b"{\"b\":2}"[..]));
        let second = session.respond_next();
        assert_eq!(second.body.as_deref(), Some(&b"{\"a\":1}"[..]));
        assert_eq!(session.respond_next(), TransportResponse { status: 204, body: None });
        assert_eq!(session.state(), SessionState::Exhausted);
    }

    #[test]
    fn test_data_dir_transport_errors() {
        let (_temp, mut session) = data_dir();
        assert_eq!(session.respond_next().status, 400);

        session.init(&InitParams {
            zoom: None,
            path: Some(PathBuf::from("15")),
        });
        assert_eq!(session.respond_next().status, 200);
        assert_eq!(session.respond_next().status, 204);
    }

    #[test]
    fn test_data_dir_default_zoom() {
        let (temp, _) = data_dir();
        let session = DataDirSession::new(SessionConfig {
            data_root: temp.path().to_path_buf(),
            default_zoom: Some(15),
            ..SessionConfig::default()
        });
        assert_eq!(session.source_dir(&InitParams::default()), temp.path().join("15"));
        assert_eq!(
            session.source_dir(&InitParams { zoom: Some(14), path: None }),
            temp.path().join("14")
        );
    }

    #[test]
    fn test_unreadable_unit_maps_to_not_found() {
        assert_eq!(
            TransportResponse::from_next(Ok(Next::NotFound(UnitFailure {
                unit: "x".to_string(),
                reason: "denied".to_string(),
            })))
            .status,
            404
        );
        assert!(read_unit(Path::new("/definitely/missing.json")).is_err());
    }
}
