//! Reply bodies.
//!
//! A [`Body`] is a blueprint for a chunk stream, not the stream itself. It is
//! cheap to clone, so functional updates of a [`Reply`](crate::Reply) can copy
//! it freely; the stream only comes into existence when the serving layer
//! calls [`Body::materialize`]. Materializing also yields the
//! [`Materialized`] value of the source, which the serving layer writes into
//! the reply's side channel.
//!
//! | Constructor            | Chunks                         | Reusable | Materialized value |
//! |------------------------|--------------------------------|----------|--------------------|
//! | [`Body::empty`]        | none                           | yes      | `NotUsed`          |
//! | [`Body::full`]         | one                            | yes      | `NotUsed`          |
//! | [`Body::buffered`]     | fixed-size slices of a buffer  | yes      | `NotUsed`          |
//! | [`Body::file`]         | read lazily from disk          | yes      | `NotUsed`          |
//! | [`Body::from_stream`]  | forwarded unchanged            | no       | `NotUsed`          |
//! | [`Body::from_reader`]  | read from an `AsyncRead`       | no       | `NotUsed`          |
//! | [`Body::tick`]         | one per period, until cancelled| yes      | [`Cancellable`]    |
//! | [`Body::lazy`]         | whatever the factory builds    | yes      | factory-defined    |

use crate::cancel::Cancellable;
use crate::error::StreamError;
use crate::materialized::Materialized;
use bytes::Bytes;
use futures_util::stream::{self, BoxStream, StreamExt, TryStreamExt};
use futures_util::Stream;
use parking_lot::Mutex;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::io::ReaderStream;

/// Chunk size used when a bounded buffer is turned into a stream.
pub const DEFAULT_CHUNK_SIZE: usize = 8192;

/// A stream of body chunks.
pub type ChunkStream = BoxStream<'static, Result<Bytes, StreamError>>;

/// A running body: the chunk stream plus the value its source materialized.
pub struct Materialization {
    /// The chunks to drain.
    pub stream: ChunkStream,
    /// The handle produced by the source.
    pub value: Materialized,
}

impl Materialization {
    /// A materialization with no handle.
    #[must_use]
    pub fn new(stream: ChunkStream) -> Self {
        Self {
            stream,
            value: Materialized::NotUsed,
        }
    }

    /// A materialization carrying a handle.
    #[must_use]
    pub fn with_value(stream: ChunkStream, value: Materialized) -> Self {
        Self { stream, value }
    }
}

type Factory = Arc<dyn Fn() -> Materialization + Send + Sync>;

#[derive(Clone)]
enum Source {
    Empty,
    Full(Bytes),
    Buffered { data: Bytes, chunk_size: usize },
    Once(Arc<Mutex<Option<ChunkStream>>>),
    Lazy(Factory),
}

/// The body of a reply.
#[derive(Clone)]
pub struct Body {
    source: Source,
}

impl Body {
    /// A body with no chunks.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            source: Source::Empty,
        }
    }

    /// A body made of a single chunk.
    #[must_use]
    pub fn full(data: impl Into<Bytes>) -> Self {
        Self {
            source: Source::Full(data.into()),
        }
    }

    /// A bounded buffer emitted as chunks of at most [`DEFAULT_CHUNK_SIZE`] bytes.
    #[must_use]
    pub fn buffered(data: impl Into<Bytes>) -> Self {
        Self::buffered_with_chunk_size(data, DEFAULT_CHUNK_SIZE)
    }

    /// A bounded buffer emitted as chunks of at most `chunk_size` bytes.
    #[must_use]
    pub fn buffered_with_chunk_size(data: impl Into<Bytes>, chunk_size: usize) -> Self {
        Self {
            source: Source::Buffered {
                data: data.into(),
                chunk_size: chunk_size.max(1),
            },
        }
    }

    /// Forwards an existing chunk stream unchanged.
    ///
    /// The stream can only be drained once; materializing the body a second
    /// time yields a stream that fails with [`StreamError::AlreadyConsumed`].
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, StreamError>> + Send + 'static,
    {
        Self {
            source: Source::Once(Arc::new(Mutex::new(Some(stream.boxed())))),
        }
    }

    /// Reads chunks from an async reader. Single use, like [`Body::from_stream`].
    pub fn from_reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + 'static,
    {
        Self::from_stream(ReaderStream::new(reader).map_err(StreamError::from))
    }

    /// Streams a file from disk. The file is opened when the body is materialized.
    #[must_use]
    pub fn file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self::lazy(move || {
            let path = path.clone();
            let stream = stream::once(async move { tokio::fs::File::open(path).await })
                .map(|opened| match opened {
                    Ok(file) => ReaderStream::new(file).map_err(StreamError::from).boxed(),
                    Err(err) => stream::once(async move { Err(StreamError::from(err)) }).boxed(),
                })
                .flatten();
            Materialization::new(stream.boxed())
        })
    }

    /// A reusable source built by `factory` on every materialization.
    pub fn lazy<F>(factory: F) -> Self
    where
        F: Fn() -> Materialization + Send + Sync + 'static,
    {
        Self {
            source: Source::Lazy(Arc::new(factory)),
        }
    }

    /// An indefinite stream emitting `make()` after `initial_delay` and then every `period`.
    ///
    /// Each materialization produces a fresh [`Cancellable`] as its
    /// materialized value; the stream ends once it is cancelled. Nothing stops
    /// the stream otherwise.
    pub fn tick<F, T>(initial_delay: Duration, period: Duration, make: F) -> Self
    where
        F: FnMut() -> T + Clone + Send + Sync + 'static,
        T: Into<Bytes>,
    {
        let period = period.max(Duration::from_millis(1));
        Self::lazy(move || {
            let handle = Cancellable::new();
            let state = TickState {
                timer: None,
                handle: handle.clone(),
                make: make.clone(),
            };
            let ticks = stream::unfold(state, move |mut state| async move {
                let fired = {
                    let timer = state.timer.get_or_insert_with(|| {
                        let mut timer = interval_at(Instant::now() + initial_delay, period);
                        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
                        timer
                    });
                    tokio::select! {
                        biased;
                        () = state.handle.cancelled() => false,
                        _ = timer.tick() => true,
                    }
                };
                if !fired {
                    return None;
                }
                let chunk: Bytes = (state.make)().into();
                Some((Ok(chunk), state))
            });
            Materialization::with_value(ticks.boxed(), Materialized::value(handle))
        })
    }

    /// Returns `true` if the body can be materialized more than once.
    #[must_use]
    pub const fn is_reusable(&self) -> bool {
        !matches!(self.source, Source::Once(_))
    }

    /// Returns the exact length in bytes when it is known up front.
    #[must_use]
    pub fn exact_len(&self) -> Option<u64> {
        match &self.source {
            Source::Empty => Some(0),
            Source::Full(data) | Source::Buffered { data, .. } => Some(data.len() as u64),
            Source::Once(_) | Source::Lazy(_) => None,
        }
    }

    /// Starts the source.
    #[must_use]
    pub fn materialize(&self) -> Materialization {
        match &self.source {
            Source::Empty => Materialization::new(stream::empty().boxed()),
            Source::Full(data) => {
                let data = data.clone();
                Materialization::new(stream::once(async move { Ok(data) }).boxed())
            }
            Source::Buffered { data, chunk_size } => {
                let chunks: Vec<Result<Bytes, StreamError>> = (0..data.len())
                    .step_by(*chunk_size)
                    .map(|start| Ok(data.slice(start..(start + chunk_size).min(data.len()))))
                    .collect();
                Materialization::new(stream::iter(chunks).boxed())
            }
            Source::Once(slot) => match slot.lock().take() {
                Some(stream) => Materialization::new(stream),
                None => Materialization::new(
                    stream::once(async { Err(StreamError::AlreadyConsumed) }).boxed(),
                ),
            },
            Source::Lazy(factory) => factory(),
        }
    }

    /// Materializes the body and collects every chunk.
    ///
    /// Never returns for an indefinite stream that nobody cancels.
    pub async fn collect(&self) -> Result<Bytes, StreamError> {
        let mut stream = self.materialize().stream;
        let mut buf = Vec::new();
        while let Some(chunk) = stream.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(Bytes::from(buf))
    }
}

struct TickState<F> {
    timer: Option<tokio::time::Interval>,
    handle: Cancellable,
    make: F,
}

impl Default for Body {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Source::Empty => write!(f, "Body::Empty"),
            Source::Full(data) => write!(f, "Body::Full({} bytes)", data.len()),
            Source::Buffered { data, chunk_size } => {
                write!(f, "Body::Buffered({} bytes / {chunk_size})", data.len())
            }
            Source::Once(_) => write!(f, "Body::Stream"),
            Source::Lazy(_) => write!(f, "Body::Lazy"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    async fn chunks(body: &Body) -> Vec<Bytes> {
        body.materialize()
            .stream
            .map(|chunk| chunk.unwrap())
            .collect()
            .await
    }

    #[tokio::test]
    async fn test_empty_and_full() {
        assert!(chunks(&Body::empty()).await.is_empty());
        assert_eq!(chunks(&Body::full("abc")).await, vec![Bytes::from("abc")]);
        assert_eq!(Body::full("abc").exact_len(), Some(3));
    }

    #[tokio::test]
    async fn test_buffered_splits_into_chunks() {
        let body = Body::buffered_with_chunk_size(vec![7_u8; 10], 4);
        let sizes: Vec<usize> = chunks(&body).await.iter().map(Bytes::len).collect();
        assert_eq!(sizes, vec![4, 4, 2]);

        let large = Body::buffered(vec![0_u8; DEFAULT_CHUNK_SIZE * 2 + 1]);
        assert_eq!(chunks(&large).await.len(), 3);
    }

    #[tokio::test]
    async fn test_stream_body_is_single_use() {
        let body = Body::from_stream(stream::iter(vec![Ok(Bytes::from("a")), Ok(Bytes::from("b"))]));
        assert!(!body.is_reusable());
        assert_eq!(body.collect().await.unwrap(), Bytes::from("ab"));

        let again = body.clone().collect().await;
        assert!(matches!(again, Err(StreamError::AlreadyConsumed)));
    }

    #[tokio::test]
    async fn test_reader_body() {
        let body = Body::from_reader(&b"from a reader"[..]);
        assert_eq!(body.collect().await.unwrap(), Bytes::from("from a reader"));
    }

    #[tokio::test]
    async fn test_file_body_opens_lazily() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"on disk").unwrap();

        let body = Body::file(file.path());
        assert!(body.is_reusable());
        assert_eq!(body.collect().await.unwrap(), Bytes::from("on disk"));
        assert_eq!(body.collect().await.unwrap(), Bytes::from("on disk"));

        let missing = Body::file("/definitely/not/here.txt");
        assert!(matches!(missing.collect().await, Err(StreamError::Io(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_stops_when_cancelled() {
        let mut n = 0_u32;
        let body = Body::tick(Duration::ZERO, Duration::from_secs(1), move || {
            n += 1;
            format!("tick {n}")
        });

        let running = body.materialize();
        let handle = running.value.downcast::<Cancellable>().unwrap();
        let mut stream = running.stream;

        assert_eq!(stream.next().await.unwrap().unwrap(), Bytes::from("tick 1"));
        assert_eq!(stream.next().await.unwrap().unwrap(), Bytes::from("tick 2"));

        assert!(handle.cancel());
        assert!(!handle.cancel());
        assert!(stream.next().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_tick_materialization_is_independent() {
        let body = Body::tick(Duration::ZERO, Duration::from_millis(100), || "x");
        let first = body.materialize();
        let second = body.materialize();

        first.value.downcast::<Cancellable>().unwrap().cancel();
        let mut first_stream = first.stream;
        let mut second_stream = second.stream;
        assert!(first_stream.next().await.is_none());
        assert_eq!(second_stream.next().await.unwrap().unwrap(), Bytes::from("x"));
    }
}
