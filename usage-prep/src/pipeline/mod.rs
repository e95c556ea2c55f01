use std::{pin::Pin, sync::Arc};

use futures::{Stream, StreamExt};

/// A record plus the 1-based row it was read from.
#[derive(Debug, Clone)]
pub struct Envelope<T> {
    pub payload: T,
    pub row: u64,
}

impl<T> Envelope<T> {
    pub fn new(payload: T, row: u64) -> Self {
        Self { payload, row }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Envelope<U> {
        Envelope {
            payload: f(self.payload),
            row: self.row,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("source error: {0}")]
    Source(String),
    /// A single input row was rejected; the rest of the input is still readable.
    #[error("row {row}: {message}")]
    Record { row: u64, message: String },
    #[error("transform error: {0}")]
    Transform(String),
    #[error("sink error: {0}")]
    Sink(String),
}

pub type EnvelopeStream<T> = Pin<Box<dyn Stream<Item = Result<Envelope<T>, PipelineError>> + Send>>;

#[async_trait::async_trait]
pub trait Source<T>: Send + Sync {
    async fn stream(&self) -> EnvelopeStream<T>;
}

#[async_trait::async_trait]
pub trait Transform<I, O>: Send + Sync {
    async fn apply(&self, input: Envelope<I>) -> Result<Envelope<O>, PipelineError>;
}

impl PipelineError {
    pub fn record(row: u64, message: impl Into<String>) -> Self {
        Self::Record {
            row,
            message: message.into(),
        }
    }

    /// Whether the error concerns one row only.
    pub fn is_record(&self) -> bool {
        matches!(self, Self::Record { .. })
    }
}

#[async_trait::async_trait]
pub trait Sink<T>: Send + Sync {
    async fn run<S>(&self, input: S) -> Result<(), PipelineError>
    where
        S: Stream<Item = Result<Envelope<T>, PipelineError>> + Send + Unpin + 'static;
}

pub type TransformChain<T> = Vec<Arc<dyn Transform<T, T> + Send + Sync>>;

/// Apply same-type transforms in sequence; errors pass through untouched.
pub fn chain_transforms<T>(mut stream: EnvelopeStream<T>, transforms: &TransformChain<T>) -> EnvelopeStream<T>
where
    T: Send + 'static,
{
    for t in transforms {
        let t_arc = t.clone();
        stream = Box::pin(stream.then(move |item| {
            let t_inner = t_arc.clone();
            async move {
                match item {
                    Ok(env) => t_inner.apply(env).await,
                    Err(e) => Err(e),
                }
            }
        }));
    }
    stream
}

/// Drain a source through its transforms into memory.
///
/// When `strict` is false, single-row rejections are logged, counted and
/// skipped; any other error still aborts.
pub async fn collect<T, S>(
    source: &S,
    transforms: &TransformChain<T>,
    strict: bool,
) -> Result<Vec<Envelope<T>>, PipelineError>
where
    T: Send + 'static,
    S: Source<T> + ?Sized,
{
    let mut stream = chain_transforms(source.stream().await, transforms);
    let mut out = Vec::new();

    while let Some(item) = stream.next().await {
        match item {
            Ok(env) => out.push(env),
            Err(e) if !strict && e.is_record() => {
                tracing::warn!(error = %e, "skipping rejected row");
                metrics::counter!("pipeline_rows_skipped_total").increment(1);
            }
            Err(e) => return Err(e),
        }
    }

    Ok(out)
}

pub struct Pipeline<S, T, K> {
    pub source: S,
    pub transforms: TransformChain<T>,
    pub sink: K,
}

impl<T, S, K> Pipeline<S, T, K>
where
    T: Send + 'static,
    S: Source<T> + Send + Sync + 'static,
    K: Sink<T> + Send + Sync + 'static,
{
    pub async fn run(self) -> Result<(), PipelineError> {
        let stream = chain_transforms(self.source.stream().await, &self.transforms);
        self.sink.run(stream).await
    }
}
