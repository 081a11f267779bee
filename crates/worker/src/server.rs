//! Request loop: read JSON lines, execute concurrently, write JSON lines.
//!
//! A line that is not valid UTF-8 or not a valid request is answered with
//! a rejection; only I/O errors on the input end the loop.

use std::io;
use std::sync::Arc;

use shellpilot_core::Engine;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::protocol::{WorkerRequest, WorkerResponse};

/// Serve requests from `input` until EOF or `cancel` fires.
///
/// Each request runs on its own task, at most `max_concurrency` at a time.
/// Cancellation only stops intake: requests already started run to
/// completion and their responses are written before this returns. The
/// output handle is returned so callers can inspect or flush it.
pub async fn serve<I, W>(
    engine: Arc<Engine>,
    input: I,
    output: W,
    cancel: CancellationToken,
    max_concurrency: usize,
) -> io::Result<W>
where
    I: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let max_concurrency = max_concurrency.max(1);
    let (tx, rx) = mpsc::channel::<WorkerResponse>(max_concurrency * 2);
    let writer = tokio::spawn(write_responses(rx, output));

    let semaphore = Arc::new(Semaphore::new(max_concurrency));
    let mut tasks = JoinSet::new();
    let mut segments = input.split(b'\n');
    let mut read_error = None;

    tracing::info!(max_concurrency, "Worker accepting requests");

    loop {
        let segment = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!("Shutdown requested, no longer accepting requests");
                break;
            }
            segment = segments.next_segment() => segment,
        };

        let mut segment = match segment {
            Ok(Some(segment)) => segment,
            Ok(None) => {
                tracing::info!("Input closed");
                break;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to read request");
                read_error = Some(e);
                break;
            }
        };

        if segment.last() == Some(&b'\r') {
            segment.pop();
        }
        let line = match String::from_utf8(segment) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, "Request line is not valid UTF-8");
                let _ = tx.send(WorkerResponse::malformed(&e)).await;
                continue;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        let (id, instruction) = match WorkerRequest::parse(&line) {
            Ok(request) => request.into_parts(),
            Err(e) => {
                tracing::warn!(error = %e, "Malformed request line");
                let _ = tx.send(WorkerResponse::malformed(&e)).await;
                continue;
            }
        };

        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!(id = %id, "Shutdown requested, dropping queued request");
                break;
            }
            permit = Arc::clone(&semaphore).acquire_owned() => permit,
        };
        let Ok(permit) = permit else {
            break;
        };

        let engine = Arc::clone(&engine);
        let tx = tx.clone();
        let span = tracing::info_span!("request", id = %id);
        tasks.spawn(
            async move {
                let _permit = permit;
                let response = engine.handle(instruction).await;
                tracing::info!(
                    success = response.success,
                    exit_code = response.exit_code,
                    "Request finished",
                );
                if tx.send(WorkerResponse::new(id, response)).await.is_err() {
                    tracing::warn!("Response writer closed, dropping response");
                }
            }
            .instrument(span),
        );

        while let Some(joined) = tasks.try_join_next() {
            log_task_result(joined);
        }
    }

    if !tasks.is_empty() {
        tracing::info!(in_flight = tasks.len(), "Waiting for in-flight requests");
    }
    while let Some(joined) = tasks.join_next().await {
        log_task_result(joined);
    }

    drop(tx);
    let output = writer.await.map_err(io::Error::other)??;

    match read_error {
        Some(e) => Err(e),
        None => Ok(output),
    }
}

fn log_task_result(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        tracing::error!(error = %e, "Request task failed");
    }
}

/// Write each response as one JSON line, flushing after every line.
async fn write_responses<W>(mut rx: mpsc::Receiver<WorkerResponse>, mut output: W) -> io::Result<W>
where
    W: AsyncWrite + Unpin,
{
    while let Some(response) = rx.recv().await {
        let mut line = serde_json::to_vec(&response)?;
        line.push(b'\n');
        output.write_all(&line).await?;
        output.flush().await?;
    }
    Ok(output)
}
