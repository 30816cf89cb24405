//! The two tasks that drive a session.
//!
//! The read pump owns the inbound half of the transport and is the only
//! place a session leaves its room. The write pump owns the outbound half,
//! the outbound queue and the liveness ping. They share nothing but the
//! [`Session`]: either one exiting closes it, which stops the other.

use crate::admission;
use crate::app_state::AppState;
use crate::config::Config;
use crate::error::SessionError;
use crate::router;
use crate::session::Session;
use axum::extract::ws::{close_code, CloseFrame, Message};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{self, timeout, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

pub async fn read_pump<R, E>(mut stream: R, session: Arc<Session>, state: AppState)
where
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: fmt::Display,
{
    match read_loop(&mut stream, &session, &state).await {
        Ok(()) => info!(
            conn = %session.conn_id(),
            participant = %session.participant_id(),
            room = %session.room_id(),
            "connection closed"
        ),
        Err(e) => warn!(
            conn = %session.conn_id(),
            participant = %session.participant_id(),
            room = %session.room_id(),
            error = %e,
            "connection dropped"
        ),
    }
    session.close();
    admission::depart(&state, &session).await;
}

async fn read_loop<R, E>(
    stream: &mut R,
    session: &Session,
    state: &AppState,
) -> Result<(), SessionError>
where
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: fmt::Display,
{
    let shutdown = session.shutdown_token();
    let limit = state.config.max_message_size;

    loop {
        // Each iteration re-arms the read deadline, so any frame counts as liveness.
        let next = tokio::select! {
            _ = shutdown.cancelled() => {
                debug!(conn = %session.conn_id(), "session closed locally");
                return Ok(());
            }
            next = timeout(state.config.read_timeout, stream.next()) => next,
        };

        let frame = match next {
            Err(_) => return Err(SessionError::ReadTimeout),
            Ok(None) => return Ok(()),
            Ok(Some(Err(e))) => return Err(SessionError::Transport(e.to_string())),
            Ok(Some(Ok(frame))) => frame,
        };

        let payload: &[u8] = match &frame {
            Message::Text(text) => text.as_bytes(),
            Message::Binary(bytes) => bytes.as_slice(),
            Message::Ping(_) | Message::Pong(_) => continue,
            Message::Close(_) => return Ok(()),
        };
        if payload.len() > limit {
            return Err(SessionError::FrameTooLarge {
                size: payload.len(),
                limit,
            });
        }

        // Per-message failures are already answered by the router.
        let _ = router::route(&state.registry, session, payload).await;
    }
}

pub async fn write_pump<S>(
    mut sink: S,
    mut outbound: mpsc::Receiver<String>,
    session: Arc<Session>,
    config: Arc<Config>,
) where
    S: Sink<Message> + Unpin,
    S::Error: fmt::Display,
{
    if let Err(e) = write_loop(&mut sink, &mut outbound, &config).await {
        warn!(
            conn = %session.conn_id(),
            participant = %session.participant_id(),
            error = %e,
            "write pump failed"
        );
    }
    session.close();
    let _ = timeout(config.write_timeout, sink.close()).await;
}

async fn write_loop<S>(
    sink: &mut S,
    outbound: &mut mpsc::Receiver<String>,
    config: &Config,
) -> Result<(), SessionError>
where
    S: Sink<Message> + Unpin,
    S::Error: fmt::Display,
{
    let mut ping = time::interval_at(Instant::now() + config.ping_interval, config.ping_interval);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            item = outbound.recv() => match item {
                Some(first) => write_burst(sink, outbound, first, config.write_timeout).await?,
                None => {
                    // Queue closed and drained.
                    let close = Message::Close(Some(CloseFrame {
                        code: close_code::NORMAL,
                        reason: Cow::Borrowed(""),
                    }));
                    return with_deadline(config.write_timeout, sink.send(close)).await;
                }
            },
            _ = ping.tick() => {
                with_deadline(config.write_timeout, sink.send(Message::Ping(Vec::new()))).await?;
            }
        }
    }
}

/// Writes `first` plus whatever else is already queued, then flushes once.
async fn write_burst<S>(
    sink: &mut S,
    outbound: &mut mpsc::Receiver<String>,
    first: String,
    deadline: Duration,
) -> Result<(), SessionError>
where
    S: Sink<Message> + Unpin,
    S::Error: fmt::Display,
{
    let burst = async {
        sink.feed(Message::Text(first)).await?;
        while let Ok(next) = outbound.try_recv() {
            sink.feed(Message::Text(next)).await?;
        }
        sink.flush().await?;
        Ok::<_, S::Error>(())
    };
    with_deadline(deadline, burst).await
}

async fn with_deadline<F, E>(deadline: Duration, write: F) -> Result<(), SessionError>
where
    F: Future<Output = Result<(), E>>,
    E: fmt::Display,
{
    match timeout(deadline, write).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(SessionError::Transport(e.to_string())),
        Err(_) => Err(SessionError::WriteTimeout),
    }
}
