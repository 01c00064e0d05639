use crate::{
    orchestrator::{SessionChannels, start_session},
    sender::{FrameInclusion, StreamSender},
};
use connectors::{
    connector::{QueryEngine, QueryExecution},
    convert::ConverterRegistry,
};
use model::{
    frame::Frame,
    query::StreamQuery,
    wire::{CompletedPacket, ProgressPacket},
};
use stream_core::{
    error::{SenderError, SessionError},
    metrics::Metrics,
    settings::DriverSettings,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Foreground half of a streaming session: starts the query, spawns the
/// producer, and forwards frames and progress packets to the sender until
/// the session ends.
pub struct StreamSession {
    settings: DriverSettings,
    converters: ConverterRegistry,
    metrics: Metrics,
}

impl StreamSession {
    pub fn new(settings: DriverSettings, converters: ConverterRegistry) -> Self {
        StreamSession {
            settings,
            converters,
            metrics: Metrics::new(),
        }
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Run one session to completion. Exactly one completion marker is
    /// delivered after the loop exits, on success, error, and
    /// cancellation alike.
    pub async fn run(
        &self,
        engine: &dyn QueryEngine,
        sender: &dyn StreamSender,
        query: StreamQuery,
        cancel: CancellationToken,
    ) -> Result<(), SessionError> {
        // The execution timeout is a child of the caller's token, so the
        // two are indistinguishable once triggered. The deadline task is
        // aborted when the session ends first.
        let session_token = cancel.child_token();
        let deadline_task = self.settings.timeout.map(|timeout| {
            let deadline_token = session_token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                deadline_token.cancel();
            })
        });

        let result = self.run_inner(engine, sender, &query, session_token).await;

        if let Some(task) = deadline_task {
            task.abort();
        }

        match serde_json::to_vec(&CompletedPacket { completed: true }) {
            Ok(bytes) => {
                if let Err(e) = sender.send_json(&bytes).await {
                    warn!(ref_id = %query.ref_id, error = %e, "failed to deliver completion marker");
                }
            }
            Err(e) => warn!(error = %e, "failed to serialize completion marker"),
        }

        result
    }

    async fn run_inner(
        &self,
        engine: &dyn QueryEngine,
        sender: &dyn StreamSender,
        query: &StreamQuery,
        session_token: CancellationToken,
    ) -> Result<(), SessionError> {
        let session_id = Uuid::new_v4();
        info!(
            %session_id,
            ref_id = %query.ref_id,
            format = %query.format,
            "starting streaming session"
        );

        let QueryExecution {
            cursor,
            mut progress,
        } = match engine.start(query).await {
            Ok(execution) => execution,
            Err(e) => {
                let err = SessionError::downstream(e, &session_token);
                if !matches!(err, SessionError::Cancelled) {
                    self.metrics.increment_failures(1);
                }
                return self.finish_with_error(err, query, sender).await;
            }
        };

        let fill = query.fill_mode.or(self.settings.default_fill);
        let mut channels = start_session(
            cursor,
            self.settings.batch,
            self.converters.clone(),
            query.clone(),
            fill,
            session_token.clone(),
            self.metrics.clone(),
            self.settings.frame_channel_capacity,
        );

        let mut progress_open = true;
        loop {
            tokio::select! {
                biased;
                _ = session_token.cancelled() => {
                    debug!(ref_id = %query.ref_id, "session cancelled by caller");
                    return Err(SessionError::Cancelled);
                }
                maybe_err = channels.errors.recv() => match maybe_err {
                    Some(err) => return self.finish_with_error(err, query, sender).await,
                    None => {
                        // Producer closed without a terminal error; frames
                        // already queued still belong to the session.
                        self.drain_frames(&mut channels, sender).await?;
                        self.forward_buffered_progress(&mut progress, sender).await?;
                        return Ok(());
                    }
                },
                maybe_frame = channels.frames.recv() => match maybe_frame {
                    Some(frame) => {
                        sender.send_frame(&frame, FrameInclusion::All).await?;
                    }
                    None => {
                        // Producer is done; a terminal error, if any, is
                        // already queued on the error channel.
                        return match channels.errors.try_recv() {
                            Ok(err) => self.finish_with_error(err, query, sender).await,
                            Err(_) => {
                                self.forward_buffered_progress(&mut progress, sender).await?;
                                Ok(())
                            }
                        };
                    }
                },
                maybe_progress = recv_progress(&mut progress), if progress_open => {
                    match maybe_progress {
                        Some(packet) => {
                            let bytes = serde_json::to_vec(&packet).map_err(SenderError::from)?;
                            sender.send_json(&bytes).await?;
                            self.metrics.increment_progress(1);
                        }
                        // Closure means no more progress, not an error.
                        None => progress_open = false,
                    }
                }
            }
        }
    }

    async fn drain_frames(
        &self,
        channels: &mut SessionChannels,
        sender: &dyn StreamSender,
    ) -> Result<(), SessionError> {
        while let Some(frame) = channels.frames.recv().await {
            sender.send_frame(&frame, FrameInclusion::All).await?;
        }
        Ok(())
    }

    /// Forward progress packets that arrived before the session ended but
    /// lost the race against frame delivery.
    async fn forward_buffered_progress(
        &self,
        progress: &mut mpsc::Receiver<ProgressPacket>,
        sender: &dyn StreamSender,
    ) -> Result<(), SessionError> {
        while let Ok(packet) = progress.try_recv() {
            let bytes = serde_json::to_vec(&packet).map_err(SenderError::from)?;
            sender.send_json(&bytes).await?;
            self.metrics.increment_progress(1);
        }
        Ok(())
    }

    /// Terminal error handling: no-results ends the session quietly,
    /// cancellation publishes nothing; anything else forwards an error
    /// frame carrying the executed SQL before surfacing the error.
    async fn finish_with_error(
        &self,
        err: SessionError,
        query: &StreamQuery,
        sender: &dyn StreamSender,
    ) -> Result<(), SessionError> {
        if err.is_no_results() {
            debug!(ref_id = %query.ref_id, "query returned no results");
            return Ok(());
        }
        if matches!(err, SessionError::Cancelled) {
            return Err(err);
        }

        let error_frame = Frame::error_frame(&query.ref_id, &query.raw_sql);
        sender
            .send_frame(&error_frame, FrameInclusion::All)
            .await?;
        Err(err)
    }
}

async fn recv_progress(progress: &mut mpsc::Receiver<ProgressPacket>) -> Option<ProgressPacket> {
    progress.recv().await
}
