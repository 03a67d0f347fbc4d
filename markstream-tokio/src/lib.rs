//! Tokio glue for `markstream`.
//!
//! `markstream` is synchronous and runtime-agnostic. This crate helps async producers:
//!
//! - Coalesce tiny deltas into larger chunks (newline-gated and/or time-window flush), so the
//!   splitter runs once per useful chunk instead of once per token.
//! - Run an actor task that owns the accumulated text and emits [`BlockRegistry`] snapshots.

use std::time::Duration;

use markstream::{BlockRegistry, Splitter};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, trace};

#[derive(Clone, Copy, Debug)]
pub struct CoalesceOptions {
    /// Flush once a newline is observed in the buffered text.
    pub flush_on_newline: bool,
    /// Flush if no flush happened for this duration.
    pub max_delay: Duration,
    /// Flush when buffered bytes reach this limit.
    pub max_bytes: usize,
}

impl Default for CoalesceOptions {
    fn default() -> Self {
        Self {
            flush_on_newline: true,
            max_delay: Duration::from_millis(60),
            max_bytes: 8 * 1024,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CoalescePreset {
    Balanced,
    Fast,
    TimeOnly,
}

impl CoalescePreset {
    pub fn label(self) -> &'static str {
        match self {
            CoalescePreset::Balanced => "balanced",
            CoalescePreset::Fast => "fast",
            CoalescePreset::TimeOnly => "time-only",
        }
    }

    pub fn options(self) -> CoalesceOptions {
        match self {
            CoalescePreset::Balanced => CoalesceOptions {
                flush_on_newline: true,
                max_delay: Duration::from_millis(80),
                max_bytes: 16 * 1024,
            },
            CoalescePreset::Fast => CoalesceOptions {
                flush_on_newline: true,
                max_delay: Duration::from_millis(30),
                max_bytes: 4 * 1024,
            },
            CoalescePreset::TimeOnly => CoalesceOptions {
                flush_on_newline: false,
                max_delay: Duration::from_millis(60),
                max_bytes: 4 * 1024,
            },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlushReason {
    Newline,
    MaxDelay,
    MaxBytes,
    ChannelClosed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoalescedChunk {
    pub text: String,
    pub reason: FlushReason,
    /// Number of input messages merged into this chunk.
    pub merged_messages: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CoalesceStats {
    pub total_in_messages: u64,
    pub total_out_chunks: u64,
    pub total_out_bytes: u64,
    pub last_reason: Option<FlushReason>,
    pub last_merged_messages: usize,
    pub last_bytes: usize,
}

/// Receiver wrapper that merges high-frequency deltas into fewer, larger chunks.
pub struct CoalescingReceiver {
    rx: mpsc::Receiver<String>,
    opts: CoalesceOptions,
    buf: String,
    deadline: Option<Instant>,
    stats: CoalesceStats,
}

impl CoalescingReceiver {
    pub fn new(rx: mpsc::Receiver<String>, opts: CoalesceOptions) -> Self {
        Self {
            rx,
            opts,
            buf: String::new(),
            deadline: None,
            stats: CoalesceStats::default(),
        }
    }

    pub fn set_options(&mut self, opts: CoalesceOptions) {
        self.opts = opts;
        if !self.buf.is_empty() {
            self.deadline = Some(Instant::now() + self.opts.max_delay);
        }
    }

    pub fn options(&self) -> CoalesceOptions {
        self.opts
    }

    pub fn stats(&self) -> CoalesceStats {
        self.stats
    }

    /// Next coalesced chunk; `None` once the channel is closed and nothing is buffered.
    pub async fn recv(&mut self) -> Option<String> {
        self.recv_with_meta().await.map(|c| c.text)
    }

    pub async fn recv_with_meta(&mut self) -> Option<CoalescedChunk> {
        let mut merged = 0usize;

        if self.buf.is_empty() {
            let first = self.rx.recv().await?;
            self.buf.push_str(&first);
            merged += 1;
            self.deadline = Some(Instant::now() + self.opts.max_delay);
        }

        loop {
            if let Some(reason) = self.should_flush_reason() {
                return Some(self.flush(reason, merged));
            }

            let deadline = *self
                .deadline
                .get_or_insert_with(|| Instant::now() + self.opts.max_delay);

            match tokio::time::timeout_at(deadline, self.rx.recv()).await {
                Ok(Some(s)) => {
                    self.buf.push_str(&s);
                    merged += 1;
                }
                Ok(None) if self.buf.is_empty() => return None,
                Ok(None) => return Some(self.flush(FlushReason::ChannelClosed, merged)),
                Err(_) => return Some(self.flush(FlushReason::MaxDelay, merged)),
            }
        }
    }

    fn should_flush_reason(&self) -> Option<FlushReason> {
        if self.buf.len() >= self.opts.max_bytes {
            return Some(FlushReason::MaxBytes);
        }
        if self.opts.flush_on_newline && self.buf.contains('\n') {
            return Some(FlushReason::Newline);
        }
        None
    }

    fn flush(&mut self, reason: FlushReason, merged_messages: usize) -> CoalescedChunk {
        self.deadline = None;
        let text = std::mem::take(&mut self.buf);

        let stats = &mut self.stats;
        stats.total_in_messages = stats.total_in_messages.saturating_add(merged_messages as u64);
        stats.total_out_chunks = stats.total_out_chunks.saturating_add(1);
        stats.total_out_bytes = stats.total_out_bytes.saturating_add(text.len() as u64);
        stats.last_reason = Some(reason);
        stats.last_merged_messages = merged_messages;
        stats.last_bytes = text.len();

        CoalescedChunk {
            text,
            reason,
            merged_messages,
        }
    }
}

/// Spawn a task that accumulates deltas from `rx`, runs `splitter` on every coalesced chunk and
/// emits the resulting snapshots. The last snapshot sent is the finalized one.
///
/// Dropping the returned receiver stops the task at its next send.
pub fn spawn_splitter_actor(
    splitter: Splitter,
    rx: mpsc::Receiver<String>,
    opts: CoalesceOptions,
) -> mpsc::Receiver<BlockRegistry> {
    let (tx_out, rx_out) = mpsc::channel::<BlockRegistry>(64);

    tokio::spawn(async move {
        let mut rx = CoalescingReceiver::new(rx, opts);
        let mut text = String::new();
        let mut registry = splitter.reset_registry();

        while let Some(chunk) = rx.recv_with_meta().await {
            text.push_str(&chunk.text);
            trace!(reason = ?chunk.reason, bytes = chunk.text.len(), "splitting chunk");
            registry = splitter.process_new_content(&registry, &text);
            if tx_out.send(registry.clone()).await.is_err() {
                debug!("snapshot receiver dropped; stopping splitter actor");
                return;
            }
        }

        let finalized = splitter.finalize_active_block(&registry);
        debug!(blocks = finalized.blocks().len(), bytes = text.len(), "stream finished");
        let _ = tx_out.send(finalized).await;
    });

    rx_out
}

#[cfg(test)]
mod tests {
    use super::*;
    use markstream::{BlockKind, Options};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn coalesces_until_newline_by_default() {
        let (tx, rx) = mpsc::channel::<String>(8);
        let mut cr = CoalescingReceiver::new(rx, CoalesceOptions::default());

        tx.send("he".to_string()).await.unwrap();
        tx.send("llo".to_string()).await.unwrap();
        tx.send("\n".to_string()).await.unwrap();

        let got = cr.recv_with_meta().await.unwrap();
        assert_eq!(got.text, "hello\n");
        assert_eq!(got.reason, FlushReason::Newline);
        assert_eq!(got.merged_messages, 3);

        let stats = cr.stats();
        assert_eq!(stats.total_in_messages, 3);
        assert_eq!(stats.total_out_chunks, 1);
        assert_eq!(stats.last_reason, Some(FlushReason::Newline));
    }

    #[tokio::test]
    async fn flushes_remainder_when_channel_closes() {
        let (tx, rx) = mpsc::channel::<String>(8);
        let mut cr = CoalescingReceiver::new(rx, CoalescePreset::TimeOnly.options());
        tx.send("tail".to_string()).await.unwrap();
        drop(tx);

        let got = cr.recv_with_meta().await.unwrap();
        assert_eq!(got.text, "tail");
        assert_eq!(got.reason, FlushReason::ChannelClosed);
        assert_eq!(cr.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn flushes_on_max_delay() {
        let (tx, rx) = mpsc::channel::<String>(8);
        let mut cr = CoalescingReceiver::new(rx, CoalesceOptions::default());
        tx.send("no newline".to_string()).await.unwrap();

        let got = cr.recv_with_meta().await.unwrap();
        assert_eq!(got.reason, FlushReason::MaxDelay);
        assert_eq!(got.text, "no newline");
        drop(tx);
    }

    #[tokio::test]
    async fn actor_emits_snapshots_and_a_finalized_registry() {
        let (tx, rx) = mpsc::channel::<String>(16);
        let mut out = spawn_splitter_actor(
            Splitter::plain_text(Options::default()),
            rx,
            CoalesceOptions::default(),
        );

        for delta in ["# Ti", "tle\n", "\nbody ", "text\n", "\n- it", "em"] {
            tx.send(delta.to_string()).await.unwrap();
        }
        drop(tx);

        let mut last = None;
        while let Some(reg) = out.recv().await {
            last = Some(reg);
        }
        let reg = last.unwrap();
        let kinds: Vec<BlockKind> = reg.blocks().iter().map(|b| b.kind).collect();
        assert_eq!(kinds, vec![BlockKind::Heading, BlockKind::Paragraph, BlockKind::List]);
        assert!(reg.active_block().is_none());
    }
}
