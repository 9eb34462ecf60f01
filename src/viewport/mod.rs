pub mod background;

use std::rc::Rc;
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::future::LocalBoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use background::{
    BackgroundBuffer, BackgroundSource, ImageBackground, scaled_width, sync_background, visible_columns,
};

// ── Errors ──────────────────────────────────────────────────────────────────

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ViewportError {
    #[error(
        "window {window_width}x{window_height} leaves no room for a viewport \
         (margins {margin_x}x{margin_y}, minimum {min_width}x{min_height})"
    )]
    TooSmall {
        window_width: u32,
        window_height: u32,
        margin_x: u32,
        margin_y: u32,
        min_width: u32,
        min_height: u32,
    },
    #[error("reference image has no pixels")]
    EmptyImage,
    #[error("failed to decode reference image: {0}")]
    Decode(String),
    #[error("failed to read '{path}': {reason}")]
    Asset { path: String, reason: String },
}

// ── Margins / Viewport ──────────────────────────────────────────────────────

/// Space the page keeps around the drawable area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Margins {
    pub horizontal: u32,
    pub vertical: u32,
}

impl Default for Margins {
    fn default() -> Self {
        Self { horizontal: 40, vertical: 200 }
    }
}

/// Dimensions of the active drawable rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    /// Always `false`: pixel art is scaled nearest-neighbour.
    pub smoothing: bool,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height, smoothing: false }
    }

    /// Number of pixels covered by the viewport.
    pub fn area(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Computes viewports from window sizes and sequences background syncs.
///
/// # Sequencing
///
/// A sync sequence is "build the background buffer, then hand the buffer and
/// the new size to the engine". Only one sequence is ever in flight. Requests
/// that arrive meanwhile collapse into a single queued viewport (the latest
/// one). When the in-flight sequence finishes with a different request queued,
/// its result is stale and is dropped; the queued request starts instead. The
/// engine therefore never receives dimensions from an overtaken sequence. If
/// the queued request matches the finished one (the window was resized away
/// and back), the result is applied and nothing reruns.
///
/// While resize events keep arriving faster than a sync completes, every
/// result is overtaken and the engine keeps its previous size until the
/// window settles.
pub struct ViewportManager {
    margins: Margins,
    min_width: u32,
    min_height: u32,
    current: Option<Viewport>,
    background: Option<Rc<dyn BackgroundSource>>,
    in_flight: Option<InFlight>,
    queued: Option<Viewport>,
}

struct InFlight {
    viewport: Viewport,
    future: LocalBoxFuture<'static, Result<BackgroundBuffer, ViewportError>>,
}

/// A finished sync sequence, ready to be applied to the engine.
#[derive(Debug)]
pub struct ViewportSync {
    pub viewport: Viewport,
    /// `None` when no background source is configured.
    pub background: Option<BackgroundBuffer>,
}

/// What happened to a resync request.
#[derive(Debug)]
pub enum SyncRequest {
    /// No background to build; apply right away.
    Ready(ViewportSync),
    /// A new sequence was started; drive it with `poll_sync`.
    Started(Viewport),
    /// Another sequence is in flight; this viewport runs after it.
    Queued(Viewport),
}

impl ViewportManager {
    pub fn new(margins: Margins) -> Self {
        Self {
            margins,
            min_width: 1,
            min_height: 1,
            current: None,
            background: None,
            in_flight: None,
            queued: None,
        }
    }

    /// Smallest viewport `recompute` accepts. Clamped to at least 1×1.
    pub fn with_min_size(mut self, min_width: u32, min_height: u32) -> Self {
        self.min_width = min_width.max(1);
        self.min_height = min_height.max(1);
        self
    }

    pub fn with_background(mut self, source: Rc<dyn BackgroundSource>) -> Self {
        self.background = Some(source);
        self
    }

    pub fn margins(&self) -> Margins { self.margins }

    /// The viewport most recently computed from a window size.
    pub fn current(&self) -> Option<Viewport> { self.current }

    pub fn has_background(&self) -> bool { self.background.is_some() }

    /// `true` while a background sync is running.
    pub fn is_syncing(&self) -> bool { self.in_flight.is_some() }

    /// Window size minus the fixed margins.
    ///
    /// Pure: depends only on its arguments and the configured margins. Fails
    /// instead of producing a zero-sized or negative viewport.
    pub fn recompute(&self, window_width: u32, window_height: u32) -> Result<Viewport, ViewportError> {
        let width = window_width.saturating_sub(self.margins.horizontal);
        let height = window_height.saturating_sub(self.margins.vertical);
        if width < self.min_width || height < self.min_height {
            return Err(ViewportError::TooSmall {
                window_width,
                window_height,
                margin_x: self.margins.horizontal,
                margin_y: self.margins.vertical,
                min_width: self.min_width,
                min_height: self.min_height,
            });
        }
        Ok(Viewport::new(width, height))
    }

    /// Recomputes the viewport for a new window size and schedules a full
    /// resync.
    pub fn request(&mut self, window_width: u32, window_height: u32) -> Result<SyncRequest, ViewportError> {
        let viewport = self.recompute(window_width, window_height)?;
        self.current = Some(viewport);

        if self.in_flight.is_some() {
            if let Some(old) = self.queued.replace(viewport) {
                tracing::debug!(?old, new = ?viewport, "coalesced queued viewport sync");
            }
            return Ok(SyncRequest::Queued(viewport));
        }
        Ok(self.begin(viewport))
    }

    /// Drives the in-flight sequence.
    ///
    /// Returns `Ready(None)` when nothing is in flight, `Ready(Some(..))` with
    /// the outcome of a sequence that finished and was not overtaken.
    pub fn poll_sync(&mut self, cx: &mut Context<'_>) -> Poll<Option<Result<ViewportSync, ViewportError>>> {
        loop {
            let Some(in_flight) = self.in_flight.as_mut() else {
                return Poll::Ready(None);
            };
            let result = match in_flight.future.poll_unpin(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(result) => result,
            };
            let viewport = in_flight.viewport;
            self.in_flight = None;

            // A queued request for the size that just finished needs no rerun.
            if self.queued == Some(viewport) {
                self.queued = None;
            }
            if let Some(next) = self.queued.take() {
                tracing::debug!(stale = ?viewport, ?next, "dropping overtaken viewport sync");
                match self.begin(next) {
                    SyncRequest::Ready(sync) => return Poll::Ready(Some(Ok(sync))),
                    _ => continue,
                }
            }

            return Poll::Ready(Some(result.map(|buffer| ViewportSync {
                viewport,
                background: Some(buffer),
            })));
        }
    }

    /// Drops any running or queued sync and forgets the current viewport.
    pub fn release(&mut self) {
        self.in_flight = None;
        self.queued = None;
        self.current = None;
    }

    fn begin(&mut self, viewport: Viewport) -> SyncRequest {
        let Some(source) = self.background.as_ref() else {
            return SyncRequest::Ready(ViewportSync { viewport, background: None });
        };
        let load = source.load();
        let future = async move {
            let image = load.await?;
            sync_background(viewport, &image)
        }
        .boxed_local();
        self.in_flight = Some(InFlight { viewport, future });
        SyncRequest::Started(viewport)
    }
}
