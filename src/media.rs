//! Media binding for remote audio playback
//!
//! The [`MediaBinder`] attaches the remote audio of an established session
//! to a local output sink and controls output gain. It sits between the
//! Media Transport capability (which owns negotiation and hands out
//! [`MediaSource`]s) and the platform audio output (an [`AudioSink`]
//! adapter).
//!
//! The sink is a legitimate transient: it may not be mounted yet when a call
//! establishes. Bind and gain requests are then recorded and replayed once
//! [`MediaBinder::mount_sink`] is called; they are never surfaced as errors.

use std::sync::Arc;

use uuid::Uuid;

/// Opaque binding between a session and the output sink
///
/// Owned by the [`MediaBinder`]; the controller only holds a copy for the
/// matching `unbind` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MediaHandle(Uuid);

impl MediaHandle {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for MediaHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One inbound media track exposed by the Media Transport capability
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaTrack {
    /// Track identifier assigned by the transport
    pub id: String,
    /// Whether the track is currently delivering media
    pub active: bool,
}

/// A playable stream merged from the active inbound tracks of a session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaStream {
    /// Tracks merged into this stream
    pub tracks: Vec<MediaTrack>,
}

/// Media Transport capability: inbound track enumeration for one session
///
/// Implemented by the platform media stack (the receiver list of a
/// peer-connection-like object).
pub trait MediaSource: Send + Sync {
    /// Enumerate the current inbound receivers' tracks
    fn receivers(&self) -> Vec<MediaTrack>;

    /// Notification channel bumped when a track arrives after establishment
    ///
    /// Transports without late tracks can leave the default; the binder then
    /// only sees the receivers present at bind time.
    fn track_events(&self) -> Option<tokio::sync::watch::Receiver<u64>> {
        None
    }
}

/// Platform audio output capability
///
/// All operations are immediate and infallible from the binder's point of
/// view; adapters swallow device-level hiccups or report them out of band.
pub trait AudioSink: Send + Sync {
    /// Attach a stream to the sink
    fn attach(&self, stream: &MediaStream);
    /// Begin playback of the attached stream
    fn play(&self);
    /// Pause playback
    fn pause(&self);
    /// Detach the current stream
    fn detach(&self);
    /// Set output gain (0.0..=1.0)
    fn set_gain(&self, level: f32);
}

struct BoundStream {
    handle: MediaHandle,
    stream: MediaStream,
    /// False while the sink is not mounted and attachment is deferred
    attached: bool,
}

/// Attaches remote media to the output sink and controls gain
///
/// Guarantees at most one bound stream per sink; binding while a handle is
/// already bound performs an implicit unbind first.
pub struct MediaBinder {
    sink: Option<Arc<dyn AudioSink>>,
    bound: Option<BoundStream>,
    /// Retained across binds and applied on the next attach
    gain: f32,
}

impl MediaBinder {
    /// Create a binder, optionally with a sink already mounted
    pub fn new(sink: Option<Arc<dyn AudioSink>>) -> Self {
        Self { sink, bound: None, gain: 1.0 }
    }

    /// Mount the output sink, attaching any deferred binding
    pub fn mount_sink(&mut self, sink: Arc<dyn AudioSink>) {
        if let Some(bound) = &mut self.bound {
            if !bound.attached {
                sink.attach(&bound.stream);
                sink.set_gain(self.gain);
                sink.play();
                bound.attached = true;
                tracing::debug!(handle = %bound.handle, "Attached deferred media binding");
            }
        }
        self.sink = Some(sink);
    }

    /// Bind the active inbound tracks of `source` to the sink and start
    /// playback, returning the handle for the binding
    ///
    /// Implicitly unbinds any previous handle. With no sink mounted the
    /// binding is recorded and attachment deferred.
    pub fn bind(&mut self, source: &Arc<dyn MediaSource>) -> MediaHandle {
        if let Some(previous) = self.bound.take() {
            self.release(previous);
        }

        let tracks: Vec<MediaTrack> =
            source.receivers().into_iter().filter(|track| track.active).collect();
        let stream = MediaStream { tracks };
        let handle = MediaHandle::new();

        let attached = match &self.sink {
            Some(sink) => {
                sink.attach(&stream);
                sink.set_gain(self.gain);
                sink.play();
                true
            }
            None => {
                tracing::debug!(handle = %handle, "Output sink not mounted, deferring attach");
                false
            }
        };

        tracing::info!(handle = %handle, tracks = stream.tracks.len(), "Bound remote media");
        self.bound = Some(BoundStream { handle, stream, attached });
        handle
    }

    /// Unbind a handle: pause playback, detach, release
    ///
    /// Idempotent; unknown or stale handles are a no-op.
    pub fn unbind(&mut self, handle: MediaHandle) {
        match self.bound.take() {
            Some(bound) if bound.handle == handle => {
                tracing::info!(handle = %handle, "Unbound remote media");
                self.release(bound);
            }
            other => {
                // Stale or unknown handle; restore whatever was bound
                self.bound = other;
            }
        }
    }

    /// Set output gain, clamped to 0.0..=1.0
    ///
    /// Applied immediately while a stream is attached; always retained for
    /// the next bind.
    pub fn set_output_level(&mut self, level: f32) {
        self.gain = level.clamp(0.0, 1.0);
        if let (Some(sink), Some(bound)) = (&self.sink, &self.bound) {
            if bound.attached {
                sink.set_gain(self.gain);
            }
        }
    }

    /// Current retained gain
    pub fn output_level(&self) -> f32 {
        self.gain
    }

    /// Whether a stream is currently bound
    pub fn is_bound(&self) -> bool {
        self.bound.is_some()
    }

    fn release(&self, bound: BoundStream) {
        if bound.attached {
            if let Some(sink) = &self.sink {
                sink.pause();
                sink.detach();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct SinkLog {
        events: Mutex<Vec<String>>,
        gain: Mutex<f32>,
    }

    impl SinkLog {
        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    impl AudioSink for SinkLog {
        fn attach(&self, stream: &MediaStream) {
            self.events.lock().unwrap().push(format!("attach:{}", stream.tracks.len()));
        }
        fn play(&self) {
            self.events.lock().unwrap().push("play".into());
        }
        fn pause(&self) {
            self.events.lock().unwrap().push("pause".into());
        }
        fn detach(&self) {
            self.events.lock().unwrap().push("detach".into());
        }
        fn set_gain(&self, level: f32) {
            *self.gain.lock().unwrap() = level;
            self.events.lock().unwrap().push(format!("gain:{}", level));
        }
    }

    struct FixedSource(Vec<MediaTrack>);

    impl MediaSource for FixedSource {
        fn receivers(&self) -> Vec<MediaTrack> {
            self.0.clone()
        }
    }

    fn source_with_tracks() -> Arc<dyn MediaSource> {
        Arc::new(FixedSource(vec![
            MediaTrack { id: "audio-0".into(), active: true },
            MediaTrack { id: "audio-1".into(), active: false },
            MediaTrack { id: "audio-2".into(), active: true },
        ]))
    }

    #[test]
    fn bind_merges_only_active_tracks_and_plays() {
        let sink = Arc::new(SinkLog::default());
        let mut binder = MediaBinder::new(Some(sink.clone()));

        let handle = binder.bind(&source_with_tracks());
        assert!(binder.is_bound());
        assert_eq!(sink.events(), vec!["attach:2", "gain:1", "play"]);

        binder.unbind(handle);
        assert!(!binder.is_bound());
        assert_eq!(sink.events()[3..], ["pause".to_string(), "detach".to_string()]);
    }

    #[test]
    fn rebind_implicitly_unbinds_previous_stream() {
        let sink = Arc::new(SinkLog::default());
        let mut binder = MediaBinder::new(Some(sink.clone()));

        let first = binder.bind(&source_with_tracks());
        let second = binder.bind(&source_with_tracks());
        assert_ne!(first, second);

        let events = sink.events();
        // First bind attaches, second bind pauses/detaches before attaching
        assert_eq!(events[3], "pause");
        assert_eq!(events[4], "detach");
        assert_eq!(events[5], "attach:2");
    }

    #[test]
    fn unbind_is_idempotent_for_unknown_handles() {
        let sink = Arc::new(SinkLog::default());
        let mut binder = MediaBinder::new(Some(sink.clone()));

        let handle = binder.bind(&source_with_tracks());
        binder.unbind(handle);
        binder.unbind(handle);
        assert!(!binder.is_bound());

        // A second bind must not be disturbed by a stale handle
        let fresh = binder.bind(&source_with_tracks());
        binder.unbind(handle);
        assert!(binder.is_bound());
        binder.unbind(fresh);
        assert!(!binder.is_bound());
    }

    #[test]
    fn missing_sink_defers_attach_until_mount() {
        let mut binder = MediaBinder::new(None);
        binder.set_output_level(0.25);
        let _handle = binder.bind(&source_with_tracks());
        assert!(binder.is_bound());

        let sink = Arc::new(SinkLog::default());
        binder.mount_sink(sink.clone());
        assert_eq!(sink.events(), vec!["attach:2", "gain:0.25", "play"]);
    }

    #[test]
    fn gain_is_retained_and_clamped() {
        let sink = Arc::new(SinkLog::default());
        let mut binder = MediaBinder::new(Some(sink.clone()));

        binder.set_output_level(2.5);
        assert_eq!(binder.output_level(), 1.0);
        // No stream bound, so nothing reaches the sink yet
        assert!(sink.events().is_empty());

        binder.set_output_level(0.5);
        let _handle = binder.bind(&source_with_tracks());
        assert_eq!(*sink.gain.lock().unwrap(), 0.5);

        binder.set_output_level(0.75);
        assert_eq!(*sink.gain.lock().unwrap(), 0.75);
    }
}
