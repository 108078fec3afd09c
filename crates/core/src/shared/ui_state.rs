use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Point-in-time view of the observable session state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UiState {
    pub face_count: usize,
    /// True until the camera has produced its first frame.
    pub loading: bool,
    pub recording: bool,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            face_count: 0,
            loading: true,
            recording: false,
        }
    }
}

impl UiState {
    /// Badge text shown next to the video pane.
    pub fn face_label(&self) -> String {
        format!("{} face(s) detected", self.face_count)
    }
}

/// Shared, cloneable handle the annotation loop and recorder write through.
#[derive(Clone, Debug)]
pub struct UiStateHandle {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    face_count: AtomicUsize,
    loading: AtomicBool,
    recording: AtomicBool,
}

impl UiStateHandle {
    pub fn new() -> Self {
        let initial = UiState::default();
        Self {
            inner: Arc::new(Inner {
                face_count: AtomicUsize::new(initial.face_count),
                loading: AtomicBool::new(initial.loading),
                recording: AtomicBool::new(initial.recording),
            }),
        }
    }

    pub fn snapshot(&self) -> UiState {
        UiState {
            face_count: self.inner.face_count.load(Ordering::Acquire),
            loading: self.inner.loading.load(Ordering::Acquire),
            recording: self.inner.recording.load(Ordering::Acquire),
        }
    }

    pub fn set_face_count(&self, count: usize) {
        self.inner.face_count.store(count, Ordering::Release);
    }

    pub fn set_loading(&self, loading: bool) {
        self.inner.loading.store(loading, Ordering::Release);
    }

    pub fn set_recording(&self, recording: bool) {
        self.inner.recording.store(recording, Ordering::Release);
    }
}

impl Default for UiStateHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_is_loading() {
        let state = UiStateHandle::new().snapshot();
        assert!(state.loading);
        assert!(!state.recording);
        assert_eq!(state.face_count, 0);
    }

    #[test]
    fn test_clones_observe_updates() {
        let handle = UiStateHandle::new();
        let observer = handle.clone();
        handle.set_face_count(3);
        handle.set_loading(false);
        handle.set_recording(true);
        assert_eq!(
            observer.snapshot(),
            UiState {
                face_count: 3,
                loading: false,
                recording: true
            }
        );
    }

    #[test]
    fn test_face_label() {
        let state = UiState {
            face_count: 2,
            ..UiState::default()
        };
        assert_eq!(state.face_label(), "2 face(s) detected");
    }
}
