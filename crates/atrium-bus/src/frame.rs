//! Registry of child frames, owned by the parent window.
//!
//! The parent mints an opaque id per registered frame and resolves inbound
//! `message` sources back to ids by comparing content-window references. Ids
//! never leave the parent except inside `to`/`from` routing lists.

use tracing::debug;

use atrium_common::FrameId;

use crate::window::WindowRef;

/// Handle to a mounted child frame. Wraps the frame's content window, which
/// is both its identity and the target for downward posts.
#[derive(Debug, Clone)]
pub struct FrameHandle {
    content_window: WindowRef,
}

impl FrameHandle {
    pub fn new(content_window: WindowRef) -> Self {
        Self { content_window }
    }

    pub fn content_window(&self) -> &WindowRef {
        &self.content_window
    }
}

/// Maps frame ids to handles, in registration order.
///
/// A `Vec` rather than a map: broadcast fan-out wants stable iteration
/// order, and a window hosts a handful of frames at most.
#[derive(Default)]
pub struct FrameRegistry {
    frames: Vec<(FrameId, FrameHandle)>,
}

impl FrameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a frame and mint its id.
    ///
    /// Registering the same content window twice is rejected: two ids for
    /// one window would corrupt reply addressing for the frame's lifetime.
    pub fn add(&mut self, handle: FrameHandle) -> atrium_common::Result<FrameId> {
        if let Some(existing) = self.id_by_window(handle.content_window()) {
            return Err(atrium_common::BusError::DuplicateFrame(
                existing.to_string(),
            ));
        }
        let id = FrameId::new();
        debug!(frame_id = %id, origin = handle.content_window().origin(), "frame registered");
        self.frames.push((id.clone(), handle));
        Ok(id)
    }

    /// Remove by id. Idempotent: a second call returns `false`.
    pub fn remove(&mut self, id: &FrameId) -> bool {
        let before = self.frames.len();
        self.frames.retain(|(fid, _)| fid != id);
        let removed = self.frames.len() != before;
        if removed {
            debug!(frame_id = %id, "frame removed");
        }
        removed
    }

    /// Remove by reverse lookup on the content window.
    pub fn remove_window(&mut self, window: &WindowRef) -> bool {
        match self.id_by_window(window).cloned() {
            Some(id) => self.remove(&id),
            None => false,
        }
    }

    /// Resolve an inbound message source to a registered frame id.
    pub fn id_by_window(&self, window: &WindowRef) -> Option<&FrameId> {
        self.frames
            .iter()
            .find(|(_, h)| h.content_window().same_window(window))
            .map(|(id, _)| id)
    }

    pub fn get(&self, id: &FrameId) -> Option<&FrameHandle> {
        self.frames
            .iter()
            .find(|(fid, _)| fid == id)
            .map(|(_, h)| h)
    }

    /// All registered frames, in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&FrameId, &FrameHandle)> {
        self.frames.iter().map(|(id, h)| (id, h))
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(origin: &str) -> FrameHandle {
        FrameHandle::new(WindowRef::new(origin))
    }

    #[test]
    fn add_assigns_unique_ids() {
        let mut reg = FrameRegistry::new();
        let a = reg.add(frame("app://a")).unwrap();
        let b = reg.add(frame("app://b")).unwrap();
        assert_ne!(a, b);
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn duplicate_window_is_rejected() {
        let mut reg = FrameRegistry::new();
        let window = WindowRef::new("app://a");
        let id = reg.add(FrameHandle::new(window.clone())).unwrap();

        let err = reg.add(FrameHandle::new(window)).unwrap_err();
        assert!(err.to_string().contains(id.as_str()));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn id_by_window_resolves_only_its_own_id() {
        let mut reg = FrameRegistry::new();
        let wa = WindowRef::new("app://a");
        let wb = WindowRef::new("app://b");
        let a = reg.add(FrameHandle::new(wa.clone())).unwrap();
        let b = reg.add(FrameHandle::new(wb.clone())).unwrap();

        assert_eq!(reg.id_by_window(&wa), Some(&a));
        assert_eq!(reg.id_by_window(&wb), Some(&b));
        assert_eq!(reg.id_by_window(&WindowRef::new("app://c")), None);
    }

    #[test]
    fn remove_is_idempotent() {
        let mut reg = FrameRegistry::new();
        let id = reg.add(frame("app://a")).unwrap();
        assert!(reg.remove(&id));
        assert!(!reg.remove(&id));
        assert!(reg.is_empty());
    }

    #[test]
    fn remove_by_window_is_idempotent() {
        let mut reg = FrameRegistry::new();
        let window = WindowRef::new("app://a");
        reg.add(FrameHandle::new(window.clone())).unwrap();
        assert!(reg.remove_window(&window));
        assert!(!reg.remove_window(&window));
    }

    #[test]
    fn iteration_follows_registration_order() {
        let mut reg = FrameRegistry::new();
        let a = reg.add(frame("app://a")).unwrap();
        let b = reg.add(frame("app://b")).unwrap();
        let c = reg.add(frame("app://c")).unwrap();

        let order: Vec<FrameId> = reg.iter().map(|(id, _)| id.clone()).collect();
        assert_eq!(order, vec![a, b, c]);
    }
}
