// src/toast.rs

use std::sync::Mutex;

use log::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Info,
    Success,
    Warning,
    Danger,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Toast {
    pub id: u64,
    pub title: String,
    pub body: String,
    pub css: ToastKind,
}

/// Fire-and-forget notification sink. Callers never block on it or inspect
/// results; the shell drains it whenever it redraws.
#[derive(Default)]
pub struct ToastStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    toasts: Vec<Toast>,
}

impl ToastStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_toast(&self, title: impl Into<String>, body: impl Into<String>, css: ToastKind) {
        let title = title.into();
        let body = body.into();
        match css {
            ToastKind::Danger => error!("{title}: {body}"),
            ToastKind::Warning => warn!("{title}: {body}"),
            _ => info!("{title}: {body}"),
        }

        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id;
        inner.next_id += 1;
        // Newest first.
        inner.toasts.insert(0, Toast { id, title, body, css });
    }

    pub fn success(&self, title: impl Into<String>, body: impl Into<String>) {
        self.add_toast(title, body, ToastKind::Success);
    }

    pub fn warning(&self, title: impl Into<String>, body: impl Into<String>) {
        self.add_toast(title, body, ToastKind::Warning);
    }

    pub fn toasts(&self) -> Vec<Toast> {
        self.inner.lock().unwrap().toasts.clone()
    }

    pub fn drain(&self) -> Vec<Toast> {
        std::mem::take(&mut self.inner.lock().unwrap().toasts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toasts_are_ordered_newest_first() {
        let store = ToastStore::new();
        store.success("first", "a");
        store.warning("second", "b");

        let toasts = store.toasts();
        assert_eq!(toasts.len(), 2);
        assert_eq!(toasts[0].title, "second");
        assert_eq!(toasts[0].css, ToastKind::Warning);
        assert_eq!(toasts[1].title, "first");
        assert!(toasts[0].id > toasts[1].id);
    }

    #[test]
    fn drain_empties_the_store() {
        let store = ToastStore::new();
        store.add_toast("t", "b", ToastKind::Info);
        assert_eq!(store.drain().len(), 1);
        assert!(store.toasts().is_empty());
    }
}
