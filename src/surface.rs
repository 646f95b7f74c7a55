//! The rows on screen, seen from the reconciliation core
use crate::types::EditScript;

/// Receives edit scripts on the interaction context, one at a time and in
/// order. Implementations own the visible rows; the core never touches them
/// directly.
pub trait PresentationSurface<T> {
    fn apply_edit_script(&mut self, script: &EditScript<T>);
}

impl<T, S: PresentationSurface<T> + ?Sized> PresentationSurface<T> for Box<S> {
    fn apply_edit_script(&mut self, script: &EditScript<T>) {
        (**self).apply_edit_script(script);
    }
}

/// Headless surface that mirrors the list in a `Vec`.
#[derive(Debug, Clone)]
pub struct VecSurface<T> {
    rows: Vec<T>,
    scripts_applied: usize,
    desynced: bool,
}

impl<T> Default for VecSurface<T> {
    fn default() -> Self {
        VecSurface {
            rows: Vec::new(),
            scripts_applied: 0,
            desynced: false,
        }
    }
}

impl<T> VecSurface<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> &[T] {
        &self.rows
    }

    pub fn scripts_applied(&self) -> usize {
        self.scripts_applied
    }

    /// True once a script failed to replay. The rows may then differ from the
    /// reconciler's baseline.
    pub fn is_desynced(&self) -> bool {
        self.desynced
    }
}

impl<T: Clone> PresentationSurface<T> for VecSurface<T> {
    fn apply_edit_script(&mut self, script: &EditScript<T>) {
        self.scripts_applied += 1;
        if let Err(e) = script.apply_to(&mut self.rows) {
            log::error!("VecSurface: edit script rejected: {e}");
            self.desynced = true;
        }
    }
}
