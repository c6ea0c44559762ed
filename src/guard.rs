//! Temporary ownership of a model's submit slot.
//!
//! A [`SubmitGuard`] holds `{original, wrapped}`: installing swaps the
//! wrapper into the model, restoring puts back exactly the function that was
//! there at install time. A model carries a lease so that a second guard
//! cannot capture the first one's wrapper as its "original".
//!
//! The wrapper cannot dispose the panel directly (the panel is borrowed by
//! whoever is delivering the event), so it raises a [`CloseSignal`] that the
//! panel settles once the event handler returns.

use std::cell::Cell;
use std::rc::Rc;

use tracing::{debug, warn};

use crate::error::{GuardError, ModelError};
use crate::model::{SharedModel, SubmitFn};

/// Why a panel went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// A non-blank submission went through the guarded submit slot.
    Submitted,
    OutsideClick,
    /// Header close control.
    Closed,
    /// Escape inside the input.
    Cancelled,
    /// The host command toggled the panel off.
    Toggled,
    /// Attaching failed part way.
    Failed,
}

impl CloseReason {
    pub fn as_str(self) -> &'static str {
        match self {
            CloseReason::Submitted => "submitted",
            CloseReason::OutsideClick => "outside-click",
            CloseReason::Closed => "closed",
            CloseReason::Cancelled => "cancelled",
            CloseReason::Toggled => "toggled",
            CloseReason::Failed => "failed",
        }
    }
}

/// Deferred close request shared between a panel and its callbacks.
///
/// The first request wins; later ones are ignored until the signal is
/// taken.
#[derive(Debug, Clone, Default)]
pub struct CloseSignal(Rc<Cell<Option<CloseReason>>>);

impl CloseSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self, reason: CloseReason) {
        if self.0.get().is_none() {
            self.0.set(Some(reason));
        }
    }

    pub fn is_pending(&self) -> bool {
        self.0.get().is_some()
    }

    pub fn take(&self) -> Option<CloseReason> {
        self.0.take()
    }
}

pub struct SubmitGuard {
    model: SharedModel,
    original: Option<SubmitFn>,
    wrapped: SubmitFn,
    token: Rc<()>,
}

impl std::fmt::Debug for SubmitGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmitGuard")
            .field("installed", &self.is_installed())
            .finish_non_exhaustive()
    }
}

impl SubmitGuard {
    /// Wrap the model's submit slot. The wrapper runs the original submit to
    /// completion and then calls `after_submit`.
    pub fn install<F>(model: &SharedModel, after_submit: F) -> Result<Self, GuardError>
    where
        F: Fn() + 'static,
    {
        let mut inner = model.try_borrow_mut().map_err(|_| ModelError::Busy)?;
        if inner.is_leased() {
            return Err(GuardError::AlreadyInstalled);
        }
        let original = inner.submit_fn();
        let call_through = Rc::clone(&original);
        let wrapped: SubmitFn = Rc::new(move |text: &str| {
            call_through(text);
            after_submit();
        });
        let token = Rc::new(());
        inner.set_submit_fn(Rc::clone(&wrapped));
        inner.set_lease(Rc::downgrade(&token));
        drop(inner);
        debug!("submit guard installed");
        Ok(Self {
            model: Rc::clone(model),
            original: Some(original),
            wrapped,
            token,
        })
    }

    pub fn is_installed(&self) -> bool {
        self.original.is_some()
    }

    /// The wrapper placed in the model while installed.
    pub fn wrapped(&self) -> &SubmitFn {
        &self.wrapped
    }

    /// Put the original submit function back.
    ///
    /// Returns `Ok(false)` when already restored. If the model is borrowed
    /// elsewhere the guard stays installed so a later call (or drop) can
    /// finish the job.
    pub fn restore(&mut self) -> Result<bool, GuardError> {
        let Some(original) = self.original.as_ref() else {
            return Ok(false);
        };
        let mut inner = self
            .model
            .try_borrow_mut()
            .map_err(|_| ModelError::Busy)?;
        inner.set_submit_fn(Rc::clone(original));
        if inner.lease().ptr_eq(&Rc::downgrade(&self.token)) {
            inner.set_lease(std::rc::Weak::new());
        }
        drop(inner);
        self.original = None;
        debug!("submit guard restored");
        Ok(true)
    }
}

impl Drop for SubmitGuard {
    fn drop(&mut self) {
        if let Err(err) = self.restore() {
            warn!(%err, "submit guard dropped without restoring");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{InputModel, send};
    use std::cell::{Cell, RefCell};

    fn recording_model() -> (SharedModel, Rc<RefCell<Vec<String>>>) {
        let sent = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&sent);
        let model =
            InputModel::new(move |text| sink.borrow_mut().push(text.to_string())).into_shared();
        (model, sent)
    }

    #[test]
    fn restore_reinstates_the_exact_original() {
        let (model, sent) = recording_model();
        let before = model.borrow().submit_fn();
        let fired = Rc::new(Cell::new(0));
        let counter = Rc::clone(&fired);
        let mut guard = SubmitGuard::install(&model, move || counter.set(counter.get() + 1)).unwrap();
        assert!(!Rc::ptr_eq(&model.borrow().submit_fn(), &before));

        for text in ["one", "two", "three"] {
            model.borrow_mut().set_value(text);
            send(&model).unwrap();
        }
        assert_eq!(fired.get(), 3);
        assert_eq!(sent.borrow().len(), 3);

        assert_eq!(guard.restore(), Ok(true));
        assert!(Rc::ptr_eq(&model.borrow().submit_fn(), &before));
        assert!(!model.borrow().is_leased());
        // idempotent
        assert_eq!(guard.restore(), Ok(false));
        assert!(Rc::ptr_eq(&model.borrow().submit_fn(), &before));
    }

    #[test]
    fn original_runs_before_after_submit() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let in_submit = Rc::clone(&order);
        let model = InputModel::new(move |_| in_submit.borrow_mut().push("submit")).into_shared();
        let in_after = Rc::clone(&order);
        let _guard = SubmitGuard::install(&model, move || in_after.borrow_mut().push("after")).unwrap();
        model.borrow_mut().set_value("x");
        send(&model).unwrap();
        assert_eq!(*order.borrow(), vec!["submit", "after"]);
    }

    #[test]
    fn second_install_is_rejected_while_leased() {
        let (model, _) = recording_model();
        let first = SubmitGuard::install(&model, || {}).unwrap();
        assert_eq!(
            SubmitGuard::install(&model, || {}).err(),
            Some(GuardError::AlreadyInstalled)
        );
        drop(first);
        let mut second = SubmitGuard::install(&model, || {}).unwrap();
        assert_eq!(second.restore(), Ok(true));
    }

    #[test]
    fn drop_restores() {
        let (model, _) = recording_model();
        let before = model.borrow().submit_fn();
        {
            let _guard = SubmitGuard::install(&model, || {}).unwrap();
        }
        assert!(Rc::ptr_eq(&model.borrow().submit_fn(), &before));
        assert!(!model.borrow().is_leased());
    }

    #[test]
    fn close_signal_keeps_first_request() {
        let signal = CloseSignal::new();
        let raised = signal.clone();
        raised.request(CloseReason::Submitted);
        raised.request(CloseReason::OutsideClick);
        assert!(signal.is_pending());
        assert_eq!(signal.take(), Some(CloseReason::Submitted));
        assert_eq!(signal.take(), None);
    }

    #[test]
    fn busy_model_keeps_guard_installed_until_retry() {
        let (model, _) = recording_model();
        let before = model.borrow().submit_fn();
        let mut guard = SubmitGuard::install(&model, || {}).unwrap();
        {
            let _held = model.borrow();
            assert_eq!(guard.restore(), Err(GuardError::Model(ModelError::Busy)));
        }
        assert!(guard.is_installed());
        assert_eq!(guard.restore(), Ok(true));
        assert!(Rc::ptr_eq(&model.borrow().submit_fn(), &before));
    }
}
