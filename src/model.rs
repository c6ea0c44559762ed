//! The chat input model shared between the host and any floating panel.
//!
//! The model outlives panels. A panel only borrows it for the duration of
//! its life: it forwards its attachment, wraps the submit slot, and on
//! disposal leaves the text, attachments and submit slot as a fresh panel
//! would expect to find them.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::error::ModelError;

/// The submit behaviour installed on a model.
pub type SubmitFn = Rc<dyn Fn(&str)>;

pub type SharedModel = Rc<RefCell<InputModel>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CellKind {
    Code,
    Markdown,
    Raw,
}

impl CellKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CellKind::Code => "code",
            CellKind::Markdown => "markdown",
            CellKind::Raw => "raw",
        }
    }
}

impl fmt::Display for CellKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellRef {
    pub input_type: CellKind,
    pub id: String,
}

/// Context attached to a pending message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attachment {
    Notebook { path: String, cells: Vec<CellRef> },
}

impl fmt::Display for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attachment::Notebook { path, cells } if cells.is_empty() => write!(f, "{path}"),
            Attachment::Notebook { path, cells } => {
                let ids: Vec<&str> = cells.iter().map(|c| c.id.as_str()).collect();
                write!(f, "{path} [{}]", ids.join(", "))
            }
        }
    }
}

pub struct InputModel {
    value: String,
    attachments: Vec<Attachment>,
    submit: SubmitFn,
    lease: Weak<()>,
}

impl fmt::Debug for InputModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputModel")
            .field("value", &self.value)
            .field("attachments", &self.attachments)
            .field("leased", &self.is_leased())
            .finish_non_exhaustive()
    }
}

impl InputModel {
    pub fn new<F>(submit: F) -> Self
    where
        F: Fn(&str) + 'static,
    {
        Self {
            value: String::new(),
            attachments: Vec::new(),
            submit: Rc::new(submit),
            lease: Weak::new(),
        }
    }

    pub fn into_shared(self) -> SharedModel {
        Rc::new(RefCell::new(self))
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn set_value(&mut self, value: impl Into<String>) {
        self.value = value.into();
    }

    pub fn value_mut(&mut self) -> &mut String {
        &mut self.value
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    pub fn add_attachment(&mut self, attachment: Attachment) {
        if !self.attachments.contains(&attachment) {
            self.attachments.push(attachment);
        }
    }

    pub fn clear_attachments(&mut self) {
        self.attachments.clear();
    }

    /// The function currently in the submit slot.
    pub fn submit_fn(&self) -> SubmitFn {
        Rc::clone(&self.submit)
    }

    pub fn set_submit_fn(&mut self, submit: SubmitFn) {
        self.submit = submit;
    }

    /// Whether a guard currently holds the submit slot.
    pub fn is_leased(&self) -> bool {
        self.lease.strong_count() > 0
    }

    pub(crate) fn lease(&self) -> &Weak<()> {
        &self.lease
    }

    pub(crate) fn set_lease(&mut self, lease: Weak<()>) {
        self.lease = lease;
    }
}

/// Submit the pending text through the model's submit slot.
///
/// Blank input is not submitted. The text is taken out of the model before
/// the submit function runs, and no borrow is held while it runs, so the
/// function may freely use the model itself.
pub fn send(model: &SharedModel) -> Result<Option<String>, ModelError> {
    let (text, submit) = {
        let mut inner = model.try_borrow_mut().map_err(|_| ModelError::Busy)?;
        if inner.value.trim().is_empty() {
            return Ok(None);
        }
        (std::mem::take(&mut inner.value), inner.submit_fn())
    };
    submit(&text);
    Ok(Some(text))
}
