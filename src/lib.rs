//! A draggable floating chat panel over a terminal notebook surface.
//!
//! [`panel::FloatingPanel`] is the core: it places itself on a
//! [`surface::DisplaySurface`], follows header drags, closes on clicks that
//! land outside of it and its own pop-ups, and borrows the shared
//! [`model::InputModel`]'s submit slot for exactly as long as it is open.
//! [`command::FloatingChat`] is the host-side toggle around it.

pub mod clipboard;
pub mod command;
pub mod components;
pub mod config;
pub mod drag;
pub mod drivers;
pub mod error;
pub mod event_loop;
pub mod geometry;
pub mod guard;
pub mod keybindings;
pub mod listeners;
pub mod logging;
pub mod model;
pub mod notebook;
pub mod outside;
pub mod panel;
pub mod pointer;
pub mod surface;
pub mod theme;
pub mod ui;
