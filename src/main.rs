use std::cell::RefCell;
use std::io;
use std::rc::{Rc, Weak};
use std::time::Duration;

use clap::Parser;
use crossterm::event::{Event, KeyEvent, MouseButton};
use ratatui::layout::Rect;
use tracing::{info, warn};

use floating_chat::command::{FloatingChat, ToggleOutcome, ToggleRequest};
use floating_chat::components::context_menu::MenuOutcome;
use floating_chat::components::{
    Component, ComponentContext, ContextMenuComponent, NotebookViewComponent, StatusBarComponent,
};
use floating_chat::config::{ChatConfig, Cli};
use floating_chat::drivers::{ConsoleInputDriver, ConsoleOutputDriver, OutputDriver};
use floating_chat::event_loop::{ControlFlow, EventLoop};
use floating_chat::geometry::{Position, Size};
use floating_chat::keybindings::{Action, KeyBindings};
use floating_chat::logging;
use floating_chat::model::{InputModel, SharedModel};
use floating_chat::notebook::{NotebookTracker, TargetKind};
use floating_chat::panel::Host;
use floating_chat::pointer::{ClickTracker, PointerEvent, PointerKind};
use floating_chat::surface::DisplaySurface;
use floating_chat::ui::UiFrame;

fn main() -> io::Result<()> {
    let cli = Cli::parse();
    let config = ChatConfig::try_from(&cli)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;
    logging::init(config.log_level, config.log_file.as_deref())?;

    let (width, height) = crossterm::terminal::size()?;
    let mut app = App::new(config, Size::new(width, height));

    let mut output = ConsoleOutputDriver::new()?;
    output.enter()?;
    let mut event_loop = EventLoop::new(ConsoleInputDriver::new(), Duration::from_millis(16));
    let result = event_loop.run(|_, event| match event {
        Some(event) => Ok(app.handle_event(event)),
        None => {
            output.draw(|mut frame| app.render(&mut frame))?;
            Ok(ControlFlow::Continue)
        }
    });
    output.exit()?;
    result
}

struct App {
    host: Host,
    tracker: NotebookTracker,
    chat: FloatingChat,
    view: NotebookViewComponent,
    menu: ContextMenuComponent,
    status: StatusBarComponent,
    clicks: ClickTracker,
    bindings: KeyBindings,
    sent: Rc<RefCell<Vec<String>>>,
}

impl App {
    fn new(config: ChatConfig, viewport: Size) -> Self {
        let sent = Rc::new(RefCell::new(Vec::new()));
        let model = config.with_model.then(|| recording_model(Rc::clone(&sent)));
        let mut app = Self {
            host: Host::new(floating_chat::surface::NodeTree::new(viewport)),
            tracker: NotebookTracker::with_current(config.notebook),
            chat: FloatingChat::new(model).with_config(config.panel),
            view: NotebookViewComponent::new(),
            menu: ContextMenuComponent::new(),
            status: StatusBarComponent::new(),
            clicks: ClickTracker::new(),
            bindings: KeyBindings::default(),
            sent,
        };
        if let Some(notebook) = app.tracker.current()
            && let Err(err) = app.view.mount(&mut app.host.surface, notebook)
        {
            warn!(%err, "failed to mount notebook view");
        }
        app.layout_notebook();
        app
    }

    fn notebook_area(&self) -> Rect {
        let viewport = self.host.surface.viewport();
        Rect::new(0, 0, viewport.width, viewport.height.saturating_sub(1))
    }

    fn layout_notebook(&mut self) {
        let area = self.notebook_area();
        if let Err(err) = self.view.layout(&mut self.host.surface, area) {
            warn!(%err, "notebook layout failed");
        }
    }

    fn handle_event(&mut self, event: Event) -> ControlFlow {
        match event {
            Event::Key(key) => return self.handle_key(&key),
            Event::Mouse(mouse) => {
                for pointer in self.clicks.translate(&mouse, &self.host.surface) {
                    self.handle_pointer(&pointer);
                }
            }
            Event::Resize(width, height) => {
                self.host.surface.set_viewport(Size::new(width, height));
                self.close_menu();
                self.layout_notebook();
                self.chat.on_viewport_resized(&mut self.host);
            }
            _ => {}
        }
        ControlFlow::Continue
    }

    fn handle_key(&mut self, key: &KeyEvent) -> ControlFlow {
        if self.bindings.matches(Action::Quit, key) {
            return ControlFlow::Quit;
        }
        if self.menu.is_open() {
            match self.menu.on_key(key) {
                MenuOutcome::Invoke(kind) => {
                    self.close_menu();
                    self.invoke(kind);
                }
                MenuOutcome::Dismiss => self.close_menu(),
                MenuOutcome::Handled | MenuOutcome::Ignored => {}
            }
            return ControlFlow::Continue;
        }
        if self.bindings.matches(Action::TogglePanel, key) {
            let outcome = self
                .chat
                .toggle(&mut self.host, &self.tracker, ToggleRequest::anchored());
            report(&outcome);
            return ControlFlow::Continue;
        }
        if self.chat.handle_key(&mut self.host, key) {
            return ControlFlow::Continue;
        }
        if self.bindings.matches(Action::OpenContextMenu, key) {
            self.open_menu_on_selected_cell();
            return ControlFlow::Continue;
        }
        let ctx = ComponentContext::new(true);
        if self.view.handle_event(&Event::Key(*key), &ctx) {
            self.layout_notebook();
        }
        ControlFlow::Continue
    }

    fn handle_pointer(&mut self, pointer: &PointerEvent) {
        if self.menu.is_open() {
            if let Some(target) = pointer.target
                && self.menu.contains(&self.host.surface, target)
            {
                if pointer.kind == PointerKind::Click
                    && let Some(kind) = self.menu.entry_at(&self.host.surface, target)
                {
                    self.close_menu();
                    self.invoke(kind);
                }
                return;
            }
            if matches!(pointer.kind, PointerKind::Down(_)) {
                self.close_menu();
            }
        }

        if self.chat.handle_pointer(&mut self.host, pointer) {
            return;
        }
        match pointer.kind {
            PointerKind::Down(MouseButton::Right) => {
                let entries = self.chat.context_entries(&self.host.surface, pointer.target);
                if let Err(err) = self.menu.open(&mut self.host.surface, pointer.position, entries) {
                    warn!(%err, "failed to open context menu");
                }
            }
            PointerKind::Click => {
                if let Some(index) = pointer
                    .target
                    .and_then(|t| self.view.cell_index_of(&self.host.surface, t))
                {
                    self.view.select(index);
                }
            }
            _ => {}
        }
    }

    /// Keyboard route to the context menu, opened over the selected cell.
    fn open_menu_on_selected_cell(&mut self) {
        let Some(cell) = self.view.cell_node(self.view.selected()) else {
            return;
        };
        let Some(rect) = self.host.surface.bounding_rect(cell) else {
            return;
        };
        let at = Position::new(rect.x + 2, rect.y + 1);
        let press = PointerEvent::new(PointerKind::Down(MouseButton::Right), at, Some(cell));
        self.chat.record_context_menu(&press);
        let entries = self.chat.context_entries(&self.host.surface, Some(cell));
        if let Err(err) = self.menu.open(&mut self.host.surface, at, entries) {
            warn!(%err, "failed to open context menu");
        }
    }

    fn close_menu(&mut self) {
        if let Err(err) = self.menu.close(&mut self.host.surface) {
            warn!(%err, "failed to close context menu");
        }
    }

    fn invoke(&mut self, kind: TargetKind) {
        let outcome = self
            .chat
            .invoke_context_entry(&mut self.host, &self.tracker, kind);
        report(&outcome);
    }

    fn render(&mut self, frame: &mut UiFrame<'_>) {
        let area = frame.area();
        let notebook_area = self.notebook_area().intersection(area);
        let ctx = ComponentContext::new(!self.chat.is_open());
        if let Some(notebook) = self.tracker.current() {
            self.view.render(frame, &self.host.surface, notebook);
        }
        Component::render(&mut self.view, frame, notebook_area, &ctx);

        self.chat.render(frame, &self.host.surface);
        self.chat.render_overlays(frame, &self.host.surface);
        self.menu.render(frame, area, &ctx.with_overlay(true));

        self.status.set_left(self.status_message());
        let toggle = self.bindings.combos_for(Action::TogglePanel).join("/");
        self.status
            .set_right(format!("{toggle} chat | right-click menu | Ctrl+Q quit "));
        let status_area = Rect::new(area.x, area.bottom().saturating_sub(1), area.width, 1);
        self.status.render(frame, status_area, &ctx);
    }

    fn status_message(&self) -> String {
        let sent = self.sent.borrow().len();
        match logging::last_line() {
            Some(line) => format!(" [{sent} sent] {line}"),
            None => format!(" [{sent} sent]"),
        }
    }
}

/// A model whose submit function records the message and logs it together
/// with whatever context was attached when it was sent.
fn recording_model(sent: Rc<RefCell<Vec<String>>>) -> SharedModel {
    Rc::new_cyclic(|me: &Weak<RefCell<InputModel>>| {
        let me = Weak::clone(me);
        RefCell::new(InputModel::new(move |text| {
            let context = me
                .upgrade()
                .and_then(|model| {
                    let model = model.try_borrow().ok()?;
                    let parts: Vec<String> =
                        model.attachments().iter().map(ToString::to_string).collect();
                    Some(parts.join("; "))
                })
                .unwrap_or_default();
            info!(text, attachments = context.as_str(), "message sent");
            sent.borrow_mut().push(text.to_string());
        }))
    })
}

fn report(outcome: &ToggleOutcome) {
    match outcome {
        ToggleOutcome::Opened(id) => info!(panel = id.raw(), "chat opened"),
        ToggleOutcome::Closed(disposal) => {
            info!(reason = ?disposal.reason(), clean = disposal.is_clean(), "chat closed")
        }
        ToggleOutcome::Unavailable => info!("no chat model configured"),
        ToggleOutcome::Failed(err) => warn!(%err, "chat could not be opened"),
    }
}
