//! Terminal host toolkit
//!
//! Draws dialogs as boxes on the alternate screen. The screen is taken over
//! when the first dialog is built and handed back when the last one closes.

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame, Terminal,
};
use std::collections::HashMap;
use std::io::{self, IsTerminal, Stdout};
use std::time::Duration;
use tracing::{debug, warn};

use super::{ArtifactId, CloseReason, DialogToolkit};
use crate::dialog::{DialogKind, DialogRequest, UserAction};
use crate::error::{PopupError, Result};
use crate::params::Location;

const ACCENT: Color = Color::Rgb(59, 130, 246);
const DANGER: Color = Color::Rgb(239, 68, 68);
const MUTED: Color = Color::Rgb(113, 113, 122);
const MAX_WIDTH: u16 = 64;

type Backend = CrosstermBackend<Stdout>;

/// Per-dialog editing state
#[derive(Debug, Clone)]
struct TermDialog {
    request: DialogRequest,
    input: String,
    yes_selected: bool,
}

impl TermDialog {
    fn new(request: &DialogRequest) -> Self {
        Self {
            request: request.clone(),
            input: request.preset.clone(),
            yes_selected: true,
        }
    }

    fn on_key(&mut self, key: KeyEvent) -> Option<UserAction> {
        if key.kind != KeyEventKind::Press {
            return None;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Some(UserAction::Cancel);
        }

        match (self.request.kind, key.code) {
            (_, KeyCode::Esc) => Some(UserAction::Cancel),
            (DialogKind::Notice | DialogKind::Error, KeyCode::Enter) => Some(UserAction::Acknowledge),
            (DialogKind::Confirm, KeyCode::Enter) => Some(if self.yes_selected {
                UserAction::Yes
            } else {
                UserAction::No
            }),
            (DialogKind::Confirm, KeyCode::Char('y' | 'Y')) => Some(UserAction::Yes),
            (DialogKind::Confirm, KeyCode::Char('n' | 'N')) => Some(UserAction::No),
            (DialogKind::Confirm, KeyCode::Left | KeyCode::Right | KeyCode::Tab | KeyCode::BackTab) => {
                self.yes_selected = !self.yes_selected;
                None
            }
            (DialogKind::Input, KeyCode::Enter) => Some(UserAction::Submit(self.input.clone())),
            (DialogKind::Input, KeyCode::Backspace) => {
                self.input.pop();
                None
            }
            (DialogKind::Input, KeyCode::Char(c)) => {
                self.input.push(c);
                None
            }
            _ => None,
        }
    }

    fn shown_input(&self) -> String {
        if self.request.hidden {
            "*".repeat(self.input.chars().count())
        } else {
            self.input.clone()
        }
    }

    fn lines(&self) -> Vec<Line<'static>> {
        let mut lines: Vec<Line<'static>> = self
            .request
            .message
            .lines()
            .map(|l| Line::from(l.to_string()))
            .collect();
        lines.push(Line::from(""));

        let selected = Style::default().fg(Color::Black).bg(ACCENT).add_modifier(Modifier::BOLD);
        let idle = Style::default().fg(MUTED);

        match self.request.kind {
            DialogKind::Notice | DialogKind::Error => {
                lines.push(Line::from(Span::styled(" OK ", selected)));
            }
            DialogKind::Confirm => {
                let (yes, no) = if self.yes_selected { (selected, idle) } else { (idle, selected) };
                lines.push(Line::from(vec![
                    Span::styled(" Yes ", yes),
                    Span::raw("   "),
                    Span::styled(" No ", no),
                ]));
            }
            DialogKind::Input => {
                lines.push(Line::from(vec![
                    Span::styled("> ", Style::default().fg(ACCENT)),
                    Span::raw(self.shown_input()),
                    Span::styled("▌", Style::default().fg(ACCENT)),
                ]));
                lines.push(Line::from(""));
                lines.push(Line::from(Span::styled("Enter: OK   Esc: cancel", idle)));
            }
        }
        lines
    }

    /// Box around the anchor, clamped to the screen
    fn area(&self, screen: Rect) -> Rect {
        let widest = self
            .request
            .message
            .lines()
            .map(|l| l.chars().count())
            .chain(std::iter::once(self.request.title.chars().count() + 2))
            .max()
            .unwrap_or(0)
            .min(MAX_WIDTH as usize) as u16;
        let width = (widest + 4).clamp(24, MAX_WIDTH).min(screen.width);
        let inner = width.saturating_sub(4).max(1) as usize;

        // Counted in usize; a long message only needs to fill the screen
        let wrapped = self
            .request
            .message
            .lines()
            .map(|l| l.chars().count().div_ceil(inner).max(1))
            .fold(0usize, usize::saturating_add);
        let extra = if self.request.kind == DialogKind::Input { 4 } else { 2 };
        let height = wrapped.saturating_add(extra + 2).min(screen.height as usize) as u16;

        let anchor = self.request.anchor;
        let x = anchor
            .x
            .saturating_sub(width as i32 / 2)
            .clamp(0, (screen.width - width) as i32) as u16;
        let y = anchor
            .y
            .saturating_sub(height as i32 / 2)
            .clamp(0, (screen.height - height) as i32) as u16;
        Rect::new(screen.x + x, screen.y + y, width, height)
    }

    fn render(&self, f: &mut Frame) {
        let area = self.area(f.size());
        let border = if self.request.kind == DialogKind::Error { DANGER } else { ACCENT };
        let block = Block::default()
            .title(format!(" {} ", self.request.title))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border));
        let body = Paragraph::new(self.lines())
            .block(block)
            .alignment(Alignment::Left)
            .wrap(Wrap { trim: false });

        f.render_widget(Clear, area);
        f.render_widget(body, area);
    }
}

/// Dialogs on a crossterm terminal
pub struct TerminalToolkit {
    terminal: Option<Terminal<Backend>>,
    dialogs: HashMap<ArtifactId, TermDialog>,
    /// Drawing order, topmost last
    stack: Vec<ArtifactId>,
    next_id: u64,
}

impl Default for TerminalToolkit {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalToolkit {
    pub fn new() -> Self {
        Self {
            terminal: None,
            dialogs: HashMap::new(),
            stack: Vec::new(),
            next_id: 1,
        }
    }

    fn terminal(&mut self) -> Result<&mut Terminal<Backend>> {
        if self.terminal.is_none() {
            enable_raw_mode()?;
            let mut stdout = io::stdout();
            execute!(stdout, EnterAlternateScreen)?;
            let terminal = Terminal::new(CrosstermBackend::new(stdout))?;
            debug!("Entered alternate screen");
            self.terminal = Some(terminal);
        }
        self.terminal
            .as_mut()
            .ok_or_else(|| PopupError::Toolkit("terminal unavailable".to_string()))
    }

    fn draw(&mut self) -> Result<()> {
        let dialogs: Vec<TermDialog> = self
            .stack
            .iter()
            .filter_map(|id| self.dialogs.get(id).cloned())
            .collect();
        self.terminal()?.draw(|f| {
            for dialog in &dialogs {
                dialog.render(f);
            }
        })?;
        Ok(())
    }

    fn restore(&mut self) {
        let Some(mut terminal) = self.terminal.take() else {
            return;
        };
        if let Err(e) = disable_raw_mode() {
            warn!("Failed to leave raw mode: {}", e);
        }
        if let Err(e) = execute!(terminal.backend_mut(), LeaveAlternateScreen) {
            warn!("Failed to leave alternate screen: {}", e);
        }
        let _ = terminal.show_cursor();
        debug!("Restored terminal");
    }
}

impl DialogToolkit for TerminalToolkit {
    fn is_interactive(&self) -> bool {
        io::stdin().is_terminal() && io::stdout().is_terminal()
    }

    fn primary_display_center(&self) -> Option<Location> {
        crossterm::terminal::size()
            .ok()
            .map(|(w, h)| Location::new(w as i32 / 2, h as i32 / 2))
    }

    fn build(&mut self, request: &DialogRequest) -> Result<ArtifactId> {
        let artifact = ArtifactId(self.next_id);
        self.next_id += 1;
        self.dialogs.insert(artifact, TermDialog::new(request));
        self.stack.push(artifact);

        if let Err(e) = self.draw() {
            self.dialogs.remove(&artifact);
            self.stack.retain(|id| *id != artifact);
            if self.stack.is_empty() {
                self.restore();
            }
            return Err(e);
        }
        Ok(artifact)
    }

    fn poll(&mut self, artifact: ArtifactId, wait: Duration) -> Result<Option<UserAction>> {
        self.draw()?;
        if !event::poll(wait)? {
            return Ok(None);
        }
        let Event::Key(key) = event::read()? else {
            return Ok(None);
        };
        // Keys belong to the topmost dialog only
        if self.stack.last() != Some(&artifact) {
            return Ok(None);
        }
        Ok(self.dialogs.get_mut(&artifact).and_then(|d| d.on_key(key)))
    }

    fn close(&mut self, artifact: ArtifactId, reason: CloseReason) {
        if self.dialogs.remove(&artifact).is_none() {
            return;
        }
        self.stack.retain(|id| *id != artifact);
        debug!(?artifact, ?reason, "terminal dialog closed");

        if self.stack.is_empty() {
            self.restore();
        } else if let Err(e) = self.draw() {
            warn!("Failed to redraw: {}", e);
        }
    }
}

impl Drop for TerminalToolkit {
    fn drop(&mut self) {
        self.restore();
    }
}
