//! TUI module - dashboard, day preview and guided session with ratatui

use std::io::{Stdout, stdout};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::{Local, Utc};
use crossterm::{
    ExecutableCommand,
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Cell, Gauge, Paragraph, Row, Table, Wrap},
};
use tokio::sync::{oneshot, watch};
use tracing::warn;

use crate::auth::AuthSession;
use crate::catalog::{Catalog, PROGRAM_DAYS, WorkUnit};
use crate::db::CompletionRecord;
use crate::session::{CommitOutcome, HostEvent, SessionEvent, SessionHost, SessionState};
use crate::stats::{DayStatus, Progress, format_duration};
use crate::store::ProgressStore;

type Tui = Terminal<CrosstermBackend<Stdout>>;

const GRID_COLUMNS: u8 = 5;
const TICK: Duration = Duration::from_secs(1);

/// Which screen is showing, with everything that screen needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Dashboard { cursor: u8 },
    Preview { day: u8 },
    Session { day: u8 },
}

struct PendingCommit {
    day: u8,
    outcome: oneshot::Receiver<CommitOutcome>,
}

/// App state for TUI
pub struct App {
    catalog: Arc<Catalog>,
    host: SessionHost<dyn ProgressStore>,
    records: Vec<CompletionRecord>,
    screen: Screen,
    status: Option<String>,
    pending: Vec<PendingCommit>,
    identity: Option<watch::Receiver<Option<AuthSession>>>,
    last_tick: Instant,
    should_quit: bool,
}

impl App {
    pub fn new(
        catalog: Arc<Catalog>,
        store: Arc<dyn ProgressStore>,
        records: Vec<CompletionRecord>,
        identity: Option<watch::Receiver<Option<AuthSession>>>,
    ) -> Self {
        let cursor = Progress::new(&records).next_day().unwrap_or(PROGRAM_DAYS);
        Self {
            host: SessionHost::new(Arc::clone(&catalog), store),
            catalog,
            records,
            screen: Screen::Dashboard { cursor },
            status: None,
            pending: Vec::new(),
            identity,
            last_tick: Instant::now(),
            should_quit: false,
        }
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    /// Run the TUI application
    pub fn run(&mut self) -> Result<()> {
        let mut terminal = init_terminal()?;

        let result = self.event_loop(&mut terminal);

        restore_terminal()?;
        result
    }

    fn event_loop(&mut self, terminal: &mut Tui) -> Result<()> {
        while !self.should_quit {
            terminal.draw(|frame| self.render(frame))?;
            self.handle_events()?;

            if self.last_tick.elapsed() >= TICK {
                self.last_tick += TICK;
                self.on_tick();
            }
            self.poll_commits();
            self.watch_identity();
        }
        Ok(())
    }

    fn on_tick(&mut self) {
        self.host.tick();
    }

    fn poll_commits(&mut self) {
        let mut still_pending = Vec::new();
        for mut commit in self.pending.drain(..) {
            match commit.outcome.try_recv() {
                Ok(CommitOutcome::Saved) => {
                    self.status = Some(format!("Day {} saved", commit.day));
                }
                Ok(CommitOutcome::Pending { reason }) => {
                    self.status = Some(format!("Day {} saved on this device, sync pending ({})", commit.day, reason));
                }
                Ok(CommitOutcome::Failed { reason }) => {
                    self.status = Some(format!("Day {} NOT saved: {}", commit.day, reason));
                }
                Err(oneshot::error::TryRecvError::Empty) => still_pending.push(commit),
                Err(oneshot::error::TryRecvError::Closed) => {
                    warn!("Commit task for day {} ended without an outcome", commit.day);
                }
            }
        }
        self.pending = still_pending;
    }

    fn watch_identity(&mut self) {
        let Some(rx) = self.identity.as_mut() else {
            return;
        };
        if rx.has_changed().unwrap_or(false) && rx.borrow_and_update().is_none() {
            self.status = Some("Signed out. New progress stays on this device until you sign in.".to_string());
        }
    }

    // ── Input ────────────────────────────────────────────────────────

    fn handle_events(&mut self) -> Result<()> {
        if event::poll(Duration::from_millis(100))?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            match self.screen {
                Screen::Dashboard { cursor } => self.dashboard_key(key.code, cursor),
                Screen::Preview { day } => self.preview_key(key.code, day),
                Screen::Session { day } => self.session_key(key.code, day),
            }
        }
        Ok(())
    }

    fn dashboard_key(&mut self, code: KeyCode, cursor: u8) {
        let moved = match code {
            KeyCode::Char('q') => {
                self.should_quit = true;
                return;
            }
            KeyCode::Enter => {
                self.screen = Screen::Preview { day: cursor };
                return;
            }
            KeyCode::Char('n') => Progress::new(&self.records).next_day().unwrap_or(cursor),
            KeyCode::Left => cursor.saturating_sub(1).max(1),
            KeyCode::Right => (cursor + 1).min(PROGRAM_DAYS),
            KeyCode::Up if cursor > GRID_COLUMNS => cursor - GRID_COLUMNS,
            KeyCode::Down if cursor + GRID_COLUMNS <= PROGRAM_DAYS => cursor + GRID_COLUMNS,
            _ => cursor,
        };
        self.screen = Screen::Dashboard { cursor: moved };
    }

    fn preview_key(&mut self, code: KeyCode, day: u8) {
        match code {
            KeyCode::Esc | KeyCode::Char('b') => self.screen = Screen::Dashboard { cursor: day },
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Enter => {
                if let Err(e) = self.host.begin(day) {
                    self.status = Some(e.to_string());
                    return;
                }
                if self.catalog.is_rest_day(day) {
                    // Rest days finish on confirmation
                    if let Some(event) = self.host.advance() {
                        self.on_host_event(event);
                    }
                } else {
                    self.screen = Screen::Session { day };
                }
            }
            _ => {}
        }
    }

    fn session_key(&mut self, code: KeyCode, day: u8) {
        let event = match code {
            KeyCode::Enter | KeyCode::Char(' ') => self.host.advance(),
            KeyCode::Char('s') => self.host.skip_rest(),
            KeyCode::Char('t') => {
                if self.host.toggle_hold() {
                    self.realign_tick();
                }
                None
            }
            KeyCode::Char('r') => {
                self.host.reset_hold();
                None
            }
            KeyCode::Esc => {
                self.host.cancel();
                self.status = Some(format!("Day {} cancelled, nothing saved", day));
                self.screen = Screen::Preview { day };
                None
            }
            _ => None,
        };
        if let Some(event) = event {
            self.on_host_event(event);
        }
    }

    /// A timer just started; its first second runs from now
    fn realign_tick(&mut self) {
        self.last_tick = Instant::now();
    }

    fn on_host_event(&mut self, event: HostEvent) {
        match event {
            HostEvent::Session(SessionEvent::RestStarted { .. }) => self.realign_tick(),
            HostEvent::Session(_) => {}
            HostEvent::Completed(record) => {
                let day = record.day_number;
                // Shown right away; the store reports back when it has the record
                self.records.push(record.clone());
                self.pending.push(PendingCommit {
                    day,
                    outcome: self.host.spawn_commit(record),
                });
                self.status = Some(format!("Day {} complete! Saving...", day));
                self.screen = Screen::Dashboard { cursor: day };
            }
        }
    }

    // ── Rendering ────────────────────────────────────────────────────

    fn render(&self, frame: &mut Frame) {
        let area = frame.area();

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(10),
                Constraint::Length(3),
            ])
            .split(area);

        let progress = Progress::new(&self.records);
        let header = Paragraph::new(format!(
            "30-Day Calisthenics | Progress: {}% | Active days: {} | Streak: {}",
            progress.percent_complete(),
            progress.distinct_active_days(),
            progress.daily_streak(Local::now().date_naive()),
        ))
        .style(Style::default().fg(Color::Cyan).bold())
        .block(Block::default().borders(Borders::ALL));
        frame.render_widget(header, chunks[0]);

        let keys = match self.screen {
            Screen::Dashboard { cursor } => {
                self.render_dashboard(frame, chunks[1], &progress, cursor);
                "arrows: move | enter: open | n: next day | q: quit"
            }
            Screen::Preview { day } => {
                self.render_preview(frame, chunks[1], day);
                if self.catalog.is_rest_day(day) {
                    "enter: mark as completed | esc: back"
                } else {
                    "enter: start workout | esc: back"
                }
            }
            Screen::Session { .. } => {
                self.render_session(frame, chunks[1]);
                "enter: set done | s: skip rest | t: start/pause timer | r: reset timer | esc: exit"
            }
        };

        let footer_text = match &self.status {
            Some(status) => format!("{}  |  {}", status, keys),
            None => keys.to_string(),
        };
        let footer = Paragraph::new(footer_text)
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(footer, chunks[2]);
    }

    fn render_dashboard(&self, frame: &mut Frame, area: Rect, progress: &Progress, cursor: u8) {
        let rows: Vec<Row> = (0..PROGRAM_DAYS / GRID_COLUMNS)
            .map(|row| {
                let cells: Vec<Cell> = (1..=GRID_COLUMNS)
                    .map(|col| {
                        let day = row * GRID_COLUMNS + col;
                        let (label, style) = match progress.day_status(day, &self.catalog) {
                            DayStatus::Completed => (format!("{:>2} done", day), Style::default().fg(Color::Green).bold()),
                            DayStatus::Rest => (format!("{:>2} rest", day), Style::default().fg(Color::DarkGray)),
                            DayStatus::Open => (format!("{:>2}", day), Style::default()),
                        };
                        let style = if day == cursor { style.reversed() } else { style };
                        Cell::from(label).style(style)
                    })
                    .collect();
                Row::new(cells).height(2)
            })
            .collect();

        let widths = [Constraint::Length(9); GRID_COLUMNS as usize];
        let table = Table::new(rows, widths)
            .block(Block::default().borders(Borders::ALL).title("Days"));
        frame.render_widget(table, area);
    }

    fn render_preview(&self, frame: &mut Frame, area: Rect, day: u8) {
        let Some(plan) = self.catalog.workout_for_day(day) else {
            return;
        };
        let block = Block::default().borders(Borders::ALL).title(plan.title().to_string());

        if plan.is_rest() {
            let text = "Enjoy your rest day!\n\nStretch, hydrate, and recover.";
            let body = Paragraph::new(text).alignment(Alignment::Center).block(block);
            frame.render_widget(body, area);
            return;
        }

        let mut lines: Vec<Line> = Vec::new();
        if let Some(description) = plan.description() {
            lines.push(Line::styled(description.to_string(), Style::default().fg(Color::Yellow)));
            lines.push(Line::raw(""));
        }
        for exercise in plan.exercises() {
            lines.push(Line::from(vec![
                Span::styled(format!("{:<22}", exercise.name), Style::default().bold()),
                Span::raw(format!("{} x {}", exercise.set_count, exercise.work.label())),
                Span::styled(format!("   rest {}s", exercise.rest_secs), Style::default().fg(Color::DarkGray)),
            ]));
            if let Some(tip) = &exercise.tip {
                lines.push(Line::styled(format!("  {}", tip), Style::default().fg(Color::DarkGray)));
            }
        }

        let body = Paragraph::new(lines).wrap(Wrap { trim: false }).block(block);
        frame.render_widget(body, area);
    }

    fn render_session(&self, frame: &mut Frame, area: Rect) {
        let Some(machine) = self.host.machine() else {
            return;
        };
        let plan = machine.plan();
        let total = plan.exercises().len();

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(6), Constraint::Length(3)])
            .split(area);

        let (title, mut lines) = match machine.state() {
            SessionState::Working { exercise_index, set_number } => {
                let exercise = &plan.exercises()[exercise_index];
                let mut lines = vec![
                    Line::styled(exercise.name.clone(), Style::default().bold()),
                    Line::raw(format!("Set {} of {}", set_number, exercise.set_count)),
                    Line::raw(""),
                ];
                match exercise.work {
                    WorkUnit::RepsTarget(reps) => lines.push(Line::styled(format!("{} REPS", reps), Style::default().fg(Color::White).bold())),
                    WorkUnit::TimedHold(_) => {
                        if let Some(timer) = machine.hold_timer() {
                            lines.push(Line::styled(format!("{}s", timer.remaining_secs()), Style::default().fg(Color::Blue).bold()));
                        }
                    }
                }
                if let Some(tip) = &exercise.tip {
                    lines.push(Line::raw(""));
                    lines.push(Line::styled(tip.clone(), Style::default().fg(Color::DarkGray)));
                }
                let action = if machine.on_final_set() { "FINISH WORKOUT" } else { "SET COMPLETE" };
                lines.push(Line::raw(""));
                lines.push(Line::styled(format!("[enter] {}", action), Style::default().fg(Color::Cyan)));
                (format!("Exercise {}/{}", exercise_index + 1, total), lines)
            }
            SessionState::Resting { exercise_index, .. } => {
                let mut lines = vec![Line::styled("REST", Style::default().fg(Color::Green).bold())];
                if let Some(rest) = machine.rest() {
                    lines.push(Line::raw(format!("{}s", rest.remaining_secs())));
                    lines.push(Line::raw(""));
                    lines.push(Line::raw(format!("Next up: {}", rest.next_label())));
                }
                (format!("Exercise {}/{}", exercise_index + 1, total), lines)
            }
            SessionState::AwaitingConfirmation | SessionState::Finished { .. } => (String::new(), Vec::new()),
        };

        let elapsed = (Utc::now() - machine.started_at()).num_seconds().max(0) as u64;
        lines.insert(0, Line::styled(
            format!("{} sets done | {}", machine.completed_sets(), format_duration(elapsed)),
            Style::default().fg(Color::DarkGray),
        ));

        let body = Paragraph::new(lines)
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).title(format!("{} | {}", plan.title(), title)));
        frame.render_widget(body, chunks[0]);

        let ratio = machine
            .rest()
            .map(|r| r.progress_fraction())
            .or_else(|| machine.hold_timer().map(|t| t.progress_fraction()))
            .unwrap_or(machine.completed_sets() as f64 / plan.total_sets().max(1) as f64);
        let gauge = Gauge::default()
            .block(Block::default().borders(Borders::ALL))
            .gauge_style(Style::default().fg(Color::Blue))
            .ratio(ratio.clamp(0.0, 1.0));
        frame.render_widget(gauge, chunks[1]);
    }
}

fn init_terminal() -> Result<Tui> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    Ok(terminal)
}

fn restore_terminal() -> Result<()> {
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;
    Ok(())
}
