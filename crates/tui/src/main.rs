//! dualstream Dashboard TUI
//!
//! Terminal interface for real-time monitoring of camera modes and standby
//! encoder liveness. Connects to the daemon API at
//! http://127.0.0.1:8080/api/streams

use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, Wrap},
    text::Line,
    Frame, Terminal,
};
use serde::Deserialize;
use std::{
    collections::{HashMap, VecDeque},
    io::{self, Stdout},
    time::{Duration, Instant},
};

const STREAMS_URL: &str = "http://127.0.0.1:8080/api/streams";
const POLL_INTERVAL_MS: u64 = 500;
const MAX_EVENT_LOG_ENTRIES: usize = 100;

// ============================================================================
// Data Models (mirroring daemon status types)
// ============================================================================

/// Snapshot of one camera's presentation state
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StreamStatus {
    pub id: String,
    pub name: String,
    pub mode: String,
    pub standby_url: String,
    pub webrtc_src: String,
    pub standby_ok: bool,
}

// ============================================================================
// App State
// ============================================================================

/// Main application state for the dashboard
pub struct App {
    /// Latest status list from the daemon
    pub streams: Vec<StreamStatus>,
    /// Event log of observed mode changes
    pub event_log: VecDeque<String>,
    /// Mode seen at the previous poll, per camera id
    last_modes: HashMap<String, String>,
    /// Connection status
    pub connected: bool,
    /// HTTP client for status fetching
    client: reqwest::Client,
}

impl App {
    /// Create a new App instance
    pub fn new() -> Self {
        Self {
            streams: Vec::new(),
            event_log: VecDeque::with_capacity(MAX_EVENT_LOG_ENTRIES),
            last_modes: HashMap::new(),
            connected: false,
            client: reqwest::Client::new(),
        }
    }

    /// Add an event to the log
    pub fn log_event(&mut self, event: String) {
        if self.event_log.len() >= MAX_EVENT_LOG_ENTRIES {
            self.event_log.pop_front();
        }
        self.event_log.push_back(event);
    }

    /// Fetch the stream list from the daemon HTTP endpoint
    pub async fn fetch_streams(&mut self) {
        match self.client.get(STREAMS_URL).send().await {
            Ok(response) => {
                if response.status().is_success() {
                    match response.json::<Vec<StreamStatus>>().await {
                        Ok(streams) => {
                            for change in mode_changes(&self.last_modes, &streams) {
                                self.log_event(change);
                            }
                            self.last_modes = streams
                                .iter()
                                .map(|s| (s.id.clone(), s.mode.clone()))
                                .collect();
                            self.streams = streams;
                            self.connected = true;
                        }
                        Err(e) => {
                            self.log_event(format!("JSON parse error: {}", e));
                            self.connected = false;
                        }
                    }
                } else {
                    self.log_event(format!("HTTP error: {}", response.status()));
                    self.connected = false;
                }
            }
            Err(e) => {
                if self.connected {
                    self.log_event(format!("Connection lost: {}", e));
                }
                self.connected = false;
            }
        }
    }
}

/// Describe every camera whose mode differs from the previously seen one
fn mode_changes(last_modes: &HashMap<String, String>, streams: &[StreamStatus]) -> Vec<String> {
    streams
        .iter()
        .filter_map(|s| match last_modes.get(&s.id) {
            Some(previous) if previous != &s.mode => {
                Some(format!("{} {} -> {}", s.id, previous, s.mode))
            }
            _ => None,
        })
        .collect()
}

/// Count cameras currently in the given mode
fn count_mode(streams: &[StreamStatus], mode: &str) -> usize {
    streams.iter().filter(|s| s.mode == mode).count()
}

// ============================================================================
// Terminal Setup/Teardown
// ============================================================================

/// Initialize the terminal for TUI rendering
fn setup_terminal() -> io::Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend)
}

/// Restore terminal to normal state
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> io::Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

// ============================================================================
// Widget Rendering
// ============================================================================

/// Render the camera table showing mode and encoder liveness
fn render_stream_table(f: &mut Frame, area: Rect, app: &App) {
    let header_cells = ["ID", "Name", "Mode", "Standby Encoder", "Standby URL"]
        .iter()
        .map(|h| Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)));
    let header = Row::new(header_cells).height(1).bottom_margin(1);

    let rows: Vec<Row> = app
        .streams
        .iter()
        .map(|stream| {
            let mode_style = if stream.mode == "live" {
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Gray)
            };
            let encoder = if stream.standby_ok { "running" } else { "down" };
            let encoder_style = if stream.standby_ok {
                Style::default().fg(Color::Green)
            } else {
                Style::default().fg(Color::Red)
            };
            Row::new(vec![
                Cell::from(stream.id.clone()),
                Cell::from(stream.name.clone()),
                Cell::from(stream.mode.clone()).style(mode_style),
                Cell::from(encoder).style(encoder_style),
                Cell::from(stream.standby_url.clone()),
            ])
        })
        .collect();

    let widths = [
        Constraint::Length(10),
        Constraint::Length(20),
        Constraint::Length(10),
        Constraint::Length(16),
        Constraint::Min(20),
    ];

    let title = if app.connected {
        " Cameras "
    } else {
        " Cameras (Disconnected) "
    };

    let table = Table::new(rows, widths)
        .header(header)
        .block(Block::default().borders(Borders::ALL).title(title));

    f.render_widget(table, area);
}

/// Render event log showing observed mode changes
fn render_event_log(f: &mut Frame, area: Rect, app: &App) {
    let events: Vec<Line> = app
        .event_log
        .iter()
        .rev()
        .take(area.height.saturating_sub(2) as usize)
        .map(|e| Line::from(e.as_str()))
        .collect();

    let paragraph = Paragraph::new(events)
        .block(Block::default().borders(Borders::ALL).title(" Mode Changes "))
        .wrap(Wrap { trim: true });

    f.render_widget(paragraph, area);
}

/// Render status bar with aggregate counts
fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let status = if app.connected {
        format!(
            " Cameras: {} | Live: {} | Standby: {} | Encoders down: {} | Press 'q' to quit ",
            app.streams.len(),
            count_mode(&app.streams, "live"),
            count_mode(&app.streams, "standby"),
            app.streams.iter().filter(|s| !s.standby_ok).count(),
        )
    } else {
        " Connecting to daemon... | Press 'q' to quit ".to_string()
    };

    let paragraph =
        Paragraph::new(status).style(Style::default().fg(Color::White).bg(Color::DarkGray));

    f.render_widget(paragraph, area);
}

// ============================================================================
// Main UI Layout
// ============================================================================

/// Render the complete UI layout
fn ui(f: &mut Frame, app: &App) {
    let size = f.area();

    // Main layout: status bar at bottom, rest for content
    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(size);

    // Content area: camera table on top, mode change log below
    let content_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
        .split(main_chunks[0]);

    render_stream_table(f, content_chunks[0], app);
    render_event_log(f, content_chunks[1], app);
    render_status_bar(f, main_chunks[1], app);
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> io::Result<()> {
    // Initialize terminal
    let mut terminal = setup_terminal()?;

    // Create app state
    let mut app = App::new();
    app.log_event("dualstream dashboard started".to_string());

    // Run the main loop
    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    restore_terminal(&mut terminal)?;

    result
}

/// Main application loop
async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App,
) -> io::Result<()> {
    let poll_interval = Duration::from_millis(POLL_INTERVAL_MS);
    let mut last_fetch = Instant::now() - poll_interval; // Fetch immediately on start

    loop {
        // Fetch status if poll interval has elapsed
        if last_fetch.elapsed() >= poll_interval {
            app.fetch_streams().await;
            last_fetch = Instant::now();
        }

        // Draw UI
        terminal.draw(|f| ui(f, app))?;

        // Handle input with a short timeout to allow frequent redraws
        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Char('Q') => {
                            return Ok(());
                        }
                        KeyCode::Esc => {
                            return Ok(());
                        }
                        _ => {}
                    }
                }
            }
        }
    }
}
