//! tilesched live visualizer: attach to any running simulation at any time.
//!
//! Run in a separate terminal:
//!   cargo run --bin viz
//!
//! Polls the snapshot the scheduler writes after every mapping epoch and
//! renders a live dashboard:
//!
//!   ┌ header: simulated time / phase counters ───────────────────────┐
//!   │ core grid (one cell per core)   │ task table: phase + timings  │
//!   │ q/esc: quit  …footer…                                          │
//!
//! Press q or Esc to quit. The simulation keeps running unaffected.

use std::{io, time::Duration};

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame, Terminal,
};
use tilesched::metrics::{read_snapshot, CellState, LiveSnapshot, SNAPSHOT_PATH};

fn main() -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run(&mut terminal);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    loop {
        let snapshot = read_snapshot();
        terminal.draw(|f| render(f, snapshot.as_ref()))?;

        // Non-blocking: poll for 200ms, then redraw regardless
        if event::poll(Duration::from_millis(200))? {
            if let Event::Key(key) = event::read()? {
                if matches!(key.code, KeyCode::Char('q') | KeyCode::Esc) {
                    break;
                }
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Top-level layout
// ---------------------------------------------------------------------------

fn render(f: &mut Frame, snapshot: Option<&LiveSnapshot>) {
    let area = f.area();
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // header
            Constraint::Min(0),    // grid + task table
            Constraint::Length(1), // footer
        ])
        .split(area);

    render_header(f, rows[0], snapshot);

    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(rows[1]);

    render_grid(f, cols[0], snapshot);
    render_tasks(f, cols[1], snapshot);
    render_footer(f, rows[2]);
}

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

fn render_header(f: &mut Frame, area: Rect, snapshot: Option<&LiveSnapshot>) {
    let block = Block::default()
        .title(Span::styled(
            " tilesched live monitor ",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ))
        .borders(Borders::ALL);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let spans = match snapshot {
        None => vec![Span::styled(
            "  no simulation running",
            Style::default().fg(Color::DarkGray),
        )],
        Some(s) => vec![
            Span::styled("  time: ", Style::default().fg(Color::DarkGray)),
            Span::styled(
                format!("{} ns", s.time_ns),
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ),
            Span::styled("   waiting: ", Style::default().fg(Color::DarkGray)),
            Span::raw(s.waiting.to_string()),
            Span::styled("   queued: ", Style::default().fg(Color::DarkGray)),
            Span::raw(s.queued.to_string()),
            Span::styled("   active: ", Style::default().fg(Color::DarkGray)),
            Span::styled(s.active.to_string(), Style::default().fg(Color::Green)),
            Span::styled("   completed: ", Style::default().fg(Color::DarkGray)),
            Span::styled(s.completed.to_string(), Style::default().fg(Color::Cyan)),
            Span::styled("   free cores: ", Style::default().fg(Color::DarkGray)),
            Span::raw(s.free_cores.to_string()),
        ],
    };
    f.render_widget(Paragraph::new(Line::from(spans)), inner);
}

// ---------------------------------------------------------------------------
// Core grid
// ---------------------------------------------------------------------------

fn cell_style(state: CellState) -> Style {
    match state {
        CellState::Free => Style::default().fg(Color::DarkGray),
        CellState::Reserved => Style::default().fg(Color::Magenta),
        CellState::Attached => Style::default().fg(Color::Yellow),
        CellState::Running => Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
    }
}

fn render_grid(f: &mut Frame, area: Rect, snapshot: Option<&LiveSnapshot>) {
    let block = Block::default().title(" Core Grid ").borders(Borders::ALL);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let Some(s) = snapshot else {
        let msg = Paragraph::new(vec![
            Line::raw(""),
            Line::from(Span::styled(
                "  No snapshot yet.",
                Style::default().fg(Color::DarkGray),
            )),
            Line::from(Span::styled(
                "  Start a simulation to see live data.",
                Style::default().fg(Color::DarkGray),
            )),
        ]);
        f.render_widget(msg, inner);
        return;
    };

    let legend = Line::from(vec![
        Span::styled("*n*", cell_style(CellState::Running)),
        Span::raw(" running  "),
        Span::styled("-n-", cell_style(CellState::Attached)),
        Span::raw(" attached  "),
        Span::styled("(n)", cell_style(CellState::Reserved)),
        Span::raw(" reserved  "),
        Span::styled(" · ", cell_style(CellState::Free)),
        Span::raw(" free"),
    ]);

    let mut lines: Vec<Line> = vec![legend, Line::raw("")];
    for row in 0..s.rows {
        let mut spans: Vec<Span> = vec![Span::raw("  ")];
        for col in 0..s.cols {
            let cell = &s.cells[row * s.cols + col];
            let text = match (cell.task, cell.state) {
                (None, _) => "  · ".to_string(),
                (Some(id), CellState::Running) => format!(" *{}*", id),
                (Some(id), CellState::Attached) => format!(" -{}-", id),
                (Some(id), _) => format!(" ({})", id),
            };
            spans.push(Span::styled(text, cell_style(cell.state)));
        }
        lines.push(Line::from(spans));
    }

    lines.push(Line::raw(""));
    let held = s.cells.iter().filter(|c| c.task.is_some()).count();
    lines.push(Line::from(Span::styled(
        format!("  {}/{} cores held", held, s.cells.len()),
        Style::default().fg(Color::DarkGray),
    )));

    f.render_widget(Paragraph::new(lines), inner);
}

// ---------------------------------------------------------------------------
// Task table
// ---------------------------------------------------------------------------

fn phase_color(phase: &str) -> Color {
    match phase {
        "active" => Color::Green,
        "queued" => Color::Yellow,
        "completed" => Color::Cyan,
        _ => Color::DarkGray,
    }
}

fn render_tasks(f: &mut Frame, area: Rect, snapshot: Option<&LiveSnapshot>) {
    let block = Block::default().title(" Tasks ").borders(Borders::ALL);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let Some(s) = snapshot else {
        return;
    };

    let mut lines = vec![
        Line::from(Span::styled(
            format!(
                "  {:>3} {:<38} {:>5} {:<10} {:>12} {:>12}",
                "id", "name", "cores", "phase", "arrival", "start"
            ),
            Style::default().fg(Color::DarkGray),
        )),
        Line::raw(""),
    ];

    for task in &s.tasks {
        lines.push(Line::from(vec![
            Span::raw(format!("  {:>3} {:<38} {:>5} ", task.id, task.name, task.core_requirement)),
            Span::styled(
                format!("{:<10}", task.phase),
                Style::default().fg(phase_color(&task.phase)),
            ),
            Span::raw(format!(" {:>12} {:>12}", task.arrival_time_ns, task.start_time_ns)),
        ]));
    }

    f.render_widget(Paragraph::new(lines), inner);
}

// ---------------------------------------------------------------------------
// Footer
// ---------------------------------------------------------------------------

fn render_footer(f: &mut Frame, area: Rect) {
    let text = Paragraph::new(Span::styled(
        format!("  q / esc: quit    auto-refreshes every 200ms    reads {}", SNAPSHOT_PATH),
        Style::default().fg(Color::DarkGray),
    ));
    f.render_widget(text, area);
}
