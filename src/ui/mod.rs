use ratatui::{
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph},
};

use crate::{AppState, RunState};

pub fn station_ui(f: &mut ratatui::Frame, app: &crate::AppState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints(
            [
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Length(app.bays.len() as u16 + 2),
                Constraint::Length(3),
                Constraint::Min(3),
                Constraint::Length(1),
            ]
            .as_ref(),
        )
        .split(f.area());

    f.render_widget(status_bar(app), chunks[0]);
    f.render_widget(queue_strip(app), chunks[1]);
    f.render_widget(bay_table(app), chunks[2]);
    f.render_widget(progress(app), chunks[3]);

    let log_lines: Vec<Line> = app
        .log
        .iter()
        .map(|(at, msg)| {
            Line::from(vec![
                Span::styled(
                    format!("[{}] ", at.format("%H:%M:%S")),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::raw(msg.as_str()),
            ])
        })
        .collect();

    let log_block = Paragraph::new(ratatui::text::Text::from(log_lines))
        .block(Block::default().borders(Borders::ALL).title("Log"))
        .wrap(ratatui::widgets::Wrap { trim: true })
        .scroll((
            app.log
                .len()
                .saturating_sub(chunks[4].height.saturating_sub(2) as usize) as u16,
            0,
        ));
    f.render_widget(log_block, chunks[4]);

    let help = Paragraph::new("s: start   x: stop   r: reset   q/Esc: quit")
        .style(Style::default().fg(Color::Yellow));
    f.render_widget(help, chunks[5]);
}

fn status_bar(app: &AppState) -> Paragraph<'static> {
    let (text, color) = match app.run_state {
        RunState::Idle => ("Ready", Color::Gray),
        RunState::Running => ("Simulation running...", Color::Green),
        RunState::Complete => ("Simulation complete", Color::Cyan),
        RunState::Stopped => ("Simulation stopped", Color::Red),
    };
    let line = Line::from(vec![
        Span::styled(
            text,
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!(
            "   slots: {}  pumps: {}  bays: {}  cars: {}",
            app.config.waiting_capacity,
            app.config.pump_count,
            app.config.bay_count,
            app.config.total_cars
        )),
    ]);
    Paragraph::new(line).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Service Station Simulator"),
    )
}

fn queue_strip(app: &AppState) -> Paragraph<'static> {
    let capacity = app.config.waiting_capacity;
    let mut spans: Vec<Span> = app
        .queue
        .iter()
        .map(|car| Span::styled(format!("[{car}] "), Style::default().fg(Color::LightBlue)))
        .collect();
    let free = capacity.saturating_sub(app.queue.len());
    spans.extend((0..free).map(|_| Span::styled("[ ---- ] ", Style::default().fg(Color::DarkGray))));

    Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!("Waiting area ({}/{capacity})", app.queue.len())),
    )
}

fn bay_table(app: &AppState) -> Paragraph<'static> {
    let lines: Vec<Line> = app
        .bays
        .iter()
        .enumerate()
        .map(|(i, occupant)| match occupant {
            Some(car) => Line::from(vec![
                Span::raw(format!("Bay {:<3}", i + 1)),
                Span::styled(
                    format!("servicing {car}"),
                    Style::default().fg(Color::Green),
                ),
            ]),
            None => Line::from(vec![
                Span::raw(format!("Bay {:<3}", i + 1)),
                Span::styled("free", Style::default().fg(Color::DarkGray)),
            ]),
        })
        .collect();

    let busy = app.bays.iter().filter(|b| b.is_some()).count();
    Paragraph::new(ratatui::text::Text::from(lines)).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!("Service bays ({busy} busy)")),
    )
}

fn progress(app: &AppState) -> Gauge<'static> {
    let stats = app.stats;
    let ratio = if stats.total == 0 {
        0.0
    } else {
        (stats.served as f64 / stats.total as f64).clamp(0.0, 1.0)
    };
    Gauge::default()
        .block(Block::default().borders(Borders::ALL).title("Progress"))
        .gauge_style(Style::default().fg(Color::Green))
        .label(format!(
            "served {} / {}   waiting {}",
            stats.served, stats.total, stats.waiting
        ))
        .ratio(ratio)
}
