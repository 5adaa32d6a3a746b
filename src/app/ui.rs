use tui::{
    backend::Backend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Span, Spans},
    widgets::{
        Axis, Block, BorderType, Borders, Cell, Chart, Dataset, GraphType, Paragraph, Row, Table,
        TableState,
    },
    Frame,
};

use super::graph::{y_max, ResourceGraph, Series};
use super::App;
use crate::container_management::ContainerStatus;

pub fn draw<B>(rect: &mut Frame<B>, app: &App)
where
    B: Backend,
{
    let size = rect.size();

    // Vertical layout
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(2)].as_ref())
        .split(size);

    if let Some(graph) = app.graph() {
        draw_graph(rect, chunks[0], graph);
    } else {
        draw_containers(rect, chunks[0], app);
    }

    let help = match app.status_message() {
        Some(msg) => format!("{} | {}", msg, app.actions()),
        None => format!("{}", app.actions()),
    };
    draw_help(rect, chunks[1], &help);
}

fn draw_containers<B>(frame: &mut Frame<B>, chunk: Rect, app: &App)
where
    B: Backend,
{
    let selected_style = Style::default().add_modifier(Modifier::REVERSED);

    let header_cells = ["", "ID", "NAME", "IMAGE", "STATE"]
        .iter()
        .map(|h| Cell::from(*h).style(Style::default().fg(Color::LightCyan)));
    let header = Row::new(header_cells).height(1).bottom_margin(1);
    let rows = app.containers().iter().map(|c| {
        let id: String = c.id.chars().take(12).collect();
        Row::new(vec![
            Cell::from(Span::styled(" ", Style::default().bg(status_color(&c.status)))),
            Cell::from(id),
            Cell::from(c.name.clone()),
            Cell::from(c.image.clone()),
            Cell::from(format!("{:?}", c.status).to_lowercase()),
        ])
        .height(1)
        .bottom_margin(0)
    });

    let t = Table::new(rows)
        .header(header)
        .block(Block::default().borders(Borders::TOP).title("Containers"))
        .highlight_style(selected_style)
        .widths(&[
            Constraint::Length(1),  // Status
            Constraint::Length(12), // ID
            Constraint::Percentage(25),
            Constraint::Percentage(35),
            Constraint::Length(10),
        ])
        .column_spacing(2);

    let mut table_state = TableState::default();
    table_state.select(app.selected_container_index());

    frame.render_stateful_widget(t, chunk, &mut table_state);
}

fn draw_graph<B>(frame: &mut Frame<B>, chunk: Rect, graph: &ResourceGraph)
where
    B: Backend,
{
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(2),
                Constraint::Ratio(1, 3),
                Constraint::Ratio(1, 3),
                Constraint::Ratio(1, 3),
            ]
            .as_ref(),
        )
        .split(chunk);

    let title = format!(
        "Resource usage for {} ({})",
        graph.container(),
        graph.state()
    );
    let latest = match graph.last() {
        Some(s) => format!(
            "#{} at {}  cpu {}  mem {}  disk {}",
            s.sequence,
            s.captured_at.format("%H:%M:%S"),
            label_for_cpu(s.cpu_percent),
            label_for_mb(s.memory_mb),
            label_for_mb(s.disk_mb)
        ),
        None => "Waiting for the first sample...".to_string(),
    };
    let p = Paragraph::new(vec![Spans::from(Span::raw(latest))])
        .block(Block::default().borders(Borders::TOP).title(title));
    frame.render_widget(p, chunks[0]);

    let x_bounds = graph.x_bounds();
    draw_series(frame, chunks[1], "CPU Usage (%)", Color::Red, graph.cpu(), x_bounds);
    draw_series(
        frame,
        chunks[2],
        "Memory Usage (MB)",
        Color::Green,
        graph.memory(),
        x_bounds,
    );
    draw_series(
        frame,
        chunks[3],
        "Disk Usage (MB)",
        Color::Blue,
        graph.disk(),
        x_bounds,
    );
}

fn draw_series<B>(
    frame: &mut Frame<B>,
    chunk: Rect,
    title: &str,
    color: Color,
    series: &Series,
    x_bounds: [f64; 2],
) where
    B: Backend,
{
    let y_top = y_max(series);
    let datasets = vec![Dataset::default()
        .name(title)
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(color))
        .data(series)];

    let chart = Chart::new(datasets)
        .block(Block::default().borders(Borders::TOP).title(title))
        .x_axis(
            Axis::default()
                .title("Time")
                .style(Style::default().fg(Color::Gray))
                .bounds(x_bounds)
                .labels(vec![
                    Span::raw(format!("{:.0}", x_bounds[0])),
                    Span::raw(format!("{:.0}", x_bounds[1])),
                ]),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(Color::Gray))
                .bounds([0.0, y_top])
                .labels(vec![
                    Span::raw("0"),
                    Span::raw(format!("{:.1}", y_top / 2.0)),
                    Span::raw(format!("{:.1}", y_top)),
                ]),
        );
    frame.render_widget(chart, chunk);
}

fn draw_help<B>(frame: &mut Frame<B>, chunk: Rect, help_txt: &str)
where
    B: Backend,
{
    let p = Paragraph::new(vec![Spans::from(Span::raw(help_txt))])
        .style(Style::default().fg(Color::LightCyan))
        .alignment(Alignment::Left)
        .block(
            Block::default()
                .borders(Borders::TOP)
                .style(Style::default().fg(Color::White))
                .title("Help")
                .border_type(BorderType::Plain),
        );
    frame.render_widget(p, chunk);
}

fn status_color(status: &ContainerStatus) -> Color {
    match status {
        ContainerStatus::Created => Color::Gray,
        ContainerStatus::Running => Color::Green,
        ContainerStatus::Paused => Color::Yellow,
        ContainerStatus::Stopped | ContainerStatus::Exited => Color::Red,
        ContainerStatus::Restarting => Color::LightGreen,
        ContainerStatus::Removing => Color::LightRed,
        ContainerStatus::Dead => Color::Black,
        ContainerStatus::Unknown => Color::DarkGray,
    }
}

fn label_for_mb(mb: f64) -> String {
    if mb >= 1024.0 {
        format!("{:.2} GB", mb / 1024.0)
    } else {
        format!("{:.2} MB", mb)
    }
}

fn label_for_cpu(cpu_usage: f64) -> String {
    format!("{:.2}%", cpu_usage)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels() {
        assert_eq!(label_for_cpu(12.345), "12.35%");
        assert_eq!(label_for_mb(100.0), "100.00 MB");
        assert_eq!(label_for_mb(2048.0), "2.00 GB");
    }
}
