use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction as LayoutDirection, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Cell, Paragraph, Row, Table},
};
use ticker_board::{
    Band, DisplayValue, Exchange, FeedStatus, Field, FieldKind, FieldView, ViewModel, ViewState,
    transition::Direction,
};

const SPINNER: [&str; 4] = ["|", "/", "-", "\\"];

/// Everything one frame needs.
pub struct Screen<'a> {
    pub view: &'a ViewModel,
    pub feed: FeedStatus,
    pub tick: usize,
}

pub fn render(f: &mut Frame, screen: &Screen<'_>) {
    let chunks = Layout::default()
        .direction(LayoutDirection::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(f.area());

    render_status_bar(f, chunks[0], screen);
    render_board(f, chunks[1], screen.view);
    render_help(f, chunks[2]);
}

/// Foreground colour of a banded cell.
pub fn band_color(band: Band) -> Color {
    match band {
        Band::AtCeiling => Color::Magenta,
        Band::AtFloor => Color::Cyan,
        Band::AtReference => Color::Yellow,
        Band::AboveReference => Color::Green,
        Band::BelowReference => Color::Red,
        Band::Unknown => Color::Reset,
    }
}

/// Background flash of a cell with a live transition.
pub fn transition_background(direction: Option<Direction>) -> Option<Color> {
    direction.map(|direction| match direction {
        Direction::Increase => Color::Rgb(0, 90, 40),
        Direction::Decrease => Color::Rgb(110, 20, 20),
        Direction::Equal => Color::Rgb(70, 70, 70),
    })
}

/// Exchange after `current` in display order, wrapping around.
pub fn next_exchange(current: Exchange) -> Exchange {
    let position = Exchange::ALL
        .iter()
        .position(|exchange| *exchange == current)
        .unwrap_or(0);
    Exchange::ALL[(position + 1) % Exchange::ALL.len()]
}

/// Cell text, with an arrow while the value is animating.
pub fn field_text(cell: &FieldView) -> String {
    match cell.transition {
        Some(direction) => format!("{}{}", cell.value, direction.arrow()),
        None => cell.value.to_string(),
    }
}

pub fn state_text(view: &ViewModel, tick: usize) -> String {
    let label = view.state.label();
    match view.state {
        ViewState::Loading => format!("{} {label}", SPINNER[tick % SPINNER.len()]),
        ViewState::Ready => format!("{label} {} symbols", view.symbols.len()),
        ViewState::Empty => format!(
            "{label} for {} / {}",
            view.selection.exchange, view.selection.mode
        ),
        ViewState::Error => match &view.last_error {
            Some(error) => format!("{label} {error}"),
            None => label.to_string(),
        },
    }
}

fn state_color(state: ViewState) -> Color {
    match state {
        ViewState::Loading => Color::Rgb(100, 149, 237),
        ViewState::Ready => Color::Rgb(0, 255, 127),
        ViewState::Empty => Color::Rgb(128, 128, 128),
        ViewState::Error => Color::Rgb(255, 69, 58),
    }
}

fn render_status_bar(f: &mut Frame, area: Rect, screen: &Screen<'_>) {
    let view = screen.view;

    let title = Span::styled(
        " ◆ TICKER BOARD ◆ ",
        Style::default()
            .fg(Color::Rgb(255, 215, 0))
            .add_modifier(Modifier::BOLD),
    );
    let selection = Span::styled(
        format!(" {} ", view.selection),
        Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
    );
    let state = Span::styled(
        format!(" {} ", state_text(view, screen.tick)),
        Style::default().fg(state_color(view.state)),
    );

    let (feed_symbol, feed_color) = match screen.feed {
        FeedStatus::Connected => ("●", Color::Rgb(0, 255, 127)),
        FeedStatus::Reconnecting => ("◌", Color::Rgb(255, 215, 0)),
        FeedStatus::Disconnected => ("○", Color::Rgb(255, 69, 58)),
    };
    let feed = Span::styled(
        format!(" {} push {} ", feed_symbol, screen.feed.label()),
        Style::default().fg(feed_color),
    );

    let updated = Span::styled(
        match view.updated_at {
            Some(time) => format!(" ⏱  {} ", time.format("%H:%M:%S")),
            None => " ⏱  --:--:-- ".to_string(),
        },
        Style::default().fg(Color::Rgb(100, 149, 237)),
    );

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Double)
        .border_style(Style::default().fg(Color::Rgb(138, 43, 226)));

    let paragraph = Paragraph::new(Line::from(vec![title, selection, state, feed, updated]))
        .block(block)
        .alignment(Alignment::Center);

    f.render_widget(paragraph, area);
}

fn column_width(field: Field) -> u16 {
    match field.kind() {
        FieldKind::Price => 7,
        FieldKind::Volume => 10,
        FieldKind::Percent => 6,
    }
}

fn render_board(f: &mut Frame, area: Rect, view: &ViewModel) {
    let header_style = Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD);
    let header = Row::new(
        ["Symbol", "Ref", "Ceil", "Floor"]
            .into_iter()
            .chain(Field::ALL.iter().map(|field| field.label()))
            .map(|label| Cell::from(label).style(header_style)),
    )
    .height(1);

    let rows = view.symbols.values().map(|row| {
        let bounds = [
            (&row.reference, Band::AtReference),
            (&row.ceiling, Band::AtCeiling),
            (&row.floor, Band::AtFloor),
        ]
        .into_iter()
        .map(|(value, band)| {
            Cell::from(value.as_str().to_string()).style(Style::default().fg(band_color(band)))
        });

        let fields = Field::ALL.iter().map(|field| match row.field(*field) {
            Some(cell) => {
                let mut style = Style::default().fg(band_color(cell.band));
                if let Some(background) = transition_background(cell.transition) {
                    style = style.bg(background);
                }
                Cell::from(field_text(cell)).style(style)
            }
            None => Cell::from(DisplayValue::NoData.as_str().to_string()),
        });

        let symbol = Cell::from(row.symbol.to_string()).style(
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        );

        Row::new(std::iter::once(symbol).chain(bounds).chain(fields)).height(1)
    });

    let widths = [8, 7, 7, 7]
        .into_iter()
        .chain(Field::ALL.iter().map(|field| column_width(*field)))
        .map(Constraint::Length)
        .collect::<Vec<_>>();

    let table = Table::new(rows, widths).header(header).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!(" {} ", view.selection))
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(table, area);
}

fn render_help(f: &mut Frame, area: Rect) {
    let help = Paragraph::new(Span::styled(
        " [H] HOSE  [N] HNX  [Tab] Next  [B] Board  [W] Watchlist  [R] Refresh  [Q] Quit ",
        Style::default().fg(Color::Rgb(128, 128, 128)),
    ));
    f.render_widget(help, area);
}
