//! Terminal price board.
//!
//! Environment:
//! - `BOARD_API_URL` snapshot API base URL (default `http://127.0.0.1:8080`)
//! - `BOARD_PUSH_URL` push-event WebSocket URL (default `ws://127.0.0.1:9001`)
//! - `BOARD_FEATURES` comma-separated granted features (default `watchlist`)
//! - `BOARD_LOG` log file, since stdout belongs to the terminal UI (default `ticker-board.log`)
//! - `BOARD_*` engine settings, see [`EngineConfig::from_env`]

mod ui;

use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use std::{
    error::Error,
    fs::File,
    io,
    sync::Arc,
    time::{Duration, Instant},
};
use ticker_board::{
    BoardEngine, EngineConfig, Exchange, HttpSnapshotFetcher, PushFeed, PushFeedConfig,
    StaticCapabilities, ViewMode, ViewSelection,
};
use tracing::{info, warn};
use ui::Screen;

const TICK_RATE: Duration = Duration::from_millis(250);
const INPUT_POLL: Duration = Duration::from_millis(50);

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn init_logging() -> Result<(), Box<dyn Error>> {
    let file = File::create(env_or("BOARD_LOG", "ticker-board.log"))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_logging()?;

    let config = EngineConfig::from_env();
    let capabilities = StaticCapabilities::new(env_or("BOARD_FEATURES", "watchlist").split(','));
    let api_url = env_or("BOARD_API_URL", "http://127.0.0.1:8080");
    let push_url = env_or("BOARD_PUSH_URL", "ws://127.0.0.1:9001");
    info!(%api_url, %push_url, ?config, "starting ticker board");

    let feed = PushFeed::new(PushFeedConfig::new(push_url)).start();
    let engine = BoardEngine::start(
        HttpSnapshotFetcher::new(api_url),
        Arc::new(capabilities),
        config,
        ViewSelection::default(),
    );
    engine.attach_push_feed(feed.subscribe());

    // Restore the terminal on panic
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture);
        original_hook(panic_info);
    }));

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &engine, feed.status());

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    engine.shutdown();
    result?;
    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    engine: &BoardEngine,
    feed_status: tokio::sync::watch::Receiver<ticker_board::FeedStatus>,
) -> io::Result<()> {
    let mut updates = engine.updates();
    let mut last_draw: Option<Instant> = None;
    let mut tick = 0usize;

    loop {
        let changed = updates.has_changed().unwrap_or(false);
        let due = last_draw.is_none_or(|drawn| drawn.elapsed() >= TICK_RATE);

        if changed || due {
            updates.borrow_and_update();
            if due {
                tick = tick.wrapping_add(1);
            }

            let view = engine.view_model();
            let screen = Screen {
                view: &view,
                feed: *feed_status.borrow(),
                tick,
            };
            terminal.draw(|f| ui::render(f, &screen))?;
            last_draw = Some(Instant::now());
        }

        if !event::poll(INPUT_POLL)? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        let selection = engine.selection();
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
            KeyCode::Char('h') => {
                engine.set_view_selection(Exchange::Hose, selection.mode);
            }
            KeyCode::Char('n') => {
                engine.set_view_selection(Exchange::Hnx, selection.mode);
            }
            KeyCode::Tab => {
                engine.set_view_selection(ui::next_exchange(selection.exchange), selection.mode);
            }
            KeyCode::Char('b') => {
                engine.set_view_selection(selection.exchange, ViewMode::Board);
            }
            KeyCode::Char('w') => {
                let entered = engine.set_view_selection(selection.exchange, ViewMode::Watchlist);
                if entered.mode != ViewMode::Watchlist {
                    warn!("watchlist not available, staying on board");
                }
            }
            KeyCode::Char('r') => {
                if let Err(error) = engine.refresh() {
                    warn!(%error, "refresh rejected");
                }
            }
            _ => {}
        }
    }
}
