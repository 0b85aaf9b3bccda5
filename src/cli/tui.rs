use std::io::{self, Stdout, stdout};
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Frame;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

use crate::board::Tile;
use crate::cli::board_display::{render_board, team_color};
use crate::coords::HexCoord;
use crate::game::rules::{CITADEL_MAX_HEALTH, CITADEL_MAX_TURRETS, ROLL_COIN_COST};
use crate::game::{CoinPurse, EngineError, SelectOutcome, TurnEngine};
use crate::store::Subscription;
use crate::types::{BuildKind, LocalPhase};

pub type Terminal = ratatui::Terminal<CrosstermBackend<Stdout>>;

/// Roulette animation length, matching the original spin delay.
const SPIN_DURATION: Duration = Duration::from_millis(1500);

/// Stand-in for the surrounding application's coin balance.
#[derive(Debug, Clone, Copy)]
pub struct LocalPurse {
    pub coins: u32,
}

impl CoinPurse for LocalPurse {
    fn try_debit(&mut self, amount: u32) -> bool {
        if self.coins < amount {
            return false;
        }
        self.coins -= amount;
        true
    }
}

pub struct TuiApp {
    engine: TurnEngine,
    subscription: Subscription,
    purse: LocalPurse,
    radius: i32,
    cursor: HexCoord,
    status: String,
    spin_deadline: Option<Instant>,
    inspected: Option<Tile>,
    should_quit: bool,
}

impl TuiApp {
    pub fn new(
        engine: TurnEngine,
        subscription: Subscription,
        purse: LocalPurse,
        radius: i32,
    ) -> Self {
        Self {
            engine,
            subscription,
            purse,
            radius,
            cursor: HexCoord::new(0, 0),
            status: String::from("press 'r' to roll"),
            spin_deadline: None,
            inspected: None,
            should_quit: false,
        }
    }

    pub fn run(&mut self) -> io::Result<()> {
        enable_raw_mode()?;
        let mut out = stdout();
        execute!(out, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(out);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        let result = loop {
            if self.should_quit {
                break Ok(());
            }
            self.pump();
            terminal.draw(|f| self.render(f))?;

            if event::poll(Duration::from_millis(50))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key(key);
                    }
                }
            }
        };

        let _ = disable_raw_mode();
        let _ = execute!(terminal.backend_mut(), LeaveAlternateScreen);
        let _ = terminal.show_cursor();
        result
    }

    /// Drain remote snapshots and complete a pending roll once the roulette
    /// delay has elapsed.
    fn pump(&mut self) {
        while let Some(snapshot) = self.subscription.try_next() {
            if let Err(err) = self.engine.sync_from(snapshot) {
                self.status = format!("sync failed: {err}");
            }
        }
        if let Some(deadline) = self.spin_deadline {
            if Instant::now() >= deadline {
                self.spin_deadline = None;
                match self.engine.finish_roll() {
                    Ok(outcome) => {
                        self.status = format!(
                            "rolled {} (+{} bank) -> {} AP",
                            outcome.die, outcome.bank_bonus, outcome.action_points
                        );
                    }
                    Err(err) => self.status = format!("roll failed: {err}"),
                }
            }
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if self.inspected.is_some() {
            self.handle_citadel_key(key);
            return;
        }
        match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') => self.should_quit = true,
            KeyCode::Left => self.move_cursor(-1, 0),
            KeyCode::Right => self.move_cursor(1, 0),
            KeyCode::Up => self.move_cursor(0, -1),
            KeyCode::Down => self.move_cursor(0, 1),
            KeyCode::Char('r') => self.start_roll(),
            KeyCode::Char('s') => {
                self.engine.skip_turn();
                self.status = String::from("turn ended, AP carried over");
            }
            KeyCode::Char('1') => self.toggle_build(BuildKind::Wall),
            KeyCode::Char('2') => self.toggle_build(BuildKind::Turret),
            KeyCode::Char('3') => self.toggle_build(BuildKind::Mine),
            KeyCode::Enter | KeyCode::Char(' ') => self.select_cursor(),
            _ => {}
        }
    }

    fn handle_citadel_key(&mut self, key: KeyEvent) {
        let Some(tile) = self.inspected.clone() else { return };
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => self.inspected = None,
            KeyCode::Char('p') => {
                let outcome = self.engine.repair_citadel(tile.coord);
                self.report(outcome, "repair");
                self.refresh_inspected(tile.coord);
            }
            KeyCode::Char('u') => {
                let outcome = self.engine.upgrade_turret(tile.coord);
                self.report(outcome, "upgrade");
                self.refresh_inspected(tile.coord);
            }
            _ => {}
        }
    }

    fn refresh_inspected(&mut self, coord: HexCoord) {
        self.inspected = self.engine.grid().get(coord).cloned();
    }

    fn move_cursor(&mut self, dq: i32, dr: i32) {
        let next = self.cursor.add(dq, dr);
        if self.engine.grid().get(next).is_some() {
            self.cursor = next;
        }
    }

    fn start_roll(&mut self) {
        if self.spin_deadline.is_some() {
            return;
        }
        let mut purse = self.purse;
        match self.engine.start_roll(&mut purse) {
            Ok(()) => {
                self.purse = purse;
                self.spin_deadline = Some(Instant::now() + SPIN_DURATION);
                self.status = String::from("spinning...");
            }
            Err(err @ EngineError::InsufficientCoins(_)) => {
                self.status = format!("{err} — you have {}", self.purse.coins);
            }
            Err(err) => self.status = err.to_string(),
        }
    }

    fn toggle_build(&mut self, kind: BuildKind) {
        self.engine.toggle_build_mode(kind);
        self.status = match self.engine.build_mode() {
            Some(kind) => format!("build mode: {kind} — click an owned plain tile"),
            None => String::from("build mode off"),
        };
    }

    fn select_cursor(&mut self) {
        let outcome = self.engine.select_tile(self.cursor);
        self.report(outcome, "move");
    }

    fn report(&mut self, outcome: Result<SelectOutcome, EngineError>, what: &str) {
        match outcome {
            Ok(SelectOutcome::Ignored) => {}
            Ok(SelectOutcome::InspectCitadel(tile)) => {
                self.inspected = Some(tile);
            }
            Ok(SelectOutcome::Built { kind, at }) => {
                self.status = format!("built {kind} at {at}");
            }
            Ok(SelectOutcome::SiegeHit { at, health_left }) => {
                self.status = format!("siege hit at {at}, {health_left} HP left");
            }
            Ok(SelectOutcome::Captured { at, eliminated, .. }) => {
                self.status = match eliminated {
                    Some(loser) => {
                        let name = self
                            .engine
                            .participants()
                            .get(loser)
                            .map_or_else(|| loser.to_string(), |p| p.name.clone());
                        format!("citadel destroyed — {name} is eliminated!")
                    }
                    None => format!("captured {at}"),
                };
            }
            Ok(SelectOutcome::MineTriggered { at }) => {
                self.status = format!("mine at {at}! all AP lost, turn over");
            }
            Ok(SelectOutcome::Repaired { health, .. }) => {
                self.status = format!("citadel repaired to {health} HP");
            }
            Ok(SelectOutcome::TurretRaised { turrets, .. }) => {
                self.status = format!("turret raised ({turrets} total)");
            }
            Err(err) => self.status = format!("{what} failed: {err}"),
        }
    }

    // --- rendering ---

    fn render(&mut self, f: &mut Frame<'_>) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(10), Constraint::Length(3)])
            .split(f.size());
        let main = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(62), Constraint::Percentage(38)])
            .split(chunks[0]);

        self.render_board(f, main[0]);
        self.render_side_panel(f, main[1]);
        self.render_status_bar(f, chunks[1]);
        if self.inspected.is_some() {
            self.render_citadel_popup(f, chunks[0]);
        }
    }

    fn render_board(&self, f: &mut Frame<'_>, area: Rect) {
        let lines = render_board(
            self.engine.grid(),
            self.engine.participants(),
            self.radius,
            self.engine.legal_moves(),
            self.cursor,
        );
        let block = Block::default().borders(Borders::ALL).title("Board");
        f.render_widget(
            Paragraph::new(lines)
                .block(block)
                .alignment(Alignment::Left),
            area,
        );
    }

    fn render_side_panel(&self, f: &mut Frame<'_>, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(10), Constraint::Min(4)])
            .split(area);

        let mut lines: Vec<Line<'_>> = Vec::new();
        for participant in self.engine.participants() {
            let marker = if participant.id == self.engine.team() {
                "→ "
            } else {
                "  "
            };
            let mut style = Style::default()
                .fg(team_color(&participant.color))
                .add_modifier(Modifier::BOLD);
            let suffix = if participant.is_dead {
                style = style.add_modifier(Modifier::CROSSED_OUT);
                " DEAD"
            } else {
                ""
            };
            lines.push(Line::from(vec![
                Span::styled(marker, Style::default().fg(Color::Yellow)),
                Span::styled(participant.name.clone(), style),
                Span::raw(format!(
                    "  score {}  AP {}{}",
                    participant.score, participant.action_points, suffix
                )),
            ]));
        }
        lines.push(Line::from(""));
        lines.push(Line::from(format!(
            "coins {}  (roll costs {ROLL_COIN_COST})",
            self.purse.coins
        )));
        f.render_widget(
            Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Teams")),
            chunks[0],
        );

        let visible = area.height.saturating_sub(4) as usize;
        let logs: Vec<Line<'_>> = self
            .engine
            .logs()
            .iter()
            .rev()
            .take(visible.max(1))
            .rev()
            .map(|entry| Line::from(entry.clone()))
            .collect();
        f.render_widget(
            Paragraph::new(logs)
                .block(Block::default().borders(Borders::ALL).title("Log"))
                .wrap(Wrap { trim: true }),
            chunks[1],
        );
    }

    fn render_status_bar(&self, f: &mut Frame<'_>, area: Rect) {
        let phase_hint = match self.engine.local_phase() {
            LocalPhase::Rolling => "r: roll",
            LocalPhase::Expanding => "enter: move | 1/2/3: build wall/turret/mine | s: end turn",
        };
        let text = format!(
            "[{}] {} | {} | arrows: cursor | q: quit",
            self.engine.local_phase(),
            self.status,
            phase_hint
        );
        f.render_widget(
            Paragraph::new(text)
                .block(Block::default().borders(Borders::ALL))
                .alignment(Alignment::Center),
            area,
        );
    }

    fn render_citadel_popup(&self, f: &mut Frame<'_>, area: Rect) {
        let Some(tile) = &self.inspected else { return };
        let owner = tile
            .owner
            .and_then(|id| self.engine.participants().get(id))
            .map_or_else(|| String::from("neutral"), |p| p.name.clone());
        let own = tile.owner == Some(self.engine.team());

        let mut lines = vec![
            Line::from(format!("Citadel at {}", tile.coord)),
            Line::from(format!("owner: {owner}")),
            Line::from(format!(
                "health: {} / {CITADEL_MAX_HEALTH}",
                tile.health.unwrap_or(0)
            )),
            Line::from(format!(
                "turrets: {} / {CITADEL_MAX_TURRETS}",
                tile.turret_count.unwrap_or(0)
            )),
            Line::from(""),
        ];
        lines.push(Line::from(if own {
            "p: repair (5 AP) | u: turret (30 AP) | esc: close"
        } else {
            "esc: close"
        }));

        let width = 44.min(area.width);
        let height = 8.min(area.height);
        let popup = Rect {
            x: area.x + (area.width.saturating_sub(width)) / 2,
            y: area.y + (area.height.saturating_sub(height)) / 2,
            width,
            height,
        };
        f.render_widget(Clear, popup);
        f.render_widget(
            Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Citadel")),
            popup,
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crossterm::event::KeyModifiers;

    use super::*;
    use crate::game::GameConfig;
    use crate::store::{MemoryStore, StoreAdapter};

    fn app() -> TuiApp {
        let store = Arc::new(MemoryStore::new());
        let adapter = StoreAdapter::new(store, "tui-test");
        let subscription = adapter.subscribe();
        let config = GameConfig {
            radius: 2,
            num_teams: 6,
            seed: 7,
        };
        let engine = TurnEngine::new(adapter, 0, &config).unwrap();
        TuiApp::new(engine, subscription, LocalPurse { coins: 10_000 }, 2)
    }

    fn press(app: &mut TuiApp, code: KeyCode) {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE));
    }

    #[test]
    fn citadel_popup_keys_dispatch_and_close() {
        let mut app = app();
        let home = HexCoord::new(0, -2);
        app.inspected = app.engine.grid().get(home).cloned();
        assert!(app.inspected.is_some());

        // Repair and upgrade route through the engine (no-ops while still
        // in the Rolling phase) and keep the popup open on a live tile.
        press(&mut app, KeyCode::Char('p'));
        assert!(app.inspected.is_some());
        press(&mut app, KeyCode::Char('u'));
        assert!(app.inspected.is_some());

        press(&mut app, KeyCode::Esc);
        assert!(app.inspected.is_none());
    }

    #[test]
    fn quit_key_is_captured_by_the_popup_first() {
        let mut app = app();
        app.inspected = app.engine.grid().get(HexCoord::new(0, -2)).cloned();
        press(&mut app, KeyCode::Char('q'));
        assert!(app.inspected.is_none());
        assert!(!app.should_quit);
    }
}
