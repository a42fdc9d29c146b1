use tokio::sync::mpsc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

use crossterm::event::{
    DisableMouseCapture, EnableMouseCapture, Event, Event as CEvent, EventStream, KeyCode,
};
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};

use ratatui::{Terminal, backend::CrosstermBackend};

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use clap::Parser;
use futures_util::StreamExt;

use service_station::{
    CarId, ChannelObserver, Outcome, Pacing, RandomPacing, Simulation, StationConfig,
    StationEvent, Stats,
};

mod logger;
mod ui;

#[derive(Parser)]
#[command(about = "Service station producer/consumer simulation")]
struct Args {
    #[arg(long, default_value_t = 5, help = "Waiting area capacity (1-20)")]
    slots: usize,

    #[arg(short, long, default_value_t = 3, help = "Number of pumps (1-10)")]
    pumps: usize,

    #[arg(short, long, help = "Number of service bays, defaults to the pump count")]
    bays: Option<usize>,

    #[arg(short, long, default_value_t = 12, help = "Number of cars to simulate (1-100)")]
    cars: usize,

    #[arg(long, help = "Seed for arrival and service delays")]
    seed: Option<u64>,

    #[arg(long, default_value_t = 1.0, value_parser = parse_speed, help = "Speed-up factor applied to all delays (0.01-1000)")]
    speed: f64,

    #[arg(long, help = "Run without the TUI and print events to stdout")]
    headless: bool,

    #[arg(long, requires = "headless", help = "Print events as JSON lines")]
    json: bool,

    #[arg(long, default_value_t = 1000, help = "Grace period for tasks on shutdown, in ms")]
    grace_ms: u64,

    #[arg(short, long, action = clap::ArgAction::Count, help = "Increase log verbosity (headless only)")]
    verbose: u8,
}

fn parse_speed(raw: &str) -> Result<f64, String> {
    let speed: f64 = raw.parse().map_err(|e| format!("{e}"))?;
    let (min, max) = RandomPacing::SPEED_LIMITS;
    if (min..=max).contains(&speed) {
        Ok(speed)
    } else {
        Err(format!("speed must be between {min} and {max}"))
    }
}

impl Args {
    fn station_config(&self) -> anyhow::Result<StationConfig> {
        let config = StationConfig::new(self.slots, self.bays.unwrap_or(self.pumps), self.cars)?
            .with_pumps(self.pumps)?;
        config.check_limits()?;
        Ok(config)
    }

    fn pacing(&self) -> Arc<dyn Pacing> {
        let pacing = match self.seed {
            Some(seed) => RandomPacing::seeded(seed),
            None => RandomPacing::new(),
        };
        Arc::new(pacing.with_speed(self.speed))
    }

    fn grace(&self) -> Duration {
        Duration::from_millis(self.grace_ms)
    }
}

pub struct AppStateQueue {
    tx: UnboundedSender<Msg>,
    rx: UnboundedReceiver<Msg>,
}

impl From<(UnboundedSender<Msg>, UnboundedReceiver<Msg>)> for AppStateQueue {
    fn from(value: (UnboundedSender<Msg>, UnboundedReceiver<Msg>)) -> Self {
        AppStateQueue {
            tx: value.0,
            rx: value.1,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum RunState {
    Idle,
    Running,
    Complete,
    Stopped,
}

struct AppState {
    args: Args,
    config: StationConfig,
    event_queue: AppStateQueue,
    sim: Option<Simulation>,
    // Bumped on every start and reset; events tagged with an older run are dropped.
    generation: u64,
    run_state: RunState,
    queue: Vec<CarId>,
    bays: Vec<Option<CarId>>,
    stats: Stats,
    log: Vec<(DateTime<Local>, String)>,
}

impl AppState {
    const LOG_LIMIT: usize = 500;

    pub fn new(args: Args, config: StationConfig) -> AppState {
        AppState {
            args,
            config,
            event_queue: AppStateQueue::from(mpsc::unbounded_channel::<Msg>()),
            sim: None,
            generation: 0,
            run_state: RunState::Idle,
            queue: vec![],
            bays: vec![None; config.bay_count],
            stats: Stats {
                total: config.total_cars,
                ..Stats::default()
            },
            log: vec![],
        }
    }

    fn push_log(&mut self, at: DateTime<Local>, message: String) {
        self.log.push((at, message));
        if self.log.len() > Self::LOG_LIMIT {
            let excess = self.log.len() - Self::LOG_LIMIT;
            self.log.drain(..excess);
        }
    }

    fn start_simulation(&mut self) {
        if self.run_state == RunState::Running {
            return;
        }
        // A stopped run may still have services in flight.
        let _ = self.retire_simulation();
        self.generation += 1;
        self.clear_view();
        let generation = self.generation;
        let observer = ChannelObserver::mapped(self.event_queue.tx.clone(), move |ev| {
            Msg::Station(generation, ev)
        });
        match Simulation::start(self.config, self.args.pacing(), Arc::new(observer)) {
            Ok(sim) => {
                self.sim = Some(sim);
                self.run_state = RunState::Running;
            }
            Err(e) => self.push_log(Local::now(), format!("Cannot start: {e}")),
        }
    }

    fn stop_simulation(&mut self) {
        if let Some(sim) = &self.sim {
            sim.stop();
        }
    }

    /// Stops the current run and lets its tasks drain off the UI thread.
    fn retire_simulation(&mut self) -> Option<tokio::task::JoinHandle<bool>> {
        let sim = self.sim.take()?;
        let grace = self.args.grace();
        Some(tokio::task::spawn_blocking(move || sim.shutdown(grace)))
    }

    fn reset_simulation(&mut self) {
        let _ = self.retire_simulation();
        self.generation += 1;
        self.clear_view();
        self.run_state = RunState::Idle;
        self.push_log(Local::now(), "Simulation reset".to_owned());
    }

    fn clear_view(&mut self) {
        self.queue.clear();
        self.bays = vec![None; self.config.bay_count];
        self.stats = Stats {
            total: self.config.total_cars,
            ..Stats::default()
        };
        self.log.clear();
    }

    pub fn handle_station_event(&mut self, generation: u64, event: StationEvent) {
        if generation != self.generation {
            return;
        }
        match event {
            StationEvent::QueueChanged { snapshot, .. } => self.queue = snapshot,
            StationEvent::BayStatusChanged { bay, occupant } => {
                if let Some(slot) = self.bays.get_mut(bay) {
                    *slot = occupant;
                }
            }
            StationEvent::StatsChanged {
                served,
                waiting,
                total,
            } => {
                self.stats = Stats {
                    served,
                    waiting,
                    total,
                }
            }
            StationEvent::Log { message, at } => self.push_log(at, message),
            StationEvent::Completed { .. } => self.run_state = RunState::Complete,
            StationEvent::Stopped { .. } => self.run_state = RunState::Stopped,
        }
    }

    pub fn handle_input(&mut self, ev: Event) -> anyhow::Result<()> {
        if let Event::Key(key_event) = ev {
            match key_event.code {
                KeyCode::Char('s') => self.start_simulation(),
                KeyCode::Char('x') => self.stop_simulation(),
                KeyCode::Char('r') => self.reset_simulation(),
                _ => { /* ignore all other keys */ }
            }
        }

        Ok(())
    }
}

/// Messages that can arrive in the UI loop
pub enum Msg {
    Input(CEvent),
    Station(u64, StationEvent),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // parse arguments
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            e.print().expect("Error writing clap error");
            std::process::exit(0);
        }
    };
    let config = args.station_config()?;

    if args.headless {
        logger::init(logger::level_from_verbosity(args.verbose))?;
        return run_headless(args, config).await;
    }

    // ---- UI LOOP ----------------------------------------------------------
    enable_raw_mode()?; // crossterm
    let mut stdout_handle = std::io::stdout();
    crossterm::execute!(stdout_handle, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout_handle);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let mut events = EventStream::new();
    let mut ticker = tokio::time::interval(Duration::from_millis(33));
    let mut state = AppState::new(args, config);

    'uiloop: loop {
        // first: non-blocking drain of all pending messages
        while let Ok(msg) = state.event_queue.rx.try_recv() {
            match msg {
                Msg::Input(ev) => match ev.as_key_event() {
                    Some(ke) if matches!(ke.code, KeyCode::Esc | KeyCode::Char('q')) => {
                        break 'uiloop;
                    }
                    _ => state.handle_input(ev)?,
                },
                Msg::Station(generation, ev) => state.handle_station_event(generation, ev),
            };
        }

        // draw a new frame
        terminal.draw(|f| ui::station_ui(f, &state))?;

        // block until either next tick or next user input
        tokio::select! {
            _ = ticker.tick() => { /* redraw ui per tick rate */},

            maybe_ev = events.next() => {
                if let Some(Ok(ev)) = maybe_ev {
                    if state.event_queue.tx.send(Msg::Input(ev)).is_err() { break 'uiloop }
                }
            }
        }
    }

    if let Some(handle) = state.retire_simulation() {
        let _ = handle.await;
    }
    term_cleanup(&mut terminal)?;
    Ok(())
}

async fn run_headless(args: Args, config: StationConfig) -> anyhow::Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<StationEvent>();
    let sim = Simulation::start(config, args.pacing(), Arc::new(ChannelObserver::new(tx)))?;

    loop {
        tokio::select! {
            maybe_ev = rx.recv() => {
                let Some(ev) = maybe_ev else { break };
                let done = ev.is_terminal();
                print_event(&ev, args.json)?;
                if done { break }
            }
            _ = tokio::signal::ctrl_c() => sim.stop(),
        }
    }

    let outcome = sim.station().outcome();
    let grace = args.grace();
    let sim = Arc::new(sim);
    let drained = {
        let sim = Arc::clone(&sim);
        tokio::task::spawn_blocking(move || sim.shutdown(grace)).await?
    };
    // whatever in-flight services reported while draining
    while let Ok(ev) = rx.try_recv() {
        print_event(&ev, args.json)?;
    }
    if !drained {
        log::warn!("{} task(s) did not exit within the grace period", sim.live_tasks());
    }

    match outcome {
        Some(Outcome::Failed(err)) => Err(err.into()),
        _ => Ok(()),
    }
}

fn print_event(ev: &StationEvent, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(ev)?);
    } else if let StationEvent::Log { message, at } = ev {
        println!("[{}] {}", at.format("%H:%M:%S"), message);
    }
    Ok(())
}

fn term_cleanup<B: ratatui::backend::Backend + std::io::Write>(
    terminal: &mut Terminal<B>,
) -> anyhow::Result<()> {
    disable_raw_mode()?;
    crossterm::execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app() -> AppState {
        let args = Args::parse_from(["service-station", "--bays", "2"]);
        let config = args.station_config().unwrap();
        AppState::new(args, config)
    }

    fn occupy(bay: usize, car: usize) -> StationEvent {
        StationEvent::BayStatusChanged {
            bay,
            occupant: Some(CarId(car)),
        }
    }

    #[test]
    fn events_from_a_retired_run_are_ignored() {
        let mut app = app();
        app.handle_station_event(0, occupy(0, 1));
        assert_eq!(app.bays, vec![Some(CarId(1)), None]);

        app.reset_simulation();
        assert_eq!(app.bays, vec![None, None]);
        app.handle_station_event(0, occupy(1, 2));
        app.handle_station_event(0, StationEvent::Stopped { served: 1 });
        assert_eq!(app.bays, vec![None, None]);
        assert!(app.run_state == RunState::Idle);

        app.handle_station_event(1, occupy(1, 3));
        assert_eq!(app.bays, vec![None, Some(CarId(3))]);
    }

    #[test]
    fn speed_outside_limits_is_rejected() {
        assert!(Args::try_parse_from(["service-station", "--speed", "1e-20"]).is_err());
        assert!(Args::try_parse_from(["service-station", "--speed", "NaN"]).is_err());
        let args = Args::try_parse_from(["service-station", "--speed", "4"]).unwrap();
        assert_eq!(args.speed, 4.0);
    }
}
