//! Rotation scheduler
//!
//! A single worker task owns the rotation cursor and the repeating timer.
//! Commands from the facade and events from the bus are handled in arrival
//! order, and the timer is always torn down before a new one is armed, so at
//! most one rotation timer exists per scheduler.

use crate::core::StatusIndicator;
use crate::events::CoreEvent;
use crate::rotation::RotationCursor;
use crate::settings::{PriorityEmoji, MAX_ROTATION_INTERVAL_SECONDS, MIN_ROTATION_INTERVAL_SECONDS};
use crate::task::Task;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};

/// Live view of the state the scheduler rotates over
pub trait RotationSource: Send + Sync {
    fn tasks(&self) -> Vec<Task>;
    fn priority_emoji(&self) -> PriorityEmoji;
    fn rotation_interval_seconds(&self) -> u32;
}

#[derive(Debug)]
enum Command {
    Start(u32),
    Restart,
    Step,
    Stop,
}

/// Handle to the rotation worker. Dropping it stops rotation.
pub struct RotationScheduler {
    commands: mpsc::UnboundedSender<Command>,
    worker: JoinHandle<()>,
}

impl RotationScheduler {
    /// Spawn the worker on `runtime`. The worker restarts rotation whenever
    /// `events` delivers a task or interval change.
    pub fn spawn(
        runtime: &Handle,
        source: Arc<dyn RotationSource>,
        indicator: Arc<dyn StatusIndicator>,
        events: broadcast::Receiver<CoreEvent>,
    ) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        let worker = Worker {
            source,
            indicator,
            cursor: RotationCursor::default(),
            timer: None,
        };
        let worker = runtime.spawn(worker.run(rx, events));
        Self { commands, worker }
    }

    /// Cancel any running timer, rotate once now, then every `interval_seconds`.
    pub fn start(&self, interval_seconds: u32) {
        self.send(Command::Start(interval_seconds));
    }

    /// Back to the first visible task and start with the configured interval.
    pub fn restart(&self) {
        self.send(Command::Restart);
    }

    /// Rotate once without touching the timer.
    pub fn step(&self) {
        self.send(Command::Step);
    }

    pub fn stop(&self) {
        self.send(Command::Stop);
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            tracing::warn!("Rotation worker is gone, dropping command");
        }
    }
}

impl Drop for RotationScheduler {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

struct Worker {
    source: Arc<dyn RotationSource>,
    indicator: Arc<dyn StatusIndicator>,
    cursor: RotationCursor,
    timer: Option<Interval>,
}

impl Worker {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut events: broadcast::Receiver<CoreEvent>,
    ) {
        tracing::info!("Rotation worker started");
        let mut events_open = true;

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                event = events.recv(), if events_open => match event {
                    Ok(CoreEvent::TasksChanged | CoreEvent::RotationSettingsChanged) => {
                        self.restart();
                    }
                    Ok(CoreEvent::SettingsChanged) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Rotation worker lagged behind events, restarting");
                        self.restart();
                    }
                    Err(RecvError::Closed) => events_open = false,
                },
                () = next_tick(&mut self.timer) => self.rotate(),
            }
        }

        tracing::info!("Rotation worker stopped");
    }

    fn handle(&mut self, command: Command) {
        tracing::debug!(?command, "Rotation command");
        match command {
            Command::Start(seconds) => self.start(seconds),
            Command::Restart => self.restart(),
            Command::Step => self.rotate(),
            Command::Stop => self.timer = None,
        }
    }

    fn restart(&mut self) {
        self.cursor.reset();
        let seconds = self.source.rotation_interval_seconds();
        self.start(seconds);
    }

    fn start(&mut self, seconds: u32) {
        self.timer = None;
        self.rotate();

        let seconds = seconds.clamp(MIN_ROTATION_INTERVAL_SECONDS, MAX_ROTATION_INTERVAL_SECONDS);
        let period = Duration::from_secs(u64::from(seconds));
        let mut timer = tokio::time::interval_at(Instant::now() + period, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.timer = Some(timer);
        tracing::debug!(seconds, "Rotation timer armed");
    }

    fn rotate(&mut self) {
        let tasks = self.source.tasks();
        let label = self.cursor.step(&tasks, self.source.priority_emoji());
        tracing::debug!(%label, next = self.cursor.current_index(), "Rotating menubar label");
        self.indicator.set_label(label);
    }
}

async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventBus;
    use crate::rotation::FALLBACK_GLYPH;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    struct FakeSource {
        tasks: Mutex<Vec<Task>>,
        interval: AtomicU32,
    }

    impl FakeSource {
        fn new(tasks: Vec<Task>, interval: u32) -> Arc<Self> {
            Arc::new(Self {
                tasks: Mutex::new(tasks),
                interval: AtomicU32::new(interval),
            })
        }
    }

    impl RotationSource for FakeSource {
        fn tasks(&self) -> Vec<Task> {
            self.tasks.lock().unwrap().clone()
        }

        fn priority_emoji(&self) -> PriorityEmoji {
            PriorityEmoji::Warning
        }

        fn rotation_interval_seconds(&self) -> u32 {
            self.interval.load(Ordering::SeqCst)
        }
    }

    struct Recorder(mpsc::UnboundedSender<String>);

    impl StatusIndicator for Recorder {
        fn set_label(&self, text: String) {
            let _ = self.0.send(text);
        }
    }

    fn visible(title: &str, high: bool) -> Task {
        Task {
            is_high_priority: high,
            is_visible_in_menubar: true,
            ..Task::new(title)
        }
    }

    fn spawn(
        source: Arc<FakeSource>,
        bus: &EventBus,
    ) -> (RotationScheduler, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let scheduler = RotationScheduler::spawn(
            &Handle::current(),
            source,
            Arc::new(Recorder(tx)),
            bus.subscribe(),
        );
        (scheduler, rx)
    }

    fn assert_elapsed(since: Instant, seconds: u64) {
        let elapsed = since.elapsed();
        assert!(
            elapsed >= Duration::from_secs(seconds) && elapsed < Duration::from_secs(seconds + 1),
            "expected ~{}s, got {:?}",
            seconds,
            elapsed
        );
    }

    async fn next(labels: &mut mpsc::UnboundedReceiver<String>) -> String {
        labels.recv().await.expect("scheduler dropped the indicator")
    }

    #[tokio::test(start_paused = true)]
    async fn start_rotates_immediately_then_on_each_period() {
        let source = FakeSource::new(
            vec![visible("Buy milk", false), visible("Pay rent", true)],
            10,
        );
        let bus = EventBus::new();
        let (scheduler, mut labels) = spawn(source, &bus);

        let begin = Instant::now();
        scheduler.start(10);
        assert_eq!(next(&mut labels).await, "Buy milk");
        assert!(begin.elapsed() < Duration::from_secs(1));

        assert_eq!(next(&mut labels).await, "⚠️ Pay rent");
        assert_elapsed(begin, 10);
        assert_eq!(next(&mut labels).await, "Buy milk");
        assert_elapsed(begin, 20);
    }

    #[tokio::test(start_paused = true)]
    async fn no_visible_tasks_shows_fallback_every_tick() {
        let hidden = Task::new("X");
        let source = FakeSource::new(vec![hidden], 1);
        let bus = EventBus::new();
        let (scheduler, mut labels) = spawn(source, &bus);

        scheduler.start(1);
        for _ in 0..4 {
            assert_eq!(next(&mut labels).await, FALLBACK_GLYPH);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn task_change_event_restarts_from_first_visible() {
        let source = FakeSource::new(
            vec![visible("a", false), visible("b", false), visible("c", false)],
            30,
        );
        let bus = EventBus::new();
        let (scheduler, mut labels) = spawn(source.clone(), &bus);

        scheduler.start(30);
        assert_eq!(next(&mut labels).await, "a");
        assert_eq!(next(&mut labels).await, "b");

        source.tasks.lock().unwrap().remove(0);
        bus.publish(CoreEvent::TasksChanged);
        let restarted = Instant::now();
        assert_eq!(next(&mut labels).await, "b");
        assert!(restarted.elapsed() < Duration::from_secs(1));
        assert_eq!(next(&mut labels).await, "c");
        assert_elapsed(restarted, 30);
    }

    #[tokio::test(start_paused = true)]
    async fn interval_change_rearms_timer() {
        let source = FakeSource::new(vec![visible("a", false), visible("b", false)], 60);
        let bus = EventBus::new();
        let (scheduler, mut labels) = spawn(source.clone(), &bus);

        scheduler.start(60);
        assert_eq!(next(&mut labels).await, "a");

        source.interval.store(5, Ordering::SeqCst);
        bus.publish(CoreEvent::RotationSettingsChanged);
        let changed = Instant::now();
        assert_eq!(next(&mut labels).await, "a");
        assert!(changed.elapsed() < Duration::from_secs(1));

        for expected in ["b", "a", "b"] {
            let before = Instant::now();
            assert_eq!(next(&mut labels).await, expected);
            assert_elapsed(before, 5);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn restart_twice_matches_restart_once() {
        let tasks = vec![visible("a", false), visible("b", false), visible("c", false)];

        let bus = EventBus::new();
        let (once, mut once_labels) = spawn(FakeSource::new(tasks.clone(), 2), &bus);
        let (twice, mut twice_labels) = spawn(FakeSource::new(tasks, 2), &bus);

        once.restart();
        twice.restart();
        twice.restart();

        assert_eq!(next(&mut once_labels).await, "a");
        assert_eq!(next(&mut twice_labels).await, "a");
        assert_eq!(next(&mut twice_labels).await, "a");

        for _ in 0..4 {
            assert_eq!(next(&mut once_labels).await, next(&mut twice_labels).await);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_timer_but_keeps_manual_steps() {
        let source = FakeSource::new(vec![visible("a", false), visible("b", false)], 1);
        let bus = EventBus::new();
        let (scheduler, mut labels) = spawn(source, &bus);

        scheduler.start(1);
        assert_eq!(next(&mut labels).await, "a");
        scheduler.stop();

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(labels.try_recv().is_err());

        scheduler.step();
        assert_eq!(next(&mut labels).await, "b");
    }
}
