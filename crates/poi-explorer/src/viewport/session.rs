use std::{sync::Arc, time::Duration};

use ahash::AHashMap as HashMap;
use tokio::{
    sync::mpsc,
    task::{self, JoinHandle, JoinSet},
    time::{Instant, sleep_until},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{SearchTicket, ViewportController, ViewportEvent, ViewportUpdate};
use crate::{
    core::PoiSearcher,
    model::{BoundingBox, SearchQuery, SearchResult},
    search::{PolarsEngine, QueryEngine},
};

const CHANNEL_CAPACITY: usize = 64;
const IDLE_SLEEP: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone)]
pub enum ViewportCommand {
    /// A user-initiated search; `fit_view` asks for the camera to be fitted to the results.
    Search { query: SearchQuery, fit_view: bool },
    /// The visible map area changed.
    ViewportChanged(BoundingBox),
}

/// Sending side of a running [`ViewportSession`].
#[derive(Debug, Clone)]
pub struct ViewportHandle {
    commands: mpsc::Sender<ViewportCommand>,
    cancel: CancellationToken,
}

impl ViewportHandle {
    /// Returns `false` once the session has stopped.
    pub async fn search(&self, query: SearchQuery, fit_view: bool) -> bool {
        self.commands
            .send(ViewportCommand::Search { query, fit_view })
            .await
            .is_ok()
    }

    /// Returns `false` once the session has stopped.
    pub async fn viewport_changed(&self, bbox: BoundingBox) -> bool {
        self.commands
            .send(ViewportCommand::ViewportChanged(bbox))
            .await
            .is_ok()
    }

    /// Stop the session; in-flight searches are aborted and their results dropped.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

/// Drives a [`ViewportController`] against a shared [`PoiSearcher`].
///
/// Commands arrive on a channel, searches run as tasks in a `JoinSet`, and results
/// that are still current go out on the update channel.
pub struct ViewportSession<E = PolarsEngine> {
    searcher: Arc<PoiSearcher<E>>,
    controller: ViewportController,
    commands: mpsc::Receiver<ViewportCommand>,
    updates: mpsc::Sender<ViewportUpdate>,
    cancel: CancellationToken,
    tasks: JoinSet<(SearchTicket, SearchResult)>,
    /// Ticket of every task still in `tasks`, so a failed join can be released
    running: HashMap<task::Id, SearchTicket>,
}

impl<E: QueryEngine + 'static> ViewportSession<E> {
    /// Start a session on the current tokio runtime.
    ///
    /// The debounce quiet period comes from the searcher's configuration.
    pub fn spawn(
        searcher: Arc<PoiSearcher<E>>,
    ) -> (ViewportHandle, mpsc::Receiver<ViewportUpdate>, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (update_tx, update_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();

        let session = Self {
            controller: ViewportController::new(searcher.config().viewport_quiet_period),
            searcher,
            commands: command_rx,
            updates: update_tx,
            cancel: cancel.clone(),
            tasks: JoinSet::new(),
            running: HashMap::new(),
        };
        let handle = ViewportHandle {
            commands: command_tx,
            cancel,
        };
        (handle, update_rx, tokio::spawn(session.run()))
    }

    fn start_search(&mut self, ticket: SearchTicket, query: SearchQuery) {
        let searcher = Arc::clone(&self.searcher);
        let handle = self.tasks.spawn(async move {
            let result = searcher.search(&query).await;
            (ticket, result)
        });
        self.running.insert(handle.id(), ticket);
    }

    async fn run(mut self) {
        info!("Viewport session started");
        loop {
            let deadline = self.controller.next_deadline();
            tokio::select! {
                () = self.cancel.cancelled() => break,
                command = self.commands.recv() => match command {
                    Some(ViewportCommand::Search { query, fit_view }) => {
                        let ticket = self.controller.begin_search(&query, fit_view);
                        self.start_search(ticket, query);
                    }
                    Some(ViewportCommand::ViewportChanged(bbox)) => {
                        if let ViewportEvent::Scheduled { deadline } =
                            self.controller.on_viewport_change(bbox, Instant::now())
                        {
                            debug!(?deadline, "Viewport requery scheduled");
                        }
                    }
                    None => break,
                },
                () = sleep_until(deadline.unwrap_or_else(|| Instant::now() + IDLE_SLEEP)), if deadline.is_some() => {
                    if let Some((ticket, query)) = self.controller.poll(Instant::now()) {
                        self.start_search(ticket, query);
                    }
                }
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => match joined {
                    Ok((ticket, result)) => {
                        self.running.retain(|_, running| *running != ticket);
                        if let Some(update) = self.controller.complete(ticket, result)
                            && self.updates.send(update).await.is_err()
                        {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Search task did not complete");
                        if let Some(ticket) = self.running.remove(&e.id()) {
                            self.controller.abandon(ticket);
                        }
                    }
                },
            }
        }
        self.tasks.abort_all();
        info!(generation = self.controller.generation(), "Viewport session stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use poi_explorer_data::{
        BoundarySource, PlaceDataset,
        test_data::{sample_boundaries_geojson, sample_places_df},
    };

    use super::*;
    use crate::{
        boundary::BoundaryProvider,
        config::SearchConfig,
        error::Result,
        model::SearchArea,
        search::{CoarseFilterOutput, CoarseFilterPlan},
        viewport::SearchOrigin,
    };

    fn searcher(cache: &tempfile::TempDir) -> Arc<PoiSearcher> {
        let config = SearchConfig::builder().cache_dir(cache.path()).build();
        let searcher = PoiSearcher::init(
            config,
            PlaceDataset::InMemory(sample_places_df().unwrap()),
            BoundarySource::GeoJson(sample_boundaries_geojson()),
        )
        .unwrap();
        Arc::new(searcher)
    }

    fn manhattan(shift: f64) -> BoundingBox {
        BoundingBox::new(-74.05 + shift, -73.95 + shift, 40.68, 40.78).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_suppresses_fit_and_debounces_pans() {
        let cache = tempfile::TempDir::new().unwrap();
        let (handle, mut updates, task) = ViewportSession::spawn(searcher(&cache));

        assert!(handle.search(SearchQuery::coordinate("pizza", 40.7128, -74.006, 10.0), true).await);
        let first = updates.recv().await.unwrap();
        assert_eq!(first.origin, SearchOrigin::User { fit_view: true });
        assert!(first.recenter);
        assert!(!first.result.pois.is_empty());

        // The camera fit echoes back as one viewport event, which must not requery.
        handle.viewport_changed(manhattan(0.0)).await;
        let echoed = tokio::time::timeout(Duration::from_secs(2), updates.recv()).await;
        assert!(echoed.is_err(), "suppressed event triggered a requery");

        for step in 0..5 {
            if step > 0 {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
            handle.viewport_changed(manhattan(f64::from(step) * 0.001)).await;
        }
        let last_event = Instant::now();

        let requery = updates.recv().await.unwrap();
        assert!(Instant::now() - last_event >= Duration::from_millis(500));
        assert_eq!(requery.origin, SearchOrigin::Requery);
        assert!(!requery.recenter);
        assert_eq!(requery.result.bbox_used, Some(manhattan(4.0 * 0.001)));
        assert!(requery.generation > first.generation);

        let extra = tokio::time::timeout(Duration::from_secs(5), updates.recv()).await;
        assert!(extra.is_err(), "only one requery for a burst of pans");

        handle.shutdown();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_newer_search_wins() {
        let cache = tempfile::TempDir::new().unwrap();
        let (handle, mut updates, task) = ViewportSession::spawn(searcher(&cache));

        handle
            .search(SearchQuery::new("pizza", SearchArea::Country { code: "FR".into() }), false)
            .await;
        handle
            .search(SearchQuery::new("pizza", SearchArea::Country { code: "US".into() }), false)
            .await;

        let update = updates.recv().await.unwrap();
        assert_eq!(update.generation, 2, "the first search was superseded");
        assert!(update.result.pois.iter().all(|p| p.record.country.as_deref() == Some("US")));

        let extra = tokio::time::timeout(Duration::from_secs(5), updates.recv()).await;
        assert!(extra.is_err());

        drop(handle);
        task.await.unwrap();
    }

    /// Sleeps for keyword "slow" and logs when each execution starts and ends.
    #[derive(Default)]
    struct TimedEngine {
        runs: Mutex<Vec<(String, Instant, Instant)>>,
    }

    impl QueryEngine for Arc<TimedEngine> {
        async fn execute(&self, plan: &CoarseFilterPlan) -> Result<CoarseFilterOutput> {
            let start = Instant::now();
            if plan.keyword == "slow" {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            self.runs.lock().unwrap().push((plan.keyword.clone(), start, Instant::now()));
            Ok(CoarseFilterOutput::default())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_requery_is_not_overlapped() {
        let engine = Arc::new(TimedEngine::default());
        let boundaries = BoundaryProvider::in_memory(BoundarySource::GeoJson(sample_boundaries_geojson()));
        let searcher = PoiSearcher::with_engine(SearchConfig::default(), Arc::clone(&engine), boundaries).unwrap();
        let (handle, mut updates, task) = ViewportSession::spawn(Arc::new(searcher));

        handle.search(SearchQuery::viewport("slow", manhattan(0.0)), false).await;
        assert_eq!(updates.recv().await.unwrap().origin, SearchOrigin::User { fit_view: false });

        // Starts a five second requery for "slow".
        handle.viewport_changed(manhattan(0.01)).await;
        tokio::time::sleep(Duration::from_secs(1)).await;

        handle.search(SearchQuery::viewport("fast", manhattan(0.02)), false).await;
        let fast = updates.recv().await.unwrap();
        assert_eq!(fast.origin, SearchOrigin::User { fit_view: false });

        handle.viewport_changed(manhattan(0.03)).await;
        let requery = updates.recv().await.unwrap();
        assert_eq!(requery.origin, SearchOrigin::Requery);
        assert_eq!(requery.result.bbox_used, Some(manhattan(0.03)));

        let runs = engine.runs.lock().unwrap().clone();
        let keywords: Vec<&str> = runs.iter().map(|(k, _, _)| k.as_str()).collect();
        assert_eq!(keywords, ["slow", "fast", "slow", "fast"]);
        let (_, _, stale_end) = runs[2];
        let (_, requery_start, _) = runs[3];
        assert!(requery_start >= stale_end, "requeries overlapped");

        handle.shutdown();
        task.await.unwrap();
    }
}
