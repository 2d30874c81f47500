use crate::config::{ColumnLocation, SyncPlan};
use crate::errors::AppResult;
use crate::github::SourceApi;
use crate::models::{CellRef, CellValue, MetricKind, MetricRecord, SyncOutcome, SyncStatus};
use crate::range_store::{a1_notation, range_notation, RangeStore};
use crate::series::{complete_series, latest_date, reconcile, resolve_anchor, trim};
use chrono::{Days, NaiveDate, Utc};
use uuid::Uuid;

const STARGAZER_HEADER: [&str; 2] = ["Date (UTC)", "User"];
const STARGAZER_BLOCK_WIDTH: u32 = 2;

/// Sequences fetch, reconciliation and positional writes for every metric.
///
/// Metrics run strictly one after another. The first failure ends the run;
/// whatever earlier metrics wrote stays written.
pub struct SyncRunner<S, R> {
    source: S,
    store: R,
    plan: SyncPlan,
    today: NaiveDate,
}

impl<S: SourceApi, R: RangeStore> SyncRunner<S, R> {
    pub fn new(source: S, store: R, plan: SyncPlan) -> Self {
        Self {
            source,
            store,
            plan,
            today: Utc::now().date_naive(),
        }
    }

    /// Pins the UTC calendar day the run treats as today.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn store(&self) -> &R {
        &self.store
    }

    pub fn into_store(self) -> R {
        self.store
    }

    pub fn run_all(&self) -> AppResult<Vec<SyncOutcome>> {
        let span = tracing::info_span!("sync", run_id = %Uuid::new_v4(), today = %self.today);
        let _entered = span.enter();

        let mut outcomes = Vec::with_capacity(MetricKind::ALL.len());
        for metric in MetricKind::ALL {
            match self.sync_metric(metric) {
                Ok(outcome) => outcomes.push(outcome),
                Err(error) => {
                    tracing::error!(
                        metric = %metric,
                        error = %error,
                        completed = outcomes.len(),
                        "sync aborted"
                    );
                    return Err(error);
                }
            }
        }
        Ok(outcomes)
    }

    pub fn sync_metric(&self, metric: MetricKind) -> AppResult<SyncOutcome> {
        tracing::info!(metric = %metric, "sync started");
        match metric {
            MetricKind::Stargazers => self.sync_stargazers(),
            MetricKind::Views => self.sync_views(),
            MetricKind::Clones => self.sync_clones(),
            MetricKind::Referrers => self.sync_referrers(),
        }
    }

    /// Rewrites the whole stargazer block: header row, then one row per star.
    pub fn sync_stargazers(&self) -> AppResult<SyncOutcome> {
        let location = &self.plan.stargazers;
        let events = self.source.stargazers(&location.repo)?;
        if events.is_empty() {
            tracing::info!("stargazers is empty");
            return Ok(skipped(MetricKind::Stargazers, "no stargazers"));
        }

        tracing::info!(
            top_left = %a1_notation(location.top_left),
            stargazers = events.len(),
            "clearing stargazer block"
        );
        self.store
            .clear_block(&location.sheet, location.top_left, None, STARGAZER_BLOCK_WIDTH)?;

        let header = STARGAZER_HEADER
            .iter()
            .map(|title| CellValue::text(*title))
            .collect::<Vec<_>>();
        self.store.write_block(&location.sheet, location.top_left, &[header])?;

        let rows = events
            .iter()
            .map(|event| {
                tracing::debug!(
                    starred_on = %event.starred_on,
                    user = %event.user,
                    "write stargazer"
                );
                event.to_row()
            })
            .collect::<Vec<_>>();
        let body_top = location.top_left.offset_rows(1);
        self.store.write_block(&location.sheet, body_top, &rows)?;

        Ok(written(MetricKind::Stargazers, &location.sheet, body_top, rows.len()))
    }

    pub fn sync_views(&self) -> AppResult<SyncOutcome> {
        let records = self.source.views(&self.plan.views.repo)?;
        self.sync_series(MetricKind::Views, &self.plan.views, records)
    }

    pub fn sync_clones(&self) -> AppResult<SyncOutcome> {
        let records = self.source.clones(&self.plan.clones.repo)?;
        self.sync_series(MetricKind::Clones, &self.plan.clones, records)
    }

    /// Writes today's referrer snapshot over any earlier snapshot for the same day.
    pub fn sync_referrers(&self) -> AppResult<SyncOutcome> {
        let location = &self.plan.referrers;
        let entries = self.source.referrers(&location.repo)?;
        let Some(block) = reconcile(entries, self.today) else {
            tracing::info!("traffic referrers is empty");
            return Ok(skipped(MetricKind::Referrers, "no referrers"));
        };

        let column = self.store.read_column(&location.sheet, location.column)?;
        let anchor = self.anchor(&column, location, block.date);

        tracing::info!(
            top_left = %a1_notation(anchor),
            width = block.width(),
            "clearing previous snapshot"
        );
        self.store.clear_block(&location.sheet, anchor, None, block.width())?;

        for record in &block.records {
            tracing::debug!(
                date = %record.date,
                referrer = %record.referrer,
                count = record.count,
                uniques = record.uniques,
                "write referrer"
            );
        }
        let rows = block.rows();
        self.store.write_block(&location.sheet, anchor, &rows)?;

        Ok(written(MetricKind::Referrers, &location.sheet, anchor, rows.len()))
    }

    fn sync_series(
        &self,
        metric: MetricKind,
        location: &ColumnLocation,
        records: Vec<MetricRecord>,
    ) -> AppResult<SyncOutcome> {
        let fetched = records.len();
        let retained = trim(records, self.today, self.plan.retention_days);
        if retained.is_empty() {
            tracing::info!(metric = %metric, fetched, "traffic data is empty");
            return Ok(skipped(metric, "no traffic data inside the retention window"));
        }

        let column = self.store.read_column(&location.sheet, location.column)?;
        let floor = latest_date(&column).and_then(|latest| latest.checked_add_days(Days::new(1)));
        let series = complete_series(&retained, self.today, floor);
        let Some(first) = series.first() else {
            tracing::info!(metric = %metric, "only today's partial bucket was reported");
            return Ok(skipped(metric, "no finished days to write"));
        };

        let anchor = self.anchor(&column, location, first.date);
        let rows = series
            .iter()
            .map(|record| {
                tracing::debug!(
                    date = %record.date,
                    count = record.count,
                    uniques = record.uniques,
                    "write {}",
                    metric
                );
                record.to_row()
            })
            .collect::<Vec<_>>();

        tracing::info!(
            metric = %metric,
            range = %range_notation(anchor, rows.len() as u32, 3),
            fetched,
            retained = retained.len(),
            placeholders = series.iter().filter(|record| !retained.contains(record)).count(),
            "writing series"
        );
        self.store.write_block(&location.sheet, anchor, &rows)?;

        Ok(written(metric, &location.sheet, anchor, rows.len()))
    }

    fn anchor(
        &self,
        column: &[CellValue],
        location: &ColumnLocation,
        target: NaiveDate,
    ) -> CellRef {
        let index = resolve_anchor(column, target, self.plan.anchor_fallback);
        CellRef::new(location.column, index as u32 + 1)
    }
}

fn written(metric: MetricKind, sheet: &str, anchor: CellRef, rows: usize) -> SyncOutcome {
    SyncOutcome {
        metric,
        status: SyncStatus::Written {
            sheet: sheet.to_string(),
            anchor: a1_notation(anchor),
            rows,
        },
    }
}

fn skipped(metric: MetricKind, reason: &str) -> SyncOutcome {
    SyncOutcome {
        metric,
        status: SyncStatus::Skipped {
            reason: reason.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::SyncRunner;
    use crate::config::SyncConfig;
    use crate::errors::{AppError, AppResult};
    use crate::github::SourceApi;
    use crate::models::{
        CellRef, CellValue, MetricKind, MetricRecord, ReferrerEntry, StarEvent, SyncStatus,
    };
    use crate::range_store::{MemoryRangeStore, RangeStore};
    use chrono::{Days, NaiveDate};
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 20).expect("valid date")
    }

    fn ago(days: u64) -> NaiveDate {
        today() - Days::new(days)
    }

    #[derive(Default)]
    struct FakeSource {
        stars: Vec<StarEvent>,
        views: Vec<MetricRecord>,
        clones: Vec<MetricRecord>,
        referrers: RefCell<Vec<ReferrerEntry>>,
        fail: Option<MetricKind>,
        calls: RefCell<Vec<MetricKind>>,
    }

    impl FakeSource {
        fn record(&self, metric: MetricKind) -> AppResult<()> {
            self.calls.borrow_mut().push(metric);
            if self.fail == Some(metric) {
                return Err(AppError::SourceApi(format!("{} returned 502 Bad Gateway", metric)));
            }
            Ok(())
        }
    }

    impl SourceApi for FakeSource {
        fn stargazers(&self, _repo: &str) -> AppResult<Vec<StarEvent>> {
            self.record(MetricKind::Stargazers)?;
            Ok(self.stars.clone())
        }

        fn views(&self, _repo: &str) -> AppResult<Vec<MetricRecord>> {
            self.record(MetricKind::Views)?;
            Ok(self.views.clone())
        }

        fn clones(&self, _repo: &str) -> AppResult<Vec<MetricRecord>> {
            self.record(MetricKind::Clones)?;
            Ok(self.clones.clone())
        }

        fn referrers(&self, _repo: &str) -> AppResult<Vec<ReferrerEntry>> {
            self.record(MetricKind::Referrers)?;
            Ok(self.referrers.borrow().clone())
        }
    }

    fn runner(source: FakeSource) -> SyncRunner<FakeSource, MemoryRangeStore> {
        let config: SyncConfig = serde_yaml::from_str("repo: org/repo").expect("config");
        SyncRunner::new(source, MemoryRangeStore::new(), config.plan().expect("plan"))
            .with_today(today())
    }

    fn star(date: NaiveDate, user: &str) -> StarEvent {
        StarEvent {
            starred_on: date,
            user: user.to_string(),
        }
    }

    fn referrer(name: &str, count: u64) -> ReferrerEntry {
        ReferrerEntry {
            referrer: name.to_string(),
            count,
            uniques: 1,
        }
    }

    #[test]
    fn stargazers_replace_previous_block_below_header() {
        let source = FakeSource {
            stars: vec![star(ago(30), "alice"), star(ago(2), "bob")],
            ..Default::default()
        };
        let runner = runner(source);
        let stale = (0..5)
            .map(|i| vec![CellValue::text(format!("stale-{}", i)), CellValue::Empty])
            .collect::<Vec<_>>();
        runner.store().write_block("star", CellRef::new(1, 22), &stale).expect("seed");
        runner
            .store()
            .write_block("star", CellRef::new(1, 1), &[vec![CellValue::text("Summary")]])
            .expect("seed");

        runner.sync_stargazers().expect("sync");

        let column = runner.store().read_column("star", 1).expect("column");
        assert_eq!(column.len(), 23);
        assert_eq!(column[0], CellValue::text("Summary"));
        assert_eq!(column[20], CellValue::text("Date (UTC)"));
        assert_eq!(column[21], CellValue::Date(ago(30)));
        assert_eq!(column[22], CellValue::Date(ago(2)));
        let users = runner.store().read_column("star", 2).expect("users");
        assert_eq!(users[22], CellValue::text("bob"));
    }

    #[test]
    fn views_fill_gaps_and_overwrite_on_rerun() {
        let source = FakeSource {
            views: (0..14u64).map(|days| MetricRecord::new(ago(days), days + 1, 1)).collect(),
            ..Default::default()
        };
        let runner = runner(source);
        runner
            .store()
            .write_block("traffic", CellRef::new(1, 1), &[vec![CellValue::text("Date")]])
            .expect("header");

        let first = runner.sync_views().expect("first sync");
        let after_first = runner.store().snapshot().expect("snapshot");
        let second = runner.sync_views().expect("second sync");

        assert_eq!(first, second);
        assert_eq!(after_first, runner.store().snapshot().expect("snapshot"));
        let column = runner.store().read_column("traffic", 1).expect("column");
        // header + today-9 ..= today-1
        assert_eq!(column.len(), 10);
        assert_eq!(column[1], CellValue::Date(ago(9)));
        assert_eq!(column[9], CellValue::Date(ago(1)));
        let counts = runner.store().read_column("traffic", 2).expect("counts");
        assert_eq!(counts[1], CellValue::Number(10));
    }

    #[test]
    fn stored_series_is_bridged_to_the_window() {
        let source = FakeSource {
            clones: vec![MetricRecord::new(ago(3), 5, 2), MetricRecord::new(ago(1), 1, 1)],
            ..Default::default()
        };
        let runner = runner(source);
        runner
            .store()
            .write_block(
                "traffic",
                CellRef::new(5, 1),
                &[
                    vec![CellValue::Date(ago(8)), CellValue::Number(4), CellValue::Number(4)],
                    vec![CellValue::Date(ago(7)), CellValue::Number(6), CellValue::Number(3)],
                ],
            )
            .expect("seed");

        let outcome = runner.sync_clones().expect("sync");
        assert_eq!(
            outcome.status,
            SyncStatus::Written {
                sheet: "traffic".to_string(),
                anchor: "E3".to_string(),
                rows: 6,
            }
        );

        let dates = runner.store().read_column("traffic", 5).expect("dates");
        let expected = (1..=8u64).rev().map(|days| CellValue::Date(ago(days))).collect::<Vec<_>>();
        assert_eq!(dates, expected);
        let counts = runner.store().read_column("traffic", 6).expect("counts");
        assert_eq!(
            counts,
            [4, 6, 0, 0, 0, 5, 0, 1].into_iter().map(CellValue::Number).collect::<Vec<_>>()
        );
    }

    #[test]
    fn only_today_reported_is_skipped() {
        let source = FakeSource {
            views: vec![MetricRecord::new(today(), 3, 3)],
            ..Default::default()
        };
        let runner = runner(source);
        let outcome = runner.sync_views().expect("sync");
        assert!(matches!(outcome.status, SyncStatus::Skipped { .. }));
        assert!(runner.store().snapshot().expect("snapshot").is_empty());
    }

    #[test]
    fn referrers_rewrite_same_day_snapshot_and_append_new_days() {
        let source = FakeSource {
            referrers: RefCell::new(vec![
                referrer("github.com", 9),
                referrer("google.com", 4),
                referrer("t.co", 1),
            ]),
            ..Default::default()
        };
        let runner = runner(source);
        runner
            .store()
            .write_block(
                "referrer.raw",
                CellRef::new(1, 1),
                &[vec![
                    CellValue::Date(ago(1)),
                    CellValue::text("github.com"),
                    CellValue::Number(2),
                    CellValue::Number(2),
                ]],
            )
            .expect("seed");

        runner.sync_referrers().expect("first");
        *runner.source.referrers.borrow_mut() = vec![referrer("github.com", 11)];
        let outcome = runner.sync_referrers().expect("second");

        assert_eq!(
            outcome.status,
            SyncStatus::Written {
                sheet: "referrer.raw".to_string(),
                anchor: "A2".to_string(),
                rows: 1,
            }
        );
        let grid = runner.store().read_sheet("referrer.raw").expect("sheet");
        assert_eq!(grid.len(), 2);
        assert_eq!(grid[0][0], CellValue::Date(ago(1)));
        assert_eq!(
            grid[1],
            vec![
                CellValue::Date(today()),
                CellValue::text("github.com"),
                CellValue::Number(11),
                CellValue::Number(1),
            ]
        );
    }

    #[test]
    fn failing_metric_stops_the_run_after_earlier_writes() {
        let source = FakeSource {
            stars: vec![star(ago(4), "carol")],
            views: vec![MetricRecord::new(ago(2), 1, 1)],
            fail: Some(MetricKind::Views),
            ..Default::default()
        };
        let runner = runner(source);

        let err = runner.run_all().expect_err("views fail");
        assert!(matches!(err, AppError::SourceApi(_)));
        assert_eq!(*runner.source.calls.borrow(), vec![MetricKind::Stargazers, MetricKind::Views]);
        assert_eq!(runner.store().read_column("star", 1).expect("stars").len(), 22);
        assert!(runner.store().read_column("traffic", 1).expect("traffic").is_empty());
    }

    #[test]
    fn run_all_visits_metrics_in_order() {
        let runner = runner(FakeSource::default());
        let outcomes = runner.run_all().expect("run");
        let metrics = outcomes.iter().map(|outcome| outcome.metric).collect::<Vec<_>>();
        assert_eq!(metrics, MetricKind::ALL.to_vec());
        assert!(outcomes
            .iter()
            .all(|outcome| matches!(outcome.status, SyncStatus::Skipped { .. })));
    }
}
