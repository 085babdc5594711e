use crate::api::{ApiError, PricingApi};
use crate::domain::{recommendation, DateRange, Listing, Recommendation};
use chrono::NaiveDate;
use futures::future;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

pub const MAX_SELECTED: usize = 5;

// Ordered, duplicate-free, at most MAX_SELECTED ids. Editing the selection
// never triggers a fetch by itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection(Vec<String>);

impl Selection {
    pub fn add(&mut self, id: &str) -> bool {
        if id.is_empty() || self.0.iter().any(|x| x == id) || self.0.len() >= MAX_SELECTED {
            return false;
        }
        self.0.push(id.to_string());
        true
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.0.len();
        self.0.retain(|x| x != id);
        self.0.len() != before
    }

    pub fn ids(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

// A failed fetch leaves an empty series, never a missing entry.
pub type SeriesMap = BTreeMap<String, Vec<Recommendation>>;

// Listings without data on the date are absent from `prices`, no placeholder
// zeros.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayRow {
    pub dt: NaiveDate,
    pub prices: BTreeMap<String, f64>,
}

// Union of all member dates, ascending; rows carrying no data at all are
// dropped.
pub fn overlay_rows(selection: &Selection, series: &SeriesMap) -> Vec<OverlayRow> {
    let mut dates = BTreeSet::new();
    for id in selection.ids() {
        for rec in series.get(id).map(Vec::as_slice).unwrap_or_default() {
            dates.insert(rec.dt);
        }
    }

    dates
        .into_iter()
        .filter_map(|dt| {
            let mut prices = BTreeMap::new();
            for id in selection.ids() {
                let rec = series
                    .get(id)
                    .and_then(|recs| recs.iter().find(|r| r.dt == dt));
                if let Some(rec) = rec {
                    prices.insert(id.clone(), rec.rec_price);
                }
            }
            if prices.is_empty() {
                None
            } else {
                Some(OverlayRow { dt, prices })
            }
        })
        .collect()
}

// Cancellation is not masked into an empty series; it aborts the whole batch.
pub async fn fetch_selection_series(
    api: &dyn PricingApi,
    selection: &Selection,
    range: DateRange,
    cancel: &CancellationToken,
) -> Result<SeriesMap, ApiError> {
    let fetches = selection.ids().iter().map(|id| {
        let id = id.clone();
        async move {
            let res = api.recommendations(&id, range, cancel).await;
            (id, res)
        }
    });

    let mut map = SeriesMap::new();
    for (id, res) in future::join_all(fetches).await {
        match res {
            Ok(mut series) => {
                recommendation::sort_by_date(&mut series);
                map.insert(id, series);
            }
            Err(err) if err.is_cancelled() => return Err(ApiError::Cancelled),
            Err(err) => {
                tracing::warn!(
                    listing_id = %id,
                    %range,
                    error = %err,
                    "comparison series fetch failed; charting it empty"
                );
                map.insert(id, Vec::new());
            }
        }
    }
    Ok(map)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompareStatus {
    Idle,
    Loading,
    Loaded,
    Error(String),
}

#[derive(Debug, Clone)]
pub struct CompareSnapshot {
    pub selection: Selection,
    pub listings: Vec<Listing>,
    pub series: SeriesMap,
    pub status: CompareStatus,
}

#[derive(Debug)]
struct CompareState {
    selection: Selection,
    listings: Vec<Listing>,
    series: SeriesMap,
    status: CompareStatus,
    epoch: u64,
    cancel: CancellationToken,
    // Directory load lives outside the refresh cycle; only close() ends it.
    directory_cancel: CancellationToken,
    closed: bool,
}

// Each refresh restarts the fetch cycle in full and rebuilds the series map
// wholesale; stale cycles are discarded with the same epoch/token rule as
// the range controller.
#[derive(Clone)]
pub struct CompareController {
    api: Arc<dyn PricingApi>,
    range: DateRange,
    state: Arc<Mutex<CompareState>>,
}

impl CompareController {
    pub fn new(api: Arc<dyn PricingApi>, range: DateRange) -> Self {
        Self {
            api,
            range,
            state: Arc::new(Mutex::new(CompareState {
                selection: Selection::default(),
                listings: Vec::new(),
                series: SeriesMap::new(),
                status: CompareStatus::Idle,
                epoch: 0,
                cancel: CancellationToken::new(),
                directory_cancel: CancellationToken::new(),
                closed: false,
            })),
        }
    }

    pub fn range(&self) -> DateRange {
        self.range
    }

    pub async fn snapshot(&self) -> CompareSnapshot {
        let st = self.state.lock().await;
        CompareSnapshot {
            selection: st.selection.clone(),
            listings: st.listings.clone(),
            series: st.series.clone(),
            status: st.status.clone(),
        }
    }

    // A directory failure is the one error surfaced as the view's error
    // state.
    pub async fn load_listings(&self) {
        let token = {
            let st = self.state.lock().await;
            if st.closed {
                return;
            }
            st.directory_cancel.clone()
        };

        let result = self.api.listings(&token).await;

        let mut st = self.state.lock().await;
        if st.closed || token.is_cancelled() {
            return;
        }
        match result {
            Ok(listings) => st.listings = listings,
            Err(err) if err.is_cancelled() => {}
            Err(err) => {
                tracing::warn!(error = %err, "listing directory fetch failed");
                st.status = CompareStatus::Error(err.to_string());
            }
        }
    }

    pub async fn add(&self, id: &str) -> bool {
        let mut st = self.state.lock().await;
        st.selection.add(id)
    }

    pub async fn remove(&self, id: &str) -> bool {
        let mut st = self.state.lock().await;
        st.selection.remove(id)
    }

    pub async fn refresh(&self) {
        let (epoch, token, selection) = {
            let mut st = self.state.lock().await;
            if st.closed {
                return;
            }

            st.cancel.cancel();
            let token = CancellationToken::new();
            st.cancel = token.clone();
            st.epoch += 1;

            if st.selection.is_empty() {
                st.series = SeriesMap::new();
                st.status = CompareStatus::Idle;
                return;
            }

            st.status = CompareStatus::Loading;
            (st.epoch, token, st.selection.clone())
        };

        let result = fetch_selection_series(self.api.as_ref(), &selection, self.range, &token).await;

        let mut st = self.state.lock().await;
        if st.closed || st.epoch != epoch || token.is_cancelled() {
            return;
        }
        match result {
            Ok(map) => {
                st.series = map;
                st.status = CompareStatus::Loaded;
            }
            Err(_) => {
                // Only cancellation reaches here; the batch tolerates
                // per-listing failures.
            }
        }
    }

    pub async fn rows(&self) -> Vec<OverlayRow> {
        let st = self.state.lock().await;
        overlay_rows(&st.selection, &st.series)
    }

    // Falls back to the id itself until the directory is loaded.
    pub async fn label_for(&self, id: &str) -> String {
        let st = self.state.lock().await;
        st.listings
            .iter()
            .find(|l| l.id == id)
            .map(Listing::label)
            .unwrap_or_else(|| id.to_string())
    }

    pub async fn close(&self) {
        let mut st = self.state.lock().await;
        st.closed = true;
        st.cancel.cancel();
        st.directory_cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::{Health, QuoteAck};
    use crate::time::calendar;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;
    use tokio::sync::oneshot;

    fn d(s: &str) -> NaiveDate {
        calendar::from_iso(s).unwrap()
    }

    fn rec(dt: &str, price: f64) -> Recommendation {
        Recommendation {
            dt: d(dt),
            rec_price: price,
            conf_low: price - 10.0,
            conf_high: price + 10.0,
            reason: String::new(),
        }
    }

    fn range() -> DateRange {
        DateRange::default_window(d("2024-01-01"))
    }

    #[test]
    fn selection_ignores_duplicates_and_caps_at_five() {
        let mut sel = Selection::default();
        for id in ["a", "b", "c", "d", "e"] {
            assert!(sel.add(id));
        }
        assert!(!sel.add("f"), "sixth id must be ignored");
        assert!(!sel.add("a"), "duplicate must be a no-op");
        assert_eq!(sel.ids(), ["a", "b", "c", "d", "e"]);

        assert!(sel.remove("c"));
        assert!(!sel.remove("c"));
        assert_eq!(sel.ids(), ["a", "b", "d", "e"]);
    }

    #[test]
    fn overlay_rows_union_dates_and_omit_missing_keys() {
        let mut sel = Selection::default();
        sel.add("A");
        sel.add("B");

        let mut series = SeriesMap::new();
        series.insert(
            "A".to_string(),
            vec![rec("2024-01-01", 100.0), rec("2024-01-02", 110.0)],
        );
        series.insert("B".to_string(), vec![rec("2024-01-02", 90.0)]);

        let rows = overlay_rows(&sel, &series);
        assert_eq!(rows.len(), 2);

        assert_eq!(rows[0].dt, d("2024-01-01"));
        assert_eq!(rows[0].prices.get("A"), Some(&100.0));
        assert!(
            !rows[0].prices.contains_key("B"),
            "absent data must omit the key, not write a placeholder"
        );

        assert_eq!(rows[1].dt, d("2024-01-02"));
        assert_eq!(rows[1].prices.get("A"), Some(&110.0));
        assert_eq!(rows[1].prices.get("B"), Some(&90.0));
    }

    #[test]
    fn overlay_rows_ignore_series_of_unselected_listings() {
        let mut sel = Selection::default();
        sel.add("A");

        let mut series = SeriesMap::new();
        series.insert("A".to_string(), vec![rec("2024-01-01", 100.0)]);
        // Stale entry left over from a removed listing.
        series.insert("C".to_string(), vec![rec("2024-02-01", 500.0)]);

        let rows = overlay_rows(&sel, &series);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].dt, d("2024-01-01"));
    }

    // Fixed reply per listing id.
    struct ScriptedApi {
        replies: HashMap<String, Result<Vec<Recommendation>, u16>>,
        listings: Result<Vec<Listing>, u16>,
    }

    impl ScriptedApi {
        fn new() -> Self {
            Self {
                replies: HashMap::new(),
                listings: Ok(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl PricingApi for ScriptedApi {
        async fn listings(&self, _cancel: &CancellationToken) -> Result<Vec<Listing>, ApiError> {
            match &self.listings {
                Ok(ls) => Ok(ls.clone()),
                Err(status) => Err(ApiError::Http {
                    status: *status,
                    body: "directory unavailable".to_string(),
                }),
            }
        }

        async fn listing(&self, _id: &str, _cancel: &CancellationToken) -> Result<Listing, ApiError> {
            unreachable!()
        }

        async fn recommendations(
            &self,
            id: &str,
            _range: DateRange,
            _cancel: &CancellationToken,
        ) -> Result<Vec<Recommendation>, ApiError> {
            match self.replies.get(id) {
                Some(Ok(series)) => Ok(series.clone()),
                Some(Err(status)) => Err(ApiError::Http {
                    status: *status,
                    body: "series unavailable".to_string(),
                }),
                None => Ok(Vec::new()),
            }
        }

        async fn trigger_quote(
            &self,
            _payload: &Value,
            _cancel: &CancellationToken,
        ) -> Result<QuoteAck, ApiError> {
            unreachable!()
        }

        async fn health(&self, _cancel: &CancellationToken) -> Result<Health, ApiError> {
            unreachable!()
        }
    }

    #[tokio::test]
    async fn one_failing_listing_degrades_to_empty_series() {
        let mut api = ScriptedApi::new();
        api.replies.insert(
            "A".to_string(),
            Ok(vec![rec("2024-01-01", 100.0), rec("2024-01-02", 110.0)]),
        );
        api.replies.insert("B".to_string(), Err(500));
        let api: Arc<dyn PricingApi> = Arc::new(api);

        let ctrl = CompareController::new(api, range());
        ctrl.add("A").await;
        ctrl.add("B").await;
        ctrl.refresh().await;

        let snap = ctrl.snapshot().await;
        assert_eq!(snap.status, CompareStatus::Loaded);
        assert_eq!(snap.series.get("B"), Some(&Vec::new()));
        assert_eq!(snap.series.get("A").map(Vec::len), Some(2));

        let rows = ctrl.rows().await;
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| !r.prices.contains_key("B")));
    }

    #[tokio::test]
    async fn empty_selection_clears_series_without_fetching() {
        let api: Arc<dyn PricingApi> = Arc::new(ScriptedApi::new());
        let ctrl = CompareController::new(api, range());
        ctrl.add("A").await;
        ctrl.refresh().await;
        ctrl.remove("A").await;
        ctrl.refresh().await;

        let snap = ctrl.snapshot().await;
        assert_eq!(snap.status, CompareStatus::Idle);
        assert!(snap.series.is_empty());
    }

    #[tokio::test]
    async fn directory_failure_becomes_view_error() {
        let mut api = ScriptedApi::new();
        api.listings = Err(502);
        let ctrl = CompareController::new(Arc::new(api), range());
        ctrl.load_listings().await;

        let snap = ctrl.snapshot().await;
        assert!(matches!(snap.status, CompareStatus::Error(_)));
    }

    type Reply = Result<Vec<Recommendation>, ApiError>;

    // Per-call gated backend; resolves only when the test releases a call.
    #[derive(Default)]
    struct GatedApi {
        pending: StdMutex<Vec<(String, Option<oneshot::Sender<Reply>>)>>,
    }

    impl GatedApi {
        fn calls(&self) -> usize {
            self.pending.lock().unwrap().len()
        }

        fn release(&self, idx: usize, reply: Reply) {
            let tx = self.pending.lock().unwrap()[idx].1.take().unwrap();
            tx.send(reply).unwrap();
        }

        async fn wait_calls(&self, n: usize) {
            while self.calls() < n {
                tokio::task::yield_now().await;
            }
        }
    }

    #[async_trait]
    impl PricingApi for GatedApi {
        async fn listings(&self, _cancel: &CancellationToken) -> Result<Vec<Listing>, ApiError> {
            unreachable!()
        }

        async fn listing(&self, _id: &str, _cancel: &CancellationToken) -> Result<Listing, ApiError> {
            unreachable!()
        }

        async fn recommendations(
            &self,
            id: &str,
            _range: DateRange,
            _cancel: &CancellationToken,
        ) -> Result<Vec<Recommendation>, ApiError> {
            let (tx, rx) = oneshot::channel();
            self.pending
                .lock()
                .unwrap()
                .push((id.to_string(), Some(tx)));
            rx.await.unwrap_or(Err(ApiError::Cancelled))
        }

        async fn trigger_quote(
            &self,
            _payload: &Value,
            _cancel: &CancellationToken,
        ) -> Result<QuoteAck, ApiError> {
            unreachable!()
        }

        async fn health(&self, _cancel: &CancellationToken) -> Result<Health, ApiError> {
            unreachable!()
        }
    }

    #[tokio::test]
    async fn stale_refresh_batch_is_discarded() {
        let api = Arc::new(GatedApi::default());
        let ctrl = CompareController::new(api.clone(), range());
        ctrl.add("A").await;

        let h1 = tokio::spawn({
            let c = ctrl.clone();
            async move { c.refresh().await }
        });
        api.wait_calls(1).await;

        // Second refresh supersedes the first before its batch settles.
        ctrl.add("B").await;
        let h2 = tokio::spawn({
            let c = ctrl.clone();
            async move { c.refresh().await }
        });
        api.wait_calls(3).await;

        api.release(1, Ok(vec![rec("2024-01-01", 200.0)]));
        api.release(2, Ok(vec![rec("2024-01-01", 90.0)]));
        h2.await.unwrap();

        // The first batch finally resolves; it must change nothing.
        api.release(0, Ok(vec![rec("2024-01-01", 999.0)]));
        h1.await.unwrap();

        let snap = ctrl.snapshot().await;
        assert_eq!(snap.status, CompareStatus::Loaded);
        assert_eq!(snap.series.len(), 2);
        assert_eq!(snap.series.get("A").unwrap()[0].rec_price, 200.0);
        assert_eq!(snap.series.get("B").unwrap()[0].rec_price, 90.0);
    }
}
