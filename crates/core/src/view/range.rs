use crate::api::{ApiError, PricingApi};
use crate::domain::{recommendation, DateRange, Recommendation};
use crate::time::calendar;
use chrono::NaiveDate;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchStatus {
    Idle,
    Loading,
    Error(String),
}

#[derive(Debug, Clone)]
pub struct RangeSnapshot {
    pub pending: DateRange,
    pub committed: DateRange,
    pub series: Vec<Recommendation>,
    pub status: FetchStatus,
}

#[derive(Debug)]
struct RangeState {
    pending: DateRange,
    committed: DateRange,
    series: Vec<Recommendation>,
    status: FetchStatus,
    min_to: Option<NaiveDate>,
    epoch: u64,
    cancel: CancellationToken,
    closed: bool,
}

// Owns the pending (user-edited) and committed (displayed) ranges for one
// listing. A newer commit cancels the previous request, and a result is
// applied only while its request is still current, so a slow early response
// can never clobber a faster later one.
#[derive(Clone)]
pub struct RangeController {
    api: Arc<dyn PricingApi>,
    listing_id: String,
    state: Arc<Mutex<RangeState>>,
}

impl RangeController {
    pub fn new(api: Arc<dyn PricingApi>, listing_id: impl Into<String>) -> Self {
        Self::with_range(api, listing_id, DateRange::default_window(calendar::today()))
    }

    pub fn with_range(
        api: Arc<dyn PricingApi>,
        listing_id: impl Into<String>,
        range: DateRange,
    ) -> Self {
        Self {
            api,
            listing_id: listing_id.into(),
            state: Arc::new(Mutex::new(RangeState {
                pending: range,
                committed: range,
                series: Vec::new(),
                status: FetchStatus::Idle,
                min_to: None,
                epoch: 0,
                cancel: CancellationToken::new(),
                closed: false,
            })),
        }
    }

    pub fn listing_id(&self) -> &str {
        &self.listing_id
    }

    pub async fn snapshot(&self) -> RangeSnapshot {
        let st = self.state.lock().await;
        RangeSnapshot {
            pending: st.pending,
            committed: st.committed,
            series: st.series.clone(),
            status: st.status.clone(),
        }
    }

    // Pending edits never touch the committed range and never fetch.
    pub async fn set_pending_from(&self, from: NaiveDate) {
        let mut st = self.state.lock().await;
        st.pending = st.pending.with_from(from);
    }

    pub async fn set_pending_to(&self, to: NaiveDate) {
        let mut st = self.state.lock().await;
        let min_to = st.min_to;
        st.pending = st.pending.with_to(to, min_to);
    }

    pub async fn set_min_to(&self, min_to: Option<NaiveDate>) {
        let mut st = self.state.lock().await;
        st.min_to = min_to;
    }

    pub async fn initial_load(&self) {
        self.commit().await;
    }

    pub async fn commit(&self) {
        let (epoch, token, range) = {
            let mut st = self.state.lock().await;
            if st.closed {
                return;
            }

            // Supersede whatever is still in flight.
            st.cancel.cancel();
            let token = CancellationToken::new();
            st.cancel = token.clone();
            st.epoch += 1;
            st.status = FetchStatus::Loading;
            (st.epoch, token, st.pending)
        };

        // The lock is not held across the network await; a later commit can
        // run concurrently and take over.
        let result = self
            .api
            .recommendations(&self.listing_id, range, &token)
            .await;

        let mut st = self.state.lock().await;
        if st.closed || st.epoch != epoch || token.is_cancelled() {
            // Superseded or closed: drop the result, whatever it was.
            return;
        }

        match result {
            Ok(mut series) => {
                recommendation::sort_by_date(&mut series);
                st.committed = range;
                st.series = series;
                st.status = FetchStatus::Idle;
            }
            Err(ApiError::Cancelled) => {}
            Err(err) => {
                tracing::warn!(
                    listing_id = %self.listing_id,
                    %range,
                    error = %err,
                    "recommendation fetch failed"
                );
                st.status = FetchStatus::Error(err.to_string());
            }
        }
    }

    // Call when the owning view goes away; bars every later continuation
    // from mutating state.
    pub async fn close(&self) {
        let mut st = self.state.lock().await;
        st.closed = true;
        st.cancel.cancel();
    }
}
