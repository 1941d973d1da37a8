//! Views
//!
//! Every page of the portal is one `View`. A session keeps one scoped fetcher
//! per view it has opened; opening a view always fetches fresh data for the
//! active customer, and switching customers reloads the views already open.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::fetcher::{FetchState, ScopedFetcher};
use crate::render::{self, tables, CheckpointFilter};
use crate::session::{CustomerContext, Scope};
use crate::upstream::records::{
    Certificate, Checkpoint, Inspection, Invoice, MapRecord, Nonconformity, SafetySheet, ScheduleEntry, TrendPoint,
};
use crate::upstream::{fetch_records, CustomerAccount, Endpoint, InvoiceError, InvoiceSource, PortalApi, RecordId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum View {
    Dashboard,
    Inspections,
    TrendReports,
    Trends,
    Checkpoints,
    Schedule,
    Maps,
    Certificates,
    SafetySheets,
    Nonconformities,
    Invoices,
    TrendAnalysis,
}

impl View {
    pub const ALL: [View; 12] = [
        View::Dashboard,
        View::Inspections,
        View::TrendReports,
        View::Trends,
        View::Checkpoints,
        View::Schedule,
        View::Maps,
        View::Certificates,
        View::SafetySheets,
        View::Nonconformities,
        View::Invoices,
        View::TrendAnalysis,
    ];

    /// What the user reads when the view could not be loaded.
    pub fn failure_message(self) -> &'static str {
        match self {
            View::Dashboard | View::Trends => "Nepodařilo se načíst data.",
            View::Inspections => "Nepodařilo se načíst kontroly.",
            View::TrendReports => "Nepodařilo se načíst trendy.",
            View::Checkpoints => "Nepodařilo se načíst kontrolní body.",
            View::Schedule => "Nepodařilo se načíst harmonogram kontrol.",
            View::Maps => "Nepodařilo se načíst data pro mapy.",
            View::Certificates => "Nepodařilo se načíst certifikáty.",
            View::SafetySheets => "Nepodařilo se načíst bezpečnostní listy.",
            View::Nonconformities => "Nepodařilo se načíst neshody.",
            View::Invoices => "Nepodařilo se načíst faktury.",
            View::TrendAnalysis => "Nepodařilo se načíst analýzu.",
        }
    }
}

/// Records as loaded for one view, before any query-dependent shaping.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewData {
    Dashboard {
        /// Customer the cards were loaded for
        active: RecordId,
        accounts: Vec<CustomerAccount>,
        trends: Vec<TrendPoint>,
    },
    Inspections(Vec<Inspection>),
    TrendReports(Vec<Inspection>),
    Trends(Vec<TrendPoint>),
    Checkpoints(Vec<Checkpoint>),
    Schedule(Vec<ScheduleEntry>),
    Maps(Vec<MapRecord>),
    Certificates(Vec<Certificate>),
    SafetySheets(Vec<SafetySheet>),
    Nonconformities(Vec<Nonconformity>),
    Invoices(Vec<Invoice>),
    TrendAnalysis(Value),
}

/// Optional query refining a view: certificate type or checkpoint facets.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ViewQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub service: Option<String>,
    pub object: Option<String>,
    pub space: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RenderedView {
    Dashboard(render::DashboardView),
    Inspections(Vec<render::InspectionRow>),
    Trends(render::TrendsView),
    Checkpoints(render::CheckpointTable),
    Schedule(render::ScheduleView),
    Maps(Vec<tables::DatedRow<MapRecord>>),
    Certificates(render::CertificateTable),
    SafetySheets(Vec<SafetySheet>),
    Nonconformities(Vec<tables::DatedRow<Nonconformity>>),
    Invoices(Vec<render::InvoiceRow>),
    Raw(Value),
}

impl ViewData {
    pub fn render(&self, query: &ViewQuery, today: NaiveDate) -> RenderedView {
        match self {
            ViewData::Dashboard { active, accounts, trends } => {
                RenderedView::Dashboard(render::dashboard_view(accounts, active, trends))
            }
            ViewData::Inspections(items) => RenderedView::Inspections(render::inspection_rows(items.clone())),
            ViewData::TrendReports(items) => RenderedView::Inspections(tables::trend_report_rows(items.clone())),
            ViewData::Trends(points) => RenderedView::Trends(render::trends_view(points, query.service.as_deref())),
            ViewData::Checkpoints(items) => {
                let filter = CheckpointFilter {
                    service: query.service.clone(),
                    object: query.object.clone(),
                    space: query.space.clone(),
                };
                RenderedView::Checkpoints(render::checkpoint_table(items.clone(), &filter))
            }
            ViewData::Schedule(entries) => RenderedView::Schedule(render::schedule_view(entries.clone())),
            ViewData::Maps(items) => RenderedView::Maps(tables::map_rows(items.clone())),
            ViewData::Certificates(items) => {
                RenderedView::Certificates(render::certificate_table(items.clone(), query.kind.as_deref(), today))
            }
            ViewData::SafetySheets(items) => RenderedView::SafetySheets(items.clone()),
            ViewData::Nonconformities(items) => RenderedView::Nonconformities(tables::nonconformity_rows(items.clone())),
            ViewData::Invoices(items) => RenderedView::Invoices(render::invoice_rows(items.clone())),
            ViewData::TrendAnalysis(value) => RenderedView::Raw(value.clone()),
        }
    }
}

/// Upstream collaborators a view may need.
#[derive(Clone)]
pub struct Sources {
    pub api: Arc<dyn PortalApi>,
    pub invoices: Arc<dyn InvoiceSource>,
}

/// Fetch the records of `view` for `scope`. The context snapshot supplies
/// the e-mail (dashboard) and the legal id (invoices).
pub async fn load_view(
    view: View,
    scope: &Scope,
    ctx: &CustomerContext,
    sources: &Sources,
) -> Result<ViewData, String> {
    let key = scope.customer_id.as_str();
    let api = sources.api.as_ref();

    let loaded: anyhow::Result<ViewData> = match view {
        View::Dashboard => {
            let email = ctx.email.clone().unwrap_or_default();
            tokio::try_join!(
                api.customers(&email),
                fetch_records::<TrendPoint>(api, Endpoint::Trends, key)
            )
            .map(|(accounts, trends)| ViewData::Dashboard {
                active: scope.customer_id.clone(),
                accounts,
                trends,
            })
        }
        View::Inspections => fetch_records(api, Endpoint::Inspections, key).await.map(ViewData::Inspections),
        View::TrendReports => fetch_records(api, Endpoint::Inspections, key).await.map(ViewData::TrendReports),
        View::Trends => fetch_records(api, Endpoint::Trends, key).await.map(ViewData::Trends),
        View::Checkpoints => fetch_records(api, Endpoint::Checkpoints, key).await.map(ViewData::Checkpoints),
        View::Schedule => fetch_records(api, Endpoint::Schedule, key).await.map(ViewData::Schedule),
        View::Maps => fetch_records(api, Endpoint::Maps, key).await.map(ViewData::Maps),
        View::Certificates => fetch_records(api, Endpoint::Certificates, key).await.map(ViewData::Certificates),
        View::SafetySheets => fetch_records(api, Endpoint::SafetySheets, key).await.map(ViewData::SafetySheets),
        View::Nonconformities => fetch_records(api, Endpoint::Nonconformities, key)
            .await
            .map(ViewData::Nonconformities),
        View::TrendAnalysis => api.get_json(Endpoint::TrendAnalysis, key).await.map(ViewData::TrendAnalysis),
        View::Invoices => {
            let Some(legal_id) = ctx.customer_legal_id.as_deref().filter(|ic| !ic.trim().is_empty()) else {
                return Err("Chybí zákaznické IC.".to_string());
            };
            match sources.invoices.recent(legal_id).await {
                Ok(invoices) => Ok(ViewData::Invoices(invoices)),
                Err(InvoiceError::MissingCredentials) => return Err("Chybí email nebo API klíč.".to_string()),
                Err(InvoiceError::Request(e)) => Err(e),
            }
        }
    };

    loaded.map_err(|e| failed(view, scope, e))
}

fn failed(view: View, scope: &Scope, e: anyhow::Error) -> String {
    warn!(
        "Loading {:?} for customer {} failed: {:#}",
        view, scope.customer_id, e
    );
    view.failure_message().to_string()
}

type ViewFetcher = ScopedFetcher<Arc<ViewData>>;

/// The fetch slots of one session.
#[derive(Default)]
pub struct ViewBoard {
    fetchers: RwLock<HashMap<View, Arc<ViewFetcher>>>,
    /// Newest context generation the board has been asked to show
    newest_generation: AtomicU64,
}

impl ViewBoard {
    async fn fetcher(&self, view: View) -> Arc<ViewFetcher> {
        if let Some(fetcher) = self.fetchers.read().await.get(&view) {
            return fetcher.clone();
        }
        let generation = self.newest_generation.load(Ordering::SeqCst);
        self.fetchers
            .write()
            .await
            .entry(view)
            .or_insert_with(|| Arc::new(ScopedFetcher::from_generation(generation)))
            .clone()
    }

    fn observe(&self, ctx: &CustomerContext) {
        if let Some(scope) = ctx.scope() {
            self.newest_generation.fetch_max(scope.generation, Ordering::SeqCst);
        }
    }

    /// Open `view`: fetch fresh records for the context's current scope. A
    /// context snapshot older than the board's newest one fetches nothing
    /// and gets the view's current state.
    pub async fn show(&self, view: View, ctx: &CustomerContext, sources: &Sources) -> FetchState<Arc<ViewData>> {
        self.observe(ctx);
        let fetcher = self.fetcher(view).await;
        fetcher
            .load(ctx.scope(), |scope| async move {
                load_view(view, &scope, ctx, sources).await.map(Arc::new)
            })
            .await
    }

    pub async fn state(&self, view: View) -> FetchState<Arc<ViewData>> {
        match self.fetchers.read().await.get(&view) {
            Some(fetcher) => fetcher.state().await,
            None => FetchState::Idle,
        }
    }

    /// Re-issue the fetch of every opened view whose scope is out of date.
    /// Tickets are taken before returning, so once this resolves no earlier
    /// scope can be dispatched on any opened view; only the loading runs in
    /// the spawned tasks.
    pub async fn rescope(&self, ctx: &CustomerContext, sources: &Sources) -> Vec<JoinHandle<()>> {
        self.observe(ctx);
        let scope = ctx.scope();
        let opened: Vec<(View, Arc<ViewFetcher>)> = self
            .fetchers
            .read()
            .await
            .iter()
            .map(|(view, fetcher)| (*view, fetcher.clone()))
            .collect();

        let mut reloads = Vec::new();
        for (view, fetcher) in opened {
            if fetcher.scope().await == scope {
                continue;
            }
            let Some(ticket) = fetcher.dispatch(scope.clone()).await else {
                continue;
            };
            debug!("Reloading {:?} for new scope", view);

            let ctx = ctx.clone();
            let sources = sources.clone();
            reloads.push(tokio::spawn(async move {
                let outcome = load_view(view, &ticket.scope, &ctx, &sources).await.map(Arc::new);
                fetcher.resolve(ticket, outcome).await;
            }));
        }
        reloads
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_names_in_urls() {
        let view: View = serde_json::from_value(serde_json::json!("safety-sheets")).unwrap();
        assert_eq!(view, View::SafetySheets);
        assert_eq!(serde_json::to_value(View::TrendAnalysis).unwrap(), "trend-analysis");
    }

    #[test]
    fn test_dashboard_renders_the_customer_it_was_loaded_for() {
        let account = |id: i64| -> CustomerAccount {
            serde_json::from_value(serde_json::json!({ "ZakaznikId": id, "Nazev": format!("Zákazník {id}") })).unwrap()
        };
        let data = ViewData::Dashboard {
            active: RecordId::from(8),
            accounts: vec![account(7), account(8)],
            trends: Vec::new(),
        };

        let today = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let RenderedView::Dashboard(view) = data.render(&ViewQuery::default(), today) else {
            panic!("dashboard data renders as a dashboard");
        };
        assert_eq!(view.cards.len(), 1);
        assert_eq!(view.cards[0].account.customer_id, RecordId::from(8));
    }

    #[test]
    fn test_every_view_has_a_message() {
        for view in View::ALL {
            assert!(view.failure_message().starts_with("Nepodařilo se načíst"));
        }
    }
}
