//! Table/Chart Renderer
//!
//! Pure transforms from upstream records to what a view displays. Nothing in
//! here performs I/O; everything can be recomputed from its input.

pub mod charts;
pub mod dates;
pub mod tables;

use serde::Serialize;

use crate::upstream::records::TrendPoint;
use crate::upstream::{CustomerAccount, RecordId};

pub use charts::{schedule_view, trends_view, ScheduleView, ServiceSeries, TrendsView};
pub use tables::{
    certificate_table, checkpoint_table, group_photos, initials, inspection_rows, invoice_rows, CertificateTable,
    CheckpointFilter, CheckpointTable, InspectionRow, InvoiceRow, PhotoGroups, SignedPhoto,
};

/// Next-visit card of the landing page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardCard {
    #[serde(flatten)]
    pub account: CustomerAccount,
    pub next_inspection_display: Option<String>,
    pub technician: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub cards: Vec<DashboardCard>,
    pub trends: Vec<ServiceSeries>,
}

/// Cards for the active customer plus one trend chart per service.
pub fn dashboard_view(accounts: &[CustomerAccount], active: &RecordId, trends: &[TrendPoint]) -> DashboardView {
    let text = |account: &CustomerAccount, key: &str| account.extra.get(key).and_then(|v| v.as_str()).map(str::to_string);

    let cards = accounts
        .iter()
        .filter(|account| &account.customer_id == active)
        .map(|account| DashboardCard {
            next_inspection_display: dates::display_date(text(account, "DatumDalsiKontroly").as_deref()),
            technician: [text(account, "Jmeno"), text(account, "Prijmeni")]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" "),
            account: account.clone(),
        })
        .collect();

    DashboardView {
        cards,
        trends: charts::all_series(trends),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dashboard_shows_only_active_account() {
        let accounts: Vec<CustomerAccount> = serde_json::from_value(json!([
            { "ZakaznikId": 1, "Nazev": "A", "DatumDalsiKontroly": "2024-07-01", "Jmeno": "Petr", "Prijmeni": "Malý" },
            { "ZakaznikId": 2, "Nazev": "B" }
        ]))
        .unwrap();
        let trends: Vec<TrendPoint> = serde_json::from_value(json!([
            { "SluzbaID": 5, "Year": 2024, "Month": 1, "MaxStav": 1.0, "MaxTarget": 2.0 },
            { "SluzbaID": 6, "Year": 2024, "Month": 1, "MaxStav": 3.0, "MaxTarget": 2.0 }
        ]))
        .unwrap();

        let view = dashboard_view(&accounts, &RecordId::from(1), &trends);
        assert_eq!(view.cards.len(), 1);
        assert_eq!(view.cards[0].next_inspection_display.as_deref(), Some("01.07.2024"));
        assert_eq!(view.cards[0].technician, "Petr Malý");
        assert_eq!(view.trends.len(), 2);
        assert!(!view.trends[1].within_limit);
    }
}
