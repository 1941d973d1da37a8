//! Table shaping: sorting, facets, filters and derived flags.

use std::cmp::Reverse;

use chrono::NaiveDate;
use serde::Serialize;

use super::dates::{display_date, is_expired, parse_date, ZERO_DATE};
use crate::upstream::records::{
    Certificate, Checkpoint, Inspection, Invoice, MapRecord, Nonconformity, NonconformityPhoto, PhotoKind,
};

/// Certificate type filter value meaning "no filter".
pub const ALL_TYPES: &str = "Vše";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InspectionRow {
    #[serde(flatten)]
    pub record: Inspection,
    pub date_display: Option<String>,
    pub technician: String,
}

/// Newest first; undated inspections go last.
pub fn inspection_rows(mut inspections: Vec<Inspection>) -> Vec<InspectionRow> {
    inspections.sort_by_key(|i| {
        let date = i.date.as_deref().and_then(parse_date);
        (date.is_none(), Reverse(date))
    });
    inspections
        .into_iter()
        .map(|record| InspectionRow {
            date_display: display_date(record.date.as_deref()),
            technician: record.technician(),
            record,
        })
        .collect()
}

/// Inspections that came with a trend report.
pub fn trend_report_rows(inspections: Vec<Inspection>) -> Vec<InspectionRow> {
    let with_report = inspections
        .into_iter()
        .filter(|i| i.trend_report_url.as_deref().is_some_and(|url| !url.trim().is_empty()))
        .collect();
    inspection_rows(with_report)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CertificateRow {
    #[serde(flatten)]
    pub record: Certificate,
    pub valid_until_display: String,
    pub expired: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CertificateTable {
    /// `Vše` followed by the distinct non-empty types in first-seen order
    pub types: Vec<String>,
    pub selected: String,
    pub rows: Vec<CertificateRow>,
}

pub fn certificate_table(certificates: Vec<Certificate>, selected: Option<&str>, today: NaiveDate) -> CertificateTable {
    let mut types = vec![ALL_TYPES.to_string()];
    for cert in &certificates {
        if !cert.kind.is_empty() && !types.contains(&cert.kind) {
            types.push(cert.kind.clone());
        }
    }

    let selected = selected
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(ALL_TYPES)
        .to_string();

    let rows = certificates
        .into_iter()
        .filter(|cert| selected == ALL_TYPES || cert.kind == selected)
        .map(|record| {
            let valid_until = record.valid_until.as_deref().and_then(parse_date);
            CertificateRow {
                valid_until_display: display_date(record.valid_until.as_deref()).unwrap_or_else(|| "N/A".into()),
                expired: valid_until.is_some_and(|day| is_expired(day, today)),
                record,
            }
        })
        .collect();

    CertificateTable { types, selected, rows }
}

/// Facet selection for the checkpoint list; `None` matches anything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckpointFilter {
    pub service: Option<String>,
    pub object: Option<String>,
    pub space: Option<String>,
}

impl CheckpointFilter {
    fn matches(&self, checkpoint: &Checkpoint) -> bool {
        fn facet(wanted: &Option<String>, actual: &Option<String>) -> bool {
            match wanted.as_deref().filter(|w| !w.is_empty()) {
                None => true,
                Some(w) => actual.as_deref() == Some(w),
            }
        }
        facet(&self.service, &checkpoint.service)
            && facet(&self.object, &checkpoint.object)
            && facet(&self.space, &checkpoint.space)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckpointTable {
    pub services: Vec<String>,
    pub objects: Vec<String>,
    pub spaces: Vec<String>,
    pub rows: Vec<Checkpoint>,
}

fn distinct<'a>(values: impl Iterator<Item = Option<&'a String>>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for value in values.flatten() {
        if !out.contains(value) {
            out.push(value.clone());
        }
    }
    out
}

pub fn checkpoint_table(mut checkpoints: Vec<Checkpoint>, filter: &CheckpointFilter) -> CheckpointTable {
    checkpoints.sort_by_key(|c| (c.number.is_none(), c.number));

    CheckpointTable {
        services: distinct(checkpoints.iter().map(|c| c.service.as_ref())),
        objects: distinct(checkpoints.iter().map(|c| c.object.as_ref())),
        spaces: distinct(checkpoints.iter().map(|c| c.space.as_ref())),
        rows: checkpoints.into_iter().filter(|c| filter.matches(c)).collect(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatedRow<T> {
    #[serde(flatten)]
    pub record: T,
    pub date_display: Option<String>,
}

pub fn map_rows(maps: Vec<MapRecord>) -> Vec<DatedRow<MapRecord>> {
    maps.into_iter()
        .map(|record| DatedRow {
            date_display: display_date(record.created.as_deref()),
            record,
        })
        .collect()
}

pub fn nonconformity_rows(items: Vec<Nonconformity>) -> Vec<DatedRow<Nonconformity>> {
    items
        .into_iter()
        .map(|mut record| {
            if record.status.as_deref().map_or(true, str::is_empty) {
                record.status = Some("Neřešeno".to_string());
            }
            DatedRow {
                date_display: display_date(record.found_on.as_deref()),
                record,
            }
        })
        .collect()
}

/// Photo with the signed URL the browser may load directly.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignedPhoto {
    #[serde(flatten)]
    pub photo: NonconformityPhoto,
    pub signed_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PhotoGroups {
    pub findings: Vec<SignedPhoto>,
    pub remediations: Vec<SignedPhoto>,
}

pub fn group_photos(photos: Vec<SignedPhoto>) -> PhotoGroups {
    let mut groups = PhotoGroups::default();
    for photo in photos {
        match photo.photo.kind {
            PhotoKind::Finding => groups.findings.push(photo),
            PhotoKind::Remediation => groups.remediations.push(photo),
            PhotoKind::Other => {}
        }
    }
    groups
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoiceRow {
    #[serde(flatten)]
    pub record: Invoice,
    pub created_display: Option<String>,
    pub paid: bool,
    pub paid_label: &'static str,
}

pub fn is_paid(date_paid: Option<&str>) -> bool {
    date_paid.is_some_and(|d| !d.trim().is_empty() && d != ZERO_DATE)
}

pub fn invoice_rows(invoices: Vec<Invoice>) -> Vec<InvoiceRow> {
    invoices
        .into_iter()
        .map(|record| {
            let paid = is_paid(record.date_paid.as_deref());
            InvoiceRow {
                created_display: display_date(record.date_created.as_deref()),
                paid,
                paid_label: if paid { "Zaplacená" } else { "Nezaplacená" },
                record,
            }
        })
        .collect()
}

/// Avatar text: first letter of each name part, else the first two letters
/// of the e-mail's local part.
pub fn initials(display_name: Option<&str>, email: Option<&str>) -> String {
    if let Some(name) = display_name.map(str::trim).filter(|n| !n.is_empty()) {
        let from_words: String = name
            .split_whitespace()
            .filter_map(|word| word.chars().next())
            .collect();
        return from_words.to_uppercase();
    }

    let local = email.and_then(|e| e.split('@').next()).unwrap_or("");
    let letters: String = local.chars().take(2).collect();
    if letters.is_empty() {
        "??".to_string()
    } else {
        letters.to_uppercase()
    }
}
