//! Record DTOs mirrored from the portal API.
//!
//! Field names follow the upstream JSON exactly (Czech, mixed casing), so the
//! browser receives the shape it already knows. Anything we do not model is
//! kept in `extra` and passed through untouched.

use std::fmt;

use serde::de::Deserializer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identifier that upstream sends either as a number or as a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<i64> for RecordId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(s) => Ok(Self(s)),
            Value::Number(n) => Ok(Self(n.to_string())),
            other => Err(serde::de::Error::custom(format!(
                "expected string or number id, got {other}"
            ))),
        }
    }
}

/// One customer account the signed-in e-mail may act for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerAccount {
    #[serde(rename = "ZakaznikId")]
    pub customer_id: RecordId,
    #[serde(rename = "Nazev", default, deserialize_with = "lenient_text")]
    pub name: String,
    #[serde(rename = "IC", default, deserialize_with = "lenient_string")]
    pub legal_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inspection {
    #[serde(rename = "ID")]
    pub id: RecordId,
    #[serde(rename = "Datum", default)]
    pub date: Option<String>,
    #[serde(rename = "Typ_kontroly", default)]
    pub kind: Option<String>,
    #[serde(rename = "Jmeno", default)]
    pub technician_first_name: Option<String>,
    #[serde(rename = "Prijmeni", default)]
    pub technician_last_name: Option<String>,
    #[serde(rename = "Poznámka", default)]
    pub note: Option<String>,
    #[serde(rename = "Url_BlobStorage", default)]
    pub report_url: Option<String>,
    #[serde(rename = "Url_Trendy_BlobStorage", default)]
    pub trend_report_url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Inspection {
    pub fn technician(&self) -> String {
        [&self.technician_first_name, &self.technician_last_name]
            .iter()
            .filter_map(|part| part.as_deref())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Certificate {
    #[serde(rename = "CertifikatId")]
    pub id: RecordId,
    #[serde(rename = "Nazev", default, deserialize_with = "lenient_text")]
    pub name: String,
    #[serde(rename = "Typ", default, deserialize_with = "lenient_text")]
    pub kind: String,
    #[serde(rename = "PlatnostDo", default)]
    pub valid_until: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetySheet {
    #[serde(rename = "Bezpecnostni_listyId")]
    pub id: RecordId,
    #[serde(rename = "Nazev", default, deserialize_with = "lenient_text")]
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    #[serde(rename = "PlanovaneDatum", default)]
    pub planned_date: Option<String>,
    /// 1 = inspection took place, anything else = planned
    #[serde(rename = "StatusKontrolyFlag", default)]
    pub status_flag: Option<i64>,
    #[serde(rename = "StatusKontroly", default)]
    pub status: Option<String>,
    #[serde(rename = "PravidelnostNazev", default)]
    pub frequency: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ScheduleEntry {
    pub fn is_done(&self) -> bool {
        self.status_flag == Some(1)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapRecord {
    #[serde(rename = "MapaId")]
    pub id: RecordId,
    #[serde(rename = "Nazev", default, deserialize_with = "lenient_text")]
    pub name: String,
    #[serde(rename = "CreateDate", default)]
    pub created: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Monthly trend measurement for one service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    #[serde(rename = "SluzbaID")]
    pub service_id: RecordId,
    #[serde(rename = "ServiceName", default)]
    pub service_name: Option<String>,
    #[serde(rename = "Year")]
    pub year: i32,
    #[serde(rename = "Month")]
    pub month: u32,
    #[serde(rename = "MaxStav", default)]
    pub max_value: Option<f64>,
    #[serde(rename = "AvgStav", default)]
    pub avg_value: Option<f64>,
    #[serde(rename = "MaxTarget", default)]
    pub limit: Option<f64>,
    #[serde(rename = "Vyhodnocení_jednotka", default)]
    pub unit: Option<String>,
    #[serde(rename = "Komentar", default)]
    pub comment: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Bait station ("stanička") with its placement facets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    #[serde(rename = "StanickaID")]
    pub id: RecordId,
    #[serde(rename = "Číslo_staničky", default)]
    pub number: Option<i64>,
    #[serde(rename = "Označení_staničky", default)]
    pub label: Option<String>,
    #[serde(rename = "Služba", default)]
    pub service: Option<String>,
    #[serde(rename = "Objekt", default)]
    pub object: Option<String>,
    #[serde(rename = "Prostor", default)]
    pub space: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Nonconformity {
    #[serde(rename = "NeshodaId")]
    pub id: RecordId,
    #[serde(rename = "DatumNalezu", default)]
    pub found_on: Option<String>,
    #[serde(rename = "Technik", default)]
    pub technician: Option<String>,
    #[serde(rename = "Popis", default)]
    pub description: Option<String>,
    #[serde(rename = "Status", default)]
    pub status: Option<String>,
    #[serde(rename = "PopisNapravy", default)]
    pub remediation: Option<String>,
    #[serde(rename = "KdoNapravoval", default)]
    pub remediated_by: Option<String>,
    #[serde(rename = "DatumNapravy", default)]
    pub remediated_on: Option<String>,
    #[serde(rename = "FotoNapravyUrl", default)]
    pub remediation_photo_url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhotoKind {
    #[serde(rename = "Nalez")]
    Finding,
    #[serde(rename = "Naprava")]
    Remediation,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NonconformityPhoto {
    #[serde(rename = "FotoBlobUrl")]
    pub blob_url: String,
    #[serde(rename = "TypNeshody")]
    pub kind: PhotoKind,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Body of `update-naprava-neshoda`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemediationUpdate {
    #[serde(rename = "NeshodaId")]
    pub nonconformity_id: RecordId,
    #[serde(rename = "PopisNapravy")]
    pub description: String,
    #[serde(rename = "KdoNapravoval")]
    pub remediated_by: String,
    #[serde(rename = "DatumNapravy")]
    pub remediated_on: Option<String>,
    #[serde(rename = "Status")]
    pub status: String,
    #[serde(rename = "FotoNapravyUrl")]
    pub photo_url: String,
}

/// Invoice as returned by the invoicing API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: RecordId,
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub date_created: Option<String>,
    #[serde(default)]
    pub date_paid: Option<String>,
    #[serde(default)]
    pub total: Value,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub url_download_pdf: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Like `lenient_string`, with null read as an empty string.
fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    lenient_string(deserializer).map(Option::unwrap_or_default)
}

/// Accepts a string, a number or null.
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
