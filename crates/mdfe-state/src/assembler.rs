//! # Document Assembler
//!
//! Turns a form-level [`ManifestData`] record into a `Draft`
//! [`ManifestDocument`] carrying the ordered payload the gateway consumes.
//!
//! Every identifier is checked before any gateway round-trip: issuer CNPJ,
//! driver CPFs, insurer and contracting-party ids, referenced CT-e/NF-e keys,
//! UF codes, municipality codes, totals. All failures are collected and
//! returned together as one [`ValidationError`] keyed by field path
//! (`unloading[0].cte_keys[1]`).
//!
//! Mandatory fields are never filled in silently. A missing numeric code or
//! issuance timestamp is a validation error; callers that want a random
//! numeric code ask for one explicitly with
//! [`mdfe_core::random_numeric_code`].

use mdfe_core::{
    is_cte_key, is_nfe_key, AccessKey, Cnpj, Cpf, EmissionType, FieldError, TaxpayerId,
    Timestamp, Uf, ValidationError,
};
use mdfe_gateway::Environment;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::document::{CargoTotals, Locality, ManifestDocument, ManifestState, Route};
use crate::payload::{indexed, GatewayPayload};

/// Document model code of the MDF-e.
pub const MDFE_MODEL: &str = "58";
/// Road transport modal.
const MODAL_ROAD: &str = "1";
/// Cargo unit code for kilograms.
const UNIT_KG: &str = "01";

// ─── Input Record ───────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IssuerData {
    pub taxpayer_id: String,
    #[serde(default)]
    pub state_registration: String,
    pub name: String,
    /// Issuer UF sigla; its code leads the access key.
    pub uf: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteData {
    pub origin_uf: Option<String>,
    pub destination_uf: Option<String>,
    #[serde(default)]
    pub via: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocalityData {
    pub municipality_code: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnloadingData {
    pub municipality_code: String,
    pub name: String,
    #[serde(default)]
    pub cte_keys: Vec<String>,
    #[serde(default)]
    pub nfe_keys: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VehicleData {
    pub plate: String,
    pub tare_kg: u32,
    #[serde(default)]
    pub uf: Option<String>,
    #[serde(default)]
    pub renavam: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DriverData {
    pub name: String,
    pub cpf: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InsurerData {
    pub taxpayer_id: String,
    pub name: String,
    pub policy: String,
}

/// Form-level data for one manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestData {
    pub issuer: IssuerData,
    pub series: u16,
    pub number: u32,
    /// 8-digit random code of the access key. Required.
    pub numeric_code: Option<String>,
    #[serde(default)]
    pub emission_type: EmissionType,
    /// Issuance instant. Required.
    pub emitted_at: Option<Timestamp>,
    pub route: RouteData,
    pub loading: Vec<LocalityData>,
    pub unloading: Vec<UnloadingData>,
    pub vehicle: VehicleData,
    pub drivers: Vec<DriverData>,
    #[serde(default)]
    pub insurers: Vec<InsurerData>,
    #[serde(default)]
    pub contracting_parties: Vec<String>,
    pub totals: CargoTotals,
}

// ─── Assembler ──────────────────────────────────────────────────────

/// Builds draft manifests.
#[derive(Debug, Clone)]
pub struct DocumentAssembler {
    environment: Environment,
    application_version: String,
}

impl Default for DocumentAssembler {
    fn default() -> Self {
        Self::new(Environment::Homologation)
    }
}

impl DocumentAssembler {
    pub fn new(environment: Environment) -> Self {
        Self {
            environment,
            application_version: concat!("mdfe-stack ", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// Validate `data` and build a `Draft` document.
    ///
    /// # Errors
    ///
    /// A [`ValidationError`] listing every offending field.
    pub fn assemble(&self, data: &ManifestData) -> Result<ManifestDocument, ValidationError> {
        let mut errors = Vec::new();
        let checked = check(data, &mut errors);
        let checked = match (ValidationError::from_fields(errors), checked) {
            (Some(err), _) => return Err(err),
            (None, Some(checked)) => checked,
            (None, None) => {
                return Err(ValidationError::field("manifest", "incomplete manifest data"))
            }
        };

        let payload = self.payload(data, &checked);
        let document = ManifestDocument {
            id: Uuid::new_v4(),
            issuer: checked.issuer,
            uf: checked.uf,
            series: data.series,
            number: data.number,
            numeric_code: checked.numeric_code,
            emission_type: data.emission_type,
            emitted_at: checked.emitted_at,
            route: checked.route,
            loading: data
                .loading
                .iter()
                .map(|l| locality(&l.municipality_code, &l.name))
                .collect(),
            unloading: data
                .unloading
                .iter()
                .map(|u| locality(&u.municipality_code, &u.name))
                .collect(),
            cte_keys: checked.cte_keys,
            nfe_keys: checked.nfe_keys,
            totals: data.totals,
            payload,
            state: ManifestState::Draft,
            access_key: None,
            receipt: None,
            protocol: None,
            authority_status: None,
            authority_reason: None,
            last_response: None,
            created_at: Timestamp::now(),
            transitions: Vec::new(),
        };
        tracing::debug!(
            manifest_id = %document.id,
            issuer = %document.issuer,
            series = document.series,
            number = document.number,
            "manifest draft assembled"
        );
        Ok(document)
    }

    fn payload(&self, data: &ManifestData, checked: &Checked) -> GatewayPayload {
        let mut p = GatewayPayload::new();
        p.section("ide")
            .set("cUF", checked.uf.code().to_string())
            .set("tpAmb", self.environment.code().to_string())
            .set("tpEmit", "1")
            .set("mod", MDFE_MODEL)
            .set("serie", data.series.to_string())
            .set("nMDF", data.number.to_string())
            .set("cMDF", checked.numeric_code.clone())
            .set("modal", MODAL_ROAD)
            .set("dhEmi", checked.emitted_at.to_iso8601())
            .set("tpEmis", data.emission_type.code().to_string())
            .set("procEmi", "0")
            .set("verProc", self.application_version.clone())
            .set("UFIni", checked.route.origin.sigla())
            .set("UFFim", checked.route.destination.sigla());

        for (i, l) in data.loading.iter().enumerate() {
            p.section(&indexed("CARR", i))
                .set("cMunCarrega", l.municipality_code.trim())
                .set("xMunCarrega", l.name.trim());
        }
        for (i, uf) in checked.route.via.iter().enumerate() {
            p.section(&indexed("PERC", i)).set("UFPer", uf.sigla());
        }

        p.section("emit")
            .set("CNPJCPF", checked.issuer.as_str())
            .set("IE", data.issuer.state_registration.trim())
            .set("xNome", data.issuer.name.trim())
            .set("UF", checked.uf.sigla());

        let vehicle = p.section("veicTracao");
        vehicle
            .set("placa", checked.plate.clone())
            .set("tara", data.vehicle.tare_kg.to_string());
        if let Some(renavam) = data.vehicle.renavam.as_deref().filter(|r| !r.trim().is_empty()) {
            vehicle.set("RENAVAM", renavam.trim());
        }
        if let Some(uf) = checked.vehicle_uf {
            vehicle.set("UF", uf.sigla());
        }

        for (i, (driver, cpf)) in data.drivers.iter().zip(&checked.drivers).enumerate() {
            p.section(&indexed("moto", i))
                .set("xNome", driver.name.trim())
                .set("CPF", cpf.as_str());
        }

        for (i, u) in data.unloading.iter().enumerate() {
            p.section(&indexed("infMunDescarga", i))
                .set("cMunDescarga", u.municipality_code.trim())
                .set("xMunDescarga", u.name.trim());
            for (j, key) in u.cte_keys.iter().enumerate() {
                p.section(&format!("{}{:03}", indexed("infCTe", i), j + 1))
                    .set("chCTe", mdfe_core::digits_only(key));
            }
            for (j, key) in u.nfe_keys.iter().enumerate() {
                p.section(&format!("{}{:03}", indexed("infNFe", i), j + 1))
                    .set("chNFe", mdfe_core::digits_only(key));
            }
        }

        for (i, (insurer, id)) in data.insurers.iter().zip(&checked.insurers).enumerate() {
            p.section(&indexed("seg", i))
                .set("respSeg", "1")
                .set("CNPJ", id.as_str())
                .set("xSeg", insurer.name.trim())
                .set("nApol", insurer.policy.trim());
        }

        for (i, id) in checked.contracting.iter().enumerate() {
            p.section(&indexed("infContratante", i))
                .set("CNPJCPF", id.as_str());
        }

        p.section("tot")
            .set("qCTe", checked.cte_keys.len().to_string())
            .set("qNFe", checked.nfe_keys.len().to_string())
            .set("vCarga", format!("{:.2}", data.totals.value.round_dp(2)))
            .set("cUnid", UNIT_KG)
            .set("qCarga", format!("{:.4}", data.totals.weight_kg.round_dp(4)));
        p
    }
}

/// UF encoded in the first two digits of a 7-digit IBGE municipality code.
pub fn municipality_uf(code: &str) -> Option<Uf> {
    let code = code.trim();
    if code.len() != 7 || !code.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    code[..2].parse().ok().and_then(Uf::from_code)
}

fn locality(code: &str, name: &str) -> Locality {
    Locality {
        municipality_code: code.trim().to_string(),
        name: name.trim().to_string(),
    }
}

// ─── Validation ─────────────────────────────────────────────────────

/// Values resolved while checking the record.
struct Checked {
    issuer: Cnpj,
    uf: Uf,
    numeric_code: String,
    emitted_at: Timestamp,
    route: Route,
    plate: String,
    vehicle_uf: Option<Uf>,
    drivers: Vec<Cpf>,
    insurers: Vec<TaxpayerId>,
    contracting: Vec<TaxpayerId>,
    cte_keys: Vec<AccessKey>,
    nfe_keys: Vec<AccessKey>,
}

fn err(errors: &mut Vec<FieldError>, field: impl Into<String>, message: impl Into<String>) {
    errors.push(FieldError::new(field, message));
}

fn uf_field(errors: &mut Vec<FieldError>, field: &str, value: Option<&str>) -> Option<Uf> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => {
            err(errors, field, "is required");
            None
        }
        Some(v) => match Uf::parse(v) {
            Ok(uf) => Some(uf),
            Err(_) => {
                err(errors, field, format!("{v:?} is not a federative unit"));
                None
            }
        },
    }
}

fn municipality_field(errors: &mut Vec<FieldError>, field: String, code: &str) {
    if municipality_uf(code).is_none() {
        err(
            errors,
            field,
            "must be a 7-digit IBGE code starting with a valid UF code",
        );
    }
}

/// Check every field, collecting errors. Returns the resolved values only
/// when every required value resolved.
fn check(data: &ManifestData, errors: &mut Vec<FieldError>) -> Option<Checked> {
    // Issuer.
    let issuer = match TaxpayerId::new(data.issuer.taxpayer_id.as_str()) {
        Ok(TaxpayerId::Cnpj(cnpj)) => Some(cnpj),
        Ok(TaxpayerId::Cpf(_)) => {
            err(errors, "issuer.taxpayer_id", "MDF-e issuer must be a CNPJ");
            None
        }
        Err(_) => {
            err(errors, "issuer.taxpayer_id", "invalid CNPJ");
            None
        }
    };
    if data.issuer.name.trim().is_empty() {
        err(errors, "issuer.name", "is required");
    }
    let uf = uf_field(errors, "issuer.uf", Some(&data.issuer.uf));

    // Identification.
    if data.series > 999 {
        err(errors, "series", "must be at most 999");
    }
    if data.number == 0 || data.number > 999_999_999 {
        err(errors, "number", "must be between 1 and 999999999");
    }
    let numeric_code = match data.numeric_code.as_deref().map(str::trim) {
        None | Some("") => {
            err(errors, "numeric_code", "is required");
            None
        }
        Some(code) if code.len() == 8 && code.bytes().all(|b| b.is_ascii_digit()) => {
            Some(code.to_string())
        }
        Some(_) => {
            err(errors, "numeric_code", "must be 8 digits");
            None
        }
    };
    if data.emitted_at.is_none() {
        err(errors, "emitted_at", "is required");
    }

    // Route.
    let origin = uf_field(errors, "route.origin_uf", data.route.origin_uf.as_deref());
    let destination = uf_field(
        errors,
        "route.destination_uf",
        data.route.destination_uf.as_deref(),
    );
    let via: Vec<Uf> = data
        .route
        .via
        .iter()
        .enumerate()
        .filter_map(|(i, v)| uf_field(errors, &format!("route.via[{i}]"), Some(v)))
        .collect();

    // Localities and referenced documents.
    if data.loading.is_empty() {
        err(errors, "loading", "at least one loading municipality is required");
    }
    for (i, l) in data.loading.iter().enumerate() {
        municipality_field(errors, format!("loading[{i}].municipality_code"), &l.municipality_code);
        if l.name.trim().is_empty() {
            err(errors, format!("loading[{i}].name"), "is required");
        }
    }
    if data.unloading.is_empty() {
        err(errors, "unloading", "at least one unloading municipality is required");
    }
    let mut cte_keys = Vec::new();
    let mut nfe_keys = Vec::new();
    for (i, u) in data.unloading.iter().enumerate() {
        municipality_field(
            errors,
            format!("unloading[{i}].municipality_code"),
            &u.municipality_code,
        );
        if u.name.trim().is_empty() {
            err(errors, format!("unloading[{i}].name"), "is required");
        }
        if u.cte_keys.is_empty() && u.nfe_keys.is_empty() {
            err(
                errors,
                format!("unloading[{i}].documents"),
                "at least one CT-e or NF-e key is required",
            );
        }
        for (j, key) in u.cte_keys.iter().enumerate() {
            match AccessKey::new(key.as_str()).ok().filter(|_| is_cte_key(key)) {
                Some(key) => cte_keys.push(key),
                None => err(errors, format!("unloading[{i}].cte_keys[{j}]"), "not a valid CT-e key"),
            }
        }
        for (j, key) in u.nfe_keys.iter().enumerate() {
            match AccessKey::new(key.as_str()).ok().filter(|_| is_nfe_key(key)) {
                Some(key) => nfe_keys.push(key),
                None => err(errors, format!("unloading[{i}].nfe_keys[{j}]"), "not a valid NF-e key"),
            }
        }
    }

    // Vehicle and drivers.
    let plate: String = data
        .vehicle
        .plate
        .chars()
        .filter(|c| *c != '-' && !c.is_whitespace())
        .collect::<String>()
        .to_ascii_uppercase();
    if plate.len() != 7 || !plate.bytes().all(|b| b.is_ascii_alphanumeric()) {
        err(errors, "vehicle.plate", "must be 7 letters and digits");
    }
    if data.vehicle.tare_kg == 0 {
        err(errors, "vehicle.tare_kg", "must be positive");
    }
    let vehicle_uf = match data.vehicle.uf.as_deref() {
        Some(v) if !v.trim().is_empty() => uf_field(errors, "vehicle.uf", Some(v)),
        _ => None,
    };
    if data.drivers.is_empty() {
        err(errors, "drivers", "at least one driver is required");
    }
    let drivers: Vec<Cpf> = data
        .drivers
        .iter()
        .enumerate()
        .filter_map(|(i, d)| {
            if d.name.trim().is_empty() {
                err(errors, format!("drivers[{i}].name"), "is required");
            }
            match Cpf::new(d.cpf.as_str()) {
                Ok(cpf) => Some(cpf),
                Err(_) => {
                    err(errors, format!("drivers[{i}].cpf"), "invalid CPF");
                    None
                }
            }
        })
        .collect();

    // Other parties.
    let insurers: Vec<TaxpayerId> = data
        .insurers
        .iter()
        .enumerate()
        .filter_map(|(i, s)| {
            if s.policy.trim().is_empty() {
                err(errors, format!("insurers[{i}].policy"), "is required");
            }
            TaxpayerId::new(s.taxpayer_id.as_str())
                .map_err(|_| err(errors, format!("insurers[{i}].taxpayer_id"), "invalid CNPJ/CPF"))
                .ok()
        })
        .collect();
    let contracting: Vec<TaxpayerId> = data
        .contracting_parties
        .iter()
        .enumerate()
        .filter_map(|(i, id)| {
            TaxpayerId::new(id.as_str())
                .map_err(|_| err(errors, format!("contracting_parties[{i}]"), "invalid CNPJ/CPF"))
                .ok()
        })
        .collect();

    // Totals.
    if data.totals.value < Decimal::ZERO {
        err(errors, "totals.value", "must not be negative");
    }
    if data.totals.weight_kg < Decimal::ZERO {
        err(errors, "totals.weight_kg", "must not be negative");
    }

    Some(Checked {
        issuer: issuer?,
        uf: uf?,
        numeric_code: numeric_code?,
        emitted_at: data.emitted_at?,
        route: Route {
            origin: origin?,
            destination: destination?,
            via,
        },
        plate,
        vehicle_uf,
        drivers,
        insurers,
        contracting,
        cte_keys,
        nfe_keys,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ManifestData {
        ManifestData {
            issuer: IssuerData {
                taxpayer_id: "11.222.333/0001-81".into(),
                state_registration: "123456789".into(),
                name: "Transportes Exemplo Ltda".into(),
                uf: "SP".into(),
            },
            series: 1,
            number: 123,
            numeric_code: Some("00000001".into()),
            emission_type: EmissionType::Normal,
            emitted_at: Some(Timestamp::parse("2024-01-15T10:30:00Z").unwrap()),
            route: RouteData {
                origin_uf: Some("SP".into()),
                destination_uf: Some("PR".into()),
                via: vec![],
            },
            loading: vec![LocalityData {
                municipality_code: "3550308".into(),
                name: "Sao Paulo".into(),
            }],
            unloading: vec![UnloadingData {
                municipality_code: "4106902".into(),
                name: "Curitiba".into(),
                cte_keys: vec!["35240111222333000181570010000001231000000018".into()],
                nfe_keys: vec!["35240111222333000181550010000001231000000010".into()],
            }],
            vehicle: VehicleData {
                plate: "abc-1d23".into(),
                tare_kg: 8500,
                uf: Some("SP".into()),
                renavam: None,
            },
            drivers: vec![DriverData {
                name: "Maria Souza".into(),
                cpf: "529.982.247-25".into(),
            }],
            insurers: vec![InsurerData {
                taxpayer_id: "33000167000101".into(),
                name: "Seguradora Exemplo".into(),
                policy: "AP-0001".into(),
            }],
            contracting_parties: vec![],
            totals: CargoTotals {
                value: Decimal::new(1500050, 2),
                weight_kg: Decimal::new(12000, 0),
            },
        }
    }

    #[test]
    fn assembles_draft_with_payload() {
        let doc = DocumentAssembler::default().assemble(&sample()).unwrap();
        assert_eq!(doc.state(), ManifestState::Draft);
        assert!(doc.access_key().is_none());
        assert_eq!(doc.issuer().as_str(), "11222333000181");
        assert_eq!(doc.cte_keys().len(), 1);
        assert_eq!(doc.nfe_keys().len(), 1);

        let p = doc.payload();
        assert_eq!(p.get("ide", "cUF"), Some("35"));
        assert_eq!(p.get("ide", "mod"), Some("58"));
        assert_eq!(p.get("ide", "tpAmb"), Some("2"));
        assert_eq!(p.get("ide", "dhEmi"), Some("2024-01-15T10:30:00Z"));
        assert_eq!(p.get("ide", "UFFim"), Some("PR"));
        assert_eq!(p.get("veicTracao", "placa"), Some("ABC1D23"));
        assert_eq!(p.get("moto001", "CPF"), Some("52998224725"));
        assert_eq!(
            p.get("infCTe001001", "chCTe"),
            Some("35240111222333000181570010000001231000000018")
        );
        assert_eq!(p.get("tot", "vCarga"), Some("15000.50"));
        assert_eq!(p.get("tot", "qCarga"), Some("12000.0000"));
        assert_eq!(p.get("tot", "qCTe"), Some("1"));
    }

    #[test]
    fn payload_renders_ide_first() {
        let doc = DocumentAssembler::default().assemble(&sample()).unwrap();
        assert!(doc.payload().render().starts_with("[ide]\ncUF=35\n"));
    }

    #[test]
    fn collects_every_field_error() {
        let mut data = sample();
        data.issuer.taxpayer_id = "11.222.333/0001-80".into();
        data.unloading[0].cte_keys.push("35240111222333000181570010000001231000000019".into());
        data.totals.value = Decimal::new(-1, 0);
        data.route.origin_uf = None;
        let err = DocumentAssembler::default().assemble(&data).unwrap_err();
        assert!(err.has_field("issuer.taxpayer_id"));
        assert!(err.has_field("unloading[0].cte_keys[1]"));
        assert!(err.has_field("totals.value"));
        assert!(err.has_field("route.origin_uf"));
        assert_eq!(err.errors().len(), 4);
    }

    #[test]
    fn nfe_key_in_cte_list_is_rejected() {
        let mut data = sample();
        data.unloading[0].cte_keys = vec!["35240111222333000181550010000001231000000010".into()];
        let err = DocumentAssembler::default().assemble(&data).unwrap_err();
        assert!(err.has_field("unloading[0].cte_keys[0]"));
    }

    #[test]
    fn missing_numeric_code_is_not_generated() {
        let mut data = sample();
        data.numeric_code = None;
        let err = DocumentAssembler::default().assemble(&data).unwrap_err();
        assert!(err.has_field("numeric_code"));
    }

    #[test]
    fn missing_emission_instant_is_an_error() {
        let mut data = sample();
        data.emitted_at = None;
        let err = DocumentAssembler::default().assemble(&data).unwrap_err();
        assert!(err.has_field("emitted_at"));
    }

    #[test]
    fn cpf_issuer_is_rejected() {
        let mut data = sample();
        data.issuer.taxpayer_id = "52998224725".into();
        let err = DocumentAssembler::default().assemble(&data).unwrap_err();
        assert!(err.has_field("issuer.taxpayer_id"));
    }

    #[test]
    fn bad_driver_and_municipality() {
        let mut data = sample();
        data.drivers[0].cpf = "111.111.111-11".into();
        data.loading[0].municipality_code = "9950308".into();
        let err = DocumentAssembler::default().assemble(&data).unwrap_err();
        assert!(err.has_field("drivers[0].cpf"));
        assert!(err.has_field("loading[0].municipality_code"));
    }

    #[test]
    fn unloading_needs_a_document() {
        let mut data = sample();
        data.unloading[0].cte_keys.clear();
        data.unloading[0].nfe_keys.clear();
        let err = DocumentAssembler::default().assemble(&data).unwrap_err();
        assert!(err.has_field("unloading[0].documents"));
    }

    #[test]
    fn via_states_become_perc_sections() {
        let mut data = sample();
        data.route.via = vec!["MG".into(), "XX".into()];
        let err = DocumentAssembler::default().assemble(&data).unwrap_err();
        assert!(err.has_field("route.via[1]"));

        data.route.via.pop();
        let doc = DocumentAssembler::default().assemble(&data).unwrap();
        assert_eq!(doc.payload().get("PERC001", "UFPer"), Some("MG"));
        assert_eq!(doc.route().via, vec![Uf::MG]);
    }

    #[test]
    fn production_environment_code() {
        let doc = DocumentAssembler::new(Environment::Production)
            .assemble(&sample())
            .unwrap();
        assert_eq!(doc.payload().get("ide", "tpAmb"), Some("1"));
    }

    #[test]
    fn municipality_codes() {
        assert_eq!(municipality_uf("4106902"), Some(Uf::PR));
        assert_eq!(municipality_uf("3550308"), Some(Uf::SP));
        assert_eq!(municipality_uf("9950308"), None);
        assert_eq!(municipality_uf("410690"), None);
        assert_eq!(municipality_uf("41069O2"), None);
    }

    #[test]
    fn deserializes_from_json() {
        let json = serde_json::to_string(&sample()).unwrap();
        let back: ManifestData = serde_json::from_str(&json).unwrap();
        assert!(DocumentAssembler::default().assemble(&back).is_ok());
    }
}
