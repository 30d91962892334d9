//! # Mock Gateway
//!
//! In-process [`TransmissionGateway`] for tests and development. Behaves like
//! a homologation authority that authorizes everything:
//!
//! - `Sign` composes the access key from the loaded payload (`[ide]` and
//!   `[emit]` sections) and returns a signed document carrying it.
//! - `Send` answers "batch received" (103) with a fresh receipt.
//! - `QueryByReceipt` answers "batch processed" (104) with an authorization
//!   protocol (100) for the key sent under that receipt.
//! - `Cancel` and `Close` register the event (135). A closure whose
//!   municipality lies outside its UF is refused with 614.
//! - `QueryByKey` and `QueryOpenManifests` reflect what the mock has
//!   authorized, cancelled and closed.
//!
//! Any call can be scripted through a [`MockHandle`] with
//! [`MockHandle::respond_next`] or [`MockHandle::fail_next`]. Scripted
//! answers are returned as-is and bypass the default behavior.
//! [`MockHandle::fail_config_write`] fails the write of one configuration
//! entry, whichever position it has in the sequence.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use mdfe_core::{AccessKey, Cnpj, DocumentModel, EmissionType, KeyComponents, Uf};
use parking_lot::Mutex;

use crate::contract::{
    CancellationRequest, ClosureRequest, GatewayOperation, GatewayResponse, GatewayResult,
    TransmissionBatch, TransmissionGateway,
};
use crate::error::GatewayError;
use crate::response::AuthorityResponse;

/// Result code the mock uses for its own call-order failures.
pub const MOCK_STATE_ERROR: i32 = -10;

/// Authority status for a closure municipality outside the closure UF.
pub const CLOSURE_UF_MISMATCH: u16 = 614;

#[derive(Debug, Clone)]
enum Scripted {
    Respond(String),
    Fail(i32, String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyStatus {
    Authorized,
    Cancelled,
    Closed,
}

#[derive(Debug, Default)]
struct MockState {
    initialized: bool,
    config: BTreeMap<(String, String), String>,
    loaded: Option<String>,
    signed: Option<AccessKey>,
    calls: Vec<GatewayOperation>,
    payloads: Vec<String>,
    scripted: HashMap<GatewayOperation, VecDeque<Scripted>>,
    config_failures: HashMap<(String, String), (i32, String)>,
    receipts: HashMap<String, AccessKey>,
    keys: BTreeMap<String, (String, KeyStatus)>,
    sequence: u64,
    latency: Option<Duration>,
}

impl MockState {
    fn next_sequence(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }
}

/// Scripted in-memory gateway.
#[derive(Debug, Clone, Default)]
pub struct MockGateway {
    state: Arc<Mutex<MockState>>,
}

/// Inspection and scripting handle, shared with a [`MockGateway`].
#[derive(Debug, Clone)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> MockHandle {
        MockHandle {
            state: Arc::clone(&self.state),
        }
    }

    /// Record the call, honor latency and scripted answers.
    ///
    /// Returns `Ok(Some(body))` for a scripted response, `Ok(None)` when the
    /// default behavior should run.
    fn enter(&mut self, operation: GatewayOperation) -> GatewayResult<Option<String>> {
        let latency = {
            let mut state = self.state.lock();
            state.calls.push(operation);
            state.latency
        };
        if let Some(latency) = latency {
            std::thread::sleep(latency);
        }

        let mut state = self.state.lock();
        if !state.initialized && operation != GatewayOperation::Initialize {
            return Err(GatewayError::NotInitialized);
        }
        match state.scripted.get_mut(&operation).and_then(VecDeque::pop_front) {
            Some(Scripted::Respond(body)) => Ok(Some(body)),
            Some(Scripted::Fail(code, message)) => {
                Err(GatewayError::failure(operation, code, message))
            }
            None => Ok(None),
        }
    }

    fn respond(
        &mut self,
        operation: GatewayOperation,
        default: impl FnOnce(&mut MockState) -> GatewayResult<String>,
    ) -> GatewayResult<GatewayResponse> {
        let body = match self.enter(operation)? {
            Some(body) => body,
            None => {
                let mut state = self.state.lock();
                default(&mut *state)?
            }
        };
        Ok(GatewayResponse::new(operation, body))
    }
}

impl MockHandle {
    /// Every call received so far, in order.
    pub fn calls(&self) -> Vec<GatewayOperation> {
        self.state.lock().calls.clone()
    }

    pub fn call_count(&self, operation: GatewayOperation) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|op| **op == operation)
            .count()
    }

    /// Payloads passed to `LoadDocument`, in order.
    pub fn loaded_payloads(&self) -> Vec<String> {
        self.state.lock().payloads.clone()
    }

    pub fn config_value(&self, section: &str, key: &str) -> Option<String> {
        self.state
            .lock()
            .config
            .get(&(section.to_string(), key.to_string()))
            .cloned()
    }

    pub fn is_initialized(&self) -> bool {
        self.state.lock().initialized
    }

    /// Answer the next `operation` call with `body`.
    pub fn respond_next(&self, operation: GatewayOperation, body: impl Into<String>) {
        self.state
            .lock()
            .scripted
            .entry(operation)
            .or_default()
            .push_back(Scripted::Respond(body.into()));
    }

    /// Fail the next `operation` call with a non-zero result code.
    pub fn fail_next(&self, operation: GatewayOperation, code: i32, message: impl Into<String>) {
        self.state
            .lock()
            .scripted
            .entry(operation)
            .or_default()
            .push_back(Scripted::Fail(code, message.into()));
    }

    /// Fail the next write of `section`/`key`; other entries still succeed.
    pub fn fail_config_write(
        &self,
        section: &str,
        key: &str,
        code: i32,
        message: impl Into<String>,
    ) {
        self.state
            .lock()
            .config_failures
            .insert((section.to_string(), key.to_string()), (code, message.into()));
    }

    /// Sleep this long inside every call.
    pub fn set_latency(&self, latency: Duration) {
        self.state.lock().latency = Some(latency);
    }
}

impl TransmissionGateway for MockGateway {
    fn name(&self) -> &str {
        "MockGateway"
    }

    fn initialize(&mut self, _config_path: &str) -> GatewayResult<()> {
        self.enter(GatewayOperation::Initialize)?;
        let mut state = self.state.lock();
        if state.initialized {
            return Err(GatewayError::AlreadyInitialized);
        }
        state.initialized = true;
        Ok(())
    }

    fn finalize(&mut self) -> GatewayResult<()> {
        self.enter(GatewayOperation::Finalize)?;
        let mut state = self.state.lock();
        state.initialized = false;
        state.loaded = None;
        state.signed = None;
        Ok(())
    }

    fn config_read(&mut self, section: &str, key: &str) -> GatewayResult<String> {
        if let Some(body) = self.enter(GatewayOperation::ConfigRead)? {
            return Ok(body);
        }
        self.state
            .lock()
            .config
            .get(&(section.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| {
                GatewayError::failure(
                    GatewayOperation::ConfigRead,
                    MOCK_STATE_ERROR,
                    format!("unknown configuration key {section}.{key}"),
                )
            })
    }

    fn config_write(&mut self, section: &str, key: &str, value: &str) -> GatewayResult<()> {
        if self.enter(GatewayOperation::ConfigWrite)?.is_none() {
            let entry = (section.to_string(), key.to_string());
            let mut state = self.state.lock();
            if let Some((code, message)) = state.config_failures.remove(&entry) {
                return Err(GatewayError::failure(GatewayOperation::ConfigWrite, code, message));
            }
            state.config.insert(entry, value.to_string());
        }
        Ok(())
    }

    fn clear_documents(&mut self) -> GatewayResult<()> {
        if self.enter(GatewayOperation::ClearDocuments)?.is_none() {
            let mut state = self.state.lock();
            state.loaded = None;
            state.signed = None;
        }
        Ok(())
    }

    fn load_document(&mut self, payload: &str) -> GatewayResult<()> {
        self.enter(GatewayOperation::LoadDocument)?;
        let mut state = self.state.lock();
        state.payloads.push(payload.to_string());
        state.loaded = Some(payload.to_string());
        state.signed = None;
        Ok(())
    }

    fn validate(&mut self) -> GatewayResult<GatewayResponse> {
        self.respond(GatewayOperation::Validate, |state| {
            if state.loaded.is_none() {
                return Err(no_document(GatewayOperation::Validate));
            }
            Ok("<retValidacao><cStat>0</cStat><xMotivo>Documento valido</xMotivo></retValidacao>"
                .to_string())
        })
    }

    fn sign(&mut self) -> GatewayResult<GatewayResponse> {
        let response = self.respond(GatewayOperation::Sign, |state| {
            let payload = state
                .loaded
                .as_deref()
                .ok_or_else(|| no_document(GatewayOperation::Sign))?;
            let key = key_from_payload(payload).map_err(|message| {
                GatewayError::failure(GatewayOperation::Sign, MOCK_STATE_ERROR, message)
            })?;
            Ok(bodies::signed_document(&key))
        })?;
        let signed = AuthorityResponse::read(&response.body)
            .key
            .and_then(|key| AccessKey::new(key).ok());
        self.state.lock().signed = signed;
        Ok(response)
    }

    fn send(&mut self, batch: &TransmissionBatch) -> GatewayResult<GatewayResponse> {
        let batch = *batch;
        self.respond(GatewayOperation::Send, move |state| {
            let key = state.signed.clone().ok_or_else(|| {
                GatewayError::failure(
                    GatewayOperation::Send,
                    MOCK_STATE_ERROR,
                    "no signed document to send",
                )
            })?;
            let receipt = format!("35100{:010}", state.next_sequence());
            state.receipts.insert(receipt.clone(), key);
            tracing::trace!(%batch, %receipt, "mock batch received");
            Ok(bodies::batch_received(&receipt))
        })
    }

    fn query_by_key(&mut self, key: &AccessKey) -> GatewayResult<GatewayResponse> {
        let key = key.clone();
        self.respond(GatewayOperation::QueryByKey, move |state| {
            Ok(match state.keys.get(key.as_str()) {
                Some((protocol, KeyStatus::Authorized)) => bodies::authorized(&key, protocol),
                Some((_, KeyStatus::Cancelled)) => {
                    bodies::situation(101, "Cancelamento de MDF-e homologado", &key)
                }
                Some((_, KeyStatus::Closed)) => {
                    bodies::situation(132, "Encerramento de MDF-e homologado", &key)
                }
                None => bodies::situation(217, "Rejeicao: MDF-e nao consta na base de dados", &key),
            })
        })
    }

    fn query_by_receipt(&mut self, receipt: &str) -> GatewayResult<GatewayResponse> {
        let receipt = receipt.to_string();
        self.respond(GatewayOperation::QueryByReceipt, move |state| {
            let Some(key) = state.receipts.get(&receipt).cloned() else {
                return Ok(bodies::envelope(
                    "retConsReciMDFe",
                    106,
                    "Rejeicao: Lote nao localizado",
                ));
            };
            let protocol = match state.keys.get(key.as_str()) {
                Some((protocol, _)) => protocol.clone(),
                None => {
                    let protocol = format!("9{:014}", state.next_sequence());
                    state
                        .keys
                        .insert(key.as_str().to_string(), (protocol.clone(), KeyStatus::Authorized));
                    protocol
                }
            };
            Ok(bodies::batch_authorized(&key, &protocol))
        })
    }

    fn cancel(&mut self, request: &CancellationRequest) -> GatewayResult<GatewayResponse> {
        let key = request.key.clone();
        self.respond(GatewayOperation::Cancel, move |state| {
            let protocol = format!("9{:014}", state.next_sequence());
            if let Some(entry) = state.keys.get_mut(key.as_str()) {
                entry.1 = KeyStatus::Cancelled;
            }
            Ok(bodies::event_registered(bodies::CANCELLATION_EVENT, &protocol))
        })
    }

    fn close(&mut self, request: &ClosureRequest) -> GatewayResult<GatewayResponse> {
        let key = request.key.clone();
        let uf_code = request.uf.code().to_string();
        let municipality = request.municipality_code.clone();
        self.respond(GatewayOperation::Close, move |state| {
            if !municipality.starts_with(&uf_code) {
                return Ok(bodies::event(
                    CLOSURE_UF_MISMATCH,
                    "Rejeicao: Codigo do Municipio diverge da UF de encerramento",
                    bodies::CLOSURE_EVENT,
                    None,
                ));
            }
            let protocol = format!("9{:014}", state.next_sequence());
            if let Some(entry) = state.keys.get_mut(key.as_str()) {
                entry.1 = KeyStatus::Closed;
            }
            Ok(bodies::event_registered(bodies::CLOSURE_EVENT, &protocol))
        })
    }

    fn query_open_manifests(&mut self, issuer: &Cnpj) -> GatewayResult<GatewayResponse> {
        let issuer = issuer.clone();
        self.respond(GatewayOperation::QueryOpenManifests, move |state| {
            let open: Vec<(String, String)> = state
                .keys
                .iter()
                .filter(|(key, (_, status))| {
                    *status == KeyStatus::Authorized && key[6..20] == *issuer.as_str()
                })
                .map(|(key, (protocol, _))| (key.clone(), protocol.clone()))
                .collect();
            Ok(bodies::open_manifests(&open))
        })
    }

    fn service_status(&mut self) -> GatewayResult<GatewayResponse> {
        self.respond(GatewayOperation::ServiceStatus, |_| {
            Ok(bodies::service_running())
        })
    }
}

fn no_document(operation: GatewayOperation) -> GatewayError {
    GatewayError::failure(operation, MOCK_STATE_ERROR, "no document loaded")
}

/// Compose the access key a signer would produce for `payload`.
fn key_from_payload(payload: &str) -> Result<AccessKey, String> {
    let sections = read_ini(payload);
    let get = |section: &str, key: &str| -> Result<&str, String> {
        sections
            .get(&(section.to_string(), key.to_string()))
            .map(String::as_str)
            .ok_or_else(|| format!("payload is missing [{section}] {key}"))
    };

    let uf = get("ide", "cUF")?
        .parse::<u8>()
        .ok()
        .and_then(Uf::from_code)
        .ok_or("invalid [ide] cUF")?;
    let emitted = get("ide", "dhEmi")?;
    if emitted.len() < 7 {
        return Err("invalid [ide] dhEmi".into());
    }
    let year_month = format!("{}{}", &emitted[2..4], &emitted[5..7]);
    let issuer = Cnpj::new(get("emit", "CNPJCPF")?).map_err(|e| e.to_string())?;
    let series = get("ide", "serie")?
        .parse()
        .map_err(|_| "invalid [ide] serie")?;
    let number = get("ide", "nMDF")?
        .parse()
        .map_err(|_| "invalid [ide] nMDF")?;
    let emission_type = get("ide", "tpEmis")?
        .parse::<u8>()
        .ok()
        .and_then(EmissionType::from_code)
        .ok_or("invalid [ide] tpEmis")?;

    KeyComponents {
        uf,
        year_month,
        issuer,
        model: DocumentModel::MDFe,
        series,
        number,
        emission_type,
        numeric_code: get("ide", "cMDF")?.to_string(),
    }
    .compose()
    .map_err(|e| e.to_string())
}

/// `[section]` / `key=value` text into a flat map.
fn read_ini(text: &str) -> HashMap<(String, String), String> {
    let mut out = HashMap::new();
    let mut section = String::new();
    for line in text.lines().map(str::trim) {
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            section = name.to_string();
        } else if let Some((key, value)) = line.split_once('=') {
            out.insert((section.clone(), key.trim().to_string()), value.trim().to_string());
        }
    }
    out
}

/// Authority-format response bodies, as the mock produces them.
pub mod bodies {
    use mdfe_core::AccessKey;

    /// `tpEvento` of the cancellation event.
    pub const CANCELLATION_EVENT: &str = "110111";
    /// `tpEvento` of the closure event.
    pub const CLOSURE_EVENT: &str = "110112";

    pub fn envelope(root: &str, status: u16, reason: &str) -> String {
        format!("<{root}><tpAmb>2</tpAmb><cStat>{status}</cStat><xMotivo>{reason}</xMotivo></{root}>")
    }

    pub fn signed_document(key: &AccessKey) -> String {
        format!(
            "<MDFe xmlns=\"http://www.portalfiscal.inf.br/mdfe\"><infMDFe Id=\"MDFe{key}\" \
             versao=\"3.00\"></infMDFe><Signature></Signature></MDFe>",
            key = key.as_str()
        )
    }

    pub fn batch_received(receipt: &str) -> String {
        format!(
            "<retEnviMDFe><tpAmb>2</tpAmb><cStat>103</cStat>\
             <xMotivo>Lote recebido com sucesso</xMotivo>\
             <infRec><nRec>{receipt}</nRec><tMed>1</tMed></infRec></retEnviMDFe>"
        )
    }

    /// Receipt query still being processed.
    pub fn batch_processing() -> String {
        envelope("retConsReciMDFe", 105, "Lote em processamento")
    }

    fn protocol_block(key: &AccessKey, status: u16, reason: &str, protocol: Option<&str>) -> String {
        let protocol = protocol
            .map(|p| format!("<nProt>{p}</nProt>"))
            .unwrap_or_default();
        format!(
            "<protMDFe versao=\"3.00\"><infProt><tpAmb>2</tpAmb><chMDFe>{key}</chMDFe>\
             <dhRecbto>2024-01-15T10:31:00-03:00</dhRecbto>{protocol}\
             <cStat>{status}</cStat><xMotivo>{reason}</xMotivo></infProt></protMDFe>",
            key = key.as_str()
        )
    }

    pub fn batch_authorized(key: &AccessKey, protocol: &str) -> String {
        format!(
            "<retConsReciMDFe><tpAmb>2</tpAmb><cStat>104</cStat><xMotivo>Lote processado</xMotivo>{}</retConsReciMDFe>",
            protocol_block(key, 100, "Autorizado o uso do MDF-e", Some(protocol))
        )
    }

    pub fn batch_rejected(key: &AccessKey, status: u16, reason: &str) -> String {
        format!(
            "<retConsReciMDFe><tpAmb>2</tpAmb><cStat>104</cStat><xMotivo>Lote processado</xMotivo>{}</retConsReciMDFe>",
            protocol_block(key, status, reason, None)
        )
    }

    /// Situation query for an authorized manifest.
    pub fn authorized(key: &AccessKey, protocol: &str) -> String {
        format!(
            "<retConsSitMDFe><tpAmb>2</tpAmb><cStat>100</cStat>\
             <xMotivo>Autorizado o uso do MDF-e</xMotivo>{}</retConsSitMDFe>",
            protocol_block(key, 100, "Autorizado o uso do MDF-e", Some(protocol))
        )
    }

    pub fn situation(status: u16, reason: &str, key: &AccessKey) -> String {
        format!(
            "<retConsSitMDFe><tpAmb>2</tpAmb><cStat>{status}</cStat><xMotivo>{reason}</xMotivo>\
             <chMDFe>{key}</chMDFe></retConsSitMDFe>",
            key = key.as_str()
        )
    }

    pub fn event_registered(event_type: &str, protocol: &str) -> String {
        event(135, "Evento registrado e vinculado a MDF-e", event_type, Some(protocol))
    }

    pub fn event(status: u16, reason: &str, event_type: &str, protocol: Option<&str>) -> String {
        let protocol = protocol
            .map(|p| format!("<nProt>{p}</nProt>"))
            .unwrap_or_default();
        format!(
            "<retEventoMDFe versao=\"3.00\"><infEvento><tpAmb>2</tpAmb><cStat>{status}</cStat>\
             <xMotivo>{reason}</xMotivo><tpEvento>{event_type}</tpEvento>{protocol}\
             </infEvento></retEventoMDFe>"
        )
    }

    /// Open-manifest query listing `(key, protocol)` pairs.
    pub fn open_manifests(open: &[(String, String)]) -> String {
        if open.is_empty() {
            return envelope("retConsMDFeNaoEnc", 112, "Consulta nao encontrou MDF-e nao encerrado");
        }
        let entries: String = open
            .iter()
            .map(|(key, protocol)| {
                format!("<infMDFe><chMDFe>{key}</chMDFe><nProt>{protocol}</nProt></infMDFe>")
            })
            .collect();
        format!(
            "<retConsMDFeNaoEnc><tpAmb>2</tpAmb><cStat>111</cStat>\
             <xMotivo>Consulta MDF-e nao encerrados localizou MDF-e</xMotivo>{entries}</retConsMDFeNaoEnc>"
        )
    }

    pub fn service_running() -> String {
        envelope("retConsStatServMDFe", 107, "Servico em Operacao")
    }
}
