//! # Native Library Adapter
//!
//! The production fiscal library exposes a C-style surface: every call takes
//! its string arguments, writes its textual result into a caller-supplied
//! fixed buffer, reports the full result length through an in/out size
//! parameter, and returns an integer result code. When the result does not
//! fit, the complete text is fetched with a follow-up "last return" call.
//!
//! [`NativeLibrary`] models that surface one-to-one. [`NativeGateway`] is the
//! only code that knows about buffer sizing; it translates every call into a
//! [`GatewayResponse`] or a [`GatewayError::Failure`].
//!
//! The native handle is process-wide: at most one [`NativeGateway`] may be
//! initialized at a time. A second `initialize` fails with
//! [`GatewayError::AlreadyInitialized`] until the first is finalized.

use std::sync::atomic::{AtomicBool, Ordering};

use mdfe_core::{AccessKey, Cnpj};

use crate::contract::{
    CancellationRequest, ClosureRequest, GatewayOperation, GatewayResponse, GatewayResult,
    TransmissionBatch, TransmissionGateway,
};
use crate::error::GatewayError;

/// Initial result buffer size handed to the library.
pub const DEFAULT_BUFFER_LEN: usize = 16 * 1024;

/// Set while a native handle is initialized in this process.
static NATIVE_HANDLE_LIVE: AtomicBool = AtomicBool::new(false);

/// One call into the native library, with its string arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeCall<'a> {
    ConfigRead {
        section: &'a str,
        key: &'a str,
    },
    ConfigWrite {
        section: &'a str,
        key: &'a str,
        value: &'a str,
    },
    ClearDocuments,
    LoadDocument {
        payload: &'a str,
    },
    Validate,
    Sign,
    Send {
        batch: u64,
        synchronous: bool,
    },
    QueryByKey {
        key: &'a str,
    },
    QueryByReceipt {
        receipt: &'a str,
    },
    Cancel {
        key: &'a str,
        justification: &'a str,
        issuer_cnpj: &'a str,
        batch: u64,
    },
    Close {
        key: &'a str,
        protocol: &'a str,
        closed_on: &'a str,
        uf: u8,
        municipality_code: &'a str,
        issuer_cnpj: &'a str,
    },
    QueryOpenManifests {
        issuer_cnpj: &'a str,
    },
    ServiceStatus,
}

impl NativeCall<'_> {
    pub fn operation(&self) -> GatewayOperation {
        match self {
            Self::ConfigRead { .. } => GatewayOperation::ConfigRead,
            Self::ConfigWrite { .. } => GatewayOperation::ConfigWrite,
            Self::ClearDocuments => GatewayOperation::ClearDocuments,
            Self::LoadDocument { .. } => GatewayOperation::LoadDocument,
            Self::Validate => GatewayOperation::Validate,
            Self::Sign => GatewayOperation::Sign,
            Self::Send { .. } => GatewayOperation::Send,
            Self::QueryByKey { .. } => GatewayOperation::QueryByKey,
            Self::QueryByReceipt { .. } => GatewayOperation::QueryByReceipt,
            Self::Cancel { .. } => GatewayOperation::Cancel,
            Self::Close { .. } => GatewayOperation::Close,
            Self::QueryOpenManifests { .. } => GatewayOperation::QueryOpenManifests,
            Self::ServiceStatus => GatewayOperation::ServiceStatus,
        }
    }
}

/// Raw call surface of the native fiscal library.
///
/// `buffer` receives at most `buffer.len()` bytes of the result; `size` is
/// set to the full result length, which may exceed the buffer. The return
/// value is the library's result code (`0` = success); on failure the buffer
/// holds the diagnostic message.
pub trait NativeLibrary: Send {
    fn initialize(&mut self, config_path: &str) -> i32;

    fn finalize(&mut self) -> i32;

    fn call(&mut self, call: NativeCall<'_>, buffer: &mut [u8], size: &mut usize) -> i32;

    /// Re-read the complete result of the previous call.
    fn last_return(&mut self, buffer: &mut [u8], size: &mut usize) -> i32;
}

/// [`TransmissionGateway`] over a [`NativeLibrary`].
pub struct NativeGateway<L: NativeLibrary> {
    library: L,
    buffer_len: usize,
    initialized: bool,
}

impl<L: NativeLibrary> NativeGateway<L> {
    pub fn new(library: L) -> Self {
        Self::with_buffer_len(library, DEFAULT_BUFFER_LEN)
    }

    pub fn with_buffer_len(library: L, buffer_len: usize) -> Self {
        Self {
            library,
            buffer_len: buffer_len.max(1),
            initialized: false,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Issue one call and turn the buffer/size/code triple into a result.
    fn invoke(&mut self, call: NativeCall<'_>) -> GatewayResult<String> {
        if !self.initialized {
            return Err(GatewayError::NotInitialized);
        }
        let operation = call.operation();
        let mut buffer = vec![0u8; self.buffer_len];
        let mut size = buffer.len();
        let code = self.library.call(call, &mut buffer, &mut size);
        let text = self.collect(operation, buffer, size);
        tracing::debug!(%operation, code, size, "native gateway call");
        if code != 0 {
            let message = match text {
                Ok(text) => text,
                Err(GatewayError::Failure { message, .. }) => message,
                Err(e) => e.to_string(),
            };
            return Err(GatewayError::failure(operation, code, message));
        }
        text
    }

    /// Decode the buffer, fetching the full text when it was truncated.
    /// A truncated result that cannot be re-read is a failure, never a
    /// partial body.
    fn collect(
        &mut self,
        operation: GatewayOperation,
        buffer: Vec<u8>,
        size: usize,
    ) -> GatewayResult<String> {
        if size <= buffer.len() {
            return Ok(String::from_utf8_lossy(&buffer[..size]).into_owned());
        }
        let mut full = vec![0u8; size];
        let mut full_size = size;
        let code = self.library.last_return(&mut full, &mut full_size);
        if code != 0 || full_size > full.len() {
            tracing::warn!(%operation, code, size, "native last-return failed on a truncated result");
            return Err(GatewayError::failure(
                operation,
                if code != 0 { code } else { -1 },
                format!(
                    "result of {size} bytes exceeded the {}-byte buffer and could not be re-read",
                    buffer.len()
                ),
            ));
        }
        Ok(String::from_utf8_lossy(&full[..full_size]).into_owned())
    }

    fn last_message(&mut self, operation: GatewayOperation) -> String {
        let mut buffer = vec![0u8; self.buffer_len];
        let mut size = buffer.len();
        if self.library.last_return(&mut buffer, &mut size) != 0 {
            return String::new();
        }
        self.collect(operation, buffer, size).unwrap_or_default()
    }

    fn respond(&mut self, call: NativeCall<'_>) -> GatewayResult<GatewayResponse> {
        let operation = call.operation();
        self.invoke(call).map(|body| GatewayResponse::new(operation, body))
    }
}

impl<L: NativeLibrary> TransmissionGateway for NativeGateway<L> {
    fn name(&self) -> &str {
        "NativeGateway"
    }

    fn initialize(&mut self, config_path: &str) -> GatewayResult<()> {
        if self.initialized
            || NATIVE_HANDLE_LIVE
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
        {
            return Err(GatewayError::AlreadyInitialized);
        }
        let code = self.library.initialize(config_path);
        if code != 0 {
            NATIVE_HANDLE_LIVE.store(false, Ordering::Release);
            let message = self.last_message(GatewayOperation::Initialize);
            return Err(GatewayError::failure(
                GatewayOperation::Initialize,
                code,
                message,
            ));
        }
        self.initialized = true;
        tracing::info!(config_path, "native gateway initialized");
        Ok(())
    }

    fn finalize(&mut self) -> GatewayResult<()> {
        if !self.initialized {
            return Err(GatewayError::NotInitialized);
        }
        let code = self.library.finalize();
        if code != 0 {
            let message = self.last_message(GatewayOperation::Finalize);
            return Err(GatewayError::failure(GatewayOperation::Finalize, code, message));
        }
        self.initialized = false;
        NATIVE_HANDLE_LIVE.store(false, Ordering::Release);
        tracing::info!("native gateway finalized");
        Ok(())
    }

    fn config_read(&mut self, section: &str, key: &str) -> GatewayResult<String> {
        self.invoke(NativeCall::ConfigRead { section, key })
    }

    fn config_write(&mut self, section: &str, key: &str, value: &str) -> GatewayResult<()> {
        self.invoke(NativeCall::ConfigWrite {
            section,
            key,
            value,
        })
        .map(|_| ())
    }

    fn clear_documents(&mut self) -> GatewayResult<()> {
        self.invoke(NativeCall::ClearDocuments).map(|_| ())
    }

    fn load_document(&mut self, payload: &str) -> GatewayResult<()> {
        self.invoke(NativeCall::LoadDocument { payload }).map(|_| ())
    }

    fn validate(&mut self) -> GatewayResult<GatewayResponse> {
        self.respond(NativeCall::Validate)
    }

    fn sign(&mut self) -> GatewayResult<GatewayResponse> {
        self.respond(NativeCall::Sign)
    }

    fn send(&mut self, batch: &TransmissionBatch) -> GatewayResult<GatewayResponse> {
        self.respond(NativeCall::Send {
            batch: batch.id(),
            synchronous: false,
        })
    }

    fn query_by_key(&mut self, key: &AccessKey) -> GatewayResult<GatewayResponse> {
        self.respond(NativeCall::QueryByKey { key: key.as_str() })
    }

    fn query_by_receipt(&mut self, receipt: &str) -> GatewayResult<GatewayResponse> {
        self.respond(NativeCall::QueryByReceipt { receipt })
    }

    fn cancel(&mut self, request: &CancellationRequest) -> GatewayResult<GatewayResponse> {
        self.respond(NativeCall::Cancel {
            key: request.key.as_str(),
            justification: &request.justification,
            issuer_cnpj: request.issuer.as_str(),
            batch: request.batch.id(),
        })
    }

    fn close(&mut self, request: &ClosureRequest) -> GatewayResult<GatewayResponse> {
        let closed_on = request.closed_on.format("%Y-%m-%d").to_string();
        self.respond(NativeCall::Close {
            key: request.key.as_str(),
            protocol: &request.protocol,
            closed_on: &closed_on,
            uf: request.uf.code(),
            municipality_code: &request.municipality_code,
            issuer_cnpj: request.issuer.as_str(),
        })
    }

    fn query_open_manifests(&mut self, issuer: &Cnpj) -> GatewayResult<GatewayResponse> {
        self.respond(NativeCall::QueryOpenManifests {
            issuer_cnpj: issuer.as_str(),
        })
    }

    fn service_status(&mut self) -> GatewayResult<GatewayResponse> {
        self.respond(NativeCall::ServiceStatus)
    }
}

impl<L: NativeLibrary> Drop for NativeGateway<L> {
    fn drop(&mut self) {
        if self.initialized {
            if let Err(e) = self.finalize() {
                tracing::warn!(error = %e, "native gateway finalize on drop failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Native handle tests share the process-wide flag.
    static SERIAL: Mutex<()> = Mutex::new(());

    /// Fake library that answers every call with a fixed text and code, and
    /// writes results the way the native convention does.
    struct FakeLibrary {
        init_code: i32,
        code: i32,
        result: String,
        last: String,
        last_code: i32,
        calls: Vec<String>,
    }

    impl FakeLibrary {
        fn answering(code: i32, result: &str) -> Self {
            Self {
                init_code: 0,
                code,
                result: result.to_string(),
                last: String::new(),
                last_code: 0,
                calls: Vec::new(),
            }
        }

        fn write(text: &str, buffer: &mut [u8], size: &mut usize) {
            let bytes = text.as_bytes();
            let n = bytes.len().min(buffer.len());
            buffer[..n].copy_from_slice(&bytes[..n]);
            *size = bytes.len();
        }
    }

    impl NativeLibrary for FakeLibrary {
        fn initialize(&mut self, _config_path: &str) -> i32 {
            self.last = "falha ao carregar configuracao".into();
            self.init_code
        }

        fn finalize(&mut self) -> i32 {
            0
        }

        fn call(&mut self, call: NativeCall<'_>, buffer: &mut [u8], size: &mut usize) -> i32 {
            self.calls.push(format!("{call:?}"));
            self.last = self.result.clone();
            Self::write(&self.result, buffer, size);
            self.code
        }

        fn last_return(&mut self, buffer: &mut [u8], size: &mut usize) -> i32 {
            if self.last_code != 0 {
                *size = 0;
                return self.last_code;
            }
            Self::write(&self.last, buffer, size);
            0
        }
    }

    #[test]
    fn calls_before_initialize_fail() {
        let mut gw = NativeGateway::new(FakeLibrary::answering(0, "ok"));
        assert!(matches!(gw.service_status(), Err(GatewayError::NotInitialized)));
    }

    #[test]
    fn native_handle_lifecycle() {
        let _serial = SERIAL.lock();

        // Success path, result fits in the buffer.
        let mut gw = NativeGateway::new(FakeLibrary::answering(0, "<cStat>107</cStat>"));
        gw.initialize("lib.ini").unwrap();
        assert!(gw.is_initialized());
        let resp = gw.service_status().unwrap();
        assert_eq!(resp.body, "<cStat>107</cStat>");
        assert_eq!(resp.operation, GatewayOperation::ServiceStatus);

        // Only one live handle per process.
        let mut second = NativeGateway::new(FakeLibrary::answering(0, ""));
        assert!(matches!(
            second.initialize("lib.ini"),
            Err(GatewayError::AlreadyInitialized)
        ));

        gw.finalize().unwrap();
        assert!(!gw.is_initialized());

        // Released: a new handle can initialize, and drop finalizes it.
        second.initialize("lib.ini").unwrap();
        drop(second);
        let mut third = NativeGateway::new(FakeLibrary::answering(0, ""));
        third.initialize("lib.ini").unwrap();
        third.finalize().unwrap();
    }

    #[test]
    fn truncated_result_is_fetched_in_full() {
        let _serial = SERIAL.lock();
        let long = "x".repeat(100);
        let mut gw = NativeGateway::with_buffer_len(FakeLibrary::answering(0, &long), 8);
        gw.initialize("lib.ini").unwrap();
        let resp = gw.sign().unwrap();
        assert_eq!(resp.body.len(), 100);
        gw.finalize().unwrap();
    }

    #[test]
    fn truncated_result_without_last_return_fails() {
        let _serial = SERIAL.lock();
        let long = format!("<retEnviMDFe>{}</retEnviMDFe>", "x".repeat(100));
        let mut library = FakeLibrary::answering(0, &long);
        library.last_code = -2;
        let mut gw = NativeGateway::with_buffer_len(library, 16);
        gw.initialize("lib.ini").unwrap();

        match gw.send(&TransmissionBatch::new(1).unwrap()).unwrap_err() {
            GatewayError::Failure {
                operation,
                code,
                message,
            } => {
                assert_eq!(operation, GatewayOperation::Send);
                assert_eq!(code, -2);
                assert!(message.contains("16-byte buffer"), "{message}");
                assert!(!message.contains("<retEnviMDFe>"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // A failing call keeps its own code even when its message is lost.
        gw.library.code = 7;
        let err = gw.sign().unwrap_err();
        assert_eq!(err.code(), Some(7));
        gw.finalize().unwrap();
    }

    #[test]
    fn non_zero_code_becomes_failure_with_message() {
        let _serial = SERIAL.lock();
        let mut gw = NativeGateway::new(FakeLibrary::answering(5, "Rejeicao: certificado vencido"));
        gw.initialize("lib.ini").unwrap();
        let err = gw.sign().unwrap_err();
        match err {
            GatewayError::Failure {
                operation,
                code,
                message,
            } => {
                assert_eq!(operation, GatewayOperation::Sign);
                assert_eq!(code, 5);
                assert!(message.contains("certificado vencido"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        gw.finalize().unwrap();
    }

    #[test]
    fn failed_initialize_releases_the_handle() {
        let _serial = SERIAL.lock();
        let mut lib = FakeLibrary::answering(0, "");
        lib.init_code = -1;
        let mut gw = NativeGateway::new(lib);
        let err = gw.initialize("missing.ini").unwrap_err();
        assert_eq!(err.code(), Some(-1));
        assert!(err.to_string().contains("falha ao carregar"));

        let mut other = NativeGateway::new(FakeLibrary::answering(0, ""));
        other.initialize("lib.ini").unwrap();
        other.finalize().unwrap();
    }

    #[test]
    fn close_passes_formatted_date_and_uf() {
        let _serial = SERIAL.lock();
        let mut gw = NativeGateway::new(FakeLibrary::answering(0, "<cStat>135</cStat>"));
        gw.initialize("lib.ini").unwrap();
        let request = ClosureRequest {
            key: AccessKey::new("35240111222333000181580010000001231000000011").unwrap(),
            protocol: "935240000000001".into(),
            closed_on: chrono::NaiveDate::from_ymd_opt(2024, 1, 20).unwrap(),
            uf: mdfe_core::Uf::PR,
            municipality_code: "4106902".into(),
            issuer: Cnpj::new("11222333000181").unwrap(),
        };
        gw.close(&request).unwrap();
        let call = gw.library.calls.last().unwrap();
        assert!(call.contains("closed_on: \"2024-01-20\""), "{call}");
        assert!(call.contains("uf: 41"), "{call}");
        assert!(call.contains("municipality_code: \"4106902\""), "{call}");
        gw.finalize().unwrap();
    }
}
