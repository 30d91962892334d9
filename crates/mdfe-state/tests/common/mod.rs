//! Shared fixtures for lifecycle integration tests.

#![allow(dead_code)]

use std::path::PathBuf;

use mdfe_core::{Cnpj, EmissionType, Timestamp, Uf};
use mdfe_gateway::{
    CertificateConfig, GatewayConfig, IssuerDefaults, MockGateway, MockHandle, SharedGateway,
};
use mdfe_state::{
    CargoTotals, DocumentAssembler, DriverData, InsurerData, IssuerData, LocalityData,
    ManifestData, ManifestDocument, ManifestLifecycle, RouteData, UnloadingData, VehicleData,
};
use rust_decimal::Decimal;

/// Key the mock signer composes for `sample_data()`.
pub const SAMPLE_KEY: &str = "35240111222333000181580010000001231000000011";
pub const ISSUER: &str = "11222333000181";

pub fn config() -> GatewayConfig {
    GatewayConfig::new(
        "acbrlib.ini",
        CertificateConfig {
            path: PathBuf::from("certificado.pfx"),
            password: "1234".into(),
        },
        IssuerDefaults {
            cnpj: Cnpj::new(ISSUER).unwrap(),
            uf: Uf::SP,
        },
    )
}

/// Lifecycle over a fresh mock gateway session.
pub fn lifecycle() -> (ManifestLifecycle, MockHandle) {
    let mock = MockGateway::new();
    let handle = mock.handle();
    let shared = SharedGateway::open(Box::new(mock), &config()).unwrap();
    (ManifestLifecycle::new(shared), handle)
}

pub fn sample_data() -> ManifestData {
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
            nfe_keys: vec![],
        }],
        vehicle: VehicleData {
            plate: "ABC1D23".into(),
            tare_kg: 8500,
            uf: Some("SP".into()),
            renavam: Some("00123456789".into()),
        },
        drivers: vec![DriverData {
            name: "Maria Souza".into(),
            cpf: "52998224725".into(),
        }],
        insurers: vec![InsurerData {
            taxpayer_id: "33000167000101".into(),
            name: "Seguradora Exemplo".into(),
            policy: "AP-0001".into(),
        }],
        contracting_parties: vec!["52998224725".into()],
        totals: CargoTotals {
            value: Decimal::new(1500050, 2),
            weight_kg: Decimal::new(12000, 0),
        },
    }
}

pub fn draft() -> ManifestDocument {
    DocumentAssembler::default().assemble(&sample_data()).unwrap()
}

pub fn draft_numbered(number: u32) -> ManifestDocument {
    let mut data = sample_data();
    data.number = number;
    DocumentAssembler::default().assemble(&data).unwrap()
}
