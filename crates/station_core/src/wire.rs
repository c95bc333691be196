//! Formas de evento do protocolo UDP do hub.
//!
//! O hub transmite um objeto JSON por datagrama, discriminado pelo campo
//! `type`. Os valores chegam em arrays posicionais compactos; as structs
//! daqui preservam essa forma posicional (tuplas e arrays de tamanho fixo),
//! de modo que qualquer divergência de aridade vira erro de deserialização
//! em vez de truncamento silencioso. Campos não documentados (`fs`,
//! `mqtt_stats`) são transportados sem interpretação.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Erros de decodificação de um datagrama.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("datagrama não é JSON válido: {0}")]
    InvalidJson(String),

    #[error("payload malformado para '{event_type}': {reason}")]
    MalformedPayload { event_type: String, reason: String },

    #[error("tipo de evento não suportado: {0}")]
    UnsupportedEventType(String),
}

impl DecodeError {
    /// Identificador estável do erro, usado como rótulo de métrica.
    pub fn kind(&self) -> &'static str {
        match self {
            DecodeError::InvalidJson(_) => "invalid_json",
            DecodeError::MalformedPayload { .. } => "malformed_payload",
            DecodeError::UnsupportedEventType(_) => "unsupported_event_type",
        }
    }
}

pub(crate) fn malformed(event_type: &str, reason: impl Into<String>) -> DecodeError {
    DecodeError::MalformedPayload {
        event_type: event_type.into(),
        reason: reason.into(),
    }
}

// ──────────────────────────────────────────────
// Eventos de chuva e raio
// ──────────────────────────────────────────────

/// `evt_precip` – início de precipitação.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RainStartEvent {
    pub serial_number: String,
    pub hub_sn: String,
    /// `[epoch_segundos]`
    pub evt: (i64,),
}

/// `evt_strike` – descarga atmosférica detectada.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightningStrikeEvent {
    pub serial_number: String,
    pub hub_sn: String,
    /// `[epoch_segundos, distância_km, energia]`
    pub evt: (i64, f64, f64),
}

// ──────────────────────────────────────────────
// Vento rápido
// ──────────────────────────────────────────────

/// `rapid_wind` – leitura de vento a cada ~3s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RapidWindEvent {
    pub serial_number: String,
    pub hub_sn: String,
    /// `[epoch_segundos, velocidade_mps, direção_graus]`
    pub ob: (i64, f64, f64),
}

// ──────────────────────────────────────────────
// Observação completa (obs_st)
// ──────────────────────────────────────────────

/// Uma linha posicional de `obs_st` com os 18 campos documentados.
///
/// Ordem: epoch, wind lull, wind avg, wind gust, direção do vento,
/// intervalo de amostragem do vento, pressão da estação, temperatura,
/// umidade relativa, iluminância, índice UV, radiação solar, chuva no
/// último minuto, código do tipo de precipitação, contagem de raios,
/// distância média dos raios, tensão da bateria, intervalo de reporte.
/// No formato atual do firmware qualquer campo pode vir `null`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawObservation(pub [Option<f64>; 18]);

/// `obs_st` – observação completa da estação.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TempestObservationEvent {
    pub serial_number: String,
    pub hub_sn: String,
    /// Historicamente uma linha por pacote, mas o decodificador aceita
    /// qualquer quantidade.
    pub obs: Vec<RawObservation>,
    pub firmware_revision: i64,
}

// ──────────────────────────────────────────────
// Status do hub e do dispositivo
// ──────────────────────────────────────────────

/// `hub_status` – diagnóstico do próprio hub (sem `hub_sn`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubStatusEvent {
    pub serial_number: String,
    /// Revisão de firmware como string (ex: "53")
    pub firmware_revision: String,
    pub uptime: i64,
    pub rssi: i64,
    pub timestamp: i64,
    /// Flags de reset separadas por vírgula (ex: "BOR,PIN,POR")
    pub reset_flags: String,
    pub seq: i64,
    /// Não documentado – transportado sem interpretação
    pub fs: [i64; 4],
    /// `[versão, reboots, erros_i2c, status_rádio, network_id]`
    pub radio_stats: [i64; 5],
    /// Não documentado – transportado sem interpretação
    pub mqtt_stats: [i64; 2],
}

/// `device_status` – diagnóstico de um sensor acoplado ao hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceStatusEvent {
    pub serial_number: String,
    pub hub_sn: String,
    pub timestamp: i64,
    pub uptime: i64,
    pub voltage: f64,
    pub firmware_revision: i64,
    pub rssi: i64,
    pub hub_rssi: i64,
    /// Bitmask de falha de sensores (9 bits documentados)
    pub sensor_status: u32,
    /// 1 = debug habilitado
    pub debug: u8,
}

// ──────────────────────────────────────────────
// União fechada + dispatch pelo discriminante
// ──────────────────────────────────────────────

/// Um evento como recebido do hub, já discriminado pelo campo `type`.
#[derive(Debug, Clone, PartialEq)]
pub enum WireEvent {
    RainStart(RainStartEvent),
    LightningStrike(LightningStrikeEvent),
    RapidWind(RapidWindEvent),
    TempestObservation(TempestObservationEvent),
    DeviceStatus(DeviceStatusEvent),
    HubStatus(HubStatusEvent),
}

impl WireEvent {
    /// Faz o parse de um datagrama UDP completo (JSON UTF-8).
    pub fn from_slice(data: &[u8]) -> Result<Self, DecodeError> {
        let value: Value =
            serde_json::from_slice(data).map_err(|e| DecodeError::InvalidJson(e.to_string()))?;
        Self::from_value(value)
    }

    /// Converte um JSON já parseado na variante correspondente.
    ///
    /// Único ponto de dispatch pelo discriminante `type`; tipos
    /// desconhecidos falham com [`DecodeError::UnsupportedEventType`].
    pub fn from_value(value: Value) -> Result<Self, DecodeError> {
        let event_type = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| malformed("?", "campo 'type' ausente ou não-string"))?
            .to_owned();

        let shape_err = |e: serde_json::Error| malformed(&event_type, e.to_string());

        match event_type.as_str() {
            "evt_precip" => serde_json::from_value(value)
                .map(WireEvent::RainStart)
                .map_err(shape_err),
            "evt_strike" => serde_json::from_value(value)
                .map(WireEvent::LightningStrike)
                .map_err(shape_err),
            "rapid_wind" => serde_json::from_value(value)
                .map(WireEvent::RapidWind)
                .map_err(shape_err),
            "obs_st" => serde_json::from_value(value)
                .map(WireEvent::TempestObservation)
                .map_err(shape_err),
            "device_status" => serde_json::from_value(value)
                .map(WireEvent::DeviceStatus)
                .map_err(shape_err),
            "hub_status" => serde_json::from_value(value)
                .map(WireEvent::HubStatus)
                .map_err(shape_err),
            _ => Err(DecodeError::UnsupportedEventType(event_type.clone())),
        }
    }

    /// Discriminante `type` original do evento.
    pub fn event_type(&self) -> &'static str {
        match self {
            WireEvent::RainStart(_) => "evt_precip",
            WireEvent::LightningStrike(_) => "evt_strike",
            WireEvent::RapidWind(_) => "rapid_wind",
            WireEvent::TempestObservation(_) => "obs_st",
            WireEvent::DeviceStatus(_) => "device_status",
            WireEvent::HubStatus(_) => "hub_status",
        }
    }

    /// Número de série do emissor (sensor ou hub).
    pub fn serial_number(&self) -> &str {
        match self {
            WireEvent::RainStart(e) => &e.serial_number,
            WireEvent::LightningStrike(e) => &e.serial_number,
            WireEvent::RapidWind(e) => &e.serial_number,
            WireEvent::TempestObservation(e) => &e.serial_number,
            WireEvent::DeviceStatus(e) => &e.serial_number,
            WireEvent::HubStatus(e) => &e.serial_number,
        }
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
