//! Eventos decodificados com campos nomeados.
//!
//! Contraparte nomeada de cada forma posicional de [`crate::wire`]. Um
//! evento decodificado é criado por pacote, entregue ao adaptador de
//! métricas e descartado; nunca é persistido nem mutado.

use serde::{Deserialize, Serialize};

// ──────────────────────────────────────────────
// Chuva, raio e vento
// ──────────────────────────────────────────────

/// Início de precipitação (`evt_precip`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RainStartDecoded {
    pub serial_number: String,
    pub hub_sn: String,
    /// Epoch em segundos
    pub timestamp: i64,
}

/// Descarga atmosférica (`evt_strike`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightningStrikeDecoded {
    pub serial_number: String,
    pub hub_sn: String,
    /// Epoch em segundos
    pub time: i64,
    /// Distância estimada (km)
    pub distance_km: f64,
    pub energy: f64,
}

/// Leitura rápida de vento (`rapid_wind`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RapidWindDecoded {
    pub serial_number: String,
    pub hub_sn: String,
    /// Epoch em segundos
    pub time: i64,
    /// Velocidade (m/s)
    pub speed_mps: f64,
    /// Direção (graus)
    pub direction_deg: f64,
}

// ──────────────────────────────────────────────
// Observação completa
// ──────────────────────────────────────────────

/// Tipo de precipitação reportado em `obs_st`.
///
/// `Error` cobre código fora da faixa documentada (ou ausente) no formato
/// atual do firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrecipitationType {
    None,
    Rain,
    Hail,
    Error,
}

impl PrecipitationType {
    /// Código numérico do wire correspondente.
    pub fn as_code(self) -> i64 {
        match self {
            PrecipitationType::None => 0,
            PrecipitationType::Rain => 1,
            PrecipitationType::Hail => 2,
            PrecipitationType::Error => 3,
        }
    }
}

/// Uma observação de `obs_st` com campos nomeados.
///
/// No formato atual do firmware qualquer campo pode estar ausente
/// (`None`); `null` nunca é convertido em zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Epoch em segundos
    pub time: Option<f64>,
    /// Vento mínimo no intervalo (m/s)
    pub wind_lull: Option<f64>,
    /// Vento médio (m/s)
    pub wind_avg: Option<f64>,
    /// Rajada máxima (m/s)
    pub wind_gust: Option<f64>,
    /// Direção do vento (graus)
    pub wind_direction: Option<f64>,
    /// Intervalo de amostragem do vento (s)
    pub wind_sample_interval: Option<f64>,
    /// Pressão da estação (mbar)
    pub station_pressure: Option<f64>,
    /// Temperatura do ar (°C)
    pub air_temperature: Option<f64>,
    /// Umidade relativa (%)
    pub relative_humidity: Option<f64>,
    /// Iluminância (lux)
    pub illuminance: Option<f64>,
    /// Índice UV
    pub uv_index: Option<f64>,
    /// Radiação solar (W/m²)
    pub solar_radiation: Option<f64>,
    /// Chuva no último minuto (mm)
    pub rain_amount: Option<f64>,
    pub precipitation_type: PrecipitationType,
    /// Contagem de raios no intervalo
    pub lightning_count: Option<f64>,
    /// Distância média dos raios (km)
    pub lightning_avg_distance: Option<f64>,
    /// Tensão da bateria (V)
    pub battery_volts: Option<f64>,
    /// Intervalo de reporte (min)
    pub report_interval: Option<f64>,
}

/// Observação completa da estação (`obs_st`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TempestObservationDecoded {
    pub serial_number: String,
    pub hub_sn: String,
    pub firmware_revision: i64,
    /// Uma entrada por linha do pacote, na ordem original
    pub observations: Vec<Observation>,
}

// ──────────────────────────────────────────────
// Status do dispositivo
// ──────────────────────────────────────────────

/// Flags de falha de sensores de `device_status`, já corrigidas conforme
/// a opção de inversão.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorStatus {
    /// Verdadeiro sse a máscara corrigida é exatamente zero
    pub sensors_ok: bool,
    pub lightning_sensor_failed: bool,
    pub lightning_sensor_noise: bool,
    pub lightning_sensor_disturbance: bool,
    pub pressure_sensor_failed: bool,
    pub temperature_sensor_failed: bool,
    pub humidity_sensor_failed: bool,
    pub wind_sensor_failed: bool,
    pub precipitation_sensor_failed: bool,
    pub light_uv_sensor_failed: bool,
}

impl SensorStatus {
    /// Os nove bits documentados, do LSB ao bit 8, com nome estável para
    /// emissão de métricas.
    pub fn flags(&self) -> [(&'static str, bool); 9] {
        [
            ("lightning_failed", self.lightning_sensor_failed),
            ("lightning_noise", self.lightning_sensor_noise),
            ("lightning_disturbance", self.lightning_sensor_disturbance),
            ("pressure_failed", self.pressure_sensor_failed),
            ("temperature_failed", self.temperature_sensor_failed),
            ("humidity_failed", self.humidity_sensor_failed),
            ("wind_failed", self.wind_sensor_failed),
            ("precipitation_failed", self.precipitation_sensor_failed),
            ("light_uv_failed", self.light_uv_sensor_failed),
        ]
    }
}

/// Diagnóstico de um sensor acoplado (`device_status`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceStatusDecoded {
    pub serial_number: String,
    pub hub_sn: String,
    pub timestamp: i64,
    pub uptime: i64,
    pub voltage: f64,
    pub firmware_revision: i64,
    pub rssi: i64,
    pub hub_rssi: i64,
    pub sensor_status: SensorStatus,
    pub debug_enabled: bool,
}

// ──────────────────────────────────────────────
// Status do hub
// ──────────────────────────────────────────────

/// Flags de reset do hub, expandidas da string separada por vírgulas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetFlags {
    /// Brownout reset
    pub bor: bool,
    /// PIN reset
    pub pin: bool,
    /// Power-on reset
    pub por: bool,
    /// Software reset
    pub sft: bool,
    /// Watchdog reset
    pub wdg: bool,
    /// Window watchdog reset
    pub wwd: bool,
    /// Low-power reset
    pub lpw: bool,
}

impl ResetFlags {
    /// As sete flags conhecidas com nome estável para emissão de métricas.
    pub fn flags(&self) -> [(&'static str, bool); 7] {
        [
            ("BOR", self.bor),
            ("PIN", self.pin),
            ("POR", self.por),
            ("SFT", self.sft),
            ("WDG", self.wdg),
            ("WWD", self.wwd),
            ("LPW", self.lpw),
        ]
    }
}

/// Estado do rádio do hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RadioStatus {
    Off,
    On,
    Active,
}

impl RadioStatus {
    /// Código do wire para o estado. O código `2` não tem estado
    /// correspondente e decodifica como `None`.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(RadioStatus::Off),
            1 => Some(RadioStatus::On),
            3 => Some(RadioStatus::Active),
            _ => None,
        }
    }

    pub fn as_code(self) -> i64 {
        match self {
            RadioStatus::Off => 0,
            RadioStatus::On => 1,
            RadioStatus::Active => 3,
        }
    }
}

/// Estatísticas do rádio de `hub_status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadioStats {
    pub version: i64,
    pub reboot_count: i64,
    pub i2c_bus_error_count: i64,
    pub status: Option<RadioStatus>,
    pub network_id: i64,
}

/// Diagnóstico do hub (`hub_status`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubStatusDecoded {
    pub serial_number: String,
    pub firmware_revision: String,
    pub uptime: i64,
    pub rssi: i64,
    pub timestamp: i64,
    pub reset_flags: ResetFlags,
    pub seq: i64,
    /// Não documentado – transportado sem interpretação
    pub fs: [i64; 4],
    pub radio_stats: RadioStats,
    /// Não documentado – transportado sem interpretação
    pub mqtt_stats: [i64; 2],
}

// ──────────────────────────────────────────────
// União fechada
// ──────────────────────────────────────────────

/// Um evento decodificado, pronto para emissão de métricas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DecodedEvent {
    RainStart(RainStartDecoded),
    LightningStrike(LightningStrikeDecoded),
    RapidWind(RapidWindDecoded),
    TempestObservation(TempestObservationDecoded),
    DeviceStatus(DeviceStatusDecoded),
    HubStatus(HubStatusDecoded),
}

impl DecodedEvent {
    /// Discriminante `type` original, preservado do wire.
    pub fn event_type(&self) -> &'static str {
        match self {
            DecodedEvent::RainStart(_) => "evt_precip",
            DecodedEvent::LightningStrike(_) => "evt_strike",
            DecodedEvent::RapidWind(_) => "rapid_wind",
            DecodedEvent::TempestObservation(_) => "obs_st",
            DecodedEvent::DeviceStatus(_) => "device_status",
            DecodedEvent::HubStatus(_) => "hub_status",
        }
    }

    /// Número de série do emissor (sensor ou hub).
    pub fn serial_number(&self) -> &str {
        match self {
            DecodedEvent::RainStart(e) => &e.serial_number,
            DecodedEvent::LightningStrike(e) => &e.serial_number,
            DecodedEvent::RapidWind(e) => &e.serial_number,
            DecodedEvent::TempestObservation(e) => &e.serial_number,
            DecodedEvent::DeviceStatus(e) => &e.serial_number,
            DecodedEvent::HubStatus(e) => &e.serial_number,
        }
    }
}
