//! Decodificação de eventos: forma posicional → campos nomeados.
//!
//! Função pura sobre a entrada, sem I/O nem estado compartilhado; segura
//! para chamar de qualquer thread. O mapeamento índice-posicional ↔ nome
//! de campo de `obs_st` vive inteiro em [`Observation::from_raw`] /
//! [`Observation::to_raw`], independente da camada JSON.

use serde::{Deserialize, Serialize};

use crate::decoded::{
    DecodedEvent, DeviceStatusDecoded, HubStatusDecoded, LightningStrikeDecoded, Observation,
    PrecipitationType, RadioStats, RadioStatus, RainStartDecoded, RapidWindDecoded, ResetFlags,
    SensorStatus, TempestObservationDecoded,
};
use crate::wire::{
    malformed, DecodeError, DeviceStatusEvent, HubStatusEvent, LightningStrikeEvent,
    RainStartEvent, RapidWindEvent, RawObservation, TempestObservationEvent, WireEvent,
};

/// Máscara dos 9 bits documentados de `sensor_status`.
const SENSOR_STATUS_MASK: u32 = 0b1_1111_1111;

/// Formato do wire emitido pelo hub.
///
/// Firmwares antigos exigem todos os campos de `obs_st` presentes;
/// os atuais podem emitir `null` campo a campo.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    Legacy,
    #[default]
    Nullable,
}

/// Opções de decodificação, escolhidas por deployment via `config.toml`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeOptions {
    /// Formato do wire: `nullable` (firmware atual) ou `legacy`
    pub wire_format: WireFormat,
    /// O hub reporta os bits de `sensor_status` invertidos em relação à
    /// documentação do protocolo; o XOR contra a máscara de 9 bits
    /// restaura a semântica documentada. Firmwares sem essa inversão
    /// devem desligar a correção.
    pub correct_sensor_inversion: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            wire_format: WireFormat::Nullable,
            correct_sensor_inversion: true,
        }
    }
}

/// Decodifica um [`WireEvent`] no [`DecodedEvent`] correspondente.
///
/// O discriminante `type` é preservado; ver [`DecodedEvent::event_type`].
pub fn decode_event(event: WireEvent, opts: &DecodeOptions) -> Result<DecodedEvent, DecodeError> {
    match event {
        WireEvent::RainStart(e) => Ok(DecodedEvent::RainStart(decode_rain_start(e))),
        WireEvent::LightningStrike(e) => {
            Ok(DecodedEvent::LightningStrike(decode_lightning_strike(e)))
        }
        WireEvent::RapidWind(e) => Ok(DecodedEvent::RapidWind(decode_rapid_wind(e))),
        WireEvent::TempestObservation(e) => {
            decode_observation_event(e, opts).map(DecodedEvent::TempestObservation)
        }
        WireEvent::DeviceStatus(e) => Ok(DecodedEvent::DeviceStatus(decode_device_status(e, opts))),
        WireEvent::HubStatus(e) => Ok(DecodedEvent::HubStatus(decode_hub_status(e))),
    }
}

// ──────────────────────────────────────────────
// Variantes triviais
// ──────────────────────────────────────────────

fn decode_rain_start(e: RainStartEvent) -> RainStartDecoded {
    let (timestamp,) = e.evt;
    RainStartDecoded {
        serial_number: e.serial_number,
        hub_sn: e.hub_sn,
        timestamp,
    }
}

fn decode_lightning_strike(e: LightningStrikeEvent) -> LightningStrikeDecoded {
    let (time, distance_km, energy) = e.evt;
    LightningStrikeDecoded {
        serial_number: e.serial_number,
        hub_sn: e.hub_sn,
        time,
        distance_km,
        energy,
    }
}

fn decode_rapid_wind(e: RapidWindEvent) -> RapidWindDecoded {
    let (time, speed_mps, direction_deg) = e.ob;
    RapidWindDecoded {
        serial_number: e.serial_number,
        hub_sn: e.hub_sn,
        time,
        speed_mps,
        direction_deg,
    }
}

// ──────────────────────────────────────────────
// obs_st
// ──────────────────────────────────────────────

fn decode_observation_event(
    e: TempestObservationEvent,
    opts: &DecodeOptions,
) -> Result<TempestObservationDecoded, DecodeError> {
    // Todas as linhas presentes, na ordem original
    let observations = e
        .obs
        .iter()
        .map(|row| Observation::from_raw(row, opts.wire_format))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(TempestObservationDecoded {
        serial_number: e.serial_number,
        hub_sn: e.hub_sn,
        firmware_revision: e.firmware_revision,
        observations,
    })
}

impl Observation {
    /// Mapeia uma linha posicional de `obs_st` nos campos nomeados.
    ///
    /// No formato `legacy` qualquer campo `null` é payload malformado;
    /// `null` nunca vira zero.
    pub fn from_raw(raw: &RawObservation, format: WireFormat) -> Result<Self, DecodeError> {
        if format == WireFormat::Legacy {
            if let Some(pos) = raw.0.iter().position(Option::is_none) {
                return Err(malformed(
                    "obs_st",
                    format!("campo posicional {pos} é null no formato legacy"),
                ));
            }
        }

        let [time, wind_lull, wind_avg, wind_gust, wind_direction, wind_sample_interval, station_pressure, air_temperature, relative_humidity, illuminance, uv_index, solar_radiation, rain_amount, precipitation_code, lightning_count, lightning_avg_distance, battery_volts, report_interval] =
            raw.0;

        Ok(Observation {
            time,
            wind_lull,
            wind_avg,
            wind_gust,
            wind_direction,
            wind_sample_interval,
            station_pressure,
            air_temperature,
            relative_humidity,
            illuminance,
            uv_index,
            solar_radiation,
            rain_amount,
            precipitation_type: precipitation_from_code(precipitation_code, format)?,
            lightning_count,
            lightning_avg_distance,
            battery_volts,
            report_interval,
        })
    }

    /// Reconstrói a linha posicional a partir dos campos nomeados.
    pub fn to_raw(&self) -> RawObservation {
        RawObservation([
            self.time,
            self.wind_lull,
            self.wind_avg,
            self.wind_gust,
            self.wind_direction,
            self.wind_sample_interval,
            self.station_pressure,
            self.air_temperature,
            self.relative_humidity,
            self.illuminance,
            self.uv_index,
            self.solar_radiation,
            self.rain_amount,
            Some(self.precipitation_type.as_code() as f64),
            self.lightning_count,
            self.lightning_avg_distance,
            self.battery_volts,
            self.report_interval,
        ])
    }
}

fn precipitation_from_code(
    code: Option<f64>,
    format: WireFormat,
) -> Result<PrecipitationType, DecodeError> {
    let known = code.and_then(|c| {
        if c == 0.0 {
            Some(PrecipitationType::None)
        } else if c == 1.0 {
            Some(PrecipitationType::Rain)
        } else if c == 2.0 {
            Some(PrecipitationType::Hail)
        } else {
            Option::None
        }
    });

    match format {
        // Código fora da faixa (ou ausente) é estado reportável, não erro
        WireFormat::Nullable => Ok(known.unwrap_or(PrecipitationType::Error)),
        WireFormat::Legacy => known.ok_or_else(|| {
            malformed(
                "obs_st",
                format!("código de precipitação inválido no formato legacy: {code:?}"),
            )
        }),
    }
}

// ──────────────────────────────────────────────
// device_status
// ──────────────────────────────────────────────

fn decode_device_status(e: DeviceStatusEvent, opts: &DecodeOptions) -> DeviceStatusDecoded {
    DeviceStatusDecoded {
        serial_number: e.serial_number,
        hub_sn: e.hub_sn,
        timestamp: e.timestamp,
        uptime: e.uptime,
        voltage: e.voltage,
        firmware_revision: e.firmware_revision,
        rssi: e.rssi,
        hub_rssi: e.hub_rssi,
        sensor_status: SensorStatus::from_raw(e.sensor_status, opts.correct_sensor_inversion),
        debug_enabled: e.debug == 1,
    }
}

impl SensorStatus {
    /// Expande a máscara de 9 bits nas flags nomeadas.
    ///
    /// Com `correct_inversion` a máscara crua é XOR-ada contra
    /// `0b1_1111_1111` antes dos testes de bit.
    pub fn from_raw(raw: u32, correct_inversion: bool) -> Self {
        let mask = if correct_inversion {
            (raw ^ SENSOR_STATUS_MASK) & SENSOR_STATUS_MASK
        } else {
            raw & SENSOR_STATUS_MASK
        };
        let bit = |n: u32| mask & (1 << n) != 0;

        SensorStatus {
            sensors_ok: mask == 0,
            lightning_sensor_failed: bit(0),
            lightning_sensor_noise: bit(1),
            lightning_sensor_disturbance: bit(2),
            pressure_sensor_failed: bit(3),
            temperature_sensor_failed: bit(4),
            humidity_sensor_failed: bit(5),
            wind_sensor_failed: bit(6),
            precipitation_sensor_failed: bit(7),
            light_uv_sensor_failed: bit(8),
        }
    }
}

// ──────────────────────────────────────────────
// hub_status
// ──────────────────────────────────────────────

fn decode_hub_status(e: HubStatusEvent) -> HubStatusDecoded {
    let [version, reboot_count, i2c_bus_error_count, status_code, network_id] = e.radio_stats;

    HubStatusDecoded {
        serial_number: e.serial_number,
        firmware_revision: e.firmware_revision,
        uptime: e.uptime,
        rssi: e.rssi,
        timestamp: e.timestamp,
        reset_flags: ResetFlags::from_wire(&e.reset_flags),
        seq: e.seq,
        fs: e.fs,
        radio_stats: RadioStats {
            version,
            reboot_count,
            i2c_bus_error_count,
            status: RadioStatus::from_code(status_code),
            network_id,
        },
        mqtt_stats: e.mqtt_stats,
    }
}

impl ResetFlags {
    /// Expande a string separada por vírgulas nas sete flags conhecidas.
    /// Tokens desconhecidos são ignorados – o campo carrega valores não
    /// documentados ao longo do tempo.
    pub fn from_wire(raw: &str) -> Self {
        let has = |flag: &str| raw.split(',').any(|token| token.trim() == flag);
        ResetFlags {
            bor: has("BOR"),
            pin: has("PIN"),
            por: has("POR"),
            sft: has("SFT"),
            wdg: has("WDG"),
            wwd: has("WWD"),
            lpw: has("LPW"),
        }
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_json(data: &[u8], opts: &DecodeOptions) -> Result<DecodedEvent, DecodeError> {
        decode_event(WireEvent::from_slice(data)?, opts)
    }

    fn sample_row() -> RawObservation {
        RawObservation([
            Some(1588948614.0),
            Some(0.18),
            Some(0.22),
            Some(0.27),
            Some(144.0),
            Some(6.0),
            Some(1017.57),
            Some(22.37),
            Some(50.26),
            Some(328.0),
            Some(0.03),
            Some(3.0),
            Some(0.0),
            Some(0.0),
            Some(0.0),
            Some(0.0),
            Some(2.41),
            Some(1.0),
        ])
    }

    #[test]
    fn type_tag_preserved_for_all_variants() {
        let opts = DecodeOptions::default();
        let samples: [&[u8]; 6] = [
            br#"{"serial_number":"SK-0","type":"evt_precip","hub_sn":"HB-0","evt":[1493322445]}"#,
            br#"{"serial_number":"AR-0","type":"evt_strike","hub_sn":"HB-0","evt":[1493322445,27,3848]}"#,
            br#"{"serial_number":"SK-0","type":"rapid_wind","hub_sn":"HB-0","ob":[1493322445,2.3,128]}"#,
            br#"{"serial_number":"ST-0","type":"obs_st","hub_sn":"HB-0","obs":[[1588948614,0.18,0.22,0.27,144,6,1017.57,22.37,50.26,328,0.03,3,0.0,0,0,0,2.41,1]],"firmware_revision":129}"#,
            br#"{"serial_number":"AR-0","type":"device_status","hub_sn":"HB-0","timestamp":1510855923,"uptime":2189,"voltage":3.5,"firmware_revision":17,"rssi":-17,"hub_rssi":-87,"sensor_status":0,"debug":0}"#,
            br#"{"serial_number":"HB-0","type":"hub_status","firmware_revision":"35","uptime":1670133,"rssi":-62,"timestamp":1495724691,"reset_flags":"BOR,PIN,POR","seq":48,"fs":[1,0,15675411,524288],"radio_stats":[2,1,0,3,2839],"mqtt_stats":[1,0]}"#,
        ];

        for data in samples {
            let wire = WireEvent::from_slice(data).unwrap();
            let expected = wire.event_type();
            let decoded = decode_event(wire, &opts).unwrap();
            assert_eq!(decoded.event_type(), expected);
        }
    }

    #[test]
    fn decodes_all_observation_rows_in_order() {
        let data = br#"{"serial_number":"ST-0","type":"obs_st","hub_sn":"HB-0","obs":[[1588948614,0.18,0.22,0.27,144,6,1017.57,22.37,50.26,328,0.03,3,0.0,0,0,0,2.41,1],[1588948674,0.20,0.25,0.30,150,6,1017.60,22.40,50.30,330,0.04,4,0.0,0,0,0,2.41,1]],"firmware_revision":129}"#;
        let decoded = decode_json(data, &DecodeOptions::default()).unwrap();
        match decoded {
            DecodedEvent::TempestObservation(e) => {
                assert_eq!(e.observations.len(), 2);
                assert_eq!(e.observations[0].time, Some(1588948614.0));
                assert_eq!(e.observations[1].time, Some(1588948674.0));
                assert_eq!(e.observations[1].air_temperature, Some(22.40));
            }
            other => panic!("variante errada: {other:?}"),
        }
    }

    #[test]
    fn null_field_stays_absent_in_nullable_format() {
        let mut row = sample_row();
        row.0[7] = None; // temperatura
        let obs = Observation::from_raw(&row, WireFormat::Nullable).unwrap();
        assert_eq!(obs.air_temperature, None);
        assert_eq!(obs.relative_humidity, Some(50.26));
    }

    #[test]
    fn legacy_format_rejects_null_field() {
        let mut row = sample_row();
        row.0[7] = None;
        assert!(matches!(
            Observation::from_raw(&row, WireFormat::Legacy),
            Err(DecodeError::MalformedPayload { event_type, .. }) if event_type == "obs_st"
        ));
    }

    #[test]
    fn precipitation_codes_map_to_known_kinds() {
        for (code, expected) in [
            (0.0, PrecipitationType::None),
            (1.0, PrecipitationType::Rain),
            (2.0, PrecipitationType::Hail),
        ] {
            let mut row = sample_row();
            row.0[13] = Some(code);
            let obs = Observation::from_raw(&row, WireFormat::Nullable).unwrap();
            assert_eq!(obs.precipitation_type, expected);
            let legacy = Observation::from_raw(&row, WireFormat::Legacy).unwrap();
            assert_eq!(legacy.precipitation_type, expected);
        }
    }

    #[test]
    fn out_of_range_precipitation_is_error_in_nullable_format() {
        for code in [Some(3.0), Some(17.0), None] {
            let mut row = sample_row();
            row.0[13] = code;
            let obs = Observation::from_raw(&row, WireFormat::Nullable).unwrap();
            assert_eq!(obs.precipitation_type, PrecipitationType::Error);
        }
    }

    #[test]
    fn legacy_format_rejects_out_of_range_precipitation() {
        let mut row = sample_row();
        row.0[13] = Some(3.0);
        assert!(matches!(
            Observation::from_raw(&row, WireFormat::Legacy),
            Err(DecodeError::MalformedPayload { .. })
        ));
    }

    #[test]
    fn observation_roundtrip_preserves_row() {
        let row = sample_row();
        let obs = Observation::from_raw(&row, WireFormat::Nullable).unwrap();
        assert_eq!(obs.to_raw(), row);

        let again = Observation::from_raw(&obs.to_raw(), WireFormat::Nullable).unwrap();
        assert_eq!(again, obs);
    }

    #[test]
    fn sensors_ok_raw_zero_with_correction_means_failure() {
        // Com a correção, máscara crua zero vira 0b1_1111_1111
        let status = SensorStatus::from_raw(0b0_0000_0000, true);
        assert!(!status.sensors_ok);
        assert!(status.lightning_sensor_failed);
        assert!(status.light_uv_sensor_failed);
    }

    #[test]
    fn sensors_ok_raw_zero_without_correction() {
        let status = SensorStatus::from_raw(0b0_0000_0000, false);
        assert!(status.sensors_ok);
        assert!(!status.lightning_sensor_failed);
    }

    #[test]
    fn corrected_single_bit_example() {
        // 0b000000001 corrigido → 0b111111110
        let status = SensorStatus::from_raw(0b0_0000_0001, true);
        assert!(!status.sensors_ok);
        assert!(!status.lightning_sensor_failed);
        assert!(status.lightning_sensor_noise);
        assert!(status.lightning_sensor_disturbance);
        assert!(status.pressure_sensor_failed);
        assert!(status.temperature_sensor_failed);
        assert!(status.humidity_sensor_failed);
        assert!(status.wind_sensor_failed);
        assert!(status.precipitation_sensor_failed);
        assert!(status.light_uv_sensor_failed);
    }

    #[test]
    fn sensor_bits_map_without_correction() {
        let status = SensorStatus::from_raw(0b1_0000_1000, false);
        assert!(!status.sensors_ok);
        assert!(status.pressure_sensor_failed);
        assert!(status.light_uv_sensor_failed);
        assert!(!status.wind_sensor_failed);
    }

    #[test]
    fn reset_flags_bor_sft() {
        let flags = ResetFlags::from_wire("BOR,SFT");
        assert!(flags.bor);
        assert!(!flags.pin);
        assert!(!flags.por);
        assert!(flags.sft);
        assert!(!flags.wdg);
        assert!(!flags.wwd);
        assert!(!flags.lpw);
    }

    #[test]
    fn reset_flags_ignore_unknown_tokens() {
        let flags = ResetFlags::from_wire("BOR,HRDFLT,SFT");
        assert!(flags.bor);
        assert!(flags.sft);
        assert_eq!(flags.flags().iter().filter(|(_, v)| *v).count(), 2);
    }

    #[test]
    fn reset_flags_empty_string_sets_none() {
        let flags = ResetFlags::from_wire("");
        assert!(flags.flags().iter().all(|(_, v)| !v));
    }

    #[test]
    fn radio_status_codes() {
        assert_eq!(RadioStatus::from_code(0), Some(RadioStatus::Off));
        assert_eq!(RadioStatus::from_code(1), Some(RadioStatus::On));
        assert_eq!(RadioStatus::from_code(3), Some(RadioStatus::Active));
        assert_eq!(RadioStatus::from_code(2), None);
        assert_eq!(RadioStatus::from_code(4), None);
    }

    #[test]
    fn hub_status_passes_undocumented_fields_through() {
        let data = br#"{"serial_number":"HB-0","type":"hub_status","firmware_revision":"35","uptime":1670133,"rssi":-62,"timestamp":1495724691,"reset_flags":"BOR,PIN,POR","seq":48,"fs":[1,0,15675411,524288],"radio_stats":[2,1,0,3,2839],"mqtt_stats":[1,0]}"#;
        let decoded = decode_json(data, &DecodeOptions::default()).unwrap();
        match decoded {
            DecodedEvent::HubStatus(e) => {
                assert_eq!(e.fs, [1, 0, 15675411, 524288]);
                assert_eq!(e.mqtt_stats, [1, 0]);
                assert_eq!(e.radio_stats.status, Some(RadioStatus::Active));
                assert_eq!(e.radio_stats.network_id, 2839);
                assert!(e.reset_flags.bor && e.reset_flags.pin && e.reset_flags.por);
                assert!(!e.reset_flags.sft);
            }
            other => panic!("variante errada: {other:?}"),
        }
    }

    #[test]
    fn device_status_debug_flag() {
        let data = br#"{"serial_number":"AR-0","type":"device_status","hub_sn":"HB-0","timestamp":1510855923,"uptime":2189,"voltage":3.5,"firmware_revision":17,"rssi":-17,"hub_rssi":-87,"sensor_status":0,"debug":1}"#;
        let decoded = decode_json(data, &DecodeOptions::default()).unwrap();
        match decoded {
            DecodedEvent::DeviceStatus(e) => {
                assert!(e.debug_enabled);
                assert_eq!(e.hub_rssi, -87);
            }
            other => panic!("variante errada: {other:?}"),
        }
    }

    #[test]
    fn default_options_apply_inversion_and_nullable_format() {
        let opts = DecodeOptions::default();
        assert_eq!(opts.wire_format, WireFormat::Nullable);
        assert!(opts.correct_sensor_inversion);
    }
}
