//! Sink Prometheus com watchdog de expiração por série.
//!
//! Cada campo exportado vira um gauge rotulado por `serial_number`
//! envolvido num [`GaugeWatchdog`]; todos compartilham uma única thread
//! de varredura. Campo `null` num pacote remove a série em vez de
//! publicar um zero fabricado.

use prometheus::{Encoder, GaugeVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use station_core::decoded::{
    DecodedEvent, DeviceStatusDecoded, HubStatusDecoded, PrecipitationType,
    TempestObservationDecoded,
};
use station_core::watchdog::{label_set, GaugeSink, GaugeWatchdog, LabelSet, Sweep, WatchdogSweeper};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Adapta um [`GaugeVec`] do prometheus ao contrato [`GaugeSink`].
pub struct PrometheusGauge {
    vec: GaugeVec,
    label_names: &'static [&'static str],
}

impl PrometheusGauge {
    fn new(
        registry: &Registry,
        name: &str,
        help: &str,
        label_names: &'static [&'static str],
    ) -> Self {
        let vec = GaugeVec::new(Opts::new(name, help), label_names)
            .expect("nome de métrica inválido");
        registry
            .register(Box::new(vec.clone()))
            .expect("métrica duplicada no registry");
        Self { vec, label_names }
    }

    fn ordered<'a>(&self, labels: &'a LabelSet) -> Vec<&'a str> {
        self.label_names
            .iter()
            .map(|name| labels.get(*name).map(String::as_str).unwrap_or(""))
            .collect()
    }
}

impl GaugeSink for PrometheusGauge {
    fn set(&self, labels: &LabelSet, value: f64) {
        self.vec.with_label_values(&self.ordered(labels)).set(value);
    }

    fn remove(&self, labels: &LabelSet) {
        // Remover série inexistente não é erro
        let _ = self.vec.remove_label_values(&self.ordered(labels));
    }
}

type Watched = Arc<GaugeWatchdog<PrometheusGauge>>;

const SERIAL: &[&str] = &["serial_number"];
const SERIAL_SENSOR: &[&str] = &["serial_number", "sensor"];
const SERIAL_FLAG: &[&str] = &["serial_number", "flag"];

/// Contadores da thread de rede (sem watchdog – contadores só crescem).
#[derive(Clone)]
pub struct ListenerCounters {
    pub received: IntCounter,
    dropped: IntCounterVec,
}

impl ListenerCounters {
    pub fn count_drop(&self, reason: &str) {
        self.dropped.with_label_values(&[reason]).inc();
    }
}

struct MetricsBuilder {
    registry: Registry,
    timeout: Duration,
    targets: Vec<Arc<dyn Sweep>>,
}

impl MetricsBuilder {
    fn watched(&mut self, name: &str, help: &str, labels: &'static [&'static str]) -> Watched {
        let gauge = PrometheusGauge::new(&self.registry, name, help, labels);
        let watchdog = Arc::new(GaugeWatchdog::new(gauge, self.timeout));
        self.targets.push(watchdog.clone());
        watchdog
    }
}

/// Todos os gauges da estação, com expiração compartilhada.
pub struct StationMetrics {
    registry: Registry,
    sweep_targets: Vec<Arc<dyn Sweep>>,
    pub listener: ListenerCounters,

    // obs_st
    wind_lull: Watched,
    wind_avg: Watched,
    wind_gust: Watched,
    wind_direction: Watched,
    wind_sample_interval: Watched,
    station_pressure: Watched,
    air_temperature: Watched,
    relative_humidity: Watched,
    illuminance: Watched,
    uv: Watched,
    solar_radiation: Watched,
    rain_amount: Watched,
    precipitation_type: Watched,
    lightning_count: Watched,
    lightning_avg_distance: Watched,
    battery_volts: Watched,
    report_interval: Watched,

    // rapid_wind
    rapid_wind_speed: Watched,
    rapid_wind_direction: Watched,

    // evt_strike / evt_precip
    strike_distance: Watched,
    strike_energy: Watched,
    rain_start_timestamp: Watched,

    // device_status
    device_voltage: Watched,
    device_rssi: Watched,
    device_hub_rssi: Watched,
    device_uptime: Watched,
    device_sensors_ok: Watched,
    device_debug_enabled: Watched,
    device_sensor_fault: Watched,

    // hub_status
    hub_rssi: Watched,
    hub_uptime: Watched,
    hub_radio_reboots: Watched,
    hub_radio_i2c_errors: Watched,
    hub_radio_status: Watched,
    hub_reset_flag: Watched,
}

impl StationMetrics {
    pub fn new(timeout: Duration) -> Self {
        let registry = Registry::new();

        let received = IntCounter::new(
            "udp_packets_received_total",
            "Datagramas UDP recebidos do hub",
        )
        .expect("nome de métrica inválido");
        registry
            .register(Box::new(received.clone()))
            .expect("métrica duplicada no registry");

        let dropped = IntCounterVec::new(
            Opts::new(
                "udp_packets_dropped_total",
                "Datagramas descartados, por motivo",
            ),
            &["reason"],
        )
        .expect("nome de métrica inválido");
        registry
            .register(Box::new(dropped.clone()))
            .expect("métrica duplicada no registry");

        let mut b = MetricsBuilder {
            registry,
            timeout,
            targets: Vec::new(),
        };

        Self {
            // obs_st
            wind_lull: b.watched("wind_lull", "Vento mínimo no intervalo (m/s)", SERIAL),
            wind_avg: b.watched("wind_avg", "Vento médio (m/s)", SERIAL),
            wind_gust: b.watched("wind_gust", "Rajada máxima (m/s)", SERIAL),
            wind_direction: b.watched("wind_direction", "Direção do vento (graus)", SERIAL),
            wind_sample_interval: b.watched(
                "wind_sample_interval",
                "Intervalo de amostragem do vento (s)",
                SERIAL,
            ),
            station_pressure: b.watched("station_pressure", "Pressão da estação (mbar)", SERIAL),
            air_temperature: b.watched("air_temperature", "Temperatura do ar (°C)", SERIAL),
            relative_humidity: b.watched("relative_humidity", "Umidade relativa (%)", SERIAL),
            illuminance: b.watched("illuminance", "Iluminância (lux)", SERIAL),
            uv: b.watched("uv", "Índice UV", SERIAL),
            solar_radiation: b.watched("solar_radiation", "Radiação solar (W/m²)", SERIAL),
            rain_amount: b.watched("rain_amount", "Chuva no último minuto (mm)", SERIAL),
            precipitation_type: b.watched(
                "precipitation_type",
                "Tipo de precipitação (0=nenhuma, 1=chuva, 2=granizo)",
                SERIAL,
            ),
            lightning_count: b.watched("lightning_count", "Raios no intervalo", SERIAL),
            lightning_avg_distance: b.watched(
                "lightning_avg_distance",
                "Distância média dos raios (km)",
                SERIAL,
            ),
            battery_volts: b.watched("battery_volts", "Tensão da bateria (V)", SERIAL),
            report_interval: b.watched("report_interval", "Intervalo de reporte (min)", SERIAL),

            // rapid_wind
            rapid_wind_speed: b.watched(
                "rapid_wind_speed_mps",
                "Velocidade instantânea do vento (m/s)",
                SERIAL,
            ),
            rapid_wind_direction: b.watched(
                "rapid_wind_direction_degrees",
                "Direção instantânea do vento (graus)",
                SERIAL,
            ),

            // evt_strike / evt_precip
            strike_distance: b.watched(
                "lightning_strike_distance_km",
                "Distância da última descarga (km)",
                SERIAL,
            ),
            strike_energy: b.watched(
                "lightning_strike_energy",
                "Energia da última descarga",
                SERIAL,
            ),
            rain_start_timestamp: b.watched(
                "rain_start_timestamp_seconds",
                "Epoch do último início de precipitação",
                SERIAL,
            ),

            // device_status
            device_voltage: b.watched("device_voltage_volts", "Tensão do sensor (V)", SERIAL),
            device_rssi: b.watched("device_rssi_dbm", "RSSI do sensor (dBm)", SERIAL),
            device_hub_rssi: b.watched(
                "device_hub_rssi_dbm",
                "RSSI do hub visto pelo sensor (dBm)",
                SERIAL,
            ),
            device_uptime: b.watched("device_uptime_seconds", "Uptime do sensor (s)", SERIAL),
            device_sensors_ok: b.watched(
                "device_sensors_ok",
                "1 se nenhum sensor reporta falha",
                SERIAL,
            ),
            device_debug_enabled: b.watched(
                "device_debug_enabled",
                "1 se o modo debug está habilitado",
                SERIAL,
            ),
            device_sensor_fault: b.watched(
                "device_sensor_fault",
                "1 se o sensor nomeado reporta falha",
                SERIAL_SENSOR,
            ),

            // hub_status
            hub_rssi: b.watched("hub_rssi_dbm", "RSSI do hub (dBm)", SERIAL),
            hub_uptime: b.watched("hub_uptime_seconds", "Uptime do hub (s)", SERIAL),
            hub_radio_reboots: b.watched(
                "hub_radio_reboot_count",
                "Reboots do rádio do hub",
                SERIAL,
            ),
            hub_radio_i2c_errors: b.watched(
                "hub_radio_i2c_bus_error_count",
                "Erros do barramento I2C do rádio",
                SERIAL,
            ),
            hub_radio_status: b.watched(
                "hub_radio_status",
                "Estado do rádio (0=off, 1=on, 3=ativo)",
                SERIAL,
            ),
            hub_reset_flag: b.watched(
                "hub_reset_flag",
                "1 se a flag de reset nomeada está presente",
                SERIAL_FLAG,
            ),

            listener: ListenerCounters { received, dropped },
            sweep_targets: b.targets,
            registry: b.registry,
        }
    }

    /// Inicia a thread compartilhada de varredura dos watchdogs.
    pub fn spawn_sweeper(&self, interval: Duration) {
        let mut sweeper = WatchdogSweeper::new(interval);
        for target in &self.sweep_targets {
            sweeper.register(target.clone());
        }
        sweeper.spawn();
    }

    /// Envia um evento decodificado para os gauges correspondentes.
    pub fn submit(&self, event: &DecodedEvent) {
        match event {
            DecodedEvent::TempestObservation(e) => self.submit_observation(e),
            DecodedEvent::RapidWind(e) => {
                let labels = label_set(&[("serial_number", &e.serial_number)]);
                self.rapid_wind_speed.observe(labels.clone(), e.speed_mps);
                self.rapid_wind_direction.observe(labels, e.direction_deg);
            }
            DecodedEvent::LightningStrike(e) => {
                let labels = label_set(&[("serial_number", &e.serial_number)]);
                self.strike_distance.observe(labels.clone(), e.distance_km);
                self.strike_energy.observe(labels, e.energy);
            }
            DecodedEvent::RainStart(e) => {
                let labels = label_set(&[("serial_number", &e.serial_number)]);
                self.rain_start_timestamp.observe(labels, e.timestamp as f64);
            }
            DecodedEvent::DeviceStatus(e) => self.submit_device_status(e),
            DecodedEvent::HubStatus(e) => self.submit_hub_status(e),
        }
    }

    fn submit_observation(&self, e: &TempestObservationDecoded) {
        let labels = label_set(&[("serial_number", &e.serial_number)]);

        // Todas as linhas em ordem; a última vence nos gauges
        for obs in &e.observations {
            set_opt(&self.wind_lull, &labels, obs.wind_lull);
            set_opt(&self.wind_avg, &labels, obs.wind_avg);
            set_opt(&self.wind_gust, &labels, obs.wind_gust);
            set_opt(&self.wind_direction, &labels, obs.wind_direction);
            set_opt(
                &self.wind_sample_interval,
                &labels,
                obs.wind_sample_interval,
            );
            set_opt(&self.station_pressure, &labels, obs.station_pressure);
            set_opt(&self.air_temperature, &labels, obs.air_temperature);
            set_opt(&self.relative_humidity, &labels, obs.relative_humidity);
            set_opt(&self.illuminance, &labels, obs.illuminance);
            set_opt(&self.uv, &labels, obs.uv_index);
            set_opt(&self.solar_radiation, &labels, obs.solar_radiation);
            set_opt(&self.rain_amount, &labels, obs.rain_amount);
            set_opt(&self.lightning_count, &labels, obs.lightning_count);
            set_opt(
                &self.lightning_avg_distance,
                &labels,
                obs.lightning_avg_distance,
            );
            set_opt(&self.battery_volts, &labels, obs.battery_volts);
            set_opt(&self.report_interval, &labels, obs.report_interval);

            // Código fora da faixa não vira leitura fabricada
            if obs.precipitation_type == PrecipitationType::Error {
                self.precipitation_type.forget(&labels);
            } else {
                self.precipitation_type
                    .observe(labels.clone(), obs.precipitation_type.as_code() as f64);
            }
        }
    }

    fn submit_device_status(&self, e: &DeviceStatusDecoded) {
        let labels = label_set(&[("serial_number", &e.serial_number)]);
        self.device_voltage.observe(labels.clone(), e.voltage);
        self.device_rssi.observe(labels.clone(), e.rssi as f64);
        self.device_hub_rssi.observe(labels.clone(), e.hub_rssi as f64);
        self.device_uptime.observe(labels.clone(), e.uptime as f64);
        self.device_sensors_ok
            .observe(labels.clone(), bool_gauge(e.sensor_status.sensors_ok));
        self.device_debug_enabled
            .observe(labels, bool_gauge(e.debug_enabled));

        for (sensor, failed) in e.sensor_status.flags() {
            let labels = label_set(&[("serial_number", &e.serial_number), ("sensor", sensor)]);
            self.device_sensor_fault.observe(labels, bool_gauge(failed));
        }
    }

    fn submit_hub_status(&self, e: &HubStatusDecoded) {
        let labels = label_set(&[("serial_number", &e.serial_number)]);
        self.hub_rssi.observe(labels.clone(), e.rssi as f64);
        self.hub_uptime.observe(labels.clone(), e.uptime as f64);
        self.hub_radio_reboots
            .observe(labels.clone(), e.radio_stats.reboot_count as f64);
        self.hub_radio_i2c_errors
            .observe(labels.clone(), e.radio_stats.i2c_bus_error_count as f64);

        // Status nulo (código 2 ou fora da faixa) some do dashboard
        match e.radio_stats.status {
            Some(status) => self
                .hub_radio_status
                .observe(labels.clone(), status.as_code() as f64),
            None => self.hub_radio_status.forget(&labels),
        }

        for (flag, present) in e.reset_flags.flags() {
            let labels = label_set(&[("serial_number", &e.serial_number), ("flag", flag)]);
            self.hub_reset_flag.observe(labels, bool_gauge(present));
        }
    }

    /// Codifica o registry no formato de exposição textual.
    pub fn encode(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            warn!("Falha ao codificar métricas: {e}");
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

fn set_opt(gauge: &Watched, labels: &LabelSet, value: Option<f64>) {
    match value {
        Some(v) => gauge.observe(labels.clone(), v),
        // Campo null: a série some em vez de virar zero fabricado
        None => gauge.forget(labels),
    }
}

fn bool_gauge(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
