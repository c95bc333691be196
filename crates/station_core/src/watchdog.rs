//! Watchdog de expiração de séries métricas.
//!
//! Envolve um sink de gauges rotulados e registra o instante da última
//! observação por conjunto de rótulos. Uma varredura periódica remove do
//! sink toda série sem observação dentro do timeout, para que um sensor
//! que parou de reportar suma do dashboard em vez de aparecer congelado
//! no último valor.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::debug;

/// Conjunto de rótulos de uma série.
///
/// `BTreeMap` dá ordem canônica de chaves por construção: dois conjuntos
/// semanticamente iguais colidem na mesma entrada independente da ordem
/// de inserção.
pub type LabelSet = BTreeMap<String, String>;

/// Monta um [`LabelSet`] a partir de pares `(chave, valor)`.
pub fn label_set(pairs: &[(&str, &str)]) -> LabelSet {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Sink de gauges rotulados que o watchdog envolve.
pub trait GaugeSink: Send + Sync {
    fn set(&self, labels: &LabelSet, value: f64);
    fn remove(&self, labels: &LabelSet);
}

/// Envolve um [`GaugeSink`] com expiração por última observação.
///
/// `observe`/`forget` podem ser chamados concorrentemente entre si e com
/// a varredura; a mutação do mapa e do sink é atômica por conjunto de
/// rótulos (o mutex cobre as duas).
pub struct GaugeWatchdog<S: GaugeSink> {
    sink: S,
    timeout: Duration,
    last_seen: Mutex<HashMap<LabelSet, Instant>>,
}

impl<S: GaugeSink> GaugeWatchdog<S> {
    pub fn new(sink: S, timeout: Duration) -> Self {
        Self {
            sink,
            timeout,
            last_seen: Mutex::new(HashMap::new()),
        }
    }

    /// Registra `value` no sink e renova o relógio de expiração da série.
    pub fn observe(&self, labels: LabelSet, value: f64) {
        self.observe_at(labels, value, Instant::now());
    }

    fn observe_at(&self, labels: LabelSet, value: f64, now: Instant) {
        let mut seen = self.last_seen.lock().expect("mutex do watchdog envenenado");
        self.sink.set(&labels, value);
        seen.insert(labels, now);
    }

    /// Remove a série do mapa e do sink imediatamente, sem esperar a
    /// varredura (usado quando um campo vem ausente num pacote).
    pub fn forget(&self, labels: &LabelSet) {
        let mut seen = self.last_seen.lock().expect("mutex do watchdog envenenado");
        seen.remove(labels);
        self.sink.remove(labels);
    }

    /// Varre o mapa e remove toda série cujo último instante mais o
    /// timeout já passou.
    pub fn sweep(&self) {
        self.sweep_at(Instant::now());
    }

    fn sweep_at(&self, now: Instant) {
        let mut seen = self.last_seen.lock().expect("mutex do watchdog envenenado");
        seen.retain(|labels, last| {
            let expired = now.saturating_duration_since(*last) > self.timeout;
            if expired {
                debug!(?labels, "série expirada removida do sink");
                self.sink.remove(labels);
            }
            !expired
        });
    }

    /// Acesso ao sink envolvido.
    pub fn sink(&self) -> &S {
        &self.sink
    }
}

// ──────────────────────────────────────────────
// Thread de varredura compartilhada
// ──────────────────────────────────────────────

/// Alvo varrível pela thread de varredura.
pub trait Sweep: Send + Sync {
    fn sweep(&self);
}

impl<S: GaugeSink> Sweep for GaugeWatchdog<S> {
    fn sweep(&self) {
        GaugeWatchdog::sweep(self);
    }
}

/// Uma única thread que varre todos os watchdogs registrados num
/// intervalo fixo. O intervalo deve ser bem mais curto que o timeout
/// para limitar a latência de remoção.
pub struct WatchdogSweeper {
    interval: Duration,
    targets: Vec<Arc<dyn Sweep>>,
}

impl WatchdogSweeper {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            targets: Vec::new(),
        }
    }

    pub fn register(&mut self, target: Arc<dyn Sweep>) {
        self.targets.push(target);
    }

    /// Inicia a thread de varredura. Roda pela vida inteira do processo.
    pub fn spawn(self) {
        std::thread::Builder::new()
            .name("watchdog-sweeper".into())
            .spawn(move || loop {
                std::thread::sleep(self.interval);
                for target in &self.targets {
                    target.sweep();
                }
            })
            .expect("falha ao criar thread de varredura");
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default, Clone)]
    struct TestSink(Arc<Mutex<HashMap<LabelSet, f64>>>);

    impl TestSink {
        fn get(&self, labels: &LabelSet) -> Option<f64> {
            self.0.lock().unwrap().get(labels).copied()
        }

        fn len(&self) -> usize {
            self.0.lock().unwrap().len()
        }
    }

    impl GaugeSink for TestSink {
        fn set(&self, labels: &LabelSet, value: f64) {
            self.0.lock().unwrap().insert(labels.clone(), value);
        }

        fn remove(&self, labels: &LabelSet) {
            self.0.lock().unwrap().remove(labels);
        }
    }

    const TIMEOUT: Duration = Duration::from_secs(360);
    const TICK: Duration = Duration::from_millis(500);

    #[test]
    fn observe_sets_sink_value() {
        let watchdog = GaugeWatchdog::new(TestSink::default(), TIMEOUT);
        let labels = label_set(&[("serial_number", "X")]);
        watchdog.observe(labels.clone(), 5.0);
        assert_eq!(watchdog.sink().get(&labels), Some(5.0));
    }

    #[test]
    fn sweep_evicts_after_timeout() {
        let watchdog = GaugeWatchdog::new(TestSink::default(), TIMEOUT);
        let labels = label_set(&[("serial_number", "X")]);
        let start = Instant::now();

        watchdog.observe_at(labels.clone(), 5.0, start);
        watchdog.sweep_at(start + TIMEOUT);
        assert_eq!(watchdog.sink().get(&labels), Some(5.0), "dentro do timeout");

        watchdog.sweep_at(start + TIMEOUT + TICK);
        assert_eq!(watchdog.sink().get(&labels), None, "após o timeout");
    }

    #[test]
    fn observe_resets_eviction_clock() {
        let watchdog = GaugeWatchdog::new(TestSink::default(), TIMEOUT);
        let labels = label_set(&[("serial_number", "X")]);
        let start = Instant::now();

        watchdog.observe_at(labels.clone(), 5.0, start);
        watchdog.observe_at(labels.clone(), 6.0, start + TIMEOUT / 2);
        watchdog.sweep_at(start + TIMEOUT + TICK);
        assert_eq!(watchdog.sink().get(&labels), Some(6.0));

        watchdog.sweep_at(start + TIMEOUT + TIMEOUT / 2 + TICK);
        assert_eq!(watchdog.sink().get(&labels), None);
    }

    #[test]
    fn forget_removes_immediately() {
        let watchdog = GaugeWatchdog::new(TestSink::default(), TIMEOUT);
        let labels = label_set(&[("serial_number", "X")]);
        watchdog.observe(labels.clone(), 5.0);
        watchdog.forget(&labels);
        assert_eq!(watchdog.sink().get(&labels), None);

        // Série esquecida não reaparece na varredura
        watchdog.sweep_at(Instant::now() + TIMEOUT + TICK);
        assert_eq!(watchdog.sink().len(), 0);
    }

    #[test]
    fn label_order_is_canonical() {
        let watchdog = GaugeWatchdog::new(TestSink::default(), TIMEOUT);
        let a = label_set(&[("serial_number", "X"), ("sensor", "wind")]);
        let b = label_set(&[("sensor", "wind"), ("serial_number", "X")]);
        assert_eq!(a, b);

        watchdog.observe(a, 1.0);
        watchdog.observe(b.clone(), 2.0);
        assert_eq!(watchdog.sink().len(), 1);
        assert_eq!(watchdog.sink().get(&b), Some(2.0));
    }

    #[test]
    fn sweep_only_evicts_stale_series() {
        let watchdog = GaugeWatchdog::new(TestSink::default(), TIMEOUT);
        let old = label_set(&[("serial_number", "OLD")]);
        let fresh = label_set(&[("serial_number", "FRESH")]);
        let start = Instant::now();

        watchdog.observe_at(old.clone(), 1.0, start);
        watchdog.observe_at(fresh.clone(), 2.0, start + TIMEOUT);
        watchdog.sweep_at(start + TIMEOUT + TICK);

        assert_eq!(watchdog.sink().get(&old), None);
        assert_eq!(watchdog.sink().get(&fresh), Some(2.0));
    }

    #[test]
    fn concurrent_observes_on_disjoint_labels() {
        let watchdog = Arc::new(GaugeWatchdog::new(TestSink::default(), TIMEOUT));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let watchdog = watchdog.clone();
                std::thread::spawn(move || {
                    let labels = label_set(&[("serial_number", &format!("ST-{i}"))]);
                    for v in 0..100 {
                        watchdog.observe(labels.clone(), v as f64);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(watchdog.sink().len(), 8);
        for i in 0..8 {
            let labels = label_set(&[("serial_number", &format!("ST-{i}"))]);
            assert_eq!(watchdog.sink().get(&labels), Some(99.0));
        }
    }

    #[test]
    fn concurrent_observe_and_sweep_stay_consistent() {
        let watchdog = Arc::new(GaugeWatchdog::new(
            TestSink::default(),
            Duration::from_millis(1),
        ));
        let labels = label_set(&[("serial_number", "X")]);

        let sweeper = {
            let watchdog = watchdog.clone();
            std::thread::spawn(move || {
                for _ in 0..500 {
                    watchdog.sweep();
                }
            })
        };
        for v in 0..500 {
            watchdog.observe(labels.clone(), v as f64);
        }
        sweeper.join().unwrap();

        // Sink e mapa terminam consistentes: ou a série existe nos dois,
        // ou em nenhum
        let in_sink = watchdog.sink().get(&labels).is_some();
        let in_map = watchdog
            .last_seen
            .lock()
            .unwrap()
            .contains_key(&labels);
        assert_eq!(in_sink, in_map);
    }
}
