//! # Station Core
//!
//! Crate compartilhada do Estação: tipos do protocolo UDP do hub da
//! estação meteorológica, decodificador de eventos, watchdog de expiração
//! de séries métricas e configuração TOML.
//!
//! ## Módulos
//! - [`wire`] – Formas posicionais dos eventos como chegam do hub
//! - [`decoded`] – Eventos decodificados com campos nomeados
//! - [`decode`] – Decodificação posicional → nomeada (pura, sem I/O)
//! - [`watchdog`] – Expiração de séries por última observação
//! - [`config`] – Configuração unificada via TOML

pub mod config;
pub mod decode;
pub mod decoded;
pub mod watchdog;
pub mod wire;

// Re-exports convenientes
pub use config::AppConfig;
pub use decode::{decode_event, DecodeOptions, WireFormat};
pub use decoded::DecodedEvent;
pub use watchdog::{GaugeSink, GaugeWatchdog, LabelSet};
pub use wire::{DecodeError, WireEvent};
