//! Thread de rede que escuta UDP, decodifica e envia eventos via channel.

use crossbeam_channel::{bounded, Receiver, Sender};
use station_core::decode::{decode_event, DecodeOptions};
use station_core::decoded::DecodedEvent;
use station_core::wire::WireEvent;
use std::net::UdpSocket;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::metrics::ListenerCounters;

/// Mensagem enviada da thread de rede para o loop de submissão.
#[derive(Debug, Clone)]
pub struct NetMessage {
    pub event: DecodedEvent,
    pub source_addr: String,
    pub raw_size: usize,
}

/// Inicia a thread de rede. Retorna o receiver do channel.
pub fn spawn_listener_thread(
    port: u16,
    bind_ip: String,
    options: DecodeOptions,
    counters: ListenerCounters,
) -> Receiver<NetMessage> {
    let (tx, rx) = bounded::<NetMessage>(64); // Buffer de 64 mensagens

    std::thread::Builder::new()
        .name("udp-listener".into())
        .spawn(move || {
            listener_loop(&tx, port, &bind_ip, &options, &counters);
        })
        .expect("falha ao criar thread de rede");

    rx
}

fn listener_loop(
    tx: &Sender<NetMessage>,
    port: u16,
    bind_ip: &str,
    options: &DecodeOptions,
    counters: &ListenerCounters,
) {
    let addr = if bind_ip.is_empty() {
        format!("0.0.0.0:{port}")
    } else {
        format!("{bind_ip}:{port}")
    };

    loop {
        match UdpSocket::bind(&addr) {
            Ok(sock) => {
                sock.set_read_timeout(Some(Duration::from_secs(1))).ok();
                info!("Listener escutando em {addr}");

                let mut buf = [0u8; 65536];
                loop {
                    match sock.recv_from(&mut buf) {
                        Ok((size, peer)) => {
                            counters.received.inc();
                            let source = peer.ip().to_string();

                            // Um pacote ruim nunca derruba o listener
                            match WireEvent::from_slice(&buf[..size])
                                .and_then(|wire| decode_event(wire, options))
                            {
                                Ok(event) => {
                                    let msg = NetMessage {
                                        event,
                                        source_addr: source,
                                        raw_size: size,
                                    };
                                    // Non-blocking send: se a submissão está
                                    // lenta, descarta pacotes antigos
                                    if tx.try_send(msg).is_err() {
                                        counters.count_drop("channel_full");
                                        debug!("Channel cheio, descartando pacote");
                                    }
                                }
                                Err(e) => {
                                    counters.count_drop(e.kind());
                                    debug!("Pacote inválido de {source}: {e}");
                                }
                            }
                        }
                        Err(ref e)
                            if e.kind() == std::io::ErrorKind::TimedOut
                                || e.kind() == std::io::ErrorKind::WouldBlock =>
                        {
                            // Timeout normal, continua
                        }
                        Err(e) => {
                            warn!("Erro ao receber UDP: {e}");
                        }
                    }
                }
            }
            Err(e) => {
                error!("Falha ao bind {addr}: {e}. Tentando novamente em 2s...");
                std::thread::sleep(Duration::from_secs(2));
            }
        }
    }
}
