//! Radio links for every node role.
//!
//! Short range: ESP-NOW broadcast over the WiFi radio.
//! Long range: a LoRa modem on UART1 driven with AT commands
//! (`AT+SEND=0,<len>,<data>` → `+OK`, inbound packets as `+RCV=...`).
//!
//! Both inbound paths are polled from the main loop; the ESP-NOW receive
//! callback only copies the payload into a bounded queue.

use std::fmt::Write as _;
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::espnow::{EspNow, PeerInfo, BROADCAST};
use esp_idf_svc::hal::delay::{TickType, NON_BLOCK};
use esp_idf_svc::hal::modem::Modem;
use esp_idf_svc::hal::uart::UartDriver;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::sys::TickType_t;
use esp_idf_svc::wifi::{BlockingWifi, EspWifi};
use heapless::Deque;

use quakewatch::comm::{self, LineReader, ModemReply};
use quakewatch::geo::Transport;
use quakewatch::protocol::WireRecord;
use quakewatch::relay::{RadioLink, SendError};

/// How long to wait for `+OK` after a modem command.
const REPLY_TIMEOUT: Duration = Duration::from_millis(1000);

/// Inbound packets queued per link between loop iterations.
const INBOX_LEN: usize = 4;

// ── ESP-NOW ──────────────────────────────────────────────────────────

pub struct EspNowLink {
    espnow: EspNow<'static>,
    rx: Receiver<WireRecord>,
}

impl EspNowLink {
    fn start() -> anyhow::Result<Self> {
        let espnow = EspNow::take()?;
        espnow.add_peer(PeerInfo {
            peer_addr: BROADCAST,
            channel: 0,
            encrypt: false,
            ..Default::default()
        })?;

        let (tx, rx) = mpsc::sync_channel::<WireRecord>(INBOX_LEN);
        espnow.register_recv_cb(move |_info, data| {
            // Runs in the WiFi task; never block here.
            let _ = tx.try_send(comm::read_frame(data));
        })?;

        Ok(Self { espnow, rx })
    }

    fn send(&self, payload: &[u8]) -> Result<(), SendError> {
        self.espnow.send(BROADCAST, payload).map_err(|e| {
            log::debug!("ESP-NOW send error: {:?}", e);
            SendError::Io
        })
    }

    fn poll(&self) -> Option<WireRecord> {
        self.rx.try_recv().ok()
    }
}

// ── LoRa modem ───────────────────────────────────────────────────────

pub struct LoraModem {
    uart: UartDriver<'static>,
    reader: LineReader,
    inbox: Deque<WireRecord, INBOX_LEN>,
}

impl LoraModem {
    fn new(uart: UartDriver<'static>) -> Self {
        Self {
            uart,
            reader: LineReader::new(),
            inbox: Deque::new(),
        }
    }

    /// Check the modem answers at all.
    fn probe(&mut self) -> Result<(), SendError> {
        self.command(&[b"AT\r\n"])
    }

    fn send(&mut self, payload: &[u8]) -> Result<(), SendError> {
        let mut header = heapless::String::<24>::new();
        let _ = write!(header, "AT+SEND=0,{},", payload.len());
        self.command(&[header.as_bytes(), payload, b"\r\n"])
    }

    /// Next packet heard by the modem, if any.
    fn poll(&mut self) -> Option<WireRecord> {
        self.pump(NON_BLOCK);
        self.inbox.pop_front()
    }

    /// Write a command and wait for its reply. Packets that arrive while
    /// waiting are queued, not lost.
    fn command(&mut self, parts: &[&[u8]]) -> Result<(), SendError> {
        for part in parts {
            self.uart.write(part).map_err(|_| SendError::Io)?;
        }

        let deadline = Instant::now() + REPLY_TIMEOUT;
        while Instant::now() < deadline {
            match self.pump(TickType::new_millis(20).ticks()) {
                Some(ModemReply::Ok) => return Ok(()),
                Some(ModemReply::Err) => return Err(SendError::Nak),
                None => {}
            }
        }
        Err(SendError::Busy)
    }

    /// Read whatever the UART has, splitting it into lines. Returns the
    /// last command reply seen.
    fn pump(&mut self, timeout: TickType_t) -> Option<ModemReply> {
        let mut buf = [0u8; 64];
        let n = self.uart.read(&mut buf, timeout).unwrap_or(0);

        let mut reply = None;
        for &byte in &buf[..n] {
            if let Some(line) = self.reader.feed(byte) {
                if let Some(payload) = comm::parse_modem_rx(line) {
                    if self.inbox.push_back(comm::read_frame(payload)).is_err() {
                        log::warn!("LoRa inbox full, dropping packet");
                    }
                } else if let Some(r) = comm::parse_modem_reply(line) {
                    reply = Some(r);
                }
            }
        }
        reply
    }
}

// ── Both links ───────────────────────────────────────────────────────

pub struct Radios {
    // ESP-NOW needs the WiFi driver started and kept alive.
    _wifi: BlockingWifi<EspWifi<'static>>,
    espnow: EspNowLink,
    lora: LoraModem,
}

impl Radios {
    /// At most one inbound packet, long-range link first.
    pub fn poll(&mut self) -> Option<WireRecord> {
        self.lora.poll().or_else(|| self.espnow.poll())
    }
}

impl RadioLink for Radios {
    fn send(&mut self, transport: Transport, payload: &[u8]) -> Result<(), SendError> {
        match transport {
            Transport::ShortRange => self.espnow.send(payload),
            Transport::LongRange => self.lora.send(payload),
        }
    }
}

/// Bring up WiFi + ESP-NOW and confirm the LoRa modem responds.
pub fn init(
    modem: Modem,
    uart: UartDriver<'static>,
    sys_loop: EspSystemEventLoop,
    nvs: EspDefaultNvsPartition,
) -> anyhow::Result<Radios> {
    let mut wifi = BlockingWifi::wrap(EspWifi::new(modem, sys_loop.clone(), Some(nvs))?, sys_loop)?;
    wifi.set_configuration(&esp_idf_svc::wifi::Configuration::Client(Default::default()))?;
    wifi.start()?;

    let espnow = EspNowLink::start()?;
    log::info!("ESP-NOW ready (broadcast peer)");

    let mut lora = LoraModem::new(uart);
    lora.probe()
        .map_err(|e| anyhow::anyhow!("LoRa modem not responding: {:?}", e))?;
    log::info!("LoRa modem ready");

    Ok(Radios {
        _wifi: wifi,
        espnow,
        lora,
    })
}
