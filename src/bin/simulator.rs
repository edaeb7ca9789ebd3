use batbus::control::{FrameRecord, NodeStatusReport, SimCommand, SimReply};
use batbus::node::DRIVER_TICK_MS;
use batbus::{BatteryNode, JsonFrameCodec, NodeConfig, SimBus};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, Mutex};
use tokio::time;
use tracing::{error, info, warn};

const TCP_PORT: u16 = 8090;
const FRAME_BROADCAST_BUFFER_SIZE: usize = 256;
const BUTTON_SAMPLE_MS: u64 = 10;

struct SimState {
    node: BatteryNode<SimBus, JsonFrameCodec>,
    epoch: Instant,
    button_held_until: Option<u64>,
    manual_battery_volts: bool,
    manual_shunt_volts: bool,
}

impl SimState {
    fn new() -> Self {
        Self {
            node: BatteryNode::new(NodeConfig::default(), SimBus::new(), JsonFrameCodec::new()),
            epoch: Instant::now(),
            button_held_until: None,
            manual_battery_volts: false,
            manual_shunt_volts: false,
        }
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }
}

/// Synthetic sensor pipelines: gentle charge/load swings unless an operator
/// has taken over the field.
fn run_sensor_pipelines(state: &mut SimState, now: u64) {
    let t = now as f64 / 1000.0;

    if !state.manual_battery_volts {
        let volts = 12.6 + 0.15 * (t * 0.05).sin();
        state.node.readings_mut().set_battery_volts(volts);
    }
    if !state.manual_shunt_volts {
        let drop_volts = 0.045 + 0.012 * (t * 0.08).cos();
        state.node.readings_mut().set_shunt_volts(drop_volts);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    println!("🔋 Battery Monitor Bus Simulator");
    println!("================================");

    let state = Arc::new(Mutex::new(SimState::new()));
    {
        let mut guard = state.lock().await;
        guard.node.open_bus()?;
        info!("Bus open requested, address claim running");
    }

    // Broadcast channel for published frames
    let (frame_tx, _) = broadcast::channel(FRAME_BROADCAST_BUFFER_SIZE);

    // Start TCP server
    let tcp_state = Arc::clone(&state);
    let tcp_frame_tx = frame_tx.clone();
    let tcp_server = tokio::spawn(async move {
        if let Err(e) = start_tcp_server(tcp_state, tcp_frame_tx).await {
            error!("TCP server error: {}", e);
        }
    });

    // Driver cadence for the bus tick; the button line samples much faster
    let mut tick_interval = time::interval(Duration::from_millis(DRIVER_TICK_MS));
    let mut sample_interval = time::interval(Duration::from_millis(BUTTON_SAMPLE_MS));

    loop {
        tokio::select! {
            _ = tick_interval.tick() => {
                let mut guard = state.lock().await;
                let now = guard.now_ms();

                run_sensor_pipelines(&mut guard, now);
                guard.node.process_tick(now);

                let presses = guard.node.drain_presses();
                if presses.short_press {
                    info!("🔘 Short press");
                }
                if presses.long_press {
                    info!("🔘 Long press");
                }

                let frames = guard.node.bus_mut().take_sent();
                drop(guard);

                for frame in &frames {
                    match JsonFrameCodec::decode(frame) {
                        Ok(body) => {
                            let record = FrameRecord {
                                at_ms: now,
                                pgn: frame.pgn(),
                                body,
                            };
                            match serde_json::to_string(&record) {
                                // No subscribers yet is fine
                                Ok(line) => {
                                    let _ = frame_tx.send(line);
                                }
                                Err(e) => warn!("Failed to serialize frame record: {}", e),
                            }
                        }
                        Err(e) => warn!("Undecodable frame on the wire: {}", e),
                    }
                }
            }
            _ = sample_interval.tick() => {
                let mut guard = state.lock().await;
                let now = guard.now_ms();

                let raw = guard
                    .button_held_until
                    .map_or(false, |deadline| now < deadline);
                if !raw {
                    guard.button_held_until = None;
                }
                guard.node.readings_mut().set_button_raw(raw);
                guard.node.sample_button(now);
            }
            _ = tokio::signal::ctrl_c() => {
                break;
            }
        }
    }

    tcp_server.abort();
    println!("🔋 Battery Monitor Bus Simulator stopped");

    Ok(())
}

async fn start_tcp_server(
    state: Arc<Mutex<SimState>>,
    frame_tx: broadcast::Sender<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind(format!("127.0.0.1:{}", TCP_PORT)).await?;
    info!("🌐 TCP server listening on port {}", TCP_PORT);

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                info!("🔗 New client connected: {}", addr);
                let client_state = Arc::clone(&state);
                let client_frame_rx = frame_tx.subscribe();

                tokio::spawn(async move {
                    if let Err(e) = handle_client(stream, client_state, client_frame_rx).await {
                        warn!("Client {} error: {}", addr, e);
                    }
                    info!("🔌 Client {} disconnected", addr);
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}

async fn apply_command(state: &Arc<Mutex<SimState>>, command: SimCommand) -> SimReply {
    let mut guard = state.lock().await;
    let now = guard.now_ms();

    match command {
        SimCommand::Ping => SimReply::Pong,
        SimCommand::Status => SimReply::Status(NodeStatusReport {
            bus_open: guard.node.is_bus_open(),
            stats: guard.node.stats().clone(),
            readings: guard.node.readings().clone(),
        }),
        SimCommand::SetBatteryVolts { volts } => {
            guard.manual_battery_volts = true;
            guard.node.readings_mut().set_battery_volts(volts);
            SimReply::Ack
        }
        SimCommand::SetShuntVolts { volts } => {
            guard.manual_shunt_volts = true;
            guard.node.readings_mut().set_shunt_volts(volts);
            SimReply::Ack
        }
        SimCommand::SetShuntResistance { ohms } => {
            guard.node.readings_mut().set_shunt_resistance(ohms);
            SimReply::Ack
        }
        SimCommand::SetBatteryTemperature { kelvin } => {
            guard.node.readings_mut().set_battery_temperature(kelvin);
            SimReply::Ack
        }
        SimCommand::SetOilPressure { pascal } => {
            guard.node.readings_mut().set_oil_pressure(pascal);
            SimReply::Ack
        }
        SimCommand::PressButton { hold_ms } => {
            guard.button_held_until = Some(now + hold_ms);
            SimReply::Ack
        }
        SimCommand::AnnouncePeer { address } => {
            match guard.node.bus_mut().inject_peer_announcement(address) {
                Ok(()) => SimReply::Ack,
                Err(e) => SimReply::Error {
                    message: e.to_string(),
                },
            }
        }
        SimCommand::SetRegistryAvailable { available } => {
            guard.node.bus_mut().set_registry_available(available);
            SimReply::Ack
        }
    }
}

async fn handle_client(
    stream: TcpStream,
    state: Arc<Mutex<SimState>>,
    mut frame_rx: broadcast::Receiver<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (reader, writer) = stream.into_split();
    let mut buf_reader = BufReader::new(reader);

    // Wrap writer for sharing with the frame-stream task
    let writer = Arc::new(Mutex::new(writer));

    // Spawn frame streaming task
    let frame_writer = Arc::clone(&writer);
    let frame_task = tokio::spawn(async move {
        while let Ok(line) = frame_rx.recv().await {
            let mut writer_guard = frame_writer.lock().await;
            if let Err(e) = writer_guard.write_all(line.as_bytes()).await {
                warn!("Failed to stream frame: {}", e);
                break;
            }
            if let Err(e) = writer_guard.write_all(b"\n").await {
                warn!("Failed to stream frame newline: {}", e);
                break;
            }
        }
    });

    // Process commands from client
    let mut line = String::new();
    loop {
        line.clear();
        match buf_reader.read_line(&mut line).await {
            Ok(0) => break, // Client disconnected
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }

                let reply = match serde_json::from_str::<SimCommand>(trimmed) {
                    Ok(command) => {
                        info!("📨 Received command: {:?}", command);
                        apply_command(&state, command).await
                    }
                    Err(e) => {
                        error!("Failed to parse command: {}", e);
                        SimReply::Error {
                            message: format!("Invalid command format: {}", e),
                        }
                    }
                };

                let reply_json = serde_json::to_string(&reply)?;
                {
                    let mut writer_guard = writer.lock().await;
                    writer_guard.write_all(reply_json.as_bytes()).await?;
                    writer_guard.write_all(b"\n").await?;
                }
            }
            Err(e) => {
                error!("Error reading from client: {}", e);
                break;
            }
        }
    }

    frame_task.abort();
    Ok(())
}
