use batbus::control::{FrameRecord, NodeStatusReport, SimCommand, SimReply};
use batbus::emitter::shunt_current_amps;
use batbus::protocol::{MessageBody, MessageKind};
use clap::{App, Arg, SubCommand};
use colored::Colorize;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::time::Duration;

const RESPONSE_TIMEOUT_SECS: u64 = 5;

fn main() {
    let matches = App::new("batbus")
        .version("0.1.0")
        .about("🔋 Battery Monitor Bus CLI - drive the simulated node from your console")
        .arg(
            Arg::with_name("host")
                .long("host")
                .value_name("HOST")
                .help("Simulator host address")
                .takes_value(true)
                .default_value("127.0.0.1"),
        )
        .arg(
            Arg::with_name("port")
                .long("port")
                .value_name("PORT")
                .help("Simulator TCP port")
                .takes_value(true)
                .default_value("8090"),
        )
        .subcommand(SubCommand::with_name("ping").about("Check that the simulator answers"))
        .subcommand(SubCommand::with_name("status").about("Show the node status report"))
        .subcommand(
            SubCommand::with_name("monitor")
                .about("Stream published frames")
                .arg(
                    Arg::with_name("format")
                        .long("format")
                        .value_name("FORMAT")
                        .help("Output format")
                        .takes_value(true)
                        .possible_values(&["table", "compact", "json"])
                        .default_value("table"),
                )
                .arg(
                    Arg::with_name("count")
                        .long("count")
                        .value_name("N")
                        .help("Stop after N frames (0 = run until interrupted)")
                        .takes_value(true)
                        .default_value("0"),
                ),
        )
        .subcommand(
            SubCommand::with_name("set")
                .about("Override a sensor reading")
                .arg(
                    Arg::with_name("field")
                        .help("Reading to override")
                        .required(true)
                        .possible_values(&[
                            "battery-volts",
                            "shunt-volts",
                            "shunt-ohms",
                            "temperature",
                            "oil-pressure",
                        ]),
                )
                .arg(
                    Arg::with_name("value")
                        .help("New value (volts, ohms, kelvin or pascal)")
                        .required(true),
                ),
        )
        .subcommand(
            SubCommand::with_name("press")
                .about("Hold the panel button")
                .arg(
                    Arg::with_name("hold-ms")
                        .long("hold-ms")
                        .value_name("MS")
                        .help("How long the button stays down")
                        .takes_value(true)
                        .default_value("200"),
                ),
        )
        .subcommand(
            SubCommand::with_name("peer")
                .about("Announce a peer device on the bus")
                .arg(
                    Arg::with_name("address")
                        .long("address")
                        .value_name("ADDR")
                        .help("Source address of the announcing device")
                        .takes_value(true)
                        .required(true),
                ),
        )
        .subcommand(
            SubCommand::with_name("registry")
                .about("Toggle the device registry availability")
                .arg(
                    Arg::with_name("state")
                        .help("on or off")
                        .required(true)
                        .possible_values(&["on", "off"]),
                ),
        )
        .get_matches();

    let host = matches.value_of("host").unwrap_or("127.0.0.1");
    let port = matches.value_of("port").unwrap_or("8090");

    let result = match matches.subcommand() {
        ("ping", Some(_)) => run_ping(host, port),
        ("status", Some(_)) => run_status(host, port),
        ("monitor", Some(sub)) => {
            let format = sub.value_of("format").unwrap_or("table");
            let count = parse_number::<u32>(sub.value_of("count").unwrap_or("0"), "count");
            run_monitor(host, port, format, count)
        }
        ("set", Some(sub)) => {
            let field = sub.value_of("field").unwrap_or("");
            let value = parse_number::<f64>(sub.value_of("value").unwrap_or(""), "value");
            run_set(host, port, field, value)
        }
        ("press", Some(sub)) => {
            let hold_ms = parse_number::<u64>(sub.value_of("hold-ms").unwrap_or("200"), "hold-ms");
            send_expecting_ack(host, port, &SimCommand::PressButton { hold_ms })
        }
        ("peer", Some(sub)) => {
            let address = parse_number::<u8>(sub.value_of("address").unwrap_or(""), "address");
            send_expecting_ack(host, port, &SimCommand::AnnouncePeer { address })
        }
        ("registry", Some(sub)) => {
            let available = sub.value_of("state").unwrap_or("on") == "on";
            send_expecting_ack(host, port, &SimCommand::SetRegistryAvailable { available })
        }
        _ => {
            println!(
                "{}",
                "No command specified. Use --help for usage information.".yellow()
            );
            println!("{}", "Quick start:".green());
            println!("  {} Test connection", "batbus ping".cyan());
            println!("  {} Watch the frame streams", "batbus monitor".cyan());
            println!("  {} Node status report", "batbus status".cyan());
            Ok(())
        }
    };

    if let Err(e) = result {
        println!("{} {}", "❌".red(), e);
        std::process::exit(1);
    }
}

fn parse_number<T: std::str::FromStr>(raw: &str, name: &str) -> T {
    match raw.parse::<T>() {
        Ok(value) => value,
        Err(_) => {
            println!("{} Invalid {}: '{}'", "❌".red(), name, raw);
            std::process::exit(1);
        }
    }
}

fn send_command(
    host: &str,
    port: &str,
    command: &SimCommand,
) -> Result<SimReply, Box<dyn std::error::Error>> {
    let mut stream = TcpStream::connect(format!("{}:{}", host, port))?;
    stream.set_read_timeout(Some(Duration::from_secs(RESPONSE_TIMEOUT_SECS)))?;

    let command_json = serde_json::to_string(command)?;
    stream.write_all(command_json.as_bytes())?;
    stream.write_all(b"\n")?;

    let mut reader = BufReader::new(&stream);
    let mut response_line = String::new();
    reader.read_line(&mut response_line)?;

    let reply = serde_json::from_str::<SimReply>(response_line.trim())?;
    Ok(reply)
}

fn run_ping(host: &str, port: &str) -> Result<(), Box<dyn std::error::Error>> {
    match send_command(host, port, &SimCommand::Ping)? {
        SimReply::Pong => {
            println!("{} Simulator is alive", "✅".green());
            Ok(())
        }
        other => Err(format!("Unexpected reply: {:?}", other).into()),
    }
}

fn run_set(
    host: &str,
    port: &str,
    field: &str,
    value: f64,
) -> Result<(), Box<dyn std::error::Error>> {
    let command = match field {
        "battery-volts" => SimCommand::SetBatteryVolts { volts: value },
        "shunt-volts" => SimCommand::SetShuntVolts { volts: value },
        "shunt-ohms" => SimCommand::SetShuntResistance { ohms: value },
        "temperature" => SimCommand::SetBatteryTemperature { kelvin: value },
        "oil-pressure" => SimCommand::SetOilPressure { pascal: value },
        other => return Err(format!("Unknown field: {}", other).into()),
    };
    send_expecting_ack(host, port, &command)
}

fn send_expecting_ack(
    host: &str,
    port: &str,
    command: &SimCommand,
) -> Result<(), Box<dyn std::error::Error>> {
    match send_command(host, port, command)? {
        SimReply::Ack => {
            println!("{} Done", "✅".green());
            Ok(())
        }
        SimReply::Error { message } => Err(message.into()),
        other => Err(format!("Unexpected reply: {:?}", other).into()),
    }
}

fn run_status(host: &str, port: &str) -> Result<(), Box<dyn std::error::Error>> {
    match send_command(host, port, &SimCommand::Status)? {
        SimReply::Status(report) => {
            print_status_report(&report);
            Ok(())
        }
        SimReply::Error { message } => Err(message.into()),
        other => Err(format!("Unexpected reply: {:?}", other).into()),
    }
}

fn print_status_report(report: &NodeStatusReport) {
    println!("{}", "🔋 Battery Node Status".bold());
    println!("======================");

    let bus_state = if report.bus_open {
        match report.stats.armed_at {
            Some(at) => format!("OPEN (schedule armed at {} ms)", at).green(),
            None => "OPEN".green(),
        }
    } else {
        "CLAIMING".yellow()
    };
    println!("Bus:        {}", bus_state);
    println!("Peers:      {}", report.stats.peers_visible);
    println!(
        "Frames:     status={} config={} failures={}",
        report.stats.status_frames,
        report.stats.config_frames,
        if report.stats.send_failures > 0 {
            report.stats.send_failures.to_string().red()
        } else {
            report.stats.send_failures.to_string().normal()
        }
    );
    println!(
        "Presses:    short={} long={}",
        report.stats.short_presses, report.stats.long_presses
    );

    let amps = shunt_current_amps(
        report.readings.shunt_volts(),
        report.readings.shunt_resistance_ohms(),
    );
    println!(
        "Battery:    {} {}",
        colorize_volts(report.readings.battery_volts()),
        format!(
            "{:.1} A ({:.4} V / {:.4} Ω)",
            amps,
            report.readings.shunt_volts(),
            report.readings.shunt_resistance_ohms()
        )
        .normal()
    );
    println!(
        "Temp:       {}   Oil: {:.0} Pa",
        format_temperature(report.readings.battery_temperature_k()),
        report.readings.oil_pressure_pa()
    );
    println!("Ticks:      {}", report.stats.ticks);
    match &report.stats.last_error {
        Some(err) => println!("Last error: {}", err.red()),
        None => println!("Last error: none"),
    }
}

fn run_monitor(
    host: &str,
    port: &str,
    format: &str,
    count: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let stream = TcpStream::connect(format!("{}:{}", host, port))?;
    let reader = BufReader::new(stream);

    if format == "table" {
        println!(
            "{}",
            format!(
                "{:>8}  {:<15}  {:>4}  {:>8}  {:>8}  {:>8}  DETAIL",
                "TIME", "STREAM", "INST", "VOLTS", "AMPS", "TEMP"
            )
            .bold()
        );
    }

    let mut seen: u32 = 0;
    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        // Anything that is not a frame record (e.g. a stray reply) is skipped
        let record = match serde_json::from_str::<FrameRecord>(trimmed) {
            Ok(record) => record,
            Err(_) => continue,
        };

        match format {
            "json" => println!("{}", trimmed),
            "compact" => print_frame_compact(&record),
            _ => print_frame_row(&record),
        }

        seen += 1;
        if count > 0 && seen >= count {
            break;
        }
    }

    Ok(())
}

fn stream_label(pgn: u32) -> colored::ColoredString {
    match MessageKind::from_pgn(pgn) {
        Some(MessageKind::BatteryStatus) => "battery-status".cyan(),
        Some(MessageKind::BatteryConfig) => "battery-config".yellow(),
        None => "unknown".dimmed(),
    }
}

fn colorize_volts(volts: f64) -> colored::ColoredString {
    let text = format!("{:.2} V", volts);
    if volts < 11.8 {
        text.red()
    } else if volts < 12.2 {
        text.yellow()
    } else {
        text.green()
    }
}

fn format_temperature(kelvin: Option<f64>) -> colored::ColoredString {
    match kelvin {
        Some(k) => format!("{:.1} K", k).normal(),
        None => "n/a".dimmed(),
    }
}

fn print_frame_row(record: &FrameRecord) {
    let time_s = record.at_ms as f64 / 1000.0;
    match &record.body {
        MessageBody::BatteryStatus(fields) => {
            println!(
                "{:>7.1}s  {:<15}  {:>4}  {:>8}  {:>7.1}A  {:>8}  sid={}",
                time_s,
                stream_label(record.pgn),
                fields.instance,
                colorize_volts(fields.battery_volts),
                fields.battery_amps,
                format_temperature(fields.battery_temperature_k),
                fields.sid
            );
        }
        MessageBody::BatteryConfig(fields) => {
            println!(
                "{:>7.1}s  {:<15}  {:>4}  {:>8}  {:>8}  {:>8}  {:?}/{:?} {:.0} C eff={}%",
                time_s,
                stream_label(record.pgn),
                fields.instance,
                "-",
                "-",
                "-",
                fields.battery_type,
                fields.chemistry,
                fields.capacity_coulombs,
                fields.charge_efficiency_percent
            );
        }
    }
}

fn print_frame_compact(record: &FrameRecord) {
    let time_s = record.at_ms as f64 / 1000.0;
    match &record.body {
        MessageBody::BatteryStatus(fields) => {
            println!(
                "[{:.1}s] pgn={} inst={} {:.2}V {:.1}A",
                time_s, record.pgn, fields.instance, fields.battery_volts, fields.battery_amps
            );
        }
        MessageBody::BatteryConfig(fields) => {
            println!(
                "[{:.1}s] pgn={} inst={} {:?} {:.0} C",
                time_s, record.pgn, fields.instance, fields.chemistry, fields.capacity_coulombs
            );
        }
    }
}
