use batbus::emitter::{BatteryProfile, MessageEmitter};
use batbus::protocol::*;
use batbus::readings::SensorReadings;

fn main() {
    let mut codec = JsonFrameCodec::new();

    // Worst-case status frame: full-precision floats, temperature present
    let status = MessageBody::BatteryStatus(BatteryStatusFields {
        instance: 252,
        battery_volts: 14.123_456_789_012_345,
        battery_amps: -123.456_789_012_345_67,
        battery_temperature_k: Some(310.927_777_777_777_75),
        sid: 250,
    });

    // Config frame exactly as the emitter builds it from the stock profile
    let emitter = MessageEmitter::new(252, BatteryProfile::default());
    let config = emitter.build_body(MessageKind::BatteryConfig, &SensorReadings::default());

    check_frame("battery-status", &mut codec, &status);
    check_frame("battery-config", &mut codec, &config);
}

fn check_frame(name: &str, codec: &mut JsonFrameCodec, body: &MessageBody) {
    match codec.encode(body) {
        Ok(frame) => {
            println!("✅ {} frame encoded successfully!", name);
            println!("📏 Frame size: {} bytes (PGN {})", frame.len(), frame.pgn());
            println!("🎯 Payload limit: {} bytes", MAX_FRAME_PAYLOAD);
            println!(
                "📊 Size ratio: {:.1}%",
                (frame.len() as f32 / MAX_FRAME_PAYLOAD as f32) * 100.0
            );

            if frame.len() <= MAX_FRAME_PAYLOAD / 2 {
                println!("✅ Comfortable headroom for protocol growth");
            } else {
                println!("⚠️  Frame uses more than half the payload limit");
            }

            println!("📄 JSON: {}\n", String::from_utf8_lossy(frame.data()));
        }
        Err(e) => {
            println!("❌ {} encode failed: {}", name, e);
        }
    }
}
