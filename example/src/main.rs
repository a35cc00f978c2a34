// example/src/main.rs

use example_app::{decode_fleet, decode_samples, encode_samples, Device, Fleet, Point, SCHEMA};
use ffire::{compile_schema, FfireError};

fn main() -> Result<(), FfireError> {
    // Build a message with the generated types.
    let fleet = Fleet {
        name:    "north".to_string(),
        devices: vec![
            Device {
                id:       7,
                position: Point { x: 1.0, y: -2.5 },
                readings: vec![0.5, 1.25, -4.0],
                active:   true,
                label:    Some("gateway".to_string()),
                ports:    vec![80, 443],
            },
            Device {
                id: -3,
                ..Device::default()
            },
        ],
        owner:   None,
    };

    // Encode with the generated code: the buffer is allocated once, at its exact size.
    let bytes = fleet.encode()?;
    println!("Fleet encodes to {} bytes", bytes.len());

    // ...and decode it back.
    let decoded = decode_fleet(&bytes)?;
    assert_eq!(decoded, fleet);
    for device in &decoded.devices {
        println!(
            "  device {:>3} at ({}, {}) active={} label={:?} readings={:?} ports={:?}",
            device.id, device.position.x, device.position.y, device.active, device.label, device.readings, device.ports
        );
    }

    // The same bytes, interpreted without generated code.
    let compiled = compile_schema(SCHEMA)?;
    let value = compiled.decode_to_json("Fleet", &bytes)?;
    println!("{}", serde_json::to_string_pretty(&value)?);

    // The generated structs derive serde, so JSON fixtures deserialize directly.
    let from_json: Fleet = serde_json::from_value(value)?;
    assert_eq!(from_json, fleet);

    // Non-struct messages are plain type aliases.
    let samples = vec![1, 2, 3];
    let sample_bytes = encode_samples(&samples)?;
    println!("Samples {:?} → {:02X?}", samples, sample_bytes);
    assert_eq!(decode_samples(&sample_bytes)?, samples);

    Ok(())
}
