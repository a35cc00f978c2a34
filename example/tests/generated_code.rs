use example_app::{decode_fleet, decode_samples, encode_fleet, encode_samples, Device, Fleet, Point, SCHEMA};
use ffire::{compile_schema, LengthKind, WireError, MAX_LENGTH};
use serde_json::json;

fn fixture() -> serde_json::Value {
    serde_json::from_str(include_str!("../fixtures/fleet.json")).unwrap()
}

fn sample_fleet() -> Fleet {
    Fleet {
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
        owner:   Some("ops".to_string()),
    }
}

#[test]
fn generated_encoder_matches_fixture_converter() {
    let compiled = compile_schema(SCHEMA).unwrap();
    let expected = compiled.convert_fixture("Fleet", &fixture()).unwrap();

    let encoded = sample_fleet().encode().unwrap();
    assert_eq!(encoded, expected);
    assert_eq!(encode_fleet(&sample_fleet()).unwrap(), expected);
}

#[test]
fn generated_decoder_reads_fixture_bytes() {
    let compiled = compile_schema(SCHEMA).unwrap();
    let bytes = compiled.convert_fixture("Fleet", &fixture()).unwrap();

    assert_eq!(decode_fleet(&bytes).unwrap(), sample_fleet());
    assert_eq!(Fleet::decode(&bytes).unwrap(), sample_fleet());
}

#[test]
fn json_decoder_agrees_with_serde_derives() {
    let compiled = compile_schema(SCHEMA).unwrap();
    let bytes = sample_fleet().encode().unwrap();

    let value = compiled.decode_to_json("Fleet", &bytes).unwrap();
    assert_eq!(value, fixture());
    assert_eq!(serde_json::to_value(sample_fleet()).unwrap(), fixture());
}

#[test]
fn samples_alias() {
    let bytes = encode_samples(&vec![1, 2, 3]).unwrap();
    assert_eq!(bytes, [0x03, 0x00, 0x01, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x03, 0x00, 0x00, 0x00]);
    assert_eq!(decode_samples(&bytes).unwrap(), vec![1, 2, 3]);
    assert_eq!(decode_samples(&[0x00, 0x00]).unwrap(), Vec::<i32>::new());
}

#[test]
fn absent_optionals_take_one_byte() {
    let mut fleet = sample_fleet();
    let with_owner = fleet.encode().unwrap();
    fleet.owner = None;
    let without_owner = fleet.encode().unwrap();

    // "ops": presence byte + 2 byte length + 3 bytes.
    assert_eq!(with_owner.len() - without_owner.len(), 5);
    assert_eq!(*without_owner.last().unwrap(), 0x00);
    assert_eq!(decode_fleet(&without_owner).unwrap(), fleet);
}

#[test]
fn length_limits() {
    let mut fleet = Fleet {
        name: "x".repeat(MAX_LENGTH),
        ..Fleet::default()
    };
    let bytes = fleet.encode().unwrap();
    assert_eq!(decode_fleet(&bytes).unwrap(), fleet);

    fleet.name.push('x');
    assert_eq!(
        fleet.encode(),
        Err(WireError::Capacity {
            kind: LengthKind::String,
            len:  MAX_LENGTH + 1,
            max:  MAX_LENGTH,
        })
    );

    let samples = vec![0; MAX_LENGTH + 1];
    assert!(matches!(
        encode_samples(&samples),
        Err(WireError::Capacity { kind: LengthKind::Array, .. })
    ));
}

#[test]
fn truncated_input_is_an_error() {
    let bytes = sample_fleet().encode().unwrap();
    for len in [0, 1, bytes.len() / 2, bytes.len() - 1] {
        assert!(
            matches!(decode_fleet(&bytes[..len]), Err(WireError::Truncated { .. })),
            "prefix of {} bytes decoded",
            len
        );
    }
}

#[test]
fn invalid_utf8_is_rejected() {
    let mut bytes = Fleet {
        name: "ab".to_string(),
        ..Fleet::default()
    }
    .encode()
    .unwrap();
    let at = bytes.iter().position(|b| *b == b'a').unwrap();
    bytes[at] = 0xFF;
    assert!(matches!(decode_fleet(&bytes), Err(WireError::InvalidUtf8 { .. })));
}

#[test]
fn fixture_with_optional_keys_missing() {
    let value = json!({ "name": "", "devices": [] });
    let compiled = compile_schema(SCHEMA).unwrap();
    let bytes = compiled.convert_fixture("Fleet", &value).unwrap();

    assert_eq!(decode_fleet(&bytes).unwrap(), Fleet::default());
    let parsed: Fleet = serde_json::from_value(value).unwrap();
    assert_eq!(parsed, Fleet::default());
}
